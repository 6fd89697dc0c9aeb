use std::collections::HashSet;

use bson::Bson;
use graft_engine::{Database, ModelDef, Row};
use graft_store::Store;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::closure::collect_closure;
use crate::codec::{self, SerializedRecord};
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::loader::Loader;
use crate::remap::{FieldGenerators, IdentifierMatcher, remap};
use crate::router::{AllowAll, Router};

/// Per-call settings of a deep copy.
#[derive(Debug, Default)]
pub struct CopyOptions {
    /// Models left out of the closure.
    pub excluded_types: Vec<String>,
    /// Models pulled in through what the closure references.
    pub dangling_types: Vec<String>,
    pub generators: FieldGenerators,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, model: &str) -> Self {
        self.excluded_types.push(model.to_string());
        self
    }

    pub fn dangling(mut self, model: &str) -> Self {
        self.dangling_types.push(model.to_string());
        self
    }

    pub fn generator<F>(mut self, model: &str, field: &str, generator: F) -> Self
    where
        F: Fn(&JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.generators.register(model, field, generator);
        self
    }
}

/// Runs deep copies against one database.
pub struct Copier<'d, S: Store> {
    db: &'d Database<S>,
    config: CopyConfig,
    router: Box<dyn Router + 'd>,
}

impl<'d, S: Store> Copier<'d, S> {
    pub fn new(db: &'d Database<S>, config: CopyConfig) -> Self {
        Self {
            db,
            config,
            router: Box::new(AllowAll),
        }
    }

    pub fn with_router(mut self, router: impl Router + 'd) -> Self {
        self.router = Box::new(router);
        self
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Copy `root` and everything that comes with it, returning the new
    /// root as stored.
    ///
    /// Nothing is written if the closure cannot be collected or remapped,
    /// or if any insert fails.
    pub fn deep_copy(&self, root: &Row, options: &CopyOptions) -> Result<Row, CopyError> {
        let schema = self.db.schema();
        self.config.validate(schema)?;
        let matcher = IdentifierMatcher::new(&self.config.identifiers)?;
        let serialize_options = self.config.serialize_options();

        let mut dangling = self.config.dangling_models.clone();
        for model in &options.dangling_types {
            if !dangling.contains(model) {
                dangling.push(model.clone());
            }
        }

        let txn = self.db.begin(true)?;
        let rows = collect_closure(
            &txn,
            root,
            &options.excluded_types,
            &dangling,
            self.config.use_natural_foreign_keys,
        )?;
        let text = codec::serialize(&txn, &rows, &serialize_options)?;
        txn.rollback()?;
        debug!(rows = rows.len(), "serialized closure");

        let records = codec::parse(&text, self.config.format)?;
        let root_index = locate_root(&records, root, schema.model(&root.model)?);

        let shared: HashSet<String> = schema
            .models()
            .iter()
            .filter(|model| self.config.is_excluded(model))
            .map(|model| model.label().to_string())
            .collect();
        let (records, table) = remap(records, &options.generators, &matcher, &shared)?;
        let text = codec::render(&records, self.config.format)?;

        let report = Loader::new(self.db, &self.config, self.router.as_ref()).load(&text)?;

        let not_copied = || CopyError::RootNotCopied {
            model: root.model.clone(),
            pk: root.pk.clone(),
        };
        let new_pk = root_index
            .and_then(|index| report.stored_pk(index))
            .cloned()
            .ok_or_else(not_copied)?;

        let txn = self.db.begin(true)?;
        let copy = txn.get(&root.model, &new_pk)?.ok_or_else(not_copied)?;
        txn.rollback()?;

        info!(
            model = %root.model,
            from = %root.pk,
            to = %copy.pk,
            rows = rows.len(),
            identifiers = table.len(),
            inserted = report.inserted.len(),
            skipped = report.skipped,
            "deep copy finished"
        );
        Ok(copy)
    }
}

/// Copy `root` with the default config.
pub fn deep_copy<S: Store>(
    db: &Database<S>,
    root: &Row,
    options: &CopyOptions,
) -> Result<Row, CopyError> {
    Copier::new(db, CopyConfig::default()).deep_copy(root, options)
}

/// Position of the root's record, matched by key or, when the key was left
/// out for a natural key, by natural-key values.
fn locate_root(records: &[SerializedRecord], root: &Row, model: &ModelDef) -> Option<usize> {
    records.iter().position(|record| {
        if record.model != root.model {
            return false;
        }
        match (&record.pk, model.natural_key_fields()) {
            (Some(pk), _) => *pk == root.pk,
            (None, Some(names)) => names.iter().all(|name| {
                let stored = root.get(name).unwrap_or(&Bson::Null);
                record
                    .fields
                    .get(name)
                    .is_some_and(|value| codec::bson_to_json(stored) == *value)
            }),
            (None, None) => false,
        }
    })
}
