//! Writes serialized records back as new rows.

use std::mem;

use graft_engine::{Database, NewRow, Pk};
use graft_store::Store;
use tracing::debug;

use crate::codec::{self, DeserializedObject};
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::router::Router;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedRecord {
    /// Position of the record in the loaded text.
    pub index: usize,
    pub model: String,
    /// The key the record carried, if any.
    pub serialized_pk: Option<Pk>,
    /// The key the row was stored under.
    pub pk: Pk,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: Vec<InsertedRecord>,
    /// Records left alone because of exclusion or routing.
    pub skipped: usize,
    /// Inserted records that needed a second pass for forward references.
    pub deferred: usize,
}

impl LoadReport {
    /// Where the record at `index` ended up.
    pub fn stored_pk(&self, index: usize) -> Option<&Pk> {
        self.inserted
            .iter()
            .find(|record| record.index == index)
            .map(|record| &record.pk)
    }
}

pub struct Loader<'d, S: Store> {
    db: &'d Database<S>,
    config: &'d CopyConfig,
    router: &'d dyn Router,
}

impl<'d, S: Store> Loader<'d, S> {
    pub fn new(db: &'d Database<S>, config: &'d CopyConfig, router: &'d dyn Router) -> Self {
        Self { db, config, router }
    }

    /// Insert every record in `text` in one transaction.
    ///
    /// Reference checks are off while records go in, so records may point
    /// at rows that come later in the text. Every table is checked again
    /// once the transaction has committed; a violation at that point is
    /// returned as an error but the rows stay written.
    pub fn load(&self, text: &str) -> Result<LoadReport, CopyError> {
        let records = codec::parse(text, self.config.format)?;
        let schema = self.db.schema();

        debug!(records = records.len(), "starting atomic transaction");
        let report = self.db.atomic(|txn| {
            txn.with_constraint_checks_disabled(|txn| {
                let mut report = LoadReport::default();
                let mut pending: Vec<(Pk, DeserializedObject)> = Vec::new();

                for (index, record) in records.iter().enumerate() {
                    let model = schema.model(&record.model)?;
                    if self.config.is_excluded(model)
                        || !self.router.allow_migrate(&self.config.using, model)
                    {
                        report.skipped += 1;
                        continue;
                    }

                    let mut object = codec::build_object(txn, record)?;
                    if matches!(object.pk, Some(Pk::Int(_)))
                        && self.config.regenerates_pk(model.label())
                    {
                        object.pk = None;
                    }

                    debug!(model = model.label(), pk = ?object.pk, "creating record");
                    let pk = txn.insert(NewRow {
                        model: object.model.clone(),
                        pk: object.pk.clone(),
                        fields: mem::take(&mut object.fields),
                    })?;
                    for (field, targets) in &object.m2m {
                        txn.set_m2m(&object.model, &pk, field, targets)?;
                    }

                    report.inserted.push(InsertedRecord {
                        index,
                        model: object.model.clone(),
                        serialized_pk: record.pk.clone(),
                        pk: pk.clone(),
                    });
                    if !object.deferred_fields.is_empty() {
                        pending.push((pk, object));
                    }
                }

                debug!(count = pending.len(), "saving deferred fields");
                for (pk, object) in &pending {
                    let resolved = codec::resolve_deferred(txn, object)?;
                    if !resolved.fields.is_empty() {
                        txn.update_fields(&object.model, pk, resolved.fields)?;
                    }
                    for (field, targets) in &resolved.m2m {
                        txn.set_m2m(&object.model, pk, field, targets)?;
                    }
                }
                report.deferred = pending.len();
                Ok::<_, CopyError>(report)
            })
        })?;

        debug!("checking constraints");
        self.db.check_constraints(&schema.tables())?;

        debug!(
            inserted = report.inserted.len(),
            skipped = report.skipped,
            deferred = report.deferred,
            "load finished"
        );
        Ok(report)
    }
}
