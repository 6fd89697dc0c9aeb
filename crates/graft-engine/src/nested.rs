use std::collections::{HashMap, HashSet, VecDeque};

use graft_store::Store;
use tracing::debug;

use crate::database::DbTransaction;
use crate::error::EngineError;
use crate::row::Row;
use crate::value::Pk;

// ── ModelObjects ────────────────────────────────────────────

/// Rows grouped by model label, each (model, key) held at most once.
#[derive(Debug, Clone, Default)]
pub struct ModelObjects {
    rows: HashMap<String, Vec<Row>>,
    seen: HashSet<(String, Pk)>,
}

impl ModelObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. Returns `false` if the row was already present.
    pub fn insert(&mut self, row: Row) -> bool {
        if !self.seen.insert((row.model.clone(), row.pk.clone())) {
            return false;
        }
        self.rows.entry(row.model.clone()).or_default().push(row);
        true
    }

    /// Union `other` into `self`.
    pub fn extend(&mut self, other: ModelObjects) {
        for (_, rows) in other.rows {
            for row in rows {
                self.insert(row);
            }
        }
    }

    pub fn contains(&self, model: &str, pk: &Pk) -> bool {
        self.seen.contains(&(model.to_string(), pk.clone()))
    }

    pub fn rows(&self, model: &str) -> &[Row] {
        self.rows.get(model).map_or(&[], Vec::as_slice)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// ── NestedObjects ───────────────────────────────────────────

/// Cascade collector: everything that would go away with the roots.
///
/// Starting from the roots, every row holding a `Cascade` foreign key or
/// one-to-one pointing at a collected row is collected too, transitively.
/// Many-to-many targets and non-cascading references are not followed.
pub struct NestedObjects<'t, 'a, S: Store + 'a> {
    txn: &'t DbTransaction<'a, S>,
}

impl<'t, 'a, S: Store + 'a> NestedObjects<'t, 'a, S> {
    pub fn new(txn: &'t DbTransaction<'a, S>) -> Self {
        Self { txn }
    }

    pub fn collect(
        &self,
        roots: impl IntoIterator<Item = Row>,
    ) -> Result<ModelObjects, EngineError> {
        let schema = self.txn.schema();
        let mut collected = ModelObjects::new();
        let mut queue = VecDeque::new();

        for root in roots {
            if collected.insert(root.clone()) {
                queue.push_back(root);
            }
        }

        while let Some(row) = queue.pop_front() {
            let pk = row.pk.to_bson();
            for (model, field) in schema.referencing_fields(&row.model) {
                if !field.cascades() {
                    continue;
                }
                for related in self.txn.filter_eq(model.label(), field.name(), &pk)? {
                    if collected.insert(related.clone()) {
                        queue.push_back(related);
                    }
                }
            }
        }

        debug!(rows = collected.len(), "collected nested objects");
        Ok(collected)
    }
}
