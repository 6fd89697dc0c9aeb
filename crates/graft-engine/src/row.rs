use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Pk;

/// A stored row, detached from the transaction it was read in.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub model: String,
    pub pk: Pk,
    /// Concrete field values; many-to-many values live in join tables.
    pub fields: Document,
}

impl Row {
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.fields.get(field)
    }

    /// The key a single reference field points at, if it is set.
    pub fn reference(&self, field: &str) -> Option<Pk> {
        self.fields.get(field).and_then(Pk::from_bson)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get_str(field).ok()
    }
}

/// A row waiting to be inserted. A missing `pk` is generated by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub model: String,
    pub pk: Option<Pk>,
    pub fields: Document,
}

impl NewRow {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            pk: None,
            fields: Document::new(),
        }
    }

    pub fn with_pk(mut self, pk: impl Into<Pk>) -> Self {
        self.pk = Some(pk.into());
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<Bson>) -> Self {
        self.fields.insert(name, value.into());
        self
    }
}

// ── Stored layout ───────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct StoredRow {
    pk: Pk,
    fields: Document,
}

pub(crate) fn encode_row(pk: &Pk, fields: &Document) -> Result<Vec<u8>, EngineError> {
    let stored = StoredRow {
        pk: pk.clone(),
        fields: fields.clone(),
    };
    Ok(bson::serialize_to_vec(&stored)?)
}

pub(crate) fn decode_row(model: &str, bytes: &[u8]) -> Result<Row, EngineError> {
    let stored: StoredRow = bson::deserialize_from_slice(bytes)?;
    Ok(Row {
        model: model.to_string(),
        pk: stored.pk,
        fields: stored.fields,
    })
}
