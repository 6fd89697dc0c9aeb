use graft_store::StoreError;

use crate::value::Pk;

// ── SchemaError ─────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("duplicate field {model}.{field}")]
    DuplicateField { model: String, field: String },
    #[error("{model}.{field} targets unknown model {target}")]
    UnknownTarget {
        model: String,
        field: String,
        target: String,
    },
    #[error("natural key of {model} names {field}, which is not a concrete field")]
    InvalidNaturalKey { model: String, field: String },
}

// ── EngineError ─────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("unknown field {model}.{field}")]
    UnknownField { model: String, field: String },
    #[error("{model}.{field} is not a many-to-many field")]
    NotManyToMany { model: String, field: String },
    #[error("{model}.{field} is a many-to-many field and is not stored on the row")]
    NotConcrete { model: String, field: String },
    #[error("invalid primary key for {model}: {reason}")]
    InvalidPrimaryKey { model: String, reason: String },
    #[error("row not found: {model} {pk}")]
    RowNotFound { model: String, pk: Pk },
    #[error("duplicate key {pk} in {table}")]
    DuplicateKey { table: String, pk: Pk },
    #[error("unique constraint on {table}.{field} violated by {value}")]
    UniqueViolation {
        table: String,
        field: String,
        value: String,
    },
    #[error("{table} row {pk}: {field} references missing key {missing}")]
    IntegrityViolation {
        table: String,
        pk: Pk,
        field: String,
        missing: String,
    },
    #[error("dependency cycle between models: {0:?}")]
    DependencyCycle(Vec<String>),
}

impl From<bson::error::Error> for EngineError {
    fn from(e: bson::error::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}
