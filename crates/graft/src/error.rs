use graft_engine::{EngineError, Pk};

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("{setting} names unknown model {model}")]
    UnknownModel { setting: &'static str, model: String },
    #[error("{0} is listed for key regeneration but does not have an integer key")]
    NonIntegerKey(String),
    #[error("{model} is listed for key regeneration but is referenced by {referenced_by}")]
    ReferencedIntegerKey { model: String, referenced_by: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("unsupported relation kind on {model}.{field}")]
    UnsupportedRelation { model: String, field: String },
    #[error("{model} {pk}: {field} holds identifier {value} that is not part of the copy")]
    DanglingIdentifier {
        model: String,
        pk: String,
        field: String,
        value: String,
    },
    #[error(
        "{model} key {pk} does not look like an identifier; \
         configure an identifier pattern that matches it"
    )]
    UnmatchedIdentifier { model: String, pk: String },
    #[error("copy of {model} {pk} was not inserted")]
    RootNotCopied { model: String, pk: Pk },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
