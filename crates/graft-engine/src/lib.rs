//! Relational storage layer for graft.
//!
//! Rows of typed models live in a [`graft_store::Store`], one column family
//! per table. The [`Schema`] doubles as the type catalog consulted by the
//! copy pipeline: it knows every model, every field and what each relation
//! points at.

mod database;
mod error;
mod key;
mod nested;
mod row;
mod schema;
mod sort;
mod value;

pub use database::{Database, DbTransaction};
pub use error::{EngineError, SchemaError};
pub use nested::{ModelObjects, NestedObjects};
pub use row::{NewRow, Row};
pub use schema::{
    FieldDef, FieldKind, ModelDef, OnDelete, PkKind, RelationKind, Schema, TypeCatalog,
};
pub use sort::sort_dependencies;
pub use value::Pk;
