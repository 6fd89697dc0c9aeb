//! Deep copy of a record and its relational closure.
//!
//! A copy runs in three stages:
//!
//! 1. [`closure`] walks the cascade graph from the root and pulls in any
//!    dangling models referenced from it;
//! 2. [`remap`] gives every string-keyed record a fresh identifier and
//!    rewrites every reference to match;
//! 3. [`loader`] inserts the rewritten records as new rows in a single
//!    transaction, then re-checks referential integrity.
//!
//! [`Copier`] strings the stages together:
//!
//! ```rust,ignore
//! let copy = Copier::new(&db, CopyConfig::default())
//!     .deep_copy(&forum, &CopyOptions::new().dangling("forum.Tag"))?;
//! ```

pub mod closure;
pub mod codec;
mod config;
mod copy;
mod error;
pub mod loader;
pub mod remap;
mod router;

pub use codec::{CodecError, Format, SerializedRecord};
pub use config::{CopyConfig, DEFAULT_ALIAS};
pub use copy::{Copier, CopyOptions, deep_copy};
pub use error::{ConfigError, CopyError};
pub use loader::{InsertedRecord, LoadReport, Loader};
pub use remap::{FieldGenerators, IdentifierKind, IdentifierMatcher, RemapTable};
pub use router::{AllowAll, Router};
