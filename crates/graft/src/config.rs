use graft_engine::{ModelDef, Schema};
use serde::{Deserialize, Serialize};

use crate::codec::{Format, SerializeOptions};
use crate::error::ConfigError;
use crate::remap::{IdentifierKind, IdentifierMatcher};

/// Storage alias copies are written through unless configured otherwise.
pub const DEFAULT_ALIAS: &str = "default";

/// Settings shared by every copy a [`crate::Copier`] runs.
///
/// Every field has a default, so a config file only needs to name what it
/// changes:
///
/// ```yaml
/// format: yaml
/// excluded_models: [forum.Tag]
/// regenerate_integer_pks: [forum.Membership]
/// identifiers:
///   pattern: "[a-z]{3}-[0-9]{6}"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub format: Format,
    /// Storage alias handed to the router.
    pub using: String,
    /// Apps whose records are never written by the loader.
    pub excluded_apps: Vec<String>,
    /// Models whose records are never written by the loader.
    pub excluded_models: Vec<String>,
    pub use_natural_foreign_keys: bool,
    pub use_natural_primary_keys: bool,
    /// Integer-keyed models whose copies get fresh keys from storage.
    pub regenerate_integer_pks: Vec<String>,
    /// Dangling models pulled into every copy, on top of per-call ones.
    pub dangling_models: Vec<String>,
    pub identifiers: IdentifierKind,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            using: DEFAULT_ALIAS.to_string(),
            excluded_apps: Vec::new(),
            excluded_models: Vec::new(),
            use_natural_foreign_keys: false,
            use_natural_primary_keys: false,
            regenerate_integer_pks: Vec::new(),
            dangling_models: Vec::new(),
            identifiers: IdentifierKind::default(),
        }
    }
}

impl CopyConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check the config against the models `schema` registers.
    ///
    /// A model whose integer keys get regenerated must not be the target of
    /// any relation: its copies would come back under keys nothing points at.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        let listed = [
            ("excluded_models", &self.excluded_models),
            ("regenerate_integer_pks", &self.regenerate_integer_pks),
            ("dangling_models", &self.dangling_models),
        ];
        for (setting, labels) in listed {
            if let Some(unknown) = labels.iter().find(|label| !schema.contains(label)) {
                return Err(ConfigError::UnknownModel {
                    setting,
                    model: unknown.clone(),
                });
            }
        }

        for label in &self.regenerate_integer_pks {
            let Ok(model) = schema.model(label) else {
                continue;
            };
            if !model.pk_kind().is_integer() {
                return Err(ConfigError::NonIntegerKey(label.clone()));
            }
            if let Some((owner, field)) = schema.referencing_fields(label).next() {
                return Err(ConfigError::ReferencedIntegerKey {
                    model: label.clone(),
                    referenced_by: format!("{}.{}", owner.label(), field.name()),
                });
            }
        }

        IdentifierMatcher::new(&self.identifiers)?;
        Ok(())
    }

    /// Whether the loader leaves records of `model` alone.
    pub fn is_excluded(&self, model: &ModelDef) -> bool {
        self.excluded_apps.iter().any(|app| app == model.app_label())
            || self.excluded_models.iter().any(|m| m == model.label())
    }

    pub fn regenerates_pk(&self, model: &str) -> bool {
        self.regenerate_integer_pks.iter().any(|m| m == model)
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            format: self.format,
            use_natural_foreign_keys: self.use_natural_foreign_keys,
            use_natural_primary_keys: self.use_natural_primary_keys,
        }
    }
}
