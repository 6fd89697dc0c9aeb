//! Fresh identifiers for a serialized closure.

use std::collections::{HashMap, HashSet};
use std::fmt;

use graft_engine::Pk;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::codec::SerializedRecord;
use crate::error::{ConfigError, CopyError};

const UUID_PATTERN: &str = r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

/// Which string values count as identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Lower-case dash-delimited hex, `8-4-4-4-12`.
    #[default]
    Uuid,
    /// A regex the whole value must match.
    Pattern(String),
}

#[derive(Debug, Clone)]
pub struct IdentifierMatcher {
    regex: Regex,
}

impl IdentifierMatcher {
    pub fn new(kind: &IdentifierKind) -> Result<Self, ConfigError> {
        let regex = match kind {
            IdentifierKind::Uuid => Regex::new(UUID_PATTERN)?,
            IdentifierKind::Pattern(pattern) => Regex::new(&format!("^(?:{pattern})$"))?,
        };
        Ok(Self { regex })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

// ── FieldGenerators ─────────────────────────────────────────

pub type Generator = Box<dyn Fn(&JsonValue) -> JsonValue + Send + Sync>;

/// Per-field value producers that replace the copied value outright.
#[derive(Default)]
pub struct FieldGenerators {
    generators: HashMap<(String, String), Generator>,
}

impl FieldGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, model: &str, field: &str, generator: F)
    where
        F: Fn(&JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.generators
            .insert((model.to_string(), field.to_string()), Box::new(generator));
    }

    pub fn get(&self, model: &str, field: &str) -> Option<&Generator> {
        self.generators.get(&(model.to_string(), field.to_string()))
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl fmt::Debug for FieldGenerators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .generators
            .keys()
            .map(|(model, field)| format!("{model}.{field}"))
            .collect();
        keys.sort();
        f.debug_struct("FieldGenerators").field("fields", &keys).finish()
    }
}

// ── RemapTable ──────────────────────────────────────────────

/// Old identifier → new identifier for every string key in a closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: HashMap<String, String>,
}

impl RemapTable {
    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    pub fn contains(&self, old: &str) -> bool {
        self.entries.contains_key(old)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn assign(&mut self, old: &str) {
        self.entries
            .insert(old.to_string(), uuid::Uuid::new_v4().to_string());
    }

    fn keep(&mut self, old: &str) {
        self.entries.insert(old.to_string(), old.to_string());
    }
}

// ── remap ───────────────────────────────────────────────────

/// Give every string-keyed record a fresh identifier and rewrite every
/// reference to it.
///
/// Records of `shared` models keep their identifiers, so copies keep
/// pointing at them. Integer keys are never touched. A string key that
/// `matcher` does not recognise is a [`CopyError::UnmatchedIdentifier`],
/// since references to it could not be found. A field value that looks
/// like an identifier but belongs to no record in `records` is a
/// [`CopyError::DanglingIdentifier`].
pub fn remap(
    mut records: Vec<SerializedRecord>,
    generators: &FieldGenerators,
    matcher: &IdentifierMatcher,
    shared: &HashSet<String>,
) -> Result<(Vec<SerializedRecord>, RemapTable), CopyError> {
    let mut table = RemapTable::default();
    for record in &records {
        let Some(Pk::Str(old)) = &record.pk else {
            continue;
        };
        if table.contains(old) {
            continue;
        }
        if shared.contains(&record.model) {
            table.keep(old);
        } else if matcher.matches(old) {
            table.assign(old);
        } else {
            return Err(CopyError::UnmatchedIdentifier {
                model: record.model.clone(),
                pk: old.clone(),
            });
        }
    }

    for record in &mut records {
        let SerializedRecord { model, pk, fields } = record;
        for (name, value) in fields.iter_mut() {
            if let Some(generate) = generators.get(model, name) {
                *value = generate(&*value);
                continue;
            }
            let dangling = |found: &str| CopyError::DanglingIdentifier {
                model: model.clone(),
                pk: pk.as_ref().map(Pk::to_string).unwrap_or_default(),
                field: name.clone(),
                value: found.to_string(),
            };
            if let JsonValue::Array(items) = value {
                for item in items.iter_mut() {
                    rewrite(item, &table, matcher).map_err(|v| dangling(&v))?;
                }
            } else {
                rewrite(value, &table, matcher).map_err(|v| dangling(&v))?;
            }
        }
    }

    for record in &mut records {
        if let Some(Pk::Str(old)) = &record.pk
            && let Some(new) = table.get(old)
        {
            record.pk = Some(Pk::Str(new.to_string()));
        }
    }

    debug!(records = records.len(), identifiers = table.len(), "remapped identifiers");
    Ok((records, table))
}

/// Swap an identifier-shaped string for its new value. Returns the value
/// back as the error when the table has no entry for it.
fn rewrite(
    value: &mut JsonValue,
    table: &RemapTable,
    matcher: &IdentifierMatcher,
) -> Result<(), String> {
    if let JsonValue::String(s) = value
        && matcher.matches(s)
    {
        match table.get(s) {
            Some(new) => *s = new.to_string(),
            None => return Err(s.clone()),
        }
    }
    Ok(())
}
