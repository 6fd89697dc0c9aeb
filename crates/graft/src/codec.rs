//! Structured-text form of rows.
//!
//! Records are `{ model, pk, fields }` objects. Single references hold the
//! target key, many-to-many fields hold an array of target keys, and with
//! natural keys enabled both hold natural-key arrays instead.

use bson::{Bson, Document};
use graft_engine::{DbTransaction, EngineError, ModelDef, Pk, RelationKind, Row};
use graft_store::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{model} has no field {field}")]
    UnknownField { model: String, field: String },
    #[error("{model}.{field}: {reason}")]
    InvalidValue {
        model: String,
        field: String,
        reason: String,
    },
    #[error("{model}.{field}: {value} does not resolve to a {target}")]
    UnresolvedReference {
        model: String,
        field: String,
        target: String,
        value: JsonValue,
    },
    #[error("bson: {0}")]
    Bson(#[from] bson::error::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub format: Format,
    pub use_natural_foreign_keys: bool,
    pub use_natural_primary_keys: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<Pk>,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

// ── Serialization ───────────────────────────────────────────

pub fn serialize<S: Store>(
    txn: &DbTransaction<'_, S>,
    rows: &[Row],
    options: &SerializeOptions,
) -> Result<String, CodecError> {
    render(&to_records(txn, rows, options)?, options.format)
}

/// Convert rows to records, reading many-to-many values and natural keys
/// through `txn`.
pub fn to_records<S: Store>(
    txn: &DbTransaction<'_, S>,
    rows: &[Row],
    options: &SerializeOptions,
) -> Result<Vec<SerializedRecord>, CodecError> {
    let schema = txn.schema();
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let model = schema.model(&row.model)?;
        let pk = if options.use_natural_primary_keys && model.natural_key_fields().is_some() {
            None
        } else {
            Some(row.pk.clone())
        };

        let mut fields = Map::new();
        for field in model.fields() {
            let value = match (field.relation_kind(), field.target()) {
                (RelationKind::Single, Some(target)) => {
                    let value = row.get(field.name()).unwrap_or(&Bson::Null);
                    match Pk::from_bson(value) {
                        Some(pk) if options.use_natural_foreign_keys => {
                            reference_to_json(txn, target, &pk)?
                        }
                        _ => bson_to_json(value),
                    }
                }
                (RelationKind::Collection, Some(target)) => {
                    let mut items = Vec::new();
                    for pk in txn.m2m_targets(&row.model, &row.pk, field.name())? {
                        items.push(if options.use_natural_foreign_keys {
                            reference_to_json(txn, target, &pk)?
                        } else {
                            pk_to_json(&pk)
                        });
                    }
                    JsonValue::Array(items)
                }
                _ => bson_to_json(row.get(field.name()).unwrap_or(&Bson::Null)),
            };
            fields.insert(field.name().to_string(), value);
        }

        records.push(SerializedRecord {
            model: row.model.clone(),
            pk,
            fields,
        });
    }
    Ok(records)
}

/// A reference as the target's natural key, or its plain key when the
/// target has no natural key or the row is gone.
fn reference_to_json<S: Store>(
    txn: &DbTransaction<'_, S>,
    target: &str,
    pk: &Pk,
) -> Result<JsonValue, CodecError> {
    let model = txn.schema().model(target)?;
    if let Some(names) = model.natural_key_fields()
        && let Some(row) = txn.get(target, pk)?
    {
        let values = names
            .iter()
            .map(|name| bson_to_json(row.get(name).unwrap_or(&Bson::Null)))
            .collect();
        return Ok(JsonValue::Array(values));
    }
    Ok(pk_to_json(pk))
}

pub fn render(records: &[SerializedRecord], format: Format) -> Result<String, CodecError> {
    Ok(match format {
        Format::Json => serde_json::to_string(records)?,
        Format::Yaml => serde_yaml::to_string(records)?,
    })
}

pub fn parse(text: &str, format: Format) -> Result<Vec<SerializedRecord>, CodecError> {
    Ok(match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Yaml => serde_yaml::from_str(text)?,
    })
}

// ── Deserialization ─────────────────────────────────────────

/// A record turned back into engine values, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct DeserializedObject {
    pub model: String,
    pub pk: Option<Pk>,
    /// Concrete field values.
    pub fields: Document,
    /// Many-to-many values, written once the row exists.
    pub m2m: Vec<(String, Vec<Pk>)>,
    /// Natural-key references that did not resolve yet.
    pub deferred_fields: Vec<(String, JsonValue)>,
}

/// Values of deferred fields once every record of the load is in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    pub fields: Document,
    pub m2m: Vec<(String, Vec<Pk>)>,
}

pub fn build_object<S: Store>(
    txn: &DbTransaction<'_, S>,
    record: &SerializedRecord,
) -> Result<DeserializedObject, CodecError> {
    let model = txn.schema().model(&record.model)?;
    let mut object = DeserializedObject {
        model: record.model.clone(),
        pk: record.pk.clone(),
        fields: Document::new(),
        m2m: Vec::new(),
        deferred_fields: Vec::new(),
    };

    for (name, value) in &record.fields {
        let field = model
            .get_field(name)
            .ok_or_else(|| CodecError::UnknownField {
                model: model.label().to_string(),
                field: name.clone(),
            })?;
        match (field.relation_kind(), field.target()) {
            (RelationKind::Single, Some(target)) if !value.is_null() => {
                match resolve_reference(txn, model, name, target, value)? {
                    Some(pk) => {
                        object.fields.insert(name.as_str(), pk.to_bson());
                    }
                    None => object.deferred_fields.push((name.clone(), value.clone())),
                }
            }
            (RelationKind::Collection, Some(target)) => {
                match resolve_collection(txn, model, name, target, value)? {
                    Some(pks) => object.m2m.push((name.clone(), pks)),
                    None => object.deferred_fields.push((name.clone(), value.clone())),
                }
            }
            _ => {
                object.fields.insert(name.as_str(), json_to_bson(value)?);
            }
        }
    }

    if object.pk.is_none()
        && let Some(values) = natural_key_values(model, &object.fields)
        && let Some(existing) = txn.get_by_natural_key(model.label(), &values)?
    {
        object.pk = Some(existing.pk);
    }
    Ok(object)
}

/// Second pass over `object`'s deferred fields. Anything still unresolved
/// is an error.
pub fn resolve_deferred<S: Store>(
    txn: &DbTransaction<'_, S>,
    object: &DeserializedObject,
) -> Result<ResolvedFields, CodecError> {
    let model = txn.schema().model(&object.model)?;
    let mut resolved = ResolvedFields::default();

    for (name, value) in &object.deferred_fields {
        let field = model
            .get_field(name)
            .ok_or_else(|| CodecError::UnknownField {
                model: model.label().to_string(),
                field: name.clone(),
            })?;
        let Some(target) = field.target() else {
            continue;
        };
        let unresolved = || CodecError::UnresolvedReference {
            model: model.label().to_string(),
            field: name.clone(),
            target: target.to_string(),
            value: value.clone(),
        };
        if field.relation_kind() == RelationKind::Collection {
            let pks = resolve_collection(txn, model, name, target, value)?.ok_or_else(unresolved)?;
            resolved.m2m.push((name.clone(), pks));
        } else {
            let pk = resolve_reference(txn, model, name, target, value)?.ok_or_else(unresolved)?;
            resolved.fields.insert(name.as_str(), pk.to_bson());
        }
    }
    Ok(resolved)
}

/// `Ok(None)` when `value` is a natural key with no matching row yet.
fn resolve_reference<S: Store>(
    txn: &DbTransaction<'_, S>,
    model: &ModelDef,
    field: &str,
    target: &str,
    value: &JsonValue,
) -> Result<Option<Pk>, CodecError> {
    match value {
        JsonValue::Array(keys) => {
            let values = keys
                .iter()
                .map(json_to_bson)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(txn.get_by_natural_key(target, &values)?.map(|row| row.pk))
        }
        JsonValue::Number(n) => n.as_i64().map(Pk::Int).map(Some).ok_or_else(|| {
            CodecError::InvalidValue {
                model: model.label().to_string(),
                field: field.to_string(),
                reason: format!("{n} is not an integer key"),
            }
        }),
        JsonValue::String(s) => Ok(Some(Pk::Str(s.clone()))),
        other => Err(CodecError::InvalidValue {
            model: model.label().to_string(),
            field: field.to_string(),
            reason: format!("{other} is not a reference to {target}"),
        }),
    }
}

fn resolve_collection<S: Store>(
    txn: &DbTransaction<'_, S>,
    model: &ModelDef,
    field: &str,
    target: &str,
    value: &JsonValue,
) -> Result<Option<Vec<Pk>>, CodecError> {
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Null => return Ok(Some(Vec::new())),
        other => {
            return Err(CodecError::InvalidValue {
                model: model.label().to_string(),
                field: field.to_string(),
                reason: format!("expected a list, got {other}"),
            });
        }
    };
    let mut pks = Vec::with_capacity(items.len());
    for item in items {
        match resolve_reference(txn, model, field, target, item)? {
            Some(pk) => pks.push(pk),
            None => return Ok(None),
        }
    }
    Ok(Some(pks))
}

fn natural_key_values(model: &ModelDef, fields: &Document) -> Option<Vec<Bson>> {
    let names = model.natural_key_fields()?;
    names.iter().map(|name| fields.get(name).cloned()).collect()
}

// ── Value conversion ────────────────────────────────────────

fn pk_to_json(pk: &Pk) -> JsonValue {
    match pk {
        Pk::Int(i) => JsonValue::from(*i),
        Pk::Str(s) => JsonValue::String(s.clone()),
    }
}

/// Relaxed extended JSON, so dates, object ids and binaries survive the
/// trip through text.
pub(crate) fn bson_to_json(value: &Bson) -> JsonValue {
    value.clone().into_relaxed_extjson()
}

pub(crate) fn json_to_bson(value: &JsonValue) -> Result<Bson, CodecError> {
    Ok(Bson::try_from(value.clone())?)
}
