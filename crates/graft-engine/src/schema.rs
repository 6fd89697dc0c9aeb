use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, SchemaError};

// ── Field metadata ──────────────────────────────────────────

/// What happens to referencing rows when the target row goes away.
/// Only `Cascade` makes a relation part of a row's nested closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Protect,
    DoNothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain scalar column.
    Value,
    ForeignKey { target: String, on_delete: OnDelete },
    OneToOne { target: String, on_delete: OnDelete },
    /// Stored in a join table, not on the row.
    ManyToMany { target: String },
    /// A column holding another model's key that the relational layer does
    /// not manage (no constraint, no cascade).
    Reference { target: String },
}

/// Relation shape as seen by the copy pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    None,
    Single,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
}

impl FieldDef {
    pub fn value(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Value,
        }
    }

    pub fn foreign_key(name: &str, target: &str, on_delete: OnDelete) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::ForeignKey {
                target: target.to_string(),
                on_delete,
            },
        }
    }

    pub fn one_to_one(name: &str, target: &str, on_delete: OnDelete) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::OneToOne {
                target: target.to_string(),
                on_delete,
            },
        }
    }

    pub fn many_to_many(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::ManyToMany {
                target: target.to_string(),
            },
        }
    }

    pub fn reference(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Reference {
                target: target.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Value => None,
            FieldKind::ForeignKey { target, .. }
            | FieldKind::OneToOne { target, .. }
            | FieldKind::ManyToMany { target }
            | FieldKind::Reference { target } => Some(target),
        }
    }

    pub fn relation_kind(&self) -> RelationKind {
        match self.kind {
            FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => RelationKind::Single,
            FieldKind::ManyToMany { .. } => RelationKind::Collection,
            FieldKind::Value | FieldKind::Reference { .. } => RelationKind::None,
        }
    }

    /// Whether the value lives on the row itself.
    pub fn is_concrete(&self) -> bool {
        !matches!(self.kind, FieldKind::ManyToMany { .. })
    }

    /// Whether the field carries a constraint that the target row exists.
    pub fn is_constrained(&self) -> bool {
        self.relation_kind() != RelationKind::None
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, FieldKind::OneToOne { .. })
    }

    pub fn cascades(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::ForeignKey {
                on_delete: OnDelete::Cascade,
                ..
            } | FieldKind::OneToOne {
                on_delete: OnDelete::Cascade,
                ..
            }
        )
    }
}

// ── Model metadata ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkKind {
    /// Integer key drawn from a per-table sequence when not supplied.
    AutoInteger,
    /// Integer key that must always be supplied.
    Integer,
    /// String key, a fresh v4 UUID when not supplied.
    Uuid,
    /// String key that must always be supplied.
    String,
}

impl PkKind {
    pub fn is_integer(self) -> bool {
        matches!(self, PkKind::AutoInteger | PkKind::Integer)
    }
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    label: String,
    table: String,
    pk_kind: PkKind,
    fields: Vec<FieldDef>,
    natural_key: Option<Vec<String>>,
}

impl ModelDef {
    /// `label` is `"app.Model"`. The table name defaults to the label
    /// lower-cased with the dot replaced by an underscore.
    pub fn new(label: &str, pk_kind: PkKind) -> Self {
        Self {
            label: label.to_string(),
            table: label.to_lowercase().replace('.', "_"),
            pk_kind,
            fields: Vec::new(),
            natural_key: None,
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn natural_key(mut self, fields: &[&str]) -> Self {
        self.natural_key = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The part of the label before the dot.
    pub fn app_label(&self) -> &str {
        self.label
            .split_once('.')
            .map_or(self.label.as_str(), |(app, _)| app)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn pk_kind(&self) -> PkKind {
        self.pk_kind
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn concrete_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_concrete())
    }

    pub fn m2m_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_concrete())
    }

    pub fn natural_key_fields(&self) -> Option<&[String]> {
        self.natural_key.as_deref()
    }

    /// Join table backing a many-to-many field.
    pub fn m2m_table(&self, field: &str) -> String {
        format!("{}_{}", self.table, field.to_lowercase())
    }
}

// ── TypeCatalog ─────────────────────────────────────────────

/// Read-only view of the model registry, consumed by the copy pipeline.
pub trait TypeCatalog {
    /// All model labels in registration order.
    fn model_labels(&self) -> Vec<&str>;
    fn fields(&self, model: &str) -> Result<&[FieldDef], EngineError>;
    fn relation_kind(&self, model: &str, field: &str) -> Result<RelationKind, EngineError>;
    fn target(&self, model: &str, field: &str) -> Result<Option<&str>, EngineError>;
}

// ── Schema ──────────────────────────────────────────────────

/// The validated set of models a [`crate::Database`] stores.
#[derive(Debug, Clone)]
pub struct Schema {
    models: Vec<ModelDef>,
    by_label: HashMap<String, usize>,
}

impl Schema {
    pub fn new(models: Vec<ModelDef>) -> Result<Self, SchemaError> {
        let mut by_label = HashMap::with_capacity(models.len());
        for (i, model) in models.iter().enumerate() {
            if by_label.insert(model.label.clone(), i).is_some() {
                return Err(SchemaError::DuplicateModel(model.label.clone()));
            }
        }

        for model in &models {
            let mut names = HashSet::new();
            for field in &model.fields {
                if !names.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        model: model.label.clone(),
                        field: field.name.clone(),
                    });
                }
                if let Some(target) = field.target()
                    && !by_label.contains_key(target)
                {
                    return Err(SchemaError::UnknownTarget {
                        model: model.label.clone(),
                        field: field.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
            if let Some(natural_key) = &model.natural_key {
                for name in natural_key {
                    if !model.get_field(name).is_some_and(FieldDef::is_concrete) {
                        return Err(SchemaError::InvalidNaturalKey {
                            model: model.label.clone(),
                            field: name.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { models, by_label })
    }

    pub fn models(&self) -> &[ModelDef] {
        &self.models
    }

    pub fn model(&self, label: &str) -> Result<&ModelDef, EngineError> {
        self.by_label
            .get(label)
            .map(|&i| &self.models[i])
            .ok_or_else(|| EngineError::ModelNotFound(label.to_string()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    /// Every (model, field) pair whose target is `target`.
    pub fn referencing_fields<'s>(
        &'s self,
        target: &'s str,
    ) -> impl Iterator<Item = (&'s ModelDef, &'s FieldDef)> + 's {
        self.models.iter().flat_map(move |model| {
            model
                .fields
                .iter()
                .filter(move |f| f.target() == Some(target))
                .map(move |f| (model, f))
        })
    }

    /// Names of every model table, in registration order.
    pub fn tables(&self) -> Vec<String> {
        self.models.iter().map(|m| m.table.clone()).collect()
    }
}

impl TypeCatalog for Schema {
    fn model_labels(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.label.as_str()).collect()
    }

    fn fields(&self, model: &str) -> Result<&[FieldDef], EngineError> {
        Ok(self.model(model)?.fields())
    }

    fn relation_kind(&self, model: &str, field: &str) -> Result<RelationKind, EngineError> {
        let def = self.model(model)?;
        def.get_field(field)
            .map(FieldDef::relation_kind)
            .ok_or_else(|| EngineError::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            })
    }

    fn target(&self, model: &str, field: &str) -> Result<Option<&str>, EngineError> {
        let def = self.model(model)?;
        def.get_field(field)
            .map(FieldDef::target)
            .ok_or_else(|| EngineError::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            })
    }
}
