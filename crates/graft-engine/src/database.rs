use std::collections::BTreeSet;
use std::sync::Arc;

use bson::{Bson, Document};
use graft_store::{Store, Transaction};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::key::{decode_join_key, decode_pk, encode_pk, join_key, join_prefix, sequence_key};
use crate::row::{NewRow, Row, decode_row, encode_row};
use crate::schema::{FieldDef, ModelDef, PkKind, Schema};
use crate::value::{Pk, same_value};

pub const SYS_CF: &str = "_sys";

// ── Database ────────────────────────────────────────────────

pub struct Database<S: Store> {
    store: S,
    schema: Arc<Schema>,
}

impl<S: Store> Database<S> {
    /// Open a database over `store`, creating a column family for every
    /// table and join table in `schema`.
    pub fn open(store: S, schema: Schema) -> Result<Self, EngineError> {
        store.create_cf(SYS_CF)?;
        for model in schema.models() {
            store.create_cf(model.table_name())?;
            for field in model.m2m_fields() {
                store.create_cf(&model.m2m_table(field.name()))?;
            }
        }
        Ok(Self {
            store,
            schema: Arc::new(schema),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn begin(&self, read_only: bool) -> Result<DbTransaction<'_, S>, EngineError> {
        let txn = self.store.begin(read_only)?;
        Ok(DbTransaction {
            txn,
            schema: &self.schema,
            checks_enabled: true,
        })
    }

    /// Run `f` in a write transaction. Commits when `f` succeeds, rolls
    /// back every write when it fails.
    pub fn atomic<'d, T, E>(
        &'d self,
        f: impl FnOnce(&mut DbTransaction<'d, S>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<EngineError>,
    {
        let mut txn = self.begin(false)?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Validate references in `tables` against committed data.
    pub fn check_constraints(&self, tables: &[String]) -> Result<(), EngineError> {
        let txn = self.begin(true)?;
        let result = txn.check_constraints(tables);
        txn.rollback()?;
        result
    }
}

// ── DbTransaction ───────────────────────────────────────────

pub struct DbTransaction<'a, S: Store + 'a> {
    txn: S::Txn<'a>,
    schema: &'a Schema,
    checks_enabled: bool,
}

impl<'a, S: Store + 'a> DbTransaction<'a, S> {
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    fn model(&self, label: &str) -> Result<&'a ModelDef, EngineError> {
        self.schema.model(label)
    }

    fn field<'m>(&self, model: &'m ModelDef, name: &str) -> Result<&'m FieldDef, EngineError> {
        model
            .get_field(name)
            .ok_or_else(|| EngineError::UnknownField {
                model: model.label().to_string(),
                field: name.to_string(),
            })
    }

    fn m2m_field<'m>(
        &self,
        model: &'m ModelDef,
        name: &str,
    ) -> Result<&'m FieldDef, EngineError> {
        let field = self.field(model, name)?;
        if field.is_concrete() {
            return Err(EngineError::NotManyToMany {
                model: model.label().to_string(),
                field: name.to_string(),
            });
        }
        Ok(field)
    }

    // ── Reads ───────────────────────────────────────────────

    pub fn get(&self, model: &str, pk: &Pk) -> Result<Option<Row>, EngineError> {
        let def = self.model(model)?;
        let cf = self.txn.cf(def.table_name())?;
        match self.txn.get(&cf, &encode_pk(pk))? {
            Some(bytes) => Ok(Some(decode_row(def.label(), &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, model: &str, pk: &Pk) -> Result<bool, EngineError> {
        let def = self.model(model)?;
        let cf = self.txn.cf(def.table_name())?;
        Ok(self.txn.get(&cf, &encode_pk(pk))?.is_some())
    }

    /// Fetch every row of `model` whose key is in `pks`. Missing keys are
    /// ignored; duplicates are fetched once. Rows come back in key order.
    pub fn get_many(&self, model: &str, pks: &[Pk]) -> Result<Vec<Row>, EngineError> {
        let def = self.model(model)?;
        let cf = self.txn.cf(def.table_name())?;
        let keys: BTreeSet<Vec<u8>> = pks.iter().map(encode_pk).collect();
        let refs: Vec<&[u8]> = keys.iter().map(Vec::as_slice).collect();
        let mut rows = Vec::with_capacity(refs.len());
        for bytes in self.txn.multi_get(&cf, &refs)?.into_iter().flatten() {
            rows.push(decode_row(def.label(), &bytes)?);
        }
        Ok(rows)
    }

    pub fn scan(&self, model: &str) -> Result<Vec<Row>, EngineError> {
        let def = self.model(model)?;
        let cf = self.txn.cf(def.table_name())?;
        let mut rows = Vec::new();
        for entry in self.txn.scan_prefix(&cf, &[])? {
            let (_, bytes) = entry?;
            rows.push(decode_row(def.label(), &bytes)?);
        }
        Ok(rows)
    }

    /// Rows of `model` whose concrete `field` equals `value`.
    pub fn filter_eq(
        &self,
        model: &str,
        field: &str,
        value: &Bson,
    ) -> Result<Vec<Row>, EngineError> {
        let def = self.model(model)?;
        self.field(def, field)?;
        Ok(self
            .scan(model)?
            .into_iter()
            .filter(|row| row.get(field).is_some_and(|v| same_value(v, value)))
            .collect())
    }

    /// Look a row up by the values of its model's natural key fields.
    /// Models without a natural key never match.
    pub fn get_by_natural_key(
        &self,
        model: &str,
        values: &[Bson],
    ) -> Result<Option<Row>, EngineError> {
        let def = self.model(model)?;
        let Some(names) = def.natural_key_fields() else {
            return Ok(None);
        };
        if names.len() != values.len() {
            return Ok(None);
        }
        Ok(self.scan(model)?.into_iter().find(|row| {
            names
                .iter()
                .zip(values)
                .all(|(name, want)| row.get(name).is_some_and(|v| same_value(v, want)))
        }))
    }

    pub fn m2m_targets(&self, model: &str, pk: &Pk, field: &str) -> Result<Vec<Pk>, EngineError> {
        let def = self.model(model)?;
        self.m2m_field(def, field)?;
        let cf = self.txn.cf(&def.m2m_table(field))?;
        let prefix = join_prefix(pk);
        let mut targets = Vec::new();
        for entry in self.txn.scan_prefix(&cf, &prefix)? {
            let (key, _) = entry?;
            let target = decode_pk(&key[prefix.len()..]).ok_or_else(|| {
                EngineError::Encoding(format!(
                    "malformed join key in {}",
                    def.m2m_table(field)
                ))
            })?;
            targets.push(target);
        }
        Ok(targets)
    }

    // ── Writes ──────────────────────────────────────────────

    /// Insert a brand-new row. Never overwrites: an existing key is a
    /// `DuplicateKey` error. Returns the key the row was stored under.
    pub fn insert(&mut self, row: NewRow) -> Result<Pk, EngineError> {
        let def = self.model(&row.model)?;
        self.validate_fields(def, &row.fields)?;

        let pk = match row.pk {
            Some(pk) => {
                self.validate_pk(def, &pk)?;
                if let Pk::Int(i) = pk {
                    self.advance_sequence(def, i)?;
                }
                pk
            }
            None => self.generate_pk(def)?,
        };

        let cf = self.txn.cf(def.table_name())?;
        let key = encode_pk(&pk);
        if self.txn.get(&cf, &key)?.is_some() {
            return Err(EngineError::DuplicateKey {
                table: def.table_name().to_string(),
                pk,
            });
        }

        // Every concrete field is materialised, in declaration order.
        let mut fields = Document::new();
        for field in def.concrete_fields() {
            let value = row.fields.get(field.name()).cloned().unwrap_or(Bson::Null);
            fields.insert(field.name(), value);
        }

        self.check_unique(def, &pk, &fields)?;
        if self.checks_enabled {
            self.check_row_references(def, &pk, &fields)?;
        }

        self.txn.put(&cf, &key, &encode_row(&pk, &fields)?)?;
        debug!(model = def.label(), pk = %pk, "inserted row");
        Ok(pk)
    }

    /// Overwrite some concrete fields of an existing row.
    pub fn update_fields(
        &mut self,
        model: &str,
        pk: &Pk,
        updates: Document,
    ) -> Result<(), EngineError> {
        let def = self.model(model)?;
        self.validate_fields(def, &updates)?;
        let mut row = self.get(model, pk)?.ok_or_else(|| EngineError::RowNotFound {
            model: model.to_string(),
            pk: pk.clone(),
        })?;
        for (name, value) in updates {
            row.fields.insert(name, value);
        }

        self.check_unique(def, pk, &row.fields)?;
        if self.checks_enabled {
            self.check_row_references(def, pk, &row.fields)?;
        }

        let cf = self.txn.cf(def.table_name())?;
        self.txn.put(&cf, &encode_pk(pk), &encode_row(pk, &row.fields)?)?;
        Ok(())
    }

    /// Replace the targets of a many-to-many field on an existing row.
    pub fn set_m2m(
        &mut self,
        model: &str,
        pk: &Pk,
        field: &str,
        targets: &[Pk],
    ) -> Result<(), EngineError> {
        let def = self.model(model)?;
        let field_def = self.m2m_field(def, field)?;
        if !self.exists(model, pk)? {
            return Err(EngineError::RowNotFound {
                model: model.to_string(),
                pk: pk.clone(),
            });
        }
        if self.checks_enabled
            && let Some(target_model) = field_def.target()
        {
            for target in targets {
                if !self.exists(target_model, target)? {
                    return Err(EngineError::IntegrityViolation {
                        table: def.m2m_table(field),
                        pk: pk.clone(),
                        field: field.to_string(),
                        missing: target.to_string(),
                    });
                }
            }
        }

        let cf = self.txn.cf(&def.m2m_table(field))?;
        let stale: Vec<Vec<u8>> = self
            .txn
            .scan_prefix(&cf, &join_prefix(pk))?
            .map(|r| r.map(|(k, _)| k))
            .collect::<Result<_, _>>()?;
        for key in stale {
            self.txn.delete(&cf, &key)?;
        }
        for target in targets {
            self.txn.put(&cf, &join_key(pk, target), &[])?;
        }
        Ok(())
    }

    // ── Constraints ─────────────────────────────────────────

    pub fn constraint_checks_enabled(&self) -> bool {
        self.checks_enabled
    }

    /// Run `f` with reference checks relaxed, restoring the previous
    /// setting afterwards whether or not `f` succeeds. Uniqueness and
    /// primary-key collisions are still enforced.
    pub fn with_constraint_checks_disabled<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let previous = self.checks_enabled;
        self.checks_enabled = false;
        let result = f(self);
        self.checks_enabled = previous;
        result
    }

    /// Verify every single reference and join row of the models stored in
    /// `tables`. Returns the first violation found.
    pub fn check_constraints(&self, tables: &[String]) -> Result<(), EngineError> {
        for def in self.schema.models() {
            if !tables.iter().any(|t| t == def.table_name()) {
                continue;
            }
            for row in self.scan(def.label())? {
                self.check_row_references(def, &row.pk, &row.fields)?;
            }
            for field in def.m2m_fields() {
                let Some(target_model) = field.target() else {
                    continue;
                };
                let table = def.m2m_table(field.name());
                let cf = self.txn.cf(&table)?;
                for entry in self.txn.scan_prefix(&cf, &[])? {
                    let (key, _) = entry?;
                    let (owner, target) = decode_join_key(&key).ok_or_else(|| {
                        EngineError::Encoding(format!("malformed join key in {table}"))
                    })?;
                    if !self.exists(def.label(), &owner)? {
                        return Err(EngineError::IntegrityViolation {
                            table,
                            pk: owner.clone(),
                            field: field.name().to_string(),
                            missing: owner.to_string(),
                        });
                    }
                    if !self.exists(target_model, &target)? {
                        return Err(EngineError::IntegrityViolation {
                            table,
                            pk: owner,
                            field: field.name().to_string(),
                            missing: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_row_references(
        &self,
        def: &ModelDef,
        pk: &Pk,
        fields: &Document,
    ) -> Result<(), EngineError> {
        for field in def.concrete_fields().filter(|f| f.is_constrained()) {
            let Some(target_model) = field.target() else {
                continue;
            };
            let value = match fields.get(field.name()) {
                None | Some(Bson::Null) => continue,
                Some(value) => value,
            };
            let resolved = match Pk::from_bson(value) {
                Some(target) => self.exists(target_model, &target)?,
                None => false,
            };
            if !resolved {
                return Err(EngineError::IntegrityViolation {
                    table: def.table_name().to_string(),
                    pk: pk.clone(),
                    field: field.name().to_string(),
                    missing: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_unique(&self, def: &ModelDef, pk: &Pk, fields: &Document) -> Result<(), EngineError> {
        for field in def.concrete_fields().filter(|f| f.is_unique()) {
            let value = match fields.get(field.name()) {
                None | Some(Bson::Null) => continue,
                Some(value) => value,
            };
            let clash = self
                .filter_eq(def.label(), field.name(), value)?
                .into_iter()
                .any(|row| &row.pk != pk);
            if clash {
                return Err(EngineError::UniqueViolation {
                    table: def.table_name().to_string(),
                    field: field.name().to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Keys ────────────────────────────────────────────────

    fn validate_fields(&self, def: &ModelDef, fields: &Document) -> Result<(), EngineError> {
        for name in fields.keys() {
            let field = self.field(def, name)?;
            if !field.is_concrete() {
                return Err(EngineError::NotConcrete {
                    model: def.label().to_string(),
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_pk(&self, def: &ModelDef, pk: &Pk) -> Result<(), EngineError> {
        if def.pk_kind().is_integer() != pk.is_int() {
            return Err(EngineError::InvalidPrimaryKey {
                model: def.label().to_string(),
                reason: format!("{:?} key cannot hold {pk:?}", def.pk_kind()),
            });
        }
        Ok(())
    }

    fn generate_pk(&self, def: &ModelDef) -> Result<Pk, EngineError> {
        match def.pk_kind() {
            PkKind::AutoInteger => {
                let next = self.current_sequence(def)? + 1;
                self.advance_sequence(def, next)?;
                Ok(Pk::Int(next))
            }
            PkKind::Uuid => Ok(Pk::from(uuid::Uuid::new_v4())),
            PkKind::Integer | PkKind::String => Err(EngineError::InvalidPrimaryKey {
                model: def.label().to_string(),
                reason: "key must be supplied".into(),
            }),
        }
    }

    fn current_sequence(&self, def: &ModelDef) -> Result<i64, EngineError> {
        let sys = self.txn.cf(SYS_CF)?;
        match self.txn.get(&sys, &sequence_key(def.table_name()))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    EngineError::Encoding(format!("malformed sequence for {}", def.table_name()))
                })?;
                Ok(i64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Make sure generated keys never reuse `used`.
    fn advance_sequence(&self, def: &ModelDef, used: i64) -> Result<(), EngineError> {
        if used <= self.current_sequence(def)? {
            return Ok(());
        }
        let sys = self.txn.cf(SYS_CF)?;
        self.txn
            .put(&sys, &sequence_key(def.table_name()), &used.to_be_bytes())?;
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────

    pub fn commit(self) -> Result<(), EngineError> {
        Ok(self.txn.commit()?)
    }

    pub fn rollback(self) -> Result<(), EngineError> {
        Ok(self.txn.rollback()?)
    }
}
