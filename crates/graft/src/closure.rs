//! Everything a copy of one row has to carry along.

use graft_engine::{
    DbTransaction, ModelObjects, NestedObjects, Pk, RelationKind, Row, TypeCatalog,
    sort_dependencies,
};
use graft_store::Store;
use tracing::debug;

use crate::error::CopyError;

/// Rows to copy along with `root`, grouped by model.
///
/// The closure is everything that cascades from `root`, plus, for each
/// dangling type, the rows of that type the closure references (and what
/// cascades from those). Rows of `excluded` models are left out unless the
/// model is also dangling.
pub fn collect_closure<S: Store>(
    txn: &DbTransaction<'_, S>,
    root: &Row,
    excluded: &[String],
    dangling: &[String],
    use_natural_foreign_keys: bool,
) -> Result<Vec<Row>, CopyError> {
    let schema = txn.schema();
    let mut related = NestedObjects::new(txn).collect([root.clone()])?;

    let mut dumped: Vec<String> = schema
        .model_labels()
        .into_iter()
        .filter(|label| !excluded.iter().any(|e| e == *label))
        .map(String::from)
        .collect();
    if use_natural_foreign_keys {
        dumped = sort_dependencies(schema, &dumped, true)?;
    }

    for model in dangling {
        let referenced = referenced_objects_of_type(txn, schema, &related, model)?;
        debug!(model = %model, rows = referenced.len(), "pulled in dangling rows");
        related.extend(referenced);
        if !dumped.contains(model) {
            dumped.push(model.clone());
        }
    }

    let rows: Vec<Row> = dumped
        .iter()
        .flat_map(|model| related.rows(model).iter().cloned())
        .collect();
    debug!(rows = rows.len(), models = dumped.len(), "collected closure");
    Ok(rows)
}

/// Rows of `model` that anything in `related` points at, with everything
/// that cascades from them.
pub fn referenced_objects_of_type<S: Store, C: TypeCatalog>(
    txn: &DbTransaction<'_, S>,
    catalog: &C,
    related: &ModelObjects,
    model: &str,
) -> Result<ModelObjects, CopyError> {
    let mut edges = Vec::new();
    for owner in catalog.model_labels() {
        for field in catalog.fields(owner)? {
            if catalog.target(owner, field.name())? != Some(model) {
                continue;
            }
            match catalog.relation_kind(owner, field.name())? {
                RelationKind::None => {
                    return Err(CopyError::UnsupportedRelation {
                        model: owner.to_string(),
                        field: field.name().to_string(),
                    });
                }
                kind => edges.push((owner, field.name(), kind)),
            }
        }
    }

    let mut ids: Vec<Pk> = Vec::new();
    for (owner, field, kind) in edges {
        for row in related.rows(owner) {
            if kind == RelationKind::Collection {
                ids.extend(txn.m2m_targets(owner, &row.pk, field)?);
            } else if let Some(pk) = row.reference(field) {
                ids.push(pk);
            }
        }
    }

    let rows = txn.get_many(model, &ids)?;
    Ok(NestedObjects::new(txn).collect(rows)?)
}
