use std::collections::HashSet;

use crate::error::EngineError;
use crate::schema::Schema;

/// Order `labels` so that each model follows the models it references
/// through natural keys.
///
/// Only relations whose target defines a natural key create a dependency,
/// since only those are serialized as lookups that need the target loaded
/// first. With `allow_cycles`, a cycle is broken by emitting the most
/// recently skipped model and ignoring its remaining dependencies.
pub fn sort_dependencies(
    schema: &Schema,
    labels: &[String],
    allow_cycles: bool,
) -> Result<Vec<String>, EngineError> {
    let requested: HashSet<&str> = labels.iter().map(String::as_str).collect();

    let mut pending: Vec<(String, Vec<String>)> = Vec::with_capacity(labels.len());
    for label in labels {
        let model = schema.model(label)?;
        let mut deps = Vec::new();
        for field in model.fields() {
            let Some(target) = field.target() else {
                continue;
            };
            if target == label {
                continue;
            }
            if schema.model(target)?.natural_key_fields().is_some() {
                deps.push(target.to_string());
            }
        }
        pending.push((label.clone(), deps));
    }
    // Popped from the back, so reverse to keep the input order stable.
    pending.reverse();

    let mut sorted: Vec<String> = Vec::with_capacity(labels.len());
    while !pending.is_empty() {
        let mut skipped = Vec::new();
        let mut changed = false;
        while let Some((label, deps)) = pending.pop() {
            let ready = deps
                .iter()
                .all(|d| !requested.contains(d.as_str()) || sorted.contains(d));
            if ready {
                sorted.push(label);
                changed = true;
            } else {
                skipped.push((label, deps));
            }
        }
        if !changed {
            if !allow_cycles {
                let mut stuck: Vec<String> = skipped.into_iter().map(|(l, _)| l).collect();
                stuck.sort();
                return Err(EngineError::DependencyCycle(stuck));
            }
            if let Some((label, _)) = skipped.pop() {
                sorted.push(label);
            }
        }
        skipped.reverse();
        pending = skipped;
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, ModelDef, OnDelete, PkKind};

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dependents_follow_natural_key_targets() {
        let schema = Schema::new(vec![
            ModelDef::new("shop.Order", PkKind::Uuid).field(FieldDef::foreign_key(
                "customer",
                "shop.Customer",
                OnDelete::Cascade,
            )),
            ModelDef::new("shop.Customer", PkKind::Uuid)
                .field(FieldDef::value("email"))
                .natural_key(&["email"]),
        ])
        .unwrap();

        let sorted =
            sort_dependencies(&schema, &labels(&["shop.Order", "shop.Customer"]), false).unwrap();
        assert_eq!(sorted, labels(&["shop.Customer", "shop.Order"]));
    }

    #[test]
    fn targets_without_natural_keys_do_not_reorder() {
        let schema = Schema::new(vec![
            ModelDef::new("a.Child", PkKind::Uuid).field(FieldDef::foreign_key(
                "parent",
                "a.Parent",
                OnDelete::Cascade,
            )),
            ModelDef::new("a.Parent", PkKind::Uuid),
        ])
        .unwrap();

        let input = labels(&["a.Child", "a.Parent"]);
        assert_eq!(sort_dependencies(&schema, &input, false).unwrap(), input);
    }

    fn cyclic() -> Schema {
        Schema::new(vec![
            ModelDef::new("c.A", PkKind::Uuid)
                .field(FieldDef::value("name"))
                .field(FieldDef::foreign_key("b", "c.B", OnDelete::SetNull))
                .natural_key(&["name"]),
            ModelDef::new("c.B", PkKind::Uuid)
                .field(FieldDef::value("name"))
                .field(FieldDef::foreign_key("a", "c.A", OnDelete::SetNull))
                .natural_key(&["name"]),
        ])
        .unwrap()
    }

    #[test]
    fn cycles_fail_unless_allowed() {
        let schema = cyclic();
        let input = labels(&["c.A", "c.B"]);
        assert!(matches!(
            sort_dependencies(&schema, &input, false),
            Err(EngineError::DependencyCycle(stuck)) if stuck == input
        ));

        let sorted = sort_dependencies(&schema, &input, true).unwrap();
        assert_eq!(sorted.len(), 2);
        assert!(sorted.contains(&"c.A".to_string()));
        assert!(sorted.contains(&"c.B".to_string()));
    }
}
