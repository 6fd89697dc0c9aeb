mod common;

use graft::{AllowAll, CopyConfig, CopyError, Loader};
use graft_engine::{EngineError, NewRow, Pk};
use serde_json::json;

use common::{count, forum_db, row, rows};

const FORUM: &str = "6f1c1f52-3a8e-4f0e-9a57-0c2b6b5f6c01";
const CHILD: &str = "0a3e2b7c-91d4-4c55-8f0e-2d7d4b9e1a02";
const TOP: &str = "c4b8a6f0-5d2e-4b1a-9c3f-7e6d5a4b3c03";

fn natural_config() -> CopyConfig {
    CopyConfig {
        use_natural_foreign_keys: true,
        ..CopyConfig::default()
    }
}

#[test]
fn forward_natural_references_are_deferred() {
    let db = forum_db();
    let text = json!([
        {"model": "forum.Forum", "pk": FORUM, "fields": {"name": "rust"}},
        {"model": "forum.Category", "pk": CHILD,
         "fields": {"forum": FORUM, "parent": ["top"], "slug": "child"}},
        {"model": "forum.Category", "pk": TOP,
         "fields": {"forum": FORUM, "parent": null, "slug": "top"}},
    ])
    .to_string();

    let config = natural_config();
    let report = Loader::new(&db, &config, &AllowAll).load(&text).unwrap();

    assert_eq!(report.inserted.len(), 3);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.stored_pk(1), Some(&Pk::from(CHILD)));
    assert_eq!(
        row(&db, "forum.Category", &Pk::from(CHILD)).reference("parent"),
        Some(Pk::from(TOP))
    );
}

#[test]
fn unresolvable_natural_reference_fails_the_load() {
    let db = forum_db();
    let text = json!([
        {"model": "forum.Forum", "pk": FORUM, "fields": {"name": "rust"}},
        {"model": "forum.Category", "pk": CHILD,
         "fields": {"forum": FORUM, "parent": ["nowhere"], "slug": "child"}},
    ])
    .to_string();

    let config = natural_config();
    let err = Loader::new(&db, &config, &AllowAll).load(&text).unwrap_err();
    assert!(matches!(err, CopyError::Codec(_)), "{err}");
    assert_eq!(count(&db, "forum.Forum"), 0);
    assert_eq!(count(&db, "forum.Category"), 0);
}

#[test]
fn natural_primary_key_adopts_existing_row_and_collides() {
    let db = forum_db();
    let mut txn = db.begin(false).unwrap();
    txn.insert(NewRow::new("forum.Tag").field("name", "rust"))
        .unwrap();
    txn.commit().unwrap();

    let config = CopyConfig {
        use_natural_primary_keys: true,
        ..CopyConfig::default()
    };
    let loader = Loader::new(&db, &config, &AllowAll);

    let err = loader
        .load(r#"[{"model": "forum.Tag", "fields": {"name": "rust"}}]"#)
        .unwrap_err();
    assert!(matches!(
        err,
        CopyError::Engine(EngineError::DuplicateKey { .. })
    ));

    let report = loader
        .load(r#"[{"model": "forum.Tag", "fields": {"name": "db"}}]"#)
        .unwrap();
    assert_eq!(report.inserted[0].serialized_pk, None);
    assert_eq!(report.inserted[0].pk, Pk::Int(2));
    assert_eq!(count(&db, "forum.Tag"), 2);
}

#[test]
fn excluded_apps_are_skipped() {
    let db = forum_db();
    let config = CopyConfig {
        excluded_apps: vec!["forum".into()],
        ..CopyConfig::default()
    };
    let text =
        json!([{"model": "forum.Forum", "pk": FORUM, "fields": {"name": "rust"}}]).to_string();

    let report = Loader::new(&db, &config, &AllowAll).load(&text).unwrap();
    assert!(report.inserted.is_empty());
    assert_eq!(report.skipped, 1);
    assert!(rows(&db, "forum.Forum").is_empty());
}

#[test]
fn existing_keys_are_never_overwritten() {
    let db = forum_db();
    let config = CopyConfig::default();
    let loader = Loader::new(&db, &config, &AllowAll);
    let text =
        json!([{"model": "forum.Forum", "pk": FORUM, "fields": {"name": "rust"}}]).to_string();
    loader.load(&text).unwrap();

    let renamed =
        json!([{"model": "forum.Forum", "pk": FORUM, "fields": {"name": "go"}}]).to_string();
    let err = loader.load(&renamed).unwrap_err();
    assert!(matches!(
        err,
        CopyError::Engine(EngineError::DuplicateKey { .. })
    ));
    assert_eq!(
        row(&db, "forum.Forum", &Pk::from(FORUM)).get_str("name"),
        Some("rust")
    );
}
