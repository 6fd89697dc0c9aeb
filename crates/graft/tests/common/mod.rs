#![allow(dead_code)]

use std::collections::HashSet;

use bson::Bson;
use graft_engine::{Database, FieldDef, ModelDef, NewRow, OnDelete, Pk, PkKind, Row, Schema};
use graft_store::MemoryStore;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn forum_models() -> Vec<ModelDef> {
    vec![
        ModelDef::new("forum.Forum", PkKind::Uuid).field(FieldDef::value("name")),
        ModelDef::new("forum.Post", PkKind::Uuid)
            .field(FieldDef::foreign_key("forum", "forum.Forum", OnDelete::Cascade))
            .field(FieldDef::value("slug"))
            .field(FieldDef::value("body"))
            .field(FieldDef::many_to_many("tags", "forum.Tag"))
            .field(FieldDef::many_to_many("labels", "forum.Label")),
        ModelDef::new("forum.Comment", PkKind::Uuid)
            .field(FieldDef::foreign_key("post", "forum.Post", OnDelete::Cascade))
            .field(FieldDef::foreign_key("reply_to", "forum.Comment", OnDelete::SetNull))
            .field(FieldDef::value("body")),
        ModelDef::new("forum.Tag", PkKind::AutoInteger)
            .field(FieldDef::value("name"))
            .natural_key(&["name"]),
        ModelDef::new("forum.Label", PkKind::Uuid).field(FieldDef::value("name")),
        ModelDef::new("forum.Membership", PkKind::AutoInteger)
            .field(FieldDef::foreign_key("forum", "forum.Forum", OnDelete::Cascade))
            .field(FieldDef::value("member")),
        ModelDef::new("forum.Category", PkKind::Uuid)
            .field(FieldDef::foreign_key("forum", "forum.Forum", OnDelete::Cascade))
            .field(FieldDef::foreign_key("parent", "forum.Category", OnDelete::SetNull))
            .field(FieldDef::value("slug"))
            .natural_key(&["slug"]),
    ]
}

pub fn forum_db() -> Database<MemoryStore> {
    Database::open(MemoryStore::new(), Schema::new(forum_models()).unwrap()).unwrap()
}

/// A forum with two posts and three comments, one of them a reply.
pub struct Seed {
    pub forum: Pk,
    pub posts: Vec<Pk>,
    pub comments: Vec<Pk>,
}

pub fn seed_forum(db: &Database<MemoryStore>) -> Seed {
    let mut txn = db.begin(false).unwrap();
    let forum = txn
        .insert(NewRow::new("forum.Forum").field("name", "rust"))
        .unwrap();
    let mut posts = Vec::new();
    for slug in ["a", "b"] {
        posts.push(
            txn.insert(
                NewRow::new("forum.Post")
                    .field("forum", forum.clone())
                    .field("slug", slug)
                    .field("body", format!("post {slug}")),
            )
            .unwrap(),
        );
    }
    let question = txn
        .insert(
            NewRow::new("forum.Comment")
                .field("post", posts[0].clone())
                .field("body", "why?"),
        )
        .unwrap();
    let answer = txn
        .insert(
            NewRow::new("forum.Comment")
                .field("post", posts[0].clone())
                .field("reply_to", question.clone())
                .field("body", "because"),
        )
        .unwrap();
    let other = txn
        .insert(
            NewRow::new("forum.Comment")
                .field("post", posts[1].clone())
                .field("body", "nice"),
        )
        .unwrap();
    txn.commit().unwrap();

    Seed {
        forum,
        posts,
        comments: vec![question, answer, other],
    }
}

pub fn row(db: &Database<MemoryStore>, model: &str, pk: &Pk) -> Row {
    let txn = db.begin(true).unwrap();
    txn.get(model, pk).unwrap().unwrap()
}

pub fn rows(db: &Database<MemoryStore>, model: &str) -> Vec<Row> {
    let txn = db.begin(true).unwrap();
    txn.scan(model).unwrap()
}

pub fn count(db: &Database<MemoryStore>, model: &str) -> usize {
    rows(db, model).len()
}

/// Rows of `model` whose `field` points at `pk`.
pub fn children(db: &Database<MemoryStore>, model: &str, field: &str, pk: &Pk) -> Vec<Row> {
    let txn = db.begin(true).unwrap();
    txn.filter_eq(model, field, &Bson::from(pk)).unwrap()
}

pub fn m2m(db: &Database<MemoryStore>, model: &str, pk: &Pk, field: &str) -> HashSet<Pk> {
    let txn = db.begin(true).unwrap();
    txn.m2m_targets(model, pk, field).unwrap().into_iter().collect()
}

pub fn keys(rows: &[Row]) -> HashSet<Pk> {
    rows.iter().map(|row| row.pk.clone()).collect()
}
