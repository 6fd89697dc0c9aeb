#![allow(dead_code)]

use graft_engine::{Database, FieldDef, ModelDef, OnDelete, PkKind, Schema};
use graft_store::MemoryStore;

pub fn forum_schema() -> Schema {
    Schema::new(vec![
        ModelDef::new("forum.Forum", PkKind::Uuid).field(FieldDef::value("name")),
        ModelDef::new("forum.Post", PkKind::Uuid)
            .field(FieldDef::foreign_key("forum", "forum.Forum", OnDelete::Cascade))
            .field(FieldDef::value("body"))
            .field(FieldDef::many_to_many("tags", "forum.Tag")),
        ModelDef::new("forum.Comment", PkKind::Uuid)
            .field(FieldDef::foreign_key("post", "forum.Post", OnDelete::Cascade))
            .field(FieldDef::foreign_key("reply_to", "forum.Comment", OnDelete::SetNull))
            .field(FieldDef::value("body")),
        ModelDef::new("forum.Profile", PkKind::AutoInteger)
            .field(FieldDef::one_to_one("forum", "forum.Forum", OnDelete::Cascade))
            .field(FieldDef::value("motto")),
        ModelDef::new("forum.Tag", PkKind::AutoInteger)
            .field(FieldDef::value("name"))
            .natural_key(&["name"]),
    ])
    .unwrap()
}

pub fn forum_db() -> Database<MemoryStore> {
    Database::open(MemoryStore::new(), forum_schema()).unwrap()
}
