#![cfg(feature = "memory")]

use graft_store::{MemoryCf, MemoryStore, MemoryTransaction, Store, StoreError, Transaction};

const CF: &str = "test";

fn mem_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_cf(CF).unwrap();
    store
}

#[test]
fn put_and_get() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"key1", b"value1").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let result = txn.get(&cf, b"key1").unwrap().unwrap();
    assert_eq!(&*result, b"value1");
}

#[test]
fn transaction_and_handle_types_are_exported() {
    let store = mem_store();
    let txn: MemoryTransaction<'_> = store.begin(true).unwrap();
    let cf: MemoryCf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"key1").unwrap().is_none());
}

#[test]
fn get_missing_key_returns_none() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"nonexistent").unwrap().is_none());
}

#[test]
fn unknown_column_family_is_an_error() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    assert!(matches!(
        txn.cf("nope"),
        Err(StoreError::ColumnFamilyNotFound(name)) if name == "nope"
    ));
}

#[test]
fn writes_are_visible_inside_the_transaction() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"a", b"1").unwrap();
    assert_eq!(txn.get(&cf, b"a").unwrap().as_deref(), Some(&b"1"[..]));
    txn.delete(&cf, b"a").unwrap();
    assert!(txn.get(&cf, b"a").unwrap().is_none());
    txn.rollback().unwrap();
}

#[test]
fn rollback_discards_writes() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"key1", b"value1").unwrap();
    txn.rollback().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"key1").unwrap().is_none());
}

#[test]
fn dropped_transaction_discards_writes() {
    let store = mem_store();
    {
        let txn = store.begin(false).unwrap();
        let cf = txn.cf(CF).unwrap();
        txn.put(&cf, b"key1", b"value1").unwrap();
    }

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(txn.get(&cf, b"key1").unwrap().is_none());
}

#[test]
fn read_only_rejects_writes() {
    let store = mem_store();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    assert!(matches!(txn.put(&cf, b"k", b"v"), Err(StoreError::ReadOnly)));
    assert!(matches!(txn.delete(&cf, b"k"), Err(StoreError::ReadOnly)));
}

#[test]
fn read_snapshot_is_stable_across_commits() {
    let store = mem_store();
    let reader = store.begin(true).unwrap();
    let reader_cf = reader.cf(CF).unwrap();

    let writer = store.begin(false).unwrap();
    let cf = writer.cf(CF).unwrap();
    writer.put(&cf, b"key1", b"value1").unwrap();
    writer.commit().unwrap();

    assert!(reader.get(&reader_cf, b"key1").unwrap().is_none());
}

#[test]
fn multi_get_preserves_order() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"a", b"1").unwrap();
    txn.put(&cf, b"c", b"3").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let got = txn.multi_get(&cf, &[&b"c"[..], &b"b"[..], &b"a"[..]]).unwrap();
    assert_eq!(got, vec![Some(b"3".to_vec()), None, Some(b"1".to_vec())]);
}

#[test]
fn scan_prefix_returns_matching_pairs() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"accounts:1:email", b"a@test.com").unwrap();
    txn.put(&cf, b"accounts:1:name", b"Alice").unwrap();
    txn.put(&cf, b"accounts:2:email", b"b@test.com").unwrap();
    txn.put(&cf, b"other:1:foo", b"bar").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let entries: Vec<_> = txn
        .scan_prefix(&cf, b"accounts:1:")
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(&*entries[0].0, b"accounts:1:email");
    assert_eq!(&*entries[1].0, b"accounts:1:name");
    assert_eq!(&*entries[1].1, b"Alice");
}

#[test]
fn scan_empty_prefix_returns_everything() {
    let store = mem_store();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    txn.put(&cf, b"b", b"2").unwrap();
    txn.put(&cf, b"a", b"1").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf(CF).unwrap();
    let keys: Vec<_> = txn
        .scan_prefix(&cf, b"")
        .unwrap()
        .map(|r| r.unwrap().0)
        .collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn create_cf_inside_transaction_is_published_on_commit() {
    let store = MemoryStore::new();
    let mut txn = store.begin(false).unwrap();
    txn.create_cf("fresh").unwrap();
    let cf = txn.cf("fresh").unwrap();
    txn.put(&cf, b"k", b"v").unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf("fresh").unwrap();
    assert_eq!(txn.get(&cf, b"k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn drop_cf_removes_family() {
    let store = mem_store();
    store.drop_cf(CF).unwrap();
    let txn = store.begin(true).unwrap();
    assert!(txn.cf(CF).is_err());
}
