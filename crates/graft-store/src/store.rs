use crate::error::StoreError;

/// Owned key/value pairs yielded by a scan, in key order.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

/// A byte-oriented store made of named column families.
pub trait Store {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// Start a transaction. Write transactions are exclusive; read-only
    /// transactions see a snapshot taken at `begin`.
    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError>;
    fn create_cf(&self, name: &str) -> Result<(), StoreError>;
    fn drop_cf(&self, name: &str) -> Result<(), StoreError>;
}

/// Reads see the transaction's own writes. Nothing is visible to other
/// transactions until `commit`; dropping without committing discards.
pub trait Transaction {
    /// Cheaply cloneable column family handle.
    type Cf: Clone;

    /// Look up a column family; fails if it does not exist.
    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError>;

    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    /// One result per key, in the order given.
    fn multi_get(&self, cf: &Self::Cf, keys: &[&[u8]])
    -> Result<Vec<Option<Vec<u8>>>, StoreError>;
    /// Pairs whose key starts with `prefix`. An empty prefix scans the
    /// whole family.
    fn scan_prefix<'a>(&'a self, cf: &Self::Cf, prefix: &[u8]) -> Result<KvIter<'a>, StoreError>;

    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError>;
    fn create_cf(&mut self, name: &str) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}
