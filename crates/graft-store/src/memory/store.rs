use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type ColumnFamily = OrdMap<Vec<u8>, Vec<u8>>;

type Families = HashMap<String, Arc<ArcSwap<ColumnFamily>>>;

/// In-memory store backed by persistent ordered maps.
///
/// Every transaction works on a structural-sharing snapshot of the column
/// families, so a rollback is just dropping the snapshot and a commit swaps
/// the touched families in one step.
pub struct MemoryStore {
    cfs: RwLock<Families>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cfs: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot all column families. Cheap due to imbl structural sharing.
    pub(crate) fn snapshot_cfs(&self) -> Result<HashMap<String, Arc<ColumnFamily>>, StoreError> {
        let cfs = self
            .cfs
            .read()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        Ok(cfs
            .iter()
            .map(|(name, arc)| (name.clone(), arc.load_full()))
            .collect())
    }

    /// Publish the column families written by a transaction.
    pub(crate) fn publish(
        &self,
        dirty: HashMap<String, Arc<ColumnFamily>>,
    ) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        for (name, data) in dirty {
            match cfs.get(&name) {
                Some(arc) => arc.store(data),
                None => {
                    cfs.insert(name, Arc::new(ArcSwap::new(data)));
                }
            }
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        // Writers queue here for the whole transaction; readers never block.
        let writer = if read_only {
            None
        } else {
            let guard = self
                .write_lock
                .lock()
                .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
            Some(guard)
        };
        Ok(MemoryTransaction::new(self, self.snapshot_cfs()?, writer))
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        cfs.entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self
            .cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        cfs.remove(name);
        Ok(())
    }
}
