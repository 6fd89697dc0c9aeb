use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard};

use crate::error::StoreError;
use crate::store::{KvIter, Transaction};

use super::store::{ColumnFamily, MemoryStore};

/// Column family handle for the memory backend: just the family's name.
/// Reads resolve it against the transaction's working copy.
#[derive(Clone, Debug)]
pub struct MemoryCf {
    pub(crate) name: String,
}

/// A transaction's private copy of the store plus the families it wrote.
struct Working {
    families: HashMap<String, Arc<ColumnFamily>>,
    touched: HashSet<String>,
}

impl Working {
    fn family(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.families
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
    }

    fn family_mut(&mut self, name: &str) -> Result<&mut ColumnFamily, StoreError> {
        let family = self
            .families
            .get_mut(name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))?;
        self.touched.insert(name.to_string());
        Ok(Arc::make_mut(family))
    }
}

pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    /// `None` once committed or rolled back.
    working: RefCell<Option<Working>>,
    read_only: bool,
    _writer: Option<MutexGuard<'a, ()>>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(
        store: &'a MemoryStore,
        families: HashMap<String, Arc<ColumnFamily>>,
        writer: Option<MutexGuard<'a, ()>>,
    ) -> Self {
        Self {
            store,
            working: RefCell::new(Some(Working {
                families,
                touched: HashSet::new(),
            })),
            read_only: writer.is_none(),
            _writer: writer,
        }
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Working) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let working = self.working.borrow();
        f(working.as_ref().ok_or(StoreError::TransactionConsumed)?)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Working) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let mut working = self.working.borrow_mut();
        f(working.as_mut().ok_or(StoreError::TransactionConsumed)?)
    }
}

impl Transaction for MemoryTransaction<'_> {
    type Cf = MemoryCf;

    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError> {
        self.read(|working| working.family(name).map(|_| ()))?;
        Ok(MemoryCf {
            name: name.to_string(),
        })
    }

    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(|working| Ok(working.family(&cf.name)?.get(key).cloned()))
    }

    fn multi_get(
        &self,
        cf: &Self::Cf,
        keys: &[&[u8]],
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.read(|working| {
            let family = working.family(&cf.name)?;
            Ok(keys.iter().map(|key| family.get(*key).cloned()).collect())
        })
    }

    fn scan_prefix<'b>(&'b self, cf: &Self::Cf, prefix: &[u8]) -> Result<KvIter<'b>, StoreError> {
        // Materialised up front; the working copy is only borrowed for the call.
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self.read(|working| {
            Ok(working
                .family(&cf.name)?
                .range(prefix.to_vec()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect())
        })?;
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write(|working| {
            working
                .family_mut(&cf.name)?
                .insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError> {
        self.write(|working| {
            working.family_mut(&cf.name)?.remove(key);
            Ok(())
        })
    }

    fn create_cf(&mut self, name: &str) -> Result<(), StoreError> {
        self.write(|working| {
            working
                .families
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ColumnFamily::new()));
            working.touched.insert(name.to_string());
            Ok(())
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        let Working { families, touched } = self
            .working
            .into_inner()
            .ok_or(StoreError::TransactionConsumed)?;
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let changed: HashMap<String, Arc<ColumnFamily>> = families
            .into_iter()
            .filter(|(name, _)| touched.contains(name))
            .collect();
        if changed.is_empty() {
            return Ok(());
        }
        self.store.publish(changed)
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.working
            .into_inner()
            .map(drop)
            .ok_or(StoreError::TransactionConsumed)
    }
}
