/// Failures raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transaction already consumed")]
    TransactionConsumed,

    #[error("cannot write in a read-only transaction")]
    ReadOnly,

    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}
