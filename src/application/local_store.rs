// Local fallback store - key/value persistence used when the backend is unreachable
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store contents are not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Whole-value reads and writes; there are no partial updates
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
