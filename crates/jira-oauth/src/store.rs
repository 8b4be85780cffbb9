//! Token persistence.
//!
//! A [`TokenStore`] keeps at most one record per consumer key. Saving a
//! record whose consumer key is already stored updates that entry in place
//! and carries its id over to the record.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};

use crate::error::{StoreError, ValidationError};
use crate::token::{TokenId, TokenRecord};

/// Persistence backend for token records.
pub trait TokenStore: Send + Sync {
    /// Look up the record stored for a consumer key.
    fn find_by_consumer_key(&self, consumer_key: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Create or update the record for its consumer key.
    ///
    /// Assigns the stored id to `record`.
    fn save(&self, record: &mut TokenRecord) -> Result<(), StoreError>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn find_by_consumer_key(&self, consumer_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        (**self).find_by_consumer_key(consumer_key)
    }

    fn save(&self, record: &mut TokenRecord) -> Result<(), StoreError> {
        (**self).save(record)
    }
}

/// Store that keeps nothing.
///
/// Default store type of [`Authorizer`](crate::Authorizer); lookups always
/// miss and saves succeed without effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTokenStore;

impl TokenStore for NullTokenStore {
    fn find_by_consumer_key(&self, _consumer_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(None)
    }

    fn save(&self, _record: &mut TokenRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Insert or replace `record` in `records`, assigning ids like a table with
/// an auto-increment key.
fn upsert(records: &mut Vec<TokenRecord>, record: &mut TokenRecord) -> Result<(), StoreError> {
    let invalid = |e: ValidationError| StoreError::Backend(format!("cannot assign id: {e}"));

    if let Some(pos) = records
        .iter()
        .position(|r| r.consumer_key() == record.consumer_key())
    {
        if let Some(id) = records[pos].id().cloned() {
            record.set_id(id).map_err(invalid)?;
        }
        records[pos] = record.clone();
        return Ok(());
    }

    if record.id().is_none() {
        let next = records
            .iter()
            .filter_map(|r| match r.id() {
                Some(TokenId::Int(n)) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;
        record.set_id(TokenId::Int(next)).map_err(invalid)?;
    }
    records.push(record.clone());
    Ok(())
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<Vec<TokenRecord>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored records.
    pub fn records(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.records
            .read()
            .map(|records| records.clone())
            .map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("token store lock poisoned".to_owned())
}

impl TokenStore for MemoryTokenStore {
    fn find_by_consumer_key(&self, consumer_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .find(|r| r.consumer_key() == consumer_key)
            .cloned())
    }

    fn save(&self, record: &mut TokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        upsert(&mut records, record)
    }
}

/// One lock per absolute file path, shared by every store in the process.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Mutex::default);

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = FILE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

/// Store backed by a JSON file holding an array of records.
///
/// Each save rewrites the file through a temporary file in the same
/// directory followed by a rename. Stores opened on the same path within
/// one process share a lock; other processes are not coordinated.
#[derive(Debug)]
pub struct JsonFileTokenStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileTokenStore {
    /// Use the file at `path`. It is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = file_lock(&path);
        Self { path, lock }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<TokenRecord>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, records: &[TokenRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, records)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl TokenStore for JsonFileTokenStore {
    fn find_by_consumer_key(&self, consumer_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        Ok(self
            .load()?
            .into_iter()
            .find(|r| r.consumer_key() == consumer_key))
    }

    fn save(&self, record: &mut TokenRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut records = self.load()?;
        let mut updated = record.clone();
        upsert(&mut records, &mut updated)?;
        self.write(&records)?;
        tracing::debug!(path = %self.path.display(), "Saved token record");
        *record = updated;
        Ok(())
    }
}
