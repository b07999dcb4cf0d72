//! JSON-file payment store.
//!
//! The whole store lives in one JSON document that is rewritten (temp file +
//! rename) on every change. One mutex guards both the in-memory copy and the
//! write, so cursor reads and advances are single-writer.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use payhist_common::cursor::SyncCursor;
use payhist_common::payment::PaymentRecord;
use payhist_common::store::{PaymentStore, StoreError, StoreState};
use tracing::{info, warn};

pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = load_state(&path)?;
        info!(
            "Loaded {} payments (cursor: sent={}, settle_index={}) from {}",
            state.payments.len(),
            state.cursor.last_sent_payment_timestamp,
            state.cursor.last_settle_index,
            path.display()
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the state and commit it only once it is on disk.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut StoreState) -> Result<(bool, T), StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let (changed, out) = change(&mut next)?;
        if changed {
            save_state(&self.path, &next)?;
            *state = next;
        }
        Ok(out)
    }
}

impl PaymentStore for JsonFileStore {
    fn add_payment(
        &self,
        record: &PaymentRecord,
        settle_index: u64,
        sent_timestamp: i64,
    ) -> Result<bool, StoreError> {
        self.update(|state| state.apply_payment(record, settle_index, sent_timestamp))
    }

    fn has_payment(&self, payment_hash: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().payments.contains_key(payment_hash))
    }

    fn payments(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self.state.lock().payments.values().cloned().collect())
    }

    fn cursor(&self) -> Result<SyncCursor, StoreError> {
        Ok(self.state.lock().cursor)
    }

    fn save_payment_request(
        &self,
        payment_hash: &str,
        payment_request: &str,
    ) -> Result<(), StoreError> {
        self.update(|state| {
            let previous = state
                .payment_requests
                .insert(payment_hash.to_string(), payment_request.to_string());
            Ok((previous.as_deref() != Some(payment_request), ()))
        })
    }

    fn payment_request(&self, payment_hash: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().payment_requests.get(payment_hash).cloned())
    }

    fn reset(&self) -> Result<(), StoreError> {
        warn!("Resetting payment history at {}", self.path.display());
        self.update(|state| {
            *state = StoreState::default();
            Ok((true, ()))
        })
    }
}

fn load_state(path: &Path) -> Result<StoreState, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
        Err(e) => Err(StoreError::Io(format!("read {}: {}", path.display(), e))),
    }
}

fn save_state(path: &Path, state: &StoreState) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(format!("mkdir: {}", e)))?;
    }
    let data =
        serde_json::to_vec_pretty(state).map_err(|e| StoreError::Io(format!("serialize: {}", e)))?;
    let tmp = path.with_extension("json.tmp");
    write_synced(&tmp, &data).map_err(|e| StoreError::Io(format!("write: {}", e)))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::Io(format!("rename: {}", e)))?;
    sync_parent(path).map_err(|e| StoreError::Io(format!("sync dir: {}", e)))?;
    Ok(())
}

/// Write `data` to `path` and flush it to disk before returning.
fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Persist the rename itself.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
