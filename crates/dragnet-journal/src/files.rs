use crate::entry::StatusData;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::spawn_blocking;
use uuid::Uuid;

pub const STATUS_FILE_SUFFIX: &str = ".status.json";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("corrupt journal entry for {key}: {detail}")]
    Corrupt { key: String, detail: String },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("journal error: {0}")]
    Other(String),
}

pub fn status_path(directory: &Path, key: &str) -> PathBuf {
    directory.join(format!("{key}{STATUS_FILE_SUFFIX}"))
}

/// Loads one task's journal entry. Returns `None` when the task has never
/// been admitted; unparseable content is an error, not an absence.
pub async fn load(directory: &Path, key: &str) -> Result<Option<StatusData>, JournalError> {
    let directory = directory.to_path_buf();
    let key = key.to_string();
    run_blocking(move || load_sync(&directory, &key)).await
}

/// Persists one task's journal entry as indented JSON. The write goes to
/// a temp file on the same filesystem and is renamed into place, so a
/// concurrent reader sees either the old content or the new content.
pub async fn save(directory: &Path, key: &str, status: &StatusData) -> Result<(), JournalError> {
    let directory = directory.to_path_buf();
    let key = key.to_string();
    let body = serde_json::to_vec_pretty(status)
        .map_err(|e| JournalError::Other(format!("serialize entry for {key}: {e}")))?;
    run_blocking(move || {
        let path = status_path(&directory, &key);
        atomic_write(&path, &body)
    })
    .await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptEntry {
    pub key: String,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub entries: Vec<StatusData>,
    pub corrupt: Vec<CorruptEntry>,
}

/// Loads every `*.status.json` entry in the directory, sorted by key.
/// Corrupt files are returned alongside the good entries and logged;
/// they are never silently dropped.
pub async fn scan(directory: &Path) -> Result<ScanOutcome, JournalError> {
    let directory = directory.to_path_buf();
    run_blocking(move || {
        let mut keys = Vec::new();
        let dir_iter = match fs::read_dir(&directory) {
            Ok(iter) => iter,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ScanOutcome::default());
            }
            Err(e) => return Err(io_err(e)),
        };
        for dir_entry in dir_iter {
            let dir_entry = dir_entry.map_err(io_err)?;
            let file_name = dir_entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(key) = file_name.strip_suffix(STATUS_FILE_SUFFIX) {
                keys.push(key.to_string());
            }
        }
        keys.sort();

        let mut outcome = ScanOutcome::default();
        for key in keys {
            match load_sync(&directory, &key) {
                Ok(Some(entry)) => outcome.entries.push(entry),
                Ok(None) => {}
                Err(JournalError::Corrupt { key, detail }) => {
                    tracing::warn!(%key, %detail, "corrupt journal entry");
                    outcome.corrupt.push(CorruptEntry { key, detail });
                }
                Err(other) => return Err(other),
            }
        }
        Ok(outcome)
    })
    .await
}

fn load_sync(directory: &Path, key: &str) -> Result<Option<StatusData>, JournalError> {
    let path = status_path(directory, key);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
    };
    let status = serde_json::from_slice(&raw).map_err(|e| JournalError::Corrupt {
        key: key.to_string(),
        detail: e.to_string(),
    })?;
    Ok(Some(status))
}

fn atomic_write(path: &Path, body: &[u8]) -> Result<(), JournalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = PathBuf::from(format!("{}.tmp-{}", path.to_string_lossy(), Uuid::new_v4()));
    fs::write(&tmp, body).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

async fn run_blocking<T, F>(f: F) -> Result<T, JournalError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, JournalError> + Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| JournalError::Other(format!("blocking task join error: {e}")))?
}

fn io_err(error: std::io::Error) -> JournalError {
    JournalError::Io(error.to_string())
}
