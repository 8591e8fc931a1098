//! JSON document persistence.
//!
//! Documents are replaced by writing a sibling temp file and renaming it over
//! the target, so a crash mid-write leaves the previous document intact.
//! The write and fsync run on tokio's blocking pool.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::error::PersistError;

/// Outcome of reading a document from disk.
#[derive(Debug)]
pub enum Loaded<T> {
    /// No document exists yet.
    Missing,
    /// The document was read and decoded.
    Found(T),
    /// The document exists but could not be read or decoded.
    Corrupt(String),
}

/// Read and decode a JSON document.
///
/// An empty file is treated the same as a missing one.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Loaded<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Loaded::Missing,
        Err(e) => return Loaded::Corrupt(e.to_string()),
    };

    if contents.trim().is_empty() {
        return Loaded::Missing;
    }

    match serde_json::from_str(&contents) {
        Ok(value) => Loaded::Found(value),
        Err(e) => Loaded::Corrupt(e.to_string()),
    }
}

/// Serialize `value` and atomically replace the document at `path`.
pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let contents = serde_json::to_vec_pretty(value)?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
        .await
        .unwrap_or_else(|e| Err(io::Error::new(ErrorKind::Other, e)))
        .map_err(|source| PersistError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.json");
    let pid = std::process::id();

    for attempt in 0..10u32 {
        let temp_path = parent.join(format!(".{}.tmp-{}-{}", file_name, pid, attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                let written = file
                    .write_all(contents)
                    .and_then(|_| file.sync_all())
                    .and_then(|_| fs::rename(&temp_path, path));
                if written.is_err() {
                    let _ = fs::remove_file(&temp_path);
                }
                return written;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to create temp file",
    ))
}
