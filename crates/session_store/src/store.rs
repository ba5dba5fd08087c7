use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use agent_provider::Role;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::schema::SnapshotRecord;

/// Snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the snapshot. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<SnapshotRecord>, SessionStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot on disk");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SessionStoreError::io("reading snapshot", &self.path, source));
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value = serde_json::from_str::<Value>(&raw).map_err(|source| {
            SessionStoreError::JsonParse {
                path: self.path.clone(),
                source,
            }
        })?;
        let Value::Array(items) = value else {
            return Err(SessionStoreError::NotAnArray {
                path: self.path.clone(),
            });
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| parse_record(&self.path, index, item))
            .collect()
    }

    /// Replaces the snapshot with `records`.
    ///
    /// The file is written to a sibling temp file and renamed into place, so a
    /// crash mid-write leaves the previous snapshot intact.
    pub fn save(&self, records: &[SnapshotRecord]) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating snapshot directory", parent, source)
            })?;
        }

        let body = serde_json::to_vec_pretty(records)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;

        let temp_path = self.temp_path();
        let write_result = fs::File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(&body)?;
                file.write_all(b"\n")?;
                file.sync_all()
            })
            .map_err(|source| SessionStoreError::io("writing snapshot", &temp_path, source));
        if let Err(error) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }

        fs::rename(&temp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            SessionStoreError::io("replacing snapshot", &self.path, source)
        })?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "snapshot saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history.json".to_string());
        self.path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()))
    }
}

fn parse_record(path: &Path, index: usize, item: Value) -> Result<SnapshotRecord, SessionStoreError> {
    let record = serde_json::from_value::<SnapshotRecord>(item).map_err(|source| {
        SessionStoreError::InvalidRecord {
            path: path.to_path_buf(),
            index,
            source,
        }
    })?;

    if Role::parse(&record.role).is_none() {
        return Err(SessionStoreError::UnknownRole {
            path: path.to_path_buf(),
            index,
            role: record.role,
        });
    }

    if OffsetDateTime::parse(&record.timestamp, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            index,
            value: record.timestamp,
        });
    }

    Ok(record)
}
