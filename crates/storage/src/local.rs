use std::{
    ffi::OsString,
    io::ErrorKind,
    path::PathBuf,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use occupancy::SeatCollection;
use shared::domain::{Seat, SeatLabel};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{SeatStore, StoreError};

/// Device-local store: the whole collection lives in one JSON document that
/// is read and written wholesale. There is no change feed, so callers poll.
pub struct LocalFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// A document that no longer parses is moved to `<path>.corrupt` and the
    /// store reads as empty, so the next load seeds it again.
    async fn read_document(&self) -> Result<SeatCollection> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SeatCollection::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(SeatCollection::default());
        }
        match serde_json::from_str(&raw) {
            Ok(seats) => Ok(seats),
            Err(error) => {
                let corrupt_path = self.sibling_path(".corrupt");
                warn!(
                    path = %self.path.display(),
                    backup = %corrupt_path.display(),
                    %error,
                    "malformed seat document; moving it aside"
                );
                tokio::fs::rename(&self.path, &corrupt_path)
                    .await
                    .with_context(|| format!("failed to move aside {}", self.path.display()))?;
                Ok(SeatCollection::default())
            }
        }
    }

    async fn write_document(&self, seats: &SeatCollection) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_vec(seats).context("failed to encode seat document")?;
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, body)
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling_path(".tmp")
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut raw: OsString = self.path.clone().into_os_string();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}

#[async_trait]
impl SeatStore for LocalFileStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn load_all(&self) -> Result<SeatCollection, StoreError> {
        self.read_document()
            .await
            .map_err(|err| StoreError::read(self.backend_name(), err))
    }

    async fn save_one(&self, label: &SeatLabel, seat: &Seat) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut seats = self
            .read_document()
            .await
            .map_err(|err| StoreError::write(self.backend_name(), label, err))?;
        seats.apply_remote(*label, *seat);
        self.write_document(&seats)
            .await
            .map_err(|err| StoreError::write(self.backend_name(), label, err))
    }

    async fn save_all(&self, seats: &SeatCollection) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(seats)
            .await
            .map_err(|err| StoreError::write(self.backend_name(), "all seats", err))
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
