use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use occupancy::SeatLayout;
use serde::Deserialize;
use storage::{LocalFileStore, SeatStore};

use crate::{controller::SyncSettings, remote::RemoteSeatStore};

pub const DEFAULT_CONFIG_FILE: &str = "seats.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Remote,
    Local,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(BackendKind::Remote),
            "local" => Ok(BackendKind::Local),
            other => Err(anyhow!("unknown backend '{other}', expected 'remote' or 'local'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub backend: BackendKind,
    pub server_url: String,
    pub local_path: PathBuf,
    pub poll_interval_ms: u64,
    pub clock_interval_ms: u64,
    pub layout: SeatLayout,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Remote,
            server_url: "http://127.0.0.1:8443".into(),
            local_path: PathBuf::from("./data/seats.json"),
            poll_interval_ms: 2000,
            clock_interval_ms: 1000,
            layout: SeatLayout::default(),
        }
    }
}

impl ClientSettings {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            clock_interval: Duration::from_millis(self.clock_interval_ms),
        }
    }

    pub fn build_store(&self) -> Result<Arc<dyn SeatStore>> {
        match self.backend {
            BackendKind::Remote => Ok(Arc::new(RemoteSeatStore::new(&self.server_url)?)),
            BackendKind::Local => Ok(Arc::new(LocalFileStore::new(&self.local_path))),
        }
    }

    /// Applies `APP__*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("APP__BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__LOCAL_PATH") {
            self.local_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
            self.poll_interval_ms = v
                .parse()
                .with_context(|| format!("APP__POLL_INTERVAL_MS must be milliseconds, got '{v}'"))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 || self.clock_interval_ms == 0 {
            return Err(anyhow!("poll and clock intervals must be greater than zero"));
        }
        if self.layout.total() == 0 {
            return Err(anyhow!("seat layout has no seats"));
        }
        Ok(())
    }
}

/// Reads `path` (or `seats.toml` when absent) and then the environment.
/// A missing default file is fine; a missing explicit file is an error.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => toml::from_str::<ClientSettings>(&raw)
            .with_context(|| format!("invalid client config {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound && !explicit => ClientSettings::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    settings.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
