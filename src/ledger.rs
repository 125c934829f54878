//! Change ledger: which inbox files have already been processed.
//!
//! A file is pending unless the ledger holds an entry for its absolute path
//! whose fingerprint (SHA-256 of the full contents) matches the file as it
//! is now. The ledger is loaded once per run, updated in memory after each
//! successful file, and written back atomically at the end of the run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::SourceLabel;

/// Hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex SHA-256 of the file at `path`.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(fingerprint(&bytes))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Older ledgers stored this under `hash`.
    #[serde(alias = "hash")]
    pub fingerprint: String,
    pub processed_at: String,
    pub source: SourceLabel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LedgerState {
    #[serde(default)]
    processed_files: BTreeMap<String, LedgerEntry>,
    #[serde(default)]
    last_run: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChangeLedger {
    path: PathBuf,
    state: LedgerState,
}

impl ChangeLedger {
    /// An empty ledger that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: LedgerState::default(),
        }
    }

    /// Loads the ledger at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty ledger; the
    /// worst outcome is that files get processed again.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no ledger at {}, starting empty", path.display());
                return Self::empty(path);
            }
            Err(e) => {
                warn!(
                    "could not read ledger {}: {}; starting empty",
                    path.display(),
                    e
                );
                return Self::empty(path);
            }
        };

        match serde_json::from_str::<LedgerState>(&content) {
            Ok(state) => Self { path, state },
            Err(e) => {
                warn!("ledger {} is corrupt: {}; starting empty", path.display(), e);
                Self::empty(path)
            }
        }
    }

    /// `true` unless `file_path` was processed with exactly this fingerprint.
    pub fn is_pending(&self, file_path: &str, current_fingerprint: &str) -> bool {
        match self.state.processed_files.get(file_path) {
            Some(entry) => entry.fingerprint != current_fingerprint,
            None => true,
        }
    }

    pub fn record_success(
        &mut self,
        file_path: &str,
        fingerprint: &str,
        source: &SourceLabel,
        timestamp: &str,
    ) {
        self.state.processed_files.insert(
            file_path.to_string(),
            LedgerEntry {
                fingerprint: fingerprint.to_string(),
                processed_at: timestamp.to_string(),
                source: source.clone(),
            },
        );
    }

    pub fn set_last_run(&mut self, timestamp: &str) {
        self.state.last_run = Some(timestamp.to_string());
    }

    pub fn last_run(&self) -> Option<&str> {
        self.state.last_run.as_deref()
    }

    pub fn entry(&self, file_path: &str) -> Option<&LedgerEntry> {
        self.state.processed_files.get(file_path)
    }

    pub fn len(&self) -> usize {
        self.state.processed_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.processed_files.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full ledger via a temp file in the same directory and an
    /// atomic rename. Errors are returned, not swallowed.
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create ledger directory: {}", dir.display()))?;

        let json = serde_json::to_string_pretty(&self.state)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write ledger: {}", self.path.display()))?;

        debug!(
            "saved ledger with {} entries to {}",
            self.len(),
            self.path.display()
        );
        Ok(())
    }
}
