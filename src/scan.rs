//! Inbox scanning and source-label inference.
//!
//! Each inbox is listed non-recursively. A file is a candidate when its
//! name matches `scan.pattern` and it resolves inside the vault; it is
//! pending when the ledger has no entry for its resolved path or the
//! stored fingerprint differs.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, InboxConfig};
use crate::guard::{resolve_path, validate_within_root};
use crate::ledger::{fingerprint_file, ChangeLedger};
use crate::models::SourceLabel;

/// A file that needs processing.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    /// Resolved absolute path; also the ledger key.
    pub path: PathBuf,
    pub source: SourceLabel,
    pub fingerprint: String,
}

impl PendingFile {
    pub fn ledger_key(&self) -> String {
        ledger_key(&self.path)
    }
}

pub fn ledger_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn build_matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .with_context(|| format!("invalid scan pattern: {}", pattern))?
        .compile_matcher())
}

/// Files in one inbox that match the pattern, resolved and sorted by name.
/// A missing inbox directory yields an empty list.
pub fn list_inbox(
    inbox: &InboxConfig,
    vault_root: &Path,
    matcher: &GlobMatcher,
) -> Vec<PathBuf> {
    let dir = vault_root.join(&inbox.path);
    if !dir.is_dir() {
        debug!("inbox {} does not exist: {}", inbox.source, dir.display());
        return Vec::new();
    }

    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }
        let path = entry.path();
        if !validate_within_root(path, vault_root) {
            warn!("skipping file outside the vault: {}", path.display());
            continue;
        }
        match resolve_path(path) {
            Ok(resolved) => files.push(resolved),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    files
}

/// All pending files across every configured inbox, in inbox order.
pub fn scan_inboxes(
    config: &Config,
    ledger: &ChangeLedger,
    vault_root: &Path,
) -> Result<Vec<PendingFile>> {
    let matcher = build_matcher(&config.scan.pattern)?;
    let mut pending = Vec::new();

    for inbox in &config.inbox {
        for path in list_inbox(inbox, vault_root, &matcher) {
            let fingerprint = match fingerprint_file(&path) {
                Ok(fp) => fp,
                Err(e) => {
                    warn!("{:#}", e);
                    continue;
                }
            };
            if ledger.is_pending(&ledger_key(&path), &fingerprint) {
                pending.push(PendingFile {
                    path,
                    source: inbox.source.clone(),
                    fingerprint,
                });
            } else {
                debug!("unchanged: {}", path.display());
            }
        }
    }

    Ok(pending)
}

/// Source label for a file given on the command line.
///
/// First by inbox ancestry of the resolved path, then by the inbox's
/// relative path appearing anywhere in the path text. In both passes the
/// longest matching inbox path wins. No match gives `unknown`.
pub fn infer_source(config: &Config, vault_root: &Path, path: &Path) -> SourceLabel {
    let by_ancestry = config
        .inbox
        .iter()
        .filter_map(|inbox| {
            let dir = resolve_path(&vault_root.join(&inbox.path)).ok()?;
            path.starts_with(&dir)
                .then(|| (dir.components().count(), inbox))
        })
        .max_by_key(|(depth, _)| *depth);
    if let Some((_, inbox)) = by_ancestry {
        return inbox.source.clone();
    }

    let text = path.to_string_lossy().replace('\\', "/");
    config
        .inbox
        .iter()
        .filter_map(|inbox| {
            let needle = inbox.path.to_string_lossy().replace('\\', "/");
            text.contains(needle.as_str()).then(|| (needle.len(), inbox))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, inbox)| inbox.source.clone())
        .unwrap_or(SourceLabel::Unknown)
}
