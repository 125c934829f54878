//! Read-only overview of the inboxes and the ledger (`distill status`).

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{Config, LEDGER_FILE_NAME};
use crate::guard::resolve_path;
use crate::ledger::{fingerprint_file, ChangeLedger};
use crate::models::SourceLabel;
use crate::scan::{build_matcher, ledger_key, list_inbox};

/// Per-inbox counts.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxStatus {
    pub source: SourceLabel,
    pub dir: PathBuf,
    pub exists: bool,
    pub files: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultStatus {
    pub vault_root: PathBuf,
    pub inboxes: Vec<InboxStatus>,
    pub processed: usize,
    pub last_run: Option<String>,
}

/// Collects the status without creating or modifying anything.
pub fn collect_status(config: &Config) -> Result<VaultStatus> {
    let vault_root = resolve_path(&config.vault.root)?;
    let ledger = ChangeLedger::load(vault_root.join(&config.vault.meta).join(LEDGER_FILE_NAME));
    let matcher = build_matcher(&config.scan.pattern)?;

    let inboxes = config
        .inbox
        .iter()
        .map(|inbox| {
            let dir = vault_root.join(&inbox.path);
            let files = list_inbox(inbox, &vault_root, &matcher);
            let pending = files
                .iter()
                .filter(|path| match fingerprint_file(path) {
                    Ok(fp) => ledger.is_pending(&ledger_key(path), &fp),
                    Err(_) => false,
                })
                .count();
            InboxStatus {
                source: inbox.source.clone(),
                exists: dir.is_dir(),
                dir,
                files: files.len(),
                pending,
            }
        })
        .collect();

    Ok(VaultStatus {
        vault_root,
        inboxes,
        processed: ledger.len(),
        last_run: ledger.last_run().map(str::to_string),
    })
}

pub fn print_status(config: &Config) -> Result<()> {
    let status = collect_status(config)?;

    println!("Vault: {}", status.vault_root.display());
    println!();
    println!("{:<12} {:<8} {:>6} {:>8}  DIRECTORY", "SOURCE", "EXISTS", "FILES", "PENDING");
    for inbox in &status.inboxes {
        println!(
            "{:<12} {:<8} {:>6} {:>8}  {}",
            inbox.source.as_str(),
            if inbox.exists { "yes" } else { "no" },
            inbox.files,
            inbox.pending,
            relative_display(&inbox.dir, &status.vault_root)
        );
    }
    println!();
    println!("Processed files: {}", status.processed);
    println!(
        "Last run: {}",
        status.last_run.as_deref().unwrap_or("never")
    );
    Ok(())
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
