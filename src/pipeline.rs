//! Run orchestration.
//!
//! Coordinates one run: ledger → context → scan (or a single file) →
//! normalize → extract → write notes → ledger update. Files are processed
//! one at a time; a failed file is logged and counted, never fatal. Only
//! validation errors and a failed ledger save end the run with an error.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, SecondsFormat};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{Config, LEDGER_FILE_NAME};
use crate::context::load_context;
use crate::extraction::ExtractionClient;
use crate::guard::{resolve_path, validate_within_root};
use crate::ledger::{fingerprint_file, ChangeLedger};
use crate::normalize::{infer_source_date, normalize_conversation};
use crate::scan::{infer_source, scan_inboxes, PendingFile};
use crate::writer::{write_batch, NoteContext};

/// What happened to one file that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Notes were written under `staging_dir`.
    Written {
        staging_dir: PathBuf,
        items_written: usize,
        items_failed: usize,
    },
    /// Dry run: normalized and dated, nothing sent or written.
    Previewed { source_date: String, chars: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub items_written: usize,
    /// `(path, reason)` for every file that failed.
    pub failures: Vec<(PathBuf, String)>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    vault_root: PathBuf,
    client: Option<ExtractionClient>,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    /// `client` may be `None` only for dry runs.
    pub fn new(config: &'a Config, client: Option<ExtractionClient>, dry_run: bool) -> Result<Self> {
        let vault_root = resolve_path(&config.vault.root)
            .with_context(|| format!("Failed to resolve vault root: {}", config.vault.root.display()))?;
        if !vault_root.is_dir() {
            bail!("Vault root does not exist: {}", vault_root.display());
        }
        if !dry_run && client.is_none() {
            bail!("an extraction client is required unless running with --dry-run");
        }
        Ok(Self {
            config,
            vault_root,
            client,
            dry_run,
        })
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.vault_root
            .join(&self.config.vault.meta)
            .join(LEDGER_FILE_NAME)
    }

    /// Processes every pending inbox file, or just `single_file` when given.
    pub async fn run(&self, single_file: Option<&Path>) -> Result<RunSummary> {
        let mut ledger = ChangeLedger::load(self.ledger_path());
        match ledger.last_run() {
            Some(last) => info!("last run: {}", last),
            None => info!("last run: never"),
        }

        let files = match single_file {
            Some(path) => vec![self.single_file(path)?],
            None => scan_inboxes(self.config, &ledger, &self.vault_root)?,
        };

        if files.is_empty() {
            println!("No new files to process");
            return Ok(RunSummary::default());
        }
        info!("found {} file(s) to process", files.len());

        let context = load_context(self.config, &self.vault_root);
        if context.is_empty() {
            info!("no project context loaded");
        } else {
            info!("loaded {} context file(s)", self.config.context.files.len());
        }

        let mut summary = RunSummary::default();
        for file in &files {
            summary.attempted += 1;
            match self.process_file(file, &context).await {
                Ok(outcome) => {
                    summary.succeeded += 1;
                    if let FileOutcome::Written { items_written, .. } = outcome {
                        summary.items_written += items_written;
                    }
                    if !self.dry_run {
                        ledger.record_success(
                            &file.ledger_key(),
                            &file.fingerprint,
                            &file.source,
                            &timestamp(),
                        );
                    }
                }
                Err(e) => {
                    error!("{}: {:#}", file.path.display(), e);
                    summary.failures.push((file.path.clone(), format!("{:#}", e)));
                }
            }
        }

        if !self.dry_run {
            ledger.set_last_run(&timestamp());
            ledger.save()?;
        }

        println!(
            "Complete! Processed {}/{} files",
            summary.succeeded, summary.attempted
        );
        if !self.dry_run {
            println!(
                "Staged items in: {}",
                self.vault_root.join(&self.config.vault.staging).display()
            );
        }
        Ok(summary)
    }

    /// Validates a file named on the command line. The ledger is not
    /// consulted: an explicit request is always processed.
    fn single_file(&self, path: &Path) -> Result<PendingFile> {
        if !validate_within_root(path, &self.vault_root) {
            bail!("File is outside the vault: {}", path.display());
        }
        if !path.is_file() {
            bail!("File not found: {}", path.display());
        }
        let resolved = resolve_path(path)?;
        let source = infer_source(self.config, &self.vault_root, &resolved);
        let fingerprint = fingerprint_file(&resolved)?;
        Ok(PendingFile {
            path: resolved,
            source,
            fingerprint,
        })
    }

    /// Runs one file through normalize → extract → write.
    pub async fn process_file(&self, file: &PendingFile, context: &str) -> Result<FileOutcome> {
        info!("processing {}", file.path.display());
        let raw = std::fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let source_date = infer_source_date(&file.path);
        let text = normalize_conversation(&raw, &file.source);
        info!(
            "source: {}, date: {}, length: {} characters",
            file.source,
            source_date,
            text.chars().count()
        );

        if self.dry_run {
            info!("[dry run] would extract and write to staging");
            return Ok(FileOutcome::Previewed {
                chars: text.chars().count(),
                source_date,
            });
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("no extraction client configured"))?;
        let batch = client
            .extract(&text, file.source.as_str(), &source_date, context)
            .await?;
        if let Some(reason) = batch.error() {
            bail!("extraction failed: {}", reason);
        }
        info!("extracted {} items", batch.items().len());

        let staging_dir = self
            .vault_root
            .join(&self.config.vault.staging)
            .join(&source_date);
        if !validate_within_root(&staging_dir, &self.vault_root) {
            bail!("staging directory is outside the vault: {}", staging_dir.display());
        }
        std::fs::create_dir_all(&staging_dir).with_context(|| {
            format!("Failed to create staging directory: {}", staging_dir.display())
        })?;

        let source_file = file
            .path
            .strip_prefix(&self.vault_root)
            .unwrap_or(&file.path)
            .to_string_lossy()
            .to_string();
        let ctx = NoteContext {
            source: &file.source,
            source_date: &source_date,
            source_file: &source_file,
            staging_dir: &staging_dir,
            vault_root: &self.vault_root,
            max_title_length: self.config.output.max_title_length,
            now: Local::now(),
        };

        let report = write_batch(&batch, &ctx);
        let summary_path = report.summary?;
        if report.failed_items > 0 {
            warn!(
                "{}: {} item(s) could not be written",
                file.path.display(),
                report.failed_items
            );
        }
        info!("wrote {}", summary_path.display());

        Ok(FileOutcome::Written {
            staging_dir,
            items_written: report.item_paths.len(),
            items_failed: report.failed_items,
        })
    }
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
