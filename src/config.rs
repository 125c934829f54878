//! TOML configuration.
//!
//! The whole run is driven by a single [`Config`] built once at startup by
//! [`load_config`] and passed by reference into every component. All paths
//! other than `vault.root` are relative to the vault.

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::guard::sanitize_filename;
use crate::models::SourceLabel;

/// Name of the ledger file inside the meta directory.
pub const LEDGER_FILE_NAME: &str = "processing_log.json";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default = "default_inboxes")]
    pub inbox: Vec<InboxConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// The authorized root. No file outside it is read or written.
    pub root: PathBuf,
    #[serde(default = "default_staging")]
    pub staging: PathBuf,
    #[serde(default = "default_meta")]
    pub meta: PathBuf,
}

fn default_staging() -> PathBuf {
    PathBuf::from("01-Processed")
}
fn default_meta() -> PathBuf {
    PathBuf::from("_meta")
}

/// One inbox directory per source label.
#[derive(Debug, Deserialize, Clone)]
pub struct InboxConfig {
    pub source: SourceLabel,
    pub path: PathBuf,
}

fn default_inboxes() -> Vec<InboxConfig> {
    [
        (SourceLabel::Claude, "00-Inbox/claude"),
        (SourceLabel::ChatGpt, "00-Inbox/chatgpt"),
        (SourceLabel::Gemini, "00-Inbox/gemini"),
    ]
    .into_iter()
    .map(|(source, path)| InboxConfig {
        source,
        path: PathBuf::from(path),
    })
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
        }
    }
}

fn default_pattern() -> String {
    "*.txt".to_string()
}

/// Project context files injected into every extraction prompt.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContextConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_max_title_length")]
    pub max_title_length: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_title_length: default_max_title_length(),
        }
    }
}

fn default_max_title_length() -> usize {
    crate::guard::MAX_FILENAME_LENGTH
}

impl Config {
    /// A config with every default applied, rooted at `root`.
    pub fn for_vault(root: impl Into<PathBuf>) -> Self {
        Self {
            vault: VaultConfig {
                root: root.into(),
                staging: default_staging(),
                meta: default_meta(),
            },
            inbox: default_inboxes(),
            scan: ScanConfig::default(),
            context: ContextConfig::default(),
            extraction: ExtractionConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.vault.root.join(&self.vault.staging)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.vault.root.join(&self.vault.meta)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.meta_dir().join(LEDGER_FILE_NAME)
    }

    pub fn inbox_dir(&self, inbox: &InboxConfig) -> PathBuf {
        self.vault.root.join(&inbox.path)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Rejects configurations that would let a run touch files outside the vault
/// or make the retry loop meaningless.
pub fn validate(config: &Config) -> Result<()> {
    if config.vault.root.as_os_str().is_empty() {
        bail!("vault.root must be set");
    }

    ensure_vault_relative("vault.staging", &config.vault.staging)?;
    ensure_vault_relative("vault.meta", &config.vault.meta)?;

    let mut seen = HashSet::new();
    for inbox in &config.inbox {
        let label = inbox.source.as_str();
        if label.is_empty() {
            bail!("inbox source labels must not be empty");
        }
        if sanitize_filename(label, config.output.max_title_length) != label {
            bail!(
                "inbox source '{}' must be lowercase letters, digits, '-' or '_'",
                label
            );
        }
        if !seen.insert(label.to_string()) {
            bail!("inbox source '{}' is configured more than once", label);
        }
        ensure_vault_relative(&format!("inbox '{}' path", label), &inbox.path)?;
    }

    for file in &config.context.files {
        ensure_vault_relative("context file", file)?;
    }

    Glob::new(&config.scan.pattern)
        .with_context(|| format!("scan.pattern is not a valid glob: {}", config.scan.pattern))?;

    if config.extraction.retry_attempts == 0 {
        bail!("extraction.retry_attempts must be >= 1");
    }
    if config.extraction.max_tokens == 0 {
        bail!("extraction.max_tokens must be > 0");
    }
    if config.output.max_title_length < crate::guard::MIN_FILENAME_LENGTH {
        bail!(
            "output.max_title_length must be >= {}",
            crate::guard::MIN_FILENAME_LENGTH
        );
    }

    Ok(())
}

fn ensure_vault_relative(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("{} must not be empty", what);
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!(
                "{} must be a relative path inside the vault: {}",
                what,
                path.display()
            ),
        }
    }
    Ok(())
}
