//! Vault bootstrap (`distill init`).
//!
//! Creates the folders a run expects, the review folders notes get routed
//! into by hand, a starter Bible for each configured context file and a
//! `.gitignore`. Existing folders and files are left alone, so running it
//! twice is harmless.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::frontmatter::Frontmatter;

/// Folders staged notes are moved into after review.
pub const ROUTING_FOLDERS: &[&str] = &[
    "02-Themes",
    "03-Decisions",
    "04-Actions",
    "05-Conflicts",
    "06-Bibles",
];

const GITIGNORE: &str = "# Obsidian
.obsidian/workspace.json
.obsidian/workspace-mobile.json
.obsidian/plugins/*/data.json

# OS
.DS_Store
Thumbs.db

# Backup files
*.bak
";

/// Directories `init` ensures, relative to the vault root, in creation order.
pub fn vault_folders(config: &Config) -> Vec<PathBuf> {
    let mut folders: Vec<PathBuf> = config.inbox.iter().map(|i| i.path.clone()).collect();
    folders.push(config.vault.staging.clone());
    folders.extend(ROUTING_FOLDERS.iter().map(PathBuf::from));
    folders.push(config.vault.meta.clone());
    for file in &config.context.files {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            folders.push(parent.to_path_buf());
        }
    }
    let mut seen = std::collections::HashSet::new();
    folders.retain(|f| seen.insert(f.clone()));
    folders
}

/// Starter document for a context file, titled after its file stem.
pub fn bible_template(title: &str, date: &str) -> Result<String> {
    let frontmatter = Frontmatter::new()
        .str("title", title)
        .str("type", "bible")
        .str("created", date)
        .render()
        .context("Failed to render Bible frontmatter")?;
    Ok(format!(
        "{frontmatter}\n\n# {title}\n\n\
This is your source of truth for this project.\nUpdate this document as your plans evolve.\n\n\
## Current Status\n_What phase are you in?_\n\n\
## Goals\n_What are you trying to achieve?_\n\n\
## Key Decisions Made\n_Document important decisions here_\n\n\
## Open Questions\n_What still needs to be figured out?_\n\n\
## Resources\n_Links, references, related notes_\n"
    ))
}

/// Creates every missing folder, then the missing starter files. Returns
/// the vault-relative paths that were created.
pub fn init_vault(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.vault.root;
    let mut created = Vec::new();
    for folder in vault_folders(config) {
        let path = root.join(&folder);
        if path.is_dir() {
            debug!("exists: {}", path.display());
            continue;
        }
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        created.push(folder);
    }

    let today = Local::now().format("%Y-%m-%d").to_string();
    for file in &config.context.files {
        if file.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let title = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Project")
            .replace('_', " ");
        if write_if_missing(root, file, &bible_template(&title, &today)?)? {
            created.push(file.clone());
        }
    }

    let gitignore = PathBuf::from(".gitignore");
    if write_if_missing(root, &gitignore, GITIGNORE)? {
        created.push(gitignore);
    }
    Ok(created)
}

fn write_if_missing(root: &Path, relative: &Path, content: &str) -> Result<bool> {
    let path = root.join(relative);
    if path.exists() {
        debug!("exists: {}", path.display());
        return Ok(false);
    }
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

pub fn run_init(config: &Config) -> Result<()> {
    println!("Setting up vault at: {}", config.vault.root.display());
    let created = init_vault(config)?;
    for path in &created {
        println!("  created: {}", path.display());
    }
    if created.is_empty() {
        println!("  nothing to do");
    }
    println!("ok");
    Ok(())
}
