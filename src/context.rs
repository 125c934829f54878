//! Project context injected into every extraction prompt.

use std::path::Path;
use tracing::{debug, warn};

use crate::config::Config;
use crate::guard::validate_within_root;

const SEPARATOR: &str = "\n\n---\n\n";

/// Concatenates the configured context files as `### <name>\n<content>`
/// sections. Files that are missing, unreadable or resolve outside the
/// vault are skipped with a warning. Returns an empty string when nothing
/// was loaded.
pub fn load_context(config: &Config, vault_root: &Path) -> String {
    let mut parts = Vec::new();

    for relative in &config.context.files {
        let path = vault_root.join(relative);
        if !path.exists() {
            warn!("context file not found: {}", path.display());
            continue;
        }
        if !validate_within_root(&path, vault_root) {
            warn!("context file resolves outside the vault: {}", path.display());
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                debug!("loaded context {} ({} bytes)", name, content.len());
                parts.push(format!("### {}\n{}", name, content));
            }
            Err(e) => warn!("failed to read context file {}: {}", path.display(), e),
        }
    }

    parts.join(SEPARATOR)
}
