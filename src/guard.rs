//! Path containment checks and filename sanitization.
//!
//! Two defenses sit between untrusted text and the filesystem:
//!
//! - [`validate_within_root`] decides whether a path, after symlink
//!   resolution, lies inside the authorized vault root.
//! - [`sanitize_filename`] turns arbitrary text (item titles written by the
//!   extraction model) into a single safe path segment.
//!
//! Neither function ever panics or returns an error to the caller; any
//! resolution failure counts as "outside".

use std::io;
use std::path::{Component, Path, PathBuf};

/// Default maximum length (in characters) of a sanitized segment.
pub const MAX_FILENAME_LENGTH: usize = 50;

/// Smallest usable `max_length`: fits `file-` plus a four-letter device name.
pub const MIN_FILENAME_LENGTH: usize = 9;

/// Returned when sanitization leaves nothing behind.
pub const FALLBACK_NAME: &str = "unnamed";

const RESERVED_PREFIX: &str = "file-";

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Returns `true` iff `candidate` resolves to `root` or to a descendant of it.
///
/// Both paths are made absolute and symlink-resolved first, so a link that
/// lives inside the root but points outside is rejected. Components that do
/// not exist yet are appended lexically, which lets callers check the path of
/// a file they are about to create. Containment is decided per path
/// component: `/a/vault_extra` is not inside `/a/vault`.
pub fn validate_within_root(candidate: &Path, root: &Path) -> bool {
    let resolved_root = match resolve_path(root) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("cannot resolve root {}: {}", root.display(), e);
            return false;
        }
    };
    let resolved = match resolve_path(candidate) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("cannot resolve {}: {}", candidate.display(), e);
            return false;
        }
    };
    resolved.starts_with(&resolved_root)
}

/// Absolute, symlink-free form of `path`.
///
/// Existing prefixes are canonicalized component by component; once a
/// component is missing the remainder is normalized lexically (`.` dropped,
/// `..` pops). Errors other than "not found" (permissions, symlink loops,
/// dangling links) are returned.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    // Number of trailing components appended lexically (they do not exist).
    let mut missing = 0usize;

    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                missing = missing.saturating_sub(1);
            }
            Component::Normal(name) => {
                let next = resolved.join(name);
                if missing == 0 {
                    match std::fs::symlink_metadata(&next) {
                        Ok(_) => {
                            resolved = std::fs::canonicalize(&next)?;
                            continue;
                        }
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e),
                    }
                }
                missing += 1;
                resolved = next;
            }
        }
    }

    Ok(resolved)
}

/// Converts untrusted text into a safe, non-empty filename segment.
///
/// The output contains only (Unicode) alphanumerics, `-` and `_`, is
/// lowercase, has no leading or trailing `-`, never starts with `.`, is at
/// most `max_length` characters, and never equals a reserved device name.
/// `max_length` below [`MIN_FILENAME_LENGTH`] is raised to it.
pub fn sanitize_filename(raw: &str, max_length: usize) -> String {
    let max_length = max_length.max(MIN_FILENAME_LENGTH);

    // Separators first, so "../x" cannot survive as a traversal.
    let defused: String = raw
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();

    let mut name = String::with_capacity(defused.len());
    for c in defused.chars() {
        if c == ' ' {
            name.push('-');
        } else if c == '-' || c == '_' {
            name.push(c);
        } else if c.is_alphanumeric() {
            // Lowercasing can yield combining marks; keep only what still qualifies.
            name.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
        }
    }

    let mut collapsed = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let truncated: String = collapsed.chars().take(max_length).collect();
    let mut result = truncated.trim_matches('-').trim_start_matches('.').to_string();

    if result.is_empty() {
        result = FALLBACK_NAME.to_string();
    }

    if is_reserved_name(&result) {
        result = format!("{}{}", RESERVED_PREFIX, result);
    }

    result
}

/// Case-insensitive match against the Windows reserved device names.
pub fn is_reserved_name(name: &str) -> bool {
    let upper = name.to_uppercase();
    RESERVED_NAMES.iter().any(|r| *r == upper)
}
