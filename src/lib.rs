//! # Vault Distill
//!
//! Turns exported AI-assistant conversations into reviewable Obsidian notes.
//!
//! Conversation exports dropped into per-source inbox folders are
//! fingerprinted, normalized into plain text, sent to a hosted extraction
//! model, and written back into the vault as one note per extracted item
//! plus a summary note per conversation. A ledger remembers what has been
//! processed so unchanged files are never sent twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌────────────┐   ┌─────────────┐
//! │   Inboxes   │──▶│ Normalize  │──▶│  Extract   │──▶│   Writer    │
//! │ scan+ledger │   │ per source │   │ retry loop │   │ notes+guard │
//! └─────────────┘   └────────────┘   └────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! distill init                  # create the inbox/staging/meta folders
//! distill status                # what is waiting in each inbox
//! distill run --dry-run         # normalize and date files, send nothing
//! distill run                   # extract and stage notes
//! distill run --file 00-Inbox/claude/2024-12-07-launch.txt
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Source labels, items, batch results |
//! | [`ledger`] | Fingerprints and the processed-files ledger |
//! | [`guard`] | Root containment checks and filename sanitizing |
//! | [`normalize`] | Per-source conversation normalization, date inference |
//! | [`prompt`] | Extraction prompt text |
//! | [`extraction`] | Remote extraction client with retries |
//! | [`frontmatter`] | YAML frontmatter rendering |
//! | [`writer`] | Item and summary notes |
//! | [`context`] | Project context files |
//! | [`scan`] | Inbox scanning, source inference |
//! | [`pipeline`] | Run orchestration |
//! | [`setup`] | `distill init` |
//! | [`status`] | `distill status` |

pub mod config;
pub mod context;
pub mod extraction;
pub mod frontmatter;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod scan;
pub mod setup;
pub mod status;
pub mod writer;
