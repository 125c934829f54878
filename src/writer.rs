//! Note writer: one Markdown note per extracted item plus one batch summary.
//!
//! Item filenames are `{type}-{title}-{id}.md`, where both `type` and
//! `title` pass through [`sanitize_filename`] and `id` is a digest of the
//! item's identity. Reprocessing the same conversation therefore
//! overwrites the same files instead of piling up duplicates.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, SecondsFormat};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::frontmatter::Frontmatter;
use crate::guard::{sanitize_filename, validate_within_root};
use crate::models::{ExtractedItem, ExtractionBatch, ItemType, SourceLabel};

/// Hex characters kept from the identity digest.
pub const ITEM_ID_LENGTH: usize = 12;

const NO_QUOTE: &str = "No quote captured";
const NO_SUMMARY: &str = "No summary available";
const STAGED_STATUS: &str = "staged";

/// Everything the writer needs to know about the file a batch came from.
#[derive(Debug, Clone)]
pub struct NoteContext<'a> {
    pub source: &'a SourceLabel,
    pub source_date: &'a str,
    /// Source file path relative to the vault root.
    pub source_file: &'a str,
    /// Directory the notes go into.
    pub staging_dir: &'a Path,
    /// Authorized root; no note is written outside it.
    pub vault_root: &'a Path,
    pub max_title_length: usize,
    pub now: DateTime<Local>,
}

impl NoteContext<'_> {
    fn timestamp(&self) -> String {
        self.now.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

/// Outcome of writing a whole batch.
#[derive(Debug)]
pub struct WriteReport {
    pub item_paths: Vec<PathBuf>,
    pub failed_items: usize,
    pub summary: Result<PathBuf>,
}

/// Deterministic identifier of an item: the first [`ITEM_ID_LENGTH`] hex
/// characters of SHA-256 over `{type}-{title}-{source}-{date}`.
pub fn item_id(item_type: &str, title: &str, source: &str, source_date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}-{}-{}", item_type, title, source, source_date).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..ITEM_ID_LENGTH].to_string()
}

/// Writes every item, then the summary. A failed item is logged and
/// skipped; it never stops its siblings or the summary.
pub fn write_batch(batch: &ExtractionBatch, ctx: &NoteContext<'_>) -> WriteReport {
    let mut item_paths = Vec::new();
    let mut failed_items = 0;

    for (index, raw) in batch.items().iter().enumerate() {
        let result = ExtractedItem::from_value(raw)
            .context("item is missing required fields")
            .and_then(|item| write_item_note(&item, ctx));
        match result {
            Ok(path) => {
                debug!("wrote {}", path.display());
                item_paths.push(path);
            }
            Err(e) => {
                warn!("skipping item {}: {:#}", index, e);
                failed_items += 1;
            }
        }
    }

    let summary = write_batch_summary(batch, ctx);
    WriteReport {
        item_paths,
        failed_items,
        summary,
    }
}

/// Writes one item note and returns its path.
pub fn write_item_note(item: &ExtractedItem, ctx: &NoteContext<'_>) -> Result<PathBuf> {
    let id = item_id(
        item.item_type.as_str(),
        &item.title,
        ctx.source.as_str(),
        ctx.source_date,
    );
    let filename = format!(
        "{}-{}-{}.md",
        sanitize_filename(item.item_type.as_str(), ctx.max_title_length),
        sanitize_filename(&item.title, ctx.max_title_length),
        id
    );

    let frontmatter = Frontmatter::new()
        .str("title", item.title.as_str())
        .str("type", item.item_type.as_str())
        .str("source", ctx.source.as_str())
        .str("source_date", ctx.source_date)
        .str("source_file", ctx.source_file)
        .list("related_themes", item.related_themes.iter().cloned())
        .str("confidence", item.confidence().as_str())
        .str("status", STAGED_STATUS)
        .str("created", ctx.timestamp())
        .str("id", id.as_str())
        .render()
        .context("Failed to render item frontmatter")?;

    let content = format!(
        "{frontmatter}\n\n# {title}\n\n{body}\n\n## Key Quote\n> {quote}\n\n## Review Notes\n_Add your notes here when reviewing this item._\n\n## Actions\n- [ ] Review and route to appropriate folder\n",
        title = item.title,
        body = item.content,
        quote = item.key_quote.as_deref().unwrap_or(NO_QUOTE),
    );

    write_note(ctx, &filename, &content)
}

/// Writes `_summary-{source}-{date}.md` for the batch.
pub fn write_batch_summary(batch: &ExtractionBatch, ctx: &NoteContext<'_>) -> Result<PathBuf> {
    let filename = format!(
        "_summary-{}-{}.md",
        sanitize_filename(ctx.source.as_str(), ctx.max_title_length),
        ctx.source_date
    );

    let frontmatter = Frontmatter::new()
        .str("type", "extraction-summary")
        .str("source", ctx.source.as_str())
        .str("source_date", ctx.source_date)
        .str("source_file", ctx.source_file)
        .str("processed_at", ctx.timestamp())
        .int("item_count", batch.items().len() as i64)
        .render()
        .context("Failed to render summary frontmatter")?;

    let themes: String = batch
        .primary_themes()
        .iter()
        .map(|t| format!("- {}", t))
        .collect::<Vec<_>>()
        .join("\n");

    let mut content = format!(
        "{frontmatter}\n\n# Extraction Summary: {source} ({date})\n\n## Conversation Summary\n{summary}\n\n## Primary Themes\n{themes}\n\n## Extracted Items\n\n",
        source = ctx.source,
        date = ctx.source_date,
        summary = batch.conversation_summary().unwrap_or(NO_SUMMARY),
    );

    for (item_type, titles) in group_titles_by_type(batch) {
        content.push_str(&format!("### {} ({})\n", item_type.heading(), titles.len()));
        for title in titles {
            content.push_str(&format!("- {}\n", title));
        }
        content.push('\n');
    }

    write_note(ctx, &filename, &content)
}

/// Item titles grouped by type, types in first-seen order. Items without a
/// string `type` and `title` are left out.
pub fn group_titles_by_type(batch: &ExtractionBatch) -> Vec<(ItemType, Vec<String>)> {
    let mut groups: Vec<(ItemType, Vec<String>)> = Vec::new();
    for raw in batch.items() {
        let (Some(t), Some(title)) = (
            raw.get("type").and_then(|v| v.as_str()),
            raw.get("title").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        let item_type = ItemType::from(t.to_string());
        match groups.iter_mut().find(|(existing, _)| *existing == item_type) {
            Some((_, titles)) => titles.push(title.to_string()),
            None => groups.push((item_type, vec![title.to_string()])),
        }
    }
    groups
}

fn write_note(ctx: &NoteContext<'_>, filename: &str, content: &str) -> Result<PathBuf> {
    let path = ctx.staging_dir.join(filename);
    if !validate_within_root(&path, ctx.vault_root) {
        bail!("refusing to write outside the vault: {}", path.display());
    }
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write note: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 12, 7, 10, 0, 0).unwrap()
    }

    fn ctx<'a>(root: &'a Path, staging: &'a Path, source: &'a SourceLabel) -> NoteContext<'a> {
        NoteContext {
            source,
            source_date: "2024-12-07",
            source_file: "test.txt",
            staging_dir: staging,
            vault_root: root,
            max_title_length: 50,
            now: fixed_now(),
        }
    }

    /// Frontmatter of a written note, parsed back as YAML.
    fn header(content: &str) -> serde_yaml::Mapping {
        let body = content.strip_prefix("---\n").unwrap();
        let end = body.find("\n---\n").unwrap();
        serde_yaml::from_str(&body[..end]).unwrap()
    }

    fn field<'a>(header: &'a serde_yaml::Mapping, key: &str) -> &'a serde_yaml::Value {
        header
            .get(&serde_yaml::Value::String(key.to_string()))
            .unwrap_or_else(|| panic!("missing {}", key))
    }

    fn text<'a>(header: &'a serde_yaml::Mapping, key: &str) -> &'a str {
        field(header, key).as_str().unwrap()
    }

    fn themes(header: &serde_yaml::Mapping) -> Vec<String> {
        field(header, "related_themes")
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    fn batch(value: serde_json::Value) -> ExtractionBatch {
        ExtractionBatch::from_map(value.as_object().unwrap().clone())
    }

    fn sample_item() -> ExtractedItem {
        ExtractedItem::from_value(&json!({
            "type": "theme",
            "title": "Gumroad Launch Strategy",
            "content": "A comprehensive strategy for launching on Gumroad.",
            "key_quote": "We need to focus on the initial launch momentum.",
            "related_themes": ["[[Product Launch]]", "[[Marketing]]"],
            "confidence": "high"
        }))
        .unwrap()
    }

    fn five_item_batch() -> ExtractionBatch {
        batch(json!({
            "items": [
                {"type": "theme", "title": "Theme One", "content": "c"},
                {"type": "decision", "title": "Decision A", "content": "c"},
                {"type": "theme", "title": "Theme Two", "content": "c"},
                {"type": "action", "title": "Action Item", "content": "c"},
                {"type": "insight", "title": "Key Insight", "content": "c"}
            ],
            "conversation_summary": "This was a productive conversation about planning.",
            "primary_themes": ["[[Planning]]", "[[Strategy]]"]
        }))
    }

    #[test]
    fn test_item_id_deterministic_and_hex() {
        let a = item_id("theme", "Test", "claude", "2024-12-07");
        let b = item_id("theme", "Test", "claude", "2024-12-07");
        assert_eq!(a, b);
        assert_eq!(a.len(), ITEM_ID_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, item_id("decision", "Test", "claude", "2024-12-07"));
        assert_ne!(a, item_id("theme", "Test", "gemini", "2024-12-07"));
        assert_ne!(a, item_id("theme", "Test", "claude", "2024-12-08"));
    }

    #[test]
    fn test_item_note_filename_and_body() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        let path = write_item_note(&sample_item(), &ctx).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        let id = item_id("theme", "Gumroad Launch Strategy", "claude", "2024-12-07");
        assert_eq!(name, format!("theme-gumroad-launch-strategy-{}.md", id));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("---\n\n# Gumroad Launch Strategy\n"));
        assert!(content.contains("A comprehensive strategy for launching on Gumroad."));
        assert!(content.contains("## Key Quote\n> We need to focus on the initial launch momentum."));
        assert!(content.contains("## Review Notes"));
        assert!(content.contains("## Actions\n- [ ] Review and route to appropriate folder"));

        let fm = header(&content);
        assert_eq!(text(&fm, "title"), "Gumroad Launch Strategy");
        assert_eq!(text(&fm, "type"), "theme");
        assert_eq!(text(&fm, "source"), "claude");
        assert_eq!(text(&fm, "source_date"), "2024-12-07");
        assert_eq!(text(&fm, "source_file"), "test.txt");
        assert_eq!(themes(&fm), vec!["[[Product Launch]]", "[[Marketing]]"]);
        assert_eq!(text(&fm, "confidence"), "high");
        assert_eq!(text(&fm, "status"), "staged");
        assert!(text(&fm, "created").starts_with("2024-12-07T10:00:00"));
        assert_eq!(text(&fm, "id"), id);
    }

    #[test]
    fn test_item_note_defaults() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Gemini;
        let ctx = ctx(tmp.path(), tmp.path(), &source);
        let item = ExtractedItem::from_value(&json!({
            "type": "insight", "title": "Bare", "content": "Only required fields."
        }))
        .unwrap();

        let content = std::fs::read_to_string(write_item_note(&item, &ctx).unwrap()).unwrap();
        assert!(content.contains("> No quote captured"));
        let fm = header(&content);
        assert!(themes(&fm).is_empty());
        assert_eq!(text(&fm, "confidence"), "medium");
    }

    #[test]
    fn test_null_and_mixed_optional_fields_keep_the_item() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        let report = write_batch(
            &batch(json!({
                "items": [
                    {"type": "theme", "title": "Null Fields", "content": "c",
                     "related_themes": null, "key_quote": null, "confidence": null},
                    {"type": "insight", "title": "Mixed Fields", "content": "c",
                     "related_themes": ["[[A]]", 3, null, {"x": 1}, "[[B]]"],
                     "key_quote": 42, "confidence": ["high"]}
                ]
            })),
            &ctx,
        );
        assert_eq!(report.failed_items, 0);
        assert_eq!(report.item_paths.len(), 2);

        let null_note = std::fs::read_to_string(&report.item_paths[0]).unwrap();
        assert!(null_note.contains("> No quote captured"));
        let fm = header(&null_note);
        assert!(themes(&fm).is_empty());
        assert_eq!(text(&fm, "confidence"), "medium");

        let mixed_note = std::fs::read_to_string(&report.item_paths[1]).unwrap();
        assert!(mixed_note.contains("> No quote captured"));
        let fm = header(&mixed_note);
        assert_eq!(themes(&fm), vec!["[[A]]", "[[B]]"]);
        assert_eq!(text(&fm, "confidence"), "medium");
    }

    #[test]
    fn test_numeric_looking_title_stays_a_string() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        for title in ["0x1F", "0o17", ".inf", "true", "Plan: Phase 2"] {
            let item = ExtractedItem::from_value(&json!({
                "type": "decision", "title": title, "content": "c"
            }))
            .unwrap();
            let content = std::fs::read_to_string(write_item_note(&item, &ctx).unwrap()).unwrap();
            let fm = header(&content);
            assert_eq!(
                field(&fm, "title"),
                &serde_yaml::Value::String(title.to_string()),
                "title {:?}",
                title
            );
            assert!(content.contains(&format!("\n# {}\n", title)));
        }
    }

    #[test]
    fn test_hostile_title_and_type_stay_in_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("01-Processed/2024-12-07");
        std::fs::create_dir_all(&staging).unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), &staging, &source);

        let item = ExtractedItem::from_value(&json!({
            "type": "../../escape",
            "title": "../../../etc/passwd",
            "content": "x"
        }))
        .unwrap();
        let path = write_item_note(&item, &ctx).unwrap();
        assert_eq!(path.parent().unwrap(), staging);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("escape-etc-passwd-"));
    }

    #[test]
    fn test_staging_outside_root_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("vault");
        let outside = tmp.path().join("elsewhere");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(&root, &outside, &source);

        let err = write_item_note(&sample_item(), &ctx).unwrap_err();
        assert!(err.to_string().contains("outside the vault"));
        assert_eq!(std::fs::read_dir(&outside).unwrap().count(), 0);
    }

    #[test]
    fn test_summary_note() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        let path = write_batch_summary(&five_item_batch(), &ctx).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "_summary-claude-2024-12-07.md"
        );

        let content = std::fs::read_to_string(&path).unwrap();
        let fm = header(&content);
        assert_eq!(text(&fm, "type"), "extraction-summary");
        assert_eq!(text(&fm, "source"), "claude");
        assert_eq!(text(&fm, "source_date"), "2024-12-07");
        assert_eq!(text(&fm, "source_file"), "test.txt");
        assert!(text(&fm, "processed_at").starts_with("2024-12-07T10:00:00"));
        assert_eq!(field(&fm, "item_count").as_i64(), Some(5));
        assert!(content.contains("## Conversation Summary\nThis was a productive conversation about planning."));
        assert!(content.contains("## Primary Themes\n- [[Planning]]\n- [[Strategy]]"));

        let themes = content.find("### Themes (2)").unwrap();
        let decisions = content.find("### Decisions (1)").unwrap();
        let actions = content.find("### Actions (1)").unwrap();
        let insights = content.find("### Insights (1)").unwrap();
        assert!(themes < decisions && decisions < actions && actions < insights);
        assert!(content.contains("### Themes (2)\n- Theme One\n- Theme Two\n"));
        assert!(content.contains("- Decision A"));
        assert!(content.contains("- Action Item"));
        assert!(content.contains("- Key Insight"));
    }

    #[test]
    fn test_summary_of_empty_batch() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        let content = std::fs::read_to_string(
            write_batch_summary(
                &batch(json!({"items": [], "conversation_summary": "Nothing useful."})),
                &ctx,
            )
            .unwrap(),
        )
        .unwrap();
        assert!(content.contains("item_count: 0\n"));
        assert!(content.contains("Nothing useful."));

        let content = std::fs::read_to_string(
            write_batch_summary(
                &batch(json!({"items": [{"type": "theme", "title": "Only", "content": "c"}]})),
                &ctx,
            )
            .unwrap(),
        )
        .unwrap();
        assert!(content.contains("No summary available"));
        assert!(content.contains("### Themes (1)"));
    }

    #[test]
    fn test_write_batch_continues_past_bad_items() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        let report = write_batch(
            &batch(json!({
                "items": [
                    {"type": "theme", "title": "Good One", "content": "c"},
                    {"type": "theme", "content": "no title"},
                    {"type": "action", "title": "Good Two", "content": "c"}
                ],
                "conversation_summary": "s"
            })),
            &ctx,
        );

        assert_eq!(report.item_paths.len(), 2);
        assert_eq!(report.failed_items, 1);
        let summary = std::fs::read_to_string(report.summary.unwrap()).unwrap();
        assert!(summary.contains("item_count: 3\n"));
        assert!(summary.contains("### Themes (1)\n- Good One\n"));
    }

    #[test]
    fn test_rewriting_same_batch_overwrites_same_files() {
        let tmp = TempDir::new().unwrap();
        let source = SourceLabel::Claude;
        let ctx = ctx(tmp.path(), tmp.path(), &source);

        write_batch(&five_item_batch(), &ctx);
        let first = std::fs::read_dir(tmp.path()).unwrap().count();
        write_batch(&five_item_batch(), &ctx);
        let second = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(first, 6);
        assert_eq!(first, second);
    }
}
