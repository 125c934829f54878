//! Prompt text sent to the extraction service.
//!
//! The system instruction is fixed. The user message embeds the normalized
//! conversation, its source and date, and the injected project context.

/// Shown in place of the project context when none is configured.
pub const NO_CONTEXT_PLACEHOLDER: &str = "(No project context provided)";

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a knowledge extraction assistant. Your job is to analyze conversation transcripts and extract structured insights for a personal knowledge management system.

The user maintains an Obsidian vault with interconnected notes. Your extractions will become nodes in their knowledge graph.

CRITICAL RULES:
1. Extract ONLY what was actually discussed. Never invent or extrapolate.
2. Every item needs a key_quote that can be searched to find the original conversation.
3. Related themes should use [[Wiki Link]] syntax for Obsidian compatibility.
4. Be selective. Quality over quantity: 3 good insights beat 10 mediocre ones.
5. Confidence levels matter: \"high\" = explicitly stated, \"medium\" = strongly implied, \"low\" = loosely connected.

OUTPUT FORMAT: Return valid JSON only. No markdown code blocks, no explanations.";

/// Builds the user message for one conversation.
pub fn build_extraction_prompt(
    conversation_text: &str,
    source: &str,
    source_date: &str,
    context: &str,
) -> String {
    let context = if context.is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };

    format!(
        r#"Analyze this conversation and extract knowledge items.

## Current Context (User's Project Bible)
{context}

## Conversation to Analyze
Source: {source}
Date: {source_date}

{conversation_text}

---

Extract the following item types:

**THEMES**: Recurring topics, concepts, or areas of focus. These become hub nodes in the knowledge graph.
- Only extract if discussed substantively (not just mentioned in passing)
- Link to related existing themes if obvious

**DECISIONS**: Explicit choices made or conclusions reached during the conversation.
- Must be something the user decided, not just discussed
- Include the reasoning if provided

**ACTIONS**: Concrete next steps or tasks that emerged.
- Must be actionable (has a clear "done" state)
- Include context on why it matters

**INSIGHTS**: Realizations, reframes, or valuable observations.
- Things that shifted understanding or perspective
- Non-obvious connections or implications

Return this exact JSON structure:
{{
  "items": [
    {{
      "type": "theme|decision|action|insight",
      "title": "Short descriptive title (3-7 words)",
      "content": "2-4 sentence explanation of the item",
      "key_quote": "Exact quote from conversation for search-back (15-40 words)",
      "related_themes": ["[[Theme Name]]", "[[Another Theme]]"],
      "confidence": "high|medium|low"
    }}
  ],
  "conversation_summary": "1-2 sentence summary of what this conversation was about",
  "primary_themes": ["[[Main Theme 1]]", "[[Main Theme 2]]"]
}}

Be selective. A typical conversation should yield 3-8 items total, not 15+."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_content() {
        assert!(EXTRACTION_SYSTEM_PROMPT
            .to_lowercase()
            .contains("knowledge extraction"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("JSON"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("Obsidian"));
        for level in ["high", "medium", "low"] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(level));
        }
    }

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = build_extraction_prompt(
            "User: Hello\n\nAssistant: Hi",
            "claude",
            "2024-12-07",
            "Project goals here",
        );
        assert!(prompt.contains("User: Hello\n\nAssistant: Hi"));
        assert!(prompt.contains("Source: claude"));
        assert!(prompt.contains("Date: 2024-12-07"));
        assert!(prompt.contains("Project goals here"));
        assert!(!prompt.contains(NO_CONTEXT_PLACEHOLDER));
    }

    #[test]
    fn test_empty_context_uses_placeholder() {
        let prompt = build_extraction_prompt("text", "gemini", "2024-12-07", "");
        assert!(prompt.contains(NO_CONTEXT_PLACEHOLDER));
    }

    #[test]
    fn test_structure_and_schema() {
        let prompt = build_extraction_prompt("text", "claude", "2024-12-07", "");
        for section in [
            "## Current Context",
            "## Conversation to Analyze",
            "Extract the following",
            "THEMES",
            "DECISIONS",
            "ACTIONS",
            "INSIGHTS",
        ] {
            assert!(prompt.contains(section), "missing {}", section);
        }
        for key in [
            "\"items\"",
            "\"type\"",
            "\"title\"",
            "\"content\"",
            "\"key_quote\"",
            "\"related_themes\"",
            "\"confidence\"",
            "\"conversation_summary\"",
            "\"primary_themes\"",
        ] {
            assert!(prompt.contains(key), "missing {}", key);
        }
        assert!(prompt.contains("[[") && prompt.contains("]]"));
    }

    #[test]
    fn test_conversation_inserted_verbatim() {
        let conversation = "Use {curly} braces, $dollar signs and 日本語の質問 🎉";
        let prompt = build_extraction_prompt(conversation, "claude", "2024-12-07", "{ctx}");
        assert!(prompt.contains(conversation));
        assert!(prompt.contains("{ctx}"));
    }
}
