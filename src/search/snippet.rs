//! Highlight snippets for similarity results.

use std::collections::HashSet;

use crate::consolidate::strip_id_token;

pub const MAX_HIGHLIGHTS: usize = 3;
pub const HIGHLIGHT_CHARS: usize = 320;
pub const PREVIEW_CHARS: usize = 400;

/// Strip the hidden id token and collapse all whitespace runs to one space.
pub fn clean_snippet(text: &str) -> String {
    strip_id_token(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut `text` to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => format!("{}…", text[..byte_idx].trim_end()),
    }
}

/// Up to [`MAX_HIGHLIGHTS`] distinct cleaned snippets, in input order.
pub fn extract_highlights<'a>(chunks: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut highlights = Vec::new();

    for chunk in chunks {
        let cleaned = clean_snippet(chunk);
        if cleaned.is_empty() {
            continue;
        }
        let snippet = truncate_with_ellipsis(&cleaned, HIGHLIGHT_CHARS);
        if seen.insert(snippet.clone()) {
            highlights.push(snippet);
        }
        if highlights.len() == MAX_HIGHLIGHTS {
            break;
        }
    }

    highlights
}

/// First highlight, or the first [`PREVIEW_CHARS`] characters of the entry text.
pub fn text_preview(highlights: &[String], entry_text: &str) -> String {
    match highlights.first() {
        Some(first) => first.clone(),
        None => entry_text.chars().take(PREVIEW_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_token_and_collapses_whitespace() {
        let raw = "[ID:p42]\nNome: Ana\n\n  Cargo:   CFO";
        assert_eq!(clean_snippet(raw), "Nome: Ana Cargo: CFO");
    }

    #[test]
    fn test_truncate_adds_ellipsis_only_when_cut() {
        assert_eq!(truncate_with_ellipsis("curto", 10), "curto");
        assert_eq!(truncate_with_ellipsis("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_with_ellipsis("abcdefghijk", 10), "abcdefghij…");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "ç".repeat(330);
        let out = truncate_with_ellipsis(&text, HIGHLIGHT_CHARS);
        assert_eq!(out.chars().count(), HIGHLIGHT_CHARS + 1);
    }

    #[test]
    fn test_highlights_deduplicated_and_capped() {
        let chunks = [
            "[ID:p1] Nome: Ana",
            "Nome:   Ana",
            "",
            "Setor: Saúde",
            "Cargo: CFO",
            "Programa: Lideranças",
        ];
        let highlights = extract_highlights(chunks);
        assert_eq!(highlights, vec!["Nome: Ana", "Setor: Saúde", "Cargo: CFO"]);
    }

    #[test]
    fn test_preview_falls_back_to_entry_text() {
        let entry = "x".repeat(500);
        assert_eq!(text_preview(&[], &entry).len(), PREVIEW_CHARS);
        assert_eq!(text_preview(&["first".to_string()], &entry), "first");
    }
}
