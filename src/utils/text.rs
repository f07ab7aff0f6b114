//! Small text helpers shared across the pipeline.

use unicode_segmentation::UnicodeSegmentation;

/// Normalize line endings to `\n`. Runs once at pipeline entry; nothing
/// downstream may see a `\r`.
pub fn normalize_newlines(source: &str) -> String {
    if !source.contains('\r') {
        return source.to_string();
    }
    source.replace("\r\n", "\n").replace('\r', "\n")
}

/// Join the non-empty parts with `sep`. The overlap equivalence law is
/// defined in terms of this helper.
pub fn join_nonempty(sep: &str, parts: &[&str]) -> String {
    let kept: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    kept.join(sep)
}

/// Collapse interior whitespace runs and trim. Used for recall matching so a
/// re-wrapped line still counts as present.
pub fn normalize_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.unicode_words().count()
}

/// Lowercase kebab identifier: non-alphanumeric runs become single dashes.
pub fn kebab_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Truncate to at most `max_chars`, backing up to the last word boundary so
/// previews never cut a word in half. Appends nothing; callers add ellipses.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars).collect();
    match prefix.unicode_word_indices().last() {
        Some((idx, word)) => {
            let end = idx + word.len();
            if end < prefix.len() {
                prefix[..end].to_string()
            } else {
                // The cut landed mid-word; drop the partial word.
                prefix[..idx].trim_end().to_string()
            }
        }
        None => prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_newlines_strips_carriage_returns() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(normalize_newlines("plain\n"), "plain\n");
    }

    #[test]
    fn join_nonempty_skips_empty_parts() {
        assert_eq!(join_nonempty("\n\n", &["a", "", "b"]), "a\n\nb");
        assert_eq!(join_nonempty("\n\n", &["", "", ""]), "");
        assert_eq!(join_nonempty("\n\n", &["only"]), "only");
    }

    #[test]
    fn kebab_case_collapses_runs() {
        assert_eq!(kebab_case("Getting Started"), "getting-started");
        assert_eq!(kebab_case("API -- Reference!"), "api-reference");
        assert_eq!(kebab_case("  edge  "), "edge");
    }

    #[test]
    fn truncate_respects_word_boundaries() {
        let text = "the quick brown fox jumps";
        let cut = truncate_at_word_boundary(text, 12);
        assert!(cut.chars().count() <= 12);
        assert!(text.starts_with(&cut));
        assert!(!cut.ends_with("bro"));
    }

    #[test]
    fn whitespace_normalization_collapses_tabs() {
        assert_eq!(normalize_whitespace("  a\t b   c "), "a b c");
    }

    #[test]
    fn word_count_handles_punctuation() {
        assert_eq!(word_count("Hello, world! Two words... five total?"), 6);
    }
}
