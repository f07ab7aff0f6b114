//! Line-oriented block extraction.
//!
//! Single pass over the normalized source. At each position the recognition
//! rules are tried in priority order: fenced code, ATX header, Setext header,
//! table, list, blockquote, URL pool, paragraph; blank runs collapse into one
//! blank block. Malformed constructs never abort extraction — they fall
//! through to paragraph.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::{Block, BlockKind};
use crate::config::ChunkConfig;
use crate::error::ChunkerError;

/// Lines longer than this are treated as an encoding problem, not content.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

static ATX_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*)$").expect("valid regex"));
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(`{3,}|~{3,})([^`]*)$").expect("valid regex"));
static SETEXT_UNDERLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(=+|-+)\s*$").expect("valid regex"));
static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:([-*+])|(\d+)\.)\s+\S").expect("valid regex"));
static URL_ONLY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\[[^\]]+\]\(\S+\)|<?(?:https?|ftp)://\S+>?)(?:\s+[-–—:]\s+\S[^|]{0,60})?$",
    )
    .expect("valid regex")
});

struct Lines<'a> {
    texts: Vec<&'a str>,
    offsets: Vec<usize>,
}

impl<'a> Lines<'a> {
    fn new(source: &'a str) -> Self {
        let mut texts = Vec::new();
        let mut offsets = Vec::new();
        let mut pos = 0;
        for line in source.split('\n') {
            texts.push(line);
            offsets.push(pos);
            pos += line.len() + 1;
        }
        // A trailing newline produces a phantom empty line; drop it.
        if source.ends_with('\n') {
            texts.pop();
            offsets.pop();
        }
        Self { texts, offsets }
    }

    fn len(&self) -> usize {
        self.texts.len()
    }

    fn is_blank(&self, idx: usize) -> bool {
        self.texts[idx].trim().is_empty()
    }

    fn end_offset(&self, idx: usize) -> usize {
        self.offsets[idx] + self.texts[idx].len()
    }
}

/// Split the normalized source into an ordered block sequence.
///
/// The only hard failure is an overlong line; everything else degrades to
/// paragraph blocks.
pub fn extract_blocks(source: &str, config: &ChunkConfig) -> Result<Vec<Block>, ChunkerError> {
    debug_assert!(!source.contains('\r'), "source must be newline-normalized");

    let lines = Lines::new(source);
    for (idx, text) in lines.texts.iter().enumerate() {
        if text.len() > MAX_LINE_BYTES {
            return Err(ChunkerError::InvalidEncoding {
                reason: format!("line {} exceeds {} bytes", idx + 1, MAX_LINE_BYTES),
            });
        }
    }

    let mut scanner = Scanner { source, lines: &lines, config, blocks: Vec::new() };
    scanner.run();
    Ok(scanner.blocks)
}

struct Scanner<'a> {
    source: &'a str,
    lines: &'a Lines<'a>,
    config: &'a ChunkConfig,
    blocks: Vec<Block>,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            if self.lines.is_blank(i) {
                i = self.scan_blank(i);
            } else if let Some(next) = self.scan_code_fence(i) {
                i = next;
            } else if let Some(next) = self.scan_atx_header(i) {
                i = next;
            } else if let Some(next) = self.scan_setext_header(i) {
                i = next;
            } else if let Some(next) = self.scan_table(i) {
                i = next;
            } else if let Some(next) = self.scan_list(i) {
                i = next;
            } else if let Some(next) = self.scan_blockquote(i) {
                i = next;
            } else if let Some(next) = self.scan_url_pool(i) {
                i = next;
            } else {
                i = self.scan_paragraph(i);
            }
        }
    }

    fn push(&mut self, kind: BlockKind, start: usize, end: usize) {
        let start_offset = self.lines.offsets[start];
        let end_offset = self.lines.end_offset(end);
        self.blocks.push(Block {
            kind,
            content: self.source[start_offset..end_offset].to_string(),
            start_line: start + 1,
            end_line: end + 1,
            start_offset,
            end_offset,
        });
    }

    fn scan_blank(&mut self, start: usize) -> usize {
        let mut end = start;
        while end + 1 < self.lines.len() && self.lines.is_blank(end + 1) {
            end += 1;
        }
        self.push(BlockKind::Blank, start, end);
        end + 1
    }

    fn scan_code_fence(&mut self, start: usize) -> Option<usize> {
        let caps = FENCE_OPEN.captures(self.lines.texts[start])?;
        let fence = caps.get(1).expect("fence group").as_str();
        let fence_char = fence.chars().next().expect("non-empty fence");
        let fence_len = fence.len();
        let info = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        let language = info.split_whitespace().next().map(|s| s.to_string());

        // Closing fence: same char, length >= opener, nothing else on the line.
        let mut end = None;
        for j in start + 1..self.lines.len() {
            let line = self.lines.texts[j];
            let run = line.chars().take_while(|&c| c == fence_char).count();
            if run >= fence_len && line[run..].trim().is_empty() {
                end = Some(j);
                break;
            }
        }

        let (end, unclosed) = match end {
            Some(j) => (j, false),
            None => (self.lines.len() - 1, true),
        };
        self.push(BlockKind::Code { fence_char, fence_len, language, unclosed }, start, end);
        Some(end + 1)
    }

    fn scan_atx_header(&mut self, start: usize) -> Option<usize> {
        let caps = ATX_HEADER.captures(self.lines.texts[start])?;
        let level = caps.get(1).expect("hashes").as_str().len() as u8;
        let text = strip_closing_hashes(caps.get(2).expect("text").as_str().trim());
        self.push(BlockKind::Header { level, text }, start, start);
        Some(start + 1)
    }

    fn scan_setext_header(&mut self, start: usize) -> Option<usize> {
        let underline = self.lines.texts.get(start + 1)?;
        let caps = SETEXT_UNDERLINE.captures(underline)?;
        let level = if caps.get(1).expect("run").as_str().starts_with('=') { 1 } else { 2 };
        let text = self.lines.texts[start].trim().to_string();
        self.push(BlockKind::Header { level, text }, start, start + 1);
        Some(start + 2)
    }

    fn scan_table(&mut self, start: usize) -> Option<usize> {
        if table_columns(self.lines.texts[start]) < 2 {
            return None;
        }
        let separator = self.lines.texts.get(start + 1)?;
        if !is_table_separator(separator) {
            return None;
        }

        // Data rows run until the first blank or non-table line. Inconsistent
        // column counts stay in the same block.
        let mut end = start + 1;
        while end + 1 < self.lines.len()
            && !self.lines.is_blank(end + 1)
            && self.lines.texts[end + 1].contains('|')
        {
            end += 1;
        }
        self.push(BlockKind::Table, start, end);
        Some(end + 1)
    }

    fn scan_list(&mut self, start: usize) -> Option<usize> {
        let first = LIST_ITEM.captures(self.lines.texts[start])?;
        let ordered = first.get(3).is_some();

        let mut end = start;
        let mut max_nesting = nesting_of(first.get(1).expect("indent").as_str());
        let mut j = start + 1;
        while j < self.lines.len() {
            let line = self.lines.texts[j];
            if let Some(caps) = LIST_ITEM.captures(line) {
                max_nesting = max_nesting.max(nesting_of(caps.get(1).expect("indent").as_str()));
                end = j;
                j += 1;
            } else if self.lines.is_blank(j) {
                // A blank ends the list unless the next line continues it.
                match self.lines.texts.get(j + 1) {
                    Some(next)
                        if LIST_ITEM.is_match(next)
                            || (next.starts_with([' ', '\t']) && !next.trim().is_empty()) =>
                    {
                        j += 1;
                    }
                    _ => break,
                }
            } else if line.starts_with([' ', '\t']) {
                // Indented continuation of the previous item.
                end = j;
                j += 1;
            } else {
                break;
            }
        }
        self.push(BlockKind::List { ordered, max_nesting }, start, end);
        Some(end + 1)
    }

    fn scan_blockquote(&mut self, start: usize) -> Option<usize> {
        if !self.lines.texts[start].trim_start().starts_with('>') {
            return None;
        }
        let mut end = start;
        while end + 1 < self.lines.len()
            && self.lines.texts[end + 1].trim_start().starts_with('>')
        {
            end += 1;
        }
        self.push(BlockKind::Blockquote, start, end);
        Some(end + 1)
    }

    fn scan_url_pool(&mut self, start: usize) -> Option<usize> {
        if !self.config.detect_url_pools {
            return None;
        }
        if !is_url_only(self.lines.texts[start]) {
            return None;
        }

        let mut url_count = 0;
        let mut last_url = start;
        let mut j = start;
        while j < self.lines.len() {
            if is_url_only(self.lines.texts[j]) {
                url_count += 1;
                last_url = j;
                j += 1;
            } else if self.lines.is_blank(j) {
                // Interior blanks are allowed; trailing blanks are not consumed.
                j += 1;
            } else {
                break;
            }
        }
        if url_count < 3 {
            return None;
        }
        self.push(BlockKind::UrlPool, start, last_url);
        Some(last_url + 1)
    }

    fn scan_paragraph(&mut self, start: usize) -> usize {
        let mut end = start;
        let mut j = start + 1;
        while j < self.lines.len() {
            let line = self.lines.texts[j];
            if self.lines.is_blank(j)
                || FENCE_OPEN.is_match(line)
                || ATX_HEADER.is_match(line)
                || SETEXT_UNDERLINE.is_match(line)
                || self.starts_table(j)
                || LIST_ITEM.is_match(line)
                || line.trim_start().starts_with('>')
                || self.starts_url_pool(j)
            {
                break;
            }
            // Leave the line for the Setext rule when an underline follows it.
            if self.lines.texts.get(j + 1).map(|next| SETEXT_UNDERLINE.is_match(next))
                == Some(true)
            {
                break;
            }
            end = j;
            j += 1;
        }
        self.push(BlockKind::Paragraph, start, end);
        end + 1
    }

    fn starts_table(&self, idx: usize) -> bool {
        table_columns(self.lines.texts[idx]) >= 2
            && self.lines.texts.get(idx + 1).map(|s| is_table_separator(s)) == Some(true)
    }

    fn starts_url_pool(&self, idx: usize) -> bool {
        if !self.config.detect_url_pools {
            return false;
        }
        let mut url_count = 0;
        let mut j = idx;
        while j < self.lines.len() && url_count < 3 {
            if is_url_only(self.lines.texts[j]) {
                url_count += 1;
                j += 1;
            } else if self.lines.is_blank(j) {
                j += 1;
            } else {
                break;
            }
        }
        url_count >= 3
    }
}

fn strip_closing_hashes(text: &str) -> String {
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text.to_string();
    }
    // Only strip a closing run that is detached from the text by whitespace.
    if without.is_empty() || without.ends_with([' ', '\t']) {
        without.trim_end().to_string()
    } else {
        text.to_string()
    }
}

fn table_columns(line: &str) -> usize {
    if !line.contains('|') {
        return 0;
    }
    let mut cells: Vec<&str> = line.split('|').collect();
    if cells.first().map(|c| c.trim().is_empty()) == Some(true) {
        cells.remove(0);
    }
    if cells.last().map(|c| c.trim().is_empty()) == Some(true) {
        cells.pop();
    }
    cells.len()
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed.contains('|')
        && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn is_url_only(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && URL_ONLY_LINE.is_match(trimmed)
}

fn nesting_of(indent: &str) -> usize {
    let width: usize = indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum();
    width / 2 + 1
}

/// Indent width of a list-item line, if the line starts one. Shared with the
/// list-splitting sub-routine so both agree on what an item is.
pub(crate) fn list_item_indent(line: &str) -> Option<usize> {
    LIST_ITEM.captures(line).map(|caps| {
        caps.get(1)
            .expect("indent group")
            .as_str()
            .chars()
            .map(|c| if c == '\t' { 4 } else { 1 })
            .sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Vec<Block> {
        extract_blocks(source, &ChunkConfig::default()).expect("extract")
    }

    fn kinds(blocks: &[Block]) -> Vec<&'static str> {
        blocks.iter().map(|b| b.kind.name()).collect()
    }

    #[test]
    fn extracts_header_and_paragraph() {
        let blocks = extract("# Title\n\nHello world.\n");
        assert_eq!(kinds(&blocks), vec!["header", "blank", "paragraph"]);
        assert_eq!(blocks[0].header_text(), Some("Title"));
        assert_eq!(blocks[0].header_level(), Some(1));
        assert_eq!(blocks[2].content, "Hello world.");
        assert_eq!(blocks[2].start_line, 3);
    }

    #[test]
    fn content_matches_source_slice() {
        let source = "# Title\n\nSome paragraph here.\n\n- item one\n- item two\n";
        let blocks = extract(source);
        for block in &blocks {
            assert_eq!(block.content, &source[block.start_offset..block.end_offset]);
        }
    }

    #[test]
    fn fenced_code_is_one_block() {
        let source = "```python\ndef f():\n    pass\n```\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["code"]);
        match &blocks[0].kind {
            BlockKind::Code { language, unclosed, .. } => {
                assert_eq!(language.as_deref(), Some("python"));
                assert!(!unclosed);
            }
            other => panic!("expected code, got {other:?}"),
        }
    }

    #[test]
    fn nested_fence_needs_longer_closer() {
        // The inner ``` must not close the ```` fence.
        let source = "````\n```\ninner\n```\n````\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["code"]);
        assert_eq!(blocks[0].end_line, 5);
    }

    #[test]
    fn unclosed_fence_extends_to_eof() {
        let blocks = extract("# X\n\n```python\ndef f(): pass\n");
        let code = blocks.last().expect("code block");
        match &code.kind {
            BlockKind::Code { unclosed, .. } => assert!(unclosed),
            other => panic!("expected code, got {other:?}"),
        }
        assert_eq!(code.end_line, 4);
    }

    #[test]
    fn tilde_fence_does_not_close_backtick_fence() {
        let source = "```\n~~~\nstill code\n```\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["code"]);
    }

    #[test]
    fn setext_headers_span_two_lines() {
        let blocks = extract("Top Title\n=========\n\nSection\n-------\n\nbody\n");
        assert_eq!(kinds(&blocks), vec!["header", "blank", "header", "blank", "paragraph"]);
        assert_eq!(blocks[0].header_level(), Some(1));
        assert_eq!(blocks[0].header_text(), Some("Top Title"));
        assert_eq!(blocks[2].header_level(), Some(2));
        assert_eq!(blocks[0].end_line, 2);
    }

    #[test]
    fn atx_closing_hashes_are_stripped() {
        let blocks = extract("## Section ##\n");
        assert_eq!(blocks[0].header_text(), Some("Section"));
        let blocks = extract("# C#\n");
        assert_eq!(blocks[0].header_text(), Some("C#"));
    }

    #[test]
    fn table_with_separator_is_one_block() {
        let source = "| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |\n\nafter\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["table", "blank", "paragraph"]);
        assert_eq!(blocks[0].start_line, 1);
        assert_eq!(blocks[0].end_line, 4);
    }

    #[test]
    fn inconsistent_table_rows_stay_in_one_block() {
        let source = "| A | B |\n|---|---|\n| 1 | 2 | 3 |\n| only |\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["table"]);
    }

    #[test]
    fn pipe_row_without_separator_is_a_paragraph() {
        let blocks = extract("| not | a table\nplain text\n");
        assert_eq!(kinds(&blocks), vec!["paragraph"]);
    }

    #[test]
    fn list_spans_items_and_continuations() {
        let source = "- one\n- two\n  continued\n- three\n\nnot list\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["list", "blank", "paragraph"]);
        assert_eq!(blocks[0].end_line, 4);
        match &blocks[0].kind {
            BlockKind::List { ordered, .. } => assert!(!ordered),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn loose_list_survives_interior_blank() {
        let source = "1. one\n\n2. two\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["list"]);
        match &blocks[0].kind {
            BlockKind::List { ordered, .. } => assert!(ordered),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn nested_list_tracks_depth() {
        let source = "- a\n  - b\n    - c\n";
        let blocks = extract(source);
        match &blocks[0].kind {
            BlockKind::List { max_nesting, .. } => assert!(*max_nesting >= 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn blockquote_runs_are_contiguous() {
        let blocks = extract("> quoted\n> more\n\nplain\n");
        assert_eq!(kinds(&blocks), vec!["blockquote", "blank", "paragraph"]);
    }

    #[test]
    fn url_pool_needs_three_urls() {
        let pool = "https://a.example.com\nhttps://b.example.com\nhttps://c.example.com\n";
        let blocks = extract(pool);
        assert_eq!(kinds(&blocks), vec!["url_pool"]);

        let two = "https://a.example.com\nhttps://b.example.com\n";
        let blocks = extract(two);
        assert_eq!(kinds(&blocks), vec!["paragraph"]);
    }

    #[test]
    fn url_pool_allows_labels_and_interior_blanks() {
        let pool = "https://a.example.com - homepage\n\nhttps://b.example.com\n\nhttps://c.example.com\n";
        let blocks = extract(pool);
        assert_eq!(kinds(&blocks), vec!["url_pool"]);
        assert_eq!(blocks[0].end_line, 5);
    }

    #[test]
    fn url_pool_detection_can_be_disabled() {
        let pool = "https://a.example.com\nhttps://b.example.com\nhttps://c.example.com\n";
        let config = ChunkConfig { detect_url_pools: false, ..ChunkConfig::default() };
        let blocks = extract_blocks(pool, &config).expect("extract");
        assert_eq!(kinds(&blocks), vec!["paragraph"]);
    }

    #[test]
    fn markers_inside_code_fence_are_ignored() {
        let source = "```\n# not a header\n- not a list\n| not | a table |\n```\n";
        let blocks = extract(source);
        assert_eq!(kinds(&blocks), vec!["code"]);
    }

    #[test]
    fn overlong_line_is_invalid_encoding() {
        let long_line = "x".repeat(MAX_LINE_BYTES + 1);
        let err = extract_blocks(&long_line, &ChunkConfig::default()).expect_err("too long");
        assert!(matches!(err, ChunkerError::InvalidEncoding { .. }));
    }

    #[test]
    fn blank_runs_collapse() {
        let blocks = extract("a\n\n\n\nb\n");
        assert_eq!(kinds(&blocks), vec!["paragraph", "blank", "paragraph"]);
        assert_eq!(blocks[1].size(), 0);
    }

    #[test]
    fn paragraph_stops_before_setext_candidate() {
        let blocks = extract("one\ntwo\n===\n");
        assert_eq!(kinds(&blocks), vec!["paragraph", "header"]);
        assert_eq!(blocks[1].header_text(), Some("two"));
    }
}
