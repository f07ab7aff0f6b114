//! Sub-routines for splitting oversized splittable blocks.
//!
//! Paragraphs and blockquotes split at sentence boundaries; lists split at
//! top-level item boundaries and never mid-item. Pieces keep line and offset
//! provenance relative to the original block.

use unicode_segmentation::UnicodeSegmentation;

use crate::block::{list_item_indent, Block, BlockKind};

/// Split an oversized paragraph or blockquote into sentence-packed pieces,
/// each at most `max_chars` (a single word longer than the budget is cut at
/// the char boundary as a last resort).
pub(crate) fn split_text_block(block: &Block, max_chars: usize) -> Vec<Block> {
    let ranges = pack_sentence_ranges(&block.content, max_chars);
    ranges_to_blocks(block, &ranges)
}

/// Split an oversized list block into item groups, packing whole items
/// greedily. A single item above the budget stays whole; the caller marks
/// that piece oversize.
pub(crate) fn split_list_block(block: &Block, max_chars: usize) -> Vec<Block> {
    let items = top_level_items(&block.content);
    if items.len() <= 1 {
        return vec![block.clone()];
    }

    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut group_start = items[0].0;
    let mut group_end = items[0].1;
    let mut group_chars = char_len(&block.content[group_start..group_end]);

    for &(start, end) in &items[1..] {
        let item_chars = char_len(&block.content[start..end]);
        // +1 for the newline rejoining the ranges.
        if group_chars + 1 + item_chars > max_chars {
            groups.push((group_start, group_end));
            group_start = start;
            group_end = end;
            group_chars = item_chars;
        } else {
            group_end = end;
            group_chars += 1 + item_chars;
        }
    }
    groups.push((group_start, group_end));

    ranges_to_blocks(block, &groups)
}

/// Greedy sentence packing over raw text; returns byte ranges into `text`.
pub(crate) fn pack_sentence_ranges(text: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut current_chars = 0usize;

    for sentence in text.split_sentence_bounds() {
        let offset = sentence.as_ptr() as usize - text.as_ptr() as usize;
        let sentence_chars = char_len(sentence);

        if sentence_chars > max_chars {
            // Monster sentence: flush, then cut at word boundaries.
            if let Some(start) = current_start.take() {
                ranges.push((start, offset));
            }
            ranges.extend(
                word_cut_ranges(sentence, max_chars)
                    .into_iter()
                    .map(|(s, e)| (offset + s, offset + e)),
            );
            current_chars = 0;
            continue;
        }

        match current_start {
            None => {
                current_start = Some(offset);
                current_chars = sentence_chars;
            }
            Some(start) => {
                if current_chars + sentence_chars > max_chars {
                    ranges.push((start, offset));
                    current_start = Some(offset);
                    current_chars = sentence_chars;
                } else {
                    current_chars += sentence_chars;
                }
            }
        }
    }
    if let Some(start) = current_start {
        ranges.push((start, text.len()));
    }

    ranges
        .into_iter()
        .filter_map(|(s, e)| trim_range(text, s, e))
        .collect()
}

fn word_cut_ranges(text: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let rest = &text[start..];
        if char_len(rest) <= max_chars {
            ranges.push((start, text.len()));
            break;
        }
        let prefix: String = rest.chars().take(max_chars).collect();
        let cut = rest
            .unicode_word_indices()
            .take_while(|(idx, word)| idx + word.len() <= prefix.len())
            .last()
            .map(|(idx, word)| idx + word.len())
            .filter(|&end| end > 0)
            .unwrap_or(prefix.len());
        ranges.push((start, start + cut));
        start += cut;
        // Skip whitespace between cuts.
        start += text[start..].len() - text[start..].trim_start().len();
    }
    ranges
}

fn top_level_items(content: &str) -> Vec<(usize, usize)> {
    let mut line_starts: Vec<(usize, &str)> = Vec::new();
    let mut pos = 0usize;
    for line in content.split('\n') {
        line_starts.push((pos, line));
        pos += line.len() + 1;
    }

    let min_indent = line_starts
        .iter()
        .filter_map(|(_, line)| list_item_indent(line))
        .min()
        .unwrap_or(0);

    let mut items: Vec<(usize, usize)> = Vec::new();
    for (offset, line) in &line_starts {
        if list_item_indent(line) == Some(min_indent) {
            if let Some(last) = items.last_mut() {
                last.1 = *offset;
            }
            items.push((*offset, content.len()));
        }
    }
    // Trim trailing newline from each range.
    items
        .into_iter()
        .filter_map(|(s, e)| trim_range(content, s, e))
        .collect()
}

fn ranges_to_blocks(block: &Block, ranges: &[(usize, usize)]) -> Vec<Block> {
    ranges
        .iter()
        .map(|&(start, end)| {
            let piece = &block.content[start..end];
            let lines_before = block.content[..start].matches('\n').count();
            let kind = match &block.kind {
                BlockKind::List { ordered, max_nesting } => {
                    BlockKind::List { ordered: *ordered, max_nesting: *max_nesting }
                }
                BlockKind::Blockquote => BlockKind::Blockquote,
                _ => BlockKind::Paragraph,
            };
            Block {
                kind,
                content: piece.to_string(),
                start_line: block.start_line + lines_before,
                end_line: block.start_line + lines_before + piece.matches('\n').count(),
                start_offset: block.start_offset + start,
                end_offset: block.start_offset + end,
            }
        })
        .collect()
}

fn trim_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    Some((start + lead, end - trail))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
