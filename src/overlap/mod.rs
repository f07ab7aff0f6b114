//! Block-based overlap windows.
//!
//! Overlap is computed after chunking from whole blocks only: headers,
//! blanks, code and tables never appear in a window, which also keeps
//! overlap from crossing section boundaries. When a single eligible block
//! alone exceeds the ratio cap it is trimmed at a word boundary instead of
//! dropped, so adjacent prose chunks always share context. Windows land in
//! chunk metadata (`previous_content` / `next_content`); the render stage
//! decides how they are presented.

use unicode_segmentation::UnicodeSegmentation;

use crate::block::Block;
use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::utils::truncate_at_word_boundary;

/// Attach overlap windows to every adjacent chunk pair.
pub fn apply_block_overlap(packed: &mut [PackedChunk], config: &ChunkConfig) {
    if !config.overlap_enabled() || packed.len() < 2 {
        return;
    }

    let mut windows: Vec<(Option<String>, Option<String>)> = Vec::with_capacity(packed.len());
    for i in 0..packed.len() {
        let core_size = packed[i].chunk.size();
        let previous = if i > 0 {
            window(&packed[i - 1].blocks, core_size, config, Side::Trailing)
        } else {
            None
        };
        let next = if i + 1 < packed.len() {
            window(&packed[i + 1].blocks, core_size, config, Side::Leading)
        } else {
            None
        };
        windows.push((previous, next));
    }

    for (packed_chunk, (previous, next)) in packed.iter_mut().zip(windows) {
        if previous.is_some() || next.is_some() {
            packed_chunk.chunk.metadata.has_overlap = true;
        }
        packed_chunk.chunk.metadata.previous_content = previous;
        packed_chunk.chunk.metadata.next_content = next;
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    /// Tail of the previous chunk; the suffix is what matters.
    Trailing,
    /// Head of the next chunk; the prefix is what matters.
    Leading,
}

fn window(
    blocks: &[Block],
    core_size: usize,
    config: &ChunkConfig,
    side: Side,
) -> Option<String> {
    let mut selected: Vec<&Block> = Vec::new();
    let mut total = 0usize;

    let eligible: Vec<&Block> = blocks.iter().filter(|b| b.overlap_eligible()).collect();
    let ordered: Box<dyn Iterator<Item = &&Block>> = match side {
        Side::Trailing => Box::new(eligible.iter().rev()),
        Side::Leading => Box::new(eligible.iter()),
    };
    for &block in ordered {
        match side {
            Side::Trailing => selected.insert(0, block),
            Side::Leading => selected.push(block),
        }
        total += block.size();
        if total >= config.overlap_size {
            break;
        }
    }

    // Ratio cap against the receiving chunk's core: drop the blocks farthest
    // from the boundary first.
    let cap = (config.overlap_percentage * core_size as f64).floor() as usize;
    while selected.len() > 1 && total > cap {
        let removed = match side {
            Side::Trailing => selected.remove(0),
            Side::Leading => selected.pop().expect("non-empty selection"),
        };
        total -= removed.size();
    }
    let single = match selected.as_slice() {
        [] => return None,
        [only] => *only,
        _ => {
            return Some(
                selected.iter().map(|b| b.content.as_str()).collect::<Vec<_>>().join("\n\n"),
            );
        }
    };

    if total <= cap {
        return Some(single.content.clone());
    }

    // One block left and still over the cap: trim toward the target window
    // at a word boundary rather than losing the context entirely.
    let target = cap.min(config.overlap_size.max(1));
    if target == 0 {
        return None;
    }
    let trimmed = match side {
        Side::Trailing => suffix_at_word_boundary(&single.content, target),
        Side::Leading => truncate_at_word_boundary(&single.content, target),
    };
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Last `max_chars` of `text`, extended-trim: a partial word at the cut is
/// dropped so the window starts cleanly.
fn suffix_at_word_boundary(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let skip = total - max_chars;
    let byte_start = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let candidate = &text[byte_start..];

    let cut_mid_word = !text[..byte_start].ends_with(char::is_whitespace)
        && !candidate.starts_with(char::is_whitespace);
    if !cut_mid_word {
        return candidate.trim_start().to_string();
    }
    match candidate.split_word_bound_indices().nth(1) {
        Some((idx, _)) => candidate[idx..].trim_start().to_string(),
        None => candidate.to_string(),
    }
}
