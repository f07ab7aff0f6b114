//! Sentence-boundary packing, the level-2 fallback.
//!
//! Ignores document structure entirely: the source is segmented into
//! sentences (UAX #29, which handles trailing quotes after `.` `!` `?`) and
//! packed greedily. This level never fails on non-empty input.

use anyhow::Result;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::ContentAnalysis;
use crate::block::{Block, BlockKind};
use crate::chunk::{Chunk, ChunkMetadata, PackedChunk};
use crate::config::ChunkConfig;
use crate::strategy::split::pack_sentence_ranges;
use crate::strategy::{Document, Strategy};
use crate::utils::LineIndex;

pub struct SentenceStrategy;

impl Strategy for SentenceStrategy {
    fn name(&self) -> &'static str {
        "sentences"
    }

    fn can_handle(&self, _analysis: &ContentAnalysis, _config: &ChunkConfig) -> bool {
        // Fallback- and override-only; automatic selection never picks it.
        false
    }

    fn quality(&self, _analysis: &ContentAnalysis) -> f64 {
        0.2
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        let source = doc.source;
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let index = LineIndex::new(source);
        let ranges = pack_sentence_ranges(source, config.max_chunk_size);

        let chunks = ranges
            .into_iter()
            .map(|(start, end)| {
                let content = source[start..end].to_string();
                let blocks = sentence_blocks(source, start, end, &index);
                let metadata = ChunkMetadata {
                    strategy: "sentences".to_string(),
                    content_type: "text".to_string(),
                    block_ids: blocks.iter().map(Block::id).collect(),
                    ..ChunkMetadata::default()
                };
                let chunk = Chunk::new(
                    content,
                    index.line_of(start),
                    index.line_of(end.saturating_sub(1).max(start)),
                    start,
                    end,
                    metadata,
                );
                PackedChunk { chunk, blocks }
            })
            .collect();
        Ok(chunks)
    }
}

/// Pseudo-blocks, one per sentence, so block-based overlap has sentence
/// granularity in fallback mode.
fn sentence_blocks(source: &str, start: usize, end: usize, index: &LineIndex) -> Vec<Block> {
    let slice = &source[start..end];
    slice
        .split_sentence_bounds()
        .filter_map(|sentence| {
            let rel = sentence.as_ptr() as usize - slice.as_ptr() as usize;
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                return None;
            }
            let lead = sentence.len() - sentence.trim_start().len();
            let abs_start = start + rel + lead;
            let abs_end = abs_start + trimmed.len();
            Some(Block {
                // Header-looking segments keep their kind so overlap skips
                // them even in fallback mode.
                kind: classify_segment(trimmed),
                content: trimmed.to_string(),
                start_line: index.line_of(abs_start),
                end_line: index.line_of(abs_end.saturating_sub(1).max(abs_start)),
                start_offset: abs_start,
                end_offset: abs_end,
            })
        })
        .collect()
}

fn classify_segment(text: &str) -> BlockKind {
    let hashes = text.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && text[hashes..].starts_with(' ') && !text.contains('\n') {
        return BlockKind::Header {
            level: hashes as u8,
            text: text[hashes..].trim().to_string(),
        };
    }
    BlockKind::Paragraph
}
