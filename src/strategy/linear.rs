//! Shared linear packer for the non-recursive strategies.
//!
//! Walks the document's blocks in order, headers inline, and packs greedily.
//! An affinity kind keeps an atomic block together with one preceding context
//! block when both fit a fresh chunk.

use crate::block::{Block, BlockKind};
use crate::chunk::{OversizeReason, PackedChunk};
use crate::config::ChunkConfig;
use crate::strategy::split::{split_list_block, split_text_block};
use crate::strategy::{atomic_reason, chunk_from_blocks, packed_size, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Affinity {
    None,
    Code,
    Table,
}

impl Affinity {
    fn matches(&self, block: &Block) -> bool {
        match self {
            Affinity::None => false,
            Affinity::Code => block.is_code(),
            Affinity::Table => block.is_table(),
        }
    }
}

pub(crate) fn pack_linear(
    doc: &Document<'_>,
    config: &ChunkConfig,
    strategy: &'static str,
    content_type: &'static str,
    affinity: Affinity,
) -> Vec<PackedChunk> {
    let mut out: Vec<PackedChunk> = Vec::new();
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut buffer: Vec<Block> = Vec::new();
    let mut buffer_path: Vec<String> = Vec::new();

    let flush = |buffer: &mut Vec<Block>,
                     path: &[String],
                     out: &mut Vec<PackedChunk>,
                     reason: Option<OversizeReason>| {
        if buffer.is_empty() {
            return;
        }
        let refs: Vec<&Block> = buffer.iter().collect();
        out.push(chunk_from_blocks(&refs, path, strategy, content_type, None, reason));
        buffer.clear();
    };

    for block in doc.blocks.iter().filter(|b| !b.is_blank()) {
        if let BlockKind::Header { level, text } = &block.kind {
            // Section boundary: never let a chunk run across an incoming
            // header when it already holds content.
            if buffer.iter().any(|b| !b.is_header()) {
                flush(&mut buffer, &buffer_path, &mut out, None);
            }
            stack.retain(|(l, _)| l < level);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                stack.push((*level, trimmed.to_string()));
            }
        }

        let pieces: Vec<(Block, Option<OversizeReason>)> =
            if block.size() <= config.max_chunk_size {
                vec![(block.clone(), None)]
            } else if block.is_atomic() {
                vec![(block.clone(), Some(atomic_reason(block)))]
            } else if block.is_list() {
                split_list_block(block, config.max_chunk_size)
                    .into_iter()
                    .map(|p| {
                        let solo = (p.size() > config.max_chunk_size)
                            .then_some(OversizeReason::AtomicBlock);
                        (p, solo)
                    })
                    .collect()
            } else {
                split_text_block(block, config.max_chunk_size)
                    .into_iter()
                    .map(|p| (p, None))
                    .collect()
            };

        for (piece, solo) in pieces {
            if buffer.is_empty() {
                buffer_path = stack.iter().map(|(_, t)| t.clone()).collect();
            }

            if let Some(reason) = solo {
                // Headers, and for affinity kinds one context block, ride
                // with the oversize chunk; anything more is flushed first.
                let content_count = buffer.iter().filter(|b| !b.is_header()).count();
                let keep_context = affinity.matches(&piece)
                    && buffer.last().map(|last| !last.is_header() && !affinity.matches(last))
                        == Some(true);
                if content_count > 0 && !(keep_context && content_count == 1) {
                    if keep_context {
                        let context = buffer.pop().expect("non-empty buffer");
                        flush(&mut buffer, &buffer_path, &mut out, None);
                        buffer_path = stack.iter().map(|(_, t)| t.clone()).collect();
                        buffer.push(context);
                    } else {
                        flush(&mut buffer, &buffer_path, &mut out, None);
                        buffer_path = stack.iter().map(|(_, t)| t.clone()).collect();
                    }
                }
                buffer.push(piece);
                flush(&mut buffer, &buffer_path, &mut out, Some(reason));
                continue;
            }

            if buffer.is_empty() {
                buffer.push(piece);
                continue;
            }

            let refs: Vec<&Block> = buffer.iter().collect();
            if packed_size(&refs) + 2 + piece.size() <= config.max_chunk_size {
                buffer.push(piece);
                continue;
            }

            // Budget exceeded: keep one context block with an affinity block
            // when the pair fits a fresh chunk.
            let keep_context = affinity.matches(&piece)
                && buffer.len() > 1
                && buffer.last().map(|last| !affinity.matches(last)) == Some(true)
                && buffer.last().map(Block::size).unwrap_or(0) + 2 + piece.size()
                    <= config.max_chunk_size;

            if keep_context {
                let context = buffer.pop().expect("non-empty buffer");
                flush(&mut buffer, &buffer_path, &mut out, None);
                buffer_path = stack.iter().map(|(_, t)| t.clone()).collect();
                buffer.push(context);
                buffer.push(piece);
            } else {
                flush(&mut buffer, &buffer_path, &mut out, None);
                buffer_path = stack.iter().map(|(_, t)| t.clone()).collect();
                buffer.push(piece);
            }
        }
    }

    flush(&mut buffer, &buffer_path, &mut out, None);
    out
}
