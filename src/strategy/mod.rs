//! Chunking strategies: trait, registry, and the fallback dispatcher.
//!
//! Each strategy is a value behind a narrow capability trait; a registry maps
//! names to instances and ranks candidates for automatic selection. The
//! dispatcher runs the selected strategy and escalates through the fallback
//! chain instead of propagating strategy panics as exceptions.

mod code;
mod linear;
mod list;
mod mixed;
mod sentences;
mod split;
mod structural;
mod table;

pub use sentences::SentenceStrategy;
pub use structural::StructuralStrategy;

use anyhow::Result;

use crate::analysis::{blocks_have_links, ContentAnalysis};
use crate::block::{Block, BlockKind};
use crate::chunk::{Chunk, ChunkMetadata, OversizeReason, PackedChunk};
use crate::config::ChunkConfig;
use crate::error::ChunkerError;
use crate::section::SectionTree;
use crate::utils::truncate_at_word_boundary;

/// Everything a strategy may look at, read-only.
pub struct Document<'a> {
    pub source: &'a str,
    pub blocks: &'a [Block],
    pub tree: &'a SectionTree,
    pub analysis: &'a ContentAnalysis,
}

/// Narrow capability set every strategy implements.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool;
    /// Selection score in [0, 1]; higher wins among candidates that
    /// `can_handle` the document.
    fn quality(&self, analysis: &ContentAnalysis) -> f64;
    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>>;
}

/// Name-to-instance registry with automatic ranking.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// The standard set, in registration order: structural, code, table,
    /// list, sentences, mixed.
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Box::new(structural::StructuralStrategy),
                Box::new(code::CodeStrategy),
                Box::new(table::TableStrategy),
                Box::new(list::ListStrategy),
                Box::new(sentences::SentenceStrategy),
                Box::new(mixed::MixedStrategy),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies.iter().find(|s| s.name() == name).map(|s| s.as_ref())
    }

    /// Automatic selection from the block histogram: code-heavy documents
    /// prefer code-oriented packing, table-heavy ones prefer table packing,
    /// everything else chunks structurally. Quality ranks the contenders
    /// when more than one claims the document.
    pub fn select_auto(
        &self,
        analysis: &ContentAnalysis,
        config: &ChunkConfig,
    ) -> &dyn Strategy {
        self.strategies
            .iter()
            .filter(|s| matches!(s.name(), "code" | "table"))
            .filter(|s| s.can_handle(analysis, config))
            .max_by(|a, b| {
                a.quality(analysis)
                    .partial_cmp(&b.quality(analysis))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|s| s.as_ref())
            .unwrap_or_else(|| self.get("structural").expect("structural is registered"))
    }
}

/// Result of the dispatch stage, fallback bookkeeping included.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub packed: Vec<PackedChunk>,
    pub strategy_used: String,
    pub fallback_used: bool,
    pub fallback_level: u8,
    pub warnings: Vec<String>,
}

/// Run the selected strategy, escalating through the fallback chain:
/// primary → structural → sentences → emergency chunk.
///
/// An unknown `strategy_override` is an immediate error; failures inside a
/// strategy are recorded and the next level is tried.
pub fn dispatch(
    doc: &Document<'_>,
    config: &ChunkConfig,
    registry: &StrategyRegistry,
) -> Result<ChunkOutcome, ChunkerError> {
    let primary: &dyn Strategy = if config.strategy_override == "auto" {
        registry.select_auto(doc.analysis, config)
    } else {
        registry.get(&config.strategy_override).ok_or_else(|| ChunkerError::StrategyNotFound {
            name: config.strategy_override.clone(),
        })?
    };

    // Fixed escalation levels: 0 = selected strategy, 1 = structural,
    // 2 = sentences.
    let mut chain: Vec<(&dyn Strategy, u8)> = vec![(primary, 0)];
    if primary.name() != "structural" {
        chain.push((registry.get("structural").expect("structural is registered"), 1));
    }
    if primary.name() != "sentences" {
        chain.push((registry.get("sentences").expect("sentences is registered"), 2));
    }

    let mut warnings = Vec::new();
    for (strategy, level) in chain {
        match strategy.apply(doc, config) {
            Ok(packed) if !packed.is_empty() => {
                return Ok(ChunkOutcome {
                    packed,
                    strategy_used: strategy.name().to_string(),
                    fallback_used: level > 0,
                    fallback_level: level,
                    warnings,
                });
            }
            Ok(_) => {
                tracing::warn!(strategy = strategy.name(), "strategy produced no chunks");
                warnings.push(format!("strategy '{}' produced no chunks", strategy.name()));
            }
            Err(err) => {
                let failure = ChunkerError::StrategyFailed {
                    strategy: strategy.name().to_string(),
                    preview: truncate_at_word_boundary(doc.source.trim_start(), 80),
                    source: err.into(),
                };
                tracing::warn!(error = %failure, "strategy failed, escalating");
                warnings.push(failure.to_string());
            }
        }
    }

    // Last resort: one chunk wrapping the entire input.
    warnings.push("all strategies failed; emitting emergency chunk".to_string());
    tracing::warn!("all strategies failed; emitting emergency chunk");
    Ok(ChunkOutcome {
        packed: vec![emergency_chunk(doc.source, config)],
        strategy_used: "emergency".to_string(),
        fallback_used: true,
        fallback_level: 3,
        warnings,
    })
}

fn emergency_chunk(source: &str, config: &ChunkConfig) -> PackedChunk {
    let content = source.trim_end_matches('\n').to_string();
    let line_count = content.lines().count().max(1);
    let oversize = content.chars().count() > config.max_chunk_size;
    let metadata = ChunkMetadata {
        strategy: "emergency".to_string(),
        content_type: "text".to_string(),
        allow_oversize: oversize,
        oversize_reason: oversize.then_some(OversizeReason::AtomicBlock),
        ..ChunkMetadata::default()
    };
    let chunk = Chunk::new(content, 1, line_count, 0, source.len(), metadata);
    PackedChunk { chunk, blocks: Vec::new() }
}

/// Build a chunk from whole blocks, stamping the shared metadata fields.
/// Blank blocks must already be filtered out by the caller.
pub(crate) fn chunk_from_blocks(
    blocks: &[&Block],
    path: &[String],
    strategy: &'static str,
    content_type: &str,
    header: Option<&Block>,
    oversize_reason: Option<OversizeReason>,
) -> PackedChunk {
    debug_assert!(!blocks.is_empty(), "chunk needs at least one block");

    let content: String =
        blocks.iter().map(|b| b.content.as_str()).collect::<Vec<_>>().join("\n\n");
    let start_line = blocks.iter().map(|b| b.start_line).min().unwrap_or(1);
    let end_line = blocks.iter().map(|b| b.end_line).max().unwrap_or(start_line);
    let start_offset = blocks.iter().map(|b| b.start_offset).min().unwrap_or(0);
    let end_offset = blocks.iter().map(|b| b.end_offset).max().unwrap_or(start_offset);

    let metadata = ChunkMetadata {
        strategy: strategy.to_string(),
        content_type: content_type.to_string(),
        section_path: path.to_vec(),
        header_level: header.and_then(Block::header_level),
        header_text: header.and_then(|h| h.header_text().map(str::to_string)),
        block_ids: blocks.iter().map(|b| b.id()).collect(),
        has_code: blocks.iter().any(|b| b.is_code()),
        has_table: blocks.iter().any(|b| b.is_table()),
        has_list: blocks.iter().any(|b| b.is_list()),
        has_links: blocks_have_links(blocks),
        allow_oversize: oversize_reason.is_some(),
        oversize_reason,
        ..ChunkMetadata::default()
    };

    let chunk = Chunk::new(content, start_line, end_line, start_offset, end_offset, metadata);
    PackedChunk { chunk, blocks: blocks.iter().map(|&b| b.clone()).collect() }
}

/// Oversize reason for an atomic block that must be emitted whole.
pub(crate) fn atomic_reason(block: &Block) -> OversizeReason {
    match block.kind {
        BlockKind::Code { .. } => OversizeReason::CodeBlockIntegrity,
        BlockKind::Table => OversizeReason::TableIntegrity,
        _ => OversizeReason::AtomicBlock,
    }
}

/// Size of `blocks` once joined with blank-line separators.
pub(crate) fn packed_size(blocks: &[&Block]) -> usize {
    if blocks.is_empty() {
        return 0;
    }
    blocks.iter().map(|b| b.size()).sum::<usize>() + 2 * (blocks.len() - 1)
}
