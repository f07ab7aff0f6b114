//! Structure-aware Markdown chunking for embedding-based retrieval.
//!
//! The pipeline runs in a straight line: block extraction, section tree,
//! strategy dispatch with a fallback chain, header-path validation, size
//! normalization, block-based overlap, completeness validation, rendering.
//! Chunking is computed exactly once per call; rendering is a separate
//! stage, so chunk boundaries never depend on the output mode.
//!
//! ```
//! use markdown_chunker::{ChunkConfig, MarkdownChunker};
//!
//! let chunker = MarkdownChunker::with_defaults();
//! let result = chunker.chunk("# Title\n\nHello world.").unwrap();
//! assert_eq!(result.chunks.len(), 1);
//! ```

pub mod analysis;
pub mod api;
pub mod block;
pub mod chunk;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod overlap;
pub mod postprocess;
pub mod render;
pub mod section;
pub mod strategy;
pub mod utils;
pub mod validate;

pub use chunk::{Chunk, ChunkMetadata, OversizeReason};
pub use config::{ChunkConfig, OverlapMode};
pub use error::ChunkerError;

use analysis::analyze;
use block::extract_blocks;
use chunk::PackedChunk;
use overlap::apply_block_overlap;
use postprocess::{normalize_sizes, validate_header_paths};
use section::SectionTree;
use strategy::{dispatch, Document, StrategyRegistry};
use utils::normalize_newlines;
use validate::validate_completeness;

/// Outcome of one chunking call.
#[derive(Debug)]
pub struct ChunkingResult {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<String>,
    pub strategy_used: String,
    pub fallback_used: bool,
    pub fallback_level: u8,
    /// Line recall measured by the completeness validator (1.0 when
    /// validation is disabled).
    pub recall: f64,
    /// Coarse document classification from the block histogram.
    pub content_type: &'static str,
}

/// The chunking pipeline with a validated configuration.
pub struct MarkdownChunker {
    config: ChunkConfig,
    registry: StrategyRegistry,
}

impl MarkdownChunker {
    /// Validate the configuration and build the pipeline.
    pub fn new(config: ChunkConfig) -> Result<Self, ChunkerError> {
        Ok(Self { config: config.validate()?, registry: StrategyRegistry::standard() })
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default()).expect("default config is valid")
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Chunk a document into the flat (leaf-level) chunk sequence.
    pub fn chunk(&self, input: &str) -> Result<ChunkingResult, ChunkerError> {
        let (result, _, _) = self.run_pipeline(input)?;
        Ok(result)
    }

    /// Chunk a document and wrap the flat sequence in a root/internal/leaf
    /// hierarchy. Boundaries of the leaf chunks are identical to
    /// [`MarkdownChunker::chunk`].
    pub fn chunk_hierarchical(&self, input: &str) -> Result<ChunkingResult, ChunkerError> {
        let (mut result, tree, source) = self.run_pipeline(input)?;
        result.chunks = hierarchy::build_hierarchy(&source, result.chunks, &tree);
        Ok(result)
    }

    /// Render chunks according to the configured overlap mode. Rendering
    /// never changes chunk count or boundaries.
    pub fn render(&self, chunks: &[Chunk]) -> Vec<String> {
        let include_metadata = self.config.overlap_mode == OverlapMode::Metadata;
        render::render_chunks(chunks, include_metadata, false)
    }

    fn run_pipeline(
        &self,
        input: &str,
    ) -> Result<(ChunkingResult, SectionTree, String), ChunkerError> {
        if input.trim().is_empty() {
            return Err(ChunkerError::EmptyInput);
        }
        let source = normalize_newlines(input);

        let blocks = extract_blocks(&source, &self.config)?;
        let analysis = analyze(&blocks);
        let tree = SectionTree::build(blocks.clone(), &self.config);
        let doc = Document { source: &source, blocks: &blocks, tree: &tree, analysis: &analysis };

        let outcome = dispatch(&doc, &self.config, &self.registry)?;
        let mut warnings = outcome.warnings;
        let mut packed: Vec<PackedChunk> = outcome.packed;

        warnings.extend(validate_header_paths(&mut packed));
        let mut packed = normalize_sizes(packed, &self.config);
        apply_block_overlap(&mut packed, &self.config);

        let mut chunks: Vec<Chunk> = packed.into_iter().map(|p| p.chunk).collect();
        for chunk in &mut chunks {
            chunk.metadata.execution_strategy_used = Some(outcome.strategy_used.clone());
            chunk.metadata.execution_fallback_used = outcome.fallback_used;
            chunk.metadata.execution_fallback_level =
                outcome.fallback_used.then_some(outcome.fallback_level);
        }

        let recall = if self.config.validate_invariants {
            let report = validate_completeness(&source, &blocks, &chunks, &self.config)?;
            warnings.extend(report.warnings);
            report.recall
        } else {
            1.0
        };

        if let Some(first) = chunks.first_mut() {
            first.metadata.warnings = warnings.clone();
        }

        let result = ChunkingResult {
            chunks,
            warnings,
            strategy_used: outcome.strategy_used,
            fallback_used: outcome.fallback_used,
            fallback_level: outcome.fallback_level,
            recall,
            content_type: analysis.content_type(),
        };
        Ok((result, tree, source))
    }
}

/// One-shot helper mirroring [`MarkdownChunker::chunk`].
pub fn chunk_markdown(input: &str, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkerError> {
    Ok(MarkdownChunker::new(config.clone())?.chunk(input)?.chunks)
}

/// One-shot helper mirroring [`MarkdownChunker::chunk_hierarchical`].
pub fn chunk_hierarchical(
    input: &str,
    config: &ChunkConfig,
) -> Result<Vec<Chunk>, ChunkerError> {
    Ok(MarkdownChunker::new(config.clone())?.chunk_hierarchical(input)?.chunks)
}
