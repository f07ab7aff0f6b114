//! Output chunk model and metadata.

use serde::Serialize;

use crate::block::Block;
use crate::utils::{stable_hash, word_count};

/// Why a chunk was allowed to exceed the size budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizeReason {
    CodeBlockIntegrity,
    TableIntegrity,
    SectionIntegrity,
    AtomicBlock,
}

impl OversizeReason {
    pub fn name(&self) -> &'static str {
        match self {
            OversizeReason::CodeBlockIntegrity => "code_block_integrity",
            OversizeReason::TableIntegrity => "table_integrity",
            OversizeReason::SectionIntegrity => "section_integrity",
            OversizeReason::AtomicBlock => "atomic_block",
        }
    }
}

/// Typed chunk metadata. Serialized to JSON in metadata rendering mode;
/// the render stage filters fields for non-debug output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub strategy: String,
    pub content_type: String,
    pub section_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    pub block_ids: Vec<String>,
    pub has_code: bool,
    pub has_table: bool,
    pub has_list: bool,
    pub has_links: bool,
    pub allow_oversize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oversize_reason: Option<OversizeReason>,
    pub has_overlap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_content: Option<String>,
    pub char_count: usize,
    pub line_count: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_strategy_used: Option<String>,
    pub execution_fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_fallback_level: Option<u8>,
    pub has_preamble: bool,
    pub is_preamble_chunk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_root: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_leaf: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One output unit: authoritative body plus provenance and metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    /// 1-based inclusive line range in the normalized source.
    pub start_line: usize,
    pub end_line: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk and stamp the derived fields (id and raw statistics).
    pub fn new(
        content: String,
        start_line: usize,
        end_line: usize,
        start_offset: usize,
        end_offset: usize,
        mut metadata: ChunkMetadata,
    ) -> Self {
        metadata.chunk_id = stable_hash(&content, start_line, end_line);
        metadata.char_count = content.chars().count();
        metadata.line_count = content.lines().count();
        metadata.word_count = word_count(&content);
        Self { content, start_line, end_line, start_offset, end_offset, metadata }
    }

    /// Size in chars, the unit every budget in the pipeline uses.
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Re-derive id and statistics after a content mutation (merge, overlap).
    pub fn refresh_derived(&mut self) {
        self.metadata.chunk_id = stable_hash(&self.content, self.start_line, self.end_line);
        self.metadata.char_count = self.content.chars().count();
        self.metadata.line_count = self.content.lines().count();
        self.metadata.word_count = word_count(&self.content);
    }
}

/// A chunk plus the blocks it was packed from. The block list feeds the
/// overlap manager and the size normalizer; it is dropped before rendering.
#[derive(Debug, Clone)]
pub struct PackedChunk {
    pub chunk: Chunk,
    pub blocks: Vec<Block>,
}
