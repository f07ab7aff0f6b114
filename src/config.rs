//! Chunking configuration.

use serde::{Deserialize, Serialize};

use crate::error::ChunkerError;

/// Factor by which a section may exceed `max_chunk_size` before block-level
/// splitting becomes mandatory.
pub const SECTION_OVERSIZE_FACTOR: f64 = 1.2;

/// Factor applied to `max_chunk_size` when the size normalizer merges
/// adjacent under-size chunks.
pub const MERGE_SIZE_FACTOR: f64 = 1.5;

const DEFAULT_MIN_CHUNK_SIZE: usize = 512;

/// How overlap context is attached to rendered chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// Context carried as `previous_content` / `next_content` metadata.
    Metadata,
    /// Context embedded directly into the output string.
    Legacy,
}

/// Immutable configuration for one chunking run.
///
/// Construct with [`ChunkConfig::default`] and adjust fields, then call
/// [`ChunkConfig::validate`] (the pipeline does this on entry). Out-of-range
/// sizes are clamped the same way the legacy implementation clamped them;
/// out-of-range ratios are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Soft size target per chunk, in characters. Exceeded only with an
    /// oversize reason.
    pub max_chunk_size: usize,
    /// Merge threshold: adjacent same-section chunks below this coalesce.
    pub min_chunk_size: usize,
    /// Preferred chunk size, kept within `[min_chunk_size, max_chunk_size]`.
    pub target_chunk_size: usize,
    /// Target overlap window, in characters.
    pub overlap_size: usize,
    pub enable_overlap: bool,
    pub overlap_mode: OverlapMode,
    /// Cap on the overlap-to-core ratio.
    pub overlap_percentage: f64,
    pub extract_preamble: bool,
    /// When set, a qualifying preamble is emitted as its own chunk.
    pub separate_preamble_chunk: bool,
    pub preamble_min_size: usize,
    /// Treat 3+ consecutive URL-only lines as one atomic block.
    pub detect_url_pools: bool,
    /// `"auto"` or one of the registered strategy names.
    pub strategy_override: String,
    pub validate_invariants: bool,
    /// Promote completeness warnings to errors.
    pub strict_mode: bool,
    pub code_ratio_threshold: f64,
    pub list_ratio_threshold: f64,
    pub table_ratio_threshold: f64,
    /// Minimum header count before the structural strategy claims a document.
    pub header_count_threshold: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            target_chunk_size: 1536,
            overlap_size: 200,
            enable_overlap: true,
            overlap_mode: OverlapMode::Metadata,
            overlap_percentage: 0.5,
            extract_preamble: true,
            separate_preamble_chunk: false,
            preamble_min_size: 10,
            detect_url_pools: true,
            strategy_override: "auto".to_string(),
            validate_invariants: true,
            strict_mode: false,
            code_ratio_threshold: 0.3,
            list_ratio_threshold: 0.5,
            table_ratio_threshold: 0.25,
            header_count_threshold: 3,
        }
    }
}

impl ChunkConfig {
    /// Preset for documentation with large embedded code samples.
    pub fn for_code_heavy() -> Self {
        Self {
            max_chunk_size: 6144,
            code_ratio_threshold: 0.2,
            ..Self::default()
        }
    }

    /// Preset for RAG ingestion: metadata overlap, moderate windows.
    pub fn for_rag() -> Self {
        Self {
            max_chunk_size: 2048,
            overlap_size: 150,
            overlap_mode: OverlapMode::Metadata,
            ..Self::default()
        }
    }

    /// Clamp sizes into a consistent shape and reject out-of-range ratios.
    ///
    /// The size clamp replicates the legacy behavior exactly: a
    /// `max_chunk_size` below the default `min_chunk_size` pulls
    /// `min_chunk_size` down to `max(1, max_chunk_size / 2)`, and
    /// `target_chunk_size` is then clamped into `[min, max]`.
    pub fn validate(mut self) -> Result<Self, ChunkerError> {
        if self.max_chunk_size == 0 {
            return Err(ChunkerError::InvalidConfig {
                reason: "max_chunk_size must be positive".to_string(),
            });
        }
        for (name, value) in [
            ("overlap_percentage", self.overlap_percentage),
            ("code_ratio_threshold", self.code_ratio_threshold),
            ("list_ratio_threshold", self.list_ratio_threshold),
            ("table_ratio_threshold", self.table_ratio_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ChunkerError::InvalidConfig {
                    reason: format!("{name} must be between 0.0 and 1.0, got {value}"),
                });
            }
        }

        if self.max_chunk_size < DEFAULT_MIN_CHUNK_SIZE {
            self.min_chunk_size = std::cmp::max(1, self.max_chunk_size / 2);
        }
        self.min_chunk_size = self.min_chunk_size.min(self.max_chunk_size).max(1);
        self.target_chunk_size =
            self.target_chunk_size.clamp(self.min_chunk_size, self.max_chunk_size);

        Ok(self)
    }

    /// Overlap is active only when both the switch and the window are set.
    pub fn overlap_enabled(&self) -> bool {
        self.enable_overlap && self.overlap_size > 0
    }

    /// Ceiling for a section emitted whole under the integrity exemption.
    pub fn section_oversize_limit(&self) -> usize {
        (self.max_chunk_size as f64 * SECTION_OVERSIZE_FACTOR) as usize
    }

    /// Ceiling for a normalizer merge of two adjacent chunks.
    pub fn merge_size_limit(&self) -> usize {
        (self.max_chunk_size as f64 * MERGE_SIZE_FACTOR) as usize
    }
}
