//! Code-oriented packing for code-heavy documents.

use anyhow::Result;

use crate::analysis::ContentAnalysis;
use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::strategy::linear::{pack_linear, Affinity};
use crate::strategy::{Document, Strategy};

/// Keeps each code block with at least one preceding context block when the
/// pair fits, and never splits a fence.
pub struct CodeStrategy;

impl Strategy for CodeStrategy {
    fn name(&self) -> &'static str {
        "code"
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.code_block_count >= 1 && analysis.code_ratio >= config.code_ratio_threshold
    }

    fn quality(&self, analysis: &ContentAnalysis) -> f64 {
        (0.5 + 0.45 * analysis.code_ratio).min(0.95)
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        Ok(pack_linear(doc, config, "code", "code", Affinity::Code))
    }
}
