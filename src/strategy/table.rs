//! Table-oriented packing for table-heavy documents.

use anyhow::Result;

use crate::analysis::ContentAnalysis;
use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::strategy::linear::{pack_linear, Affinity};
use crate::strategy::{Document, Strategy};

/// Groups each table with a preceding context block when the pair fits.
/// Tables are never split into row groups; an oversized table becomes a
/// single oversize chunk.
pub struct TableStrategy;

impl Strategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.table_count >= 1 && analysis.table_ratio >= config.table_ratio_threshold
    }

    fn quality(&self, analysis: &ContentAnalysis) -> f64 {
        (0.5 + 0.4 * analysis.table_ratio).min(0.9)
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        Ok(pack_linear(doc, config, "table", "table", Affinity::Table))
    }
}
