//! List-oriented packing for list-heavy documents.

use anyhow::Result;

use crate::analysis::ContentAnalysis;
use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::strategy::linear::{pack_linear, Affinity};
use crate::strategy::{Document, Strategy};

/// Packs at item boundaries; oversized lists split between top-level items
/// and never mid-item.
pub struct ListStrategy;

impl Strategy for ListStrategy {
    fn name(&self) -> &'static str {
        "list"
    }

    fn can_handle(&self, _analysis: &ContentAnalysis, _config: &ChunkConfig) -> bool {
        // Override-only: automatic selection routes list-heavy documents
        // through the structural strategy.
        false
    }

    fn quality(&self, analysis: &ContentAnalysis) -> f64 {
        (0.45 + 0.4 * analysis.list_ratio).min(0.85)
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        Ok(pack_linear(doc, config, "list", "list", Affinity::None))
    }
}
