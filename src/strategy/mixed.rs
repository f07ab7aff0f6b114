//! Plain block packing without section recursion. The universal baseline.

use anyhow::Result;

use crate::analysis::ContentAnalysis;
use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::strategy::linear::{pack_linear, Affinity};
use crate::strategy::{Document, Strategy};

pub struct MixedStrategy;

impl Strategy for MixedStrategy {
    fn name(&self) -> &'static str {
        "mixed"
    }

    fn can_handle(&self, _analysis: &ContentAnalysis, _config: &ChunkConfig) -> bool {
        // Override-only: never claims a document during automatic selection.
        false
    }

    fn quality(&self, _analysis: &ContentAnalysis) -> f64 {
        0.35
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        Ok(pack_linear(doc, config, "mixed", "mixed", Affinity::None))
    }
}
