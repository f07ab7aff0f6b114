//! Completeness validation over the final chunk set.
//!
//! Checks line recall, fence balance, and table integrity. In strict mode a
//! failure is an error; otherwise failures become warnings on the result.
//! Per-chunk line sets are computed in parallel; the merged set is
//! order-independent, so the parallelism is not observable.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::block::{Block, BlockKind};
use crate::chunk::{Chunk, OversizeReason};
use crate::config::ChunkConfig;
use crate::error::ChunkerError;
use crate::utils::normalize_whitespace;

/// Minimum recall over non-trivial source lines.
pub const RECALL_THRESHOLD: f64 = 0.95;

/// Lines shorter than this (after whitespace normalization) are trivial and
/// not counted toward recall.
pub const NONTRIVIAL_LINE_LEN: usize = 20;

#[derive(Debug)]
pub struct CompletenessReport {
    pub recall: f64,
    pub missing_line_numbers: Vec<usize>,
    pub warnings: Vec<String>,
    pub passed: bool,
}

/// Validate the chunk set against the source it was built from.
pub fn validate_completeness(
    source: &str,
    blocks: &[Block],
    chunks: &[Chunk],
    config: &ChunkConfig,
) -> Result<CompletenessReport, ChunkerError> {
    let mut warnings = Vec::new();
    let mut passed = true;

    // --- Line recall ---
    let mut wanted: Vec<(usize, String)> = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let normalized = normalize_whitespace(line);
        if normalized.chars().count() >= NONTRIVIAL_LINE_LEN {
            wanted.push((idx + 1, normalized));
        }
    }

    let present: HashSet<String> = chunks
        .par_iter()
        .map(|chunk| {
            chunk
                .content
                .lines()
                .map(normalize_whitespace)
                .filter(|l| l.chars().count() >= NONTRIVIAL_LINE_LEN)
                .collect::<HashSet<String>>()
        })
        .reduce(HashSet::new, |mut acc, set| {
            acc.extend(set);
            acc
        });

    let missing_line_numbers: Vec<usize> = wanted
        .iter()
        .filter(|(_, line)| !present.contains(line))
        .map(|(number, _)| *number)
        .collect();
    let recall = if wanted.is_empty() {
        1.0
    } else {
        (wanted.len() - missing_line_numbers.len()) as f64 / wanted.len() as f64
    };

    if recall < RECALL_THRESHOLD {
        passed = false;
        if config.strict_mode {
            return Err(ChunkerError::IncompleteCoverage {
                recall,
                gap_count: missing_line_numbers.len(),
            });
        }
        tracing::warn!(recall, gaps = missing_line_numbers.len(), "line recall below threshold");
        warnings.push(format!(
            "line recall {recall:.3} below {RECALL_THRESHOLD} ({} line(s) missing)",
            missing_line_numbers.len()
        ));
    }

    // --- Fence balance ---
    for (index, chunk) in chunks.iter().enumerate() {
        let exempt = chunk.metadata.allow_oversize
            && chunk.metadata.oversize_reason == Some(OversizeReason::CodeBlockIntegrity);
        if exempt {
            continue;
        }
        for fence in ["```", "~~~"] {
            let count = chunk
                .content
                .lines()
                .filter(|line| line.starts_with(fence))
                .count();
            if count % 2 != 0 {
                passed = false;
                if config.strict_mode {
                    return Err(ChunkerError::InvalidChunk {
                        index,
                        reason: format!("unbalanced {fence} fence markers"),
                    });
                }
                tracing::warn!(chunk = index, fence, "unbalanced fence markers");
                warnings.push(format!("chunk {index}: unbalanced {fence} fence markers"));
            }
        }
    }

    // --- Table integrity ---
    let table_ids: HashSet<String> =
        blocks.iter().filter(|b| b.is_table()).map(Block::id).collect();
    if !table_ids.is_empty() {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for chunk in chunks {
            for id in &chunk.metadata.block_ids {
                if table_ids.contains(id.as_str()) {
                    *seen.entry(id.as_str()).or_default() += 1;
                }
            }
        }
        for (id, count) in seen {
            if count > 1 {
                passed = false;
                if config.strict_mode {
                    return Err(ChunkerError::InvalidChunk {
                        index: 0,
                        reason: format!("table block {id} appears in {count} chunks"),
                    });
                }
                tracing::warn!(table = id, count, "table block duplicated across chunks");
                warnings.push(format!("table block {id} appears in {count} chunks"));
            }
        }
    }

    // Unclosed fences are survivable but worth flagging.
    for block in blocks {
        if let BlockKind::Code { unclosed: true, .. } = block.kind {
            warnings
                .push(format!("unclosed code fence starting at line {}", block.start_line));
        }
    }

    Ok(CompletenessReport { recall, missing_line_numbers, warnings, passed })
}
