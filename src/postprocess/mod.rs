//! Post-chunking passes: header-path validation and size normalization.
//!
//! Both passes succeed or no-op; per-chunk problems downgrade to warnings
//! because input that survived the chunker must not fail here.

use crate::chunk::PackedChunk;
use crate::config::ChunkConfig;
use crate::section::PREAMBLE_PATH;
use crate::utils::kebab_case;

/// Normalize `section_path` metadata and assign stable section ids.
///
/// Empty or whitespace path elements are stripped (with a warning), the
/// section id is the kebab-cased joined path, and the preamble keeps its
/// sentinel path with no id.
pub fn validate_header_paths(packed: &mut [PackedChunk]) -> Vec<String> {
    let mut warnings = Vec::new();

    for (index, packed_chunk) in packed.iter_mut().enumerate() {
        let metadata = &mut packed_chunk.chunk.metadata;
        let before = metadata.section_path.len();
        metadata.section_path.retain(|part| !part.trim().is_empty());
        if metadata.section_path.len() != before {
            tracing::warn!(chunk = index, "dropped empty section_path element");
            warnings.push(format!("chunk {index}: dropped empty section_path element"));
        }
        for part in &mut metadata.section_path {
            let trimmed = part.trim();
            if trimmed.len() != part.len() {
                *part = trimmed.to_string();
            }
        }

        if metadata.section_path == [PREAMBLE_PATH] {
            metadata.section_id = None;
            continue;
        }
        let id = kebab_case(&metadata.section_path.join("-"));
        metadata.section_id = if id.is_empty() { None } else { Some(id) };
    }

    warnings
}

/// Merge adjacent under-size chunks from the same section.
///
/// Two neighbors coalesce when they share a `section_path`, neither is
/// oversize, the merged size stays within the merge ceiling, and at least
/// one of them is below `min_chunk_size`.
pub fn normalize_sizes(packed: Vec<PackedChunk>, config: &ChunkConfig) -> Vec<PackedChunk> {
    if packed.len() < 2 {
        return packed;
    }

    let mut result: Vec<PackedChunk> = Vec::with_capacity(packed.len());
    for current in packed {
        let Some(last) = result.last_mut() else {
            result.push(current);
            continue;
        };

        if can_merge(last, &current, config) {
            merge_into(last, current);
        } else {
            result.push(current);
        }
    }
    result
}

fn can_merge(left: &PackedChunk, right: &PackedChunk, config: &ChunkConfig) -> bool {
    let (a, b) = (&left.chunk, &right.chunk);
    if a.metadata.section_path != b.metadata.section_path {
        return false;
    }
    if a.metadata.allow_oversize || b.metadata.allow_oversize {
        return false;
    }
    if a.size() + 2 + b.size() > config.merge_size_limit() {
        return false;
    }
    a.size() < config.min_chunk_size || b.size() < config.min_chunk_size
}

fn merge_into(left: &mut PackedChunk, right: PackedChunk) {
    let a = &mut left.chunk;
    let b = right.chunk;

    a.content = format!("{}\n\n{}", a.content, b.content);
    a.end_line = b.end_line;
    a.end_offset = b.end_offset;
    a.metadata.block_ids.extend(b.metadata.block_ids);
    a.metadata.has_code |= b.metadata.has_code;
    a.metadata.has_table |= b.metadata.has_table;
    a.metadata.has_list |= b.metadata.has_list;
    a.metadata.has_links |= b.metadata.has_links;
    a.metadata.has_preamble |= b.metadata.has_preamble;
    a.refresh_derived();

    left.blocks.extend(right.blocks);
}
