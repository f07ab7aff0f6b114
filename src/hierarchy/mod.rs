//! Hierarchical chunk tree: synthetic root, internal section nodes, leaves.
//!
//! The flat pipeline output stays untouched as the leaf layer; internal
//! chunks mirror sections that have child sections, and one synthetic root
//! spans the document. Downstream filtering decides what is emitted.

use crate::chunk::{Chunk, ChunkMetadata};
use crate::section::{Section, SectionTree};

/// Internal nodes shorter than this are kept but marked non-indexable.
pub const INDEXABLE_MIN_CONTENT: usize = 100;

/// Assemble root + internal + leaf chunks. Leaves keep their original order.
pub fn build_hierarchy(source: &str, leaves: Vec<Chunk>, tree: &SectionTree) -> Vec<Chunk> {
    let root = root_chunk(source);
    let root_id = root.metadata.chunk_id.clone();

    // Internal chunks in depth-first tree order, remembering each one's path
    // so leaves can find their nearest internal ancestor.
    let mut internals: Vec<Chunk> = Vec::new();
    let mut internal_paths: Vec<(Vec<String>, String)> = Vec::new();
    for &idx in &tree.roots {
        collect_internal(tree, idx, &root_id, &mut internals, &mut internal_paths);
    }

    let mut out = Vec::with_capacity(1 + internals.len() + leaves.len());
    out.push(root);
    out.extend(internals);
    for mut leaf in leaves {
        leaf.metadata.is_leaf = Some(true);
        leaf.metadata.is_root = Some(false);
        let parent = internal_paths
            .iter()
            .filter(|(path, _)| {
                leaf.metadata.section_path.len() >= path.len()
                    && leaf.metadata.section_path[..path.len()] == path[..]
            })
            .max_by_key(|(path, _)| path.len())
            .map(|(_, id)| id.clone());
        leaf.metadata.parent_id = Some(parent.unwrap_or_else(|| root_id.clone()));
        out.push(leaf);
    }
    out
}

fn root_chunk(source: &str) -> Chunk {
    let content = source.trim_end_matches('\n').to_string();
    let line_count = content.lines().count().max(1);
    let metadata = ChunkMetadata {
        strategy: "hierarchy".to_string(),
        content_type: "document".to_string(),
        is_root: Some(true),
        is_leaf: Some(false),
        ..ChunkMetadata::default()
    };
    Chunk::new(content, 1, line_count, 0, source.len(), metadata)
}

fn collect_internal(
    tree: &SectionTree,
    idx: usize,
    parent_id: &str,
    internals: &mut Vec<Chunk>,
    internal_paths: &mut Vec<(Vec<String>, String)>,
) {
    let section = tree.section(idx);
    if section.children.is_empty() {
        return;
    }

    let chunk = internal_chunk(section, parent_id);
    let own_id = chunk.metadata.chunk_id.clone();
    internal_paths.push((section.path.clone(), own_id.clone()));
    internals.push(chunk);

    for &child in &section.children {
        collect_internal(tree, child, &own_id, internals, internal_paths);
    }
}

fn internal_chunk(section: &Section, parent_id: &str) -> Chunk {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(header) = &section.header {
        parts.push(header.content.as_str());
    }
    for block in section.blocks.iter().filter(|b| !b.is_blank()) {
        parts.push(block.content.as_str());
    }
    let content = parts.join("\n\n");

    let metadata = ChunkMetadata {
        strategy: "hierarchy".to_string(),
        content_type: "section".to_string(),
        section_path: section.path.clone(),
        header_level: section.header.as_ref().and_then(|h| h.header_level()),
        header_text: section.header.as_ref().and_then(|h| h.header_text().map(str::to_string)),
        is_root: Some(false),
        is_leaf: Some(false),
        parent_id: Some(parent_id.to_string()),
        ..ChunkMetadata::default()
    };
    Chunk::new(content, section.start_line, section.end_line, 0, 0, metadata)
}

/// Fill hierarchy defaults the downstream filters rely on: a chunk without
/// `is_leaf` is a leaf, a chunk without `is_root` is not the root.
pub fn apply_metadata_defaults(chunks: &mut [Chunk]) {
    for (index, chunk) in chunks.iter_mut().enumerate() {
        if chunk.metadata.is_leaf.is_none() {
            tracing::warn!(chunk = index, "missing is_leaf, defaulting to true");
            chunk.metadata.is_leaf = Some(true);
        }
        if chunk.metadata.is_root.is_none() {
            chunk.metadata.is_root = Some(false);
        }
    }
}

/// Stamp `indexable` and filter hierarchical output for consumers.
///
/// Debug mode returns everything. Otherwise the root is excluded, and
/// `leaf_only` further restricts to leaf chunks.
pub fn filter_output(chunks: Vec<Chunk>, debug: bool, leaf_only: bool) -> Vec<Chunk> {
    let mut chunks = chunks;
    for chunk in &mut chunks {
        let metadata = &mut chunk.metadata;
        let indexable = if metadata.is_root == Some(true) {
            false
        } else if metadata.is_leaf != Some(false) {
            true
        } else {
            chunk.content.chars().count() >= INDEXABLE_MIN_CONTENT
        };
        metadata.indexable = Some(indexable);
    }

    if debug {
        return chunks;
    }

    let mut kept: Vec<Chunk> =
        chunks.into_iter().filter(|c| c.metadata.is_root != Some(true)).collect();
    if leaf_only {
        kept.retain(|c| c.metadata.is_leaf != Some(false));
    }
    kept
}
