//! Section-aware greedy packing, the primary strategy.
//!
//! A section that fits the budget becomes one chunk. Oversized sections
//! split by child sections first, then by blocks; atomic blocks are emitted
//! whole (oversize) rather than corrupted. The section header travels only
//! with the first chunk of its section; a parent header with no own content
//! is carried down to its first child's first chunk instead of producing a
//! dangling header-only chunk.

use anyhow::Result;

use crate::analysis::ContentAnalysis;
use crate::block::Block;
use crate::chunk::{OversizeReason, PackedChunk};
use crate::config::ChunkConfig;
use crate::section::{classify_preamble, SectionTree};
use crate::strategy::split::{split_list_block, split_text_block};
use crate::strategy::{atomic_reason, chunk_from_blocks, packed_size, Document, Strategy};

pub struct StructuralStrategy;

impl Strategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn can_handle(&self, analysis: &ContentAnalysis, config: &ChunkConfig) -> bool {
        analysis.header_count >= config.header_count_threshold && analysis.has_hierarchy()
    }

    fn quality(&self, analysis: &ContentAnalysis) -> f64 {
        let mut score: f64 = 0.0;

        if analysis.header_count >= 10 {
            score += 0.5;
        } else if analysis.header_count >= 5 {
            score += 0.4;
        } else if analysis.header_count >= 3 {
            score += 0.3;
        }

        if analysis.max_header_depth >= 4 {
            score += 0.3;
        } else if analysis.max_header_depth >= 3 {
            score += 0.2;
        } else if analysis.max_header_depth > 1 {
            score += 0.1;
        }

        if analysis.has_hierarchy() {
            score += 0.2;
        }

        // Heavy code content chunks poorly along headers alone.
        if analysis.code_ratio > 0.5 {
            score *= 0.5;
        }

        score.min(1.0)
    }

    fn apply(&self, doc: &Document<'_>, config: &ChunkConfig) -> Result<Vec<PackedChunk>> {
        let mut out = Vec::new();
        let mut pending: Vec<Block> = Vec::new();
        for &root in &doc.tree.roots {
            chunk_section(doc.tree, root, config, &mut pending, &mut out);
        }
        Ok(out)
    }
}

fn pending_overhead(pending: &[Block]) -> usize {
    if pending.is_empty() {
        0
    } else {
        pending.iter().map(Block::size).sum::<usize>() + 2 * pending.len()
    }
}

fn chunk_section(
    tree: &SectionTree,
    idx: usize,
    config: &ChunkConfig,
    pending: &mut Vec<Block>,
    out: &mut Vec<PackedChunk>,
) {
    let section = tree.section(idx);
    let emitted_before = out.len();
    let total = tree.total_size(idx) + pending_overhead(pending);

    if total <= config.max_chunk_size {
        let mut blocks: Vec<&Block> = pending.iter().collect();
        blocks.extend(tree.subtree_blocks(idx));
        if !blocks.is_empty() {
            out.push(chunk_from_blocks(
                &blocks,
                &section.path,
                "structural",
                "section",
                section.header.as_ref(),
                None,
            ));
            pending.clear();
        }
    } else if !section.children.is_empty() {
        let own = tree.own_blocks(idx);
        if own.is_empty() {
            // Dangling header: carry it into the first child's first chunk.
            if let Some(header) = &section.header {
                pending.push(header.clone());
            }
        } else {
            let mut headers = std::mem::take(pending);
            headers.extend(section.header.iter().cloned());
            pack_blocks(headers, to_owned(&own), &section.path, config, out);
        }
        for &child in &section.children.clone() {
            chunk_section(tree, child, config, pending, out);
        }
    } else if section.packable_count() <= 1 && total <= config.section_oversize_limit() {
        // Splitting would only separate the header from its single block;
        // tolerate a bounded oversize instead.
        let mut blocks: Vec<&Block> = pending.iter().collect();
        blocks.extend(tree.subtree_blocks(idx));
        out.push(chunk_from_blocks(
            &blocks,
            &section.path,
            "structural",
            "section",
            section.header.as_ref(),
            Some(OversizeReason::SectionIntegrity),
        ));
        pending.clear();
    } else {
        let own = tree.own_blocks(idx);
        let mut headers = std::mem::take(pending);
        headers.extend(section.header.iter().cloned());
        pack_blocks(headers, to_owned(&own), &section.path, config, out);
    }

    mark_preamble(tree, idx, config, &mut out[emitted_before..]);
}

fn to_owned(blocks: &[&Block]) -> Vec<Block> {
    blocks.iter().map(|&b| b.clone()).collect()
}

fn mark_preamble(
    tree: &SectionTree,
    idx: usize,
    config: &ChunkConfig,
    emitted: &mut [PackedChunk],
) {
    let section = tree.section(idx);
    if emitted.is_empty() {
        return;
    }
    if section.is_preamble {
        let kind = classify_preamble(&section.blocks).name().to_string();
        for packed in emitted.iter_mut() {
            packed.chunk.metadata.preamble_type = Some(kind.clone());
            if config.separate_preamble_chunk {
                packed.chunk.metadata.is_preamble_chunk = true;
            } else {
                packed.chunk.metadata.has_preamble = true;
            }
        }
    } else if !section.leading.is_empty() {
        let first = &mut emitted[0].chunk.metadata;
        first.has_preamble = true;
        first.preamble_type = Some(classify_preamble(&section.leading).name().to_string());
    }
}

/// Greedy block packer for one section's own blocks.
///
/// `headers` (ancestor dangling headers plus this section's header) ride in
/// the first emitted chunk only. Oversized splittable blocks are expanded
/// into sentence or item pieces first; oversized atomic blocks become their
/// own chunks with the matching integrity reason.
fn pack_blocks(
    headers: Vec<Block>,
    content: Vec<Block>,
    path: &[String],
    config: &ChunkConfig,
    out: &mut Vec<PackedChunk>,
) {
    let header_meta = headers.last().filter(|h| h.is_header()).cloned();
    let header_overhead = pending_overhead(&headers);
    let split_budget = config.max_chunk_size.saturating_sub(header_overhead).max(1);

    let mut entries: Vec<(Block, Option<OversizeReason>)> = Vec::new();
    for block in content {
        if block.size() <= config.max_chunk_size {
            entries.push((block, None));
        } else if block.is_atomic() {
            let reason = atomic_reason(&block);
            entries.push((block, Some(reason)));
        } else if block.is_list() {
            for piece in split_list_block(&block, split_budget) {
                let solo =
                    (piece.size() > config.max_chunk_size).then_some(OversizeReason::AtomicBlock);
                entries.push((piece, solo));
            }
        } else {
            for piece in split_text_block(&block, split_budget) {
                entries.push((piece, None));
            }
        }
    }

    let mut packer = Packer {
        out,
        path,
        header_meta: header_meta.as_ref(),
        buffer: headers,
        buffer_has_content: false,
        first_emitted: false,
    };

    for (block, solo) in entries {
        match solo {
            Some(reason) => packer.emit_solo(block, reason),
            None => packer.push(block, config),
        }
    }
    packer.flush(None);
}

struct Packer<'a> {
    out: &'a mut Vec<PackedChunk>,
    path: &'a [String],
    header_meta: Option<&'a Block>,
    buffer: Vec<Block>,
    buffer_has_content: bool,
    first_emitted: bool,
}

impl Packer<'_> {
    fn push(&mut self, block: Block, config: &ChunkConfig) {
        if !self.buffer_has_content {
            self.buffer.push(block);
            self.buffer_has_content = true;
            // Header plus first block may overflow together; keeping them
            // bound beats a headerless continuation.
            let refs: Vec<&Block> = self.buffer.iter().collect();
            if packed_size(&refs) > config.max_chunk_size {
                self.flush(Some(OversizeReason::SectionIntegrity));
            }
            return;
        }

        let refs: Vec<&Block> = self.buffer.iter().collect();
        if packed_size(&refs) + 2 + block.size() > config.max_chunk_size {
            self.flush(None);
            self.buffer.push(block);
            self.buffer_has_content = true;
        } else {
            self.buffer.push(block);
        }
    }

    fn emit_solo(&mut self, block: Block, reason: OversizeReason) {
        if self.buffer_has_content {
            self.flush(None);
        }
        // Headers still waiting ride with the oversize chunk.
        self.buffer.push(block);
        self.buffer_has_content = true;
        self.flush(Some(reason));
    }

    fn flush(&mut self, reason: Option<OversizeReason>) {
        if !self.buffer_has_content {
            return;
        }
        let refs: Vec<&Block> = self.buffer.iter().collect();
        let header = if self.first_emitted { None } else { self.header_meta };
        self.out.push(chunk_from_blocks(&refs, self.path, "structural", "section", header, reason));
        self.first_emitted = true;
        self.buffer.clear();
        self.buffer_has_content = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::block::extract_blocks;

    fn apply(source: &str, config: &ChunkConfig) -> Vec<PackedChunk> {
        let config = config.clone().validate().expect("valid config");
        let blocks = extract_blocks(source, &config).expect("extract");
        let analysis = analyze(&blocks);
        let tree = SectionTree::build(blocks.clone(), &config);
        let doc = Document { source, blocks: &blocks, tree: &tree, analysis: &analysis };
        StructuralStrategy.apply(&doc, &config).expect("apply")
    }

    #[test]
    fn small_document_is_one_chunk() {
        let chunks = apply("# Title\n\nHello world.\n", &ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk.content, "# Title\n\nHello world.");
        assert_eq!(chunks[0].chunk.metadata.header_text.as_deref(), Some("Title"));
        assert_eq!(chunks[0].chunk.start_line, 1);
        assert_eq!(chunks[0].chunk.end_line, 3);
    }

    #[test]
    fn sections_over_budget_split_by_children() {
        let source = format!(
            "# Root\n\n## A\n\n{}\n\n## B\n\n{}\n",
            "alpha text. ".repeat(30).trim_end(),
            "beta text. ".repeat(30).trim_end()
        );
        let config = ChunkConfig { max_chunk_size: 400, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        assert!(chunks.len() >= 2);
        let paths: Vec<_> =
            chunks.iter().map(|c| c.chunk.metadata.section_path.join("/")).collect();
        assert!(paths.iter().any(|p| p == "Root/A"));
        assert!(paths.iter().any(|p| p == "Root/B"));
    }

    #[test]
    fn dangling_parent_header_rides_with_first_child_chunk() {
        let source = format!(
            "# Root\n\n## A\n\n{}\n\n## B\n\nshort beta\n",
            "alpha text. ".repeat(40).trim_end()
        );
        let config = ChunkConfig { max_chunk_size: 300, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        // No chunk is just the bare root header.
        assert!(chunks.iter().all(|c| c.chunk.content != "# Root"));
        assert!(chunks[0].chunk.content.starts_with("# Root\n\n## A"));
    }

    #[test]
    fn header_text_not_duplicated_across_section_chunks() {
        let body = "Sentence that fills space. ".repeat(40);
        let source = format!("# Only\n\n{}\n", body.trim_end());
        let config = ChunkConfig { max_chunk_size: 300, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        assert!(chunks.len() > 1);
        assert!(chunks[0].chunk.content.starts_with("# Only"));
        for packed in &chunks[1..] {
            assert!(!packed.chunk.content.contains("# Only"));
            assert!(packed.chunk.metadata.header_text.is_none());
            assert_eq!(packed.chunk.metadata.section_path, vec!["Only"]);
        }
    }

    #[test]
    fn huge_code_block_is_oversize_chunk() {
        let source = format!("# C\n\n```python\n{}```\n", "x = 1\n".repeat(200));
        let config = ChunkConfig { max_chunk_size: 500, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        let code_chunk = chunks
            .iter()
            .find(|c| c.chunk.metadata.has_code)
            .expect("code chunk present");
        assert!(code_chunk.chunk.metadata.allow_oversize);
        assert_eq!(
            code_chunk.chunk.metadata.oversize_reason,
            Some(OversizeReason::CodeBlockIntegrity)
        );
        // Fences stay balanced inside the single chunk.
        let fence_count = code_chunk.chunk.content.matches("```").count();
        assert_eq!(fence_count % 2, 0);
    }

    #[test]
    fn huge_table_is_oversize_chunk() {
        let mut table = String::from("| A | B |\n|---|---|\n");
        for i in 0..60 {
            table.push_str(&format!("| row {i} data | value {i} |\n"));
        }
        let source = format!("# T\n\nbefore text\n\n{table}\nafter text\n");
        let config = ChunkConfig { max_chunk_size: 300, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        let table_chunks: Vec<_> =
            chunks.iter().filter(|c| c.chunk.metadata.has_table).collect();
        assert_eq!(table_chunks.len(), 1);
        assert_eq!(
            table_chunks[0].chunk.metadata.oversize_reason,
            Some(OversizeReason::TableIntegrity)
        );
    }

    #[test]
    fn single_block_section_within_tolerance_stays_whole() {
        // Section of ~550 chars against a 500 budget: inside 1.2x tolerance.
        let body = "y".repeat(540);
        let source = format!("# S\n\n{body}\n");
        let config = ChunkConfig { max_chunk_size: 500, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].chunk.metadata.oversize_reason,
            Some(OversizeReason::SectionIntegrity)
        );
    }

    #[test]
    fn oversized_paragraph_splits_into_sentences() {
        let body = "This sentence repeats to fill the section well past budget. ".repeat(30);
        let source = format!("# P\n\n{}\n", body.trim_end());
        let config = ChunkConfig { max_chunk_size: 400, ..ChunkConfig::default() };
        let chunks = apply(&source, &config);
        assert!(chunks.len() > 1);
        for packed in &chunks {
            assert!(
                packed.chunk.size() <= 400 || packed.chunk.metadata.allow_oversize,
                "chunk of {} chars without oversize flag",
                packed.chunk.size()
            );
        }
    }

    #[test]
    fn preamble_chunk_is_marked() {
        let source = "A proper introduction paragraph sits here.\n\n# First\n\nbody text\n";
        let chunks = apply(source, &ChunkConfig::default());
        let preamble = &chunks[0].chunk.metadata;
        assert_eq!(preamble.section_path, vec!["__preamble__"]);
        assert!(preamble.has_preamble);
        assert_eq!(preamble.preamble_type.as_deref(), Some("introduction"));
    }

    #[test]
    fn separate_preamble_flag_marks_chunk_as_preamble() {
        let source = "Author: Jane\nStatus: draft\n\n# First\n\nbody\n";
        let config = ChunkConfig { separate_preamble_chunk: true, ..ChunkConfig::default() };
        let chunks = apply(source, &config);
        let first = &chunks[0].chunk.metadata;
        assert!(first.is_preamble_chunk);
        assert_eq!(first.preamble_type.as_deref(), Some("metadata"));
    }
}
