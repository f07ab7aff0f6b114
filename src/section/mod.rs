//! Header-rooted section tree.
//!
//! Sections live in a flat arena; parent/child links are indices, so the
//! tree stays a pure tree with no owning back-pointers. Paths are computed
//! once at build time by extending the parent's path.

use crate::block::Block;
use crate::config::ChunkConfig;

/// Path element used for the synthetic leading section.
pub const PREAMBLE_PATH: &str = "__preamble__";

/// How a leading non-header run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreambleKind {
    /// Key/value front-matter style lines.
    Metadata,
    /// Ordinary introductory prose.
    Introduction,
}

impl PreambleKind {
    pub fn name(&self) -> &'static str {
        match self {
            PreambleKind::Metadata => "metadata",
            PreambleKind::Introduction => "introduction",
        }
    }
}

/// One node of the section tree.
#[derive(Debug, Clone)]
pub struct Section {
    /// Absent for the synthetic preamble section.
    pub header: Option<Block>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Content blocks owned by this section, not by descendants.
    pub blocks: Vec<Block>,
    /// Non-qualifying preamble folded into this section's first chunk.
    pub leading: Vec<Block>,
    pub start_line: usize,
    pub end_line: usize,
    /// Root-to-self header texts; empty texts are dropped.
    pub path: Vec<String>,
    pub is_preamble: bool,
}

impl Section {
    fn content_blocks(&self) -> impl Iterator<Item = &Block> {
        self.leading.iter().chain(self.blocks.iter()).filter(|b| !b.is_blank())
    }

    /// Number of packable (non-blank) blocks, header excluded.
    pub fn packable_count(&self) -> usize {
        self.content_blocks().count()
    }
}

/// Arena-backed tree of sections.
#[derive(Debug)]
pub struct SectionTree {
    pub nodes: Vec<Section>,
    pub roots: Vec<usize>,
}

impl SectionTree {
    /// Fold the block sequence into a tree.
    ///
    /// Headers open sections via a level stack; non-header blocks attach to
    /// the innermost open section. The leading non-header run becomes the
    /// synthetic preamble section when it qualifies, otherwise it is folded
    /// into the first real section. Sections left with no content and no
    /// children are pruned.
    pub fn build(blocks: Vec<Block>, config: &ChunkConfig) -> SectionTree {
        let mut builder = TreeBuilder::default();
        let mut pending_leading: Vec<Block> = Vec::new();
        let mut seen_header = false;

        for block in blocks {
            if block.is_header() {
                seen_header = true;
                builder.open_section(block);
            } else if seen_header {
                builder.attach(block);
            } else {
                pending_leading.push(block);
            }
        }

        builder.place_leading(pending_leading, config);
        builder.finish()
    }

    pub fn section(&self, idx: usize) -> &Section {
        &self.nodes[idx]
    }

    /// Rendered size of the section's own content: header plus own blocks
    /// joined by blank lines.
    pub fn own_size(&self, idx: usize) -> usize {
        let section = &self.nodes[idx];
        let sizes: Vec<usize> = section
            .header
            .iter()
            .map(Block::size)
            .chain(section.content_blocks().map(Block::size))
            .collect();
        joined_size(&sizes)
    }

    /// Rendered size of the whole subtree.
    pub fn total_size(&self, idx: usize) -> usize {
        let sizes = self.subtree_sizes(idx);
        joined_size(&sizes)
    }

    fn subtree_sizes(&self, idx: usize) -> Vec<usize> {
        let section = &self.nodes[idx];
        let mut sizes: Vec<usize> = section
            .header
            .iter()
            .map(Block::size)
            .chain(section.content_blocks().map(Block::size))
            .collect();
        for &child in &section.children {
            sizes.extend(self.subtree_sizes(child));
        }
        sizes
    }

    /// All content blocks of the subtree in source order: folded leading run,
    /// header, own blocks, then children.
    pub fn subtree_blocks(&self, idx: usize) -> Vec<&Block> {
        let section = &self.nodes[idx];
        let mut out: Vec<&Block> = Vec::new();
        out.extend(section.leading.iter().filter(|b| !b.is_blank()));
        out.extend(section.header.iter());
        out.extend(section.blocks.iter().filter(|b| !b.is_blank()));
        for &child in &section.children {
            out.extend(self.subtree_blocks(child));
        }
        out
    }

    /// Own packable blocks in source order (folded leading run first).
    pub fn own_blocks(&self, idx: usize) -> Vec<&Block> {
        let section = &self.nodes[idx];
        section
            .leading
            .iter()
            .filter(|b| !b.is_blank())
            .chain(section.blocks.iter().filter(|b| !b.is_blank()))
            .collect()
    }
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<Section>,
    roots: Vec<usize>,
    stack: Vec<usize>,
}

impl TreeBuilder {
    fn open_section(&mut self, header: Block) {
        let level = header.header_level().unwrap_or(1);
        while let Some(&top) = self.stack.last() {
            if self.nodes[top].header.as_ref().and_then(Block::header_level).unwrap_or(0) >= level {
                self.stack.pop();
            } else {
                break;
            }
        }

        let parent = self.stack.last().copied();
        let mut path = match parent {
            Some(p) => self.nodes[p].path.clone(),
            None => Vec::new(),
        };
        if let Some(text) = header.header_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                path.push(trimmed.to_string());
            }
        }

        let idx = self.nodes.len();
        self.nodes.push(Section {
            start_line: header.start_line,
            end_line: header.end_line,
            header: Some(header),
            parent,
            children: Vec::new(),
            blocks: Vec::new(),
            leading: Vec::new(),
            path,
            is_preamble: false,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        self.stack.push(idx);
    }

    fn attach(&mut self, block: Block) {
        let top = *self.stack.last().expect("attach requires an open section");
        self.nodes[top].end_line = self.nodes[top].end_line.max(block.end_line);
        self.nodes[top].blocks.push(block);
    }

    fn place_leading(&mut self, leading: Vec<Block>, config: &ChunkConfig) {
        let content: Vec<&Block> = leading.iter().filter(|b| !b.is_blank()).collect();
        if content.is_empty() {
            return;
        }
        let size: usize = content.iter().map(|b| b.size()).sum();

        // A document without any header is one big preamble regardless of
        // the configured minimum.
        let qualifies = self.nodes.is_empty()
            || (config.extract_preamble && size >= config.preamble_min_size);

        if qualifies {
            let start_line = leading.first().map(|b| b.start_line).unwrap_or(1);
            let end_line = leading.last().map(|b| b.end_line).unwrap_or(1);
            let idx = self.nodes.len();
            self.nodes.push(Section {
                header: None,
                parent: None,
                children: Vec::new(),
                blocks: leading,
                leading: Vec::new(),
                start_line,
                end_line,
                path: vec![PREAMBLE_PATH.to_string()],
                is_preamble: true,
            });
            self.roots.insert(0, idx);
        } else if let Some(&first_root) = self.roots.first() {
            self.nodes[first_root].leading = leading;
            self.nodes[first_root].start_line =
                self.nodes[first_root].leading.first().map(|b| b.start_line).unwrap_or(1);
        }
    }

    fn finish(mut self) -> SectionTree {
        self.propagate_end_lines();
        self.prune_empty();
        SectionTree { nodes: self.nodes, roots: self.roots }
    }

    fn propagate_end_lines(&mut self) {
        // Children are created after their parents, so a reverse sweep sees
        // every child before its parent.
        for idx in (0..self.nodes.len()).rev() {
            let end = self.nodes[idx].end_line;
            if let Some(parent) = self.nodes[idx].parent {
                self.nodes[parent].end_line = self.nodes[parent].end_line.max(end);
            }
        }
    }

    fn prune_empty(&mut self) {
        let mut keep = vec![true; self.nodes.len()];
        // Reverse order so a parent sees its children's final state.
        for idx in (0..self.nodes.len()).rev() {
            let node = &self.nodes[idx];
            let has_children = node.children.iter().any(|&c| keep[c]);
            let has_content = node.packable_count() > 0;
            if !has_children && !has_content {
                keep[idx] = false;
            }
        }

        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut compacted: Vec<Section> = Vec::new();
        for (idx, node) in self.nodes.drain(..).enumerate() {
            if keep[idx] {
                remap[idx] = compacted.len();
                compacted.push(node);
            }
        }
        for node in &mut compacted {
            node.parent = node.parent.and_then(|p| {
                if remap[p] == usize::MAX {
                    None
                } else {
                    Some(remap[p])
                }
            });
            node.children = node
                .children
                .iter()
                .filter(|&&c| remap[c] != usize::MAX)
                .map(|&c| remap[c])
                .collect();
        }
        self.roots = self
            .roots
            .iter()
            .filter(|&&r| remap[r] != usize::MAX)
            .map(|&r| remap[r])
            .collect();
        self.nodes = compacted;
    }
}

fn joined_size(sizes: &[usize]) -> usize {
    if sizes.is_empty() {
        return 0;
    }
    sizes.iter().sum::<usize>() + 2 * (sizes.len() - 1)
}

/// Classify a leading run as front-matter style metadata or prose.
pub fn classify_preamble(blocks: &[Block]) -> PreambleKind {
    let mut metadata_lines = 0;
    let mut total_lines = 0;
    for block in blocks.iter().filter(|b| !b.is_blank()) {
        for line in block.content.lines().filter(|l| !l.trim().is_empty()) {
            total_lines += 1;
            if looks_like_metadata_line(line) {
                metadata_lines += 1;
            }
        }
    }
    if total_lines > 0 && metadata_lines * 2 > total_lines {
        PreambleKind::Metadata
    } else {
        PreambleKind::Introduction
    }
}

fn looks_like_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();
    match trimmed.split_once(':') {
        Some((key, value)) => {
            !key.is_empty()
                && key.len() <= 40
                && key.chars().all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-')
                && !value.trim().is_empty()
        }
        None => false,
    }
}
