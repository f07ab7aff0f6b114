//! Block-histogram analysis used for strategy selection.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::{Block, BlockKind};

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://|www\.|\[[^\]]+\]\([^)]+\)").expect("valid regex"));

/// Aggregate shape of a document, computed once from its blocks.
#[derive(Debug, Clone, Default)]
pub struct ContentAnalysis {
    pub total_lines: usize,
    pub total_chars: usize,
    pub header_count: usize,
    pub max_header_depth: u8,
    pub code_block_count: usize,
    pub code_lines: usize,
    pub table_count: usize,
    pub table_lines: usize,
    pub list_count: usize,
    pub list_lines: usize,
    pub paragraph_count: usize,
    pub url_pool_count: usize,
    pub has_links: bool,
    pub code_ratio: f64,
    pub table_ratio: f64,
    pub list_ratio: f64,
}

impl ContentAnalysis {
    /// More than one header level present.
    pub fn has_hierarchy(&self) -> bool {
        self.max_header_depth > 1
    }

    /// Coarse label for result metadata.
    pub fn content_type(&self) -> &'static str {
        if self.code_ratio >= 0.5 {
            "code_heavy"
        } else if self.table_ratio >= 0.5 {
            "table_heavy"
        } else if self.list_ratio >= 0.5 {
            "list_heavy"
        } else if self.header_count >= 3 {
            "structured"
        } else if self.code_block_count + self.table_count + self.list_count > 0 {
            "mixed"
        } else {
            "plain"
        }
    }
}

/// Walk the blocks once and tally the histogram.
pub fn analyze(blocks: &[Block]) -> ContentAnalysis {
    let mut analysis = ContentAnalysis::default();

    for block in blocks {
        let lines = block.end_line - block.start_line + 1;
        analysis.total_lines += lines;
        analysis.total_chars += block.size();

        match &block.kind {
            BlockKind::Header { level, .. } => {
                analysis.header_count += 1;
                analysis.max_header_depth = analysis.max_header_depth.max(*level);
            }
            BlockKind::Code { .. } => {
                analysis.code_block_count += 1;
                analysis.code_lines += lines;
            }
            BlockKind::Table => {
                analysis.table_count += 1;
                analysis.table_lines += lines;
            }
            BlockKind::List { .. } => {
                analysis.list_count += 1;
                analysis.list_lines += lines;
            }
            BlockKind::Paragraph | BlockKind::Blockquote => {
                analysis.paragraph_count += 1;
            }
            BlockKind::UrlPool => {
                analysis.url_pool_count += 1;
                analysis.has_links = true;
            }
            BlockKind::Blank => {}
        }

        if !analysis.has_links && LINK_PATTERN.is_match(&block.content) {
            analysis.has_links = true;
        }
    }

    if analysis.total_lines > 0 {
        let total = analysis.total_lines as f64;
        analysis.code_ratio = analysis.code_lines as f64 / total;
        analysis.table_ratio = analysis.table_lines as f64 / total;
        analysis.list_ratio = analysis.list_lines as f64 / total;
    }

    analysis
}

/// Whether any of the given blocks carries a link.
pub fn blocks_have_links(blocks: &[&Block]) -> bool {
    blocks.iter().any(|b| {
        matches!(b.kind, BlockKind::UrlPool) || LINK_PATTERN.is_match(&b.content)
    })
}
