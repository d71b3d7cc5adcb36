pub mod attributes;
pub mod code_block;
pub mod front_matter;
pub mod parser;
pub mod render;
pub mod synthesize;

use std::ops::Range;
use std::path::PathBuf;

use crate::code_block::CodeBlock;
use crate::front_matter::FrontMatter;
use crate::parser::ParseError;

/// A parsed guide document.
#[derive(Debug, Clone)]
pub struct Guide {
    /// Path the guide was read from (for reporting only).
    pub path: PathBuf,
    /// Front matter consumed by the site generator.
    pub front_matter: FrontMatter,
    /// Text and code segments in document order.
    pub segments: Vec<Segment>,
    /// Non-fatal diagnostics produced while parsing.
    pub warnings: Vec<ParseError>,
    /// The full source text, front matter included.
    pub source: String,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

/// A contiguous span of a guide, either prose or a fenced code block.
#[derive(Debug, Clone)]
pub enum Segment {
    Text(Range<usize>),
    Code(CodeBlock),
}

impl Guide {
    /// All code blocks in document order.
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Code(block) => Some(block),
            Segment::Text(_) => None,
        })
    }

    /// Code blocks the doctest pipeline compiles under the given policy.
    pub fn tested_blocks(
        &self,
        untagged: attributes::UntaggedPolicy,
    ) -> impl Iterator<Item = &CodeBlock> {
        self.code_blocks()
            .filter(move |block| block.run_mode(untagged).is_tested())
    }

    pub fn title(&self) -> Option<&str> {
        self.front_matter.title.as_deref()
    }
}
