//! The presentation side of hidden lines: a guide as readers see it.

use crate::attributes::{Language, UntaggedPolicy};
use crate::code_block::CodeBlock;
use crate::{Guide, Segment};

/// Reproduce the guide's markdown with hidden lines removed from every Rust
/// block. Front matter, prose and non-Rust blocks are copied verbatim.
pub fn render_markdown(guide: &Guide, untagged: UntaggedPolicy) -> String {
    let source = guide.source.as_str();
    let mut out = String::with_capacity(source.len());

    let body_start = guide
        .segments
        .first()
        .map(|segment| match segment {
            Segment::Text(range) => range.start,
            Segment::Code(block) => block.span.start,
        })
        .unwrap_or(source.len());
    out.push_str(&source[..body_start]);

    for segment in &guide.segments {
        match segment {
            Segment::Text(range) => out.push_str(&source[range.clone()]),
            Segment::Code(block) if strips_hidden(block, untagged) => {
                render_block(&mut out, block, source)
            }
            Segment::Code(block) => out.push_str(&source[block.span.clone()]),
        }
    }
    out
}

fn strips_hidden(block: &CodeBlock, untagged: UntaggedPolicy) -> bool {
    if block.fence.is_empty() {
        return false;
    }
    match block.attributes.language {
        Language::Rust => true,
        Language::Untagged => untagged == UntaggedPolicy::Rust,
        Language::Other(_) => false,
    }
}

fn render_block(out: &mut String, block: &CodeBlock, source: &str) {
    out.push_str(&block.fence);
    out.push_str(&block.info);
    out.push('\n');
    for line in block.lines.iter().filter(|l| !l.hidden) {
        if line.text.is_empty() {
            out.push_str(block.indent.trim_end());
        } else {
            out.push_str(&block.indent);
            out.push_str(&line.text);
        }
        out.push('\n');
    }
    if !block.closed {
        return;
    }
    out.push_str(&block.indent);
    out.push_str(&block.fence);
    if source[block.span.clone()].ends_with('\n') {
        out.push('\n');
    }
}
