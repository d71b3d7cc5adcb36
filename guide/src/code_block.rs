use std::ops::Range;

use crate::attributes::{BlockAttributes, Edition, RunMode, UntaggedPolicy};

/// One line of a code block, with the hidden-line marker already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Line text as it is compiled: hidden markers and `##` escapes removed.
    pub text: String,
    /// Hidden lines are compiled but elided from rendered documentation.
    pub hidden: bool,
}

impl SourceLine {
    /// Classify a raw line using rustdoc's hidden-line rules.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let indent = &raw[..raw.len() - trimmed.len()];
        if let Some(rest) = trimmed.strip_prefix("##") {
            SourceLine {
                text: format!("{}#{}", indent, rest),
                hidden: false,
            }
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            SourceLine {
                text: rest.to_string(),
                hidden: true,
            }
        } else if trimmed.trim_end() == "#" {
            SourceLine {
                text: String::new(),
                hidden: true,
            }
        } else {
            SourceLine {
                text: raw.to_string(),
                hidden: false,
            }
        }
    }
}

/// A fenced (or indented) code block inside a guide.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// Zero-based position among the guide's code blocks.
    pub index: usize,
    /// Raw info string after the opening fence.
    pub info: String,
    pub attributes: BlockAttributes,
    pub lines: Vec<SourceLine>,
    /// Byte span of the whole block, fences included.
    pub span: Range<usize>,
    /// 1-based source line of the opening fence.
    pub line: usize,
    /// Prefix for continuation lines: the opening line's indentation and
    /// blockquote markers, with list markers blanked out.
    pub indent: String,
    /// The fence marker itself (three or more backticks or tildes), empty for indented blocks.
    pub fence: String,
    /// Whether the source has a closing fence; unclosed blocks run to the end of the file.
    pub closed: bool,
}

impl CodeBlock {
    pub fn run_mode(&self, untagged: UntaggedPolicy) -> RunMode {
        self.attributes.run_mode(untagged)
    }

    /// Source as compiled: hidden and visible lines merged.
    pub fn compiled(&self) -> String {
        join_lines(self.lines.iter().map(|l| l.text.as_str()))
    }

    /// Source as displayed: hidden lines removed.
    pub fn rendered(&self) -> String {
        join_lines(
            self.lines
                .iter()
                .filter(|l| !l.hidden)
                .map(|l| l.text.as_str()),
        )
    }

    pub fn has_visible_code(&self) -> bool {
        self.lines
            .iter()
            .any(|l| !l.hidden && !l.text.trim().is_empty())
    }

    /// The block's own edition override, if any.
    pub fn edition(&self) -> Option<Edition> {
        self.attributes.edition
    }
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}
