use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::Segment;
use crate::attributes::BlockAttributes;
use crate::code_block::{CodeBlock, SourceLine};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split the markdown body (everything from `body_offset` on) into text and
/// code segments. Spans are absolute offsets into `source`.
pub fn parse_segments(
    source: &str,
    body_offset: usize,
    file_id: usize,
) -> (Vec<Segment>, Vec<ParseError>) {
    let body = &source[body_offset..];
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(body, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser
        .into_offset_iter()
        .map(|(ev, range)| (ev, range.start + body_offset..range.end + body_offset))
        .collect();

    let mut state = SegmentState::new(source, body_offset, file_id);
    state.process_events(&events);
    state.finalize()
}

// ---------------------------------------------------------------------------
// Segment state
// ---------------------------------------------------------------------------

struct SegmentState<'a> {
    source: &'a str,
    file_id: usize,
    /// End of the last emitted segment.
    cursor: usize,
    segments: Vec<Segment>,
    block_count: usize,
    warnings: Vec<ParseError>,
}

impl<'a> SegmentState<'a> {
    fn new(source: &'a str, body_offset: usize, file_id: usize) -> Self {
        SegmentState {
            source,
            file_id,
            cursor: body_offset,
            segments: Vec::new(),
            block_count: 0,
            warnings: Vec::new(),
        }
    }

    fn process_events(&mut self, events: &[(Event<'_>, Range<usize>)]) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let (info, is_fenced) = match kind {
                        CodeBlockKind::Fenced(info) => (info.to_string(), true),
                        CodeBlockKind::Indented => (String::new(), false),
                    };
                    let span = range.clone();
                    i += 1;
                    let content = collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::CodeBlock)
                    });
                    self.push_code_block(info, is_fenced, content, span);
                }
                _ => {
                    i += 1;
                }
            }
        }
    }

    fn push_code_block(
        &mut self,
        info: String,
        is_fenced: bool,
        content: String,
        span: Range<usize>,
    ) {
        if span.start > self.cursor {
            self.segments.push(Segment::Text(self.cursor..span.start));
        }

        let line_start = self.source[..span.start]
            .rfind('\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let indent: String = self.source[line_start..span.start]
            .chars()
            .map(|c| if c.is_whitespace() || c == '>' { c } else { ' ' })
            .collect();
        let fence = if is_fenced {
            fence_marker(&self.source[span.start..])
        } else {
            String::new()
        };

        let attributes = if is_fenced {
            BlockAttributes::parse(&info)
        } else {
            BlockAttributes::untagged()
        };

        let header_span = span.start..line_end(self.source, span.start);
        for bad in &attributes.invalid_editions {
            self.warnings.push(
                ParseError::warning(
                    format!("unknown edition attribute '{}'", bad),
                    header_span.clone(),
                    self.file_id,
                )
                .with_note("valid editions are 2015, 2018, 2021 and 2024"),
            );
        }

        let closed = !is_fenced || is_closed(self.source, &span, &fence);
        if !closed {
            self.warnings.push(ParseError::warning(
                "code block is never closed; it extends to the end of the file",
                header_span,
                self.file_id,
            ));
        }

        let lines = content.lines().map(SourceLine::classify).collect();

        self.segments.push(Segment::Code(CodeBlock {
            index: self.block_count,
            info,
            attributes,
            lines,
            span: span.clone(),
            line: byte_offset_to_line(self.source, span.start),
            indent,
            fence,
            closed,
        }));
        self.block_count += 1;
        self.cursor = self.cursor.max(span.end);
    }

    fn finalize(mut self) -> (Vec<Segment>, Vec<ParseError>) {
        if self.cursor < self.source.len() {
            self.segments.push(Segment::Text(self.cursor..self.source.len()));
        }
        (self.segments, self.warnings)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// The run of backticks or tildes opening a fence.
fn fence_marker(text: &str) -> String {
    let Some(first) = text.chars().next().filter(|c| *c == '`' || *c == '~') else {
        return "```".to_string();
    };
    text.chars().take_while(|c| *c == first).collect()
}

/// Whether the block's last line is a closing fence at least as long as the opener.
fn is_closed(source: &str, span: &Range<usize>, fence: &str) -> bool {
    let text = source[span.clone()].trim_end();
    let Some(last_nl) = text.rfind('\n') else {
        return false;
    };
    // Closing fences inside blockquotes keep their `>` markers in the source.
    let last_line = text[last_nl + 1..].trim_start_matches(|c: char| c == '>' || c.is_whitespace());
    let Some(marker) = fence.chars().next() else {
        return true;
    };
    last_line.len() >= fence.len() && last_line.chars().all(|c| c == marker)
}

fn line_end(source: &str, from: usize) -> usize {
    source[from..]
        .find('\n')
        .map(|p| from + p)
        .unwrap_or(source.len())
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}
