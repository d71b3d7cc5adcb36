use std::collections::BTreeMap;

use serde::Deserialize;

use crate::parser::ParseError;

/// Site-generator metadata at the top of a guide.
///
/// The doctest pipeline never interprets these fields; they are parsed so
/// that malformed front matter is reported and so listings can show titles.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    /// Everything else (`hidden`, `redirect_from`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Result of splitting a guide at its front matter.
#[derive(Debug, Clone)]
pub struct Split {
    pub front_matter: FrontMatter,
    /// Byte offset where the markdown body starts.
    pub body_offset: usize,
    /// Set when a leading `---` turned out not to open front matter.
    pub warning: Option<ParseError>,
}

impl Split {
    fn body_only(body_offset: usize, warning: Option<ParseError>) -> Self {
        Split {
            front_matter: FrontMatter::default(),
            body_offset,
            warning,
        }
    }
}

/// Split a guide into its front matter and markdown body. Guides without a
/// leading `---` line have no front matter; neither do guides whose leading
/// `---` is never closed, which get a warning and are read as plain markdown.
///
/// Delimiter lines may carry trailing whitespace, and `...` also closes.
pub fn split(source: &str, file_id: usize) -> Result<Split, ParseError> {
    let bom = if source.starts_with('\u{feff}') { 3 } else { 0 };
    let content = &source[bom..];

    let Some(after_open) = content.strip_prefix("---") else {
        return Ok(Split::body_only(0, None));
    };
    let after_open = after_open.trim_start_matches([' ', '\t']);
    let after_open = match after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
    {
        Some(rest) => rest,
        // `---foo` on the first line is text, not front matter.
        None => return Ok(Split::body_only(0, None)),
    };
    let yaml_start = source.len() - after_open.len();

    let Some((yaml_len, body_rel)) = find_closing_delimiter(after_open) else {
        let warning = ParseError::warning(
            "leading --- has no closing delimiter; reading the file without front matter",
            bom..bom + 3,
            file_id,
        )
        .with_note("close front matter with a line containing only --- or ...");
        return Ok(Split::body_only(0, Some(warning)));
    };

    let yaml = after_open[..yaml_len].trim_end_matches(['\r', '\n']);
    let body_offset = yaml_start + body_rel;

    if yaml.trim().is_empty() {
        return Ok(Split::body_only(body_offset, None));
    }

    let front_matter: FrontMatter = serde_yaml::from_str(yaml).map_err(|e| {
        let span = match e.location() {
            Some(loc) => {
                let start = (yaml_start + loc.index()).min(yaml_start + yaml.len());
                start..(start + 1).min(yaml_start + yaml.len())
            }
            None => yaml_start..yaml_start + yaml.len(),
        };
        ParseError::error(format!("invalid front matter: {}", e), span, file_id)
    })?;

    Ok(Split {
        front_matter,
        body_offset,
        warning: None,
    })
}

/// Find the line consisting of `---` or `...` alone. Returns the length of
/// the YAML text before it and the offset just past it, both relative to
/// `after_open`.
fn find_closing_delimiter(after_open: &str) -> Option<(usize, usize)> {
    let mut pos = 0;
    for line in after_open.split_inclusive('\n') {
        let marker = line.trim_end();
        if marker == "---" || marker == "..." {
            return Some((pos, pos + line.len()));
        }
        pos += line.len();
    }
    None
}
