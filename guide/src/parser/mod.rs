pub mod error;
mod structural;

pub use error::ParseError;

use std::path::PathBuf;

use crate::Guide;
use crate::front_matter;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    path: PathBuf,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            path: PathBuf::new(),
        }
    }

    /// Record the path the source came from.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Parse the guide into front matter and segments. Only invalid front
    /// matter YAML is an error; everything else is a warning on the guide.
    pub fn parse(self) -> Result<Guide, Vec<ParseError>> {
        let split = front_matter::split(&self.source, self.file_id).map_err(|e| vec![e])?;
        let (segments, body_warnings) =
            structural::parse_segments(&self.source, split.body_offset, self.file_id);
        let warnings = split.warning.into_iter().chain(body_warnings).collect();
        Ok(Guide {
            path: self.path,
            front_matter: split.front_matter,
            segments,
            warnings,
            source: self.source,
            source_id: self.file_id,
        })
    }
}
