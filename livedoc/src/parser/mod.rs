pub mod error;
mod scan;
mod structural;

pub use error::ParseError;

use crate::document::Document;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

/// A structural parse: the raw tree plus any recoverable problems found.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<ParseError>,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse the source into a document tree. Directive nodes come out
    /// untagged (`Generic`, attributes uninterpreted); see [`crate::normalize`].
    pub fn parse(&self) -> Parsed {
        let (nodes, diagnostics) = structural::parse_nodes(&self.source, self.file_id);
        Parsed {
            document: Document {
                nodes,
                source_id: self.file_id,
            },
            diagnostics,
        }
    }
}
