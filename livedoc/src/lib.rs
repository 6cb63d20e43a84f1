pub mod attributes;
pub mod directive;
pub mod document;
pub mod normalize;
pub mod parser;

use crate::document::Document;
use crate::parser::{ParseError, Parser};

/// A document ready for binding: parsed, normalized, with every warning
/// collected along the way.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: Document,
    pub diagnostics: Vec<ParseError>,
}

/// Parse and normalize `source` in one step.
pub fn load(source: &str, file_id: usize) -> Loaded {
    let parsed = Parser::new(source.to_string(), file_id).parse();
    let (document, warnings) = normalize::normalize(parsed.document, source);
    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(warnings);
    diagnostics.sort_by_key(|d| d.span.start);
    Loaded {
        document,
        diagnostics,
    }
}
