//! Directive normalization: tag directive nodes by kind, interpret their
//! attributes, and lift script bodies out of the source text.

use std::ops::Range;

use crate::attributes;
use crate::directive::{Attributes, Directive, DirectiveKind};
use crate::document::{Block, Document, DocumentNode};
use crate::parser::ParseError;

/// Tag every directive in `document`. Pure in `(document, source)`; problems
/// are recovered locally and returned as warnings.
pub fn normalize(document: Document, source: &str) -> (Document, Vec<ParseError>) {
    let mut normalizer = Normalizer {
        source,
        file_id: document.source_id,
        warnings: Vec::new(),
    };
    let nodes = normalizer.nodes(document.nodes);
    (
        Document {
            nodes,
            source_id: document.source_id,
        },
        normalizer.warnings,
    )
}

struct Normalizer<'a> {
    source: &'a str,
    file_id: usize,
    warnings: Vec<ParseError>,
}

impl Normalizer<'_> {
    fn nodes(&mut self, nodes: Vec<DocumentNode>) -> Vec<DocumentNode> {
        nodes.into_iter().map(|node| self.node(node)).collect()
    }

    fn node(&mut self, node: DocumentNode) -> DocumentNode {
        match node {
            DocumentNode::Text(_) => node,
            DocumentNode::Block(block) => DocumentNode::Block(Block {
                children: self.nodes(block.children),
                ..block
            }),
            DocumentNode::Directive(directive) => DocumentNode::Directive(self.directive(directive)),
        }
    }

    fn directive(&mut self, mut directive: Directive) -> Directive {
        let named = DirectiveKind::from_name(&directive.name);

        let parsed = match directive.raw_attributes.as_deref() {
            Some(raw) => attributes::parse(raw),
            None => Ok(Attributes::new()),
        };

        directive.kind = match parsed {
            Err(err) => {
                tracing::warn!(name = %directive.name, %err, "malformed directive attributes");
                self.warnings.push(
                    ParseError::warning(
                        format!("malformed attributes on `{}` directive: {}", directive.name, err),
                        directive.span.clone(),
                        self.file_id,
                    )
                    .with_note("the directive is rendered as plain content"),
                );
                directive.attributes = Attributes::new();
                DirectiveKind::Generic
            }
            Ok(attrs) => {
                directive.attributes = attrs;
                if named.accepts(directive.form) {
                    named
                } else {
                    tracing::warn!(name = %directive.name, form = ?directive.form, "directive used in the wrong form");
                    let expected = if named == DirectiveKind::Script {
                        format!("`{}` must be a container directive (`:::{}`)", directive.name, directive.name)
                    } else {
                        format!("`{}` must be a leaf (`::{}`) or text (`:{}`) directive", directive.name, directive.name, directive.name)
                    };
                    self.warnings.push(
                        ParseError::warning(expected, directive.span.clone(), self.file_id)
                            .with_note("the directive is rendered as plain content"),
                    );
                    DirectiveKind::Generic
                }
            }
        };

        if directive.kind == DirectiveKind::Script {
            directive.raw_source = Some(script_body(self.source, &directive.span));
            directive.children.clear();
        } else {
            directive.children = self.nodes(std::mem::take(&mut directive.children));
        }

        tracing::trace!(name = %directive.name, kind = %directive.kind, "normalized directive");
        directive
    }
}

/// The verbatim body of a container directive: every line after the opening
/// line, minus the closing fence when there is one.
pub fn script_body(source: &str, span: &Range<usize>) -> String {
    let Some(text) = source.get(span.clone()) else {
        return String::new();
    };
    let mut lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.is_empty() {
        return String::new();
    }
    lines.remove(0);
    if lines.last().is_some_and(|line| is_closing_fence(line)) {
        lines.pop();
    }
    let body = lines.concat();
    let body = body.strip_suffix('\n').unwrap_or(&body);
    body.strip_suffix('\r').unwrap_or(body).to_string()
}

fn is_closing_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveForm;
    use crate::parser::Parser;

    fn run(src: &str) -> (Document, Vec<ParseError>) {
        let parsed = Parser::new(src.to_string(), 0).parse();
        normalize(parsed.document, src)
    }

    #[test]
    fn script_body_keeps_comments_and_blank_lines() {
        let src = ":::js{resultId=\"r\"}\n// total\nconst a = 1;\n\n  a + 1; // done\n:::\n";
        let (doc, warnings) = run(src);
        assert!(warnings.is_empty());
        let scripts = doc.directives();
        assert_eq!(scripts[0].kind, DirectiveKind::Script);
        assert_eq!(
            scripts[0].raw_source.as_deref(),
            Some("// total\nconst a = 1;\n\n  a + 1; // done")
        );
        assert!(scripts[0].children.is_empty());
    }

    #[test]
    fn unknown_names_pass_through_as_generic() {
        let (doc, warnings) = run("::mycomponent[hi]{prop1=\"a\"}\n");
        assert!(warnings.is_empty());
        let d = doc.directives()[0];
        assert_eq!(d.kind, DirectiveKind::Generic);
        assert_eq!(d.attr("prop1"), Some("a"));
        assert_eq!(d.children.len(), 1);
    }

    #[test]
    fn malformed_attributes_fall_back_to_generic() {
        let (doc, warnings) = run("::button[Go]{eventId=\"x\" =oops}\n");
        let d = doc.directives()[0];
        assert_eq!(d.kind, DirectiveKind::Generic);
        assert!(d.attributes.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("malformed"));
    }

    #[test]
    fn wrong_form_falls_back_to_generic() {
        let (doc, warnings) = run("::script{resultId=\"r\"}\n");
        assert_eq!(doc.directives()[0].kind, DirectiveKind::Generic);
        assert!(warnings[0].message.contains("container"));
    }

    #[test]
    fn attribute_values_stay_strings() {
        let (doc, _) = run("::textinput{id=\"h\" required=\"true\" defaultValue=\"170\"}\n");
        let d = doc.directives()[0];
        assert_eq!(d.kind, DirectiveKind::TextInput);
        assert_eq!(d.form, DirectiveForm::Leaf);
        assert_eq!(d.attr("required"), Some("true"));
        assert_eq!(d.attr("defaultValue"), Some("170"));
    }

    #[test]
    fn unclosed_script_takes_rest_of_document() {
        let src = ":::js\nconsole.log(1);\n1 + 1;\n";
        let (doc, _) = run(src);
        assert_eq!(
            doc.directives()[0].raw_source.as_deref(),
            Some("console.log(1);\n1 + 1;")
        );
    }
}
