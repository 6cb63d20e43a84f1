use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag};

use crate::directive::{Directive, DirectiveForm};
use crate::document::{Block, BlockKind, DocumentNode};
use crate::parser::error::ParseError;
use crate::parser::scan::{self, DirectiveHead, LineKind, Segment};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse source text into a node tree, recognizing directive syntax.
///
/// Never fails: recoverable problems come back as warnings.
pub fn parse_nodes(source: &str, file_id: usize) -> (Vec<DocumentNode>, Vec<ParseError>) {
    let mut state = ParseState::new(source, file_id);
    let nodes = state.parse_region(0, source.len());
    (nodes, state.diagnostics)
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    diagnostics: Vec<ParseError>,
}

/// Where a container directive's body ends.
struct ContainerEnd {
    /// Start of the closing fence line (end of the body).
    body_end: usize,
    /// End of the closing fence line, without its line terminator.
    fence_end: usize,
    /// Position after the closing fence line, including its terminator.
    next: usize,
    closed: bool,
}

/// Iterate `(line_start, line_without_terminator, next_line_start)` over a region.
fn lines_in(source: &str, start: usize, end: usize) -> impl Iterator<Item = (usize, &str, usize)> {
    let mut pos = start;
    std::iter::from_fn(move || {
        if pos >= end {
            return None;
        }
        let next = source[pos..end]
            .find('\n')
            .map(|i| pos + i + 1)
            .unwrap_or(end);
        let line = source[pos..next].trim_end_matches(['\n', '\r']);
        let item = (pos, line, next);
        pos = next;
        Some(item)
    })
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            diagnostics: Vec::new(),
        }
    }

    /// Parse `source[start..end]`: directive lines are cut out, the markdown
    /// between them goes through pulldown-cmark.
    fn parse_region(&mut self, start: usize, end: usize) -> Vec<DocumentNode> {
        let mut nodes = Vec::new();
        let mut chunk_start = start;
        let mut fence: Option<scan::CodeFence> = None;
        let mut skip_until = start;

        for (line_start, line, next) in lines_in(self.source, start, end) {
            if line_start < skip_until {
                continue;
            }
            if let Some(open) = fence {
                if scan::closes_code_fence(line, open) {
                    fence = None;
                }
                continue;
            }
            if let Some(open) = scan::code_fence(line) {
                fence = Some(open);
                continue;
            }

            match scan::classify(line) {
                LineKind::Leaf(head) => {
                    nodes.extend(self.parse_markdown(chunk_start, line_start));
                    let span = line_start..line_start + line.len();
                    let directive = self.leaf_directive(&head, span);
                    nodes.push(DocumentNode::Directive(directive));
                    chunk_start = next;
                }
                LineKind::ContainerOpen { colons, head } => {
                    nodes.extend(self.parse_markdown(chunk_start, line_start));
                    let container = self.find_container_end(colons, next, end);
                    if !container.closed {
                        self.diagnostics.push(
                            ParseError::warning(
                                format!("container directive `{}` is never closed", head.name),
                                line_start..line_start + line.len(),
                                self.file_id,
                            )
                            .with_note(format!(
                                "close it with a line of {} colons",
                                colons
                            )),
                        );
                    }
                    let mut directive = Directive::new(
                        head.name,
                        DirectiveForm::Container,
                        line_start..container.fence_end,
                    );
                    directive.label = head.label.map(str::to_string);
                    directive.raw_attributes = head.attributes.map(str::to_string);
                    directive.children = self.parse_region(next, container.body_end);
                    nodes.push(DocumentNode::Directive(directive));
                    chunk_start = container.next;
                    skip_until = container.next;
                }
                LineKind::Fence(_) | LineKind::Other => {}
            }
        }

        nodes.extend(self.parse_markdown(chunk_start, end));
        nodes
    }

    fn leaf_directive(&self, head: &DirectiveHead<'_>, span: Range<usize>) -> Directive {
        let mut directive = Directive::new(head.name, DirectiveForm::Leaf, span);
        directive.label = head.label.map(str::to_string);
        directive.raw_attributes = head.attributes.map(str::to_string);
        if let Some(label) = head.label {
            directive.children = vec![DocumentNode::Text(label.to_string())];
        }
        directive
    }

    /// Find the fence closing a container opened with `colons` colons.
    /// Nested containers are matched first; code fences hide their content.
    fn find_container_end(&self, colons: usize, from: usize, end: usize) -> ContainerEnd {
        let mut nested: Vec<usize> = Vec::new();
        let mut fence: Option<scan::CodeFence> = None;

        for (line_start, line, next) in lines_in(self.source, from, end) {
            if let Some(open) = fence {
                if scan::closes_code_fence(line, open) {
                    fence = None;
                }
                continue;
            }
            if let Some(open) = scan::code_fence(line) {
                fence = Some(open);
                continue;
            }
            match scan::classify(line) {
                LineKind::ContainerOpen { colons: inner, .. } => nested.push(inner),
                LineKind::Fence(count) => match nested.last() {
                    Some(&inner) if count >= inner => {
                        nested.pop();
                    }
                    _ if count >= colons => {
                        return ContainerEnd {
                            body_end: line_start,
                            fence_end: line_start + line.len(),
                            next,
                            closed: true,
                        };
                    }
                    _ => {}
                },
                LineKind::Leaf(_) | LineKind::Other => {}
            }
        }

        ContainerEnd {
            body_end: end,
            fence_end: end,
            next: end,
            closed: false,
        }
    }

    /// Run pulldown-cmark over a directive-free chunk.
    fn parse_markdown(&mut self, start: usize, end: usize) -> Vec<DocumentNode> {
        let chunk = &self.source[start..end];
        if chunk.trim().is_empty() {
            return Vec::new();
        }
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
        let events: Vec<(Event<'_>, Range<usize>)> = CmarkParser::new_ext(chunk, options)
            .into_offset_iter()
            .map(|(ev, range)| (ev, range.start + start..range.end + start))
            .collect();

        let mut i = 0;
        self.collect_nodes(&events, &mut i, true)
    }

    /// Collect sibling nodes until the End event closing the current tag.
    /// Adjacent text events are merged before text directives are looked for,
    /// since pulldown-cmark splits text at brackets.
    fn collect_nodes(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        scan_directives: bool,
    ) -> Vec<DocumentNode> {
        let mut nodes = Vec::new();
        let mut pending: Option<(String, Range<usize>)> = None;

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];

            if let Event::Text(s) = ev {
                match pending.as_mut() {
                    Some((text, span)) => {
                        text.push_str(s);
                        span.end = range.end;
                    }
                    None => pending = Some((s.to_string(), range.clone())),
                }
                *i += 1;
                continue;
            }
            if let Some((text, span)) = pending.take() {
                nodes.extend(self.text_nodes(text, span, scan_directives));
            }

            match ev {
                Event::End(_) => {
                    *i += 1;
                    break;
                }
                Event::Start(tag) => {
                    let kind = block_kind(tag);
                    let scan_children = scan_directives && !matches!(kind, BlockKind::CodeBlock { .. });
                    *i += 1;
                    let children = self.collect_nodes(events, i, scan_children);
                    nodes.push(block(kind, children, range.clone()));
                }
                Event::Code(s) => {
                    nodes.push(block(
                        BlockKind::CodeSpan,
                        vec![DocumentNode::Text(s.to_string())],
                        range.clone(),
                    ));
                    *i += 1;
                }
                Event::Html(s) | Event::InlineHtml(s) => {
                    nodes.push(block(
                        BlockKind::Html,
                        vec![DocumentNode::Text(s.to_string())],
                        range.clone(),
                    ));
                    *i += 1;
                }
                Event::SoftBreak => {
                    nodes.push(block(BlockKind::SoftBreak, Vec::new(), range.clone()));
                    *i += 1;
                }
                Event::HardBreak => {
                    nodes.push(block(BlockKind::HardBreak, Vec::new(), range.clone()));
                    *i += 1;
                }
                Event::Rule => {
                    nodes.push(block(BlockKind::Rule, Vec::new(), range.clone()));
                    *i += 1;
                }
                _ => {
                    *i += 1;
                }
            }
        }

        if let Some((text, span)) = pending.take() {
            nodes.extend(self.text_nodes(text, span, scan_directives));
        }
        nodes
    }

    /// Split merged text into plain text and text directives.
    fn text_nodes(&self, text: String, span: Range<usize>, scan_directives: bool) -> Vec<DocumentNode> {
        if !scan_directives || !text.contains(':') {
            return vec![DocumentNode::Text(text)];
        }

        // Offsets inside the merged text only map onto the source when no
        // escapes or entities were decoded along the way.
        let exact = self.source.get(span.clone()) == Some(text.as_str());

        scan::split_text_directives(&text)
            .into_iter()
            .map(|segment| match segment {
                Segment::Plain(s) => DocumentNode::Text(s.to_string()),
                Segment::Directive { head, range } => {
                    let directive_span = if exact {
                        span.start + range.start..span.start + range.end
                    } else {
                        span.clone()
                    };
                    let mut directive =
                        Directive::new(head.name, DirectiveForm::Text, directive_span);
                    directive.label = head.label.map(str::to_string);
                    directive.raw_attributes = head.attributes.map(str::to_string);
                    if let Some(label) = head.label {
                        directive.children = vec![DocumentNode::Text(label.to_string())];
                    }
                    DocumentNode::Directive(directive)
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn block(kind: BlockKind, children: Vec<DocumentNode>, span: Range<usize>) -> DocumentNode {
    DocumentNode::Block(Block {
        kind,
        children,
        span,
    })
}

fn block_kind(tag: &Tag<'_>) -> BlockKind {
    match tag {
        Tag::Paragraph => BlockKind::Paragraph,
        Tag::Heading { level, .. } => BlockKind::Heading(heading_level_to_u8(level)),
        Tag::BlockQuote(_) => BlockKind::BlockQuote,
        Tag::CodeBlock(kind) => {
            let language = match kind {
                CodeBlockKind::Fenced(lang) => {
                    let lang = lang.to_string();
                    if lang.is_empty() { None } else { Some(lang) }
                }
                CodeBlockKind::Indented => None,
            };
            BlockKind::CodeBlock { language }
        }
        Tag::HtmlBlock => BlockKind::Html,
        Tag::List(start) => BlockKind::List { start: *start },
        Tag::Item => BlockKind::Item,
        Tag::Table(_) => BlockKind::Table,
        Tag::TableHead => BlockKind::TableHead,
        Tag::TableRow => BlockKind::TableRow,
        Tag::TableCell => BlockKind::TableCell,
        Tag::Emphasis => BlockKind::Emphasis,
        Tag::Strong => BlockKind::Strong,
        Tag::Strikethrough => BlockKind::Strikethrough,
        Tag::Link {
            dest_url, title, ..
        } => BlockKind::Link {
            dest: dest_url.to_string(),
            title: title.to_string(),
        },
        Tag::Image {
            dest_url, title, ..
        } => BlockKind::Image {
            dest: dest_url.to_string(),
            title: title.to_string(),
        },
        _ => BlockKind::Paragraph,
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
