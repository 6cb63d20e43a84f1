use std::fmt;
use std::ops::Range;

use crate::directive::Directive;

/// A parsed interactive document: the root sequence of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Vec<DocumentNode>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    pub fn empty(source_id: usize) -> Self {
        Document {
            nodes: Vec::new(),
            source_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All directive nodes in document order (depth-first, pre-order).
    pub fn directives(&self) -> Vec<&Directive> {
        let mut out = Vec::new();
        collect_directives(&self.nodes, &mut out);
        out
    }
}

fn collect_directives<'a>(nodes: &'a [DocumentNode], out: &mut Vec<&'a Directive>) {
    for node in nodes {
        match node {
            DocumentNode::Text(_) => {}
            DocumentNode::Block(block) => collect_directives(&block.children, out),
            DocumentNode::Directive(directive) => {
                out.push(directive);
                collect_directives(&directive.children, out);
            }
        }
    }
}

/// A single node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Text(String),
    /// Standard markdown structure. Opaque to the directive runtime.
    Block(Block),
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub children: Vec<DocumentNode>,
    /// Byte span in source.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    // Block-level
    Paragraph,
    Heading(u8),
    BlockQuote,
    CodeBlock { language: Option<String> },
    List { start: Option<u64> },
    Item,
    Table,
    TableHead,
    TableRow,
    TableCell,
    Rule,
    Html,

    // Inline
    Emphasis,
    Strong,
    Strikethrough,
    CodeSpan,
    Link { dest: String, title: String },
    Image { dest: String, title: String },
    SoftBreak,
    HardBreak,
}

impl BlockKind {
    /// Block-level kinds end with a newline when echoed back as markdown.
    pub fn is_block_level(&self) -> bool {
        matches!(
            self,
            BlockKind::Paragraph
                | BlockKind::Heading(_)
                | BlockKind::BlockQuote
                | BlockKind::CodeBlock { .. }
                | BlockKind::List { .. }
                | BlockKind::Item
                | BlockKind::Table
                | BlockKind::TableHead
                | BlockKind::TableRow
                | BlockKind::Rule
                | BlockKind::Html
        )
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for DocumentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentNode::Text(s) => write!(f, "{}", s),
            DocumentNode::Block(block) => write!(f, "{}", block),
            DocumentNode::Directive(directive) => write!(f, "{}", directive),
        }
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[DocumentNode]) -> fmt::Result {
    for child in children {
        write!(f, "{}", child)?;
    }
    Ok(())
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BlockKind::Paragraph => {
                write_children(f, &self.children)?;
                writeln!(f)
            }
            BlockKind::Heading(level) => {
                for _ in 0..*level {
                    write!(f, "#")?;
                }
                write!(f, " ")?;
                write_children(f, &self.children)?;
                writeln!(f)
            }
            BlockKind::CodeBlock { language } => {
                write!(f, "```")?;
                if let Some(lang) = language {
                    write!(f, "{}", lang)?;
                }
                writeln!(f)?;
                write_children(f, &self.children)?;
                writeln!(f, "```")
            }
            BlockKind::BlockQuote => {
                let text = self
                    .children
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<String>();
                for line in text.lines() {
                    writeln!(f, "> {}", line)?;
                }
                Ok(())
            }
            BlockKind::List { start } => {
                for (i, item) in self.children.iter().enumerate() {
                    match start {
                        Some(n) => write!(f, "{}. {}", *n as usize + i, item)?,
                        None => write!(f, "- {}", item)?,
                    }
                }
                Ok(())
            }
            BlockKind::Item => {
                let text = self
                    .children
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<String>();
                if text.ends_with('\n') {
                    write!(f, "{}", text)
                } else {
                    writeln!(f, "{}", text)
                }
            }
            BlockKind::Table => {
                for (i, row) in self.children.iter().enumerate() {
                    write!(f, "{}", row)?;
                    if i == 0 {
                        if let DocumentNode::Block(head) = row {
                            write!(f, "|")?;
                            for _ in &head.children {
                                write!(f, "---|")?;
                            }
                            writeln!(f)?;
                        }
                    }
                }
                Ok(())
            }
            BlockKind::TableHead | BlockKind::TableRow => {
                write!(f, "|")?;
                for cell in &self.children {
                    write!(f, " {} |", cell)?;
                }
                writeln!(f)
            }
            BlockKind::TableCell => write_children(f, &self.children),
            BlockKind::Rule => writeln!(f, "---"),
            BlockKind::Html => write_children(f, &self.children),
            BlockKind::Emphasis => {
                write!(f, "*")?;
                write_children(f, &self.children)?;
                write!(f, "*")
            }
            BlockKind::Strong => {
                write!(f, "**")?;
                write_children(f, &self.children)?;
                write!(f, "**")
            }
            BlockKind::Strikethrough => {
                write!(f, "~~")?;
                write_children(f, &self.children)?;
                write!(f, "~~")
            }
            BlockKind::CodeSpan => {
                write!(f, "`")?;
                write_children(f, &self.children)?;
                write!(f, "`")
            }
            BlockKind::Link { dest, .. } => {
                write!(f, "[")?;
                write_children(f, &self.children)?;
                write!(f, "]({})", dest)
            }
            BlockKind::Image { dest, .. } => {
                write!(f, "![")?;
                write_children(f, &self.children)?;
                write!(f, "]({})", dest)
            }
            BlockKind::SoftBreak | BlockKind::HardBreak => writeln!(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> DocumentNode {
        DocumentNode::Text(s.to_string())
    }

    fn block(kind: BlockKind, children: Vec<DocumentNode>) -> DocumentNode {
        DocumentNode::Block(Block {
            kind,
            children,
            span: 0..0,
        })
    }

    #[test]
    fn heading_and_paragraph_echo_as_markdown() {
        let doc = Document {
            nodes: vec![
                block(BlockKind::Heading(2), vec![text("Title")]),
                block(
                    BlockKind::Paragraph,
                    vec![text("a "), block(BlockKind::Strong, vec![text("b")])],
                ),
            ],
            source_id: 0,
        };
        assert_eq!(doc.to_string(), "## Title\na **b**\n");
    }
}
