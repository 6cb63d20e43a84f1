//! Line- and span-level recognition of directive syntax.
//!
//! pulldown-cmark knows nothing about directives, so they are picked out of
//! the raw source before (containers, leaves) or after (text spans) the
//! markdown pass.

use std::ops::Range;

/// `name[label]{attrs}` as it appears right after the leading colons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectiveHead<'a> {
    pub name: &'a str,
    pub label: Option<&'a str>,
    pub attributes: Option<&'a str>,
    /// Bytes consumed from the start of the scanned text.
    pub len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineKind<'a> {
    ContainerOpen { colons: usize, head: DirectiveHead<'a> },
    Leaf(DirectiveHead<'a>),
    /// A line made only of colons (three or more).
    Fence(usize),
    Other,
}

/// An open fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CodeFence {
    marker: char,
    len: usize,
}

/// Strip up to three spaces of indentation. Four or more means an indented
/// code block, which never holds directives.
fn strip_indent(line: &str) -> Option<&str> {
    let spaces = line.bytes().take_while(|b| *b == b' ').count();
    if spaces > 3 { None } else { Some(&line[spaces..]) }
}

pub(crate) fn classify(line: &str) -> LineKind<'_> {
    let Some(line) = strip_indent(line) else {
        return LineKind::Other;
    };
    let colons = line.bytes().take_while(|b| *b == b':').count();
    let rest = &line[colons..];

    match colons {
        0 | 1 => LineKind::Other,
        2 => match scan_head(rest) {
            Some(head) if rest[head.len..].trim().is_empty() => LineKind::Leaf(head),
            _ => LineKind::Other,
        },
        _ => {
            if rest.trim().is_empty() {
                return LineKind::Fence(colons);
            }
            match scan_head(rest) {
                Some(head) if rest[head.len..].trim().is_empty() => {
                    LineKind::ContainerOpen { colons, head }
                }
                _ => LineKind::Other,
            }
        }
    }
}

/// Recognize the opening line of a fenced code block.
pub(crate) fn code_fence(line: &str) -> Option<CodeFence> {
    let line = strip_indent(line)?;
    let marker = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    // Backtick fences may not carry backticks in their info string.
    if marker == '`' && line[len..].contains('`') {
        return None;
    }
    Some(CodeFence { marker, len })
}

pub(crate) fn closes_code_fence(line: &str, open: CodeFence) -> bool {
    let Some(line) = strip_indent(line) else {
        return false;
    };
    let len = line.chars().take_while(|c| *c == open.marker).count();
    len >= open.len && line[len * open.marker.len_utf8()..].trim().is_empty()
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Scan `name`, then an optional `[label]` (brackets may nest) and an
/// optional `{attrs}` (braces inside quotes are ignored).
pub(crate) fn scan_head(text: &str) -> Option<DirectiveHead<'_>> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if !is_name_start(first) {
        return None;
    }
    let name_end = text
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let name = &text[..name_end];
    let mut pos = name_end;

    let mut label = None;
    if text[pos..].starts_with('[') {
        let close = matching_bracket(&text[pos..])?;
        label = Some(&text[pos + 1..pos + close]);
        pos += close + 1;
    }

    let mut attributes = None;
    if text[pos..].starts_with('{') {
        let close = matching_brace(&text[pos..])?;
        attributes = Some(&text[pos + 1..pos + close]);
        pos += close + 1;
    }

    Some(DirectiveHead {
        name,
        label,
        attributes,
        len: pos,
    })
}

fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            '\n' => return None,
            _ => {}
        }
    }
    None
}

fn matching_brace(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '}') => return Some(i),
            (None, '\n') => return None,
            _ => {}
        }
    }
    None
}

/// A piece of paragraph text: plain, or a text directive.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Plain(&'a str),
    Directive {
        head: DirectiveHead<'a>,
        /// Range within the scanned text, including the leading colon.
        range: Range<usize>,
    },
}

/// Split text into plain runs and `:name[label]{attrs}` text directives.
///
/// A text directive must carry a label or attributes, so ordinary colons
/// ("10:30", "note: x") are left alone.
pub(crate) fn split_text_directives(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut prev: Option<char> = None;
    let mut iter = text.char_indices();

    while let Some((i, c)) = iter.next() {
        let candidate = c == ':' && !prev.is_some_and(|p| p.is_alphanumeric() || p == ':');
        if candidate {
            if let Some(head) = scan_head(&text[i + 1..]) {
                if head.label.is_some() || head.attributes.is_some() {
                    if plain_start < i {
                        segments.push(Segment::Plain(&text[plain_start..i]));
                    }
                    let end = i + 1 + head.len;
                    segments.push(Segment::Directive {
                        head,
                        range: i..end,
                    });
                    plain_start = end;
                    prev = None;
                    // Skip past the directive.
                    while iter.clone().next().is_some_and(|(j, _)| j < end) {
                        iter.next();
                    }
                    continue;
                }
            }
        }
        prev = Some(c);
    }

    if plain_start < text.len() {
        segments.push(Segment::Plain(&text[plain_start..]));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_line() {
        let LineKind::Leaf(head) = classify(r#"::button[Run]{eventId="go"}"#) else {
            panic!("expected leaf");
        };
        assert_eq!(head.name, "button");
        assert_eq!(head.label, Some("Run"));
        assert_eq!(head.attributes, Some(r#"eventId="go""#));
    }

    #[test]
    fn container_open_and_fence() {
        assert!(matches!(
            classify(r#":::js{eventId="e" resultId="r"}"#),
            LineKind::ContainerOpen { colons: 3, .. }
        ));
        assert_eq!(classify(":::"), LineKind::Fence(3));
        assert_eq!(classify("::::  "), LineKind::Fence(4));
        assert_eq!(classify("    ::button"), LineKind::Other);
        assert_eq!(classify("::button trailing"), LineKind::Other);
    }

    #[test]
    fn braces_inside_quotes_do_not_close() {
        let head = scan_head(r#"x{a="}" b=1} tail"#).unwrap();
        assert_eq!(head.attributes, Some(r#"a="}" b=1"#));
        assert_eq!(&r#"x{a="}" b=1} tail"#[head.len..], " tail");
    }

    #[test]
    fn nested_label_brackets() {
        let head = scan_head("b[a [b] c]").unwrap();
        assert_eq!(head.label, Some("a [b] c"));
    }

    #[test]
    fn code_fences() {
        let open = code_fence("```js").unwrap();
        assert!(!closes_code_fence("``", open));
        assert!(closes_code_fence("````", open));
        assert!(code_fence("~~~").is_some());
        assert!(code_fence("``").is_none());
    }

    #[test]
    fn text_directives_in_running_text() {
        let segments = split_text_directives(r#"Name: :textinput[Name]{id="n"} at 10:30"#);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Plain("Name: "));
        let Segment::Directive { head, range } = &segments[1] else {
            panic!("expected directive");
        };
        assert_eq!(head.name, "textinput");
        assert_eq!(*range, 6..30);
        assert_eq!(segments[2], Segment::Plain(" at 10:30"));
    }

    #[test]
    fn bare_colon_words_are_text() {
        let segments = split_text_directives("see :note for details");
        assert_eq!(segments, vec![Segment::Plain("see :note for details")]);
    }
}
