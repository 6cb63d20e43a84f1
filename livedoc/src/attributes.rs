use thiserror::Error;

use crate::directive::Attributes;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("unterminated quoted value for attribute `{key}`")]
    UnterminatedQuote { key: String },
    #[error("missing value after `=` for attribute `{key}`")]
    MissingValue { key: String },
    #[error("empty `{0}` shorthand")]
    EmptyShorthand(char),
    #[error("unexpected character `{found}` at offset {offset}")]
    Unexpected { found: char, offset: usize },
}

/// Parse the text between a directive's braces.
///
/// Accepts `key="v"`, `key='v'`, `key=v`, bare `key`, `#id` and `.class`.
pub fn parse(input: &str) -> Result<Attributes, AttributeError> {
    let mut attrs = Attributes::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some(&(offset, c)) = chars.peek() else {
            break;
        };

        match c {
            '#' | '.' => {
                chars.next();
                let ident = take_while(&mut chars, is_shorthand_char);
                if ident.is_empty() {
                    return Err(AttributeError::EmptyShorthand(c));
                }
                if c == '#' {
                    attrs.insert("id", ident);
                } else {
                    attrs.append("class", &ident);
                }
            }
            c if is_key_char(c) => {
                let key = take_while(&mut chars, is_key_char);
                if chars.next_if(|(_, c)| *c == '=').is_none() {
                    attrs.insert(key, "");
                    continue;
                }
                let value = match chars.peek().map(|(_, c)| *c) {
                    Some(quote @ ('"' | '\'')) => {
                        chars.next();
                        let mut value = String::new();
                        let mut closed = false;
                        for (_, c) in chars.by_ref() {
                            if c == quote {
                                closed = true;
                                break;
                            }
                            value.push(c);
                        }
                        if !closed {
                            return Err(AttributeError::UnterminatedQuote { key });
                        }
                        value
                    }
                    Some(c) if !c.is_whitespace() => {
                        take_while(&mut chars, |c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '=' | '<' | '>' | '`'))
                    }
                    _ => return Err(AttributeError::MissingValue { key }),
                };
                if key == "class" {
                    attrs.append("class", &value);
                } else {
                    attrs.insert(key, value);
                }
            }
            found => return Err(AttributeError::Unexpected { found, offset }),
        }

        // Entries must be separated by whitespace.
        if let Some(&(offset, found)) = chars.peek() {
            if !found.is_whitespace() {
                return Err(AttributeError::Unexpected { found, offset });
            }
        }
    }

    Ok(attrs)
}

fn take_while(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    pred: impl Fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some((_, c)) = chars.next_if(|(_, c)| pred(*c)) {
        out.push(c);
    }
    out
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

fn is_shorthand_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_')
}
