use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::document::DocumentNode;

/// The three syntactic shapes a directive can take in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveForm {
    /// `:name[label]{attrs}` inside running text.
    Text,
    /// `::name[label]{attrs}` on a line of its own.
    Leaf,
    /// `:::name{attrs}` followed by a body and a closing `:::` fence.
    Container,
}

impl DirectiveForm {
    pub fn marker(self) -> &'static str {
        match self {
            DirectiveForm::Text => ":",
            DirectiveForm::Leaf => "::",
            DirectiveForm::Container => ":::",
        }
    }
}

/// What a directive is bound to at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    TextInput,
    Button,
    Script,
    ResultDisplay,
    /// Unknown name or malformed directive. Rendered inertly.
    Generic,
}

impl DirectiveKind {
    /// Map a directive name to its kind. `js` is accepted as an alias of `script`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "textinput" => DirectiveKind::TextInput,
            "button" => DirectiveKind::Button,
            "script" | "js" => DirectiveKind::Script,
            "resultdisplay" => DirectiveKind::ResultDisplay,
            _ => DirectiveKind::Generic,
        }
    }

    /// Whether a directive of this kind may be written in the given form.
    pub fn accepts(self, form: DirectiveForm) -> bool {
        match self {
            DirectiveKind::Script => form == DirectiveForm::Container,
            DirectiveKind::TextInput | DirectiveKind::Button | DirectiveKind::ResultDisplay => {
                matches!(form, DirectiveForm::Leaf | DirectiveForm::Text)
            }
            DirectiveKind::Generic => true,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::TextInput => "textinput",
            DirectiveKind::Button => "button",
            DirectiveKind::Script => "script",
            DirectiveKind::ResultDisplay => "resultdisplay",
            DirectiveKind::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// String-valued directive attributes. Values are never coerced here;
/// each binding interprets its own attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Non-empty attribute value.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Append to a space-separated attribute (used for `.class` shorthand).
    pub fn append(&mut self, key: &str, value: &str) {
        match self.0.get_mut(key) {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(value);
            }
            _ => {
                self.0.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}

/// A directive node.
///
/// The structural parser fills `name`, `form`, `label`, `raw_attributes`,
/// `children` and `span`. The normalizer sets `kind`, interprets
/// `raw_attributes` into `attributes`, and for scripts moves the body into
/// `raw_source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub form: DirectiveForm,
    pub kind: DirectiveKind,
    pub label: Option<String>,
    /// Text between `{` and `}` exactly as written, if present.
    pub raw_attributes: Option<String>,
    pub attributes: Attributes,
    /// Verbatim script body, only set for `Script` directives.
    pub raw_source: Option<String>,
    pub children: Vec<DocumentNode>,
    /// Byte span in source; for containers this includes both fences.
    pub span: Range<usize>,
}

impl Directive {
    pub fn new(name: impl Into<String>, form: DirectiveForm, span: Range<usize>) -> Self {
        Directive {
            name: name.into(),
            form,
            kind: DirectiveKind::Generic,
            label: None,
            raw_attributes: None,
            attributes: Attributes::new(),
            raw_source: None,
            children: Vec::new(),
            span,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.form.marker(), self.name)?;
        if let Some(label) = &self.label {
            write!(f, "[{}]", label)?;
        }
        if let Some(raw) = &self.raw_attributes {
            write!(f, "{{{}}}", raw)?;
        }
        match self.form {
            DirectiveForm::Text => Ok(()),
            DirectiveForm::Leaf => writeln!(f),
            DirectiveForm::Container => {
                writeln!(f)?;
                match &self.raw_source {
                    Some(code) => writeln!(f, "{}", code)?,
                    None => {
                        for child in &self.children {
                            write!(f, "{}", child)?;
                        }
                    }
                }
                writeln!(f, ":::")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_map_to_kinds() {
        assert_eq!(DirectiveKind::from_name("textinput"), DirectiveKind::TextInput);
        assert_eq!(DirectiveKind::from_name("button"), DirectiveKind::Button);
        assert_eq!(DirectiveKind::from_name("js"), DirectiveKind::Script);
        assert_eq!(DirectiveKind::from_name("script"), DirectiveKind::Script);
        assert_eq!(DirectiveKind::from_name("resultdisplay"), DirectiveKind::ResultDisplay);
        assert_eq!(DirectiveKind::from_name("mycomponent"), DirectiveKind::Generic);
        assert_eq!(DirectiveKind::from_name("Button"), DirectiveKind::Generic);
    }

    #[test]
    fn script_only_accepts_containers() {
        assert!(DirectiveKind::Script.accepts(DirectiveForm::Container));
        assert!(!DirectiveKind::Script.accepts(DirectiveForm::Leaf));
        assert!(DirectiveKind::Button.accepts(DirectiveForm::Text));
        assert!(!DirectiveKind::Button.accepts(DirectiveForm::Container));
    }

    #[test]
    fn class_shorthand_accumulates() {
        let mut attrs = Attributes::new();
        attrs.append("class", "a");
        attrs.append("class", "b");
        assert_eq!(attrs.get("class"), Some("a b"));
    }
}
