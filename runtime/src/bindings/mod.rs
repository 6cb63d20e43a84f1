//! Bindings attach mounted directives to the context store.

pub mod button;
pub mod result_display;
pub mod script;
pub mod text_input;

use livedoc::directive::{Attributes, Directive, DirectiveKind};

pub use button::{ButtonBinding, ButtonProps};
pub use result_display::{ResultDisplayBinding, ResultView};
pub use script::{ScriptBinding, ScriptProps, ScriptStatus};
pub use text_input::{TextInputBinding, TextInputProps, ValidationHint};

/// One mounted directive.
pub enum Binding {
    TextInput(TextInputBinding),
    Button(ButtonBinding),
    Script(ScriptBinding),
    ResultDisplay(ResultDisplayBinding),
    /// Unrecognized directive: rendered as plain content, never bound.
    Generic,
}

impl Binding {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Binding::TextInput(_) => DirectiveKind::TextInput,
            Binding::Button(_) => DirectiveKind::Button,
            Binding::Script(_) => DirectiveKind::Script,
            Binding::ResultDisplay(_) => DirectiveKind::ResultDisplay,
            Binding::Generic => DirectiveKind::Generic,
        }
    }
}

/// `"true"` or a bare attribute turns a flag on; anything else leaves it off.
pub(crate) fn flag(attrs: &Attributes, key: &str) -> bool {
    match attrs.get(key) {
        Some("true") | Some("") => true,
        Some("false") | None => false,
        Some(other) => {
            tracing::warn!(key, value = other, "unrecognized boolean attribute value; treating as false");
            false
        }
    }
}

/// The directive's label text, if it has a non-blank one.
pub(crate) fn label_text(directive: &Directive) -> Option<String> {
    directive
        .label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}
