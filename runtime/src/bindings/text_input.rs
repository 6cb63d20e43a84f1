use std::fmt;

use livedoc::directive::Directive;

use super::{flag, label_text};
use crate::config::RenderConfig;
use crate::store::ContextStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    #[default]
    Text,
    Email,
    Password,
    Number,
    Tel,
    Url,
}

impl InputType {
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            None | Some("text") => InputType::Text,
            Some("email") => InputType::Email,
            Some("password") => InputType::Password,
            Some("number") => InputType::Number,
            Some("tel") => InputType::Tel,
            Some("url") => InputType::Url,
            Some(other) => {
                tracing::warn!(r#type = other, "unknown text input type; using text");
                InputType::Text
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInputProps {
    pub id: String,
    pub placeholder: String,
    pub default_value: String,
    pub input_type: InputType,
    pub required: bool,
    pub disabled: bool,
    pub label: Option<String>,
}

impl TextInputProps {
    /// Read props from a normalized directive. `fallback_id` is used when the
    /// directive has no usable `id`.
    pub fn from_directive(directive: &Directive, fallback_id: String, config: &RenderConfig) -> Self {
        let attrs = &directive.attributes;
        TextInputProps {
            id: attrs.non_empty("id").map(str::to_string).unwrap_or(fallback_id),
            placeholder: attrs
                .get("placeholder")
                .map(str::to_string)
                .unwrap_or_else(|| config.input_placeholder.clone()),
            default_value: attrs.get("defaultValue").unwrap_or_default().to_string(),
            input_type: InputType::from_attr(attrs.get("type")),
            required: flag(attrs, "required"),
            disabled: flag(attrs, "disabled"),
            label: attrs.non_empty("label").map(str::to_string).or_else(|| label_text(directive)),
        }
    }
}

/// Advisory messages shown under an input. They never block the value from
/// reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationHint {
    InvalidEmail,
    MissingScheme,
    Required,
}

impl fmt::Display for ValidationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationHint::InvalidEmail => write!(f, "Please enter a valid email address"),
            ValidationHint::MissingScheme => write!(f, "URL should start with http:// or https://"),
            ValidationHint::Required => write!(f, "This field is required"),
        }
    }
}

/// A mounted text input. Owns the local value and mirrors every change into
/// `inputs[id]`.
pub struct TextInputBinding {
    props: TextInputProps,
    store: ContextStore,
    value: String,
    dirty: bool,
}

impl TextInputBinding {
    /// Mount and publish the default value.
    pub fn mount(props: TextInputProps, store: ContextStore) -> Self {
        store.inputs().write(&props.id, props.default_value.clone());
        tracing::debug!(id = %props.id, "mounted text input");
        TextInputBinding {
            value: props.default_value.clone(),
            props,
            store,
            dirty: false,
        }
    }

    /// Mount with a value carried over from a previous mount of the same id.
    pub fn remount(props: TextInputProps, store: ContextStore, value: String, dirty: bool) -> Self {
        store.inputs().write(&props.id, value.clone());
        tracing::debug!(id = %props.id, "remounted text input");
        TextInputBinding {
            props,
            store,
            value,
            dirty,
        }
    }

    /// A user edit. Returns false when the input is disabled and the edit
    /// was ignored.
    pub fn input(&mut self, value: &str) -> bool {
        if self.props.disabled {
            tracing::debug!(id = %self.props.id, "ignoring edit of disabled input");
            return false;
        }
        self.value = value.to_string();
        self.dirty = true;
        self.store.inputs().write(&self.props.id, self.value.clone());
        true
    }

    /// Restore the default value and clear the dirty flag.
    pub fn reset(&mut self) {
        self.value = self.props.default_value.clone();
        self.dirty = false;
        self.store.inputs().write(&self.props.id, self.value.clone());
    }

    pub fn id(&self) -> &str {
        &self.props.id
    }

    pub fn props(&self) -> &TextInputProps {
        &self.props
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn hints(&self) -> Vec<ValidationHint> {
        let mut hints = Vec::new();
        if !self.value.is_empty() {
            match self.props.input_type {
                InputType::Email if !self.value.contains('@') => hints.push(ValidationHint::InvalidEmail),
                InputType::Url if !self.value.starts_with("http") => hints.push(ValidationHint::MissingScheme),
                _ => {}
            }
        } else if self.props.required && self.dirty {
            hints.push(ValidationHint::Required);
        }
        hints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(src: &str) -> Directive {
        let loaded = livedoc::load(src, 0);
        loaded.document.directives()[0].clone()
    }

    fn mount(src: &str) -> (TextInputBinding, ContextStore) {
        let store = ContextStore::new();
        let props = TextInputProps::from_directive(&directive(src), "textinput-0".into(), &RenderConfig::default());
        (TextInputBinding::mount(props, store.clone()), store)
    }

    #[test]
    fn defaults() {
        let (input, store) = mount("::textinput\n");
        let props = input.props();
        assert_eq!(props.id, "textinput-0");
        assert_eq!(props.placeholder, "Enter text...");
        assert_eq!(props.input_type, InputType::Text);
        assert!(!props.required && !props.disabled);
        assert_eq!(props.label, None);
        assert_eq!(store.inputs().read("textinput-0").as_deref(), Some(""));
    }

    #[test]
    fn mount_publishes_default_value() {
        let (input, store) = mount("::textinput[Height]{id=\"height\" defaultValue=\"170\"}\n");
        assert_eq!(input.value(), "170");
        assert_eq!(input.props().label.as_deref(), Some("Height"));
        assert_eq!(store.inputs().read("height").as_deref(), Some("170"));
    }

    #[test]
    fn edits_propagate_and_reset_restores() {
        let (mut input, store) = mount("::textinput{id=\"w\" defaultValue=\"60\"}\n");
        assert!(input.input("65"));
        assert!(input.is_dirty());
        assert_eq!(store.inputs().read("w").as_deref(), Some("65"));

        input.reset();
        assert!(!input.is_dirty());
        assert_eq!(store.inputs().read("w").as_deref(), Some("60"));
    }

    #[test]
    fn disabled_input_ignores_edits() {
        let (mut input, store) = mount("::textinput{id=\"w\" disabled=\"true\" defaultValue=\"1\"}\n");
        assert!(!input.input("2"));
        assert_eq!(store.inputs().read("w").as_deref(), Some("1"));
    }

    #[test]
    fn validation_hints_are_advisory() {
        let (mut email, store) = mount("::textinput{id=\"e\" type=\"email\"}\n");
        email.input("nobody");
        assert_eq!(email.hints(), vec![ValidationHint::InvalidEmail]);
        assert_eq!(store.inputs().read("e").as_deref(), Some("nobody"));

        let (mut url, _) = mount("::textinput{id=\"u\" type=\"url\"}\n");
        url.input("example.com");
        assert_eq!(url.hints(), vec![ValidationHint::MissingScheme]);
        url.input("https://example.com");
        assert!(url.hints().is_empty());

        let (mut required, _) = mount("::textinput{id=\"r\" required=\"true\"}\n");
        assert!(required.hints().is_empty());
        required.input("");
        assert_eq!(required.hints(), vec![ValidationHint::Required]);
    }
}
