use livedoc::directive::Directive;

use super::{flag, label_text};
use crate::store::{ContextStore, Timestamp};

pub const DEFAULT_BUTTON_LABEL: &str = "Button";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Primary,
    Secondary,
    Danger,
    Success,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Size {
    Sm,
    #[default]
    Md,
    Lg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonType {
    #[default]
    Button,
    Submit,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonProps {
    pub event_id: Option<String>,
    pub variant: Variant,
    pub size: Size,
    pub disabled: bool,
    pub button_type: ButtonType,
    pub label: String,
}

impl ButtonProps {
    pub fn from_directive(directive: &Directive) -> Self {
        let attrs = &directive.attributes;
        let variant = match attrs.get("variant") {
            None | Some("primary") => Variant::Primary,
            Some("secondary") => Variant::Secondary,
            Some("danger") => Variant::Danger,
            Some("success") => Variant::Success,
            Some("outline") => Variant::Outline,
            Some(other) => {
                tracing::warn!(variant = other, "unknown button variant; using primary");
                Variant::Primary
            }
        };
        let size = match attrs.get("size") {
            Some("sm") => Size::Sm,
            Some("lg") => Size::Lg,
            _ => Size::Md,
        };
        let button_type = match attrs.get("type") {
            Some("submit") => ButtonType::Submit,
            Some("reset") => ButtonType::Reset,
            _ => ButtonType::Button,
        };
        ButtonProps {
            event_id: attrs.non_empty("eventId").map(str::to_string),
            variant,
            size,
            disabled: flag(attrs, "disabled"),
            button_type,
            label: label_text(directive).unwrap_or_else(|| DEFAULT_BUTTON_LABEL.to_string()),
        }
    }
}

pub struct ButtonBinding {
    props: ButtonProps,
    store: ContextStore,
}

impl ButtonBinding {
    pub fn mount(props: ButtonProps, store: ContextStore) -> Self {
        ButtonBinding { props, store }
    }

    pub fn props(&self) -> &ButtonProps {
        &self.props
    }

    /// A click. Dispatches `triggers[eventId]` unless the button is disabled
    /// or has no event.
    pub fn activate(&self) -> Option<Timestamp> {
        if self.props.disabled {
            tracing::debug!(label = %self.props.label, "click on disabled button ignored");
            return None;
        }
        let Some(event_id) = &self.props.event_id else {
            tracing::debug!(label = %self.props.label, "button has no eventId; nothing dispatched");
            return None;
        };
        tracing::info!(event_id = %event_id, "button clicked");
        Some(self.store.triggers().write(event_id))
    }
}
