use std::cell::Cell;
use std::rc::Rc;

use livedoc::directive::Directive;

use super::label_text;
use crate::config::RenderConfig;
use crate::store::{ContextStore, Subscription};

/// What a result display currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultView {
    /// No `resultId`: renders nothing.
    Hidden,
    Placeholder(String),
    Error {
        message: String,
    },
    Output {
        display: Option<String>,
        logs: Vec<String>,
    },
}

/// A mounted result display, subscribed to `results[resultId]`.
pub struct ResultDisplayBinding {
    result_id: Option<String>,
    placeholder: String,
    store: ContextStore,
    revision: Rc<Cell<u64>>,
    _subscription: Option<Subscription>,
}

impl ResultDisplayBinding {
    pub fn mount(directive: &Directive, store: ContextStore, config: &RenderConfig) -> Self {
        let result_id = directive.attributes.non_empty("resultId").map(str::to_string);
        let placeholder = label_text(directive).unwrap_or_else(|| config.result_placeholder.clone());
        let revision = Rc::new(Cell::new(0));

        let subscription = result_id.as_deref().map(|id| {
            let revision = Rc::clone(&revision);
            store.results().subscribe(id, move |_| revision.set(revision.get() + 1))
        });
        if result_id.is_none() {
            tracing::debug!("result display without resultId renders nothing");
        }

        ResultDisplayBinding {
            result_id,
            placeholder,
            store,
            revision,
            _subscription: subscription,
        }
    }

    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    /// Number of result writes observed since mount.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn view(&self) -> ResultView {
        let Some(id) = &self.result_id else {
            return ResultView::Hidden;
        };
        match self.store.results().read(id) {
            None => ResultView::Placeholder(self.placeholder.clone()),
            Some(result) => match result.error {
                Some(message) => ResultView::Error { message },
                None => ResultView::Output {
                    display: result.display_text,
                    logs: result.logs,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ExecutionResult;

    fn mount(src: &str, store: &ContextStore) -> ResultDisplayBinding {
        let loaded = livedoc::load(src, 0);
        ResultDisplayBinding::mount(loaded.document.directives()[0], store.clone(), &RenderConfig::default())
    }

    #[test]
    fn placeholder_until_result_arrives() {
        let store = ContextStore::new();
        let display = mount("::resultdisplay{resultId=\"r\"}\n", &store);
        assert_eq!(
            display.view(),
            ResultView::Placeholder("No results yet. Click a button to execute code.".to_string())
        );

        store.results().write(
            "r",
            ExecutionResult::success(Some(serde_json::json!(3)), Some("3".into()), vec!["log".into()]),
        );
        assert_eq!(
            display.view(),
            ResultView::Output {
                display: Some("3".into()),
                logs: vec!["log".into()]
            }
        );
        assert_eq!(display.revision(), 1);
    }

    #[test]
    fn label_replaces_placeholder() {
        let store = ContextStore::new();
        let display = mount("::resultdisplay[BMI appears here]{resultId=\"bmi\"}\n", &store);
        assert_eq!(display.view(), ResultView::Placeholder("BMI appears here".into()));
    }

    #[test]
    fn error_result_shows_error() {
        let store = ContextStore::new();
        let display = mount("::resultdisplay{resultId=\"r\"}\n", &store);
        store.results().write("r", ExecutionResult::failure("Error: boom", vec!["x".into()]));
        assert_eq!(
            display.view(),
            ResultView::Error {
                message: "Error: boom".into()
            }
        );
    }

    #[test]
    fn missing_result_id_is_hidden() {
        let store = ContextStore::new();
        let display = mount("::resultdisplay[ignored]\n", &store);
        assert_eq!(display.view(), ResultView::Hidden);
    }

    #[test]
    fn only_its_own_slot_counts() {
        let store = ContextStore::new();
        let display = mount("::resultdisplay{resultId=\"a\"}\n", &store);
        store.results().write("b", ExecutionResult::default());
        store.inputs().write("a", "x".into());
        assert_eq!(display.revision(), 0);
    }
}
