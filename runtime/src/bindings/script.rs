use std::cell::{Cell, RefCell};
use std::rc::Rc;

use livedoc::directive::Directive;

use crate::result::ExecutionResult;
use crate::sandbox::Sandbox;
use crate::store::{ContextStore, Subscription, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptProps {
    pub event_id: Option<String>,
    pub result_id: Option<String>,
}

impl ScriptProps {
    pub fn from_directive(directive: &Directive) -> Self {
        ScriptProps {
            event_id: directive.attributes.non_empty("eventId").map(str::to_string),
            result_id: directive.attributes.non_empty("resultId").map(str::to_string),
        }
    }
}

/// State shared between the binding and its trigger subscription. The
/// subscription only holds a weak reference, so dropping the binding ends it.
struct ScriptCell {
    props: ScriptProps,
    source: String,
    status: Cell<ScriptStatus>,
    last_seen: Cell<Option<Timestamp>>,
    runs: Cell<u64>,
    last_result: RefCell<Option<ExecutionResult>>,
    store: ContextStore,
    sandbox: Rc<Sandbox>,
}

impl ScriptCell {
    fn observe(&self, stamp: Timestamp) {
        if self.last_seen.get() == Some(stamp) {
            return;
        }
        self.last_seen.set(Some(stamp));
        tracing::debug!(event_id = ?self.props.event_id, timestamp = %stamp, "trigger observed");
        self.run();
    }

    fn run(&self) {
        let code = self.source.trim();
        if code.is_empty() {
            tracing::debug!(result_id = ?self.props.result_id, "empty script body; nothing to run");
            return;
        }

        self.status.set(ScriptStatus::Running);
        self.runs.set(self.runs.get() + 1);
        tracing::info!(
            event_id = ?self.props.event_id,
            result_id = ?self.props.result_id,
            run = self.runs.get(),
            "executing script"
        );

        let result = self
            .sandbox
            .run_and_publish(code, &self.store, self.props.result_id.as_deref());

        self.status.set(if result.is_error() {
            ScriptStatus::Failed
        } else {
            ScriptStatus::Succeeded
        });
        *self.last_result.borrow_mut() = Some(result);
    }
}

/// A mounted script directive.
///
/// With an `eventId` it runs once per new trigger timestamp; the value
/// present at mount counts as already seen. Without one it runs once, at
/// mount.
pub struct ScriptBinding {
    cell: Rc<ScriptCell>,
    _subscription: Option<Subscription>,
}

impl ScriptBinding {
    pub fn mount(props: ScriptProps, source: String, store: ContextStore, sandbox: Rc<Sandbox>) -> Self {
        let cell = Rc::new(ScriptCell {
            props,
            source,
            status: Cell::new(ScriptStatus::Idle),
            last_seen: Cell::new(None),
            runs: Cell::new(0),
            last_result: RefCell::new(None),
            store,
            sandbox,
        });

        let subscription = match cell.props.event_id.clone() {
            Some(event_id) => {
                let triggers = cell.store.triggers();
                cell.last_seen.set(triggers.read(&event_id));
                let weak = Rc::downgrade(&cell);
                Some(triggers.subscribe(&event_id, move |stamp| {
                    if let Some(cell) = weak.upgrade() {
                        cell.observe(*stamp);
                    }
                }))
            }
            None => {
                cell.run();
                None
            }
        };

        ScriptBinding {
            cell,
            _subscription: subscription,
        }
    }

    pub fn props(&self) -> &ScriptProps {
        &self.cell.props
    }

    pub fn source(&self) -> &str {
        &self.cell.source
    }

    pub fn status(&self) -> ScriptStatus {
        self.cell.status.get()
    }

    /// How many times the script has entered `Running`.
    pub fn runs(&self) -> u64 {
        self.cell.runs.get()
    }

    pub fn last_result(&self) -> Option<ExecutionResult> {
        self.cell.last_result.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::FixedClock;

    fn props(event_id: Option<&str>, result_id: Option<&str>) -> ScriptProps {
        ScriptProps {
            event_id: event_id.map(str::to_string),
            result_id: result_id.map(str::to_string),
        }
    }

    fn mount(store: &ContextStore, props: ScriptProps, source: &str) -> ScriptBinding {
        ScriptBinding::mount(props, source.to_string(), store.clone(), Rc::new(Sandbox::default()))
    }

    #[test]
    fn props_from_directive() {
        let loaded = livedoc::load(":::js{eventId=\"e\" resultId=\"r\"}\n1\n:::\n", 0);
        let p = ScriptProps::from_directive(loaded.document.directives()[0]);
        assert_eq!(p, props(Some("e"), Some("r")));
    }

    #[test]
    fn without_event_runs_at_mount() {
        let store = ContextStore::new();
        let script = mount(&store, props(None, Some("r")), "6 * 7");
        assert_eq!(script.runs(), 1);
        assert_eq!(script.status(), ScriptStatus::Succeeded);
        assert_eq!(
            store.results().read("r").and_then(|r| r.display_text).as_deref(),
            Some("42")
        );
    }

    #[test]
    fn with_event_waits_for_trigger() {
        let store = ContextStore::new();
        let script = mount(&store, props(Some("go"), Some("r")), "1");
        assert_eq!(script.runs(), 0);
        assert_eq!(script.status(), ScriptStatus::Idle);
        assert!(store.results().read("r").is_none());

        store.triggers().write("go");
        assert_eq!(script.runs(), 1);
        assert_eq!(script.status(), ScriptStatus::Succeeded);
    }

    #[test]
    fn each_trigger_runs_once() {
        let store = ContextStore::with_clock(FixedClock(5));
        let script = mount(&store, props(Some("go"), None), "1");
        store.triggers().write("go");
        store.triggers().write("go");
        assert_eq!(script.runs(), 2);
    }

    #[test]
    fn trigger_present_at_mount_is_not_replayed() {
        let store = ContextStore::new();
        store.triggers().write("go");
        let script = mount(&store, props(Some("go"), None), "1");
        assert_eq!(script.runs(), 0);
        store.triggers().write("go");
        assert_eq!(script.runs(), 1);
    }

    #[test]
    fn empty_body_never_runs() {
        let store = ContextStore::new();
        let script = mount(&store, props(Some("go"), Some("r")), "  \n\t");
        store.triggers().write("go");
        assert_eq!(script.runs(), 0);
        assert_eq!(script.status(), ScriptStatus::Idle);
        assert!(store.results().read("r").is_none());
    }

    #[test]
    fn failures_are_published() {
        let store = ContextStore::new();
        let script = mount(&store, props(None, Some("r")), "throw new Error('nope')");
        assert_eq!(script.status(), ScriptStatus::Failed);
        assert_eq!(
            store.results().read("r").and_then(|r| r.error).as_deref(),
            Some("Error: nope")
        );
        assert_eq!(script.last_result(), store.results().read("r"));
    }

    #[test]
    fn dropping_binding_unsubscribes() {
        let store = ContextStore::new();
        let script = mount(&store, props(Some("go"), None), "1");
        assert_eq!(store.triggers().subscriber_count("go"), 1);
        drop(script);
        assert_eq!(store.triggers().subscriber_count("go"), 0);
        store.triggers().write("go");
    }
}
