use std::cell::Cell;
use std::rc::Rc;

use runtime::bindings::{Binding, ResultView, ScriptBinding, ScriptProps, ScriptStatus};
use runtime::store::{Clock, ContextStore, InputSnapshot};
use runtime::{ExecutionResult, RuntimeConfig, Sandbox, Session};

struct FrozenClock;

impl Clock for FrozenClock {
    fn now_millis(&self) -> i64 {
        1_700_000_000_000
    }
}

fn execute(source: &str) -> ExecutionResult {
    Sandbox::default().execute(source, &InputSnapshot::new())
}

fn execute_with(source: &str, inputs: &[(&str, &str)]) -> ExecutionResult {
    let snapshot: InputSnapshot = inputs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Sandbox::default().execute(source, &snapshot)
}

#[test]
fn two_triggers_two_runs() {
    let store = ContextStore::with_clock(FrozenClock);
    let script = ScriptBinding::mount(
        ScriptProps {
            event_id: Some("calc".into()),
            result_id: Some("out".into()),
        },
        "1 + 1".into(),
        store.clone(),
        Rc::new(Sandbox::default()),
    );

    let first = store.triggers().write("calc");
    let second = store.triggers().write("calc");
    assert_ne!(first, second);
    assert_eq!(script.runs(), 2);
    assert_eq!(script.status(), ScriptStatus::Succeeded);
}

#[test]
fn throwing_scripts_never_raise() {
    for source in [
        "throw new Error('x')",
        "throw null",
        "undefinedFunction()",
        "function f() { return f(); } f()",
        "{{{",
    ] {
        let result = execute(source);
        assert!(result.error.is_some(), "{source}");
        assert_eq!(result.value, None, "{source}");
    }
}

#[test]
fn primitive_display_text() {
    assert_eq!(execute("42").display_text.as_deref(), Some("42"));
    assert_eq!(execute("'hi'").display_text.as_deref(), Some("hi"));
}

#[test]
fn execution_is_idempotent() {
    let source = "console.log(inputs.a); inputs.a + '!'";
    let inputs = [("a", "x")];
    let first = execute_with(source, &inputs);
    let second = execute_with(source, &inputs);
    assert_eq!(first.logs, second.logs);
    assert_eq!(first.display_text, second.display_text);
}

#[test]
fn later_input_writes_do_not_reach_a_running_script() {
    let store = ContextStore::new();
    store.inputs().write("n", "1".into());
    let snapshot = store.inputs_snapshot();
    store.inputs().write("n", "2".into());

    let result = Sandbox::default().execute("inputs.n", &snapshot);
    assert_eq!(result.display_text.as_deref(), Some("1"));
}

#[test]
fn scenario_a_bmi() {
    let result = execute_with(
        "const h=parseFloat(inputs.height)/100; const w=parseFloat(inputs.weight); (w/(h*h)).toFixed(2);",
        &[("height", "170"), ("weight", "65")],
    );
    assert_eq!(result.value, Some(serde_json::json!("22.49")));
    assert_eq!(result.display_text.as_deref(), Some("22.49"));
}

#[test]
fn scenario_b_logs_and_value() {
    let result = execute(r#"console.log("a"); console.log("b"); 1+1;"#);
    assert_eq!(result.logs, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(result.display_text.as_deref(), Some("2"));
}

#[test]
fn scenario_c_error() {
    let result = execute(r#"throw new Error("boom")"#);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("boom")));
    assert_eq!(result.value, None);
}

#[test]
fn scenario_d_placeholder_before_any_run() {
    let session = Session::open("::resultdisplay{resultId=\"x\"}\n", RuntimeConfig::default());
    let Binding::ResultDisplay(display) = &session.bindings()[0] else {
        panic!("expected a result display");
    };
    assert!(matches!(display.view(), ResultView::Placeholder(_)));
    assert!(session.diagnostics().is_empty());
}

#[test]
fn only_subscribed_keys_notify() {
    let store = ContextStore::new();
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let _sub = store.results().subscribe("watched", move |_| counter.set(counter.get() + 1));

    store.inputs().write("watched", "x".into());
    store.triggers().write("watched");
    store.results().write("other", ExecutionResult::default());
    assert_eq!(hits.get(), 0);

    store.results().write("watched", ExecutionResult::default());
    assert_eq!(hits.get(), 1);
}

#[test]
fn full_document_flow() {
    let source = r#"# Greeting

::textinput[Your name]{id="name" placeholder="Type your name"}

::button[Greet]{eventId="greet"}

:::js{eventId="greet" resultId="greeting"}
const greeting = `Hello, ${inputs.name || "nobody"}!`;
console.log(greeting);
greeting;
:::

::resultdisplay[The greeting shows up here]{resultId="greeting"}
"#;
    let mut session = Session::open(source, RuntimeConfig::default());
    assert!(session.render().contains("> The greeting shows up here"));

    session.set_input("name", "Ada").unwrap();
    session.click("greet").unwrap();

    let rendered = session.render();
    assert!(rendered.contains("Your name: [Ada]"), "{rendered}");
    assert!(rendered.contains("Result: Hello, Ada!\nLogs:\n  Hello, Ada!\n"), "{rendered}");
}

#[test]
fn failing_script_does_not_break_the_document() {
    let source = "::button[Run]{eventId=\"go\"}\n\n:::js{eventId=\"go\" resultId=\"r\"}\nnope()\n:::\n\n::resultdisplay{resultId=\"r\"}\n\nStill here.\n";
    let session = Session::open(source, RuntimeConfig::default());
    session.click("go").unwrap();
    let rendered = session.render();
    assert!(rendered.contains("! ReferenceError"), "{rendered}");
    assert!(rendered.ends_with("Still here.\n"));
}

#[test]
fn config_file_limits_apply() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("livedoc.toml");
    std::fs::write(&path, "[render]\nresult_placeholder = \"Waiting\"\n").unwrap();
    let config = RuntimeConfig::load(&path).unwrap();

    let session = Session::open("::resultdisplay{resultId=\"r\"}\n", config);
    assert_eq!(session.render(), "> Waiting\n");
}
