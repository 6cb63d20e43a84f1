use livedoc::directive::{DirectiveForm, DirectiveKind};
use livedoc::document::{BlockKind, DocumentNode};

const GREETING: &str = r#"# Markdown editor

#### Text input

::textinput[Your name]{id="name" placeholder="Type your name"}

#### Button and script

::button[Greet]{eventId="greeting" variant="primary"}

:::js{eventId="greeting" resultId="greeting-result"}
const name = inputs.name || "nobody";
const greeting = `Hello, ${name}!`;
console.log(greeting);
greeting;
:::

::resultdisplay[The greeting shows up here]{resultId="greeting-result"}

## Other markdown

- item 1
- item 2

```javascript
::button[not a directive]{eventId="x"}
```

| a | b |
|---|---|
| 1 | 2 |
"#;

#[test]
fn editor_document_kinds_in_order() {
    let loaded = livedoc::load(GREETING, 0);
    assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);

    let kinds: Vec<DirectiveKind> = loaded.document.directives().iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DirectiveKind::TextInput,
            DirectiveKind::Button,
            DirectiveKind::Script,
            DirectiveKind::ResultDisplay,
        ]
    );
}

#[test]
fn script_source_is_sliced_verbatim() {
    let loaded = livedoc::load(GREETING, 0);
    let script = loaded
        .document
        .directives()
        .into_iter()
        .find(|d| d.kind == DirectiveKind::Script)
        .expect("script directive");
    assert_eq!(script.form, DirectiveForm::Container);
    assert_eq!(script.attr("eventId"), Some("greeting"));
    assert_eq!(script.attr("resultId"), Some("greeting-result"));
    assert_eq!(
        script.raw_source.as_deref(),
        Some(
            "const name = inputs.name || \"nobody\";\nconst greeting = `Hello, ${name}!`;\nconsole.log(greeting);\ngreeting;"
        )
    );
}

#[test]
fn non_directive_markdown_is_kept_as_blocks() {
    let loaded = livedoc::load(GREETING, 0);
    let kinds: Vec<&BlockKind> = loaded
        .document
        .nodes
        .iter()
        .filter_map(|n| match n {
            DocumentNode::Block(b) => Some(&b.kind),
            _ => None,
        })
        .collect();
    assert!(kinds.contains(&&BlockKind::Heading(1)));
    assert!(kinds.contains(&&BlockKind::List { start: None }));
    assert!(kinds.contains(&&BlockKind::Table));
    assert!(kinds.iter().any(|k| matches!(k, BlockKind::CodeBlock { language: Some(l) } if l == "javascript")));
}

#[test]
fn inline_directives_inside_paragraphs() {
    let src = "Height :textinput{#height defaultValue=\"170\"} cm, then :button[Go]{eventId=\"bmi\"}.\n";
    let loaded = livedoc::load(src, 0);
    let directives = loaded.document.directives();
    assert_eq!(directives.len(), 2);
    assert_eq!(directives[0].kind, DirectiveKind::TextInput);
    assert_eq!(directives[0].form, DirectiveForm::Text);
    assert_eq!(directives[0].attr("id"), Some("height"));
    assert_eq!(directives[1].kind, DirectiveKind::Button);
    assert_eq!(directives[1].label.as_deref(), Some("Go"));
}

#[test]
fn diagnostics_are_sorted_and_carry_lines() {
    let src = "::button{=bad}\n\ntext\n\n::script{}\n";
    let loaded = livedoc::load(src, 0);
    assert_eq!(loaded.diagnostics.len(), 2);
    assert!(loaded.diagnostics.iter().all(|d| d.is_warning()));
    assert_eq!(loaded.diagnostics[0].line(src), 1);
    assert_eq!(loaded.diagnostics[1].line(src), 5);
}
