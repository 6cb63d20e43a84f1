//! Plain-text rendering of a mounted document.
//!
//! Markdown without directives is echoed back as markdown. Directives are
//! replaced by the current view of their binding.

use livedoc::directive::{Directive, DirectiveForm};
use livedoc::document::{Block, BlockKind, Document, DocumentNode};

use crate::bindings::{Binding, ButtonBinding, ResultDisplayBinding, ResultView, ScriptBinding, ScriptStatus, TextInputBinding};

/// `bindings` must line up with `document.directives()`.
pub fn render(document: &Document, bindings: &[Binding]) -> String {
    let mut renderer = Renderer { bindings, next: 0 };
    let parts: Vec<String> = document.nodes.iter().map(|node| renderer.node(node)).collect();
    parts
        .iter()
        .map(|part| part.trim_end_matches('\n'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}

struct Renderer<'a> {
    bindings: &'a [Binding],
    next: usize,
}

impl Renderer<'_> {
    fn nodes(&mut self, nodes: &[DocumentNode]) -> String {
        nodes.iter().map(|node| self.node(node)).collect()
    }

    fn node(&mut self, node: &DocumentNode) -> String {
        match node {
            DocumentNode::Text(text) => text.clone(),
            DocumentNode::Block(block) if !has_directive(&block.children) => block.to_string(),
            DocumentNode::Block(block) => self.block(block),
            DocumentNode::Directive(directive) => self.directive(directive),
        }
    }

    /// Every child is walked exactly once, since walking a directive
    /// consumes its binding.
    fn block(&mut self, block: &Block) -> String {
        match &block.kind {
            BlockKind::Heading(level) => {
                let inner = self.nodes(&block.children);
                format!("{} {}\n", "#".repeat(*level as usize), inner.trim_end())
            }
            BlockKind::BlockQuote => {
                let inner = self.nodes(&block.children);
                inner.lines().map(|line| format!("> {line}\n")).collect()
            }
            BlockKind::List { start } => {
                let mut out = String::new();
                for (i, item) in block.children.iter().enumerate() {
                    let text = self.node(item);
                    match start {
                        Some(n) => out.push_str(&format!("{}. {}", n + i as u64, text)),
                        None => out.push_str(&format!("- {text}")),
                    }
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                out
            }
            BlockKind::Table => {
                let mut out = String::new();
                for (i, row) in block.children.iter().enumerate() {
                    out.push_str(&self.node(row));
                    if i == 0 {
                        if let DocumentNode::Block(head) = row {
                            out.push_str(&format!("|{}\n", "---|".repeat(head.children.len())));
                        }
                    }
                }
                out
            }
            BlockKind::TableHead | BlockKind::TableRow => {
                let cells: Vec<String> = block.children.iter().map(|cell| self.node(cell)).collect();
                format!("| {} |\n", cells.join(" | "))
            }
            BlockKind::Emphasis => format!("*{}*", self.nodes(&block.children)),
            BlockKind::Strong => format!("**{}**", self.nodes(&block.children)),
            BlockKind::Strikethrough => format!("~~{}~~", self.nodes(&block.children)),
            BlockKind::Link { dest, .. } => format!("[{}]({dest})", self.nodes(&block.children)),
            kind => {
                let inner = self.nodes(&block.children);
                if kind.is_block_level() && !inner.ends_with('\n') {
                    inner + "\n"
                } else {
                    inner
                }
            }
        }
    }

    fn directive(&mut self, directive: &Directive) -> String {
        let index = self.next;
        self.next += 1;
        let inline = directive.form == DirectiveForm::Text;
        if !matches!(self.bindings.get(index), Some(Binding::Generic) | None) {
            // Bound directives never render their children; skip any
            // directives nested in them so indices stay aligned.
            self.next += count_directives(&directive.children);
        }

        let view = match self.bindings.get(index) {
            Some(Binding::TextInput(input)) => text_input(input, inline),
            Some(Binding::Button(button)) => button_view(button),
            Some(Binding::Script(script)) => return script_view(script),
            Some(Binding::ResultDisplay(display)) => result_view(display, inline),
            Some(Binding::Generic) | None => {
                let children = self.nodes(&directive.children);
                return match directive.form {
                    DirectiveForm::Text => children,
                    DirectiveForm::Leaf if children.is_empty() => String::new(),
                    DirectiveForm::Leaf => children + "\n",
                    DirectiveForm::Container => children,
                };
            }
        };

        if inline || view.is_empty() {
            view.trim_end_matches('\n').to_string()
        } else if view.ends_with('\n') {
            view
        } else {
            view + "\n"
        }
    }
}

fn count_directives(nodes: &[DocumentNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            DocumentNode::Text(_) => 0,
            DocumentNode::Block(block) => count_directives(&block.children),
            DocumentNode::Directive(directive) => 1 + count_directives(&directive.children),
        })
        .sum()
}

fn has_directive(nodes: &[DocumentNode]) -> bool {
    nodes.iter().any(|node| match node {
        DocumentNode::Text(_) => false,
        DocumentNode::Block(block) => has_directive(&block.children),
        DocumentNode::Directive(_) => true,
    })
}

fn text_input(input: &TextInputBinding, inline: bool) -> String {
    let props = input.props();
    let shown = if input.value().is_empty() {
        format!("({})", props.placeholder)
    } else {
        input.value().to_string()
    };
    let mut out = String::new();
    if let Some(label) = &props.label {
        out.push_str(label);
        if props.required {
            out.push('*');
        }
        out.push_str(": ");
    }
    out.push_str(&format!("[{shown}]"));
    if props.disabled {
        out.push_str(" (disabled)");
    }
    for hint in input.hints() {
        if inline {
            out.push_str(&format!(" (! {hint})"));
        } else {
            out.push_str(&format!("\n  ! {hint}"));
        }
    }
    out
}

fn button_view(button: &ButtonBinding) -> String {
    let props = button.props();
    if props.disabled {
        format!("[ {} ] (disabled)", props.label)
    } else {
        format!("[ {} ]", props.label)
    }
}

fn script_view(script: &ScriptBinding) -> String {
    let mut out = format!("```js\n{}\n```\n", script.source().trim_end());
    match (script.status(), script.last_result()) {
        (ScriptStatus::Running, _) => out.push_str("(running)\n"),
        (ScriptStatus::Failed, Some(result)) => {
            out.push_str(&format!("! {}\n", result.error.unwrap_or_default()));
        }
        // Without a resultId nothing else shows the output, so show it here.
        (ScriptStatus::Succeeded, Some(result)) if script.props().result_id.is_none() => {
            let mut lines = result.logs;
            if let Some(display) = result.display_text {
                lines.push(format!("Return value: {display}"));
            }
            if !lines.is_empty() {
                out.push_str("Output:\n");
                for line in lines {
                    out.push_str(&format!("  {line}\n"));
                }
            }
        }
        _ => {}
    }
    out
}

fn result_view(display: &ResultDisplayBinding, inline: bool) -> String {
    match display.view() {
        ResultView::Hidden => String::new(),
        ResultView::Placeholder(text) => {
            if inline {
                format!("({text})")
            } else {
                format!("> {text}\n")
            }
        }
        ResultView::Error { message } => format!("! {message}\n"),
        ResultView::Output { display, logs } => {
            let mut out = String::new();
            if let Some(display) = display {
                out.push_str(&format!("Result: {display}\n"));
            }
            if !logs.is_empty() && !inline {
                out.push_str("Logs:\n");
                for line in logs {
                    out.push_str(&format!("  {line}\n"));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RuntimeConfig;
    use crate::session::Session;

    fn render(source: &str) -> String {
        Session::open(source, RuntimeConfig::default()).render()
    }

    #[test]
    fn plain_markdown_is_echoed() {
        assert_eq!(render("# Title\n\nSome *text*.\n"), "# Title\n\nSome *text*.\n");
    }

    #[test]
    fn interactive_nodes_show_their_state() {
        let src = "::textinput[Name]{id=\"n\" required=\"true\"}\n\n::button[Go]{eventId=\"go\"}\n\n::resultdisplay{resultId=\"r\"}\n";
        assert_eq!(
            render(src),
            "Name*: [(Enter text...)]\n\n[ Go ]\n\n> No results yet. Click a button to execute code.\n"
        );
    }

    #[test]
    fn script_error_renders_inline_banner() {
        let src = "Before\n\n:::js\nthrow new Error('boom')\n:::\n\nAfter\n";
        assert_eq!(
            render(src),
            "Before\n\n```js\nthrow new Error('boom')\n```\n! Error: boom\n\nAfter\n"
        );
    }

    #[test]
    fn script_without_result_id_shows_its_output() {
        let src = ":::js\nconsole.log('hi');\n1 + 1\n:::\n";
        assert_eq!(
            render(src),
            "```js\nconsole.log('hi');\n1 + 1\n```\nOutput:\n  hi\n  Return value: 2\n"
        );
    }

    #[test]
    fn result_display_with_logs() {
        let src = ":::js{resultId=\"r\"}\nconsole.log('a');\n'done'\n:::\n\n::resultdisplay{resultId=\"r\"}\n";
        let out = render(src);
        assert!(out.ends_with("Result: done\nLogs:\n  a\n"), "{out}");
    }

    #[test]
    fn inline_directives_render_in_their_paragraph() {
        let src = "Weight :textinput{#w defaultValue=\"60\"} kg :button[Go]{eventId=\"go\"}\n";
        assert_eq!(render(src), "Weight [60] kg [ Go ]\n");
    }

    #[test]
    fn directives_in_list_items_keep_their_bindings() {
        let src = "- :textinput[Name]{id=\"n\" defaultValue=\"Ada\"}\n- :button[Go]{eventId=\"go\"}\n\n::resultdisplay{resultId=\"r\"}\n";
        assert_eq!(
            render(src),
            "- Name: [Ada]\n- [ Go ]\n\n> No results yet. Click a button to execute code.\n"
        );
    }

    #[test]
    fn directives_in_table_cells_keep_their_bindings() {
        let src = "| Field | Action |\n|---|---|\n| :textinput{id=\"n\" defaultValue=\"7\"} | :button[Go]{eventId=\"go\"} |\n\n::resultdisplay{resultId=\"r\"}\n";
        let out = render(src);
        assert!(out.contains("| [7] | [ Go ] |"), "{out}");
        assert!(out.ends_with("> No results yet. Click a button to execute code.\n"), "{out}");
    }

    #[test]
    fn generic_directives_render_their_label() {
        assert_eq!(render("::mycomponent[hello]{prop1=\"x\"}\n"), "hello\n");
    }
}
