use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use livedoc::directive::{Directive, DirectiveKind};
use livedoc::document::Document;
use livedoc::parser::ParseError;

use crate::bindings::{
    Binding, ButtonBinding, ButtonProps, ResultDisplayBinding, ScriptBinding, ScriptProps, TextInputBinding,
    TextInputProps,
};
use crate::config::RuntimeConfig;
use crate::error::SessionError;
use crate::render;
use crate::result::ExecutionResult;
use crate::sandbox::Sandbox;
use crate::store::ContextStore;

/// A rendering session: one document, its bindings, and the store they share.
pub struct Session {
    source: String,
    file_id: usize,
    config: RuntimeConfig,
    store: ContextStore,
    sandbox: Rc<Sandbox>,
    document: Document,
    diagnostics: Vec<ParseError>,
    /// One per directive, in document order.
    bindings: Vec<Binding>,
}

impl Session {
    pub fn open(source: &str, config: RuntimeConfig) -> Self {
        Self::with_store(source, 0, config, ContextStore::new())
    }

    pub fn with_store(source: &str, file_id: usize, config: RuntimeConfig, store: ContextStore) -> Self {
        let sandbox = Rc::new(Sandbox::new(config.sandbox.clone()));
        let mut session = Session {
            source: String::new(),
            file_id,
            config,
            store,
            sandbox,
            document: Document::empty(file_id),
            diagnostics: Vec::new(),
            bindings: Vec::new(),
        };
        session.update(source);
        session
    }

    /// Rebuild the tree from new source text and remount every binding.
    /// The store and the values typed into surviving inputs carry over.
    pub fn update(&mut self, source: &str) {
        let typed: HashMap<String, (String, bool)> = self
            .bindings
            .iter()
            .filter_map(|binding| match binding {
                Binding::TextInput(input) if input.is_dirty() => {
                    Some((input.id().to_string(), (input.value().to_string(), true)))
                }
                _ => None,
            })
            .collect();
        // Old subscriptions end here, before anything new mounts.
        self.bindings.clear();

        let livedoc::Loaded {
            document,
            mut diagnostics,
        } = livedoc::load(source, self.file_id);

        let mut mounter = Mounter {
            store: &self.store,
            sandbox: &self.sandbox,
            config: &self.config,
            file_id: self.file_id,
            typed,
            warnings: Vec::new(),
        };
        let bindings = mounter.mount(&document);
        diagnostics.append(&mut mounter.warnings);
        diagnostics.sort_by_key(|d| d.span.start);

        tracing::debug!(
            directives = bindings.len(),
            diagnostics = diagnostics.len(),
            "session mounted"
        );

        self.source = source.to_string();
        self.document = document;
        self.diagnostics = diagnostics;
        self.bindings = bindings;
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn text_input(&self, id: &str) -> Option<&TextInputBinding> {
        self.bindings.iter().find_map(|binding| match binding {
            Binding::TextInput(input) if input.id() == id => Some(input),
            _ => None,
        })
    }

    pub fn scripts(&self) -> impl Iterator<Item = &ScriptBinding> {
        self.bindings.iter().filter_map(|binding| match binding {
            Binding::Script(script) => Some(script),
            _ => None,
        })
    }

    pub fn result(&self, result_id: &str) -> Option<ExecutionResult> {
        self.store.results().read(result_id)
    }

    /// Type into the input with `id`. Edits to a disabled input are ignored.
    pub fn set_input(&mut self, id: &str, value: &str) -> Result<(), SessionError> {
        let input = self.text_input_mut(id)?;
        input.input(value);
        Ok(())
    }

    pub fn reset_input(&mut self, id: &str) -> Result<(), SessionError> {
        self.text_input_mut(id)?.reset();
        Ok(())
    }

    /// Click the first enabled button bound to `event_id`. One click is one
    /// trigger write, however many buttons share the event. Returns whether
    /// anything was dispatched: `false` when every such button is disabled.
    pub fn click(&self, event_id: &str) -> Result<bool, SessionError> {
        let mut buttons = self
            .bindings
            .iter()
            .filter_map(|binding| match binding {
                Binding::Button(button) if button.props().event_id.as_deref() == Some(event_id) => Some(button),
                _ => None,
            })
            .peekable();
        if buttons.peek().is_none() {
            return Err(SessionError::UnknownEvent(event_id.to_string()));
        }
        let dispatched = buttons
            .find(|button| !button.props().disabled)
            .and_then(ButtonBinding::activate)
            .is_some();
        Ok(dispatched)
    }

    pub fn render(&self) -> String {
        render::render(&self.document, &self.bindings)
    }

    fn text_input_mut(&mut self, id: &str) -> Result<&mut TextInputBinding, SessionError> {
        self.bindings
            .iter_mut()
            .find_map(|binding| match binding {
                Binding::TextInput(input) if input.id() == id => Some(input),
                _ => None,
            })
            .ok_or_else(|| SessionError::UnknownInput(id.to_string()))
    }
}

struct Mounter<'a> {
    store: &'a ContextStore,
    sandbox: &'a Rc<Sandbox>,
    config: &'a RuntimeConfig,
    file_id: usize,
    /// Values the user typed before the last update, keyed by input id.
    typed: HashMap<String, (String, bool)>,
    warnings: Vec<ParseError>,
}

impl Mounter<'_> {
    /// Mount in two passes so that scripts which run at mount already see
    /// every input's initial value.
    fn mount(&mut self, document: &Document) -> Vec<Binding> {
        let directives = document.directives();
        let mut slots: Vec<Option<Binding>> = Vec::with_capacity(directives.len());

        let mut input_ids = HashSet::new();
        for (index, directive) in directives.iter().enumerate() {
            let binding = match directive.kind {
                DirectiveKind::TextInput => {
                    let props = TextInputProps::from_directive(
                        directive,
                        format!("textinput-{index}"),
                        &self.config.render,
                    );
                    if !input_ids.insert(props.id.clone()) {
                        self.duplicate(directive, "text input id", &props.id);
                    }
                    Some(Binding::TextInput(match self.typed.remove(&props.id) {
                        Some((value, dirty)) => TextInputBinding::remount(props, self.store.clone(), value, dirty),
                        None => TextInputBinding::mount(props, self.store.clone()),
                    }))
                }
                DirectiveKind::Button => Some(Binding::Button(ButtonBinding::mount(
                    ButtonProps::from_directive(directive),
                    self.store.clone(),
                ))),
                DirectiveKind::ResultDisplay => Some(Binding::ResultDisplay(ResultDisplayBinding::mount(
                    directive,
                    self.store.clone(),
                    &self.config.render,
                ))),
                DirectiveKind::Generic => Some(Binding::Generic),
                DirectiveKind::Script => None,
            };
            slots.push(binding);
        }

        let mut result_ids = HashSet::new();
        for (slot, directive) in slots.iter_mut().zip(&directives) {
            if directive.kind != DirectiveKind::Script {
                continue;
            }
            let props = ScriptProps::from_directive(directive);
            if let Some(result_id) = &props.result_id {
                if !result_ids.insert(result_id.clone()) {
                    self.duplicate(directive, "script resultId", result_id);
                }
            }
            let source = directive.raw_source.clone().unwrap_or_default();
            *slot = Some(Binding::Script(ScriptBinding::mount(
                props,
                source,
                self.store.clone(),
                Rc::clone(self.sandbox),
            )));
        }

        slots.into_iter().map(|slot| slot.unwrap_or(Binding::Generic)).collect()
    }

    fn duplicate(&mut self, directive: &Directive, what: &str, id: &str) {
        tracing::warn!(id, "duplicate {what}");
        self.warnings.push(
            ParseError::warning(format!("duplicate {what} `{id}`"), directive.span.clone(), self.file_id)
                .with_note("ids must be unique within a document; the directive mounted last wins"),
        );
    }
}
