//! Isolated execution of script directive bodies.
//!
//! Every execution gets a fresh QuickJS runtime and context. The only
//! globals added on top of the language built-ins are a frozen `inputs`
//! object and `console.log`, which appends to the captured logs. The VM is
//! released on every path out of `execute`, including failures.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use rquickjs::function::Rest;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Object, Runtime, Value};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::result::ExecutionResult;
use crate::store::{ContextStore, InputSnapshot};

type LogSink = Rc<RefCell<Vec<String>>>;

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

/// The completion of a script that did not throw.
struct Completion {
    value: Option<serde_json::Value>,
    display: Option<String>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Sandbox { config }
    }

    /// Run `source` against a snapshot of the inputs. Never fails: engine
    /// setup problems and script exceptions both come back as an
    /// error-carrying result.
    pub fn execute(&self, source: &str, inputs: &InputSnapshot) -> ExecutionResult {
        self.execute_with_release(source, inputs, dispose)
    }

    fn execute_with_release(&self, source: &str, inputs: &InputSnapshot, release: Release) -> ExecutionResult {
        let span = tracing::debug_span!("execute", bytes = source.len(), inputs = inputs.len());
        let _enter = span.enter();

        let logs: LogSink = Rc::new(RefCell::new(Vec::new()));
        let outcome = match VmScope::acquire(&self.config, release) {
            Ok(vm) => vm.run(source, inputs, &logs),
            Err(err) => Err(err),
        };
        let logs = logs.take();

        match outcome {
            Ok(completion) => {
                tracing::debug!(logs = logs.len(), "script completed");
                ExecutionResult::success(completion.value, completion.display, logs)
            }
            Err(SandboxError::Script(message)) => {
                tracing::debug!(error = %message, "script threw");
                ExecutionResult::failure(message, logs)
            }
            Err(err) => {
                tracing::error!(%err, "sandbox failure");
                ExecutionResult::failure(err.to_string(), logs)
            }
        }
    }

    /// Snapshot the store's inputs, execute, and publish the result under
    /// `result_id` when one is given.
    pub fn run_and_publish(&self, source: &str, store: &ContextStore, result_id: Option<&str>) -> ExecutionResult {
        let snapshot = store.inputs_snapshot();
        let result = self.execute(source, &snapshot);
        match result_id {
            Some(id) => store.results().write(id, result.clone()),
            None => tracing::debug!("script has no resultId; result not published"),
        }
        result
    }
}

/// Tears down a VM once an execution is over.
type Release = fn(Option<Context>, Option<Runtime>);

/// Owns one VM for the length of an execution and disposes of it on drop.
struct VmScope {
    context: Option<Context>,
    runtime: Option<Runtime>,
    release: Release,
}

impl VmScope {
    fn acquire(config: &SandboxConfig, release: Release) -> Result<Self, SandboxError> {
        let runtime = Runtime::new().map_err(SandboxError::Init)?;
        if config.memory_limit > 0 {
            runtime.set_memory_limit(config.memory_limit);
        }
        if config.max_stack_size > 0 {
            runtime.set_max_stack_size(config.max_stack_size);
        }
        let context = Context::full(&runtime).map_err(SandboxError::Init)?;
        Ok(VmScope {
            context: Some(context),
            runtime: Some(runtime),
            release,
        })
    }

    /// Run `body` inside the VM's context.
    fn with<R>(&self, body: impl FnOnce(Ctx<'_>) -> Result<R, SandboxError>) -> Result<R, SandboxError> {
        match &self.context {
            Some(context) => context.with(body),
            None => Err(SandboxError::Released),
        }
    }

    fn run(&self, source: &str, inputs: &InputSnapshot, logs: &LogSink) -> Result<Completion, SandboxError> {
        self.with(|ctx| {
            install_inputs(&ctx, inputs).map_err(SandboxError::Host)?;
            install_console(&ctx, logs).map_err(SandboxError::Host)?;
            match ctx.eval::<Value, _>(source).catch(&ctx) {
                Ok(value) => Ok(completion(&ctx, &value)),
                Err(caught) => Err(SandboxError::Script(describe_caught(&ctx, caught))),
            }
        })
    }
}

impl Drop for VmScope {
    fn drop(&mut self) {
        let context = self.context.take();
        let runtime = self.runtime.take();
        let release = self.release;
        guarded_release(move || release(context, runtime));
    }
}

fn dispose(context: Option<Context>, runtime: Option<Runtime>) {
    drop(context);
    if let Some(runtime) = &runtime {
        runtime.run_gc();
    }
    drop(runtime);
}

/// Run `release`, logging a panic instead of letting it unwind past the
/// result that was already computed. Returns whether it completed cleanly.
fn guarded_release(release: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(release)) {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%reason, "failed to dispose sandbox VM");
            false
        }
    }
}

fn install_inputs<'js>(ctx: &Ctx<'js>, inputs: &InputSnapshot) -> rquickjs::Result<()> {
    let object = Object::new(ctx.clone())?;
    for (key, value) in inputs {
        object.set(key.as_str(), value.as_str())?;
    }
    let globals = ctx.globals();
    let object_ctor: Object = globals.get("Object")?;
    let freeze: Function = object_ctor.get("freeze")?;
    let frozen: Object = freeze.call((object,))?;
    globals.set("inputs", frozen)?;
    Ok(())
}

fn install_console<'js>(ctx: &Ctx<'js>, logs: &LogSink) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    console.set("log", log_function(ctx, Rc::clone(logs))?)?;
    ctx.globals().set("console", console)?;
    Ok(())
}

/// `console.log`: stringify each argument and append one space-joined line.
fn log_function<'js>(ctx: &Ctx<'js>, logs: LogSink) -> rquickjs::Result<Function<'js>> {
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
        let line = args
            .0
            .iter()
            .map(|arg| stringify(&ctx, arg))
            .collect::<Vec<_>>()
            .join(" ");
        logs.borrow_mut().push(line);
    })
}

fn completion<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Completion {
    if value.is_undefined() {
        return Completion {
            value: None,
            display: None,
        };
    }
    let display = stringify(ctx, value);
    Completion {
        value: to_json(ctx, value),
        display: Some(display),
    }
}

/// `None` when JSON cannot represent the value: symbols, functions, bigints
/// and non-finite numbers.
fn to_json<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<serde_json::Value> {
    if value.as_number().is_some_and(|n| !n.is_finite()) {
        return None;
    }
    let text = json_text(ctx, value)?;
    serde_json::from_str(&text).ok()
}

/// `JSON.stringify(value)`. A throw (cycles, bigints) is cleared so it does
/// not linger as the context's pending exception.
fn json_text<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<String> {
    match ctx.json_stringify(value.clone()) {
        Ok(json) => json?.to_string().ok(),
        Err(_) => {
            ctx.catch();
            None
        }
    }
}

/// Strings pass through, objects and arrays become JSON, everything else
/// uses the language's own string conversion.
fn stringify<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    if value.is_array() || value.is_object() {
        if let Some(text) = json_text(ctx, value) {
            return text;
        }
    }
    language_string(ctx, value).unwrap_or_else(|| format!("{:?}", value.type_of()))
}

/// `String(value)`, which unlike implicit conversion also accepts symbols.
fn language_string<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<String> {
    let string_ctor: Function = ctx.globals().get("String").ok()?;
    match string_ctor.call((value.clone(),)) {
        Ok(text) => Some(text),
        Err(_) => {
            ctx.catch();
            None
        }
    }
}

fn describe_caught<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let name: Option<String> = exception.as_object().get("name").ok();
            match (name, exception.message()) {
                (Some(name), Some(message)) if !name.is_empty() => format!("{name}: {message}"),
                (_, Some(message)) => message,
                (_, None) => stringify(ctx, exception.as_object().as_value()),
            }
        }
        CaughtError::Value(value) => stringify(ctx, &value),
        CaughtError::Error(err) => err.to_string(),
    }
}
