mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use livedoc::directive::{Directive, DirectiveKind};
use livedoc::parser::ParseError;
use runtime::{RuntimeConfig, Session};

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "livedoc", version, about = "Interactive markdown document runtime")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an interactive document
    Run(RunArgs),

    /// Run .test.md test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Markdown document to render
    file: String,

    /// Type into a text input before any click: `id=value`. Repeatable.
    #[arg(short, long = "input", value_name = "ID=VALUE", value_parser = parse_assignment)]
    inputs: Vec<(String, String)>,

    /// Click a button bound to this eventId. Repeatable, applied in order.
    #[arg(short, long = "click", value_name = "EVENT_ID")]
    clicks: Vec<String>,

    /// Runtime config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse and normalize only, print diagnostics
    #[arg(long)]
    check: bool,

    /// Dump the normalized document tree
    #[arg(long)]
    ast: bool,

    /// List every directive with its kind and attributes
    #[arg(long)]
    list_directives: bool,

    /// Print the results namespace as JSON after rendering
    #[arg(long)]
    results: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    init_tracing();

    // `livedoc doc.md` works like `livedoc run doc.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')).map(|p| p + 1) {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, value)) if !id.is_empty() => Ok((id.to_string(), value.to_string())),
        _ => Err(format!("expected ID=VALUE, got '{s}'")),
    }
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let config = match &args.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());
    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    // --check, --ast and --list-directives never execute scripts.
    if args.check || args.ast || args.list_directives {
        let loaded = livedoc::load(&source, file_id);
        emit_diagnostics(&writer, &term_config, &files, &loaded.diagnostics);
        if args.ast {
            println!("{:#?}", loaded.document);
        }
        if args.list_directives {
            for directive in loaded.document.directives() {
                println!("{}", describe_directive(directive, &source));
            }
        }
        if args.check {
            let errors = loaded.diagnostics.iter().filter(|d| !d.is_warning()).count();
            if errors > 0 {
                process::exit(1);
            }
            eprintln!(
                "ok: {} ({} directive(s), {} warning(s))",
                args.file,
                loaded.document.directives().len(),
                loaded.diagnostics.len()
            );
        }
        return;
    }

    let mut session = Session::with_store(&source, file_id, config, runtime::ContextStore::new());
    emit_diagnostics(&writer, &term_config, &files, session.diagnostics());

    for (id, value) in &args.inputs {
        if let Err(e) = session.set_input(id, value) {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
    for event_id in &args.clicks {
        match session.click(event_id) {
            Ok(false) => tracing::warn!(event_id = %event_id, "every button for this event is disabled"),
            Ok(true) => {}
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
    }

    print!("{}", session.render());

    if args.results {
        let results = session.store().results().snapshot();
        match serde_json::to_string_pretty(&results) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: cannot serialize results: {e}");
                process::exit(1);
            }
        }
    }
}

fn describe_directive(directive: &Directive, source: &str) -> String {
    let line = source[..directive.span.start.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1;
    let attrs = directive
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v:?}"))
        .collect::<Vec<_>>()
        .join(" ");
    let kind = match directive.kind {
        DirectiveKind::Generic => format!("generic({})", directive.name),
        kind => kind.to_string(),
    };
    format!("{line:>4}  {}{kind:<14} {attrs}", directive.form.marker())
}

fn emit_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[ParseError],
) {
    for diag in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diag.to_diagnostic());
    }
}
