#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use tsinfer::config::{load_options, load_scene, resolve_entries};
use tsinfer::{DiagnosticCategory, InferenceOptions, InferenceReport, TypeInferenceManager};

#[derive(Parser, Debug)]
#[command(
    name = "tsinfer",
    version,
    about = "Infer structural types of method arguments, `this` and return values"
)]
struct CliArgs {
    /// Scene file (JSON).
    scene: PathBuf,

    /// Inference options file (JSON).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Entry method as `Class::method`. Repeatable; defaults to every method.
    #[arg(short = 'e', long = "entry")]
    entries: Vec<String>,

    /// Analyze methods not reached from the entries in a second round.
    #[arg(long)]
    all_methods: bool,

    /// Keep anonymous object shapes instead of guessing declared classes.
    #[arg(long)]
    no_guess: bool,

    /// Per-phase deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print informational diagnostics too.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    tsinfer::tracing_config::init_tracing();
    let args = CliArgs::parse();

    let mut options = match &args.config {
        Some(path) => load_options(path)?,
        None => InferenceOptions::default(),
    };
    if args.no_guess {
        options.guess_types = false;
    }
    if args.timeout_ms.is_some() {
        options.phase_timeout_ms = args.timeout_ms;
    }

    let scene = load_scene(&args.scene)?;
    let entries = resolve_entries(&scene, &args.entries)?;
    let all_methods: Vec<_> = scene.method_ids().collect();

    let manager = TypeInferenceManager::new(&scene, options);
    let result = manager
        .analyze(&entries, args.all_methods.then_some(all_methods.as_slice()))
        .context("inference failed")?;

    for diagnostic in manager.take_diagnostics() {
        if args.verbose || diagnostic.category != DiagnosticCategory::Message {
            eprintln!("{diagnostic}");
        }
    }

    let report = result.report(&scene);
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &InferenceReport) {
    for (method, types) in &report.methods {
        println!("{method}");
        for (base, ty) in &types.types {
            println!("  {base}: {ty}");
        }
        if let Some(returns) = &types.returns {
            println!("  returns: {returns}");
        }
    }
    for (class, this) in &report.classes {
        println!("class {class}: {this}");
    }
}
