//! CLI tool to render, check and analyze Liquid templates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use liquid_rs::{Error, Liquid, Options, RenderOptions, Value};
use tracing_subscriber::EnvFilter;

/// Liquid template renderer
#[derive(Parser)]
#[command(name = "liquid")]
#[command(about = "Render, check and analyze Liquid templates")]
#[command(version)]
struct Cli {
    /// Log engine activity (partial lookups, cache, render timing) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        /// Template file
        file: PathBuf,

        /// Render data as a JSON object
        #[arg(short, long)]
        data: Option<String>,

        /// Directory searched for partials and layouts (repeatable)
        #[arg(short, long)]
        root: Vec<String>,

        /// Fail on undefined variables and filters
        #[arg(long)]
        strict: bool,

        /// Engine options as a JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse templates and report syntax errors
    Check {
        /// Template files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the variables a template reads
    Vars {
        /// Template file
        file: PathBuf,

        /// Only variables that must come from render data
        #[arg(short, long)]
        global: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn report(path: &str, err: &Error) {
    eprintln!("{path}: {err}");
    if let Some(excerpt) = err.excerpt() {
        eprintln!("{excerpt}");
    }
}

fn load_options(config: Option<&Path>) -> Result<Options, String> {
    let Some(config) = config else {
        return Ok(Options::default());
    };
    let text = fs::read_to_string(config).map_err(|e| format!("{}: {e}", config.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", config.display()))
}

fn render(
    file: &Path,
    data: Option<&str>,
    roots: Vec<String>,
    strict: bool,
    config: Option<&Path>,
) -> ExitCode {
    let mut options = match load_options(config) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    if !roots.is_empty() {
        options.root = roots;
    }
    if strict {
        options.strict_variables = true;
        options.strict_filters = true;
    }

    let data = match data.map(serde_json::from_str::<serde_json::Value>) {
        None => Value::Nil,
        Some(Ok(json)) => Value::from(json),
        Some(Err(e)) => {
            eprintln!("--data: {e}");
            return ExitCode::from(2);
        }
    };

    let path = file.to_string_lossy();
    let text = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let engine = Liquid::new(options);
    let result = engine.parse(&text, Some(&*path)).and_then(|template| {
        engine.render_to_writer(&template, data, RenderOptions::default(), io::stdout().lock())
    });
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report(&path, &e);
            ExitCode::FAILURE
        }
    }
}

fn check(files: &[PathBuf]) -> ExitCode {
    let engine = Liquid::new(Options::default());
    let mut had_error = false;
    for file in files {
        let path = file.to_string_lossy();
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("{path}: {e}");
                had_error = true;
                continue;
            }
        };
        match engine.parse(&text, Some(&*path)) {
            Ok(template) => eprintln!("{path}: valid ({} node(s))", template.nodes.len()),
            Err(e) => {
                report(&path, &e);
                had_error = true;
            }
        }
    }
    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn vars(file: &Path, global: bool) -> ExitCode {
    let path = file.to_string_lossy();
    let engine = Liquid::new(Options::default());
    let template = match fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|text| engine.parse(&text, Some(&*path)).map_err(|e| e.to_string()))
    {
        Ok(template) => template,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let names = if global {
        engine.global_variables(&template)
    } else {
        engine.variables(&template)
    };
    for name in names {
        println!("{name}");
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            file,
            data,
            root,
            strict,
            config,
        } => render(&file, data.as_deref(), root, strict, config.as_deref()),
        Commands::Check { files } => check(&files),
        Commands::Vars { file, global } => vars(&file, global),
    }
}
