//! vau - REPL and script runner for the Vau language
//!
//! Usage:
//!   vau                     # interactive REPL
//!   vau program.vau         # run a script
//!   vau -e "(+ 1 2)"        # evaluate one source string
//!
//! Directives inside the REPL:
//!   ,stats                  # runtime counters
//!   ,gc                     # force a stop-the-world collection
//!   ,quit                   # exit
//!
//! Logging goes to stderr, filtered by the VAU_LOG environment variable
//! (e.g. VAU_LOG=vau_runtime=debug). Runtime knobs come from --config,
//! overridden by VAU_* environment variables.

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vau_lang::{install_prelude, print, read_all};
use vau_runtime::{Runtime, RuntimeConfig, Value};

#[derive(Parser)]
#[command(name = "vau")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Actor-model runtime for the Vau language", long_about = None)]
struct Args {
    /// Vau source file to run (starts a REPL when omitted)
    script: Option<PathBuf>,

    /// Evaluate one source string and print the final result
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    eval: Option<String>,

    /// Runtime configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let filter = EnvFilter::try_from_env("VAU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_toml_file(path)?,
        None => RuntimeConfig::default(),
    };
    config.apply_env_overrides()?;

    let mut rt = Runtime::boot(config)?;
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground)?;
    rt.protect(scope);
    install_prelude(&mut rt, scope)?;

    if let Some(source) = &args.eval {
        if let Some(text) = eval_source(&mut rt, scope, source)? {
            println!("{text}");
        }
        return Ok(());
    }

    if let Some(path) = &args.script {
        let source = std::fs::read_to_string(path)?;
        eval_source(&mut rt, scope, &source)?;
        return Ok(());
    }

    repl(&mut rt, scope)
}

/// Read every datum in `source` and evaluate them in order in `scope`.
/// Returns the printed final value, or `None` for an empty source.
///
/// Every parsed expression is pinned before the first evaluation runs:
/// a collection inside one evaluation must not reclaim the expressions
/// still waiting their turn.
fn eval_source(
    rt: &mut Runtime,
    scope: Value,
    source: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let exprs = read_all(rt, source)?;
    for &expr in &exprs {
        rt.protect(expr);
    }
    let mut last = None;
    let mut outcome = Ok(());
    for &expr in &exprs {
        match rt.eval_sync(expr, scope) {
            Ok(v) => last = Some(print(rt, v)),
            Err(fault) => {
                outcome = Err(fault);
                break;
            }
        }
    }
    for &expr in &exprs {
        rt.unprotect(expr);
    }
    outcome?;
    Ok(last)
}

fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|dir| dir.join(".vau_history"))
}

fn repl(rt: &mut Runtime, scope: Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("vau {} - ,quit to exit", env!("CARGO_PKG_VERSION"));
    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("vau> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match line {
                    ",quit" => break,
                    ",stats" => {
                        println!("{}", rt.stats());
                        continue;
                    }
                    ",gc" => {
                        rt.collect();
                        println!("{}", rt.stats().heap);
                        continue;
                    }
                    _ => {}
                }
                match eval_source(rt, scope, line) {
                    Ok(Some(text)) => println!("{text}"),
                    Ok(None) => {}
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
    Ok(())
}
