// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Mica - a register-bytecode language with resumable fibers
//!
//! This is the entry point for the `mica` CLI and REPL.
//!
//! ## Modes
//!
//! - `mica FILE` loads a module and runs its entry method
//! - `mica -e CODE` evaluates an expression
//! - `mica` with neither starts the interactive REPL

mod repl;

use clap::Parser;
use mica_vm::{Engine, GcConfig, Value, VmConfig};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mica",
    about = "Run Mica programs on the register VM",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Source file to load and run
    file: Option<PathBuf>,

    /// Evaluate an expression and print its value
    #[arg(short = 'e', long = "eval", value_name = "CODE")]
    eval: Option<String>,

    /// Print the bytecode of every compiled method before running
    #[arg(long)]
    disassemble: bool,

    /// Collect at every safepoint that follows an allocation
    #[arg(long)]
    gc_stress: bool,

    /// Allocations before the first collection
    #[arg(long, value_name = "N")]
    gc_threshold: Option<usize>,

    /// Method to run after loading FILE
    #[arg(long, default_value = "main")]
    entry: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn vm_config(&self) -> VmConfig {
        let defaults = GcConfig::default();
        VmConfig {
            gc: GcConfig {
                initial_threshold: self.gc_threshold.unwrap_or(defaults.initial_threshold),
                stress: self.gc_stress,
                ..defaults
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = Engine::with_config(cli.vm_config());

    if let Some(code) = &cli.eval {
        return run_eval(engine, code);
    }
    if let Some(path) = &cli.file {
        return run_file(engine, path, &cli);
    }
    run_repl(engine)
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "mica=debug,mica_vm=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Start the interactive REPL
fn run_repl(engine: Engine) -> ExitCode {
    match repl::Repl::new(engine) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

/// Load a module from disk and run its entry method.
fn run_file(mut engine: Engine, path: &Path, cli: &Cli) -> ExitCode {
    if !path.exists() {
        eprintln!(
            "{}: file not found '{}'",
            "Error".red().bold(),
            path.display().cyan()
        );
        return ExitCode::FAILURE;
    }

    if let Err(e) = engine.load_file(path) {
        print_error(&e);
        return ExitCode::FAILURE;
    }

    if cli.disassemble {
        println!("{}", engine.disassemble());
    }

    match engine.run(&cli.entry) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Evaluate an expression from the command line.
fn run_eval(mut engine: Engine, code: &str) -> ExitCode {
    match engine.eval(code) {
        Ok(value) => {
            if value != Value::Nothing {
                println!("{}", engine.display(value));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(error: &mica_vm::Error) {
    eprintln!("{}: {}", "Error".red().bold(), error);
}
