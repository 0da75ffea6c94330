//! cgen: generate C++ glue code (Lua bindings, reflection) from annotated
//! declarations in the headers of an MSBuild project.
//!
//! `cgen Game.vcxproj generated/` writes `generated/LuaBindings.cpp.gen`.

use anyhow::{bail, Result};
use cgen::dispatch::Dispatcher;
use cgen::handlers;
use cgen::pipeline::Pipeline;
use cgen::project::Project;
use cgen::source::Scanner;
use clap::Parser;
use log::{debug, info, LevelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cgen",
    about = "Generate C++ glue code from CG* annotations in a .vcxproj's headers"
)]
struct Cli {
    /// Project descriptor (.vcxproj)
    project: PathBuf,

    /// Existing directory receiving the generated files
    output: PathBuf,

    /// Also parse ClCompile entries, not just ClInclude
    #[arg(short = 's', long)]
    sources: bool,

    /// Extra directory searched for quoted includes. Can be repeated.
    #[arg(short = 'I', long = "include-dir")]
    include_dir: Vec<PathBuf>,

    /// Built-in handler sets, comma-separated: lua, reflect
    #[arg(short = 'H', long, value_delimiter = ',', default_value = "lua")]
    handlers: Vec<String>,

    /// Debug-level logging
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    // Pre-flight: nothing is parsed unless every check passes.
    if !cli.output.is_dir() {
        bail!(
            "output directory {} does not exist or is not a directory",
            cli.output.display()
        );
    }
    let mut dispatcher = Dispatcher::new();
    for name in &cli.handlers {
        handlers::install(name.trim(), &mut dispatcher)?;
    }
    let project = Project::load(&cli.project)?;

    for (slot, name) in dispatcher.handler_names() {
        debug!("handler {} on {}", name, slot);
    }

    let mut inputs = project.headers().to_vec();
    if cli.sources {
        inputs.extend_from_slice(project.sources());
    }
    info!("{} input files", inputs.len());

    let pipeline = Pipeline::new(Scanner::new(cli.include_dir.clone()), dispatcher);
    let report = pipeline.run(&inputs, &cli.output)?;

    info!(
        "{} units generated, {} failed, {} files written",
        report.units_parsed,
        report.units_failed,
        report.files_written.len()
    );
    if !report.files_failed.is_empty() {
        eprintln!(
            "warning: {} output file(s) could not be written",
            report.files_failed.len()
        );
    }
    Ok(())
}

/// `RUST_LOG` wins over the verbosity flags.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
