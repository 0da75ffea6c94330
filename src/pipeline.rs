//! One generator run: scan and track every input unit, dispatch the kept
//! units into a shared registry, then write all output files.

use crate::dispatch::Dispatcher;
use crate::generate::{write_files, GenContext};
use crate::model::Unit;
use crate::source::Scanner;
use crate::tracker::ScopeTracker;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Counters and paths gathered over a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Units that produced at least one annotated entity
    pub units_parsed: usize,
    /// Units dropped because scanning or tracking failed
    pub units_failed: usize,
    pub skipped_parameters: usize,
    pub files_written: Vec<PathBuf>,
    pub files_failed: Vec<PathBuf>,
}

pub struct Pipeline {
    scanner: Scanner,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(scanner: Scanner, dispatcher: Dispatcher) -> Self {
        Self {
            scanner,
            dispatcher,
        }
    }

    /// Run over `inputs` in order and write the results under `output_root`.
    ///
    /// A unit that fails is reported and dropped; the others still generate.
    /// Only a missing output root is an error.
    pub fn run(&self, inputs: &[PathBuf], output_root: &Path) -> Result<RunReport> {
        if !output_root.is_dir() {
            anyhow::bail!("output root {} is not a directory", output_root.display());
        }

        let mut report = RunReport::default();
        let mut units = Vec::new();
        for input in inputs {
            match self.parse_unit(input) {
                Ok(unit) => {
                    if unit.skipped_parameters > 0 {
                        warn!(
                            "{}: {} parameter(s) outside any function skipped",
                            unit.path.display(),
                            unit.skipped_parameters
                        );
                        report.skipped_parameters += unit.skipped_parameters;
                    }
                    if unit.is_empty() {
                        debug!("{}: nothing annotated", unit.path.display());
                        continue;
                    }
                    debug!(
                        "{}: {} classes, {} functions, {} variables",
                        unit.path.display(),
                        unit.classes.len(),
                        unit.functions.len(),
                        unit.variables.len()
                    );
                    units.push(unit);
                }
                Err(e) => {
                    warn!("{}: {:#}", input.display(), e);
                    report.units_failed += 1;
                }
            }
        }
        report.units_parsed = units.len();
        info!("parsed {} units ({} failed)", report.units_parsed, report.units_failed);

        let ctx = self.generate(&units);
        let written = write_files(&ctx, output_root);
        report.files_written = written.written;
        report.files_failed = written.failed;
        Ok(report)
    }

    /// Scan one input and fold its declarations into a unit.
    pub fn parse_unit(&self, input: &Path) -> Result<Unit> {
        let path = input
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", input.display()))?;
        let stream = self.scanner.scan(&path)?;
        let unit = ScopeTracker::track(&path, stream)?;
        Ok(unit)
    }

    /// Dispatch every unit, in order, into a fresh registry.
    pub fn generate(&self, units: &[Unit]) -> GenContext {
        let mut ctx = GenContext::new();
        for unit in units {
            self.dispatcher.dispatch(&mut ctx, unit);
        }
        ctx
    }
}
