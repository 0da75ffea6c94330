//! Serializer: renders output files and writes them under the output root.
//!
//! Layout of one file:
//!
//! ```text
//! #include "<path>"          one per include
//!                            blank
//! <header lines>
//!                            blank
//! <prefix><ret> <key>(<type> <name>, ...)
//! {
//! <body lines>
//! }
//!                            blank, after every function
//! ```

use super::registry::{GenContext, OutputFile};
use crate::model::Function;
use anyhow::{Context, Result};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of [`write_files`].
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// `#include "<path>"`
pub fn include_line(path: &Path) -> String {
    format!("#include \"{}\"", path.display())
}

/// `<ret> <name>(<type> <name>, ...)`
pub fn signature(name: &str, header: &Function) -> String {
    let params = header
        .parameters
        .iter()
        .map(|p| format!("{} {}", p.ty, p.name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}({})", header.return_type, name, params)
}

/// Render one output file.
pub fn render(file: &OutputFile) -> String {
    let mut out = String::new();
    for include in &file.includes {
        out.push_str(&include_line(include));
        out.push('\n');
    }
    out.push('\n');

    for line in &file.header {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    for (name, function) in file.functions() {
        out.push_str(&function.prefix);
        out.push_str(&signature(name, &function.header));
        out.push('\n');
        out.push_str("{\n");
        for line in &function.body {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("}\n\n");
    }
    out
}

/// Write every file of `ctx` under `root`.
///
/// Parent directories are created first. A file that cannot be written is
/// logged and skipped; the remaining files are still written.
pub fn write_files(ctx: &GenContext, root: &Path) -> WriteReport {
    let mut report = WriteReport::default();
    for (name, file) in ctx.files() {
        let path = root.join(name);
        match write_one(&path, &render(file)) {
            Ok(()) => {
                info!("wrote {}", path.display());
                report.written.push(path);
            }
            Err(e) => {
                error!("{e:#}");
                report.failed.push(path);
            }
        }
    }
    report
}

fn write_one(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("could not open {}", path.display()))
}
