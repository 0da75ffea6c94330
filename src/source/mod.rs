//! Declaration source: turns C++ headers into depth-first declaration events.

pub mod decl;
pub mod scanner;
pub mod text;

pub use decl::{type_spelling, DeclEvent, DeclKind, DeclStream, Declaration};
pub use scanner::Scanner;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use text::SourceText;

/// A source file loaded once for a lookup scan.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    text: SourceText,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::from_string(path, content))
    }

    pub fn from_string(path: &Path, content: String) -> Self {
        Self {
            path: path.to_path_buf(),
            text: SourceText::new(content),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &SourceText {
        &self.text
    }

    /// Verbatim line `line - 1`; empty for the first line or out of range.
    pub fn line_above(&self, line: usize) -> &str {
        self.text.line_above(line)
    }
}
