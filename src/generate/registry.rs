//! Code-generation registry.
//!
//! One [`GenContext`] lives for a whole run. Handlers look up output files by
//! name and functions by key; both are created on first access and returned
//! for mutation, so contributions from several handlers and units accumulate.

use crate::model::Function;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

/// A generated function: verbatim prefix, signature and body lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullFunction {
    /// Emitted verbatim before the signature (e.g. `template <>\n`)
    pub prefix: String,
    /// Supplies the return type and parameter list. The emitted name is the
    /// registry key, not `header.object.name`.
    pub header: Function,
    pub body: Vec<String>,
}

/// Accumulated content of one output file.
#[derive(Debug, Default)]
pub struct OutputFile {
    /// Emitted as `#include` lines, sorted and deduplicated
    pub includes: BTreeSet<PathBuf>,
    /// Verbatim lines after the includes
    pub header: Vec<String>,
    functions: HashMap<String, FullFunction>,
    function_order: Vec<String>,
}

impl OutputFile {
    /// The function stored under `key`, created empty on first access.
    pub fn function(&mut self, key: &str) -> &mut FullFunction {
        if !self.functions.contains_key(key) {
            self.function_order.push(key.to_string());
        }
        self.functions.entry(key.to_string()).or_default()
    }

    /// Functions in first-access order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &FullFunction)> {
        self.function_order
            .iter()
            .filter_map(|key| self.functions.get(key).map(|f| (key.as_str(), f)))
    }

    /// Append a header line unless an identical one is already present.
    pub fn add_header_once(&mut self, line: &str) {
        if !self.header.iter().any(|existing| existing == line) {
            self.header.push(line.to_string());
        }
    }
}

/// All output files of a run, keyed by path relative to the output root.
#[derive(Debug, Default)]
pub struct GenContext {
    files: BTreeMap<String, OutputFile>,
}

impl GenContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The output file named `name`, created empty on first access.
    pub fn file(&mut self, name: &str) -> &mut OutputFile {
        self.files.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&OutputFile> {
        self.files.get(name)
    }

    /// Files in name order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &OutputFile)> {
        self.files.iter().map(|(name, file)| (name.as_str(), file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookups_accumulate() {
        let mut ctx = GenContext::new();
        ctx.file("out.gen").function("Init").body.push("first();".into());
        ctx.file("out.gen").function("Init").body.push("second();".into());

        let file = ctx.get("out.gen").unwrap();
        let (key, init) = file.functions().next().unwrap();
        assert_eq!(key, "Init");
        assert_eq!(init.body, vec!["first();", "second();"]);
        assert_eq!(file.functions().count(), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn new_function_defaults_to_void() {
        let mut ctx = GenContext::new();
        let function = ctx.file("a").function("f");
        assert_eq!(function.header.return_type, "void");
        assert!(function.prefix.is_empty());
        assert!(function.header.parameters.is_empty());
    }

    #[test]
    fn functions_keep_first_access_order() {
        let mut ctx = GenContext::new();
        let file = ctx.file("a");
        file.function("zeta");
        file.function("alpha");
        file.function("zeta").body.push("x".into());
        file.function("mid");
        let keys: Vec<_> = file.functions().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn includes_collapse_duplicates() {
        let mut ctx = GenContext::new();
        let file = ctx.file("a");
        file.includes.insert(PathBuf::from("b.h"));
        file.includes.insert(PathBuf::from("a.h"));
        file.includes.insert(PathBuf::from("a.h"));
        assert_eq!(file.includes.len(), 2);
    }

    #[test]
    fn header_once() {
        let mut file = OutputFile::default();
        file.add_header_once("#pragma once");
        file.add_header_once("#pragma once");
        assert_eq!(file.header, vec!["#pragma once"]);
    }

    #[test]
    fn files_iterate_by_name() {
        let mut ctx = GenContext::new();
        ctx.file("b.gen");
        ctx.file("a.gen");
        let names: Vec<_> = ctx.files().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.gen", "b.gen"]);
    }
}
