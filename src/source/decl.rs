//! Declaration events produced by a scanner and consumed by the scope tracker.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Kind tag of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Namespace,
    /// class, struct or union
    Record,
    Field,
    Method,
    Constructor,
    Parameter,
    /// Free or static variable
    Variable,
    /// Free function
    Function,
}

/// One declaration as seen by a depth-first traversal.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    pub qualified_name: String,
    /// File the declaration was spelled in
    pub file: PathBuf,
    /// 1-based line of the declared name
    pub line: usize,
    /// Verbatim source line directly above `line`
    pub line_above: String,
    /// Raw source text of the declaration, at least up to the declarator
    pub source_text: String,
}

impl Declaration {
    /// Type as spelled in the source, see [`type_spelling`].
    pub fn type_spelling(&self) -> String {
        type_spelling(&self.source_text, &self.name)
    }
}

/// Traversal event: entering a declaration, or leaving the last entered one.
#[derive(Debug, Clone)]
pub enum DeclEvent {
    Enter(Declaration),
    Exit,
}

/// A finite, single-pass stream of declaration events.
#[derive(Debug)]
pub struct DeclStream {
    events: std::vec::IntoIter<DeclEvent>,
}

impl DeclStream {
    pub fn new(events: Vec<DeclEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl Iterator for DeclStream {
    type Item = DeclEvent;

    fn next(&mut self) -> Option<DeclEvent> {
        self.events.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

static RE_STATIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"static\s+").unwrap());

/// Best-effort type spelling from raw declaration text.
///
/// Takes everything before the last space that precedes the first occurrence
/// of `name` (the whole text when there is no such space), then deletes every
/// `static` keyword. This is a text heuristic, not a type query: references
/// and pointers glued to the name (`Foo &name`) lose their sigil, and a name
/// that also occurs inside the type (`float a`, `int n`) yields the whole text.
pub fn type_spelling(source_text: &str, name: &str) -> String {
    let search_end = source_text.find(name).unwrap_or(source_text.len());
    let type_end = source_text[..search_end]
        .rfind(' ')
        .unwrap_or(source_text.len());
    RE_STATIC
        .replace_all(&source_text[..type_end], "")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_simple() {
        assert_eq!(type_spelling("int bar", "bar"), "int");
        assert_eq!(type_spelling("float getX() const", "getX"), "float");
    }

    #[test]
    fn spelling_strips_static() {
        assert_eq!(type_spelling("static int count", "count"), "int");
        assert_eq!(type_spelling("static  const char* name()", "name"), "const char*");
    }

    #[test]
    fn spelling_keeps_qualified_types() {
        assert_eq!(
            type_spelling("const std::vector<int>& items", "items"),
            "const std::vector<int>&"
        );
        assert_eq!(type_spelling("sol::state& lua_state", "lua_state"), "sol::state&");
    }

    #[test]
    fn spelling_drops_sigil_glued_to_name() {
        assert_eq!(type_spelling("const Foo &foo", "foo"), "const Foo");
    }

    #[test]
    fn spelling_keeps_inner_spacing() {
        assert_eq!(type_spelling("unsigned   long value", "value"), "unsigned   long");
    }

    #[test]
    fn spelling_without_space_is_whole_text() {
        assert_eq!(type_spelling("x", "x"), "x");
    }

    #[test]
    fn spelling_uses_first_occurrence_of_name() {
        // "x" first occurs inside the type name
        assert_eq!(type_spelling("Matrix x", "x"), "Matrix x");
    }

    #[test]
    fn spelling_short_name_inside_builtin_type() {
        assert_eq!(type_spelling("float a", "a"), "float a");
        assert_eq!(type_spelling("int n", "n"), "int n");
        assert_eq!(type_spelling("float x", "x"), "float");
    }
}
