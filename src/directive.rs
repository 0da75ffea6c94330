//! Annotation directive parser.
//!
//! A directive is the single line directly above a declaration:
//!
//! ```text
//! CGMEMBER(LuaInspect, group={a=1, b}, name = value)
//! ```
//!
//! The result always starts with a sentinel property named after the keyword,
//! so consumers can test "annotated with K" with a plain lookup.

use crate::model::{Property, PropertyValue};
use std::fmt;

/// Directive keywords, one per declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Class,
    Member,
    Method,
    Constructor,
    Variable,
    Function,
}

impl Keyword {
    pub const ALL: [Keyword; 6] = [
        Keyword::Class,
        Keyword::Member,
        Keyword::Method,
        Keyword::Constructor,
        Keyword::Variable,
        Keyword::Function,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Class => "CGCLASS",
            Keyword::Member => "CGMEMBER",
            Keyword::Method => "CGMETHOD",
            Keyword::Constructor => "CGCONSTRUCTOR",
            Keyword::Variable => "CGVARIABLE",
            Keyword::Function => "CGFUNCTION",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a directive line for `keyword`.
///
/// Returns an empty list when the line is not a directive of that kind or is
/// malformed (missing `(` or `)`). The closing parenthesis is the first `)`
/// after the first `(`, so values cannot contain `)`.
pub fn parse(line: &str, keyword: Keyword) -> Vec<Property> {
    let line = line.trim_start();
    let Some(rest) = line.strip_prefix(keyword.as_str()) else {
        return Vec::new();
    };

    let Some(open) = rest.find('(') else {
        return Vec::new();
    };
    let Some(close) = rest[open + 1..].find(')') else {
        return Vec::new();
    };
    let inner = &rest[open + 1..open + 1 + close];

    let mut result = vec![Property::new(keyword.as_str(), "")];
    // Every entry is kept, so `K()` and `K(a,)` yield an empty-named property.
    result.extend(split_top_level(inner).into_iter().map(parse_entry));
    result
}

/// Parse one `name[=value]` entry.
fn parse_entry(entry: &str) -> Property {
    let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
    Property {
        name: strip_whitespace(name),
        value: parse_value(value),
    }
}

fn parse_value(value: &str) -> PropertyValue {
    let trimmed = value.trim();
    if let Some(body) = trimmed
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
    {
        let items = split_top_level(body)
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .map(parse_entry)
            .collect();
        return PropertyValue::Group(items);
    }
    PropertyValue::Text(strip_whitespace(value))
}

/// Split on commas that are not inside `{ ... }`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Remove all whitespace, including inside the token.
fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
