//! Source text preparation: comment/literal masking, include discovery,
//! tokenization and line lookup.
//!
//! Masking replaces every byte of a comment, string/char literal or
//! preprocessor line with a space (newlines are kept), so byte offsets in the
//! masked text map one-to-one onto the original.

use regex::Regex;
use std::sync::LazyLock;

static RE_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*#\s*include\s*"([^"]+)""#).unwrap());

/// A quoted `#include` found while masking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Byte offset of the directive line
    pub offset: usize,
    pub target: String,
}

/// Token kinds of the masked text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// `::`
    Scope,
    Punct(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// One loaded source file.
#[derive(Debug)]
pub struct SourceText {
    original: String,
    masked: String,
    line_starts: Vec<usize>,
    includes: Vec<IncludeDirective>,
}

impl SourceText {
    pub fn new(original: String) -> Self {
        let (masked, includes) = mask(&original);
        let line_starts = std::iter::once(0)
            .chain(original.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            original,
            masked,
            line_starts,
            includes,
        }
    }

    pub fn includes(&self) -> &[IncludeDirective] {
        &self.includes
    }

    /// Original text of a byte range.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.original[start..end]
    }

    /// Text of a token (identical in original and masked text).
    pub fn token_text(&self, token: &Token) -> &str {
        &self.masked[token.start..token.end]
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Verbatim text of a 1-based line, without the line terminator.
    pub fn line(&self, line: usize) -> &str {
        if line == 0 || line > self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|&next| next - 1)
            .unwrap_or(self.original.len());
        self.original[start..end].trim_end_matches('\r')
    }

    /// Line directly above `line`; empty for the first line.
    pub fn line_above(&self, line: usize) -> &str {
        if line <= 1 {
            return "";
        }
        self.line(line - 1)
    }

    pub fn tokenize(&self) -> Vec<Token> {
        tokenize(&self.masked)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MaskState {
    Code,
    LineComment,
    BlockComment,
    Literal(u8),
    RawString,
    Preprocessor,
}

/// Mask comments, literals and preprocessor lines.
fn mask(text: &str) -> (String, Vec<IncludeDirective>) {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut includes = Vec::new();
    let mut state = MaskState::Code;
    let mut at_line_start = true;
    let mut raw_terminator: Vec<u8> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            MaskState::Code => {
                if b == b'#' && at_line_start {
                    let line_end = text[i..].find('\n').map_or(text.len(), |n| i + n);
                    let line_start = text[..i].rfind('\n').map_or(0, |n| n + 1);
                    if let Some(caps) = RE_INCLUDE.captures(&text[line_start..line_end]) {
                        includes.push(IncludeDirective {
                            offset: i,
                            target: caps[1].to_string(),
                        });
                    }
                    state = MaskState::Preprocessor;
                    continue;
                }
                if b == b'/' && next == Some(b'/') {
                    state = MaskState::LineComment;
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                    state = MaskState::BlockComment;
                    continue;
                }
                if b == b'"' && i > 0 && bytes[i - 1] == b'R' {
                    // R"delim( ... )delim"
                    let open = text[i + 1..].find('(').map(|n| i + 1 + n);
                    if let Some(open) = open {
                        raw_terminator = Vec::with_capacity(open - i + 1);
                        raw_terminator.push(b')');
                        raw_terminator.extend_from_slice(&bytes[i + 1..open]);
                        raw_terminator.push(b'"');
                        for byte in &mut out[i..=open] {
                            *byte = b' ';
                        }
                        i = open + 1;
                        state = MaskState::RawString;
                        continue;
                    }
                }
                if b == b'"' || b == b'\'' {
                    // Digit separators (1'000) are not literals.
                    let digit_separator = b == b'\''
                        && i > 0
                        && bytes[i - 1].is_ascii_alphanumeric()
                        && next.is_some_and(|n| n.is_ascii_alphanumeric());
                    if !digit_separator {
                        out[i] = b' ';
                        state = MaskState::Literal(b);
                    }
                    i += 1;
                    at_line_start = false;
                    continue;
                }
                if b == b'\n' {
                    at_line_start = true;
                } else if !b.is_ascii_whitespace() {
                    at_line_start = false;
                }
                i += 1;
            }
            MaskState::LineComment => {
                if b == b'\n' {
                    state = MaskState::Code;
                    at_line_start = true;
                } else {
                    out[i] = b' ';
                }
                i += 1;
            }
            MaskState::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                    state = MaskState::Code;
                    continue;
                }
                if b != b'\n' {
                    out[i] = b' ';
                }
                i += 1;
            }
            MaskState::Literal(quote) => {
                if b == b'\\' && next.is_some_and(|n| n != b'\n') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                    continue;
                }
                if b == b'\n' {
                    // Unterminated literal; resynchronise at the line end.
                    state = MaskState::Code;
                    at_line_start = true;
                    i += 1;
                    continue;
                }
                out[i] = b' ';
                if b == quote {
                    state = MaskState::Code;
                }
                i += 1;
            }
            MaskState::RawString => {
                if bytes[i..].starts_with(&raw_terminator) {
                    for byte in &mut out[i..i + raw_terminator.len()] {
                        *byte = b' ';
                    }
                    i += raw_terminator.len();
                    state = MaskState::Code;
                    continue;
                }
                if b != b'\n' {
                    out[i] = b' ';
                }
                i += 1;
            }
            MaskState::Preprocessor => {
                if b == b'\\' && next == Some(b'\n') {
                    out[i] = b' ';
                    i += 2;
                    continue;
                }
                if b == b'\n' {
                    state = MaskState::Code;
                    at_line_start = true;
                } else {
                    out[i] = b' ';
                }
                i += 1;
            }
        }
    }

    // Masking only ever overwrites complete UTF-8 sequences with spaces.
    let masked = String::from_utf8(out)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    (masked, includes)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn tokenize(masked: &str) -> Vec<Token> {
    let bytes = masked.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = if b.is_ascii_digit() {
            while i < bytes.len()
                && (is_ident_byte(bytes[i]) || bytes[i] == b'.' || bytes[i] == b'\'')
            {
                i += 1;
            }
            TokenKind::Number
        } else if is_ident_byte(b) {
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            TokenKind::Ident
        } else if b == b':' && bytes.get(i + 1) == Some(&b':') {
            i += 2;
            TokenKind::Scope
        } else {
            i += 1;
            TokenKind::Punct(b)
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }
    tokens
}
