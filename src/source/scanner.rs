//! Heuristic C++ declaration scanner.
//!
//! Recognises enough of the declaration grammar to drive the scope tracker:
//! namespaces, records, fields, methods, constructors, free functions, free
//! variables and parameters. Bodies are skipped by brace matching; there is
//! no expression parsing and no type resolution, so a variable with a
//! parenthesised initializer (`Foo foo(1);`) reads as a function.
//!
//! Quoted includes are inlined at the point they appear. Their declarations
//! keep the included file's identity so the tracker can filter them out.

use super::decl::{DeclEvent, DeclKind, DeclStream, Declaration};
use super::text::{IncludeDirective, Token, TokenKind};
use super::SourceFile;
use crate::directive::Keyword;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum include nesting.
const MAX_DEPTH: usize = 64;

/// Keywords whose parenthesised argument is part of a declaration prefix.
const PAREN_KEYWORDS: &[&str] = &["decltype", "alignas", "__attribute__", "__declspec"];

/// Statements skipped as a whole.
const SKIPPED_KEYWORDS: &[&str] = &["typedef", "using", "friend", "static_assert", "enum"];

const BUILTIN_TYPES: &[&str] = &[
    "void", "bool", "char", "wchar_t", "char8_t", "char16_t", "char32_t", "short", "int", "long",
    "float", "double", "signed", "unsigned", "auto",
];

/// Words that never carry a type on their own.
const QUALIFIERS: &[&str] = &[
    "const", "volatile", "struct", "class", "union", "enum", "typename", "register", "mutable",
];

const ACCESS_SPECIFIERS: &[&str] = &["public", "private", "protected"];

/// Scans header files into declaration event streams.
#[derive(Debug, Default)]
pub struct Scanner {
    /// Searched for quoted includes after the including file's directory
    include_dirs: Vec<PathBuf>,
}

impl Scanner {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }

    /// Scan `path` and every quoted include reachable from it.
    ///
    /// Each file is inlined at most once. Unresolved includes are logged and
    /// ignored; unreadable files and runaway nesting are errors.
    pub fn scan(&self, path: &Path) -> Result<DeclStream> {
        let mut seen = HashSet::new();
        let mut events = Vec::new();
        self.scan_recursive(path, &[], &mut seen, &mut events, 0)?;
        Ok(DeclStream::new(events))
    }

    fn scan_recursive(
        &self,
        path: &Path,
        outer: &[String],
        seen: &mut HashSet<PathBuf>,
        events: &mut Vec<DeclEvent>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            anyhow::bail!(
                "scan: maximum include depth ({MAX_DEPTH}) exceeded at {}",
                path.display()
            );
        }

        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        seen.insert(canonical.clone());
        let source = SourceFile::load(&canonical)?;
        debug!("scanning {}", canonical.display());

        let tokens = source.text().tokenize();
        let mut parser = FileParser {
            scanner: self,
            source: &source,
            tokens: &tokens,
            pos: 0,
            scopes: outer
                .iter()
                .map(|name| Scope {
                    name: name.clone(),
                    record: false,
                })
                .collect(),
            next_include: 0,
            seen,
            events,
            depth,
        };
        parser.run()
    }

    /// Resolution order: the including file's directory, then each include dir.
    fn resolve_include(&self, target: &str, current_dir: &Path) -> Option<PathBuf> {
        std::iter::once(current_dir.to_path_buf())
            .chain(self.include_dirs.iter().cloned())
            .map(|dir| dir.join(target))
            .find(|candidate| candidate.is_file())
    }
}

#[derive(Debug, Clone)]
struct Scope {
    name: String,
    record: bool,
}

/// Recursive-descent walk over one file's tokens.
struct FileParser<'a> {
    scanner: &'a Scanner,
    source: &'a SourceFile,
    tokens: &'a [Token],
    pos: usize,
    scopes: Vec<Scope>,
    next_include: usize,
    seen: &'a mut HashSet<PathBuf>,
    events: &'a mut Vec<DeclEvent>,
    depth: usize,
}

impl<'a> FileParser<'a> {
    fn run(&mut self) -> Result<()> {
        while self.pos < self.tokens.len() {
            // A stray `}` at file scope ends parse_block early; just resume.
            self.parse_block()?;
        }
        self.flush_includes(usize::MAX)
    }

    /// Parse statements up to and including the closing `}` of the block.
    fn parse_block(&mut self) -> Result<()> {
        while let Some(token) = self.token(self.pos) {
            self.flush_includes(token.start)?;
            if token.kind == TokenKind::Punct(b'}') {
                self.pos += 1;
                return Ok(());
            }
            let before = self.pos;
            self.parse_statement()?;
            if self.pos == before {
                self.pos += 1;
            }
        }
        Ok(())
    }

    /// Inline every include that appears before `offset`.
    fn flush_includes(&mut self, offset: usize) -> Result<()> {
        let source = self.source;
        let includes = source.text().includes();
        while let Some(include) = includes.get(self.next_include) {
            if include.offset >= offset {
                break;
            }
            self.next_include += 1;
            self.inline_include(include)?;
        }
        Ok(())
    }

    fn inline_include(&mut self, include: &IncludeDirective) -> Result<()> {
        let current_dir = self.source.path().parent().unwrap_or_else(|| Path::new("."));
        let Some(resolved) = self.scanner.resolve_include(&include.target, current_dir) else {
            warn!(
                "{}: unresolved include \"{}\" ignored",
                self.source.path().display(),
                include.target
            );
            return Ok(());
        };
        let canonical = resolved.canonicalize().unwrap_or(resolved);
        if self.seen.contains(&canonical) {
            debug!("{} already inlined", canonical.display());
            return Ok(());
        }
        let outer: Vec<String> = self.scopes.iter().map(|s| s.name.clone()).collect();
        self.scanner
            .scan_recursive(&canonical, &outer, self.seen, self.events, self.depth + 1)
    }

    fn parse_statement(&mut self) -> Result<()> {
        let start = self.pos;
        let Some(token) = self.token(start) else {
            return Ok(());
        };
        match token.kind {
            TokenKind::Punct(b';') => self.pos += 1,
            TokenKind::Punct(b'{') => self.pos = self.skip_group(start),
            TokenKind::Punct(b'[') if self.is_punct(start + 1, b'[') => self.parse_declaration(),
            TokenKind::Ident => match self.text(start) {
                word if is_directive(word) && self.is_punct(start + 1, b'(') => {
                    self.pos = self.skip_group(start + 1);
                }
                "namespace" => self.parse_namespace()?,
                "inline" if self.text(start + 1) == "namespace" => {
                    self.pos += 1;
                    self.parse_namespace()?;
                }
                "template" => {
                    self.pos += 1;
                    if self.is_punct(self.pos, b'<') {
                        self.pos = self.skip_group(self.pos);
                    }
                    self.skip_statement();
                }
                word if ACCESS_SPECIFIERS.contains(&word) && self.is_punct(start + 1, b':') => {
                    self.pos += 2;
                }
                "class" | "struct" | "union" => self.parse_record()?,
                "extern" if self.is_punct(start + 1, b'{') => {
                    self.pos += 2;
                    self.parse_block()?;
                }
                word if SKIPPED_KEYWORDS.contains(&word) => self.skip_statement(),
                _ => self.parse_declaration(),
            },
            _ => self.skip_statement(),
        }
        Ok(())
    }

    /// `namespace a::b { ... }`; one Namespace event per name part.
    fn parse_namespace(&mut self) -> Result<()> {
        let keyword = self.tokens[self.pos];
        let mut i = self.pos + 1;
        let mut parts = Vec::new();
        while self.is_ident(i) {
            parts.push(i);
            i += 1;
            if !self.is_scope(i) {
                break;
            }
            i += 1;
        }

        if !self.is_punct(i, b'{') {
            // alias
            self.skip_statement();
            return Ok(());
        }

        for &part in &parts {
            let name = self.text(part);
            let name_token = self.tokens[part];
            let decl = self.declaration(
                DeclKind::Namespace,
                name,
                name_token.start,
                (keyword.start, name_token.end),
            );
            self.events.push(DeclEvent::Enter(decl));
            self.scopes.push(Scope {
                name: name.to_string(),
                record: false,
            });
        }

        self.pos = i + 1;
        self.parse_block()?;

        for _ in &parts {
            self.scopes.pop();
            self.events.push(DeclEvent::Exit);
        }
        Ok(())
    }

    /// `class|struct|union [attrs] Name [final] [: bases] { ... } [declarators];`
    fn parse_record(&mut self) -> Result<()> {
        let start = self.pos;
        let mut name_at = None;
        let mut idents = 0;
        let mut i = start + 1;
        let head_end = loop {
            let Some(token) = self.token(i) else {
                break None;
            };
            match token.kind {
                TokenKind::Ident => {
                    if self.text(i) != "final" {
                        name_at = Some(i);
                        idents += 1;
                    }
                    i += 1;
                }
                TokenKind::Scope => i += 1,
                TokenKind::Punct(b'(' | b'[' | b'<') => i = self.skip_group(i),
                TokenKind::Punct(b'{' | b':') => break Some(i),
                _ => break None,
            }
        };

        let Some(mut brace) = head_end else {
            if self.is_punct(i, b';') && idents <= 1 {
                // forward declaration
                self.pos = i + 1;
            } else {
                // elaborated type in a declaration, e.g. `struct Foo* make();`
                self.parse_declaration();
            }
            return Ok(());
        };

        if self.is_punct(brace, b':') {
            brace += 1;
            while let Some(token) = self.token(brace) {
                match token.kind {
                    TokenKind::Punct(b'{' | b';' | b'}') => break,
                    TokenKind::Punct(b'<' | b'(') => brace = self.skip_group(brace),
                    _ => brace += 1,
                }
            }
            if !self.is_punct(brace, b'{') {
                self.pos = brace;
                self.skip_statement();
                return Ok(());
            }
        }

        let Some(name_at) = name_at else {
            // anonymous record
            self.pos = self.skip_group(brace);
            self.skip_statement();
            return Ok(());
        };

        let name = self.text(name_at);
        let name_token = self.tokens[name_at];
        let decl = self.declaration(
            DeclKind::Record,
            name,
            name_token.start,
            (self.tokens[start].start, name_token.end),
        );
        self.events.push(DeclEvent::Enter(decl));
        self.scopes.push(Scope {
            name: name.to_string(),
            record: true,
        });

        self.pos = brace + 1;
        self.parse_block()?;

        self.scopes.pop();
        self.events.push(DeclEvent::Exit);
        // `};` or `} instance;`
        self.skip_statement();
        Ok(())
    }

    /// Scan a declaration prefix up to the token that decides its shape.
    fn parse_declaration(&mut self) {
        let start = self.pos;
        let mut angle = 0usize;
        let mut i = start;
        while let Some(token) = self.token(i) {
            match token.kind {
                TokenKind::Ident if angle == 0 && self.text(i) == "operator" => {
                    self.pos = i;
                    self.skip_statement();
                    return;
                }
                TokenKind::Ident
                    if PAREN_KEYWORDS.contains(&self.text(i)) && self.is_punct(i + 1, b'(') =>
                {
                    i = self.skip_group(i + 1);
                }
                TokenKind::Punct(b'<') => {
                    angle += 1;
                    i += 1;
                }
                TokenKind::Punct(b'>') if angle > 0 => {
                    angle -= 1;
                    i += 1;
                }
                TokenKind::Punct(b'(') if angle > 0 => i = self.skip_group(i),
                TokenKind::Punct(b';' | b'{' | b'}') if angle > 0 => {
                    // unbalanced template argument list
                    self.pos = i;
                    self.skip_statement();
                    return;
                }
                TokenKind::Punct(b'[') if angle == 0 && self.is_punct(i + 1, b'[') => {
                    i = self.skip_group(i);
                }
                TokenKind::Punct(b'(') => {
                    self.function_like(start, i);
                    return;
                }
                TokenKind::Punct(b';' | b'=' | b'{' | b'[' | b',' | b':') if angle == 0 => {
                    self.variable_like(start, i);
                    return;
                }
                TokenKind::Punct(b'}') => {
                    self.pos = i;
                    return;
                }
                _ => i += 1,
            }
        }
        self.pos = i;
    }

    /// A declaration whose name is followed by `(`.
    fn function_like(&mut self, start: usize, open: usize) {
        if self.is_punct(open + 1, b'*')
            && self.is_ident(open + 2)
            && self.is_punct(open + 3, b')')
            && self.is_punct(open + 4, b'(')
        {
            self.function_pointer(start, open + 2, open + 4);
            return;
        }

        let close = self.skip_group(open);
        let Some(name_at) = open
            .checked_sub(1)
            .filter(|&i| i >= start && self.is_ident(i))
        else {
            self.pos = start;
            self.skip_statement();
            return;
        };

        let name = self.text(name_at);
        let constructor = self.record_name() == Some(name);
        let destructor = name_at > start && self.is_punct(name_at - 1, b'~');
        let out_of_line = name_at > start && self.is_scope(name_at - 1);
        // A bare `NAME(...)` that is not a constructor is a macro invocation.
        let macro_call = name_at == start && !constructor;
        if destructor || out_of_line || macro_call {
            self.pos = start;
            self.skip_statement();
            return;
        }

        let kind = if constructor {
            DeclKind::Constructor
        } else if self.record_name().is_some() {
            DeclKind::Method
        } else {
            DeclKind::Function
        };
        let name_token = self.tokens[name_at];
        let end = self.tokens[close - 1].end;
        let decl = self.declaration(kind, name, name_token.start, (self.tokens[start].start, end));
        self.events.push(DeclEvent::Enter(decl));
        self.parameters(open, close);
        self.events.push(DeclEvent::Exit);

        self.pos = close;
        self.skip_function_tail();
    }

    /// `R (*name)(params)` as a field or variable.
    fn function_pointer(&mut self, start: usize, name_at: usize, open: usize) {
        let close = self.skip_group(open);
        let is_static = (start..name_at).any(|i| self.text(i) == "static");
        let kind = if self.record_name().is_some() && !is_static {
            DeclKind::Field
        } else {
            DeclKind::Variable
        };
        let name_token = self.tokens[name_at];
        let decl = self.declaration(
            kind,
            self.text(name_at),
            name_token.start,
            (self.tokens[start].start, name_token.end),
        );
        self.events.push(DeclEvent::Enter(decl));
        self.parameters(open, close);
        self.events.push(DeclEvent::Exit);

        self.pos = close;
        self.skip_statement();
    }

    /// A declaration whose name is followed by `;`, `=`, `{`, `[`, `,` or `:`.
    fn variable_like(&mut self, start: usize, term: usize) {
        let name_at = term
            .checked_sub(1)
            .filter(|&i| i > start && self.is_ident(i) && !self.is_scope(i - 1));

        if let Some(name_at) = name_at {
            let name = self.text(name_at);
            if ACCESS_SPECIFIERS.contains(&name) && self.is_punct(term, b':') {
                // label following an unterminated macro line
                self.pos = term + 1;
                return;
            }
            if !BUILTIN_TYPES.contains(&name) && !QUALIFIERS.contains(&name) {
                let is_static = (start..name_at).any(|i| self.text(i) == "static");
                let kind = if self.record_name().is_some() && !is_static {
                    DeclKind::Field
                } else {
                    DeclKind::Variable
                };
                let name_token = self.tokens[name_at];
                let decl = self.declaration(
                    kind,
                    name,
                    name_token.start,
                    (self.tokens[start].start, name_token.end),
                );
                self.events.push(DeclEvent::Enter(decl));
                self.events.push(DeclEvent::Exit);
            }
        }

        // Only the first declarator of `int a, b;` is reported.
        self.pos = term;
        self.skip_statement();
    }

    /// Emit one Parameter per comma-separated entry between `open` and `close`.
    fn parameters(&mut self, open: usize, close: usize) {
        let end = if self.is_punct(close - 1, b')') {
            close - 1
        } else {
            close
        };
        let mut depth = 0i32;
        let mut in_default = false;
        let mut segment_start = open + 1;
        for i in open + 1..end {
            match self.tokens[i].kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => depth -= 1,
                TokenKind::Punct(b'<') if !in_default => depth += 1,
                TokenKind::Punct(b'>') if !in_default => depth -= 1,
                TokenKind::Punct(b'=') if depth == 0 => in_default = true,
                TokenKind::Punct(b',') if depth == 0 => {
                    self.parameter(segment_start, i);
                    segment_start = i + 1;
                    in_default = false;
                }
                _ => {}
            }
        }
        self.parameter(segment_start, end);
    }

    fn parameter(&mut self, first: usize, end: usize) {
        // drop the default argument
        let mut depth = 0i32;
        let mut last_end = end;
        for i in first..end {
            match self.tokens[i].kind {
                TokenKind::Punct(b'(' | b'[' | b'{') => depth += 1,
                TokenKind::Punct(b')' | b']' | b'}') => depth -= 1,
                TokenKind::Punct(b'=') if depth == 0 => {
                    last_end = i;
                    break;
                }
                _ => {}
            }
        }
        let end = last_end;

        if first >= end
            || (end - first == 1 && self.text(first) == "void")
            || self.is_punct(first, b'.')
        {
            return;
        }

        let function_pointer = (first..end)
            .find(|&i| self.is_punct(i, b'(') && self.is_punct(i + 1, b'*') && self.is_ident(i + 2))
            .map(|i| i + 2);

        let mut last = end - 1;
        while last > first && self.is_punct(last, b']') {
            match (first..last).rev().find(|&i| self.is_punct(i, b'[')) {
                Some(bracket) if bracket > first => last = bracket - 1,
                _ => break,
            }
        }

        let name_at = function_pointer.or_else(|| {
            let word = self.text(last);
            let has_type = (first..last)
                .any(|i| !(self.is_ident(i) && QUALIFIERS.contains(&self.text(i))));
            let named = last > first
                && self.is_ident(last)
                && !self.is_scope(last - 1)
                && !BUILTIN_TYPES.contains(&word)
                && !QUALIFIERS.contains(&word)
                && has_type;
            named.then_some(last)
        });

        let start_offset = self.tokens[first].start;
        // Unnamed parameters are still parameters, with an empty name.
        let (name, name_offset, end_offset) = match name_at {
            Some(i) => (self.text(i), self.tokens[i].start, self.tokens[i].end),
            None => ("", start_offset, self.tokens[end - 1].end),
        };
        let decl = self.declaration(
            DeclKind::Parameter,
            name,
            name_offset,
            (start_offset, end_offset),
        );
        self.events.push(DeclEvent::Enter(decl));
        self.events.push(DeclEvent::Exit);
    }

    /// Skip qualifiers, `= 0`, a body or a constructor initializer list.
    fn skip_function_tail(&mut self) {
        while let Some(token) = self.token(self.pos) {
            match token.kind {
                TokenKind::Punct(b';') => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Punct(b'{') => {
                    self.pos = self.skip_group(self.pos);
                    return;
                }
                TokenKind::Punct(b'}') => return,
                TokenKind::Punct(b':') => {
                    self.pos += 1;
                    self.skip_initializers();
                    return;
                }
                TokenKind::Punct(b'(' | b'[') => self.pos = self.skip_group(self.pos),
                _ => self.pos += 1,
            }
        }
    }

    /// `a_(1), b_{2} { body }`
    fn skip_initializers(&mut self) {
        while let Some(token) = self.token(self.pos) {
            match token.kind {
                TokenKind::Punct(b'(' | b'{') => {
                    self.pos = self.skip_group(self.pos);
                    if self.is_punct(self.pos, b',') {
                        self.pos += 1;
                        continue;
                    }
                    if self.is_punct(self.pos, b'{') {
                        self.pos = self.skip_group(self.pos);
                    }
                    return;
                }
                TokenKind::Punct(b';') => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Punct(b'}') => return,
                _ => self.pos += 1,
            }
        }
    }

    /// Skip to the end of the current statement.
    ///
    /// Stops after `;`, before a `}` closing the enclosing block, or after a
    /// `{ ... }` group that follows a parameter list (a function body).
    fn skip_statement(&mut self) {
        let mut saw_paren = false;
        while let Some(token) = self.token(self.pos) {
            match token.kind {
                TokenKind::Punct(b';') => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Punct(b'}') => return,
                TokenKind::Punct(b'(') => {
                    saw_paren = true;
                    self.pos = self.skip_group(self.pos);
                }
                TokenKind::Punct(b'[') => self.pos = self.skip_group(self.pos),
                TokenKind::Punct(b'{') => {
                    self.pos = self.skip_group(self.pos);
                    if saw_paren {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Index just past the bracket matching the one at `open`.
    ///
    /// Angle brackets give up at `;`, `{` or `}` since `<` may be a comparison.
    fn skip_group(&self, open: usize) -> usize {
        let Some(TokenKind::Punct(open_ch)) = self.token(open).map(|t| t.kind) else {
            return open + 1;
        };
        let close_ch = match open_ch {
            b'(' => b')',
            b'[' => b']',
            b'{' => b'}',
            b'<' => b'>',
            _ => return open + 1,
        };
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct(c) if c == open_ch => depth += 1,
                TokenKind::Punct(c) if c == close_ch => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                TokenKind::Punct(b';' | b'{' | b'}') if open_ch == b'<' => return i,
                _ => {}
            }
        }
        self.tokens.len()
    }

    fn declaration(
        &self,
        kind: DeclKind,
        name: &str,
        name_offset: usize,
        span: (usize, usize),
    ) -> Declaration {
        let text = self.source.text();
        let line = text.line_of(name_offset);
        let qualified_name = if kind == DeclKind::Parameter {
            name.to_string()
        } else {
            self.qualify(name)
        };
        Declaration {
            kind,
            name: name.to_string(),
            qualified_name,
            file: self.source.path().to_path_buf(),
            line,
            line_above: text.line_above(line).to_string(),
            source_text: text.slice(span.0, span.1).to_string(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        let mut qualified = String::new();
        for scope in &self.scopes {
            qualified.push_str(&scope.name);
            qualified.push_str("::");
        }
        qualified.push_str(name);
        qualified
    }

    /// Name of the innermost scope when it is a record.
    fn record_name(&self) -> Option<&str> {
        self.scopes
            .last()
            .filter(|scope| scope.record)
            .map(|scope| scope.name.as_str())
    }

    fn token(&self, i: usize) -> Option<Token> {
        self.tokens.get(i).copied()
    }

    fn text(&self, i: usize) -> &'a str {
        let source: &'a SourceFile = self.source;
        self.tokens
            .get(i)
            .map_or("", |token| source.text().token_text(token))
    }

    fn is_punct(&self, i: usize, ch: u8) -> bool {
        self.token(i).is_some_and(|t| t.kind == TokenKind::Punct(ch))
    }

    fn is_ident(&self, i: usize) -> bool {
        self.token(i).is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn is_scope(&self, i: usize) -> bool {
        self.token(i).is_some_and(|t| t.kind == TokenKind::Scope)
    }
}

fn is_directive(word: &str) -> bool {
    Keyword::ALL.iter().any(|keyword| keyword.as_str() == word)
}
