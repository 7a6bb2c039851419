//! POSIX shell grammar strategy
//!
//! A character-level scanner that splits a command line into simple
//! commands, tracks quoting exactly, and recurses into substitution
//! constructs. Anything outside the grammar it understands is a parse
//! failure for the whole line.

use crate::core::ShellParseError;

use super::{base_name, ShellGrammar, SimpleCommand, MAX_SUBSTITUTION_DEPTH};

/// POSIX-family grammar (sh, bash, zsh, dash).
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixGrammar;

impl ShellGrammar for PosixGrammar {
    fn parse(&self, command: &str) -> Result<Vec<SimpleCommand>, ShellParseError> {
        parse_list(command, 0)
    }
}

/// Shells whose `-c` payload is itself a command line worth analyzing.
const WRAPPER_SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

/// Redirection operator forms the scanner accepts.
const REDIRECT_OPS: &[&str] = &["<", ">", ">>", "&>", "&>>", ">&", "<&"];

/// A word still being accumulated.
struct WordBuild {
    start: usize,
    literal: String,
    has_substitution: bool,
    quoted: bool,
}

/// A completed word of the current simple command.
struct Word {
    start: usize,
    literal: String,
    has_substitution: bool,
    quoted: bool,
    is_redirect_target: bool,
}

fn parse_list(input: &str, depth: usize) -> Result<Vec<SimpleCommand>, ShellParseError> {
    if depth > MAX_SUBSTITUTION_DEPTH {
        return Err(ShellParseError::NestingTooDeep);
    }
    Parser {
        input,
        chars: input.char_indices().collect(),
        depth,
        commands: Vec::new(),
        words: Vec::new(),
        nested: Vec::new(),
        seg_start: 0,
        word: None,
        redirect_op: None,
        pending_op: None,
    }
    .run()
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    depth: usize,
    commands: Vec<SimpleCommand>,
    /// Completed words of the current simple command
    words: Vec<Word>,
    /// Substitution results, keyed by the byte position encountered
    nested: Vec<(usize, Vec<SimpleCommand>)>,
    /// Byte offset where the current simple command's text begins
    seg_start: usize,
    word: Option<WordBuild>,
    /// A redirection operator still waiting for its target word
    redirect_op: Option<String>,
    /// A `&&`/`||`/`|` that still needs a command after it
    pending_op: Option<String>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Vec<SimpleCommand>, ShellParseError> {
        let mut k = 0usize;
        while k < self.chars.len() {
            let (pos, ch) = self.chars[k];
            match ch {
                ' ' | '\t' => {
                    self.end_word();
                    k += 1;
                }
                '\n' | '\r' => {
                    self.finalize_segment(pos, "\n", false)?;
                    k += 1;
                    self.seg_start = self.byte_at(k);
                }
                '\'' => k = self.single_quote(k)?,
                '"' => k = self.double_quote(k)?,
                '\\' => k = self.escape(k)?,
                '`' => k = self.backtick(k)?,
                '$' if self.peek(k + 1) == Some('(') => k = self.substitution(k)?,
                '<' | '>' if self.peek(k + 1) == Some('(') => k = self.substitution(k)?,
                '#' if self.word.is_none() => {
                    while k < self.chars.len() && self.chars[k].1 != '\n' {
                        k += 1;
                    }
                }
                ';' => {
                    self.finalize_segment(pos, ";", true)?;
                    k += 1;
                    self.seg_start = self.byte_at(k);
                }
                '&' => match self.peek(k + 1) {
                    Some('&') => {
                        self.finalize_segment(pos, "&&", true)?;
                        self.pending_op = Some("&&".to_string());
                        k += 2;
                        self.seg_start = self.byte_at(k);
                    }
                    Some('>') => k = self.redirect(k)?,
                    _ => {
                        self.finalize_segment(pos, "&", true)?;
                        k += 1;
                        self.seg_start = self.byte_at(k);
                    }
                },
                '|' => {
                    let (op, width) = match self.peek(k + 1) {
                        Some('|') => ("||", 2),
                        Some('&') => ("|&", 2),
                        _ => ("|", 1),
                    };
                    self.finalize_segment(pos, op, true)?;
                    self.pending_op = Some(op.to_string());
                    k += width;
                    self.seg_start = self.byte_at(k);
                }
                '<' | '>' => k = self.redirect(k)?,
                '(' => {
                    return Err(ShellParseError::Unsupported("subshell grouping".into()));
                }
                ')' => return Err(ShellParseError::UnbalancedParenthesis),
                _ => {
                    self.push_char(pos, ch);
                    k += 1;
                }
            }
        }

        self.end_word();
        if let Some(op) = self.redirect_op.take() {
            return Err(ShellParseError::TrailingOperator(op));
        }
        if self.words.is_empty() && self.nested.is_empty() {
            if let Some(op) = self.pending_op.take() {
                return Err(ShellParseError::TrailingOperator(op));
            }
        } else {
            self.finalize_segment(self.input.len(), "", false)?;
        }
        Ok(self.commands)
    }

    fn peek(&self, k: usize) -> Option<char> {
        self.chars.get(k).map(|&(_, c)| c)
    }

    /// Byte offset of character `k`, or end of input
    fn byte_at(&self, k: usize) -> usize {
        self.chars.get(k).map(|&(b, _)| b).unwrap_or(self.input.len())
    }

    fn begin_word(&mut self, pos: usize) -> &mut WordBuild {
        self.word.get_or_insert_with(|| WordBuild {
            start: pos,
            literal: String::new(),
            has_substitution: false,
            quoted: false,
        })
    }

    fn push_char(&mut self, pos: usize, ch: char) {
        self.begin_word(pos).literal.push(ch);
    }

    fn end_word(&mut self) {
        if let Some(w) = self.word.take() {
            let is_redirect_target = self.redirect_op.take().is_some();
            self.words.push(Word {
                start: w.start,
                literal: w.literal,
                has_substitution: w.has_substitution,
                quoted: w.quoted,
                is_redirect_target,
            });
        }
    }

    /// `'...'` — fully literal, never recursed into
    fn single_quote(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        let mut j = k + 1;
        while j < self.chars.len() && self.chars[j].1 != '\'' {
            j += 1;
        }
        if j >= self.chars.len() {
            return Err(ShellParseError::UnterminatedQuote('\''));
        }
        let span = self.input[self.byte_at(k + 1)..self.byte_at(j)].to_string();
        let word = self.begin_word(pos);
        word.quoted = true;
        word.literal.push_str(&span);
        Ok(j + 1)
    }

    /// `"..."` — literal except `\` escapes and `$(...)`/backtick
    /// substitutions, which still recurse
    fn double_quote(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        self.begin_word(pos).quoted = true;
        let mut j = k + 1;
        loop {
            let Some(&(cpos, ch)) = self.chars.get(j) else {
                return Err(ShellParseError::UnterminatedQuote('"'));
            };
            match ch {
                '"' => return Ok(j + 1),
                '\\' => match self.chars.get(j + 1) {
                    Some(&(npos, next)) => {
                        if matches!(next, '"' | '\\' | '$' | '`') {
                            self.push_char(cpos, next);
                        } else {
                            self.push_char(cpos, '\\');
                            self.push_char(npos, next);
                        }
                        j += 2;
                    }
                    None => return Err(ShellParseError::UnterminatedQuote('"')),
                },
                '$' if self.peek(j + 1) == Some('(') => j = self.substitution(j)?,
                '`' => j = self.backtick(j)?,
                _ => {
                    self.push_char(cpos, ch);
                    j += 1;
                }
            }
        }
    }

    /// `\x` outside quotes; backslash-newline is a line continuation
    fn escape(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        match self.chars.get(k + 1) {
            None => Err(ShellParseError::DanglingEscape),
            Some(&(_, '\n')) => Ok(k + 2),
            Some(&(_, next)) => {
                self.push_char(pos, next);
                Ok(k + 2)
            }
        }
    }

    /// `` `...` `` command substitution
    fn backtick(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        let mut inner = String::new();
        let mut j = k + 1;
        loop {
            let Some(&(_, ch)) = self.chars.get(j) else {
                return Err(ShellParseError::UnterminatedSubstitution);
            };
            match ch {
                '`' => break,
                '\\' => match self.chars.get(j + 1) {
                    Some(&(_, next)) if matches!(next, '`' | '\\' | '$') => {
                        inner.push(next);
                        j += 2;
                    }
                    Some(&(_, next)) => {
                        inner.push('\\');
                        inner.push(next);
                        j += 2;
                    }
                    None => return Err(ShellParseError::UnterminatedSubstitution),
                },
                _ => {
                    inner.push(ch);
                    j += 1;
                }
            }
        }
        self.begin_word(pos).has_substitution = true;
        let cmds = parse_list(&inner, self.depth + 1)?;
        if !cmds.is_empty() {
            self.nested.push((pos, cmds));
        }
        Ok(j + 1)
    }

    /// `$(...)`, `<(...)`, `>(...)` — a nested command line.
    ///
    /// `$((expr))` arithmetic falls out as a parse failure: the nested
    /// line starts with `(`, which the grammar rejects, so commands
    /// hidden inside an expression can never slip through.
    fn substitution(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        self.begin_word(pos).has_substitution = true;
        let inner_start = k + 2;
        let close = self.find_closing_paren(inner_start)?;
        let inner = &self.input[self.byte_at(inner_start)..self.byte_at(close)];
        let cmds = parse_list(inner, self.depth + 1)?;
        if !cmds.is_empty() {
            self.nested.push((pos, cmds));
        }
        Ok(close + 1)
    }

    /// Find the `)` matching an already-open paren, honoring quoting.
    /// `start` is the character index just inside the opener.
    fn find_closing_paren(&self, start: usize) -> Result<usize, ShellParseError> {
        let mut depth = 1usize;
        let mut k = start;
        while let Some(&(_, ch)) = self.chars.get(k) {
            match ch {
                '\\' => k += 2,
                '\'' => {
                    k += 1;
                    while k < self.chars.len() && self.chars[k].1 != '\'' {
                        k += 1;
                    }
                    if k >= self.chars.len() {
                        return Err(ShellParseError::UnterminatedQuote('\''));
                    }
                    k += 1;
                }
                '"' => {
                    k += 1;
                    loop {
                        match self.chars.get(k) {
                            None => return Err(ShellParseError::UnterminatedQuote('"')),
                            Some(&(_, '\\')) => k += 2,
                            Some(&(_, '"')) => {
                                k += 1;
                                break;
                            }
                            Some(_) => k += 1,
                        }
                    }
                }
                '`' => {
                    k += 1;
                    loop {
                        match self.chars.get(k) {
                            None => return Err(ShellParseError::UnterminatedSubstitution),
                            Some(&(_, '\\')) => k += 2,
                            Some(&(_, '`')) => {
                                k += 1;
                                break;
                            }
                            Some(_) => k += 1,
                        }
                    }
                }
                '(' => {
                    depth += 1;
                    k += 1;
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(k);
                    }
                    k += 1;
                }
                _ => k += 1,
            }
        }
        Err(ShellParseError::UnterminatedSubstitution)
    }

    /// A redirection operator and, where applicable, a pending target word
    fn redirect(&mut self, k: usize) -> Result<usize, ShellParseError> {
        // A bare fd number immediately before the operator belongs to it
        if let Some(w) = &self.word {
            if !w.quoted
                && !w.has_substitution
                && !w.literal.is_empty()
                && w.literal.chars().all(|c| c.is_ascii_digit())
            {
                self.word = None;
            } else {
                self.end_word();
            }
        }

        let mut op = String::new();
        let mut j = k;
        while let Some(&(_, c)) = self.chars.get(j) {
            if matches!(c, '<' | '>' | '&') {
                op.push(c);
                j += 1;
            } else {
                break;
            }
        }
        if op.contains("<<") {
            return Err(ShellParseError::Unsupported("here-document".into()));
        }
        if !REDIRECT_OPS.contains(&op.as_str()) {
            return Err(ShellParseError::Unsupported(format!("redirection `{op}`")));
        }

        // `>&1` / `<&0` / `>&-` duplicate or close an fd in place
        if op.ends_with('&') {
            let mut consumed = false;
            while let Some(&(_, c)) = self.chars.get(j) {
                if c.is_ascii_digit() {
                    consumed = true;
                    j += 1;
                } else {
                    break;
                }
            }
            if !consumed && self.peek(j) == Some('-') {
                consumed = true;
                j += 1;
            }
            if consumed {
                return Ok(j);
            }
        }

        self.redirect_op = Some(op);
        Ok(j)
    }

    /// Complete the current simple command and emit its entries in textual
    /// order: the command root at its position, nested substitution
    /// commands at theirs.
    fn finalize_segment(
        &mut self,
        end: usize,
        op: &str,
        require_nonblank: bool,
    ) -> Result<(), ShellParseError> {
        self.end_word();
        if let Some(pending) = self.redirect_op.take() {
            return Err(ShellParseError::TrailingOperator(pending));
        }
        if self.words.is_empty() && self.nested.is_empty() {
            if require_nonblank {
                return Err(ShellParseError::EmptyCommand(op.to_string()));
            }
            return Ok(());
        }
        self.pending_op = None;

        let text = self.input[self.seg_start..end].trim().to_string();
        let root = self.segment_root()?;
        let wrapper = self.wrapper_payload(&root)?;

        let mut entries: Vec<(usize, Vec<SimpleCommand>)> = std::mem::take(&mut self.nested);
        if let Some((pos, name)) = root {
            entries.push((pos, vec![SimpleCommand { text, root: name }]));
        }
        if let Some(extra) = wrapper {
            entries.push(extra);
        }
        entries.sort_by_key(|&(pos, _)| pos);
        for (_, cmds) in entries {
            self.commands.extend(cmds);
        }
        self.words.clear();
        Ok(())
    }

    /// The command word's base name. Leading `NAME=value` assignments do
    /// not supply the root; a command word that is wholly or partly
    /// produced by a substitution has no statically knowable root and is
    /// a parse failure.
    fn segment_root(&self) -> Result<Option<(usize, String)>, ShellParseError> {
        for w in &self.words {
            if w.is_redirect_target {
                continue;
            }
            if !w.quoted && is_assignment_word(&w.literal) {
                continue;
            }
            if w.has_substitution || w.literal.is_empty() {
                return Err(ShellParseError::Unsupported("dynamic command word".into()));
            }
            return Ok(Some((w.start, base_name(&w.literal))));
        }
        Ok(None)
    }

    /// For `sh -c '...'`-style wrappers, analyze the payload as a nested
    /// command line. A payload with a substitution in it stays dynamic;
    /// its substitutions were already captured during scanning.
    fn wrapper_payload(
        &self,
        root: &Option<(usize, String)>,
    ) -> Result<Option<(usize, Vec<SimpleCommand>)>, ShellParseError> {
        let Some((_, name)) = root else {
            return Ok(None);
        };
        if !WRAPPER_SHELLS.contains(&name.as_str()) {
            return Ok(None);
        }
        let mut saw_dash_c = false;
        for w in self.words.iter().filter(|w| !w.is_redirect_target) {
            if saw_dash_c {
                if !w.has_substitution && !w.literal.is_empty() {
                    let cmds = parse_list(&w.literal, self.depth + 1)?;
                    return Ok(Some((w.start, cmds)));
                }
                return Ok(None);
            }
            if w.literal == "-c" {
                saw_dash_c = true;
            }
        }
        Ok(None)
    }
}

/// `NAME=value` with a valid variable name
fn is_assignment_word(word: &str) -> bool {
    let Some(eq) = word.find('=') else {
        return false;
    };
    if eq == 0 {
        return false;
    }
    let mut chars = word[..eq].chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
