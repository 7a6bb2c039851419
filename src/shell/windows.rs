//! Windows cmd / PowerShell grammar strategy
//!
//! A separate scanner from the POSIX one: `^` (cmd) and `` ` ``
//! (PowerShell) are escape characters rather than substitution markers,
//! doubled quotes inside a double-quoted span are literal, and a
//! recognized shell-wrapper prefix (`cmd /c`, `powershell -Command`,
//! `pwsh -Command`) is stripped before analysis.

use crate::core::ShellParseError;

use super::{base_name, ShellGrammar, SimpleCommand, MAX_SUBSTITUTION_DEPTH};

/// Windows cmd / PowerShell grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsGrammar;

impl ShellGrammar for WindowsGrammar {
    fn parse(&self, command: &str) -> Result<Vec<SimpleCommand>, ShellParseError> {
        let stripped = strip_wrappers(command);
        parse_list(&stripped, 0)
    }
}

/// PowerShell flags that may precede `-Command` in a recognized wrapper
const WRAPPER_FLAGS: &[&str] = &["-noprofile", "-nologo", "-noninteractive"];

/// Redirection operator forms the scanner accepts
const REDIRECT_OPS: &[&str] = &["<", ">", ">>", ">&", "<&"];

/// Strip recognized shell-wrapper prefixes, repeatedly, unwrapping one
/// layer of quoting around the payload each time.
fn strip_wrappers(command: &str) -> String {
    let mut current = command.trim().to_string();
    while let Some(rest) = strip_one_wrapper(&current) {
        current = rest;
    }
    current
}

fn strip_one_wrapper(command: &str) -> Option<String> {
    let (head, mut cursor) = next_word(command, 0)?;
    let head = base_name(head.trim_matches('"')).to_ascii_lowercase();

    match head.as_str() {
        "cmd" | "cmd.exe" => {
            let (flag, after) = next_word(command, cursor)?;
            if !flag.eq_ignore_ascii_case("/c") {
                return None;
            }
            cursor = after;
        }
        "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => loop {
            let (word, after) = next_word(command, cursor)?;
            cursor = after;
            if word.eq_ignore_ascii_case("-command") {
                break;
            }
            if !WRAPPER_FLAGS.contains(&word.to_ascii_lowercase().as_str()) {
                return None;
            }
        },
        _ => return None,
    }

    let payload = command[cursor..].trim();
    if payload.is_empty() {
        return None;
    }
    Some(unquote_payload(payload).to_string())
}

/// Next whitespace-delimited word and the offset just past it
fn next_word(s: &str, from: usize) -> Option<(&str, usize)> {
    let rest = &s[from..];
    let start = from + (rest.len() - rest.trim_start().len());
    if start >= s.len() {
        return None;
    }
    let end = s[start..]
        .find(char::is_whitespace)
        .map(|e| start + e)
        .unwrap_or(s.len());
    Some((&s[start..end], end))
}

/// Remove one matching layer of quotes around a wrapper payload
fn unquote_payload(payload: &str) -> &str {
    for quote in ['"', '\''] {
        if payload.len() >= 2 && payload.starts_with(quote) && payload.ends_with(quote) {
            return &payload[1..payload.len() - 1];
        }
    }
    payload
}

struct WordBuild {
    start: usize,
    literal: String,
    has_substitution: bool,
}

struct Word {
    start: usize,
    literal: String,
    has_substitution: bool,
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
    words: Vec<Word>,
    nested: Vec<(usize, Vec<SimpleCommand>)>,
    seg_start: usize,
    word: Option<WordBuild>,
    redirect_op: Option<String>,
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
                '^' | '`' => k = self.escape(k, ch)?,
                '$' if self.peek(k + 1) == Some('(') => k = self.substitution(k)?,
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
                    _ if self.segment_is_blank() => {
                        // PowerShell call operator: `& program args`
                        k += 1;
                        self.seg_start = self.byte_at(k);
                    }
                    _ => {
                        self.finalize_segment(pos, "&", true)?;
                        k += 1;
                        self.seg_start = self.byte_at(k);
                    }
                },
                '|' => {
                    let (op, width) = if self.peek(k + 1) == Some('|') {
                        ("||", 2)
                    } else {
                        ("|", 1)
                    };
                    self.finalize_segment(pos, op, true)?;
                    self.pending_op = Some(op.to_string());
                    k += width;
                    self.seg_start = self.byte_at(k);
                }
                '<' | '>' => k = self.redirect(k)?,
                '(' => return Err(ShellParseError::Unsupported("grouping".into())),
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

    fn byte_at(&self, k: usize) -> usize {
        self.chars.get(k).map(|&(b, _)| b).unwrap_or(self.input.len())
    }

    fn segment_is_blank(&self) -> bool {
        self.word.is_none() && self.words.is_empty() && self.nested.is_empty()
    }

    fn begin_word(&mut self, pos: usize) -> &mut WordBuild {
        self.word.get_or_insert_with(|| WordBuild {
            start: pos,
            literal: String::new(),
            has_substitution: false,
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
                is_redirect_target,
            });
        }
    }

    /// `'...'` — literal in PowerShell, and treated as literal here for
    /// both dialects: substitution-like text inside never recurses
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
        self.begin_word(pos).literal.push_str(&span);
        Ok(j + 1)
    }

    /// `"..."` — backtick escapes, `""` is a literal quote, `$(...)`
    /// still substitutes
    fn double_quote(&mut self, k: usize) -> Result<usize, ShellParseError> {
        let pos = self.chars[k].0;
        self.begin_word(pos);
        let mut j = k + 1;
        loop {
            let Some(&(cpos, ch)) = self.chars.get(j) else {
                return Err(ShellParseError::UnterminatedQuote('"'));
            };
            match ch {
                '"' => {
                    if self.peek(j + 1) == Some('"') {
                        self.push_char(cpos, '"');
                        j += 2;
                    } else {
                        return Ok(j + 1);
                    }
                }
                '`' => match self.chars.get(j + 1) {
                    Some(&(_, next)) => {
                        self.push_char(cpos, next);
                        j += 2;
                    }
                    None => return Err(ShellParseError::UnterminatedQuote('"')),
                },
                '$' if self.peek(j + 1) == Some('(') => j = self.substitution(j)?,
                _ => {
                    self.push_char(cpos, ch);
                    j += 1;
                }
            }
        }
    }

    /// `^x` (cmd) or `` `x `` (PowerShell) — the next character literal
    fn escape(&mut self, k: usize, _escape_char: char) -> Result<usize, ShellParseError> {
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

    /// `$(...)` — a PowerShell subexpression as a nested command line
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

    fn find_closing_paren(&self, start: usize) -> Result<usize, ShellParseError> {
        let mut depth = 1usize;
        let mut k = start;
        while let Some(&(_, ch)) = self.chars.get(k) {
            match ch {
                '`' | '^' => k += 2,
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
                            Some(&(_, '`')) => k += 2,
                            Some(&(_, '"')) => {
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

    fn redirect(&mut self, k: usize) -> Result<usize, ShellParseError> {
        if let Some(w) = &self.word {
            if !w.literal.is_empty() && w.literal.chars().all(|c| c.is_ascii_digit()) {
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
            return Err(ShellParseError::Unsupported("here-string".into()));
        }
        if !REDIRECT_OPS.contains(&op.as_str()) {
            return Err(ShellParseError::Unsupported(format!("redirection `{op}`")));
        }

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
            if consumed {
                return Ok(j);
            }
        }

        self.redirect_op = Some(op);
        Ok(j)
    }

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
        // A command word produced by a subexpression has no static root
        let root = match self.words.iter().find(|w| !w.is_redirect_target) {
            Some(w) if w.has_substitution || w.literal.is_empty() => {
                return Err(ShellParseError::Unsupported("dynamic command word".into()));
            }
            Some(w) => Some((w.start, base_name(&w.literal))),
            None => None,
        };

        let mut entries: Vec<(usize, Vec<SimpleCommand>)> = std::mem::take(&mut self.nested);
        if let Some((pos, name)) = root {
            entries.push((pos, vec![SimpleCommand { text, root: name }]));
        }
        entries.sort_by_key(|&(pos, _)| pos);
        for (_, cmds) in entries {
            self.commands.extend(cmds);
        }
        self.words.clear();
        Ok(())
    }
}
