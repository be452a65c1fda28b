//! Terminator-aware statement splitter for SQLite scripts.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    /// Inside a quoted run closed by the given character.
    Quoted(char),
    LineComment,
    BlockComment,
}

#[derive(Default)]
struct Segment {
    text: String,
    has_code: bool,
}

impl Segment {
    fn push(&mut self, ch: char, is_code: bool) {
        if is_code && !ch.is_whitespace() {
            self.has_code = true;
        }
        self.text.push(ch);
    }

    fn flush_into(&mut self, statements: &mut Vec<String>) {
        let segment = std::mem::take(self);
        if segment.has_code {
            statements.push(segment.text.trim().to_string());
        }
    }
}

/// Splits `script` on `terminator` following SQLite quoting rules.
///
/// Quoted runs use `'`, `"`, `` ` `` and `[...]`; a doubled quote character
/// inside a run is an escape. `--` line comments and `/* */` block comments
/// are carried along with the statement text but never count as executable
/// content, so a segment holding only comments or whitespace is dropped.
///
/// Returned statements are trimmed and exclude the terminator. Text after
/// the last terminator is returned as a final statement when non-empty.
pub fn split_sql_script(script: &str, terminator: char) -> Vec<String> {
    let mut statements = Vec::new();
    let mut segment = Segment::default();
    let mut state = Lexeme::Code;
    let mut chars = script.chars().peekable();

    while let Some(ch) = chars.next() {
        state = match state {
            Lexeme::Code => {
                if ch == terminator {
                    segment.flush_into(&mut statements);
                    continue;
                }
                step_code(ch, &mut chars, &mut segment)
            }
            Lexeme::Quoted(close) => {
                segment.push(ch, true);
                if ch != close {
                    state
                } else if close != ']' && chars.peek() == Some(&close) {
                    segment.push(close, true);
                    chars.next();
                    state
                } else {
                    Lexeme::Code
                }
            }
            Lexeme::LineComment => {
                segment.push(ch, false);
                if ch == '\n' {
                    Lexeme::Code
                } else {
                    state
                }
            }
            Lexeme::BlockComment => {
                segment.push(ch, false);
                if ch == '*' && chars.peek() == Some(&'/') {
                    segment.push('/', false);
                    chars.next();
                    Lexeme::Code
                } else {
                    state
                }
            }
        };
    }

    segment.flush_into(&mut statements);
    statements
}

fn step_code(ch: char, chars: &mut Peekable<Chars<'_>>, segment: &mut Segment) -> Lexeme {
    match ch {
        '\'' | '"' | '`' => {
            segment.push(ch, true);
            Lexeme::Quoted(ch)
        }
        '[' => {
            segment.push(ch, true);
            Lexeme::Quoted(']')
        }
        '-' if chars.peek() == Some(&'-') => {
            segment.push(ch, false);
            Lexeme::LineComment
        }
        '/' if chars.peek() == Some(&'*') => {
            segment.push(ch, false);
            if let Some(star) = chars.next() {
                segment.push(star, false);
            }
            Lexeme::BlockComment
        }
        _ => {
            segment.push(ch, true);
            Lexeme::Code
        }
    }
}
