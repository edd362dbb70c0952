//! Parser for the concrete edit syntax: an optional address followed by
//! one of `c a i d m t p = =# s k`.
//!
//! Replacement text for `c`/`a`/`i` is either delimited on one line
//! (`c/new text/`, delimiter and newlines escaped) or a multi-line body
//! introduced by a newline and terminated by a line holding only `.`.
//! `s` takes an optional 1-based starting match number, a delimited
//! pattern and template, and a trailing `g` for global:
//! `s2/pat/template/g`. A missing address defaults to dot.

use core_address::Address;

use crate::{Edit, EditError, Result};

/// Parse one edit from the front of `input`, returning it with the
/// unconsumed tail.
pub fn parse_edit(input: &str) -> Result<(Edit, &str)> {
    let (addr, rest) = core_address::parse(input)?;
    let mut cur = Cursor::new(rest);
    cur.skip_blank();
    let a = addr.unwrap_or(Address::Dot);
    let c = match cur.peek() {
        None | Some('\n') => {
            return Err(EditError::Parse("missing command".to_string()));
        }
        Some(c) => c,
    };
    cur.bump();
    let edit = match c {
        'c' => Edit::Change { a, text: scan_text(&mut cur)? },
        'a' => Edit::Append { a, text: scan_text(&mut cur)? },
        'i' => Edit::Insert { a, text: scan_text(&mut cur)? },
        'd' => Edit::Delete { a },
        'p' => Edit::Print { a },
        '=' => {
            if cur.peek() == Some('#') {
                cur.bump();
                Edit::Where { a }
            } else {
                Edit::WhereLine { a }
            }
        }
        'm' | 't' => {
            let (b, rest) = core_address::parse(cur.rest())?;
            cur = Cursor::new(rest);
            let b = b.unwrap_or(Address::Dot);
            if c == 'm' {
                Edit::Move { a, b }
            } else {
                Edit::Copy { a, b }
            }
        }
        'k' => {
            cur.skip_blank();
            let mark = match cur.peek() {
                None | Some('\n') => '.',
                Some(m) => {
                    cur.bump();
                    m
                }
            };
            Edit::Set { a, mark }
        }
        's' => scan_substitute(&mut cur, a)?,
        other => {
            return Err(EditError::Parse(format!("unknown command {other:?}")));
        }
    };
    Ok((edit, cur.rest()))
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn rest(&self) -> &'a str {
        self.rest
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let mut it = self.rest.chars();
        let c = it.next();
        self.rest = it.as_str();
        c
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    fn advance_bytes(&mut self, n: usize) {
        self.rest = &self.rest[n..];
    }
}

/// Replacement text after `c`/`a`/`i`.
fn scan_text(cur: &mut Cursor) -> Result<String> {
    cur.skip_blank();
    match cur.peek() {
        None => Err(EditError::Parse("missing replacement text".to_string())),
        Some('\n') => {
            cur.bump();
            Ok(scan_body(cur))
        }
        Some(d) if !d.is_alphanumeric() => {
            cur.bump();
            Ok(scan_delimited(cur, d, true))
        }
        Some(other) => Err(EditError::Parse(format!(
            "bad text delimiter {other:?}"
        ))),
    }
}

/// Multi-line body: lines up to one holding only `.` (or end of input).
fn scan_body(cur: &mut Cursor) -> String {
    let mut text = String::new();
    loop {
        let rest = cur.rest();
        let (line_len, has_nl) = match rest.find('\n') {
            Some(i) => (i, true),
            None => (rest.len(), false),
        };
        let terminator = &rest[..line_len] == ".";
        if !terminator {
            text.push_str(&rest[..line_len]);
            if has_nl {
                text.push('\n');
            }
        }
        cur.advance_bytes(line_len + usize::from(has_nl));
        if terminator || !has_nl {
            break;
        }
    }
    text
}

/// Delimited run ending at an unescaped `delim`, a newline, or end of
/// input. `\<delim>` always unescapes; with `decode`, `\n` becomes a
/// newline too (replacement text); without, other escapes pass through
/// for the regex engine.
fn scan_delimited(cur: &mut Cursor, delim: char, decode: bool) -> String {
    let mut out = String::new();
    loop {
        match cur.peek() {
            None | Some('\n') => break,
            Some(c) if c == delim => {
                cur.bump();
                break;
            }
            Some('\\') => {
                cur.bump();
                match cur.peek() {
                    Some(c) if c == delim => {
                        cur.bump();
                        out.push(c);
                    }
                    Some('n') if decode => {
                        cur.bump();
                        out.push('\n');
                    }
                    _ => out.push('\\'),
                }
            }
            Some(c) => {
                cur.bump();
                out.push(c);
            }
        }
    }
    out
}

fn scan_substitute(cur: &mut Cursor, a: Address) -> Result<Edit> {
    let mut from = 0usize;
    let mut has_from = false;
    while let Some(c) = cur.peek() {
        let Some(d) = c.to_digit(10) else { break };
        cur.bump();
        has_from = true;
        from = from.saturating_mul(10).saturating_add(d as usize);
    }
    let delim = match cur.peek() {
        Some(d) if !d.is_alphanumeric() && d != '\n' => {
            cur.bump();
            d
        }
        _ => {
            return Err(EditError::Parse("missing pattern delimiter".to_string()));
        }
    };
    let re = scan_delimited(cur, delim, false);
    let with = scan_delimited(cur, delim, true);
    let global = if cur.peek() == Some('g') {
        cur.bump();
        true
    } else {
        false
    };
    Ok(Edit::Substitute {
        a,
        re,
        with,
        global,
        from: if has_from { from } else { 1 },
    })
}
