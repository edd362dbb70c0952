//! Recursive-descent address parser.
//!
//! The grammar, loosest binding last:
//!
//! ```text
//! ranges  = sums ((',' | ';') sums)*          left-associative
//! sums    = primary (('+' | '-') primary)*    left-associative
//!         | sums primary                      juxtaposition implies '+'
//! primary = '.' | '$' | '#' digits? | digits
//!         | "'" rune? | '/' pattern '/'? | '?' pattern '?'?
//!         | '!' primary
//! ```
//!
//! Missing operands default: `+`/`-` to dot on the left and one line on
//! the right; `,`/`;` to line 0 on the left and `$` on the right. Blank
//! space between tokens is skipped; a newline ends the address and stays
//! in the input (except directly after a `'` quote, where it is consumed
//! and names the dot mark).

use crate::{AddrError, Address, Direction, Result};

/// Parse an address from the front of `input`. Returns `None` when the
/// input does not begin with an address form (after blank-skipping),
/// along with the unconsumed tail either way.
pub fn parse(input: &str) -> Result<(Option<Address>, &str)> {
    let mut cur = Cursor::new(input);
    let addr = parse_ranges(&mut cur)?;
    Ok((addr, cur.rest()))
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

    /// Skip whitespace other than newline.
    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }
}

fn parse_ranges(cur: &mut Cursor) -> Result<Option<Address>> {
    let mut left = parse_sums(cur)?;
    loop {
        cur.skip_blank();
        let op = match cur.peek() {
            Some(c @ (',' | ';')) => c,
            _ => break,
        };
        cur.bump();
        let right = parse_sums(cur)?;
        let a = left.unwrap_or_else(|| Address::line(0));
        let b = right.unwrap_or(Address::End);
        left = Some(if op == ',' { a.to(b) } else { a.then(b) });
    }
    Ok(left)
}

fn parse_sums(cur: &mut Cursor) -> Result<Option<Address>> {
    let mut left = parse_primary(cur)?;
    loop {
        cur.skip_blank();
        match cur.peek() {
            Some(op @ ('+' | '-')) => {
                cur.bump();
                let right = parse_primary(cur)?.unwrap_or_else(|| Address::line(1));
                let a = left.unwrap_or(Address::Dot);
                left = Some(if op == '+' { a.plus(right) } else { a.minus(right) });
            }
            Some(c) if left.is_some() && starts_primary(c) => {
                // Juxtaposition: `1#2` is `1+#2`.
                let right = parse_primary(cur)?.expect("starts_primary guarantees a primary");
                left = Some(left.take().expect("checked above").plus(right));
            }
            _ => break,
        }
    }
    Ok(left)
}

fn starts_primary(c: char) -> bool {
    matches!(c, '#' | '.' | '$' | '\'' | '/' | '?' | '!') || c.is_ascii_digit()
}

fn parse_primary(cur: &mut Cursor) -> Result<Option<Address>> {
    cur.skip_blank();
    let Some(c) = cur.peek() else {
        return Ok(None);
    };
    match c {
        '!' => {
            cur.bump();
            let inner = parse_primary(cur)?.unwrap_or(Address::Dot);
            Ok(Some(Address::clamp(inner)))
        }
        '#' => {
            cur.bump();
            let n = match cur.peek() {
                Some(d) if d.is_ascii_digit() => parse_number(cur)?,
                _ => 1,
            };
            Ok(Some(Address::Rune(n)))
        }
        '0'..='9' => Ok(Some(Address::Line(parse_number(cur)?))),
        '.' => {
            cur.bump();
            Ok(Some(Address::Dot))
        }
        '$' => {
            cur.bump();
            Ok(Some(Address::End))
        }
        '\'' => {
            cur.bump();
            cur.skip_blank();
            match cur.peek() {
                None => Ok(Some(Address::Mark('.'))),
                Some('\n') => {
                    // The quote absorbs the newline; the mark is dot.
                    cur.bump();
                    Ok(Some(Address::Mark('.')))
                }
                Some(m) => {
                    cur.bump();
                    Ok(Some(Address::mark(m)))
                }
            }
        }
        '/' | '?' => {
            cur.bump();
            let pattern = scan_pattern(cur, c);
            let dir = if c == '/' {
                Direction::Forward
            } else {
                Direction::Reverse
            };
            Ok(Some(Address::Regexp { pattern, dir }))
        }
        _ => Ok(None),
    }
}

/// Decimal literal. Overflow consumes the rest of the run and reports it.
fn parse_number(cur: &mut Cursor) -> Result<usize> {
    let mut digits = String::new();
    let mut value: Option<u64> = Some(0);
    while let Some(c) = cur.peek() {
        let Some(d) = c.to_digit(10) else { break };
        cur.bump();
        digits.push(c);
        value = value
            .and_then(|v| v.checked_mul(10))
            .and_then(|v| v.checked_add(d as u64))
            .filter(|&v| v <= i64::MAX as u64);
    }
    match value {
        Some(v) => Ok(v as usize),
        None => Err(AddrError::ParseRange(digits)),
    }
}

/// Scan a regexp body up to the closing delimiter, a newline, or end of
/// input (an omitted closing delimiter is permitted). `\<delim>` becomes
/// a literal delimiter and `\\` passes through as a unit (so a doubled
/// backslash never captures the delimiter); every other escape passes
/// through untouched, and a trailing lone `\` stays literal.
fn scan_pattern(cur: &mut Cursor, delim: char) -> String {
    let mut pat = String::new();
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
                        pat.push(c);
                    }
                    Some('\\') => {
                        cur.bump();
                        pat.push_str("\\\\");
                    }
                    _ => pat.push('\\'),
                }
            }
            Some(c) => {
                cur.bump();
                pat.push(c);
            }
        }
    }
    pat
}

/// Unwrap a delimited pattern body handed to [`Address::regexp`]: the
/// leading delimiter is already stripped; remove an unescaped trailing
/// one and unescape `\<delim>`.
pub(crate) fn unwrap_delimited(body: &str, delim: char) -> String {
    let mut cur = Cursor::new(body);
    scan_pattern(&mut cur, delim)
}
