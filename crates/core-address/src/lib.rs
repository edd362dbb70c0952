//! Address algebra over a rune buffer.
//!
//! An [`Address`] is an expression describing how to locate a [`Span`] of
//! runes given the current selection (*dot*): simple addresses (`#n`
//! runes, `n` lines, `$` end, `'m` marks, `/re/` and `?re?` searches)
//! composed with `+`, `-`, `,`, `;` and the `!` clamp. This crate owns
//! the expression tree and its three faces: the parser ([`parse`]), the
//! pretty-printer (`Display`), and the evaluator ([`eval`]).

use std::fmt;

use thiserror::Error;

use core_runes::BufferError;

mod eval;
mod parse;
mod search;

pub use eval::eval;
pub use parse::parse;
pub use search::{RegexCache, Search};

/// Half-open range of rune indices, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn new(from: usize, to: usize) -> Self {
        debug_assert!(from <= to, "inverted span {from}..{to}");
        Self { from, to }
    }

    /// Zero-width span at `p`.
    pub fn point(p: usize) -> Self {
        Self { from: p, to: p }
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "#{}", self.from)
        } else {
            write!(f, "#{},#{}", self.from, self.to)
        }
    }
}

/// Search direction of a regexp address: `/re/` runs forward from dot,
/// `?re?` backward. A minus context flips whichever is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub(crate) fn flip(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Named-mark lookup used during evaluation. Dot is passed to [`eval`]
/// separately; whitespace mark runes alias dot and never reach `get`.
pub trait Marks {
    /// Value of mark `r`; unset marks read as the point `(0,0)`.
    fn get(&self, r: char) -> Span;
}

/// Mark store that knows no marks. Handy for evaluating addresses that
/// use only dot.
pub struct NoMarks;

impl Marks for NoMarks {
    fn get(&self, _r: char) -> Span {
        Span::point(0)
    }
}

/// An address expression tree. Construct via the builder methods, which
/// apply the same normalisation as the parser (negative counts clamp to
/// zero, whitespace marks become dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// The current selection.
    Dot,
    /// The empty span at the end of the buffer.
    End,
    /// The point after rune `n`.
    Rune(usize),
    /// Line `n`, counting from 1; line 0 is the point at the start of
    /// line 1.
    Line(usize),
    /// The span of mark `r`.
    Mark(char),
    /// The next (or previous) match of a regular expression.
    Regexp { pattern: String, dir: Direction },
    /// `a` then `b` evaluated forward from `a`'s end.
    Plus(Box<Address>, Box<Address>),
    /// `a` then `b` evaluated backward from `a`'s start.
    Minus(Box<Address>, Box<Address>),
    /// From `a`'s start to `b`'s end, both evaluated from dot.
    To(Box<Address>, Box<Address>),
    /// Like `To`, but `b` is evaluated with dot at `a`'s end.
    Then(Box<Address>, Box<Address>),
    /// Evaluate `a`, converting out-of-range to the buffer boundary.
    Clamp(Box<Address>),
}

impl Address {
    /// Rune address; negative counts clamp to zero.
    pub fn rune(n: i64) -> Self {
        Address::Rune(n.max(0) as usize)
    }

    /// Line address; negative counts clamp to zero.
    pub fn line(n: i64) -> Self {
        Address::Line(n.max(0) as usize)
    }

    /// Mark address; whitespace runes normalise to dot.
    pub fn mark(r: char) -> Self {
        Address::Mark(if r == '.' || r.is_whitespace() { '.' } else { r })
    }

    /// Regexp address. The pattern may be written bare (`abc`) or
    /// delimited (`/abc/` forward, `?abc?` reverse); a delimited form is
    /// unwrapped and `\<delim>` unescaped, exactly as the parser would.
    pub fn regexp(pattern: &str) -> Self {
        let mut chars = pattern.chars();
        match chars.next() {
            Some(d @ ('/' | '?')) => {
                let dir = if d == '/' {
                    Direction::Forward
                } else {
                    Direction::Reverse
                };
                Address::Regexp {
                    pattern: parse::unwrap_delimited(chars.as_str(), d),
                    dir,
                }
            }
            _ => Address::Regexp {
                pattern: pattern.to_string(),
                dir: Direction::Forward,
            },
        }
    }

    /// The whole buffer: `0,$`.
    pub fn all() -> Self {
        Address::line(0).to(Address::End)
    }

    pub fn clamp(a: Address) -> Self {
        Address::Clamp(Box::new(a))
    }

    pub fn plus(self, b: Address) -> Self {
        Address::Plus(Box::new(self), Box::new(b))
    }

    pub fn minus(self, b: Address) -> Self {
        Address::Minus(Box::new(self), Box::new(b))
    }

    pub fn to(self, b: Address) -> Self {
        Address::To(Box::new(self), Box::new(b))
    }

    pub fn then(self, b: Address) -> Self {
        Address::Then(Box::new(self), Box::new(b))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Dot => write!(f, "."),
            Address::End => write!(f, "$"),
            Address::Rune(n) => write!(f, "#{n}"),
            Address::Line(n) => write!(f, "{n}"),
            Address::Mark(r) => write!(f, "'{r}"),
            Address::Regexp { pattern, dir } => {
                let d = match dir {
                    Direction::Forward => '/',
                    Direction::Reverse => '?',
                };
                write!(f, "{d}")?;
                let mut escaped = false;
                for c in pattern.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        c if c == d => write!(f, "\\{d}")?,
                        c => write!(f, "{c}")?,
                    }
                    escaped = c == '\\' && !escaped;
                }
                // A dangling escape would swallow the closing delimiter
                // when read back; double it (the engine treats a lone
                // trailing backslash as a literal one anyway).
                if escaped {
                    write!(f, "\\")?;
                }
                write!(f, "{d}")
            }
            Address::Plus(a, b) => write!(f, "{a}+{b}"),
            Address::Minus(a, b) => write!(f, "{a}-{b}"),
            Address::To(a, b) => write!(f, "{a},{b}"),
            Address::Then(a, b) => write!(f, "{a};{b}"),
            Address::Clamp(a) => write!(f, "!{a}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AddrError {
    /// The address resolved outside `[0, size]`, or a range came out
    /// inverted.
    #[error("address out of range")]
    OutOfRange,
    /// A regexp address matched in neither the first nor the wrap pass.
    #[error("no match")]
    NoMatch,
    /// The pattern did not compile; carries the regex engine's message
    /// verbatim.
    #[error("{0}")]
    BadRegex(#[from] regex::Error),
    /// A numeric literal overflowed while parsing; carries the offending
    /// digits.
    #[error("value out of range: {0}")]
    ParseRange(String),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type Result<T> = std::result::Result<T, AddrError>;
