//! Edit commands and their executor.
//!
//! An [`Edit`] pairs an [`Address`] with a mutation or query:
//! change/append/insert/delete text, move or copy a range, set a mark,
//! print contents or coordinates, or substitute within a range. The
//! [`Editor`] façade owns the buffer, the mark table (including dot),
//! and a per-editor regex cache, and applies edits one at a time.
//!
//! Edits render (`Display`) in the concrete sam-like syntax and parse
//! back via [`parse_edit`], so an edit can be logged, stored, or sent
//! over a wire as plain text.

use std::fmt;

use thiserror::Error;

use core_address::{AddrError, Address};
use core_runes::BufferError;

mod editor;
mod marks;
mod parse;

pub use core_address::Span;
pub use editor::Editor;
pub use marks::MarkTable;
pub use parse::parse_edit;

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Addr(#[from] AddrError),
    /// The destination of a move lies strictly inside the source.
    #[error("move addresses overlap")]
    Overlap,
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// An edit string failed to parse; carries the offending text.
    #[error("bad edit: {0}")]
    Parse(String),
    /// The output sink failed while printing.
    #[error(transparent)]
    Out(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditError>;

/// A user-level edit operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace the addressed runes with `text`; dot covers the new text.
    Change { a: Address, text: String },
    /// Insert `text` after the address; dot covers the new text.
    Append { a: Address, text: String },
    /// Insert `text` before the address; dot covers the new text.
    Insert { a: Address, text: String },
    /// Remove the addressed runes; dot is the point left behind.
    Delete { a: Address },
    /// Move the addressed runes to just after `b`.
    Move { a: Address, b: Address },
    /// Copy the addressed runes to just after `b`.
    Copy { a: Address, b: Address },
    /// Set mark `mark` (dot for `'.'` or whitespace) to the address.
    Set { a: Address, mark: char },
    /// Write the addressed runes to the output sink.
    Print { a: Address },
    /// Write the address in rune coordinates (`#from` or `#from,#to`).
    Where { a: Address },
    /// Write the address in 1-based line numbers (`l` or `l1,l2`).
    WhereLine { a: Address },
    /// Within the address, replace the `from`-th match of `re` (and, if
    /// `global`, every later one) with `with`; `\0`..`\9` in `with` name
    /// capture groups. Dot covers the whole address after replacement.
    Substitute {
        a: Address,
        re: String,
        with: String,
        global: bool,
        from: usize,
    },
}

impl Edit {
    pub fn change(a: Address, text: impl Into<String>) -> Self {
        Edit::Change { a, text: text.into() }
    }

    pub fn append(a: Address, text: impl Into<String>) -> Self {
        Edit::Append { a, text: text.into() }
    }

    pub fn insert(a: Address, text: impl Into<String>) -> Self {
        Edit::Insert { a, text: text.into() }
    }

    pub fn delete(a: Address) -> Self {
        Edit::Delete { a }
    }

    pub fn move_to(a: Address, b: Address) -> Self {
        Edit::Move { a, b }
    }

    pub fn copy_to(a: Address, b: Address) -> Self {
        Edit::Copy { a, b }
    }

    pub fn set_mark(a: Address, mark: char) -> Self {
        Edit::Set { a, mark }
    }

    pub fn print(a: Address) -> Self {
        Edit::Print { a }
    }

    pub fn where_at(a: Address) -> Self {
        Edit::Where { a }
    }

    pub fn where_line(a: Address) -> Self {
        Edit::WhereLine { a }
    }

    /// Substitution of the first match; see [`Edit::Substitute`] for the
    /// general form. `re` may be bare or `/`-delimited.
    pub fn sub(a: Address, re: &str, with: impl Into<String>) -> Self {
        Edit::Substitute {
            a,
            re: strip_pattern(re),
            with: with.into(),
            global: false,
            from: 1,
        }
    }

    /// Substitution of every match from the first onward.
    pub fn sub_global(a: Address, re: &str, with: impl Into<String>) -> Self {
        Edit::Substitute {
            a,
            re: strip_pattern(re),
            with: with.into(),
            global: true,
            from: 1,
        }
    }
}

/// Reduce an optionally `/`-delimited pattern to its bare form.
pub(crate) fn strip_pattern(re: &str) -> String {
    match Address::regexp(re) {
        Address::Regexp { pattern, .. } => pattern,
        _ => unreachable!("regexp constructor yields a regexp"),
    }
}

/// Render replacement text for the concrete syntax: text ending in a
/// newline uses the multi-line body form (terminated by a lone `.`),
/// anything else a `/`-delimited form with the delimiter and newlines
/// escaped.
pub(crate) fn escape(s: &str) -> String {
    if s.ends_with('\n') {
        return format!("\n{s}.\n");
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('/');
    push_escaped(&mut out, s, '/');
    out.push('/');
    out
}

fn push_escaped(out: &mut String, s: &str, delim: char) {
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if c == delim => {
                out.push('\\');
                out.push(delim);
            }
            c => out.push(c),
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Change { a, text } => write!(f, "{a}c{}", escape(text)),
            Edit::Append { a, text } => write!(f, "{a}a{}", escape(text)),
            Edit::Insert { a, text } => write!(f, "{a}i{}", escape(text)),
            Edit::Delete { a } => write!(f, "{a}d"),
            Edit::Move { a, b } => write!(f, "{a}m{b}"),
            Edit::Copy { a, b } => write!(f, "{a}t{b}"),
            Edit::Set { a, mark } => write!(f, "{a}k{mark}"),
            Edit::Print { a } => write!(f, "{a}p"),
            Edit::Where { a } => write!(f, "{a}=#"),
            Edit::WhereLine { a } => write!(f, "{a}="),
            Edit::Substitute {
                a,
                re,
                with,
                global,
                from,
            } => {
                write!(f, "{a}s")?;
                if *from > 1 {
                    write!(f, "{from}")?;
                }
                let mut body = String::from("/");
                push_escaped(&mut body, re, '/');
                body.push('/');
                push_escaped(&mut body, with, '/');
                body.push('/');
                f.write_str(&body)?;
                if *global {
                    write!(f, "g")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_address::Address as A;

    #[test]
    fn escape_table() {
        let cases = [
            ("", "//"),
            ("Hello, World!", "/Hello, World!/"),
            ("Hello, 世界!", "/Hello, 世界!/"),
            ("/Hello, World!/", r"/\/Hello, World!\//"),
            ("Hello,\nWorld!", r"/Hello,\nWorld!/"),
            ("/Hello,\nWorld!/", r"/\/Hello,\nWorld!\//"),
            ("Hello,\nWorld!\n", "\nHello,\nWorld!\n.\n"),
        ];
        for (input, want) in cases {
            assert_eq!(escape(input), want, "escape({input:?})");
        }
    }

    #[test]
    fn display_forms() {
        let cases: Vec<(Edit, &str)> = vec![
            (Edit::change(A::rune(1), "XYZ"), "#1c/XYZ/"),
            (Edit::change(A::all(), "a\nb\n"), "0,$c\na\nb\n.\n"),
            (Edit::delete(A::Dot.plus(A::line(1))), ".+1d"),
            (Edit::move_to(A::regexp("abc"), A::End), "/abc/m$"),
            (Edit::copy_to(A::line(2), A::line(0)), "2t0"),
            (Edit::set_mark(A::all(), 'm'), "0,$km"),
            (Edit::print(A::all()), "0,$p"),
            (Edit::where_at(A::End), "$=#"),
            (Edit::where_line(A::line(2)), "2="),
            (Edit::sub(A::all(), "/abc/", "def"), "0,$s/abc/def/"),
            (
                Edit::Substitute {
                    a: A::all(),
                    re: "abc".into(),
                    with: r"\1".into(),
                    global: true,
                    from: 2,
                },
                r"0,$s2/abc/\1/g",
            ),
        ];
        for (e, want) in cases {
            assert_eq!(e.to_string(), want, "display of {e:?}");
        }
    }
}
