//! Address evaluation.
//!
//! The right operand of `+`/`-` is *directional*: rune counts add or
//! subtract, line counts walk forward or backward, regexps search away
//! from the anchor. Everything else, including a dot/end/mark on the
//! right of `+`/`-`, is evaluated absolutely. `;` re-anchors dot for
//! its right side; `,` does not.

use core_runes::Buffer;

use crate::search::{self, RegexCache};
use crate::{AddrError, Address, Direction, Marks, Result, Span};

/// Evaluate `addr` against `buf` with the given dot. Pure with respect to
/// the address and marks; the buffer is `&mut` only for its block cache.
pub fn eval(
    addr: &Address,
    buf: &mut Buffer,
    dot: Span,
    marks: &dyn Marks,
    cache: &mut RegexCache,
) -> Result<Span> {
    let mut st = St { buf, marks, cache };
    whence(addr, &mut st, dot)
}

struct St<'a> {
    buf: &'a mut Buffer,
    marks: &'a dyn Marks,
    cache: &'a mut RegexCache,
}

/// Absolute evaluation: rune and line addresses count from the buffer
/// start, regexps search from dot.
fn whence(addr: &Address, st: &mut St, dot: Span) -> Result<Span> {
    match addr {
        Address::Dot => Ok(dot),
        Address::End => Ok(Span::point(st.buf.size())),
        Address::Rune(n) => {
            if *n <= st.buf.size() {
                Ok(Span::point(*n))
            } else {
                Err(AddrError::OutOfRange)
            }
        }
        Address::Line(n) => line_forward(st.buf, 0, *n),
        Address::Mark(r) => Ok(mark_span(st, dot, *r)),
        Address::Regexp { pattern, dir } => regexp_search(st, pattern, *dir, dot),
        Address::Plus(a, b) => {
            let s = whence(a, st, dot)?;
            relative(b, st, dot, s, Direction::Forward)
        }
        Address::Minus(a, b) => {
            let s = whence(a, st, dot)?;
            relative(b, st, dot, s, Direction::Reverse)
        }
        Address::To(a, b) => {
            let s1 = whence(a, st, dot)?;
            let s2 = whence(b, st, dot)?;
            join(s1, s2)
        }
        Address::Then(a, b) => {
            let s1 = whence(a, st, dot)?;
            let s2 = whence(b, st, Span::point(s1.to))?;
            join(s1, s2)
        }
        Address::Clamp(a) => match whence(a, st, dot) {
            Err(AddrError::OutOfRange) => Ok(Span::point(st.buf.size())),
            r => r,
        },
    }
}

/// Directional evaluation of the right operand of `+`/`-`, anchored at
/// `base` (the end of the left operand going forward, its start going
/// backward).
fn relative(addr: &Address, st: &mut St, dot: Span, base: Span, dir: Direction) -> Result<Span> {
    match addr {
        Address::Rune(n) => match dir {
            Direction::Forward => {
                let p = base.to + n;
                if p <= st.buf.size() {
                    Ok(Span::point(p))
                } else {
                    Err(AddrError::OutOfRange)
                }
            }
            Direction::Reverse => base
                .from
                .checked_sub(*n)
                .map(Span::point)
                .ok_or(AddrError::OutOfRange),
        },
        Address::Line(n) => match dir {
            Direction::Forward => line_forward(st.buf, base.to, *n),
            Direction::Reverse => line_backward(st.buf, base.from, *n),
        },
        Address::Regexp { pattern, dir: rdir } => {
            let effective = match dir {
                Direction::Forward => *rdir,
                Direction::Reverse => rdir.flip(),
            };
            regexp_search(st, pattern, effective, base)
        }
        Address::Clamp(a) => match relative(a, st, dot, base, dir) {
            Err(AddrError::OutOfRange) => Ok(match dir {
                Direction::Forward => Span::point(st.buf.size()),
                Direction::Reverse => Span::point(0),
            }),
            r => r,
        },
        // Dot, end, marks and compound addresses are context-free.
        other => whence(other, st, dot),
    }
}

fn join(s1: Span, s2: Span) -> Result<Span> {
    if s1.from > s2.to {
        return Err(AddrError::OutOfRange);
    }
    Ok(Span::new(s1.from, s2.to))
}

fn mark_span(st: &St, dot: Span, r: char) -> Span {
    if r == '.' || r.is_whitespace() {
        dot
    } else {
        st.marks.get(r)
    }
}

fn regexp_search(st: &mut St, pattern: &str, dir: Direction, anchor: Span) -> Result<Span> {
    let re = st.cache.get(pattern)?;
    let found = match dir {
        Direction::Forward => search::forward(st.buf, &re, anchor.to)?,
        Direction::Reverse => search::reverse(st.buf, &re, anchor.from)?,
    };
    found.ok_or(AddrError::NoMatch)
}

/// The span of the `n`-th line forward of position `p`. If `p` sits
/// mid-line, counting starts at the next line. Line `n` may be the empty
/// line directly after a final newline; asking for a line past that, or
/// past an unterminated final line, is out of range.
fn line_forward(buf: &mut Buffer, p: usize, n: usize) -> Result<Span> {
    let sz = buf.size();
    let mut start = p;
    if start > 0 && buf.rune(start - 1)? != '\n' {
        loop {
            if start == sz {
                // Mid-line at end of buffer: no next line exists.
                return Err(AddrError::OutOfRange);
            }
            let r = buf.rune(start)?;
            start += 1;
            if r == '\n' {
                break;
            }
        }
    }
    if n == 0 {
        return Ok(Span::point(start));
    }

    let mut from = start;
    let mut at_line_start = from == 0 || buf.rune(from - 1)? == '\n';
    let mut span = Span::point(start);
    for _ in 0..n {
        if from == sz {
            // The empty final line counts once, directly after a newline.
            if !at_line_start {
                return Err(AddrError::OutOfRange);
            }
            span = Span::point(sz);
            at_line_start = false;
            continue;
        }
        let mut to = from;
        let mut ended_nl = false;
        while to < sz {
            let r = buf.rune(to)?;
            to += 1;
            if r == '\n' {
                ended_nl = true;
                break;
            }
        }
        span = Span::new(from, to);
        at_line_start = ended_nl;
        from = to;
    }
    Ok(span)
}

/// The span of the `n`-th line backward of position `p`: the line before
/// the line containing `p`, then the one before that, and so on.
/// Stepping before line 1 yields the empty span at 0 once; any further
/// step is out of range.
fn line_backward(buf: &mut Buffer, p: usize, n: usize) -> Result<Span> {
    let mut cur = line_start(buf, p)?;
    if n == 0 {
        return Ok(Span::point(cur));
    }
    let mut span = Span::point(cur);
    let mut hit_start = false;
    for _ in 0..n {
        if cur > 0 {
            let end = cur;
            cur = line_start(buf, cur - 1)?;
            span = Span::new(cur, end);
        } else if !hit_start {
            hit_start = true;
            span = Span::point(0);
        } else {
            return Err(AddrError::OutOfRange);
        }
    }
    Ok(span)
}

/// Index of the first rune of the line containing `p` (for `p == size`,
/// of the line ending at the buffer end).
fn line_start(buf: &mut Buffer, p: usize) -> Result<usize> {
    let mut i = p;
    while i > 0 {
        if buf.rune(i - 1)? == '\n' {
            break;
        }
        i -= 1;
    }
    Ok(i)
}
