//! Regex search over rune coordinates.
//!
//! [`Search`] wraps a compiled pattern behind the two capabilities the
//! evaluator needs: a forward scan from an offset (wrapping once from the
//! buffer start) and a reverse scan (last match ending at or before a
//! limit, wrapping once over the whole buffer). Patterns compile in
//! multi-line mode so `^`/`$` anchor at newlines; `\A` still means the
//! search origin. Reverse search scans the prefix window forward and
//! keeps the last accepting match, which preserves `^` anchoring to real
//! line starts.
//!
//! Matches are computed on materialised text and mapped from byte to
//! rune offsets; patterns are small and buffers are read through the
//! block cache, so this stays linear in the searched range.

use std::collections::HashMap;

use regex::{Captures, Regex, RegexBuilder};

use core_runes::{Buffer, BufferError};

use crate::Span;

/// A compiled search pattern. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Search {
    re: Regex,
}

impl Search {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = sanitize_trailing_backslash(pattern);
        let re = RegexBuilder::new(&pattern).multi_line(true).build()?;
        Ok(Self { re })
    }

    /// First match in `hay`, as rune offsets within `hay`.
    fn first_in(&self, hay: &str) -> Option<Span> {
        self.re.find(hay).map(|m| rune_span(hay, m.start(), m.end()))
    }

    /// Last non-overlapping match in `hay`, as rune offsets within `hay`.
    fn last_in(&self, hay: &str) -> Option<Span> {
        self.re
            .find_iter(hay)
            .last()
            .map(|m| rune_span(hay, m.start(), m.end()))
    }

    /// All non-overlapping matches in `hay` with `template` expanded per
    /// match: byte start, byte end, replacement text. `\0`..`\9` in the
    /// template name capture groups; absent groups expand to empty.
    pub fn replacements(&self, hay: &str, template: &str) -> Vec<(usize, usize, String)> {
        self.re
            .captures_iter(hay)
            .map(|caps| {
                let m = caps.get(0).expect("group 0 always participates");
                (m.start(), m.end(), expand_template(template, &caps))
            })
            .collect()
    }
}

/// Forward search for `re` starting at rune offset `from`, wrapping once
/// from the buffer start.
pub fn forward(buf: &mut Buffer, re: &Search, from: usize) -> Result<Option<Span>, BufferError> {
    let sz = buf.size();
    let hay: String = buf.read(sz - from, from)?.into_iter().collect();
    if let Some(sp) = re.first_in(&hay) {
        return Ok(Some(Span::new(sp.from + from, sp.to + from)));
    }
    if from == 0 {
        return Ok(None);
    }
    let hay: String = buf.read(sz, 0)?.into_iter().collect();
    Ok(re.first_in(&hay))
}

/// Reverse search for `re`: the last match ending at or before rune
/// offset `limit`, wrapping once over the whole buffer. The prefix
/// window ends exactly at `limit`, so `$` may anchor there.
pub fn reverse(buf: &mut Buffer, re: &Search, limit: usize) -> Result<Option<Span>, BufferError> {
    let hay: String = buf.read(limit, 0)?.into_iter().collect();
    if let Some(sp) = re.last_in(&hay) {
        return Ok(Some(sp));
    }
    let sz = buf.size();
    if limit == sz {
        return Ok(None);
    }
    let hay: String = buf.read(sz, 0)?.into_iter().collect();
    Ok(re.last_in(&hay))
}

/// Per-editor cache of compiled patterns, keyed by the pattern string.
#[derive(Debug, Default)]
pub struct RegexCache {
    map: HashMap<String, Search>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pattern: &str) -> Result<Search, regex::Error> {
        if let Some(s) = self.map.get(pattern) {
            return Ok(s.clone());
        }
        let s = Search::new(pattern)?;
        self.map.insert(pattern.to_string(), s.clone());
        Ok(s)
    }
}

fn rune_span(hay: &str, byte_start: usize, byte_end: usize) -> Span {
    let from = hay[..byte_start].chars().count();
    let to = from + hay[byte_start..byte_end].chars().count();
    Span::new(from, to)
}

/// A pattern ending in a lone `\` means a literal backslash (the parser
/// keeps it); the regex engine rejects a dangling escape, so double it.
fn sanitize_trailing_backslash(pattern: &str) -> String {
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        }
    }
    if escaped {
        let mut s = pattern.to_string();
        s.push('\\');
        s
    } else {
        pattern.to_string()
    }
}

/// Expand `\0`..`\9` (and `\\`) in a substitution template.
fn expand_template(template: &str, caps: &Captures) -> String {
    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(d @ '0'..='9') => {
                let i = d.to_digit(10).expect("digit") as usize;
                if let Some(m) = caps.get(i) {
                    out.push_str(m.as_str());
                }
            }
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runes::MemStore;

    fn buffer(s: &str) -> Buffer {
        let mut b = Buffer::with_store(8, MemStore::new());
        let rs: Vec<char> = s.chars().collect();
        b.insert(&rs, 0).expect("insert");
        b
    }

    fn fwd(pat: &str, text: &str, from: usize) -> Option<Span> {
        let re = Search::new(pat).expect("compile");
        forward(&mut buffer(text), &re, from).expect("io")
    }

    fn rev(pat: &str, text: &str, limit: usize) -> Option<Span> {
        let re = Search::new(pat).expect("compile");
        reverse(&mut buffer(text), &re, limit).expect("io")
    }

    #[test]
    fn forward_finds_next_match_in_rune_coordinates() {
        assert_eq!(fwd("世界", "Hello 世界", 0), Some(Span::new(6, 8)));
        assert_eq!(fwd("abc", "abcxabc", 1), Some(Span::new(4, 7)));
    }

    #[test]
    fn forward_wraps_once() {
        assert_eq!(fwd("abc", "abc xxx", 4), Some(Span::new(0, 3)));
        assert_eq!(fwd("zzz", "abc xxx", 4), None);
    }

    #[test]
    fn empty_pattern_matches_at_origin() {
        assert_eq!(fwd("", "aaaa", 2), Some(Span::point(2)));
        assert_eq!(fwd("b*", "aaaa", 2), Some(Span::point(2)));
    }

    #[test]
    fn caret_matches_at_origin_and_real_line_starts() {
        assert_eq!(fwd("^def", "abc\ndef", 4), Some(Span::new(4, 7)));
        assert_eq!(fwd("^def", "abcdef", 3), Some(Span::new(3, 6)));
        assert_eq!(fwd(r"\Adef", "abc\ndef", 4), Some(Span::new(4, 7)));
    }

    #[test]
    fn dollar_matches_line_ends() {
        assert_eq!(fwd("abc$", "abc\ndef", 0), Some(Span::new(0, 3)));
        assert_eq!(fwd("abc$", "abcdef", 0), None);
    }

    #[test]
    fn reverse_takes_last_match_before_limit() {
        // 0123456789...
        // abc abc abc
        assert_eq!(rev("abc", "abc abc abc", 11), Some(Span::new(8, 11)));
        assert_eq!(rev("abc", "abc abc abc", 10), Some(Span::new(4, 7)));
    }

    #[test]
    fn reverse_window_truncates_so_dollar_anchors_at_limit() {
        assert_eq!(rev("abc$", "abcdef", 3), Some(Span::new(0, 3)));
        // But ^ never anchors mid-line.
        assert_eq!(rev("^def", "abcdef", 6), None);
    }

    #[test]
    fn reverse_wraps_to_buffer_end() {
        assert_eq!(rev("abc", "xx abc xx", 1), Some(Span::new(3, 6)));
    }

    #[test]
    fn reverse_can_match_a_prefix_of_a_longer_match() {
        assert_eq!(rev("a*", "aaaaaaaaa", 4), Some(Span::new(0, 4)));
    }

    #[test]
    fn trailing_backslash_is_literal() {
        assert_eq!(fwd(r"\", r"abc\", 0), Some(Span::new(3, 4)));
        assert_eq!(fwd(r"abc\", r"abc\", 0), Some(Span::new(0, 4)));
    }

    #[test]
    fn replacement_character_is_an_ordinary_rune() {
        assert_eq!(fwd("\u{FFFD}", "ab\u{FFFD}c", 0), Some(Span::new(2, 3)));
    }

    #[test]
    fn bad_pattern_reports_missing_operand() {
        let err = Search::new("*").unwrap_err();
        assert!(err.to_string().contains("missing"), "got: {err}");
    }

    #[test]
    fn template_expansion() {
        let re = Search::new("(a)(b)?(c)").expect("compile");
        let reps = re.replacements("ac", r"[\0|\1|\2|\3]x\\y");
        assert_eq!(reps, vec![(0, 2, r"[ac|a||c]x\y".to_string())]);
    }
}
