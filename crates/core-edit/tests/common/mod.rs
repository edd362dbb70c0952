#![allow(dead_code)] // Shared across the integration test binaries; each uses a subset.

//! Test harness around [`Editor`] using mark notation: `{..}` in a text
//! marks both endpoints of dot at that position, `{.}text{.}` a dot
//! spanning `text`, `{aamm}` the endpoints of marks `a` and `m`, and so
//! on. A `given` string builds an editor; a `want` string asserts the
//! buffer text and every mark it mentions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use core_address::{Address, Span};
use core_edit::{Edit, Editor, parse_edit};
use core_runes::{Buffer, MemStore, RandomAccess};

pub const TEST_BLOCK: usize = 8;

#[derive(Debug)]
pub struct Marked {
    pub text: String,
    pub marks: Vec<(char, Span)>,
}

/// Parse mark notation. Each mark rune's first brace occurrence is its
/// span start, the second its end; a single occurrence is a point.
pub fn parse_marked(s: &str) -> Marked {
    let mut text = String::new();
    let mut pos = 0usize;
    let mut seen: Vec<char> = Vec::new();
    let mut spans: HashMap<char, (usize, Option<usize>)> = HashMap::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            text.push(c);
            pos += 1;
            continue;
        }
        for m in chars.by_ref() {
            if m == '}' {
                break;
            }
            match spans.entry(m) {
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert((pos, None));
                    seen.push(m);
                }
                std::collections::hash_map::Entry::Occupied(mut e) => {
                    e.get_mut().1 = Some(pos);
                }
            }
        }
    }
    let marks = seen
        .into_iter()
        .map(|m| {
            let (from, to) = spans[&m];
            (m, Span::new(from, to.unwrap_or(from)))
        })
        .collect();
    Marked { text, marks }
}

/// Editor seeded with the text and marks of a `given` string. Dot is
/// reset to the origin first, as the original suite does, then every
/// mark in the notation (dot included) is applied.
pub fn editor_with(given: &Marked) -> Editor {
    let mut ed = Editor::with_buffer(Buffer::with_store(TEST_BLOCK, MemStore::new()));
    let mut out = Vec::new();
    ed.apply(&Edit::change(Address::all(), given.text.clone()), &mut out)
        .expect("seed buffer");
    ed.set_mark('.', Span::point(0));
    for (m, sp) in &given.marks {
        ed.set_mark(*m, *sp);
    }
    ed
}

/// Apply `edit` to `given` and assert the outcome: `Ok(want)` checks the
/// buffer text and every mark `want` mentions plus the printed output;
/// `Err(substr)` checks the error message and that the buffer text is
/// unchanged. Runs twice, once with the edit as built and once through
/// its printed form, so every case also exercises the print/parse round
/// trip.
pub fn check(name: &str, given: &str, edit: &Edit, print: &str, want: Result<&str, &str>) {
    run_case(name, given, edit, print, want, false);
    run_case(name, given, edit, print, want, true);
}

/// Address evaluation check in the original suite's shape: the edit sets
/// mark `a` to the address.
pub fn check_addr(name: &str, given: &str, addr: Address, want: Result<&str, &str>) {
    check(name, given, &Edit::set_mark(addr, 'a'), "", want);
}

fn run_case(
    name: &str,
    given: &str,
    edit: &Edit,
    print: &str,
    want: Result<&str, &str>,
    via_string: bool,
) {
    let g = parse_marked(given);
    let mut ed = editor_with(&g);
    let reparsed;
    let edit = if via_string {
        let s = edit.to_string();
        let (e, rest) =
            parse_edit(&s).unwrap_or_else(|err| panic!("{name}: reparse {s:?}: {err}"));
        assert_eq!(rest, "", "{name}: leftover after reparsing {s:?}");
        reparsed = e;
        &reparsed
    } else {
        edit
    };

    let mut out: Vec<u8> = Vec::new();
    let result = ed.apply(edit, &mut out);
    match want {
        Err(substr) => {
            let err = result.expect_err(name);
            assert!(
                err.to_string().contains(substr),
                "{name}: error {err:?} does not mention {substr:?}"
            );
            assert_eq!(
                ed.contents().expect("contents"),
                g.text,
                "{name}: buffer changed by failed edit"
            );
        }
        Ok(want_marked) => {
            result.unwrap_or_else(|err| panic!("{name}: {err}"));
            let w = parse_marked(want_marked);
            assert_eq!(ed.contents().expect("contents"), w.text, "{name}: text");
            assert_eq!(
                String::from_utf8(out).expect("print output"),
                print,
                "{name}: print"
            );
            for (m, sp) in &w.marks {
                assert_eq!(ed.mark(*m), *sp, "{name}: mark {m:?}");
            }
        }
    }
}

/// Store whose reads and writes can be failed on demand, for error
/// propagation tests.
pub struct FlakyStore {
    inner: MemStore,
    fail: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner: MemStore::new(),
                fail: fail.clone(),
            },
            fail,
        )
    }
}

impl RandomAccess for FlakyStore {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> std::io::Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(std::io::Error::other("read error"));
        }
        self.inner.read_at(buf, off)
    }

    fn write_at(&mut self, buf: &[u8], off: u64) -> std::io::Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(std::io::Error::other("read error"));
        }
        self.inner.write_at(buf, off)
    }

    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
