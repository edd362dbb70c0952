//! Backing-store failures must surface verbatim through address
//! evaluation and edit application, leaving descriptors untouched.

mod common;

use common::FlakyStore;
use core_address::Address;
use core_edit::{Edit, Editor, parse_edit};
use core_runes::Buffer;
use std::sync::atomic::Ordering;

const TEXT: &str = "Hello,\nWorld!";

fn failing_editor() -> (Editor, std::sync::Arc<std::sync::atomic::AtomicBool>) {
    let (store, fail) = FlakyStore::new();
    // Block size 1 so every rune access goes through the store.
    let mut ed = Editor::with_buffer(Buffer::with_store(1, store));
    let mut out = Vec::new();
    ed.apply(&Edit::change(Address::all(), TEXT), &mut out)
        .expect("seed");
    ed.set_mark('.', core_edit::Span::point(0));
    fail.store(true, Ordering::Relaxed);
    (ed, fail)
}

#[test]
fn address_evaluation_surfaces_read_errors() {
    let addrs = [
        "1",
        "#1+1",
        "$-1",
        "#3-1",
        "/World",
        ".-/World",
        "0,/World",
        "/Hello/;/World",
    ];
    for addr in addrs {
        let (mut ed, _fail) = failing_editor();
        let (a, rest) = core_address::parse(addr).expect("parse");
        assert_eq!(rest, "", "leftover parsing {addr:?}");
        let err = ed.where_of(&a.expect("address")).expect_err(addr);
        assert!(
            err.to_string().contains("read error"),
            "{addr}: {err}"
        );
    }
}

#[test]
fn print_surfaces_read_errors() {
    let (mut ed, _fail) = failing_editor();
    let mut out = Vec::new();
    let err = ed
        .apply(&Edit::print(Address::all()), &mut out)
        .expect_err("print with failing store");
    assert!(err.to_string().contains("read error"), "{err}");
}

#[test]
fn failed_insert_leaves_size_unchanged() {
    let (mut ed, _fail) = failing_editor();
    let before = ed.len();
    let mut out = Vec::new();
    let err = ed
        .apply(&Edit::append(Address::End, "X"), &mut out)
        .expect_err("append with failing store");
    assert!(err.to_string().contains("read error"), "{err}");
    assert_eq!(ed.len(), before, "size after failed append");
}

#[test]
fn edits_recover_when_the_store_does() {
    let (mut ed, fail) = failing_editor();
    let mut out = Vec::new();
    assert!(ed.apply(&Edit::print(Address::all()), &mut out).is_err());
    fail.store(false, Ordering::Relaxed);
    let mut out = Vec::new();
    ed.apply(&Edit::print(Address::all()), &mut out)
        .expect("print after recovery");
    assert_eq!(String::from_utf8(out).unwrap(), TEXT);
}

#[test]
fn parse_then_apply_round_trip() {
    // The textual pipeline end to end: parse edits, apply them, observe
    // each printed record.
    let (store, _fail) = FlakyStore::new();
    let mut ed = Editor::with_buffer(Buffer::with_store(4, store));
    let steps = [
        ("a/one two two/", ""),
        ("s2/two/TWO/", ""),
        (",p", "one two TWO"),
        (",=#", "#0,#11"),
        (",=", "1"),
    ];
    for (line, want) in steps {
        let (e, rest) = parse_edit(line).expect(line);
        assert_eq!(rest, "", "leftover in {line:?}");
        let mut out = Vec::new();
        ed.apply(&e, &mut out).expect(line);
        assert_eq!(String::from_utf8(out).unwrap(), want, "output of {line:?}");
    }
}
