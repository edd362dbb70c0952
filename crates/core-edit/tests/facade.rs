//! Editor façade behaviour: change notifications, streaming load, and
//! observation without dot movement.

mod common;

use core_address::Address;
use core_edit::{Edit, Editor, Span};
use core_runes::{Buffer, MemStore};

fn editor() -> Editor {
    Editor::with_buffer(Buffer::with_store(8, MemStore::new()))
}

#[test]
fn one_pulse_per_changing_edit() {
    let mut ed = editor();
    let rx = ed.subscribe();
    let mut out = Vec::new();

    ed.apply(&Edit::change(Address::all(), "abc"), &mut out)
        .expect("change");
    assert!(rx.try_recv().is_ok(), "change should pulse");
    assert!(rx.try_recv().is_err(), "exactly one pulse");

    ed.apply(&Edit::print(Address::all()), &mut out)
        .expect("print");
    assert!(rx.try_recv().is_err(), "print must not pulse");

    ed.apply(&Edit::set_mark(Address::all(), 'm'), &mut out)
        .expect("set");
    assert!(rx.try_recv().is_err(), "set must not pulse");
}

#[test]
fn pulses_coalesce_while_unread() {
    let mut ed = editor();
    let rx = ed.subscribe();
    let mut out = Vec::new();
    for _ in 0..3 {
        ed.apply(&Edit::append(Address::End, "x"), &mut out)
            .expect("append");
    }
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err(), "pulses coalesce to one");
}

#[test]
fn dropped_subscribers_are_forgotten() {
    let mut ed = editor();
    let rx = ed.subscribe();
    drop(rx);
    let mut out = Vec::new();
    ed.apply(&Edit::change(Address::all(), "abc"), &mut out)
        .expect("change after subscriber drop");
}

#[test]
fn load_streams_utf8_and_shifts_marks() {
    let mut ed = editor();
    let mut out = Vec::new();
    ed.apply(&Edit::change(Address::all(), "ad"), &mut out)
        .expect("seed");
    ed.set_mark('m', Span::new(1, 2));
    let n = ed.load("b世c".as_bytes(), 1).expect("load");
    assert_eq!(n, 3);
    assert_eq!(ed.contents().expect("contents"), "ab世cd");
    assert_eq!(ed.mark('m'), Span::new(4, 5), "mark shifted by insertion");
}

#[test]
fn where_of_leaves_dot_alone() {
    let mut ed = editor();
    let mut out = Vec::new();
    ed.apply(&Edit::change(Address::all(), "abc\ndef"), &mut out)
        .expect("seed");
    ed.set_mark('.', Span::point(0));
    let sp = ed.where_of(&Address::line(2)).expect("where_of");
    assert_eq!(sp, Span::new(4, 7));
    assert_eq!(ed.dot(), Span::point(0), "dot unmoved by observation");
}
