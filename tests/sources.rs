use std::{
    fs,
    io::{self, Read},
};

use tempfile::NamedTempFile;
use ucode::{SourceHandle, StdinAcquirer, stdin::STDIN_NAME};

#[test]
fn stdin_is_acquired_once() {
    let mut acquirer = StdinAcquirer::new(&b"print(1)"[..]);
    assert!(!acquirer.is_drained());

    let mut first = acquirer.acquire().expect("first read");
    assert_eq!(first.name(), STDIN_NAME);
    assert!(first.is_buffer());
    assert_eq!(first.read_text().unwrap(), "print(1)");
    assert!(acquirer.is_drained());

    let err = acquirer.acquire().expect_err("second read fails");
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert_eq!(err.to_string(), "can read from stdin only once");
}

#[test]
fn empty_stdin_still_counts_as_acquired() {
    let mut acquirer = StdinAcquirer::new(io::empty());
    let mut handle = acquirer.acquire().expect("read");
    assert_eq!(handle.read_text().unwrap(), "");
    assert!(acquirer.acquire().is_err());
}

#[test]
fn shebang_line_is_discarded() {
    let mut handle = SourceHandle::buffer("script", "#!/bin/ucode\nprint(1)");
    assert_eq!(handle.skip_shebang().unwrap(), 13);
    assert_eq!(handle.offset(), 11);
    assert_eq!(handle.first_line(), 2);
    assert_eq!(handle.read_text().unwrap(), "print(1)");
}

#[test]
fn non_shebang_bytes_are_pushed_back() {
    let mut handle = SourceHandle::buffer("script", "print(1)");
    assert_eq!(handle.skip_shebang().unwrap(), 0);
    assert_eq!(handle.offset(), 0);
    assert_eq!(handle.first_line(), 1);
    assert_eq!(handle.read_text().unwrap(), "print(1)");

    let mut single = SourceHandle::buffer("script", "#");
    assert_eq!(single.skip_shebang().unwrap(), 0);
    assert_eq!(single.read_text().unwrap(), "#");

    let mut empty = SourceHandle::buffer("script", "");
    assert_eq!(empty.skip_shebang().unwrap(), 0);
    assert_eq!(empty.read_text().unwrap(), "");
}

#[test]
fn shebang_without_newline_consumes_everything() {
    let mut handle = SourceHandle::buffer("script", "#!only");
    assert_eq!(handle.skip_shebang().unwrap(), 6);
    assert_eq!(handle.offset(), 4);
    assert_eq!(handle.first_line(), 1);
    assert_eq!(handle.read_text().unwrap(), "");
}

#[test]
fn file_sources_skip_shebang_too() {
    let file = NamedTempFile::new().expect("create temp file");
    fs::write(file.path(), "#!/usr/bin/env ucode\nlet x = 1;\n").expect("write script");

    let mut handle = SourceHandle::file(file.path()).expect("open");
    assert!(!handle.is_buffer());
    assert_eq!(handle.name(), file.path().display().to_string());
    assert_eq!(handle.skip_shebang().unwrap(), 21);
    assert_eq!(handle.offset(), 19);
    assert_eq!(handle.first_line(), 2);
    assert_eq!(handle.read_text().unwrap(), "let x = 1;\n");
}

#[test]
fn unread_bytes_come_back_first() {
    let mut handle = SourceHandle::buffer("script", "cd");
    handle.unread(b"b");
    handle.unread(b"a");
    let mut text = String::new();
    handle.read_to_string(&mut text).unwrap();
    assert_eq!(text, "abcd");
}

#[test]
fn missing_files_fail_to_open() {
    let err = SourceHandle::file("/nonexistent/ucode/script.uc").expect_err("missing file");
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}
