//! Fuzz harness for the status-line and colon-listing parsers.
//!
//! gpg output is untrusted input: the parsers must never panic, whatever
//! bytes arrive, and the line buffer must hand out the same lines however
//! the bytes are chunked.

#![no_main]
use gpg_driver::keys::parse_colons;
use gpg_driver::process::LineBuffer;
use gpg_driver::status::{parse_line, unescape};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut whole = LineBuffer::new();
    whole.push(data);
    let mut lines = Vec::new();
    while let Some(line) = whole.next_line() {
        lines.push(line);
    }
    lines.extend(whole.finish());

    // Same bytes, one at a time.
    let mut split = LineBuffer::new();
    let mut split_lines = Vec::new();
    for byte in data {
        split.push(std::slice::from_ref(byte));
        while let Some(line) = split.next_line() {
            split_lines.push(line);
        }
    }
    split_lines.extend(split.finish());
    assert_eq!(lines, split_lines);

    for line in &lines {
        if let Some(event) = parse_line(line) {
            let _ = event.to_string();
            let _ = event.rest(0);
        }
        let _ = unescape(line);
    }

    let _ = parse_colons(&String::from_utf8_lossy(data));
});
