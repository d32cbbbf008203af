//! GnuPG status-line parser.
//!
//! gpg writes one machine-readable record per line to the status fd:
//!
//! ```text
//! [GNUPG:] <KEYWORD> <arg> <arg> ...
//! ```
//!
//! Arguments are separated by single spaces. Characters that would break
//! the line format (`%`, CR, LF and, in some records, `:`) are percent
//! escaped. Line buffering happens in the pump; this module only ever sees
//! complete lines.

mod code;

use std::fmt;

pub use code::StatusCode;

/// The fixed marker every status line starts with.
pub const STATUS_PREFIX: &str = "[GNUPG:] ";

/// One decoded status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// The keyword.
    pub code: StatusCode,
    /// Unescaped argument tokens.
    pub args: Vec<String>,
}

impl StatusEvent {
    /// Creates an event from a keyword and raw (already unescaped) args.
    #[must_use]
    pub fn new<I, S>(code: StatusCode, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns argument `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Joins every argument from `index` onwards with single spaces.
    ///
    /// User ids in `GOODSIG` and friends span the rest of the line.
    #[must_use]
    pub fn rest(&self, index: usize) -> Option<String> {
        (index < self.args.len()).then(|| self.args[index..].join(" "))
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code.as_str())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Parses one complete status line.
///
/// Returns `None` for lines without the `[GNUPG:]` marker or without a
/// keyword; gpg never writes such lines to the status fd, but a wrapper
/// script might, and they carry no protocol meaning.
#[must_use]
pub fn parse_line(line: &str) -> Option<StatusEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let body = line.strip_prefix(STATUS_PREFIX)?;

    let mut tokens = body.split(' ').filter(|t| !t.is_empty());
    let keyword = tokens.next()?;

    Some(StatusEvent {
        code: StatusCode::from_keyword(keyword),
        args: tokens.map(unescape).collect(),
    })
}

/// Reverses gpg's percent escaping.
///
/// Malformed escapes are kept verbatim; the decoded bytes are interpreted
/// as UTF-8, lossily.
#[must_use]
pub fn unescape(token: &str) -> String {
    if !token.contains('%') {
        return token.to_string();
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_event() {
        let event = parse_line("[GNUPG:] DECRYPTION_OKAY").unwrap();
        assert_eq!(event.code, StatusCode::DecryptionOkay);
        assert!(event.args.is_empty());
    }

    #[test]
    fn test_parse_event_with_args() {
        let event = parse_line("[GNUPG:] NEED_PASSPHRASE 8A0A2E3DB7E3E3D1 0F2D6C7E8B4A6C15 1 0\n")
            .unwrap();
        assert_eq!(event.code, StatusCode::NeedPassphrase);
        assert_eq!(event.arg(0), Some("8A0A2E3DB7E3E3D1"));
        assert_eq!(event.arg(1), Some("0F2D6C7E8B4A6C15"));
        assert_eq!(event.arg(4), None);
    }

    #[test]
    fn test_parse_unknown_code_is_other() {
        let event = parse_line("[GNUPG:] FUTURE_THING 1 2").unwrap();
        assert_eq!(event.code, StatusCode::Other("FUTURE_THING".to_string()));
        assert_eq!(event.args, vec!["1", "2"]);
    }

    #[test]
    fn test_parse_rejects_lines_without_prefix() {
        assert!(parse_line("gpg: encrypted with 2048-bit RSA key").is_none());
        assert!(parse_line("[GNUPG:]").is_none());
        assert!(parse_line("[GNUPG:] ").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_parse_strips_crlf() {
        let event = parse_line("[GNUPG:] NODATA 1\r\n").unwrap();
        assert_eq!(event.code, StatusCode::NoData);
        assert_eq!(event.args, vec!["1"]);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("100%25"), "100%");
        assert_eq!(unescape("a%0Ab"), "a\nb");
        assert_eq!(unescape("C%3a%5cpath"), "C:\\path");
        assert_eq!(unescape("%"), "%");
        assert_eq!(unescape("%4"), "%4");
        assert_eq!(unescape("%zz"), "%zz");
        assert_eq!(unescape("end%2"), "end%2");
    }

    #[test]
    fn test_rest_joins_user_id() {
        let event =
            parse_line("[GNUPG:] GOODSIG 0F2D6C7E8B4A6C15 Alice (work) <alice@example.com>")
                .unwrap();
        assert_eq!(
            event.rest(1).as_deref(),
            Some("Alice (work) <alice@example.com>")
        );
        assert_eq!(event.rest(9), None);
    }

    #[test]
    fn test_display_round_trips_keyword() {
        let event = StatusEvent::new(StatusCode::ImportOk, ["1", "ABCD"]);
        assert_eq!(event.to_string(), "IMPORT_OK 1 ABCD");
    }
}
