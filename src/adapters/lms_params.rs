//! Parameter extraction for LMS CLI response lines
//!
//! CLI replies are space-separated tokens. Tagged parameters are sent as
//! `name%3Avalue` (the colon is percent-encoded), and the value itself may
//! carry further escapes:
//!
//! ```text
//! players 0 1 count%3A2 playerindex%3A0 playerid%3A00%3A04%3A20%3Aaa%3Abb%3Acc modelname%3ASqueezebox%20Radio isplaying%3A1 power%3A1
//! ```
//!
//! Decoding is deliberately partial: only `%3A` and `%20` are turned back into
//! `:` and space. Line breaks (`%0A`, `%0D`) are always dropped so a value can
//! never smuggle a newline into a log line or a follow-up command.

/// Borrowed view over a single CLI response line.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLine<'a> {
    line: &'a str,
}

impl<'a> ResponseLine<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line }
    }

    /// Raw, undecoded value of `key` exactly as it appears on the wire.
    ///
    /// The key must be preceded by a space, so a key at the very start of the
    /// line is not matched and `power` never matches `xpower`.
    pub fn raw(&self, key: &str) -> Option<&'a str> {
        let token = format!(" {}%3A", key);
        let start = self.line.find(&token)? + token.len();
        let rest = &self.line[start..];
        Some(rest.split(' ').next().unwrap_or(rest))
    }

    /// Value of `key` with line breaks stripped, empty if absent.
    pub fn value(&self, key: &str) -> String {
        self.raw(key).map(strip_line_breaks).unwrap_or_default()
    }

    /// Value of `key` with line breaks stripped and `%3A`/`%20` decoded.
    pub fn decoded(&self, key: &str) -> String {
        decode_partial(&self.value(key))
    }
}

/// Extract the value of `key` from `line`, optionally partially decoded.
///
/// Returns an empty string when the key is absent.
pub fn extract(line: &str, key: &str, decode: bool) -> String {
    let line = ResponseLine::new(line);
    if decode {
        line.decoded(key)
    } else {
        line.value(key)
    }
}

fn strip_line_breaks(value: &str) -> String {
    value.replace("%0A", "").replace("%0D", "")
}

fn decode_partial(value: &str) -> String {
    value.replace("%3A", ":").replace("%20", " ")
}
