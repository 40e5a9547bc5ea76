//! Checksum wire protocol.
//!
//! ```text
//! client → server:  /absolute/path/to/file\n
//! server → client:  8 lowercase hex chars (Adler-32), no delimiter, close
//! ```

use std::fmt;

/// Length of every reply.
pub const REPLY_LEN: usize = 8;

/// Reply reserved to mean "no usable checksum".
///
/// Adler-32 of empty input is also 1, so an empty file is indistinguishable
/// from the sentinel; such replies are treated as unusable.
pub const SENTINEL: &str = "00000001";

/// Longest request line a server accepts, newline included.
pub const MAX_REQUEST_LINE: usize = 4096;

/// An Adler-32 checksum rendered as 8 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Parse an 8-character hex reply. Uppercase digits are folded to lowercase.
    pub fn parse(reply: &[u8]) -> Option<Self> {
        if reply.len() != REPLY_LEN || !reply.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let text = std::str::from_utf8(reply).ok()?;
        Some(Self(text.to_ascii_lowercase()))
    }

    pub fn from_value(value: u32) -> Self {
        Self(format!("{:08x}", value))
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode the request line for `path`.
pub fn encode_request(path: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(path.len() + 1);
    line.extend_from_slice(path.as_bytes());
    line.push(b'\n');
    line
}

/// Absolute path requested for `name`: names starting with `/` are used
/// as is, anything else is appended to `prefix`.
pub fn resolve_path(prefix: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else if prefix.ends_with('/') || prefix.is_empty() {
        format!("{}{}", prefix, name)
    } else {
        format!("{}/{}", prefix, name)
    }
}
