//! Request path canonicalization.
//!
//! Every cache key and every `Location` is built from the canonical form,
//! so `/a/../b`, `//b`, `/b/`, `/a/%2e%2e/b` and `/%62` all share one
//! affinity entry.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};

/// Bytes escaped when a decoded segment is written back into a path.
///
/// Non-ASCII bytes are always escaped by `percent_encode`.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Canonical absolute path for the raw (still encoded) request path.
///
/// The path is percent-decoded first, then cleaned lexically:
/// - repeated `/` collapse into one
/// - `.` segments are dropped
/// - `..` removes the preceding segment; at the root it is dropped
/// - the trailing `/` is removed unless the result is `/`
///
/// Segments are re-encoded with a fixed set, so two spellings of the same
/// decoded path always produce the same string. An encoded `/` (`%2F`)
/// decodes to a separator.
pub fn normalize(raw: &str) -> String {
    let decoded: Cow<'_, [u8]> = percent_decode_str(raw).into();

    let mut segments: Vec<&[u8]> = Vec::new();
    for segment in decoded.split(|byte| *byte == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut canonical = String::with_capacity(raw.len() + 1);
    for segment in &segments {
        canonical.push('/');
        canonical.extend(percent_encode(segment, SEGMENT_ENCODE_SET));
    }
    if canonical.is_empty() {
        canonical.push('/');
    }
    canonical
}
