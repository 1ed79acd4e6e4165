//! UUID representations used by CDM files.
//!
//! A CDM identifier is a plain 128-bit UUID, but it travels in two spellings:
//!
//! - **canonical**: `8-4-4-4-12` hex digits (`3f2504e0-4f89-11d3-9a0c-0305e82c3301`),
//!   case-insensitive, 36 chars. This is what humans and most tooling use.
//! - **compact**: the spelling embedded in CDM markup (`xmi:id`, `href`
//!   fragments, attribute references):
//!
//!   ```text
//!   "_" ++ base64url_nopad(uuid.to_be_bytes())      // 1 + 22 = 23 chars
//!   ```
//!
//!   The alphabet is `A-Z a-z 0-9 - _`. 128 bits do not divide into 6-bit
//!   groups, so the last character only carries 2 bits; decoding rejects
//!   encodings whose 4 unused bits are not zero. That keeps the mapping a
//!   bijection: every UUID has exactly one compact spelling.
//!
//! Detection (`detect_kind`) only looks at length and charset. Deeper checks
//! happen when a string is actually decoded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::fmt;
use thiserror::Error;

pub use uuid::Uuid;

/// Length of a canonical (hyphenated) UUID.
pub const CANONICAL_LEN: usize = 36;

/// Length of a compact UUID, including the leading `_`.
pub const COMPACT_LEN: usize = 23;

/// Leading marker of a compact UUID.
pub const COMPACT_MARKER: char = '_';

const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("`{input}` is neither a canonical nor a compact UUID")]
    Unrecognized { input: String },

    #[error("`{input}` looks like a compact UUID but does not decode to 128 bits: {reason}")]
    MalformedCompact { input: String, reason: String },

    #[error("`{input}` looks like a canonical UUID but is malformed: {reason}")]
    MalformedCanonical { input: String, reason: String },
}

// ============================================================================
// Kind detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UuidKind {
    /// Hyphenated hex form.
    Canonical,
    /// `_`-prefixed base64url form used inside CDM markup.
    Compact,
    /// Neither.
    Unknown,
}

impl fmt::Display for UuidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UuidKind::Canonical => "canonical",
            UuidKind::Compact => "compact",
            UuidKind::Unknown => "unknown",
        })
    }
}

fn is_compact_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_'
}

/// Classify `s` by length and charset.
pub fn detect_kind(s: &str) -> UuidKind {
    let bytes = s.as_bytes();

    if bytes.len() == CANONICAL_LEN
        && bytes.iter().enumerate().all(|(i, b)| {
            if HYPHEN_POSITIONS.contains(&i) {
                *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
    {
        return UuidKind::Canonical;
    }

    if bytes.len() == COMPACT_LEN
        && bytes[0] == COMPACT_MARKER as u8
        && bytes[1..].iter().all(|b| is_compact_char(*b))
    {
        return UuidKind::Compact;
    }

    UuidKind::Unknown
}

// ============================================================================
// Encoding / decoding
// ============================================================================

/// Compact spelling of a UUID value.
pub fn to_compact(uuid: &Uuid) -> String {
    let mut out = String::with_capacity(COMPACT_LEN);
    out.push(COMPACT_MARKER);
    URL_SAFE_NO_PAD.encode_string(uuid.as_bytes(), &mut out);
    out
}

/// Canonical (lowercase, hyphenated) spelling of a UUID value.
pub fn to_canonical(uuid: &Uuid) -> String {
    uuid.hyphenated().to_string()
}

fn decode_compact(s: &str) -> Result<Uuid, CodecError> {
    let malformed = |reason: String| CodecError::MalformedCompact {
        input: s.to_string(),
        reason,
    };

    let body = s
        .strip_prefix(COMPACT_MARKER)
        .ok_or_else(|| malformed("missing leading `_`".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|e| malformed(e.to_string()))?;
    let bytes: [u8; 16] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| malformed(format!("decoded {} bytes, expected 16", b.len())))?;
    Ok(Uuid::from_bytes(bytes))
}

fn decode_canonical(s: &str) -> Result<Uuid, CodecError> {
    Uuid::parse_str(s).map_err(|e| CodecError::MalformedCanonical {
        input: s.to_string(),
        reason: e.to_string(),
    })
}

/// Parse either spelling into a UUID value.
pub fn parse(s: &str) -> Result<Uuid, CodecError> {
    match detect_kind(s) {
        UuidKind::Canonical => decode_canonical(s),
        UuidKind::Compact => decode_compact(s),
        UuidKind::Unknown => Err(CodecError::Unrecognized {
            input: s.to_string(),
        }),
    }
}

/// Return `s` unchanged if it is canonical; otherwise decode the compact form.
pub fn ensure_canonical(s: &str) -> Result<String, CodecError> {
    match detect_kind(s) {
        UuidKind::Canonical => Ok(s.to_string()),
        UuidKind::Compact => decode_compact(s).map(|u| to_canonical(&u)),
        UuidKind::Unknown => Err(CodecError::Unrecognized {
            input: s.to_string(),
        }),
    }
}

/// Return `s` unchanged if it is compact (and decodes); otherwise encode the canonical form.
pub fn ensure_compact(s: &str) -> Result<String, CodecError> {
    match detect_kind(s) {
        UuidKind::Compact => decode_compact(s).map(|_| s.to_string()),
        UuidKind::Canonical => decode_canonical(s).map(|u| to_compact(&u)),
        UuidKind::Unknown => Err(CodecError::Unrecognized {
            input: s.to_string(),
        }),
    }
}

/// Fresh random identifier.
///
/// Backed by v4 UUIDs from the OS random source; 122 random bits keep the
/// collision probability negligible for models with millions of nodes.
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

pub fn generate_canonical() -> String {
    to_canonical(&generate())
}

pub fn generate_compact() -> String {
    to_compact(&generate())
}
