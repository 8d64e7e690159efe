//! Digests over exact byte ranges of a document.
//!
//! Authorities sign, and other documents reference, digests computed over
//! a precise slice of a document's bytes.  The functions here locate that
//! slice by marker keywords and hash it as-is: no re-encoding and no
//! line-ending translation.

use std::fmt;

use crate::error::{DocumentParseError, Result};
use crate::meta::RawSpan;

//
// External dependencies
//
use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use strum::{Display, EnumString, IntoStaticStr};

/// A digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

/// A computed or parsed digest.  How it is rendered (hex or base64) is up
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digest {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl Digest {
    /// Hash `bytes` with `algorithm`.
    pub fn compute(algorithm: DigestAlgorithm, bytes: &[u8]) -> Digest {
        match algorithm {
            DigestAlgorithm::Sha1 => {
                let mut out = [0_u8; 20];
                out.copy_from_slice(&Sha1::digest(bytes));
                Digest::Sha1(out)
            }
            DigestAlgorithm::Sha256 => {
                let mut out = [0_u8; 32];
                out.copy_from_slice(&Sha256::digest(bytes));
                Digest::Sha256(out)
            }
        }
    }

    /// Parse a digest written as hex, in either case.
    pub fn from_hex(algorithm: DigestAlgorithm, s: &str) -> Result<Digest> {
        let bytes = hex::decode(s).map_err(|_| DocumentParseError::InvalidDigest {
            raw: s.to_string(),
        })?;
        Self::from_slice(algorithm, &bytes, s)
    }

    /// Parse a digest written as base64, padded or not.
    pub fn from_base64(algorithm: DigestAlgorithm, s: &str) -> Result<Digest> {
        let bytes = base64::decode_config(s.trim_end_matches('='), base64::STANDARD_NO_PAD)?;
        Self::from_slice(algorithm, &bytes, s)
    }

    fn from_slice(algorithm: DigestAlgorithm, bytes: &[u8], raw: &str) -> Result<Digest> {
        let wrong_len = || DocumentParseError::InvalidDigest {
            raw: raw.to_string(),
        };
        match algorithm {
            DigestAlgorithm::Sha1 => {
                let arr: [u8; 20] = bytes.try_into().map_err(|_| wrong_len())?;
                Ok(Digest::Sha1(arr))
            }
            DigestAlgorithm::Sha256 => {
                let arr: [u8; 32] = bytes.try_into().map_err(|_| wrong_len())?;
                Ok(Digest::Sha256(arr))
            }
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        match self {
            Digest::Sha1(_) => DigestAlgorithm::Sha1,
            Digest::Sha256(_) => DigestAlgorithm::Sha256,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Digest::Sha1(b) => b,
            Digest::Sha256(b) => b,
        }
    }

    pub fn to_hex_lower(&self) -> String {
        hex::encode(self.as_bytes())
    }

    pub fn to_hex_upper(&self) -> String {
        hex::encode_upper(self.as_bytes())
    }

    /// Base64 without trailing `=` padding.
    pub fn to_base64(&self) -> String {
        base64::encode_config(self.as_bytes(), base64::STANDARD_NO_PAD)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Digest::Sha1(_) => write!(f, "{}", self.to_hex_lower()),
            Digest::Sha256(_) => write!(f, "{}", self.to_base64()),
        }
    }
}

/// Where a digested range stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanEnd<'k> {
    /// At the end of the buffer.
    EndOfBuffer,
    /// After the newline of the first line with this keyword.
    ThroughLine(&'k str),
    /// Right after "`keyword` " on the first line with this keyword.
    AfterKeyword(&'k str),
    /// After the END line of the object attached to the first line with
    /// this keyword.
    ThroughObject(&'k str),
}

impl<'k> SpanEnd<'k> {
    fn describe(&self) -> String {
        match self {
            SpanEnd::EndOfBuffer => "<end>".to_string(),
            SpanEnd::ThroughLine(k) | SpanEnd::AfterKeyword(k) | SpanEnd::ThroughObject(k) => {
                k.to_string()
            }
        }
    }
}

/// Iterate over `(start, end)` of every line in `buf`, where `end` is one
/// past the terminating newline (or the end of the buffer).
fn lines(buf: &[u8]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut off = 0;
    std::iter::from_fn(move || {
        if off >= buf.len() {
            return None;
        }
        let start = off;
        off = match memchr::memchr(b'\n', &buf[start..]) {
            Some(nl) => start + nl + 1,
            None => buf.len(),
        };
        Some((start, off))
    })
}

/// Return true iff the line starting at `line` has keyword `kw`.
fn has_keyword(line: &[u8], kw: &str) -> bool {
    let kw = kw.as_bytes();
    line.starts_with(kw)
        && matches!(line.get(kw.len()).copied(), None | Some(b' ' | b'\n' | b'\r'))
}

/// Locate the range beginning at the line with keyword `start_kw` and
/// ending as `end` says.
pub fn find_span(buf: &[u8], start_kw: &str, end: SpanEnd<'_>) -> Result<RawSpan> {
    let not_found = || DocumentParseError::ContentRangeNotFound {
        from: start_kw.to_string(),
        to: end.describe(),
    };
    let mut it = lines(buf);
    let start = it
        .by_ref()
        .find(|&(s, e)| has_keyword(&buf[s..e], start_kw))
        .map(|(s, _)| s)
        .ok_or_else(not_found)?;

    let stop = match end {
        SpanEnd::EndOfBuffer => buf.len(),
        SpanEnd::ThroughLine(kw) => it
            .find(|&(s, e)| has_keyword(&buf[s..e], kw))
            .map(|(_, e)| e)
            .ok_or_else(not_found)?,
        SpanEnd::AfterKeyword(kw) => it
            .find(|&(s, e)| has_keyword(&buf[s..e], kw))
            .map(|(s, e)| (s + kw.len() + 1).min(e))
            .ok_or_else(not_found)?,
        SpanEnd::ThroughObject(kw) => {
            it.find(|&(s, e)| has_keyword(&buf[s..e], kw))
                .ok_or_else(not_found)?;
            it.find(|&(s, e)| buf[s..e].starts_with(b"-----END "))
                .map(|(_, e)| e)
                .ok_or_else(not_found)?
        }
    };
    Ok(RawSpan::new(start, stop - start))
}

/// Digest the range from the line with keyword `start_kw` through the line
/// with keyword `end_kw` (or through the end of the buffer).
pub fn digest(
    buf: &[u8],
    algorithm: DigestAlgorithm,
    start_kw: &str,
    end_kw: Option<&str>,
) -> Result<Digest> {
    let end = match end_kw {
        Some(kw) => SpanEnd::ThroughLine(kw),
        None => SpanEnd::EndOfBuffer,
    };
    let span = find_span(buf, start_kw, end)?;
    digest_range(buf, span, algorithm)
}

/// Locate one range and digest it with every algorithm in `algorithms`.
pub fn digest_many(
    buf: &[u8],
    start_kw: &str,
    end: SpanEnd<'_>,
    algorithms: &[DigestAlgorithm],
) -> Result<Vec<Digest>> {
    let span = find_span(buf, start_kw, end)?;
    algorithms
        .iter()
        .map(|&alg| digest_range(buf, span, alg))
        .collect()
}

/// Digest a fixed range of `buf`.
pub fn digest_range(buf: &[u8], span: RawSpan, algorithm: DigestAlgorithm) -> Result<Digest> {
    let bytes = span
        .slice(buf)
        .ok_or_else(|| DocumentParseError::ContentRangeNotFound {
            from: span.offset().to_string(),
            to: span.end().to_string(),
        })?;
    Ok(Digest::compute(algorithm, bytes))
}
