//! Custom error types for the parsing of Tor documents

use std::num::ParseIntError;
use std::string::ToString;

use thiserror;

/// Alias for results returned by the parsers in this crate.
pub type Result<T> = std::result::Result<T, DocumentParseError>;

/// Coarse classification of a [`DocumentParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The line/object structure of the input is broken.
    Tokenization,
    /// The arguments of an item do not have the type its keyword requires.
    Decode,
    /// Sections or items are missing, misplaced, duplicated, or refer to
    /// something that does not exist.
    Structural,
    /// A digest could not be computed because a marker was not found.
    DigestSpan,
}

/// Error that occured when parsing a Tor document
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentParseError {
    #[error("object block at byte {offset} does not follow a keyword line")]
    ObjectWithoutItem { offset: usize },
    #[error("invalid keyword at byte {offset}")]
    BadKeyword { offset: usize },
    #[error("invalid PEM BEGIN tag at byte {offset}")]
    BadObjectBeginTag { offset: usize },
    #[error("invalid PEM END tag at byte {offset}")]
    BadObjectEndTag { offset: usize },
    #[error("mismatched PEM tags at byte {offset}")]
    BadObjectMismatchedTag { offset: usize },
    #[error("invalid base64 in object at byte {offset}")]
    BadObjectBase64 { offset: usize },
    #[error("object starting at byte {offset} is never closed")]
    UnterminatedObject { offset: usize },

    #[error("An item with keyword '{keyword}' unexpectedly had no or not enough arguments")]
    ItemArgumentsMissing { keyword: String },
    #[error("Could not decode string as base64")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Could not parse date/time")]
    InvalidDate(#[from] chrono::format::ParseError),
    #[error("Could not parse integer in {context}")]
    InvalidInt { context: String },
    #[error("Invalid digest '{raw}'")]
    InvalidDigest { raw: String },
    #[error("Invalid protocol version '{raw}'")]
    InvalidProtocolVersion { raw: String },
    #[error("Invalid exit policy entry '{raw}'")]
    InvalidExitPolicyEntry { raw: String },
    #[error("Malformed exit policy")]
    MalformedExitPolicy,
    #[error("Invalid argument dictionary entry '{raw}'")]
    InvalidArgumentDict { raw: String },
    #[error("Invalid bandwidth weight entry")]
    InvalidBandwidthWeight,
    #[error("Consensus weights cannot be parsed")]
    MalformedConsensusWeights,
    #[error("Invalid history line for '{keyword}'")]
    InvalidHistory { keyword: String },
    #[error("Invalid IP address of relay: {0}")]
    InvalidIpAddress(String),
    #[error("Error parsing the IP Address")]
    IpParseError(String),
    #[error("Error parsing a range")]
    RangeParseError(String),
    #[error("Error parsing a value")]
    ValueParseError(String),
    #[error("Error expected \"accept\" or \"reject\" received: {0}")]
    PolicyParseError(String),

    #[error("document contains no items")]
    EmptyDocument,
    #[error("When parsing a document, not all necessary information were present: {0}")]
    Incomplete(String),
    #[error("didn't find required item '{keyword}'")]
    MissingItem { keyword: &'static str },
    #[error("item '{keyword}' appeared more than once")]
    DuplicateItem { keyword: String },
    #[error("An item with keyword '{keyword}' was not expected at this position")]
    UnexpectedKeyword { keyword: String },
    #[error("item '{keyword}' is not allowed in the {section} section")]
    UnexpectedSection {
        keyword: String,
        section: &'static str,
    },
    #[error("unsupported document version '{raw}'")]
    UnsupportedVersion { raw: String },
    #[error("signature by {identity} has no matching dir-source")]
    UnknownSigningAuthority { identity: String },
    #[error("status entry for {identity} appears more than once")]
    DuplicateEntry { identity: String },
    #[error("document ends inside the {section} section")]
    TruncatedDocument { section: &'static str },
    #[error("item '{keyword}' is inconsistent with consensus method {method}")]
    InconsistentConsensusMethod { keyword: &'static str, method: u32 },
    #[error("unrecognized line '{line}'")]
    UnrecognizedLine { line: String },
    #[error("cannot determine document type (first keyword '{keyword}')")]
    UnknownDocumentType { keyword: String },
    #[error("expected a {expected} document, found '{found}'")]
    WrongDocumentType {
        expected: &'static str,
        found: String,
    },

    #[error("Content range '{from}'...'{to}' not found")]
    ContentRangeNotFound { from: String, to: String },
}

impl DocumentParseError {
    /// Create a new ItemArgumentsMissing error, easily
    pub fn args_missing(keyword: impl Into<String>) -> DocumentParseError {
        DocumentParseError::ItemArgumentsMissing {
            keyword: keyword.into(),
        }
    }

    /// Return which of the four failure families this error belongs to.
    pub fn kind(&self) -> FailureKind {
        use DocumentParseError::*;
        match self {
            ObjectWithoutItem { .. }
            | BadKeyword { .. }
            | BadObjectBeginTag { .. }
            | BadObjectEndTag { .. }
            | BadObjectMismatchedTag { .. }
            | BadObjectBase64 { .. }
            | UnterminatedObject { .. } => FailureKind::Tokenization,
            ItemArgumentsMissing { .. }
            | InvalidBase64(_)
            | InvalidDate(_)
            | InvalidInt { .. }
            | InvalidDigest { .. }
            | InvalidProtocolVersion { .. }
            | InvalidExitPolicyEntry { .. }
            | MalformedExitPolicy
            | InvalidArgumentDict { .. }
            | InvalidBandwidthWeight
            | MalformedConsensusWeights
            | InvalidHistory { .. }
            | InvalidIpAddress(_)
            | IpParseError(_)
            | RangeParseError(_)
            | ValueParseError(_)
            | PolicyParseError(_) => FailureKind::Decode,
            EmptyDocument
            | Incomplete(_)
            | MissingItem { .. }
            | DuplicateItem { .. }
            | UnexpectedKeyword { .. }
            | UnexpectedSection { .. }
            | UnsupportedVersion { .. }
            | UnknownSigningAuthority { .. }
            | DuplicateEntry { .. }
            | TruncatedDocument { .. }
            | InconsistentConsensusMethod { .. }
            | UnrecognizedLine { .. }
            | UnknownDocumentType { .. }
            | WrongDocumentType { .. } => FailureKind::Structural,
            ContentRangeNotFound { .. } => FailureKind::DigestSpan,
        }
    }
}

pub(crate) trait ErrorContext<T> {
    type IntoError;

    fn context(self, context: impl ToString) -> std::result::Result<T, Self::IntoError>;
}

impl<T> ErrorContext<T> for std::result::Result<T, ParseIntError> {
    type IntoError = DocumentParseError;

    fn context(self, context: impl ToString) -> std::result::Result<T, Self::IntoError> {
        self.map_err(|_| DocumentParseError::InvalidInt {
            context: context.to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            DocumentParseError::UnterminatedObject { offset: 3 }.kind(),
            FailureKind::Tokenization
        );
        assert_eq!(
            DocumentParseError::args_missing("bandwidth").kind(),
            FailureKind::Decode
        );
        assert_eq!(
            DocumentParseError::TruncatedDocument { section: "footer" }.kind(),
            FailureKind::Structural
        );
        assert_eq!(
            DocumentParseError::ContentRangeNotFound {
                from: "router".into(),
                to: "router-signature".into()
            }
            .kind(),
            FailureKind::DigestSpan
        );
    }

    #[test]
    fn int_context() {
        let e = "12x".parse::<u16>().context("OR port").unwrap_err();
        assert_eq!(
            e,
            DocumentParseError::InvalidInt {
                context: "OR port".into()
            }
        );
        assert_eq!(e.to_string(), "Could not parse integer in OR port");
    }
}
