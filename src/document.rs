//! The closed set of document kinds, and what batch parsing yields for each
//! document it finds.

use std::path::PathBuf;

use crate::authcert::DirKeyCertificate;
use crate::bandwidth::BandwidthFile;
use crate::bridgepool::BridgePoolAssignment;
use crate::consensus::NetworkStatus;
use crate::descriptor::ServerDescriptor;
use crate::digest::{Digest, DigestAlgorithm};
use crate::error::{DocumentParseError, Result};
use crate::exitlist::ExitList;
use crate::extrainfo::ExtraInfoDescriptor;
use crate::meta::RawBytes;

//
// External dependencies
//
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    ServerDescriptor,
    ExtraInfo,
    NetworkStatus,
    KeyCertificate,
    BandwidthFile,
    BridgePoolAssignment,
    ExitList,
}

impl DocumentKind {
    /// The keyword that opens each document of this kind, if documents of
    /// this kind can be concatenated.
    pub fn start_keyword(&self) -> Option<&'static str> {
        match self {
            DocumentKind::ServerDescriptor => Some("router"),
            DocumentKind::ExtraInfo => Some("extra-info"),
            DocumentKind::NetworkStatus => Some("network-status-version"),
            DocumentKind::KeyCertificate => Some("dir-key-certificate-version"),
            DocumentKind::BridgePoolAssignment => Some("bridge-pool-assignment"),
            DocumentKind::ExitList => Some("Downloaded"),
            DocumentKind::BandwidthFile => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDocument {
    ServerDescriptor(ServerDescriptor),
    ExtraInfo(ExtraInfoDescriptor),
    NetworkStatus(NetworkStatus),
    KeyCertificate(DirKeyCertificate),
    BandwidthFile(BandwidthFile),
    BridgePoolAssignment(BridgePoolAssignment),
    ExitList(ExitList),
}

impl ParsedDocument {
    /// Parse `raw` as a single document of the given kind.
    pub fn parse(kind: DocumentKind, raw: RawBytes, is_bridge: bool) -> Result<ParsedDocument> {
        Ok(match kind {
            DocumentKind::ServerDescriptor => {
                ParsedDocument::ServerDescriptor(ServerDescriptor::parse(raw, is_bridge)?)
            }
            DocumentKind::ExtraInfo => {
                ParsedDocument::ExtraInfo(ExtraInfoDescriptor::parse(raw, is_bridge)?)
            }
            DocumentKind::NetworkStatus => ParsedDocument::NetworkStatus(NetworkStatus::parse(raw)?),
            DocumentKind::KeyCertificate => {
                ParsedDocument::KeyCertificate(DirKeyCertificate::parse(raw)?)
            }
            DocumentKind::BandwidthFile => ParsedDocument::BandwidthFile(BandwidthFile::parse(raw)?),
            DocumentKind::BridgePoolAssignment => {
                ParsedDocument::BridgePoolAssignment(BridgePoolAssignment::parse(raw)?)
            }
            DocumentKind::ExitList => ParsedDocument::ExitList(ExitList::parse(raw)?),
        })
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ParsedDocument::ServerDescriptor(_) => DocumentKind::ServerDescriptor,
            ParsedDocument::ExtraInfo(_) => DocumentKind::ExtraInfo,
            ParsedDocument::NetworkStatus(_) => DocumentKind::NetworkStatus,
            ParsedDocument::KeyCertificate(_) => DocumentKind::KeyCertificate,
            ParsedDocument::BandwidthFile(_) => DocumentKind::BandwidthFile,
            ParsedDocument::BridgePoolAssignment(_) => DocumentKind::BridgePoolAssignment,
            ParsedDocument::ExitList(_) => DocumentKind::ExitList,
        }
    }

    pub fn raw(&self) -> &RawBytes {
        match self {
            ParsedDocument::ServerDescriptor(d) => &d.raw,
            ParsedDocument::ExtraInfo(d) => &d.raw,
            ParsedDocument::NetworkStatus(d) => &d.raw,
            ParsedDocument::KeyCertificate(d) => &d.raw,
            ParsedDocument::BandwidthFile(d) => &d.raw,
            ParsedDocument::BridgePoolAssignment(d) => &d.raw,
            ParsedDocument::ExitList(d) => &d.raw,
        }
    }

    pub fn annotations(&self) -> &[String] {
        match self {
            ParsedDocument::ServerDescriptor(d) => &d.annotations,
            ParsedDocument::ExtraInfo(d) => &d.annotations,
            ParsedDocument::NetworkStatus(d) => &d.annotations,
            ParsedDocument::KeyCertificate(d) => &d.annotations,
            ParsedDocument::BandwidthFile(d) => &d.annotations,
            ParsedDocument::BridgePoolAssignment(d) => &d.annotations,
            ParsedDocument::ExitList(d) => &d.annotations,
        }
    }

    /// All lines that were kept verbatim because their keyword was not
    /// understood.
    pub fn unrecognized_lines(&self) -> Vec<String> {
        match self {
            ParsedDocument::ServerDescriptor(d) => d.unrecognized_lines.clone(),
            ParsedDocument::ExtraInfo(d) => d.unrecognized_lines.clone(),
            ParsedDocument::NetworkStatus(d) => d.all_unrecognized_lines(),
            ParsedDocument::KeyCertificate(d) => d.unrecognized_lines.clone(),
            ParsedDocument::BandwidthFile(d) => d.unrecognized_lines.clone(),
            ParsedDocument::BridgePoolAssignment(d) => d.unrecognized_lines.clone(),
            ParsedDocument::ExitList(d) => d.unrecognized_lines.clone(),
        }
    }

    pub fn is_bridge(&self) -> bool {
        match self {
            ParsedDocument::ServerDescriptor(d) => d.is_bridge,
            ParsedDocument::ExtraInfo(d) => d.is_bridge,
            _ => false,
        }
    }

    /// The SHA-1 digest by which other documents refer to this one, for
    /// the kinds that define one.
    pub fn digest_sha1(&self) -> Option<Digest> {
        match self {
            ParsedDocument::ServerDescriptor(d) => Some(d.digest_sha1),
            ParsedDocument::ExtraInfo(d) => Some(d.digest_sha1),
            ParsedDocument::NetworkStatus(d) => Some(d.digest_sha1),
            ParsedDocument::KeyCertificate(d) => Some(d.digest_sha1),
            _ => None,
        }
    }

    pub fn digest_sha256(&self) -> Option<Digest> {
        match self {
            ParsedDocument::ServerDescriptor(d) => d.digest_sha256,
            ParsedDocument::ExtraInfo(d) => d.digest_sha256,
            ParsedDocument::NetworkStatus(d) => Some(d.digest_sha256),
            _ => None,
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        let raw = self.raw();
        DocumentSummary {
            kind: Some(self.kind()),
            sha1_hex: self
                .digest_sha1()
                .unwrap_or_else(|| Digest::compute(DigestAlgorithm::Sha1, raw.as_bytes()))
                .to_hex_lower(),
            sha256_b64: self
                .digest_sha256()
                .unwrap_or_else(|| Digest::compute(DigestAlgorithm::Sha256, raw.as_bytes()))
                .to_base64(),
            raw_len: raw.len(),
        }
    }
}

/// A document that could not be parsed, with the bytes it occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparseableDocument {
    pub raw: RawBytes,
    pub cause: DocumentParseError,
    pub source_file: Option<PathBuf>,
    pub file_name: Option<String>,
    /// The kind the document was taken for, if one could be detected.
    pub kind: Option<DocumentKind>,
}

impl UnparseableDocument {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            kind: self.kind,
            sha1_hex: Digest::compute(DigestAlgorithm::Sha1, self.raw.as_bytes()).to_hex_lower(),
            sha256_b64: Digest::compute(DigestAlgorithm::Sha256, self.raw.as_bytes()).to_base64(),
            raw_len: self.raw.len(),
        }
    }
}

/// One element of a batch parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Parsed(ParsedDocument),
    Unparseable(UnparseableDocument),
}

impl ParseResult {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseResult::Parsed(_))
    }

    pub fn parsed(&self) -> Option<&ParsedDocument> {
        match self {
            ParseResult::Parsed(d) => Some(d),
            ParseResult::Unparseable(_) => None,
        }
    }

    pub fn unparseable(&self) -> Option<&UnparseableDocument> {
        match self {
            ParseResult::Parsed(_) => None,
            ParseResult::Unparseable(u) => Some(u),
        }
    }

    pub fn raw(&self) -> &RawBytes {
        match self {
            ParseResult::Parsed(d) => d.raw(),
            ParseResult::Unparseable(u) => &u.raw,
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        match self {
            ParseResult::Parsed(d) => d.summary(),
            ParseResult::Unparseable(u) => u.summary(),
        }
    }

    pub fn into_result(self) -> std::result::Result<ParsedDocument, UnparseableDocument> {
        match self {
            ParseResult::Parsed(d) => Ok(d),
            ParseResult::Unparseable(u) => Err(u),
        }
    }
}

/// What a history record keeps about a document.
///
/// Digests are the document's own where its kind defines them, and
/// otherwise taken over the document's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub kind: Option<DocumentKind>,
    pub sha1_hex: String,
    pub sha256_b64: String,
    pub raw_len: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    const POOL: &str = "bridge-pool-assignment 2022-08-01 12:00:00\n\
                        00e923e7a8d87d28954fee7503e480f3a03ce4ee email\n";

    #[test]
    fn kinds() {
        assert_eq!(DocumentKind::ExtraInfo.to_string(), "extra-info");
        assert_eq!(
            "bridge-pool-assignment".parse::<DocumentKind>().unwrap(),
            DocumentKind::BridgePoolAssignment
        );
        assert_eq!(DocumentKind::BandwidthFile.start_keyword(), None);
    }

    #[test]
    fn summaries() {
        let raw = RawBytes::copy_from(POOL.as_bytes());
        let doc = ParsedDocument::parse(DocumentKind::BridgePoolAssignment, raw, false).unwrap();
        assert_eq!(doc.kind(), DocumentKind::BridgePoolAssignment);
        assert!(doc.digest_sha1().is_none());
        let s = doc.summary();
        assert_eq!(s.raw_len, POOL.len());
        assert_eq!(
            s.sha1_hex,
            Digest::compute(DigestAlgorithm::Sha1, POOL.as_bytes()).to_hex_lower()
        );
        assert_eq!(s.sha256_b64.len(), 43);

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["kind"], "bridge-pool-assignment");
        assert_eq!(json["raw_len"], POOL.len());

        let wrong = ParsedDocument::parse(
            DocumentKind::ExitList,
            RawBytes::copy_from(POOL.as_bytes()),
            false,
        )
        .unwrap_err();
        assert!(matches!(wrong, DocumentParseError::WrongDocumentType { .. }));
    }
}
