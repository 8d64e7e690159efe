//! Directory authority key certificates (`@type dir-key-certificate-3`)

use std::net::SocketAddr;

use crate::decode;
use crate::digest::{self, Digest, DigestAlgorithm};
use crate::error::{DocumentParseError, Result};
use crate::meta::{Document, Fingerprint, RawBytes};

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;

/// A key certificate binding an authority's medium-term signing key to its
/// long-term identity key.
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct DirKeyCertificate {
    pub raw: RawBytes,
    #[builder(default)]
    pub annotations: Vec<String>,
    #[builder(default)]
    pub dir_address: Option<SocketAddr>,
    pub fingerprint: Fingerprint,
    pub published: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// PEM payloads, base64 without line breaks.
    pub identity_key: String,
    pub signing_key: String,
    #[builder(default)]
    pub cross_certification: Option<String>,
    pub certification: String,
    /// Over `dir-key-certificate-version` through the `dir-key-certification`
    /// line.
    pub digest_sha1: Digest,
    #[builder(default)]
    pub unrecognized_lines: Vec<String>,
}

impl DirKeyCertificate {
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<DirKeyCertificate> {
        Self::parse(RawBytes::copy_from(bytes.as_ref()))
    }

    pub fn parse(raw: RawBytes) -> Result<DirKeyCertificate> {
        let doc = Document::parse(raw.as_bytes())?;
        let first = doc.first_item();
        if first.keyword != "dir-key-certificate-version" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "dir-key-certificate-3",
                found: first.keyword.to_string(),
            });
        }
        if first.get_argument()? != "3" {
            return Err(DocumentParseError::UnsupportedVersion {
                raw: first.args_str().to_string(),
            });
        }

        let mut cert = DirKeyCertificateBuilder::default();
        cert.annotations(doc.annotation_lines());
        let mut unrecognized = Vec::new();

        for item in doc.items.iter().skip(1) {
            match item.keyword {
                "dir-address" => {
                    cert.dir_address(Some(decode::parse_or_address(item.get_argument()?)?));
                }
                "fingerprint" => {
                    cert.fingerprint(Fingerprint::from_str_hex(item.get_argument()?)?);
                }
                "dir-key-published" => {
                    cert.published(decode::timestamp_arg(item, 0)?);
                }
                "dir-key-expires" => {
                    cert.expires(decode::timestamp_arg(item, 0)?);
                }
                "dir-identity-key" => {
                    cert.identity_key(item.object_data()?);
                }
                "dir-signing-key" => {
                    cert.signing_key(item.object_data()?);
                }
                "dir-key-crosscert" => {
                    cert.cross_certification(Some(item.object_data()?));
                }
                "dir-key-certification" => {
                    cert.certification(item.object_data()?);
                }
                _ => unrecognized.push(item.verbatim()),
            }
        }

        let bytes = raw.as_bytes();
        cert.digest_sha1(digest::digest(
            bytes,
            DigestAlgorithm::Sha1,
            "dir-key-certificate-version",
            Some("dir-key-certification"),
        )?);
        cert.unrecognized_lines(unrecognized);
        cert.raw(raw);

        cert.build()
            .map_err(|e| DocumentParseError::Incomplete(e.to_string()))
    }
}
