//! A parser for Tor directory documents.
//!
//! This crate turns the text documents published about the Tor network
//! (see [dir-spec](https://gitlab.torproject.org/tpo/core/torspec/-/blob/main/dir-spec.txt))
//! into typed records: server descriptors and extra-info descriptors of
//! relays and bridges, consensuses and votes with their embedded authority
//! key certificates, key certificates, bandwidth files, bridge pool
//! assignments and exit lists.
//!
//! The entry point for files holding many documents is
//! [`parse_descriptors`], which splits a buffer into documents and parses
//! each independently. A document that fails to parse is returned as an
//! [`UnparseableDocument`] next to the others instead of aborting the batch.
//! [`reader::DescriptorReader`] runs the same parser over several
//! [`reader::DocumentSource`]s on background threads.
//!
//! Signatures are extracted but never verified.

pub mod meta;
pub use meta::{Fingerprint, RawBytes, RawSpan};

pub mod digest;
pub use digest::{Digest, DigestAlgorithm};

pub mod decode;

pub mod error;
pub use error::{DocumentParseError, FailureKind};

pub mod descriptor;
#[doc(inline)]
pub use descriptor::ServerDescriptor;

pub mod extrainfo;
#[doc(inline)]
pub use extrainfo::ExtraInfoDescriptor;

pub mod consensus;
#[doc(inline)]
pub use consensus::NetworkStatus;

pub mod authcert;
#[doc(inline)]
pub use authcert::DirKeyCertificate;

pub mod bandwidth;
pub mod bridgepool;
pub mod exitlist;

pub mod document;
pub use document::{
    DocumentKind, DocumentSummary, ParseResult, ParsedDocument, UnparseableDocument,
};

pub mod batch;
pub use batch::{parse_descriptors, DescriptorIter, DescriptorParser};

pub mod config;
pub use config::ReaderConfig;

pub mod reader;
