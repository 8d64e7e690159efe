//! Tor network status documents: consensuses and votes
//!
//! A network status is read as a sequence of sections, in this order:
//! header, authority (`dir-source`) blocks, router status entries, footer
//! and signatures. Each section is opened by a specific keyword; seeing the
//! opening keyword of an earlier section is a structural error.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::IpAddr;
use std::str::FromStr;

use crate::authcert::DirKeyCertificate;
use crate::decode::{self, SupportedProtocolVersion};
use crate::digest::{self, Digest, DigestAlgorithm, SpanEnd};
use crate::error::{DocumentParseError, ErrorContext, Result};
use crate::meta::{Document, Fingerprint, Item, RawBytes, RawSpan};

mod entry;
pub use entry::{
    CondensedExitPolicy, ExitPolicyEntry, ExitPolicyType, Flag, NetworkStatusEntry,
};
use entry::EntryAssembler;

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use indexmap::IndexMap;
use log::{debug, warn};
use phf::phf_set;
use strum::{Display, EnumString, IntoStaticStr};

/// Header keywords that must appear exactly once.
static HEADER_REQUIRED: phf::Set<&'static str> = phf_set! {
    "vote-status", "valid-after", "fresh-until", "valid-until", "known-flags",
};

/// Header keywords that may appear at most once.
static HEADER_AT_MOST_ONCE: phf::Set<&'static str> = phf_set! {
    "network-status-version", "vote-status", "consensus-methods", "consensus-method",
    "published", "valid-after", "fresh-until", "valid-until", "voting-delay",
    "client-versions", "server-versions", "known-flags", "flag-thresholds", "params",
    "recommended-client-protocols", "recommended-relay-protocols",
    "required-client-protocols", "required-relay-protocols",
    "shared-rand-previous-value", "shared-rand-current-value",
};

/// Consensus methods from which on a consensus must carry
/// `bandwidth-weights`.
const BANDWIDTH_WEIGHTS_SINCE_METHOD: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ConsensusFlavor {
    Ns,
    Microdesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum VoteStatus {
    Consensus,
    Vote,
}

/// Sections of a network status, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
enum Section {
    Header,
    DirSources,
    Entries,
    Footer,
    Signatures,
}

impl Section {
    /// The section that `keyword` belongs to, given that we are in `self`.
    fn of(self, keyword: &str) -> Section {
        match keyword {
            "dir-source" => Section::DirSources,
            "r" => Section::Entries,
            "directory-footer" => Section::Footer,
            // Early consensus methods have weights but no footer line.
            "bandwidth-weights" if self < Section::Footer => Section::Footer,
            "directory-signature" => Section::Signatures,
            _ => self,
        }
    }
}

/// A shared random value as announced by `shared-rand-*-value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRandomValue {
    pub num_reveals: u32,
    pub value: String,
}

impl SharedRandomValue {
    fn from_item(item: &Item<'_>) -> Result<Self> {
        let splits = item.split_arguments()?;
        match splits[..] {
            [num_reveals, value, ..] => Ok(SharedRandomValue {
                num_reveals: num_reveals.parse::<u32>().context(item.keyword)?,
                value: value.to_string(),
            }),
            _ => Err(DocumentParseError::args_missing(item.keyword)),
        }
    }
}

/// One contributing authority: its `dir-source` line and the lines that
/// follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSourceEntry {
    pub nickname: String,
    pub identity: Fingerprint,
    pub hostname: String,
    pub address: IpAddr,
    pub dir_port: u16,
    pub or_port: u16,
    pub contact: Option<String>,
    /// Digest of the authority's vote (consensus only).
    pub vote_digest: Option<Digest>,
    pub legacy_dir_key: Option<Fingerprint>,
    pub shared_rand_participate: bool,
    pub shared_rand_commits: Vec<String>,
    pub shared_rand_previous: Option<SharedRandomValue>,
    pub shared_rand_current: Option<SharedRandomValue>,
    /// The key certificate embedded in a vote.
    pub key_certificate: Option<DirKeyCertificate>,
    pub unrecognized_lines: Vec<String>,
}

impl DirSourceEntry {
    fn from_item(item: &Item<'_>) -> Result<Self> {
        let splits = item.split_arguments()?;
        match splits[..] {
            [nickname, identity, hostname, address, dir_port, or_port, ..] => Ok(DirSourceEntry {
                nickname: nickname.to_string(),
                identity: Fingerprint::from_str_hex(identity)?,
                hostname: hostname.to_string(),
                address: IpAddr::from_str(address)
                    .map_err(|_| DocumentParseError::InvalidIpAddress(address.to_string()))?,
                dir_port: dir_port.parse::<u16>().context("dir port")?,
                or_port: or_port.parse::<u16>().context("OR port")?,
                contact: None,
                vote_digest: None,
                legacy_dir_key: None,
                shared_rand_participate: false,
                shared_rand_commits: Vec::new(),
                shared_rand_previous: None,
                shared_rand_current: None,
                key_certificate: None,
                unrecognized_lines: Vec::new(),
            }),
            _ => Err(DocumentParseError::args_missing(item.keyword)),
        }
    }

    /// Legacy entries list an authority's old identity key.
    pub fn is_legacy(&self) -> bool {
        self.nickname.ends_with("-legacy")
    }
}

/// A `directory-signature` and its signature object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySignature {
    pub algorithm: DigestAlgorithm,
    pub identity: Fingerprint,
    /// Upper-case hex digest of the signing key.
    pub signing_key_digest: String,
    /// Base64 signature, line breaks removed.
    pub signature: String,
}

impl DirectorySignature {
    fn from_item(item: &Item<'_>) -> Result<Self> {
        let splits = item.split_arguments()?;
        let (algorithm, identity, signing_key_digest) = match splits[..] {
            [identity, skd] => (DigestAlgorithm::Sha1, identity, skd),
            [algorithm, identity, skd, ..] => (
                DigestAlgorithm::from_str(algorithm)
                    .map_err(|_| DocumentParseError::ValueParseError(algorithm.to_string()))?,
                identity,
                skd,
            ),
            _ => return Err(DocumentParseError::args_missing(item.keyword)),
        };
        Ok(DirectorySignature {
            algorithm,
            identity: Fingerprint::from_str_hex(identity)?,
            signing_key_digest: signing_key_digest.to_uppercase(),
            signature: item.object_data()?,
        })
    }
}

/// A parsed vote or consensus.
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct NetworkStatus {
    pub raw: RawBytes,
    #[builder(default)]
    pub annotations: Vec<String>,
    pub flavor: ConsensusFlavor,
    pub vote_status: VoteStatus,
    /// Methods supported by a voting authority (votes only).
    #[builder(default)]
    pub consensus_methods: Vec<u32>,
    /// The method a consensus was made with. Absent means method 1.
    #[builder(default)]
    pub consensus_method: Option<u32>,
    #[builder(default)]
    pub published: Option<DateTime<Utc>>,
    pub valid_after: DateTime<Utc>,
    pub fresh_until: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Vote and distribution delay in seconds.
    #[builder(default)]
    pub voting_delay: Option<(u64, u64)>,
    #[builder(default)]
    pub client_versions: Vec<String>,
    #[builder(default)]
    pub server_versions: Vec<String>,
    #[builder(default)]
    pub packages: Vec<String>,
    pub known_flags: BTreeSet<String>,
    #[builder(default)]
    pub flag_thresholds: IndexMap<String, String>,
    #[builder(default)]
    pub params: IndexMap<String, i64>,
    #[builder(default)]
    pub recommended_client_protocols: BTreeMap<String, SupportedProtocolVersion>,
    #[builder(default)]
    pub recommended_relay_protocols: BTreeMap<String, SupportedProtocolVersion>,
    #[builder(default)]
    pub required_client_protocols: BTreeMap<String, SupportedProtocolVersion>,
    #[builder(default)]
    pub required_relay_protocols: BTreeMap<String, SupportedProtocolVersion>,
    #[builder(default)]
    pub shared_rand_previous: Option<SharedRandomValue>,
    #[builder(default)]
    pub shared_rand_current: Option<SharedRandomValue>,
    /// Contributing authorities in declaration order, by identity.
    pub dir_sources: IndexMap<Fingerprint, DirSourceEntry>,
    /// Status entries keyed by upper-case hex identity.
    pub entries: BTreeMap<String, NetworkStatusEntry>,
    #[builder(default)]
    pub bandwidth_weights: Option<IndexMap<String, i64>>,
    pub signatures: Vec<DirectorySignature>,
    /// Over `network-status-version` up to and including the first
    /// `directory-signature ` (keyword plus space).
    pub digest_sha1: Digest,
    pub digest_sha256: Digest,
    /// Unknown lines of the header, footer and signature sections.
    #[builder(default)]
    pub unrecognized_lines: Vec<String>,
}

impl NetworkStatus {
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<NetworkStatus> {
        Self::parse(RawBytes::copy_from(bytes.as_ref()))
    }

    pub fn parse(raw: RawBytes) -> Result<NetworkStatus> {
        let doc = Document::parse(raw.as_bytes())?;
        let first = doc.first_item();
        if first.keyword != "network-status-version" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "network-status",
                found: first.keyword.to_string(),
            });
        }
        let flavor = match first.split_arguments()?[..] {
            ["3"] => ConsensusFlavor::Ns,
            ["3", flavor] => ConsensusFlavor::from_str(flavor).map_err(|_| {
                DocumentParseError::UnsupportedVersion {
                    raw: first.args_str().to_string(),
                }
            })?,
            _ => {
                return Err(DocumentParseError::UnsupportedVersion {
                    raw: first.args_str().to_string(),
                })
            }
        };

        let mut asm = Assembler::new(&raw, flavor);
        asm.seen.insert(first.keyword);
        for item in doc.items.iter().skip(1) {
            asm.push(item)?;
        }
        let mut status = asm.finish()?;

        let [sha1, sha256]: [Digest; 2] = digest::digest_many(
            raw.as_bytes(),
            "network-status-version",
            SpanEnd::AfterKeyword("directory-signature"),
            &[DigestAlgorithm::Sha1, DigestAlgorithm::Sha256],
        )?
        .try_into()
        .map_err(|_| DocumentParseError::Incomplete("digests".to_string()))?;
        status.digest_sha1(sha1);
        status.digest_sha256(sha256);
        status.annotations(doc.annotation_lines());
        status.flavor(flavor);
        status.raw(raw);

        status
            .build()
            .map_err(|e| DocumentParseError::Incomplete(e.to_string()))
    }

    pub fn is_vote(&self) -> bool {
        self.vote_status == VoteStatus::Vote
    }

    pub fn is_consensus(&self) -> bool {
        self.vote_status == VoteStatus::Consensus
    }

    /// The consensus method in effect, defaulting to 1.
    pub fn effective_consensus_method(&self) -> u32 {
        self.consensus_method.unwrap_or(1)
    }

    /// Look up a status entry by hex identity, in either case.
    pub fn entry(&self, fingerprint: &str) -> Option<&NetworkStatusEntry> {
        self.entries.get(&fingerprint.to_uppercase())
    }

    /// The authority that made `signature`.
    pub fn signing_authority(&self, signature: &DirectorySignature) -> Option<&DirSourceEntry> {
        self.dir_sources.get(&signature.identity)
    }

    /// Every unrecognized line of the document, including those attached to
    /// authority blocks and status entries.
    pub fn all_unrecognized_lines(&self) -> Vec<String> {
        let mut lines = self.unrecognized_lines.clone();
        for source in self.dir_sources.values() {
            lines.extend(source.unrecognized_lines.iter().cloned());
            if let Some(cert) = &source.key_certificate {
                lines.extend(cert.unrecognized_lines.iter().cloned());
            }
        }
        for entry in self.entries.values() {
            lines.extend(entry.unrecognized_lines.iter().cloned());
        }
        lines
    }
}

/// State of a network status being read item by item.
struct Assembler<'r, 'a> {
    raw: &'r RawBytes,
    flavor: ConsensusFlavor,
    section: Section,
    status: NetworkStatusBuilder,
    seen: HashSet<&'a str>,
    vote_status: Option<VoteStatus>,
    consensus_method: Option<u32>,
    known_flags: BTreeSet<String>,
    unrecognized: Vec<String>,

    dir_sources: IndexMap<Fingerprint, DirSourceEntry>,
    dir_source: Option<DirSourceEntry>,
    /// Offset of the `dir-key-certificate-version` line of a vote's
    /// embedded certificate while we are inside it.
    cert_start: Option<usize>,

    entries: BTreeMap<String, NetworkStatusEntry>,
    entry: Option<EntryAssembler>,
    unknown_flags: BTreeSet<String>,

    bandwidth_weights: Option<IndexMap<String, i64>>,
    signatures: Vec<DirectorySignature>,
}

impl<'r, 'a> Assembler<'r, 'a> {
    fn new(raw: &'r RawBytes, flavor: ConsensusFlavor) -> Self {
        Assembler {
            raw,
            flavor,
            section: Section::Header,
            status: NetworkStatusBuilder::default(),
            seen: HashSet::new(),
            vote_status: None,
            consensus_method: None,
            known_flags: BTreeSet::new(),
            unrecognized: Vec::new(),
            dir_sources: IndexMap::new(),
            dir_source: None,
            cert_start: None,
            entries: BTreeMap::new(),
            entry: None,
            unknown_flags: BTreeSet::new(),
            bandwidth_weights: None,
            signatures: Vec::new(),
        }
    }

    fn push(&mut self, item: &Item<'a>) -> Result<()> {
        let next = self.section.of(item.keyword);
        if next < self.section {
            return Err(DocumentParseError::UnexpectedSection {
                keyword: item.keyword.to_string(),
                section: self.section.into(),
            });
        }
        if next > self.section {
            self.close_section()?;
            self.section = next;
        }
        match self.section {
            Section::Header => self.header_item(item),
            Section::DirSources => self.dir_source_item(item),
            Section::Entries => self.entry_item(item),
            Section::Footer => self.footer_item(item),
            Section::Signatures => self.signature_item(item),
        }
    }

    fn close_section(&mut self) -> Result<()> {
        match self.section {
            Section::Header => {
                for keyword in HEADER_REQUIRED.iter() {
                    if !self.seen.contains(keyword) {
                        return Err(DocumentParseError::MissingItem { keyword: *keyword });
                    }
                }
            }
            Section::DirSources => self.close_dir_source()?,
            Section::Entries => self.close_entry()?,
            Section::Footer | Section::Signatures => {}
        }
        Ok(())
    }

    fn header_item(&mut self, item: &Item<'a>) -> Result<()> {
        if HEADER_AT_MOST_ONCE.contains(item.keyword) && !self.seen.insert(item.keyword) {
            return Err(DocumentParseError::DuplicateItem {
                keyword: item.keyword.to_string(),
            });
        }
        let status = &mut self.status;
        match item.keyword {
            "vote-status" => {
                let arg = item.get_argument()?;
                let vote_status = VoteStatus::from_str(arg)
                    .map_err(|_| DocumentParseError::ValueParseError(arg.to_string()))?;
                status.vote_status(vote_status);
                self.vote_status = Some(vote_status);
            }
            "consensus-methods" => {
                let methods = item
                    .split_arguments()?
                    .into_iter()
                    .map(|m| decode::parse_int::<u32>(m, "consensus-methods"))
                    .collect::<Result<Vec<_>>>()?;
                status.consensus_methods(methods);
            }
            "consensus-method" => {
                let method = decode::parse_int::<u32>(item.required_arg(0)?, "consensus-method")?;
                status.consensus_method(Some(method));
                self.consensus_method = Some(method);
            }
            "published" => {
                status.published(Some(decode::timestamp_arg(item, 0)?));
            }
            "valid-after" => {
                status.valid_after(decode::timestamp_arg(item, 0)?);
            }
            "fresh-until" => {
                status.fresh_until(decode::timestamp_arg(item, 0)?);
            }
            "valid-until" => {
                status.valid_until(decode::timestamp_arg(item, 0)?);
            }
            "voting-delay" => {
                let splits = item.split_arguments()?;
                match splits[..] {
                    [vote, dist, ..] => {
                        status.voting_delay(Some((
                            decode::parse_int(vote, "vote delay")?,
                            decode::parse_int(dist, "dist delay")?,
                        )));
                    }
                    _ => return Err(DocumentParseError::args_missing(item.keyword)),
                }
            }
            "client-versions" => {
                status.client_versions(comma_list(item));
            }
            "server-versions" => {
                status.server_versions(comma_list(item));
            }
            "package" => {
                status
                    .packages
                    .get_or_insert_with(Vec::new)
                    .push(item.args_str().to_string());
            }
            "known-flags" => {
                let flags = decode::parse_flags(item.args());
                self.known_flags = flags.clone();
                status.known_flags(flags);
            }
            "flag-thresholds" => {
                status.flag_thresholds(decode::parse_ordered_map(item.args())?);
            }
            "params" => {
                status.params(decode::parse_ordered_map(item.args())?);
            }
            "recommended-client-protocols" => {
                status.recommended_client_protocols(decode::parse_protocols(item.args())?);
            }
            "recommended-relay-protocols" => {
                status.recommended_relay_protocols(decode::parse_protocols(item.args())?);
            }
            "required-client-protocols" => {
                status.required_client_protocols(decode::parse_protocols(item.args())?);
            }
            "required-relay-protocols" => {
                status.required_relay_protocols(decode::parse_protocols(item.args())?);
            }
            "shared-rand-previous-value" => {
                status.shared_rand_previous(Some(SharedRandomValue::from_item(item)?));
            }
            "shared-rand-current-value" => {
                status.shared_rand_current(Some(SharedRandomValue::from_item(item)?));
            }
            _ => self.unrecognized.push(item.verbatim()),
        }
        Ok(())
    }

    fn dir_source_item(&mut self, item: &Item<'a>) -> Result<()> {
        if item.keyword == "dir-source" {
            self.close_dir_source()?;
            self.dir_source = Some(DirSourceEntry::from_item(item)?);
            return Ok(());
        }
        let source = self
            .dir_source
            .as_mut()
            .ok_or_else(|| DocumentParseError::UnexpectedKeyword {
                keyword: item.keyword.to_string(),
            })?;

        // Inside an embedded key certificate, which is parsed as a whole
        // once its certification item has been seen.
        if let Some(start) = self.cert_start {
            if item.keyword == "dir-key-certification" {
                let span = RawSpan::new(start, item.span().end() - start);
                let cert_raw = self.raw.sub(span).ok_or_else(|| {
                    DocumentParseError::ContentRangeNotFound {
                        from: "dir-key-certificate-version".to_string(),
                        to: "dir-key-certification".to_string(),
                    }
                })?;
                source.key_certificate = Some(DirKeyCertificate::parse(cert_raw)?);
                self.cert_start = None;
            }
            return Ok(());
        }

        match item.keyword {
            "contact" => source.contact = Some(item.args_str().to_string()),
            "vote-digest" => {
                source.vote_digest = Some(Digest::from_hex(
                    DigestAlgorithm::Sha1,
                    item.get_argument()?,
                )?)
            }
            "legacy-dir-key" => {
                source.legacy_dir_key = Some(Fingerprint::from_str_hex(item.get_argument()?)?)
            }
            "shared-rand-participate" => source.shared_rand_participate = true,
            "shared-rand-commit" => source
                .shared_rand_commits
                .push(item.args_str().to_string()),
            "shared-rand-previous-value" => {
                source.shared_rand_previous = Some(SharedRandomValue::from_item(item)?)
            }
            "shared-rand-current-value" => {
                source.shared_rand_current = Some(SharedRandomValue::from_item(item)?)
            }
            "dir-key-certificate-version" => self.cert_start = Some(item.span().offset()),
            _ => source.unrecognized_lines.push(item.verbatim()),
        }
        Ok(())
    }

    fn close_dir_source(&mut self) -> Result<()> {
        if self.cert_start.is_some() {
            return Err(DocumentParseError::MissingItem {
                keyword: "dir-key-certification",
            });
        }
        if let Some(source) = self.dir_source.take() {
            if self.dir_sources.contains_key(&source.identity) {
                return Err(DocumentParseError::DuplicateItem {
                    keyword: format!("dir-source {}", source.identity),
                });
            }
            self.dir_sources.insert(source.identity, source);
        }
        Ok(())
    }

    fn entry_item(&mut self, item: &Item<'a>) -> Result<()> {
        if item.keyword == "r" {
            self.close_entry()?;
            self.entry = Some(EntryAssembler::open(item, self.flavor)?);
            return Ok(());
        }
        self.entry
            .as_mut()
            .ok_or_else(|| DocumentParseError::UnexpectedKeyword {
                keyword: item.keyword.to_string(),
            })?
            .add(item)
    }

    fn close_entry(&mut self) -> Result<()> {
        let entry = match self.entry.take() {
            Some(asm) => asm.finish()?,
            None => return Ok(()),
        };
        for flag in entry.flags.difference(&self.known_flags) {
            self.unknown_flags.insert(flag.clone());
        }
        let key = entry.fingerprint();
        if self.entries.contains_key(&key) {
            return Err(DocumentParseError::DuplicateEntry { identity: key });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    fn footer_item(&mut self, item: &Item<'a>) -> Result<()> {
        match item.keyword {
            "directory-footer" => {
                if !self.seen.insert(item.keyword) {
                    return Err(DocumentParseError::DuplicateItem {
                        keyword: item.keyword.to_string(),
                    });
                }
            }
            "bandwidth-weights" => {
                if self.bandwidth_weights.is_some() {
                    return Err(DocumentParseError::DuplicateItem {
                        keyword: item.keyword.to_string(),
                    });
                }
                let weights = decode::parse_ordered_map::<i64, _>(item.args())
                    .map_err(|_| DocumentParseError::MalformedConsensusWeights)?;
                self.bandwidth_weights = Some(weights);
            }
            _ => self.unrecognized.push(item.verbatim()),
        }
        Ok(())
    }

    fn signature_item(&mut self, item: &Item<'a>) -> Result<()> {
        if item.keyword != "directory-signature" {
            self.unrecognized.push(item.verbatim());
            return Ok(());
        }
        let signature = DirectorySignature::from_item(item)?;
        if !self.dir_sources.contains_key(&signature.identity) {
            return Err(DocumentParseError::UnknownSigningAuthority {
                identity: signature.identity.to_hex_upper(),
            });
        }
        self.signatures.push(signature);
        Ok(())
    }

    /// Check the cross-section constraints and hand back the builder with
    /// everything but the digests, annotations, flavor and raw bytes set.
    fn finish(mut self) -> Result<NetworkStatusBuilder> {
        if self.section != Section::Signatures || self.signatures.is_empty() {
            if self.section == Section::Header {
                self.close_section()?;
            }
            return Err(DocumentParseError::TruncatedDocument {
                section: self.section.into(),
            });
        }

        match self.vote_status {
            Some(VoteStatus::Vote) if self.bandwidth_weights.is_some() => {
                return Err(DocumentParseError::UnexpectedKeyword {
                    keyword: "bandwidth-weights".to_string(),
                });
            }
            Some(VoteStatus::Consensus) if self.bandwidth_weights.is_none() => {
                let method = self.consensus_method.unwrap_or(1);
                if method >= BANDWIDTH_WEIGHTS_SINCE_METHOD {
                    return Err(DocumentParseError::InconsistentConsensusMethod {
                        keyword: "bandwidth-weights",
                        method,
                    });
                }
            }
            _ => {}
        }

        if !self.unknown_flags.is_empty() {
            warn!(
                "status entries carry flags not listed in known-flags: {}",
                self.unknown_flags
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }
        debug!(
            "assembled network status with {} authorities, {} entries and {} signatures",
            self.dir_sources.len(),
            self.entries.len(),
            self.signatures.len()
        );

        let mut status = self.status;
        status.dir_sources(self.dir_sources);
        status.entries(self.entries);
        status.bandwidth_weights(self.bandwidth_weights);
        status.signatures(self.signatures);
        status.unrecognized_lines(self.unrecognized);
        Ok(status)
    }
}

/// Split a comma-separated list argument such as `client-versions`.
fn comma_list(item: &Item<'_>) -> Vec<String> {
    item.args_str()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
