//! Extra-info descriptors (`@type extra-info`, `@type bridge-extra-info`)

use std::collections::BTreeMap;

use crate::decode::{self, BandwidthHistory, StatsInterval};
use crate::digest::{self, Digest, DigestAlgorithm, SpanEnd};
use crate::error::{DocumentParseError, Result};
use crate::meta::{Document, Fingerprint, Item, RawBytes};

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use indexmap::IndexMap;
use log::debug;
use phf::phf_set;

/// Keywords that may appear at most once in an extra-info descriptor.
static AT_MOST_ONCE: phf::Set<&'static str> = phf_set! {
    "extra-info", "published", "read-history", "write-history",
    "dirreq-read-history", "dirreq-write-history", "geoip-db-digest",
    "geoip6-db-digest", "dirreq-stats-end", "dirreq-v3-ips", "dirreq-v3-reqs",
    "dirreq-v3-resp", "entry-stats-end", "entry-ips", "exit-stats-end",
    "exit-kbytes-written", "exit-kbytes-read", "exit-streams-opened",
    "bridge-stats-end", "bridge-ips", "bridge-ip-versions", "bridge-ip-transports",
    "hidserv-stats-end", "hidserv-rend-relayed-cells", "hidserv-dir-onions-seen",
    "hidserv-v3-stats-end", "hidserv-rend-v3-relayed-cells", "hidserv-dir-v3-onions-seen",
    "ipv6-read-history", "ipv6-write-history", "master-key-ed25519", "router-sig-ed25519",
    "router-signature", "router-digest", "router-digest-sha256",
};

/// Relay or bridge statistics published alongside a server descriptor.
///
/// Statistics tables that were not reported are empty maps.
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct ExtraInfoDescriptor {
    pub raw: RawBytes,
    #[builder(default)]
    pub annotations: Vec<String>,
    #[builder(default)]
    pub is_bridge: bool,
    pub nickname: String,
    pub fingerprint: Fingerprint,
    pub published: DateTime<Utc>,
    #[builder(default)]
    pub identity_ed25519: Option<String>,
    #[builder(default)]
    pub master_key_ed25519: Option<String>,
    #[builder(default)]
    pub read_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub write_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub ipv6_read_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub ipv6_write_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub dirreq_read_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub dirreq_write_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub geoip_db_digest: Option<Digest>,
    #[builder(default)]
    pub geoip6_db_digest: Option<Digest>,
    #[builder(default)]
    pub dirreq_stats_end: Option<StatsInterval>,
    #[builder(default)]
    pub dirreq_v3_ips: BTreeMap<String, i64>,
    #[builder(default)]
    pub dirreq_v3_reqs: BTreeMap<String, i64>,
    #[builder(default)]
    pub dirreq_v3_resp: BTreeMap<String, i64>,
    #[builder(default)]
    pub entry_stats_end: Option<StatsInterval>,
    #[builder(default)]
    pub entry_ips: BTreeMap<String, i64>,
    #[builder(default)]
    pub exit_stats_end: Option<StatsInterval>,
    #[builder(default)]
    pub exit_kbytes_written: BTreeMap<String, i64>,
    #[builder(default)]
    pub exit_kbytes_read: BTreeMap<String, i64>,
    #[builder(default)]
    pub exit_streams_opened: BTreeMap<String, i64>,
    #[builder(default)]
    pub bridge_stats_end: Option<StatsInterval>,
    #[builder(default)]
    pub bridge_ips: BTreeMap<String, i64>,
    #[builder(default)]
    pub bridge_ip_versions: BTreeMap<String, i64>,
    #[builder(default)]
    pub bridge_ip_transports: BTreeMap<String, i64>,
    /// `transport` lines as written (name, and for relays address and
    /// arguments).
    #[builder(setter(custom), default)]
    pub transports: Vec<String>,
    #[builder(default)]
    pub hidserv_stats_end: Option<StatsInterval>,
    /// Obfuscated counts, which may legitimately be negative.
    #[builder(default)]
    pub hidserv_rend_relayed_cells: Option<i64>,
    #[builder(default)]
    pub hidserv_dir_onions_seen: Option<i64>,
    #[builder(default)]
    pub hidserv_v3_stats_end: Option<StatsInterval>,
    #[builder(default)]
    pub hidserv_rend_v3_relayed_cells: Option<i64>,
    #[builder(default)]
    pub hidserv_dir_v3_onions_seen: Option<i64>,
    /// Known statistics that are kept undecoded (cell, connection, padding
    /// and v2 directory statistics): keyword to arguments, in document order.
    #[builder(setter(custom), default)]
    pub other_statistics: IndexMap<String, String>,
    #[builder(default)]
    pub router_sig_ed25519: Option<String>,
    #[builder(default)]
    pub router_signature: Option<String>,
    pub digest_sha1: Digest,
    #[builder(default)]
    pub digest_sha256: Option<Digest>,
    #[builder(setter(custom), default)]
    pub unrecognized_lines: Vec<String>,
}

impl ExtraInfoDescriptorBuilder {
    fn add_transport(&mut self, transport: String) {
        self.transports.get_or_insert_with(Vec::new).push(transport);
    }

    fn add_other_statistic(&mut self, item: &Item<'_>) {
        self.other_statistics
            .get_or_insert_with(IndexMap::new)
            .entry(item.keyword.to_string())
            .or_insert_with(|| item.args_str().to_string());
    }

    fn add_unrecognized_line(&mut self, line: String) {
        self.unrecognized_lines
            .get_or_insert_with(Vec::new)
            .push(line);
    }
}

/// The leading number of a `hidserv-*` line; the `k=v` tail describes how
/// it was obfuscated.
fn hidserv_count(item: &Item<'_>) -> Result<i64> {
    decode::parse_int(item.required_arg(0)?, item.keyword)
}

impl ExtraInfoDescriptor {
    pub fn from_bytes(raw: impl AsRef<[u8]>) -> Result<ExtraInfoDescriptor> {
        Self::parse(RawBytes::copy_from(raw.as_ref()), false)
    }

    pub fn parse(raw: RawBytes, is_bridge: bool) -> Result<ExtraInfoDescriptor> {
        let doc = Document::parse(raw.as_bytes())?;
        if doc.first_item().keyword != "extra-info" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "extra-info",
                found: doc.first_item().keyword.to_string(),
            });
        }

        let mut builder = ExtraInfoDescriptorBuilder::default();
        builder.annotations(doc.annotation_lines());
        builder.is_bridge(is_bridge);

        let mut seen = std::collections::HashSet::new();
        let mut sanitized_sha1 = None;
        let mut sanitized_sha256 = None;

        for item in doc.items.iter() {
            if AT_MOST_ONCE.contains(item.keyword) && !seen.insert(item.keyword) {
                return Err(DocumentParseError::DuplicateItem {
                    keyword: item.keyword.to_string(),
                });
            }
            match item.keyword {
                "extra-info" => {
                    let splits = item.split_arguments()?;
                    match splits[..] {
                        [nickname, fingerprint, ..] => {
                            builder.nickname(nickname.to_string());
                            builder.fingerprint(Fingerprint::from_str_hex(fingerprint)?);
                        }
                        _ => return Err(DocumentParseError::args_missing(item.keyword)),
                    }
                }
                "published" => {
                    builder.published(decode::timestamp_arg(item, 0)?);
                }
                "identity-ed25519" => {
                    builder.identity_ed25519(Some(item.object_data()?));
                }
                "master-key-ed25519" => {
                    builder.master_key_ed25519(Some(item.required_arg(0)?.to_string()));
                }
                "router-sig-ed25519" => {
                    builder.router_sig_ed25519(Some(item.required_arg(0)?.to_string()));
                }
                "ipv6-read-history" => {
                    builder.ipv6_read_history(Some(BandwidthHistory::from_item(item)?));
                }
                "ipv6-write-history" => {
                    builder.ipv6_write_history(Some(BandwidthHistory::from_item(item)?));
                }
                "read-history" => {
                    builder.read_history(Some(BandwidthHistory::from_item(item)?));
                }
                "write-history" => {
                    builder.write_history(Some(BandwidthHistory::from_item(item)?));
                }
                "dirreq-read-history" => {
                    builder.dirreq_read_history(Some(BandwidthHistory::from_item(item)?));
                }
                "dirreq-write-history" => {
                    builder.dirreq_write_history(Some(BandwidthHistory::from_item(item)?));
                }
                "geoip-db-digest" => {
                    builder.geoip_db_digest(Some(Digest::from_hex(
                        DigestAlgorithm::Sha1,
                        item.required_arg(0)?,
                    )?));
                }
                "geoip6-db-digest" => {
                    builder.geoip6_db_digest(Some(Digest::from_hex(
                        DigestAlgorithm::Sha1,
                        item.required_arg(0)?,
                    )?));
                }
                "dirreq-stats-end" => {
                    builder.dirreq_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "dirreq-v3-ips" => {
                    builder.dirreq_v3_ips(decode::sorted_map_arg(item)?);
                }
                "dirreq-v3-reqs" => {
                    builder.dirreq_v3_reqs(decode::sorted_map_arg(item)?);
                }
                "dirreq-v3-resp" => {
                    builder.dirreq_v3_resp(decode::sorted_map_arg(item)?);
                }
                "entry-stats-end" => {
                    builder.entry_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "entry-ips" => {
                    builder.entry_ips(decode::sorted_map_arg(item)?);
                }
                "exit-stats-end" => {
                    builder.exit_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "exit-kbytes-written" => {
                    builder.exit_kbytes_written(decode::sorted_map_arg(item)?);
                }
                "exit-kbytes-read" => {
                    builder.exit_kbytes_read(decode::sorted_map_arg(item)?);
                }
                "exit-streams-opened" => {
                    builder.exit_streams_opened(decode::sorted_map_arg(item)?);
                }
                "bridge-stats-end" => {
                    builder.bridge_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "bridge-ips" => {
                    builder.bridge_ips(decode::sorted_map_arg(item)?);
                }
                "bridge-ip-versions" => {
                    builder.bridge_ip_versions(decode::sorted_map_arg(item)?);
                }
                "bridge-ip-transports" => {
                    builder.bridge_ip_transports(decode::sorted_map_arg(item)?);
                }
                "transport" => {
                    builder.add_transport(item.get_argument()?.to_string());
                }
                "hidserv-stats-end" => {
                    builder.hidserv_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "hidserv-rend-relayed-cells" => {
                    builder.hidserv_rend_relayed_cells(Some(hidserv_count(item)?));
                }
                "hidserv-dir-onions-seen" => {
                    builder.hidserv_dir_onions_seen(Some(hidserv_count(item)?));
                }
                "hidserv-v3-stats-end" => {
                    builder.hidserv_v3_stats_end(Some(StatsInterval::from_item(item)?));
                }
                "hidserv-rend-v3-relayed-cells" => {
                    builder.hidserv_rend_v3_relayed_cells(Some(hidserv_count(item)?));
                }
                "hidserv-dir-v3-onions-seen" => {
                    builder.hidserv_dir_v3_onions_seen(Some(hidserv_count(item)?));
                }
                "router-signature" => {
                    builder.router_signature(Some(item.object_data()?));
                }
                "router-digest" => {
                    sanitized_sha1 = Some(Digest::from_hex(
                        DigestAlgorithm::Sha1,
                        item.required_arg(0)?,
                    )?);
                }
                "router-digest-sha256" => {
                    sanitized_sha256 = Some(Digest::from_base64(
                        DigestAlgorithm::Sha256,
                        item.required_arg(0)?,
                    )?);
                }
                "padding-counts" | "geoip-start-time" | "geoip-client-origins"
                | "cell-stats-end" | "cell-processed-cells" | "cell-queued-cells"
                | "cell-time-in-queue" | "cell-circuits-per-decile" | "conn-bi-direct"
                | "ipv6-conn-bi-direct" | "dirreq-v3-direct-dl" | "dirreq-v3-tunneled-dl"
                | "dirreq-v2-ips" | "dirreq-v2-reqs" | "dirreq-v2-resp" | "dirreq-v2-share"
                | "dirreq-v3-share" | "dirreq-v2-direct-dl" | "dirreq-v2-tunneled-dl"
                | "exit-kbytes-written-v6" => builder.add_other_statistic(item),
                _ => {
                    debug!("unrecognized line in extra-info descriptor: {}", item.keyword);
                    builder.add_unrecognized_line(item.verbatim());
                }
            }
        }

        let bytes = raw.as_bytes();
        let digest_sha1 = match sanitized_sha1 {
            Some(d) => d,
            None => digest::digest(
                bytes,
                DigestAlgorithm::Sha1,
                "extra-info",
                Some("router-signature"),
            )?,
        };
        let digest_sha256 = match sanitized_sha256 {
            Some(d) => Some(d),
            None => digest::find_span(bytes, "extra-info", SpanEnd::ThroughObject("router-signature"))
                .ok()
                .map(|span| digest::digest_range(bytes, span, DigestAlgorithm::Sha256))
                .transpose()?,
        };
        builder.digest_sha1(digest_sha1);
        builder.digest_sha256(digest_sha256);
        builder.raw(raw);

        builder
            .build()
            .map_err(|e| DocumentParseError::Incomplete(e.to_string()))
    }
}
