//! Tor server descriptor documents

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::consensus::CondensedExitPolicy;
use crate::decode::{self, BandwidthHistory, SupportedProtocolVersion, ABSENT};
use crate::digest::{self, Digest, DigestAlgorithm, SpanEnd};
use crate::error::{DocumentParseError, ErrorContext, Result};
use crate::meta::{Document, Fingerprint, RawBytes};

mod exit;
pub use exit::{
    DescriptorExitPolicy, DescriptorExitPolicyRule, ExitPolicyAddress, ExitPolicyPort,
    ExitPortRange,
};

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use log::debug;
use phf::phf_set;

/// Keywords that may appear at most once in a server descriptor.
static AT_MOST_ONCE: phf::Set<&'static str> = phf_set! {
    "router", "bandwidth", "platform", "published", "fingerprint", "hibernating",
    "uptime", "onion-key", "ntor-onion-key", "signing-key", "contact",
    "family", "read-history", "write-history", "extra-info-digest",
    "router-signature", "router-digest", "router-digest-sha256",
    "master-key-ed25519", "identity-ed25519", "ipv6-policy", "proto",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyMember {
    Fingerprint(Fingerprint),
    Nickname(String),
}

impl FromStr for FamilyMember {
    type Err = DocumentParseError;

    /// Parse `$FINGERPRINT`, `$FINGERPRINT=nick`, `$FINGERPRINT~nick` or a
    /// bare nickname.
    fn from_str(s: &str) -> Result<Self> {
        match s.strip_prefix('$') {
            Some(rest) => {
                let hex = rest.split(|c| c == '=' || c == '~').next().unwrap_or(rest);
                Ok(FamilyMember::Fingerprint(Fingerprint::from_str_hex(hex)?))
            }
            None => Ok(FamilyMember::Nickname(s.to_string())),
        }
    }
}

/// A relay or bridge server descriptor.
///
/// Numeric fields that a descriptor may omit hold [`ABSENT`] (`-1`) when
/// they were not reported, which is distinct from a reported zero.
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct ServerDescriptor {
    pub raw: RawBytes,
    #[builder(default)]
    pub annotations: Vec<String>,
    /// True if this descriptor was published by a bridge.
    #[builder(default)]
    pub is_bridge: bool,
    pub nickname: String,
    pub address: IpAddr,
    pub or_port: u16,
    pub socks_port: u16,
    pub dir_port: u16,
    /// Additional OR addresses from `or-address` lines, in declaration order.
    #[builder(setter(custom), default)]
    pub or_addresses: Vec<SocketAddr>,
    #[builder(default)]
    pub platform: Option<String>,
    #[builder(default)]
    pub protocols: BTreeMap<String, SupportedProtocolVersion>,
    pub published: DateTime<Utc>,
    #[builder(default)]
    pub fingerprint: Option<Fingerprint>,
    #[builder(default)]
    pub hibernating: bool,
    #[builder(default = "ABSENT")]
    pub uptime: i64,
    #[builder(default = "ABSENT")]
    pub bandwidth_rate: i64,
    #[builder(default = "ABSENT")]
    pub bandwidth_burst: i64,
    #[builder(default = "ABSENT")]
    pub bandwidth_observed: i64,
    #[builder(default)]
    pub extra_info_digest: Option<Digest>,
    #[builder(default)]
    pub extra_info_digest_sha256: Option<Digest>,
    #[builder(default)]
    pub family_members: Vec<FamilyMember>,
    #[builder(default)]
    pub contact: Option<String>,
    #[builder(default)]
    pub caches_extra_info: bool,
    #[builder(default)]
    pub tunnelled_dir_server: bool,
    #[builder(default)]
    pub hidden_service_dir: bool,
    #[builder(default)]
    pub onion_key: Option<String>,
    #[builder(default)]
    pub signing_key: Option<String>,
    #[builder(default)]
    pub ntor_onion_key: Option<String>,
    #[builder(default)]
    pub identity_ed25519: Option<String>,
    #[builder(default)]
    pub master_key_ed25519: Option<String>,
    #[builder(default)]
    pub router_signature: Option<String>,
    #[builder(setter(custom), default)]
    pub exit_policy: DescriptorExitPolicy,
    /// A missing `ipv6-policy` line means "reject 1-65535".
    #[builder(default = "CondensedExitPolicy::reject_all()")]
    pub exit_policy_ipv6: CondensedExitPolicy,
    #[builder(default)]
    pub read_history: Option<BandwidthHistory>,
    #[builder(default)]
    pub write_history: Option<BandwidthHistory>,
    pub digest_sha1: Digest,
    #[builder(default)]
    pub digest_sha256: Option<Digest>,
    #[builder(setter(custom), default)]
    pub unrecognized_lines: Vec<String>,
}

impl ServerDescriptorBuilder {
    fn add_or_address(&mut self, or: SocketAddr) {
        self.or_addresses.get_or_insert_with(Vec::new).push(or);
    }

    fn add_exit_policy_rule(&mut self, epr: DescriptorExitPolicyRule) {
        self.exit_policy
            .get_or_insert_with(DescriptorExitPolicy::default)
            .add_rule(epr);
    }

    fn add_unrecognized_line(&mut self, line: String) {
        self.unrecognized_lines
            .get_or_insert_with(Vec::new)
            .push(line);
    }
}

impl ServerDescriptor {
    /// Parse a relay descriptor from raw bytes (which are copied).
    pub fn from_bytes(raw: impl AsRef<[u8]>) -> Result<ServerDescriptor> {
        Self::parse(RawBytes::copy_from(raw.as_ref()), false)
    }

    /// Parse the descriptor held in `raw`.
    pub fn parse(raw: RawBytes, is_bridge: bool) -> Result<ServerDescriptor> {
        let doc = Document::parse(raw.as_bytes())?;
        if doc.first_item().keyword != "router" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "server-descriptor",
                found: doc.first_item().keyword.to_string(),
            });
        }

        let mut builder = ServerDescriptorBuilder::default();
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
                "router" => {
                    let splits = item.split_arguments()?;
                    match splits[..] {
                        // nickname address ORPort SOCKSPort DirPort
                        [nickname, ip, or_port, socks_port, dir_port, ..] => {
                            builder.nickname(nickname.to_string());
                            builder.address(IpAddr::from_str(ip).map_err(|_| {
                                DocumentParseError::InvalidIpAddress(ip.to_string())
                            })?);
                            builder.or_port(or_port.parse::<u16>().context("OR port")?);
                            builder.socks_port(socks_port.parse::<u16>().context("SOCKS port")?);
                            builder.dir_port(dir_port.parse::<u16>().context("dir port")?);
                        }
                        _ => return Err(DocumentParseError::args_missing(item.keyword)),
                    }
                }
                "fingerprint" => {
                    let arg = item.get_argument()?;
                    builder.fingerprint(Some(Fingerprint::from_str_hex(arg)?));
                }
                "family" => {
                    let family_members = item
                        .args()
                        .into_iter()
                        .map(FamilyMember::from_str)
                        .collect::<Result<Vec<FamilyMember>>>()?;
                    builder.family_members(family_members);
                }
                "published" => {
                    builder.published(decode::timestamp_arg(item, 0)?);
                }
                "bandwidth" => {
                    let splits = item.split_arguments()?;
                    // bandwidth-avg bandwidth-burst [bandwidth-observed]
                    match splits[..] {
                        [rate, burst, ref rest @ ..] => {
                            builder.bandwidth_rate(decode::parse_count(rate, "bandwidth rate")?);
                            builder.bandwidth_burst(decode::parse_count(burst, "bandwidth burst")?);
                            if let Some(observed) = rest.first() {
                                builder.bandwidth_observed(decode::parse_count(
                                    observed,
                                    "observed bandwidth",
                                )?);
                            }
                        }
                        _ => return Err(DocumentParseError::args_missing(item.keyword)),
                    }
                }
                "or-address" => {
                    builder.add_or_address(decode::parse_or_address(item.required_arg(0)?)?);
                }
                "platform" => {
                    builder.platform(Some(item.args_str().to_string()));
                }
                "proto" => {
                    builder.protocols(decode::parse_protocols(item.args())?);
                }
                "uptime" => {
                    builder.uptime(decode::parse_count(item.required_arg(0)?, "uptime")?);
                }
                "hibernating" => {
                    builder.hibernating(decode::parse_bool(item.required_arg(0)?, "hibernating")?);
                }
                "contact" => {
                    builder.contact(Some(item.args_str().to_string()));
                }
                "extra-info-digest" => {
                    let args = item.split_arguments()?;
                    builder.extra_info_digest(Some(Digest::from_hex(DigestAlgorithm::Sha1, args[0])?));
                    if let Some(sha256) = args.get(1) {
                        builder.extra_info_digest_sha256(Some(Digest::from_base64(
                            DigestAlgorithm::Sha256,
                            sha256,
                        )?));
                    }
                }
                "caches-extra-info" => {
                    builder.caches_extra_info(true);
                }
                "tunnelled-dir-server" => {
                    builder.tunnelled_dir_server(true);
                }
                "hidden-service-dir" => {
                    builder.hidden_service_dir(true);
                }
                "onion-key" => {
                    builder.onion_key(item.object.map(|o| o.data_joined()));
                }
                "signing-key" => {
                    builder.signing_key(Some(item.object_data()?));
                }
                "ntor-onion-key" => {
                    builder.ntor_onion_key(Some(item.required_arg(0)?.to_string()));
                }
                "identity-ed25519" => {
                    builder.identity_ed25519(Some(item.object_data()?));
                }
                "master-key-ed25519" => {
                    builder.master_key_ed25519(Some(item.required_arg(0)?.to_string()));
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
                "read-history" => {
                    builder.read_history(Some(BandwidthHistory::from_item(item)?));
                }
                "write-history" => {
                    builder.write_history(Some(BandwidthHistory::from_item(item)?));
                }
                "accept" | "reject" | "accept6" | "reject6" => {
                    exit::parse_exit_policy_rule(&mut builder, item)?;
                }
                "ipv6-policy" => {
                    builder.exit_policy_ipv6(item.get_argument()?.parse::<CondensedExitPolicy>()?);
                }
                // Items whose content we do not keep.
                "onion-key-crosscert" | "ntor-onion-key-crosscert" | "router-sig-ed25519"
                | "allow-single-hop-exits" | "eventdns" | "protocols" | "bridge-distribution-request" => {}
                _ => {
                    debug!("unrecognized line in server descriptor: {}", item.keyword);
                    builder.add_unrecognized_line(item.verbatim());
                }
            }
        }

        // Sanitized bridge descriptors carry the digests of the original
        // descriptor instead of a signature.
        let bytes = raw.as_bytes();
        let digest_sha1 = match sanitized_sha1 {
            Some(d) => d,
            None => digest::digest(
                bytes,
                DigestAlgorithm::Sha1,
                "router",
                Some("router-signature"),
            )?,
        };
        let digest_sha256 = match sanitized_sha256 {
            Some(d) => Some(d),
            None => digest::find_span(bytes, "router", SpanEnd::ThroughObject("router-signature"))
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

#[cfg(test)]
mod test {
    use super::*;

    const RELAY: &str = "\
@type server-descriptor 1.0
router moria1 128.31.0.34 9101 0 9131
identity-ed25519
-----BEGIN ED25519 CERT-----
AQQABvKJAaGlR4JZ0MJEX2rsjE1fqNh1KJyCMFpTcO7tHwtoZC/EAQAgBADKnR/C
-----END ED25519 CERT-----
master-key-ed25519 yp0fwtp4aa/VMyZJGz8vN7Km3zYet1YBZwqZEk1CwHI
or-address [2001:db8::1]:9101
platform Tor 0.4.7.10 on Linux
proto Cons=1-2 Desc=1-2 Link=1-5 Relay=1-4
published 2022-08-01 12:00:00
fingerprint 9695 DFC3 5FFE B861 329B 9F1A B04C 4639 7020 CE31
uptime 1234
bandwidth 1000 2000
extra-info-digest 0123456789ABCDEF0123456789ABCDEF01234567 ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0
caches-extra-info
onion-key
-----BEGIN RSA PUBLIC KEY-----
AAAA
-----END RSA PUBLIC KEY-----
ntor-onion-key QsC3G3zMs2szdV0Xv2jPzzT3oK2MI3Gn9sFzdRKZqgM
family $0011223344556677889900112233445566778899 friend
contact Jane Doe <jane AT example DOT org>
hidden-service-dir
reject 0.0.0.0/8:*
accept *:80-443
reject *:*
ipv6-policy accept 80,443
tor-future-feature yes
router-sig-ed25519 AAAA
router-signature
-----BEGIN SIGNATURE-----
AAAA
-----END SIGNATURE-----
";

    #[test]
    fn parse_relay() {
        let d = ServerDescriptor::from_bytes(RELAY).unwrap();
        assert_eq!(d.nickname, "moria1");
        assert_eq!(d.address, "128.31.0.34".parse::<IpAddr>().unwrap());
        assert_eq!((d.or_port, d.socks_port, d.dir_port), (9101, 0, 9131));
        assert_eq!(d.or_addresses.len(), 1);
        assert_eq!(d.or_addresses[0].port(), 9101);
        assert_eq!(d.platform.as_deref(), Some("Tor 0.4.7.10 on Linux"));
        assert!(d.protocols["Link"].supports(5));
        assert_eq!(
            d.fingerprint.unwrap().to_string(),
            "9695DFC35FFEB861329B9F1AB04C46397020CE31"
        );
        assert_eq!(d.uptime, 1234);
        assert_eq!(d.bandwidth_rate, 1000);
        assert_eq!(d.bandwidth_burst, 2000);
        assert_eq!(d.bandwidth_observed, ABSENT);
        assert_eq!(
            d.extra_info_digest.unwrap().to_hex_upper(),
            "0123456789ABCDEF0123456789ABCDEF01234567"
        );
        assert!(d.extra_info_digest_sha256.is_some());
        assert!(d.caches_extra_info);
        assert!(d.hidden_service_dir);
        assert!(!d.hibernating);
        assert_eq!(d.onion_key.as_deref(), Some("AAAA"));
        assert_eq!(d.family_members.len(), 2);
        assert_eq!(
            d.family_members[1],
            FamilyMember::Nickname("friend".to_string())
        );
        assert_eq!(d.contact.as_deref(), Some("Jane Doe <jane AT example DOT org>"));
        assert_eq!(d.exit_policy.rules.len(), 3);
        assert_eq!(d.exit_policy.rules[1].to_string(), "accept *:80-443");
        assert!(d.exit_policy_ipv6.allows_port(443));
        assert!(!d.exit_policy_ipv6.allows_port(22));
        assert_eq!(d.unrecognized_lines, vec!["tor-future-feature yes".to_string()]);
        assert_eq!(d.annotations, vec!["@type server-descriptor 1.0".to_string()]);
        assert_eq!(d.router_signature.as_deref(), Some("AAAA"));

        let start = RELAY.find("router moria1").unwrap();
        let end = RELAY.find("-----BEGIN SIGNATURE").unwrap();
        assert_eq!(
            d.digest_sha1,
            Digest::compute(DigestAlgorithm::Sha1, RELAY[start..end].as_bytes())
        );
        assert_eq!(
            d.digest_sha256,
            Some(Digest::compute(
                DigestAlgorithm::Sha256,
                RELAY[start..].as_bytes()
            ))
        );
    }

    #[test]
    fn bandwidth_sentinels() {
        let s = "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\nbandwidth 1000 2000\nrouter-signature\n";
        let d = ServerDescriptor::from_bytes(s).unwrap();
        assert_eq!(d.bandwidth_rate, 1000);
        assert_eq!(d.bandwidth_burst, 2000);
        assert_eq!(d.bandwidth_observed, -1);
        assert_eq!(d.uptime, -1);
        assert!(d.fingerprint.is_none());
        assert_eq!(d.exit_policy_ipv6, CondensedExitPolicy::reject_all());

        let s = "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\nbandwidth 0 0 0\nuptime 0\nrouter-signature\n";
        let d = ServerDescriptor::from_bytes(s).unwrap();
        assert_eq!(d.bandwidth_observed, 0);
        assert_eq!(d.uptime, 0);

        // a reported value must never read as a missing one
        for line in ["bandwidth -1 2000 3000", "bandwidth 1000 -1", "bandwidth 1 2 -1", "uptime -5"] {
            let s = format!(
                "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\n{line}\nrouter-signature\n"
            );
            let e = ServerDescriptor::from_bytes(s).unwrap_err();
            assert_eq!(e.kind(), crate::error::FailureKind::Decode, "{line}");
        }
    }

    #[test]
    fn sanitized_bridge() {
        let s = "@type bridge-server-descriptor 1.2\nrouter b 10.0.0.1 443 0 0\npublished 2022-08-01 12:00:00\nbandwidth 1 2 3\nrouter-digest 0123456789ABCDEF0123456789ABCDEF01234567\nrouter-digest-sha256 ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0\n";
        let d = ServerDescriptor::parse(RawBytes::copy_from(s.as_bytes()), true).unwrap();
        assert!(d.is_bridge);
        assert_eq!(
            d.digest_sha1.to_hex_upper(),
            "0123456789ABCDEF0123456789ABCDEF01234567"
        );
        assert_eq!(
            d.digest_sha256.unwrap().to_base64(),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0"
        );
    }

    #[test]
    fn failures() {
        use crate::error::FailureKind;

        // not numeric
        let s = "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\nbandwidth many 2000\nrouter-signature\n";
        let e = ServerDescriptor::from_bytes(s).unwrap_err();
        assert_eq!(e.kind(), FailureKind::Decode);

        // no router-signature and no router-digest
        let s = "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\n";
        let e = ServerDescriptor::from_bytes(s).unwrap_err();
        assert_eq!(e.kind(), FailureKind::DigestSpan);

        // missing published
        let s = "router a 10.0.0.1 9001 0 0\nrouter-signature\n";
        let e = ServerDescriptor::from_bytes(s).unwrap_err();
        assert!(matches!(e, DocumentParseError::Incomplete(_)));

        // duplicate
        let s = "router a 10.0.0.1 9001 0 0\npublished 2022-08-01 12:00:00\npublished 2022-08-01 12:00:00\nrouter-signature\n";
        let e = ServerDescriptor::from_bytes(s).unwrap_err();
        assert_eq!(
            e,
            DocumentParseError::DuplicateItem {
                keyword: "published".into()
            }
        );

        // wrong type
        let s = "extra-info a 0123456789ABCDEF0123456789ABCDEF01234567\n";
        let e = ServerDescriptor::from_bytes(s).unwrap_err();
        assert!(matches!(e, DocumentParseError::WrongDocumentType { .. }));
    }

    #[test]
    fn reparse_is_identical() {
        let a = ServerDescriptor::from_bytes(RELAY).unwrap();
        let b = ServerDescriptor::from_bytes(RELAY).unwrap();
        assert_eq!(a, b);
    }
}
