//! Router status entries: the per-relay blocks of a vote or consensus.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::decode::{self, SupportedProtocolVersion};
use crate::digest::{Digest, DigestAlgorithm};
use crate::error::{DocumentParseError, ErrorContext, Result};
use crate::meta::{Fingerprint, Item};

use super::ConsensusFlavor;

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use strum::{EnumString, IntoStaticStr};

/// A relay flag that this crate knows about.
///
/// Entries keep their flags as strings, so that flags introduced later
/// survive parsing; this enum is a typed view on the known ones.
#[derive(Debug, Clone, Copy, EnumString, IntoStaticStr, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flag {
    Authority,
    BadExit,
    Exit,
    Fast,
    Guard,
    HSDir,
    MiddleOnly,
    Named,
    Unnamed,
    NoEdConsensus,
    Running,
    Stable,
    StaleDesc,
    Sybil,
    V2Dir,
    Valid,
}

/// Whether an exit policy line accepts or rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicyType {
    Accept,
    Reject,
}

impl fmt::Display for ExitPolicyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitPolicyType::Accept => write!(f, "accept"),
            ExitPolicyType::Reject => write!(f, "reject"),
        }
    }
}

/// Exit port entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicyEntry {
    SinglePort(u16),
    PortRange { min: u16, max: u16 },
}

impl ExitPolicyEntry {
    pub fn iter_ports(&self) -> impl Iterator<Item = u16> {
        match *self {
            ExitPolicyEntry::SinglePort(x) => x..=x,
            ExitPolicyEntry::PortRange { min, max } => min..=max,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        match *self {
            ExitPolicyEntry::SinglePort(x) => x == port,
            ExitPolicyEntry::PortRange { min, max } => min <= port && port <= max,
        }
    }
}

impl FromStr for ExitPolicyEntry {
    type Err = DocumentParseError;

    /// Parse from "3" or "2-5".
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = |_| DocumentParseError::InvalidExitPolicyEntry { raw: s.to_string() };
        match s.split_once('-') {
            Some((min, max)) => Ok(ExitPolicyEntry::PortRange {
                min: u16::from_str(min).map_err(invalid)?,
                max: u16::from_str(max).map_err(invalid)?,
            }),
            None => Ok(ExitPolicyEntry::SinglePort(
                u16::from_str(s).map_err(invalid)?,
            )),
        }
    }
}

impl fmt::Display for ExitPolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitPolicyEntry::SinglePort(x) => write!(f, "{}", x),
            ExitPolicyEntry::PortRange { min: x, max: y } => write!(f, "{}-{}", x, y),
        }
    }
}

/// A condensed, port-only exit policy: the `p` line of an entry or the
/// `ipv6-policy` line of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondensedExitPolicy {
    pub policy_type: ExitPolicyType,
    pub entries: Vec<ExitPolicyEntry>,
}

impl CondensedExitPolicy {
    /// The policy that allows nothing: `reject 1-65535`.
    pub fn reject_all() -> Self {
        CondensedExitPolicy {
            policy_type: ExitPolicyType::Reject,
            entries: vec![ExitPolicyEntry::PortRange { min: 1, max: 65535 }],
        }
    }

    pub fn allows_port(&self, port: u16) -> bool {
        let listed = self.entries.iter().any(|e| e.contains(port));
        match self.policy_type {
            ExitPolicyType::Accept => listed,
            ExitPolicyType::Reject => !listed,
        }
    }
}

impl FromStr for CondensedExitPolicy {
    type Err = DocumentParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (cmd, ports) = s
            .split_once(' ')
            .ok_or(DocumentParseError::MalformedExitPolicy)?;
        let policy_type = match cmd {
            "accept" => ExitPolicyType::Accept,
            "reject" => ExitPolicyType::Reject,
            _ => return Err(DocumentParseError::MalformedExitPolicy),
        };
        let entries = ports
            .split(',')
            .map(|x| x.parse::<ExitPolicyEntry>())
            .collect::<Result<Vec<_>>>()?;
        Ok(CondensedExitPolicy {
            policy_type,
            entries,
        })
    }
}

impl fmt::Display for CondensedExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.policy_type,
            self.entries
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )
    }
}

/// One relay as listed in a vote or consensus.
#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct NetworkStatusEntry {
    pub nickname: String,
    pub identity: Fingerprint,
    /// SHA-1 digest of the server descriptor; absent in microdesc-flavored
    /// consensuses.
    #[builder(default)]
    pub descriptor_digest: Option<Digest>,
    pub published: DateTime<Utc>,
    pub address: IpAddr,
    pub or_port: u16,
    /// `None` if the relay has no directory port (written as 0).
    pub dir_port: Option<u16>,
    #[builder(setter(custom), default)]
    pub additional_or_addresses: Vec<SocketAddr>,
    /// Base64 SHA-256 microdescriptor digests (`m` lines).
    #[builder(setter(custom), default)]
    pub microdescriptor_digests: BTreeSet<String>,
    #[builder(default)]
    pub flags: BTreeSet<String>,
    #[builder(default)]
    pub version: Option<String>,
    #[builder(default)]
    pub protocols: BTreeMap<String, SupportedProtocolVersion>,
    #[builder(default)]
    pub bandwidth: Option<u64>,
    #[builder(default)]
    pub measured_bandwidth: Option<u64>,
    #[builder(default)]
    pub unmeasured: bool,
    #[builder(default)]
    pub exit_policy_summary: Option<CondensedExitPolicy>,
    /// Base64 ed25519 master key from an `id ed25519` line; `None` for
    /// `id ed25519 none` as well as for a missing line.
    #[builder(default)]
    pub ed25519_master_key: Option<String>,
    #[builder(setter(custom), default)]
    pub unrecognized_lines: Vec<String>,
}

impl NetworkStatusEntry {
    /// Upper-case hex identity, as used for map keys.
    pub fn fingerprint(&self) -> String {
        self.identity.to_hex_upper()
    }

    /// The flags of this entry that are known to this crate.
    pub fn known_flags(&self) -> Vec<Flag> {
        self.flags.iter().filter_map(|f| f.parse().ok()).collect()
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        let name: &'static str = flag.into();
        self.flags.contains(name)
    }
}

/// Collects the items of one entry, from its `r` line up to the next `r`
/// line or the footer.
pub(super) struct EntryAssembler {
    builder: NetworkStatusEntryBuilder,
    flavor: ConsensusFlavor,
}

impl EntryAssembler {
    /// Start a new entry from its `r` item.
    pub(super) fn open(item: &Item<'_>, flavor: ConsensusFlavor) -> Result<Self> {
        let mut relay = NetworkStatusEntryBuilder::default();
        let splits = item.split_arguments()?;
        let (nickname, identity, digest, rest) = match (flavor, &splits[..]) {
            (ConsensusFlavor::Ns, [nickname, identity, digest, rest @ ..]) => {
                (*nickname, *identity, Some(*digest), rest)
            }
            (ConsensusFlavor::Microdesc, [nickname, identity, rest @ ..]) => {
                (*nickname, *identity, None, rest)
            }
            _ => return Err(DocumentParseError::args_missing(item.keyword)),
        };
        match rest {
            [published_1, published_2, ip, or_port, dir_port, ..] => {
                relay.nickname(nickname.to_string());
                relay.identity(Fingerprint::from_str_b64(identity)?);
                if let Some(digest) = digest {
                    relay.descriptor_digest(Some(Digest::from_base64(
                        DigestAlgorithm::Sha1,
                        digest,
                    )?));
                }
                relay.published(decode::parse_timestamp(published_1, published_2)?);
                let address = IpAddr::from_str(ip)
                    .map_err(|_| DocumentParseError::InvalidIpAddress(ip.to_string()))?;
                relay.address(address);
                relay.or_port(u16::from_str(or_port).context("OR port")?);
                relay.dir_port(match u16::from_str(dir_port).context("dir port")? {
                    0 => None,
                    x => Some(x),
                });
            }
            _ => return Err(DocumentParseError::args_missing(item.keyword)),
        }
        Ok(EntryAssembler {
            builder: relay,
            flavor,
        })
    }

    /// Attach a non-`r` item to the entry.
    pub(super) fn add(&mut self, item: &Item<'_>) -> Result<()> {
        let relay = &mut self.builder;
        match item.keyword {
            "a" => {
                let addr = decode::parse_or_address(item.required_arg(0)?)?;
                relay
                    .additional_or_addresses
                    .get_or_insert_with(Vec::new)
                    .push(addr);
            }
            "s" => {
                relay.flags(decode::parse_flags(item.args()));
            }
            "v" => {
                relay.version(Some(item.args_str().to_string()));
            }
            "pr" => {
                relay.protocols(decode::parse_protocols(item.args())?);
            }
            "w" => {
                for arg in item.args() {
                    let (k, v) = arg
                        .split_once('=')
                        .ok_or(DocumentParseError::InvalidBandwidthWeight)?;
                    let parse = || {
                        v.parse::<u64>()
                            .map_err(|_| DocumentParseError::InvalidBandwidthWeight)
                    };
                    match k {
                        "Bandwidth" => {
                            relay.bandwidth(Some(parse()?));
                        }
                        "Measured" => {
                            relay.measured_bandwidth(Some(parse()?));
                        }
                        "Unmeasured" => {
                            if parse()? != 1 {
                                return Err(DocumentParseError::InvalidBandwidthWeight);
                            }
                            relay.unmeasured(true);
                        }
                        _ => {}
                    }
                }
            }
            "p" => {
                relay.exit_policy_summary(Some(item.get_argument()?.parse::<CondensedExitPolicy>()?));
            }
            "m" => {
                let args = item.split_arguments()?;
                let digests = relay
                    .microdescriptor_digests
                    .get_or_insert_with(BTreeSet::new);
                match (self.flavor, &args[..]) {
                    // microdesc consensus: "m <digest>"
                    (ConsensusFlavor::Microdesc, [digest]) => {
                        digests.insert(digest.to_string());
                    }
                    // vote: "m <methods> sha256=<digest> ..."
                    _ => {
                        for arg in args.iter().skip(1) {
                            if let Some(d) = arg.strip_prefix("sha256=") {
                                digests.insert(d.to_string());
                            }
                        }
                    }
                }
            }
            "id" => {
                let args = item.split_arguments()?;
                match args[..] {
                    ["ed25519", "none"] => {}
                    ["ed25519", key] => {
                        relay.ed25519_master_key(Some(key.to_string()));
                    }
                    _ => {
                        relay
                            .unrecognized_lines
                            .get_or_insert_with(Vec::new)
                            .push(item.verbatim());
                    }
                }
            }
            _ => {
                relay
                    .unrecognized_lines
                    .get_or_insert_with(Vec::new)
                    .push(item.verbatim());
            }
        }
        Ok(())
    }

    pub(super) fn finish(self) -> Result<NetworkStatusEntry> {
        self.builder
            .build()
            .map_err(|e| DocumentParseError::Incomplete(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::Tokenizer;

    fn entry(s: &str, flavor: ConsensusFlavor) -> Result<NetworkStatusEntry> {
        let items = Tokenizer::new(s.as_bytes()).collect::<Result<Vec<_>>>()?;
        let mut asm = EntryAssembler::open(&items[0], flavor)?;
        for item in &items[1..] {
            asm.add(item)?;
        }
        asm.finish()
    }

    #[test]
    fn ns_entry() {
        let e = entry(
            "r test000a CjBXrykQQVeU2OpDAwnZrF9dUks qZk+NkcGgWq6PiVxeFDCbJzQ2J0 2021-03-04 05:06:07 127.0.0.1 5000 7000
a [::1]:5000
s Exit Fast Running Valid
v Tor 0.4.5.6
pr Link=1-5 Relay=1-2
w Bandwidth=30 Measured=25
p accept 80,443,1000-2000
id ed25519 yp0fwtp4aa/VMyZJGz8vN7Km3zYet1YBZwqZEk1CwHI
x-something new
",
            ConsensusFlavor::Ns,
        )
        .unwrap();
        assert_eq!(e.nickname, "test000a");
        assert_eq!(e.fingerprint(), "0A3057AF2910415794D8EA430309D9AC5F5D524B");
        assert_eq!(
            e.descriptor_digest.unwrap().to_hex_lower(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(e.dir_port, Some(7000));
        assert_eq!(e.additional_or_addresses.len(), 1);
        assert!(e.has_flag(Flag::Exit));
        assert!(!e.has_flag(Flag::Guard));
        assert_eq!(
            e.known_flags(),
            vec![Flag::Exit, Flag::Fast, Flag::Running, Flag::Valid]
        );
        assert_eq!(e.version.as_deref(), Some("Tor 0.4.5.6"));
        assert!(e.protocols["Relay"].supports(2));
        assert_eq!(e.bandwidth, Some(30));
        assert_eq!(e.measured_bandwidth, Some(25));
        assert!(!e.unmeasured);
        let p = e.exit_policy_summary.as_ref().unwrap();
        assert!(p.allows_port(1500));
        assert!(!p.allows_port(22));
        assert_eq!(p.to_string(), "accept 80,443,1000-2000");
        assert!(e.ed25519_master_key.is_some());
        assert_eq!(e.unrecognized_lines, vec!["x-something new".to_string()]);
    }

    #[test]
    fn md_entry() {
        let e = entry(
            "r test000a CjBXrykQQVeU2OpDAwnZrF9dUks 2021-03-04 05:06:07 127.0.0.1 5000 0
m ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0
s
w Bandwidth=0 Unmeasured=1
id ed25519 none
",
            ConsensusFlavor::Microdesc,
        )
        .unwrap();
        assert!(e.descriptor_digest.is_none());
        assert_eq!(e.dir_port, None);
        assert!(e
            .microdescriptor_digests
            .contains("ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0"));
        assert!(e.flags.is_empty());
        assert!(e.unmeasured);
        assert_eq!(e.bandwidth, Some(0));
        assert!(e.ed25519_master_key.is_none());
        assert!(e.version.is_none());
        assert!(e.exit_policy_summary.is_none());
    }

    #[test]
    fn vote_microdesc_lines() {
        let e = entry(
            "r a CjBXrykQQVeU2OpDAwnZrF9dUks qZk+NkcGgWq6PiVxeFDCbJzQ2J0 2021-03-04 05:06:07 127.0.0.1 5000 0
m 13,14 sha256=AAAA
m 15 sha256=BBBB
",
            ConsensusFlavor::Ns,
        )
        .unwrap();
        assert_eq!(e.microdescriptor_digests.len(), 2);
    }

    #[test]
    fn bad_entries() {
        assert!(entry("r a b\n", ConsensusFlavor::Ns).is_err());
        let r = "r a CjBXrykQQVeU2OpDAwnZrF9dUks qZk+NkcGgWq6PiVxeFDCbJzQ2J0 2021-03-04 05:06:07 127.0.0.1 5000 0\n";
        assert!(entry(&format!("{r}w Bandwidth=x\n"), ConsensusFlavor::Ns).is_err());
        assert!(entry(&format!("{r}w Bandwidth=6 Unmeasured=3\n"), ConsensusFlavor::Ns).is_err());
        assert!(entry(&format!("{r}p allow 80\n"), ConsensusFlavor::Ns).is_err());
        assert!(entry(&format!("{r}a 1.2.3.4\n"), ConsensusFlavor::Ns).is_err());
        let e = entry(&format!("{r}w Mustelid=66 Bandwidth=6\n"), ConsensusFlavor::Ns).unwrap();
        assert_eq!(e.bandwidth, Some(6));
    }

    #[test]
    fn condensed_policy() {
        let p: CondensedExitPolicy = "reject 1-1024".parse().unwrap();
        assert!(!p.allows_port(80));
        assert!(p.allows_port(8080));
        assert!(!CondensedExitPolicy::reject_all().allows_port(1));
        assert!("accept".parse::<CondensedExitPolicy>().is_err());
        assert!("accept 1-x".parse::<CondensedExitPolicy>().is_err());
        assert_eq!(
            ExitPolicyEntry::PortRange { min: 5, max: 7 }
                .iter_ports()
                .collect::<Vec<_>>(),
            vec![5, 6, 7]
        );
    }
}
