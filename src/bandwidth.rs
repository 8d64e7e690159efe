//! Bandwidth files written by bandwidth scanners (`@type bandwidth-file`)
//!
//! These are line-oriented `key=value` files rather than keyword documents:
//! a Unix timestamp line, header lines up to a `=====` (or `====`)
//! terminator, then one line per measured relay.

use crate::decode::{self, ABSENT};
use crate::error::{DocumentParseError, Result};
use crate::meta::{Fingerprint, RawBytes};

//
// External dependencies
//
use chrono::{offset::TimeZone, DateTime, Utc};
use indexmap::IndexMap;
use log::debug;

/// Header version assumed when a file has no `version` line.
const IMPLICIT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayBandwidth {
    /// From `node_id=$<hex>`.
    pub node_id: Option<Fingerprint>,
    /// From `bw=`; [`ABSENT`] if the line has none.
    pub bw: i64,
    /// Every `key=value` pair of the line, in file order.
    pub values: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthFile {
    pub raw: RawBytes,
    pub annotations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub header: IndexMap<String, String>,
    pub relays: Vec<RelayBandwidth>,
    pub unrecognized_lines: Vec<String>,
}

fn is_terminator(line: &str) -> bool {
    line == "=====" || line == "===="
}

impl RelayBandwidth {
    fn from_line(line: &str) -> Result<RelayBandwidth> {
        let values: IndexMap<String, String> =
            decode::parse_ordered_map(line.split(' ').filter(|t| !t.is_empty()))?;
        let node_id = match values.get("node_id") {
            Some(id) => Some(Fingerprint::from_str_hex(id.trim_start_matches('$'))?),
            None => None,
        };
        let bw = match values.get("bw") {
            Some(bw) => decode::parse_count(bw, "bw")?,
            None => ABSENT,
        };
        Ok(RelayBandwidth {
            node_id,
            bw,
            values,
        })
    }
}

impl BandwidthFile {
    pub fn from_bytes(raw: impl AsRef<[u8]>) -> Result<BandwidthFile> {
        Self::parse(RawBytes::copy_from(raw.as_ref()))
    }

    pub fn parse(raw: RawBytes) -> Result<BandwidthFile> {
        let text = String::from_utf8_lossy(raw.as_bytes());
        let mut lines = text
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .filter(|l| !l.trim().is_empty())
            .peekable();

        let mut annotations = Vec::new();
        while let Some(line) = lines.next_if(|l| l.starts_with('@')) {
            annotations.push(line.to_string());
        }

        let first = lines.next().ok_or(DocumentParseError::EmptyDocument)?;
        let secs: i64 = decode::parse_int(first.trim(), "bandwidth file timestamp")?;
        let timestamp = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| DocumentParseError::ValueParseError(first.to_string()))?;

        let rest: Vec<&str> = lines.collect();
        // Version 1.0.0 files have no header and hence no terminator.
        let body_start = match rest.iter().position(|l| is_terminator(l)) {
            Some(idx) => idx + 1,
            None => 0,
        };

        let mut header = IndexMap::new();
        let mut unrecognized_lines = Vec::new();
        for line in rest[..body_start].iter().filter(|l| !is_terminator(l)) {
            match line.split_once('=') {
                Some((k, v)) if !k.is_empty() => {
                    header.entry(k.to_string()).or_insert_with(|| v.to_string());
                }
                _ => {
                    debug!("unrecognized bandwidth file header line: {}", line);
                    unrecognized_lines.push(line.to_string());
                }
            }
        }

        let relays = rest[body_start..]
            .iter()
            .map(|line| RelayBandwidth::from_line(line))
            .collect::<Result<Vec<_>>>()?;

        Ok(BandwidthFile {
            raw,
            annotations,
            timestamp,
            header,
            relays,
            unrecognized_lines,
        })
    }

    /// The header's `version`, or the version implied by its absence.
    pub fn version(&self) -> &str {
        self.header
            .get("version")
            .map(String::as_str)
            .unwrap_or(IMPLICIT_VERSION)
    }

    pub fn relay(&self, fingerprint: &Fingerprint) -> Option<&RelayBandwidth> {
        self.relays
            .iter()
            .find(|r| r.node_id.as_ref() == Some(fingerprint))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const V12: &str = "\
@type bandwidth-file 1.2
1523911758
version=1.2.0
software=sbws
software_version=0.4.0
earliest_bandwidth=2018-04-16T14:09:07
=====
bw=38000 nick=Test node_id=$68A483E05A2ABDCA6DA5A3EF8DB5177638A27F80 success=1
bw=1 nick=Test2 node_id=$96C15995F30895689291F455587BD94CA427B6FC unmeasured=1
";

    #[test]
    fn parse_v12() {
        let f = BandwidthFile::from_bytes(V12).unwrap();
        assert_eq!(f.annotations.len(), 1);
        assert_eq!(f.timestamp.timestamp(), 1523911758);
        assert_eq!(f.version(), "1.2.0");
        assert_eq!(
            f.header.keys().collect::<Vec<_>>(),
            vec!["version", "software", "software_version", "earliest_bandwidth"]
        );
        assert_eq!(f.relays.len(), 2);
        assert_eq!(f.relays[0].bw, 38000);
        assert_eq!(
            f.relays[0].values.keys().collect::<Vec<_>>(),
            vec!["bw", "nick", "node_id", "success"]
        );
        let fp = Fingerprint::from_str_hex("96C15995F30895689291F455587BD94CA427B6FC").unwrap();
        assert_eq!(f.relay(&fp).unwrap().values["nick"], "Test2");
        assert!(f.unrecognized_lines.is_empty());
    }

    #[test]
    fn parse_v10() {
        let f = BandwidthFile::from_bytes(
            "1523911758\nnode_id=$68A483E05A2ABDCA6DA5A3EF8DB5177638A27F80 nick=a\n",
        )
        .unwrap();
        assert_eq!(f.version(), "1.0.0");
        assert!(f.header.is_empty());
        assert_eq!(f.relays[0].bw, ABSENT);
        assert!(f.relays[0].node_id.is_some());
    }

    #[test]
    fn failures() {
        assert!(matches!(
            BandwidthFile::from_bytes("@type bandwidth-file 1.2\n").unwrap_err(),
            DocumentParseError::EmptyDocument
        ));
        assert!(BandwidthFile::from_bytes("yesterday\n=====\n").is_err());
        assert!(BandwidthFile::from_bytes("1523911758\n=====\nbw=x nick=a\n").is_err());
        assert!(BandwidthFile::from_bytes("1523911758\n=====\nbw=-1 nick=a\n").is_err());
        assert!(BandwidthFile::from_bytes("1523911758\n=====\nbw=3 garbage\n").is_err());
    }
}
