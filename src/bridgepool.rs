//! Bridge pool assignments (`@type bridge-pool-assignment`)

use std::collections::BTreeMap;

use crate::decode;
use crate::error::{DocumentParseError, Result};
use crate::meta::{Document, Fingerprint, RawBytes};

//
// External dependencies
//
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// The distribution pool a bridge was assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolAssignment {
    /// `https`, `email`, `moat`, `unallocated`, ...
    pub pool: String,
    /// Trailing `key=value` details such as `port=443 flag=stable`.
    pub attributes: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePoolAssignment {
    pub raw: RawBytes,
    pub annotations: Vec<String>,
    pub published: DateTime<Utc>,
    /// Keyed by upper-case hex fingerprint.
    pub entries: BTreeMap<String, PoolAssignment>,
    pub unrecognized_lines: Vec<String>,
}

impl BridgePoolAssignment {
    pub fn from_bytes(raw: impl AsRef<[u8]>) -> Result<BridgePoolAssignment> {
        Self::parse(RawBytes::copy_from(raw.as_ref()))
    }

    pub fn parse(raw: RawBytes) -> Result<BridgePoolAssignment> {
        let doc = Document::parse(raw.as_bytes())?;
        let first = doc.first_item();
        if first.keyword != "bridge-pool-assignment" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "bridge-pool-assignment",
                found: first.keyword.to_string(),
            });
        }
        let published = decode::timestamp_arg(first, 0)?;

        let mut entries = BTreeMap::new();
        let mut unrecognized_lines = Vec::new();
        for item in doc.items.iter().skip(1) {
            // Assignment lines start with the bridge fingerprint.
            let fingerprint = match Fingerprint::from_str_hex(item.keyword) {
                Ok(fp) if item.keyword.len() == 40 => fp,
                _ => {
                    unrecognized_lines.push(item.verbatim());
                    continue;
                }
            };
            let args = item.split_arguments()?;
            let assignment = PoolAssignment {
                pool: args[0].to_string(),
                attributes: decode::parse_ordered_map(args[1..].iter().copied())?,
            };
            let key = fingerprint.to_hex_upper();
            if entries.contains_key(&key) {
                return Err(DocumentParseError::DuplicateEntry { identity: key });
            }
            entries.insert(key, assignment);
        }

        Ok(BridgePoolAssignment {
            annotations: doc.annotation_lines(),
            raw,
            published,
            entries,
            unrecognized_lines,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const POOL: &str = "\
@type bridge-pool-assignment 1.0
bridge-pool-assignment 2022-08-01 12:00:00
f00b834117566035736fc6bd4ece950eace8e057 unallocated
00e923e7a8d87d28954fee7503e480f3a03ce4ee email port=443 flag=stable
0103bb5b00ad3102b2dbafe9ce709a0a7c1060e4 https ring=2 distribution=moat
";

    #[test]
    fn parse_assignment() {
        let p = BridgePoolAssignment::from_bytes(POOL).unwrap();
        assert_eq!(p.annotations.len(), 1);
        let keys: Vec<_> = p.entries.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "00E923E7A8D87D28954FEE7503E480F3A03CE4EE".to_string(),
                "0103BB5B00AD3102B2DBAFE9CE709A0A7C1060E4".to_string(),
                "F00B834117566035736FC6BD4ECE950EACE8E057".to_string(),
            ]
        );
        let email = &p.entries["00E923E7A8D87D28954FEE7503E480F3A03CE4EE"];
        assert_eq!(email.pool, "email");
        assert_eq!(email.attributes["port"], "443");
        assert!(p.entries["F00B834117566035736FC6BD4ECE950EACE8E057"]
            .attributes
            .is_empty());
        assert!(p.unrecognized_lines.is_empty());
    }

    #[test]
    fn failures() {
        let dup = format!("{POOL}0103bb5b00ad3102b2dbafe9ce709a0a7c1060e4 email\n");
        assert!(matches!(
            BridgePoolAssignment::from_bytes(dup).unwrap_err(),
            DocumentParseError::DuplicateEntry { .. }
        ));
        let bare = format!("{POOL}0103bb5b00ad3102b2dbafe9ce709a0a7c1060e5\n");
        assert!(BridgePoolAssignment::from_bytes(bare).is_err());
        let odd = format!("{POOL}not-a-fingerprint here\n");
        let p = BridgePoolAssignment::from_bytes(odd).unwrap();
        assert_eq!(p.unrecognized_lines, vec!["not-a-fingerprint here".to_string()]);
    }
}
