//! Exit lists (`@type tordnsel`): the addresses exit relays were seen
//! using, as found by an exit scanner.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;

use crate::decode;
use crate::error::{DocumentParseError, Result};
use crate::meta::{Document, Fingerprint, Item, RawBytes};

//
// External dependencies
//
use chrono::{DateTime, Utc};
use derive_builder::Builder;

#[derive(Debug, Clone, Builder, PartialEq, Eq)]
#[builder(private)]
pub struct ExitListEntry {
    pub fingerprint: Fingerprint,
    pub published: DateTime<Utc>,
    pub last_status: DateTime<Utc>,
    /// Scan time per address.
    #[builder(setter(custom), default)]
    pub exit_addresses: BTreeMap<IpAddr, DateTime<Utc>>,
}

impl ExitListEntryBuilder {
    fn add_exit_address(&mut self, item: &Item<'_>) -> Result<()> {
        let ip = item.required_arg(0)?;
        let address =
            IpAddr::from_str(ip).map_err(|_| DocumentParseError::InvalidIpAddress(ip.to_string()))?;
        let scanned = decode::timestamp_arg(item, 1)?;
        self.exit_addresses
            .get_or_insert_with(BTreeMap::new)
            .insert(address, scanned);
        Ok(())
    }

    fn finish(&self) -> Result<ExitListEntry> {
        self.build()
            .map_err(|e| DocumentParseError::Incomplete(e.to_string()))
    }
}

fn close_entry(
    current: Option<ExitListEntryBuilder>,
    entries: &mut BTreeMap<String, ExitListEntry>,
) -> Result<()> {
    if let Some(builder) = current {
        let entry = builder.finish()?;
        let key = entry.fingerprint.to_hex_upper();
        if entries.contains_key(&key) {
            return Err(DocumentParseError::DuplicateEntry { identity: key });
        }
        entries.insert(key, entry);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitList {
    pub raw: RawBytes,
    pub annotations: Vec<String>,
    pub downloaded: DateTime<Utc>,
    /// Keyed by upper-case hex fingerprint.
    pub entries: BTreeMap<String, ExitListEntry>,
    pub unrecognized_lines: Vec<String>,
}

impl ExitList {
    pub fn from_bytes(raw: impl AsRef<[u8]>) -> Result<ExitList> {
        Self::parse(RawBytes::copy_from(raw.as_ref()))
    }

    pub fn parse(raw: RawBytes) -> Result<ExitList> {
        let doc = Document::parse(raw.as_bytes())?;
        let first = doc.first_item();
        if first.keyword != "Downloaded" {
            return Err(DocumentParseError::WrongDocumentType {
                expected: "tordnsel",
                found: first.keyword.to_string(),
            });
        }
        let downloaded = decode::timestamp_arg(first, 0)?;

        let mut entries = BTreeMap::new();
        let mut unrecognized_lines = Vec::new();
        let mut current: Option<ExitListEntryBuilder> = None;

        for item in doc.items.iter().skip(1) {
            if item.keyword == "ExitNode" {
                close_entry(current.take(), &mut entries)?;
                let mut builder = ExitListEntryBuilder::default();
                builder.fingerprint(Fingerprint::from_str_hex(item.get_argument()?)?);
                current = Some(builder);
                continue;
            }
            let builder = match current.as_mut() {
                Some(b) => b,
                None => {
                    unrecognized_lines.push(item.verbatim());
                    continue;
                }
            };
            match item.keyword {
                "Published" => {
                    builder.published(decode::timestamp_arg(item, 0)?);
                }
                "LastStatus" => {
                    builder.last_status(decode::timestamp_arg(item, 0)?);
                }
                "ExitAddress" => builder.add_exit_address(item)?,
                _ => unrecognized_lines.push(item.verbatim()),
            }
        }
        close_entry(current.take(), &mut entries)?;

        Ok(ExitList {
            annotations: doc.annotation_lines(),
            raw,
            downloaded,
            entries,
            unrecognized_lines,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const LIST: &str = "\
@type tordnsel 1.0
Downloaded 2022-08-01 12:05:00
ExitNode 0011BD2485AD45D984EC4159C88FC066E5E3300E
Published 2022-08-01 01:02:03
LastStatus 2022-08-01 02:00:00
ExitAddress 31.31.74.47 2022-08-01 02:35:10
ExitAddress 31.31.74.48 2022-08-01 03:35:10
ExitNode 0000000000000000000000000000000000000001
Published 2022-08-01 04:00:00
LastStatus 2022-08-01 05:00:00
ExitAddress 10.0.0.1 2022-08-01 06:00:00
";

    #[test]
    fn parse_exit_list() {
        let l = ExitList::from_bytes(LIST).unwrap();
        assert_eq!(l.entries.len(), 2);
        let first = l.entries.values().next().unwrap();
        assert_eq!(
            first.fingerprint.to_hex_upper(),
            "0000000000000000000000000000000000000001"
        );
        let e = &l.entries["0011BD2485AD45D984EC4159C88FC066E5E3300E"];
        assert_eq!(e.exit_addresses.len(), 2);
        assert!(e.last_status > e.published);
        assert!(l.unrecognized_lines.is_empty());
    }

    #[test]
    fn failures() {
        let no_published = LIST.replace("Published 2022-08-01 04:00:00\n", "");
        assert!(matches!(
            ExitList::from_bytes(no_published).unwrap_err(),
            DocumentParseError::Incomplete(_)
        ));
        let bad_ip = LIST.replace("10.0.0.1", "10.0.0");
        assert!(matches!(
            ExitList::from_bytes(bad_ip).unwrap_err(),
            DocumentParseError::InvalidIpAddress(_)
        ));
        let dup = format!("{LIST}ExitNode 0011BD2485AD45D984EC4159C88FC066E5E3300E\nPublished 2022-08-01 01:02:03\nLastStatus 2022-08-01 02:00:00\n");
        assert!(matches!(
            ExitList::from_bytes(dup).unwrap_err(),
            DocumentParseError::DuplicateEntry { .. }
        ));
    }
}
