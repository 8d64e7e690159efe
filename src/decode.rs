//! Conversions from item arguments to typed values.
//!
//! Every function here is pure.  Optional fields have an explicit absent
//! representation chosen per field: [`ABSENT`] for numbers that documents
//! may leave out, an empty map for missing tables, and `None` otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{DocumentParseError, ErrorContext, Result};
use crate::meta::Item;

//
// External dependencies
//
use chrono::{offset::TimeZone, DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;

/// Sentinel for numeric fields that were not reported.
pub const ABSENT: i64 = -1;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an integer, naming `context` on failure (including overflow).
pub fn parse_int<T>(s: &str, context: impl ToString) -> Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    s.parse::<T>().context(context)
}

/// Parse a count that may not be negative, for fields that use [`ABSENT`]
/// when the value is missing.
pub fn parse_count(s: &str, context: impl ToString) -> Result<i64> {
    let context = context.to_string();
    let value: u64 = parse_int(s, &context)?;
    i64::try_from(value).map_err(|_| DocumentParseError::InvalidInt { context })
}

/// Parse "YYYY-MM-DD HH:MM:SS" given as one string.
pub fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, TIME_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse a timestamp written as separate date and time arguments.
pub fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>> {
    parse_timestamp_str(&format!("{date} {time}"))
}

/// Parse the timestamp formed by arguments `idx` and `idx + 1` of `item`.
pub fn timestamp_arg(item: &Item<'_>, idx: usize) -> Result<DateTime<Utc>> {
    parse_timestamp(item.required_arg(idx)?, item.required_arg(idx + 1)?)
}

/// Split one `key=value` token.
fn split_pair(token: &str) -> Result<(&str, &str)> {
    match token.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k, v)),
        _ => Err(DocumentParseError::InvalidArgumentDict {
            raw: token.to_string(),
        }),
    }
}

fn parse_value<T: FromStr>(token: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| DocumentParseError::InvalidArgumentDict {
            raw: token.to_string(),
        })
}

/// Parse `key=value` tokens keeping the order in which keys first appear.
///
/// A repeated key keeps its first value.
pub fn parse_ordered_map<'a, T, I>(tokens: I) -> Result<IndexMap<String, T>>
where
    T: FromStr,
    I: IntoIterator<Item = &'a str>,
{
    let mut map = IndexMap::new();
    for token in tokens {
        let (k, v) = split_pair(token)?;
        let v = parse_value(token, v)?;
        map.entry(k.to_string()).or_insert(v);
    }
    Ok(map)
}

/// Parse a comma-separated `key=value` table (country codes, ports, ...)
/// into a key-sorted map.  An empty string gives an empty map.
pub fn parse_sorted_map<T: FromStr>(s: &str) -> Result<BTreeMap<String, T>> {
    let mut map = BTreeMap::new();
    for token in s.split(',').filter(|t| !t.is_empty()) {
        let (k, v) = split_pair(token)?;
        map.insert(k.to_string(), parse_value(token, v)?);
    }
    Ok(map)
}

/// Parse the statistics table that is the first argument of `item`, or an
/// empty map if the item has no arguments.
pub fn sorted_map_arg<T: FromStr>(item: &Item<'_>) -> Result<BTreeMap<String, T>> {
    match item.args().first() {
        Some(table) => parse_sorted_map(table),
        None => Ok(BTreeMap::new()),
    }
}

/// Collect flags into a sorted, case-sensitive set.
pub fn parse_flags<'a, I>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `IPv4:port` or `[IPv6]:port`.
pub fn parse_or_address(s: &str) -> Result<SocketAddr> {
    SocketAddr::from_str(s).map_err(|_| DocumentParseError::InvalidIpAddress(s.to_string()))
}

/// Parse a list of addresses, keeping declaration order.
pub fn parse_address_list<'a, I>(tokens: I) -> Result<Vec<SocketAddr>>
where
    I: IntoIterator<Item = &'a str>,
{
    tokens.into_iter().map(parse_or_address).collect()
}

/// Parse `0` or `1`.
pub fn parse_bool(s: &str, context: &str) -> Result<bool> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(DocumentParseError::InvalidInt {
            context: context.to_string(),
        }),
    }
}

/// A history line such as `write-history 2021-01-01 00:00:00 (86400 s) 1,2,3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthHistory {
    /// End of the most recent interval.
    pub end: DateTime<Utc>,
    pub interval_secs: u64,
    /// Oldest first.
    pub values: Vec<i64>,
}

impl BandwidthHistory {
    /// Parse from a history item.
    pub fn from_item(item: &Item<'_>) -> Result<BandwidthHistory> {
        let bad = || DocumentParseError::InvalidHistory {
            keyword: item.keyword.to_string(),
        };
        let args = item.split_arguments()?;
        let (date, time, secs, unit, values) = match args[..] {
            [date, time, secs, unit] => (date, time, secs, unit, ""),
            [date, time, secs, unit, values, ..] => (date, time, secs, unit, values),
            _ => return Err(bad()),
        };
        if unit != "s)" {
            return Err(bad());
        }
        let interval_secs = secs
            .strip_prefix('(')
            .ok_or_else(bad)?
            .parse::<u64>()
            .map_err(|_| bad())?;
        let values = values
            .split(',')
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<i64>().map_err(|_| bad()))
            .collect::<Result<Vec<_>>>()?;
        Ok(BandwidthHistory {
            end: parse_timestamp(date, time)?,
            interval_secs,
            values,
        })
    }
}

/// A `*-stats-end` line: the end of a statistics interval and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsInterval {
    pub end: DateTime<Utc>,
    pub interval_secs: u64,
}

impl StatsInterval {
    pub fn from_item(item: &Item<'_>) -> Result<StatsInterval> {
        // Same layout as a history line without the values.
        let history = BandwidthHistory::from_item(item)?;
        Ok(StatsInterval {
            end: history.end,
            interval_secs: history.interval_secs,
        })
    }
}

/// A range of supported protocol versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedProtocolVersion {
    versions: Vec<u8>,
}

impl SupportedProtocolVersion {
    pub fn supports(&self, v: u8) -> bool {
        self.versions.contains(&v)
    }
}

impl fmt::Display for SupportedProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut last_version = None;
        let mut range_end = None;
        for v in self.versions.iter().copied() {
            match last_version {
                Some(last) if v == last + 1 => {
                    if range_end.is_none() {
                        write!(f, "-")?;
                    }
                    range_end = Some(v);
                }
                Some(_) => {
                    if let Some(x) = range_end.take() {
                        write!(f, "{}", x)?;
                    }
                    write!(f, ",{}", v)?;
                }
                // first element
                None => write!(f, "{}", v)?,
            }
            last_version = Some(v);
        }
        if let Some(x) = range_end.take() {
            write!(f, "{}", x)?;
        }

        Ok(())
    }
}

impl FromStr for SupportedProtocolVersion {
    type Err = DocumentParseError;

    /// Parse from "3", "2-5" or "1-2,4".
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || DocumentParseError::InvalidProtocolVersion { raw: s.to_string() };
        let mut versions = Vec::new();
        for component in s.split(',').filter(|c| !c.is_empty()) {
            match component.split_once('-') {
                Some((min, max)) => {
                    let min = min.parse::<u8>().map_err(|_| invalid())?;
                    let max = max.parse::<u8>().map_err(|_| invalid())?;
                    if min > max {
                        return Err(invalid());
                    }
                    versions.extend(min..=max);
                }
                None => versions.push(component.parse::<u8>().map_err(|_| invalid())?),
            }
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(SupportedProtocolVersion { versions })
    }
}

/// Parse `Name=versions` tokens (`pr`/`proto` lines) keyed by protocol name.
///
/// Protocol names are not restricted, so that newer protocols do not make
/// a document unparseable.
pub fn parse_protocols<'a, I>(tokens: I) -> Result<BTreeMap<String, SupportedProtocolVersion>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut protocols = BTreeMap::new();
    for token in tokens.into_iter().filter(|t| !t.is_empty()) {
        let (name, versions) = split_pair(token)?;
        protocols.insert(name.to_string(), versions.parse()?);
    }
    Ok(protocols)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::Tokenizer;

    fn gettok(s: &str) -> Item<'_> {
        let mut t = Tokenizer::new(s.as_bytes());
        let item = t.next().unwrap().unwrap();
        assert!(t.next().is_none());
        item
    }

    #[test]
    fn ints() {
        assert_eq!(parse_int::<i64>("-5", "x").unwrap(), -5);
        assert_eq!(
            parse_int::<u16>("65536", "OR port").unwrap_err(),
            DocumentParseError::InvalidInt {
                context: "OR port".into()
            }
        );
        assert!(parse_int::<i64>("99999999999999999999", "big").is_err());

        assert_eq!(parse_count("0", "uptime").unwrap(), 0);
        assert_eq!(parse_count("1234", "uptime").unwrap(), 1234);
        assert_eq!(
            parse_count("-1", "uptime").unwrap_err(),
            DocumentParseError::InvalidInt {
                context: "uptime".to_string()
            }
        );
        assert!(parse_count("18446744073709551615", "bw").is_err());
        assert!(parse_bool("1", "hibernating").unwrap());
        assert!(parse_bool("yes", "hibernating").is_err());
    }

    #[test]
    fn timestamps() {
        let t = parse_timestamp("2021-03-04", "05:06:07").unwrap();
        assert_eq!(t.timestamp_millis(), 1_614_834_367_000);
        assert_eq!(parse_timestamp_str("2021-03-04 05:06:07").unwrap(), t);
        assert!(matches!(
            parse_timestamp("2021-13-04", "05:06:07"),
            Err(DocumentParseError::InvalidDate(_))
        ));
        let item = gettok("published 2021-03-04 05:06:07\n");
        assert_eq!(timestamp_arg(&item, 0).unwrap(), t);
        assert!(timestamp_arg(&item, 1).is_err());
    }

    #[test]
    fn maps() {
        let m: IndexMap<String, i64> =
            parse_ordered_map(["zeta=1", "alpha=2", "zeta=3"]).unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(m["zeta"], 1);
        assert!(parse_ordered_map::<i64, _>(["nope"]).is_err());
        assert!(parse_ordered_map::<i64, _>(["=4"]).is_err());
        assert!(parse_ordered_map::<i64, _>(["a=b"]).is_err());

        let m: BTreeMap<String, u64> = parse_sorted_map("us=16,de=8,??=8").unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["??", "de", "us"]);
        assert!(parse_sorted_map::<u64>("").unwrap().is_empty());

        let item = gettok("dirreq-v3-ips\n");
        assert!(sorted_map_arg::<u64>(&item).unwrap().is_empty());
        let item = gettok("exit-kbytes-written 80=10,443=20,other=5\n");
        let m = sorted_map_arg::<u64>(&item).unwrap();
        assert_eq!(m.get("other"), Some(&5));
    }

    #[test]
    fn flags_and_addresses() {
        let f = parse_flags(["Valid", "Fast", "", "Exit", "fast"]);
        assert_eq!(
            f.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Exit", "Fast", "Valid", "fast"]
        );
        let a = parse_address_list(["[2001:db8::1]:9001", "10.0.0.1:443"]).unwrap();
        assert_eq!(a[0].port(), 9001);
        assert!(a[0].is_ipv6());
        assert!(a[1].is_ipv4());
        assert!(parse_or_address("2001:db8::1:9001").is_err());
    }

    #[test]
    fn history() {
        let item = gettok("write-history 2021-03-04 05:06:07 (900 s) 1,2,3\n");
        let h = BandwidthHistory::from_item(&item).unwrap();
        assert_eq!(h.interval_secs, 900);
        assert_eq!(h.values, vec![1, 2, 3]);

        let item = gettok("read-history 2021-03-04 05:06:07 (900 s)\n");
        assert!(BandwidthHistory::from_item(&item).unwrap().values.is_empty());

        let item = gettok("read-history 2021-03-04 05:06:07 (900 x) 1\n");
        assert!(BandwidthHistory::from_item(&item).is_err());

        let item = gettok("dirreq-stats-end 2021-03-04 05:06:07 (86400 s)\n");
        let s = StatsInterval::from_item(&item).unwrap();
        assert_eq!(s.interval_secs, 86400);
        assert_eq!(s.end, parse_timestamp_str("2021-03-04 05:06:07").unwrap());
    }

    #[test]
    fn protocols() {
        let p = parse_protocols("Cons=1-2 Link=1-5 Relay=1-2,4 NewThing=7".split(' ')).unwrap();
        assert!(p["Link"].supports(3));
        assert!(!p["Relay"].supports(3));
        assert!(p["NewThing"].supports(7));
        assert_eq!(p["Relay"].to_string(), "1-2,4");
        assert_eq!(p["Link"].to_string(), "1-5");
        assert!(parse_protocols(["Link=1-x"]).is_err());
    }

    #[test]
    fn reversed_protocol_range() {
        assert!("5-3".parse::<SupportedProtocolVersion>().is_err());
        assert_eq!("3-3".parse::<SupportedProtocolVersion>().unwrap().to_string(), "3");
        let err = parse_protocols(["Link=5-3"]).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Decode);
    }
}
