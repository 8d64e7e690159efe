//! Batch parsing: split a buffer holding any number of documents of one
//! kind, and parse each on its own.
//!
//! A failure in one document never affects its neighbours; it is reported
//! as an [`UnparseableDocument`] that carries the exact bytes it occupied.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::document::{DocumentKind, ParseResult, ParsedDocument, UnparseableDocument};
use crate::error::{DocumentParseError, Result};
use crate::meta::{parse_type_annotation, RawBytes, RawSpan};

//
// External dependencies
//
use lazy_static::lazy_static;
use log::debug;
use memchr::memchr;
use phf::phf_map;
use regex::Regex;

/// `@type` names, with whether the name implies a bridge document.
static TYPE_ANNOTATIONS: phf::Map<&'static str, (DocumentKind, bool)> = phf_map! {
    "server-descriptor" => (DocumentKind::ServerDescriptor, false),
    "bridge-server-descriptor" => (DocumentKind::ServerDescriptor, true),
    "extra-info" => (DocumentKind::ExtraInfo, false),
    "bridge-extra-info" => (DocumentKind::ExtraInfo, true),
    "network-status-consensus-3" => (DocumentKind::NetworkStatus, false),
    "network-status-microdesc-consensus-3" => (DocumentKind::NetworkStatus, false),
    "network-status-vote-3" => (DocumentKind::NetworkStatus, false),
    "dir-key-certificate-3" => (DocumentKind::KeyCertificate, false),
    "bandwidth-file" => (DocumentKind::BandwidthFile, false),
    "bridge-pool-assignment" => (DocumentKind::BridgePoolAssignment, false),
    "tordnsel" => (DocumentKind::ExitList, false),
};

/// Kinds recognizable from their first keyword.
static START_KEYWORDS: phf::Map<&'static str, DocumentKind> = phf_map! {
    "router" => DocumentKind::ServerDescriptor,
    "extra-info" => DocumentKind::ExtraInfo,
    "network-status-version" => DocumentKind::NetworkStatus,
    "dir-key-certificate-version" => DocumentKind::KeyCertificate,
    "bridge-pool-assignment" => DocumentKind::BridgePoolAssignment,
    "Downloaded" => DocumentKind::ExitList,
};

lazy_static! {
    /// File names under which bridge descriptors are archived.
    static ref BRIDGE_FILE_NAME: Regex =
        Regex::new(r"(?i)(^|[^a-z])bridge").expect("static regex");
}

/// Return the line starting at `off` (without newline or carriage return)
/// and the offset of the next line.
fn line_at(buf: &[u8], off: usize) -> (&[u8], usize) {
    let rest = &buf[off..];
    let (line, next) = match memchr(b'\n', rest) {
        Some(nl) => (&rest[..nl], off + nl + 1),
        None => (rest, buf.len()),
    };
    (line.strip_suffix(b"\r").unwrap_or(line), next)
}

fn keyword_of(line: &[u8]) -> &[u8] {
    let end = memchr(b' ', line).unwrap_or(line.len());
    &line[..end]
}

/// What a buffer was found to contain.
#[derive(Debug, Clone)]
struct Detection {
    kind: Option<DocumentKind>,
    is_bridge: bool,
    first_keyword: String,
}

/// Find out which kind of documents `buf` holds, from its `@type`
/// annotation or else from its first keyword. The file name decides
/// whether descriptors without a `@type` come from bridges.
fn detect(buf: &[u8], file_name: Option<&str>) -> Detection {
    let bridge_name = file_name.map_or(false, |n| BRIDGE_FILE_NAME.is_match(n));
    let mut off = 0;
    while off < buf.len() {
        let (line, next) = line_at(buf, off);
        off = next;
        if line.is_empty() {
            continue;
        }
        if line.starts_with(b"@") {
            let text = String::from_utf8_lossy(line);
            if let Some(args) = text.strip_prefix("@type ") {
                if let Some((kind, bridge)) = parse_type_annotation(args)
                    .and_then(|t| TYPE_ANNOTATIONS.get(t.name))
                {
                    return Detection {
                        kind: Some(*kind),
                        is_bridge: *bridge,
                        first_keyword: "@type".to_string(),
                    };
                }
            }
            continue;
        }
        let keyword = String::from_utf8_lossy(keyword_of(line)).into_owned();
        let kind = match START_KEYWORDS.get(keyword.as_str()) {
            Some(kind) => Some(*kind),
            None if line.iter().all(u8::is_ascii_digit) => Some(DocumentKind::BandwidthFile),
            None => None,
        };
        let is_bridge = bridge_name
            && matches!(
                kind,
                Some(DocumentKind::ServerDescriptor) | Some(DocumentKind::ExtraInfo)
            );
        return Detection {
            kind,
            is_bridge,
            first_keyword: keyword,
        };
    }
    Detection {
        kind: None,
        is_bridge: false,
        first_keyword: String::new(),
    }
}

/// Return the end of the document that starts at `from`: the start of the
/// next line opening a document with `keyword`, less the annotation lines
/// directly before it.  Inside objects only a keyword line with arguments
/// is taken as an opener.
fn split_point(buf: &[u8], from: usize, keyword: &[u8]) -> usize {
    let mut off = from;
    let mut seen_start = false;
    let mut in_object = false;
    let mut annotations_from: Option<usize> = None;
    while off < buf.len() {
        let (line, next) = line_at(buf, off);
        if in_object {
            if line.starts_with(b"-----END ") {
                in_object = false;
            } else if seen_start && keyword_of(line) == keyword && line.len() > keyword.len() {
                // Object lines hold no spaces: the object was never closed.
                return off;
            }
        } else if line.starts_with(b"-----BEGIN ") {
            in_object = true;
            annotations_from = None;
        } else if keyword_of(line) == keyword {
            if seen_start {
                return annotations_from.unwrap_or(off);
            }
            seen_start = true;
            annotations_from = None;
        } else if line.starts_with(b"@") {
            if seen_start {
                annotations_from.get_or_insert(off);
            }
        } else if !line.is_empty() {
            annotations_from = None;
        }
        off = next;
    }
    buf.len()
}

/// Parses buffers into sequences of [`ParseResult`]s.
#[derive(Debug, Clone, Default)]
pub struct DescriptorParser {
    config: ReaderConfig,
}

impl DescriptorParser {
    pub fn new(config: ReaderConfig) -> Self {
        DescriptorParser { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Lazily parse every document in `raw`.
    ///
    /// `source_file` and `file_name` are attached to unparseable documents;
    /// the file name also tells bridge descriptors from relay descriptors
    /// when the buffer has no `@type` annotation.
    pub fn parse_descriptors(
        &self,
        raw: impl Into<Arc<[u8]>>,
        source_file: Option<&Path>,
        file_name: Option<&str>,
    ) -> DescriptorIter {
        let buffer: Arc<[u8]> = raw.into();
        let file_name = file_name.map(str::to_string).or_else(|| {
            source_file
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        });
        let detection = detect(&buffer, file_name.as_deref());
        debug!(
            "parsing {} bytes from {} as {}",
            buffer.len(),
            file_name.as_deref().unwrap_or("<buffer>"),
            detection
                .kind
                .map_or("<unknown>", |k| -> &'static str { k.into() })
        );
        DescriptorIter {
            buffer,
            pos: 0,
            detection,
            fail_on_unrecognized_lines: self.config.fail_on_unrecognized_lines,
            source_file: source_file.map(Path::to_path_buf),
            file_name,
        }
    }
}

/// Parse every document in `raw` with the default configuration.
pub fn parse_descriptors(
    raw: impl Into<Arc<[u8]>>,
    source_file: Option<&Path>,
    file_name: Option<&str>,
) -> DescriptorIter {
    DescriptorParser::default().parse_descriptors(raw, source_file, file_name)
}

/// The documents of one buffer, in order of appearance.
///
/// Finite and not restartable; each document is parsed when it is reached.
#[derive(Debug)]
pub struct DescriptorIter {
    buffer: Arc<[u8]>,
    pos: usize,
    detection: Detection,
    fail_on_unrecognized_lines: bool,
    source_file: Option<PathBuf>,
    file_name: Option<String>,
}

impl DescriptorIter {
    /// The kind the buffer was detected to hold.
    pub fn kind(&self) -> Option<DocumentKind> {
        self.detection.kind
    }

    fn next_span(&mut self) -> Option<RawSpan> {
        let rest = self.buffer.get(self.pos..)?;
        if rest.iter().all(u8::is_ascii_whitespace) {
            self.pos = self.buffer.len();
            return None;
        }
        let end = match self.detection.kind.and_then(|k| k.start_keyword()) {
            Some(keyword) => split_point(&self.buffer, self.pos, keyword.as_bytes()),
            None => self.buffer.len(),
        };
        let span = RawSpan::new(self.pos, end - self.pos);
        self.pos = end;
        Some(span)
    }

    fn parse_one(&self, raw: RawBytes) -> Result<ParsedDocument> {
        let kind = self
            .detection
            .kind
            .ok_or_else(|| DocumentParseError::UnknownDocumentType {
                keyword: self.detection.first_keyword.clone(),
            })?;
        let doc = ParsedDocument::parse(kind, raw, self.detection.is_bridge)?;
        if self.fail_on_unrecognized_lines {
            if let Some(line) = doc.unrecognized_lines().into_iter().next() {
                return Err(DocumentParseError::UnrecognizedLine { line });
            }
        }
        Ok(doc)
    }
}

impl Iterator for DescriptorIter {
    type Item = ParseResult;

    fn next(&mut self) -> Option<ParseResult> {
        let span = self.next_span()?;
        let raw = RawBytes::with_span(Arc::clone(&self.buffer), span)?;
        match self.parse_one(raw.clone()) {
            Ok(doc) => Some(ParseResult::Parsed(doc)),
            Err(cause) => {
                debug!(
                    "unparseable document at bytes {}..{} of {}: {}",
                    span.offset(),
                    span.end(),
                    self.file_name.as_deref().unwrap_or("<buffer>"),
                    cause
                );
                Some(ParseResult::Unparseable(UnparseableDocument {
                    raw,
                    cause,
                    source_file: self.source_file.clone(),
                    file_name: self.file_name.clone(),
                    kind: self.detection.kind,
                }))
            }
        }
    }
}

impl std::iter::FusedIterator for DescriptorIter {}

#[cfg(test)]
mod test {
    use super::*;

    const POOL_A: &str = "bridge-pool-assignment 2022-08-01 12:00:00\n\
                          00e923e7a8d87d28954fee7503e480f3a03ce4ee email\n";
    const POOL_B: &str = "@source test\n\
                          bridge-pool-assignment 2022-08-01 13:00:00\n\
                          0103bb5b00ad3102b2dbafe9ce709a0a7c1060e4 https\n";

    #[test]
    fn detection() {
        let d = detect(b"@type bridge-server-descriptor 1.2\nrouter x\n", None);
        assert_eq!(d.kind, Some(DocumentKind::ServerDescriptor));
        assert!(d.is_bridge);

        let d = detect(b"\n\nrouter x 1.2.3.4 1 0 0\n", Some("2022-08-01-bridge-descriptors"));
        assert!(d.is_bridge);
        let d = detect(b"router x 1.2.3.4 1 0 0\n", Some("server-descriptors"));
        assert!(!d.is_bridge);

        // an unknown @type falls back to the first keyword
        let d = detect(b"@type something-new 1.0\nextra-info a b\n", None);
        assert_eq!(d.kind, Some(DocumentKind::ExtraInfo));

        let d = detect(b"1523911758\nversion=1.2.0\n", None);
        assert_eq!(d.kind, Some(DocumentKind::BandwidthFile));

        let d = detect(b"mystery-document 3\n", None);
        assert_eq!(d.kind, None);
        assert_eq!(d.first_keyword, "mystery-document");
    }

    #[test]
    fn splitting() {
        let buf = format!("{POOL_A}{POOL_B}");
        let b = buf.as_bytes();
        let first = split_point(b, 0, b"bridge-pool-assignment");
        assert_eq!(first, POOL_A.len());
        assert_eq!(split_point(b, first, b"bridge-pool-assignment"), b.len());

        // keywords inside objects do not split
        let obj = b"router a\nsig\n-----BEGIN X-----\nrouter\n-----END X-----\nrouter b\n";
        assert_eq!(split_point(obj, 0, b"router"), obj.len() - "router b\n".len());

        let open = b"router a\n-----BEGIN X-----\nAAAA\nrouter b 1.2.3.4\n";
        assert_eq!(split_point(open, 0, b"router"), open.len() - "router b 1.2.3.4\n".len());
    }

    #[test]
    fn batch_isolation() {
        let truncated = "bridge-pool-assignment 2022-08-01 14:00:\n";
        let buf = format!("{POOL_A}{truncated}{POOL_B}");
        let results: Vec<_> = parse_descriptors(buf.as_bytes(), None, Some("pool")).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_parsed());
        let bad = results[1].unparseable().unwrap();
        assert_eq!(bad.raw.as_bytes(), truncated.as_bytes());
        assert_eq!(bad.raw.span().offset(), POOL_A.len());
        assert_eq!(bad.file_name.as_deref(), Some("pool"));
        assert_eq!(bad.kind, Some(DocumentKind::BridgePoolAssignment));
        let last = results[2].parsed().unwrap();
        assert_eq!(last.annotations(), &["@source test".to_string()]);
        assert_eq!(last.raw().as_bytes(), POOL_B.as_bytes());
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(parse_descriptors(&b""[..], None, None).count(), 0);
        assert_eq!(parse_descriptors(&b"\n \n"[..], None, None).count(), 0);

        let results: Vec<_> =
            parse_descriptors(&b"mystery 1\nmore 2\n"[..], None, None).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].unparseable().unwrap().cause,
            DocumentParseError::UnknownDocumentType {
                keyword: "mystery".to_string()
            }
        );
    }

    #[test]
    fn unrecognized_lines_policy() {
        let doc = format!("{POOL_A}x-unknown line\n");
        let lenient: Vec<_> = parse_descriptors(doc.as_bytes(), None, None).collect();
        assert_eq!(
            lenient[0].parsed().unwrap().unrecognized_lines(),
            vec!["x-unknown line".to_string()]
        );

        let strict = DescriptorParser::new(ReaderConfig {
            fail_on_unrecognized_lines: true,
            ..ReaderConfig::default()
        });
        let results: Vec<_> = strict.parse_descriptors(doc.as_bytes(), None, None).collect();
        assert_eq!(
            results[0].unparseable().unwrap().cause,
            DocumentParseError::UnrecognizedLine {
                line: "x-unknown line".to_string()
            }
        );
    }

    #[test]
    fn file_name_from_path() {
        let results: Vec<_> = parse_descriptors(
            &b"mystery\n"[..],
            Some(Path::new("/archive/bridge-descriptors/abc")),
            None,
        )
        .collect();
        let u = results[0].unparseable().unwrap();
        assert_eq!(u.file_name.as_deref(), Some("abc"));
        assert_eq!(
            u.source_file.as_deref(),
            Some(Path::new("/archive/bridge-descriptors/abc"))
        );
    }
}
