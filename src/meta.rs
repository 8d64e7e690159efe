//! The generic meta-format shared by all Tor documents.
//!
//! Every document is a sequence of newline-terminated keyword lines
//! ("items"), each optionally followed by a PEM-style object.  This module
//! splits raw bytes into such items without copying them, and holds the
//! small span/fingerprint types that every document type builds on.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{DocumentParseError, Result};

//
// External dependencies
//
use memchr::memchr;
use nom::bytes::complete::{tag, take_till, take_until};
use nom::combinator::{opt, rest};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

/// indicates the start of an object
const BEGIN_STR: &[u8] = b"-----BEGIN ";
/// indicates the end of an object
const END_STR: &[u8] = b"-----END ";
/// indicates the end of a begin or end tag.
const TAG_END: &[u8] = b"-----";

/// A byte range within some buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawSpan {
    offset: usize,
    len: usize,
}

impl RawSpan {
    pub fn new(offset: usize, len: usize) -> Self {
        RawSpan { offset, len }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the first byte after this span.  Saturates, so that a
    /// span past the addressable range never fits any buffer.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.len)
    }

    /// Return the bytes of `buf` covered by this span, or `None` if the span
    /// does not fit inside `buf`.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        buf.get(self.offset..self.end())
    }

    /// Translate a span relative to `outer` into a span relative to the
    /// buffer `outer` points into.
    pub(crate) fn shifted_into(&self, outer: RawSpan) -> RawSpan {
        RawSpan::new(outer.offset + self.offset, self.len)
    }
}

/// The bytes of one document: a shared handle on the original buffer plus
/// the span the document occupies in it.
///
/// Cloning never copies the underlying bytes.
#[derive(Clone)]
pub struct RawBytes {
    buffer: Arc<[u8]>,
    span: RawSpan,
}

impl RawBytes {
    /// Wrap the whole of `buffer`.
    pub fn new(buffer: Arc<[u8]>) -> Self {
        let span = RawSpan::new(0, buffer.len());
        RawBytes { buffer, span }
    }

    /// Wrap part of `buffer`.  Returns `None` if `span` does not fit.
    pub fn with_span(buffer: Arc<[u8]>, span: RawSpan) -> Option<Self> {
        if span.end() > buffer.len() {
            return None;
        }
        Some(RawBytes { buffer, span })
    }

    /// Copy `bytes` into a fresh buffer.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self::new(Arc::from(bytes))
    }

    /// Narrow to a sub-span given relative to this one.
    pub(crate) fn sub(&self, inner: RawSpan) -> Option<Self> {
        if inner.end() > self.span.len() {
            return None;
        }
        Some(RawBytes {
            buffer: Arc::clone(&self.buffer),
            span: inner.shifted_into(self.span),
        })
    }

    pub fn span(&self) -> RawSpan {
        self.span
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[self.span.offset..self.span.end()]
    }

    pub fn len(&self) -> usize {
        self.span.len
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Copy the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// The whole buffer this document was found in.
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.buffer
    }
}

impl PartialEq for RawBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for RawBytes {}

impl fmt::Debug for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RawBytes")
            .field("offset", &self.span.offset)
            .field("len", &self.span.len)
            .finish()
    }
}

/// A 20-byte relay or authority identity (an RSA key fingerprint) or a
/// SHA-1 document digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub fn from_u8(bytes: &[u8]) -> Fingerprint {
        let mut out = [0_u8; 20];
        let n = bytes.len().min(20);
        out[..n].copy_from_slice(&bytes[..n]);
        Fingerprint(out)
    }

    /// Parse 40 hex digits, in either case.  Fingerprints written with
    /// grouping spaces (as in server descriptors) are accepted too.
    pub fn from_str_hex(s: &str) -> Result<Fingerprint> {
        let compact: Cow<'_, str> = if s.contains(' ') {
            Cow::Owned(s.replace(' ', ""))
        } else {
            Cow::Borrowed(s)
        };
        let mut out = [0_u8; 20];
        hex::decode_to_slice(compact.as_bytes(), &mut out).map_err(|_| {
            DocumentParseError::InvalidDigest { raw: s.to_string() }
        })?;
        Ok(Fingerprint(out))
    }

    /// Parse unpadded base64, as used in network-status `r` lines.
    pub fn from_str_b64(s: &str) -> Result<Fingerprint> {
        let bytes = base64::decode_config(s.trim_end_matches('='), base64::STANDARD_NO_PAD)?;
        if bytes.len() != 20 {
            return Err(DocumentParseError::InvalidDigest { raw: s.to_string() });
        }
        Ok(Fingerprint::from_u8(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex_lower(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_hex_upper(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex_upper())
    }
}

/// A PEM-style object attached to an [`Item`].
///
/// The payload is not decoded until asked for.
#[derive(Debug, Clone, Copy)]
pub struct Object<'a> {
    /// The 'FOO' in "-----BEGIN FOO-----".
    tag: &'a str,
    /// The allegedly base64-encoded lines between the BEGIN and END lines.
    data: &'a [u8],
    /// BEGIN line through END line, inclusive.
    span: RawSpan,
}

impl<'a> Object<'a> {
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    pub fn span(&self) -> RawSpan {
        self.span
    }

    /// The base64 payload with the line breaks removed.
    pub fn data_joined(&self) -> String {
        self.data
            .iter()
            .filter(|b| !matches!(b, b'\n' | b'\r'))
            .map(|&b| b as char)
            .collect()
    }

    /// Decode the payload.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let joined = self.data_joined();
        Ok(base64::decode_config(
            joined.trim_end_matches('='),
            base64::STANDARD_NO_PAD,
        )?)
    }
}

/// A single keyword line of a document, and the object following it.
///
/// Borrows from the buffer it was read from.
#[derive(Debug, Clone)]
pub struct Item<'a> {
    pub keyword: &'a str,
    /// Everything after the first space; `None` if the line has no space.
    pub arguments: Option<Cow<'a, str>>,
    pub object: Option<Object<'a>>,
    /// Keyword line and object, including the final newline.
    span: RawSpan,
    /// The whole item as it appears in the input.
    raw: &'a [u8],
}

impl<'a> Item<'a> {
    /// All arguments as one string, with inner spaces intact.
    pub fn get_argument(&self) -> Result<&str> {
        match self.arguments.as_deref() {
            Some(a) if !a.is_empty() => Ok(a),
            _ => Err(DocumentParseError::args_missing(self.keyword)),
        }
    }

    /// All arguments as one string; empty if there are none.
    pub fn args_str(&self) -> &str {
        self.arguments.as_deref().unwrap_or("")
    }

    /// The arguments split at spaces.  Fails if there are none.
    pub fn split_arguments(&self) -> Result<Vec<&str>> {
        let args = self.args();
        if args.is_empty() {
            return Err(DocumentParseError::args_missing(self.keyword));
        }
        Ok(args)
    }

    /// The arguments split at spaces; possibly empty.
    pub fn args(&self) -> Vec<&str> {
        self.args_str().split(' ').filter(|s| !s.is_empty()).collect()
    }

    /// The nth argument, or an error naming this item's keyword.
    pub fn required_arg(&self, idx: usize) -> Result<&str> {
        self.args_str()
            .split(' ')
            .filter(|s| !s.is_empty())
            .nth(idx)
            .ok_or_else(|| DocumentParseError::args_missing(self.keyword))
    }

    pub fn has_object(&self) -> bool {
        self.object.is_some()
    }

    /// The object payload (base64 with line breaks removed), or an error if
    /// the item has no object.
    pub fn object_data(&self) -> Result<String> {
        self.object
            .map(|o| o.data_joined())
            .ok_or_else(|| DocumentParseError::MissingItem { keyword: "object" })
    }

    /// Offset and length of this item within the tokenized buffer.
    pub fn span(&self) -> RawSpan {
        self.span
    }

    /// The item exactly as written (object lines included), without the
    /// final newline.
    pub fn verbatim(&self) -> String {
        let raw = self.raw.strip_suffix(b"\n").unwrap_or(self.raw);
        String::from_utf8_lossy(raw).into_owned()
    }

    pub fn is_annotation(&self) -> bool {
        self.keyword.starts_with('@')
    }
}

/// Return true iff `kw` can be a keyword: printable ASCII without spaces,
/// not looking like an object delimiter.
fn keyword_ok(kw: &[u8]) -> bool {
    !kw.is_empty() && !kw.starts_with(b"-----") && kw.iter().all(|b| b.is_ascii_graphic())
}

/// Return true iff `tag` is a plausible object tag.
fn tag_ok(tag: &[u8]) -> bool {
    !tag.is_empty()
        && tag
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b' ' || b == b'-')
}

/// Check that a line inside an object could be base64.
///
/// This is mainly meant to stop an unterminated object from swallowing the
/// rest of the document.
fn b64_line_ok(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

fn split_keyword(line: &[u8]) -> IResult<&[u8], (&[u8], Option<&[u8]>)> {
    pair(
        take_till(|b: u8| b == b' '),
        opt(preceded(tag(&b" "[..]), rest)),
    )(line)
}

fn begin_tag(line: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(tag(BEGIN_STR), take_until(TAG_END), tag(TAG_END))(line)
}

fn end_tag(line: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(tag(END_STR), take_until(TAG_END), tag(TAG_END))(line)
}

/// A lazy cursor over the items of a buffer.
///
/// Once an error has been returned, the tokenizer yields nothing more.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    s: &'a [u8],
    off: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(s: &'a [u8]) -> Self {
        Tokenizer {
            s,
            off: 0,
            failed: false,
        }
    }

    /// Take the next line, returning its start offset and its content
    /// without the newline (and without a trailing carriage return).
    fn line(&mut self) -> Option<(usize, &'a [u8])> {
        if self.off >= self.s.len() {
            return None;
        }
        let start = self.off;
        let remainder = &self.s[start..];
        let (line, consumed) = match memchr(b'\n', remainder) {
            Some(nl) => (&remainder[..nl], nl + 1),
            None => (remainder, remainder.len()),
        };
        self.off += consumed;
        Some((start, line.strip_suffix(b"\r").unwrap_or(line)))
    }

    fn at_object(&self) -> bool {
        self.s[self.off..].starts_with(BEGIN_STR)
    }

    /// Read the object beginning at the current position.
    fn object(&mut self) -> Result<Object<'a>> {
        let (begin, line) = self
            .line()
            .ok_or(DocumentParseError::UnterminatedObject { offset: self.off })?;
        let tag = match begin_tag(line) {
            Ok((remaining, tag)) if remaining.is_empty() && tag_ok(tag) => tag,
            _ => return Err(DocumentParseError::BadObjectBeginTag { offset: begin }),
        };
        let data_start = self.off;
        loop {
            let (pos, line) = self
                .line()
                .ok_or(DocumentParseError::UnterminatedObject { offset: begin })?;
            if line.starts_with(END_STR) {
                let endtag = match end_tag(line) {
                    Ok((remaining, t)) if remaining.is_empty() => t,
                    _ => return Err(DocumentParseError::BadObjectEndTag { offset: pos }),
                };
                if endtag != tag {
                    return Err(DocumentParseError::BadObjectMismatchedTag { offset: pos });
                }
                // The tag was checked to be ASCII above.
                let tag = std::str::from_utf8(tag)
                    .map_err(|_| DocumentParseError::BadObjectBeginTag { offset: begin })?;
                return Ok(Object {
                    tag,
                    data: &self.s[data_start..pos],
                    span: RawSpan::new(begin, self.off - begin),
                });
            }
            if !b64_line_ok(line) {
                return Err(DocumentParseError::BadObjectBase64 { offset: pos });
            }
        }
    }

    /// Read the next item, skipping blank lines.
    fn item(&mut self) -> Result<Option<Item<'a>>> {
        let (start, line) = loop {
            match self.line() {
                None => return Ok(None),
                Some((_, line)) if line.is_empty() => continue,
                Some(found) => break found,
            }
        };
        if line.starts_with(BEGIN_STR) {
            return Err(DocumentParseError::ObjectWithoutItem { offset: start });
        }
        let (kwd, args) = match split_keyword(line) {
            // "opt" is an obsolete prefix marking the item as optional.
            Ok((_, (b"opt", Some(rest)))) => match split_keyword(rest) {
                Ok((_, parts)) => parts,
                Err(_) => return Err(DocumentParseError::BadKeyword { offset: start }),
            },
            Ok((_, parts)) => parts,
            Err(_) => return Err(DocumentParseError::BadKeyword { offset: start }),
        };
        if !keyword_ok(kwd) {
            return Err(DocumentParseError::BadKeyword { offset: start });
        }
        let keyword = std::str::from_utf8(kwd)
            .map_err(|_| DocumentParseError::BadKeyword { offset: start })?;
        let arguments = args.map(String::from_utf8_lossy);
        let object = if self.at_object() {
            Some(self.object()?)
        } else {
            None
        };
        Ok(Some(Item {
            keyword,
            arguments,
            object,
            span: RawSpan::new(start, self.off - start),
            raw: &self.s[start..self.off],
        }))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Item<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.item().transpose();
        if let Some(Err(_)) = next {
            self.failed = true;
        }
        next
    }
}

/// Name and version from a `@type <name> <major>.<minor>` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation<'a> {
    pub name: &'a str,
    pub major: u32,
    pub minor: u32,
}

/// A tokenized document: its leading annotations and its items.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    raw: &'a [u8],
    pub annotations: Vec<Item<'a>>,
    pub items: Vec<Item<'a>>,
}

impl<'a> Document<'a> {
    /// Tokenize one document.
    ///
    /// Annotation lines are only recognized before the first keyword line.
    pub fn parse(raw: &'a [u8]) -> Result<Document<'a>> {
        let mut annotations = Vec::new();
        let mut items = Vec::new();
        for item in Tokenizer::new(raw) {
            let item = item?;
            if items.is_empty() && item.is_annotation() {
                annotations.push(item);
            } else {
                items.push(item);
            }
        }
        if items.is_empty() {
            return Err(DocumentParseError::EmptyDocument);
        }
        Ok(Document {
            raw,
            annotations,
            items,
        })
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The first non-annotation item.
    pub fn first_item(&self) -> &Item<'a> {
        // `parse` refuses documents without items.
        &self.items[0]
    }

    /// The annotation lines, verbatim.
    pub fn annotation_lines(&self) -> Vec<String> {
        self.annotations.iter().map(|a| a.verbatim()).collect()
    }

    /// The first item with the given keyword.
    pub fn get(&self, keyword: &str) -> Option<&Item<'a>> {
        self.items.iter().find(|i| i.keyword == keyword)
    }

    /// The parsed `@type` annotation, if present.
    pub fn type_annotation(&self) -> Option<TypeAnnotation<'_>> {
        self.annotations
            .iter()
            .find(|a| a.keyword == "@type")
            .and_then(|a| parse_type_annotation(a.args_str()))
    }
}

/// Parse the arguments of a `@type` annotation, e.g. `server-descriptor 1.0`.
pub fn parse_type_annotation(args: &str) -> Option<TypeAnnotation<'_>> {
    let mut parts = args.split(' ').filter(|s| !s.is_empty());
    let name = parts.next()?;
    let (major, minor) = match parts.next() {
        Some(v) => {
            let (major, minor) = v.split_once('.')?;
            (major.parse().ok()?, minor.parse().ok()?)
        }
        None => (1, 0),
    };
    Some(TypeAnnotation { name, major, minor })
}

#[cfg(test)]
mod test {
    use super::*;

    fn items(s: &str) -> Result<Vec<Item<'_>>> {
        Tokenizer::new(s.as_bytes()).collect()
    }

    #[test]
    fn simple_lines() {
        let v = items("router foo 1.2.3.4 9001 0 0\nhibernating 1\nrouter-signature\n").unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v[0].keyword, "router");
        assert_eq!(
            v[0].split_arguments().unwrap(),
            vec!["foo", "1.2.3.4", "9001", "0", "0"]
        );
        assert_eq!(v[1].required_arg(0).unwrap(), "1");
        assert!(v[2].arguments.is_none());
        assert!(v[2].split_arguments().is_err());
        assert_eq!(v[2].args(), Vec::<&str>::new());
    }

    #[test]
    fn opt_prefix() {
        let v = items("opt fingerprint AAAA BBBB\nopt\n").unwrap();
        assert_eq!(v[0].keyword, "fingerprint");
        assert_eq!(v[0].args_str(), "AAAA BBBB");
        assert_eq!(v[0].verbatim(), "opt fingerprint AAAA BBBB");
        assert_eq!(v[1].keyword, "opt");
    }

    #[test]
    fn free_text_arguments() {
        let v = items("contact Some One <someone AT example dot com>\n").unwrap();
        assert_eq!(
            v[0].get_argument().unwrap(),
            "Some One <someone AT example dot com>"
        );
    }

    #[test]
    fn objects() {
        let s = "onion-key\n-----BEGIN RSA PUBLIC KEY-----\nAAAA\nBBBB\n-----END RSA PUBLIC KEY-----\nuptime 5\n";
        let v = items(s).unwrap();
        assert_eq!(v.len(), 2);
        let obj = v[0].object.unwrap();
        assert_eq!(obj.tag(), "RSA PUBLIC KEY");
        assert_eq!(obj.data_joined(), "AAAABBBB");
        assert_eq!(obj.decode().unwrap(), vec![0, 0, 0, 4, 16, 65]);
        assert_eq!(v[0].span(), RawSpan::new(0, s.find("uptime").unwrap()));
        assert_eq!(v[1].keyword, "uptime");
        assert_eq!(
            v[0].verbatim(),
            "onion-key\n-----BEGIN RSA PUBLIC KEY-----\nAAAA\nBBBB\n-----END RSA PUBLIC KEY-----"
        );
    }

    #[test]
    fn bad_objects() {
        let e = items("-----BEGIN FOO-----\nAAAA\n-----END FOO-----\n").unwrap_err();
        assert_eq!(e, DocumentParseError::ObjectWithoutItem { offset: 0 });

        let e = items("x\n-----BEGIN FOO-----\nAAAA\n").unwrap_err();
        assert_eq!(e, DocumentParseError::UnterminatedObject { offset: 2 });

        let e = items("x\n-----BEGIN FOO-----\nAAAA\n-----END BAR-----\n").unwrap_err();
        assert_eq!(e, DocumentParseError::BadObjectMismatchedTag { offset: 27 });

        let e = items("x\n-----BEGIN FOO-----\nAAAA\nuptime 5\n").unwrap_err();
        assert_eq!(e, DocumentParseError::BadObjectBase64 { offset: 27 });

        let e = items("x\n-----BEGIN FOO\n").unwrap_err();
        assert_eq!(e, DocumentParseError::BadObjectBeginTag { offset: 2 });
    }

    #[test]
    fn stops_after_error() {
        let mut t = Tokenizer::new(b"a\n-----BEGIN X-----\n!!\n-----END X-----\nb\n");
        assert!(t.next().unwrap().is_err());
        assert!(t.next().is_none());
    }

    #[test]
    fn blank_lines_crlf_and_final_newline() {
        let v = items("a 1\r\n\nb 2").unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].args_str(), "1");
        assert_eq!(v[1].args_str(), "2");
    }

    #[test]
    fn non_utf8_arguments() {
        let raw = b"contact caf\xe9\nuptime 1\n";
        let v: Vec<_> = Tokenizer::new(raw).collect::<Result<_>>().unwrap();
        assert_eq!(v[0].args_str(), "caf\u{fffd}");
        assert_eq!(v[1].keyword, "uptime");
    }

    #[test]
    fn bad_keyword() {
        let e = items("ok 1\nb\u{7}ad 2\n").unwrap_err();
        assert_eq!(e, DocumentParseError::BadKeyword { offset: 5 });
    }

    #[test]
    fn document_annotations() {
        let s = "@type server-descriptor 1.0\n@downloaded-at 2020-01-01 00:00:00\nrouter a\n@late x\n";
        let doc = Document::parse(s.as_bytes()).unwrap();
        assert_eq!(doc.annotations.len(), 2);
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.first_item().keyword, "router");
        assert_eq!(
            doc.type_annotation(),
            Some(TypeAnnotation {
                name: "server-descriptor",
                major: 1,
                minor: 0
            })
        );
        assert_eq!(doc.annotation_lines()[1], "@downloaded-at 2020-01-01 00:00:00");

        assert_eq!(
            Document::parse(b"@type foo 1.0\n").unwrap_err(),
            DocumentParseError::EmptyDocument
        );
    }

    #[test]
    fn fingerprints() {
        let a = Fingerprint::from_str_hex("0A3057AF2910415794D8EA430309D9AC5F5D524B").unwrap();
        let b = Fingerprint::from_str_hex("0a30 57af 2910 4157 94d8 ea43 0309 d9ac 5f5d 524b").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0A3057AF2910415794D8EA430309D9AC5F5D524B");
        assert_eq!(a.to_hex_lower(), "0a3057af2910415794d8ea430309d9ac5f5d524b");
        let c = Fingerprint::from_str_b64("CjBXrykQQVeU2OpDAwnZrF9dUks").unwrap();
        assert_eq!(a, c);
        assert!(Fingerprint::from_str_hex("0A30").is_err());
        assert!(Fingerprint::from_str_b64("CjBX").is_err());
    }

    #[test]
    fn raw_bytes() {
        let buf: Arc<[u8]> = Arc::from(&b"hello world"[..]);
        let all = RawBytes::new(buf.clone());
        let w = all.sub(RawSpan::new(6, 5)).unwrap();
        assert_eq!(w.as_bytes(), b"world");
        assert_eq!(w.span(), RawSpan::new(6, 5));
        assert!(all.sub(RawSpan::new(6, 6)).is_none());
        assert!(RawBytes::with_span(buf.clone(), RawSpan::new(10, 2)).is_none());
        assert!(RawBytes::with_span(buf, RawSpan::new(usize::MAX, 2)).is_none());
        assert!(all.sub(RawSpan::new(usize::MAX - 1, 5)).is_none());
        assert_eq!(RawSpan::new(usize::MAX, 2).slice(b"abc"), None);
        assert_eq!(w, RawBytes::copy_from(b"world"));
    }
}
