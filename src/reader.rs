//! Reading documents from several sources at once.
//!
//! Each [`DocumentSource`] gets its own producer thread, which runs the
//! batch parser over every buffer the source yields and pushes the results
//! into a bounded queue. The consumer drains the queue through a
//! [`ParsedStream`]. Dropping the stream stops the producers before their
//! next document.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use crate::batch::DescriptorParser;
use crate::config::ReaderConfig;
use crate::document::ParseResult;

//
// External dependencies
//
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};

/// One buffer of documents, as delivered by a source.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    pub raw: Arc<[u8]>,
    pub file_name: Option<String>,
    pub source_file: Option<PathBuf>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl SourceBuffer {
    pub fn new(raw: impl Into<Arc<[u8]>>) -> Self {
        SourceBuffer {
            raw: raw.into(),
            file_name: None,
            source_file: None,
            last_modified: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.source_file = Some(path);
        self
    }

    pub fn with_last_modified(mut self, when: DateTime<Utc>) -> Self {
        self.last_modified = Some(when);
        self
    }
}

/// Files that were already read, with the modification time they had then.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    seen: HashMap<PathBuf, DateTime<Utc>>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, last_modified: DateTime<Utc>) {
        self.seen.insert(path.into(), last_modified);
    }

    /// Remember the file a document came from.
    pub fn record(&mut self, doc: &ReadDocument) {
        if let (Some(path), Some(when)) = (&doc.source_file, doc.last_modified) {
            self.insert(path.clone(), when);
        }
    }

    /// True if `path` was read before and has not changed since.  Without
    /// a modification time, having seen the path is enough.
    pub fn is_excluded(&self, path: &Path, last_modified: Option<DateTime<Utc>>) -> bool {
        match (self.seen.get(path), last_modified) {
            (Some(seen), Some(modified)) => modified <= *seen,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Where a reader gets its buffers from.
///
/// Implementations do the actual I/O. They may consult the exclusion set
/// to skip files that were read before.
pub trait DocumentSource: Send {
    /// The next buffer, or `None` once the source is exhausted.
    fn next_buffer(&mut self, exclusions: &ExclusionSet) -> Option<SourceBuffer>;
}

/// A source over buffers that are already in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    buffers: VecDeque<SourceBuffer>,
}

impl InMemorySource {
    pub fn new(buffers: impl IntoIterator<Item = SourceBuffer>) -> Self {
        InMemorySource {
            buffers: buffers.into_iter().collect(),
        }
    }

    pub fn push(&mut self, buffer: SourceBuffer) {
        self.buffers.push_back(buffer);
    }
}

impl DocumentSource for InMemorySource {
    fn next_buffer(&mut self, exclusions: &ExclusionSet) -> Option<SourceBuffer> {
        while let Some(buffer) = self.buffers.pop_front() {
            let excluded = buffer
                .source_file
                .as_deref()
                .map_or(false, |p| exclusions.is_excluded(p, buffer.last_modified));
            if !excluded {
                return Some(buffer);
            }
            debug!("skipping already read {:?}", buffer.source_file);
        }
        None
    }
}

/// A parse result together with the file it was read from.
#[derive(Debug, Clone)]
pub struct ReadDocument {
    pub source_file: Option<PathBuf>,
    pub last_modified: Option<DateTime<Utc>>,
    pub result: ParseResult,
}

/// Runs sources on producer threads and hands out their results.
pub struct DescriptorReader {
    config: ReaderConfig,
    sources: Vec<Box<dyn DocumentSource>>,
    exclusions: ExclusionSet,
}

impl DescriptorReader {
    pub fn new(config: ReaderConfig) -> Self {
        DescriptorReader {
            config,
            sources: Vec::new(),
            exclusions: ExclusionSet::default(),
        }
    }

    pub fn add_source(&mut self, source: impl DocumentSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn set_exclusions(&mut self, exclusions: ExclusionSet) {
        self.exclusions = exclusions;
    }

    /// Start one producer per source and return the stream of results.
    ///
    /// Results of one source keep their order; results of different
    /// sources interleave.
    pub fn read(self) -> ParsedStream {
        let capacity = self.config.max_documents_in_queue.max(1);
        let (sender, receiver) = bounded(capacity);
        let cancel = Arc::new(AtomicBool::new(false));
        let exclusions = Arc::new(self.exclusions);
        let parser = DescriptorParser::new(self.config);

        let mut handles = Vec::with_capacity(self.sources.len());
        for (idx, source) in self.sources.into_iter().enumerate() {
            let producer = Producer {
                source,
                parser: parser.clone(),
                exclusions: Arc::clone(&exclusions),
                sender: sender.clone(),
                cancel: Arc::clone(&cancel),
            };
            match Builder::new()
                .name(format!("netdesc-source-{idx}"))
                .spawn(move || producer.run())
            {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("could not start reader thread for source {idx}: {e}"),
            }
        }
        debug!(
            "reading from {} sources, queue capacity {}",
            handles.len(),
            capacity
        );

        ParsedStream {
            receiver: Some(receiver),
            cancel,
            handles,
        }
    }
}

struct Producer {
    source: Box<dyn DocumentSource>,
    parser: DescriptorParser,
    exclusions: Arc<ExclusionSet>,
    sender: Sender<ReadDocument>,
    cancel: Arc<AtomicBool>,
}

impl Producer {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn run(mut self) {
        let mut sent = 0usize;
        'buffers: while !self.cancelled() {
            let buffer = match self.source.next_buffer(&self.exclusions) {
                Some(b) => b,
                None => break,
            };
            let docs = self.parser.parse_descriptors(
                Arc::clone(&buffer.raw),
                buffer.source_file.as_deref(),
                buffer.file_name.as_deref(),
            );
            for result in docs {
                let doc = ReadDocument {
                    source_file: buffer.source_file.clone(),
                    last_modified: buffer.last_modified,
                    result,
                };
                // fails only once the consumer is gone
                if self.sender.send(doc).is_err() {
                    break 'buffers;
                }
                sent += 1;
                if self.cancelled() {
                    break 'buffers;
                }
            }
        }
        debug!("reader thread done after {sent} documents");
    }
}

/// The results of a [`DescriptorReader`].
///
/// Blocks while the queue is empty and ends when every source is done.
pub struct ParsedStream {
    receiver: Option<Receiver<ReadDocument>>,
    cancel: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ParsedStream {
    /// Stop all producers and wait for them to exit.
    ///
    /// Dropping the stream does the same; this only makes the point explicit.
    pub fn close(self) {
        drop(self);
    }
}

impl Iterator for ParsedStream {
    type Item = ReadDocument;

    fn next(&mut self) -> Option<ReadDocument> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for ParsedStream {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // unblocks producers waiting on a full queue
        self.receiver.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("a reader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn pool(hour: u32) -> String {
        format!(
            "bridge-pool-assignment 2022-08-01 {hour:02}:00:00\n\
             00e923e7a8d87d28954fee7503e480f3a03ce4ee email\n"
        )
    }

    struct Counting {
        inner: InMemorySource,
        pulled: Arc<AtomicUsize>,
    }

    impl DocumentSource for Counting {
        fn next_buffer(&mut self, exclusions: &ExclusionSet) -> Option<SourceBuffer> {
            let b = self.inner.next_buffer(exclusions)?;
            self.pulled.fetch_add(1, Ordering::SeqCst);
            Some(b)
        }
    }

    fn counting(n: usize) -> (Counting, Arc<AtomicUsize>) {
        let pulled = Arc::new(AtomicUsize::new(0));
        let buffers = (0..n).map(|i| SourceBuffer::new(pool((i % 24) as u32).as_bytes()));
        let source = Counting {
            inner: InMemorySource::new(buffers),
            pulled: Arc::clone(&pulled),
        };
        (source, pulled)
    }

    #[test]
    fn exclusions() {
        let t = |h| DateTime::parse_from_rfc3339(h).unwrap().with_timezone(&Utc);
        let mut set = ExclusionSet::new();
        set.insert("/a", t("2022-08-01T10:00:00Z"));
        assert!(set.is_excluded(Path::new("/a"), Some(t("2022-08-01T10:00:00Z"))));
        assert!(set.is_excluded(Path::new("/a"), None));
        assert!(!set.is_excluded(Path::new("/a"), Some(t("2022-08-01T11:00:00Z"))));
        assert!(!set.is_excluded(Path::new("/b"), None));

        let mut source = InMemorySource::new([
            SourceBuffer::new(pool(1).as_bytes())
                .with_file("/a")
                .with_last_modified(t("2022-08-01T09:00:00Z")),
            SourceBuffer::new(pool(2).as_bytes()).with_file("/b"),
        ]);
        let next = source.next_buffer(&set).unwrap();
        assert_eq!(next.file_name.as_deref(), Some("b"));
        assert!(source.next_buffer(&set).is_none());
    }

    #[test]
    fn all_sources_drained() {
        let mut reader = DescriptorReader::new(ReaderConfig::default());
        for _ in 0..3 {
            reader.add_source(InMemorySource::new(
                (0..4).map(|h| SourceBuffer::new(pool(h).as_bytes())),
            ));
        }
        let docs: Vec<_> = reader.read().collect();
        assert_eq!(docs.len(), 12);
        assert!(docs.iter().all(|d| d.result.is_parsed()));
    }

    #[test]
    fn backpressure() {
        let (source, pulled) = counting(5);
        let mut reader = DescriptorReader::new(ReaderConfig {
            max_documents_in_queue: 1,
            ..ReaderConfig::default()
        });
        reader.add_source(source);
        let stream = reader.read();
        thread::sleep(Duration::from_millis(100));
        // one document queued, one waiting to be sent
        assert!(pulled.load(Ordering::SeqCst) <= 2);
        assert_eq!(stream.count(), 5);
        assert_eq!(pulled.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn cancellation() {
        let (source, pulled) = counting(1000);
        let mut reader = DescriptorReader::new(ReaderConfig {
            max_documents_in_queue: 1,
            ..ReaderConfig::default()
        });
        reader.add_source(source);
        let mut stream = reader.read();
        assert!(stream.next().is_some());
        assert!(stream.next().is_some());
        stream.close();
        assert!(pulled.load(Ordering::SeqCst) < 1000);
    }

    #[test]
    fn records_feed_exclusions() {
        let when = Utc::now();
        let mut reader = DescriptorReader::new(ReaderConfig::default());
        reader.add_source(InMemorySource::new([SourceBuffer::new(pool(3).as_bytes())
            .with_file("/archive/pool-1")
            .with_last_modified(when)]));
        let mut seen = ExclusionSet::new();
        for doc in reader.read() {
            seen.record(&doc);
        }
        assert_eq!(seen.len(), 1);
        assert!(seen.is_excluded(Path::new("/archive/pool-1"), Some(when)));
    }
}
