//! Settings for batch parsing and the concurrent reader.

use serde::{Deserialize, Serialize};

/// Configuration of a [`DescriptorReader`](crate::reader::DescriptorReader)
/// and of the batch parser it drives.
///
/// Deserializable from any serde format; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Capacity of the queue between producers and the consumer.
    pub max_documents_in_queue: usize,
    /// Treat a document with unrecognized lines as unparseable.
    pub fail_on_unrecognized_lines: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            max_documents_in_queue: 100,
            fail_on_unrecognized_lines: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let c: ReaderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, ReaderConfig::default());
        assert_eq!(c.max_documents_in_queue, 100);
        assert!(!c.fail_on_unrecognized_lines);

        let c: ReaderConfig =
            serde_json::from_str(r#"{"fail_on_unrecognized_lines": true}"#).unwrap();
        assert!(c.fail_on_unrecognized_lines);
        assert_eq!(c.max_documents_in_queue, 100);
    }
}
