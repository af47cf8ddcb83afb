//! Raw binary dump decoder
//!
//! Records traffic with no structural interpretation: every chunk is
//! appended to the binary sidecar, and one JSON record per chunk notes where
//! it landed. This is the catch-all decoder for services without a known
//! protocol.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use super::sink::RecordSink;
use super::Decoder;

/// Pass-through decoder dumping raw bytes
pub struct BinDumpDecoder {
    sink: RecordSink,
    offset: u64,
}

impl BinDumpDecoder {
    pub fn new(json_path: PathBuf, bin_path: PathBuf, label: String) -> Self {
        Self {
            sink: RecordSink::new(json_path, bin_path, label),
            offset: 0,
        }
    }
}

impl Decoder for BinDumpDecoder {
    fn decode(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        self.sink.record(&json!({
            "time": Utc::now().to_rfc3339(),
            "offset": self.offset,
            "length": bytes.len(),
        }));
        self.sink.raw(bytes);
        self.offset += bytes.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_chunks_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("to-device.json");
        let bin_path = dir.path().join("to-device.bin");

        let mut decoder =
            BinDumpDecoder::new(json_path.clone(), bin_path.clone(), "test".to_string());
        decoder.decode(b"hello ");
        decoder.decode(b"world");

        assert_eq!(fs::read(&bin_path).unwrap(), b"hello world");

        let records: Vec<serde_json::Value> = fs::read_to_string(&json_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["offset"], 0);
        assert_eq!(records[0]["length"], 6);
        assert_eq!(records[1]["offset"], 6);
        assert_eq!(records[1]["length"], 5);
    }

    #[test]
    fn test_empty_chunk_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("x.json");
        let bin_path = dir.path().join("x.bin");

        let mut decoder =
            BinDumpDecoder::new(json_path.clone(), bin_path.clone(), "test".to_string());
        decoder.decode(b"");

        // Sinks open lazily, so nothing was even created.
        assert!(!json_path.exists());
        assert!(!bin_path.exists());
    }

    #[test]
    fn test_unwritable_sink_does_not_panic() {
        let mut decoder = BinDumpDecoder::new(
            PathBuf::from("/nonexistent-dir/x.json"),
            PathBuf::from("/nonexistent-dir/x.bin"),
            "test".to_string(),
        );

        // Decoding must survive a sink that cannot be opened.
        decoder.decode(b"data");
        decoder.decode(b"more data");
    }
}
