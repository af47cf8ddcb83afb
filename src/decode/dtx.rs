//! DTX protocol decoder
//!
//! Reassembles DTX-framed messages from an arbitrary chunked byte stream.
//! A frame is a 32 byte little-endian header followed by the fragment
//! payload; the first fragment of a multi-fragment message carries no
//! payload of its own. On garbage the decoder resynchronizes by scanning
//! for the next frame magic, recording how much it skipped.

use std::path::PathBuf;

use bytes::BytesMut;
use chrono::Utc;
use log::debug;
use serde_json::json;

use super::sink::RecordSink;
use super::Decoder;

/// Frame magic, first four little-endian bytes of every DTX header
pub const DTX_MESSAGE_MAGIC: u32 = 0x795B_3D1F;

/// Fixed DTX header size
pub const DTX_HEADER_LEN: usize = 32;

/// Sanity cap on a fragment payload; larger values mean a corrupt header
const MAX_FRAGMENT_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DtxHeader {
    header_length: u32,
    fragment_index: u16,
    fragment_count: u16,
    payload_length: u32,
    identifier: u32,
    conversation_index: u32,
    channel_code: u32,
    expects_reply: u32,
}

impl DtxHeader {
    /// Parse the fields after the magic; `bytes` must hold a full header.
    fn parse(bytes: &[u8]) -> Self {
        let field = |range: std::ops::Range<usize>| {
            u32::from_le_bytes(bytes[range].try_into().unwrap())
        };
        Self {
            header_length: field(4..8),
            fragment_index: u16::from_le_bytes(bytes[8..10].try_into().unwrap()),
            fragment_count: u16::from_le_bytes(bytes[10..12].try_into().unwrap()),
            payload_length: field(12..16),
            identifier: field(16..20),
            conversation_index: field(20..24),
            channel_code: field(24..28),
            expects_reply: field(28..32),
        }
    }

    fn is_sane(&self) -> bool {
        self.header_length as usize >= DTX_HEADER_LEN && self.payload_length <= MAX_FRAGMENT_LEN
    }

    /// Bytes of fragment payload that follow this header on the wire.
    /// The opening fragment of a multi-fragment message is header-only.
    fn body_length(&self) -> usize {
        if self.fragment_count > 1 && self.fragment_index == 0 {
            0
        } else {
            self.payload_length as usize
        }
    }
}

/// Decoder for DTX-framed services
pub struct DtxDecoder {
    sink: RecordSink,
    label: String,
    buffer: BytesMut,
    skipped: u64,
}

impl DtxDecoder {
    pub fn new(json_path: PathBuf, bin_path: PathBuf, label: String) -> Self {
        Self {
            sink: RecordSink::new(json_path, bin_path, label.clone()),
            label,
            buffer: BytesMut::new(),
            skipped: 0,
        }
    }

    /// Drop buffered garbage up to the next frame magic.
    ///
    /// Returns false when no magic was found, in which case all but the last
    /// three bytes (a possible magic prefix) have been discarded.
    fn resync(&mut self) -> bool {
        let magic = DTX_MESSAGE_MAGIC.to_le_bytes();

        for i in 1..self.buffer.len() {
            if self.buffer[i..].starts_with(&magic)
                || (self.buffer.len() - i < 4 && magic.starts_with(&self.buffer[i..]))
            {
                self.skip(i);
                return self.buffer.len() >= 4 && self.buffer[..4] == magic;
            }
        }

        let keep = self.buffer.len().min(3);
        let drop = self.buffer.len() - keep;
        if drop > 0 {
            self.skip(drop);
        }
        false
    }

    fn skip(&mut self, count: usize) {
        let garbage = self.buffer.split_to(count);
        self.sink.raw(&garbage);
        self.skipped += count as u64;
        self.sink.record(&json!({
            "time": Utc::now().to_rfc3339(),
            "resync": true,
            "skipped": count,
            "skipped_total": self.skipped,
        }));
        debug!("[{}] skipped {} bytes while looking for DTX magic", self.label, count);
    }

    fn record_frame(&mut self, header: &DtxHeader, payload: &[u8]) {
        self.sink.record(&json!({
            "time": Utc::now().to_rfc3339(),
            "identifier": header.identifier,
            "channel": header.channel_code,
            "conversation_index": header.conversation_index,
            "expects_reply": header.expects_reply != 0,
            "fragment_index": header.fragment_index,
            "fragment_count": header.fragment_count,
            "length": header.payload_length,
        }));
        self.sink.raw(payload);
    }
}

impl Decoder for DtxDecoder {
    fn decode(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        loop {
            if self.buffer.len() < 4 {
                return;
            }

            if self.buffer[..4] != DTX_MESSAGE_MAGIC.to_le_bytes() {
                if !self.resync() {
                    return;
                }
            }

            if self.buffer.len() < DTX_HEADER_LEN {
                return;
            }

            let header = DtxHeader::parse(&self.buffer[..DTX_HEADER_LEN]);
            if !header.is_sane() {
                // Corrupt header: drop the magic and hunt for the next frame.
                let dropped = self.buffer.split_to(4);
                self.sink.raw(&dropped);
                self.skipped += 4;
                continue;
            }

            let frame_len = header.header_length as usize + header.body_length();
            if self.buffer.len() < frame_len {
                return;
            }

            let frame = self.buffer.split_to(frame_len);
            self.record_frame(&header, &frame[header.header_length as usize..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn encode_frame(identifier: u32, channel: u32, payload: &[u8]) -> Vec<u8> {
        encode_fragment(identifier, channel, 0, 1, payload.len() as u32, payload)
    }

    fn encode_fragment(
        identifier: u32,
        channel: u32,
        fragment_index: u16,
        fragment_count: u16,
        payload_length: u32,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = Vec::with_capacity(DTX_HEADER_LEN + payload.len());
        frame.extend_from_slice(&DTX_MESSAGE_MAGIC.to_le_bytes());
        frame.extend_from_slice(&(DTX_HEADER_LEN as u32).to_le_bytes());
        frame.extend_from_slice(&fragment_index.to_le_bytes());
        frame.extend_from_slice(&fragment_count.to_le_bytes());
        frame.extend_from_slice(&payload_length.to_le_bytes());
        frame.extend_from_slice(&identifier.to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes()); // conversation index
        frame.extend_from_slice(&channel.to_le_bytes());
        frame.extend_from_slice(&1u32.to_le_bytes()); // expects reply
        frame.extend_from_slice(payload);
        frame
    }

    fn read_records(path: &std::path::Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("d.json");
        let bin_path = dir.path().join("d.bin");

        let mut decoder = DtxDecoder::new(json_path.clone(), bin_path.clone(), "t".into());
        decoder.decode(&encode_frame(7, 2, b"payload"));

        let records = read_records(&json_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["identifier"], 7);
        assert_eq!(records[0]["channel"], 2);
        assert_eq!(records[0]["expects_reply"], true);
        assert_eq!(fs::read(&bin_path).unwrap(), b"payload");
    }

    #[test]
    fn test_frame_split_across_arbitrary_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("d.json");
        let bin_path = dir.path().join("d.bin");

        let frame = encode_frame(9, 4, b"split across chunks");

        // Feed one byte at a time; the frame must still reassemble.
        let mut decoder = DtxDecoder::new(json_path.clone(), bin_path.clone(), "t".into());
        for byte in &frame {
            decoder.decode(std::slice::from_ref(byte));
        }

        let records = read_records(&json_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["identifier"], 9);
        assert_eq!(fs::read(&bin_path).unwrap(), b"split across chunks");
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("d.json");

        let mut chunk = encode_frame(1, 0, b"first");
        chunk.extend_from_slice(&encode_frame(2, 0, b"second"));

        let mut decoder =
            DtxDecoder::new(json_path.clone(), dir.path().join("d.bin"), "t".into());
        decoder.decode(&chunk);

        let records = read_records(&json_path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["identifier"], 1);
        assert_eq!(records[1]["identifier"], 2);
    }

    #[test]
    fn test_resync_after_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("d.json");

        let mut chunk = b"leading garbage".to_vec();
        chunk.extend_from_slice(&encode_frame(5, 1, b"real"));

        let mut decoder =
            DtxDecoder::new(json_path.clone(), dir.path().join("d.bin"), "t".into());
        decoder.decode(&chunk);

        let records = read_records(&json_path);
        let resync = records.iter().find(|r| r["resync"] == true).unwrap();
        assert_eq!(resync["skipped"], "leading garbage".len());

        let frame = records.iter().find(|r| r["identifier"] == 5).unwrap();
        assert_eq!(frame["length"], 4);
    }

    #[test]
    fn test_multi_fragment_opening_header_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("d.json");
        let bin_path = dir.path().join("d.bin");

        // Opening fragment announces the total length but carries nothing;
        // the second fragment carries its own payload.
        let mut chunk = encode_fragment(3, 0, 0, 2, 6, b"");
        chunk.extend_from_slice(&encode_fragment(3, 0, 1, 2, 6, b"sixby!"));

        let mut decoder = DtxDecoder::new(json_path.clone(), bin_path.clone(), "t".into());
        decoder.decode(&chunk);

        let records = read_records(&json_path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["fragment_index"], 0);
        assert_eq!(records[1]["fragment_index"], 1);
        assert_eq!(fs::read(&bin_path).unwrap(), b"sixby!");
    }
}
