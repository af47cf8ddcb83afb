//! Decoder output sinks
//!
//! Both decoder variants write to a structured `.json` sidecar (one JSON
//! object per line) and a raw `.bin` sidecar. Files open lazily on first
//! write; if an open or write fails the sink logs once and degrades to a
//! no-op, keeping the session alive.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use log::warn;
use serde_json::Value;

pub(crate) struct RecordSink {
    json_path: PathBuf,
    bin_path: PathBuf,
    label: String,
    json: Option<File>,
    bin: Option<File>,
    failed: bool,
}

impl RecordSink {
    pub(crate) fn new(json_path: PathBuf, bin_path: PathBuf, label: String) -> Self {
        Self { json_path, bin_path, label, json: None, bin: None, failed: false }
    }

    /// Append one structured record as a JSON line
    pub(crate) fn record(&mut self, value: &Value) {
        if self.failed {
            return;
        }

        if self.json.is_none() {
            match open_append(&self.json_path) {
                Ok(file) => self.json = Some(file),
                Err(e) => {
                    warn!("[{}] disabling capture, cannot open {}: {}", self.label, self.json_path.display(), e);
                    self.failed = true;
                    return;
                }
            }
        }

        let file = self.json.as_mut().unwrap();
        if let Err(e) = writeln!(file, "{}", value) {
            warn!("[{}] disabling capture, write failed: {}", self.label, e);
            self.failed = true;
        }
    }

    /// Append raw bytes to the binary sidecar
    pub(crate) fn raw(&mut self, bytes: &[u8]) {
        if self.failed || bytes.is_empty() {
            return;
        }

        if self.bin.is_none() {
            match open_append(&self.bin_path) {
                Ok(file) => self.bin = Some(file),
                Err(e) => {
                    warn!("[{}] disabling capture, cannot open {}: {}", self.label, self.bin_path.display(), e);
                    self.failed = true;
                    return;
                }
            }
        }

        let file = self.bin.as_mut().unwrap();
        if let Err(e) = file.write_all(bytes) {
            warn!("[{}] disabling capture, write failed: {}", self.label, e);
            self.failed = true;
        }
    }
}

fn open_append(path: &PathBuf) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
