//! Traffic decoders
//!
//! A decoder observes one direction of a proxied session: every chunk read
//! from a connection is fed to that connection's decoder before it is
//! forwarded. Decoding is strictly best-effort; a decoder failure must never
//! stop or delay forwarding, so `decode` cannot return an error.
//!
//! Two variants exist: [`DtxDecoder`] reassembles DTX-framed protocol
//! messages, [`BinDumpDecoder`] records the raw stream without
//! interpretation. Each decoder appends structured records to a `.json`
//! sidecar and raw bytes to a `.bin` sidecar.

pub mod bindump;
pub mod dtx;
mod sink;

use std::path::PathBuf;

pub use bindump::BinDumpDecoder;
pub use dtx::DtxDecoder;

/// Observational decoder for one direction of a session
pub trait Decoder: Send {
    /// Feed one raw chunk, in read order
    ///
    /// Chunk boundaries are transport artifacts: a chunk may hold a partial
    /// protocol message or several messages.
    fn decode(&mut self, bytes: &[u8]);
}

/// Constructor stored in a service configuration entry
///
/// Arguments are the structured sidecar path, the raw sidecar path, and a
/// session label used in log messages.
pub type DecoderFactory = fn(PathBuf, PathBuf, String) -> Box<dyn Decoder>;

/// Create a DTX protocol decoder
pub fn new_dtx_decoder(json_path: PathBuf, bin_path: PathBuf, label: String) -> Box<dyn Decoder> {
    Box::new(DtxDecoder::new(json_path, bin_path, label))
}

/// Create a raw binary dump decoder
pub fn new_bin_dump_decoder(json_path: PathBuf, bin_path: PathBuf, label: String) -> Box<dyn Decoder> {
    Box::new(BinDumpDecoder::new(json_path, bin_path, label))
}
