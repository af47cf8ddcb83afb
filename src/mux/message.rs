//! Control message framing
//!
//! A control message is a 16 byte little-endian header followed by an opaque
//! payload. `length` counts the header itself.

use bytes::Bytes;
use serde::Deserialize;

use crate::common::{ProxyError, Result};

/// Size of the fixed message header
pub const MUX_HEADER_LEN: usize = 16;

/// Protocol version carried in every header
pub const MUX_VERSION: u32 = 1;

/// Upper bound on a control message, headers included.
/// Control payloads are small; anything larger is a framing error.
pub const MAX_MESSAGE_LEN: u32 = 1024 * 1024;

/// Fixed control message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxHeader {
    /// Total message length including this header
    pub length: u32,
    /// Protocol version
    pub version: u32,
    /// Message kind discriminator
    pub message: u32,
    /// Request/response correlation tag
    pub tag: u32,
}

impl MuxHeader {
    /// Decode a header from exactly [`MUX_HEADER_LEN`] bytes
    pub fn decode(bytes: &[u8; MUX_HEADER_LEN]) -> Result<Self> {
        let header = Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            message: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            tag: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        };

        if header.length < MUX_HEADER_LEN as u32 {
            return Err(ProxyError::Mux(format!(
                "message length {} shorter than header",
                header.length
            )));
        }
        if header.length > MAX_MESSAGE_LEN {
            return Err(ProxyError::Mux(format!(
                "message length {} exceeds limit",
                header.length
            )));
        }

        Ok(header)
    }

    /// Encode this header into its wire form
    pub fn encode(&self) -> [u8; MUX_HEADER_LEN] {
        let mut bytes = [0u8; MUX_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.message.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.tag.to_le_bytes());
        bytes
    }
}

/// One framed control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxMessage {
    /// Message header
    pub header: MuxHeader,
    /// Opaque payload, relayed verbatim
    pub payload: Bytes,
}

impl MuxMessage {
    /// Build a message, filling in the length field
    pub fn new(message: u32, tag: u32, payload: Bytes) -> Self {
        Self {
            header: MuxHeader {
                length: (MUX_HEADER_LEN + payload.len()) as u32,
                version: MUX_VERSION,
                message,
                tag,
            },
            payload,
        }
    }
}

/// Decoded "connect to service" request payload
///
/// Only the fields the session manager routes on are decoded; everything
/// else stays in the opaque payload and is relayed untouched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Payload discriminator, `Connect` for connect requests
    #[serde(rename = "MessageType")]
    pub message_type: String,
    /// Device port of the requested service
    #[serde(rename = "PortNumber")]
    pub port: u16,
}

impl ConnectRequest {
    /// Try to read a payload as a connect request
    ///
    /// Returns `None` for payloads that are not connect requests, including
    /// ones this proxy cannot parse at all; those are simply relayed.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let request: ConnectRequest = serde_json::from_slice(payload).ok()?;
        if request.message_type == "Connect" {
            Some(request)
        } else {
            None
        }
    }
}
