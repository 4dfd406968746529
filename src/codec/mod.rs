//! Codec Module
//!
//! Turns arbitrary values into stored bytes and back.
//!
//! ## Responsibilities
//! - Encode common scalar/container shapes with the fast format
//! - Fall back to a general object format for everything else
//! - Tag every record with the format that wrote it
//! - Decode strictly by tag, never by sniffing the payload
//!
//! ## Record Format
//! ```text
//! ┌──────────┬─────────────────────────────────────┐
//! │ Tag (1)  │              Payload                │
//! └──────────┴─────────────────────────────────────┘
//! ```
//!
//! ### Tags
//! - 0x01: FAST     - MessagePack encoding of a [`Value`]
//! - 0x02: FALLBACK - bincode encoding of the value's full serde tree
//!
//! Fast payloads can be decoded into [`Value`] or into any compatible type.
//! Fallback payloads keep every detail of the serde data model (options,
//! enum variants, wide integers) and are meant to be decoded into the type
//! that wrote them. Both formats write map entries in a canonical order, so
//! equal keys encode to equal bytes.

mod de;
mod packed;
mod ser;
mod tree;
mod value;

pub use de::from_value;
pub use ser::to_value;
pub use value::Value;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::{Result, VaultError};
use packed::Packed;
use tree::Node;

/// Size of the format tag in front of every record
pub const TAG_SIZE: usize = 1;

/// Error raised while moving between Rust values and [`Value`]
#[derive(Debug, Error)]
pub enum ValueError {
    /// The shape has no fast-format representation
    #[error("not representable in the fast format: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Message(String),
}

impl serde::ser::Error for ValueError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        ValueError::Message(msg.to_string())
    }
}

impl serde::de::Error for ValueError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        ValueError::Message(msg.to_string())
    }
}

/// Which codec wrote a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    Fast = 0x01,
    Fallback = 0x02,
}

impl Format {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(Format::Fast),
            0x02 => Ok(Format::Fallback),
            _ => Err(VaultError::Decode(format!(
                "Unknown format tag: 0x{:02x}",
                tag
            ))),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value, preferring the fast format
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    match to_value(value) {
        Ok(fast) => encode_value(fast),
        Err(ValueError::Unsupported(reason)) => {
            tracing::trace!(%reason, "Value not fast-eligible, using fallback format");
            encode_fallback(value)
        }
        Err(ValueError::Message(msg)) => Err(VaultError::Encode(msg)),
    }
}

/// Encode an already-built [`Value`] with the fast format
pub fn encode_value(value: Value) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(&Packed::from(value))
        .map_err(|e| VaultError::Encode(e.to_string()))?;
    Ok(frame(Format::Fast, payload))
}

fn encode_fallback<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let node = tree::to_node(value).map_err(|e| VaultError::Encode(e.to_string()))?;
    let payload = bincode::serialize(&node).map_err(|e| VaultError::Encode(e.to_string()))?;
    Ok(frame(Format::Fallback, payload))
}

fn frame(format: Format, payload: Vec<u8>) -> Vec<u8> {
    let mut record = Vec::with_capacity(TAG_SIZE + payload.len());
    record.push(format.tag());
    record.extend_from_slice(&payload);
    record
}

// =============================================================================
// Decoding
// =============================================================================

/// Split a record into its format and payload
pub fn split(record: &[u8]) -> Result<(Format, &[u8])> {
    let (&tag, payload) = record
        .split_first()
        .ok_or_else(|| VaultError::Decode("Empty record: missing format tag".to_string()))?;
    Ok((Format::from_tag(tag)?, payload))
}

/// Decode a record into `T` using the decoder its tag names
pub fn decode<T: DeserializeOwned>(record: &[u8]) -> Result<T> {
    let (format, payload) = split(record)?;
    match format {
        Format::Fast => {
            let value = unpack(payload)?;
            from_value(value).map_err(|e| VaultError::Decode(e.to_string()))
        }
        Format::Fallback => {
            let node: Node =
                bincode::deserialize(payload).map_err(|e| VaultError::Decode(e.to_string()))?;
            tree::from_node(node).map_err(|e| VaultError::Decode(e.to_string()))
        }
    }
}

/// Decode a fast record into its dynamic [`Value`] form
///
/// Fallback records are rejected: they are not limited to the shapes a
/// [`Value`] can hold.
pub fn decode_value(record: &[u8]) -> Result<Value> {
    match split(record)? {
        (Format::Fast, payload) => unpack(payload),
        (Format::Fallback, _) => Err(VaultError::Decode(
            "Fallback record can only be decoded into its concrete type".to_string(),
        )),
    }
}

fn unpack(payload: &[u8]) -> Result<Value> {
    let packed: Packed =
        rmp_serde::from_slice(payload).map_err(|e| VaultError::Decode(e.to_string()))?;
    Ok(Value::from(packed))
}
