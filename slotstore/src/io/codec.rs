//! Byte encoding of [`StoreData`] for persistence.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::core::types::StoreData;

/// Current on-disk save format version.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Converts store state to bytes and back.
///
/// `decode(encode(data))` must reproduce `data` exactly.
pub trait Codec: Send + Sync {
    fn encode(&self, data: &StoreData) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<StoreData>;
}

/// JSON codec writing a versioned envelope:
/// `{ "version": 1, "data": { "general": [...], "inventories": [...] } }`.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    /// Pretty-print with a trailing newline (human-diffable saves).
    pub pretty: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    data: &'a StoreData,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: StoreData,
}

impl Codec for JsonCodec {
    fn encode(&self, data: &StoreData) -> Result<Vec<u8>> {
        let envelope = EnvelopeRef {
            version: SAVE_FORMAT_VERSION,
            data,
        };
        let bytes = if self.pretty {
            let mut buf = serde_json::to_vec_pretty(&envelope).context("encode save")?;
            buf.push(b'\n');
            buf
        } else {
            serde_json::to_vec(&envelope).context("encode save")?
        };
        debug!(bytes = bytes.len(), "encoded save");
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoreData> {
        let envelope: Envelope = serde_json::from_slice(bytes).context("decode save")?;
        if envelope.version != SAVE_FORMAT_VERSION {
            bail!(
                "unsupported save format version {} (expected {})",
                envelope.version,
                SAVE_FORMAT_VERSION
            );
        }
        let errors = validate_invariants(&envelope.data);
        if !errors.is_empty() {
            return Err(anyhow!("save invariants failed: {}", errors.join("; ")));
        }
        Ok(envelope.data)
    }
}
