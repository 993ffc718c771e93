//! Frame codec for envelopes.

use super::envelope::Envelope;
use crate::error::{Error, Result};

/// Turns envelopes into frame payloads and back. Must round-trip.
pub trait Codec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>>;
    fn decode(&self, frame: &[u8]) -> Result<Envelope>;
}

/// JSON codec, the default for the WebSocket endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        serde_json::to_vec(envelope).map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope> {
        serde_json::from_slice(frame).map_err(|e| Error::Codec(e.to_string()))
    }
}
