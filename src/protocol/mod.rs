//! Wire protocol for Agent Matrix.
//!
//! - Message envelopes with `src`/`dst` routing and keyword arguments
//! - Frame codec used by every transport

pub mod codec;
pub mod envelope;

pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, CONNECT_COMMAND, MATRIX_ID, UNSUPPORTED_COMMAND};
