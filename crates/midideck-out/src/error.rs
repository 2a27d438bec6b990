//! Error types for the output engine.
//!
//! Only hard failures become errors. Oversize payloads and out-of-range
//! tempo/marker values are silently dropped by the stream layer, and a busy
//! hardware slot is reported as the boolean result of
//! [`stream_flush`](crate::MidiOutput::stream_flush), not as an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("transport rejected operation: {0}")]
    TransportRejected(String),

    #[error("invalid MIDI channel {0} (expected 0-15)")]
    InvalidChannel(u8),

    #[error("output is not open in the required mode")]
    NotOpen,

    #[error("instrument limit reached ({0})")]
    InstrumentLimit(usize),

    #[error(transparent)]
    Template(#[from] midideck_midi::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
