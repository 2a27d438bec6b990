//! MIDI protocol layer for the midideck control surface.
//!
//! Wire-format concerns only: status bytes and controller numbers, 7-bit
//! packing helpers, the timestamped stream-record codec consumed by the
//! output engine, and SysEx byte templates. No device I/O lives here.

pub mod defs;
pub mod error;
pub mod stream;
pub mod sysex;

pub use error::{Error, Result};
pub use stream::{records, StreamBuffer, StreamRecord, StreamRecords};
