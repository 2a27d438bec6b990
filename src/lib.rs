//! # midideck: desktop MIDI control surface core
//!
//! Umbrella crate coordinating the two midideck subsystems:
//!
//! - **midideck-midi**: the protocol layer. Status bytes and controller
//!   numbers, 7-bit helpers, the timestamped stream-record codec, SysEx
//!   byte templates.
//! - **midideck-out**: the output engine. The double-buffered stream
//!   state machine, RPN/NRPN composite senders, the channel-ownership
//!   registry, instruments, and the session rack.
//!
//! ## Quick start
//!
//! ```
//! use midideck::prelude::*;
//!
//! // A capture transport stands in for the native driver.
//! let mut out = MidiOutput::new(CaptureTransport::new());
//! out.stream_open()?;
//! out.stream_start(120.0, 96)?;
//!
//! let mut rack = Rack::new();
//! let lead = rack.add_instrument(0)?;
//!
//! // The first send re-initializes the channel, then plays the note.
//! let (inst, registry) = rack.entry(lead).unwrap();
//! inst.note_on(Some(0), &mut out, registry, 60, 100)?;
//! inst.note_off(Some(96), &mut out, registry, 60, 100)?;
//!
//! // Hand the finished segment to the hardware.
//! out.transport().complete_slot(0);
//! assert!(out.stream_flush());
//! # Ok::<(), midideck::Error>(())
//! ```
//!
//! ## Feature flags
//!
//! - `midi-io` (default): hardware port enumeration via `midir`

/// Re-export of the protocol layer for direct access.
pub use midideck_midi as midi;

/// Re-export of the output engine for direct access.
pub use midideck_out as out;

pub use midideck_midi::{defs, records, sysex, StreamBuffer, StreamRecord, StreamRecords};

pub use midideck_out::{
    CaptureTransport, ChannelRegistry, DeviceEvent, DeviceHub, DeviceInfo, Error, Instrument,
    InstrumentId, InstrumentMacro, MacroKind, MidiOutput, OutputState, Rack, Result, StreamNotice,
    SubscriberId, Transport, TransportEvent, CHANNEL_COUNT, MAX_INSTRUMENTS, SLOT_COUNT,
};

#[cfg(feature = "midi-io")]
pub use midideck_out::{list_input_devices, list_output_devices};

pub mod prelude {
    pub use crate::defs;
    pub use crate::{
        CaptureTransport, ChannelRegistry, Instrument, InstrumentId, InstrumentMacro, MacroKind,
        MidiOutput, OutputState, Rack, StreamNotice, Transport,
    };
}
