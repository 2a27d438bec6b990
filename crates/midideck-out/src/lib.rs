//! MIDI output engine for the midideck control surface.
//!
//! Two coupled subsystems make up the core: the double-buffered stream
//! engine ([`MidiOutput`]) that queues timestamp-ordered records and hands
//! them to a native [`Transport`] slot by slot, and the channel-ownership
//! machinery ([`ChannelRegistry`], [`Instrument`]) that re-initializes a
//! channel whenever a different instrument takes it over.
//!
//! The engine assumes a single logical writer per output stream: one
//! thread fills the accumulation buffer and issues flushes, while the
//! hardware drains slots asynchronously and reports back over the
//! completion channel. For multi-threaded callers, guard the whole
//! (instrument, registry, output) set with one mutex held across each
//! logical operation.

pub mod error;
pub use error::{Error, Result};

pub mod transport;
pub use transport::{CaptureTransport, Transport, TransportEvent, SLOT_COUNT};

pub mod output;
pub use output::{MidiOutput, OutputState, StreamNotice};

pub mod registry;
pub use registry::{ChannelRegistry, InstrumentId, CHANNEL_COUNT};

pub mod instrument;
pub use instrument::{Instrument, InstrumentMacro, MacroKind};

pub mod session;
pub use session::{Rack, MAX_INSTRUMENTS};

pub mod devices;
pub use devices::{DeviceEvent, DeviceHub, DeviceInfo, SubscriberId};

#[cfg(feature = "midi-io")]
pub use devices::{list_input_devices, list_output_devices};
