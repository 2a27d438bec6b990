//! The seam between the output engine and the native MIDI driver.
//!
//! The engine never touches a device handle directly; it drives a
//! [`Transport`]. Completion of asynchronously draining hardware slots is
//! reported back over a typed channel the transport receives at stream-open,
//! replacing driver callback closures with explicit message passing.

use crossbeam_channel::Sender;

use midideck_midi::stream::{records, StreamRecord};

use crate::error::{Error, Result};

/// Number of hardware buffer slots in the stream ring.
pub const SLOT_COUNT: usize = 2;

/// Asynchronous notification from the native transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The given slot has been fully drained and may be refilled.
    SlotDone(usize),
    /// A callback-flagged record reached its playback position.
    Marker(u32),
}

/// Native MIDI output transport.
///
/// Implementations wrap a platform driver (or a test double). All methods
/// are expected to be non-blocking; slow consumption shows up as slots that
/// stay in flight, never as a stalled call.
pub trait Transport {
    /// Acquire the device for direct (non-streamed) output.
    fn open(&mut self) -> Result<()>;

    /// Release the device acquired by [`open`](Transport::open).
    fn close(&mut self) -> Result<()>;

    /// Turn off all sounding notes and reset controllers.
    fn reset(&mut self) -> Result<()>;

    /// Send a short message immediately.
    fn send_short(&mut self, status: u8, data1: u8, data2: u8) -> Result<()>;

    /// Send a long message (e.g. SysEx) immediately.
    fn send_long(&mut self, data: &[u8]) -> Result<()>;

    /// Acquire the device for streamed output and allocate its slot ring.
    /// Completion notices for submitted slots go to `notices`.
    fn open_stream(&mut self, notices: Sender<TransportEvent>) -> Result<()>;

    /// Release the stream and the device acquired by
    /// [`open_stream`](Transport::open_stream).
    fn close_stream(&mut self) -> Result<()>;

    /// Hand a filled slot to the hardware for timed playback.
    fn submit_slot(&mut self, slot: usize, data: &[u8]) -> Result<()>;

    /// Start or resume stream playback.
    fn start(&mut self) -> Result<()>;

    /// Pause stream playback, preserving position.
    fn pause(&mut self) -> Result<()>;

    /// Stop stream playback.
    fn stop(&mut self) -> Result<()>;

    /// Set the stream tempo in microseconds per quarter note.
    fn set_tempo(&mut self, microseconds_per_quarter: u32) -> Result<()>;

    /// Set the stream time division in ticks per quarter note.
    fn set_time_division(&mut self, ppq: u16) -> Result<()>;

    /// Elapsed stream time in ticks; 0 when not playing or unknown.
    fn elapsed_ticks(&self) -> u32;
}

/// In-memory transport that records all traffic.
///
/// Slots never complete on their own; tests (or a headless host) call
/// [`complete_slot`](CaptureTransport::complete_slot) to simulate the
/// hardware draining a submitted buffer.
#[derive(Debug, Default)]
pub struct CaptureTransport {
    /// Short messages sent immediately, in order.
    pub shorts: Vec<[u8; 3]>,
    /// Long messages sent immediately, in order.
    pub longs: Vec<Vec<u8>>,
    /// Slot submissions, in order: (slot index, raw record bytes).
    pub submissions: Vec<(usize, Vec<u8>)>,
    /// Last tempo property, microseconds per quarter note.
    pub tempo: Option<u32>,
    /// Last time-division property, ticks per quarter note.
    pub time_division: Option<u16>,

    notices: Option<Sender<TransportEvent>>,
    open: bool,
    stream_open: bool,
    playing: bool,
    elapsed: u32,
    /// Makes the next `open`/`open_stream` fail, for error-path tests.
    pub fail_next_open: bool,
}

impl CaptureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the hardware finishing the given slot.
    pub fn complete_slot(&self, slot: usize) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(TransportEvent::SlotDone(slot));
        }
    }

    /// Simulate playback reaching a callback-flagged record.
    pub fn emit_marker(&self, value: u32) {
        if let Some(notices) = &self.notices {
            let _ = notices.send(TransportEvent::Marker(value));
        }
    }

    /// Set the reported elapsed stream time.
    pub fn set_elapsed(&mut self, ticks: u32) {
        self.elapsed = ticks;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream_open
    }

    /// Decode every submitted slot into stream records.
    pub fn decoded_submissions(&self) -> Vec<Vec<StreamRecord>> {
        self.submissions
            .iter()
            .map(|(_, bytes)| records(bytes).collect())
            .collect()
    }
}

impl Transport for CaptureTransport {
    fn open(&mut self) -> Result<()> {
        if self.fail_next_open {
            self.fail_next_open = false;
            return Err(Error::DeviceUnavailable("capture transport".into()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn send_short(&mut self, status: u8, data1: u8, data2: u8) -> Result<()> {
        self.shorts.push([status, data1, data2]);
        Ok(())
    }

    fn send_long(&mut self, data: &[u8]) -> Result<()> {
        self.longs.push(data.to_vec());
        Ok(())
    }

    fn open_stream(&mut self, notices: Sender<TransportEvent>) -> Result<()> {
        if self.fail_next_open {
            self.fail_next_open = false;
            return Err(Error::DeviceUnavailable("capture transport".into()));
        }
        self.notices = Some(notices);
        self.stream_open = true;
        self.elapsed = 0;
        Ok(())
    }

    fn close_stream(&mut self) -> Result<()> {
        self.notices = None;
        self.stream_open = false;
        self.playing = false;
        Ok(())
    }

    fn submit_slot(&mut self, slot: usize, data: &[u8]) -> Result<()> {
        if !self.stream_open {
            return Err(Error::NotOpen);
        }
        self.submissions.push((slot, data.to_vec()));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if !self.stream_open {
            return Err(Error::NotOpen);
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        Ok(())
    }

    fn set_tempo(&mut self, microseconds_per_quarter: u32) -> Result<()> {
        self.tempo = Some(microseconds_per_quarter);
        Ok(())
    }

    fn set_time_division(&mut self, ppq: u16) -> Result<()> {
        self.time_division = Some(ppq);
        Ok(())
    }

    fn elapsed_ticks(&self) -> u32 {
        self.elapsed
    }
}
