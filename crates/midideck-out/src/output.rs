//! MIDI output: direct sends, the double-buffered stream engine, and the
//! RPN/NRPN composite senders.
//!
//! In stream mode the application fills an accumulation buffer with
//! timestamped records (one musical segment's worth, e.g. a beat) and then
//! calls [`stream_flush`](MidiOutput::stream_flush) to hand the segment to
//! one of two hardware slots. A `false` flush is the backpressure signal:
//! the target slot is still draining, so the caller must retry before
//! advancing musical time.

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, warn};

use midideck_midi::defs::{self, cc, rpn};
use midideck_midi::stream::{StreamBuffer, STREAM_BUF_SIZE};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent, SLOT_COUNT};

/// Output device mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Closed,
    /// Direct (non-streamed) send mode.
    Open,
    /// Stream mode, playback never started or stopped.
    StreamIdle,
    StreamPlaying,
    StreamPaused,
}

/// Per-slot state of the stream ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Handed to the hardware, not yet drained.
    Submitted,
}

/// Notification surfaced to the application by [`MidiOutput::poll_notices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotice {
    /// A slot finished draining; the stream is ready for the next segment.
    Ready,
    /// A marker record reached its playback position.
    Marker(u32),
    /// The transport rejected a flush submission.
    Error(String),
}

/// A MIDI output device in direct or streamed mode.
pub struct MidiOutput<T: Transport> {
    transport: T,
    state: OutputState,
    buffer: StreamBuffer,
    slots: [SlotState; SLOT_COUNT],
    current_slot: usize,
    notices: Option<Receiver<TransportEvent>>,
    pending: Vec<StreamNotice>,
}

impl<T: Transport> MidiOutput<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: OutputState::Closed,
            buffer: StreamBuffer::new(),
            slots: [SlotState::Free; SLOT_COUNT],
            current_slot: 0,
            notices: None,
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Whether the device is open in stream mode.
    #[inline]
    pub fn is_stream_open(&self) -> bool {
        matches!(
            self.state,
            OutputState::StreamIdle | OutputState::StreamPlaying | OutputState::StreamPaused
        )
    }

    /// Whether stream playback has been started and not yet stopped.
    /// Remains true while paused; only [`stream_stop`](Self::stream_stop)
    /// clears it.
    #[inline]
    pub fn is_stream_playing(&self) -> bool {
        matches!(
            self.state,
            OutputState::StreamPlaying | OutputState::StreamPaused
        )
    }

    /// Bytes queued in the accumulation buffer but not yet flushed.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the device for direct output, closing any prior mode first.
    /// On failure the device remains closed.
    pub fn open(&mut self) -> Result<()> {
        self.close()?;
        self.transport.open()?;
        self.state = OutputState::Open;
        Ok(())
    }

    /// Open the device in stream mode, closing any prior mode first.
    ///
    /// Allocates the two-slot ring and the accumulation buffer and hands
    /// the transport the sender half of the completion channel.
    pub fn stream_open(&mut self) -> Result<()> {
        self.close()?;

        let (tx, rx) = unbounded();
        self.transport.open_stream(tx)?;

        self.notices = Some(rx);
        self.slots = [SlotState::Free; SLOT_COUNT];
        self.current_slot = 0;
        self.buffer.clear();
        self.state = OutputState::StreamIdle;
        Ok(())
    }

    /// Close the device, stopping the stream if one is active.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            OutputState::Closed => return Ok(()),
            OutputState::Open => {
                let _ = self.transport.reset();
                self.transport.close()?;
            }
            OutputState::StreamIdle | OutputState::StreamPlaying | OutputState::StreamPaused => {
                if self.is_stream_playing() {
                    let _ = self.transport.stop();
                }
                let _ = self.transport.reset();
                self.transport.close_stream()?;
                self.notices = None;
                self.slots = [SlotState::Free; SLOT_COUNT];
                self.buffer.clear();
            }
        }
        self.state = OutputState::Closed;
        Ok(())
    }

    /// Turn off all sounding notes on the device.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == OutputState::Closed {
            return Err(Error::NotOpen);
        }
        self.transport.reset()
    }

    // ------------------------------------------------------------------
    // Direct sends
    // ------------------------------------------------------------------

    /// Send a short message immediately, in any open mode.
    pub fn send(&mut self, status: u8, data1: u8, data2: u8) -> Result<()> {
        if self.state == OutputState::Closed {
            return Err(Error::NotOpen);
        }
        self.transport.send_short(status, data1, data2)
    }

    /// Send a long message (e.g. SysEx) immediately, in any open mode.
    pub fn send_long(&mut self, data: &[u8]) -> Result<()> {
        if self.state == OutputState::Closed {
            return Err(Error::NotOpen);
        }
        self.transport.send_long(data)
    }

    /// Send an RPN to `channel`: select the parameter, write the 14-bit
    /// value, then deselect with the null parameter number.
    ///
    /// Only the parameter-number MSB is reset on deselect; most receivers
    /// never check the LSB.
    pub fn send_rpn(&mut self, channel: u8, param: u16, value: u16) -> Result<()> {
        let status = defs::control_change(channel);
        self.send(status, cc::RPN_MSB, defs::msb(param))?;
        self.send(status, cc::RPN_LSB, defs::lsb(param))?;
        self.send(status, cc::DATA_ENTRY_MSB, defs::msb(value))?;
        self.send(status, cc::DATA_ENTRY_LSB, defs::lsb(value))?;
        self.send(status, cc::RPN_MSB, defs::msb(rpn::NULL))
    }

    /// Send an NRPN to `channel`; same shape as [`send_rpn`](Self::send_rpn)
    /// using the NRPN selection controllers.
    pub fn send_nrpn(&mut self, channel: u8, param: u16, value: u16) -> Result<()> {
        let status = defs::control_change(channel);
        self.send(status, cc::NRPN_MSB, defs::msb(param))?;
        self.send(status, cc::NRPN_LSB, defs::lsb(param))?;
        self.send(status, cc::DATA_ENTRY_MSB, defs::msb(value))?;
        self.send(status, cc::DATA_ENTRY_LSB, defs::lsb(value))?;
        self.send(status, cc::NRPN_MSB, defs::msb(rpn::NULL))
    }

    // ------------------------------------------------------------------
    // Stream encoding
    // ------------------------------------------------------------------

    fn in_stream_mode(&self) -> bool {
        if self.is_stream_open() {
            true
        } else {
            debug!("dropping stream event: device not open in stream mode");
            false
        }
    }

    /// Queue a short message `delta_ticks` after the previous record.
    pub fn stream_send(&mut self, delta_ticks: u32, status: u8, data1: u8, data2: u8) {
        if self.in_stream_mode() {
            self.buffer.push_short(delta_ticks, status, data1, data2);
        }
    }

    /// Queue a long message `delta_ticks` after the previous record.
    pub fn stream_send_long(&mut self, delta_ticks: u32, data: &[u8]) {
        if self.in_stream_mode() {
            self.buffer.push_long(delta_ticks, data);
        }
    }

    /// Queue a tempo change. Out-of-range tempos are ignored.
    pub fn stream_set_tempo(&mut self, delta_ticks: u32, bpm: f64) {
        if self.in_stream_mode() {
            self.buffer.push_tempo(delta_ticks, bpm);
        }
    }

    /// Queue a null event to pad the buffer out to a segment length.
    pub fn stream_delay(&mut self, delta_ticks: u32) {
        if self.in_stream_mode() {
            self.buffer.push_delay(delta_ticks);
        }
    }

    /// Queue a marker; when it plays, [`poll_notices`](Self::poll_notices)
    /// yields `StreamNotice::Marker(value)`.
    pub fn stream_set_marker(&mut self, delta_ticks: u32, value: u32) {
        if self.in_stream_mode() {
            self.buffer.push_marker(delta_ticks, value);
        }
    }

    /// Queue an RPN. The first record carries `delta_ticks`; the rest of
    /// the sequence follows at delta 0 so it cannot be split in time.
    pub fn stream_send_rpn(&mut self, delta_ticks: u32, channel: u8, param: u16, value: u16) {
        let status = defs::control_change(channel);
        self.stream_send(delta_ticks, status, cc::RPN_MSB, defs::msb(param));
        self.stream_send(0, status, cc::RPN_LSB, defs::lsb(param));
        self.stream_send(0, status, cc::DATA_ENTRY_MSB, defs::msb(value));
        self.stream_send(0, status, cc::DATA_ENTRY_LSB, defs::lsb(value));
        self.stream_send(0, status, cc::RPN_MSB, defs::msb(rpn::NULL));
    }

    /// Queue an NRPN; see [`stream_send_rpn`](Self::stream_send_rpn).
    pub fn stream_send_nrpn(&mut self, delta_ticks: u32, channel: u8, param: u16, value: u16) {
        let status = defs::control_change(channel);
        self.stream_send(delta_ticks, status, cc::NRPN_MSB, defs::msb(param));
        self.stream_send(0, status, cc::NRPN_LSB, defs::lsb(param));
        self.stream_send(0, status, cc::DATA_ENTRY_MSB, defs::msb(value));
        self.stream_send(0, status, cc::DATA_ENTRY_LSB, defs::lsb(value));
        self.stream_send(0, status, cc::NRPN_MSB, defs::msb(rpn::NULL));
    }

    // ------------------------------------------------------------------
    // Stream playback
    // ------------------------------------------------------------------

    /// Start playback, or resume a paused stream.
    ///
    /// On the very first start since [`stream_open`](Self::stream_open)
    /// (transport elapsed time is zero) this configures tempo and time
    /// division and primes the pump: both slots are submitted immediately,
    /// even though still empty, so the hardware has material queued before
    /// the application fills real data.
    pub fn stream_start(&mut self, bpm: f64, ppq: u16) -> Result<()> {
        if !self.is_stream_open() {
            return Err(Error::NotOpen);
        }

        self.transport.start()?;

        if self.transport.elapsed_ticks() == 0 {
            // Property failures are not fatal; the driver default applies.
            let uspq = (60_000_000.0 / bpm) as u32;
            let _ = self.transport.set_tempo(uspq);
            let _ = self.transport.set_time_division(ppq);

            self.current_slot = 0;
            for slot in 0..SLOT_COUNT {
                let _ = self.transport.submit_slot(slot, &[]);
                self.slots[slot] = SlotState::Submitted;
            }
        }

        self.state = OutputState::StreamPlaying;
        Ok(())
    }

    /// Pause playback; position is preserved and
    /// [`stream_start`](Self::stream_start) resumes from the same point.
    pub fn stream_pause(&mut self) -> Result<()> {
        if !self.is_stream_playing() {
            return Err(Error::NotOpen);
        }
        self.transport.pause()?;
        self.state = OutputState::StreamPaused;
        Ok(())
    }

    /// Stop playback. Data accumulated but not flushed is discarded by the
    /// next flush.
    pub fn stream_stop(&mut self) -> Result<()> {
        if !self.is_stream_playing() {
            return Err(Error::NotOpen);
        }
        self.transport.stop()?;
        self.state = OutputState::StreamIdle;
        Ok(())
    }

    /// Hand the accumulated segment to the current hardware slot.
    ///
    /// While playback is not active the buffer is cleared and the call
    /// succeeds: there is no receiver, so the data is intentionally
    /// discarded (flushing right before the first start loses the segment).
    /// While playing, a still-draining target slot fails the flush and
    /// leaves the buffer untouched for retry; a free slot receives up to
    /// its capacity, the buffer is cleared, and the ring advances.
    pub fn stream_flush(&mut self) -> bool {
        self.pump();

        if !self.is_stream_playing() {
            self.buffer.clear();
            return true;
        }

        let slot = self.current_slot;
        if self.slots[slot] != SlotState::Free {
            return false;
        }

        let len = self.buffer.len().min(STREAM_BUF_SIZE);
        let segment = &self.buffer.as_bytes()[..len];
        match self.transport.submit_slot(slot, segment) {
            Ok(()) => {
                self.buffer.clear();
                self.slots[slot] = SlotState::Submitted;
                self.current_slot ^= 1;
                true
            }
            Err(err) => {
                warn!(slot, %err, "stream flush rejected by transport");
                self.buffer.clear();
                self.pending.push(StreamNotice::Error(err.to_string()));
                false
            }
        }
    }

    /// Elapsed stream time in ticks (0 when not in stream mode).
    pub fn stream_time(&self) -> u32 {
        if self.is_stream_open() {
            self.transport.elapsed_ticks()
        } else {
            0
        }
    }

    /// Drain transport completion notices into slot states and pending
    /// application notices.
    fn pump(&mut self) {
        let Some(rx) = self.notices.as_ref() else {
            return;
        };
        let events: Vec<TransportEvent> = rx.try_iter().collect();
        for event in events {
            match event {
                TransportEvent::SlotDone(slot) => {
                    if slot < SLOT_COUNT {
                        self.slots[slot] = SlotState::Free;
                    }
                    self.pending.push(StreamNotice::Ready);
                }
                TransportEvent::Marker(value) => {
                    self.pending.push(StreamNotice::Marker(value));
                }
            }
        }
    }

    /// Collect notices from the transport: slot completions (requests for
    /// the next segment) and played markers.
    pub fn poll_notices(&mut self) -> Vec<StreamNotice> {
        self.pump();
        std::mem::take(&mut self.pending)
    }
}
