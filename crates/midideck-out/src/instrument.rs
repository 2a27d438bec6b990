//! Channel-scoped instruments.
//!
//! An [`Instrument`] is the user-facing parameter set (program, bank,
//! transpose, bend range, macros) driven over one MIDI channel. Before any
//! message goes out, the instrument consults the [`ChannelRegistry`]: when
//! it is not the current owner of its channel, or one of its parameters was
//! edited since the last send, the channel is silently re-initialized first
//! so the receiver's state matches this instrument again.

use serde::{Deserialize, Serialize};
use tracing::debug;

use midideck_midi::defs::{self, cc, rpn};
use midideck_midi::sysex;

use crate::error::{Error, Result};
use crate::output::MidiOutput;
use crate::registry::{ChannelRegistry, InstrumentId};
use crate::transport::Transport;

/// How a macro reaches the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroKind {
    ControlChange,
    NonRegisteredParam,
    SysExTemplate,
}

/// A user-defined controller slot on an instrument.
///
/// Macros are re-sent with their init values during channel
/// re-initialization, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMacro {
    pub kind: MacroKind,
    /// Controller number (7-bit for CC, 14-bit for NRPN).
    pub number: u16,
    pub current: u16,
    pub init: u16,
    /// Hex byte template for [`MacroKind::SysExTemplate`]; see
    /// [`midideck_midi::sysex`].
    pub sysex_template: String,
}

impl InstrumentMacro {
    pub fn control_change(number: u16, init: u16) -> Self {
        Self {
            kind: MacroKind::ControlChange,
            number,
            current: init,
            init,
            sysex_template: String::new(),
        }
    }

    pub fn nrpn(number: u16, init: u16) -> Self {
        Self {
            kind: MacroKind::NonRegisteredParam,
            number,
            current: init,
            init,
            sysex_template: String::new(),
        }
    }

    pub fn sysex(template: impl Into<String>, init: u16) -> Self {
        Self {
            kind: MacroKind::SysExTemplate,
            number: 0,
            current: init,
            init,
            sysex_template: template.into(),
        }
    }
}

enum MacroAction {
    ControlChange(u8, u8),
    Nrpn(u16, u16),
    Long(sysex::SysexBytes),
}

/// A virtual instrument: one channel's parameter bundle and send surface.
///
/// Every send takes the session's [`ChannelRegistry`] and the target
/// [`MidiOutput`] by reference; a logical operation (ownership check,
/// possible re-init, triggering message) happens under one `&mut` borrow of
/// all three, which is what keeps composite sequences uninterleaved. Wrap
/// the whole set in a single mutex when sharing across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    id: InstrumentId,
    pub name: String,
    channel: u8,
    velocity: u8,
    program: u8,
    bank: u8,
    bank_lsb: u8,
    /// Signed fractional semitones.
    transpose: f64,
    /// Pitch wheel range in semitones.
    bend_range: f64,
    /// Offset applied to every pitch wheel value, fractional semitones.
    pitch_center: f64,
    current_pitch: u16,
    macros: Vec<InstrumentMacro>,
    needs_reinit: bool,
}

impl Instrument {
    /// Create an instrument on `channel` with default parameters. The first
    /// send always re-initializes the channel.
    pub fn new(id: InstrumentId, channel: u8) -> Self {
        Self {
            id,
            name: "New instrument".to_string(),
            channel,
            velocity: 127,
            program: 0,
            bank: 0,
            bank_lsb: 0,
            transpose: 0.0,
            bend_range: 2.0,
            pitch_center: 0.0,
            current_pitch: 0x2000,
            macros: Vec::new(),
            needs_reinit: true,
        }
    }

    #[inline]
    pub fn id(&self) -> InstrumentId {
        self.id
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    #[inline]
    pub fn program(&self) -> u8 {
        self.program
    }

    #[inline]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    #[inline]
    pub fn bank_lsb(&self) -> u8 {
        self.bank_lsb
    }

    #[inline]
    pub fn transpose(&self) -> f64 {
        self.transpose
    }

    #[inline]
    pub fn bend_range(&self) -> f64 {
        self.bend_range
    }

    #[inline]
    pub fn pitch_center(&self) -> f64 {
        self.pitch_center
    }

    /// Last pitch wheel value requested by the caller (before centering).
    #[inline]
    pub fn current_pitch(&self) -> u16 {
        self.current_pitch
    }

    #[inline]
    pub fn needs_reinit(&self) -> bool {
        self.needs_reinit
    }

    pub fn macros(&self) -> &[InstrumentMacro] {
        &self.macros
    }

    pub fn macros_mut(&mut self) -> &mut Vec<InstrumentMacro> {
        &mut self.macros
    }

    pub fn add_macro(&mut self, m: InstrumentMacro) {
        self.macros.push(m);
    }

    // Parameter edits always invalidate the channel state, even when
    // re-setting the same value.

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
        self.needs_reinit = true;
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity;
        self.needs_reinit = true;
    }

    pub fn set_program(&mut self, program: u8) {
        self.program = program;
        self.needs_reinit = true;
    }

    pub fn set_bank(&mut self, bank: u8) {
        self.bank = bank;
        self.needs_reinit = true;
    }

    pub fn set_bank_lsb(&mut self, bank_lsb: u8) {
        self.bank_lsb = bank_lsb;
        self.needs_reinit = true;
    }

    pub fn set_transpose(&mut self, transpose: f64) {
        self.transpose = transpose;
        self.needs_reinit = true;
    }

    pub fn set_bend_range(&mut self, bend_range: f64) {
        self.bend_range = bend_range;
        self.needs_reinit = true;
    }

    pub fn set_pitch_center(&mut self, pitch_center: f64) {
        self.pitch_center = pitch_center;
        self.needs_reinit = true;
    }

    /// Restore default parameters (keeping id, name, and macros' templates)
    /// and re-arm re-initialization.
    pub fn reset(&mut self) {
        self.velocity = 127;
        self.program = 0;
        self.bank = 0;
        self.bank_lsb = 0;
        self.transpose = 0.0;
        self.bend_range = 2.0;
        self.pitch_center = 0.0;
        self.current_pitch = 0x2000;
        for m in &mut self.macros {
            m.current = m.init;
        }
        self.needs_reinit = true;
    }

    fn check_channel(&self) -> Result<()> {
        if self.channel > 15 {
            return Err(Error::InvalidChannel(self.channel));
        }
        Ok(())
    }

    /// The ownership gate. Re-initializes when this instrument's parameters
    /// are stale or another instrument owns the channel, and returns the
    /// delta-time the triggering message must use: once a scheduled re-init
    /// has consumed the caller's delta, everything after it plays at once.
    fn ensure_init<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
    ) -> Result<Option<u32>> {
        if self.needs_reinit || !registry.is_owner(self.channel, self.id) {
            self.init(time, out, registry)?;
            return Ok(match time {
                Some(t) if t > 0 => Some(0),
                other => other,
            });
        }
        Ok(time)
    }

    /// Send a short message on this instrument's channel.
    ///
    /// A true status byte (>= 0x80) is rerouted to the instrument's
    /// channel, so an instrument can never emit on a foreign channel even
    /// when handed a mismatched status nibble. `time` of `None` sends
    /// immediately; `Some(delta)` queues on the stream.
    pub fn send<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<()> {
        self.check_channel()?;

        let status = if status & 0x80 != 0 {
            defs::reroute(status, self.channel)
        } else {
            status
        };

        let time = self.ensure_init(time, out, registry)?;
        match time {
            Some(delta) => {
                out.stream_send(delta, status, data1, data2);
                Ok(())
            }
            None => out.send(status, data1, data2),
        }
    }

    /// Send a long message (e.g. SysEx) through the ownership gate.
    pub fn send_long<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        data: &[u8],
    ) -> Result<()> {
        self.check_channel()?;

        let time = self.ensure_init(time, out, registry)?;
        match time {
            Some(delta) => {
                out.stream_send_long(delta, data);
                Ok(())
            }
            None => out.send_long(data),
        }
    }

    /// Send an RPN on this instrument's channel.
    pub fn send_rpn<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        param: u16,
        value: u16,
    ) -> Result<()> {
        self.check_channel()?;

        let time = self.ensure_init(time, out, registry)?;
        match time {
            Some(delta) => {
                out.stream_send_rpn(delta, self.channel, param, value);
                Ok(())
            }
            None => out.send_rpn(self.channel, param, value),
        }
    }

    /// Send an NRPN on this instrument's channel.
    pub fn send_nrpn<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        param: u16,
        value: u16,
    ) -> Result<()> {
        self.check_channel()?;

        let time = self.ensure_init(time, out, registry)?;
        match time {
            Some(delta) => {
                out.stream_send_nrpn(delta, self.channel, param, value);
                Ok(())
            }
            None => out.send_nrpn(self.channel, param, value),
        }
    }

    /// Re-initialize the channel to this instrument's parameters.
    ///
    /// Claims ownership first, so the sends below pass the gate without
    /// recursing. When scheduled, the first record carries the caller's
    /// delta and the rest follow at delta 0: the whole block plays at the
    /// originally scheduled instant.
    pub fn init<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
    ) -> Result<()> {
        self.check_channel()?;

        debug!(channel = self.channel, id = self.id.raw(), "re-initializing channel");
        registry.claim(self.channel, self.id);
        self.needs_reinit = false;

        let status = defs::control_change(self.channel);
        self.send(time, out, registry, status, cc::ALL_CONTROLLERS_OFF, 0)?;

        let time = match time {
            Some(t) if t > 0 => Some(0),
            other => other,
        };

        self.send(time, out, registry, status, cc::BANK_MSB, self.bank)?;
        self.send(time, out, registry, status, cc::BANK_LSB, self.bank_lsb)?;
        let program = self.program;
        self.send(
            time,
            out,
            registry,
            defs::program_change(self.channel),
            program,
            0,
        )?;

        let bend_range = (self.bend_range * 128.0) as u16;
        self.send_rpn(time, out, registry, rpn::PITCH_BEND_RANGE, bend_range)?;

        self.pitch(time, out, registry, 0x2000)?;

        let int_part = self.transpose.trunc();
        let frac_part = self.transpose.fract();
        let coarse = (64 + int_part as i32).clamp(0, 127) as u16;
        let fine = (64 + (64.0 * frac_part).round() as i32).clamp(0, 127) as u16;
        self.send_rpn(time, out, registry, rpn::MASTER_TUNE, coarse << 7)?;
        self.send_rpn(time, out, registry, rpn::MASTER_FINETUNE, fine << 7)?;

        for index in 0..self.macros.len() {
            let init = self.macros[index].init;
            self.macro_send(time, out, registry, index, 0, init)?;
        }

        Ok(())
    }

    /// Note on. A velocity above 127 is the sentinel for "use the
    /// instrument's default velocity".
    pub fn note_on<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        note: u8,
        velocity: u8,
    ) -> Result<()> {
        let velocity = if velocity > 127 { self.velocity } else { velocity };
        self.send(
            time,
            out,
            registry,
            defs::note_on(self.channel),
            note,
            velocity,
        )
    }

    /// Note off; same velocity sentinel as [`note_on`](Self::note_on).
    pub fn note_off<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        note: u8,
        velocity: u8,
    ) -> Result<()> {
        let velocity = if velocity > 127 { self.velocity } else { velocity };
        self.send(
            time,
            out,
            registry,
            defs::note_off(self.channel),
            note,
            velocity,
        )
    }

    /// Move the pitch wheel. The sent value is offset by `pitch_center`
    /// (81.92 wheel steps per unit) and saturates at the 14-bit limits;
    /// `current_pitch` always records the caller's un-centered value.
    pub fn pitch<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        value: u16,
    ) -> Result<()> {
        self.current_pitch = value;

        let center = (81.92 * self.pitch_center).round() as i32;
        let sent = (value as i32 + center).clamp(0, 0x3FFF) as u16;

        self.send(
            time,
            out,
            registry,
            defs::pitch_bend(self.channel),
            defs::lsb(sent),
            defs::msb(sent),
        )
    }

    /// Drive macro `index` with a new value, dispatching on its kind.
    /// An out-of-range index is a no-op.
    pub fn macro_send<T: Transport>(
        &mut self,
        time: Option<u32>,
        out: &mut MidiOutput<T>,
        registry: &mut ChannelRegistry,
        index: usize,
        note: u8,
        value: u16,
    ) -> Result<()> {
        let Some(m) = self.macros.get(index) else {
            return Ok(());
        };

        let action = match m.kind {
            MacroKind::ControlChange => {
                MacroAction::ControlChange((m.number & 0x7F) as u8, (value & 0x7F) as u8)
            }
            MacroKind::NonRegisteredParam => MacroAction::Nrpn(m.number, value),
            MacroKind::SysExTemplate => MacroAction::Long(sysex::expand(
                &m.sysex_template,
                self.channel,
                note,
                value as u8,
            )?),
        };

        self.macros[index].current = value;

        match action {
            MacroAction::ControlChange(number, data) => self.send(
                time,
                out,
                registry,
                defs::control_change(self.channel),
                number,
                data,
            ),
            MacroAction::Nrpn(param, data) => self.send_nrpn(time, out, registry, param, data),
            MacroAction::Long(bytes) => self.send_long(time, out, registry, &bytes),
        }
    }
}
