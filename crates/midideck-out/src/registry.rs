//! Channel ownership table.
//!
//! Sixteen slots, one per MIDI channel, each recording which instrument
//! last initialized the channel. Ownership is compared by stable id, so it
//! survives relocation and serialization, and the table is an explicit
//! value owned by the session rather than process-wide state.

use serde::{Deserialize, Serialize};

/// Number of MIDI channels.
pub const CHANNEL_COUNT: usize = 16;

/// Stable identity of an instrument, allocated by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentId(u64);

impl InstrumentId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Maps each MIDI channel to its current owning instrument.
///
/// The registry never owns instruments; it records identity for comparison.
/// Ownership is last-registrant-wins: claiming an already-owned channel
/// simply overwrites the slot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelRegistry {
    owners: [Option<InstrumentId>; CHANNEL_COUNT],
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner of `channel`, or `None` if unowned or out of range.
    #[inline]
    pub fn owner(&self, channel: u8) -> Option<InstrumentId> {
        self.owners.get(channel as usize).copied().flatten()
    }

    #[inline]
    pub fn is_owner(&self, channel: u8, id: InstrumentId) -> bool {
        self.owner(channel) == Some(id)
    }

    /// Record `id` as the owner of `channel`. Out-of-range channels are
    /// ignored.
    pub fn claim(&mut self, channel: u8, id: InstrumentId) {
        if let Some(slot) = self.owners.get_mut(channel as usize) {
            *slot = Some(id);
        }
    }

    /// Clear the ownership of `channel`.
    pub fn release(&mut self, channel: u8) {
        if let Some(slot) = self.owners.get_mut(channel as usize) {
            *slot = None;
        }
    }

    /// Clear every channel owned by `id` (used when an instrument is
    /// removed from the session).
    pub fn release_instrument(&mut self, id: InstrumentId) {
        for slot in &mut self.owners {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }
}
