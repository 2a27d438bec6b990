//! The session aggregate.
//!
//! A [`Rack`] owns the instruments of the current session and the
//! [`ChannelRegistry`] they share, and allocates the stable ids the
//! registry compares. Keeping the registry here (instead of in process-wide
//! state) makes ownership behavior explicit and testable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instrument::Instrument;
use crate::registry::{ChannelRegistry, InstrumentId};

/// Most instruments a session can hold.
pub const MAX_INSTRUMENTS: usize = 64;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Rack {
    instruments: Vec<Instrument>,
    next_id: u64,
    /// Runtime ownership state; rebuilt by re-inits after a session loads.
    #[serde(skip)]
    registry: ChannelRegistry,
}

impl Rack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new instrument on `channel` and return its id.
    pub fn add_instrument(&mut self, channel: u8) -> Result<InstrumentId> {
        if self.instruments.len() >= MAX_INSTRUMENTS {
            return Err(Error::InstrumentLimit(MAX_INSTRUMENTS));
        }
        let id = InstrumentId::from_raw(self.next_id);
        self.next_id += 1;
        self.instruments.push(Instrument::new(id, channel));
        Ok(id)
    }

    /// Remove an instrument, releasing any channels it owns.
    pub fn remove_instrument(&mut self, id: InstrumentId) -> Option<Instrument> {
        let index = self.instruments.iter().position(|i| i.id() == id)?;
        self.registry.release_instrument(id);
        Some(self.instruments.remove(index))
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id() == id)
    }

    pub fn instrument_mut(&mut self, id: InstrumentId) -> Option<&mut Instrument> {
        self.instruments.iter_mut().find(|i| i.id() == id)
    }

    /// Borrow one instrument together with the registry, for send
    /// operations: `let (inst, registry) = rack.entry(id)?;`.
    pub fn entry(&mut self, id: InstrumentId) -> Option<(&mut Instrument, &mut ChannelRegistry)> {
        let Self {
            instruments,
            registry,
            ..
        } = self;
        instruments
            .iter_mut()
            .find(|i| i.id() == id)
            .map(|inst| (inst, &mut *registry))
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.registry
    }
}
