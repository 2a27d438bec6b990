//! Device identity and selection notifications.
//!
//! The core never talks to hardware directly, but the surrounding
//! application needs to know which ports exist and when the user's
//! selection changes. Enumeration goes through `midir` (feature `midi-io`);
//! selection changes fan out over explicitly subscribed channels rather
//! than implicit multicast wiring.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;

#[cfg(feature = "midi-io")]
use tracing::debug;

#[cfg(feature = "midi-io")]
use crate::error::{Error, Result};

/// Identity of an available MIDI port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Port index, for connection.
    pub index: usize,
    pub name: String,
}

/// A device-selection change, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    InputChanged(Option<DeviceInfo>),
    OutputChanged(Option<DeviceInfo>),
}

/// Handle returned by [`DeviceHub::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

struct HubInner {
    subscribers: Vec<(SubscriberId, Sender<DeviceEvent>)>,
    next_id: u64,
}

/// Fan-out point for device-selection notifications.
///
/// Subscribers receive every event published after they subscribe;
/// receivers that have been dropped are pruned on the next publish.
pub struct DeviceHub {
    inner: Mutex<HubInner>,
}

impl DeviceHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    pub fn subscribe(&self) -> (SubscriberId, Receiver<DeviceEvent>) {
        let mut inner = self.inner.lock();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;

        let (tx, rx) = unbounded();
        inner.subscribers.push((id, tx));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn publish(&self, event: DeviceEvent) {
        let mut inner = self.inner.lock();
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for DeviceHub {
    fn default() -> Self {
        Self::new()
    }
}

/// List the available hardware MIDI output ports.
#[cfg(feature = "midi-io")]
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let midi_out = midir::MidiOutput::new("midideck-enumerate")
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    let ports = midi_out.ports();
    let mut devices = Vec::with_capacity(ports.len());
    for (index, port) in ports.iter().enumerate() {
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Device {}", index));
        devices.push(DeviceInfo { index, name });
    }

    debug!(count = devices.len(), "enumerated MIDI output ports");
    Ok(devices)
}

/// List the available hardware MIDI input ports.
#[cfg(feature = "midi-io")]
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let midi_in = midir::MidiInput::new("midideck-enumerate")
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    let ports = midi_in.ports();
    let mut devices = Vec::with_capacity(ports.len());
    for (index, port) in ports.iter().enumerate() {
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Device {}", index));
        devices.push(DeviceInfo { index, name });
    }

    debug!(count = devices.len(), "enumerated MIDI input ports");
    Ok(devices)
}
