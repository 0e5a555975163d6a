use std::path::Path;
use tracing::{debug, info, warn};

use super::record::{HardwareEventRecord, RECORD_SIZE};
use super::source::{DomainEvent, InputSource};
use crate::listener::{Listener, Listeners};
use crate::shm::ring_buffer::SLOT_COUNT;
use crate::shm::{ChannelError, RingBufferChannel};

/// Counters since the last stats report
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub records: usize,
    pub dropped: usize,
    pub events: usize,
}

/// Consumer of the GPIO driver's event ring
///
/// Without a channel the bridge stays in place but yields nothing, so the rest
/// of the surface keeps running when the driver is down.
#[derive(Debug)]
pub struct HardwareEventBridge {
    channel: Option<RingBufferChannel>,
    sources: Vec<InputSource>,
    listeners: Listeners<DomainEvent>,
    stats: BridgeStats,
}

impl HardwareEventBridge {
    pub fn open(path: &Path, sources: Vec<InputSource>) -> Self {
        let channel = match RingBufferChannel::open(path, RECORD_SIZE, SLOT_COUNT) {
            Ok(channel) => {
                info!("Connected to GPIO event ring {:?}", path);
                Some(channel)
            }
            Err(e) => {
                warn!("GPIO event ring unavailable, hardware input disabled: {}", e);
                None
            }
        };
        Self::with_channel(channel, sources)
    }

    pub fn with_channel(channel: Option<RingBufferChannel>, sources: Vec<InputSource>) -> Self {
        for source in &sources {
            debug!("Hardware source registered: {}", source.id());
        }
        Self {
            channel,
            sources,
            listeners: Listeners::new(),
            stats: BridgeStats::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn add_listener(&mut self, listener: impl Listener<DomainEvent> + 'static) {
        self.listeners.add(listener);
    }

    /// Drains the ring, decodes every valid record through every source and
    /// notifies listeners. Malformed records are dropped.
    pub fn poll(&mut self) -> Vec<DomainEvent> {
        let Some(channel) = self.channel.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for raw in channel.drain() {
            self.stats.records += 1;
            let record = match HardwareEventRecord::decode(&raw) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Dropping malformed hardware record: {}", e);
                    self.stats.dropped += 1;
                    continue;
                }
            };

            let before = events.len();
            for source in self.sources.iter_mut() {
                if let Some(event) = source.decode(&record) {
                    events.push(event);
                }
            }
            if events.len() == before {
                debug!("No source claimed record {:?}", record);
            }
        }

        for event in &events {
            debug!("Hardware event: {:?}", event);
            self.listeners.notify(event);
        }
        self.stats.events += events.len();
        events
    }

    pub fn take_stats(&mut self) -> BridgeStats {
        std::mem::take(&mut self.stats)
    }

    pub fn close(self) -> Result<(), ChannelError> {
        match self.channel {
            Some(channel) => channel.close(),
            None => Ok(()),
        }
    }
}
