//! Listener fan-out
//!
//! Events are handed by value to every registered listener. A listener that
//! returns an error or panics is logged and skipped; delivery to the rest of
//! the set continues.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener queue full, event dropped")]
    QueueFull,

    #[error("Listener queue closed")]
    QueueClosed,

    #[error("Listener rejected event: {0}")]
    Rejected(String),
}

pub trait Listener<E>: Send {
    fn name(&self) -> &str;

    fn listen(&mut self, event: E) -> Result<(), ListenerError>;
}

/// Forwards events into a tokio channel, converting on the way
///
/// One channel can collect events of several kinds as long as each converts
/// into the channel's item type.
pub struct ChannelListener<T> {
    name: String,
    sender: mpsc::Sender<T>,
}

impl<T> ChannelListener<T> {
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<T>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl<T> Clone for ChannelListener<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<E, T> Listener<E> for ChannelListener<T>
where
    E: Into<T>,
    T: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&mut self, event: E) -> Result<(), ListenerError> {
        // Never block the control loop on a slow consumer
        self.sender.try_send(event.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ListenerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ListenerError::QueueClosed,
        })
    }
}

/// Outcome of one fan-out round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Listeners<E> {
    entries: Vec<Box<dyn Listener<E>>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Clone> Listeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: impl Listener<E> + 'static) {
        debug!("Registering listener '{}'", listener.name());
        self.entries.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&mut self, event: &E) -> Delivery {
        let mut delivery = Delivery::default();

        for listener in self.entries.iter_mut() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| listener.listen(event.clone())));
            match outcome {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Listener '{}' failed: {}", listener.name(), e);
                    delivery.failed += 1;
                }
                Err(_) => {
                    error!("Listener '{}' panicked, continuing fan-out", listener.name());
                    delivery.failed += 1;
                }
            }
        }

        delivery
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|l| l.name()))
            .finish()
    }
}
