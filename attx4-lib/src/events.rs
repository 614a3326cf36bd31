//! Event streams and the subscriber-interest table.
//!
//! Subscriptions to the reading channels are reference counted: the first
//! subscriber across either channel opens the polling gate, and dropping the
//! last one closes it. The scheduler queries per-channel interest on each
//! tick, so a channel with no subscribers is simply not read.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::{broadcast, watch};

use crate::error::AmbientError;
use crate::frame::Command;

const EVENT_CAPACITY: usize = 32;

/// The two data channels the module samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Light,
    Sound,
}

impl Channel {
    pub(crate) fn read_command(self) -> Command {
        match self {
            Channel::Light => Command::ReadLight,
            Channel::Sound => Command::ReadSound,
        }
    }

    pub(crate) fn trigger_command(self) -> Command {
        match self {
            Channel::Light => Command::SetLightTrigger,
            Channel::Sound => Command::SetSoundTrigger,
        }
    }
}

#[derive(Default)]
struct Interest {
    light: usize,
    sound: usize,
}

impl Interest {
    fn total(&self) -> usize {
        self.light + self.sound
    }

    fn slot(&mut self, channel: Channel) -> &mut usize {
        match channel {
            Channel::Light => &mut self.light,
            Channel::Sound => &mut self.sound,
        }
    }
}

/// Broadcast fan-out plus the interest table driving the polling gate.
pub(crate) struct Hub {
    interest: Mutex<Interest>,
    gate: watch::Sender<bool>,
    light: broadcast::Sender<Vec<f64>>,
    sound: broadcast::Sender<Vec<f64>>,
    light_trigger: broadcast::Sender<f64>,
    sound_trigger: broadcast::Sender<f64>,
    errors: broadcast::Sender<Arc<AmbientError>>,
}

impl Hub {
    pub(crate) fn new() -> (Arc<Self>, watch::Receiver<bool>) {
        let (gate, gate_rx) = watch::channel(false);
        let hub = Hub {
            interest: Mutex::new(Interest::default()),
            gate,
            light: broadcast::channel(EVENT_CAPACITY).0,
            sound: broadcast::channel(EVENT_CAPACITY).0,
            light_trigger: broadcast::channel(EVENT_CAPACITY).0,
            sound_trigger: broadcast::channel(EVENT_CAPACITY).0,
            errors: broadcast::channel(EVENT_CAPACITY).0,
        };
        (Arc::new(hub), gate_rx)
    }

    fn readings_sender(&self, channel: Channel) -> &broadcast::Sender<Vec<f64>> {
        match channel {
            Channel::Light => &self.light,
            Channel::Sound => &self.sound,
        }
    }

    fn trigger_sender(&self, channel: Channel) -> &broadcast::Sender<f64> {
        match channel {
            Channel::Light => &self.light_trigger,
            Channel::Sound => &self.sound_trigger,
        }
    }

    /// Subscribe to a reading channel, registering polling interest.
    pub(crate) fn subscribe_readings(hub: &Arc<Hub>, channel: Channel) -> Subscription<Vec<f64>> {
        let rx = hub.readings_sender(channel).subscribe();
        let mut interest = hub.lock_interest();
        *interest.slot(channel) += 1;
        if interest.total() == 1 {
            // First subscriber across both channels opens the gate.
            hub.gate.send_replace(true);
        }
        drop(interest);
        Subscription {
            rx,
            _interest: Some(InterestGuard {
                hub: hub.clone(),
                channel,
            }),
        }
    }

    /// Subscribe to a trigger channel. Trigger events are pushed by the
    /// module, so this carries no polling interest.
    pub(crate) fn subscribe_trigger(&self, channel: Channel) -> Subscription<f64> {
        Subscription {
            rx: self.trigger_sender(channel).subscribe(),
            _interest: None,
        }
    }

    pub(crate) fn subscribe_errors(&self) -> Subscription<Arc<AmbientError>> {
        Subscription {
            rx: self.errors.subscribe(),
            _interest: None,
        }
    }

    pub(crate) fn interest(&self, channel: Channel) -> usize {
        *self.lock_interest().slot(channel)
    }

    pub(crate) fn publish_readings(&self, channel: Channel, readings: Vec<f64>) {
        let _ = self.readings_sender(channel).send(readings);
    }

    pub(crate) fn publish_trigger(&self, channel: Channel, value: f64) {
        let _ = self.trigger_sender(channel).send(value);
    }

    pub(crate) fn publish_error(&self, err: AmbientError) {
        let _ = self.errors.send(Arc::new(err));
    }

    /// Close the polling gate regardless of interest counts. It reopens only
    /// on a later zero-to-one subscriber edge.
    pub(crate) fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    fn lock_interest(&self) -> std::sync::MutexGuard<'_, Interest> {
        self.interest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drop_interest(&self, channel: Channel) {
        let mut interest = self.lock_interest();
        let slot = interest.slot(channel);
        *slot = slot.saturating_sub(1);
        if interest.total() == 0 {
            self.gate.send_replace(false);
        }
    }
}

struct InterestGuard {
    hub: Arc<Hub>,
    channel: Channel,
}

impl Drop for InterestGuard {
    fn drop(&mut self) {
        self.hub.drop_interest(self.channel);
    }
}

/// A handle on one event stream. Dropping it releases any polling interest
/// the subscription registered.
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
    _interest: Option<InterestGuard>,
}

impl<T: Clone> Subscription<T> {
    /// Next event, or `None` once the driver is gone. A slow consumer that
    /// lags the broadcast skips ahead to the oldest retained event.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
