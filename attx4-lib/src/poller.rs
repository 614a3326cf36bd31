//! Polling scheduler: periodic buffer reads for subscribed channels.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::device::{self, Shared};
use crate::events::Channel;
use crate::frame::BUFFER_WORDS;
use crate::hal::{OutputPin, SpiExchange};

/// Runs for the driver's lifetime, but only ticks while the gate is open.
/// The gate opens on the first reading subscriber across either channel and
/// closes when the last one goes away (or on `disable`). Cancellation is
/// tick-boundary only: an in-flight exchange always runs to completion.
pub(crate) async fn run<SPI, CS>(shared: Arc<Shared<SPI, CS>>, mut gate: watch::Receiver<bool>)
where
    SPI: SpiExchange,
    CS: OutputPin + Send,
{
    loop {
        // Park until the gate opens.
        while !*gate.borrow_and_update() {
            if gate.changed().await.is_err() {
                return;
            }
        }
        debug!("polling started");

        let period = shared.config.polling_frequency;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => poll_once(&shared).await,
                changed = gate.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*gate.borrow() {
                        debug!("polling stopped");
                        break;
                    }
                }
            }
        }
    }
}

/// One tick: re-establish communication if it was lost, then read the ring
/// buffer of every channel that currently has subscribers. Failures are
/// reported on the error stream, never retried in a tight loop.
async fn poll_once<SPI, CS>(shared: &Arc<Shared<SPI, CS>>)
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    if !shared.is_connected() {
        if let Err(err) = device::establish(shared, shared.config.connect_retries).await {
            warn!(error = %err, "cannot communicate with module");
            shared.hub.publish_error(err);
            return;
        }
    }
    for channel in [Channel::Light, Channel::Sound] {
        if shared.hub.interest(channel) == 0 {
            continue;
        }
        if let Err(err) = device::read_buffer_exchange(shared, channel, BUFFER_WORDS).await {
            warn!(%channel, error = %err, "buffer poll failed");
            shared.hub.publish_error(err);
        }
    }
}
