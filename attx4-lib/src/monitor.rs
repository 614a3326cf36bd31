//! Trigger monitor: interrupt edge -> fetch exchange -> notification.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::{self, Shared};
use crate::events::Channel;
use crate::hal::{EdgeInput, OutputPin, SpiExchange};

/// Waits for the module to raise the interrupt line, fetches the latched
/// trigger values, and emits a notification per channel whose value is
/// non-zero and whose trigger is locally armed. The second guard keeps a
/// cleared trigger from re-firing on a stale latched value.
///
/// An invalid fetch is non-fatal: it is logged and the edge watch is
/// re-armed, so the monitor never silently stops.
pub(crate) async fn run<SPI, CS, IRQ>(shared: Arc<Shared<SPI, CS>>, mut irq: IRQ)
where
    SPI: SpiExchange,
    CS: OutputPin + Send,
    IRQ: EdgeInput,
{
    loop {
        if let Err(err) = irq.wait_for_rising_edge().await {
            warn!(error = %err, "interrupt watch failed, trigger monitor stopping");
            return;
        }
        match device::fetch_trigger_values(&shared).await {
            Ok((light, sound)) => {
                debug!(light, sound, "trigger values fetched");
                if light != 0.0 && shared.trigger_armed(Channel::Light) {
                    shared.hub.publish_trigger(Channel::Light, light);
                }
                if sound != 0.0 && shared.trigger_armed(Channel::Sound) {
                    shared.hub.publish_trigger(Channel::Sound, sound);
                }
            }
            Err(err) => warn!(error = %err, "invalid trigger values fetched"),
        }
    }
}
