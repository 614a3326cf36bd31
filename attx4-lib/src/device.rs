//! The `Ambient` driver facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use bytes::Buf;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::AmbientError;
use crate::events::{Channel, Hub, Subscription};
use crate::frame::{self, BUFFER_WORDS, Request};
use crate::hal::{EdgeInput, OutputPin, SpiExchange};
use crate::transport::Transport;
use crate::{monitor, poller};

/// The hardware handles the driver takes ownership of.
pub struct Hardware<SPI, CS, RST, IRQ> {
    /// Full-duplex bus the module hangs off.
    pub spi: SPI,
    /// Chip-select line, driven by the host around each exchange.
    pub chip_select: CS,
    /// Reset line; driven high at startup to release the module.
    pub reset: RST,
    /// Interrupt line the module raises on a trigger crossing.
    pub irq: IRQ,
}

#[derive(Debug, Clone, Copy)]
pub struct AmbientConfig {
    /// Cadence of the background buffer polling.
    pub polling_frequency: Duration,
    /// Handshake attempts before giving up on the module.
    pub connect_retries: u32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        AmbientConfig {
            polling_frequency: Duration::from_millis(500),
            connect_retries: 5,
        }
    }
}

/// State shared between the facade and its background tasks. Exchanges are
/// serialized by the transport mutex; an exchange runs to completion before
/// another begins.
pub(crate) struct Shared<SPI, CS> {
    pub(crate) transport: Mutex<Transport<SPI, CS>>,
    pub(crate) connected: AtomicBool,
    // Last trigger level confirmed by the module, raw units; 0 = unarmed.
    light_trigger_raw: AtomicU16,
    sound_trigger_raw: AtomicU16,
    pub(crate) hub: Arc<Hub>,
    pub(crate) config: AmbientConfig,
}

impl<SPI, CS> Shared<SPI, CS> {
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn trigger_armed(&self, channel: Channel) -> bool {
        self.trigger_cell(channel).load(Ordering::SeqCst) != 0
    }

    fn trigger_cell(&self, channel: Channel) -> &AtomicU16 {
        match channel {
            Channel::Light => &self.light_trigger_raw,
            Channel::Sound => &self.sound_trigger_raw,
        }
    }
}

/// Driver for the ambient light/sound module.
///
/// Construction performs the firmware-version handshake; a returned instance
/// is ready to use. Two background tasks serve it for its whole lifetime: the
/// trigger monitor watching the interrupt line, and the polling scheduler,
/// which only runs while at least one reading subscription is live.
pub struct Ambient<SPI, CS, RST> {
    shared: Arc<Shared<SPI, CS>>,
    version: u8,
    monitor_task: JoinHandle<()>,
    poll_task: JoinHandle<()>,
    // Held so the line stays owned (and high) for the driver's lifetime.
    _reset: RST,
}

impl<SPI, CS, RST> std::fmt::Debug for Ambient<SPI, CS, RST> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ambient")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl<SPI, CS, RST> Ambient<SPI, CS, RST>
where
    SPI: SpiExchange + 'static,
    CS: OutputPin + Send + 'static,
    RST: OutputPin,
{
    pub async fn new<IRQ>(hardware: Hardware<SPI, CS, RST, IRQ>) -> Result<Self, AmbientError>
    where
        IRQ: EdgeInput + 'static,
    {
        Self::with_config(hardware, AmbientConfig::default()).await
    }

    pub async fn with_config<IRQ>(
        hardware: Hardware<SPI, CS, RST, IRQ>,
        config: AmbientConfig,
    ) -> Result<Self, AmbientError>
    where
        IRQ: EdgeInput + 'static,
    {
        let Hardware {
            spi,
            chip_select,
            mut reset,
            irq,
        } = hardware;

        // Release the module from reset before talking to it.
        let _ = reset.set_high();

        let (hub, gate) = Hub::new();
        let shared = Arc::new(Shared {
            transport: Mutex::new(Transport::new(spi, chip_select)),
            connected: AtomicBool::new(false),
            light_trigger_raw: AtomicU16::new(0),
            sound_trigger_raw: AtomicU16::new(0),
            hub,
            config,
        });

        let version = match establish(&shared, config.connect_retries).await {
            Ok(version) => version,
            Err(err) => {
                shared.hub.publish_error(err);
                return Err(AmbientError::CannotConnect {
                    attempts: config.connect_retries,
                });
            }
        };
        info!(version, "ambient module ready");

        let monitor_task = tokio::spawn(monitor::run(shared.clone(), irq));
        let poll_task = tokio::spawn(poller::run(shared.clone(), gate));

        Ok(Ambient {
            shared,
            version,
            monitor_task,
            poll_task,
            _reset: reset,
        })
    }

    /// Firmware version reported during the handshake.
    pub fn firmware_version(&self) -> u8 {
        self.version
    }

    /// Connection state as last observed; loss is detected lazily by the
    /// next failed exchange.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Acknowledge round trip, confirming the module is alive.
    pub async fn ack(&self) -> Result<(), AmbientError> {
        execute(&self.shared, &Request::ack()).await?;
        Ok(())
    }

    /// One normalized light reading, the most recent sample.
    pub async fn get_light_level(&self) -> Result<f64, AmbientError> {
        self.read_single(Channel::Light).await
    }

    /// One normalized sound reading, the most recent sample.
    pub async fn get_sound_level(&self) -> Result<f64, AmbientError> {
        self.read_single(Channel::Sound).await
    }

    /// The module's light ring buffer, newest reading first.
    pub async fn get_light_buffer(&self) -> Result<Vec<f64>, AmbientError> {
        read_buffer_exchange(&self.shared, Channel::Light, BUFFER_WORDS).await
    }

    /// The module's sound ring buffer, newest reading first.
    pub async fn get_sound_buffer(&self) -> Result<Vec<f64>, AmbientError> {
        read_buffer_exchange(&self.shared, Channel::Sound, BUFFER_WORDS).await
    }

    /// Arm the light trigger at a threshold fraction in `[0.0, 1.0]`.
    /// Returns the confirmed threshold after quantization.
    pub async fn set_light_trigger(&self, level: f64) -> Result<f64, AmbientError> {
        self.set_trigger(Channel::Light, level).await
    }

    /// Arm the sound trigger at a threshold fraction in `[0.0, 1.0]`.
    pub async fn set_sound_trigger(&self, level: f64) -> Result<f64, AmbientError> {
        self.set_trigger(Channel::Sound, level).await
    }

    /// Disarm the light trigger; equivalent to setting it to zero. A cleared
    /// trigger never fires.
    pub async fn clear_light_trigger(&self) -> Result<f64, AmbientError> {
        self.set_trigger(Channel::Light, 0.0).await
    }

    /// Disarm the sound trigger.
    pub async fn clear_sound_trigger(&self) -> Result<f64, AmbientError> {
        self.set_trigger(Channel::Sound, 0.0).await
    }

    /// Stream of light reading buffers at the polling cadence. The first
    /// reading subscription across either channel starts the poller.
    pub fn subscribe_light(&self) -> Subscription<Vec<f64>> {
        Hub::subscribe_readings(&self.shared.hub, Channel::Light)
    }

    /// Stream of sound reading buffers at the polling cadence.
    pub fn subscribe_sound(&self) -> Subscription<Vec<f64>> {
        Hub::subscribe_readings(&self.shared.hub, Channel::Sound)
    }

    /// Light trigger crossings signaled by the module, as normalized values.
    pub fn subscribe_light_trigger(&self) -> Subscription<f64> {
        self.shared.hub.subscribe_trigger(Channel::Light)
    }

    /// Sound trigger crossings signaled by the module.
    pub fn subscribe_sound_trigger(&self) -> Subscription<f64> {
        self.shared.hub.subscribe_trigger(Channel::Sound)
    }

    /// Failures from the background tasks, e.g. a lost connection the poller
    /// could not re-establish.
    pub fn subscribe_errors(&self) -> Subscription<Arc<AmbientError>> {
        self.shared.hub.subscribe_errors()
    }

    /// Stop all polling for both channels immediately. Existing reading
    /// subscriptions stay open but go quiet; polling resumes only on a later
    /// zero-to-one subscriber edge.
    pub fn disable(&self) {
        self.shared.hub.close_gate();
    }

    async fn read_single(&self, channel: Channel) -> Result<f64, AmbientError> {
        let readings = read_buffer_exchange(&self.shared, channel, 1).await?;
        Ok(readings[0])
    }

    async fn set_trigger(&self, channel: Channel, level: f64) -> Result<f64, AmbientError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(AmbientError::TriggerLevelOutOfRange(level));
        }
        let raw = frame::quantize(level);
        let request = Request::set_trigger(channel.trigger_command(), raw);
        execute(&self.shared, &request).await?;
        self.shared.trigger_cell(channel).store(raw, Ordering::SeqCst);
        debug!(%channel, raw, "trigger level confirmed");
        Ok(frame::normalize(raw))
    }
}

impl<SPI, CS, RST> Drop for Ambient<SPI, CS, RST> {
    fn drop(&mut self) {
        self.poll_task.abort();
        self.monitor_task.abort();
    }
}

/// Firmware-version handshake with bounded retries. Each attempt is a fresh
/// exchange; the first structurally valid response wins.
pub(crate) async fn establish<SPI, CS>(
    shared: &Shared<SPI, CS>,
    retries: u32,
) -> Result<u8, AmbientError>
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    for attempt in 1..=retries {
        match execute(shared, &Request::firmware_version()).await {
            Ok(response) => {
                let version = response[2];
                shared.connected.store(true, Ordering::SeqCst);
                debug!(version, attempt, "communication established");
                return Ok(version);
            }
            Err(err) => debug!(attempt, error = %err, "handshake attempt failed"),
        }
    }
    Err(AmbientError::CannotConnect { attempts: retries })
}

/// One checked exchange: serialize on the transport, validate the echoed
/// response. Any failure flips the connection state to disconnected so the
/// scheduler re-establishes before its next poll.
pub(crate) async fn execute<SPI, CS>(
    shared: &Shared<SPI, CS>,
    request: &Request,
) -> Result<Vec<u8>, AmbientError>
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    let response = {
        let mut transport = shared.transport.lock().await;
        transport.exchange(&request.tx).await
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            shared.connected.store(false, Ordering::SeqCst);
            return Err(err);
        }
    };
    if !request.check(&response) {
        shared.connected.store(false, Ordering::SeqCst);
        return Err(AmbientError::InvalidResponse {
            command: request.command,
        });
    }
    Ok(response)
}

/// Buffer read for one channel: decode the sample run between the echoed
/// header and the stop marker, publish it on the channel's stream, and hand
/// it back to the caller.
pub(crate) async fn read_buffer_exchange<SPI, CS>(
    shared: &Shared<SPI, CS>,
    channel: Channel,
    words: u8,
) -> Result<Vec<f64>, AmbientError>
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    let request = Request::read_buffer(channel.read_command(), words);
    let response = execute(shared, &request).await?;
    let readings = frame::decode_buffer(&response[3..response.len() - 1]);
    shared.hub.publish_readings(channel, readings.clone());
    Ok(readings)
}

/// Fetch the latched trigger values: one normalized reading per channel.
pub(crate) async fn fetch_trigger_values<SPI, CS>(
    shared: &Shared<SPI, CS>,
) -> Result<(f64, f64), AmbientError>
where
    SPI: SpiExchange,
    CS: OutputPin,
{
    let response = execute(shared, &Request::fetch_trigger_values()).await?;
    let mut words = &response[2..];
    let light = frame::normalize(words.get_u16());
    let sound = frame::normalize(words.get_u16());
    Ok((light, sound))
}
