//! In-memory model of the module firmware, for tests and the demo CLI.
//!
//! Mirrors the device's exchange behavior: every response leads with the
//! confirmation byte and the echoed command; buffer reads walk the sample
//! ring newest-first and terminate with the stop marker; a trigger crossing
//! latches the sample and raises the interrupt line; fetching the latched
//! values clears them and lowers the line.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::device::Hardware;
use crate::frame::{ACK_CONF, BUFFER_WORDS, Command, PACKET_CONF, STOP_CONF};
use crate::hal::{EdgeInput, SpiExchange};

pub const DEFAULT_FIRMWARE_VERSION: u8 = 0x03;

const RING_SIZE: usize = BUFFER_WORDS as usize;

#[derive(Default)]
struct Ring {
    samples: [u16; RING_SIZE],
    location: usize,
}

impl Ring {
    fn push(&mut self, sample: u16) {
        self.samples[self.location] = sample;
        self.location = (self.location + 1) % RING_SIZE;
    }

    /// Read `words` samples walking backwards from the write cursor, newest
    /// first, wrapping as the firmware does.
    fn read_back(&self, words: usize) -> Vec<u16> {
        let mut cursor = self.location;
        (0..words)
            .map(|_| {
                cursor = cursor.checked_sub(1).unwrap_or(RING_SIZE - 1);
                self.samples[cursor]
            })
            .collect()
    }
}

struct ModuleState {
    online: bool,
    firmware_version: u8,
    light: Ring,
    sound: Ring,
    light_trigger: u16,
    sound_trigger: u16,
    light_trigger_read: u16,
    sound_trigger_read: u16,
    irq: watch::Sender<bool>,
    // First byte of every exchange seen, in order.
    exchange_log: Vec<u8>,
}

impl ModuleState {
    fn raise_irq(&self) {
        self.irq.send_if_modified(|level| {
            let edge = !*level;
            *level = true;
            edge
        });
    }

    fn lower_irq(&self) {
        self.irq.send_if_modified(|level| {
            let edge = *level;
            *level = false;
            edge
        });
    }

    fn respond(&mut self, write: &[u8]) -> Vec<u8> {
        let mut resp = vec![0u8; write.len()];
        let Some(&opcode) = write.first() else {
            return resp;
        };
        resp[0] = PACKET_CONF;
        if resp.len() > 1 {
            resp[1] = opcode;
        }
        match Command::try_from(opcode) {
            Ok(Command::Ack) => {
                if resp.len() > 2 {
                    resp[2] = ACK_CONF;
                }
            }
            Ok(Command::FirmwareVersion) => {
                if resp.len() > 2 {
                    resp[2] = self.firmware_version;
                }
            }
            Ok(cmd @ (Command::ReadLight | Command::ReadSound)) => {
                let words = write.get(1).copied().unwrap_or(0) as usize;
                if resp.len() > 2 {
                    resp[2] = words as u8;
                }
                let ring = match cmd {
                    Command::ReadLight => &self.light,
                    _ => &self.sound,
                };
                let mut at = 3;
                for sample in ring.read_back(words) {
                    let [hi, lo] = sample.to_be_bytes();
                    if at + 1 >= resp.len() {
                        break;
                    }
                    resp[at] = hi;
                    resp[at + 1] = lo;
                    at += 2;
                }
                if at < resp.len() {
                    resp[at] = STOP_CONF;
                }
            }
            Ok(cmd @ (Command::SetLightTrigger | Command::SetSoundTrigger)) => {
                let hi = write.get(1).copied().unwrap_or(0);
                let lo = write.get(2).copied().unwrap_or(0);
                if resp.len() > 3 {
                    resp[2] = hi;
                    resp[3] = lo;
                }
                let level = u16::from_be_bytes([hi, lo]);
                match cmd {
                    Command::SetLightTrigger => self.light_trigger = level,
                    _ => self.sound_trigger = level,
                }
            }
            Ok(Command::FetchTriggerValues) => {
                if resp.len() >= 6 {
                    resp[2..4].copy_from_slice(&self.light_trigger_read.to_be_bytes());
                    resp[4..6].copy_from_slice(&self.sound_trigger_read.to_be_bytes());
                }
                self.light_trigger_read = 0;
                self.sound_trigger_read = 0;
                self.lower_irq();
            }
            Err(_) => {}
        }
        resp
    }
}

/// Control handle over the simulated module. Hand its [`SimBus`], [`SimIrq`]
/// and [`SimPin`]s to the driver, keep the handle to feed samples and to
/// inspect the exchange traffic.
pub struct SimulatedModule {
    state: Arc<Mutex<ModuleState>>,
}

impl SimulatedModule {
    pub fn new() -> Self {
        let (irq, _) = watch::channel(false);
        SimulatedModule {
            state: Arc::new(Mutex::new(ModuleState {
                online: true,
                firmware_version: DEFAULT_FIRMWARE_VERSION,
                light: Ring::default(),
                sound: Ring::default(),
                light_trigger: 0,
                sound_trigger: 0,
                light_trigger_read: 0,
                sound_trigger_read: 0,
                irq,
                exchange_log: Vec::new(),
            })),
        }
    }

    /// The bus endpoint to hand to the driver.
    pub fn bus(&self) -> SimBus {
        SimBus {
            state: self.state.clone(),
        }
    }

    /// The interrupt line endpoint to hand to the driver.
    pub fn irq(&self) -> SimIrq {
        SimIrq {
            rx: self.lock().irq.subscribe(),
        }
    }

    /// Complete hardware bundle for [`crate::Ambient`].
    pub fn hardware(&self) -> Hardware<SimBus, SimPin, SimPin, SimIrq> {
        Hardware {
            spi: self.bus(),
            chip_select: SimPin::new(),
            reset: SimPin::new(),
            irq: self.irq(),
        }
    }

    /// Feed one raw light sample, as the firmware's ADC timer would. Crossing
    /// an armed trigger latches the sample and raises the interrupt line.
    pub fn push_light_sample(&self, sample: u16) {
        let mut st = self.lock();
        st.light.push(sample);
        if st.light_trigger != 0 && sample >= st.light_trigger {
            st.light_trigger_read = sample;
            st.raise_irq();
        }
    }

    /// Feed one raw sound sample.
    pub fn push_sound_sample(&self, sample: u16) {
        let mut st = self.lock();
        st.sound.push(sample);
        if st.sound_trigger != 0 && sample >= st.sound_trigger {
            st.sound_trigger_read = sample;
            st.raise_irq();
        }
    }

    pub fn set_firmware_version(&self, version: u8) {
        self.lock().firmware_version = version;
    }

    /// Take the module off the bus (held in reset): every exchange answers
    /// all-zero until it is brought back online.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Trigger level the module currently holds for its light channel.
    pub fn light_trigger_level(&self) -> u16 {
        self.lock().light_trigger
    }

    pub fn sound_trigger_level(&self) -> u16 {
        self.lock().sound_trigger
    }

    /// First byte (opcode position) of every exchange seen so far.
    pub fn exchange_log(&self) -> Vec<u8> {
        self.lock().exchange_log.clone()
    }

    /// How many exchanges carried the given command.
    pub fn command_count(&self, command: Command) -> usize {
        let opcode: u8 = command.into();
        self.lock()
            .exchange_log
            .iter()
            .filter(|&&b| b == opcode)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ModuleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedModule {
    fn default() -> Self {
        Self::new()
    }
}

/// The simulated bus endpoint; responds like the module firmware.
pub struct SimBus {
    state: Arc<Mutex<ModuleState>>,
}

impl SpiExchange for SimBus {
    type Error = Infallible;

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.exchange_log.push(write.first().copied().unwrap_or(0xff));
        if !st.online {
            read.fill(0);
            return Ok(());
        }
        let resp = st.respond(write);
        let n = resp.len().min(read.len());
        read[..n].copy_from_slice(&resp[..n]);
        Ok(())
    }
}

/// The simulated interrupt line endpoint.
pub struct SimIrq {
    rx: watch::Receiver<bool>,
}

impl EdgeInput for SimIrq {
    type Error = Infallible;

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        loop {
            if self.rx.changed().await.is_err() {
                // Line source is gone; it will never rise again.
                std::future::pending::<()>().await;
            }
            if *self.rx.borrow() {
                return Ok(());
            }
        }
    }
}

/// A recordable digital output line.
#[derive(Clone)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new() -> Self {
        SimPin {
            level: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

impl Default for SimPin {
    fn default() -> Self {
        Self::new()
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.level.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.level.store(true, Ordering::SeqCst);
        Ok(())
    }
}
