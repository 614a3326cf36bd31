//! Shared test doubles and helpers.

// Not every test file uses every helper.
#[allow(unused_imports)]
pub use attx4_lib::error::AmbientError;
#[allow(unused_imports)]
pub use attx4_lib::frame::{self, ACK_CONF, ANY, Command, PACKET_CONF, Request, STOP_CONF};
#[allow(unused_imports)]
pub use attx4_lib::sim::{DEFAULT_FIRMWARE_VERSION, SimPin, SimulatedModule};
#[allow(unused_imports)]
pub use attx4_lib::{Ambient, AmbientConfig, Channel, Hardware};

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attx4_lib::hal::{EdgeInput, SpiExchange};
use tokio::sync::watch;

/// A fast polling config so cadence tests don't crawl.
#[allow(dead_code)]
pub fn fast_config() -> AmbientConfig {
    AmbientConfig {
        polling_frequency: Duration::from_millis(100),
        connect_retries: 5,
    }
}

/// Bus that answers each exchange with the next canned response, padded or
/// truncated to the frame length. An exhausted script answers all-zero,
/// which never validates.
pub struct ScriptedBus {
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
    log: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Handle kept by the test after the bus moves into the driver.
#[derive(Clone)]
pub struct BusHandle {
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
    log: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[allow(dead_code)]
impl BusHandle {
    pub fn push_response(&self, response: Vec<u8>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every outgoing frame seen so far, in order.
    pub fn exchanges(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

pub fn scripted_bus() -> (ScriptedBus, BusHandle) {
    let responses = Arc::new(Mutex::new(VecDeque::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    (
        ScriptedBus {
            responses: responses.clone(),
            log: log.clone(),
        },
        BusHandle { responses, log },
    )
}

impl SpiExchange for ScriptedBus {
    type Error = Infallible;

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        self.log.lock().unwrap().push(write.to_vec());
        read.fill(0);
        if let Some(resp) = self.responses.lock().unwrap().pop_front() {
            let n = resp.len().min(read.len());
            read[..n].copy_from_slice(&resp[..n]);
        }
        Ok(())
    }
}

/// Manually driven interrupt line.
pub struct TestLine {
    tx: watch::Sender<bool>,
}

#[allow(dead_code)]
impl TestLine {
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn lower(&self) {
        self.tx.send_replace(false);
    }
}

pub struct TestIrq {
    rx: watch::Receiver<bool>,
}

pub fn test_line() -> (TestLine, TestIrq) {
    let (tx, rx) = watch::channel(false);
    (TestLine { tx }, TestIrq { rx })
}

impl EdgeInput for TestIrq {
    type Error = Infallible;

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        loop {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
            if *self.rx.borrow() {
                return Ok(());
            }
        }
    }
}

/// Hardware bundle around a scripted bus and a manual interrupt line.
#[allow(dead_code)]
pub fn scripted_hardware(bus: ScriptedBus, irq: TestIrq) -> Hardware<ScriptedBus, SimPin, SimPin, TestIrq> {
    Hardware {
        spi: bus,
        chip_select: SimPin::new(),
        reset: SimPin::new(),
        irq,
    }
}

/// A valid firmware-version reply.
#[allow(dead_code)]
pub fn version_reply(version: u8) -> Vec<u8> {
    vec![PACKET_CONF, Command::FirmwareVersion.into(), version]
}

/// A valid trigger-set echo for the given command and raw level.
#[allow(dead_code)]
pub fn trigger_reply(command: Command, raw: u16) -> Vec<u8> {
    let [hi, lo] = raw.to_be_bytes();
    vec![PACKET_CONF, command.into(), hi, lo]
}

/// A valid fetch-trigger-values reply.
#[allow(dead_code)]
pub fn fetch_reply(light: u16, sound: u16) -> Vec<u8> {
    let [lh, ll] = light.to_be_bytes();
    let [sh, sl] = sound.to_be_bytes();
    vec![PACKET_CONF, Command::FetchTriggerValues.into(), lh, ll, sh, sl]
}
