//! PN532 over a UART in HSU mode.

use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::debug;

use super::driver::Pn532Bus;
use crate::error::{HardwareError, Result};

/// Default HSU baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Long preamble that wakes a PN532 from power-down on HSU.
const WAKEUP: [u8; 16] = [
    0x55, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

/// Serial port link to a PN532.
pub struct SerialBus {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialBus {
    /// Open `path` at `baud_rate`.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| HardwareError::initialization_failed(format!("{path}: {e}")))?;
        debug!("Opened {} at {} baud", path, baud_rate);
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SerialBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBus").field("path", &self.path).finish()
    }
}

impl Pn532Bus for SerialBus {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| HardwareError::communication(e.to_string()))?;
        match self.port.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                Err(HardwareError::timeout(timeout.as_millis() as u64))
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe || e.kind() == ErrorKind::NotConnected => {
                Err(HardwareError::disconnected(self.path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn wake(&mut self) -> Result<()> {
        self.write(&WAKEUP)?;
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| HardwareError::communication(e.to_string()))
    }
}
