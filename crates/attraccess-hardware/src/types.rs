//! Descriptive types reported by hardware devices.

/// Information reported by a card reader after initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderInfo {
    /// Reader name (e.g., "PN532").
    pub name: String,

    /// Firmware version string, if the reader reports one.
    pub firmware: Option<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            firmware: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = Some(firmware.into());
        self
    }
}

impl std::fmt::Display for ReaderInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.firmware {
            Some(firmware) => write!(f, "{} (firmware {})", self.name, firmware),
            None => write!(f, "{}", self.name),
        }
    }
}
