use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How `SWI` instructions are serviced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareMode {
    /// System calls are executed natively by [`BiosHle`](crate::bios::BiosHle).
    #[default]
    Hle,

    /// `SWI` enters Supervisor mode and jumps to `0x08`, where a real BIOS
    /// image is expected to be mapped.
    Vectored,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub firmware: FirmwareMode,

    /// Optional BIOS image mapped at `0x0000_0000`.
    /// When missing a minimal firmware stub is synthesized.
    pub bios_path: Option<PathBuf>,

    /// Start executing the cartridge directly, with the register state the
    /// BIOS leaves behind after its boot animation.
    pub skip_boot: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firmware: FirmwareMode::Hle,
            bios_path: None,
            skip_boot: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "firmware": "Vectored" }"#).unwrap();

        assert_eq!(config.firmware, FirmwareMode::Vectored);
        assert_eq!(config.bios_path, None);
        assert!(config.skip_boot);
    }
}
