use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced before emulation starts.
///
/// Once a [`Session`](crate::Session) exists nothing in the emulation loop
/// returns an error: decode anomalies, arithmetic edge cases and
/// unimplemented features are logged and degrade to a safe default.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("cartridge is too small ({size} bytes), the header alone needs 0xC0 bytes")]
    CartridgeTooSmall { size: usize },

    #[error("cartridge is too large ({size} bytes), the game pak bus addresses at most 32MB")]
    CartridgeTooLarge { size: usize },

    #[error("BIOS image must be exactly 16KB, got {size} bytes")]
    InvalidBios { size: usize },

    #[error("cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid save state")]
    SaveState(#[from] serde_json::Error),

    #[error("save state version {found} is not supported (expected {expected})")]
    SaveStateVersion { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, EmuError>;
