#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod bios;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::unreadable_literal)]
pub mod bus;

#[allow(clippy::similar_names)]
pub mod cartridge;
pub mod config;
pub mod cpu;
pub mod error;

#[allow(clippy::cast_possible_truncation)]
pub mod session;

pub use error::{EmuError, Result};
pub use session::Session;
