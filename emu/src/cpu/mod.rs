//! # ARM7TDMI CPU
//!
//! The GBA CPU runs two instruction sets sharing one register file:
//!
//! | State | Width  | Module                 |
//! |-------|--------|------------------------|
//! | ARM   | 32-bit | [`arm`]                |
//! | Thumb | 16-bit | [`thumb`]              |
//!
//! The T bit of the CPSR (see [`psr`]) selects the active set. Banked
//! registers per mode live in [`register_bank`].

pub mod arm;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::large_stack_frames)]
#[allow(clippy::module_name_repetitions)]
pub mod arm7tdmi;
pub mod condition;
pub mod cpu_modes;

#[allow(clippy::cast_possible_truncation)]
pub mod flags;

#[allow(clippy::cast_possible_truncation)]
pub mod hardware;
pub mod psr;
pub mod register_bank;
pub mod registers;
pub mod thumb;
