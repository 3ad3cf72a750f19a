//! # Thumb Instruction Set (16-bit)
//!
//! Compressed encoding of a subset of the ARM instructions. Thumb code runs
//! without condition fields (except for conditional branches) and mostly
//! addresses R0-R7.

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod operations;
