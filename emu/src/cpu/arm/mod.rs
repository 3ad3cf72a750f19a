//! # ARM state (32-bit instructions)
//!
//! Every instruction carries a condition in bits 28-31 (see
//! [`condition`](super::condition)); when it fails the instruction costs one
//! cycle and does nothing.
//!
//! | Encoding (bits 27-20, 7-4)  | Group                         |
//! |-----------------------------|-------------------------------|
//! | `000x_xxxx` / `001x_xxxx`   | Data processing, MRS, MSR     |
//! | `0000_00xx 1001`            | MUL, MLA                      |
//! | `0000_1xxx 1001`            | UMULL, UMLAL, SMULL, SMLAL    |
//! | `0001_0x00 1001`            | SWP, SWPB                     |
//! | `0001_0010 0001`            | BX                            |
//! | `000x_xxxx 1xx1`            | LDRH, STRH, LDRSB, LDRSH      |
//! | `01xx_xxxx`                 | LDR, STR, LDRB, STRB          |
//! | `100x_xxxx`                 | LDM, STM                      |
//! | `101x_xxxx`                 | B, BL                         |
//! | `1111_xxxx`                 | SWI                           |
//!
//! Anything else is logged and executed as a no-op.
//!
//! - [`instructions`]: decoding and disassembly
//! - [`alu_instruction`]: ALU opcodes and the barrel shifter
//! - [`operations`]: execution and cycle costs

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod alu_instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::similar_names)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::similar_names)]
pub mod operations;
