//! # ARM Instruction Decoding
//!
//! This module decodes 32-bit ARM instructions into [`ArmModeInstruction`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ARM Instruction Categories                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Bits 27-25 determine the basic category:                               │
//! │                                                                         │
//! │  000 + special patterns  →  Multiply, Multiply Long, SWP, BX, MRS/MSR   │
//! │  000 + bit7 + bit4       →  Halfword / signed transfers                 │
//! │  00x                     →  Data Processing                             │
//! │  01x                     →  Load/Store (LDR, STR)                       │
//! │  100                     →  Block Data Transfer (LDM/STM)               │
//! │  101                     →  Branch (B/BL)                               │
//! │  110, 1110               →  Coprocessor (absent on the GBA)             │
//! │  1111                    →  Software Interrupt                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decoding Priority
//!
//! Some patterns overlap, so they are checked from the most specific:
//!
//! 1. Branch and Exchange (BX)
//! 2. Single Data Swap (SWP/SWPB)
//! 3. Multiply Long (UMULL, SMULL, UMLAL, SMLAL)
//! 4. Multiply (MUL, MLA)
//! 5. Halfword Data Transfer (LDRH, STRH, LDRSB, LDRSH)
//! 6. PSR Transfer (MRS, MSR)
//! 7. Undefined (`011` with bit 4 set)
//! 8. Software Interrupt, coprocessor space
//! 9. Block Data Transfer, Branch, Single Data Transfer
//! 10. Data Processing

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, PsrOpKind,
};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

impl std::fmt::Display for SingleDataTransferOffsetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { offset } => write!(f, "#0x{offset:X}"),
            Self::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => write!(f, "R{reg_offset}, {shift_kind} #{shift_amount}"),
        }
    }
}

/// SH bits (5-6) of a halfword transfer. `00` is SWP and never reaches here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HalfwordTransferKind {
    UnsignedHalfwords,
    SignedByte,
    SignedHalfwords,
}

impl From<u32> for HalfwordTransferKind {
    fn from(sh: u32) -> Self {
        match sh & 0b11 {
            0b10 => Self::SignedByte,
            0b11 => Self::SignedHalfwords,
            _ => Self::UnsignedHalfwords,
        }
    }
}

impl std::fmt::Display for HalfwordTransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsignedHalfwords => f.write_str("H"),
            Self::SignedByte => f.write_str("SB"),
            Self::SignedHalfwords => f.write_str("SH"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HalfwordDataTransferOffsetKind {
    Immediate { offset: u32 },
    Register { register: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl std::fmt::Display for ArmModeMultiplyLongVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umull => f.write_str("UMULL"),
            Self::Umlal => f.write_str("UMLAL"),
            Self::Smull => f.write_str("SMULL"),
            Self::Smlal => f.write_str("SMLAL"),
        }
    }
}

impl From<u32> for ArmModeMultiplyVariant {
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(21) { Self::Mla } else { Self::Mul }
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=22) {
            0b00 => Self::Umull,
            0b01 => Self::Umlal,
            0b10 => Self::Smull,
            _ => Self::Smlal,
        }
    }
}

/// A decoded ARM instruction.
///
/// | Variant                | Example Instructions |
/// |------------------------|----------------------|
/// | `DataProcessing`       | AND, ADD, CMP, MOV   |
/// | `Multiply`             | MUL, MLA             |
/// | `MultiplyLong`         | UMULL, SMLAL         |
/// | `PsrTransfer`          | MRS, MSR             |
/// | `SingleDataSwap`       | SWP, SWPB            |
/// | `BranchAndExchange`    | BX                   |
/// | `HalfwordDataTransfer` | LDRH, STRH, LDRSB    |
/// | `SingleDataTransfer`   | LDR, STR, LDRB       |
/// | `BlockDataTransfer`    | LDM, STM             |
/// | `Branch`               | B, BL                |
/// | `SoftwareInterrupt`    | SWI                  |
/// | `Undefined`            | anything else        |
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        condition: Condition,
        should_set_codes: bool,
        rd_destination_register: u32,
        rn_accumulate_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        condition: Condition,
        should_set_codes: bool,
        rdhi_destination_register: u32,
        rdlo_destination_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    PsrTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        condition: Condition,
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    },
    BranchAndExchange {
        condition: Condition,
        register: u32,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        /// Byte offset from PC+8, already sign-extended.
        offset: u32,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Undefined {
        op_code: u32,
    },
}

impl ArmModeInstruction {
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::Multiply { condition, .. }
            | Self::MultiplyLong { condition, .. }
            | Self::PsrTransfer { condition, .. }
            | Self::SingleDataSwap { condition, .. }
            | Self::BranchAndExchange { condition, .. }
            | Self::HalfwordDataTransfer { condition, .. }
            | Self::SingleDataTransfer { condition, .. }
            | Self::BlockDataTransfer { condition, .. }
            | Self::Branch { condition, .. }
            | Self::SoftwareInterrupt { condition, .. } => *condition,
            Self::Undefined { .. } => Condition::AL,
        }
    }

    fn decode_psr_transfer(op_code: u32, condition: Condition) -> Option<Self> {
        let psr_kind: PsrKind = op_code.get_bit(22).into();

        if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && op_code.get_bits(16..=19) == 0xF
            && op_code.get_bits(0..=11) == 0
        {
            return Some(Self::PsrTransfer {
                condition,
                psr_kind,
                kind: PsrOpKind::Mrs {
                    destination_register: op_code.get_bits(12..=15),
                },
            });
        }

        let register_form = op_code.get_bits(23..=27) == 0b00010 && op_code.get_bits(4..=11) == 0;
        let immediate_form = op_code.get_bits(23..=27) == 0b00110;
        if (register_form || immediate_form)
            && op_code.get_bits(20..=21) == 0b10
            && op_code.get_bits(12..=15) == 0xF
        {
            let mut field_mask = 0;
            for (bit, mask) in [
                (16, 0x0000_00FF),
                (17, 0x0000_FF00),
                (18, 0x00FF_0000),
                (19, 0xFF00_0000_u32),
            ] {
                if op_code.get_bit(bit) {
                    field_mask |= mask;
                }
            }

            return Some(Self::PsrTransfer {
                condition,
                psr_kind,
                kind: PsrOpKind::Msr {
                    field_mask,
                    operand: AluSecondOperandInfo::from(op_code),
                },
            });
        }

        None
    }
}

impl From<u32> for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u32) -> Self {
        let condition = Condition::from(op_code.get_bits(28..=31) as u8);

        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            Self::BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && op_code.get_bits(4..=11) == 0b0000_1001
        {
            Self::SingleDataSwap {
                condition,
                quantity: op_code.get_bit(22).into(),
                rn: op_code.get_bits(16..=19),
                rd: op_code.get_bits(12..=15),
                rm: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b00001 && op_code.get_bits(4..=7) == 0b1001 {
            Self::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rdhi_destination_register: op_code.get_bits(16..=19),
                rdlo_destination_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(22..=27) == 0b00_0000 && op_code.get_bits(4..=7) == 0b1001 {
            Self::Multiply {
                variant: ArmModeMultiplyVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rd_destination_register: op_code.get_bits(16..=19),
                rn_accumulate_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let sh_bits = op_code.get_bits(5..=6);
            if sh_bits == 0b00 {
                tracing::debug!("undefined multiply/swap pattern: opcode=0x{op_code:08X}");
                return Self::Undefined { op_code };
            }

            let offset_kind = if op_code.get_bit(22) {
                HalfwordDataTransferOffsetKind::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                }
            } else {
                HalfwordDataTransferOffsetKind::Register {
                    register: op_code.get_bits(0..=3),
                }
            };

            Self::HalfwordDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store_kind: op_code.get_bit(20).into(),
                offset_kind,
                base_register: op_code.get_bits(16..=19),
                source_destination_register: op_code.get_bits(12..=15),
                transfer_kind: sh_bits.into(),
            }
        } else if let Some(psr_transfer) = Self::decode_psr_transfer(op_code, condition) {
            psr_transfer
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            tracing::debug!(
                "undefined instruction decode: opcode=0x{op_code:08X}, bits[25-27]=0b011, bit[4]=1"
            );
            Self::Undefined { op_code }
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            }
        } else if op_code.get_bits(25..=27) == 0b110 || op_code.get_bits(24..=27) == 0b1110 {
            tracing::debug!("coprocessor instruction on a CPU without coprocessors: 0x{op_code:08X}");
            Self::Undefined { op_code }
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            Self::Branch {
                condition,
                link: op_code.get_bit(24),
                offset: (op_code.get_bits(0..=23) << 2).sign_extended(26),
            }
        } else if op_code.get_bits(26..=27) == 0b01 {
            let offset_info = if op_code.get_bit(25) {
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3),
                }
            } else {
                SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                }
            };

            Self::SingleDataTransfer {
                condition,
                load_store: op_code.get_bit(20).into(),
                quantity: op_code.get_bit(22).into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                rd: op_code.get_bits(12..=15),
                base_register: op_code.get_bits(16..=19),
                offset_info,
                offsetting: op_code.get_bit(23).into(),
            }
        } else {
            let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
            let set_conditions = op_code.get_bit(20);

            // TST/TEQ/CMP/CMN without S are the PSR transfer space.
            if alu_instruction.is_test() && !set_conditions {
                tracing::debug!("unknown PSR transfer pattern: opcode=0x{op_code:08X}");
                return Self::Undefined { op_code };
            }

            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                op2: AluSecondOperandInfo::from(op_code),
            }
        }
    }
}

fn register_list_to_string(register_list: u32) -> String {
    (0..16)
        .filter(|reg| register_list.get_bit(*reg))
        .map(|reg| format!("R{reg}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => {
                use ArmModeAluInstruction::{Cmn, Cmp, Mov, Mvn, Teq, Tst};
                match alu_instruction {
                    Mov | Mvn => {
                        let s = if *set_conditions { "S" } else { "" };
                        write!(f, "{alu_instruction}{condition}{s} R{destination}, {op2}")
                    }
                    Tst | Teq | Cmp | Cmn => {
                        write!(f, "{alu_instruction}{condition} R{rn}, {op2}")
                    }
                    _ => {
                        let s = if *set_conditions { "S" } else { "" };
                        write!(
                            f,
                            "{alu_instruction}{condition}{s} R{destination}, R{rn}, {op2}"
                        )
                    }
                }
            }
            Self::Multiply {
                variant,
                condition,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                match variant {
                    ArmModeMultiplyVariant::Mul => write!(
                        f,
                        "MUL{condition}{s} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}"
                    ),
                    ArmModeMultiplyVariant::Mla => write!(
                        f,
                        "MLA{condition}{s} R{rd_destination_register}, R{rm_operand_register}, R{rs_operand_register}, R{rn_accumulate_register}"
                    ),
                }
            }
            Self::MultiplyLong {
                variant,
                condition,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            } => {
                let s = if *should_set_codes { "S" } else { "" };
                write!(
                    f,
                    "{variant}{condition}{s} R{rdlo_destination_register}, R{rdhi_destination_register}, R{rm_operand_register}, R{rs_operand_register}"
                )
            }
            Self::PsrTransfer {
                condition,
                psr_kind,
                kind,
            } => match kind {
                PsrOpKind::Mrs {
                    destination_register,
                } => write!(f, "MRS{condition} R{destination_register}, {psr_kind}"),
                PsrOpKind::Msr {
                    field_mask,
                    operand,
                } => {
                    let fields: String = [
                        (0xFF00_0000_u32, 'f'),
                        (0x00FF_0000, 's'),
                        (0xFF00, 'x'),
                        (0xFF, 'c'),
                    ]
                    .into_iter()
                        .filter(|(mask, _)| field_mask & mask != 0)
                        .map(|(_, name)| name)
                        .collect();
                    write!(f, "MSR{condition} {psr_kind}_{fields}, {operand}")
                }
            },
            Self::SingleDataSwap {
                condition,
                quantity,
                rn,
                rd,
                rm,
            } => {
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                write!(f, "SWP{condition}{b} R{rd}, R{rm}, [R{rn}]")
            }
            Self::BranchAndExchange {
                condition,
                register,
            } => write!(f, "BX{condition} R{register}"),
            Self::HalfwordDataTransfer {
                condition,
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => {
                let op = match load_store_kind {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset } => {
                        format!("#{sign}0x{offset:X}")
                    }
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        format!("{sign}R{register}")
                    }
                };
                let w = if *write_back { "!" } else { "" };
                match indexing {
                    Indexing::Pre => write!(
                        f,
                        "{op}{condition}{transfer_kind} R{source_destination_register}, [R{base_register}, {offset}]{w}"
                    ),
                    Indexing::Post => write!(
                        f,
                        "{op}{condition}{transfer_kind} R{source_destination_register}, [R{base_register}], {offset}"
                    ),
                }
            }
            Self::SingleDataTransfer {
                condition,
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDR",
                    LoadStoreKind::Store => "STR",
                };
                let b = if *quantity == ReadWriteKind::Byte { "B" } else { "" };
                let sign = if *offsetting == Offsetting::Down { "-" } else { "" };
                let w = if *write_back { "!" } else { "" };
                match indexing {
                    Indexing::Pre => write!(
                        f,
                        "{op}{condition}{b} R{rd}, [R{base_register}, {sign}{offset_info}]{w}"
                    ),
                    Indexing::Post => write!(
                        f,
                        "{op}{condition}{b} R{rd}, [R{base_register}], {sign}{offset_info}"
                    ),
                }
            }
            Self::BlockDataTransfer {
                condition,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDM",
                    LoadStoreKind::Store => "STM",
                };
                let mode = match (offsetting, indexing) {
                    (Offsetting::Up, Indexing::Post) => "IA",
                    (Offsetting::Up, Indexing::Pre) => "IB",
                    (Offsetting::Down, Indexing::Post) => "DA",
                    (Offsetting::Down, Indexing::Pre) => "DB",
                };
                let w = if *write_back { "!" } else { "" };
                let s = if *load_psr { "^" } else { "" };
                write!(
                    f,
                    "{op}{condition}{mode} R{rn}{w}, {{{}}}{s}",
                    register_list_to_string(*register_list)
                )
            }
            Self::Branch {
                condition,
                link,
                offset,
            } => {
                let l = if *link { "L" } else { "" };
                write!(f, "B{l}{condition} {:+}", (*offset as i32) + 8)
            }
            Self::SoftwareInterrupt { condition, comment } => {
                write!(f, "SWI{condition} 0x{comment:06X}")
            }
            Self::Undefined { op_code } => write!(f, "UNDEFINED 0x{op_code:08X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::arm::alu_instruction::ShiftOperator;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        // B -8 (branch to self)
        let instruction = ArmModeInstruction::from(0xEAFF_FFFE);
        assert_eq!(
            instruction,
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: false,
                offset: (-8_i32) as u32,
            }
        );

        let instruction = ArmModeInstruction::from(0x0B00_0002);
        assert_eq!(
            instruction,
            ArmModeInstruction::Branch {
                condition: Condition::EQ,
                link: true,
                offset: 8,
            }
        );
        assert_eq!(instruction.to_string(), "BLEQ +16");
    }

    #[test]
    fn decode_branch_and_exchange() {
        let instruction = ArmModeInstruction::from(0xE12F_FF1E);
        assert_eq!(
            instruction,
            ArmModeInstruction::BranchAndExchange {
                condition: Condition::AL,
                register: 14,
            }
        );
        assert_eq!(instruction.to_string(), "BX R14");
    }

    #[test]
    fn decode_data_processing() {
        // ADD R0, R1, R2, LSL #3
        let instruction = ArmModeInstruction::from(0xE081_0182);
        assert_eq!(
            instruction,
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(3),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            }
        );
        assert_eq!(instruction.to_string(), "ADD R0, R1, R2, LSL #3");

        // MOVS R0, #1
        let instruction = ArmModeInstruction::from(0xE3B0_0001);
        assert_eq!(instruction.to_string(), "MOVS R0, #0x1");
    }

    #[test]
    fn decode_psr_transfer() {
        // MRS R0, CPSR
        let instruction = ArmModeInstruction::from(0xE10F_0000);
        assert_eq!(
            instruction,
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Mrs {
                    destination_register: 0
                },
            }
        );

        // MSR CPSR_fc, R1
        let instruction = ArmModeInstruction::from(0xE129_F001);
        assert_eq!(instruction.to_string(), "MSR CPSR_fc, R1");

        // MSR SPSR_f, #0xF0000000
        let instruction = ArmModeInstruction::from(0xE368_F20F);
        assert_eq!(
            instruction,
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    field_mask: 0xFF00_0000,
                    operand: AluSecondOperandInfo::Immediate { base: 0xF, shift: 4 },
                },
            }
        );
    }

    #[test]
    fn decode_multiply() {
        // MLA R0, R1, R2, R3
        let instruction = ArmModeInstruction::from(0xE020_3291);
        assert_eq!(
            instruction,
            ArmModeInstruction::Multiply {
                variant: ArmModeMultiplyVariant::Mla,
                condition: Condition::AL,
                should_set_codes: false,
                rd_destination_register: 0,
                rn_accumulate_register: 3,
                rs_operand_register: 2,
                rm_operand_register: 1,
            }
        );

        // SMULL R0, R1, R2, R3
        let instruction = ArmModeInstruction::from(0xE0C1_0392);
        assert_eq!(instruction.to_string(), "SMULL R0, R1, R2, R3");
    }

    #[test]
    fn decode_half_word_data_transfer() {
        // LDRH R0, [R1, #0x2]
        let instruction = ArmModeInstruction::from(0xE1D1_00B2);
        assert_eq!(
            instruction,
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Load,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 2 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            }
        );

        // LDRSB R0, [R1], -R2
        let instruction = ArmModeInstruction::from(0xE011_00D2);
        assert_eq!(instruction.to_string(), "LDRSB R0, [R1], -R2");
    }

    #[test]
    fn decode_single_data_transfer() {
        // LDR R0, [R1, #0x4]!
        let instruction = ArmModeInstruction::from(0xE5B1_0004);
        assert_eq!(
            instruction,
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                load_store: LoadStoreKind::Load,
                quantity: ReadWriteKind::Word,
                write_back: true,
                indexing: Indexing::Pre,
                rd: 0,
                base_register: 1,
                offset_info: SingleDataTransferOffsetInfo::Immediate { offset: 4 },
                offsetting: Offsetting::Up,
            }
        );
        assert_eq!(instruction.to_string(), "LDR R0, [R1, #0x4]!");
    }

    #[test]
    fn decode_single_data_swap() {
        // SWPB R0, R1, [R2]
        let instruction = ArmModeInstruction::from(0xE142_0091);
        assert_eq!(
            instruction,
            ArmModeInstruction::SingleDataSwap {
                condition: Condition::AL,
                quantity: ReadWriteKind::Byte,
                rn: 2,
                rd: 0,
                rm: 1,
            }
        );
    }

    #[test]
    fn decode_block_data_transfer() {
        // STMDB SP!, {R0-R3, R12, LR}
        let instruction = ArmModeInstruction::from(0xE92D_500F);
        assert_eq!(
            instruction.to_string(),
            "STMDB R13!, {R0, R1, R2, R3, R12, R14}"
        );
    }

    #[test]
    fn decode_swi_and_undefined() {
        let instruction = ArmModeInstruction::from(0xEF06_0000);
        assert_eq!(
            instruction,
            ArmModeInstruction::SoftwareInterrupt {
                condition: Condition::AL,
                comment: 0x06_0000,
            }
        );

        let instruction = ArmModeInstruction::from(0xE600_0010);
        assert_eq!(instruction, ArmModeInstruction::Undefined { op_code: 0xE600_0010 });

        // TST without S
        let instruction = ArmModeInstruction::from(0xE100_0001);
        assert_eq!(instruction, ArmModeInstruction::Undefined { op_code: 0xE100_0001 });
    }
}
