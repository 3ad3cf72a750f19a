//! # Thumb Instruction Decoding
//!
//! This module handles decoding 16-bit Thumb instructions.
//!
//! ## Thumb Instruction Formats
//!
//! Thumb instructions are grouped into 19 formats, identified by their high bits:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Thumb Instruction Formats                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Format 1:  000 xx          Move shifted register                      │
//! │  Format 2:  00011           Add/subtract                               │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate        │
//! │  Format 4:  010000          ALU operations                             │
//! │  Format 5:  010001          Hi register operations / BX                │
//! │  Format 6:  01001           PC-relative load                           │
//! │  Format 7:  0101 xx0        Load/store with register offset            │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword     │
//! │  Format 9:  011 xx          Load/store with immediate offset           │
//! │  Format 10: 1000 x          Load/store halfword                        │
//! │  Format 11: 1001 x          SP-relative load/store                     │
//! │  Format 12: 1010 x          Load address                               │
//! │  Format 13: 10110000        Add offset to stack pointer                │
//! │  Format 14: 1011 x10x       Push/pop registers                         │
//! │  Format 15: 1100 x          Multiple load/store                        │
//! │  Format 16: 1101 xxxx       Conditional branch                         │
//! │  Format 17: 11011111        Software interrupt                         │
//! │  Format 18: 11100           Unconditional branch                       │
//! │  Format 19: 1111 x          Long branch with link                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Register Restrictions
//!
//! Most Thumb instructions can only access R0-R7. To access R8-R15:
//! - Format 5 (Hi register ops): ADD, CMP, MOV with high registers
//! - BX: Can branch to any register
//! - PUSH/POP: Can include LR/PC via special bit
//!
//! ## Long Branch (BL)
//!
//! The BL instruction spans ±4MB but requires two 16-bit instructions:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Instruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u16,
        source_register: u16,
        destination_register: u16,
    },
    AddSubtract {
        operation_kind: OperandKind,
        subtract: bool,
        rn_offset3: u16,
        source_register: u16,
        destination_register: u16,
    },
    MoveCompareAddSubtractImm {
        operation: Operation,
        destination_register: u16,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: u16,
        destination_register: u16,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: u16,
        destination_register: u16,
    },
    PCRelativeLoad {
        destination_register: u16,
        /// Byte offset from the word-aligned PC.
        immediate_value: u16,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        ro: u16,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreSignExtByteHalfword {
        h: bool,
        sign_extend_flag: bool,
        offset_register: u16,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        /// Byte offset, already scaled for word transfers.
        offset: u16,
        base_register: u16,
        destination_register: u16,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u16,
        base_register: u16,
        source_destination_register: u16,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: u16,
        word8: u16,
    },
    LoadAddress {
        sp: bool,
        destination_register: u16,
        offset: u32,
    },
    AddOffsetSP {
        negative: bool,
        word7: u16,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: u16,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        /// Byte offset from PC+4.
        immediate_offset: i32,
    },
    Swi {
        comment: u8,
    },
    UncondBranch {
        /// Byte offset from PC+4, already sign-extended.
        offset: u32,
    },
    LongBranchLink {
        h: bool,
        offset: u32,
    },
    Undefined {
        op_code: u16,
    },
}

impl From<u16> for Instruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u16) -> Self {
        use Instruction::{
            AddOffsetSP, AddSubtract, AluOp, CondBranch, HiRegisterOpBX, LoadAddress,
            LoadStoreHalfword, LoadStoreImmOffset, LoadStoreRegisterOffset,
            LoadStoreSignExtByteHalfword, LongBranchLink, MoveCompareAddSubtractImm,
            MoveShiftedRegister, MultipleLoadStore, PCRelativeLoad, PushPopReg,
            SPRelativeLoadStore, Swi, UncondBranch, Undefined,
        };

        if op_code.get_bits(8..=15) == 0b1101_1111 {
            Swi {
                comment: op_code.get_bits(0..=7) as u8,
            }
        } else if op_code.get_bits(8..=15) == 0b1011_0000 {
            AddOffsetSP {
                negative: op_code.get_bit(7),
                word7: op_code.get_bits(0..=6) << 2,
            }
        } else if op_code.get_bits(10..=15) == 0b01_0000 {
            AluOp {
                alu_operation: op_code.get_bits(6..=9).into(),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(10..=15) == 0b01_0001 {
            let h1 = op_code.get_bit(7);
            let rd_hd = op_code.get_bits(0..=2);
            let destination_register = if h1 { rd_hd | (1 << 3) } else { rd_hd };

            HiRegisterOpBX {
                register_operation: op_code.get_bits(8..=9).into(),
                source_register: op_code.get_bits(3..=6),
                destination_register,
            }
        } else if op_code.get_bits(12..=15) == 0b1011 && op_code.get_bits(9..=10) == 0b10 {
            PushPopReg {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(11..=15) == 0b00011 {
            AddSubtract {
                operation_kind: op_code.get_bit(10).into(),
                subtract: op_code.get_bit(9),
                rn_offset3: op_code.get_bits(6..=8),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(11..=15) == 0b01001 {
            PCRelativeLoad {
                destination_register: op_code.get_bits(8..=10),
                immediate_value: op_code.get_bits(0..=7) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 && !op_code.get_bit(9) {
            LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                ro: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(12..=15) == 0b0101 {
            LoadStoreSignExtByteHalfword {
                h: op_code.get_bit(11),
                sign_extend_flag: op_code.get_bit(10),
                offset_register: op_code.get_bits(6..=8),
                base_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(11..=15) == 0b11100 {
            UncondBranch {
                offset: u32::from(op_code.get_bits(0..=10) << 1).sign_extended(12),
            }
        } else if op_code.get_bits(12..=15) == 0b1000 {
            LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: op_code.get_bits(6..=10) << 1,
                base_register: op_code.get_bits(3..=5),
                source_destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(12..=15) == 0b1001 {
            SPRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: op_code.get_bits(8..=10),
                word8: op_code.get_bits(0..=7) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1010 {
            LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: op_code.get_bits(8..=10),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1100 {
            MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: op_code.get_bits(8..=10),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(12..=15) == 0b1101 {
            let condition = Condition::from(op_code.get_bits(8..=11) as u8);
            if condition == Condition::AL {
                tracing::debug!("undefined conditional branch encoding 0x{op_code:04X}");
                return Undefined { op_code };
            }

            // 9 bits signed offset (assembler puts `label` >> 1 in this field so we should <<1)
            let offset = u32::from(op_code.get_bits(0..=7) << 1);
            CondBranch {
                condition,
                immediate_offset: offset.sign_extended(9) as i32,
            }
        } else if op_code.get_bits(12..=15) == 0b1111 {
            LongBranchLink {
                h: op_code.get_bit(11),
                offset: u32::from(op_code.get_bits(0..=10)),
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            MoveShiftedRegister {
                shift_operation: op_code.get_bits(11..=12).into(),
                offset5: op_code.get_bits(6..=10),
                source_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                destination_register: op_code.get_bits(8..=10),
                offset: op_code.get_bits(0..=7).into(),
            }
        } else if op_code.get_bits(13..=15) == 0b011 {
            let byte_word: ReadWriteKind = op_code.get_bit(12).into();
            let offset = match byte_word {
                ReadWriteKind::Word => op_code.get_bits(6..=10) << 2,
                ReadWriteKind::Byte => op_code.get_bits(6..=10),
            };

            LoadStoreImmOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word,
                offset,
                base_register: op_code.get_bits(3..=5),
                destination_register: op_code.get_bits(0..=2),
            }
        } else {
            // BLX and the ARMv5 hint space.
            tracing::debug!("undefined Thumb instruction 0x{op_code:04X}");
            Undefined { op_code }
        }
    }
}

fn register_list_to_string(register_list: u16, extra: Option<&str>) -> String {
    (0..8)
        .filter(|i| register_list.get_bit(*i))
        .map(|i| format!("R{i}"))
        .chain(extra.map(str::to_owned))
        .collect::<Vec<_>>()
        .join(", ")
}

const fn transfer_mnemonic(load_store: LoadStoreKind, byte_word: ReadWriteKind) -> &'static str {
    match (load_store, byte_word) {
        (LoadStoreKind::Load, ReadWriteKind::Byte) => "LDRB",
        (LoadStoreKind::Load, ReadWriteKind::Word) => "LDR",
        (LoadStoreKind::Store, ReadWriteKind::Byte) => "STRB",
        (LoadStoreKind::Store, ReadWriteKind::Word) => "STR",
    }
}

impl std::fmt::Display for Instruction {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => write!(
                f,
                "{shift_operation} R{destination_register}, R{source_register}, #{offset5}"
            ),
            Self::AddSubtract {
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let op = if *subtract { "SUB" } else { "ADD" };
                match operation_kind {
                    OperandKind::Immediate => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, #{rn_offset3}"
                    ),
                    OperandKind::Register => write!(
                        f,
                        "{op} R{destination_register}, R{source_register}, R{rn_offset3}"
                    ),
                }
            }
            Self::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => write!(f, "{operation} R{destination_register}, #{offset}"),
            Self::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => write!(f, "{alu_operation} R{destination_register}, R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation: ThumbHighRegisterOperation::BxOrBlx,
                source_register,
                ..
            } => write!(f, "BX R{source_register}"),
            Self::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => write!(
                f,
                "{register_operation} R{destination_register}, R{source_register}"
            ),
            Self::PCRelativeLoad {
                destination_register,
                immediate_value,
            } => write!(f, "LDR R{destination_register}, [PC, #{immediate_value}]"),
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            } => write!(
                f,
                "{} R{destination_register}, [R{base_register}, R{ro}]",
                transfer_mnemonic(*load_store, *byte_word)
            ),
            Self::LoadStoreSignExtByteHalfword {
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => {
                let op = match (sign_extend_flag, h) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                };
                write!(
                    f,
                    "{op} R{destination_register}, [R{base_register}, R{offset_register}]"
                )
            }
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => write!(
                f,
                "{} R{destination_register}, [R{base_register}, #{offset}]",
                transfer_mnemonic(*load_store, *byte_word)
            ),
            Self::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDRH",
                    LoadStoreKind::Store => "STRH",
                };
                write!(
                    f,
                    "{op} R{source_destination_register}, [R{base_register}, #{offset}]"
                )
            }
            Self::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => write!(
                f,
                "{} R{destination_register}, [SP, #{word8}]",
                transfer_mnemonic(*load_store, ReadWriteKind::Word)
            ),
            Self::LoadAddress {
                sp,
                destination_register,
                offset,
            } => {
                let source = if *sp { "SP" } else { "PC" };
                write!(f, "ADD R{destination_register}, {source}, #{offset}")
            }
            Self::AddOffsetSP { negative, word7 } => {
                let sign = if *negative { "-" } else { "" };
                write!(f, "ADD SP, #{sign}{word7}")
            }
            Self::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => {
                let (op, extra) = match load_store {
                    LoadStoreKind::Load => ("POP", "PC"),
                    LoadStoreKind::Store => ("PUSH", "LR"),
                };
                let registers = register_list_to_string(*register_list, pc_lr.then_some(extra));
                write!(f, "{op} {{{registers}}}")
            }
            Self::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => {
                let op = match load_store {
                    LoadStoreKind::Load => "LDMIA",
                    LoadStoreKind::Store => "STMIA",
                };
                let registers = register_list_to_string(*register_list, None);
                write!(f, "{op} R{base_register}!, {{{registers}}}")
            }
            Self::CondBranch {
                condition,
                immediate_offset,
            } => write!(f, "B{condition} {immediate_offset:+}"),
            Self::Swi { comment } => write!(f, "SWI 0x{comment:02X}"),
            Self::UncondBranch { offset } => write!(f, "B {:+}", *offset as i32),
            Self::LongBranchLink { h: false, offset } => write!(f, "BL.hi #0x{offset:X}"),
            Self::LongBranchLink { h: true, offset } => write!(f, "BL.lo #0x{offset:X}"),
            Self::Undefined { op_code } => write!(f, "UND 0x{op_code:04X}"),
        }
    }
}
