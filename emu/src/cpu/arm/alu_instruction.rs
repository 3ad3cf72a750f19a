use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Display for ArmModeAluInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Eor => f.write_str("EOR"),
            Self::Sub => f.write_str("SUB"),
            Self::Rsb => f.write_str("RSB"),
            Self::Add => f.write_str("ADD"),
            Self::Adc => f.write_str("ADC"),
            Self::Sbc => f.write_str("SBC"),
            Self::Rsc => f.write_str("RSC"),
            Self::Tst => f.write_str("TST"),
            Self::Teq => f.write_str("TEQ"),
            Self::Cmp => f.write_str("CMP"),
            Self::Cmn => f.write_str("CMN"),
            Self::Orr => f.write_str("ORR"),
            Self::Mov => f.write_str("MOV"),
            Self::Bic => f.write_str("BIC"),
            Self::Mvn => f.write_str("MVN"),
        }
    }
}

#[derive(Eq, PartialEq, Debug)]
pub enum AluInstructionKind {
    Logical,
    Arithmetic,
}

pub trait Kind {
    fn kind(&self) -> AluInstructionKind;
}

impl Kind for ArmModeAluInstruction {
    fn kind(&self) -> AluInstructionKind {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match &self {
            And | Eor | Tst | Teq | Orr | Mov | Bic | Mvn => AluInstructionKind::Logical,
            Sub | Rsb | Add | Adc | Sbc | Rsc | Cmp | Cmn => AluInstructionKind::Arithmetic,
        }
    }
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only update the flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// How the shift amount of a register operand is specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOperator {
    /// 5-bit amount encoded in the instruction.
    Immediate(u32),

    /// Bottom byte of the given register.
    Register(u32),
}

impl Display for ShiftOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(amount) => write!(f, "#{amount}"),
            Self::Register(register) => write!(f, "R{register}"),
        }
    }
}

/// Operand2 of a data processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: u32,
    },
    /// `base` rotated right by `shift` (already doubled).
    Immediate { base: u32, shift: u32 },
}

impl From<u32> for AluSecondOperandInfo {
    /// Decodes bits 0-11 together with the I bit (25) of `op_code`.
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(25) {
            Self::Immediate {
                base: op_code.get_bits(0..=7),
                shift: op_code.get_bits(8..=11) * 2,
            }
        } else {
            let shift_op = if op_code.get_bit(4) {
                ShiftOperator::Register(op_code.get_bits(8..=11))
            } else {
                ShiftOperator::Immediate(op_code.get_bits(7..=11))
            };
            Self::Register {
                shift_op,
                shift_kind: op_code.get_bits(5..=6).into(),
                register: op_code.get_bits(0..=3),
            }
        }
    }
}

impl Display for AluSecondOperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate { base, shift } => write!(f, "#0x{:X}", base.rotate_right(*shift)),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Lsl,
                register,
            } => write!(f, "R{register}"),
            Self::Register {
                shift_op: ShiftOperator::Immediate(0),
                shift_kind: ShiftKind::Ror,
                register,
            } => write!(f, "R{register}, RRX"),
            Self::Register {
                shift_op,
                shift_kind,
                register,
            } => write!(f, "R{register}, {shift_kind} {shift_op}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

impl Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => f.write_str("CPSR"),
            Self::Spsr => f.write_str("SPSR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrOpKind {
    Mrs {
        destination_register: u32,
    },
    /// `field_mask` is the byte mask built from the f/s/x/c field bits.
    Msr {
        field_mask: u32,
        operand: AluSecondOperandInfo,
    },
}

/// Barrel shifter with the semantics of a register-specified amount:
/// an amount of 0 leaves both value and carry untouched.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    let (result, carry) = match (kind, shift_amount) {
        (_, 0) => (rm, carry),
        (ShiftKind::Lsl, 1..=31) => (rm << shift_amount, rm.get_bit((32 - shift_amount) as u8)),
        (ShiftKind::Lsl, 32) => (0, rm.get_bit(0)),
        (ShiftKind::Lsl, _) => (0, false),
        (ShiftKind::Lsr, 1..=31) => (rm >> shift_amount, rm.get_bit((shift_amount - 1) as u8)),
        (ShiftKind::Lsr, 32) => (0, rm.get_bit(31)),
        (ShiftKind::Lsr, _) => (0, false),
        (ShiftKind::Asr, 1..=31) => (
            ((rm as i32) >> shift_amount) as u32,
            rm.get_bit((shift_amount - 1) as u8),
        ),
        (ShiftKind::Asr, _) => (((rm as i32) >> 31) as u32, rm.get_bit(31)),
        (ShiftKind::Ror, _) => {
            let amount = shift_amount % 32;
            if amount == 0 {
                (rm, rm.get_bit(31))
            } else {
                (rm.rotate_right(amount), rm.get_bit((amount - 1) as u8))
            }
        }
    };

    ArithmeticOpResult {
        result,
        carry,
        sign: result.get_bit(31),
        zero: result == 0,
        ..Default::default()
    }
}

/// Barrel shifter for a 5-bit immediate amount, where `LSR #0` and `ASR #0`
/// encode a shift by 32 and `ROR #0` encodes RRX.
#[must_use]
pub fn shift_immediate(
    kind: ShiftKind,
    shift_amount: u32,
    rm: u32,
    carry: bool,
) -> ArithmeticOpResult {
    match (kind, shift_amount) {
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift(kind, 32, rm, carry),
        (ShiftKind::Ror, 0) => {
            let result = (rm >> 1) | (u32::from(carry) << 31);
            ArithmeticOpResult {
                result,
                carry: rm.get_bit(0),
                sign: result.get_bit(31),
                zero: result == 0,
                ..Default::default()
            }
        }
        _ => shift(kind, shift_amount, rm, carry),
    }
}

/// `first_op + second_op + carry_in` with ARM flag semantics.
#[must_use]
pub fn add_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    // we do the sum in 64bits so that the 32nd bit is the carry
    let result_and_carry = u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
    let result = result_and_carry as u32;

    // overflow only occurs when operands have the same sign and result has the opposite one
    let overflow = (!(first_op ^ second_op) & (first_op ^ result)).get_bit(31);

    ArithmeticOpResult {
        result,
        carry: result_and_carry > u64::from(u32::MAX),
        overflow,
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `first_op - second_op - !carry_in`. The carry flag is the inverted
/// borrow: set when no borrow happened.
#[must_use]
pub fn sub_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow = u32::from(!carry_in);
    let result = first_op.wrapping_sub(second_op).wrapping_sub(borrow);

    let overflow = ((first_op ^ second_op) & (first_op ^ result)).get_bit(31);

    ArithmeticOpResult {
        result,
        carry: u64::from(first_op) >= u64::from(second_op) + u64::from(borrow),
        overflow,
        sign: result.get_bit(31),
        zero: result == 0,
    }
}
