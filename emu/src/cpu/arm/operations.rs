use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluInstructionKind, AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction, Kind,
    PsrKind, PsrOpKind, ShiftOperator, add_inner_op, shift, shift_immediate, sub_inner_op,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyLongVariant, ArmModeMultiplyVariant,
    HalfwordDataTransferOffsetKind, HalfwordTransferKind, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::psr::FLAGS_MASK;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

/// Extra cycles paid when the pipeline is refilled after a write to R15.
pub const PIPELINE_REFILL_CYCLES: u32 = 2;

impl Arm7tdmi {
    /// Executes an ARM instruction whose condition already passed and
    /// returns the cycles it took.
    pub(crate) fn execute_arm(&mut self, instruction: ArmModeInstruction) -> u32 {
        match instruction {
            ArmModeInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                ..
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            ArmModeInstruction::Multiply {
                variant,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
                ..
            } => self.multiply(
                variant,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::MultiplyLong {
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
                ..
            } => self.multiply_long(
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::PsrTransfer { psr_kind, kind, .. } => {
                self.psr_transfer(kind, psr_kind)
            }
            ArmModeInstruction::SingleDataSwap {
                quantity, rn, rd, rm, ..
            } => self.single_data_swap(quantity, rn, rd, rm),
            ArmModeInstruction::BranchAndExchange { register, .. } => {
                let target = self.registers.register_at(register as usize);
                self.branch_and_exchange_to(target);
                1 + PIPELINE_REFILL_CYCLES
            }
            ArmModeInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
                ..
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmModeInstruction::SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
                ..
            } => self.single_data_transfer(
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
                ..
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch { link, offset, .. } => self.branch(link, offset),
            ArmModeInstruction::SoftwareInterrupt { comment, .. } => {
                self.software_interrupt(comment.get_bits(16..=23) as u8)
            }
            ArmModeInstruction::Undefined { op_code } => {
                tracing::warn!(
                    "undefined ARM instruction 0x{op_code:08X} at 0x{:08X}, skipped",
                    self.current_instruction_address()
                );
                1
            }
        }
    }

    /// Register read as seen by an operand that uses a register-specified
    /// shift: R15 is one more word ahead.
    fn operand_register(&self, register: u32, register_shift: bool) -> u32 {
        let value = self.registers.register_at(register as usize);
        if register_shift && register as usize == REG_PROGRAM_COUNTER {
            value.wrapping_add(4)
        } else {
            value
        }
    }

    /// Evaluates operand2 through the barrel shifter. Returns the value,
    /// the shifter carry-out and whether the amount came from a register.
    fn alu_operand(&self, op2: AluSecondOperandInfo) -> (u32, bool, bool) {
        let carry = self.cpsr.carry_flag();
        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                let value = base.rotate_right(shift);
                let carry = if shift == 0 { carry } else { value.get_bit(31) };
                (value, carry, false)
            }
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Immediate(amount),
                shift_kind,
                register,
            } => {
                let rm = self.operand_register(register, false);
                let result = shift_immediate(shift_kind, amount, rm, carry);
                (result.result, result.carry, false)
            }
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(rs),
                shift_kind,
                register,
            } => {
                let amount = self.registers.register_at(rs as usize) & 0xFF;
                let rm = self.operand_register(register, true);
                let result = shift(shift_kind, amount, rm, carry);
                (result.result, result.carry, true)
            }
        }
    }

    fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) -> u32 {
        let (op2, shifter_carry, register_shift) = self.alu_operand(op2);
        let op1 = self.operand_register(rn, register_shift);
        let carry = self.cpsr.carry_flag();

        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        let result = match alu_instruction {
            And | Tst => logical_result(op1 & op2, shifter_carry),
            Eor | Teq => logical_result(op1 ^ op2, shifter_carry),
            Orr => logical_result(op1 | op2, shifter_carry),
            Mov => logical_result(op2, shifter_carry),
            Bic => logical_result(op1 & !op2, shifter_carry),
            Mvn => logical_result(!op2, shifter_carry),
            Sub | Cmp => sub_inner_op(op1, op2, true),
            Rsb => sub_inner_op(op2, op1, true),
            Add | Cmn => add_inner_op(op1, op2, false),
            Adc => add_inner_op(op1, op2, carry),
            Sbc => sub_inner_op(op1, op2, carry),
            Rsc => sub_inner_op(op2, op1, carry),
        };

        let mut cycles = 1 + u32::from(register_shift);
        let writes_pc = !alu_instruction.is_test() && destination as usize == REG_PROGRAM_COUNTER;

        if set_conditions && writes_pc {
            // Exception return: CPSR comes back from SPSR before the jump
            // so the new state decides the alignment.
            match self.spsr() {
                Some(spsr) => self.set_cpsr(spsr),
                None => tracing::debug!(
                    "{alu_instruction}S to PC in {:?} mode without SPSR",
                    self.cpsr.mode()
                ),
            }
        } else if set_conditions {
            match alu_instruction.kind() {
                AluInstructionKind::Logical => {
                    self.cpsr.set_logical_flags(result.result, result.carry);
                }
                AluInstructionKind::Arithmetic => self.cpsr.set_flags(&result),
            }
        }

        if !alu_instruction.is_test() {
            self.write_register(destination as usize, result.result);
        }

        if writes_pc {
            cycles += PIPELINE_REFILL_CYCLES;
        }

        cycles
    }

    fn psr_transfer(&mut self, op_kind: PsrOpKind, psr_kind: PsrKind) -> u32 {
        match op_kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr().unwrap_or_else(|| {
                        tracing::debug!("MRS from SPSR in {:?} mode", self.cpsr.mode());
                        self.cpsr
                    }),
                };
                self.write_register(destination_register as usize, psr.into());
            }
            PsrOpKind::Msr {
                field_mask,
                operand,
            } => {
                let value = match operand {
                    AluSecondOperandInfo::Immediate { base, shift } => base.rotate_right(shift),
                    AluSecondOperandInfo::Register { register, .. } => {
                        self.registers.register_at(register as usize)
                    }
                };

                match psr_kind {
                    PsrKind::Cpsr => {
                        let mask = if self.cpsr.mode().is_privileged() {
                            field_mask
                        } else {
                            field_mask & FLAGS_MASK
                        };
                        let mut cpsr = self.cpsr;
                        cpsr.write_masked(value, mask);
                        self.set_cpsr(cpsr);
                    }
                    PsrKind::Spsr => match self.spsr() {
                        Some(mut spsr) => {
                            spsr.write_masked(value, field_mask);
                            self.set_spsr(spsr);
                        }
                        None => {
                            tracing::debug!("MSR to SPSR in {:?} mode ignored", self.cpsr.mode());
                        }
                    },
                }
            }
        }

        1
    }

    fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let rs_value = self.registers.register_at(rs as usize);
        let mut result = self
            .registers
            .register_at(rm as usize)
            .wrapping_mul(rs_value);
        let mut cycles = 1 + multiplier_cycles(rs_value, true);

        if variant == ArmModeMultiplyVariant::Mla {
            result = result.wrapping_add(self.registers.register_at(rn as usize));
            cycles += 1;
        }

        self.write_register(rd as usize, result);
        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }

        cycles
    }

    fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rd_hi: u32,
        rd_lo: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let rs_value = self.registers.register_at(rs as usize);
        let rm_value = self.registers.register_at(rm as usize);
        let accumulator = (u64::from(self.registers.register_at(rd_hi as usize)) << 32)
            | u64::from(self.registers.register_at(rd_lo as usize));

        use ArmModeMultiplyLongVariant::{Smlal, Smull, Umlal, Umull};
        let product = match variant {
            Umull | Umlal => u64::from(rm_value) * u64::from(rs_value),
            Smull | Smlal => (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64,
        };
        let result = match variant {
            Umlal | Smlal => product.wrapping_add(accumulator),
            Umull | Smull => product,
        };

        self.write_register(rd_lo as usize, result as u32);
        self.write_register(rd_hi as usize, (result >> 32) as u32);

        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }

        let signed = matches!(variant, Smull | Smlal);
        let accumulate = matches!(variant, Umlal | Smlal);
        2 + multiplier_cycles(rs_value, signed) + u32::from(accumulate)
    }

    fn single_data_swap(&mut self, quantity: ReadWriteKind, rn: u32, rd: u32, rm: u32) -> u32 {
        let address = self.registers.register_at(rn as usize);
        let source = self.registers.register_at(rm as usize);

        let loaded = match quantity {
            ReadWriteKind::Word => {
                let loaded = self.read_word_rotated(address);
                self.bus.write_word(address & !0b11, source);
                loaded
            }
            ReadWriteKind::Byte => {
                let loaded = u32::from(self.bus.read_byte(address));
                self.bus.write_byte(address, source as u8);
                loaded
            }
        };
        self.write_register(rd as usize, loaded);

        4
    }

    #[allow(clippy::too_many_arguments)]
    fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        rd: u32,
        transfer_kind: HalfwordTransferKind,
    ) -> u32 {
        let base = self.registers.register_at(base_register as usize);
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => {
                self.registers.register_at(register as usize)
            }
        };
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let update_base = indexing == Indexing::Post || write_back;

        match load_store_kind {
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => self.read_half_word_rotated(address),
                    HalfwordTransferKind::SignedByte => self.read_signed_byte(address),
                    HalfwordTransferKind::SignedHalfwords => self.read_signed_half_word(address),
                };
                if update_base {
                    self.write_register(base_register as usize, offset_address);
                }
                self.write_register(rd as usize, value);

                if rd as usize == REG_PROGRAM_COUNTER {
                    3 + PIPELINE_REFILL_CYCLES
                } else {
                    3
                }
            }
            LoadStoreKind::Store => {
                if transfer_kind == HalfwordTransferKind::UnsignedHalfwords {
                    let value = self.operand_register(rd, true);
                    self.bus.write_half_word(address & !0b1, value as u16);
                } else {
                    tracing::debug!("signed halfword store {transfer_kind} ignored");
                }
                if update_base {
                    self.write_register(base_register as usize, offset_address);
                }

                2
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) -> u32 {
        let base = self.registers.register_at(base_register as usize);
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let rm = self.registers.register_at(reg_offset as usize);
                shift_immediate(shift_kind, shift_amount, rm, self.cpsr.carry_flag()).result
            }
        };
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let update_base = indexing == Indexing::Post || write_back;

        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => self.read_word_rotated(address),
                    ReadWriteKind::Byte => u32::from(self.bus.read_byte(address)),
                };
                if update_base {
                    self.write_register(base_register as usize, offset_address);
                }
                self.write_register(rd as usize, value);

                if rd as usize == REG_PROGRAM_COUNTER {
                    3 + PIPELINE_REFILL_CYCLES
                } else {
                    3
                }
            }
            LoadStoreKind::Store => {
                let value = self.operand_register(rd, true);
                match quantity {
                    ReadWriteKind::Word => self.bus.write_word(address & !0b11, value),
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                }
                if update_base {
                    self.write_register(base_register as usize, offset_address);
                }

                2
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    ) -> u32 {
        // An empty list transfers R15 and moves the base by 0x40.
        let (register_list, transfer_size) = if register_list == 0 {
            (1 << REG_PROGRAM_COUNTER, 0x40)
        } else {
            (register_list, register_list.count_ones() * 4)
        };

        let base = self.registers.register_at(rn as usize);
        let (mut address, new_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(transfer_size)),
            (Offsetting::Up, Indexing::Pre) => {
                (base.wrapping_add(4), base.wrapping_add(transfer_size))
            }
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(transfer_size).wrapping_add(4),
                base.wrapping_sub(transfer_size),
            ),
            (Offsetting::Down, Indexing::Pre) => (
                base.wrapping_sub(transfer_size),
                base.wrapping_sub(transfer_size),
            ),
        };

        let pc_in_list = register_list.get_bit(REG_PROGRAM_COUNTER as u8);
        let restore_cpsr = load_psr && load_store == LoadStoreKind::Load && pc_in_list;
        let user_bank = load_psr && !restore_cpsr;
        let registers = (0..16).filter(|reg| register_list.get_bit(*reg as u8));

        match load_store {
            LoadStoreKind::Load => {
                if write_back {
                    self.write_register(rn as usize, new_base);
                }

                let current_mode = self.cpsr.mode();
                if user_bank {
                    self.swap_mode(Mode::User);
                }

                let mut new_pc = None;
                for reg in registers {
                    let value = self.bus.read_word(address);
                    if reg == REG_PROGRAM_COUNTER {
                        new_pc = Some(value);
                    } else {
                        self.registers.set_register_at(reg, value);
                    }
                    address = address.wrapping_add(4);
                }

                if user_bank {
                    self.swap_mode(current_mode);
                }

                if let Some(pc) = new_pc {
                    if restore_cpsr {
                        match self.spsr() {
                            Some(spsr) => self.set_cpsr(spsr),
                            None => tracing::debug!("LDM^ in {current_mode:?} mode without SPSR"),
                        }
                    }
                    self.branch_to(pc);
                }

                let cycles = register_list.count_ones() + 2;
                if pc_in_list {
                    cycles + PIPELINE_REFILL_CYCLES
                } else {
                    cycles
                }
            }
            LoadStoreKind::Store => {
                let current_mode = self.cpsr.mode();
                if user_bank {
                    self.swap_mode(Mode::User);
                }

                let first_register = register_list.trailing_zeros() as usize;
                for reg in registers {
                    let value = if reg == rn as usize && reg != first_register {
                        new_base
                    } else {
                        self.operand_register(reg as u32, true)
                    };
                    self.bus.write_word(address, value);
                    address = address.wrapping_add(4);
                }

                if user_bank {
                    self.swap_mode(current_mode);
                }
                if write_back {
                    self.write_register(rn as usize, new_base);
                }

                register_list.count_ones() + 1
            }
        }
    }

    fn branch(&mut self, link: bool, offset: u32) -> u32 {
        let pc = self.registers.program_counter();
        if link {
            self.registers.set_register_at(REG_LR, pc.wrapping_sub(4));
        }
        self.branch_to(pc.wrapping_add(offset));

        1 + PIPELINE_REFILL_CYCLES
    }
}

const fn logical_result(result: u32, carry: bool) -> ArithmeticOpResult {
    ArithmeticOpResult {
        result,
        carry,
        overflow: false,
        sign: (result >> 31) == 1,
        zero: result == 0,
    }
}

/// Internal cycles of the multiplier, which exits early depending on how
/// many upper bytes of the multiplier operand are all zeros (or all ones
/// for signed multiplies).
pub(crate) const fn multiplier_cycles(rs: u32, signed: bool) -> u32 {
    let mut cycles = 1;
    let mut mask = 0xFFFF_FF00;
    while cycles < 4 {
        let upper = rs & mask;
        if upper == 0 || (signed && upper == mask) {
            break;
        }
        cycles += 1;
        mask <<= 8;
    }
    cycles
}
