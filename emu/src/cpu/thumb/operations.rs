use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{add_inner_op, shift, shift_immediate, sub_inner_op};
use crate::cpu::arm::operations::{PIPELINE_REFILL_CYCLES, multiplier_cycles};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, Operation, ReadWriteKind, ShiftKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};
use crate::cpu::thumb::instruction::Instruction;

impl Arm7tdmi {
    /// Executes a Thumb instruction and returns the cycles it took.
    pub(crate) fn execute_thumb(&mut self, instruction: Instruction) -> u32 {
        match instruction {
            Instruction::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_reg(
                shift_operation,
                offset5,
                source_register,
                destination_register,
            ),
            Instruction::AddSubtract {
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => self.add_subtract(
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            ),
            Instruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            Instruction::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(alu_operation, source_register, destination_register),
            Instruction::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(
                register_operation,
                source_register,
                destination_register,
            ),
            Instruction::PCRelativeLoad {
                destination_register,
                immediate_value,
            } => self.pc_relative_load(destination_register, immediate_value),
            Instruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            } => {
                let address = self
                    .low_register(base_register)
                    .wrapping_add(self.low_register(ro));
                self.load_store_word_or_byte(load_store, byte_word, address, destination_register)
            }
            Instruction::LoadStoreSignExtByteHalfword {
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => self.load_store_sign_extend_byte_halfword(
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            ),
            Instruction::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => {
                let address = self
                    .low_register(base_register)
                    .wrapping_add(u32::from(offset));
                self.load_store_word_or_byte(load_store, byte_word, address, destination_register)
            }
            Instruction::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_halfword(
                load_store,
                offset,
                base_register,
                source_destination_register,
            ),
            Instruction::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => {
                let address = self
                    .registers
                    .register_at(REG_SP)
                    .wrapping_add(u32::from(word8));
                self.load_store_word_or_byte(
                    load_store,
                    ReadWriteKind::Word,
                    address,
                    destination_register,
                )
            }
            Instruction::LoadAddress {
                sp,
                destination_register,
                offset,
            } => self.load_address(sp, destination_register, offset),
            Instruction::AddOffsetSP { negative, word7 } => self.add_offset_sp(negative, word7),
            Instruction::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            Instruction::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.multiple_load_store(load_store, base_register, register_list),
            Instruction::CondBranch {
                condition,
                immediate_offset,
            } => self.cond_branch(condition, immediate_offset),
            Instruction::Swi { comment } => self.software_interrupt(comment),
            Instruction::UncondBranch { offset } => self.uncond_branch(offset),
            Instruction::LongBranchLink { h, offset } => self.long_branch_link(h, offset),
            Instruction::Undefined { op_code } => {
                tracing::warn!(
                    "undefined Thumb instruction 0x{op_code:04X} at 0x{:08X}, skipped",
                    self.current_instruction_address()
                );
                1
            }
        }
    }

    fn low_register(&self, register: u16) -> u32 {
        self.registers.register_at(usize::from(register))
    }

    fn set_low_register(&mut self, register: u16, value: u32) {
        self.registers.set_register_at(usize::from(register), value);
    }

    fn set_result_flags(&mut self, result: u32) {
        self.cpsr.set_sign_flag(result.get_bit(31));
        self.cpsr.set_zero_flag(result == 0);
    }

    fn move_shifted_reg(&mut self, op: ShiftKind, offset5: u16, rs: u16, rd: u16) -> u32 {
        let source = self.low_register(rs);
        let r = shift_immediate(op, offset5.into(), source, self.cpsr.carry_flag());
        self.set_low_register(rd, r.result);
        self.cpsr.set_logical_flags(r.result, r.carry);

        1
    }

    fn add_subtract(
        &mut self,
        operation_kind: OperandKind,
        subtract: bool,
        rn_offset3: u16,
        rs: u16,
        rd: u16,
    ) -> u32 {
        let first = self.low_register(rs);
        let second = match operation_kind {
            OperandKind::Immediate => u32::from(rn_offset3),
            OperandKind::Register => self.low_register(rn_offset3),
        };

        let result = if subtract {
            sub_inner_op(first, second, true)
        } else {
            add_inner_op(first, second, false)
        };
        self.set_low_register(rd, result.result);
        self.cpsr.set_flags(&result);

        1
    }

    fn move_compare_add_sub_imm(&mut self, op: Operation, rd: u16, offset: u32) -> u32 {
        let rd_value = self.low_register(rd);
        match op {
            Operation::Mov => {
                self.set_low_register(rd, offset);
                self.set_result_flags(offset);
            }
            Operation::Cmp => self.cpsr.set_flags(&sub_inner_op(rd_value, offset, true)),
            Operation::Add => {
                let result = add_inner_op(rd_value, offset, false);
                self.set_low_register(rd, result.result);
                self.cpsr.set_flags(&result);
            }
            Operation::Sub => {
                let result = sub_inner_op(rd_value, offset, true);
                self.set_low_register(rd, result.result);
                self.cpsr.set_flags(&result);
            }
        }

        1
    }

    fn alu_op(&mut self, op: ThumbModeAluInstruction, rs: u16, rd: u16) -> u32 {
        let rs_value = self.low_register(rs);
        let rd_value = self.low_register(rd);
        let carry = self.cpsr.carry_flag();

        use ThumbModeAluInstruction::{
            Adc, And, Asr, Bic, Cmn, Cmp, Eor, Lsl, Lsr, Mul, Mvn, Neg, Orr, Ror, Sbc, Tst,
        };
        match op {
            And | Eor | Orr | Bic | Mvn | Tst => {
                let result = match op {
                    And | Tst => rd_value & rs_value,
                    Eor => rd_value ^ rs_value,
                    Orr => rd_value | rs_value,
                    Bic => rd_value & !rs_value,
                    _ => !rs_value,
                };
                if op != Tst {
                    self.set_low_register(rd, result);
                }
                self.set_result_flags(result);

                1
            }
            Lsl | Lsr | Asr | Ror => {
                let kind = match op {
                    Lsl => ShiftKind::Lsl,
                    Lsr => ShiftKind::Lsr,
                    Asr => ShiftKind::Asr,
                    _ => ShiftKind::Ror,
                };
                let r = shift(kind, rs_value & 0xFF, rd_value, carry);
                self.set_low_register(rd, r.result);
                self.cpsr.set_logical_flags(r.result, r.carry);

                2
            }
            Adc | Sbc | Neg | Cmp | Cmn => {
                let result = match op {
                    Adc => add_inner_op(rd_value, rs_value, carry),
                    Sbc => sub_inner_op(rd_value, rs_value, carry),
                    Neg => sub_inner_op(0, rs_value, true),
                    Cmp => sub_inner_op(rd_value, rs_value, true),
                    _ => add_inner_op(rd_value, rs_value, false),
                };
                if !matches!(op, Cmp | Cmn) {
                    self.set_low_register(rd, result.result);
                }
                self.cpsr.set_flags(&result);

                1
            }
            Mul => {
                let result = rd_value.wrapping_mul(rs_value);
                self.set_low_register(rd, result);
                self.set_result_flags(result);

                1 + multiplier_cycles(rd_value, true)
            }
        }
    }

    fn hi_reg_operation_branch_ex(
        &mut self,
        op: ThumbHighRegisterOperation,
        rs: u16,
        rd: u16,
    ) -> u32 {
        let source = self.low_register(rs);
        let destination = self.low_register(rd);
        let rd = usize::from(rd);

        match op {
            ThumbHighRegisterOperation::Add => {
                self.write_register(rd, destination.wrapping_add(source));
            }
            ThumbHighRegisterOperation::Cmp => {
                self.cpsr
                    .set_flags(&sub_inner_op(destination, source, true));
                return 1;
            }
            ThumbHighRegisterOperation::Mov => self.write_register(rd, source),
            ThumbHighRegisterOperation::BxOrBlx => {
                self.branch_and_exchange_to(source);
                return 1 + PIPELINE_REFILL_CYCLES;
            }
        }

        if rd == REG_PROGRAM_COUNTER {
            1 + PIPELINE_REFILL_CYCLES
        } else {
            1
        }
    }

    fn pc_relative_load(&mut self, rd: u16, immediate_value: u16) -> u32 {
        let pc = self.registers.program_counter() & !0b11;
        let value = self
            .bus
            .read_word(pc.wrapping_add(u32::from(immediate_value)));
        self.set_low_register(rd, value);

        3
    }

    fn load_store_word_or_byte(
        &mut self,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        address: u32,
        rd: u16,
    ) -> u32 {
        match (load_store, byte_word) {
            (LoadStoreKind::Load, ReadWriteKind::Word) => {
                let value = self.read_word_rotated(address);
                self.set_low_register(rd, value);
                3
            }
            (LoadStoreKind::Load, ReadWriteKind::Byte) => {
                let value = u32::from(self.bus.read_byte(address));
                self.set_low_register(rd, value);
                3
            }
            (LoadStoreKind::Store, ReadWriteKind::Word) => {
                self.bus.write_word(address & !0b11, self.low_register(rd));
                2
            }
            (LoadStoreKind::Store, ReadWriteKind::Byte) => {
                self.bus.write_byte(address, self.low_register(rd) as u8);
                2
            }
        }
    }

    fn load_store_sign_extend_byte_halfword(
        &mut self,
        h: bool,
        sign_extend: bool,
        ro: u16,
        rb: u16,
        rd: u16,
    ) -> u32 {
        let address = self.low_register(rb).wrapping_add(self.low_register(ro));
        let value = match (sign_extend, h) {
            (false, false) => {
                self.bus
                    .write_half_word(address & !0b1, self.low_register(rd) as u16);
                return 2;
            }
            (false, true) => self.read_half_word_rotated(address),
            (true, false) => self.read_signed_byte(address),
            (true, true) => self.read_signed_half_word(address),
        };
        self.set_low_register(rd, value);

        3
    }

    fn load_store_halfword(
        &mut self,
        load_store: LoadStoreKind,
        offset: u16,
        rb: u16,
        rd: u16,
    ) -> u32 {
        let address = self.low_register(rb).wrapping_add(u32::from(offset));
        match load_store {
            LoadStoreKind::Load => {
                let value = self.read_half_word_rotated(address);
                self.set_low_register(rd, value);
                3
            }
            LoadStoreKind::Store => {
                self.bus
                    .write_half_word(address & !0b1, self.low_register(rd) as u16);
                2
            }
        }
    }

    fn load_address(&mut self, sp: bool, rd: u16, offset: u32) -> u32 {
        let base = if sp {
            self.registers.register_at(REG_SP)
        } else {
            self.registers.program_counter() & !0b11
        };
        self.set_low_register(rd, base.wrapping_add(offset));

        1
    }

    fn add_offset_sp(&mut self, negative: bool, word7: u16) -> u32 {
        let sp = self.registers.register_at(REG_SP);
        let offset = u32::from(word7);
        let sp = if negative {
            sp.wrapping_sub(offset)
        } else {
            sp.wrapping_add(offset)
        };
        self.registers.set_register_at(REG_SP, sp);

        1
    }

    fn push_pop_register(
        &mut self,
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    ) -> u32 {
        let count = register_list.count_ones() + u32::from(pc_lr);
        let sp = self.registers.register_at(REG_SP);

        match load_store {
            LoadStoreKind::Store => {
                let mut address = sp.wrapping_sub(count * 4);
                self.registers.set_register_at(REG_SP, address);
                for reg in (0..8).filter(|reg| register_list.get_bit(*reg)) {
                    self.bus.write_word(address, self.low_register(u16::from(reg)));
                    address = address.wrapping_add(4);
                }
                if pc_lr {
                    self.bus
                        .write_word(address, self.registers.register_at(REG_LR));
                }

                count + 1
            }
            LoadStoreKind::Load => {
                let mut address = sp;
                for reg in (0..8).filter(|reg| register_list.get_bit(*reg)) {
                    let value = self.bus.read_word(address);
                    self.set_low_register(u16::from(reg), value);
                    address = address.wrapping_add(4);
                }
                let mut cycles = count + 2;
                if pc_lr {
                    let pc = self.bus.read_word(address);
                    address = address.wrapping_add(4);
                    self.branch_to(pc);
                    cycles += PIPELINE_REFILL_CYCLES;
                }
                self.registers.set_register_at(REG_SP, address);

                cycles
            }
        }
    }

    fn multiple_load_store(
        &mut self,
        load_store: LoadStoreKind,
        rb: u16,
        register_list: u16,
    ) -> u32 {
        let base = self.low_register(rb);

        // An empty list transfers R15 and moves the base by 0x40.
        if register_list == 0 {
            match load_store {
                LoadStoreKind::Load => {
                    let pc = self.bus.read_word(base);
                    self.branch_to(pc);
                }
                LoadStoreKind::Store => {
                    let pc = self.registers.program_counter().wrapping_add(2);
                    self.bus.write_word(base, pc);
                }
            }
            self.set_low_register(rb, base.wrapping_add(0x40));
            return 3;
        }

        let count = register_list.count_ones();
        let new_base = base.wrapping_add(count * 4);
        let first_register = register_list.trailing_zeros() as u16;
        let mut address = base;

        match load_store {
            LoadStoreKind::Load => {
                self.set_low_register(rb, new_base);
                for reg in (0..8).filter(|reg| register_list.get_bit(*reg)) {
                    let value = self.bus.read_word(address);
                    self.set_low_register(u16::from(reg), value);
                    address = address.wrapping_add(4);
                }

                count + 2
            }
            LoadStoreKind::Store => {
                for reg in (0..8).filter(|reg| register_list.get_bit(*reg)) {
                    let reg = u16::from(reg);
                    let value = if reg == rb && reg != first_register {
                        new_base
                    } else {
                        self.low_register(reg)
                    };
                    self.bus.write_word(address, value);
                    address = address.wrapping_add(4);
                }
                self.set_low_register(rb, new_base);

                count + 1
            }
        }
    }

    fn cond_branch(&mut self, condition: Condition, immediate_offset: i32) -> u32 {
        if !self.cpsr.can_execute(condition) {
            return 1;
        }

        let pc = self.registers.program_counter();
        self.branch_to(pc.wrapping_add_signed(immediate_offset));

        1 + PIPELINE_REFILL_CYCLES
    }

    fn uncond_branch(&mut self, offset: u32) -> u32 {
        let pc = self.registers.program_counter();
        self.branch_to(pc.wrapping_add(offset));

        1 + PIPELINE_REFILL_CYCLES
    }

    fn long_branch_link(&mut self, h: bool, offset: u32) -> u32 {
        if h {
            let target = self
                .registers
                .register_at(REG_LR)
                .wrapping_add(offset << 1);
            let next_instruction = self.current_instruction_address().wrapping_add(2);
            self.registers.set_register_at(REG_LR, next_instruction | 1);
            self.branch_to(target);

            1 + PIPELINE_REFILL_CYCLES
        } else {
            let pc = self.registers.program_counter();
            let high = (offset << 12).sign_extended(23);
            self.registers.set_register_at(REG_LR, pc.wrapping_add(high));

            1
        }
    }
}
