use serde::{Deserialize, Serialize};

use crate::bios::Firmware;
use crate::bitwise::Bits;
use crate::bus::{Bus, PowerDownRequest};
use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP, Registers};
use crate::cpu::thumb::instruction::Instruction;

pub const SIZE_OF_ARM_INSTRUCTION: u32 = 4;
pub const SIZE_OF_THUMB_INSTRUCTION: u32 = 2;

/// Exception vectors in the BIOS region.
pub const SWI_VECTOR: u32 = 0x0000_0008;
pub const IRQ_VECTOR: u32 = 0x0000_0018;

/// Where the cartridge code starts once the firmware hands over.
pub const CARTRIDGE_ENTRY: u32 = 0x0800_0000;

/// Stack pointers left behind by the firmware boot sequence.
pub const SP_USER: u32 = 0x0300_7F00;
pub const SP_IRQ: u32 = 0x0300_7FA0;
pub const SP_SUPERVISOR: u32 = 0x0300_7FE0;

/// Interrupts able to leave the STOP state: serial, keypad and game pak.
const STOP_WAKE_MASK: u16 = (1 << Interrupt::Serial as u16)
    | (1 << Interrupt::Keypad as u16)
    | (1 << Interrupt::GamePak as u16);

/// Cycles spent taking an exception (pipeline refill).
const EXCEPTION_CYCLES: u32 = 3;

/// Low power states entered through HALTCNT or the Halt/Stop/IntrWait calls.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltState {
    #[default]
    Running,

    /// Wakes on any enabled interrupt request.
    Halted,

    /// Waits for a request in `mask`. With IRQs unmasked any enabled
    /// interrupt is serviced and the wait resumes afterwards.
    IntrWait { mask: u16 },

    /// Wakes on keypad, serial or game pak interrupts.
    Stopped,
}

enum Wake {
    Asleep,
    Awake,
    /// An IRQ arrived during IntrWait; its handler returns into the SWI.
    IrqDuringWait,
}

#[derive(Serialize, Deserialize)]
pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    firmware: Firmware,
    halt_state: HaltState,

    /// Set when an IRQ left IntrWait, so the re-executed SWI keeps waiting.
    #[serde(default)]
    resume_wait: bool,

    /// Address of the instruction being executed.
    #[serde(skip)]
    current_instruction_address: u32,

    /// Set when the executing instruction wrote R15.
    #[serde(skip)]
    pc_written: bool,

    executed_instructions: u64,
    elapsed_cycles: u64,
}

impl Arm7tdmi {
    #[must_use]
    pub fn new(bus: Bus, firmware: Firmware) -> Self {
        let mut cpu = Self {
            bus,
            cpsr: Psr::from(Mode::System),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            firmware,
            halt_state: HaltState::Running,
            resume_wait: false,
            current_instruction_address: 0,
            pc_written: false,
            executed_instructions: 0,
            elapsed_cycles: 0,
        };
        cpu.reset(true);

        cpu
    }

    /// Puts registers back to their power-on values. With `skip_boot` the CPU
    /// starts where the firmware would leave it: System mode at the cartridge
    /// entry point. Otherwise it starts at the reset vector in Supervisor mode.
    pub fn reset(&mut self, skip_boot: bool) {
        self.registers = Registers::default();
        self.register_bank = RegisterBank::default();
        self.cpsr = Psr::from(Mode::System);
        self.halt_state = HaltState::Running;
        self.resume_wait = false;
        self.pc_written = false;
        self.executed_instructions = 0;
        self.elapsed_cycles = 0;

        self.register_bank.set_banked_sp(Mode::Irq, SP_IRQ);
        self.register_bank.set_banked_sp(Mode::Supervisor, SP_SUPERVISOR);
        self.registers.set_register_at(REG_SP, SP_USER);

        if skip_boot {
            self.registers.set_program_counter(CARTRIDGE_ENTRY);
        } else {
            self.swap_mode(Mode::Supervisor);
            self.cpsr.set_irq_disable(true);
            self.cpsr.set_fiq_disable(true);
            self.registers.set_program_counter(0);
        }

        tracing::debug!(
            "CPU reset, PC=0x{:08X}, mode={:?}",
            self.registers.program_counter(),
            self.cpsr.mode()
        );
    }

    /// Executes one instruction (or takes one interrupt) and returns the
    /// cycles it took. Returns 0 while halted with nothing to wake it.
    pub fn step(&mut self) -> u32 {
        let irq_during_wait = match self.poll_halt() {
            Wake::Asleep => return 0,
            Wake::Awake => false,
            Wake::IrqDuringWait => true,
        };

        if self.bus.interrupt_control.pending_interrupt().is_some() && !self.cpsr.irq_disable() {
            self.enter_irq(irq_during_wait);
            self.elapsed_cycles += u64::from(EXCEPTION_CYCLES);
            return EXCEPTION_CYCLES;
        }

        let pc = self.registers.program_counter();
        self.current_instruction_address = pc;
        self.pc_written = false;

        let state = self.cpsr.cpu_state();
        let cycles = match state {
            CpuState::Arm => {
                let op_code = self.bus.read_word(pc);
                // R15 reads as the address of the instruction plus 8 while executing.
                self.registers
                    .set_program_counter(pc.wrapping_add(2 * SIZE_OF_ARM_INSTRUCTION));
                let instruction = ArmModeInstruction::from(op_code);
                tracing::trace!("0x{pc:08X}: {instruction}");

                if self.cpsr.can_execute(instruction.condition()) {
                    self.execute_arm(instruction)
                } else {
                    1
                }
            }
            CpuState::Thumb => {
                let op_code = self.bus.read_half_word(pc);
                self.registers
                    .set_program_counter(pc.wrapping_add(2 * SIZE_OF_THUMB_INSTRUCTION));
                let instruction = Instruction::from(op_code);
                tracing::trace!("0x{pc:08X}: {instruction}");

                self.execute_thumb(instruction)
            }
        };

        if !self.pc_written {
            self.registers
                .set_program_counter(pc.wrapping_add(state.instruction_size()));
        }

        if let Some(request) = self.bus.take_power_down_request() {
            self.halt_state = match request {
                PowerDownRequest::Halt => HaltState::Halted,
                PowerDownRequest::Stop => HaltState::Stopped,
            };
        }

        self.executed_instructions += 1;
        self.elapsed_cycles += u64::from(cycles);

        cycles
    }

    fn poll_halt(&mut self) -> Wake {
        let interrupt_control = &mut self.bus.interrupt_control;
        let requested = interrupt_control.enabled_requests();
        let wakes = match self.halt_state {
            HaltState::Running => return Wake::Awake,
            HaltState::Halted => requested != 0,
            HaltState::Stopped => requested & STOP_WAKE_MASK != 0,
            HaltState::IntrWait { .. }
                if !self.cpsr.irq_disable() && interrupt_control.pending_interrupt().is_some() =>
            {
                tracing::trace!("IRQ during IntrWait, IE&IF=0x{requested:04X}");
                self.halt_state = HaltState::Running;
                return Wake::IrqDuringWait;
            }
            // IRQs masked: a latched IF bit from before the wait does not count.
            HaltState::IntrWait { mask } => interrupt_control.take_new_requests(mask) != 0,
        };

        if wakes {
            tracing::trace!("waking from {:?}, IE&IF=0x{requested:04X}", self.halt_state);
            self.halt_state = HaltState::Running;
            Wake::Awake
        } else {
            Wake::Asleep
        }
    }

    fn enter_irq(&mut self, during_wait: bool) {
        let interrupt_control = &mut self.bus.interrupt_control;
        let delivered = interrupt_control.enabled_requests();
        interrupt_control.bios_flags |= delivered;

        let mut next = self.registers.program_counter();
        if during_wait {
            // Return to the waiting SWI itself so it checks the flags again.
            next = next.wrapping_sub(self.cpsr.cpu_state().instruction_size());
            self.resume_wait = true;
        }

        // LR_irq points one instruction past the next one in both states,
        // so the handler returns with `SUBS PC, LR, #4`.
        let return_address = next.wrapping_add(4);
        tracing::trace!(
            "IRQ entry, IE&IF=0x{delivered:04X}, return to 0x{:08X}",
            return_address.wrapping_sub(4)
        );

        self.enter_exception(Mode::Irq, IRQ_VECTOR, return_address);
    }

    /// Switches to `mode`, saving CPSR into its SPSR, and jumps to `vector`
    /// in ARM state with IRQs disabled.
    pub(crate) fn enter_exception(&mut self, mode: Mode, vector: u32, return_address: u32) {
        let old_cpsr = self.cpsr;
        self.swap_mode(mode);
        self.register_bank.set_spsr(mode, old_cpsr);
        self.registers.set_register_at(REG_LR, return_address);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        self.registers.set_program_counter(vector);
        self.pc_written = true;
    }

    /// Software interrupt with the given call number, either served by the
    /// HLE firmware or vectored to 0x08 like the real chip.
    pub(crate) fn software_interrupt(&mut self, number: u8) -> u32 {
        match self.firmware {
            Firmware::Hle(bios) => bios.handle(self, number),
            Firmware::Vectored => {
                let size = self.cpsr.cpu_state().instruction_size();
                let return_address = self.current_instruction_address.wrapping_add(size);
                self.enter_exception(Mode::Supervisor, SWI_VECTOR, return_address);
                EXCEPTION_CYCLES
            }
        }
    }

    /// Changes the CPU mode swapping in the banked registers.
    pub fn swap_mode(&mut self, mode: Mode) {
        let current = self.cpsr.mode();
        self.register_bank
            .switch(&mut self.registers, current, mode);
        self.cpsr.set_mode(mode);
    }

    /// Replaces CPSR, switching register banks if the mode field changes.
    pub fn set_cpsr(&mut self, psr: Psr) {
        let current = self.cpsr.mode();
        self.register_bank
            .switch(&mut self.registers, current, psr.mode());
        self.cpsr = psr;
    }

    /// SPSR of the current mode, `None` in User and System mode.
    #[must_use]
    pub fn spsr(&self) -> Option<Psr> {
        self.register_bank.spsr(self.cpsr.mode())
    }

    pub fn set_spsr(&mut self, psr: Psr) {
        self.register_bank.set_spsr(self.cpsr.mode(), psr);
    }

    /// Writes a register, routing R15 through [`Self::branch_to`].
    pub(crate) fn write_register(&mut self, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.branch_to(value);
        } else {
            self.registers.set_register_at(reg, value);
        }
    }

    /// Jumps to `address`, aligned for the current instruction set.
    pub(crate) fn branch_to(&mut self, address: u32) {
        let aligned = match self.cpsr.cpu_state() {
            CpuState::Arm => address & !0b11,
            CpuState::Thumb => address & !0b1,
        };
        self.registers.set_program_counter(aligned);
        self.pc_written = true;
    }

    /// BX semantics: bit 0 of the target selects the instruction set.
    pub(crate) fn branch_and_exchange_to(&mut self, address: u32) {
        self.cpsr.set_cpu_state(address.get_bit(0).into());
        self.branch_to(address);
    }

    /// Address of the instruction currently executing.
    #[must_use]
    pub const fn current_instruction_address(&self) -> u32 {
        self.current_instruction_address
    }

    /// LDR semantics: misaligned word loads rotate the aligned word.
    pub(crate) fn read_word_rotated(&mut self, address: u32) -> u32 {
        let value = self.bus.read_word(address & !0b11);
        value.rotate_right((address & 0b11) * 8)
    }

    /// LDRH semantics: a misaligned halfword load rotates by 8.
    pub(crate) fn read_half_word_rotated(&mut self, address: u32) -> u32 {
        let value = u32::from(self.bus.read_half_word(address & !0b1));
        value.rotate_right((address & 0b1) * 8)
    }

    /// LDRSH semantics: a misaligned load reads a sign-extended byte.
    pub(crate) fn read_signed_half_word(&mut self, address: u32) -> u32 {
        if address.get_bit(0) {
            self.read_signed_byte(address)
        } else {
            u32::from(self.bus.read_half_word(address)).sign_extended(16)
        }
    }

    pub(crate) fn read_signed_byte(&mut self, address: u32) -> u32 {
        u32::from(self.bus.read_byte(address)).sign_extended(8)
    }

    #[must_use]
    pub const fn halt_state(&self) -> HaltState {
        self.halt_state
    }

    pub const fn set_halt_state(&mut self, state: HaltState) {
        self.halt_state = state;
    }

    /// Returns and clears the flag left by an IRQ that interrupted IntrWait.
    pub(crate) const fn take_resume_wait(&mut self) -> bool {
        let resume = self.resume_wait;
        self.resume_wait = false;
        resume
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        !matches!(self.halt_state, HaltState::Running)
    }

    #[must_use]
    pub const fn firmware(&self) -> Firmware {
        self.firmware
    }

    #[must_use]
    pub const fn executed_instructions(&self) -> u64 {
        self.executed_instructions
    }

    #[must_use]
    pub const fn elapsed_cycles(&self) -> u64 {
        self.elapsed_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::BiosHle;
    use crate::cpu::hardware::interrupt_control::Interrupt;
    use pretty_assertions::assert_eq;

    const PROGRAM_START: u32 = 0x0200_0000;

    pub fn cpu_with_arm_program(program: &[u32]) -> Arm7tdmi {
        let mut cpu = Arm7tdmi::new(Bus::default(), Firmware::Hle(BiosHle));
        for (i, word) in program.iter().enumerate() {
            cpu.bus.write_word(PROGRAM_START + (i as u32) * 4, *word);
        }
        cpu.registers.set_program_counter(PROGRAM_START);
        cpu
    }

    #[test]
    fn reset_loads_boot_stacks() {
        let mut cpu = Arm7tdmi::new(Bus::default(), Firmware::Hle(BiosHle));
        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert_eq!(cpu.registers.program_counter(), CARTRIDGE_ENTRY);
        assert_eq!(cpu.registers.register_at(REG_SP), SP_USER);

        cpu.swap_mode(Mode::Irq);
        assert_eq!(cpu.registers.register_at(REG_SP), SP_IRQ);
        cpu.swap_mode(Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(REG_SP), SP_SUPERVISOR);

        cpu.reset(false);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.registers.program_counter(), 0);
        assert_eq!(cpu.registers.register_at(REG_SP), SP_SUPERVISOR);
        assert!(cpu.cpsr.irq_disable());
    }

    #[test]
    fn check_step_advances_pc() {
        // MOV R0, #5 ; MOV R1, #7
        let mut cpu = cpu_with_arm_program(&[0xE3A0_0005, 0xE3A0_1007]);
        assert_eq!(cpu.step(), 1);
        assert_eq!(cpu.step(), 1);
        assert_eq!(cpu.registers.register_at(0), 5);
        assert_eq!(cpu.registers.register_at(1), 7);
        assert_eq!(cpu.registers.program_counter(), PROGRAM_START + 8);
        assert_eq!(cpu.executed_instructions(), 2);
    }

    #[test]
    fn failed_condition_is_skipped() {
        // MOVEQ R0, #5 with Z clear
        let mut cpu = cpu_with_arm_program(&[0x03A0_0005]);
        cpu.step();
        assert_eq!(cpu.registers.register_at(0), 0);
        assert_eq!(cpu.registers.program_counter(), PROGRAM_START + 4);
    }

    #[test]
    fn unknown_opcode_is_a_one_cycle_nop() {
        let mut cpu = cpu_with_arm_program(&[0xE600_0010]);
        assert_eq!(cpu.step(), 1);
        assert_eq!(cpu.registers.program_counter(), PROGRAM_START + 4);
    }

    #[test]
    fn irq_entry_from_arm() {
        let mut cpu = cpu_with_arm_program(&[0xE1A0_0000]);
        let old_cpsr = cpu.cpsr;
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 1;
        cpu.bus.interrupt_control.request(Interrupt::VBlank);

        assert_eq!(cpu.step(), EXCEPTION_CYCLES);
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(cpu.cpsr.irq_disable());
        assert_eq!(cpu.registers.program_counter(), IRQ_VECTOR);
        assert_eq!(cpu.registers.register_at(REG_LR), PROGRAM_START + 4);
        assert_eq!(cpu.spsr(), Some(old_cpsr));
        assert_eq!(cpu.registers.register_at(REG_SP), SP_IRQ);
        assert_eq!(cpu.bus.interrupt_control.bios_flags, 1);
    }

    #[test]
    fn irq_entry_from_thumb() {
        let mut cpu = cpu_with_arm_program(&[]);
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_program_counter(PROGRAM_START + 2);
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 1 << Interrupt::HBlank as u16;
        cpu.bus.interrupt_control.request(Interrupt::HBlank);

        cpu.step();
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.register_at(REG_LR), PROGRAM_START + 6);
        assert_eq!(cpu.spsr().map(Psr::cpu_state), Some(CpuState::Thumb));
    }

    #[test]
    fn masked_irq_is_not_taken() {
        let mut cpu = cpu_with_arm_program(&[0xE1A0_0000]);
        cpu.cpsr.set_irq_disable(true);
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 1;
        cpu.bus.interrupt_control.request(Interrupt::VBlank);

        assert_eq!(cpu.step(), 1);
        assert_eq!(cpu.cpsr.mode(), Mode::System);
    }

    #[test]
    fn halted_cpu_waits_for_matching_interrupt() {
        let mut cpu = cpu_with_arm_program(&[0xE1A0_0000]);
        cpu.cpsr.set_irq_disable(true);
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 0b11;
        cpu.set_halt_state(HaltState::IntrWait { mask: 0b01 });

        assert_eq!(cpu.step(), 0);
        cpu.bus.interrupt_control.request(Interrupt::HBlank);
        assert_eq!(cpu.step(), 0);
        assert!(cpu.is_halted());

        cpu.bus.interrupt_control.request(Interrupt::VBlank);
        assert_eq!(cpu.step(), 1);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn irq_during_intr_wait_returns_into_the_swi() {
        let mut cpu = cpu_with_arm_program(&[0xEF05_0000]);
        cpu.registers.set_program_counter(PROGRAM_START + 4);
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 0b11;
        cpu.set_halt_state(HaltState::IntrWait { mask: 0b01 });

        assert_eq!(cpu.step(), 0);
        cpu.bus.interrupt_control.request(Interrupt::HBlank);

        assert_eq!(cpu.step(), EXCEPTION_CYCLES);
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert_eq!(cpu.registers.register_at(REG_LR), PROGRAM_START + 4);
        assert_eq!(cpu.bus.interrupt_control.bios_flags, 0b10);
        assert!(cpu.take_resume_wait());
        assert!(!cpu.take_resume_wait());
    }

    #[test]
    fn stale_request_does_not_end_a_masked_intr_wait() {
        let mut cpu = cpu_with_arm_program(&[0xE1A0_0000]);
        cpu.cpsr.set_irq_disable(true);
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.interrupt_control.interrupt_enable = 1;
        cpu.bus.interrupt_control.request(Interrupt::VBlank);
        cpu.bus.interrupt_control.take_new_requests(u16::MAX);
        cpu.set_halt_state(HaltState::IntrWait { mask: 0b01 });

        assert_eq!(cpu.step(), 0);
        assert!(cpu.is_halted());
    }

    #[test]
    fn haltcnt_write_halts() {
        // MOV R0, #0x04000000 ; STRB R0, [R0, #0x301]
        let mut cpu = cpu_with_arm_program(&[0xE3A0_0301, 0xE5C0_0301]);
        cpu.step();
        cpu.step();
        assert_eq!(cpu.halt_state(), HaltState::Halted);
    }
}
