//! # Banked Registers for Exception Modes
//!
//! Each exception mode owns its R13 (SP), R14 (LR) and SPSR; FIQ additionally
//! owns R8-R12. The banks are stored in fixed arrays indexed by
//! [`Mode::bank_index`], so a mode switch is a pair of array copies.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::{BANKS_COUNT, Mode};
use crate::cpu::psr::Psr;
use crate::cpu::registers::{REG_LR, REG_SP, Registers};

const FIQ_LOW_BANK: usize = 1;
const SHARED_LOW_BANK: usize = 0;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    /// `[R13, R14]` for every bank.
    stack_and_link: [[u32; 2]; BANKS_COUNT],

    /// R8-R12, one copy shared by every non-FIQ mode and one for FIQ.
    high_registers: [[u32; 5]; 2],

    /// SPSR per bank. The entry of the User/System bank is never read.
    spsr: [Psr; BANKS_COUNT],
}

impl RegisterBank {
    /// Stores the visible banked registers of `from` and loads the ones
    /// belonging to `to`.
    pub fn switch(&mut self, registers: &mut Registers, from: Mode, to: Mode) {
        let (from_idx, to_idx) = (from.bank_index(), to.bank_index());
        if from_idx == to_idx {
            return;
        }

        self.stack_and_link[from_idx] = [
            registers.register_at(REG_SP),
            registers.register_at(REG_LR),
        ];
        let [sp, lr] = self.stack_and_link[to_idx];
        registers.set_register_at(REG_SP, sp);
        registers.set_register_at(REG_LR, lr);

        let low_bank = |m: Mode| {
            if m == Mode::Fiq {
                FIQ_LOW_BANK
            } else {
                SHARED_LOW_BANK
            }
        };
        let (from_low, to_low) = (low_bank(from), low_bank(to));
        if from_low != to_low {
            for (i, reg) in (8..=12).enumerate() {
                self.high_registers[from_low][i] = registers.register_at(reg);
                registers.set_register_at(reg, self.high_registers[to_low][i]);
            }
        }
    }

    /// SPSR of `mode`, `None` for User and System.
    #[must_use]
    pub fn spsr(&self, mode: Mode) -> Option<Psr> {
        mode.has_spsr().then_some(self.spsr[mode.bank_index()])
    }

    /// Writes are ignored for modes without an SPSR.
    pub fn set_spsr(&mut self, mode: Mode, value: Psr) {
        if mode.has_spsr() {
            self.spsr[mode.bank_index()] = value;
        }
    }

    /// Sets the stack pointer a mode will see once it becomes active.
    /// Must not be used for the currently active mode.
    pub const fn set_banked_sp(&mut self, mode: Mode, value: u32) {
        self.stack_and_link[mode.bank_index()][0] = value;
    }

    #[must_use]
    pub const fn banked_sp(&self, mode: Mode) -> u32 {
        self.stack_and_link[mode.bank_index()][0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn switch_swaps_stack_and_link() {
        let mut bank = RegisterBank::default();
        let mut registers = Registers::default();
        registers.set_register_at(REG_SP, 0x0300_7F00);
        registers.set_register_at(REG_LR, 0x0800_0100);
        bank.set_banked_sp(Mode::Irq, 0x0300_7FA0);

        bank.switch(&mut registers, Mode::System, Mode::Irq);
        assert_eq!(registers.register_at(REG_SP), 0x0300_7FA0);
        assert_eq!(registers.register_at(REG_LR), 0);

        registers.set_register_at(REG_LR, 0x1234);
        bank.switch(&mut registers, Mode::Irq, Mode::System);
        assert_eq!(registers.register_at(REG_SP), 0x0300_7F00);
        assert_eq!(registers.register_at(REG_LR), 0x0800_0100);

        bank.switch(&mut registers, Mode::System, Mode::Irq);
        assert_eq!(registers.register_at(REG_LR), 0x1234);
    }

    #[test]
    fn fiq_banks_high_registers() {
        let mut bank = RegisterBank::default();
        let mut registers = Registers::default();
        for reg in 8..=12 {
            registers.set_register_at(reg, reg as u32);
        }

        bank.switch(&mut registers, Mode::User, Mode::Fiq);
        for reg in 8..=12 {
            assert_eq!(registers.register_at(reg), 0);
            registers.set_register_at(reg, 0xFF);
        }

        bank.switch(&mut registers, Mode::Fiq, Mode::Supervisor);
        for reg in 8..=12 {
            assert_eq!(registers.register_at(reg), reg as u32);
        }
    }

    #[test]
    fn user_mode_has_no_spsr() {
        let mut bank = RegisterBank::default();
        bank.set_spsr(Mode::User, Psr::from(0xF000_0000));
        bank.set_spsr(Mode::Irq, Psr::from(Mode::System));

        assert_eq!(bank.spsr(Mode::User), None);
        assert_eq!(bank.spsr(Mode::Irq), Some(Psr::from(Mode::System)));
    }
}
