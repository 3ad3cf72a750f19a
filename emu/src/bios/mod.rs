//! High level emulation of the GBA firmware.
//!
//! With [`Firmware::Hle`] an `SWI` never enters the BIOS region: the call
//! number is dispatched to a native implementation that reads its arguments
//! from `r0`-`r3` and writes results back the way the real firmware does.
//! [`Firmware::Vectored`] keeps the hardware behavior of jumping to `0x08`.

pub mod arithmetic;
pub mod lz77;
pub mod memory;
pub mod rom;

use serde::{Deserialize, Serialize};

use crate::config::FirmwareMode;
use crate::cpu::arm7tdmi::{Arm7tdmi, CARTRIDGE_ENTRY, HaltState};
use crate::cpu::hardware::interrupt_control::Interrupt;

/// Cost of entering and leaving a system call.
const CALL_CYCLES: u32 = 6;

/// Cost charged for calls that are not implemented.
const STUB_CYCLES: u32 = 3;

/// Upper bound on what one call charges, kept below a scanline so a long
/// copy cannot carry the scheduler past the end of a frame.
const MAX_CALL_CYCLES: u32 = 1024;

/// Bit set in IWRAM at `0x0300_7FFA` by code that wants SoftReset to
/// restart from EWRAM.
const SOFT_RESET_FLAG: u32 = 0x0300_7FFA;
const EWRAM_ENTRY: u32 = 0x0200_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCall {
    SoftReset = 0x00,
    RegisterRamReset = 0x01,
    Halt = 0x02,
    Stop = 0x03,
    IntrWait = 0x04,
    VBlankIntrWait = 0x05,
    Div = 0x06,
    DivArm = 0x07,
    Sqrt = 0x08,
    ArcTan = 0x09,
    ArcTan2 = 0x0A,
    CpuSet = 0x0B,
    CpuFastSet = 0x0C,
    BiosChecksum = 0x0D,
    BgAffineSet = 0x0E,
    ObjAffineSet = 0x0F,
    Lz77UnCompWram = 0x11,
    Lz77UnCompVram = 0x12,
}

impl TryFrom<u8> for SystemCall {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Ok(match number {
            0x00 => Self::SoftReset,
            0x01 => Self::RegisterRamReset,
            0x02 => Self::Halt,
            0x03 => Self::Stop,
            0x04 => Self::IntrWait,
            0x05 => Self::VBlankIntrWait,
            0x06 => Self::Div,
            0x07 => Self::DivArm,
            0x08 => Self::Sqrt,
            0x09 => Self::ArcTan,
            0x0A => Self::ArcTan2,
            0x0B => Self::CpuSet,
            0x0C => Self::CpuFastSet,
            0x0D => Self::BiosChecksum,
            0x0E => Self::BgAffineSet,
            0x0F => Self::ObjAffineSet,
            0x11 => Self::Lz77UnCompWram,
            0x12 => Self::Lz77UnCompVram,
            _ => return Err(format!("unimplemented system call 0x{number:02X}")),
        })
    }
}

/// Native implementation of the firmware system calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiosHle;

/// How the CPU services `SWI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Firmware {
    Hle(BiosHle),
    Vectored,
}

impl Default for Firmware {
    fn default() -> Self {
        Self::Hle(BiosHle)
    }
}

impl From<FirmwareMode> for Firmware {
    fn from(mode: FirmwareMode) -> Self {
        match mode {
            FirmwareMode::Hle => Self::Hle(BiosHle),
            FirmwareMode::Vectored => Self::Vectored,
        }
    }
}

impl BiosHle {
    /// Runs system call `number` and returns the cycles it took.
    #[allow(clippy::unused_self)]
    pub fn handle(self, cpu: &mut Arm7tdmi, number: u8) -> u32 {
        let call = match SystemCall::try_from(number) {
            Ok(call) => call,
            Err(message) => {
                tracing::warn!("{message}");
                return STUB_CYCLES;
            }
        };
        tracing::trace!("system call {call:?}");

        let r0 = cpu.registers.register_at(0);
        let r1 = cpu.registers.register_at(1);
        let r2 = cpu.registers.register_at(2);

        let cycles = match call {
            SystemCall::SoftReset => Self::soft_reset(cpu),
            SystemCall::RegisterRamReset => memory::register_ram_reset(&mut cpu.bus, r0 as u8),
            SystemCall::Halt => {
                cpu.set_halt_state(HaltState::Halted);
                0
            }
            SystemCall::Stop => {
                cpu.set_halt_state(HaltState::Stopped);
                0
            }
            SystemCall::IntrWait => Self::intr_wait(cpu, r0 != 0, r1 as u16),
            SystemCall::VBlankIntrWait => Self::intr_wait(cpu, true, Interrupt::VBlank.mask()),
            SystemCall::Div => Self::div(cpu, r0 as i32, r1 as i32),
            SystemCall::DivArm => Self::div(cpu, r1 as i32, r0 as i32),
            SystemCall::Sqrt => {
                cpu.registers
                    .set_register_at(0, u32::from(arithmetic::sqrt(r0)));
                20
            }
            SystemCall::ArcTan => {
                let angle = arithmetic::arctan(i32::from(r0 as i16));
                cpu.registers.set_register_at(0, angle as u32);
                30
            }
            SystemCall::ArcTan2 => {
                let angle = arithmetic::arctan2(i32::from(r0 as i16), i32::from(r1 as i16));
                cpu.registers.set_register_at(0, u32::from(angle));
                40
            }
            SystemCall::CpuSet => memory::cpu_set(&mut cpu.bus, r0, r1, r2),
            SystemCall::CpuFastSet => memory::cpu_fast_set(&mut cpu.bus, r0, r1, r2),
            SystemCall::BiosChecksum => {
                cpu.registers.set_register_at(0, memory::BIOS_CHECKSUM);
                0
            }
            SystemCall::BgAffineSet | SystemCall::ObjAffineSet => {
                tracing::warn!("system call {call:?} is not implemented");
                return STUB_CYCLES;
            }
            SystemCall::Lz77UnCompWram => lz77::uncompress(&mut cpu.bus, r0, r1, lz77::Target::Wram),
            SystemCall::Lz77UnCompVram => lz77::uncompress(&mut cpu.bus, r0, r1, lz77::Target::Vram),
        };

        (CALL_CYCLES + cycles).min(MAX_CALL_CYCLES)
    }

    fn div(cpu: &mut Arm7tdmi, numerator: i32, denominator: i32) -> u32 {
        let result = arithmetic::div(numerator, denominator);
        cpu.registers.set_register_at(0, result.quotient as u32);
        cpu.registers.set_register_at(1, result.remainder as u32);
        cpu.registers.set_register_at(3, result.absolute_quotient);
        40
    }

    /// Waits for an interrupt in `mask`, using the flags the IRQ entry
    /// accumulates at `0x0300_7FF8`. Without `discard_old` a flag already
    /// set returns immediately. When an IRQ handler returns into the call it
    /// is resuming, so the flags are checked without discarding them again.
    fn intr_wait(cpu: &mut Arm7tdmi, discard_old: bool, mask: u16) -> u32 {
        let resuming = cpu.take_resume_wait();
        let interrupt_control = &mut cpu.bus.interrupt_control;
        interrupt_control.interrupt_master_enable = 1;

        if discard_old && !resuming {
            interrupt_control.bios_flags &= !mask;
        }
        if interrupt_control.bios_flags & mask != 0 {
            interrupt_control.bios_flags &= !mask;
            return 0;
        }

        interrupt_control.take_new_requests(mask);
        cpu.set_halt_state(HaltState::IntrWait { mask });
        0
    }

    /// Clears the top of IWRAM and restarts in System mode, from EWRAM if
    /// the byte at `0x0300_7FFA` is set, otherwise from the cartridge.
    fn soft_reset(cpu: &mut Arm7tdmi) -> u32 {
        let from_ewram = cpu.bus.read_byte(SOFT_RESET_FLAG) != 0;

        for address in (0x0300_7E00..0x0300_8000).step_by(4) {
            cpu.bus.write_word(address, 0);
        }

        cpu.reset(true);
        cpu.branch_to(if from_ewram { EWRAM_ENTRY } else { CARTRIDGE_ENTRY });
        0x80
    }
}
