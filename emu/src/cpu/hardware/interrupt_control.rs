//! Interrupt controller: IE, IF and IME plus the firmware's shadow copy
//! of delivered interrupts.
//!
//! Requests are level-triggered bits in IF; nothing is queued. A request
//! only latches when its IE bit is set and IME is on.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Interrupt sources, by their bit position in IE/IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }
}

impl TryFrom<u16> for Interrupt {
    type Error = String;

    fn try_from(bit: u16) -> Result<Self, Self::Error> {
        Ok(match bit {
            0 => Self::VBlank,
            1 => Self::HBlank,
            2 => Self::VCount,
            3 => Self::Timer0,
            4 => Self::Timer1,
            5 => Self::Timer2,
            6 => Self::Timer3,
            7 => Self::Serial,
            8 => Self::Dma0,
            9 => Self::Dma1,
            10 => Self::Dma2,
            11 => Self::Dma3,
            12 => Self::Keypad,
            13 => Self::GamePak,
            _ => return Err(format!("no interrupt source at bit {bit}")),
        })
    }
}

/// Only the low 14 bits of IE/IF name a source.
const INTERRUPT_BITS: u16 = 0x3FFF;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct InterruptControl {
    pub interrupt_enable: u16,
    /// Interrupt Request Flags (IF), bits are set when interrupts are requested,
    /// cleared by writing 1 to the corresponding bit
    pub interrupt_request: u16,
    pub wait_state_control: u16,
    pub interrupt_master_enable: u16,
    pub post_boot_flag: u8,

    /// Shadow of delivered interrupts kept by the firmware at IWRAM 0x7FF8,
    /// consumed by IntrWait.
    pub bios_flags: u16,

    /// Requests latched since IntrWait last cleared them. With IRQs masked
    /// in the CPSR this is how a wait tells a new request from a stale IF bit.
    #[serde(default)]
    pub new_requests: u16,
}

impl InterruptControl {
    #[must_use]
    pub fn master_enabled(&self) -> bool {
        self.interrupt_master_enable.get_bit(0)
    }

    /// Latches `interrupt` in IF when it is enabled and IME is on.
    pub fn request(&mut self, interrupt: Interrupt) {
        if self.master_enabled() && self.interrupt_enable & interrupt.mask() != 0 {
            self.interrupt_request |= interrupt.mask();
            self.new_requests |= interrupt.mask();
        }
    }

    /// Returns and clears the new requests in `mask`.
    pub const fn take_new_requests(&mut self, mask: u16) -> u16 {
        let taken = self.new_requests & mask;
        self.new_requests &= !mask;
        taken
    }

    /// IE & IF, regardless of IME.
    #[must_use]
    pub const fn enabled_requests(&self) -> u16 {
        self.interrupt_enable & self.interrupt_request & INTERRUPT_BITS
    }

    /// Highest priority (lowest bit) enabled request, if IME is on.
    #[must_use]
    pub fn pending_interrupt(&self) -> Option<Interrupt> {
        if !self.master_enabled() {
            return None;
        }

        let requests = self.enabled_requests();
        if requests == 0 {
            return None;
        }

        Interrupt::try_from(requests.trailing_zeros() as u16).ok()
    }

    /// Writing 1 to an IF bit clears it.
    pub const fn acknowledge(&mut self, mask: u16) {
        self.interrupt_request &= !mask;
    }

    pub fn read_raw(&self, address: u32) -> u8 {
        match address {
            0x200 => self.interrupt_enable.get_byte(0),
            0x201 => self.interrupt_enable.get_byte(1),
            0x202 => self.interrupt_request.get_byte(0),
            0x203 => self.interrupt_request.get_byte(1),
            0x204 => self.wait_state_control.get_byte(0),
            0x205 => self.wait_state_control.get_byte(1),
            0x208 => self.interrupt_master_enable.get_byte(0),
            0x209 => self.interrupt_master_enable.get_byte(1),
            0x300 => self.post_boot_flag,
            _ => 0,
        }
    }

    pub fn write_raw(&mut self, address: u32, value: u8) {
        match address {
            0x200 => self.interrupt_enable.set_byte(0, value),
            0x201 => self.interrupt_enable.set_byte(1, value & 0x3F),
            0x202 => self.acknowledge(u16::from(value)),
            0x203 => self.acknowledge(u16::from(value) << 8),
            0x204 => self.wait_state_control.set_byte(0, value),
            0x205 => self.wait_state_control.set_byte(1, value),
            0x208 => self.interrupt_master_enable = u16::from(value & 1),
            0x209 => {}
            0x300 => self.post_boot_flag = value & 1,
            _ => tracing::debug!("write to unused interrupt register 0x{address:03X}"),
        }
    }

    pub fn read_bios_flags(&self, offset: u32) -> u8 {
        self.bios_flags.get_byte((offset & 1) as u8)
    }

    pub fn write_bios_flags(&mut self, offset: u32, value: u8) {
        self.bios_flags.set_byte((offset & 1) as u8, value);
    }
}
