use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// GBA button bit positions in KEYINPUT register (when pressed are set to 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

impl std::str::FromStr for GbaButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "a" => Self::A,
            "b" => Self::B,
            "select" => Self::Select,
            "start" => Self::Start,
            "right" => Self::Right,
            "left" => Self::Left,
            "up" => Self::Up,
            "down" => Self::Down,
            "r" => Self::R,
            "l" => Self::L,
            _ => return Err(format!("unknown button `{s}`")),
        })
    }
}

/// All 10 buttons released (bits 0-9 = 1).
const ALL_RELEASED: u16 = 0x03FF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    /// Create a new Keypad with all buttons released (all bits set to 1).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key_input: ALL_RELEASED,
            key_interrupt_control: 0,
        }
    }

    /// Set button state: pressed = true, released = false.
    /// GBA uses active-low logic: bit 0 = pressed, bit 1 = released.
    pub const fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }

    /// Whether KEYCNT asks for an interrupt with the current key state.
    /// Bit 14 enables it, bit 15 selects AND (all selected keys) over OR.
    #[must_use]
    pub fn interrupt_condition(&self) -> bool {
        if !self.key_interrupt_control.get_bit(14) {
            return false;
        }

        let selected = self.key_interrupt_control & ALL_RELEASED;
        let pressed = !self.key_input & ALL_RELEASED;
        if self.key_interrupt_control.get_bit(15) {
            selected != 0 && pressed & selected == selected
        } else {
            pressed & selected != 0
        }
    }

    pub fn read_raw(&self, address: u32) -> u8 {
        match address {
            0x130 => self.key_input.get_byte(0),
            0x131 => self.key_input.get_byte(1),
            0x132 => self.key_interrupt_control.get_byte(0),
            0x133 => self.key_interrupt_control.get_byte(1),
            _ => 0,
        }
    }

    /// KEYINPUT is read-only.
    pub fn write_raw(&mut self, address: u32, value: u8) {
        match address {
            0x132 => self.key_interrupt_control.set_byte(0, value),
            0x133 => self.key_interrupt_control.set_byte(1, value & 0xC3),
            _ => {}
        }
    }
}
