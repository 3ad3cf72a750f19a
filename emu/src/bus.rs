//! The GBA address space.
//!
//! Every access is decoded by the top byte of the address into one region.
//! Offsets wrap at the physical size of the region, so every region mirrors
//! across its 16MB window.
//!
//! | Top byte    | Region        | Size   | Notes                              |
//! |-------------|---------------|--------|------------------------------------|
//! | `0x00`      | BIOS          | 16 KB  | read-only                          |
//! | `0x02`      | EWRAM         | 256 KB |                                    |
//! | `0x03`      | IWRAM         | 32 KB  | `0x7FF8` is the IRQ shadow flags   |
//! | `0x04`      | I/O registers | 1 KB   | LCD, keypad and interrupt control  |
//! | `0x05`      | Palette RAM   | 1 KB   | no byte writes                     |
//! | `0x06`      | VRAM          | 96 KB  | 128 KB mirror period               |
//! | `0x07`      | OAM           | 1 KB   | no byte writes                     |
//! | `0x08-0x0D` | Game pak ROM  | 32 MB  | three wait state mirrors           |
//! | `0x0E-0x0F` | Game pak SRAM | 64 KB  | 8-bit bus                          |
//!
//! Halfword and word accesses are aligned down and composed of byte accesses
//! in little endian order.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bios::rom::{BIOS_SIZE, synthesized_image};
use crate::cpu::hardware::interrupt_control::{Interrupt, InterruptControl};
use crate::cpu::hardware::keypad::{GbaButton, Keypad};
use crate::cpu::hardware::lcd::memory::{Memory, OBJ_VRAM_BASE, OBJ_VRAM_BITMAP_BASE};
use crate::cpu::hardware::lcd::{Lcd, LcdStepOutput};

pub const EWRAM_SIZE: usize = 0x40000;
pub const IWRAM_SIZE: usize = 0x8000;
pub const IO_SIZE: usize = 0x400;
pub const SRAM_SIZE: usize = 0x10000;

/// Largest cartridge the game pak bus can address.
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// IWRAM offset of the halfword where delivered interrupts are accumulated.
const BIOS_FLAGS_OFFSET: u32 = 0x7FF8;

const HALTCNT: u32 = 0x301;

/// Low power state requested through HALTCNT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerDownRequest {
    Halt,
    Stop,
}

fn default_bios() -> Box<[u8; BIOS_SIZE]> {
    synthesized_image()
}

#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct Bus {
    /// Restored from the running session, never part of a save state.
    #[serde(skip, default = "default_bios")]
    bios: Box<[u8; BIOS_SIZE]>,

    #[serde_as(as = "Box<[_; 262144]>")]
    ewram: Box<[u8; EWRAM_SIZE]>,

    #[serde_as(as = "Box<[_; 32768]>")]
    iwram: Box<[u8; IWRAM_SIZE]>,

    /// Backing store for I/O registers without a dedicated device
    /// (sound, timers, DMA, serial). Reads return what was written.
    #[serde_as(as = "Box<[_; 1024]>")]
    io: Box<[u8; IO_SIZE]>,

    #[serde(skip)]
    rom: Vec<u8>,

    #[serde_as(as = "Box<[_; 65536]>")]
    sram: Box<[u8; SRAM_SIZE]>,

    pub lcd: Lcd,
    pub keypad: Keypad,
    pub interrupt_control: InterruptControl,

    power_down_request: Option<PowerDownRequest>,

    /// Only the first write to BIOS or ROM is a warning, the rest go to debug.
    #[serde(skip)]
    read_only_write_reported: bool,
}

impl Default for Bus {
    #[allow(clippy::large_stack_arrays)]
    fn default() -> Self {
        Self {
            bios: synthesized_image(),
            ewram: Box::new([0; EWRAM_SIZE]),
            iwram: Box::new([0; IWRAM_SIZE]),
            io: Box::new([0; IO_SIZE]),
            rom: Vec::new(),
            sram: Box::new([0xFF; SRAM_SIZE]),
            lcd: Lcd::default(),
            keypad: Keypad::new(),
            interrupt_control: InterruptControl::default(),
            power_down_request: None,
            read_only_write_reported: false,
        }
    }
}

impl Bus {
    /// Bus with `rom` mapped at `0x0800_0000`. `rom` is expected to be at
    /// most [`MAX_ROM_SIZE`] bytes; anything past that is unreachable.
    #[must_use]
    pub fn with_rom(rom: Vec<u8>) -> Self {
        Self {
            rom,
            ..Default::default()
        }
    }

    pub fn set_bios(&mut self, bios: Box<[u8; BIOS_SIZE]>) {
        self.bios = bios;
    }

    /// Power cycle: every region and register goes back to its initial
    /// value except the BIOS, the ROM and the battery backed SRAM.
    pub(crate) fn reset(&mut self) {
        let mut fresh = Self::default();
        std::mem::swap(&mut fresh.bios, &mut self.bios);
        std::mem::swap(&mut fresh.sram, &mut self.sram);
        fresh.rom = std::mem::take(&mut self.rom);

        *self = fresh;
    }

    /// Moves the ROM and BIOS images of `other` into `self`. Save states do
    /// not carry them.
    pub(crate) fn take_images_from(&mut self, other: &mut Self) {
        self.rom = std::mem::take(&mut other.rom);
        std::mem::swap(&mut self.bios, &mut other.bios);
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    #[must_use]
    pub fn sram(&self) -> &[u8] {
        self.sram.as_slice()
    }

    /// Whether the last write to HALTCNT asked for a low power state.
    pub const fn take_power_down_request(&mut self) -> Option<PowerDownRequest> {
        self.power_down_request.take()
    }

    /// Runs the LCD for `cycles` and raises the interrupts it signals.
    pub fn advance(&mut self, cycles: u32) -> LcdStepOutput {
        let output = self.lcd.advance(cycles);

        if output.request_vblank_irq {
            self.interrupt_control.request(Interrupt::VBlank);
        }
        if output.request_hblank_irq {
            self.interrupt_control.request(Interrupt::HBlank);
        }
        if output.request_vcount_irq {
            self.interrupt_control.request(Interrupt::VCount);
        }

        output
    }

    /// Cycles the hardware can be fast forwarded by while the CPU sleeps.
    #[must_use]
    pub fn cycles_to_next_event(&self) -> u32 {
        self.lcd.cycles_to_next_event()
    }

    pub fn set_key(&mut self, button: GbaButton, pressed: bool) {
        self.keypad.set_button(button, pressed);
        if self.keypad.interrupt_condition() {
            self.interrupt_control.request(Interrupt::Keypad);
        }
    }

    fn read_io(&self, offset: u32) -> u8 {
        match offset {
            0x000..=0x05F => self.lcd.read_raw(offset),
            0x130..=0x133 => self.keypad.read_raw(offset),
            0x200..=0x20B | 0x300 => self.interrupt_control.read_raw(offset),
            HALTCNT => 0,
            _ => self.io[offset as usize],
        }
    }

    fn write_io(&mut self, offset: u32, value: u8) {
        match offset {
            0x000..=0x05F => self.lcd.write_raw(offset, value),
            0x130..=0x133 => {
                self.keypad.write_raw(offset, value);
                if self.keypad.interrupt_condition() {
                    self.interrupt_control.request(Interrupt::Keypad);
                }
            }
            0x200..=0x20B | 0x300 => self.interrupt_control.write_raw(offset, value),
            HALTCNT => {
                self.power_down_request = Some(if value & 0x80 == 0 {
                    PowerDownRequest::Halt
                } else {
                    PowerDownRequest::Stop
                });
            }
            _ => self.io[offset as usize] = value,
        }
    }

    /// Open bus on the game pak returns the halfword address on the lines.
    fn read_rom(&self, address: u32) -> u8 {
        let offset = (address as usize) & (MAX_ROM_SIZE - 1);
        self.rom.get(offset).copied().unwrap_or_else(|| {
            let open_bus = (address >> 1) & 0xFFFF;
            (open_bus >> ((address & 1) * 8)) as u8
        })
    }

    fn read_raw(&self, address: u32) -> u8 {
        match address >> 24 {
            0x00 => self.bios[address as usize & (BIOS_SIZE - 1)],
            0x02 => self.ewram[address as usize & (EWRAM_SIZE - 1)],
            0x03 => {
                let offset = address & (IWRAM_SIZE as u32 - 1);
                match offset {
                    BIOS_FLAGS_OFFSET | 0x7FF9 => self.interrupt_control.read_bios_flags(offset),
                    _ => self.iwram[offset as usize],
                }
            }
            0x04 => self.read_io(address & (IO_SIZE as u32 - 1)),
            0x05 => self.lcd.memory.read_palette(address),
            0x06 => self.lcd.memory.read_vram(address),
            0x07 => self.lcd.memory.read_oam(address),
            0x08..=0x0D => self.read_rom(address),
            0x0E | 0x0F => self.sram[address as usize & (SRAM_SIZE - 1)],
            _ => {
                tracing::debug!("read from unmapped address 0x{address:08X}");
                0
            }
        }
    }

    fn write_raw(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x00 => self.report_read_only_write("BIOS", address),
            0x02 => self.ewram[address as usize & (EWRAM_SIZE - 1)] = value,
            0x03 => {
                let offset = address & (IWRAM_SIZE as u32 - 1);
                match offset {
                    BIOS_FLAGS_OFFSET | 0x7FF9 => {
                        self.interrupt_control.write_bios_flags(offset, value);
                    }
                    _ => self.iwram[offset as usize] = value,
                }
            }
            0x04 => self.write_io(address & (IO_SIZE as u32 - 1), value),
            0x05 => self.lcd.memory.write_palette(address, value),
            0x06 => self.lcd.memory.write_vram(address, value),
            0x07 => self.lcd.memory.write_oam(address, value),
            0x08..=0x0D => self.report_read_only_write("game pak ROM", address),
            0x0E | 0x0F => self.sram[address as usize & (SRAM_SIZE - 1)] = value,
            _ => tracing::debug!("write to unmapped address 0x{address:08X}"),
        }
    }

    fn report_read_only_write(&mut self, region: &str, address: u32) {
        if self.read_only_write_reported {
            tracing::debug!("write to {region} at 0x{address:08X} ignored");
        } else {
            tracing::warn!("write to {region} at 0x{address:08X} ignored, further ones are logged at debug level");
            self.read_only_write_reported = true;
        }
    }

    pub fn read_byte(&mut self, address: u32) -> u8 {
        self.read_raw(address)
    }

    /// Byte writes to video memory behave differently from wider ones:
    /// palette and background VRAM store the byte in both halves of the
    /// halfword, OBJ VRAM and OAM ignore it.
    pub fn write_byte(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x05 => {
                self.write_raw(address & !1, value);
                self.write_raw(address | 1, value);
            }
            0x06 => {
                let obj_base = if self.lcd.registers.bg_mode() >= 3 {
                    OBJ_VRAM_BITMAP_BASE
                } else {
                    OBJ_VRAM_BASE
                };
                if Memory::vram_index(address) < obj_base {
                    self.write_raw(address & !1, value);
                    self.write_raw(address | 1, value);
                }
            }
            0x07 => {}
            _ => self.write_raw(address, value),
        }
    }

    pub fn read_half_word(&mut self, address: u32) -> u16 {
        let address = address & !1;
        u16::from_le_bytes([
            self.read_raw(address),
            self.read_raw(address.wrapping_add(1)),
        ])
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let address = address & !1;
        let [low, high] = value.to_le_bytes();
        self.write_raw(address, low);
        self.write_raw(address.wrapping_add(1), high);
    }

    pub fn read_word(&mut self, address: u32) -> u32 {
        let address = address & !0b11;
        u32::from_le_bytes([
            self.read_raw(address),
            self.read_raw(address.wrapping_add(1)),
            self.read_raw(address.wrapping_add(2)),
            self.read_raw(address.wrapping_add(3)),
        ])
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & !0b11;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_raw(address.wrapping_add(i as u32), byte);
        }
    }
}
