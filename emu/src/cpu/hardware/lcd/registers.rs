//! LCD I/O Registers.
//!
//! This module contains the LCD control and status registers that configure
//! how the GBA renders graphics. These registers control background modes,
//! layer visibility, scrolling, affine transforms and the blanking status.
//!
//! # Register Map
//!
//! | Address       | Register | Description                              |
//! |---------------|----------|------------------------------------------|
//! | `0x0400_0000` | DISPCNT  | LCD control (mode, layer enables)        |
//! | `0x0400_0004` | DISPSTAT | LCD status (vblank, hblank flags)        |
//! | `0x0400_0006` | VCOUNT   | Current scanline (0-227)                 |
//! | `0x0400_0008` | BG0CNT   | BG0 control (priority, tiles, size)      |
//! | `0x0400_000A` | BG1CNT   | BG1 control                              |
//! | `0x0400_000C` | BG2CNT   | BG2 control                              |
//! | `0x0400_000E` | BG3CNT   | BG3 control                              |
//! | `0x0400_0010` | BG0HOFS  | BG0 horizontal scroll (write only)       |
//! | `0x0400_0012` | BG0VOFS  | BG0 vertical scroll (write only)         |
//! | ...           | ...      | (similar for BG1-BG3)                    |
//! | `0x0400_0020` | BG2PA-PD | BG2 affine matrix (write only)           |
//! | `0x0400_0028` | BG2X/Y   | BG2 reference point (write only)         |
//! | `0x0400_0030` | BG3PA-PD | BG3 affine matrix (write only)           |
//! | `0x0400_0038` | BG3X/Y   | BG3 reference point (write only)         |
//! | `0x0400_0040` | WIN*     | Window bounds and enables                |
//! | `0x0400_004C` | MOSAIC   | Mosaic size                              |
//! | `0x0400_0050` | BLD*     | Color special effects                    |
//!
//! Window, mosaic and blending registers are stored so software can program
//! them, but the renderer does not apply them.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

use super::ObjMappingKind;

/// DISPSTAT bits 0-2 are status flags owned by the LCD.
const DISPSTAT_WRITE_MASK: u16 = 0xFFB8;

/// View over a BGxCNT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgControl(pub u16);

impl BgControl {
    /// Priority (0-3, lower = higher priority).
    pub fn priority(self) -> u8 {
        self.0.get_bits(0..=1) as u8
    }

    /// Character base block, each block is 16KB.
    pub fn character_base(self) -> usize {
        self.0.get_bits(2..=3) as usize * 0x4000
    }

    /// `true` for 8bpp (256 colors), `false` for 4bpp (16 palettes of 16 colors).
    pub fn is_8bpp(self) -> bool {
        self.0.get_bit(7)
    }

    /// Screen base block, each block is 2KB (one 32×32 tilemap).
    pub fn screen_base(self) -> usize {
        self.0.get_bits(8..=12) as usize * 0x800
    }

    /// Affine backgrounds only: wrap around instead of clipping.
    pub fn wraparound(self) -> bool {
        self.0.get_bit(13)
    }

    /// Text background size in pixels:
    ///
    /// | Size bits | Dimensions | Screen blocks         |
    /// |-----------|------------|-----------------------|
    /// | 0         | 256×256    | 1 block               |
    /// | 1         | 512×256    | 2 blocks horizontal   |
    /// | 2         | 256×512    | 2 blocks vertical     |
    /// | 3         | 512×512    | 4 blocks (2×2 grid)   |
    pub fn text_size(self) -> (usize, usize) {
        match self.0.get_bits(14..=15) {
            0 => (256, 256),
            1 => (512, 256),
            2 => (256, 512),
            _ => (512, 512),
        }
    }

    /// Affine background side length in pixels (square maps only).
    pub fn affine_size(self) -> i32 {
        128 << self.0.get_bits(14..=15)
    }
}

/// Rotation/scaling state of one affine background (BG2 or BG3).
///
/// `x`/`y` are the values software wrote (28-bit signed 20.8 fixed point).
/// The internal reference point is reloaded from them at the start of every
/// frame and whenever they are written, and advances by (PB, PD) per line.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineParameters {
    pub pa: u16,
    pub pb: u16,
    pub pc: u16,
    pub pd: u16,
    pub x: u32,
    pub y: u32,
    internal_x: i32,
    internal_y: i32,
}

impl AffineParameters {
    /// Matrix as signed 8.8 fixed point values.
    pub const fn matrix(&self) -> (i32, i32, i32, i32) {
        (
            self.pa as i16 as i32,
            self.pb as i16 as i32,
            self.pc as i16 as i32,
            self.pd as i16 as i32,
        )
    }

    /// Reference point of the current scanline.
    pub const fn reference_point(&self) -> (i32, i32) {
        (self.internal_x, self.internal_y)
    }

    pub fn reload_reference_point(&mut self) {
        self.internal_x = self.x.sign_extended(28) as i32;
        self.internal_y = self.y.sign_extended(28) as i32;
    }

    pub fn advance_line(&mut self) {
        let (_, pb, _, pd) = self.matrix();
        self.internal_x = self.internal_x.wrapping_add(pb);
        self.internal_y = self.internal_y.wrapping_add(pd);
    }

    fn write_raw(&mut self, offset: u32, value: u8) {
        match offset {
            0x0 => self.pa.set_byte(0, value),
            0x1 => self.pa.set_byte(1, value),
            0x2 => self.pb.set_byte(0, value),
            0x3 => self.pb.set_byte(1, value),
            0x4 => self.pc.set_byte(0, value),
            0x5 => self.pc.set_byte(1, value),
            0x6 => self.pd.set_byte(0, value),
            0x7 => self.pd.set_byte(1, value),
            0x8..=0xB => {
                self.x.set_byte((offset - 0x8) as u8, value);
                self.x &= 0x0FFF_FFFF;
                self.reload_reference_point();
            }
            _ => {
                self.y.set_byte((offset - 0xC) as u8, value);
                self.y &= 0x0FFF_FFFF;
                self.reload_reference_point();
            }
        }
    }
}

/// LCD control and status registers.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Registers {
    /// LCD Control
    pub dispcnt: u16,
    /// Undocumented
    pub green_swap: u16,
    /// General LCD Status (STAT, LYC)
    pub dispstat: u16,
    /// Vertical Counter (LY)
    pub vcount: u16,
    /// BG0-BG3 Control
    pub bg_control: [u16; 4],
    /// BG0-BG3 `X-Offset`
    pub bg_hofs: [u16; 4],
    /// BG0-BG3 `Y-Offset`
    pub bg_vofs: [u16; 4],
    /// BG2 and BG3 rotation/scaling
    pub affine: [AffineParameters; 2],
    pub win0h: u16,
    pub win1h: u16,
    pub win0v: u16,
    pub win1v: u16,
    pub winin: u16,
    pub winout: u16,
    pub mosaic: u16,
    pub bldcnt: u16,
    pub bldalpha: u16,
    pub bldy: u16,
}

impl Registers {
    /// Background mode (DISPCNT bits 0-2).
    pub fn bg_mode(&self) -> u8 {
        self.dispcnt.get_bits(0..=2) as u8
    }

    /// Bitmap frame select for modes 4 and 5 (DISPCNT bit 4).
    pub fn frame_select(&self) -> bool {
        self.dispcnt.get_bit(4)
    }

    pub fn obj_character_vram_mapping(&self) -> ObjMappingKind {
        self.dispcnt.get_bit(6).into()
    }

    pub fn forced_blank(&self) -> bool {
        self.dispcnt.get_bit(7)
    }

    /// BG0-BG3 display flags (DISPCNT bits 8-11).
    pub fn bg_enabled(&self, bg: usize) -> bool {
        self.dispcnt.get_bit(8 + bg as u8)
    }

    pub fn obj_enabled(&self) -> bool {
        self.dispcnt.get_bit(12)
    }

    pub fn bg(&self, bg: usize) -> BgControl {
        BgControl(self.bg_control[bg & 3])
    }

    pub fn vblank_flag(&self) -> bool {
        self.dispstat.get_bit(0)
    }

    pub fn set_vblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(0, value);
    }

    pub fn hblank_flag(&self) -> bool {
        self.dispstat.get_bit(1)
    }

    pub fn set_hblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(1, value);
    }

    pub fn set_vcounter_flag(&mut self, value: bool) {
        self.dispstat.set_bit(2, value);
    }

    pub fn vblank_irq_enable(&self) -> bool {
        self.dispstat.get_bit(3)
    }

    pub fn hblank_irq_enable(&self) -> bool {
        self.dispstat.get_bit(4)
    }

    pub fn vcounter_irq_enable(&self) -> bool {
        self.dispstat.get_bit(5)
    }

    /// Scanline-match value (DISPSTAT bits 8-15).
    pub fn vcount_setting(&self) -> u16 {
        self.dispstat.get_bits(8..=15)
    }

    /// Reads one byte at `address` (offset in IO space, `0x000..=0x05F`).
    /// Write-only registers read as zero.
    pub fn read_raw(&self, address: u32) -> u8 {
        let byte = (address & 1) as u8;
        match address {
            0x000..=0x001 => self.dispcnt.get_byte(byte),
            0x002..=0x003 => self.green_swap.get_byte(byte),
            0x004..=0x005 => self.dispstat.get_byte(byte),
            0x006..=0x007 => self.vcount.get_byte(byte),
            0x008..=0x00F => self.bg_control[((address - 0x008) / 2) as usize].get_byte(byte),
            0x048..=0x049 => self.winin.get_byte(byte),
            0x04A..=0x04B => self.winout.get_byte(byte),
            0x050..=0x051 => self.bldcnt.get_byte(byte),
            0x052..=0x053 => self.bldalpha.get_byte(byte),
            _ => 0,
        }
    }

    pub fn write_raw(&mut self, address: u32, value: u8) {
        let byte = (address & 1) as u8;
        match address {
            0x000..=0x001 => self.dispcnt.set_byte(byte, value),
            0x002..=0x003 => self.green_swap.set_byte(byte, value),
            0x004..=0x005 => {
                let status = self.dispstat & !DISPSTAT_WRITE_MASK;
                let mut written = self.dispstat;
                written.set_byte(byte, value);
                self.dispstat = (written & DISPSTAT_WRITE_MASK) | status;
            }
            0x006..=0x007 => {}
            0x008..=0x00F => {
                self.bg_control[((address - 0x008) / 2) as usize].set_byte(byte, value);
            }
            0x010..=0x01F => {
                let bg = ((address - 0x010) / 4) as usize;
                let scroll = if address & 2 == 0 {
                    &mut self.bg_hofs[bg]
                } else {
                    &mut self.bg_vofs[bg]
                };
                scroll.set_byte(byte, value);
                *scroll &= 0x01FF;
            }
            0x020..=0x03F => {
                let offset = address - 0x020;
                self.affine[(offset / 0x10) as usize].write_raw(offset % 0x10, value);
            }
            0x040..=0x041 => self.win0h.set_byte(byte, value),
            0x042..=0x043 => self.win1h.set_byte(byte, value),
            0x044..=0x045 => self.win0v.set_byte(byte, value),
            0x046..=0x047 => self.win1v.set_byte(byte, value),
            0x048..=0x049 => self.winin.set_byte(byte, value),
            0x04A..=0x04B => self.winout.set_byte(byte, value),
            0x04C..=0x04D => self.mosaic.set_byte(byte, value),
            0x050..=0x051 => self.bldcnt.set_byte(byte, value),
            0x052..=0x053 => self.bldalpha.set_byte(byte, value),
            0x054..=0x055 => self.bldy.set_byte(byte, value),
            _ => tracing::debug!("write to unused LCD register 0x{address:03X}"),
        }
    }
}
