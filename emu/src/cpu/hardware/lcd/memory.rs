//! LCD Memory - VRAM, Palette RAM, and OAM.
//!
//! # Memory Map
//!
//! | Region          | Address Range           | Size    | Purpose                          |
//! |-----------------|-------------------------|---------|----------------------------------|
//! | BG Palette RAM  | 0x0500_0000-0x0500_01FF | 512 B   | Background color palettes        |
//! | OBJ Palette RAM | 0x0500_0200-0x0500_03FF | 512 B   | Sprite color palettes            |
//! | VRAM            | 0x0600_0000-0x0601_7FFF | 96 KB   | Tile data, tilemaps and bitmaps  |
//! | OAM             | 0x0700_0000-0x0700_03FF | 1 KB    | Sprite attributes                |
//!
//! Palette RAM holds 256 BGR555 colors per half. In 4bpp mode it is split in
//! 16 banks of 16 colors; in 8bpp mode it is one 256 color palette. Color
//! index 0 is transparent for both backgrounds and sprites.
//!
//! VRAM is mirrored every 128KB; inside a 128KB window the last 32KB alias
//! the OBJ tile area at `0x0601_0000`.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::Color;

pub const VRAM_SIZE: usize = 0x18000;

/// Start of sprite tile data in VRAM (tile modes).
pub const OBJ_VRAM_BASE: usize = 0x10000;

/// Start of sprite tile data in VRAM (bitmap modes, tiles below 512 are bitmap data).
pub const OBJ_VRAM_BITMAP_BASE: usize = 0x14000;

/// LCD memory regions, stored as boxed arrays (about 98KB in total).
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Background palette RAM (`0x0500_0000` - `0x0500_01FF`).
    #[serde_as(as = "Box<[_; 512]>")]
    pub bg_palette_ram: Box<[u8; 0x200]>,

    /// Object (sprite) palette RAM (`0x0500_0200` - `0x0500_03FF`).
    #[serde_as(as = "Box<[_; 512]>")]
    pub obj_palette_ram: Box<[u8; 0x200]>,

    /// Video RAM (`0x0600_0000` - `0x0601_7FFF`).
    #[serde_as(as = "Box<[_; 98304]>")]
    pub video_ram: Box<[u8; VRAM_SIZE]>,

    /// Object Attribute Memory (`0x0700_0000` - `0x0700_03FF`).
    ///
    /// 128 sprites of 8 bytes, with the 32 rotation/scaling groups
    /// interleaved in the fourth halfword of each entry.
    #[serde_as(as = "Box<[_; 1024]>")]
    pub obj_attributes: Box<[u8; 0x400]>,
}

impl Default for Memory {
    #[allow(clippy::large_stack_arrays)]
    fn default() -> Self {
        Self {
            bg_palette_ram: Box::new([0; 0x200]),
            obj_palette_ram: Box::new([0; 0x200]),
            video_ram: Box::new([0; VRAM_SIZE]),
            obj_attributes: Box::new([0; 0x400]),
        }
    }
}

impl Memory {
    /// Maps a bus offset to an index into `video_ram`.
    pub const fn vram_index(address: u32) -> usize {
        let offset = (address & 0x1_FFFF) as usize;
        if offset >= VRAM_SIZE {
            offset - 0x8000
        } else {
            offset
        }
    }

    pub fn bg_color(&self, index: usize) -> Color {
        let offset = (index & 0xFF) * 2;
        Color(u16::from_le_bytes([
            self.bg_palette_ram[offset],
            self.bg_palette_ram[offset + 1],
        ]))
    }

    pub fn obj_color(&self, index: usize) -> Color {
        let offset = (index & 0xFF) * 2;
        Color(u16::from_le_bytes([
            self.obj_palette_ram[offset],
            self.obj_palette_ram[offset + 1],
        ]))
    }

    /// Palette entry 0, shown wherever no layer claims a pixel.
    pub fn backdrop(&self) -> Color {
        self.bg_color(0)
    }

    /// VRAM byte at `offset`; reads outside the 96KB return 0.
    pub fn vram_byte(&self, offset: usize) -> u8 {
        self.video_ram.get(offset).copied().unwrap_or(0)
    }

    pub fn vram_half_word(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.vram_byte(offset), self.vram_byte(offset + 1)])
    }

    pub fn read_palette(&self, address: u32) -> u8 {
        let offset = (address & 0x3FF) as usize;
        if offset < 0x200 {
            self.bg_palette_ram[offset]
        } else {
            self.obj_palette_ram[offset - 0x200]
        }
    }

    pub fn write_palette(&mut self, address: u32, value: u8) {
        let offset = (address & 0x3FF) as usize;
        if offset < 0x200 {
            self.bg_palette_ram[offset] = value;
        } else {
            self.obj_palette_ram[offset - 0x200] = value;
        }
    }

    pub fn read_vram(&self, address: u32) -> u8 {
        self.video_ram[Self::vram_index(address)]
    }

    pub fn write_vram(&mut self, address: u32, value: u8) {
        self.video_ram[Self::vram_index(address)] = value;
    }

    pub fn read_oam(&self, address: u32) -> u8 {
        self.obj_attributes[(address & 0x3FF) as usize]
    }

    pub fn write_oam(&mut self, address: u32, value: u8) {
        self.obj_attributes[(address & 0x3FF) as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn vram_upper_window_aliases_obj_tiles() {
        assert_eq!(Memory::vram_index(0x0600_0000), 0);
        assert_eq!(Memory::vram_index(0x0601_7FFF), 0x17FFF);
        assert_eq!(Memory::vram_index(0x0601_8000), 0x10000);
        assert_eq!(Memory::vram_index(0x0601_FFFF), 0x17FFF);
        assert_eq!(Memory::vram_index(0x0602_0004), 4);
    }

    #[test]
    fn palette_halves() {
        let mut memory = Memory::default();
        memory.write_palette(0x0500_0002, 0x1F);
        memory.write_palette(0x0500_0202, 0xE0);
        memory.write_palette(0x0500_0203, 0x03);

        assert_eq!(memory.bg_color(1), Color(0x001F));
        assert_eq!(memory.obj_color(1), Color(0x03E0));
        assert_eq!(memory.read_palette(0x0500_0602), 0xE0);
    }

    #[test]
    fn out_of_range_vram_reads_are_zero() {
        let memory = Memory::default();
        assert_eq!(memory.vram_byte(VRAM_SIZE + 10), 0);
    }
}
