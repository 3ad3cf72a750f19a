use crate::bitwise::Bits;
use crate::cpu::hardware::lcd::memory::Memory;
use crate::cpu::hardware::lcd::registers::{BgControl, Registers};

use super::{Layer, LayerLine, tile_pixel};

/// A regular tiled background (BG0-BG3 in mode 0, BG0-BG1 in mode 1).
pub struct TextBackground {
    pub index: usize,
}

impl Layer for TextBackground {
    fn index(&self) -> usize {
        self.index
    }

    fn render_scanline(&self, y: usize, memory: &Memory, registers: &Registers, line: &mut LayerLine) {
        let control = registers.bg(self.index);
        let (map_width, map_height) = control.text_size();
        let hofs = usize::from(registers.bg_hofs[self.index]);
        let vofs = usize::from(registers.bg_vofs[self.index]);

        let map_y = (y + vofs) % map_height;
        for (x, pixel) in line.iter_mut().enumerate() {
            let map_x = (x + hofs) % map_width;
            let palette_index = Self::palette_index(memory, control, map_x, map_y);
            *pixel = (palette_index != 0).then(|| memory.bg_color(palette_index));
        }
    }
}

impl TextBackground {
    /// Offset of the 2KB screen block holding tile (`tile_x`, `tile_y`).
    ///
    /// Maps larger than 256 pixels are laid out as 32×32 blocks:
    /// ```text
    /// 256×256: [0]        512×256: [0][1]
    /// 256×512: [0]        512×512: [0][1]
    ///          [1]                 [2][3]
    /// ```
    fn screen_block_offset(size: (usize, usize), tile_x: usize, tile_y: usize) -> usize {
        let block_x = tile_x / 32;
        let block_y = tile_y / 32;
        let block = match (size.0 > 256, size.1 > 256) {
            (true, true) => block_y * 2 + block_x,
            (true, false) => block_x,
            (false, true) => block_y,
            (false, false) => 0,
        };
        block * 0x800
    }

    /// Full (bank included) palette index at map coordinate (`x`, `y`).
    fn palette_index(memory: &Memory, control: BgControl, x: usize, y: usize) -> usize {
        let tile_x = x / 8;
        let tile_y = y / 8;

        let entry_offset = control.screen_base()
            + Self::screen_block_offset(control.text_size(), tile_x, tile_y)
            + ((tile_y % 32) * 32 + tile_x % 32) * 2;
        let entry = memory.vram_half_word(entry_offset);

        let tile_number = entry.get_bits(0..=9) as usize;
        let pixel_x = if entry.get_bit(10) { 7 - x % 8 } else { x % 8 };
        let pixel_y = if entry.get_bit(11) { 7 - y % 8 } else { y % 8 };
        let palette_bank = entry.get_bits(12..=15) as usize;

        if control.is_8bpp() {
            let tile_base = control.character_base() + tile_number * 64;
            usize::from(tile_pixel(memory, tile_base, true, pixel_x, pixel_y))
        } else {
            let tile_base = control.character_base() + tile_number * 32;
            match tile_pixel(memory, tile_base, false, pixel_x, pixel_y) {
                0 => 0,
                color => palette_bank * 16 + usize::from(color),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::lcd::{Color, LCD_WIDTH};
    use pretty_assertions::assert_eq;

    fn write_half_word(memory: &mut Memory, offset: usize, value: u16) {
        let [low, high] = value.to_le_bytes();
        memory.video_ram[offset] = low;
        memory.video_ram[offset + 1] = high;
    }

    #[test]
    fn screen_block_layouts() {
        assert_eq!(TextBackground::screen_block_offset((256, 256), 40, 40), 0);
        assert_eq!(TextBackground::screen_block_offset((512, 256), 40, 3), 0x800);
        assert_eq!(TextBackground::screen_block_offset((256, 512), 3, 40), 0x800);
        assert_eq!(TextBackground::screen_block_offset((512, 512), 40, 40), 0x1800);
        assert_eq!(TextBackground::screen_block_offset((512, 512), 3, 40), 0x1000);
    }

    #[test]
    fn scrolled_flipped_4bpp_tile() {
        let mut memory = Memory::default();
        let mut registers = Registers::default();
        // char base block 1, screen base block 8
        registers.bg_control[1] = 0x0804;
        registers.bg_hofs[1] = 8;

        // map entry (1, 0): tile 2, h-flip, palette bank 3
        write_half_word(&mut memory, 8 * 0x800 + 2, 0x3402);
        // tile 2, row 0, pixel 7 -> index 5
        memory.video_ram[0x4000 + 2 * 32 + 3] = 0x50;
        memory.bg_palette_ram[(3 * 16 + 5) * 2] = 0x1F;

        let mut line = [None; LCD_WIDTH];
        TextBackground { index: 1 }.render_scanline(0, &memory, &registers, &mut line);

        // flipped: screen x 0 reads tile pixel 7
        assert_eq!(line[0], Some(Color(0x001F)));
        assert_eq!(line[1], None);
    }

    #[test]
    fn wraps_at_map_size() {
        let mut memory = Memory::default();
        let mut registers = Registers::default();
        registers.bg_control[0] = 0x0100 | 0x80;
        registers.bg_vofs[0] = 250;

        // row 4 of map, tile column 0 uses tile 1 (8bpp)
        write_half_word(&mut memory, 0x800, 0x0001);
        memory.video_ram[64 + 4 * 8] = 9;
        memory.bg_palette_ram[18] = 0x34;

        let mut line = [None; LCD_WIDTH];
        TextBackground { index: 0 }.render_scanline(10, &memory, &registers, &mut line);

        assert_eq!(line[0], Some(Color(0x0034)));
        assert_eq!(line[8], None);
    }
}
