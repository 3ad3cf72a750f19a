//! Rotation/scaling backgrounds (BG2 in modes 1-2, BG3 in mode 2).

use crate::cpu::hardware::lcd::memory::Memory;
use crate::cpu::hardware::lcd::registers::Registers;

use super::{Layer, LayerLine, tile_pixel};

pub struct AffineBackground {
    pub index: usize,
}

impl Layer for AffineBackground {
    fn index(&self) -> usize {
        self.index
    }

    fn render_scanline(&self, _y: usize, memory: &Memory, registers: &Registers, line: &mut LayerLine) {
        let control = registers.bg(self.index);
        let parameters = &registers.affine[self.index - 2];
        let (pa, _, pc, _) = parameters.matrix();
        let (mut texture_x, mut texture_y) = parameters.reference_point();

        let map_size = control.affine_size();
        let tiles_per_row = (map_size / 8) as usize;

        for pixel in line.iter_mut() {
            let (x, y) = (texture_x >> 8, texture_y >> 8);
            texture_x = texture_x.wrapping_add(pa);
            texture_y = texture_y.wrapping_add(pc);

            let (x, y) = if control.wraparound() {
                (x.rem_euclid(map_size), y.rem_euclid(map_size))
            } else if (0..map_size).contains(&x) && (0..map_size).contains(&y) {
                (x, y)
            } else {
                *pixel = None;
                continue;
            };

            #[allow(clippy::cast_sign_loss)]
            let (x, y) = (x as usize, y as usize);
            let tile_number =
                usize::from(memory.vram_byte(control.screen_base() + (y / 8) * tiles_per_row + x / 8));
            let tile_base = control.character_base() + tile_number * 64;

            let palette_index = usize::from(tile_pixel(memory, tile_base, true, x % 8, y % 8));
            *pixel = (palette_index != 0).then(|| memory.bg_color(palette_index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::lcd::{Color, LCD_WIDTH};
    use pretty_assertions::assert_eq;

    fn registers_with_bg2(control: u16, pa: u16, x: u32) -> Registers {
        let mut registers = Registers::default();
        registers.bg_control[2] = control;
        for (offset, byte) in pa.to_le_bytes().into_iter().enumerate() {
            registers.write_raw(0x020 + offset as u32, byte);
        }
        for (offset, byte) in x.to_le_bytes().into_iter().enumerate() {
            registers.write_raw(0x028 + offset as u32, byte);
        }
        registers
    }

    fn memory_with_tile_one() -> Memory {
        let mut memory = Memory::default();
        // screen block 2, map entry 1 -> tile 1, every pixel index 4
        memory.video_ram[0x1000 + 1] = 1;
        memory.video_ram[64..128].fill(4);
        memory.bg_palette_ram[8] = 0x1F;
        memory
    }

    #[test]
    fn identity_transform_clips_outside_map() {
        let memory = memory_with_tile_one();
        // 128x128 map at screen block 2, clipping
        let registers = registers_with_bg2(0x0200, 0x0100, 0);

        let mut line = [None; LCD_WIDTH];
        AffineBackground { index: 2 }.render_scanline(0, &memory, &registers, &mut line);

        assert_eq!(line[7], None);
        assert_eq!(line[8], Some(Color(0x001F)));
        assert_eq!(line[15], Some(Color(0x001F)));
        assert_eq!(line[16], None);
        assert_eq!(line[200], None);
    }

    #[test]
    fn wraparound_and_scaling() {
        let memory = memory_with_tile_one();
        // wraparound, PA = 2.0, reference x = -128.0
        let registers = registers_with_bg2(0x2200, 0x0200, 0x0FFF_8000);

        let mut line = [None; LCD_WIDTH];
        AffineBackground { index: 2 }.render_scanline(0, &memory, &registers, &mut line);

        // texture x = -128 + 2 * screen x wraps to 0..128
        assert_eq!(line[67], None);
        assert_eq!(line[68], Some(Color(0x001F)));
        assert_eq!(line[71], Some(Color(0x001F)));
        assert_eq!(line[72], None);
    }
}
