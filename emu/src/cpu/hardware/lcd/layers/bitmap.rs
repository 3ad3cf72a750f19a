//! Bitmap backgrounds (BG2 in modes 3, 4 and 5).
//!
//! | Mode | Size    | Format               | Frames                  |
//! |------|---------|----------------------|-------------------------|
//! | 3    | 240×160 | BGR555 direct color  | one, at `0x0600_0000`   |
//! | 4    | 240×160 | 8-bit palette index  | `0x0600_0000` / `A000`  |
//! | 5    | 160×128 | BGR555 direct color  | `0x0600_0000` / `A000`  |
//!
//! Pixels outside a mode 5 frame show the backdrop.

use crate::cpu::hardware::lcd::memory::Memory;
use crate::cpu::hardware::lcd::registers::Registers;
use crate::cpu::hardware::lcd::{Color, LCD_HEIGHT, LCD_WIDTH};

use super::{Layer, LayerLine};

/// Offset of the second frame for modes 4 and 5.
const BACK_FRAME_OFFSET: usize = 0xA000;

const MODE5_WIDTH: usize = 160;
const MODE5_HEIGHT: usize = 128;

pub struct BitmapBackground;

impl Layer for BitmapBackground {
    fn index(&self) -> usize {
        2
    }

    fn render_scanline(&self, y: usize, memory: &Memory, registers: &Registers, line: &mut LayerLine) {
        let frame = if registers.frame_select() {
            BACK_FRAME_OFFSET
        } else {
            0
        };

        match registers.bg_mode() {
            3 if y < LCD_HEIGHT => {
                for (x, pixel) in line.iter_mut().enumerate() {
                    *pixel = Some(Color(memory.vram_half_word((y * LCD_WIDTH + x) * 2)));
                }
            }
            4 if y < LCD_HEIGHT => {
                for (x, pixel) in line.iter_mut().enumerate() {
                    let palette_index = usize::from(memory.vram_byte(frame + y * LCD_WIDTH + x));
                    *pixel = (palette_index != 0).then(|| memory.bg_color(palette_index));
                }
            }
            5 if y < MODE5_HEIGHT => {
                for (x, pixel) in line.iter_mut().enumerate() {
                    *pixel = (x < MODE5_WIDTH).then(|| {
                        Color(memory.vram_half_word(frame + (y * MODE5_WIDTH + x) * 2))
                    });
                }
            }
            _ => line.fill(None),
        }
    }
}
