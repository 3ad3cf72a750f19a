//! Background and sprite layer rendering.
//!
//! The GBA PPU composites multiple layers to produce the final image. Each
//! background produces one scanline of optional colors (`None` is a
//! transparent pixel) through the [`Layer`] trait; sprites produce colors
//! tagged with their own priority (see [`obj`]).
//!
//! # Background Rendering Modes
//!
//! ## 1. Text Mode (Tiled Backgrounds)
//!
//! The background is built from 8×8 pixel **tiles** arranged in a **tilemap**.
//!
//! - **Scrolling**: X/Y pixel offset, wrapping at the map size
//! - **Tilemap entries**: 16-bit, containing tile index + H/V flip + palette bank
//! - **Color depth**: 4bpp (16 colors, 16 palette banks) or 8bpp (256 colors)
//! - **Map sizes**: 256×256, 512×256, 256×512, or 512×512 pixels
//!
//! ## 2. Affine Mode (Rotated/Scaled Tiled Backgrounds)
//!
//! ```text
//! texture_x = PA × x + REF_X(line)
//! texture_y = PC × x + REF_Y(line)
//! REF(line + 1) = REF(line) + (PB, PD)
//! ```
//!
//! - **Tilemap entries**: 8-bit (tile index only)
//! - **Color depth**: always 8bpp
//! - **Map sizes**: 128×128 to 1024×1024, wrapping or clipping at the edges
//!
//! ## 3. Bitmap Mode (Direct Pixel Data)
//!
//! - **Mode 3**: 240×160, 15-bit direct color, single buffer
//! - **Mode 4**: 240×160, 8-bit palette indexed, double buffered
//! - **Mode 5**: 160×128, 15-bit direct color, double buffered
//!
//! # Video Modes Summary
//!
//! | Mode | BG0     | BG1     | BG2     | BG3     |
//! |------|---------|---------|---------|---------|
//! | 0    | Text    | Text    | Text    | Text    |
//! | 1    | Text    | Text    | Affine  | -       |
//! | 2    | -       | -       | Affine  | Affine  |
//! | 3-5  | -       | -       | Bitmap  | -       |
//!
//! Palette index 0 is always transparent for both backgrounds and sprites.

use super::memory::Memory;
use super::registers::Registers;
use super::{Color, LCD_WIDTH};

pub mod affine;
pub mod bitmap;
pub mod obj;
pub mod text;

use affine::AffineBackground;
use bitmap::BitmapBackground;
use text::TextBackground;

/// One background's pixels on a scanline.
pub type LayerLine = [Option<Color>; LCD_WIDTH];

/// A background that can be drawn one scanline at a time.
pub trait Layer {
    /// Background index (0-3).
    fn index(&self) -> usize;

    /// Renders scanline `y` into `line`; transparent pixels are left `None`.
    fn render_scanline(&self, y: usize, memory: &Memory, registers: &Registers, line: &mut LayerLine);
}

static TEXT_LAYERS: [TextBackground; 4] = [
    TextBackground { index: 0 },
    TextBackground { index: 1 },
    TextBackground { index: 2 },
    TextBackground { index: 3 },
];

static AFFINE_LAYERS: [AffineBackground; 2] =
    [AffineBackground { index: 2 }, AffineBackground { index: 3 }];

static BITMAP_LAYER: BitmapBackground = BitmapBackground;

/// The background drawn for `bg` in video `mode`, if that mode has one.
pub fn background_layer(mode: u8, bg: usize) -> Option<&'static dyn Layer> {
    match (mode, bg) {
        (0, 0..=3) | (1, 0..=1) => Some(&TEXT_LAYERS[bg]),
        (1, 2) | (2, 2..=3) => Some(&AFFINE_LAYERS[bg - 2]),
        (3..=5, 2) => Some(&BITMAP_LAYER),
        _ => None,
    }
}

/// Palette index of pixel (`x`, `y`) of the tile starting at VRAM offset `tile_base`.
///
/// 4bpp tiles are 32 bytes with the even pixel in the low nibble; 8bpp tiles
/// are 64 bytes, one byte per pixel.
pub fn tile_pixel(memory: &Memory, tile_base: usize, is_8bpp: bool, x: usize, y: usize) -> u8 {
    if is_8bpp {
        memory.vram_byte(tile_base + y * 8 + x)
    } else {
        let byte = memory.vram_byte(tile_base + y * 4 + x / 2);
        if x % 2 == 0 { byte & 0x0F } else { byte >> 4 }
    }
}
