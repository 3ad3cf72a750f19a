//! LCD controller (PPU) - handles display rendering.
//!
//! The GBA LCD is 240x160 pixels, 15-bit color (32,768 colors). The [`Lcd`] struct
//! implements the Picture Processing Unit that renders backgrounds and sprites to
//! a [`Framebuffer`], one scanline at a time.
//!
//! # Display Timing
//!
//! ```text
//!                    960 cycles          272 cycles
//!                   ◄──────────►       ◄──────────►
//!               ┌─────────────────────────────────────┐
//!               │                      │              │
//!    160 lines  │      Visible         │   HBlank    │ VDraw
//!               │      (VDraw)         │             │
//!               ├──────────────────────┼─────────────┤
//!     68 lines  │                VBlank              │ VBlank
//!               └─────────────────────────────────────┘
//!
//! - VDraw: Lines 0-159
//! - HBlank: starts 960 cycles into each line, the visible line is drawn then
//! - VBlank: Lines 160-227
//! - Total: 228 lines × 1232 cycles = 280,896 cycles/frame ≈ 59.73 Hz
//! ```
//!
//! # Layer Priority
//!
//! Each background and sprite has a priority (0-3, lower = in front). For
//! every priority from front to back, sprites are offered first and then
//! backgrounds in index order; the first opaque pixel claims the screen
//! position. Unclaimed pixels show the backdrop (BG palette entry 0).
//!
//! # Interrupts
//!
//! The LCD can generate three types of interrupts (via [`LcdStepOutput`]):
//! - **V-Blank**: When entering vertical blank period (line 160)
//! - **H-Blank**: When entering horizontal blank period of any line
//! - **V-Count**: When the current line matches the V-Count setting in DISPSTAT
use serde::Deserialize;
use serde::Serialize;
use serde_with::serde_as;

use crate::bitwise::Bits;

use self::layers::obj;
use self::memory::Memory;
use self::registers::Registers;

mod layers;
pub mod memory;
mod object_attributes;
pub mod registers;

/// GBA display width
pub const LCD_WIDTH: usize = 240;

/// GBA display height
pub const LCD_HEIGHT: usize = 160;

/// Cycles from the start of a line to HBlank.
pub const HDRAW_CYCLES: u32 = 960;

pub const CYCLES_PER_LINE: u32 = 1232;

/// Visible lines plus VBlank lines.
pub const TOTAL_LINES: u16 = 228;

pub const CYCLES_PER_FRAME: u32 = CYCLES_PER_LINE * TOTAL_LINES as u32;

const VBLANK_START: u16 = LCD_HEIGHT as u16;

/// A BGR555 color as stored in palette RAM and bitmap VRAM.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u16);

impl Color {
    pub const WHITE: Self = Self(0x7FFF);

    #[must_use]
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        let red = u16::from(red & 0x1F);
        let green = u16::from(green & 0x1F);
        let blue = u16::from(blue & 0x1F);

        Self((blue << 10) | (green << 5) | red)
    }

    #[must_use]
    pub fn red(self) -> u8 {
        self.0.get_bits(0..=4) as u8
    }

    #[must_use]
    pub fn green(self) -> u8 {
        self.0.get_bits(5..=9) as u8
    }

    #[must_use]
    pub fn blue(self) -> u8 {
        self.0.get_bits(10..=14) as u8
    }

    /// Packed RGBA8888 (red in the top byte), each channel shifted left by 3.
    #[must_use]
    pub fn to_rgba(self) -> u32 {
        (u32::from(self.red()) << 27)
            | (u32::from(self.green()) << 19)
            | (u32::from(self.blue()) << 11)
            | 0xFF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjMappingKind {
    TwoDimensional,
    OneDimensional,
}

impl From<bool> for ObjMappingKind {
    fn from(value: bool) -> Self {
        if value {
            Self::OneDimensional
        } else {
            Self::TwoDimensional
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct PixelInfo {
    pub(crate) color: Color,
    pub(crate) priority: u8,
}

/// The 240×160 image, packed RGBA8888 pixels in row-major order.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framebuffer {
    #[serde_as(as = "Box<[_; 38400]>")]
    pixels: Box<[u32; LCD_WIDTH * LCD_HEIGHT]>,
}

impl Default for Framebuffer {
    #[allow(clippy::large_stack_arrays)]
    fn default() -> Self {
        Self {
            pixels: Box::new([0; LCD_WIDTH * LCD_HEIGHT]),
        }
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &LCD_WIDTH)
            .field("height", &LCD_HEIGHT)
            .finish_non_exhaustive()
    }
}

impl Framebuffer {
    pub const WIDTH: usize = LCD_WIDTH;
    pub const HEIGHT: usize = LCD_HEIGHT;

    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        self.pixels.as_slice()
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * LCD_WIDTH + x]
    }

    #[must_use]
    pub fn row(&self, y: usize) -> &[u32] {
        &self.pixels[y * LCD_WIDTH..(y + 1) * LCD_WIDTH]
    }

    /// RGB888 bytes without alpha, row-major, as used by PPM images.
    #[must_use]
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| {
                let [red, green, blue, _] = pixel.to_be_bytes();
                [red, green, blue]
            })
            .collect()
    }

    fn set_row(&mut self, y: usize, row: &[u32; LCD_WIDTH]) {
        self.pixels[y * LCD_WIDTH..(y + 1) * LCD_WIDTH].copy_from_slice(row);
    }
}

#[derive(Default, Clone, Serialize, Deserialize)]
pub struct Lcd {
    pub(crate) registers: Registers,
    pub(crate) memory: Memory,

    framebuffer: Framebuffer,

    /// Cycles elapsed in the current line.
    line_cycles: u32,
    frame_ready: bool,

    #[serde(skip)]
    reported_mode: Option<u8>,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdStepOutput {
    pub request_vblank_irq: bool,
    pub request_hblank_irq: bool,
    pub request_vcount_irq: bool,
}

impl Lcd {
    #[must_use]
    pub const fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    #[must_use]
    pub const fn vcount(&self) -> u16 {
        self.registers.vcount
    }

    /// Returns whether a frame completed (VBlank was entered) since the last call.
    pub const fn take_frame_ready(&mut self) -> bool {
        let ready = self.frame_ready;
        self.frame_ready = false;
        ready
    }

    pub fn read_raw(&self, address: u32) -> u8 {
        self.registers.read_raw(address)
    }

    pub fn write_raw(&mut self, address: u32, value: u8) {
        self.registers.write_raw(address, value);
    }

    /// Cycles until the next HBlank or line change.
    #[must_use]
    pub fn cycles_to_next_event(&self) -> u32 {
        let target = if self.registers.hblank_flag() {
            CYCLES_PER_LINE
        } else {
            HDRAW_CYCLES
        };
        target.saturating_sub(self.line_cycles).max(1)
    }

    /// Runs the LCD for `cycles` CPU cycles, drawing every visible line whose
    /// HDraw period completes and collecting the interrupts raised on the way.
    pub fn advance(&mut self, cycles: u32) -> LcdStepOutput {
        let mut output = LcdStepOutput::default();
        let mut remaining = cycles;

        while remaining > 0 {
            let step = remaining.min(self.cycles_to_next_event());
            self.line_cycles += step;
            remaining -= step;

            if !self.registers.hblank_flag() && self.line_cycles >= HDRAW_CYCLES {
                self.enter_hblank(&mut output);
            }

            if self.line_cycles >= CYCLES_PER_LINE {
                self.line_cycles -= CYCLES_PER_LINE;
                self.next_line(&mut output);
            }
        }

        output
    }

    fn enter_hblank(&mut self, output: &mut LcdStepOutput) {
        self.registers.set_hblank_flag(true);

        if self.registers.vcount < VBLANK_START {
            self.render_scanline(self.registers.vcount);
            for affine in &mut self.registers.affine {
                affine.advance_line();
            }
        }

        if self.registers.hblank_irq_enable() {
            output.request_hblank_irq = true;
        }
    }

    fn next_line(&mut self, output: &mut LcdStepOutput) {
        self.registers.set_hblank_flag(false);
        self.registers.vcount = (self.registers.vcount + 1) % TOTAL_LINES;

        match self.registers.vcount {
            VBLANK_START => {
                self.registers.set_vblank_flag(true);
                if self.registers.vblank_irq_enable() {
                    output.request_vblank_irq = true;
                }
                self.frame_ready = true;

                for affine in &mut self.registers.affine {
                    affine.reload_reference_point();
                }
            }
            0 => self.registers.set_vblank_flag(false),
            _ => {}
        }

        let matched = self.registers.vcount == self.registers.vcount_setting();
        self.registers.set_vcounter_flag(matched);
        if matched && self.registers.vcounter_irq_enable() {
            output.request_vcount_irq = true;
        }
    }

    fn render_scanline(&mut self, y: u16) {
        let row = if self.registers.forced_blank() {
            [Color::WHITE.to_rgba(); LCD_WIDTH]
        } else {
            self.compose_scanline(y).map(Color::to_rgba)
        };

        self.framebuffer.set_row(usize::from(y), &row);
    }

    fn compose_scanline(&mut self, y: u16) -> [Color; LCD_WIDTH] {
        let backdrop = self.memory.backdrop();
        let mode = self.registers.bg_mode();

        if mode > 5 {
            if self.reported_mode != Some(mode) {
                tracing::warn!("video mode {mode} is not supported, drawing the backdrop");
                self.reported_mode = Some(mode);
            }
            return [backdrop; LCD_WIDTH];
        }

        let mut backgrounds = Vec::with_capacity(4);
        for bg in 0..4 {
            if !self.registers.bg_enabled(bg) {
                continue;
            }
            if let Some(layer) = layers::background_layer(mode, bg) {
                let mut line = [None; LCD_WIDTH];
                layer.render_scanline(usize::from(y), &self.memory, &self.registers, &mut line);
                backgrounds.push((self.registers.bg(bg).priority(), line));
            }
        }

        let sprites = if self.registers.obj_enabled() {
            obj::render_scanline(y, &self.memory, &self.registers)
        } else {
            [None; LCD_WIDTH]
        };

        let mut composed: [Option<PixelInfo>; LCD_WIDTH] = [None; LCD_WIDTH];
        for priority in 0..=3 {
            for (x, pixel) in composed.iter_mut().enumerate() {
                if pixel.is_some() {
                    continue;
                }

                *pixel = sprites[x]
                    .filter(|sprite| sprite.priority == priority)
                    .or_else(|| {
                        backgrounds
                            .iter()
                            .filter(|(bg_priority, _)| *bg_priority == priority)
                            .find_map(|(_, line)| line[x])
                            .map(|color| PixelInfo { color, priority })
                    });
            }
        }

        composed.map(|pixel| pixel.map_or(backdrop, |info| info.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lcd_with_dispstat(dispstat: u16) -> Lcd {
        let mut lcd = Lcd::default();
        lcd.registers.dispstat = dispstat;
        lcd
    }

    fn set_bg_color(lcd: &mut Lcd, index: usize, color: u16) {
        let [low, high] = color.to_le_bytes();
        lcd.memory.bg_palette_ram[index * 2] = low;
        lcd.memory.bg_palette_ram[index * 2 + 1] = high;
    }

    /// BG0 (map at screen block 8) and BG1 (map at screen block 9), both
    /// 8bpp over char block 0. Tile 0 is index 1 everywhere, tile 1 is index
    /// 2, tile 2 is transparent. BG0 shows tile 0 everywhere, BG1 shows tile 1
    /// in its first map column and tile 2 elsewhere.
    fn two_backgrounds(bg0_priority: u16, bg1_priority: u16) -> Lcd {
        let mut lcd = Lcd::default();
        lcd.registers.dispcnt = 0x0300;
        lcd.registers.bg_control[0] = 0x0880 | bg0_priority;
        lcd.registers.bg_control[1] = 0x0980 | bg1_priority;

        lcd.memory.video_ram[0..64].fill(1);
        lcd.memory.video_ram[64..128].fill(2);
        for column in 0..32 {
            lcd.memory.video_ram[0x4800 + column * 2] = if column == 0 { 1 } else { 2 };
        }

        set_bg_color(&mut lcd, 0, 0x7FFF);
        set_bg_color(&mut lcd, 1, 0x0011);
        set_bg_color(&mut lcd, 2, 0x0022);
        lcd
    }

    fn add_sprite(lcd: &mut Lcd, priority: u16) {
        for index in 1..128 {
            lcd.memory.obj_attributes[index * 8 + 1] = 0x02;
        }
        let attribute2 = (priority << 10 | 1).to_le_bytes();
        lcd.memory.obj_attributes[4] = attribute2[0];
        lcd.memory.obj_attributes[5] = attribute2[1];
        lcd.memory.video_ram[0x10020..0x10040].fill(0x33);
        lcd.memory.obj_palette_ram[6] = 0x33;
        lcd.registers.dispcnt |= 0x1000;
    }

    #[test]
    fn color_conversion() {
        assert_eq!(Color(0x001F).to_rgba(), 0xF800_00FF);
        assert_eq!(Color(0x03E0).to_rgba(), 0x00F8_00FF);
        assert_eq!(Color(0x7C00).to_rgba(), 0x0000_F8FF);
        assert_eq!(Color::from_rgb(31, 31, 31), Color::WHITE);
        assert_eq!(Color(0x7C1F).blue(), 31);
    }

    #[test]
    fn hblank_starts_960_cycles_into_the_line() {
        let mut lcd = lcd_with_dispstat(0x0010);

        let output = lcd.advance(HDRAW_CYCLES - 1);
        assert_eq!(output, LcdStepOutput::default());
        assert_eq!(lcd.cycles_to_next_event(), 1);

        let output = lcd.advance(1);
        assert!(output.request_hblank_irq);
        assert!(lcd.registers.hblank_flag());
        assert_eq!(lcd.cycles_to_next_event(), CYCLES_PER_LINE - HDRAW_CYCLES);

        lcd.advance(CYCLES_PER_LINE - HDRAW_CYCLES);
        assert!(!lcd.registers.hblank_flag());
        assert_eq!(lcd.vcount(), 1);
    }

    #[test]
    fn vblank_entered_at_line_160() {
        let mut lcd = lcd_with_dispstat(0x0008);

        let output = lcd.advance(u32::from(VBLANK_START) * CYCLES_PER_LINE - 1);
        assert!(!output.request_vblank_irq);
        assert!(!lcd.registers.vblank_flag());
        assert!(!lcd.take_frame_ready());

        let output = lcd.advance(1);
        assert!(output.request_vblank_irq);
        assert!(lcd.registers.vblank_flag());
        assert_eq!(lcd.vcount(), 160);
        assert!(lcd.take_frame_ready());
        assert!(!lcd.take_frame_ready());
    }

    #[test]
    fn vblank_irq_needs_enable_bit() {
        let mut lcd = Lcd::default();
        let output = lcd.advance(u32::from(VBLANK_START) * CYCLES_PER_LINE);
        assert!(!output.request_vblank_irq);
        assert!(lcd.registers.vblank_flag());
    }

    #[test]
    fn frame_wraps_after_228_lines() {
        let mut lcd = Lcd::default();

        lcd.advance(CYCLES_PER_FRAME);

        assert_eq!(CYCLES_PER_FRAME, 280_896);
        assert_eq!(lcd.vcount(), 0);
        assert!(!lcd.registers.vblank_flag());
        assert!(lcd.take_frame_ready());
    }

    #[test]
    fn vcount_match_raises_interrupt() {
        let mut lcd = lcd_with_dispstat(0x0520);

        let output = lcd.advance(4 * CYCLES_PER_LINE);
        assert!(!output.request_vcount_irq);

        let output = lcd.advance(CYCLES_PER_LINE);
        assert!(output.request_vcount_irq);
        assert_eq!(lcd.registers.dispstat & 0b100, 0b100);

        lcd.advance(CYCLES_PER_LINE);
        assert_eq!(lcd.registers.dispstat & 0b100, 0);
    }

    #[test]
    fn higher_priority_background_wins_and_transparency_reveals() {
        let mut lcd = two_backgrounds(1, 0);
        lcd.render_scanline(0);

        let frame = lcd.framebuffer();
        assert_eq!(frame.pixel(0, 0), Color(0x0022).to_rgba());
        assert_eq!(frame.pixel(7, 0), Color(0x0022).to_rgba());
        assert_eq!(frame.pixel(8, 0), Color(0x0011).to_rgba());
        assert_eq!(frame.pixel(239, 0), Color(0x0011).to_rgba());
    }

    #[test]
    fn priority_not_render_order_decides() {
        let mut lcd = two_backgrounds(0, 1);
        lcd.render_scanline(0);

        assert!(
            lcd.framebuffer()
                .row(0)
                .iter()
                .all(|pixel| *pixel == Color(0x0011).to_rgba())
        );
    }

    #[test]
    fn unclaimed_pixels_show_backdrop() {
        let mut lcd = two_backgrounds(0, 1);
        lcd.registers.dispcnt = 0x0200;
        lcd.render_scanline(0);

        assert_eq!(lcd.framebuffer().pixel(0, 0), Color(0x0022).to_rgba());
        assert_eq!(lcd.framebuffer().pixel(8, 0), Color::WHITE.to_rgba());
    }

    #[test]
    fn sprites_win_ties_with_backgrounds() {
        let mut lcd = two_backgrounds(1, 3);
        lcd.registers.dispcnt = 0x0100;
        add_sprite(&mut lcd, 1);
        lcd.render_scanline(0);

        assert_eq!(lcd.framebuffer().pixel(0, 0), Color(0x0033).to_rgba());
        assert_eq!(lcd.framebuffer().pixel(8, 0), Color(0x0011).to_rgba());

        let mut lcd = two_backgrounds(1, 3);
        lcd.registers.dispcnt = 0x0100;
        add_sprite(&mut lcd, 2);
        lcd.render_scanline(0);

        assert_eq!(lcd.framebuffer().pixel(0, 0), Color(0x0011).to_rgba());
    }

    #[test]
    fn bitmap_mode_line_reaches_framebuffer() {
        let mut lcd = Lcd::default();
        lcd.registers.dispcnt = 0x0403;
        let offset = (3 * LCD_WIDTH + 10) * 2;
        lcd.memory.video_ram[offset] = 0x1F;

        lcd.advance(4 * CYCLES_PER_LINE);

        assert_eq!(lcd.framebuffer().pixel(10, 3), 0xF800_00FF);
        assert_eq!(lcd.framebuffer().pixel(11, 3), 0x0000_00FF);
    }

    #[test]
    fn forced_blank_draws_white() {
        let mut lcd = Lcd::default();
        lcd.registers.dispcnt = 0x0083;
        lcd.render_scanline(0);

        assert!(lcd.framebuffer().row(0).iter().all(|pixel| *pixel == 0xF8F8_F8FF));
    }

    #[test]
    fn unsupported_mode_draws_backdrop() {
        let mut lcd = Lcd::default();
        lcd.registers.dispcnt = 0x0406;
        set_bg_color(&mut lcd, 0, 0x001F);
        lcd.render_scanline(0);

        assert_eq!(lcd.framebuffer().pixel(100, 0), 0xF800_00FF);
    }

    #[test]
    fn rgb_bytes_drop_alpha() {
        let mut lcd = Lcd::default();
        lcd.registers.dispcnt = 0x0080;
        lcd.render_scanline(0);

        let bytes = lcd.framebuffer().to_rgb_bytes();
        assert_eq!(bytes.len(), LCD_WIDTH * LCD_HEIGHT * 3);
        assert_eq!(&bytes[..3], &[0xF8, 0xF8, 0xF8]);
        assert_eq!(&bytes[LCD_WIDTH * 3..LCD_WIDTH * 3 + 3], &[0, 0, 0]);
    }
}
