//! Sprite (OBJ) layer.
//!
//! Sprites are read fresh from OAM on every scanline. The ones crossing the
//! line are sorted by priority (stable, so OAM order breaks ties) and drawn
//! front to back: a pixel already claimed by an earlier sprite is kept.
//!
//! Affine sprites sample their texture through the OAM matrix around the
//! sprite center; double-size sprites get a bounding box twice as large so
//! the rotated texture is not clipped.

use crate::cpu::hardware::lcd::memory::{Memory, OBJ_VRAM_BASE};
use crate::cpu::hardware::lcd::object_attributes::{
    ColorMode, GfxMode, ObjAttributes, RotationScaling, TransformationKind,
};
use crate::cpu::hardware::lcd::registers::Registers;
use crate::cpu::hardware::lcd::{LCD_WIDTH, ObjMappingKind, PixelInfo};

use super::tile_pixel;

/// Sprite pixels on a scanline, each carrying its sprite's priority.
pub type ObjLine = [Option<PixelInfo>; LCD_WIDTH];

/// In bitmap modes the lower half of OBJ VRAM holds frame data.
const FIRST_BITMAP_MODE_TILE: u16 = 512;

/// Size of the OBJ tile area in VRAM.
const OBJ_VRAM_MASK: usize = 0x7FFF;

pub fn render_scanline(y: u16, memory: &Memory, registers: &Registers) -> ObjLine {
    let mut line = [None; LCD_WIDTH];

    let mut sprites = (0..128)
        .filter_map(|index| ObjAttributes::parse(&memory.obj_attributes, index))
        .filter(|obj| obj.gfx_mode != GfxMode::ObjectWindow)
        .filter_map(|obj| obj.row_on_scanline(y).map(|row| (obj, row)))
        .collect::<Vec<_>>();
    sprites.sort_by_key(|(obj, _)| obj.priority);

    for (obj, row) in &sprites {
        draw_sprite(obj, *row, memory, registers, &mut line);
    }

    line
}

fn draw_sprite(obj: &ObjAttributes, row: i32, memory: &Memory, registers: &Registers, line: &mut ObjLine) {
    if registers.bg_mode() >= 3 && obj.tile_number < FIRST_BITMAP_MODE_TILE {
        return;
    }

    let (width, height) = obj.size();
    let (bounds_width, bounds_height) = obj.bounds();
    let mapping = registers.obj_character_vram_mapping();

    for column in 0..bounds_width {
        let screen_x = obj.x_coordinate + column;
        if !(0..LCD_WIDTH as i32).contains(&screen_x) {
            continue;
        }
        #[allow(clippy::cast_sign_loss)]
        let screen_x = screen_x as usize;
        if line[screen_x].is_some() {
            continue;
        }

        let (texture_x, texture_y) = match obj.transformation_kind {
            TransformationKind::RotationScaling {
                rotation_scaling_parameter,
            } => {
                let matrix = RotationScaling::parse(&memory.obj_attributes, rotation_scaling_parameter);
                let (x, y) = matrix.apply(column - bounds_width / 2, row - bounds_height / 2);
                (x + width / 2, y + height / 2)
            }
            TransformationKind::Flip {
                horizontal_flip,
                vertical_flip,
            } => (
                if horizontal_flip { width - 1 - column } else { column },
                if vertical_flip { height - 1 - row } else { row },
            ),
        };

        if !(0..width).contains(&texture_x) || !(0..height).contains(&texture_y) {
            continue;
        }

        #[allow(clippy::cast_sign_loss)]
        let palette_index = texel_palette_index(
            obj,
            mapping,
            texture_x as usize,
            texture_y as usize,
            memory,
        );
        if palette_index == 0 {
            continue;
        }

        line[screen_x] = Some(PixelInfo {
            color: memory.obj_color(palette_index),
            priority: obj.priority,
        });
    }
}

/// Full OBJ palette index of texel (`x`, `y`) of `obj`.
///
/// Tile numbers count 32 byte units; an 8bpp tile spans two of them. With 2D
/// mapping OBJ VRAM is a 32 tile wide grid, with 1D mapping the tiles of a
/// sprite are consecutive.
fn texel_palette_index(
    obj: &ObjAttributes,
    mapping: ObjMappingKind,
    x: usize,
    y: usize,
    memory: &Memory,
) -> usize {
    let tiles_per_row = obj.size().0 as usize / 8;
    let (tile_x, tile_y) = (x / 8, y / 8);
    let base_tile = usize::from(obj.tile_number);

    let tile_base = |tile: usize| OBJ_VRAM_BASE + (((tile & 0x3FF) * 32) & OBJ_VRAM_MASK);

    match obj.color_mode {
        ColorMode::Palette8bpp => {
            let tile = match mapping {
                ObjMappingKind::OneDimensional => base_tile + (tile_y * tiles_per_row + tile_x) * 2,
                ObjMappingKind::TwoDimensional => (base_tile & !1) + tile_y * 32 + tile_x * 2,
            };
            usize::from(tile_pixel(memory, tile_base(tile), true, x % 8, y % 8))
        }
        ColorMode::Palette4bpp => {
            let tile = base_tile
                + match mapping {
                    ObjMappingKind::OneDimensional => tile_y * tiles_per_row + tile_x,
                    ObjMappingKind::TwoDimensional => tile_y * 32 + tile_x,
                };
            match tile_pixel(memory, tile_base(tile), false, x % 8, y % 8) {
                0 => 0,
                color => usize::from(obj.palette_number) * 16 + usize::from(color),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::lcd::Color;
    use pretty_assertions::assert_eq;

    fn set_entry(memory: &mut Memory, index: usize, attributes: [u16; 3]) {
        for (n, value) in attributes.into_iter().enumerate() {
            let [low, high] = value.to_le_bytes();
            memory.obj_attributes[index * 8 + n * 2] = low;
            memory.obj_attributes[index * 8 + n * 2 + 1] = high;
        }
    }

    fn set_matrix(memory: &mut Memory, group: usize, matrix: [i16; 4]) {
        for (n, value) in matrix.into_iter().enumerate() {
            let [low, high] = value.to_le_bytes();
            memory.obj_attributes[group * 32 + n * 8 + 6] = low;
            memory.obj_attributes[group * 32 + n * 8 + 7] = high;
        }
    }

    /// Fills 4bpp tile `tile` with color index `color`.
    fn fill_tile(memory: &mut Memory, tile: usize, color: u8) {
        let start = OBJ_VRAM_BASE + tile * 32;
        memory.video_ram[start..start + 32].fill(color << 4 | color);
    }

    fn empty_oam() -> Memory {
        let mut memory = Memory::default();
        for index in 0..128 {
            set_entry(&mut memory, index, [0x0200, 0, 0]);
        }
        memory
    }

    #[test]
    fn lower_priority_value_wins_then_oam_order() {
        let mut memory = empty_oam();
        fill_tile(&mut memory, 1, 1);
        fill_tile(&mut memory, 2, 2);
        fill_tile(&mut memory, 3, 3);
        memory.obj_palette_ram[2] = 0x01;
        memory.obj_palette_ram[4] = 0x02;
        memory.obj_palette_ram[6] = 0x03;

        // 8x8 sprites on line 0: priority 2 tile 1 at x=10, priority 1 tile 2 at x=10, priority 1 tile 3 at x=14
        set_entry(&mut memory, 0, [0x0000, 10, 0x0801]);
        set_entry(&mut memory, 1, [0x0000, 10, 0x0402]);
        set_entry(&mut memory, 2, [0x0000, 14, 0x0403]);

        let line = render_scanline(3, &memory, &Registers::default());

        assert_eq!(line[9], None);
        assert_eq!(
            line[10],
            Some(PixelInfo {
                color: Color(0x02),
                priority: 1
            })
        );
        assert_eq!(line[17].map(|pixel| pixel.color), Some(Color(0x02)));
        assert_eq!(line[18].map(|pixel| pixel.color), Some(Color(0x03)));
        assert_eq!(line[22].map(|pixel| pixel.color), None);
    }

    #[test]
    fn flipped_sprite_and_1d_mapping() {
        let mut memory = empty_oam();
        // 16x8 horizontal sprite using tiles 4 and 5, h-flip
        fill_tile(&mut memory, 5, 7);
        memory.obj_palette_ram[(2 * 16 + 7) * 2] = 0x55;
        set_entry(&mut memory, 0, [0x4000, 0x1000, 0x2004]);

        let registers = Registers {
            dispcnt: 0x0040,
            ..Default::default()
        };
        let line = render_scanline(0, &memory, &registers);

        assert_eq!(line[0].map(|pixel| pixel.color), Some(Color(0x55)));
        assert_eq!(line[7].map(|pixel| pixel.color), Some(Color(0x55)));
        assert_eq!(line[8], None);
    }

    #[test]
    fn sprites_wrap_vertically_and_clip_horizontally() {
        let mut memory = empty_oam();
        fill_tile(&mut memory, 1, 1);
        memory.obj_palette_ram[2] = 0x11;
        // y = 252, x = -4
        set_entry(&mut memory, 0, [0x00FC, 0x01FC, 0x0001]);

        let line = render_scanline(3, &memory, &Registers::default());
        assert_eq!(line[3].map(|pixel| pixel.color), Some(Color(0x11)));
        assert_eq!(line[4], None);

        let line = render_scanline(4, &memory, &Registers::default());
        assert!(line.iter().all(Option::is_none));
    }

    #[test]
    fn double_size_affine_sprite() {
        let mut memory = empty_oam();
        fill_tile(&mut memory, 1, 1);
        memory.obj_palette_ram[2] = 0x22;
        set_matrix(&mut memory, 0, [0x0100, 0, 0, 0x0100]);
        // 8x8 double size at (0, 0) with matrix 0: texture centered in a 16x16 box
        set_entry(&mut memory, 0, [0x0300, 0x0000, 0x0001]);

        let line = render_scanline(0, &memory, &Registers::default());
        assert!(line.iter().all(Option::is_none));

        let line = render_scanline(4, &memory, &Registers::default());
        assert_eq!(line[3], None);
        assert_eq!(line[4].map(|pixel| pixel.color), Some(Color(0x22)));
        assert_eq!(line[11].map(|pixel| pixel.color), Some(Color(0x22)));
        assert_eq!(line[12], None);
    }

    #[test]
    fn bitmap_modes_hide_low_tiles() {
        let mut memory = empty_oam();
        fill_tile(&mut memory, 1, 1);
        memory.obj_palette_ram[2] = 0x11;
        set_entry(&mut memory, 0, [0x0000, 0, 0x0001]);

        let registers = Registers {
            dispcnt: 3,
            ..Default::default()
        };
        let line = render_scanline(0, &memory, &registers);
        assert!(line.iter().all(Option::is_none));
    }
}
