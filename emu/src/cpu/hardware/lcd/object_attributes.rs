// We use nomenclature coming from https://www.coranac.com/tonc/text/regobj.htm#sec-oam

use crate::bitwise::Bits;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ObjMode {
    #[default]
    Normal,
    Affine,
    Disabled,
    AffineDouble,
}

impl From<u16> for ObjMode {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Normal,
            1 => Self::Affine,
            2 => Self::Disabled,
            _ => Self::AffineDouble,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GfxMode {
    #[default]
    Normal,
    AlphaBlending,
    ObjectWindow,
}

impl TryFrom<u16> for GfxMode {
    type Error = &'static str;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::AlphaBlending),
            2 => Ok(Self::ObjectWindow),
            _ => Err("Forbidden GfxMode"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 16 colors
    #[default]
    Palette4bpp,
    /// 256 colors
    Palette8bpp,
}

impl From<bool> for ColorMode {
    fn from(value: bool) -> Self {
        if value {
            Self::Palette8bpp
        } else {
            Self::Palette4bpp
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ObjShape {
    #[default]
    Square,
    Horizontal,
    Vertical,
}

impl TryFrom<u16> for ObjShape {
    type Error = &'static str;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Square),
            1 => Ok(Self::Horizontal),
            2 => Ok(Self::Vertical),
            _ => Err("Prohibited ObjShape"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    RotationScaling {
        rotation_scaling_parameter: u8,
    },
    Flip {
        horizontal_flip: bool,
        vertical_flip: bool,
    },
}

/// One decoded OAM entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjAttributes {
    pub y_coordinate: u8,
    pub obj_mode: ObjMode,
    pub gfx_mode: GfxMode,
    pub color_mode: ColorMode,
    pub obj_shape: ObjShape,
    /// 9 bit signed screen position.
    pub x_coordinate: i32,
    pub transformation_kind: TransformationKind,
    pub obj_size: u16,
    pub tile_number: u16,
    pub priority: u8,
    pub palette_number: u8,
}

impl ObjAttributes {
    /// Decodes entry `index` (0-127) from OAM. Returns `None` for disabled
    /// sprites and prohibited shape or mode encodings.
    pub fn parse(oam: &[u8; 0x400], index: usize) -> Option<Self> {
        let base = (index & 0x7F) * 8;
        let attribute = |n: usize| u16::from_le_bytes([oam[base + n * 2], oam[base + n * 2 + 1]]);
        let (attribute0, attribute1, attribute2) = (attribute(0), attribute(1), attribute(2));

        let obj_mode = ObjMode::from(attribute0.get_bits(8..=9));
        if obj_mode == ObjMode::Disabled {
            return None;
        }

        let gfx_mode = GfxMode::try_from(attribute0.get_bits(10..=11)).ok()?;
        let obj_shape = ObjShape::try_from(attribute0.get_bits(14..=15)).ok()?;

        let transformation_kind = match obj_mode {
            ObjMode::Affine | ObjMode::AffineDouble => TransformationKind::RotationScaling {
                rotation_scaling_parameter: attribute1.get_bits(9..=13) as u8,
            },
            ObjMode::Normal | ObjMode::Disabled => TransformationKind::Flip {
                horizontal_flip: attribute1.get_bit(12),
                vertical_flip: attribute1.get_bit(13),
            },
        };

        Some(Self {
            y_coordinate: attribute0.get_bits(0..=7) as u8,
            obj_mode,
            gfx_mode,
            color_mode: attribute0.get_bit(13).into(),
            obj_shape,
            x_coordinate: i32::from(attribute1.get_bits(0..=8).sign_extended(9) as i16),
            transformation_kind,
            obj_size: attribute1.get_bits(14..=15),
            tile_number: attribute2.get_bits(0..=9),
            priority: attribute2.get_bits(10..=11) as u8,
            palette_number: attribute2.get_bits(12..=15) as u8,
        })
    }

    /// Sprite size in pixels (width, height).
    pub const fn size(&self) -> (i32, i32) {
        match (self.obj_shape, self.obj_size) {
            (ObjShape::Square, 0) => (8, 8),
            (ObjShape::Square, 1) => (16, 16),
            (ObjShape::Square, 2) => (32, 32),
            (ObjShape::Square, _) => (64, 64),
            (ObjShape::Horizontal, 0) => (16, 8),
            (ObjShape::Horizontal, 1) => (32, 8),
            (ObjShape::Horizontal, 2) => (32, 16),
            (ObjShape::Horizontal, _) => (64, 32),
            (ObjShape::Vertical, 0) => (8, 16),
            (ObjShape::Vertical, 1) => (8, 32),
            (ObjShape::Vertical, 2) => (16, 32),
            (ObjShape::Vertical, _) => (32, 64),
        }
    }

    /// Area covered on screen, doubled for double-size affine sprites.
    pub const fn bounds(&self) -> (i32, i32) {
        let (width, height) = self.size();
        if matches!(self.obj_mode, ObjMode::AffineDouble) {
            (width * 2, height * 2)
        } else {
            (width, height)
        }
    }

    /// Row of the sprite's bounding box drawn on scanline `y`, if any.
    /// Sprites wrap around a 256 line world.
    pub fn row_on_scanline(&self, y: u16) -> Option<i32> {
        let (_, height) = self.bounds();
        let row = (i32::from(y) - i32::from(self.y_coordinate)).rem_euclid(256);
        (row < height).then_some(row)
    }
}

/// Rotation/scaling matrix shared by 4 OAM entries, signed 8.8 fixed point.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RotationScaling {
    pub pa: i32,
    pub pb: i32,
    pub pc: i32,
    pub pd: i32,
}

impl RotationScaling {
    /// Reads group `index` (0-31); its values live in the fourth halfword
    /// of OAM entries `4 * index` to `4 * index + 3`.
    pub fn parse(oam: &[u8; 0x400], index: u8) -> Self {
        let base = usize::from(index & 0x1F) * 32;
        let parameter = |n: usize| {
            let offset = base + n * 8 + 6;
            i32::from(i16::from_le_bytes([oam[offset], oam[offset + 1]]))
        };

        Self {
            pa: parameter(0),
            pb: parameter(1),
            pc: parameter(2),
            pd: parameter(3),
        }
    }

    /// Gives back P*T >> 8 where
    /// P = [ pa  pb ]
    ///     [ pc  pd ]
    /// and T = (x, y).
    #[allow(clippy::many_single_char_names)]
    pub const fn apply(self, x: i32, y: i32) -> (i32, i32) {
        (
            (self.pa * x + self.pb * y) >> 8,
            (self.pc * x + self.pd * y) >> 8,
        )
    }
}
