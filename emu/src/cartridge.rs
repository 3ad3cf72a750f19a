use std::path::Path;

use crate::bus::MAX_ROM_SIZE;
use crate::error::{EmuError, Result};

/// Size of the header at the start of every cartridge.
pub const HEADER_SIZE: usize = 0xC0;

/// Value every valid header carries at `0xB2`.
const FIXED_VALUE: u8 = 0x96;

/// Information stored in the first 0xC0 bytes of the ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    rom_entry_point: u32,
    game_title: String,
    game_code: String,
    maker_code: String,
    fixed_value: u8,
    main_unit_code: u8,
    device_type: u8,
    software_version: u8,
    complement_check: u8,
}

impl CartridgeHeader {
    /// Parses the header of `data`. Garbage in the text fields is tolerated:
    /// homebrew and test ROMs often leave them empty.
    pub fn new(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(EmuError::CartridgeTooSmall { size: data.len() });
        }

        let header = Self {
            rom_entry_point: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            game_title: into_ascii_str(&data[0xA0..0xAC]),
            game_code: into_ascii_str(&data[0xAC..0xB0]),
            maker_code: into_ascii_str(&data[0xB0..0xB2]),
            fixed_value: data[0xB2],
            main_unit_code: data[0xB3],
            device_type: data[0xB4],
            software_version: data[0xBC],
            complement_check: data[0xBD],
        };

        if header.fixed_value != FIXED_VALUE {
            tracing::warn!("unexpected fixed header value 0x{:02X}", header.fixed_value);
        }

        let checksum = header_checksum(data);
        if checksum != header.complement_check {
            tracing::warn!(
                "header checksum mismatch, expected 0x{:02X} but got 0x{checksum:02X}",
                header.complement_check
            );
        }

        Ok(header)
    }

    /// 32bit ARM branch opcode
    #[must_use]
    pub const fn rom_entry_point(&self) -> u32 {
        self.rom_entry_point
    }

    #[must_use]
    pub fn game_title(&self) -> &str {
        self.game_title.as_str()
    }

    #[must_use]
    pub fn game_code(&self) -> &str {
        self.game_code.as_str()
    }

    #[must_use]
    pub fn maker_code(&self) -> &str {
        self.maker_code.as_str()
    }

    /// 00h for current GBA models
    #[must_use]
    pub const fn main_unit_code(&self) -> u8 {
        self.main_unit_code
    }

    /// Usually 0x00
    #[must_use]
    pub const fn device_type(&self) -> u8 {
        self.device_type
    }

    /// Usually 0x00
    #[must_use]
    pub const fn software_version(&self) -> u8 {
        self.software_version
    }

    #[must_use]
    pub const fn complement_check(&self) -> u8 {
        self.complement_check
    }

    /// Whether the stored complement matches the one computed over
    /// `0xA0..0xBD`.
    #[must_use]
    pub fn is_checksum_valid(&self, data: &[u8]) -> bool {
        data.len() >= HEADER_SIZE && header_checksum(data) == self.complement_check
    }
}

/// A loaded game pak: header plus the raw ROM image.
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: CartridgeHeader,
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(EmuError::CartridgeTooLarge { size: rom.len() });
        }

        let header = CartridgeHeader::new(&rom)?;

        Ok(Self { header, rom })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let rom = std::fs::read(path).map_err(|source| EmuError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(rom)
    }

    #[must_use]
    pub const fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    #[must_use]
    pub fn into_rom(self) -> Vec<u8> {
        self.rom
    }
}

/// Complement of the sum of `0xA0..0xBD`, minus 0x19.
fn header_checksum(data: &[u8]) -> u8 {
    data[0xA0..0xBD]
        .iter()
        .fold(0u8, |acc, &item| acc.wrapping_sub(item))
        .wrapping_sub(0x19)
}

/// Text fields are NUL padded; anything that is not printable ASCII is dropped.
fn into_ascii_str(data: &[u8]) -> String {
    data.iter()
        .take_while(|&&byte| byte != 0)
        .filter(|byte| byte.is_ascii_graphic() || **byte == b' ')
        .map(|&byte| char::from(byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rom_with_header(title: &[u8], code: &[u8]) -> Vec<u8> {
        let mut rom = vec![0; 0x200];
        rom[0..4].copy_from_slice(&0xEA00_002E_u32.to_le_bytes());
        rom[0xA0..0xA0 + title.len()].copy_from_slice(title);
        rom[0xAC..0xB0].copy_from_slice(code);
        rom[0xB0..0xB2].copy_from_slice(b"01");
        rom[0xB2] = FIXED_VALUE;
        rom[0xBD] = header_checksum(&rom);
        rom
    }

    #[test]
    fn parses_header_fields() {
        let rom = rom_with_header(b"HELLO", b"AHLE");
        let cartridge = Cartridge::from_bytes(rom).unwrap();
        let header = cartridge.header();

        assert_eq!(header.rom_entry_point(), 0xEA00_002E);
        assert_eq!(header.game_title(), "HELLO");
        assert_eq!(header.game_code(), "AHLE");
        assert_eq!(header.maker_code(), "01");
        assert!(header.is_checksum_valid(cartridge.rom()));
    }

    #[test]
    fn bad_checksum_is_not_fatal() {
        let mut rom = rom_with_header(b"HELLO", b"AHLE");
        rom[0xBD] ^= 0xFF;

        let cartridge = Cartridge::from_bytes(rom).unwrap();
        assert!(!cartridge.header().is_checksum_valid(cartridge.rom()));
    }

    #[test]
    fn non_ascii_title_is_sanitized() {
        let rom = rom_with_header(&[b'A', 0xFF, b'B', 0, b'C'], b"AHLE");
        let cartridge = Cartridge::from_bytes(rom).unwrap();

        assert_eq!(cartridge.header().game_title(), "AB");
    }

    #[test]
    fn rejects_truncated_rom() {
        let err = Cartridge::from_bytes(vec![0; 0x40]).unwrap_err();
        assert!(matches!(err, EmuError::CartridgeTooSmall { size: 0x40 }));
    }

    #[test]
    fn rejects_oversized_rom() {
        let err = Cartridge::from_bytes(vec![0; MAX_ROM_SIZE + 1]).unwrap_err();
        assert!(matches!(err, EmuError::CartridgeTooLarge { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Cartridge::from_file("/nonexistent/rom.gba").unwrap_err();
        assert!(matches!(err, EmuError::Io { .. }));
    }
}
