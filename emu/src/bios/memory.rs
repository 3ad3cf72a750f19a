//! Memory system calls: CpuSet, CpuFastSet, RegisterRamReset and
//! BiosChecksum.

use crate::bitwise::Bits;
use crate::bus::Bus;

/// Checksum the original GBA firmware reports.
pub const BIOS_CHECKSUM: u32 = 0xBAAE_187F;

/// Copies and fills only run for sources outside the BIOS region.
const fn is_source_allowed(source: u32) -> bool {
    source & 0x0E00_0000 != 0
}

/// `CpuSet`: copy (or fill, with bit 24) `control & 0x1F_FFFF` units of 16 or
/// 32 bits (bit 26) from `source` to `destination`.
pub fn cpu_set(bus: &mut Bus, source: u32, destination: u32, control: u32) -> u32 {
    if !is_source_allowed(source) {
        tracing::debug!("CpuSet from protected source 0x{source:08X} ignored");
        return 0;
    }

    let count = control.get_bits(0..=20);
    let fill = control.get_bit(24);

    if control.get_bit(26) {
        let (source, destination) = (source & !0b11, destination & !0b11);
        let fill_value = bus.read_word(source);
        for i in 0..count {
            let value = if fill {
                fill_value
            } else {
                bus.read_word(source.wrapping_add(i * 4))
            };
            bus.write_word(destination.wrapping_add(i * 4), value);
        }
    } else {
        let (source, destination) = (source & !0b1, destination & !0b1);
        let fill_value = bus.read_half_word(source);
        for i in 0..count {
            let value = if fill {
                fill_value
            } else {
                bus.read_half_word(source.wrapping_add(i * 2))
            };
            bus.write_half_word(destination.wrapping_add(i * 2), value);
        }
    }

    count * 2
}

/// `CpuFastSet`: like [`cpu_set`] in 32-bit units, moving blocks of 8 words.
/// The word count is rounded down to a multiple of 8.
pub fn cpu_fast_set(bus: &mut Bus, source: u32, destination: u32, control: u32) -> u32 {
    let count = control.get_bits(0..=20) & !7;
    let control = (control & !0x1F_FFFF) | count | (1 << 26);

    cpu_set(bus, source, destination, control) / 2
}

/// `RegisterRamReset`: clears the memory areas and register groups
/// selected by `flags`.
///
/// | Bit | Clears                                        |
/// |-----|-----------------------------------------------|
/// | 0   | EWRAM                                         |
/// | 1   | IWRAM, except the last 0x200 bytes            |
/// | 2   | Palette RAM                                   |
/// | 3   | VRAM                                          |
/// | 4   | OAM                                           |
/// | 5   | Serial registers                              |
/// | 6   | Sound registers                               |
/// | 7   | Every other register                          |
pub fn register_ram_reset(bus: &mut Bus, flags: u8) -> u32 {
    let areas: [(u8, u32, u32); 7] = [
        (0, 0x0200_0000, 0x0204_0000),
        (1, 0x0300_0000, 0x0300_7E00),
        (2, 0x0500_0000, 0x0500_0400),
        (3, 0x0600_0000, 0x0601_8000),
        (4, 0x0700_0000, 0x0700_0400),
        (5, 0x0400_0120, 0x0400_0130),
        (6, 0x0400_0060, 0x0400_00B0),
    ];

    let mut cleared = 0;
    for (bit, start, end) in areas {
        if flags.get_bit(bit) {
            clear(bus, start, end);
            cleared += end - start;
        }
    }

    if flags.get_bit(7) {
        clear(bus, 0x0400_0000, 0x0400_0060);
        clear(bus, 0x0400_00B0, 0x0400_0120);
        clear(bus, 0x0400_0200, 0x0400_0200 + 2);
        clear(bus, 0x0400_0208, 0x0400_0208 + 4);
        bus.write_half_word(0x0400_0202, 0xFFFF);
        // the display is left in forced blank
        bus.write_half_word(0x0400_0000, 0x0080);
        cleared += 0x60 + 0x70;
    }

    cleared / 4
}

fn clear(bus: &mut Bus, start: u32, end: u32) {
    for address in (start..end).step_by(4) {
        if end - address >= 4 {
            bus.write_word(address, 0);
        } else {
            bus.write_half_word(address, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: u32 = 0x0200_0000;
    const DESTINATION: u32 = 0x0300_0000;

    fn bus_with_words(count: u32) -> Bus {
        let mut bus = Bus::default();
        for i in 0..count {
            bus.write_word(SOURCE + i * 4, 0x1000 + i);
        }
        bus
    }

    #[test]
    fn cpu_set_copies_halfwords() {
        let mut bus = bus_with_words(4);
        cpu_set(&mut bus, SOURCE, DESTINATION, 3);

        assert_eq!(bus.read_half_word(DESTINATION), 0x1000);
        assert_eq!(bus.read_half_word(DESTINATION + 2), 0);
        assert_eq!(bus.read_half_word(DESTINATION + 4), 0x1001);
        // fourth halfword untouched
        assert_eq!(bus.read_half_word(DESTINATION + 6), 0);
        bus.write_half_word(DESTINATION + 6, 0xAAAA);
        cpu_set(&mut bus, SOURCE, DESTINATION, 3);
        assert_eq!(bus.read_half_word(DESTINATION + 6), 0xAAAA);
    }

    #[test]
    fn cpu_set_fills_words() {
        let mut bus = bus_with_words(1);
        cpu_set(&mut bus, SOURCE, DESTINATION, (1 << 26) | (1 << 24) | 5);

        for i in 0..5 {
            assert_eq!(bus.read_word(DESTINATION + i * 4), 0x1000);
        }
        assert_eq!(bus.read_word(DESTINATION + 20), 0);
    }

    #[test]
    fn cpu_set_ignores_bios_sources() {
        let mut bus = Bus::default();
        cpu_set(&mut bus, 0x0000_0000, DESTINATION, (1 << 26) | 4);

        assert_eq!(bus.read_word(DESTINATION), 0);
    }

    #[test]
    fn cpu_fast_set_of_13_words_copies_8() {
        let mut bus = bus_with_words(13);
        cpu_fast_set(&mut bus, SOURCE, DESTINATION, 13);

        for i in 0..8 {
            assert_eq!(bus.read_word(DESTINATION + i * 4), 0x1000 + i);
        }
        for i in 8..13 {
            assert_eq!(bus.read_word(DESTINATION + i * 4), 0);
        }
    }

    #[test]
    fn cpu_fast_set_fill() {
        let mut bus = bus_with_words(1);
        cpu_fast_set(&mut bus, SOURCE, DESTINATION, (1 << 24) | 16);

        assert_eq!(bus.read_word(DESTINATION + 15 * 4), 0x1000);
        assert_eq!(bus.read_word(DESTINATION + 16 * 4), 0);
    }

    #[test]
    fn register_ram_reset_keeps_the_top_of_iwram() {
        let mut bus = Bus::default();
        bus.write_word(0x0200_1000, 1);
        bus.write_word(0x0300_1000, 2);
        bus.write_word(0x0300_7F00, 3);
        bus.write_word(0x0500_0000, 4);

        register_ram_reset(&mut bus, 0b0000_0011);

        assert_eq!(bus.read_word(0x0200_1000), 0);
        assert_eq!(bus.read_word(0x0300_1000), 0);
        assert_eq!(bus.read_word(0x0300_7F00), 3);
        assert_eq!(bus.read_word(0x0500_0000), 4);
    }

    #[test]
    fn register_ram_reset_registers() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0400_0008, 0x1234);
        bus.write_half_word(0x0400_0200, 0x0001);
        bus.write_half_word(0x0400_0100, 0x5555);

        register_ram_reset(&mut bus, 0x80);

        assert_eq!(bus.read_half_word(0x0400_0000), 0x0080);
        assert_eq!(bus.read_half_word(0x0400_0008), 0);
        assert_eq!(bus.read_half_word(0x0400_0200), 0);
        assert_eq!(bus.read_half_word(0x0400_0100), 0);
    }
}
