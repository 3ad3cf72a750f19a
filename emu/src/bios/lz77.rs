//! LZ77 decompression (`LZ77UnCompWram` / `LZ77UnCompVram`).
//!
//! ```text
//! header:  [7:0] 0x10  [31:8] decompressed size
//! block:   flag byte, then 8 tokens, MSB of the flags first
//!   flag 0 -> 1 byte literal
//!   flag 1 -> 2 bytes: [7:4] length - 3, [3:0] (distance - 1) >> 8
//!                      [7:0] (distance - 1) & 0xFF
//! ```
//!
//! A back reference copies `length` bytes starting `distance` bytes behind
//! the write cursor, so overlapping copies repeat the pattern.

use crate::bitwise::Bits;
use crate::bus::Bus;

pub const LZ77_TAG: u8 = 0x10;

/// How decompressed data reaches memory. VRAM has no byte writes, so the
/// VRAM variant stores halfwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Wram,
    Vram,
}

/// Decodes a token stream into exactly `size` bytes. Tokens past `size` are
/// dropped; back references before the start of the output read as zero.
pub fn decode(mut next_byte: impl FnMut() -> u8, size: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(size);
    let mut reported_underflow = false;

    while output.len() < size {
        let flags = next_byte();

        for bit in (0..8).rev() {
            if output.len() >= size {
                break;
            }

            if !flags.get_bit(bit) {
                output.push(next_byte());
                continue;
            }

            let high = next_byte();
            let low = next_byte();
            let length = usize::from(high >> 4) + 3;
            let distance = (usize::from(high & 0xF) << 8 | usize::from(low)) + 1;

            for _ in 0..length.min(size - output.len()) {
                let byte = match output.len().checked_sub(distance) {
                    Some(index) => output[index],
                    None => {
                        if !reported_underflow {
                            tracing::debug!("LZ77 back reference before the start of the output");
                            reported_underflow = true;
                        }
                        0
                    }
                };
                output.push(byte);
            }
        }
    }

    output
}

/// Decompresses the stream at `source` into `destination`.
pub fn uncompress(bus: &mut Bus, source: u32, destination: u32, target: Target) -> u32 {
    let header = bus.read_word(source);
    if header.get_bits(0..=7) != u32::from(LZ77_TAG) {
        tracing::warn!("LZ77 stream at 0x{source:08X} has unknown header 0x{header:08X}");
        return 0;
    }
    let size = header.get_bits(8..=31) as usize;

    let mut address = source.wrapping_add(4);
    let data = decode(
        || {
            let byte = bus.read_byte(address);
            address = address.wrapping_add(1);
            byte
        },
        size,
    );

    match target {
        Target::Wram => {
            for (i, byte) in data.iter().enumerate() {
                bus.write_byte(destination.wrapping_add(i as u32), *byte);
            }
        }
        Target::Vram => {
            for (i, pair) in data.chunks(2).enumerate() {
                let value = u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]);
                bus.write_half_word(destination.wrapping_add(i as u32 * 2), value);
            }
        }
    }

    address.wrapping_sub(source) + size as u32
}
