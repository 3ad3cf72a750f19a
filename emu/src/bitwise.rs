use std::mem::size_of;
use std::ops::RangeInclusive;

/// Contains some helper methods to manipulate bits,
/// the index (`bit_idx`) is supposed to be from lsb to msb (right to left).
pub trait Bits: Copy + Sized {
    const BITS_COUNT: u8;

    fn is_bit_on(&self, bit_idx: u8) -> bool;

    fn is_bit_off(&self, bit_idx: u8) -> bool {
        !self.is_bit_on(bit_idx)
    }

    fn set_bit_on(&mut self, bit_idx: u8);

    fn set_bit_off(&mut self, bit_idx: u8);

    /// Switches from 1 to 0, or conversely from 0 to 1
    fn toggle_bit(&mut self, bit_idx: u8) {
        if self.is_bit_on(bit_idx) {
            self.set_bit_off(bit_idx);
        } else {
            self.set_bit_on(bit_idx);
        }
    }

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        if value {
            self.set_bit_on(bit_idx);
        } else {
            self.set_bit_off(bit_idx);
        }
    }

    fn get_bit(&self, bit_idx: u8) -> bool {
        self.is_bit_on(bit_idx)
    }

    /// Returns the bits in `bits_range` moved down to position 0.
    fn get_bits(&self, bits_range: RangeInclusive<u8>) -> Self;

    /// Checks if every bit in the range is set to 1.
    fn are_bits_on(&self, bits_range: RangeInclusive<u8>) -> bool {
        bits_range.into_iter().all(|bit_idx| self.is_bit_on(bit_idx))
    }

    fn get_byte(&self, byte_nth: u8) -> u8;

    fn set_byte(&mut self, byte_nth: u8, value: u8);

    /// Returns a sign-extended copy of the value.
    /// `number_of_bits` is the width of the two's complement value stored
    /// in the low bits.
    fn sign_extended(&self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($($t:ty => $signed:ty),* $(,)?) => {
        $(
            impl Bits for $t {
                const BITS_COUNT: u8 = (size_of::<$t>() * 8) as u8;

                fn is_bit_on(&self, bit_idx: u8) -> bool {
                    debug_assert!(bit_idx < Self::BITS_COUNT);
                    (*self >> bit_idx) & 1 == 1
                }

                fn set_bit_on(&mut self, bit_idx: u8) {
                    debug_assert!(bit_idx < Self::BITS_COUNT);
                    *self |= 1 << bit_idx;
                }

                fn set_bit_off(&mut self, bit_idx: u8) {
                    debug_assert!(bit_idx < Self::BITS_COUNT);
                    *self &= !(1 << bit_idx);
                }

                fn get_bits(&self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let length = bits_range.len() as u32;
                    debug_assert!(u32::from(start) + length <= u32::from(Self::BITS_COUNT));

                    if length >= u32::from(Self::BITS_COUNT) {
                        return *self;
                    }

                    let mask: Self = (1 << length) - 1;
                    (*self >> start) & mask
                }

                fn get_byte(&self, byte_nth: u8) -> u8 {
                    debug_assert!(byte_nth < (size_of::<$t>() as u8));
                    (*self >> (u32::from(byte_nth) * 8)) as u8
                }

                fn set_byte(&mut self, byte_nth: u8, value: u8) {
                    debug_assert!(byte_nth < (size_of::<$t>() as u8));
                    let shift = u32::from(byte_nth) * 8;
                    let mask: Self = !((0xFF as Self) << shift);
                    *self = (*self & mask) | ((value as Self) << shift);
                }

                fn sign_extended(&self, number_of_bits: u8) -> Self {
                    debug_assert!(number_of_bits > 0 && number_of_bits <= Self::BITS_COUNT);
                    let unused = Self::BITS_COUNT - number_of_bits;
                    (((*self << unused) as $signed) >> unused) as Self
                }
            }
        )*
    };
}

impl_bits!(u8 => i8, u16 => i16, u32 => i32, u64 => i64, u128 => i128);
