//! Math system calls: Div, Sqrt, ArcTan and ArcTan2.
//!
//! Angles use the firmware's fixed point convention: a full turn is `0x10000`,
//! tangents are 1.14 signed fixed point.

/// Result of the `Div` call: quotient, remainder and absolute quotient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    pub quotient: i32,
    pub remainder: i32,
    pub absolute_quotient: u32,
}

/// Signed division truncating toward zero.
///
/// Dividing by zero gives a quotient of ±1 (the sign of the numerator) and
/// hands the numerator back as remainder. `i32::MIN / -1` saturates to
/// `i32::MIN` with remainder 0.
#[must_use]
pub const fn div(numerator: i32, denominator: i32) -> Division {
    let (quotient, remainder) = if denominator == 0 {
        (if numerator < 0 { -1 } else { 1 }, numerator)
    } else if numerator == i32::MIN && denominator == -1 {
        (i32::MIN, 0)
    } else {
        (numerator / denominator, numerator % denominator)
    };

    Division {
        quotient,
        remainder,
        absolute_quotient: quotient.unsigned_abs(),
    }
}

#[must_use]
pub const fn sqrt(value: u32) -> u16 {
    value.isqrt() as u16
}

/// Arc tangent of a 1.14 fixed point value, in `-0x4000..=0x4000`.
///
/// Evaluated with the same odd polynomial the firmware uses so results
/// match bit for bit.
#[must_use]
pub fn arctan(tangent: i32) -> i32 {
    const COEFFICIENTS: [i64; 6] = [0x091C, 0x0FB6, 0x16AA, 0x2081, 0x3651, 0xA2F9];

    let tangent = i64::from(tangent);
    let square = -((tangent * tangent) >> 14);

    let mut sum = ((0xA9 * square) >> 14) + 0x390;
    for coefficient in COEFFICIENTS {
        sum = ((sum * square) >> 14) + coefficient;
    }

    ((tangent * sum) >> 16) as i32
}

/// Angle of the vector (`x`, `y`), a full turn being `0x10000`.
#[must_use]
pub fn arctan2(x: i32, y: i32) -> u16 {
    // the polynomial is only accurate for |tangent| <= 1, the other octants
    // use the reciprocal
    let slope = |numerator: i32, denominator: i32| arctan((numerator << 14) / denominator);

    let angle = match (x, y) {
        (x, 0) if x >= 0 => 0,
        (_, 0) => 0x8000,
        (0, y) if y > 0 => 0x4000,
        (0, _) => 0xC000,
        (x, y) if x.abs() >= y.abs() => {
            let base = if x < 0 {
                0x8000
            } else if y < 0 {
                0x10000
            } else {
                0
            };
            base + slope(y, x)
        }
        (x, y) => {
            let base = if y > 0 { 0x4000 } else { 0xC000 };
            base - slope(x, y)
        }
    };

    angle as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn div_by_zero_keeps_the_numerator() {
        assert_eq!(
            div(7, 0),
            Division {
                quotient: 1,
                remainder: 7,
                absolute_quotient: 1
            }
        );
        assert_eq!(
            div(-7, 0),
            Division {
                quotient: -1,
                remainder: -7,
                absolute_quotient: 1
            }
        );
    }

    #[test]
    fn div_overflow_saturates() {
        assert_eq!(
            div(i32::MIN, -1),
            Division {
                quotient: i32::MIN,
                remainder: 0,
                absolute_quotient: 0x8000_0000
            }
        );
    }

    #[test]
    fn div_truncates_toward_zero() {
        assert_eq!(div(-7, 2).quotient, -3);
        assert_eq!(div(-7, 2).remainder, -1);
        assert_eq!(div(7, -2).quotient, -3);
        assert_eq!(div(7, -2).remainder, 1);
        assert_eq!(div(-7, 2).absolute_quotient, 3);
    }

    #[test]
    fn div_identity_holds_for_random_operands() {
        let mut rng = rand::thread_rng();

        for _ in 0..10_000 {
            let numerator: i32 = rng.r#gen();
            let denominator: i32 = rng.r#gen();
            if denominator == 0 || (numerator == i32::MIN && denominator == -1) {
                continue;
            }

            let result = div(numerator, denominator);

            assert_eq!(
                i64::from(result.quotient) * i64::from(denominator) + i64::from(result.remainder),
                i64::from(numerator)
            );
            assert!(result.remainder.unsigned_abs() < denominator.unsigned_abs());
            assert!(result.remainder == 0 || (result.remainder < 0) == (numerator < 0));
            assert_eq!(result.absolute_quotient, result.quotient.unsigned_abs());
        }
    }

    #[test]
    fn sqrt_rounds_down() {
        assert_eq!(sqrt(0), 0);
        assert_eq!(sqrt(15), 3);
        assert_eq!(sqrt(16), 4);
        assert_eq!(sqrt(u32::MAX), 0xFFFF);
    }

    #[test]
    fn arctan_of_known_tangents() {
        assert_eq!(arctan(0), 0);
        assert_eq!(arctan(0x4000), 0x2000);
        assert_eq!(arctan(-0x4000), -0x2000);
        assert_eq!(arctan(0x2000), 0x12E4);
    }

    #[test]
    fn arctan2_covers_every_quadrant() {
        let one = 1 << 14;

        assert_eq!(arctan2(100, 0), 0);
        assert_eq!(arctan2(0, 100), 0x4000);
        assert_eq!(arctan2(-100, 0), 0x8000);
        assert_eq!(arctan2(0, -100), 0xC000);

        assert_eq!(arctan2(one, one), 0x2000);
        assert_eq!(arctan2(-one, one), 0x6000);
        assert_eq!(arctan2(-one, -one), 0xA000);
        assert_eq!(arctan2(one, -one), 0xE000);
        assert_eq!(arctan2(one, one / 2), 0x12E4);
    }
}
