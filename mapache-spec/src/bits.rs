//! # Bitfield Codec
//!
//! Conversions between integers and fixed-width bit fields. Everything here is
//! a pure function; the assembler, decoder, and instruction semantics all go
//! through these helpers so that overflow is detected in exactly one place.

use std::fmt;

use crate::error::BitsError;

/// How a value is interpreted when it is packed into a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    Unsigned,
    /// Two's complement
    Signed,
}

/// A value held in exactly `width` bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bits {
    value: u64,
    width: u32,
}

impl Bits {
    /// Raw bit pattern (upper bits beyond `width` are always zero)
    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bit at position `i`, counting from the most significant bit
    #[inline]
    pub fn bit(&self, i: u32) -> u64 {
        debug_assert!(i < self.width);
        (self.value >> (self.width - 1 - i)) & 1
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.value, width = self.width as usize)
    }
}

/// Return an n-bit mask (e.g. `mask(3) == 0b111`)
#[inline]
pub const fn mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Pack `value` into a `width`-bit field
///
/// Unsigned packing rejects negative values and values needing more than
/// `width` bits. Signed packing accepts `[-2^(width-1), 2^(width-1) - 1]`.
pub fn int_to_bits(value: i64, width: u32, signedness: Signedness) -> Result<Bits, BitsError> {
    if width == 0 || width > 64 {
        return Err(BitsError::BadRange {
            upper: width,
            lower: 0,
        });
    }

    let fits = match signedness {
        Signedness::Unsigned => value >= 0 && (value as u64) <= mask(width),
        Signedness::Signed => {
            let half = 1i128 << (width - 1);
            (-half..half).contains(&(value as i128))
        }
    };

    if !fits {
        return Err(BitsError::Overflow {
            value,
            width,
            kind: match signedness {
                Signedness::Unsigned => "unsigned",
                Signedness::Signed => "signed",
            },
        });
    }

    Ok(Bits {
        value: (value as u64) & mask(width),
        width,
    })
}

/// Inverse of [`int_to_bits`]
pub fn bits_to_int(bits: &Bits, signedness: Signedness) -> i64 {
    match signedness {
        Signedness::Unsigned => bits.value as i64,
        Signedness::Signed => {
            let sign = 1u64 << (bits.width - 1);
            if bits.value & sign == 0 {
                bits.value as i64
            } else {
                (bits.value | !mask(bits.width)) as i64
            }
        }
    }
}

/// Mask out all but bits `upper..=lower`, optionally shifting them down to bit 0
pub fn bit_select(value: u64, upper: u32, lower: u32, shift: bool) -> Result<u64, BitsError> {
    if upper < lower || upper > 63 {
        return Err(BitsError::BadRange { upper, lower });
    }
    let selected = value & mask(upper + 1) & !mask(lower);
    Ok(if shift { selected >> lower } else { selected })
}

/// Sign extend a `bits`-wide value; the bits above `bits` must be zero
pub fn sign_extend(value: u64, bits: u32) -> Result<i64, BitsError> {
    if bits == 0 || bits > 64 {
        return Err(BitsError::BadRange {
            upper: bits,
            lower: 0,
        });
    }
    let upper = !mask(bits);
    if value & upper != 0 {
        return Err(BitsError::SignExtend { value, bits });
    }
    if value & (1u64 << (bits - 1)) == 0 {
        Ok(value as i64)
    } else {
        Ok((value | upper) as i64)
    }
}

/// Smallest multiple of `alignment` that is `>= addr`
///
/// # Panics
///
/// Panics if `alignment` is zero.
#[inline]
pub fn align(addr: u64, alignment: u64) -> u64 {
    addr.next_multiple_of(alignment)
}

/// Exact log base 2 of a power of two
pub fn log2(value: u64) -> Result<u32, BitsError> {
    if value == 0 || !value.is_power_of_two() {
        return Err(BitsError::NotPowerOfTwo(value));
    }
    Ok(value.trailing_zeros())
}

/// Parse a decimal (optionally signed) or `0x`-prefixed hexadecimal integer
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<i128>().ok()?
    };

    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

/// Parse a hexadecimal number with or without the `0x` prefix
pub fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitstring(value: i64, width: u32, signedness: Signedness) -> Option<String> {
        int_to_bits(value, width, signedness).ok().map(|b| b.to_string())
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(3), 0x7);
        assert_eq!(mask(32), 0xFFFF_FFFF);
        assert_eq!(mask(64), u64::MAX);
    }

    #[test]
    fn test_signed_one_bit() {
        assert_eq!(bitstring(1, 1, Signedness::Signed), None);
        assert_eq!(bitstring(0, 1, Signedness::Signed).as_deref(), Some("0"));
        assert_eq!(bitstring(-1, 1, Signedness::Signed).as_deref(), Some("1"));
        assert_eq!(bitstring(-2, 1, Signedness::Signed), None);
    }

    #[test]
    fn test_unsigned_small_widths() {
        assert_eq!(bitstring(1, 1, Signedness::Unsigned).as_deref(), Some("1"));
        assert_eq!(bitstring(-1, 1, Signedness::Unsigned), None);
        assert_eq!(bitstring(1, 2, Signedness::Unsigned).as_deref(), Some("01"));
        assert_eq!(bitstring(8, 3, Signedness::Unsigned), None);
        assert_eq!(bitstring(7, 3, Signedness::Unsigned).as_deref(), Some("111"));
        assert_eq!(bitstring(4, 3, Signedness::Unsigned).as_deref(), Some("100"));
    }

    #[test]
    fn test_signed_three_bits() {
        assert_eq!(bitstring(4, 3, Signedness::Signed), None);
        assert_eq!(bitstring(3, 3, Signedness::Signed).as_deref(), Some("011"));
        assert_eq!(bitstring(-1, 3, Signedness::Signed).as_deref(), Some("111"));
        assert_eq!(bitstring(-4, 3, Signedness::Signed).as_deref(), Some("100"));
        assert_eq!(bitstring(-5, 3, Signedness::Signed), None);
    }

    #[test]
    fn test_full_width() {
        let bits = int_to_bits(i64::MIN, 64, Signedness::Signed).unwrap();
        assert_eq!(bits_to_int(&bits, Signedness::Signed), i64::MIN);
        let bits = int_to_bits(i64::MAX, 64, Signedness::Unsigned).unwrap();
        assert_eq!(bits.value(), i64::MAX as u64);
    }

    #[test]
    fn test_zero_width_is_internal() {
        let err = int_to_bits(0, 0, Signedness::Unsigned).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_bit_msb_first() {
        let bits = int_to_bits(0b100, 3, Signedness::Unsigned).unwrap();
        assert_eq!(bits.bit(0), 1);
        assert_eq!(bits.bit(1), 0);
        assert_eq!(bits.bit(2), 0);
    }

    #[test]
    fn test_bit_select() {
        assert_eq!(bit_select(0b111111, 3, 1, false).unwrap(), 0b01110);
        assert_eq!(bit_select(0b111000, 3, 1, false).unwrap(), 0b01000);
        assert_eq!(bit_select(0b111111, 2, 2, false).unwrap(), 0b00100);
        assert_eq!(bit_select(0b111000, 3, 1, true).unwrap(), 0b0100);
        assert_eq!(bit_select(0b111111, 2, 2, true).unwrap(), 0b001);
        assert_eq!(bit_select(0x1234_5678, 31, 28, false).unwrap(), 0x1000_0000);
    }

    #[test]
    fn test_bit_select_bad_range() {
        assert!(matches!(
            bit_select(0, 1, 3, false),
            Err(BitsError::BadRange { upper: 1, lower: 3 })
        ));
        assert!(bit_select(0, 64, 0, false).is_err());
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0b1111, 4).unwrap(), -1);
        assert_eq!(sign_extend(0b1000, 4).unwrap(), -8);
        assert_eq!(sign_extend(0b0000, 4).unwrap(), 0);
        assert_eq!(sign_extend(0b0111, 4).unwrap(), 7);
        assert_eq!(sign_extend(0xFFFC, 16).unwrap(), -4);
        assert!(sign_extend(0b1_0000, 4).is_err());
    }

    #[test]
    fn test_align() {
        assert_eq!(align(0, 4), 0);
        assert_eq!(align(4, 4), 4);
        assert_eq!(align(5, 4), 8);
        assert_eq!(align(7, 4), 8);
        assert_eq!(align(9, 4), 12);
        assert_eq!(align(9, 2), 10);
        assert_eq!(align(9, 1), 9);
    }

    #[test]
    fn test_log2() {
        assert_eq!(log2(1).unwrap(), 0);
        assert_eq!(log2(2).unwrap(), 1);
        assert_eq!(log2(4).unwrap(), 2);
        assert!(log2(0).is_err());
        assert!(log2(6).is_err());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("10"), Some(10));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("-4"), Some(-4));
        assert_eq!(parse_int("0x10"), Some(16));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("12a"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x10"), Some(16));
        assert_eq!(parse_hex("10"), Some(16));
        assert_eq!(parse_hex("foobar"), None);
        assert_eq!(parse_hex(""), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_unsigned() -> impl Strategy<Value = (i64, u32)> {
        (1u32..=63).prop_flat_map(|width| (0i64..=(mask(width) as i64), Just(width)))
    }

    fn arb_signed() -> impl Strategy<Value = (i64, u32)> {
        (1u32..=63).prop_flat_map(|width| {
            let half = 1i64 << (width - 1);
            (-half..half, Just(width))
        })
    }

    proptest! {
        #[test]
        fn test_unsigned_roundtrip((value, width) in arb_unsigned()) {
            let bits = int_to_bits(value, width, Signedness::Unsigned).unwrap();
            prop_assert_eq!(bits_to_int(&bits, Signedness::Unsigned), value);
        }

        #[test]
        fn test_signed_roundtrip((value, width) in arb_signed()) {
            let bits = int_to_bits(value, width, Signedness::Signed).unwrap();
            prop_assert_eq!(bits_to_int(&bits, Signedness::Signed), value);
        }

        #[test]
        fn test_signed_out_of_range_rejected(width in 1u32..=62, excess in 0i64..1000) {
            let half = 1i64 << (width - 1);
            prop_assert!(int_to_bits(half + excess, width, Signedness::Signed).is_err());
            prop_assert!(int_to_bits(-half - 1 - excess, width, Signedness::Signed).is_err());
        }

        #[test]
        fn test_align_laws(addr in 0u64..(1 << 40), n in 1u64..4096) {
            let aligned = align(addr, n);
            prop_assert_eq!(align(aligned, n), aligned);
            prop_assert!(aligned >= addr);
            prop_assert_eq!(aligned == addr, addr % n == 0);
        }
    }
}
