#[macro_export]
macro_rules! BIT {
    ( $x:expr ) => {
        (1u32 << ($x))
    };
}

#[macro_export]
macro_rules! BIT_MASK_LEN {
    ( $x:expr ) => {
        ($crate::BIT!($x) - 1)
    };
}

// bits range: BIT_RNG!(4, 8)  0b000111110000,  start from 4, end at 8
#[macro_export]
macro_rules! BIT_RNG {
    ( $s:expr, $e:expr ) => {
        ($crate::BIT_MASK_LEN!($e - $s + 1) << $s)
    };
}

#[macro_export]
macro_rules! BM_SET {
    ( $x:expr, $mask:expr ) => {
        $x |= $mask
    };
}

#[macro_export]
macro_rules! BM_CLR {
    ( $x:expr, $mask:expr ) => {
        $x &= !($mask)
    };
}

/// Returns `reg` with the `width`-bit field at `shift` replaced by `value`.
///
/// The old field is cleared before the new value is merged in, so a narrower
/// value never inherits stale high bits from a previous wider one. Bits of
/// `value` that do not fit in the field are dropped.
#[inline(always)]
pub const fn replace_field(reg: u32, shift: u32, width: u32, value: u32) -> u32 {
    let mask = crate::BIT_MASK_LEN!(width) << shift;
    let mut reg = reg;
    crate::BM_CLR!(reg, mask);
    crate::BM_SET!(reg, (value << shift) & mask);
    reg
}

/// Extracts the `width`-bit field at `shift`.
#[inline(always)]
pub const fn read_field(reg: u32, shift: u32, width: u32) -> u32 {
    (reg >> shift) & crate::BIT_MASK_LEN!(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_rng() {
        assert_eq!(BIT_RNG!(4, 8), 0b1_1111_0000);
        assert_eq!(BIT_RNG!(0, 1), 0b11);
    }

    #[test]
    fn test_bm_set_clr() {
        let mut val = 0b1010u32;
        BM_SET!(val, BIT!(0));
        assert_eq!(val, 0b1011);
        BM_CLR!(val, BIT!(3));
        assert_eq!(val, 0b0011);
    }

    #[test]
    fn test_replace_field_clears_stale_bits() {
        // 0xF down to 0x3 must not leave bits 2-3 behind
        let reg = replace_field(0, 4, 4, 0xF);
        assert_eq!(reg, 0xF0);
        assert_eq!(replace_field(reg, 4, 4, 0x3), 0x30);
    }

    #[test]
    fn test_replace_field_keeps_neighbours() {
        let reg = 0xFFFF_FFFF;
        assert_eq!(replace_field(reg, 30, 2, 0b01), 0x7FFF_FFFF);
        assert_eq!(replace_field(reg, 0, 1, 0), 0xFFFF_FFFE);
    }

    #[test]
    fn test_read_field() {
        assert_eq!(read_field(0x0000_0A00, 8, 4), 0xA);
        assert_eq!(read_field(0xC000_0000, 30, 2), 0b11);
    }
}
