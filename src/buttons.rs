//! Translation between the two button encodings used by mouse events.
//!
//! `MouseEvent::buttons` is a bitmask of every button currently held
//! (bit 0 primary, bit 1 secondary, bit 2 middle, bits 3/4 the side
//! buttons). `MouseEvent::button` is the index of the single button that
//! changed (0 primary, 1 middle, 2 secondary, 3/4 side buttons). Note that
//! middle and secondary swap places between the two.

/// Primary (usually left) button index.
pub const PRIMARY: u8 = 0;
/// Middle button index.
pub const MIDDLE: u8 = 1;
/// Secondary (usually right) button index.
pub const SECONDARY: u8 = 2;

/// Map a bitmask with exactly one recognised bit set to a button index.
///
/// Returns `None` for an empty mask, a mask with several bits set, or a bit
/// outside the five known buttons.
pub fn from_buttons(mask: u16) -> Option<u8> {
    match mask {
        1 => Some(0),
        2 => Some(2),
        4 => Some(1),
        8 => Some(3),
        16 => Some(4),
        _ => None,
    }
}

/// Map a button index to its single-bit mask.
pub fn to_buttons(index: u8) -> Option<u16> {
    match index {
        0 => Some(1),
        1 => Some(4),
        2 => Some(2),
        3 => Some(8),
        4 => Some(16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for i in 0..=4u8 {
            let mask = to_buttons(i).unwrap();
            assert_eq!(from_buttons(mask), Some(i));
        }
    }

    #[test]
    fn mask_roundtrip() {
        for mask in [1u16, 2, 4, 8, 16] {
            let index = from_buttons(mask).unwrap();
            assert_eq!(to_buttons(index), Some(mask));
        }
    }

    #[test]
    fn middle_and_secondary_are_swapped() {
        assert_eq!(to_buttons(MIDDLE), Some(4));
        assert_eq!(to_buttons(SECONDARY), Some(2));
    }

    #[test]
    fn unmapped_inputs() {
        assert_eq!(from_buttons(0), None);
        assert_eq!(from_buttons(3), None);
        assert_eq!(from_buttons(32), None);
        assert_eq!(to_buttons(5), None);
        assert_eq!(to_buttons(u8::MAX), None);
    }
}
