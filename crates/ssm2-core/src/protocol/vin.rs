//! Vehicle identification number helpers.

use byteorder::{BigEndian, ByteOrder};

use super::constants::VIN_LENGTH;

/// Last position (inclusive) where letters are allowed.
const LAST_LETTER_POSITION: usize = 10;

/// Compute the VIN start address from the 3-byte pointer field.
pub fn vin_start_address(pointer: &[u8; 3]) -> u32 {
    BigEndian::read_u24(pointer)
}

/// Addresses of the 17 VIN characters starting at `start`.
pub fn vin_addresses(start: u32) -> Vec<u32> {
    (0..VIN_LENGTH as u32).map(|k| start + k).collect()
}

/// Check the character set of a VIN.
///
/// Digits are allowed everywhere. Uppercase letters except I, O and Q are
/// allowed in positions 0..=10 only.
pub fn validate_vin(vin: &[u8]) -> bool {
    if vin.len() < VIN_LENGTH {
        return false;
    }
    vin.iter().take(VIN_LENGTH).enumerate().all(|(pos, &c)| {
        c.is_ascii_digit()
            || (pos <= LAST_LETTER_POSITION
                && c.is_ascii_uppercase()
                && !matches!(c, b'I' | b'O' | b'Q'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_vin() {
        assert!(validate_vin(b"JF1GD716X5G123456"));
        assert!(validate_vin(b"12345678901234567"));
    }

    #[test]
    fn test_letter_after_position_10() {
        assert!(!validate_vin(b"JF1GD716X5GA23456"));
        assert!(!validate_vin(b"JF1GD716X5G12345Z"));
    }

    #[test]
    fn test_forbidden_letters() {
        assert!(!validate_vin(b"QF1GD716X5G123456"));
        assert!(!validate_vin(b"JF1GD7I6X5G123456"));
        assert!(!validate_vin(b"JF1GD716X5O123456"));
    }

    #[test]
    fn test_lowercase_and_short() {
        assert!(!validate_vin(b"jf1GD716X5G123456"));
        assert!(!validate_vin(b"JF1GD716X5G"));
    }

    #[test]
    fn test_start_address() {
        assert_eq!(vin_start_address(&[0x01, 0x02, 0x03]), 0x010203);
        let addrs = vin_addresses(0x0100FE);
        assert_eq!(addrs.len(), 17);
        assert_eq!(addrs[0], 0x0100FE);
        assert_eq!(addrs[16], 0x01010E);
    }
}
