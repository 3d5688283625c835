//! Adjustment value codec.
//!
//! An adjustment occupies one byte, or two bytes when it has a high address.
//! The low-address byte holds the low byte of the value.

use byteorder::{ByteOrder, LittleEndian};

/// Raw value bounds of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentRange {
    pub min: u32,
    pub max: u32,
}

impl AdjustmentRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Check a raw value against the range.
    ///
    /// With `min > max` the range wraps: a value is rejected only if it lies
    /// strictly between `max` and `min`.
    pub fn accepts(&self, value: u32) -> bool {
        if self.min <= self.max {
            value >= self.min && value <= self.max
        } else {
            !(value < self.min && value > self.max)
        }
    }
}

/// Largest raw value that fits the adjustment's width.
pub fn width_limit(two_bytes: bool) -> u32 {
    if two_bytes { u16::MAX as u32 } else { u8::MAX as u32 }
}

/// Assemble a raw value from bytes read in address order (low, then high).
pub fn decode_adjustment(bytes: &[u8]) -> u32 {
    match bytes {
        [low] => *low as u32,
        [_, _] => LittleEndian::read_u16(bytes) as u32,
        _ => 0,
    }
}

/// Split a raw value into `(low, high)` bytes.
///
/// Returns `None` if the value does not fit the adjustment width.
pub fn encode_adjustment(value: u32, two_bytes: bool) -> Option<(u8, Option<u8>)> {
    if value > width_limit(two_bytes) {
        return None;
    }
    if two_bytes {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value as u16);
        Some((buf[0], Some(buf[1])))
    } else {
        Some((value as u8, None))
    }
}
