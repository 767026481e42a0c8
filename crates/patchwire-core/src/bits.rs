//! Sub-byte field packing.
//!
//! Fields are listed most-significant first. The shift of each field is the sum
//! of the widths that follow it, so `[3, 1, 3]` describes bits `6..4`, `3` and
//! `2..0` of a 7-bit data byte.

use smallvec::SmallVec;

/// Field values of one unpacked byte.
pub type Fields = SmallVec<[u8; 4]>;

#[inline]
fn mask(width: u8) -> u8 {
    if width >= 8 {
        0xFF
    } else {
        (1u8 << width) - 1
    }
}

/// Split `byte` into fields of the given widths (MSB first).
pub fn unpack_fields(byte: u8, widths: &[u8]) -> Fields {
    let mut shift: u32 = widths.iter().map(|&w| w as u32).sum();
    widths
        .iter()
        .map(|&w| {
            shift -= w as u32;
            (byte >> shift) & mask(w)
        })
        .collect()
}

/// Compose fields into one byte. Values wider than their field are masked.
pub fn pack_fields(values: &[u8], widths: &[u8]) -> u8 {
    debug_assert_eq!(values.len(), widths.len());
    let mut shift: u32 = widths.iter().map(|&w| w as u32).sum();
    let mut byte = 0u8;
    for (&v, &w) in values.iter().zip(widths) {
        shift -= w as u32;
        byte |= (v & mask(w)) << shift;
    }
    byte
}

/// Split a value into two data bytes of `low_bits` each, MSB first.
#[inline]
pub fn split_value(value: u16, low_bits: u8) -> [u8; 2] {
    let m = (1u16 << low_bits) - 1;
    [((value >> low_bits) & m) as u8, (value & m) as u8]
}

/// Join two data bytes of `low_bits` each, MSB first.
#[inline]
pub fn join_value(msb: u8, lsb: u8, low_bits: u8) -> u16 {
    let m = (1u16 << low_bits) - 1;
    ((msb as u16 & m) << low_bits) | (lsb as u16 & m)
}
