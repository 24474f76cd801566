//! Bit and signal codec
//!
//! Pure helpers shared by every message decoder: byte combination, two's
//! complement interpretation and fixed-point scaling. The inverse encoders
//! are used to build frames carrying physical values.

use crate::types::DecodeError;
use byteorder::{BigEndian, ByteOrder};

/// Scale for 0.1-resolution fields (voltage, current, average current)
pub const DECI_SCALE: f64 = 10.0;

/// Scale for 0.5-resolution fields (state of charge)
pub const HALF_SCALE: f64 = 2.0;

/// Interpret a raw 16-bit value as two's complement
///
/// If bit 15 is set the result is `raw - 65536`, otherwise `raw`.
pub fn to_signed_16(raw: u16) -> i16 {
    if raw & 0x8000 != 0 {
        (raw as i32 - 0x1_0000) as i16
    } else {
        raw as i16
    }
}

/// Combine two bytes into a big-endian 16-bit value: `(high << 8) | low`
pub fn combine_be16(high: u8, low: u8) -> u16 {
    BigEndian::read_u16(&[high, low])
}

/// Read a big-endian signed 16-bit field starting at `offset`
pub fn read_be_i16(payload: &[u8], offset: usize) -> Option<i16> {
    let high = *payload.get(offset)?;
    let low = *payload.get(offset + 1)?;
    Some(to_signed_16(combine_be16(high, low)))
}

/// Fail with `ShortPayload` unless the payload holds at least `needed` bytes
pub fn require_len(payload: &[u8], needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        return Err(DecodeError::ShortPayload {
            needed,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Raw value at 0.1 resolution to its physical value
pub fn scale_deci(raw: i16) -> f64 {
    raw as f64 / DECI_SCALE
}

/// Raw value at 0.5 resolution to its physical value
pub fn scale_half(raw: u8) -> f64 {
    raw as f64 / HALF_SCALE
}

/// Physical value to a signed 0.1-resolution raw value (saturating)
pub fn encode_deci(value: f64) -> i16 {
    (value * DECI_SCALE).round() as i16
}

/// Physical value to an unsigned 0.5-resolution raw value (saturating)
pub fn encode_half(value: f64) -> u8 {
    (value * HALF_SCALE).round() as u8
}

/// Split a signed 16-bit raw value into big-endian bytes
pub fn split_be16(raw: i16) -> [u8; 2] {
    let mut buf = [0u8; 2];
    BigEndian::write_i16(&mut buf, raw);
    buf
}
