//! Scalar packing
//!
//! Encodings used by packed vertex attributes. Tangent frames are stored either as
//! IEEE 754 binary16 ("half") or as 16-bit signed normalized integers.

/// Largest magnitude of a signed normalized 16-bit integer
pub const SNORM16_MAX: f32 = i16::MAX as f32;

/// Convert an `f32` to IEEE 754 binary16 bits, rounding to nearest even.
///
/// Values beyond the half range become infinity, values below the smallest
/// subnormal flush to a signed zero. NaN payloads keep their top bits and stay NaN.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        let quiet = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | quiet | (mantissa >> 13) as u16;
    }

    let unbiased = exponent - 127;
    if unbiased > 15 {
        return sign | 0x7c00;
    }

    if unbiased >= -14 {
        let mut half = (((unbiased + 15) as u32) << 10) | (mantissa >> 13);
        let remainder = mantissa & 0x1fff;
        // A carry out of the mantissa bumps the exponent, which is the correct result.
        if remainder > 0x1000 || (remainder == 0x1000 && half & 1 != 0) {
            half += 1;
        }
        return sign | half as u16;
    }

    if unbiased < -25 {
        return sign;
    }

    // Subnormal half: shift the mantissa, implicit bit included, into place.
    let full = mantissa | 0x0080_0000;
    let shift = (-1 - unbiased) as u32;
    let halfway = 1u32 << (shift - 1);
    let remainder = full & ((1u32 << shift) - 1);
    let mut half = full >> shift;
    if remainder > halfway || (remainder == halfway && half & 1 != 0) {
        half += 1;
    }
    sign | half as u16
}

/// Convert IEEE 754 binary16 bits back to an `f32`. Exact for every input.
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = ((bits & 0x8000) as u32) << 16;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x03ff) as u32;

    match exponent {
        0 => {
            let magnitude = mantissa as f32 / 16_777_216.0;
            if sign != 0 { -magnitude } else { magnitude }
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | (mantissa << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (mantissa << 13)),
    }
}

/// Encode a value in [-1, 1] as a signed normalized 16-bit integer.
///
/// Out-of-range values are clamped; NaN encodes as zero.
pub fn f32_to_snorm16(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * SNORM16_MAX).round() as i16
}

/// Decode a signed normalized 16-bit integer. `i16::MIN` maps to -1 like `-32767`.
pub fn snorm16_to_f32(value: i16) -> f32 {
    (value as f32 / SNORM16_MAX).max(-1.0)
}
