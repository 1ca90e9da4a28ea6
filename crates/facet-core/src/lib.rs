//! # Facet Core
//!
//! Foundation library shared by the Facet crates.
//!
//! This crate provides:
//! - **Math**: glam re-exports plus bounding volumes for generated meshes
//! - **Packing**: scalar encodings used by vertex attribute buffers
//!   (IEEE half floats and 16-bit signed normalized integers)

pub mod math;
pub mod packing;

pub use math::{Aabb, BoundingSphere};
pub use packing::{f16_bits_to_f32, f32_to_f16_bits, f32_to_snorm16, snorm16_to_f32};

/// Largest value a 16-bit index buffer can address
pub const MAX_U16_INDEX: u32 = u16::MAX as u32;

/// Epsilon used when comparing generated geometry
pub const GEOMETRY_EPSILON: f32 = 1.0e-5;

/// Returns true when two floats are within [`GEOMETRY_EPSILON`] of each other
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= GEOMETRY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_index() {
        assert_eq!(MAX_U16_INDEX, 65535);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(1.0, 1.0 + 1.0e-6));
        assert!(!approx_eq(1.0, 1.001));
    }
}
