//! # Facet Geometry
//!
//! Procedural geometry for the Facet toolkit.
//!
//! ## Features
//! - Octasphere generator: spheres, capsules and rounded boxes built from eight
//!   geodesic patches
//! - Great-circle interpolation between unit vectors
//! - Surface orientation: per-vertex tangent frames packed as quaternions
//! - GPU-ready mesh buffers with 16-bit indices

pub mod geodesic;
pub mod mesh;
pub mod octasphere;
pub mod surface_orientation;

pub use geodesic::{geodesic, geodesic_into};
pub use mesh::MeshBuffers;
pub use octasphere::{Octasphere, OctasphereConfig, MAX_SUBDIVISIONS};
pub use surface_orientation::{SurfaceOrientation, SurfaceOrientationBuilder};

use thiserror::Error;

/// Geometry errors
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Index overflow: index {index} exceeds the 16-bit range, reduce subdivision or split mesh")]
    IndexOverflow { index: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Attribute {name} has {actual} elements, expected {expected}")]
    AttributeLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Result type for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;
