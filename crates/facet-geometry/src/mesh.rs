//! Mesh buffers
//!
//! Output of the procedural generators, laid out for a vertex/index buffer upload:
//! - positions: packed 3 × f32 per vertex
//! - tangent frames: packed 4 × snorm16 quaternion per vertex
//! - indices: packed u16 per index
//!
//! All byte views are native-endian.

use facet_core::math::Vec3;
use facet_core::{Aabb, BoundingSphere, MAX_U16_INDEX};

use crate::{GeometryError, GeometryResult};

/// Bytes per position element
pub const POSITION_STRIDE: usize = 12;
/// Bytes per tangent-frame element
pub const TANGENT_STRIDE: usize = 8;
/// Bytes per index
pub const INDEX_STRIDE: usize = 2;

/// Narrow 32-bit indices to a 16-bit index buffer.
///
/// Fails with [`GeometryError::IndexOverflow`] on the first index above 65535.
pub fn narrow_indices(indices: &[u32]) -> GeometryResult<Vec<u16>> {
    indices
        .iter()
        .map(|&index| u16::try_from(index).map_err(|_| GeometryError::IndexOverflow { index }))
        .collect()
}

/// Triangle mesh with positions, normals, packed tangent frames and 16-bit indices
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffers {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tangents: Vec<[i16; 4]>,
    indices: Vec<u16>,
    bounds: Aabb,
}

impl MeshBuffers {
    /// Assemble mesh buffers, checking attribute lengths and index ranges
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        tangents: Vec<[i16; 4]>,
        indices: Vec<u16>,
    ) -> GeometryResult<Self> {
        let vertex_count = positions.len();
        check_length("normals", vertex_count, normals.len())?;
        check_length("tangents", vertex_count, tangents.len())?;
        if indices.len() % 3 != 0 {
            return Err(GeometryError::InvalidParameter(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if vertex_count as u64 > MAX_U16_INDEX as u64 + 1 {
            return Err(GeometryError::IndexOverflow {
                index: (vertex_count - 1) as u32,
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::IndexOutOfRange {
                index: index as u32,
                vertex_count,
            });
        }

        let bounds = Aabb::from_points(&positions);
        Ok(Self {
            positions,
            normals,
            tangents,
            indices,
            bounds,
        })
    }

    /// Assemble mesh buffers from 32-bit indices, narrowing them to 16 bits
    pub fn from_u32_indices(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        tangents: Vec<[i16; 4]>,
        indices: &[u32],
    ) -> GeometryResult<Self> {
        Self::new(positions, normals, tangents, narrow_indices(indices)?)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Tangent frames as snorm16 quaternions (x, y, z, w)
    pub fn tangents(&self) -> &[[i16; 4]] {
        &self.tangents
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Iterate over index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::from_aabb(&self.bounds)
    }

    /// Positions as raw bytes, `vertex_count * 12` long
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Tangent frames as raw bytes, `vertex_count * 8` long
    pub fn tangent_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tangents)
    }

    /// Indices as raw bytes, `index_count * 2` long
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

fn check_length(name: &'static str, expected: usize, actual: usize) -> GeometryResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(GeometryError::AttributeLength {
            name,
            expected,
            actual,
        })
    }
}
