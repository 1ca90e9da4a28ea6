//! Surface orientation
//!
//! Computes one tangent frame per vertex and packs it into a quaternion, the
//! representation shaders expect for normal mapping and lighting.
//!
//! The builder picks a strategy from the attributes it is given:
//! - normals + tangents: frame from the normal and the orthogonalized tangent
//! - normals + uvs + positions + triangles: tangents derived from the UV mapping
//! - normals only: an arbitrary tangent perpendicular to each normal
//! - positions + triangles: smooth normals are computed first
//!
//! The sign of a packed quaternion stores the bitangent handedness: `w < 0`
//! means the frame is reflected.

use facet_core::math::{Mat3, Quat, Vec2, Vec3, Vec4};
use facet_core::packing::{f32_to_f16_bits, f32_to_snorm16, SNORM16_MAX};

use crate::{GeometryError, GeometryResult};

/// Smallest |w| a packed frame may have, so its sign survives snorm16 storage
pub const TANGENT_FRAME_BIAS: f32 = 1.0 / SNORM16_MAX;

/// Pack a tangent frame into a quaternion.
///
/// `tangent` and `normal` must be orthonormal. The bitangent only decides
/// handedness: a frame where `tangent × normal` points along the bitangent is
/// reflected and packs with negative `w`.
pub fn pack_tangent_frame(tangent: Vec3, bitangent: Vec3, normal: Vec3) -> Quat {
    let rotation = Mat3::from_cols(tangent, normal.cross(tangent), normal);
    let mut q = Quat::from_mat3(&rotation).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    if q.w < TANGENT_FRAME_BIAS {
        let factor = (1.0 - TANGENT_FRAME_BIAS * TANGENT_FRAME_BIAS).sqrt();
        q = Quat::from_xyzw(q.x * factor, q.y * factor, q.z * factor, TANGENT_FRAME_BIAS);
    }
    if tangent.cross(normal).dot(bitangent) > 0.0 {
        q = -q;
    }
    q
}

/// Unpack a quaternion produced by [`pack_tangent_frame`] into (tangent, bitangent, normal).
pub fn unpack_tangent_frame(q: Quat) -> (Vec3, Vec3, Vec3) {
    let tangent = q * Vec3::X;
    let normal = q * Vec3::Z;
    let handedness = if q.w < 0.0 { -1.0 } else { 1.0 };
    (tangent, normal.cross(tangent) * handedness, normal)
}

enum TriangleSource<'a> {
    U16(&'a [[u16; 3]]),
    U32(&'a [[u32; 3]]),
}

/// Builder collecting vertex attributes for [`SurfaceOrientation`]
#[derive(Default)]
pub struct SurfaceOrientationBuilder<'a> {
    vertex_count: Option<usize>,
    normals: Option<&'a [Vec3]>,
    tangents: Option<&'a [Vec4]>,
    uvs: Option<&'a [Vec2]>,
    positions: Option<&'a [Vec3]>,
    triangle_count: Option<usize>,
    triangles: Option<TriangleSource<'a>>,
}

impl<'a> SurfaceOrientationBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices to process. Defaults to the length of the normals,
    /// or of the positions when no normals are given.
    pub fn vertex_count(mut self, count: usize) -> Self {
        self.vertex_count = Some(count);
        self
    }

    pub fn normals(mut self, normals: &'a [Vec3]) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Tangents with handedness in `w` (glTF convention)
    pub fn tangents(mut self, tangents: &'a [Vec4]) -> Self {
        self.tangents = Some(tangents);
        self
    }

    pub fn uvs(mut self, uvs: &'a [Vec2]) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn positions(mut self, positions: &'a [Vec3]) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Number of triangles to read. Defaults to the length of the triangle list.
    pub fn triangle_count(mut self, count: usize) -> Self {
        self.triangle_count = Some(count);
        self
    }

    pub fn triangles_u16(mut self, triangles: &'a [[u16; 3]]) -> Self {
        self.triangles = Some(TriangleSource::U16(triangles));
        self
    }

    pub fn triangles_u32(mut self, triangles: &'a [[u32; 3]]) -> Self {
        self.triangles = Some(TriangleSource::U32(triangles));
        self
    }

    /// Compute the tangent frames
    pub fn build(self) -> GeometryResult<SurfaceOrientation> {
        let vertex_count = self
            .vertex_count
            .or(self.normals.map(<[Vec3]>::len))
            .or(self.positions.map(<[Vec3]>::len))
            .ok_or(GeometryError::MissingAttribute("normals"))?;

        let normals = self.normals.map(|n| prefix("normals", n, vertex_count)).transpose()?;
        let tangents = self.tangents.map(|t| prefix("tangents", t, vertex_count)).transpose()?;
        let uvs = self.uvs.map(|u| prefix("uvs", u, vertex_count)).transpose()?;
        let positions = self
            .positions
            .map(|p| prefix("positions", p, vertex_count))
            .transpose()?;
        let triangles = self.resolve_triangles(vertex_count)?;

        let computed_normals;
        let normals = match (normals, positions, triangles.as_deref()) {
            (Some(normals), _, _) => normals,
            (None, Some(positions), Some(triangles)) => {
                computed_normals = compute_normals(positions, triangles);
                computed_normals.as_slice()
            }
            _ => return Err(GeometryError::MissingAttribute("normals")),
        };

        let quats = match (tangents, uvs, positions, triangles.as_deref()) {
            (Some(tangents), _, _, _) => quats_from_tangents(normals, tangents),
            (None, Some(uvs), Some(positions), Some(triangles)) => {
                quats_from_uvs(normals, uvs, positions, triangles)
            }
            (None, Some(_), _, _) => {
                log::warn!("UVs ignored: tangent generation needs positions and triangles");
                quats_from_normals(normals)
            }
            _ => quats_from_normals(normals),
        };

        log::debug!("Computed {} tangent frames", quats.len());
        Ok(SurfaceOrientation { quats })
    }

    fn resolve_triangles(&self, vertex_count: usize) -> GeometryResult<Option<Vec<[u32; 3]>>> {
        let Some(source) = &self.triangles else {
            return Ok(None);
        };
        let triangles: Vec<[u32; 3]> = match source {
            TriangleSource::U16(tris) => {
                let count = self.triangle_count.unwrap_or(tris.len());
                prefix("triangles", tris, count)?
                    .iter()
                    .map(|t| t.map(u32::from))
                    .collect()
            }
            TriangleSource::U32(tris) => {
                let count = self.triangle_count.unwrap_or(tris.len());
                prefix("triangles", tris, count)?.to_vec()
            }
        };

        if let Some(&index) = triangles.iter().flatten().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::IndexOutOfRange { index, vertex_count });
        }
        Ok(Some(triangles))
    }
}

fn prefix<'s, T>(name: &'static str, items: &'s [T], count: usize) -> GeometryResult<&'s [T]> {
    items.get(..count).ok_or(GeometryError::AttributeLength {
        name,
        expected: count,
        actual: items.len(),
    })
}

fn unit_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

/// Gram-Schmidt: the part of `tangent` perpendicular to `normal`, or any perpendicular
/// vector when the tangent is degenerate.
fn orthogonal_tangent(normal: Vec3, tangent: Vec3) -> Vec3 {
    (tangent - normal * normal.dot(tangent))
        .try_normalize()
        .unwrap_or_else(|| normal.any_orthonormal_vector())
}

fn compute_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c] in triangles {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        // Unnormalized face normal, so larger faces weigh more.
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals.into_iter().map(|n| unit_or(n, Vec3::Z)).collect()
}

fn quats_from_normals(normals: &[Vec3]) -> Vec<Quat> {
    normals
        .iter()
        .map(|&n| {
            let normal = unit_or(n, Vec3::Z);
            let tangent = normal.any_orthonormal_vector();
            pack_tangent_frame(tangent, normal.cross(tangent), normal)
        })
        .collect()
}

fn quats_from_tangents(normals: &[Vec3], tangents: &[Vec4]) -> Vec<Quat> {
    normals
        .iter()
        .zip(tangents)
        .map(|(&n, t)| {
            let normal = unit_or(n, Vec3::Z);
            let tangent = orthogonal_tangent(normal, t.truncate());
            let handedness = if t.w < 0.0 { -1.0 } else { 1.0 };
            pack_tangent_frame(tangent, normal.cross(tangent) * handedness, normal)
        })
        .collect()
}

fn quats_from_uvs(
    normals: &[Vec3],
    uvs: &[Vec2],
    positions: &[Vec3],
    triangles: &[[u32; 3]],
) -> Vec<Quat> {
    let mut tangents = vec![Vec3::ZERO; normals.len()];
    let mut bitangents = vec![Vec3::ZERO; normals.len()];

    for &[a, b, c] in triangles {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        let edge1 = positions[b] - positions[a];
        let edge2 = positions[c] - positions[a];
        let duv1 = uvs[b] - uvs[a];
        let duv2 = uvs[c] - uvs[a];

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let sdir = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let tdir = (edge2 * duv1.x - edge1 * duv2.x) * r;
        for vertex in [a, b, c] {
            tangents[vertex] += sdir;
            bitangents[vertex] += tdir;
        }
    }

    normals
        .iter()
        .zip(tangents.iter().zip(&bitangents))
        .map(|(&n, (&t, &b))| {
            let normal = unit_or(n, Vec3::Z);
            let tangent = orthogonal_tangent(normal, t);
            let handedness = if normal.cross(tangent).dot(b) < 0.0 { -1.0 } else { 1.0 };
            pack_tangent_frame(tangent, normal.cross(tangent) * handedness, normal)
        })
        .collect()
}

/// Per-vertex tangent frames packed as quaternions
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceOrientation {
    quats: Vec<Quat>,
}

impl SurfaceOrientation {
    pub fn builder<'a>() -> SurfaceOrientationBuilder<'a> {
        SurfaceOrientationBuilder::new()
    }

    pub fn vertex_count(&self) -> usize {
        self.quats.len()
    }

    pub fn quats(&self) -> &[Quat] {
        &self.quats
    }

    pub fn quats_as_float(&self) -> Vec<[f32; 4]> {
        self.quats.iter().map(|q| q.to_array()).collect()
    }

    /// Quaternions as IEEE binary16 bit patterns
    pub fn quats_as_half(&self) -> Vec<[u16; 4]> {
        self.quats
            .iter()
            .map(|q| q.to_array().map(f32_to_f16_bits))
            .collect()
    }

    /// Quaternions as signed normalized 16-bit integers
    pub fn quats_as_short(&self) -> Vec<[i16; 4]> {
        self.quats
            .iter()
            .map(|q| q.to_array().map(f32_to_snorm16))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_core::packing::f16_bits_to_f32;

    const EPS: f32 = 1.0e-4;

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.distance(expected) < EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn awkward_normals() -> Vec<Vec3> {
        vec![
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::new(1.0, -2.0, 0.5).normalize(),
            Vec3::new(-0.3, 0.1, -0.9).normalize(),
        ]
    }

    #[test]
    fn test_normals_only() {
        let normals = awkward_normals();
        let orientation = SurfaceOrientation::builder().normals(&normals).build().unwrap();
        assert_eq!(orientation.vertex_count(), normals.len());

        for (q, &n) in orientation.quats().iter().zip(&normals) {
            let (t, b, decoded) = unpack_tangent_frame(*q);
            assert_close(decoded, n);
            assert!(t.dot(n).abs() < EPS);
            assert_close(b, n.cross(t));
        }
    }

    #[test]
    fn test_w_never_zero_in_short_storage() {
        let normals = awkward_normals();
        let orientation = SurfaceOrientation::builder().normals(&normals).build().unwrap();
        for packed in orientation.quats_as_short() {
            assert_ne!(packed[3], 0);
        }
    }

    #[test]
    fn test_tangents_with_handedness() {
        let normals = [Vec3::Z, Vec3::Z];
        let tangents = [Vec4::new(1.0, 0.0, 0.3, 1.0), Vec4::new(1.0, 0.0, 0.0, -1.0)];
        let orientation = SurfaceOrientation::builder()
            .normals(&normals)
            .tangents(&tangents)
            .build()
            .unwrap();

        let (t0, b0, n0) = unpack_tangent_frame(orientation.quats()[0]);
        assert_close(t0, Vec3::X);
        assert_close(b0, Vec3::Y);
        assert_close(n0, Vec3::Z);

        let (t1, b1, _) = unpack_tangent_frame(orientation.quats()[1]);
        assert_close(t1, Vec3::X);
        assert_close(b1, Vec3::NEG_Y);
        assert!(orientation.quats()[1].w < 0.0);
    }

    fn unit_quad() -> ([Vec3; 4], [Vec2; 4], [[u16; 3]; 2]) {
        (
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            [[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_uv_derived_tangents() {
        let (positions, uvs, triangles) = unit_quad();
        let normals = [Vec3::Z; 4];
        let orientation = SurfaceOrientation::builder()
            .normals(&normals)
            .uvs(&uvs)
            .positions(&positions)
            .triangles_u16(&triangles)
            .build()
            .unwrap();

        for q in orientation.quats() {
            let (t, b, n) = unpack_tangent_frame(*q);
            assert_close(t, Vec3::X);
            assert_close(b, Vec3::Y);
            assert_close(n, Vec3::Z);
        }
    }

    #[test]
    fn test_mirrored_uvs_are_reflected() {
        let (positions, mut uvs, triangles) = unit_quad();
        for uv in &mut uvs {
            uv.x = 1.0 - uv.x;
        }
        let normals = [Vec3::Z; 4];
        let orientation = SurfaceOrientation::builder()
            .normals(&normals)
            .uvs(&uvs)
            .positions(&positions)
            .triangles_u16(&triangles)
            .build()
            .unwrap();

        for q in orientation.quats() {
            let (t, b, _) = unpack_tangent_frame(*q);
            assert_close(t, Vec3::NEG_X);
            assert_close(b, Vec3::Y);
            assert!(q.w < 0.0);
        }
    }

    #[test]
    fn test_normals_computed_from_positions() {
        let (positions, _, triangles) = unit_quad();
        let triangles: Vec<[u32; 3]> = triangles.iter().map(|t| t.map(u32::from)).collect();
        let orientation = SurfaceOrientation::builder()
            .positions(&positions)
            .triangles_u32(&triangles)
            .build()
            .unwrap();

        assert_eq!(orientation.vertex_count(), 4);
        for q in orientation.quats() {
            let (_, _, n) = unpack_tangent_frame(*q);
            assert_close(n, Vec3::Z);
        }
    }

    #[test]
    fn test_vertex_and_triangle_counts_take_prefixes() {
        let (positions, _, triangles) = unit_quad();
        let normals = [Vec3::Z; 4];
        let orientation = SurfaceOrientation::builder()
            .vertex_count(3)
            .normals(&normals)
            .positions(&positions)
            .triangle_count(1)
            .triangles_u16(&triangles)
            .build()
            .unwrap();
        assert_eq!(orientation.vertex_count(), 3);
    }

    #[test]
    fn test_missing_normals() {
        let result = SurfaceOrientation::builder().build();
        assert!(matches!(result, Err(GeometryError::MissingAttribute("normals"))));

        let positions = [Vec3::ZERO; 3];
        let result = SurfaceOrientation::builder().positions(&positions).build();
        assert!(matches!(result, Err(GeometryError::MissingAttribute("normals"))));
    }

    #[test]
    fn test_short_attribute() {
        let normals = [Vec3::Z; 4];
        let tangents = [Vec4::X; 2];
        let result = SurfaceOrientation::builder()
            .normals(&normals)
            .tangents(&tangents)
            .build();
        assert!(matches!(
            result,
            Err(GeometryError::AttributeLength { name: "tangents", expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_triangle_index_out_of_range() {
        let positions = [Vec3::ZERO; 3];
        let triangles = [[0u16, 1, 5]];
        let result = SurfaceOrientation::builder()
            .positions(&positions)
            .triangles_u16(&triangles)
            .build();
        assert!(matches!(
            result,
            Err(GeometryError::IndexOutOfRange { index: 5, vertex_count: 3 })
        ));
    }

    #[test]
    fn test_packed_formats_agree() {
        let normals = awkward_normals();
        let orientation = SurfaceOrientation::builder().normals(&normals).build().unwrap();
        let floats = orientation.quats_as_float();
        let halves = orientation.quats_as_half();
        let shorts = orientation.quats_as_short();

        for ((f, h), s) in floats.iter().zip(&halves).zip(&shorts) {
            for i in 0..4 {
                assert!((f16_bits_to_f32(h[i]) - f[i]).abs() < 1.0e-3);
                assert!((s[i] as f32 / SNORM16_MAX - f[i]).abs() < 1.0e-4);
            }
        }
    }
}
