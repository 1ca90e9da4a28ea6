//! Octasphere
//!
//! Builds spheres, capsules and rounded boxes from one tessellated eighth of the
//! unit sphere. The patch is replicated into the eight octants by 90°-multiple
//! rotations, scaled by the corner radius and pushed outwards along the box axes.
//! For boxes, the gaps between patches are closed with quad strips along the
//! patch seams and one quad per box face.
//!
//! Vertices on patch seams are duplicated: patch `p` owns the contiguous range
//! `p * vertices_per_patch .. (p + 1) * vertices_per_patch`.

use std::f32::consts::{FRAC_PI_2, PI};

use facet_core::approx_eq;
use facet_core::math::{Quat, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geodesic::geodesic_into;
use crate::mesh::MeshBuffers;
use crate::surface_orientation::SurfaceOrientation;
use crate::{GeometryError, GeometryResult};

/// Highest subdivision level; the triangle count grows by 4 per level
pub const MAX_SUBDIVISIONS: u32 = 5;

/// Number of patches in a closed octasphere
pub const PATCH_COUNT: usize = 8;

/// Direction each patch is pushed along, indexed by patch
pub const OCTANT_SIGNS: [Vec3; PATCH_COUNT] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
];

const AXES: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

/// Tolerance when matching seam vertices between patches
const SEAM_EPSILON: f32 = 1.0e-4;

/// Clamp a requested subdivision level to `0..=MAX_SUBDIVISIONS`
pub fn clamp_subdivisions(level: u32) -> u32 {
    level.min(MAX_SUBDIVISIONS)
}

/// Vertices along each edge of a patch: `2^level + 1`
pub fn vertices_per_line(level: u32) -> usize {
    (1usize << clamp_subdivisions(level)) + 1
}

pub fn vertices_per_patch(level: u32) -> usize {
    let n = vertices_per_line(level);
    n * (n + 1) / 2
}

pub fn triangles_per_patch(level: u32) -> usize {
    let n = vertices_per_line(level);
    (n - 1) * (n - 1)
}

/// Octasphere parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctasphereConfig {
    /// Extent along X
    pub width: f32,
    /// Extent along Y
    pub height: f32,
    /// Extent along Z
    pub depth: f32,
    /// Corner radius
    pub radius: f32,
    /// Requested subdivision level, clamped to [`MAX_SUBDIVISIONS`]
    pub subdivisions: u32,
    /// Close the gaps between translated patches
    pub connect_patches: bool,
}

impl Default for OctasphereConfig {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            depth: 0.0,
            radius: 1.0,
            subdivisions: 3,
            connect_patches: true,
        }
    }
}

impl OctasphereConfig {
    pub fn sphere(radius: f32, subdivisions: u32) -> Self {
        Self {
            radius,
            subdivisions,
            ..Self::default()
        }
    }

    /// Capsule along Y with total height `height`
    pub fn capsule(radius: f32, height: f32, subdivisions: u32) -> Self {
        Self {
            height,
            radius,
            subdivisions,
            ..Self::default()
        }
    }

    pub fn rounded_box(width: f32, height: f32, depth: f32, radius: f32, subdivisions: u32) -> Self {
        Self {
            width,
            height,
            depth,
            radius,
            subdivisions,
            ..Self::default()
        }
    }

    /// Reject negative or non-finite extents
    pub fn validate(&self) -> GeometryResult<()> {
        let fields = [
            ("width", self.width),
            ("height", self.height),
            ("depth", self.depth),
            ("radius", self.radius),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(GeometryError::InvalidParameter(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Distance each patch moves along each axis: half the excess of the extent
    /// over the corner diameter
    pub fn translation(&self) -> Vec3 {
        let diameter = 2.0 * self.radius;
        Vec3::new(
            self.width.max(diameter) - diameter,
            self.height.max(diameter) - diameter,
            self.depth.max(diameter) - diameter,
        ) * 0.5
    }

    /// Subdivision level actually used
    pub fn level(&self) -> u32 {
        clamp_subdivisions(self.subdivisions)
    }
}

/// Octasphere mesh generator
#[derive(Debug, Clone, Default)]
pub struct Octasphere {
    config: OctasphereConfig,
}

impl Octasphere {
    pub fn new(config: OctasphereConfig) -> Self {
        Self { config }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.config.radius = radius;
        self
    }

    pub fn with_dimensions(mut self, width: f32, height: f32, depth: f32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self.config.depth = depth;
        self
    }

    pub fn with_subdivisions(mut self, subdivisions: u32) -> Self {
        self.config.subdivisions = subdivisions;
        self
    }

    pub fn connect_patches(mut self, connect: bool) -> Self {
        self.config.connect_patches = connect;
        self
    }

    pub fn config(&self) -> &OctasphereConfig {
        &self.config
    }

    /// Generate the mesh
    pub fn generate(&self) -> GeometryResult<MeshBuffers> {
        let config = &self.config;
        config.validate()?;

        let translation = config.translation();
        let radius = config.radius;
        let connect = config.connect_patches && is_gap(translation.max_element());
        let flat_box = connect && radius <= 0.0;

        // A plain cuboid only needs the patch corners.
        let level = if flat_box { 0 } else { config.level() };
        if !flat_box && level != config.subdivisions {
            log::debug!(
                "Octasphere subdivisions {} clamped to {}",
                config.subdivisions,
                level
            );
        }

        let n = vertices_per_line(level);
        let per_patch = vertices_per_patch(level);
        let patch = tessellate_patch(n);

        let normals: Vec<Vec3> = (0..PATCH_COUNT)
            .into_par_iter()
            .flat_map_iter(|p| {
                let rotation = patch_rotation(p);
                patch.iter().map(move |&v| rotation * v)
            })
            .collect();

        let offsets = OCTANT_SIGNS.map(|sign| sign * translation);
        let positions: Vec<Vec3> = normals
            .par_iter()
            .enumerate()
            .map(|(i, &n)| n * radius + offsets[i / per_patch])
            .collect();

        let mut triangles = Vec::new();
        if !flat_box {
            let faces = patch_triangles(n);
            triangles.reserve(faces.len() * PATCH_COUNT);
            for p in 0..PATCH_COUNT {
                let base = (p * per_patch) as u32;
                triangles.extend(faces.iter().map(|f| f.map(|i| i + base)));
            }
        }

        if connect {
            let seams = Seams {
                n,
                per_patch,
                normals: &normals,
                positions: &positions,
                offsets: &offsets,
            };
            if !flat_box {
                seams.edge_strips(&mut triangles);
            }
            seams.face_quads(translation, &mut triangles);
        }

        let tangents = SurfaceOrientation::builder()
            .normals(&normals)
            .build()?
            .quats_as_short();

        let indices: Vec<u32> = triangles.into_iter().flatten().collect();
        let mesh = MeshBuffers::from_u32_indices(positions, normals, tangents, &indices)?;

        log::debug!(
            "Generated octasphere: level {}, {} vertices, {} triangles",
            level,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }
}

/// True when patches moved by `translation` along an axis leave a gap between them
fn is_gap(translation: f32) -> bool {
    !approx_eq(2.0 * translation, 0.0)
}

/// Points of the first-octant patch, row by row. Row `i` is the geodesic between
/// the two boundary great circles at latitude `θ = π/2 · i / (n - 1)`.
fn tessellate_patch(n: usize) -> Vec<Vec3> {
    let mut points = Vec::with_capacity(n * (n + 1) / 2);
    for row in 0..n {
        let (sin, cos) = if row == n - 1 {
            (1.0, 0.0)
        } else {
            (FRAC_PI_2 * row as f32 / (n - 1) as f32).sin_cos()
        };
        let from = Vec3::new(0.0, sin, cos);
        let to = Vec3::new(cos, sin, 0.0);
        geodesic_into(&mut points, from, to, n - 1 - row);
    }
    points
}

/// Rotation taking the first octant onto the octant of patch `p`
fn patch_rotation(p: usize) -> Quat {
    if p < 4 {
        Quat::from_rotation_y(FRAC_PI_2 * p as f32)
    } else {
        Quat::from_rotation_y(FRAC_PI_2 * (7 - p) as f32) * Quat::from_rotation_x(PI)
    }
}

/// Index of the first vertex of `row` within a patch
fn row_start(n: usize, row: usize) -> usize {
    row * n - row * row.saturating_sub(1) / 2
}

/// Triangles of one patch: a fan over each pair of neighbouring rows, two
/// triangles per cell and one at the end of the row.
fn patch_triangles(n: usize) -> Vec<[u32; 3]> {
    let mut faces = Vec::with_capacity((n - 1) * (n - 1));
    let mut j0 = 0u32;
    for row in 0..n - 1 {
        let height = (n - 1 - row) as u32;
        let j1 = j0 + 1;
        let j2 = j0 + height + 1;
        let j3 = j0 + height + 2;
        for col in 0..height - 1 {
            faces.push([j0 + col, j1 + col, j2 + col]);
            faces.push([j2 + col, j1 + col, j3 + col]);
        }
        let col = height - 1;
        faces.push([j0 + col, j1 + col, j2 + col]);
        j0 = j2;
    }
    faces
}

/// Seam-closing geometry between translated patches
struct Seams<'a> {
    n: usize,
    per_patch: usize,
    normals: &'a [Vec3],
    positions: &'a [Vec3],
    offsets: &'a [Vec3; PATCH_COUNT],
}

impl Seams<'_> {
    /// The three boundary arcs of a patch as local indices: the first row and the
    /// first and last vertex of every row.
    fn boundary_arcs(&self) -> [Vec<usize>; 3] {
        let n = self.n;
        [
            (0..n).collect(),
            (0..n).map(|row| row_start(n, row)).collect(),
            (0..n).map(|row| row_start(n, row) + n - 1 - row).collect(),
        ]
    }

    fn same_direction(&self, a: usize, b: usize) -> bool {
        self.normals[a].distance_squared(self.normals[b]) < SEAM_EPSILON * SEAM_EPSILON
    }

    /// Quad strips joining every pair of patches that share a boundary arc and
    /// were pushed apart.
    fn edge_strips(&self, out: &mut Vec<[u32; 3]>) {
        let arcs = self.boundary_arcs();
        let last = self.n - 1;
        let mut strips = 0;

        for p in 0..PATCH_COUNT {
            for q in p + 1..PATCH_COUNT {
                if approx_eq(self.offsets[p].distance(self.offsets[q]), 0.0) {
                    continue;
                }
                for arc_p in &arcs {
                    let a: Vec<usize> = arc_p.iter().map(|&i| p * self.per_patch + i).collect();
                    for arc_q in &arcs {
                        let b: Vec<usize> = arc_q.iter().map(|&i| q * self.per_patch + i).collect();
                        let reversed = if self.same_direction(a[0], b[0])
                            && self.same_direction(a[last], b[last])
                        {
                            false
                        } else if self.same_direction(a[0], b[last])
                            && self.same_direction(a[last], b[0])
                        {
                            true
                        } else {
                            continue;
                        };

                        for k in 0..last {
                            let (k0, k1) = if reversed { (last - k, last - k - 1) } else { (k, k + 1) };
                            self.push_quad(a[k], a[k + 1], b[k1], b[k0], out);
                        }
                        strips += 1;
                    }
                }
            }
        }
        log::debug!("Closed {} patch seams", strips);
    }

    /// Two triangles for the quad `a0 a1 b1 b0`, wound to face away from the center
    fn push_quad(&self, a0: usize, a1: usize, b1: usize, b0: usize, out: &mut Vec<[u32; 3]>) {
        let outward = self.normals[a0] + self.normals[a1];
        let p = self.positions;
        let facing = (p[a1] - p[a0]).cross(p[b1] - p[a0]);
        let [a0, a1, b1, b0] = [a0, a1, b1, b0].map(|i| i as u32);
        if facing.dot(outward) >= 0.0 {
            out.push([a0, a1, b1]);
            out.push([a0, b1, b0]);
        } else {
            out.push([a0, b1, a1]);
            out.push([a0, b0, b1]);
        }
    }

    /// One quad per box face, joining the four patch corners on that axis. Faces
    /// with a zero in-plane extent are skipped.
    fn face_quads(&self, translation: Vec3, out: &mut Vec<[u32; 3]>) {
        let corners = [0, self.n - 1, self.per_patch - 1];

        for axis in AXES {
            let in_plane = translation * (Vec3::ONE - axis.abs());
            let extents = in_plane.to_array().iter().filter(|&&t| is_gap(t)).count();
            if extents < 2 {
                continue;
            }

            let tangent = axis.any_orthonormal_vector();
            let bitangent = axis.cross(tangent);
            let mut quad: SmallVec<[(f32, u32); 4]> = (0..PATCH_COUNT)
                .flat_map(|p| corners.iter().map(move |&c| p * self.per_patch + c))
                .filter(|&i| self.normals[i].distance_squared(axis) < SEAM_EPSILON * SEAM_EPSILON)
                .map(|i| {
                    let pos = self.positions[i];
                    (pos.dot(bitangent).atan2(pos.dot(tangent)), i as u32)
                })
                .collect();

            if quad.len() != 4 {
                log::warn!("Expected 4 patch corners on axis {}, found {}", axis, quad.len());
                continue;
            }
            // Increasing angle around the axis is counter-clockwise seen from outside.
            quad.sort_by(|a, b| a.0.total_cmp(&b.0));
            let [c0, c1, c2, c3] = [quad[0].1, quad[1].1, quad[2].1, quad[3].1];
            out.push([c0, c1, c2]);
            out.push([c0, c2, c3]);
        }
    }
}
