/*!
Render geometry to collision shape conversion.

`build_from_mesh` turns a mesh description into a `ShapeDescriptor`, an engine-agnostic
value that is later turned into a rapier `SharedShape` by `ShapeDescriptor::to_shared_shape`.

Design
- Primitive fast paths are tried first: box geometry becomes a `Box`, uniformly scaled
  spheres (and icosahedra subdivided enough to pass for one) become a `Sphere`, cones with a
  round base become a `Cone`.
- Everything else falls back to the raw buffers: a `ConvexHull` when the mesh is flagged
  convex, a `TriMesh` otherwise. Vertices stay unscaled in the descriptor and the per-axis
  scale is applied when the engine shape is built.
- Quantized (16-bit) position buffers are rejected.
- Heightfields go through `build_heightfield`, which recentres the height range around zero.
*/

use nalgebra as na;
use rapier3d::prelude::SharedShape;

use crate::{
    collision::{Iso, Point3, Quat, Vec3},
    constants::{SPHERE_MIN_ICOSAHEDRON_DETAIL, UNIFORM_SCALE_EPS},
    error::ShapeError,
};

/// Vertex positions as stored by the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexBuffer {
    /// Flat `[x, y, z, x, y, z, ..]` floats.
    F32(Vec<f32>),
    /// Normalized 16-bit positions. Not supported for collision.
    Quantized16(Vec<i16>),
}

impl Default for VertexBuffer {
    fn default() -> Self {
        VertexBuffer::F32(Vec::new())
    }
}

/// Parametric source of the geometry, when the renderer knows it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum GeometryKind {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    Sphere {
        radius: f32,
    },
    Icosahedron {
        radius: f32,
        detail: u32,
    },
    Cone {
        radius: f32,
        height: f32,
    },
    #[default]
    Generic,
}

/// Render mesh as seen by the collision layer.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGeometry {
    pub name: String,
    pub kind: GeometryKind,
    pub positions: VertexBuffer,
    /// Triangle list. `None` means consecutive vertex triples form triangles.
    pub indices: Option<Vec<u32>>,
    /// Local scale of the mesh.
    pub scale: Vec3,
    /// Collide against the convex hull of the vertices instead of the triangles.
    pub convex: bool,
    /// World placement of the mesh.
    pub translation: Vec3,
    pub rotation: Quat,
}

impl MeshGeometry {
    pub fn new(name: impl Into<String>, kind: GeometryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            positions: VertexBuffer::default(),
            indices: None,
            scale: Vec3::new(1.0, 1.0, 1.0),
            convex: false,
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }

    pub fn with_positions(mut self, positions: Vec<f32>, indices: Option<Vec<u32>>) -> Self {
        self.positions = VertexBuffer::F32(positions);
        self.indices = indices;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn at(mut self, translation: Vec3, rotation: Quat) -> Self {
        self.translation = translation;
        self.rotation = rotation;
        self
    }

    pub fn convex(mut self) -> Self {
        self.convex = true;
        self
    }

    /// Unscaled vertex positions.
    pub fn vertices(&self) -> Result<Vec<Point3>, ShapeError> {
        let positions = match &self.positions {
            VertexBuffer::F32(positions) => positions,
            VertexBuffer::Quantized16(_) => {
                return Err(ShapeError::QuantizedVertices {
                    mesh: self.name.clone(),
                });
            }
        };
        if positions.len() % 3 != 0 {
            return Err(ShapeError::MalformedPositions {
                mesh: self.name.clone(),
                len: positions.len(),
            });
        }
        Ok(positions
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect())
    }

    /// Triangles, validated against `vertex_count`.
    pub fn triangles(&self, vertex_count: usize) -> Result<Vec<[u32; 3]>, ShapeError> {
        let Some(indices) = &self.indices else {
            if vertex_count % 3 != 0 {
                return Err(ShapeError::MalformedIndices {
                    mesh: self.name.clone(),
                    len: vertex_count,
                });
            }
            return Ok((0..vertex_count as u32 / 3)
                .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
                .collect());
        };

        if indices.len() % 3 != 0 {
            return Err(ShapeError::MalformedIndices {
                mesh: self.name.clone(),
                len: indices.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ShapeError::IndexOutOfRange {
                mesh: self.name.clone(),
                index,
                vertex_count,
            });
        }
        Ok(indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect())
    }
}

/// Engine-agnostic collision shape. Built once, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDescriptor {
    Box {
        half_extents: Vec3,
    },
    Sphere {
        radius: f32,
    },
    /// Y-aligned cone, `height` is the full height.
    Cone {
        radius: f32,
        height: f32,
    },
    TriMesh {
        vertices: Vec<Point3>,
        indices: Vec<[u32; 3]>,
        scale: Vec3,
    },
    ConvexHull {
        vertices: Vec<Point3>,
        indices: Vec<[u32; 3]>,
        scale: Vec3,
    },
    /// Row-major samples, `grid_x` per row and `grid_z` rows, spanning
    /// `world_width` x `world_length` centred on the body origin.
    Heightfield {
        samples: Vec<f32>,
        min_height: f32,
        max_height: f32,
        grid_x: usize,
        grid_z: usize,
        world_width: f32,
        world_length: f32,
    },
    Compound {
        children: Vec<(Iso, ShapeDescriptor)>,
    },
}

impl ShapeDescriptor {
    /// Capsule used for the player: `height` is the total height.
    pub fn capsule(height: f32, radius: f32) -> Result<SharedShape, ShapeError> {
        positive("capsule radius", radius)?;
        let half_height = 0.5 * height - radius;
        if half_height < 0.0 {
            return Err(ShapeError::InvalidDimension {
                what: "capsule height",
                value: height,
            });
        }
        Ok(SharedShape::capsule_y(half_height, radius))
    }

    pub fn compound(children: Vec<(Iso, ShapeDescriptor)>) -> Result<Self, ShapeError> {
        if children.is_empty() {
            return Err(ShapeError::EmptyCompound);
        }
        if children.iter().any(|(_, child)| !child.is_convex()) {
            return Err(ShapeError::NestedComposite);
        }
        Ok(ShapeDescriptor::Compound { children })
    }

    pub fn is_convex(&self) -> bool {
        match self {
            ShapeDescriptor::Box { .. }
            | ShapeDescriptor::Sphere { .. }
            | ShapeDescriptor::Cone { .. }
            | ShapeDescriptor::ConvexHull { .. } => true,
            ShapeDescriptor::TriMesh { .. }
            | ShapeDescriptor::Heightfield { .. }
            | ShapeDescriptor::Compound { .. } => false,
        }
    }

    /// Build the engine shape.
    pub fn to_shared_shape(&self) -> Result<SharedShape, ShapeError> {
        match self {
            ShapeDescriptor::Box { half_extents } => {
                for v in half_extents.iter() {
                    positive("box half extent", *v)?;
                }
                Ok(SharedShape::cuboid(
                    half_extents.x,
                    half_extents.y,
                    half_extents.z,
                ))
            }

            ShapeDescriptor::Sphere { radius } => {
                positive("sphere radius", *radius)?;
                Ok(SharedShape::ball(*radius))
            }

            ShapeDescriptor::Cone { radius, height } => {
                positive("cone radius", *radius)?;
                positive("cone height", *height)?;
                Ok(SharedShape::cone(0.5 * height, *radius))
            }

            ShapeDescriptor::TriMesh {
                vertices,
                indices,
                scale,
            } => {
                if indices.is_empty() {
                    return Err(ShapeError::TriMesh("no triangles".to_owned()));
                }
                SharedShape::trimesh(scaled(vertices, scale), indices.clone())
                    .map_err(|err| ShapeError::TriMesh(format!("{err:?}")))
            }

            // The hull is recomputed from the points; the index buffer only matters to
            // the renderer.
            ShapeDescriptor::ConvexHull {
                vertices, scale, ..
            } => SharedShape::convex_hull(&scaled(vertices, scale))
                .ok_or(ShapeError::DegenerateHull),

            ShapeDescriptor::Heightfield {
                samples,
                grid_x,
                grid_z,
                world_width,
                world_length,
                ..
            } => {
                check_heightfield_grid(samples.len(), *grid_x, *grid_z)?;
                positive("heightfield width", *world_width)?;
                positive("heightfield length", *world_length)?;
                let heights =
                    na::DMatrix::from_fn(*grid_z, *grid_x, |row, col| samples[row * grid_x + col]);
                Ok(SharedShape::heightfield(
                    heights,
                    Vec3::new(*world_width, 1.0, *world_length),
                ))
            }

            ShapeDescriptor::Compound { children } => {
                if children.is_empty() {
                    return Err(ShapeError::EmptyCompound);
                }
                let shapes = children
                    .iter()
                    .map(|(pose, child)| {
                        if !child.is_convex() {
                            return Err(ShapeError::NestedComposite);
                        }
                        Ok((*pose, child.to_shared_shape()?))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SharedShape::compound(shapes))
            }
        }
    }
}

/// Convert a render mesh into a shape descriptor.
///
/// `extra_scale` multiplies the mesh's own scale, per axis.
pub fn build_from_mesh(
    mesh: &MeshGeometry,
    extra_scale: Option<Vec3>,
) -> Result<ShapeDescriptor, ShapeError> {
    let scale = match extra_scale {
        Some(extra) => mesh.scale.component_mul(&extra),
        None => mesh.scale,
    };

    match mesh.kind {
        GeometryKind::Box {
            width,
            height,
            depth,
        } => {
            return Ok(ShapeDescriptor::Box {
                half_extents: (0.5 * Vec3::new(width, height, depth))
                    .component_mul(&scale)
                    .abs(),
            });
        }
        GeometryKind::Sphere { radius } if is_uniform(&scale) => {
            return Ok(ShapeDescriptor::Sphere {
                radius: radius * scale.x.abs(),
            });
        }
        GeometryKind::Icosahedron { radius, detail }
            if detail >= SPHERE_MIN_ICOSAHEDRON_DETAIL && is_uniform(&scale) =>
        {
            return Ok(ShapeDescriptor::Sphere {
                radius: radius * scale.x.abs(),
            });
        }
        GeometryKind::Cone { radius, height } if nearly_equal(scale.x, scale.z) => {
            return Ok(ShapeDescriptor::Cone {
                radius: radius * scale.x.abs(),
                height: height * scale.y.abs(),
            });
        }
        _ => {}
    }

    let vertices = mesh.vertices()?;
    if vertices.is_empty() {
        return Err(ShapeError::Empty {
            mesh: mesh.name.clone(),
        });
    }
    let indices = mesh.triangles(vertices.len())?;

    if mesh.convex {
        Ok(ShapeDescriptor::ConvexHull {
            vertices,
            indices,
            scale,
        })
    } else {
        Ok(ShapeDescriptor::TriMesh {
            vertices,
            indices,
            scale,
        })
    }
}

/// World-space XZ rectangle covered by a heightfield.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeightfieldBounds {
    pub min_x: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_z: f32,
}

impl HeightfieldBounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn length(&self) -> f32 {
        self.max_z - self.min_z
    }

    /// Body origin of a heightfield covering these bounds.
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            0.5 * (self.min_x + self.max_x),
            0.0,
            0.5 * (self.min_z + self.max_z),
        )
    }
}

/// External terrain height source.
///
/// Returns `resolution.0 * resolution.1` heights, row-major with X varying fastest.
pub trait HeightSampler {
    fn sample_heightfield(&self, resolution: (usize, usize), bounds: HeightfieldBounds)
    -> Vec<f32>;
}

/// Build a heightfield descriptor from raw samples.
pub fn build_heightfield(
    samples: Vec<f32>,
    grid_x: usize,
    grid_z: usize,
    world_width: f32,
    world_length: f32,
) -> Result<ShapeDescriptor, ShapeError> {
    check_heightfield_grid(samples.len(), grid_x, grid_z)?;
    positive("heightfield width", world_width)?;
    positive("heightfield length", world_length)?;

    let (min, max) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
            (lo.min(h), hi.max(h))
        });
    let (min_height, max_height) = recenter_height_range(min, max);

    Ok(ShapeDescriptor::Heightfield {
        samples,
        min_height,
        max_height,
        grid_x,
        grid_z,
        world_width,
        world_length,
    })
}

/// Sample `sampler` over `bounds` and build the heightfield descriptor.
pub fn build_heightfield_from_sampler(
    sampler: &dyn HeightSampler,
    grid_x: usize,
    grid_z: usize,
    bounds: HeightfieldBounds,
) -> Result<ShapeDescriptor, ShapeError> {
    let samples = sampler.sample_heightfield((grid_x, grid_z), bounds);
    build_heightfield(samples, grid_x, grid_z, bounds.width(), bounds.length())
}

/// Make the height range symmetric around zero.
///
/// Only the bound nearer to zero moves: it is mirrored from the farther one, so the
/// range is widened and never narrowed.
pub fn recenter_height_range(min: f32, max: f32) -> (f32, f32) {
    if max.abs() >= min.abs() {
        (-max.abs(), max.abs())
    } else {
        (min, -min)
    }
}

fn check_heightfield_grid(len: usize, grid_x: usize, grid_z: usize) -> Result<(), ShapeError> {
    let expected = grid_x * grid_z;
    if grid_x < 2 || grid_z < 2 || len != expected {
        return Err(ShapeError::HeightfieldSamples {
            expected,
            actual: len,
            grid_x,
            grid_z,
        });
    }
    Ok(())
}

fn positive(what: &'static str, value: f32) -> Result<(), ShapeError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ShapeError::InvalidDimension { what, value })
    }
}

fn scaled(vertices: &[Point3], scale: &Vec3) -> Vec<Point3> {
    vertices
        .iter()
        .map(|p| Point3::from(p.coords.component_mul(scale)))
        .collect()
}

fn nearly_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= UNIFORM_SCALE_EPS * a.abs().max(b.abs()).max(1.0)
}

fn is_uniform(scale: &Vec3) -> bool {
    nearly_equal(scale.x, scale.y) && nearly_equal(scale.y, scale.z)
}
