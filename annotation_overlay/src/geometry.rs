//! Ray primitives and the two shapes the overlay raycasts against: the
//! caller's triangle mesh and the camera-facing sprite that stands in for each
//! marker. Procedural stand-in meshes live here too so hosts can exercise the
//! overlay before a real mesh resource arrives.

use std::f64::consts::PI;

use glam::DVec3;
use serde::Deserialize;

const HIT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Möller–Trumbore, both faces. Returns the ray parameter of the hit.
    pub fn intersect_triangle(&self, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() <= HIT_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t > HIT_EPSILON).then_some(t)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Every hit along the ray, unsorted. Triangles that index past the vertex
    /// list are skipped.
    pub fn raycast(&self, ray: &Ray) -> Vec<f64> {
        self.triangles
            .iter()
            .filter_map(|[a, b, c]| {
                let a = self.vertices.get(*a as usize)?;
                let b = self.vertices.get(*b as usize)?;
                let c = self.vertices.get(*c as usize)?;
                ray.intersect_triangle(*a, *b, *c)
            })
            .collect()
    }

    /// Axis-aligned rectangle in the plane `z = center.z`, facing +Z.
    pub fn quad(center: DVec3, width: f64, height: f64) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        let vertices = vec![
            center + DVec3::new(-hw, -hh, 0.0),
            center + DVec3::new(hw, -hh, 0.0),
            center + DVec3::new(hw, hh, 0.0),
            center + DVec3::new(-hw, hh, 0.0),
        ];
        Self::new(vertices, vec![[0, 1, 2], [0, 2, 3]])
    }

    pub fn cube(center: DVec3, size: f64) -> Self {
        #[rustfmt::skip]
        let faces: [[[f64; 3]; 4]; 6] = [
            // +X
            [[0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5]],
            // -X
            [[-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [-0.5, -0.5, -0.5]],
            // +Y
            [[-0.5, 0.5, -0.5], [-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5]],
            // -Y
            [[-0.5, -0.5, 0.5], [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5]],
            // +Z
            [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]],
            // -Z
            [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]],
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);
        for (face_index, corners) in faces.iter().enumerate() {
            let base = (face_index * 4) as u32;
            for corner in corners {
                vertices.push(center + DVec3::from_array(*corner) * size);
            }
            triangles.push([base, base + 1, base + 2]);
            triangles.push([base, base + 2, base + 3]);
        }
        Self::new(vertices, triangles)
    }

    pub fn sphere(center: DVec3, radius: f64, lat_divisions: u32, lon_divisions: u32) -> Self {
        let lat_steps = lat_divisions.max(3);
        let lon_steps = lon_divisions.max(6);
        let mut vertices = Vec::with_capacity(((lat_steps + 1) * (lon_steps + 1)) as usize);
        let mut triangles = Vec::with_capacity((lat_steps * lon_steps * 2) as usize);

        for lat in 0..=lat_steps {
            let theta = lat as f64 / lat_steps as f64 * PI;
            for lon in 0..=lon_steps {
                let phi = lon as f64 / lon_steps as f64 * PI * 2.0;
                let direction = DVec3::new(
                    theta.sin() * phi.cos(),
                    theta.cos(),
                    theta.sin() * phi.sin(),
                );
                vertices.push(center + direction * radius);
            }
        }

        let ring = lon_steps + 1;
        for lat in 0..lat_steps {
            for lon in 0..lon_steps {
                let current = lat * ring + lon;
                let next = current + ring;
                triangles.push([current, next, current + 1]);
                triangles.push([current + 1, next, next + 1]);
            }
        }
        Self::new(vertices, triangles)
    }
}

/// Square that always faces the camera, centred on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub center: DVec3,
    pub size: f64,
}

impl Sprite {
    pub fn new(center: DVec3, size: f64) -> Self {
        Self { center, size }
    }

    /// Hit parameter against the sprite's quad. `right`/`up` are the camera
    /// axes and `facing` the camera's forward direction.
    pub fn raycast(&self, ray: &Ray, right: DVec3, up: DVec3, facing: DVec3) -> Option<f64> {
        let denom = ray.direction.dot(facing);
        if denom.abs() <= HIT_EPSILON {
            return None;
        }
        let t = (self.center - ray.origin).dot(facing) / denom;
        if t < 0.0 {
            return None;
        }
        let local = ray.at(t) - self.center;
        let half = self.size * 0.5;
        (local.dot(right).abs() <= half && local.dot(up).abs() <= half).then_some(t)
    }
}

/// Serialized form of a mesh resource handed to the overlay by a host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshDescription {
    Quad {
        center: DVec3,
        width: f64,
        height: f64,
    },
    Cube {
        center: DVec3,
        size: f64,
    },
    Sphere {
        center: DVec3,
        radius: f64,
        #[serde(default = "default_lat_divisions")]
        lat_divisions: u32,
        #[serde(default = "default_lon_divisions")]
        lon_divisions: u32,
    },
    Triangles {
        vertices: Vec<DVec3>,
        indices: Vec<[u32; 3]>,
    },
}

fn default_lat_divisions() -> u32 {
    12
}

fn default_lon_divisions() -> u32 {
    18
}

impl MeshDescription {
    pub fn build(&self) -> TriangleMesh {
        match self {
            MeshDescription::Quad {
                center,
                width,
                height,
            } => TriangleMesh::quad(*center, *width, *height),
            MeshDescription::Cube { center, size } => TriangleMesh::cube(*center, *size),
            MeshDescription::Sphere {
                center,
                radius,
                lat_divisions,
                lon_divisions,
            } => TriangleMesh::sphere(*center, *radius, *lat_divisions, *lon_divisions),
            MeshDescription::Triangles { vertices, indices } => {
                TriangleMesh::new(vertices.clone(), indices.clone())
            }
        }
    }
}
