//! Polygon mesh primitive.

use super::{Data, Interpolation, PrimitiveVariable, PrimitiveVariableMap};
use crate::core::MurmurHash;
use crate::util::{Box3d, Box3f, Error, Result, Vec3};

/// Polygon mesh: face sizes, face-vertex point indices and variables.
///
/// Positions live in the `P` variable (`V3fVectorData`, vertex interpolated).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshPrimitive {
    pub vertices_per_face: Vec<i32>,
    pub vertex_ids: Vec<i32>,
    /// Subdivision scheme, `"linear"` for plain polygons.
    pub interpolation: String,
    pub variables: PrimitiveVariableMap,
}

impl MeshPrimitive {
    /// Mesh with the given topology and positions.
    pub fn new(vertices_per_face: Vec<i32>, vertex_ids: Vec<i32>, points: Vec<Vec3>) -> Self {
        let mut variables = PrimitiveVariableMap::new();
        variables.insert(
            "P".to_string(),
            PrimitiveVariable::new(Interpolation::Vertex, Data::V3fVector(points)),
        );
        Self {
            vertices_per_face,
            vertex_ids,
            interpolation: "linear".to_string(),
            variables,
        }
    }

    /// Axis aligned box with six outward facing quads.
    pub fn create_box(b: Box3f) -> Self {
        let (lo, hi) = (b.min, b.max);
        let points = vec![
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ];
        let vertex_ids = vec![
            0, 3, 2, 1, // -z
            4, 5, 6, 7, // +z
            0, 1, 5, 4, // -y
            2, 3, 7, 6, // +y
            1, 2, 6, 5, // +x
            0, 4, 7, 3, // -x
        ];
        Self::new(vec![4; 6], vertex_ids, points)
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.vertices_per_face.len()
    }

    #[inline]
    pub fn num_face_vertices(&self) -> usize {
        self.vertex_ids.len()
    }

    /// Number of points, derived from the largest referenced index.
    pub fn num_points(&self) -> usize {
        self.vertex_ids
            .iter()
            .copied()
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0)
    }

    /// Expected element count for a variable of the given interpolation.
    pub fn variable_size(&self, interpolation: Interpolation) -> usize {
        match interpolation {
            Interpolation::Constant => 1,
            Interpolation::Uniform => self.num_faces(),
            Interpolation::Varying | Interpolation::Vertex => self.num_points(),
            Interpolation::FaceVarying => self.num_face_vertices(),
        }
    }

    /// Positions, when present as `V3fVectorData`.
    pub fn points(&self) -> Option<&[Vec3]> {
        self.variables.get("P").and_then(|v| v.data.as_v3f_slice())
    }

    /// Bound of the positions; empty without points.
    pub fn bound(&self) -> Box3d {
        let mut b = Box3f::EMPTY;
        for p in self.points().unwrap_or(&[]) {
            b.expand_by_point(*p);
        }
        b.into()
    }

    /// Check topology and variable sizes.
    pub fn validate(&self) -> Result<()> {
        if self.vertices_per_face.iter().any(|&n| n < 3) {
            return Err(Error::invalid("mesh face with fewer than 3 vertices"));
        }
        let total: i64 = self.vertices_per_face.iter().map(|&n| n as i64).sum();
        if total != self.vertex_ids.len() as i64 {
            return Err(Error::invalid(format!(
                "face sizes sum to {total} but {} vertex ids given",
                self.vertex_ids.len()
            )));
        }
        if self.vertex_ids.iter().any(|&i| i < 0) {
            return Err(Error::invalid("negative vertex id"));
        }
        for (name, var) in &self.variables {
            if var.interpolation == Interpolation::Constant {
                continue;
            }
            let expected = self.variable_size(var.interpolation);
            if let Some(count) = var.element_count() {
                if count != expected {
                    return Err(Error::invalid(format!(
                        "primitive variable {name} has {count} elements, expected {expected}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn hash(&self, h: &mut MurmurHash) {
        h.append_bytes(bytemuck::cast_slice(&self.vertices_per_face));
        h.append_bytes(bytemuck::cast_slice(&self.vertex_ids));
        h.append_str(&self.interpolation);
        for (name, var) in &self.variables {
            h.append_str(name);
            var.hash(h);
        }
    }
}
