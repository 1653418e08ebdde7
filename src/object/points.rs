//! Point cloud primitive.

use super::{Data, Interpolation, PrimitiveVariable, PrimitiveVariableMap};
use crate::core::MurmurHash;
use crate::util::{Box3d, Box3f, Vec3};

/// Unconnected points; positions in `P`, optional `width`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointsPrimitive {
    pub num_points: usize,
    pub variables: PrimitiveVariableMap,
}

impl PointsPrimitive {
    pub fn new(points: Vec<Vec3>) -> Self {
        let num_points = points.len();
        let mut variables = PrimitiveVariableMap::new();
        variables.insert(
            "P".to_string(),
            PrimitiveVariable::new(Interpolation::Vertex, Data::V3fVector(points)),
        );
        Self { num_points, variables }
    }

    pub fn points(&self) -> Option<&[Vec3]> {
        self.variables.get("P").and_then(|v| v.data.as_v3f_slice())
    }

    /// Bound of the positions, grown by half the point width.
    pub fn bound(&self) -> Box3d {
        let points = self.points().unwrap_or(&[]);
        let widths: Option<&[f32]> = self.variables.get("width").and_then(|v| match &v.data {
            Data::FloatVector(w) => Some(w.as_slice()),
            Data::Float(w) => Some(std::slice::from_ref(w)),
            _ => None,
        });

        let mut b = Box3f::EMPTY;
        for (i, p) in points.iter().enumerate() {
            let r = match widths {
                Some([w]) => w * 0.5,
                Some(w) => w.get(i).copied().unwrap_or(0.0) * 0.5,
                None => 0.0,
            };
            b.expand_by_point(*p - Vec3::splat(r));
            b.expand_by_point(*p + Vec3::splat(r));
        }
        b.into()
    }

    pub fn hash(&self, h: &mut MurmurHash) {
        h.append_u64(self.num_points as u64);
        for (name, var) in &self.variables {
            h.append_str(name);
            var.hash(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_with_width() {
        let mut p = PointsPrimitive::new(vec![Vec3::ZERO, Vec3::X]);
        assert_eq!(p.bound().max.x, 1.0);

        p.variables.insert(
            "width".into(),
            PrimitiveVariable::new(Interpolation::Constant, Data::Float(2.0)),
        );
        let b = p.bound();
        assert_eq!(b.min.x, -1.0);
        assert_eq!(b.max.x, 2.0);
    }
}
