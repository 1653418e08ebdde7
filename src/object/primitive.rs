//! Primitive variables.

use std::collections::BTreeMap;

use super::Data;
use crate::core::MurmurHash;

/// How a primitive variable maps onto the primitive's topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// One value for the whole primitive.
    #[default]
    Constant,
    /// One value per face.
    Uniform,
    /// One value per point, linearly interpolated.
    Varying,
    /// One value per point.
    Vertex,
    /// One value per face-vertex.
    FaceVarying,
}

impl Interpolation {
    /// Parse from the stored name; unknown names read as `Constant`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "constant" => Self::Constant,
            "uniform" => Self::Uniform,
            "varying" => Self::Varying,
            "vertex" => Self::Vertex,
            "facevarying" => Self::FaceVarying,
            _ => Self::Constant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
            Self::Vertex => "vertex",
            Self::FaceVarying => "facevarying",
        }
    }

    pub(crate) fn as_u8(&self) -> u8 {
        match self {
            Self::Constant => 0,
            Self::Uniform => 1,
            Self::Varying => 2,
            Self::Vertex => 3,
            Self::FaceVarying => 4,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Constant,
            1 => Self::Uniform,
            2 => Self::Varying,
            3 => Self::Vertex,
            4 => Self::FaceVarying,
            _ => return None,
        })
    }
}

/// A named value attached to a primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveVariable {
    pub interpolation: Interpolation,
    pub data: Data,
    /// Optional index buffer into `data`.
    pub indices: Option<Vec<i32>>,
}

impl PrimitiveVariable {
    pub fn new(interpolation: Interpolation, data: Data) -> Self {
        Self {
            interpolation,
            data,
            indices: None,
        }
    }

    pub fn indexed(interpolation: Interpolation, data: Data, indices: Vec<i32>) -> Self {
        Self {
            interpolation,
            data,
            indices: Some(indices),
        }
    }

    /// Number of elements as seen by the topology.
    pub fn element_count(&self) -> Option<usize> {
        match &self.indices {
            Some(idx) => Some(idx.len()),
            None => self.data.len(),
        }
    }

    pub fn hash(&self, h: &mut MurmurHash) {
        h.append_bytes(&[self.interpolation.as_u8()]);
        self.data.hash(h);
        if let Some(indices) = &self.indices {
            h.append_bytes(bytemuck::cast_slice(indices));
        }
    }
}

/// Variables keyed by name, iterated in name order.
pub type PrimitiveVariableMap = BTreeMap<String, PrimitiveVariable>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_names() {
        for i in [
            Interpolation::Constant,
            Interpolation::Uniform,
            Interpolation::Varying,
            Interpolation::Vertex,
            Interpolation::FaceVarying,
        ] {
            assert_eq!(Interpolation::from_str(i.as_str()), i);
            assert_eq!(Interpolation::from_u8(i.as_u8()), Some(i));
        }
        assert_eq!(Interpolation::from_str("bogus"), Interpolation::Constant);
    }

    #[test]
    fn test_element_count() {
        let v = PrimitiveVariable::indexed(
            Interpolation::FaceVarying,
            Data::FloatVector(vec![0.0, 1.0]),
            vec![0, 1, 1, 0],
        );
        assert_eq!(v.element_count(), Some(4));
        let c = PrimitiveVariable::new(Interpolation::Constant, Data::Float(1.0));
        assert_eq!(c.element_count(), None);
    }
}
