//! The object payload stored at a scene location.

use super::{Data, MeshPrimitive, PointsPrimitive, PrimitiveVariableMap};
use crate::core::MurmurHash;
use crate::util::{Box3d, DMat4};

/// Named coordinate frame marker. Its placement comes from the location
/// transform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinateSystem {
    pub name: String,
}

impl CoordinateSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Object payload. The set of kinds is closed; arbitrary values go through
/// [`Object::Data`].
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Mesh(MeshPrimitive),
    Points(PointsPrimitive),
    CoordinateSystem(CoordinateSystem),
    Data(Data),
}

impl Object {
    /// Type name, also used for the `ObjectType:<TypeName>` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "MeshPrimitive",
            Self::Points(_) => "PointsPrimitive",
            Self::CoordinateSystem(_) => "CoordinateSystem",
            Self::Data(d) => d.type_name(),
        }
    }

    /// True for primitives with positions.
    pub fn is_geometric(&self) -> bool {
        matches!(self, Self::Mesh(_) | Self::Points(_))
    }

    /// Local bound of geometric payloads.
    pub fn bound(&self) -> Option<Box3d> {
        match self {
            Self::Mesh(m) => Some(m.bound()),
            Self::Points(p) => Some(p.bound()),
            _ => None,
        }
    }

    pub fn primitive_variables(&self) -> Option<&PrimitiveVariableMap> {
        match self {
            Self::Mesh(m) => Some(&m.variables),
            Self::Points(p) => Some(&p.variables),
            _ => None,
        }
    }

    pub fn primitive_variables_mut(&mut self) -> Option<&mut PrimitiveVariableMap> {
        match self {
            Self::Mesh(m) => Some(&mut m.variables),
            Self::Points(p) => Some(&mut p.variables),
            _ => None,
        }
    }

    pub fn hash(&self, h: &mut MurmurHash) {
        h.append_str(self.type_name());
        match self {
            Self::Mesh(m) => m.hash(h),
            Self::Points(p) => p.hash(h),
            Self::CoordinateSystem(c) => {
                h.append_str(&c.name);
            }
            Self::Data(d) => d.hash(h),
        }
    }
}

impl From<MeshPrimitive> for Object {
    fn from(m: MeshPrimitive) -> Self {
        Self::Mesh(m)
    }
}

impl From<PointsPrimitive> for Object {
    fn from(p: PointsPrimitive) -> Self {
        Self::Points(p)
    }
}

impl From<CoordinateSystem> for Object {
    fn from(c: CoordinateSystem) -> Self {
        Self::CoordinateSystem(c)
    }
}

impl From<Data> for Object {
    fn from(d: Data) -> Self {
        Self::Data(d)
    }
}

/// Fold `m` into the positions of a geometric object.
///
/// Only `P` moves. `Pref`, `rest` and every other variable keep their
/// coordinate space. Non-geometric objects are returned unchanged.
pub fn transform_object(object: &Object, m: &DMat4) -> Object {
    let mut out = object.clone();
    if let Some(vars) = out.primitive_variables_mut() {
        if let Some(p) = vars.get_mut("P") {
            if let Data::V3fVector(points) = &mut p.data {
                for point in points.iter_mut() {
                    *point = m.transform_point3(point.as_dvec3()).as_vec3();
                }
            }
        }
    }
    out
}
