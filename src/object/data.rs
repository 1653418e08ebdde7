//! Typed attribute and primitive variable values.

use std::collections::BTreeMap;

use half::f16;

use crate::core::MurmurHash;
use crate::util::{Box3d, DMat4, DVec3, Name, Vec2, Vec3};

/// Closed set of value types stored in attributes, primitive variables and
/// data objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    V3f(Vec3),
    V3d(DVec3),
    Color3f(Vec3),
    M44d(DMat4),
    Box3d(Box3d),
    BoolVector(Vec<bool>),
    IntVector(Vec<i32>),
    FloatVector(Vec<f32>),
    DoubleVector(Vec<f64>),
    HalfVector(Vec<f16>),
    StringVector(Vec<String>),
    InternedStringVector(Vec<Name>),
    V2fVector(Vec<Vec2>),
    V3fVector(Vec<Vec3>),
    Color3fVector(Vec<Vec3>),
    Compound(BTreeMap<String, Data>),
}

impl Data {
    /// Type name used in tags, errors and listings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BoolData",
            Self::Int(_) => "IntData",
            Self::Float(_) => "FloatData",
            Self::Double(_) => "DoubleData",
            Self::String(_) => "StringData",
            Self::V3f(_) => "V3fData",
            Self::V3d(_) => "V3dData",
            Self::Color3f(_) => "Color3fData",
            Self::M44d(_) => "M44dData",
            Self::Box3d(_) => "Box3dData",
            Self::BoolVector(_) => "BoolVectorData",
            Self::IntVector(_) => "IntVectorData",
            Self::FloatVector(_) => "FloatVectorData",
            Self::DoubleVector(_) => "DoubleVectorData",
            Self::HalfVector(_) => "HalfVectorData",
            Self::StringVector(_) => "StringVectorData",
            Self::InternedStringVector(_) => "InternedStringVectorData",
            Self::V2fVector(_) => "V2fVectorData",
            Self::V3fVector(_) => "V3fVectorData",
            Self::Color3fVector(_) => "Color3fVectorData",
            Self::Compound(_) => "CompoundData",
        }
    }

    /// Element count for vector types, `None` for simple values.
    pub fn len(&self) -> Option<usize> {
        Some(match self {
            Self::BoolVector(v) => v.len(),
            Self::IntVector(v) => v.len(),
            Self::FloatVector(v) => v.len(),
            Self::DoubleVector(v) => v.len(),
            Self::HalfVector(v) => v.len(),
            Self::StringVector(v) => v.len(),
            Self::InternedStringVector(v) => v.len(),
            Self::V2fVector(v) => v.len(),
            Self::V3fVector(v) => v.len(),
            Self::Color3fVector(v) => v.len(),
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric scalar widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[Name]> {
        match self {
            Self::InternedStringVector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_m44d(&self) -> Option<&DMat4> {
        match self {
            Self::M44d(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_v3f_slice(&self) -> Option<&[Vec3]> {
        match self {
            Self::V3fVector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&BTreeMap<String, Data>> {
        match self {
            Self::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// Feed the type and value into a hash.
    pub fn hash(&self, h: &mut MurmurHash) {
        h.append_str(self.type_name());
        match self {
            Self::Bool(v) => {
                h.append_bytes(&[*v as u8]);
            }
            Self::Int(v) => {
                h.append_i32(*v);
            }
            Self::Float(v) => {
                h.append_f32(*v);
            }
            Self::Double(v) => {
                h.append_f64(*v);
            }
            Self::String(s) => {
                h.append_str(s);
            }
            Self::V3f(v) | Self::Color3f(v) => {
                h.append_bytes(bytemuck::bytes_of(v));
            }
            Self::V3d(v) => {
                h.append_bytes(bytemuck::bytes_of(v));
            }
            Self::M44d(m) => {
                h.append_bytes(bytemuck::bytes_of(m));
            }
            Self::Box3d(b) => {
                h.append_bytes(bytemuck::bytes_of(b));
            }
            Self::BoolVector(v) => {
                let bytes: Vec<u8> = v.iter().map(|&b| b as u8).collect();
                h.append_bytes(&bytes);
            }
            Self::IntVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::FloatVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::DoubleVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::HalfVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::StringVector(v) => {
                h.append_u64(v.len() as u64);
                for s in v {
                    h.append_str(s);
                }
            }
            Self::InternedStringVector(v) => {
                h.append_u64(v.len() as u64);
                for s in v {
                    h.append_str(s);
                }
            }
            Self::V2fVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::V3fVector(v) | Self::Color3fVector(v) => {
                h.append_bytes(bytemuck::cast_slice(v));
            }
            Self::Compound(c) => {
                h.append_u64(c.len() as u64);
                for (k, v) in c {
                    h.append_str(k);
                    v.hash(h);
                }
            }
        }
    }
}

impl From<bool> for Data {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Data {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Data {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Data {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Data {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Data {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DMat4> for Data {
    fn from(v: DMat4) -> Self {
        Self::M44d(v)
    }
}

impl From<Vec<Vec3>> for Data {
    fn from(v: Vec<Vec3>) -> Self {
        Self::V3fVector(v)
    }
}

impl From<Vec<i32>> for Data {
    fn from(v: Vec<i32>) -> Self {
        Self::IntVector(v)
    }
}
