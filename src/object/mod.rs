//! Object payloads: typed data, primitive variables and primitives.
//!
//! - [`Data`] - closed set of attribute value types
//! - [`PrimitiveVariable`] / [`Interpolation`] - per-primitive values
//! - [`MeshPrimitive`], [`PointsPrimitive`], [`CoordinateSystem`]
//! - [`Object`] - the payload stored at a location

mod data;
mod mesh;
#[allow(clippy::module_inception)]
mod object;
mod points;
mod primitive;

pub use data::Data;
pub use mesh::MeshPrimitive;
pub use object::{transform_object, CoordinateSystem, Object};
pub use points::PointsPrimitive;
pub use primitive::{Interpolation, PrimitiveVariable, PrimitiveVariableMap};
