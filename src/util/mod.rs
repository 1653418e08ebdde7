//! Utility types and functions for scene caches.
//!
//! This module contains fundamental types used throughout the library:
//! - [`Error`] / [`Result`] - Error handling
//! - [`Name`] / [`Path`] - Location names and paths
//! - Math type re-exports from glam plus [`Box3d`]

mod error;
mod math;
mod name;

pub use error::*;
pub use math::*;
pub use name::*;
