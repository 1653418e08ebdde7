//! Core scene abstractions.
//!
//! - [`SceneInterface`] / [`SampledSceneInterface`] - the scene contract
//! - [`SampleTimes`] - held time sampling per channel
//! - [`TagFilter`] / [`TagSet`] - tag classes
//! - [`MetaData`] - file headers
//! - [`HashType`] / [`MurmurHash`] - content hashing

mod hash;
mod metadata;
mod sample_times;
mod tags;
mod traits;

pub use hash::*;
pub use metadata::*;
pub use sample_times::*;
pub use tags::*;
pub use traits::*;
