//! Scene implementations.
//!
//! - [`SceneCache`] - file-backed scenes (`.scc`)
//! - [`LinkedScene`] - scenes mirroring subtrees of other files (`.lscc`)
//! - [`LiveScene`] / [`ProceduralHierarchy`] - scenes over in-memory hierarchies
//! - [`SharedSceneInterfaces`] - bounded cache of opened read-only scenes
//! - [`SceneFormatRegistry`] - file extension to scene type dispatch
//! - [`SceneExporter`] - writing any scene out as a linked scene
//! - [`algo`] - traversal and geometry gathering

pub mod algo;
mod export;
mod linked;
mod live;
mod procedural;
mod registry;
mod scene_cache;
mod shared;

pub use export::{ExportMode, ExportOptions, ExportPlan, ForceExpand, SceneExporter};
pub use linked::{
    link_attribute_data, read_link_locations, LinkedScene, LINK_ATTRIBUTE,
    LINK_FILE_NAME_ATTRIBUTE, LINK_ROOT_ATTRIBUTE, LINK_TIME_ATTRIBUTE,
};
pub use live::{LiveHierarchy, LiveScene, VISIBLE_ATTRIBUTE};
pub use procedural::{Animated, ProceduralHierarchy};
pub use registry::{SceneCreator, SceneFormatRegistry};
pub use scene_cache::{SceneCache, LINK_LOCATIONS_ATTRIBUTE, ROOT_NAME};
pub use shared::{SharedSceneInterfaces, DEFAULT_MAX_SCENES};
