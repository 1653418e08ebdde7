//! # Scenecache
//!
//! Hierarchical, time-sampled scene descriptions stored in indexed container
//! files, with linking between files and scenes driven by live in-memory
//! hierarchies.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (names, paths, bounds, errors)
//! - [`io`] - Indexed container files and value codecs
//! - [`core`] - The scene contract, sample times, tags and hashing
//! - [`object`] - Object payloads (meshes, points, data)
//! - [`scene`] - Scene caches, linked, live and procedural scenes
//!
//! ## Example
//!
//! ```no_run
//! use scenecache::prelude::*;
//!
//! let root = SceneCache::open("shot.scc", OpenMode::Read)?;
//! for name in root.child_names() {
//!     let child = root.child(&name)?;
//!     println!("{} {:?}", name, child.read_bound(0.0)?);
//! }
//! # Ok::<(), scenecache::Error>(())
//! ```

pub mod util;
pub mod io;
pub mod core;
pub mod object;
pub mod scene;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{path_of, path_to_string, string_to_path, Box3d, Chrono, Error, Name, Path, Result};
    pub use crate::core::{
        HashType, LinkTarget, MissingBehaviour, MurmurHash, OpenMode, SampledSceneInterface,
        SceneInterface, SceneRef, TagFilter,
    };
    pub use crate::object::{Data, MeshPrimitive, Object, PointsPrimitive};
    pub use crate::scene::{
        LinkedScene, LiveHierarchy, LiveScene, ProceduralHierarchy, SceneCache, SceneFormatRegistry,
        SharedSceneInterfaces,
    };
}
