//! The scene interface shared by file-backed, linked and live scenes.

use std::sync::Arc;

use super::{HashType, MetaData, MurmurHash, SampleTimes, TagFilter};
use crate::object::{Object, PrimitiveVariableMap};
use crate::util::{path_to_string, Box3d, Chrono, DMat4, Error, Name, Path, Result};

/// Shared handle to a scene location.
pub type SceneRef = Arc<dyn SceneInterface>;

/// How files are opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create; fail when the file exists.
    CreateNew,
    /// Not supported by scene files.
    Append,
}

impl OpenMode {
    #[inline]
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// What child and scene lookups do for missing locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MissingBehaviour {
    /// Fail with a not-found error.
    #[default]
    ThrowIfMissing,
    /// Return `None`.
    NullIfMissing,
    /// Create the location (writers only).
    CreateIfMissing,
}

/// A subtree of another scene file mirrored at a location.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkTarget {
    pub file_name: String,
    /// Path of the mirrored location inside `file_name`.
    pub root: Path,
    /// Subtracted from the query time before reading the target.
    pub time_offset: Chrono,
}

impl LinkTarget {
    pub fn new(file_name: impl Into<String>, root: Path, time_offset: Chrono) -> Self {
        Self {
            file_name: file_name.into(),
            root,
            time_offset,
        }
    }

    /// Target of `child` below this one.
    pub fn join(&self, child: &Name) -> Self {
        let mut root = self.root.clone();
        root.push(child.clone());
        Self {
            file_name: self.file_name.clone(),
            root,
            time_offset: self.time_offset,
        }
    }
}

/// Read/write contract of a scene location.
///
/// Handles are shared (`Arc`) and every method takes `&self`; writers keep
/// their state behind locks. Paths are absolute from the root the scene was
/// opened with.
pub trait SceneInterface: Send + Sync {
    /// Backing file, or a descriptive name for scenes without one.
    fn file_name(&self) -> String;

    /// Last path component; the root is named `/`.
    fn name(&self) -> Name;

    fn path(&self) -> Path;

    // === Bounds ===

    fn has_bound(&self) -> bool;

    /// Local bound held at `time`; empty when never sampled.
    fn read_bound(&self, time: Chrono) -> Result<Box3d>;

    fn write_bound(&self, bound: &Box3d, time: Chrono) -> Result<()>;

    // === Transform ===

    /// Local transform held at `time`; identity when never sampled.
    fn read_transform_as_matrix(&self, time: Chrono) -> Result<DMat4>;

    fn write_transform(&self, matrix: &DMat4, time: Chrono) -> Result<()>;

    // === Attributes ===

    fn has_attribute(&self, name: &str) -> bool;

    fn attribute_names(&self) -> Vec<Name>;

    fn read_attribute(&self, name: &str, time: Chrono) -> Result<crate::object::Data>;

    fn write_attribute(&self, name: &str, value: &crate::object::Data, time: Chrono) -> Result<()>;

    // === Tags ===

    fn has_tag(&self, name: &str, filter: TagFilter) -> bool;

    /// Sorted tags of the selected classes.
    fn read_tags(&self, filter: TagFilter) -> Result<Vec<Name>>;

    /// Add local tags. Repeated calls accumulate.
    fn write_tags(&self, tags: &[Name]) -> Result<()>;

    // === Object ===

    fn has_object(&self) -> bool;

    /// Object held at `time`, `None` when the location has none.
    fn read_object(&self, time: Chrono) -> Result<Option<Object>>;

    /// Selected primitive variables of the object held at `time`.
    fn read_object_primitive_variables(
        &self,
        names: &[&str],
        time: Chrono,
    ) -> Result<PrimitiveVariableMap> {
        let object = self
            .read_object(time)?
            .ok_or_else(|| Error::ObjectNotFound(path_to_string(&self.path())))?;
        let vars = object.primitive_variables().ok_or_else(|| {
            Error::mismatch("Primitive", object.type_name())
        })?;
        Ok(names
            .iter()
            .filter_map(|n| vars.get(*n).map(|v| (n.to_string(), v.clone())))
            .collect())
    }

    fn write_object(&self, object: &Object, time: Chrono) -> Result<()>;

    // === Hierarchy ===

    fn has_child(&self, name: &str) -> bool;

    fn child_names(&self) -> Vec<Name>;

    fn child_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<SceneRef>>;

    fn child(&self, name: &str) -> Result<SceneRef> {
        self.child_with(name, MissingBehaviour::ThrowIfMissing)?
            .ok_or_else(|| Error::ChildNotFound {
                parent: path_to_string(&self.path()),
                name: name.to_string(),
            })
    }

    fn create_child(&self, name: &str) -> Result<SceneRef>;

    /// Location at an absolute path.
    fn scene_with(&self, path: &[Name], missing: MissingBehaviour) -> Result<Option<SceneRef>>;

    fn scene(&self, path: &[Name]) -> Result<SceneRef> {
        self.scene_with(path, MissingBehaviour::ThrowIfMissing)?
            .ok_or_else(|| Error::SceneNotFound(path_to_string(path)))
    }

    // === Misc ===

    /// Deterministic content hash of one aspect at `time`.
    fn hash(&self, kind: HashType, time: Chrono, h: &mut MurmurHash) -> Result<()> {
        hash_location(self, kind, time, h)
    }

    /// True if anything at or below this location varies over time.
    fn is_time_dependent(&self) -> Result<bool>;

    /// External subtree this location mirrors, if any.
    fn link_target(&self) -> Option<LinkTarget> {
        None
    }

    /// Geometry generated on the fly, which cannot be linked to a file.
    fn has_live_geometry(&self) -> bool {
        false
    }

    /// Header of the backing file, if it has one.
    fn header(&self) -> Option<MetaData> {
        None
    }

    fn as_sampled(&self) -> Option<&dyn SampledSceneInterface> {
        None
    }
}

/// Sampled channel of a location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Bound,
    Transform,
    Object,
    Attribute(Name),
}

impl Channel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bound => "bound",
            Self::Transform => "transform",
            Self::Object => "object",
            Self::Attribute(name) => name,
        }
    }
}

/// Scenes with explicit per-channel samples.
pub trait SampledSceneInterface: SceneInterface {
    /// Sample times of a channel; empty for unsampled channels.
    fn sample_times(&self, channel: &Channel) -> Result<SampleTimes>;

    fn num_samples(&self, channel: &Channel) -> Result<usize> {
        Ok(self.sample_times(channel)?.len())
    }

    fn sample_time(&self, channel: &Channel, index: usize) -> Result<Chrono> {
        self.sample_times(channel)?.time(index).ok_or_else(|| {
            Error::invalid(format!("sample {index} out of range for {}", channel.as_str()))
        })
    }

    /// `(floor, ceil, alpha)` around `time`, `None` without samples.
    fn sample_interval(&self, channel: &Channel, time: Chrono) -> Result<Option<(usize, usize, f64)>> {
        Ok(self.sample_times(channel)?.sample_interval(time))
    }

    fn read_bound_at_sample(&self, index: usize) -> Result<Box3d>;

    fn read_transform_at_sample(&self, index: usize) -> Result<DMat4>;

    fn read_attribute_at_sample(&self, name: &str, index: usize) -> Result<crate::object::Data>;

    fn read_object_at_sample(&self, index: usize) -> Result<Object>;
}

/// Hash built from the public read contract. Identical content hashes
/// identically regardless of which scene type serves it.
pub fn hash_location<S: SceneInterface + ?Sized>(
    scene: &S,
    kind: HashType,
    time: Chrono,
    h: &mut MurmurHash,
) -> Result<()> {
    h.append_str(kind.as_str());
    match kind {
        HashType::Transform => {
            let m = scene.read_transform_as_matrix(time)?;
            h.append_bytes(bytemuck::bytes_of(&m));
        }
        HashType::Bound => {
            let b = scene.read_bound(time)?;
            if b.is_empty() {
                h.append_str("empty");
            } else {
                h.append_bytes(bytemuck::bytes_of(&b));
            }
        }
        HashType::Attributes => {
            let mut names = scene.attribute_names();
            names.sort();
            for name in names {
                h.append_str(&name);
                scene.read_attribute(&name, time)?.hash(h);
            }
        }
        HashType::Object => match scene.read_object(time)? {
            Some(object) => object.hash(h),
            None => {
                h.append_str("none");
            }
        },
        HashType::ChildNames => {
            let mut names = scene.child_names();
            names.sort();
            for name in names {
                h.append_str(&name);
            }
        }
        HashType::Hierarchy => {
            for kind in [
                HashType::Transform,
                HashType::Bound,
                HashType::Attributes,
                HashType::Object,
                HashType::ChildNames,
            ] {
                scene.hash(kind, time, h)?;
            }
            let mut names = scene.child_names();
            names.sort();
            for name in names {
                scene.child(&name)?.hash(HashType::Hierarchy, time, h)?;
            }
        }
    }
    Ok(())
}
