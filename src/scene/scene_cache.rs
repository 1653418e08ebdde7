//! File-backed scene.
//!
//! Writers accumulate the whole hierarchy in memory and serialize it on
//! flush (explicit, or when the last handle to the file is dropped). Readers
//! parse node directories lazily and cache sample tables per node.
//!
//! Node layout inside the container:
//!
//! ```text
//! header                     serialized MetaData
//! root/
//!   transform/ bound/ object/     sampleTimes, 0, 1, ...   (object also has `type`)
//!   attributes/<name>/            sampleTimes, 0, 1, ...
//!   tags/                         local, descendant
//!   children/<name>/              same layout, recursively
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path as FsPath;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::core::{
    object_type_tag, Channel, HashType, MetaData, MissingBehaviour, MurmurHash, OpenMode,
    SampleTimes, SampledSceneInterface, SceneInterface, SceneRef, TagFilter, TagSet,
};
use crate::io::codec::{
    decode_box3d, decode_data, decode_f64s, decode_m44d, decode_names, decode_object,
    encode_box3d, encode_data, encode_f64s, encode_m44d, encode_names, encode_object,
};
use crate::io::{IArchive, IDirectory, OArchive, ODirectory};
use crate::object::{Data, Object};
use crate::util::{path_to_string, Box3d, Chrono, DMat4, Error, Name, Path, Result};

const HEADER_ENTRY: &str = "header";
const ROOT_ENTRY: &str = "root";
const TRANSFORM_ENTRY: &str = "transform";
const BOUND_ENTRY: &str = "bound";
const OBJECT_ENTRY: &str = "object";
const OBJECT_TYPE_ENTRY: &str = "type";
const ATTRIBUTES_ENTRY: &str = "attributes";
const TAGS_ENTRY: &str = "tags";
const LOCAL_TAGS_ENTRY: &str = "local";
const DESCENDANT_TAGS_ENTRY: &str = "descendant";
const CHILDREN_ENTRY: &str = "children";
const SAMPLE_TIMES_ENTRY: &str = "sampleTimes";

/// Root attribute listing the paths of link locations, one string each.
pub const LINK_LOCATIONS_ATTRIBUTE: &str = "linkLocations";

/// Name reported by the root location.
pub const ROOT_NAME: &str = "/";

/// Reject names that cannot be path components.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::usage(format!("invalid location name '{name}'")));
    }
    Ok(())
}

// ============================================================================
// Writer
// ============================================================================

/// Sample times with one value per time.
#[derive(Clone, Debug)]
struct Samples<T> {
    times: SampleTimes,
    values: Vec<T>,
}

impl<T> Default for Samples<T> {
    fn default() -> Self {
        Self {
            times: SampleTimes::new(),
            values: Vec::new(),
        }
    }
}

impl<T> Samples<T> {
    /// Append, or overwrite the last sample when `time` repeats it.
    fn push(&mut self, channel: &str, time: Chrono, value: T) -> Result<()> {
        if self.times.push(channel, time)? {
            self.values.push(value);
        } else if let Some(last) = self.values.last_mut() {
            *last = value;
        }
        Ok(())
    }

    fn held(&self, time: Chrono) -> Option<&T> {
        self.times.floor_index(time).map(|i| &self.values[i])
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Default)]
struct WriterState {
    transform: Samples<DMat4>,
    bound: Samples<Box3d>,
    /// Encoded objects with their bounds.
    object: Samples<(Vec<u8>, Option<Box3d>)>,
    object_type: Option<&'static str>,
    attributes: BTreeMap<Name, Samples<Data>>,
    local_tags: TagSet,
    /// Descendant tags written directly (link locations).
    descendant_tags: TagSet,
    children: BTreeMap<Name, Arc<WriterNode>>,
}

struct WriterNode {
    name: Name,
    path: Path,
    state: Mutex<WriterState>,
}

impl WriterNode {
    fn new(name: Name, path: Path) -> Self {
        Self {
            name,
            path,
            state: Mutex::new(WriterState::default()),
        }
    }

    fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

/// A flushed node: its directory plus what the parent needs for bounds and
/// descendant tags.
struct BuiltNode {
    dir: ODirectory,
    bound: Samples<Box3d>,
    transform: Samples<DMat4>,
    /// Local and descendant tags together.
    subtree_tags: TagSet,
}

fn put_samples<T>(dir: &mut ODirectory, samples: &Samples<T>, encode: impl Fn(&T) -> Vec<u8>) {
    if samples.is_empty() {
        return;
    }
    dir.put(SAMPLE_TIMES_ENTRY, encode_f64s(samples.times.as_slice()));
    for (i, v) in samples.values.iter().enumerate() {
        dir.put(&i.to_string(), encode(v));
    }
}

/// Bound samples over the union of object, explicit bound and child
/// bound/transform times, with held lookups at each time.
fn compute_bounds(state: &WriterState, children: &[(Name, BuiltNode)]) -> Result<Samples<Box3d>> {
    let mut times: Vec<Chrono> = Vec::new();
    if state.object.values.iter().any(|(_, b)| b.is_some()) {
        times.extend_from_slice(state.object.times.as_slice());
    }
    times.extend_from_slice(state.bound.times.as_slice());
    for (_, child) in children {
        if child.bound.is_empty() {
            continue;
        }
        times.extend_from_slice(child.bound.times.as_slice());
        times.extend_from_slice(child.transform.times.as_slice());
    }
    times.sort_by(|a, b| a.total_cmp(b));
    times.dedup();

    let mut out = Samples::default();
    for &t in &times {
        let mut b = Box3d::EMPTY;
        if let Some((_, Some(ob))) = state.object.held(t) {
            b.expand_by_box(ob);
        }
        if let Some(explicit) = state.bound.held(t) {
            b.expand_by_box(explicit);
        }
        for (_, child) in children {
            if let Some(cb) = child.bound.held(t) {
                let m = child.transform.held(t).copied().unwrap_or(DMat4::IDENTITY);
                b.expand_by_box(&cb.transformed(&m));
            }
        }
        out.push(BOUND_ENTRY, t, b)?;
    }

    // Identical samples collapse to one so static content stays static.
    if out.values.len() > 1 && out.values.windows(2).all(|w| w[0] == w[1]) {
        let first_time = out.times.as_slice()[0];
        let first = out.values[0];
        out = Samples::default();
        out.push(BOUND_ENTRY, first_time, first)?;
    }
    Ok(out)
}

fn build_node(node: &WriterNode) -> Result<BuiltNode> {
    let state = node.state.lock();

    let mut children = Vec::with_capacity(state.children.len());
    for (name, child) in &state.children {
        children.push((name.clone(), build_node(child)?));
    }

    let bound = compute_bounds(&state, &children)?;

    let mut descendant = state.descendant_tags.clone();
    for (_, child) in &children {
        descendant.extend(child.subtree_tags.iter().cloned());
    }

    let mut dir = ODirectory::new();
    put_samples(dir.directory_mut(TRANSFORM_ENTRY), &state.transform, encode_m44d);
    put_samples(dir.directory_mut(BOUND_ENTRY), &bound, encode_box3d);
    if let Some(type_name) = state.object_type {
        let object_dir = dir.directory_mut(OBJECT_ENTRY);
        object_dir.put(OBJECT_TYPE_ENTRY, type_name.as_bytes().to_vec());
        put_samples(object_dir, &state.object, |(bytes, _)| bytes.clone());
    }
    if !state.attributes.is_empty() {
        let attrs = dir.directory_mut(ATTRIBUTES_ENTRY);
        for (name, samples) in &state.attributes {
            put_samples(attrs.directory_mut(name), samples, encode_data);
        }
    }
    if !state.local_tags.is_empty() || !descendant.is_empty() {
        let tags = dir.directory_mut(TAGS_ENTRY);
        tags.put(LOCAL_TAGS_ENTRY, encode_names(state.local_tags.iter()));
        tags.put(DESCENDANT_TAGS_ENTRY, encode_names(descendant.iter()));
    }

    let mut subtree_tags = state.local_tags.clone();
    subtree_tags.extend(descendant);

    let children_dir = dir.directory_mut(CHILDREN_ENTRY);
    for (name, child) in children {
        children_dir.insert_directory(&name, child.dir);
    }

    Ok(BuiltNode {
        dir,
        bound,
        transform: state.transform.clone(),
        subtree_tags,
    })
}

struct WriterFileState {
    /// `None` once flushed.
    output: Option<OArchive>,
    header: MetaData,
    link_locations: BTreeSet<String>,
}

/// Shared by every writer handle of one file; flushes when the last one
/// goes away.
struct WriterArchive {
    file_name: String,
    root: Arc<WriterNode>,
    state: Mutex<WriterFileState>,
}

impl WriterArchive {
    fn is_flushed(&self) -> bool {
        self.state.lock().output.is_none()
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let Some(output) = state.output.take() else {
            return Ok(());
        };

        if !state.link_locations.is_empty() {
            let paths: Vec<String> = state.link_locations.iter().cloned().collect();
            let mut root = self.root.state.lock();
            root.attributes
                .entry(Name::from(LINK_LOCATIONS_ATTRIBUTE))
                .or_default()
                .push(LINK_LOCATIONS_ATTRIBUTE, 0.0, Data::StringVector(paths))?;
        }

        let built = build_node(&self.root)?;
        let mut container = ODirectory::new();
        container.put(
            HEADER_ENTRY,
            MetaData::scene_header(&state.header).serialize().into_bytes(),
        );
        container.insert_directory(ROOT_ENTRY, built.dir);
        output.finish(&container)?;
        debug!(file = %self.file_name, "flushed scene cache");
        Ok(())
    }
}

impl Drop for WriterArchive {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(file = %self.file_name, error = %e, "failed to flush scene cache");
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Get the cached value or load and cache it.
fn cached<T>(cell: &OnceLock<T>, load: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(v) = cell.get() {
        return Ok(v);
    }
    let v = load()?;
    Ok(cell.get_or_init(|| v))
}

fn load_sample_times(dir: Option<&IDirectory>) -> Result<SampleTimes> {
    match dir {
        Some(d) if d.has_data(SAMPLE_TIMES_ENTRY) => {
            SampleTimes::from_vec(decode_f64s(&d.read(SAMPLE_TIMES_ENTRY)?)?)
        }
        _ => Ok(SampleTimes::new()),
    }
}

/// A channel directory with its sample table.
struct ChannelData {
    dir: Option<IDirectory>,
    times: SampleTimes,
}

impl ChannelData {
    fn load(parent: &IDirectory, name: &str) -> Result<Self> {
        let dir = if parent.has_directory(name) {
            Some(parent.directory(name)?)
        } else {
            None
        };
        let times = load_sample_times(dir.as_ref())?;
        Ok(Self { dir, times })
    }

    fn read_sample(&self, index: usize) -> Result<Vec<u8>> {
        match &self.dir {
            Some(d) if index < self.times.len() => d.read(&index.to_string()),
            _ => Err(Error::invalid(format!("sample {index} out of range"))),
        }
    }

    /// True when at least two samples hold different values.
    fn varies(&self) -> Result<bool> {
        if !self.times.is_animated() {
            return Ok(false);
        }
        let first = self.read_sample(0)?;
        for i in 1..self.times.len() {
            if self.read_sample(i)? != first {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_held(&self, time: Chrono) -> Result<Option<Vec<u8>>> {
        match self.times.floor_index(time) {
            Some(i) => self.read_sample(i).map(Some),
            None => Ok(None),
        }
    }
}

struct ReaderNode {
    name: Name,
    path: Path,
    dir: IDirectory,
    parent: Option<Arc<ReaderNode>>,
    transform: OnceLock<ChannelData>,
    bound: OnceLock<ChannelData>,
    object: OnceLock<ChannelData>,
    attributes: OnceLock<Option<IDirectory>>,
    children: OnceLock<Option<IDirectory>>,
    local_tags: OnceLock<TagSet>,
    descendant_tags: OnceLock<TagSet>,
    ancestor_tags: OnceLock<TagSet>,
    time_dependent: OnceLock<bool>,
}

impl ReaderNode {
    fn new(name: Name, path: Path, dir: IDirectory, parent: Option<Arc<ReaderNode>>) -> Self {
        Self {
            name,
            path,
            dir,
            parent,
            transform: OnceLock::new(),
            bound: OnceLock::new(),
            object: OnceLock::new(),
            attributes: OnceLock::new(),
            children: OnceLock::new(),
            local_tags: OnceLock::new(),
            descendant_tags: OnceLock::new(),
            ancestor_tags: OnceLock::new(),
            time_dependent: OnceLock::new(),
        }
    }

    fn sub_directory(&self, name: &str) -> Result<Option<IDirectory>> {
        if self.dir.has_directory(name) {
            Ok(Some(self.dir.directory(name)?))
        } else {
            Ok(None)
        }
    }

    fn channel(&self, channel: &Channel) -> Result<ChannelData> {
        match channel {
            Channel::Attribute(name) => match self.attributes_dir()? {
                Some(attrs) => ChannelData::load(attrs, name),
                None => Ok(ChannelData { dir: None, times: SampleTimes::new() }),
            },
            // Fixed channels are cached; callers go through the accessors.
            _ => Err(Error::usage("fixed channels are read through their accessors")),
        }
    }

    fn transform(&self) -> Result<&ChannelData> {
        cached(&self.transform, || ChannelData::load(&self.dir, TRANSFORM_ENTRY))
    }

    fn bound(&self) -> Result<&ChannelData> {
        cached(&self.bound, || ChannelData::load(&self.dir, BOUND_ENTRY))
    }

    fn object(&self) -> Result<&ChannelData> {
        cached(&self.object, || ChannelData::load(&self.dir, OBJECT_ENTRY))
    }

    fn fixed_channel(&self, channel: &Channel) -> Result<Option<&ChannelData>> {
        Ok(match channel {
            Channel::Transform => Some(self.transform()?),
            Channel::Bound => Some(self.bound()?),
            Channel::Object => Some(self.object()?),
            Channel::Attribute(_) => None,
        })
    }

    fn attributes_dir(&self) -> Result<Option<&IDirectory>> {
        Ok(cached(&self.attributes, || self.sub_directory(ATTRIBUTES_ENTRY))?.as_ref())
    }

    fn children_dir(&self) -> Result<Option<&IDirectory>> {
        Ok(cached(&self.children, || self.sub_directory(CHILDREN_ENTRY))?.as_ref())
    }

    fn object_type(&self) -> Result<Option<String>> {
        match &self.object()?.dir {
            Some(d) if d.has_data(OBJECT_TYPE_ENTRY) => {
                Ok(Some(String::from_utf8(d.read(OBJECT_TYPE_ENTRY)?)?))
            }
            _ => Ok(None),
        }
    }

    fn stored_tags(&self, entry: &str) -> Result<TagSet> {
        match self.sub_directory(TAGS_ENTRY)? {
            Some(tags) if tags.has_data(entry) => {
                Ok(decode_names(&tags.read(entry)?)?.into_iter().collect())
            }
            _ => Ok(TagSet::new()),
        }
    }

    fn local_tags(&self) -> Result<&TagSet> {
        cached(&self.local_tags, || {
            let mut tags = self.stored_tags(LOCAL_TAGS_ENTRY)?;
            if let Some(type_name) = self.object_type()? {
                tags.insert(object_type_tag(&type_name));
            }
            Ok(tags)
        })
    }

    fn descendant_tags(&self) -> Result<&TagSet> {
        cached(&self.descendant_tags, || self.stored_tags(DESCENDANT_TAGS_ENTRY))
    }

    /// Union of the local tags of every strict ancestor, built from the
    /// parent chain.
    fn ancestor_tags(&self) -> Result<&TagSet> {
        cached(&self.ancestor_tags, || {
            let Some(parent) = &self.parent else {
                return Ok(TagSet::new());
            };
            let mut tags = parent.ancestor_tags()?.clone();
            tags.extend(parent.local_tags()?.iter().cloned());
            Ok(tags)
        })
    }

    fn child_names(&self) -> Result<Vec<Name>> {
        Ok(match self.children_dir()? {
            Some(d) => d.names().map(Name::from).collect(),
            None => Vec::new(),
        })
    }

    fn child(self: &Arc<Self>, name: &str) -> Result<Option<Arc<ReaderNode>>> {
        let Some(children) = self.children_dir()? else {
            return Ok(None);
        };
        if !children.has_directory(name) {
            return Ok(None);
        }
        let mut path = self.path.clone();
        path.push(Name::from(name));
        Ok(Some(Arc::new(ReaderNode::new(
            Name::from(name),
            path,
            children.directory(name)?,
            Some(self.clone()),
        ))))
    }

    fn attribute_names(&self) -> Result<Vec<Name>> {
        Ok(match self.attributes_dir()? {
            Some(d) => d.names().map(Name::from).collect(),
            None => Vec::new(),
        })
    }

    fn is_time_dependent(self: &Arc<Self>) -> Result<bool> {
        if let Some(v) = self.time_dependent.get() {
            return Ok(*v);
        }
        let mut animated =
            self.transform()?.varies()? || self.bound()?.varies()? || self.object()?.varies()?;
        if !animated {
            for name in self.attribute_names()? {
                if self.channel(&Channel::Attribute(name))?.varies()? {
                    animated = true;
                    break;
                }
            }
        }
        if !animated {
            for name in self.child_names()? {
                if let Some(child) = self.child(&name)? {
                    if child.is_time_dependent()? {
                        animated = true;
                        break;
                    }
                }
            }
        }
        Ok(*self.time_dependent.get_or_init(|| animated))
    }
}

struct ReaderArchive {
    file_name: String,
    header: MetaData,
    root: Arc<ReaderNode>,
}

// ============================================================================
// Public handle
// ============================================================================

enum Handle {
    Reader {
        archive: Arc<ReaderArchive>,
        node: Arc<ReaderNode>,
    },
    Writer {
        archive: Arc<WriterArchive>,
        node: Arc<WriterNode>,
    },
}

/// A location in a scene cache file, opened for reading or writing.
pub struct SceneCache {
    handle: Handle,
}

impl SceneCache {
    /// Open a scene cache file at its root.
    ///
    /// `Read` fails for missing or malformed files, `Write` truncates,
    /// `CreateNew` refuses existing files and `Append` is not supported.
    pub fn open(path: impl AsRef<FsPath>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path.display().to_string();
        match mode {
            OpenMode::Read => {
                let archive = IArchive::open(path)?;
                let top = archive.root();
                let header = MetaData::parse(&String::from_utf8(top.read(HEADER_ENTRY)?)?);
                let root = Arc::new(ReaderNode::new(
                    Name::from(ROOT_NAME),
                    Path::new(),
                    top.directory(ROOT_ENTRY)?,
                    None,
                ));
                debug!(file = %file_name, "opened scene cache for reading");
                Ok(Self {
                    handle: Handle::Reader {
                        archive: Arc::new(ReaderArchive { file_name, header, root: root.clone() }),
                        node: root,
                    },
                })
            }
            OpenMode::Write | OpenMode::CreateNew => {
                let output = if mode == OpenMode::CreateNew {
                    OArchive::create_new(path)?
                } else {
                    OArchive::create(path)?
                };
                let root = Arc::new(WriterNode::new(Name::from(ROOT_NAME), Path::new()));
                debug!(file = %file_name, "opened scene cache for writing");
                Ok(Self {
                    handle: Handle::Writer {
                        archive: Arc::new(WriterArchive {
                            file_name,
                            root: root.clone(),
                            state: Mutex::new(WriterFileState {
                                output: Some(output),
                                header: MetaData::new(),
                                link_locations: BTreeSet::new(),
                            }),
                        }),
                        node: root,
                    },
                })
            }
            OpenMode::Append => Err(Error::usage("scene caches cannot be opened for append")),
        }
    }

    /// True for handles of a file being written.
    pub fn is_writer(&self) -> bool {
        matches!(self.handle, Handle::Writer { .. })
    }

    /// Header of a file opened for reading.
    pub fn read_header(&self) -> Result<MetaData> {
        match &self.handle {
            Handle::Reader { archive, .. } => Ok(archive.header.clone()),
            Handle::Writer { .. } => Err(Error::WriteOnly("read_header")),
        }
    }

    /// Add an entry to the header written on flush.
    pub fn write_header_entry(&self, key: &str, value: &str) -> Result<()> {
        let archive = self.writer_archive()?;
        let mut state = archive.state.lock();
        if state.output.is_none() {
            return Err(Error::Flushed);
        }
        state.header.set(key, value);
        Ok(())
    }

    /// Zlib level (0-9) used for the data blocks of this file.
    pub fn set_compression_level(&self, level: u32) -> Result<()> {
        let archive = self.writer_archive()?;
        let mut state = archive.state.lock();
        match state.output.as_mut() {
            Some(output) => {
                output.set_compression_level(level);
                Ok(())
            }
            None => Err(Error::Flushed),
        }
    }

    /// Write the file now. Later writes fail with `Flushed`; flushing twice
    /// is a no-op. Readers ignore this call.
    pub fn flush(&self) -> Result<()> {
        match &self.handle {
            Handle::Writer { archive, .. } => archive.flush(),
            Handle::Reader { .. } => Ok(()),
        }
    }

    /// Add tags to the descendant set of this location, as if a location
    /// below it carried them.
    pub fn write_descendant_tags(&self, tags: &[Name]) -> Result<()> {
        let node = self.writable()?;
        node.state.lock().descendant_tags.extend(tags.iter().cloned());
        Ok(())
    }

    /// Record this location in the root's `linkLocations` attribute.
    pub fn add_link_location(&self) -> Result<()> {
        let (archive, node) = match &self.handle {
            Handle::Writer { archive, node } => (archive, node),
            Handle::Reader { .. } => return Err(Error::ReadOnly),
        };
        let mut state = archive.state.lock();
        if state.output.is_none() {
            return Err(Error::Flushed);
        }
        state.link_locations.insert(path_to_string(&node.path));
        Ok(())
    }

    fn writer_archive(&self) -> Result<&Arc<WriterArchive>> {
        match &self.handle {
            Handle::Writer { archive, .. } => Ok(archive),
            Handle::Reader { .. } => Err(Error::ReadOnly),
        }
    }

    /// Writer node, if still writable.
    fn writable(&self) -> Result<&Arc<WriterNode>> {
        match &self.handle {
            Handle::Writer { archive, node } => {
                if archive.is_flushed() {
                    return Err(Error::Flushed);
                }
                Ok(node)
            }
            Handle::Reader { .. } => Err(Error::ReadOnly),
        }
    }

    fn reader(&self, operation: &'static str) -> Result<&Arc<ReaderNode>> {
        match &self.handle {
            Handle::Reader { node, .. } => Ok(node),
            Handle::Writer { .. } => Err(Error::WriteOnly(operation)),
        }
    }

    fn path_string(&self) -> String {
        path_to_string(&self.path())
    }

    fn reader_handle(&self, node: Arc<ReaderNode>) -> Result<Arc<SceneCache>> {
        match &self.handle {
            Handle::Reader { archive, .. } => Ok(Arc::new(SceneCache {
                handle: Handle::Reader {
                    archive: archive.clone(),
                    node,
                },
            })),
            Handle::Writer { .. } => Err(Error::WriteOnly("child")),
        }
    }

    fn writer_handle(&self, node: Arc<WriterNode>) -> Result<Arc<SceneCache>> {
        match &self.handle {
            Handle::Writer { archive, .. } => Ok(Arc::new(SceneCache {
                handle: Handle::Writer {
                    archive: archive.clone(),
                    node,
                },
            })),
            Handle::Reader { .. } => Err(Error::ReadOnly),
        }
    }

    /// Typed counterpart of [`SceneInterface::child_with`].
    pub fn child_cache(
        &self,
        name: &str,
        missing: MissingBehaviour,
    ) -> Result<Option<Arc<SceneCache>>> {
        let found = match &self.handle {
            Handle::Reader { node, .. } => match node.child(name)? {
                Some(child) => return self.reader_handle(child).map(Some),
                None => None,
            },
            Handle::Writer { node, .. } => node.state.lock().children.get(name).cloned(),
        };
        if let Some(child) = found {
            return self.writer_handle(child).map(Some);
        }
        match missing {
            MissingBehaviour::ThrowIfMissing => Err(Error::ChildNotFound {
                parent: self.path_string(),
                name: name.to_string(),
            }),
            MissingBehaviour::NullIfMissing => Ok(None),
            MissingBehaviour::CreateIfMissing => self.create_child_cache(name).map(Some),
        }
    }

    /// Typed counterpart of [`SceneInterface::create_child`].
    pub fn create_child_cache(&self, name: &str) -> Result<Arc<SceneCache>> {
        let node = self.writable()?;
        validate_name(name)?;
        let mut path = node.path.clone();
        path.push(Name::from(name));
        let child = {
            let mut state = node.state.lock();
            if state.children.contains_key(name) {
                return Err(Error::DuplicateChild(path_to_string(&path)));
            }
            let child = Arc::new(WriterNode::new(Name::from(name), path));
            state.children.insert(Name::from(name), child.clone());
            child
        };
        self.writer_handle(child)
    }

    /// Typed counterpart of [`SceneInterface::scene_with`].
    pub fn scene_cache_at(
        &self,
        path: &[Name],
        missing: MissingBehaviour,
    ) -> Result<Option<Arc<SceneCache>>> {
        let mut current = match &self.handle {
            Handle::Reader { archive, .. } => self.reader_handle(archive.root.clone())?,
            Handle::Writer { archive, .. } => self.writer_handle(archive.root.clone())?,
        };
        for name in path {
            let next = match current.child_cache(name, MissingBehaviour::NullIfMissing)? {
                Some(next) => next,
                None => match missing {
                    MissingBehaviour::ThrowIfMissing => {
                        return Err(Error::SceneNotFound(path_to_string(path)))
                    }
                    MissingBehaviour::NullIfMissing => return Ok(None),
                    MissingBehaviour::CreateIfMissing => current.create_child_cache(name)?,
                },
            };
            current = next;
        }
        Ok(Some(current))
    }

    fn attribute_channel(&self, name: &str) -> Result<ChannelData> {
        let node = self.reader("read_attribute")?;
        let channel = node.channel(&Channel::Attribute(Name::from(name)))?;
        if channel.times.is_empty() {
            return Err(Error::AttributeNotFound {
                path: self.path_string(),
                name: name.to_string(),
            });
        }
        Ok(channel)
    }
}

impl std::fmt::Debug for SceneCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneCache")
            .field("file_name", &self.file_name())
            .field("path", &self.path_string())
            .finish()
    }
}

impl SceneInterface for SceneCache {
    fn file_name(&self) -> String {
        match &self.handle {
            Handle::Reader { archive, .. } => archive.file_name.clone(),
            Handle::Writer { archive, .. } => archive.file_name.clone(),
        }
    }

    fn name(&self) -> Name {
        match &self.handle {
            Handle::Reader { node, .. } => node.name.clone(),
            Handle::Writer { node, .. } => node.name.clone(),
        }
    }

    fn path(&self) -> Path {
        match &self.handle {
            Handle::Reader { node, .. } => node.path.clone(),
            Handle::Writer { node, .. } => node.path.clone(),
        }
    }

    fn has_bound(&self) -> bool {
        match &self.handle {
            Handle::Reader { node, .. } => node.bound().is_ok_and(|b| !b.times.is_empty()),
            Handle::Writer { node, .. } => !node.state.lock().bound.is_empty(),
        }
    }

    fn read_bound(&self, time: Chrono) -> Result<Box3d> {
        let node = self.reader("read_bound")?;
        match node.bound()?.read_held(time)? {
            Some(bytes) => decode_box3d(&bytes),
            None => Ok(Box3d::EMPTY),
        }
    }

    fn write_bound(&self, bound: &Box3d, time: Chrono) -> Result<()> {
        let node = self.writable()?;
        node.state.lock().bound.push(BOUND_ENTRY, time, *bound)
    }

    fn read_transform_as_matrix(&self, time: Chrono) -> Result<DMat4> {
        let node = self.reader("read_transform")?;
        match node.transform()?.read_held(time)? {
            Some(bytes) => decode_m44d(&bytes),
            None => Ok(DMat4::IDENTITY),
        }
    }

    fn write_transform(&self, matrix: &DMat4, time: Chrono) -> Result<()> {
        let node = self.writable()?;
        if node.is_root() {
            return Err(Error::usage("writing a transform at the root is not allowed"));
        }
        node.state.lock().transform.push(TRANSFORM_ENTRY, time, *matrix)
    }

    fn has_attribute(&self, name: &str) -> bool {
        match &self.handle {
            Handle::Reader { node, .. } => node
                .attributes_dir()
                .is_ok_and(|d| d.is_some_and(|d| d.has_directory(name))),
            Handle::Writer { node, .. } => node.state.lock().attributes.contains_key(name),
        }
    }

    fn attribute_names(&self) -> Vec<Name> {
        match &self.handle {
            Handle::Reader { node, .. } => node.attribute_names().unwrap_or_default(),
            Handle::Writer { node, .. } => node.state.lock().attributes.keys().cloned().collect(),
        }
    }

    fn read_attribute(&self, name: &str, time: Chrono) -> Result<Data> {
        let channel = self.attribute_channel(name)?;
        match channel.read_held(time)? {
            Some(bytes) => decode_data(&bytes),
            None => Err(Error::AttributeNotFound {
                path: self.path_string(),
                name: name.to_string(),
            }),
        }
    }

    fn write_attribute(&self, name: &str, value: &Data, time: Chrono) -> Result<()> {
        let node = self.writable()?;
        validate_name(name)?;
        node.state
            .lock()
            .attributes
            .entry(Name::from(name))
            .or_default()
            .push(name, time, value.clone())
    }

    fn has_tag(&self, name: &str, filter: TagFilter) -> bool {
        match &self.handle {
            Handle::Reader { node, .. } => {
                (filter.contains(TagFilter::LOCAL)
                    && node.local_tags().is_ok_and(|t| t.contains(name)))
                    || (filter.contains(TagFilter::DESCENDANT)
                        && node.descendant_tags().is_ok_and(|t| t.contains(name)))
                    || (filter.contains(TagFilter::ANCESTOR)
                        && node.ancestor_tags().is_ok_and(|t| t.contains(name)))
            }
            Handle::Writer { node, .. } => {
                filter.contains(TagFilter::LOCAL) && node.state.lock().local_tags.contains(name)
            }
        }
    }

    fn read_tags(&self, filter: TagFilter) -> Result<Vec<Name>> {
        match &self.handle {
            Handle::Reader { node, .. } => {
                let mut out = TagSet::new();
                if filter.contains(TagFilter::LOCAL) {
                    out.extend(node.local_tags()?.iter().cloned());
                }
                if filter.contains(TagFilter::DESCENDANT) {
                    out.extend(node.descendant_tags()?.iter().cloned());
                }
                if filter.contains(TagFilter::ANCESTOR) {
                    out.extend(node.ancestor_tags()?.iter().cloned());
                }
                Ok(out.into_iter().collect())
            }
            Handle::Writer { node, .. } => {
                if filter != TagFilter::LOCAL {
                    return Err(Error::usage(
                        "only local tags can be read while the hierarchy is being written",
                    ));
                }
                Ok(node.state.lock().local_tags.iter().cloned().collect())
            }
        }
    }

    fn write_tags(&self, tags: &[Name]) -> Result<()> {
        let node = self.writable()?;
        node.state.lock().local_tags.extend(tags.iter().cloned());
        Ok(())
    }

    fn has_object(&self) -> bool {
        match &self.handle {
            Handle::Reader { node, .. } => node.object().is_ok_and(|o| !o.times.is_empty()),
            Handle::Writer { node, .. } => !node.state.lock().object.is_empty(),
        }
    }

    fn read_object(&self, time: Chrono) -> Result<Option<Object>> {
        let node = self.reader("read_object")?;
        match node.object()?.read_held(time)? {
            Some(bytes) => decode_object(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn write_object(&self, object: &Object, time: Chrono) -> Result<()> {
        let node = self.writable()?;
        if node.is_root() {
            return Err(Error::usage("writing an object at the root is not allowed"));
        }
        let mut state = node.state.lock();
        let type_name = object.type_name();
        match state.object_type {
            Some(expected) if expected != type_name => {
                return Err(Error::ObjectTypeChanged {
                    path: path_to_string(&node.path),
                    expected: expected.to_string(),
                    actual: type_name.to_string(),
                });
            }
            _ => {}
        }
        state
            .object
            .push(OBJECT_ENTRY, time, (encode_object(object), object.bound()))?;
        state.object_type = Some(type_name);
        state.local_tags.insert(object_type_tag(type_name));
        Ok(())
    }

    fn has_child(&self, name: &str) -> bool {
        match &self.handle {
            Handle::Reader { node, .. } => node
                .children_dir()
                .is_ok_and(|d| d.is_some_and(|d| d.has_directory(name))),
            Handle::Writer { node, .. } => node.state.lock().children.contains_key(name),
        }
    }

    fn child_names(&self) -> Vec<Name> {
        match &self.handle {
            Handle::Reader { node, .. } => node.child_names().unwrap_or_default(),
            Handle::Writer { node, .. } => node.state.lock().children.keys().cloned().collect(),
        }
    }

    fn child_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        Ok(self.child_cache(name, missing)?.map(|c| c as SceneRef))
    }

    fn create_child(&self, name: &str) -> Result<SceneRef> {
        Ok(self.create_child_cache(name)?)
    }

    fn scene_with(&self, path: &[Name], missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        Ok(self.scene_cache_at(path, missing)?.map(|c| c as SceneRef))
    }

    fn hash(&self, kind: HashType, time: Chrono, h: &mut MurmurHash) -> Result<()> {
        self.reader("hash")?;
        crate::core::hash_location(self, kind, time, h)
    }

    fn is_time_dependent(&self) -> Result<bool> {
        self.reader("is_time_dependent")?.is_time_dependent()
    }

    fn header(&self) -> Option<MetaData> {
        self.read_header().ok()
    }

    fn as_sampled(&self) -> Option<&dyn SampledSceneInterface> {
        match self.handle {
            Handle::Reader { .. } => Some(self),
            Handle::Writer { .. } => None,
        }
    }
}

impl SampledSceneInterface for SceneCache {
    fn sample_times(&self, channel: &Channel) -> Result<SampleTimes> {
        let node = self.reader("sample_times")?;
        match node.fixed_channel(channel)? {
            Some(c) => Ok(c.times.clone()),
            None => Ok(node.channel(channel)?.times),
        }
    }

    fn read_bound_at_sample(&self, index: usize) -> Result<Box3d> {
        decode_box3d(&self.reader("read_bound_at_sample")?.bound()?.read_sample(index)?)
    }

    fn read_transform_at_sample(&self, index: usize) -> Result<DMat4> {
        decode_m44d(&self.reader("read_transform_at_sample")?.transform()?.read_sample(index)?)
    }

    fn read_attribute_at_sample(&self, name: &str, index: usize) -> Result<Data> {
        decode_data(&self.attribute_channel(name)?.read_sample(index)?)
    }

    fn read_object_at_sample(&self, index: usize) -> Result<Object> {
        let node = self.reader("read_object_at_sample")?;
        let object = node.object()?;
        if object.times.is_empty() {
            return Err(Error::ObjectNotFound(self.path_string()));
        }
        decode_object(&object.read_sample(index)?)
    }
}
