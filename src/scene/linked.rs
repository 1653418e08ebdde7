//! Scenes that splice subtrees of other scene files in at link locations.
//!
//! A link location carries three attributes in the main file: the linked
//! file name, the root path inside it and optionally a time offset. Reading
//! below a link location reads the linked file at `time - offset(time)`,
//! where the offset is itself a held attribute of the link location.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path as FsPath;
use std::sync::Arc;

use tracing::{debug, error};

use crate::core::{
    Channel, LinkTarget, MetaData, MissingBehaviour, OpenMode, SampleTimes, SampledSceneInterface,
    SceneInterface, SceneRef, TagFilter,
};
use crate::object::{Data, Object};
use crate::util::{path_to_string, string_to_path, Box3d, Chrono, DMat4, Error, Name, Path, Result};

use super::scene_cache::{LINK_LOCATIONS_ATTRIBUTE, ROOT_NAME};
use super::{SceneCache, SharedSceneInterfaces};

/// Composite link attribute; written by [`LinkedScene::write_link`] and
/// stored decomposed into the three attributes below.
pub const LINK_ATTRIBUTE: &str = "sceneInterface:link";
pub const LINK_FILE_NAME_ATTRIBUTE: &str = "sceneInterface:link.fileName";
pub const LINK_ROOT_ATTRIBUTE: &str = "sceneInterface:link.root";
pub const LINK_TIME_ATTRIBUTE: &str = "sceneInterface:link.time";

const FILE_NAME_MEMBER: &str = "fileName";
const ROOT_MEMBER: &str = "root";
const TIME_MEMBER: &str = "time";

fn is_link_attribute(name: &str) -> bool {
    matches!(
        name,
        LINK_ATTRIBUTE | LINK_FILE_NAME_ATTRIBUTE | LINK_ROOT_ATTRIBUTE | LINK_TIME_ATTRIBUTE
    )
}

/// Value of the composite link attribute. The time member is only present
/// when `with_time` is set.
pub fn link_attribute_data(target: &LinkTarget, with_time: bool) -> Data {
    let mut members = BTreeMap::new();
    members.insert(
        FILE_NAME_MEMBER.to_string(),
        Data::String(target.file_name.clone()),
    );
    members.insert(
        ROOT_MEMBER.to_string(),
        Data::InternedStringVector(target.root.clone()),
    );
    if with_time {
        members.insert(TIME_MEMBER.to_string(), Data::Double(target.time_offset));
    }
    Data::Compound(members)
}

/// Inverse of [`link_attribute_data`]; the offset is `None` without a time
/// member.
fn parse_link_data(data: &Data) -> Result<(LinkTarget, Option<Chrono>)> {
    let members = data
        .as_compound()
        .ok_or_else(|| Error::mismatch("CompoundData", data.type_name()))?;
    let file_name = members
        .get(FILE_NAME_MEMBER)
        .and_then(Data::as_str)
        .ok_or_else(|| Error::usage("link attribute needs a string 'fileName' member"))?;
    let root = members
        .get(ROOT_MEMBER)
        .and_then(Data::as_names)
        .ok_or_else(|| Error::usage("link attribute needs an interned string 'root' member"))?;
    let offset = members.get(TIME_MEMBER).and_then(Data::as_f64);
    Ok((
        LinkTarget::new(file_name, root.to_vec(), offset.unwrap_or(0.0)),
        offset,
    ))
}

/// Link paths recorded in the root `linkLocations` attribute.
pub fn read_link_locations(root: &dyn SceneInterface) -> Result<Vec<Path>> {
    if !root.has_attribute(LINK_LOCATIONS_ATTRIBUTE) {
        return Ok(Vec::new());
    }
    match root.read_attribute(LINK_LOCATIONS_ATTRIBUTE, 0.0)? {
        Data::StringVector(paths) => Ok(paths.iter().map(|p| string_to_path(p)).collect()),
        other => Err(Error::mismatch("StringVectorData", other.type_name())),
    }
}

/// Where a location sits relative to links.
#[derive(Clone)]
enum Region {
    /// Ordinary location of the main file.
    Main,
    /// Link location: `linked` is the target root.
    AtLink { linked: SceneRef, target: LinkTarget },
    /// Below a link location: `main` is the link location, `linked` the
    /// corresponding location of the linked file.
    Inside { linked: SceneRef, target: LinkTarget },
}

/// Scene that resolves link locations of a main scene file.
#[derive(Clone)]
pub struct LinkedScene {
    /// Main file location; the link location itself for `Inside`.
    main: SceneRef,
    /// Typed main handle, present for writers.
    writer: Option<Arc<SceneCache>>,
    region: Region,
    /// Offset lookups go through the link location's time attribute.
    time_remapped: bool,
    path: Path,
    shared: Arc<SharedSceneInterfaces>,
    link_locations: Arc<Vec<Path>>,
}

impl LinkedScene {
    /// Open a scene file, resolving links through a private shared cache.
    pub fn open(path: impl AsRef<FsPath>, mode: OpenMode) -> Result<Self> {
        Self::with_shared(path, mode, Arc::new(SharedSceneInterfaces::new()))
    }

    /// Open a scene file, resolving links through `shared`.
    pub fn with_shared(
        path: impl AsRef<FsPath>,
        mode: OpenMode,
        shared: Arc<SharedSceneInterfaces>,
    ) -> Result<Self> {
        let cache = Arc::new(SceneCache::open(path, mode)?);
        if mode.is_write() {
            return Ok(Self::writer_node(cache, shared));
        }
        Self::from_scene_with(cache, shared)
    }

    /// Read-only view of an existing scene with links resolved.
    pub fn from_scene(scene: SceneRef) -> Result<Self> {
        Self::from_scene_with(scene, Arc::new(SharedSceneInterfaces::new()))
    }

    pub fn from_scene_with(scene: SceneRef, shared: Arc<SharedSceneInterfaces>) -> Result<Self> {
        let root = scene.scene(&[])?;
        let link_locations = Arc::new(read_link_locations(root.as_ref())?);
        let path = scene.path();
        Ok(Self::resolve(scene, path, shared, link_locations))
    }

    fn writer_node(cache: Arc<SceneCache>, shared: Arc<SharedSceneInterfaces>) -> Self {
        Self {
            path: cache.path(),
            main: cache.clone(),
            writer: Some(cache),
            region: Region::Main,
            time_remapped: false,
            shared,
            link_locations: Arc::new(Vec::new()),
        }
    }

    /// Wrap a main file location, following its link if it has one.
    fn resolve(
        main: SceneRef,
        path: Path,
        shared: Arc<SharedSceneInterfaces>,
        link_locations: Arc<Vec<Path>>,
    ) -> Self {
        let mut scene = Self {
            main,
            writer: None,
            region: Region::Main,
            time_remapped: false,
            path,
            shared,
            link_locations,
        };
        if scene.main.has_attribute(LINK_FILE_NAME_ATTRIBUTE)
            && scene.main.has_attribute(LINK_ROOT_ATTRIBUTE)
        {
            match scene.expand_link() {
                Ok((linked, target)) => {
                    scene.time_remapped = scene.main.has_attribute(LINK_TIME_ATTRIBUTE);
                    scene.region = Region::AtLink { linked, target };
                }
                Err(e) => {
                    error!(
                        file = %scene.main.file_name(),
                        location = %path_to_string(&scene.path),
                        error = %e,
                        "broken link"
                    );
                }
            }
        }
        scene
    }

    fn expand_link(&self) -> Result<(SceneRef, LinkTarget)> {
        let file_name = match self.main.read_attribute(LINK_FILE_NAME_ATTRIBUTE, 0.0)? {
            Data::String(s) => s,
            other => return Err(Error::mismatch("StringData", other.type_name())),
        };
        let root = match self.main.read_attribute(LINK_ROOT_ATTRIBUTE, 0.0)? {
            Data::InternedStringVector(names) => names,
            other => return Err(Error::mismatch("InternedStringVectorData", other.type_name())),
        };
        let offset = if self.main.has_attribute(LINK_TIME_ATTRIBUTE) {
            self.main
                .read_attribute(LINK_TIME_ATTRIBUTE, 0.0)?
                .as_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let target = LinkTarget::new(file_name, root, offset);
        let linked = self.open_target(&target)?;
        Ok((linked, target))
    }

    fn open_target(&self, target: &LinkTarget) -> Result<SceneRef> {
        let link_error = |reason: String| Error::LinkResolution {
            file: target.file_name.clone(),
            reason,
        };
        let file = self
            .shared
            .get(&target.file_name)
            .map_err(|e| link_error(e.to_string()))?;
        file.scene_with(&target.root, MissingBehaviour::NullIfMissing)
            .map_err(|e| link_error(e.to_string()))?
            .ok_or_else(|| link_error(format!("missing location {}", path_to_string(&target.root))))
    }

    /// Link location paths recorded in the main file.
    pub fn link_locations(&self) -> &[Path] {
        &self.link_locations
    }

    /// True at link locations whose link resolved.
    pub fn is_link_location(&self) -> bool {
        matches!(self.region, Region::AtLink { .. })
    }

    /// Write the main file now; see [`SceneCache::flush`].
    pub fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(cache) => cache.flush(),
            None => Ok(()),
        }
    }

    /// Main file handle of a writer.
    fn writable(&self) -> Result<&Arc<SceneCache>> {
        self.writer.as_ref().ok_or(Error::ReadOnly)
    }

    /// Linked location for reads that go through the link, at link
    /// locations and below.
    fn inside(&self) -> Option<&SceneRef> {
        match &self.region {
            Region::Inside { linked, .. } => Some(linked),
            _ => None,
        }
    }

    fn linked(&self) -> Option<&SceneRef> {
        match &self.region {
            Region::AtLink { linked, .. } | Region::Inside { linked, .. } => Some(linked),
            Region::Main => None,
        }
    }

    /// Query time inside the linked file.
    fn remap(&self, time: Chrono) -> Result<Chrono> {
        if !self.time_remapped {
            return Ok(time);
        }
        let offset = self.main.read_attribute(LINK_TIME_ATTRIBUTE, time)?;
        let offset = offset
            .as_f64()
            .ok_or_else(|| Error::mismatch("DoubleData", offset.type_name()))?;
        Ok(time - offset)
    }

    fn child_path(&self, name: &str) -> Path {
        let mut path = self.path.clone();
        path.push(Name::from(name));
        path
    }

    // === Link writing ===

    /// Link this location to `scene`. Without an offset every bound sample of
    /// the target is copied; with one, the link is written at time 0.
    pub fn write_link(&self, scene: &dyn SceneInterface, time_offset: Option<Chrono>) -> Result<()> {
        let target = LinkTarget::new(scene.file_name(), scene.path(), time_offset.unwrap_or(0.0));
        self.write_link_sample(&target, time_offset, 0.0)
    }

    /// Link this location to `target` at `time`, recording its offset.
    pub fn write_link_target(&self, target: &LinkTarget, time: Chrono) -> Result<()> {
        self.write_link_sample(target, Some(target.time_offset), time)
    }

    fn write_link_sample(&self, target: &LinkTarget, offset: Option<Chrono>, time: Chrono) -> Result<()> {
        let main = self.writable()?;
        let first_time = !main.has_attribute(LINK_FILE_NAME_ATTRIBUTE);
        if first_time && main.has_object() {
            return Err(Error::usage(format!(
                "cannot link {}: the location already has an object",
                path_to_string(&self.path)
            )));
        }

        let linked = self.open_target(target)?;

        let main_children: BTreeSet<Name> = main.child_names().into_iter().collect();
        let clashes: Vec<String> = linked
            .child_names()
            .into_iter()
            .filter(|n| main_children.contains(n))
            .map(|n| n.to_string())
            .collect();
        if !clashes.is_empty() {
            return Err(Error::usage(format!(
                "link at {} clashes with existing children: {}",
                path_to_string(&self.path),
                clashes.join(" ")
            )));
        }

        match (linked.as_sampled(), offset) {
            (Some(sampled), None) => {
                if first_time {
                    let channel = Channel::Bound;
                    for i in 0..sampled.num_samples(&channel)? {
                        main.write_bound(
                            &sampled.read_bound_at_sample(i)?,
                            sampled.sample_time(&channel, i)?,
                        )?;
                    }
                }
            }
            _ => {
                let bound = linked.read_bound(time - offset.unwrap_or(0.0))?;
                main.write_bound(&bound, time)?;
            }
        }

        if first_time {
            let ancestors = linked.read_tags(TagFilter::ANCESTOR)?;
            if !ancestors.is_empty() {
                debug!(
                    file = %target.file_name,
                    location = %path_to_string(&target.root),
                    "link target has ancestor tags"
                );
            }
            main.write_descendant_tags(&linked.read_tags(TagFilter::LOCAL | TagFilter::DESCENDANT)?)?;
            main.write_attribute(
                LINK_FILE_NAME_ATTRIBUTE,
                &Data::String(target.file_name.clone()),
                time,
            )?;
            main.write_attribute(
                LINK_ROOT_ATTRIBUTE,
                &Data::InternedStringVector(target.root.clone()),
                time,
            )?;
            main.add_link_location()?;
        }

        if let Some(offset) = offset {
            main.write_attribute(LINK_TIME_ATTRIBUTE, &Data::Double(offset), time)?;
        }
        Ok(())
    }
}

impl SceneInterface for LinkedScene {
    fn file_name(&self) -> String {
        self.main.file_name()
    }

    fn name(&self) -> Name {
        self.path.last().cloned().unwrap_or_else(|| Name::from(ROOT_NAME))
    }

    fn path(&self) -> Path {
        self.path.clone()
    }

    fn has_bound(&self) -> bool {
        match self.inside() {
            Some(linked) => linked.has_bound(),
            None => self.main.has_bound(),
        }
    }

    fn read_bound(&self, time: Chrono) -> Result<Box3d> {
        match self.inside() {
            Some(linked) => linked.read_bound(self.remap(time)?),
            None => self.main.read_bound(time),
        }
    }

    fn write_bound(&self, bound: &Box3d, time: Chrono) -> Result<()> {
        self.writable()?.write_bound(bound, time)
    }

    fn read_transform_as_matrix(&self, time: Chrono) -> Result<DMat4> {
        match self.inside() {
            Some(linked) => linked.read_transform_as_matrix(self.remap(time)?),
            None => self.main.read_transform_as_matrix(time),
        }
    }

    fn write_transform(&self, matrix: &DMat4, time: Chrono) -> Result<()> {
        self.writable()?.write_transform(matrix, time)
    }

    fn has_attribute(&self, name: &str) -> bool {
        match self.inside() {
            Some(linked) => name != LINK_ATTRIBUTE && linked.has_attribute(name),
            None => !is_link_attribute(name) && self.main.has_attribute(name),
        }
    }

    fn attribute_names(&self) -> Vec<Name> {
        match self.inside() {
            Some(linked) => linked.attribute_names(),
            None => self
                .main
                .attribute_names()
                .into_iter()
                .filter(|n| !is_link_attribute(n))
                .collect(),
        }
    }

    fn read_attribute(&self, name: &str, time: Chrono) -> Result<Data> {
        match self.inside() {
            Some(linked) => linked.read_attribute(name, self.remap(time)?),
            None if is_link_attribute(name) => Err(Error::AttributeNotFound {
                path: path_to_string(&self.path),
                name: name.to_string(),
            }),
            None => self.main.read_attribute(name, time),
        }
    }

    fn write_attribute(&self, name: &str, value: &Data, time: Chrono) -> Result<()> {
        if name == LINK_ATTRIBUTE {
            let (target, offset) = parse_link_data(value)?;
            return self.write_link_sample(&target, offset, time);
        }
        self.writable()?.write_attribute(name, value, time)
    }

    fn has_tag(&self, name: &str, filter: TagFilter) -> bool {
        let Some(linked) = self.linked() else {
            return self.main.has_tag(name, filter);
        };
        linked.has_tag(name, filter) || self.main.has_tag(name, self.main_tag_filter(filter))
    }

    fn read_tags(&self, filter: TagFilter) -> Result<Vec<Name>> {
        let Some(linked) = self.linked() else {
            return self.main.read_tags(filter);
        };
        let mut tags: BTreeSet<Name> = linked.read_tags(filter)?.into_iter().collect();
        let main_filter = self.main_tag_filter(filter);
        if !main_filter.is_empty() {
            tags.extend(self.main.read_tags(main_filter)?);
        }
        Ok(tags.into_iter().collect())
    }

    fn write_tags(&self, tags: &[Name]) -> Result<()> {
        self.writable()?.write_tags(tags)
    }

    fn has_object(&self) -> bool {
        match self.linked() {
            Some(linked) => linked.has_object(),
            None => self.main.has_object(),
        }
    }

    fn read_object(&self, time: Chrono) -> Result<Option<Object>> {
        match self.linked() {
            Some(linked) => linked.read_object(self.remap(time)?),
            None => self.main.read_object(time),
        }
    }

    fn write_object(&self, object: &Object, time: Chrono) -> Result<()> {
        let main = self.writable()?;
        if main.has_attribute(LINK_FILE_NAME_ATTRIBUTE) {
            return Err(Error::usage(format!(
                "link location {} cannot hold an object",
                path_to_string(&self.path)
            )));
        }
        main.write_object(object, time)
    }

    fn has_child(&self, name: &str) -> bool {
        match &self.region {
            Region::Main => self.main.has_child(name),
            Region::AtLink { linked, .. } => linked.has_child(name) || self.main.has_child(name),
            Region::Inside { linked, .. } => linked.has_child(name),
        }
    }

    fn child_names(&self) -> Vec<Name> {
        match &self.region {
            Region::Main => self.main.child_names(),
            Region::AtLink { linked, .. } => {
                let mut names = linked.child_names();
                names.extend(self.main.child_names());
                names
            }
            Region::Inside { linked, .. } => linked.child_names(),
        }
    }

    fn child_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        Ok(self.child_scene(name, missing)?.map(|c| Arc::new(c) as SceneRef))
    }

    fn create_child(&self, name: &str) -> Result<SceneRef> {
        Ok(Arc::new(self.create_child_scene(name)?))
    }

    fn scene_with(&self, path: &[Name], missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        let mut current: SceneRef = match &self.writer {
            Some(writer) => {
                let root = writer
                    .scene_cache_at(&[], MissingBehaviour::ThrowIfMissing)?
                    .ok_or_else(|| Error::SceneNotFound(ROOT_NAME.to_string()))?;
                Arc::new(Self::writer_node(root, self.shared.clone()))
            }
            None => Arc::new(Self::resolve(
                self.main.scene(&[])?,
                Path::new(),
                self.shared.clone(),
                self.link_locations.clone(),
            )),
        };
        let lookup = match missing {
            MissingBehaviour::ThrowIfMissing => MissingBehaviour::NullIfMissing,
            other => other,
        };
        for name in path {
            match current.child_with(name, lookup)? {
                Some(next) => current = next,
                None if missing == MissingBehaviour::ThrowIfMissing => {
                    return Err(Error::SceneNotFound(path_to_string(path)))
                }
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn is_time_dependent(&self) -> Result<bool> {
        match &self.region {
            Region::Inside { linked, .. } => linked.is_time_dependent(),
            Region::AtLink { linked, .. } => {
                Ok(self.main.is_time_dependent()? || linked.is_time_dependent()?)
            }
            Region::Main => {
                if self.main.is_time_dependent()? {
                    return Ok(true);
                }
                for location in self.link_locations.iter() {
                    if location.len() > self.path.len() && location.starts_with(&self.path) {
                        let link = self.scene(location)?;
                        if link.is_time_dependent()? {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }

    fn link_target(&self) -> Option<LinkTarget> {
        match &self.region {
            Region::AtLink { target, .. } | Region::Inside { target, .. } => Some(target.clone()),
            Region::Main => None,
        }
    }

    fn header(&self) -> Option<MetaData> {
        self.main.header()
    }

    fn as_sampled(&self) -> Option<&dyn SampledSceneInterface> {
        match self.writer {
            Some(_) => None,
            None => Some(self),
        }
    }
}

/// Samples follow the scene that answers the reads: the linked file below
/// link locations (and for objects at them), the main file elsewhere. A
/// time-remapped link is sampled at the times of its offset attribute.
impl SampledSceneInterface for LinkedScene {
    fn sample_times(&self, channel: &Channel) -> Result<SampleTimes> {
        match self.channel_source(channel) {
            None => {
                self.check_visible(channel)?;
                sampled(&self.main)?.sample_times(channel)
            }
            Some(_) if self.time_remapped => sampled(&self.main)?.sample_times(&link_time_channel()),
            Some(linked) => sampled(linked)?.sample_times(channel),
        }
    }

    fn read_bound_at_sample(&self, index: usize) -> Result<Box3d> {
        match self.channel_source(&Channel::Bound) {
            None => sampled(&self.main)?.read_bound_at_sample(index),
            Some(_) if self.time_remapped => self.read_bound(self.offset_sample_time(index)?),
            Some(linked) => sampled(linked)?.read_bound_at_sample(index),
        }
    }

    fn read_transform_at_sample(&self, index: usize) -> Result<DMat4> {
        match self.channel_source(&Channel::Transform) {
            None => sampled(&self.main)?.read_transform_at_sample(index),
            Some(_) if self.time_remapped => {
                self.read_transform_as_matrix(self.offset_sample_time(index)?)
            }
            Some(linked) => sampled(linked)?.read_transform_at_sample(index),
        }
    }

    fn read_attribute_at_sample(&self, name: &str, index: usize) -> Result<Data> {
        let channel = Channel::Attribute(Name::from(name));
        match self.channel_source(&channel) {
            None => {
                self.check_visible(&channel)?;
                sampled(&self.main)?.read_attribute_at_sample(name, index)
            }
            Some(_) if self.time_remapped => self.read_attribute(name, self.offset_sample_time(index)?),
            Some(linked) => sampled(linked)?.read_attribute_at_sample(name, index),
        }
    }

    fn read_object_at_sample(&self, index: usize) -> Result<Object> {
        match self.channel_source(&Channel::Object) {
            None => sampled(&self.main)?.read_object_at_sample(index),
            Some(_) if self.time_remapped => self
                .read_object(self.offset_sample_time(index)?)?
                .ok_or_else(|| Error::ObjectNotFound(path_to_string(&self.path))),
            Some(linked) => sampled(linked)?.read_object_at_sample(index),
        }
    }
}

fn sampled(scene: &SceneRef) -> Result<&dyn SampledSceneInterface> {
    scene.as_sampled().ok_or_else(|| {
        Error::usage(format!(
            "{} {} has no explicit samples",
            scene.file_name(),
            path_to_string(&scene.path())
        ))
    })
}

fn link_time_channel() -> Channel {
    Channel::Attribute(Name::from(LINK_TIME_ATTRIBUTE))
}

impl LinkedScene {
    /// Typed counterpart of [`SceneInterface::child_with`].
    pub fn child_scene(&self, name: &str, missing: MissingBehaviour) -> Result<Option<LinkedScene>> {
        if let Some(writer) = &self.writer {
            return Ok(writer
                .child_cache(name, missing)?
                .map(|c| Self::writer_node(c, self.shared.clone())));
        }

        let through_link = match &self.region {
            Region::AtLink { linked, target } | Region::Inside { linked, target } => linked
                .child_with(name, MissingBehaviour::NullIfMissing)?
                .map(|child| (child, target.join(&Name::from(name)))),
            Region::Main => None,
        };
        if let Some((child, target)) = through_link {
            return Ok(Some(Self {
                main: self.main.clone(),
                writer: None,
                region: Region::Inside { linked: child, target },
                time_remapped: self.time_remapped,
                path: self.child_path(name),
                shared: self.shared.clone(),
                link_locations: self.link_locations.clone(),
            }));
        }

        let main_child = match &self.region {
            Region::Inside { .. } => None,
            _ => self.main.child_with(name, MissingBehaviour::NullIfMissing)?,
        };
        match main_child {
            Some(child) => Ok(Some(Self::resolve(
                child,
                self.child_path(name),
                self.shared.clone(),
                self.link_locations.clone(),
            ))),
            None => match missing {
                MissingBehaviour::NullIfMissing => Ok(None),
                MissingBehaviour::CreateIfMissing => Err(Error::ReadOnly),
                MissingBehaviour::ThrowIfMissing => Err(Error::ChildNotFound {
                    parent: path_to_string(&self.path),
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Typed counterpart of [`SceneInterface::create_child`].
    pub fn create_child_scene(&self, name: &str) -> Result<LinkedScene> {
        let child = self.writable()?.create_child_cache(name)?;
        Ok(Self::writer_node(child, self.shared.clone()))
    }

    /// Linked scene answering `channel`, `None` when the main file does.
    fn channel_source(&self, channel: &Channel) -> Option<&SceneRef> {
        match channel {
            Channel::Object => self.linked(),
            _ => self.inside(),
        }
    }

    /// Query time of sample `index` of a time-remapped link.
    fn offset_sample_time(&self, index: usize) -> Result<Chrono> {
        sampled(&self.main)?.sample_time(&link_time_channel(), index)
    }

    /// Link bundle attributes are not part of the main file's visible samples.
    fn check_visible(&self, channel: &Channel) -> Result<()> {
        match channel {
            Channel::Attribute(name) if is_link_attribute(name) => Err(Error::AttributeNotFound {
                path: path_to_string(&self.path),
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Tag classes answered by the main file: ancestors always, local tags
    /// at the link location, and below it the link location's local tags
    /// count as ancestors.
    fn main_tag_filter(&self, filter: TagFilter) -> TagFilter {
        let mut main_filter = TagFilter::from_bits(filter.bits() & TagFilter::ANCESTOR.bits());
        match self.region {
            Region::AtLink { .. } if filter.contains(TagFilter::LOCAL) => {
                main_filter |= TagFilter::LOCAL;
            }
            Region::Inside { .. } if filter.contains(TagFilter::ANCESTOR) => {
                main_filter |= TagFilter::LOCAL;
            }
            _ => {}
        }
        main_filter
    }
}
