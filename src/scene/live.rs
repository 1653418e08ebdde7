//! Read-only scene over a hierarchy computed on demand.
//!
//! Nothing is cached: every query goes to the [`LiveHierarchy`], so nodes
//! added or removed between calls show up on the next call.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::{
    object_type_tag, LinkTarget, MissingBehaviour, SceneInterface, SceneRef, TagFilter, TagSet,
};
use crate::object::{Data, Object};
use crate::util::{path_to_string, Box3d, Chrono, DMat4, Error, Name, Path, Result};

use super::scene_cache::ROOT_NAME;

/// Bool attribute present on every live location.
pub const VISIBLE_ATTRIBUTE: &str = "scene:visible";

/// Host side of a [`LiveScene`]. Paths are absolute within the hierarchy.
pub trait LiveHierarchy: Send + Sync {
    fn exists(&self, path: &[Name]) -> bool;

    /// Children in host order; empty for missing locations.
    fn child_names(&self, path: &[Name]) -> Vec<Name>;

    fn local_transform(&self, path: &[Name], time: Chrono) -> Result<DMat4>;

    fn has_object(&self, path: &[Name]) -> bool;

    /// Type of the object at `path`, answered without evaluating it.
    fn object_type_name(&self, path: &[Name]) -> Option<&'static str>;

    fn object(&self, path: &[Name], time: Chrono) -> Result<Option<Object>>;

    fn attribute_names(&self, path: &[Name]) -> Vec<Name>;

    fn attribute(&self, path: &[Name], name: &str, time: Chrono) -> Result<Option<Data>>;

    /// Tags written by the host; object type tags are added by the scene.
    fn local_tags(&self, path: &[Name]) -> Vec<Name>;

    fn visible(&self, path: &[Name], time: Chrono) -> bool;

    /// True if the transform, object, attributes or visibility of this one
    /// location vary over time.
    fn is_time_dependent_local(&self, path: &[Name]) -> bool;

    fn link_target(&self, _path: &[Name]) -> Option<LinkTarget> {
        None
    }

    fn has_live_geometry(&self, _path: &[Name]) -> bool {
        false
    }

    /// Reported as the file name.
    fn description(&self) -> String;
}

/// [`SceneInterface`] over a [`LiveHierarchy`], optionally re-rooted below
/// a location of it.
#[derive(Clone)]
pub struct LiveScene {
    hierarchy: Arc<dyn LiveHierarchy>,
    /// Hierarchy path shown as `/`.
    root: Path,
    /// Path below `root`.
    path: Path,
}

impl LiveScene {
    pub fn new(hierarchy: Arc<dyn LiveHierarchy>) -> Self {
        Self {
            hierarchy,
            root: Path::new(),
            path: Path::new(),
        }
    }

    /// Scene whose root is the hierarchy location `root`; paths are reported
    /// relative to it.
    pub fn rooted(hierarchy: Arc<dyn LiveHierarchy>, root: Path) -> Result<Self> {
        if !hierarchy.exists(&root) {
            return Err(Error::SceneNotFound(path_to_string(&root)));
        }
        Ok(Self {
            hierarchy,
            root,
            path: Path::new(),
        })
    }

    fn full_path(&self) -> Path {
        let mut full = self.root.clone();
        full.extend(self.path.iter().cloned());
        full
    }

    fn at(&self, path: Path) -> Self {
        Self {
            hierarchy: self.hierarchy.clone(),
            root: self.root.clone(),
            path,
        }
    }

    fn live_child(&self, name: &str) -> Option<Self> {
        let mut path = self.path.clone();
        path.push(Name::from(name));
        let child = self.at(path);
        self.hierarchy.exists(&child.full_path()).then_some(child)
    }

    /// Transform from this location to the hierarchy root, including the
    /// locations above a re-rooted scene's root.
    pub fn read_world_transform_as_matrix(&self, time: Chrono) -> Result<DMat4> {
        let full = self.full_path();
        let mut world = DMat4::IDENTITY;
        for depth in 1..=full.len() {
            world *= self.hierarchy.local_transform(&full[..depth], time)?;
        }
        Ok(world)
    }

    fn local_tag_set(&self) -> TagSet {
        let full = self.full_path();
        let mut tags: TagSet = self.hierarchy.local_tags(&full).into_iter().collect();
        if let Some(type_name) = self.hierarchy.object_type_name(&full) {
            tags.insert(object_type_tag(type_name));
        }
        tags
    }

    fn descendant_tag_set(&self, out: &mut TagSet) {
        for name in self.child_names() {
            if let Some(child) = self.live_child(&name) {
                out.extend(child.local_tag_set());
                child.descendant_tag_set(out);
            }
        }
    }

    fn ancestor_tag_set(&self) -> TagSet {
        let mut tags = TagSet::new();
        for depth in 0..self.path.len() {
            tags.extend(self.at(self.path[..depth].to_vec()).local_tag_set());
        }
        tags
    }

    fn tag_set(&self, filter: TagFilter) -> TagSet {
        let mut tags = TagSet::new();
        if filter.contains(TagFilter::LOCAL) {
            tags.extend(self.local_tag_set());
        }
        if filter.contains(TagFilter::DESCENDANT) {
            self.descendant_tag_set(&mut tags);
        }
        if filter.contains(TagFilter::ANCESTOR) {
            tags.extend(self.ancestor_tag_set());
        }
        tags
    }
}

impl SceneInterface for LiveScene {
    fn file_name(&self) -> String {
        self.hierarchy.description()
    }

    fn name(&self) -> Name {
        self.path.last().cloned().unwrap_or_else(|| Name::from(ROOT_NAME))
    }

    fn path(&self) -> Path {
        self.path.clone()
    }

    fn has_bound(&self) -> bool {
        true
    }

    /// Object bound and child bounds in their parent's space, at `time`.
    fn read_bound(&self, time: Chrono) -> Result<Box3d> {
        let mut bound = Box3d::EMPTY;
        if let Some(object) = self.read_object(time)? {
            if let Some(b) = object.bound() {
                bound.expand_by_box(&b);
            }
        }
        for name in self.child_names() {
            if let Some(child) = self.live_child(&name) {
                let child_bound = child.read_bound(time)?;
                if !child_bound.is_empty() {
                    let m = child.read_transform_as_matrix(time)?;
                    bound.expand_by_box(&child_bound.transformed(&m));
                }
            }
        }
        Ok(bound)
    }

    fn write_bound(&self, _bound: &Box3d, _time: Chrono) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn read_transform_as_matrix(&self, time: Chrono) -> Result<DMat4> {
        if self.path.is_empty() {
            return Ok(DMat4::IDENTITY);
        }
        self.hierarchy.local_transform(&self.full_path(), time)
    }

    fn write_transform(&self, _matrix: &DMat4, _time: Chrono) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn has_attribute(&self, name: &str) -> bool {
        name == VISIBLE_ATTRIBUTE
            || self
                .hierarchy
                .attribute_names(&self.full_path())
                .iter()
                .any(|n| n == name)
    }

    fn attribute_names(&self) -> Vec<Name> {
        let mut names: BTreeSet<Name> =
            self.hierarchy.attribute_names(&self.full_path()).into_iter().collect();
        names.insert(Name::from(VISIBLE_ATTRIBUTE));
        names.into_iter().collect()
    }

    fn read_attribute(&self, name: &str, time: Chrono) -> Result<Data> {
        let full = self.full_path();
        if name == VISIBLE_ATTRIBUTE {
            return Ok(Data::Bool(self.hierarchy.visible(&full, time)));
        }
        self.hierarchy
            .attribute(&full, name, time)?
            .ok_or_else(|| Error::AttributeNotFound {
                path: path_to_string(&self.path),
                name: name.to_string(),
            })
    }

    fn write_attribute(&self, _name: &str, _value: &Data, _time: Chrono) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn has_tag(&self, name: &str, filter: TagFilter) -> bool {
        self.tag_set(filter).contains(name)
    }

    fn read_tags(&self, filter: TagFilter) -> Result<Vec<Name>> {
        Ok(self.tag_set(filter).into_iter().collect())
    }

    fn write_tags(&self, _tags: &[Name]) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn has_object(&self) -> bool {
        self.hierarchy.has_object(&self.full_path())
    }

    fn read_object(&self, time: Chrono) -> Result<Option<Object>> {
        self.hierarchy.object(&self.full_path(), time)
    }

    fn write_object(&self, _object: &Object, _time: Chrono) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn has_child(&self, name: &str) -> bool {
        self.live_child(name).is_some()
    }

    fn child_names(&self) -> Vec<Name> {
        self.hierarchy.child_names(&self.full_path())
    }

    fn child_with(&self, name: &str, missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        match self.live_child(name) {
            Some(child) => Ok(Some(Arc::new(child))),
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

    fn create_child(&self, _name: &str) -> Result<SceneRef> {
        Err(Error::ReadOnly)
    }

    fn scene_with(&self, path: &[Name], missing: MissingBehaviour) -> Result<Option<SceneRef>> {
        let scene = self.at(path.to_vec());
        if self.hierarchy.exists(&scene.full_path()) {
            return Ok(Some(Arc::new(scene)));
        }
        match missing {
            MissingBehaviour::NullIfMissing => Ok(None),
            MissingBehaviour::CreateIfMissing => Err(Error::ReadOnly),
            MissingBehaviour::ThrowIfMissing => Err(Error::SceneNotFound(path_to_string(path))),
        }
    }

    fn is_time_dependent(&self) -> Result<bool> {
        if self.hierarchy.is_time_dependent_local(&self.full_path()) {
            return Ok(true);
        }
        for name in self.child_names() {
            if let Some(child) = self.live_child(&name) {
                if child.is_time_dependent()? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn link_target(&self) -> Option<LinkTarget> {
        self.hierarchy.link_target(&self.full_path())
    }

    fn has_live_geometry(&self) -> bool {
        self.hierarchy.has_live_geometry(&self.full_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Animated, ProceduralHierarchy};
    use crate::util::{path_of, DVec3};

    fn chain() -> Arc<ProceduralHierarchy> {
        let h = Arc::new(ProceduralHierarchy::new("test"));
        for (i, p) in [path_of(&["1"]), path_of(&["1", "2"]), path_of(&["1", "2", "3"])]
            .into_iter()
            .enumerate()
        {
            h.add_node(&p).unwrap();
            let offset = DVec3::new((i + 1) as f64, 0.0, 0.0);
            h.set_transform(&p, Animated::Static(DMat4::from_translation(offset)))
                .unwrap();
        }
        h
    }

    #[test]
    fn test_rooted_paths() {
        let h = chain();
        let scene = LiveScene::rooted(h.clone(), path_of(&["1", "2"])).unwrap();
        assert_eq!(scene.name(), ROOT_NAME);
        let three = scene.child("3").unwrap();
        assert_eq!(three.path(), path_of(&["3"]));
        assert_eq!(scene.scene(&path_of(&["3"])).unwrap().name(), "3");
        assert!(LiveScene::rooted(h, path_of(&["nope"])).is_err());
    }

    #[test]
    fn test_world_transform() {
        let h = chain();
        let scene = LiveScene::new(h);
        let three = scene.scene(&path_of(&["1", "2", "3"])).unwrap();
        assert_eq!(three.read_transform_as_matrix(0.0).unwrap().w_axis.x, 3.0);
        let live = LiveScene::rooted(chain(), path_of(&["1", "2", "3"])).unwrap();
        assert_eq!(live.read_world_transform_as_matrix(0.0).unwrap().w_axis.x, 6.0);
    }

    #[test]
    fn test_structure_changes_are_visible() {
        let h = chain();
        let scene = LiveScene::new(h.clone());
        let one = scene.child("1").unwrap();
        assert_eq!(one.child_names(), vec![Name::from("2")]);
        h.add_node(&path_of(&["1", "extra"])).unwrap();
        assert_eq!(one.child_names(), vec![Name::from("2"), Name::from("extra")]);
        h.remove_node(&path_of(&["1", "2"])).unwrap();
        assert!(!one.has_child("2"));
        assert!(one.child("2").is_err());
    }

    #[test]
    fn test_visibility_attribute() {
        let h = chain();
        h.set_visible(
            &path_of(&["1", "2"]),
            Animated::expression(|t| t < 1.0),
        )
        .unwrap();
        let scene = LiveScene::new(h);
        let two = scene.scene(&path_of(&["1", "2"])).unwrap();
        assert!(two.has_attribute(VISIBLE_ATTRIBUTE));
        assert_eq!(two.read_attribute(VISIBLE_ATTRIBUTE, 0.0).unwrap(), Data::Bool(true));
        assert_eq!(two.read_attribute(VISIBLE_ATTRIBUTE, 2.0).unwrap(), Data::Bool(false));
        // Hidden locations stay enumerable.
        assert_eq!(scene.child("1").unwrap().child_names(), vec![Name::from("2")]);
        assert!(two.is_time_dependent().unwrap());
        assert!(scene.is_time_dependent().unwrap());
        assert!(!two.child("3").unwrap().is_time_dependent().unwrap());
    }

    #[test]
    fn test_tag_queries_do_not_evaluate_objects() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let h = chain();
        let cooked = Arc::new(AtomicUsize::new(0));
        for p in [path_of(&["1"]), path_of(&["1", "2"]), path_of(&["1", "2", "3"])] {
            let counter = cooked.clone();
            h.set_object(
                &p,
                Some(Animated::expression(move |t| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Object::Data(Data::Double(t))
                })),
            )
            .unwrap();
        }
        h.set_tags(&path_of(&["1"]), vec![Name::from("x")]).unwrap();
        cooked.store(0, Ordering::SeqCst);

        let scene = LiveScene::new(h);
        let tags = scene.read_tags(TagFilter::EVERY).unwrap();
        assert_eq!(tags, vec![Name::from("ObjectType:DoubleData"), Name::from("x")]);
        let leaf = scene.scene(&path_of(&["1", "2", "3"])).unwrap();
        assert!(leaf.has_tag("x", TagFilter::ANCESTOR));
        assert!(leaf.has_tag("ObjectType:DoubleData", TagFilter::LOCAL));
        assert_eq!(cooked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_writes_fail() {
        let scene = LiveScene::new(chain());
        assert!(matches!(scene.create_child("x"), Err(Error::ReadOnly)));
        assert!(matches!(scene.write_tags(&[]), Err(Error::ReadOnly)));
        assert!(matches!(
            scene.write_transform(&DMat4::IDENTITY, 0.0),
            Err(Error::ReadOnly)
        ));
    }
}
