//! In-memory [`LiveHierarchy`] with static, sampled or expression driven
//! values.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::LinkTarget;
use crate::object::{Data, Object};
use crate::util::{path_to_string, Chrono, DMat4, Error, Name, Path, Result};

use super::LiveHierarchy;

/// A value over time.
#[derive(Clone)]
pub enum Animated<T> {
    Static(T),
    /// Held samples, sorted by time.
    Sampled(Vec<(Chrono, T)>),
    Expression(Arc<dyn Fn(Chrono) -> T + Send + Sync>),
}

impl<T: Clone + PartialEq> Animated<T> {
    pub fn expression(f: impl Fn(Chrono) -> T + Send + Sync + 'static) -> Self {
        Self::Expression(Arc::new(f))
    }

    /// Held samples; unsorted input is sorted by time.
    pub fn sampled(mut samples: Vec<(Chrono, T)>) -> Self {
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self::Sampled(samples)
    }

    /// Value at `time`; `None` only for an empty sample list.
    pub fn at(&self, time: Chrono) -> Option<T> {
        match self {
            Self::Static(v) => Some(v.clone()),
            Self::Sampled(samples) => {
                let idx = samples.partition_point(|(t, _)| *t <= time);
                samples
                    .get(idx.saturating_sub(1))
                    .map(|(_, v)| v.clone())
            }
            Self::Expression(f) => Some(f(time)),
        }
    }

    /// Expressions always count as time dependent.
    pub fn is_time_dependent(&self) -> bool {
        match self {
            Self::Static(_) => false,
            Self::Sampled(samples) => samples.windows(2).any(|w| w[0].1 != w[1].1),
            Self::Expression(_) => true,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Animated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Sampled(s) => f.debug_tuple("Sampled").field(s).finish(),
            Self::Expression(_) => f.write_str("Expression(..)"),
        }
    }
}

impl<T> From<T> for Animated<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

struct ProceduralNode {
    children: BTreeMap<Name, ProceduralNode>,
    transform: Animated<DMat4>,
    object: Option<Animated<Object>>,
    /// Recorded when the object is set, so tag queries never evaluate it.
    object_type: Option<&'static str>,
    attributes: BTreeMap<Name, Animated<Data>>,
    tags: Vec<Name>,
    visible: Animated<bool>,
    link: Option<LinkTarget>,
    live_geometry: bool,
}

impl Default for ProceduralNode {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            transform: Animated::Static(DMat4::IDENTITY),
            object: None,
            object_type: None,
            attributes: BTreeMap::new(),
            tags: Vec::new(),
            visible: Animated::Static(true),
            link: None,
            live_geometry: false,
        }
    }
}

impl ProceduralNode {
    fn find(&self, path: &[Name]) -> Option<&ProceduralNode> {
        path.iter()
            .try_fold(self, |node, name| node.children.get(name))
    }

    fn find_mut(&mut self, path: &[Name]) -> Option<&mut ProceduralNode> {
        path.iter()
            .try_fold(self, |node, name| node.children.get_mut(name))
    }
}

/// Thread-safe procedural hierarchy. Nodes can be added and removed at any
/// time; scenes reading it see the change on their next query.
pub struct ProceduralHierarchy {
    description: String,
    root: RwLock<ProceduralNode>,
}

impl ProceduralHierarchy {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            root: RwLock::new(ProceduralNode::default()),
        }
    }

    fn edit<R>(&self, path: &[Name], f: impl FnOnce(&mut ProceduralNode) -> R) -> Result<R> {
        let mut root = self.root.write();
        let node = root
            .find_mut(path)
            .ok_or_else(|| Error::SceneNotFound(path_to_string(path)))?;
        Ok(f(node))
    }

    fn read<R>(&self, path: &[Name], default: R, f: impl FnOnce(&ProceduralNode) -> R) -> R {
        let root = self.root.read();
        root.find(path).map(f).unwrap_or(default)
    }

    /// Add an empty node; its parent must exist.
    pub fn add_node(&self, path: &[Name]) -> Result<()> {
        let (name, parent) = path
            .split_last()
            .ok_or_else(|| Error::usage("the root always exists"))?;
        self.edit(parent, |node| {
            if node.children.contains_key(name) {
                return Err(Error::DuplicateChild(path_to_string(path)));
            }
            node.children.insert(name.clone(), ProceduralNode::default());
            Ok(())
        })?
    }

    /// Remove a node and everything below it. Returns false if it did not
    /// exist.
    pub fn remove_node(&self, path: &[Name]) -> Result<bool> {
        let (name, parent) = path
            .split_last()
            .ok_or_else(|| Error::usage("the root cannot be removed"))?;
        let mut root = self.root.write();
        Ok(root
            .find_mut(parent)
            .is_some_and(|node| node.children.remove(name).is_some()))
    }

    pub fn set_transform(&self, path: &[Name], transform: Animated<DMat4>) -> Result<()> {
        self.edit(path, |node| node.transform = transform)
    }

    /// Set or clear a node's object. An expression is evaluated once, at
    /// time 0, to record the object type.
    pub fn set_object(&self, path: &[Name], object: Option<Animated<Object>>) -> Result<()> {
        let object_type = match &object {
            Some(Animated::Static(o)) => Some(o.type_name()),
            Some(Animated::Sampled(samples)) => samples.first().map(|(_, o)| o.type_name()),
            Some(Animated::Expression(f)) => Some(f(0.0).type_name()),
            None => None,
        };
        self.edit(path, |node| {
            node.object = object;
            node.object_type = object_type;
        })
    }

    pub fn set_attribute(&self, path: &[Name], name: &str, value: Animated<Data>) -> Result<()> {
        self.edit(path, |node| {
            node.attributes.insert(Name::from(name), value);
        })
    }

    pub fn remove_attribute(&self, path: &[Name], name: &str) -> Result<bool> {
        self.edit(path, |node| node.attributes.remove(name).is_some())
    }

    pub fn set_tags(&self, path: &[Name], tags: Vec<Name>) -> Result<()> {
        self.edit(path, |node| node.tags = tags)
    }

    pub fn set_visible(&self, path: &[Name], visible: Animated<bool>) -> Result<()> {
        self.edit(path, |node| node.visible = visible)
    }

    pub fn set_link_target(&self, path: &[Name], target: Option<LinkTarget>) -> Result<()> {
        self.edit(path, |node| node.link = target)
    }

    /// Mark a node's geometry as generated, so exports bake it.
    pub fn set_live_geometry(&self, path: &[Name], live: bool) -> Result<()> {
        self.edit(path, |node| node.live_geometry = live)
    }

    /// Paths of every node below the root, depth first.
    pub fn paths(&self) -> Vec<Path> {
        fn walk(node: &ProceduralNode, prefix: &mut Path, out: &mut Vec<Path>) {
            for (name, child) in &node.children {
                prefix.push(name.clone());
                out.push(prefix.clone());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        walk(&self.root.read(), &mut Path::new(), &mut out);
        out
    }
}

impl LiveHierarchy for ProceduralHierarchy {
    fn exists(&self, path: &[Name]) -> bool {
        self.read(path, false, |_| true)
    }

    fn child_names(&self, path: &[Name]) -> Vec<Name> {
        self.read(path, Vec::new(), |node| node.children.keys().cloned().collect())
    }

    fn local_transform(&self, path: &[Name], time: Chrono) -> Result<DMat4> {
        let root = self.root.read();
        let node = root
            .find(path)
            .ok_or_else(|| Error::SceneNotFound(path_to_string(path)))?;
        Ok(node.transform.at(time).unwrap_or(DMat4::IDENTITY))
    }

    fn has_object(&self, path: &[Name]) -> bool {
        self.read(path, false, |node| node.object.is_some())
    }

    fn object_type_name(&self, path: &[Name]) -> Option<&'static str> {
        self.read(path, None, |node| node.object_type)
    }

    fn object(&self, path: &[Name], time: Chrono) -> Result<Option<Object>> {
        let root = self.root.read();
        let node = root
            .find(path)
            .ok_or_else(|| Error::SceneNotFound(path_to_string(path)))?;
        Ok(node.object.as_ref().and_then(|o| o.at(time)))
    }

    fn attribute_names(&self, path: &[Name]) -> Vec<Name> {
        self.read(path, Vec::new(), |node| node.attributes.keys().cloned().collect())
    }

    fn attribute(&self, path: &[Name], name: &str, time: Chrono) -> Result<Option<Data>> {
        let root = self.root.read();
        let node = root
            .find(path)
            .ok_or_else(|| Error::SceneNotFound(path_to_string(path)))?;
        Ok(node.attributes.get(name).and_then(|a| a.at(time)))
    }

    fn local_tags(&self, path: &[Name]) -> Vec<Name> {
        self.read(path, Vec::new(), |node| node.tags.clone())
    }

    fn visible(&self, path: &[Name], time: Chrono) -> bool {
        self.read(path, false, |node| node.visible.at(time).unwrap_or(true))
    }

    fn is_time_dependent_local(&self, path: &[Name]) -> bool {
        self.read(path, false, |node| {
            node.transform.is_time_dependent()
                || node.visible.is_time_dependent()
                || node.object.as_ref().is_some_and(Animated::is_time_dependent)
                || node.attributes.values().any(Animated::is_time_dependent)
        })
    }

    fn link_target(&self, path: &[Name]) -> Option<LinkTarget> {
        self.read(path, None, |node| node.link.clone())
    }

    fn has_live_geometry(&self, path: &[Name]) -> bool {
        self.read(path, false, |node| node.live_geometry)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
