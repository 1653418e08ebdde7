//! Writes any scene into a linked scene file, linking subtrees that mirror
//! other files and baking the rest.
//!
//! Planning runs in two passes over the source. The first marks locations
//! that must be expanded (forced by the caller, or carrying live geometry);
//! the second propagates the mark up the direct ancestor chain only, so
//! siblings of an expanded location can still be linked. A location is
//! linked when it has a link target and is not marked.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::{
    LinkTarget, MissingBehaviour, SceneInterface, SceneRef, TagFilter, OBJECT_TYPE_TAG_PREFIX,
};
use crate::object::transform_object;
use crate::util::{Chrono, DMat4, Error, Name, Path, Result};

use super::live::VISIBLE_ATTRIBUTE;
use super::scene_cache::LINK_LOCATIONS_ATTRIBUTE;
use super::LinkedScene;

/// Predicate over source paths selecting locations that must be baked.
pub type ForceExpand = Arc<dyn Fn(&[Name]) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ExportOptions {
    /// Export times; written in increasing order.
    pub times: Vec<Chrono>,
    pub force_expand: Option<ForceExpand>,
    /// Omit locations invisible at every export time.
    pub visibility_filter: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            times: vec![0.0],
            force_expand: None,
            visibility_filter: false,
        }
    }
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("times", &self.times)
            .field("force_expand", &self.force_expand.is_some())
            .field("visibility_filter", &self.visibility_filter)
            .finish()
    }
}

impl ExportOptions {
    pub fn with_times(mut self, times: impl Into<Vec<Chrono>>) -> Self {
        self.times = times.into();
        self
    }

    pub fn with_force_expand(mut self, f: impl Fn(&[Name]) -> bool + Send + Sync + 'static) -> Self {
        self.force_expand = Some(Arc::new(f));
        self
    }

    pub fn with_visibility_filter(mut self, enabled: bool) -> Self {
        self.visibility_filter = enabled;
        self
    }
}

/// How one location is written.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportMode {
    Baked,
    Linked(LinkTarget),
}

struct PlanNode {
    name: Name,
    /// `None` for the exported root.
    scene: Option<SceneRef>,
    mode: ExportMode,
    /// Link target own or inherited, whether or not it is used.
    target: Option<LinkTarget>,
    requires_expansion: bool,
    animated: bool,
    children: Vec<PlanNode>,
}

/// Result of planning an export.
pub struct ExportPlan {
    root: PlanNode,
}

impl ExportPlan {
    /// Mode of a location, `None` when it is not exported.
    pub fn mode(&self, path: &[Name]) -> Option<&ExportMode> {
        let mut node = &self.root;
        for name in path {
            node = node.children.iter().find(|c| &c.name == name)?;
        }
        Some(&node.mode)
    }

    /// (baked, linked) counts of written locations.
    pub fn counts(&self) -> (usize, usize) {
        fn walk(node: &PlanNode, counts: &mut (usize, usize)) {
            match node.mode {
                ExportMode::Baked => {
                    counts.0 += 1;
                    for child in &node.children {
                        walk(child, counts);
                    }
                }
                ExportMode::Linked(_) => counts.1 += 1,
            }
        }
        let mut counts = (0, 0);
        walk(&self.root, &mut counts);
        counts
    }
}

fn is_visible(scene: &dyn SceneInterface, time: Chrono) -> Result<bool> {
    if !scene.has_attribute(VISIBLE_ATTRIBUTE) {
        return Ok(true);
    }
    Ok(scene.read_attribute(VISIBLE_ATTRIBUTE, time)?.as_bool().unwrap_or(true))
}

/// Writes scenes according to [`ExportOptions`].
#[derive(Clone, Debug, Default)]
pub struct SceneExporter {
    options: ExportOptions,
}

impl SceneExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn sorted_times(&self) -> Result<Vec<Chrono>> {
        let mut times = self.options.times.clone();
        if times.is_empty() {
            return Err(Error::usage("export needs at least one time"));
        }
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        Ok(times)
    }

    /// Decide how every location of `source` is written.
    pub fn plan(&self, source: &dyn SceneInterface) -> Result<ExportPlan> {
        let times = self.sorted_times()?;
        let mut path = source.path();
        let name = source.name();
        let mut root = self.mark(source, None, &name, None, &mut path, &times)?;
        Self::propagate(&mut root);
        Ok(ExportPlan { root })
    }

    /// First pass: per location target and expansion mark. Invisible
    /// locations are dropped here when filtering.
    fn mark(
        &self,
        scene: &dyn SceneInterface,
        handle: Option<SceneRef>,
        name: &Name,
        inherited: Option<&LinkTarget>,
        path: &mut Path,
        times: &[Chrono],
    ) -> Result<PlanNode> {
        let target = scene
            .link_target()
            .or_else(|| inherited.map(|t| t.join(name)));
        let forced = self.options.force_expand.as_ref().is_some_and(|f| f(path));
        let mut node = PlanNode {
            name: name.clone(),
            scene: handle,
            mode: ExportMode::Baked,
            target,
            requires_expansion: forced || scene.has_live_geometry(),
            animated: scene.is_time_dependent()?,
            children: Vec::new(),
        };

        for child_name in scene.child_names() {
            let child = scene.child(&child_name)?;
            if self.options.visibility_filter {
                let mut visible = false;
                for &t in times {
                    if is_visible(child.as_ref(), t)? {
                        visible = true;
                        break;
                    }
                }
                if !visible {
                    debug!(location = %child_name, "omitting invisible location");
                    continue;
                }
            }
            path.push(child_name.clone());
            let planned = self.mark(
                child.as_ref(),
                Some(child.clone()),
                &child_name,
                node.target.as_ref(),
                path,
                times,
            );
            path.pop();
            node.children.push(planned?);
        }
        Ok(node)
    }

    /// Second pass: a marked location marks its ancestors, then modes are
    /// assigned.
    fn propagate(node: &mut PlanNode) -> bool {
        let mut expand = node.requires_expansion;
        for child in &mut node.children {
            expand |= Self::propagate(child);
        }
        node.requires_expansion = expand;
        node.mode = match (&node.target, expand) {
            (Some(target), false) => ExportMode::Linked(target.clone()),
            _ => ExportMode::Baked,
        };
        expand
    }

    /// Export `source` into the writer `out`.
    pub fn export(&self, source: &dyn SceneInterface, out: &LinkedScene) -> Result<ExportPlan> {
        let plan = self.plan(source)?;
        let times = self.sorted_times()?;
        for (i, &time) in times.iter().enumerate() {
            let pass = WritePass { time, first: i == 0 };
            pass.write(source, &plan.root, out, DMat4::IDENTITY, false, true)?;
        }
        let (baked, linked) = plan.counts();
        debug!(baked, linked, times = times.len(), "exported scene");
        Ok(plan)
    }

    /// Export into a new file at `path`, flushed before returning.
    pub fn export_to_file(
        &self,
        source: &dyn SceneInterface,
        path: impl AsRef<std::path::Path>,
    ) -> Result<ExportPlan> {
        let out = LinkedScene::open(path, crate::core::OpenMode::Write)?;
        let plan = self.export(source, &out)?;
        out.flush()?;
        Ok(plan)
    }
}

struct WritePass {
    time: Chrono,
    first: bool,
}

impl WritePass {
    /// `accumulated` is the transform not yet written above this location;
    /// it is identity unless the parent was baked inside a link region.
    fn write(
        &self,
        scene: &dyn SceneInterface,
        node: &PlanNode,
        out: &LinkedScene,
        accumulated: DMat4,
        parent_animated: bool,
        is_root: bool,
    ) -> Result<()> {
        let animated = node.animated || parent_animated;
        if !animated && !self.first {
            return Ok(());
        }

        let local = if is_root {
            DMat4::IDENTITY
        } else {
            scene.read_transform_as_matrix(self.time)?
        };
        let folded = accumulated * local;
        let in_link_region = node.target.is_some();

        if !is_root {
            let written = if in_link_region && node.mode == ExportMode::Baked {
                DMat4::IDENTITY
            } else {
                folded
            };
            out.write_transform(&written, self.time)?;
        }

        for name in scene.attribute_names() {
            if is_root && name == LINK_LOCATIONS_ATTRIBUTE {
                continue;
            }
            out.write_attribute(&name, &scene.read_attribute(&name, self.time)?, self.time)?;
        }
        if self.first {
            let tags: Vec<Name> = scene
                .read_tags(TagFilter::LOCAL)?
                .into_iter()
                .filter(|t| !t.starts_with(OBJECT_TYPE_TAG_PREFIX))
                .collect();
            if !tags.is_empty() {
                out.write_tags(&tags)?;
            }
        }

        match &node.mode {
            ExportMode::Linked(target) => out.write_link_target(target, self.time),
            ExportMode::Baked => {
                let child_accumulated = if in_link_region {
                    folded
                } else {
                    DMat4::IDENTITY
                };
                if let Some(object) = scene.read_object(self.time)? {
                    let object = if in_link_region && child_accumulated != DMat4::IDENTITY {
                        transform_object(&object, &child_accumulated)
                    } else {
                        object
                    };
                    out.write_object(&object, self.time)?;
                }
                let child_parent_animated = in_link_region && animated;
                for child in &node.children {
                    let Some(handle) = &child.scene else {
                        continue;
                    };
                    let child_out = out
                        .child_scene(&child.name, MissingBehaviour::CreateIfMissing)?
                        .ok_or_else(|| Error::usage("writer could not create a child"))?;
                    self.write(
                        handle.as_ref(),
                        child,
                        &child_out,
                        child_accumulated,
                        child_parent_animated,
                        false,
                    )?;
                }
                Ok(())
            }
        }
    }
}
