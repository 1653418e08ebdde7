//! Traversal helpers and geometry gathering over any [`SceneInterface`].

use rayon::prelude::*;
use tracing::warn;

use crate::core::{SceneInterface, SceneRef, TagFilter};
use crate::object::{transform_object, Object};
use crate::util::{path_to_string, Chrono, DMat4, Name, Path, Result};

use super::live::VISIBLE_ATTRIBUTE;

/// Product of the local transforms from the root down to `path`,
/// root-to-leaf.
pub fn world_transform(root: &dyn SceneInterface, path: &[Name], time: Chrono) -> Result<DMat4> {
    let mut world = DMat4::IDENTITY;
    for depth in 1..=path.len() {
        world *= root.scene(&path[..depth])?.read_transform_as_matrix(time)?;
    }
    Ok(world)
}

/// World transform of `scene` within its own hierarchy.
pub fn read_world_transform(scene: &dyn SceneInterface, time: Chrono) -> Result<DMat4> {
    let path = scene.path();
    if path.is_empty() {
        return Ok(DMat4::IDENTITY);
    }
    let mut world = world_transform(scene, &path[..path.len() - 1], time)?;
    world *= scene.read_transform_as_matrix(time)?;
    Ok(world)
}

/// Depth-first visit; `f` returns whether to descend into the location.
pub fn visit<F>(scene: &dyn SceneInterface, f: &mut F) -> Result<()>
where
    F: FnMut(&dyn SceneInterface) -> Result<bool>,
{
    if !f(scene)? {
        return Ok(());
    }
    for name in scene.child_names() {
        let child = scene.child(&name)?;
        visit(child.as_ref(), f)?;
    }
    Ok(())
}

/// Coordinate space of gathered geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Space {
    /// Folded with the full world transform.
    #[default]
    World,
    /// Relative to the gather root.
    Path,
    /// As stored.
    Local,
}

#[derive(Clone, Debug)]
pub struct GatherOptions {
    /// Location to gather below; reported paths are relative to it.
    pub root: Path,
    pub time: Chrono,
    pub space: Space,
    /// Only objects at or below locations with this tag.
    pub tag: Option<Name>,
    /// Space separated location name patterns with `*` wildcards.
    pub name_filter: Option<String>,
    /// Skip locations whose `scene:visible` attribute is false.
    pub visibility_filter: bool,
    /// Transform gathered objects on the rayon pool.
    pub parallel: bool,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            root: Path::new(),
            time: 0.0,
            space: Space::World,
            tag: None,
            name_filter: None,
            visibility_filter: false,
            parallel: true,
        }
    }
}

/// One gathered object.
#[derive(Clone, Debug, PartialEq)]
pub struct GatheredObject {
    /// Relative to [`GatherOptions::root`].
    pub path: Path,
    pub object: Object,
}

/// Glob match with `*` only.
fn glob_match(pattern: &str, text: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == text;
    };
    let Some(mut remaining) = text.strip_prefix(head) else {
        return false;
    };
    let parts: Vec<&str> = rest.split('*').collect();
    let Some((last, middle)) = parts.split_last() else {
        return true;
    };
    for part in middle {
        match remaining.find(part) {
            Some(i) => remaining = &remaining[i + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

fn name_matches(filter: &str, name: &str) -> bool {
    filter.split_whitespace().any(|p| glob_match(p, name))
}

struct GatherTask {
    path: Path,
    object: Object,
    transform: DMat4,
}

/// Geometric objects below `options.root`.
///
/// Non-geometric payloads are skipped with a warning.
pub fn collect_geometry(scene: &dyn SceneInterface, options: &GatherOptions) -> Result<Vec<GatheredObject>> {
    let root = scene.scene(&options.root)?;
    let base = match options.space {
        Space::World => world_transform(scene, &options.root, options.time)?,
        Space::Path | Space::Local => DMat4::IDENTITY,
    };

    // Reads are sequential; folding transforms is CPU bound.
    let mut tasks = Vec::new();
    gather_recursive(&root, &mut Path::new(), base, options, false, &mut tasks)?;

    let fold = |task: GatherTask| {
        let object = if task.transform == DMat4::IDENTITY {
            task.object
        } else {
            transform_object(&task.object, &task.transform)
        };
        GatheredObject { path: task.path, object }
    };
    Ok(if options.parallel {
        tasks.into_par_iter().map(fold).collect()
    } else {
        tasks.into_iter().map(fold).collect()
    })
}

fn gather_recursive(
    scene: &SceneRef,
    path: &mut Path,
    parent: DMat4,
    options: &GatherOptions,
    tagged_above: bool,
    out: &mut Vec<GatherTask>,
) -> Result<()> {
    if options.visibility_filter && scene.has_attribute(VISIBLE_ATTRIBUTE) {
        let visible = scene.read_attribute(VISIBLE_ATTRIBUTE, options.time)?;
        if visible.as_bool() == Some(false) {
            return Ok(());
        }
    }

    let mut tagged = tagged_above;
    if let Some(tag) = &options.tag {
        if !tagged {
            if !scene.has_tag(tag, TagFilter::LOCAL | TagFilter::DESCENDANT) {
                return Ok(());
            }
            tagged = scene.has_tag(tag, TagFilter::LOCAL);
        }
    } else {
        tagged = true;
    }

    // The gather root sits at the origin of path space.
    let transform = match options.space {
        Space::Local => DMat4::IDENTITY,
        Space::Path if path.is_empty() => DMat4::IDENTITY,
        Space::World if path.is_empty() => parent,
        _ => parent * scene.read_transform_as_matrix(options.time)?,
    };

    let name_ok = options
        .name_filter
        .as_deref()
        .is_none_or(|f| name_matches(f, &scene.name()));
    if tagged && name_ok && scene.has_object() {
        match scene.read_object(options.time)? {
            Some(object) if object.is_geometric() => out.push(GatherTask {
                path: path.clone(),
                object,
                transform,
            }),
            Some(object) => warn!(
                location = %path_to_string(&scene.path()),
                kind = object.type_name(),
                "skipping non-geometric object"
            ),
            None => {}
        }
    }

    for name in scene.child_names() {
        let child = scene.child(&name)?;
        path.push(name);
        let result = gather_recursive(&child, path, transform, options, tagged, out);
        path.pop();
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OpenMode;
    use crate::object::{Data, Interpolation, MeshPrimitive, PrimitiveVariable};
    use crate::scene::SceneCache;
    use crate::util::{path_of, Box3f, DVec3, Vec3};

    /// `/1/2/3`, each translated along x by its name, each holding a unit
    /// box with a uniform colour.
    fn write_chain(path: &std::path::Path) {
        let root = SceneCache::open(path, OpenMode::Write).unwrap();
        let mut parent: Option<SceneRef> = None;
        let colours = [Vec3::X, Vec3::Y, Vec3::Z];
        for (i, colour) in colours.into_iter().enumerate() {
            let name = (i + 1).to_string();
            let child = match &parent {
                Some(p) => p.create_child(&name),
                None => root.create_child(&name),
            }
            .unwrap();
            let x = (i + 1) as f64;
            child
                .write_transform(&DMat4::from_translation(DVec3::new(x, 0.0, 0.0)), 0.0)
                .unwrap();
            let mut mesh = MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE));
            mesh.variables.insert(
                "Cs".to_string(),
                PrimitiveVariable::new(Interpolation::Constant, Data::Color3f(colour)),
            );
            child.write_object(&Object::Mesh(mesh), 0.0).unwrap();
            if i == 1 {
                child.write_tags(&[Name::from("middle")]).unwrap();
            }
            parent = Some(child);
        }
        root.flush().unwrap();
    }

    fn first_point(object: &Object) -> Vec3 {
        object.primitive_variables().unwrap()["P"].data.as_v3f_slice().unwrap()[0]
    }

    #[test]
    fn test_world_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.scc");
        write_chain(&path);
        let root = SceneCache::open(&path, OpenMode::Read).unwrap();
        let leaf = root.scene(&path_of(&["1", "2", "3"])).unwrap();
        let m = read_world_transform(leaf.as_ref(), 0.0).unwrap();
        assert_eq!(m.transform_point3(DVec3::ZERO), DVec3::new(6.0, 0.0, 0.0));
        assert_eq!(read_world_transform(&root, 0.0).unwrap(), DMat4::IDENTITY);
    }

    #[test]
    fn test_collect_world_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.scc");
        write_chain(&path);
        let root = SceneCache::open(&path, OpenMode::Read).unwrap();

        let gathered = collect_geometry(&root, &GatherOptions::default()).unwrap();
        let paths: Vec<_> = gathered.iter().map(|g| path_to_string(&g.path)).collect();
        assert_eq!(paths, ["/1", "/1/2", "/1/2/3"]);
        let firsts: Vec<_> = gathered.iter().map(|g| first_point(&g.object)).collect();
        assert_eq!(firsts, [Vec3::new(1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0)]);
        let cs = &gathered[2].object.primitive_variables().unwrap()["Cs"];
        assert_eq!(cs.data, Data::Color3f(Vec3::Z));
    }

    #[test]
    fn test_collect_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.scc");
        write_chain(&path);
        let root = SceneCache::open(&path, OpenMode::Read).unwrap();

        let options = GatherOptions {
            root: path_of(&["1", "2"]),
            space: Space::Path,
            parallel: false,
            ..Default::default()
        };
        let gathered = collect_geometry(&root, &options).unwrap();
        assert_eq!(gathered.len(), 2);
        assert_eq!(path_to_string(&gathered[0].path), "/");
        assert_eq!(first_point(&gathered[0].object), Vec3::ZERO);
        assert_eq!(path_to_string(&gathered[1].path), "/3");
        assert_eq!(first_point(&gathered[1].object), Vec3::new(3.0, 0.0, 0.0));

        let local = GatherOptions { space: Space::Local, ..options };
        let gathered = collect_geometry(&root, &local).unwrap();
        assert_eq!(first_point(&gathered[1].object), Vec3::ZERO);
    }

    #[test]
    fn test_collect_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.scc");
        write_chain(&path);
        let root = SceneCache::open(&path, OpenMode::Read).unwrap();

        let tagged = GatherOptions {
            tag: Some(Name::from("middle")),
            ..Default::default()
        };
        let paths: Vec<_> = collect_geometry(&root, &tagged)
            .unwrap()
            .iter()
            .map(|g| path_to_string(&g.path))
            .collect();
        assert_eq!(paths, ["/1/2", "/1/2/3"]);

        let named = GatherOptions {
            name_filter: Some("3 x*".to_string()),
            ..Default::default()
        };
        let gathered = collect_geometry(&root, &named).unwrap();
        assert_eq!(gathered.len(), 1);
        assert_eq!(path_to_string(&gathered[0].path), "/1/2/3");
    }

    #[test]
    fn test_visit_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.scc");
        write_chain(&path);
        let root = SceneCache::open(&path, OpenMode::Read).unwrap();
        let mut seen = Vec::new();
        visit(&root, &mut |s| {
            seen.push(path_to_string(&s.path()));
            Ok(s.path().len() < 2)
        })
        .unwrap();
        assert_eq!(seen, ["/", "/1", "/1/2"]);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("box", "box"));
        assert!(!glob_match("box", "boxes"));
        assert!(glob_match("box*", "boxes"));
        assert!(glob_match("*es", "boxes"));
        assert!(glob_match("b*x*s", "boxes"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("a*a", "a"));
        assert!(name_matches("cam* geo*", "geo_1"));
        assert!(!name_matches("cam*", "geo_1"));
    }
}
