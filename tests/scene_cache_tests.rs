//! Integration tests for writing scene caches and verifying round-trip.

use scenecache::core::{HashType, MurmurHash, OpenMode, SceneInterface, SceneRef, TagFilter};
use scenecache::object::{Data, Interpolation, MeshPrimitive, Object, PointsPrimitive, PrimitiveVariable};
use scenecache::scene::algo::{collect_geometry, read_world_transform, GatherOptions, Space};
use scenecache::scene::SceneCache;
use scenecache::util::{path_of, path_to_string, Box3f, DMat4, DQuat, DVec3, Name, Vec3};
use scenecache::Error;

use tempfile::Builder;

fn temp_scc() -> tempfile::NamedTempFile {
    Builder::new()
        .suffix(".scc")
        .tempfile()
        .expect("Failed to create temp file")
}

fn names(tags: &[&str]) -> Vec<Name> {
    tags.iter().map(|t| Name::from(*t)).collect()
}

fn unit_box(colour: Vec3) -> Object {
    let mut mesh = MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE));
    mesh.variables.insert(
        "Cs".to_string(),
        PrimitiveVariable::new(Interpolation::Constant, Data::Color3f(colour)),
    );
    Object::Mesh(mesh)
}

fn translate(x: f64) -> DMat4 {
    DMat4::from_translation(DVec3::new(x, 0.0, 0.0))
}

/// Writes the `/1/2/3` chain with translates 1, 2, 3 and red, green, blue
/// boxes. Tags `a`, `b`, `c` go on the three levels when requested.
fn write_chain(path: &std::path::Path, tagged: bool, with_objects: bool) {
    let root = SceneCache::open(path, OpenMode::Write).expect("Failed to create scene");
    let colours = [Vec3::X, Vec3::Y, Vec3::Z];
    let tags = ["a", "b", "c"];
    let mut parent: Option<SceneRef> = None;
    for i in 0..3 {
        let name = (i + 1).to_string();
        let child = match &parent {
            Some(p) => p.create_child(&name),
            None => root.create_child(&name),
        }
        .expect("Failed to create child");
        child.write_transform(&translate((i + 1) as f64), 0.0).unwrap();
        if with_objects {
            child.write_object(&unit_box(colours[i]), 0.0).unwrap();
        }
        if tagged {
            child.write_tags(&names(&[tags[i]])).unwrap();
        }
        parent = Some(child);
    }
    root.flush().expect("Failed to flush");
}

#[test]
fn test_roundtrip_hierarchy_and_samples() {
    let temp = temp_scc();
    let path = temp.path();

    let rotation = DMat4::from_quat(DQuat::from_rotation_z(0.5));
    {
        let root = SceneCache::open(path, OpenMode::Write).expect("Failed to create scene");
        root.write_attribute("user:shot", &Data::String("sh010".into()), 0.0)
            .unwrap();

        let group = root.create_child("group").unwrap();
        group.write_transform(&translate(1.0), 0.0).unwrap();
        group.write_transform(&(translate(2.0) * rotation), 1.0).unwrap();
        group.write_attribute("user:weight", &Data::Float(0.25), 0.0).unwrap();
        group.write_attribute("user:weight", &Data::Float(0.75), 1.0).unwrap();
        group.write_tags(&names(&["group", "hero"])).unwrap();

        let mesh = group.create_child("mesh").unwrap();
        mesh.write_object(&unit_box(Vec3::X), 0.0).unwrap();
        mesh.write_object(&unit_box(Vec3::Y), 1.0).unwrap();

        let points = root.create_child("points").unwrap();
        let cloud = PointsPrimitive::new(vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)]);
        points.write_object(&Object::Points(cloud), 0.0).unwrap();
        points
            .write_attribute("user:ids", &Data::IntVector(vec![3, 1, 2]), 0.0)
            .unwrap();
        root.flush().unwrap();
    }

    let root = SceneCache::open(path, OpenMode::Read).expect("Failed to open scene");
    assert_eq!(root.name(), "/");
    assert_eq!(root.child_names(), names(&["group", "points"]));
    assert_eq!(
        root.read_attribute("user:shot", 5.0).unwrap(),
        Data::String("sh010".into())
    );

    let group = root.child("group").unwrap();
    assert_eq!(group.read_transform_as_matrix(0.0).unwrap(), translate(1.0));
    assert_eq!(group.read_transform_as_matrix(0.5).unwrap(), translate(1.0));
    assert_eq!(group.read_transform_as_matrix(1.0).unwrap(), translate(2.0) * rotation);
    assert_eq!(group.read_attribute("user:weight", 0.99).unwrap(), Data::Float(0.25));
    assert_eq!(group.read_attribute("user:weight", 1.0).unwrap(), Data::Float(0.75));
    assert_eq!(
        group.read_tags(TagFilter::LOCAL).unwrap(),
        names(&["group", "hero"])
    );

    let mesh = group.child("mesh").unwrap();
    assert_eq!(mesh.read_object(0.0).unwrap(), Some(unit_box(Vec3::X)));
    assert_eq!(mesh.read_object(2.0).unwrap(), Some(unit_box(Vec3::Y)));
    let vars = mesh.read_object_primitive_variables(&["Cs", "missing"], 1.0).unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars["Cs"].data, Data::Color3f(Vec3::Y));

    let points = root.child("points").unwrap();
    assert!(points.has_tag("ObjectType:PointsPrimitive", TagFilter::LOCAL));
    assert_eq!(
        points.read_attribute("user:ids", 0.0).unwrap(),
        Data::IntVector(vec![3, 1, 2])
    );
    assert!(!points.has_child("nope"));
    assert!(matches!(points.child("nope"), Err(Error::ChildNotFound { .. })));
    assert!(matches!(
        points.read_attribute("user:nope", 0.0),
        Err(Error::AttributeNotFound { .. })
    ));
}

#[test]
fn test_path_uniqueness() {
    let temp = temp_scc();
    let root = SceneCache::open(temp.path(), OpenMode::Write).unwrap();
    let a = root.create_child("a").unwrap();
    a.create_child("same").unwrap();
    assert!(matches!(a.create_child("same"), Err(Error::DuplicateChild(_))));
    // The same name under a different parent is fine.
    root.create_child("same").unwrap();
    root.flush().unwrap();

    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
    assert_eq!(root.child_names(), names(&["a", "same"]));
}

#[test]
fn test_transform_composition() {
    let temp = temp_scc();
    {
        let root = SceneCache::open(temp.path(), OpenMode::Write).unwrap();
        let a = root.create_child("a").unwrap();
        a.write_transform(&DMat4::from_rotation_y(0.3), 0.0).unwrap();
        let b = a.create_child("b").unwrap();
        b.write_transform(&translate(4.0), 0.0).unwrap();
        let c = b.create_child("c").unwrap();
        c.write_transform(&DMat4::from_scale(DVec3::splat(2.0)), 0.0).unwrap();
        root.flush().unwrap();
    }
    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
    let c = root.scene(&path_of(&["a", "b", "c"])).unwrap();
    let expected = DMat4::from_rotation_y(0.3) * translate(4.0) * DMat4::from_scale(DVec3::splat(2.0));
    let world = read_world_transform(c.as_ref(), 0.0).unwrap();
    assert!(world.abs_diff_eq(expected, 1e-9));
}

#[test]
fn test_tag_query_scenario() {
    let temp = temp_scc();
    write_chain(temp.path(), true, false);

    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
    let two = root.scene(&path_of(&["1", "2"])).unwrap();
    assert_eq!(two.read_tags(TagFilter::ANCESTOR).unwrap(), names(&["a"]));
    assert_eq!(two.read_tags(TagFilter::DESCENDANT).unwrap(), names(&["c"]));
    assert_eq!(two.read_tags(TagFilter::LOCAL).unwrap(), names(&["b"]));
    assert_eq!(two.read_tags(TagFilter::EVERY).unwrap(), names(&["a", "b", "c"]));
    assert!(two.has_tag("a", TagFilter::EVERY));
    assert!(!two.has_tag("a", TagFilter::LOCAL));
}

#[test]
fn test_tag_monotonicity() {
    let temp = temp_scc();
    write_chain(temp.path(), true, true);

    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
    let paths = [
        path_of::<&str>(&[]),
        path_of(&["1"]),
        path_of(&["1", "2"]),
        path_of(&["1", "2", "3"]),
    ];
    for (i, upper) in paths.iter().enumerate() {
        let n = root.scene(upper).unwrap();
        let n_local = n.read_tags(TagFilter::LOCAL).unwrap();
        let n_desc = n.read_tags(TagFilter::DESCENDANT).unwrap();
        for lower in &paths[i + 1..] {
            let d = root.scene(lower).unwrap();
            let d_anc = d.read_tags(TagFilter::ANCESTOR).unwrap();
            for tag in &n_local {
                assert!(d_anc.contains(tag), "{tag} missing from ancestors of {}", path_to_string(lower));
            }
            for tag in d.read_tags(TagFilter::LOCAL).unwrap() {
                assert!(n_desc.contains(&tag), "{tag} missing from descendants of {}", path_to_string(upper));
            }
        }
    }
    assert!(root.has_tag("ObjectType:MeshPrimitive", TagFilter::DESCENDANT));
}

#[test]
fn test_empty_tags() {
    let temp = temp_scc();
    write_chain(temp.path(), false, false);
    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
    assert!(root.read_tags(TagFilter::EVERY).unwrap().is_empty());
    let leaf = root.scene(&path_of(&["1", "2", "3"])).unwrap();
    assert!(leaf.read_tags(TagFilter::EVERY).unwrap().is_empty());
}

#[test]
fn test_time_dependence() {
    let temp = temp_scc();
    write_chain(temp.path(), false, true);
    {
        let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();
        assert!(!root.is_time_dependent().unwrap());
        let leaf = root.scene(&path_of(&["1", "2", "3"])).unwrap();
        assert!(!leaf.is_time_dependent().unwrap());
    }

    let animated = temp_scc();
    {
        let root = SceneCache::open(animated.path(), OpenMode::Write).unwrap();
        let one = root.create_child("1").unwrap();
        let two = one.create_child("2").unwrap();
        let still = one.create_child("still").unwrap();
        still.write_attribute("user:v", &Data::Int(1), 0.0).unwrap();
        still.write_attribute("user:v", &Data::Int(1), 1.0).unwrap();
        still.write_transform(&DMat4::IDENTITY, 0.0).unwrap();
        still.write_transform(&DMat4::IDENTITY, 1.0).unwrap();
        two.write_attribute("user:v", &Data::Int(1), 0.0).unwrap();
        two.write_attribute("user:v", &Data::Int(2), 1.0).unwrap();
        root.flush().unwrap();
    }
    let root = SceneCache::open(animated.path(), OpenMode::Read).unwrap();
    assert!(root.is_time_dependent().unwrap());
    assert!(root.child("1").unwrap().is_time_dependent().unwrap());
    let one = root.child("1").unwrap();
    assert!(one.child("2").unwrap().is_time_dependent().unwrap());
    assert!(!one.child("still").unwrap().is_time_dependent().unwrap());
}

#[test]
fn test_concrete_scenario() {
    let temp = temp_scc();
    write_chain(temp.path(), false, true);
    let root = SceneCache::open(temp.path(), OpenMode::Read).unwrap();

    let first = |object: &Object| -> Vec3 {
        object.primitive_variables().unwrap()["P"].data.as_v3f_slice().unwrap()[0]
    };

    let world = collect_geometry(&root, &GatherOptions::default()).unwrap();
    let expected = [(1.0, Vec3::X), (3.0, Vec3::Y), (6.0, Vec3::Z)];
    assert_eq!(world.len(), 3);
    for (gathered, (x, colour)) in world.iter().zip(expected) {
        assert!(first(&gathered.object).abs_diff_eq(Vec3::new(x, 0.0, 0.0), 1e-6));
        let cs = &gathered.object.primitive_variables().unwrap()["Cs"];
        assert_eq!(cs.data, Data::Color3f(colour));
    }

    let options = GatherOptions {
        root: path_of(&["1", "2"]),
        space: Space::Path,
        ..Default::default()
    };
    let relative = collect_geometry(&root, &options).unwrap();
    assert_eq!(path_to_string(&relative[0].path), "/");
    assert_eq!(first(&relative[0].object), Vec3::ZERO);
    assert_eq!(path_to_string(&relative[1].path), "/3");
}

fn digest(scene: &dyn SceneInterface, kind: HashType, time: f64) -> MurmurHash {
    let mut h = MurmurHash::new();
    scene.hash(kind, time, &mut h).unwrap();
    h
}

#[test]
fn test_hash_is_content_based() {
    let a = temp_scc();
    let b = temp_scc();
    write_chain(a.path(), true, true);
    write_chain(b.path(), true, true);
    let ra = SceneCache::open(a.path(), OpenMode::Read).unwrap();
    let rb = SceneCache::open(b.path(), OpenMode::Read).unwrap();

    for kind in HashType::ALL {
        assert_eq!(digest(&ra, kind, 0.0), digest(&rb, kind, 0.0));
    }
    let one = ra.child("1").unwrap();
    assert_ne!(
        digest(one.as_ref(), HashType::Transform, 0.0),
        digest(&ra, HashType::Transform, 0.0)
    );
}

#[test]
fn test_open_modes() {
    let temp = temp_scc();
    assert!(matches!(
        SceneCache::open(temp.path(), OpenMode::CreateNew),
        Err(Error::FileExists(_))
    ));
    assert!(SceneCache::open(temp.path(), OpenMode::Append).is_err());
    // An empty file is not a scene cache.
    assert!(SceneCache::open(temp.path(), OpenMode::Read).is_err());

    let dir = tempfile::tempdir().unwrap();
    assert!(SceneCache::open(dir.path().join("missing.scc"), OpenMode::Read)
        .unwrap_err()
        .is_not_found());
}
