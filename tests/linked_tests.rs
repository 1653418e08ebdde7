//! Integration tests for reading through links between scene files.

use std::io::{Seek, SeekFrom, Write};
use std::path::Path as FsPath;
use std::sync::Arc;

use scenecache::core::{
    Channel, HashType, LinkTarget, MurmurHash, OpenMode, SampledSceneInterface, SceneInterface,
    TagFilter,
};
use scenecache::io::IArchive;
use scenecache::object::{Data, MeshPrimitive, Object};
use scenecache::scene::{
    LinkedScene, SceneCache, SharedSceneInterfaces, LINK_FILE_NAME_ATTRIBUTE, LINK_ROOT_ATTRIBUTE,
    LINK_TIME_ATTRIBUTE,
};
use scenecache::util::{path_of, Box3f, DMat4, DVec3, Name, Path, Vec3};

fn translate(x: f64) -> DMat4 {
    DMat4::from_translation(DVec3::new(x, 0.0, 0.0))
}

/// Asset with an animated `/rig` group holding a static `/rig/body` mesh.
fn write_asset(path: &FsPath) {
    let root = SceneCache::open(path, OpenMode::Write).expect("Failed to create asset");
    let rig = root.create_child("rig").unwrap();
    for (t, x) in [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)] {
        rig.write_transform(&translate(x), t).unwrap();
    }
    rig.write_attribute("user:frame", &Data::Double(0.0), 0.0).unwrap();
    rig.write_attribute("user:frame", &Data::Double(1.0), 1.0).unwrap();
    rig.write_tags(&[Name::from("character")]).unwrap();
    let body = rig.create_child("body").unwrap();
    body.write_object(
        &Object::Mesh(MeshPrimitive::create_box(Box3f::new(Vec3::splat(-0.5), Vec3::splat(0.5)))),
        0.0,
    )
    .unwrap();
    root.flush().expect("Failed to flush asset");
}

fn digest(scene: &dyn SceneInterface, kind: HashType, time: f64) -> MurmurHash {
    let mut h = MurmurHash::new();
    scene.hash(kind, time, &mut h).unwrap();
    h
}

#[test]
fn test_link_transparency() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let hero = root.create_child_scene("hero").unwrap();
        hero.write_transform(&translate(10.0), 0.0).unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        hero.write_link(&asset_root, None).unwrap();
        root.flush().unwrap();
    }

    let shot = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let asset = SceneCache::open(&asset, OpenMode::Read).unwrap();
    let hero = shot.child("hero").unwrap();
    assert_eq!(hero.read_transform_as_matrix(0.0).unwrap(), translate(10.0));
    assert_eq!(hero.child_names(), asset.child_names());

    for rel in [path_of(&["rig"]), path_of(&["rig", "body"])] {
        let mut through = path_of(&["hero"]);
        through.extend(rel.iter().cloned());
        let linked = shot.scene(&through).unwrap();
        let direct = asset.scene(&rel).unwrap();
        for t in [-1.0, 0.0, 0.5, 1.0, 1.5, 2.0, 3.0] {
            assert_eq!(
                linked.read_transform_as_matrix(t).unwrap(),
                direct.read_transform_as_matrix(t).unwrap()
            );
            assert_eq!(linked.read_bound(t).unwrap(), direct.read_bound(t).unwrap());
            assert_eq!(linked.read_object(t).unwrap(), direct.read_object(t).unwrap());
            assert_eq!(
                digest(linked.as_ref(), HashType::Hierarchy, t),
                digest(direct.as_ref(), HashType::Hierarchy, t)
            );
        }
        assert_eq!(linked.attribute_names(), direct.attribute_names());
        assert_eq!(
            linked.read_tags(TagFilter::LOCAL).unwrap(),
            direct.read_tags(TagFilter::LOCAL).unwrap()
        );
    }

    // The link bundle is only visible on the raw file.
    assert!(!hero.has_attribute(LINK_FILE_NAME_ATTRIBUTE));
    assert!(!hero.has_attribute(LINK_ROOT_ATTRIBUTE));
    let raw = SceneCache::open(shot.file_name(), OpenMode::Read).unwrap();
    let raw_hero = raw.child("hero").unwrap();
    assert!(raw_hero.has_attribute(LINK_FILE_NAME_ATTRIBUTE));
    assert!(raw_hero.has_attribute(LINK_ROOT_ATTRIBUTE));
    assert!(!raw_hero.has_attribute(LINK_TIME_ATTRIBUTE));
    assert!(raw_hero.child_names().is_empty());

    // Tags of the linked subtree show up above the link location.
    assert!(shot.has_tag("character", TagFilter::DESCENDANT));
    assert!(hero.has_tag("character", TagFilter::DESCENDANT));
}

#[test]
fn test_link_time_offset() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let late = root.create_child_scene("late").unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        late.write_link(&asset_root, Some(0.5)).unwrap();
        root.flush().unwrap();
    }

    let shot = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let asset = SceneCache::open(&asset, OpenMode::Read).unwrap();
    let linked = shot.scene(&path_of(&["late", "rig"])).unwrap();
    let direct = asset.child("rig").unwrap();
    for t in [0.0, 0.5, 1.0, 1.5, 2.5] {
        assert_eq!(
            linked.read_transform_as_matrix(t).unwrap(),
            direct.read_transform_as_matrix(t - 0.5).unwrap()
        );
        assert_eq!(
            linked.read_attribute("user:frame", t).unwrap(),
            direct.read_attribute("user:frame", t - 0.5).unwrap()
        );
    }
    assert_eq!(
        shot.child("late").unwrap().link_target().unwrap(),
        LinkTarget::new(asset.file_name(), Path::new(), 0.5)
    );
}

#[test]
fn test_links_share_opened_files() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        for name in ["a", "b", "c"] {
            root.create_child_scene(name)
                .unwrap()
                .write_link(&asset_root, None)
                .unwrap();
        }
        root.flush().unwrap();
    }

    let shared = Arc::new(SharedSceneInterfaces::new());
    let scene = LinkedScene::with_shared(&shot, OpenMode::Read, shared.clone()).unwrap();
    assert_eq!(scene.link_locations().len(), 3);
    for name in scene.child_names() {
        let child = scene.child(&name).unwrap();
        assert_eq!(child.child_names(), vec![Name::from("rig")]);
    }
    assert_eq!(shared.len(), 1);
}

#[test]
fn test_broken_link_keeps_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        root.create_child_scene("linked")
            .unwrap()
            .write_link(&asset_root, None)
            .unwrap();
        let local = root.create_child_scene("local").unwrap();
        local.write_transform(&translate(3.0), 0.0).unwrap();
        local.write_tags(&[Name::from("set")]).unwrap();
        root.flush().unwrap();
    }
    std::fs::remove_file(&asset).unwrap();

    let scene = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let linked = scene.child("linked").unwrap();
    assert!(linked.child_names().is_empty());
    assert!(!linked.has_object());
    let local = scene.child("local").unwrap();
    assert_eq!(local.read_transform_as_matrix(0.0).unwrap(), translate(3.0));
    assert!(scene.has_tag("set", TagFilter::DESCENDANT));
}

/// Overwrite the length prefix of the file header block.
fn corrupt_header_block(path: &FsPath) {
    let pos = {
        let archive = IArchive::open(path).unwrap();
        archive.root().data("header").unwrap().pos()
    };
    let mut file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(pos)).unwrap();
    file.write_all(&u64::MAX.to_le_bytes()).unwrap();
}

#[test]
fn test_corrupt_link_keeps_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        root.create_child_scene("linked")
            .unwrap()
            .write_link(&asset_root, None)
            .unwrap();
        let local = root.create_child_scene("local").unwrap();
        local.write_transform(&translate(3.0), 0.0).unwrap();
        root.flush().unwrap();
    }
    corrupt_header_block(&asset);
    assert!(SceneCache::open(&asset, OpenMode::Read).is_err());

    let scene = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let linked = scene.child("linked").unwrap();
    assert!(linked.child_names().is_empty());
    let local = scene.child("local").unwrap();
    assert_eq!(local.read_transform_as_matrix(0.0).unwrap(), translate(3.0));
}

#[test]
fn test_nested_link_copies_animated_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    let seq = dir.path().join("seq.lscc");

    {
        let root = SceneCache::open(&asset, OpenMode::Write).unwrap();
        let a = root.create_child("a").unwrap();
        a.write_transform(&translate(0.0), 0.0).unwrap();
        a.write_transform(&translate(10.0), 1.0).unwrap();
        a.write_object(
            &Object::Mesh(MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE))),
            0.0,
        )
        .unwrap();
        root.flush().unwrap();
    }
    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let asset_root = SceneCache::open(&asset, OpenMode::Read).unwrap();
        root.create_child_scene("inst")
            .unwrap()
            .write_link(&asset_root, None)
            .unwrap();
        root.flush().unwrap();
    }
    {
        let root = LinkedScene::open(&seq, OpenMode::Write).unwrap();
        let shot_inst = LinkedScene::open(&shot, OpenMode::Read).unwrap().child("inst").unwrap();
        root.create_child_scene("shot")
            .unwrap()
            .write_link(shot_inst.as_ref(), None)
            .unwrap();
        root.flush().unwrap();
    }

    let shot = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let inst = shot.child("inst").unwrap();
    let sampled = inst.as_sampled().unwrap();
    assert_eq!(sampled.sample_times(&Channel::Bound).unwrap().as_slice(), &[0.0, 1.0]);
    let a = inst.child("a").unwrap();
    assert_eq!(
        a.as_sampled().unwrap().read_transform_at_sample(1).unwrap(),
        translate(10.0)
    );

    let seq = LinkedScene::open(&seq, OpenMode::Read).unwrap();
    let linked = seq.child("shot").unwrap();
    for t in [0.0, 1.0] {
        let bound = linked.read_bound(t).unwrap();
        let child = seq.scene(&path_of(&["shot", "a"])).unwrap();
        let x = child.read_transform_as_matrix(t).unwrap().w_axis.x;
        assert_eq!(bound.min.x, x);
        assert_eq!(bound.max.x, x + 1.0);
    }
}

#[test]
fn test_time_remapped_link_samples() {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("asset.scc");
    let shot = dir.path().join("shot.lscc");
    write_asset(&asset);

    {
        let root = LinkedScene::open(&shot, OpenMode::Write).unwrap();
        let late = root.create_child_scene("late").unwrap();
        let target = LinkTarget::new(asset.display().to_string(), Path::new(), 0.5);
        late.write_link_target(&target, 0.0).unwrap();
        late.write_link_target(&LinkTarget { time_offset: 1.0, ..target }, 3.0).unwrap();
        root.flush().unwrap();
    }

    let shot = LinkedScene::open(&shot, OpenMode::Read).unwrap();
    let rig = shot.scene(&path_of(&["late", "rig"])).unwrap();
    let sampled = rig.as_sampled().unwrap();
    assert_eq!(sampled.sample_times(&Channel::Transform).unwrap().as_slice(), &[0.0, 3.0]);
    // Query time 3 reads the asset at 2.
    assert_eq!(sampled.read_transform_at_sample(1).unwrap(), translate(4.0));
    assert!(matches!(
        shot.child("late")
            .unwrap()
            .as_sampled()
            .unwrap()
            .sample_times(&Channel::Attribute(Name::from(LINK_FILE_NAME_ATTRIBUTE))),
        Err(scenecache::Error::AttributeNotFound { .. })
    ));
}
