//! Scenecache CLI - Tool for inspecting scene cache files.

use std::env;
use std::path::Path as FsPath;

use scenecache::core::{SceneInterface, SceneRef, TagFilter};
use scenecache::prelude::{path_to_string, string_to_path, Chrono, OpenMode, Result};
use scenecache::scene::algo::{read_world_transform, visit};
use scenecache::scene::{read_link_locations, SceneFormatRegistry};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
    if json_mode {
        level = "error";
    }
    filtered_args.retain(|&s| s != "--json" && s != "-j");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let file = filtered_args.get(1).copied();
    let location = filtered_args.get(2).copied();
    let result = match filtered_args[0] {
        "info" | "i" => with_file(file, "info <file>", cmd_info),
        "tree" | "t" => with_file(file, "tree <file>", cmd_tree),
        "header" | "H" => with_file(file, "header <file>", cmd_header),
        "tags" | "g" => with_file(file, "tags <file> [location]", |scene| cmd_tags(scene, location)),
        "attrs" | "a" => with_file(file, "attrs <file> [location] [time]", |scene| {
            let time = filtered_args
                .get(3)
                .and_then(|s| s.parse::<Chrono>().ok())
                .unwrap_or(0.0);
            cmd_attrs(scene, location, time)
        }),
        "dump" | "d" => with_file(file, "dump <file> [pattern] [--json]", |scene| {
            cmd_dump(scene, location, json_mode)
        }),
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        // Default: if file exists, show info; otherwise error
        other => {
            if FsPath::new(other).exists() {
                with_file(Some(other), "info <file>", cmd_info)
            } else {
                eprintln!("Unknown command: {}", other);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("scenecache-cli - scene cache toolkit");
    println!();
    println!("USAGE:");
    println!("    scenecache-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <file>                      Show header summary and location counts");
    println!("    t, tree   <file>                      Show full location hierarchy");
    println!("    H, header <file>                      Show file header entries");
    println!("    g, tags   <file> [location]           Show tags by class");
    println!("    a, attrs  <file> [location] [time]    Show attribute values");
    println!("    d, dump   <file> [pattern]            Dump world transforms and bounds");
    println!("    h, help                               Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Suppress log output");
    println!("    -j, --json       JSON output (dump only)");
    println!();
    println!("EXAMPLES:");
    println!("    scenecache-cli info shot.scc");
    println!("    scenecache-cli tags shot.lscc /set/chair");
    println!("    scenecache-cli dump shot.scc wheel --json");
    println!();
    println!("NOTES:");
    println!("    - Passing a file directly is equivalent to 'info'");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn with_file(file: Option<&str>, usage: &str, f: impl FnOnce(&SceneRef) -> Result<()>) -> Result<()> {
    let Some(file) = file else {
        eprintln!("Error: missing file argument");
        eprintln!("Usage: scenecache-cli {}", usage);
        std::process::exit(1);
    };
    info!("Opening scene: {}", file);
    let scene = SceneFormatRegistry::default().create_scene(FsPath::new(file), OpenMode::Read)?;
    debug!("Scene opened successfully");
    f(&scene)
}

fn locate(scene: &SceneRef, location: Option<&str>) -> Result<SceneRef> {
    match location {
        Some(loc) => scene.scene(&string_to_path(loc)),
        None => Ok(scene.clone()),
    }
}

/// Location counts for the summary
#[derive(Default)]
struct LocationCounts {
    locations: usize,
    meshes: usize,
    points: usize,
    other: usize,
}

fn cmd_info(scene: &SceneRef) -> Result<()> {
    println!("File: {}", scene.file_name());
    if let Some(header) = scene.header() {
        if let Some(title) = header.title() {
            println!("Title: {}", title);
        }
    }

    let mut counts = LocationCounts::default();
    visit(scene.as_ref(), &mut |s| {
        counts.locations += 1;
        if s.has_object() {
            match s.read_object(0.0)?.map(|o| o.type_name()) {
                Some("MeshPrimitive") => counts.meshes += 1,
                Some("PointsPrimitive") => counts.points += 1,
                Some(_) => counts.other += 1,
                None => {}
            }
        }
        Ok(true)
    })?;

    println!("Time dependent: {}", scene.is_time_dependent()?);
    let bound = scene.read_bound(0.0)?;
    if !bound.is_empty() {
        println!("Bound: {:?} .. {:?}", bound.min, bound.max);
    }
    println!();
    println!("Locations: {}", counts.locations);
    println!("  Meshes:  {}", counts.meshes);
    println!("  Points:  {}", counts.points);
    if counts.other > 0 {
        println!("  Other:   {}", counts.other);
    }

    let links = read_link_locations(scene.as_ref())?;
    if !links.is_empty() {
        println!();
        println!("Link locations ({}):", links.len());
        for path in &links {
            println!("  {}", path_to_string(path));
        }
    }
    Ok(())
}

fn cmd_tree(scene: &SceneRef) -> Result<()> {
    println!("File: {}", scene.file_name());
    println!();
    visit(scene.as_ref(), &mut |s| {
        let depth = s.path().len();
        let mut line = format!("{}{}", "  ".repeat(depth), s.name());
        if s.has_object() {
            if let Some(object) = s.read_object(0.0)? {
                line.push_str(&format!(" [{}]", object.type_name()));
            }
        }
        if let Some(target) = s.link_target() {
            line.push_str(&format!(" -> {}:{}", target.file_name, path_to_string(&target.root)));
        }
        println!("{}", line);
        Ok(true)
    })
}

fn cmd_header(scene: &SceneRef) -> Result<()> {
    match scene.header() {
        Some(header) => {
            for (key, value) in header.iter() {
                println!("{}: {}", key, value);
            }
        }
        None => println!("(no header)"),
    }
    Ok(())
}

fn cmd_tags(scene: &SceneRef, location: Option<&str>) -> Result<()> {
    let target = locate(scene, location)?;
    println!("Location: {}", path_to_string(&target.path()));
    for (label, filter) in [
        ("Local", TagFilter::LOCAL),
        ("Ancestor", TagFilter::ANCESTOR),
        ("Descendant", TagFilter::DESCENDANT),
    ] {
        let tags = target.read_tags(filter)?;
        let names: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        println!("  {:<11}{}", format!("{}:", label), names.join(" "));
    }
    Ok(())
}

fn cmd_attrs(scene: &SceneRef, location: Option<&str>, time: Chrono) -> Result<()> {
    let target = locate(scene, location)?;
    println!("Location: {} @ {}", path_to_string(&target.path()), time);
    let mut names = target.attribute_names();
    names.sort();
    for name in names {
        let value = target.read_attribute(&name, time)?;
        println!("  {} ({}) = {:?}", name, value.type_name(), value);
    }
    Ok(())
}

fn cmd_dump(scene: &SceneRef, pattern: Option<&str>, json_mode: bool) -> Result<()> {
    let mut objects = Vec::new();
    visit(scene.as_ref(), &mut |s| {
        let path = path_to_string(&s.path());
        if pattern.is_some_and(|p| !path.contains(p)) {
            return Ok(true);
        }
        let world = read_world_transform(s, 0.0)?;
        let bound = s.read_bound(0.0)?;
        let object_type = match s.has_object() {
            true => s.read_object(0.0)?.map(|o| o.type_name()),
            false => None,
        };
        if json_mode {
            objects.push(serde_json::json!({
                "path": path,
                "world": world.to_cols_array_2d(),
                "bound": if bound.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::json!({ "min": bound.min.to_array(), "max": bound.max.to_array() })
                },
                "object": object_type,
                "timeDependent": s.is_time_dependent()?,
            }));
        } else {
            println!("{}", path);
            if let Some(t) = object_type {
                println!("  object: {}", t);
            }
            print_matrix(&world, "  ");
            if !bound.is_empty() {
                println!("  bound: {:?} .. {:?}", bound.min, bound.max);
            }
        }
        Ok(true)
    })?;

    if json_mode {
        let out = serde_json::json!({
            "file": scene.file_name(),
            "locations": objects,
        });
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize: {}", e),
        }
    }
    Ok(())
}

fn print_matrix(m: &scenecache::util::DMat4, indent: &str) {
    for row in 0..4 {
        let r = m.row(row);
        println!("{}[{:10.4} {:10.4} {:10.4} {:10.4}]", indent, r.x, r.y, r.z, r.w);
    }
}
