//! # Voxel File Inspector
//!
//! Prints the structure of a voxel model file.

use voxform_core::scene::Node;
use voxform_core::{CodecConfig, VoxCodec, VoxDocument};

fn load_config(args: &[String]) -> Result<CodecConfig, String> {
    match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).ok_or("--config needs a path")?;
            CodecConfig::load(path).map_err(|e| e.to_string())
        }
        None => Ok(CodecConfig::default()),
    }
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         VOXFORM INSPECTOR                                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1].starts_with("--") {
        println!("Usage: vox_inspect <model.vox>");
        println!();
        println!("Options:");
        println!("  --config <file>  Codec settings (TOML)");
        println!("  --parts          Show scene parts with world placement");
        println!("  --verbose        List every node, layer and render object");
        return;
    }

    let path = &args[1];
    let verbose = args.iter().any(|a| a == "--verbose");
    let show_parts = args.iter().any(|a| a == "--parts");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            println!("Error: Could not load config: {e}");
            return;
        }
    };
    tracing::debug!(?config, "inspector config");
    let codec = VoxCodec::new(config);

    println!("Loading model: {path}");
    let document = match codec.read_document_path(path) {
        Ok(document) => document,
        Err(e) => {
            println!("Error: Could not read file: {e}");
            return;
        }
    };

    print_summary(&document);

    if verbose {
        print_details(&document);
    }

    if show_parts {
        match document.scene.parts(&document.layers) {
            Ok(parts) => {
                println!("┌─ PARTS ──────────────────────────────────────────────────────────┐");
                for (index, part) in parts.iter().enumerate() {
                    println!(
                        "│ {index:>3} {:<16} parent {:<5} t {:?} world {:?} model {:<5} {}",
                        part.name.as_deref().unwrap_or("-"),
                        part.parent.map_or_else(|| "-".to_owned(), |p| p.to_string()),
                        part.translation,
                        part.world_translation,
                        part.model.map_or_else(|| "-".to_owned(), |m| m.to_string()),
                        if part.hidden { "hidden" } else { "" },
                    );
                }
                println!("└──────────────────────────────────────────────────────────────────┘");
                println!();
            }
            Err(e) => println!("Error: Could not walk scene: {e}"),
        }
    }

    match voxform_core::model::flatten(document, false) {
        Ok(parsed) => {
            let model = parsed.model();
            println!(
                "✓ Flattened {} voxels ({} with exposed faces) in a {} grid",
                model.len(),
                model.visible().count(),
                model.size
            );
        }
        Err(e) => println!("⚠ Could not flatten: {e}"),
    }
}

fn print_summary(document: &VoxDocument) {
    let shapes = document.scene.shapes().count();
    println!();
    println!("┌─ FILE ───────────────────────────────────────────────────────────┐");
    println!("│ Models:             {}", document.models.len());
    for (index, model) in document.models.iter().enumerate() {
        println!("│   #{index:<3} {:>12}  {} voxels", model.size.to_string(), model.voxels.len());
    }
    println!("│ Scene nodes:        {} ({shapes} shapes)", document.scene.len());
    println!("│ Layers:             {}", document.layers.len());
    println!(
        "│ Palette:            {}",
        if document.palette.is_some() { "stored" } else { "default" }
    );
    println!(
        "│ Index map:          {}",
        if document.index_map.is_some() { "stored" } else { "none" }
    );
    println!("│ Materials:          {}", document.materials.len());
    println!("│ Render objects:     {}", document.render.len());
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_details(document: &VoxDocument) {
    println!("┌─ NODES ──────────────────────────────────────────────────────────┐");
    for (id, node) in document.scene.nodes().iter().enumerate() {
        match node {
            Node::Transform(t) => println!(
                "│ {id:>3} nTRN child {} layer {:?} name {:?} r {} t {:?}",
                t.child,
                t.layer,
                t.name,
                t.rotation().byte(),
                t.translation()
            ),
            Node::Group(g) => println!("│ {id:>3} nGRP children {:?}", g.children),
            Node::Shape(s) => println!("│ {id:>3} nSHP model {}", s.model),
        }
    }
    println!("└──────────────────────────────────────────────────────────────────┘");

    println!("┌─ LAYERS ─────────────────────────────────────────────────────────┐");
    for layer in &document.layers {
        println!(
            "│ {:>3} {:<16} {}",
            layer.id,
            layer.name.as_deref().unwrap_or("-"),
            if layer.is_hidden() { "hidden" } else { "" }
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");

    println!("┌─ RENDER OBJECTS ─────────────────────────────────────────────────┐");
    for object in document.render.objects() {
        let keys: Vec<_> = object.attributes().keys().skip(1).collect();
        println!("│ {:<9} {}", object.kind().type_name(), keys.join(" "));
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
}
