//! # Voxel File Converter
//!
//! Reads a file through the flat-model path and writes it back out as a
//! single-model file with a fresh palette and default scene.

use voxform_core::{CodecConfig, VoxCodec, WriteStrategy};

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         VOXFORM CONVERTER                                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args[1].starts_with("--") || args[2].starts_with("--") {
        println!("Usage: vox_convert <input.vox> <output.vox>");
        println!();
        println!("Options:");
        println!("  --config <file>  Codec settings (TOML)");
        println!("  --patch          Stream the output and patch the root length");
        println!("  --any-model      Accept files with several shapes (first one wins)");
        return;
    }

    let input = &args[1];
    let output = &args[2];

    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1).map(CodecConfig::load) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                println!("Error: Could not load config: {e}");
                return;
            }
            None => {
                println!("Error: --config needs a path");
                return;
            }
        },
        None => CodecConfig::default(),
    };
    if args.iter().any(|a| a == "--patch") {
        config.write_strategy = WriteStrategy::Patch;
    }
    if args.iter().any(|a| a == "--any-model") {
        config.single_model = false;
    }
    tracing::debug!(?config, "converter config");
    let codec = VoxCodec::new(config);

    println!("Loading model: {input}");
    let parsed = match codec.read_path(input) {
        Ok(parsed) => parsed,
        Err(e) => {
            println!("Error: Could not read file: {e}");
            return;
        }
    };

    let model = parsed.model();
    println!();
    println!("┌─ MODEL ──────────────────────────────────────────────────────────┐");
    println!("│ Grid:               {}", model.size);
    println!("│ Voxels:             {}", model.len());
    println!("│ Exposed:            {}", model.visible().count());
    println!("│ Source shape node:  {}", parsed.shape().map_or_else(|| "-".to_owned(), |id| id.to_string()));
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    match codec.write_path(output, model) {
        Ok(()) => println!("✓ Wrote {output} ({:?})", codec.config().write_strategy),
        Err(e) => println!("⚠ Could not write {output}: {e}"),
    }
}
