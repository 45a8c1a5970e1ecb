// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: Turn a single image into an explorable 3D environment
//!
//! Usage:
//!   image-to-3d <image_path> [options]

use scenelift_geometry::{export_to_file, ExportFormat, RoomComplexity};
use scenelift_vision::{
    generate_environment, visualize_depth, DepthConfig, GenerationOptions, PipelineConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let image_path = PathBuf::from(&args[1]);

    // Parse options
    let mut output_path: Option<PathBuf> = None;
    let mut format: Option<ExportFormat> = None;
    let mut preset = String::from("quality");
    let mut config_path: Option<PathBuf> = None;
    let mut depth_map: Option<PathBuf> = None;
    let mut max_dim: Option<u32> = None;
    let mut confidence_filter: Option<f32> = None;
    let mut depth_png: Option<PathBuf> = None;
    let mut options = GenerationOptions::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => output_path = Some(PathBuf::from(value(&args, &mut i))),
            "--format" => format = Some(parse(&args, &mut i, "format")),
            "--preset" => preset = value(&args, &mut i).to_string(),
            "--config" => config_path = Some(PathBuf::from(value(&args, &mut i))),
            "--depth-map" => depth_map = Some(PathBuf::from(value(&args, &mut i))),
            "--max-dim" => max_dim = Some(parse(&args, &mut i, "max dimension")),
            "--no-hallucinate" => options.hallucinate_unseen = false,
            "--complexity" => {
                options.room_complexity = parse::<RoomComplexity>(&args, &mut i, "complexity")
            }
            "--wall-thickness" => options.wall_thickness = parse(&args, &mut i, "wall thickness"),
            "--no-interiors" => options.generate_interiors = false,
            "--confidence-filter" => {
                confidence_filter = Some(parse(&args, &mut i, "confidence filter"))
            }
            "--depth-png" => depth_png = Some(PathBuf::from(value(&args, &mut i))),
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let format = format
        .or_else(|| output_path.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or(ExportFormat::Glb);
    let output_path = output_path.unwrap_or_else(|| {
        PathBuf::from(format!("generated_3d_environment.{}", format.extension()))
    });

    println!("=== Image to 3D Environment ===");
    println!();

    // Step 1: Configure
    println!("[1/4] Configuring pipeline...");
    let mut config = match &config_path {
        Some(path) => load_config(path),
        None => {
            let depth = DepthConfig::preset(&preset).unwrap_or_else(|| {
                eprintln!("Error: Unknown preset '{}'", preset);
                process::exit(1);
            });
            println!("  Preset: {}", preset);
            PipelineConfig {
                depth,
                ..PipelineConfig::default()
            }
        }
    };
    if let Some(max_dim) = max_dim {
        config.depth.preprocess.max_dimension = max_dim;
    }
    if confidence_filter.is_some() {
        config.mesh.confidence_filter = confidence_filter;
    }
    if depth_map.is_some() {
        config.depth_map = depth_map;
    }
    println!(
        "  Resolution cap: {} px, hallucinate: {}, complexity: {}",
        config.depth.preprocess.max_dimension, options.hallucinate_unseen, options.room_complexity
    );

    // Step 2: Generate
    println!("[2/4] Generating from {}...", image_path.display());
    let env = generate_environment(&image_path, &options, &config, |stage| {
        println!("  {:>3}% {}", stage.progress(), stage.label());
    })
    .unwrap_or_else(|e| {
        eprintln!("Error ({}): {}", e.stage(), e);
        process::exit(1);
    });

    println!("  Scene: {}", env.scene);
    println!(
        "  Depth: {} via {} ({} cues{})",
        format!("{}x{}", env.depth.width(), env.depth.height()),
        env.depth_report.source,
        env.depth_report.cues_used.len(),
        if env.depth_report.fallback {
            ", fallback gradient"
        } else {
            ""
        }
    );
    for (cue, reason) in &env.depth_report.cues_failed {
        println!("  Skipped cue {}: {}", cue, reason);
    }
    println!(
        "  Reconstruction: {:?}, stride {}, {} contours, {} wall panels{}",
        env.reconstruction.kind,
        env.reconstruction.stride,
        env.reconstruction.contours,
        env.reconstruction.wall_panels,
        if env.reconstruction.fallback_box {
            ", fallback slab"
        } else {
            ""
        }
    );

    // Step 3: Optional depth visualisation
    println!("[3/4] Depth visualisation...");
    match &depth_png {
        Some(path) => {
            if let Err(e) = visualize_depth(&env.depth).save(path) {
                eprintln!("Error: Cannot write depth image '{}': {}", path.display(), e);
                process::exit(1);
            }
            println!("  Written to {}", path.display());
        }
        None => println!("  Skipped (use --depth-png to write one)"),
    }

    // Step 4: Export
    println!("[4/4] Exporting {}...", format);
    if let Err(e) = export_to_file(&env.mesh, format, &output_path) {
        eprintln!("Error: Cannot export '{}': {}", output_path.display(), e);
        process::exit(1);
    }

    println!();
    println!("=== Summary ===");
    println!("  Scene:       {}", env.scene);
    println!("  Vertices:    {}", env.mesh.vertex_count());
    println!("  Triangles:   {}", env.mesh.triangle_count());
    println!("  Added parts: {}", env.enrichment_parts);
    println!(
        "  Timings:     load {} ms, depth {} ms, mesh {} ms, enrich {} ms",
        env.timings.load_ms, env.timings.depth_ms, env.timings.mesh_ms, env.timings.enrich_ms
    );
    println!("  Output:      {}", output_path.display());
}

/// Advance to and return the value following a flag
fn value<'a>(args: &'a [String], i: &mut usize) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.as_str(),
        None => {
            eprintln!("Missing value for {}", args[*i - 1]);
            process::exit(1);
        }
    }
}

fn parse<T: FromStr>(args: &[String], i: &mut usize, what: &str) -> T {
    let raw = value(args, i);
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {} value: {}", what, raw);
        process::exit(1);
    })
}

fn load_config(path: &Path) -> PipelineConfig {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error: Cannot read config '{}': {}", path.display(), e);
        process::exit(1);
    });
    let config: PipelineConfig = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error: Invalid config '{}': {}", path.display(), e);
        process::exit(1);
    });
    println!("  Config: {}", path.display());
    config
}

fn print_usage() {
    println!("Usage: image-to-3d <image_path> [options]");
    println!();
    println!("Options:");
    println!("  --output, -o <path>        Output model path (default: generated_3d_environment.glb)");
    println!("  --format <glb|obj|ply>     Export format (default: from output extension, else glb)");
    println!("  --preset <name>            quality | low-memory | multi-cue (default: quality)");
    println!("  --config <path>            JSON pipeline configuration (overrides --preset)");
    println!("  --depth-map <path>         Use an externally computed depth image");
    println!("  --max-dim <px>             Cap on the longer image side");
    println!("  --no-hallucinate           Skip procedural completion of unseen areas");
    println!("  --complexity <level>       low | medium | high (default: medium)");
    println!("  --wall-thickness <units>   Thickness of generated walls (default: 0.3)");
    println!("  --no-interiors             Generate only the floor slab when completing");
    println!("  --confidence-filter <min>  Drop height-map vertices below this confidence");
    println!("  --depth-png <path>         Write a colour visualisation of the depth map");
    println!();
    println!("Set RUST_LOG=debug for detailed stage logs.");
}
