// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image file -> depth -> mesh -> export, on small synthetic inputs.

use image::{Rgb, RgbImage};
use scenelift_geometry::{export, ExportFormat};
use scenelift_vision::{
    estimate_depth, generate_environment, load_image, reconstruct, DepthConfig,
    GenerationOptions, MeshConfig, PipelineConfig, PipelineStage, PreprocessConfig,
    ReconstructionKind, SceneType,
};
use std::path::{Path, PathBuf};

/// Scratch directory removed on drop
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("scenelift-e2e-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn save(&self, name: &str, image: &RgbImage) -> PathBuf {
        let path = self.0.join(name);
        image.save(&path).unwrap();
        path
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// White sheet with a black rectangular outline `thickness` pixels wide
fn floor_plan_sheet(thickness: u32) -> RgbImage {
    let (outer, inner) = (96..416, (96 + thickness)..(416 - thickness));
    RgbImage::from_fn(512, 512, |x, y| {
        let inside_outer = outer.contains(&x) && outer.contains(&y);
        let inside_inner = inner.contains(&x) && inner.contains(&y);
        if inside_outer && !inside_inner {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Pale sky over textured, saturated grass
fn landscape() -> RgbImage {
    RgbImage::from_fn(120, 90, |x, y| {
        if y < 40 {
            Rgb([170, 200, 250])
        } else {
            let grain = ((x * 7 + y * 13) % 23) as u8 * 3;
            Rgb([30 + grain, 150 + grain, 20])
        }
    })
}

#[test]
fn floor_plan_outline_becomes_extruded_walls() {
    let scratch = Scratch::new("plan");
    let path = scratch.save("plan.png", &floor_plan_sheet(8));

    let (image, estimate) = estimate_depth(&path, &DepthConfig::default()).unwrap();
    assert_eq!(estimate.scene(), SceneType::FloorPlan);
    assert!(!estimate.report.fallback);

    // Wall strokes are tall, open floor and the margin are at ground level
    assert!(estimate.depth.get(100, 256) > 0.9);
    assert!(estimate.depth.get(256, 100) > 0.9);
    assert!(estimate.depth.get(256, 256) < 0.1);
    assert!(estimate.depth.get(20, 20) < 0.1);

    let reconstruction = reconstruct(
        &image,
        &estimate.depth,
        &estimate.confidence,
        estimate.scene(),
        &MeshConfig::default(),
    )
    .unwrap();
    let report = &reconstruction.report;
    assert_eq!(report.kind, ReconstructionKind::WallExtrusion);
    assert_eq!(report.contours, 2);
    assert!(report.wall_panels >= 8, "panels: {}", report.wall_panels);
    assert!(!report.fallback_box);

    // Geometry scales with contour segments, not with pixels
    let mesh = &reconstruction.mesh;
    assert!(mesh.vertex_count() <= 4 * report.wall_panels + 4);
    assert!(mesh.validate().is_ok());

    let bounds = mesh.bounds();
    assert!((bounds.max.y - MeshConfig::default().ceiling_height).abs() < 1e-4);
    assert!(bounds.min.y.abs() < 1e-4);
}

#[test]
fn hairline_outlines_become_extruded_walls() {
    let scratch = Scratch::new("hairline");
    for thickness in 1..=3 {
        let path = scratch.save(&format!("plan-{thickness}.png"), &floor_plan_sheet(thickness));

        let (image, estimate) = estimate_depth(&path, &DepthConfig::default()).unwrap();
        assert_eq!(estimate.scene(), SceneType::FloorPlan, "thickness {thickness}");
        assert!(estimate.depth.get(96, 256) > 0.9, "thickness {thickness}");
        assert!(estimate.depth.get(256, 96) > 0.9, "thickness {thickness}");
        assert!(estimate.depth.get(256, 256) < 0.1, "thickness {thickness}");
        assert!(estimate.depth.get(20, 20) < 0.1, "thickness {thickness}");

        let reconstruction = reconstruct(
            &image,
            &estimate.depth,
            &estimate.confidence,
            estimate.scene(),
            &MeshConfig::default(),
        )
        .unwrap();
        let report = &reconstruction.report;
        assert_eq!(report.kind, ReconstructionKind::WallExtrusion, "thickness {thickness}");
        assert!(report.wall_panels >= 4, "thickness {thickness}: {}", report.wall_panels);
        assert!(!report.fallback_box);
        assert!(reconstruction.mesh.vertex_count() <= 4 * report.wall_panels + 4);
    }
}

#[test]
fn featureless_image_falls_back_to_a_ramp() {
    let scratch = Scratch::new("gray");
    let path = scratch.save("gray.png", &RgbImage::from_pixel(100, 100, Rgb([128, 128, 128])));

    let (_, estimate) = estimate_depth(&path, &DepthConfig::default()).unwrap();
    assert_eq!(estimate.scene(), SceneType::General);
    assert!(estimate.report.fallback);

    let depth = &estimate.depth;
    assert!(depth.range() >= 0.01);
    for x in [0, 50, 99] {
        for y in 1..depth.height() {
            assert!(depth.get(x, y) >= depth.get(x, y - 1) - 1e-6);
        }
    }
    // Photographic scenes keep a compressed range
    let (lo, hi) = depth.min_max();
    assert!((lo - 0.2).abs() < 1e-4);
    assert!((hi - 0.8).abs() < 1e-4);
}

#[test]
fn large_input_is_capped_with_aspect_preserved() {
    let scratch = Scratch::new("large");
    let source = RgbImage::from_fn(2000, 1200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let path = scratch.save("large.png", &source);

    let image = load_image(&path, &PreprocessConfig { max_dimension: 640 }).unwrap();
    assert_eq!(image.dimensions(), (640, 384));
    assert_eq!((image.original_width, image.original_height), (2000, 1200));
    assert!((image.scale - 0.32).abs() < 1e-6);
    assert_eq!(image.gray.dimensions(), (640, 384));
    assert_eq!(image.hsv.hue.dimensions(), (640, 384));
}

#[test]
fn corrupt_file_is_a_load_error_and_writes_nothing() {
    let scratch = Scratch::new("corrupt");
    let path = scratch.path().join("broken.png");
    std::fs::write(&path, b"definitely not a png").unwrap();

    let err = estimate_depth(&path, &DepthConfig::default()).unwrap_err();
    assert!(err.is_load_error(), "unexpected error: {err}");
    assert_eq!(err.stage(), "load");

    let err = generate_environment(
        &path,
        &GenerationOptions::default(),
        &PipelineConfig::default(),
        |_| {},
    )
    .unwrap_err();
    assert!(err.is_load_error());

    let entries: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn missing_file_is_a_load_error() {
    let err = estimate_depth(Path::new("/nonexistent/scene.jpg"), &DepthConfig::default())
        .unwrap_err();
    assert!(err.is_load_error());
}

#[test]
fn full_pipeline_reports_stages_and_exports() {
    let scratch = Scratch::new("pipeline");
    let path = scratch.save("landscape.png", &landscape());

    let mut stages = Vec::new();
    let env = generate_environment(
        &path,
        &GenerationOptions::default(),
        &PipelineConfig::default(),
        |stage| stages.push(stage),
    )
    .unwrap();

    assert_eq!(
        stages,
        vec![
            PipelineStage::EstimatingDepth,
            PipelineStage::GeneratingMesh,
            PipelineStage::Hallucinating,
            PipelineStage::Complete,
        ]
    );
    assert_eq!(env.reconstruction.kind, ReconstructionKind::HeightMap);
    assert!(env.enrichment_parts > 0);
    assert!(env.mesh.validate().is_ok());
    assert!(env.depth_report.cues_failed.is_empty());
    assert_eq!(env.depth.dimensions(), (120, 90));

    let glb = export(&env.mesh, ExportFormat::Glb).unwrap();
    assert_eq!(&glb[..4], b"glTF");
    let obj = String::from_utf8(export(&env.mesh, ExportFormat::Obj).unwrap()).unwrap();
    assert!(obj.lines().any(|line| line.starts_with("f ")));
    let ply = export(&env.mesh, ExportFormat::Ply).unwrap();
    assert!(ply.starts_with(b"ply"));
}

#[test]
fn pipeline_without_completion_skips_that_stage() {
    let scratch = Scratch::new("bare");
    let path = scratch.save("landscape.png", &landscape());

    let options = GenerationOptions {
        hallucinate_unseen: false,
        ..GenerationOptions::default()
    };
    let mut stages = Vec::new();
    let env = generate_environment(&path, &options, &PipelineConfig::default(), |stage| {
        stages.push(stage)
    })
    .unwrap();

    assert!(!stages.contains(&PipelineStage::Hallucinating));
    assert_eq!(stages.last(), Some(&PipelineStage::Complete));
    assert_eq!(env.enrichment_parts, 0);
}

#[test]
fn external_depth_map_replaces_cue_fusion() {
    let scratch = Scratch::new("depthmap");
    let photo = scratch.save("photo.png", &landscape());
    let ramp = RgbImage::from_fn(60, 45, |_, y| {
        let v = (y * 255 / 44) as u8;
        Rgb([v, v, v])
    });
    let depth_map = scratch.save("depth.png", &ramp);

    let config = PipelineConfig {
        depth_map: Some(depth_map),
        ..PipelineConfig::default()
    };
    let env = generate_environment(&photo, &GenerationOptions::default(), &config, |_| {}).unwrap();

    assert_eq!(env.depth_report.source, "depth_map");
    assert!(env.depth_report.cues_used.is_empty());
    assert_eq!(env.depth.dimensions(), (120, 90));
    assert!(env.depth.get(60, 85) > env.depth.get(60, 5));
}
