// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Invariants that must hold for any input image.

use image::{Rgb, RgbImage};
use scenelift_vision::{
    build_mesh, classify_scene, CueFusionSource, DepthConfig, DepthSource, MeshConfig,
    PreprocessConfig, PreprocessedImage, SceneThresholds,
};

/// Deterministic pseudo-random bytes
fn lcg(seed: &mut u32) -> u8 {
    *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    (*seed >> 24) as u8
}

fn noise(width: u32, height: u32, mut seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, _| {
        Rgb([lcg(&mut seed), lcg(&mut seed), lcg(&mut seed)])
    })
}

fn corpus() -> Vec<(&'static str, RgbImage)> {
    vec![
        ("noise", noise(48, 36, 7)),
        (
            "diagonal",
            RgbImage::from_fn(64, 40, |x, y| Rgb([(x * 4) as u8, (y * 6) as u8, 120])),
        ),
        (
            "stripes",
            RgbImage::from_fn(50, 50, |x, _| {
                if (x / 5) % 2 == 0 {
                    Rgb([20, 20, 20])
                } else {
                    Rgb([230, 230, 230])
                }
            }),
        ),
        ("tiny", RgbImage::from_fn(2, 2, |x, y| Rgb([(x * 200) as u8, (y * 200) as u8, 50]))),
        ("thin", noise(40, 3, 11)),
        ("flat", RgbImage::from_pixel(16, 16, Rgb([10, 200, 10]))),
    ]
}

fn prepare(rgb: RgbImage) -> PreprocessedImage {
    PreprocessedImage::from_rgb(rgb, &PreprocessConfig::default())
}

#[test]
fn every_image_yields_valid_depth_confidence_and_mesh() {
    let presets = [DepthConfig::quality(), DepthConfig::multi_cue()];
    for (name, rgb) in corpus() {
        let image = prepare(rgb);
        for config in &presets {
            let source = CueFusionSource::new(config.clone()).unwrap();
            let estimate = source.estimate(&image).unwrap();

            assert_eq!(estimate.depth.dimensions(), image.dimensions(), "{name}");
            assert!(estimate.depth.range() >= 0.01, "{name}: flat depth");
            for &d in estimate.depth.data() {
                assert!(d.is_finite() && (0.0..=1.0).contains(&d), "{name}: depth {d}");
            }
            for &c in estimate.confidence.data() {
                assert!(c.is_finite() && (0.0..=1.0).contains(&c), "{name}: confidence {c}");
            }

            let mesh = build_mesh(
                &image,
                &estimate.depth,
                &estimate.confidence,
                estimate.scene(),
                &MeshConfig::default(),
            )
            .unwrap();
            assert!(mesh.vertex_count() >= 3, "{name}");
            assert!(mesh.triangle_count() >= 1, "{name}");
            assert!(mesh.positions.iter().all(|v| v.is_finite()), "{name}");
            let count = mesh.vertex_count() as u32;
            assert!(mesh.indices.iter().all(|&i| i < count), "{name}");
            assert_eq!(mesh.colors.len(), mesh.positions.len(), "{name}");
        }
    }
}

#[test]
fn estimation_is_deterministic() {
    let image = prepare(noise(40, 30, 3));
    let thresholds = SceneThresholds::default();
    let first = classify_scene(&image, &thresholds);
    let second = classify_scene(&image, &thresholds);
    assert_eq!(first.scene, second.scene);
    assert_eq!(first.stats, second.stats);

    let source = CueFusionSource::new(DepthConfig::multi_cue()).unwrap();
    let a = source.estimate(&image).unwrap();
    let b = source.estimate(&image).unwrap();
    assert_eq!(a.depth.data(), b.depth.data());
    assert_eq!(a.confidence.data(), b.confidence.data());
}

#[test]
fn parallel_and_sequential_fusion_agree() {
    let image = prepare(noise(36, 28, 19));
    let mut config = DepthConfig::multi_cue();
    config.parallel = true;
    let parallel = CueFusionSource::new(config.clone()).unwrap().estimate(&image).unwrap();
    config.parallel = false;
    let sequential = CueFusionSource::new(config).unwrap().estimate(&image).unwrap();

    for (p, s) in parallel.depth.data().iter().zip(sequential.depth.data()) {
        assert!((p - s).abs() < 1e-5);
    }
    assert_eq!(parallel.report.cues_used, sequential.report.cues_used);
}

#[test]
fn sampling_stride_keeps_the_image_footprint() {
    let rgb = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 60]));
    let image = prepare(rgb);
    let estimate = CueFusionSource::new(DepthConfig::default())
        .unwrap()
        .estimate(&image)
        .unwrap();

    let build = |config: &MeshConfig| {
        build_mesh(
            &image,
            &estimate.depth,
            &estimate.confidence,
            estimate.scene(),
            config,
        )
        .unwrap()
    };
    let fine = build(&MeshConfig::default());
    let coarse = build(&MeshConfig {
        max_vertices: 100,
        ..MeshConfig::default()
    });

    assert!(coarse.vertex_count() < fine.vertex_count());
    assert!(coarse.vertex_count() <= 100);
    let (a, b) = (fine.bounds(), coarse.bounds());
    for (lo, hi) in [(a.min.x, b.min.x), (a.max.x, b.max.x), (a.min.y, b.min.y), (a.max.y, b.max.y)] {
        assert!((lo - hi).abs() < 1e-4, "{lo} vs {hi}");
    }
}
