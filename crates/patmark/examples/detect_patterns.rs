//! Detect square patterns in an image described by a JSON config.
//!
//! Usage: `detect_patterns <config.json> <id>=<template.png>...`
//!
//! The config is a `PatternDetectConfig` (image path, camera, detector
//! params). Without arguments a synthetic frame and template are rendered
//! so the example runs out of the box.

use std::{env, path::PathBuf, time::Instant};

use image::{GrayImage, ImageReader, Luma};
use patmark::core::{CameraIntrinsics, CameraModel, RadialTangentialDistortion};
use patmark::detect;
use patmark::detector::{
    PatternDetectConfig, PatternDetectReport, PatternDetectorParams, ThresholdMode,
};
#[cfg(feature = "tracing")]
use tracing_log::LogTracer;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(config_path) = args.first().map(PathBuf::from) else {
        return run_synthetic();
    };

    let cfg = PatternDetectConfig::load_json(&config_path)?;
    let mut templates = Vec::new();
    for arg in &args[1..] {
        let Some((id, path)) = arg.split_once('=') else {
            return Err(format!("expected <id>=<template.png>, got {arg}").into());
        };
        let img = ImageReader::open(path)?.decode()?.to_luma8();
        templates.push((id.parse::<u32>()?, img));
    }

    let library = detect::library_from_images(
        cfg.detector.layout,
        templates.iter().map(|(id, img)| (*id, img)),
    )?;
    let detector = cfg.build_detector()?;
    let frame = ImageReader::open(&cfg.image_path)?.decode()?;

    let mut report = PatternDetectReport::new(
        &cfg,
        &config_path,
        frame.width() as usize,
        frame.height() as usize,
    );
    let start = Instant::now();
    match detect::detect_patterns_dynamic(&frame, &detector, &cfg.camera, &library) {
        Ok(patterns) => {
            log::info!(
                "{} patterns in {:.1} ms",
                patterns.len(),
                start.elapsed().as_secs_f64() * 1e3
            );
            report.set_patterns(patterns);
        }
        Err(detect::DetectError::Detect(err)) => {
            log::warn!("detection failed: {err}");
            report.set_error(&err);
        }
        Err(err) => return Err(err.into()),
    }

    let output_path = cfg.output_path();
    report.write_json(&output_path)?;
    println!("wrote detection report to {}", output_path.display());
    Ok(())
}

fn run_synthetic() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = PatternDetectorParams::default();
    params.binarization.mode = ThresholdMode::Fixed;
    params.binarization.fixed_threshold = 100;
    let size = params.layout.size as u32;
    let template = render_marker(size, size, 0, 0, size);
    let frame = render_marker(640, 480, 250, 170, 140);

    let library = detect::library_from_images(params.layout, [(1, &template)])?;
    let detector = patmark::PatternDetector::new(params)?;
    let camera = CameraModel::new(
        CameraIntrinsics {
            fx: 700.0,
            fy: 700.0,
            cx: 320.0,
            cy: 240.0,
        },
        RadialTangentialDistortion::default(),
    );

    for p in detect::detect_patterns(&frame, &detector, &camera, &library)? {
        println!(
            "pattern {} orientation {} confidence {:.3} corners {:?}",
            p.id,
            p.orientation,
            p.confidence,
            p.vertices.map(|v| (v.x, v.y))
        );
        if let Some(pose) = p.pose {
            println!("  translation {:?}", pose.translation.as_slice());
        }
    }
    Ok(())
}

/// Dark bordered square with a dark top-left interior quadrant.
fn render_marker(w: u32, h: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
    let border = side / 4;
    GrayImage::from_fn(w, h, |x, y| {
        if x < x0 || y < y0 || x >= x0 + side || y >= y0 + side {
            return Luma([220]);
        }
        let (u, v) = (x - x0, y - y0);
        let inner = u >= border && v >= border && u < side - border && v < side - border;
        let dark = !inner || (u < side / 2 && v < side / 2);
        Luma([if dark { 25 } else { 220 }])
    })
}

fn init_logging() {
    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = patmark::core::init_with_level(log::LevelFilter::Info);
    }
}
