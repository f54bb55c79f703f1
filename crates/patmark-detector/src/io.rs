//! JSON configuration and report helpers for pattern detection.

use std::{
    fs,
    path::{Path, PathBuf},
};

use patmark_core::CameraModel;
use serde::{Deserialize, Serialize};

use crate::{DetectError, DetectedPattern, PatternDetector, PatternDetectorParams};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Configuration for a detection run on one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetectConfig {
    pub image_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    pub camera: CameraModel,
    #[serde(default)]
    pub detector: PatternDetectorParams,
}

impl PatternDetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pattern_detect_report.json"))
    }

    pub fn build_detector(&self) -> Result<PatternDetector, DetectError> {
        PatternDetector::new(self.detector.clone())
    }
}

/// Outcome of a detection run, suitable for writing next to the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetectReport {
    pub image_path: String,
    pub config_path: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub patterns: Vec<DetectedPattern>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PatternDetectReport {
    pub fn new(cfg: &PatternDetectConfig, config_path: &Path, width: usize, height: usize) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            width,
            height,
            patterns: Vec::new(),
            error: None,
        }
    }

    pub fn set_patterns(&mut self, patterns: Vec<DetectedPattern>) {
        self.patterns = patterns;
        self.error = None;
    }

    pub fn set_error(&mut self, err: &DetectError) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThresholdMode;
    use nalgebra::Point2;
    use patmark_core::{CameraIntrinsics, RadialTangentialDistortion};

    fn camera() -> CameraModel {
        CameraModel::new(
            CameraIntrinsics {
                fx: 800.0,
                fy: 800.0,
                cx: 320.0,
                cy: 240.0,
            },
            RadialTangentialDistortion::default(),
        )
    }

    #[test]
    fn partial_config_uses_defaults() {
        let raw = r#"{
            "image_path": "frame.png",
            "camera": { "intrinsics": { "fx": 800, "fy": 800, "cx": 320, "cy": 240 } },
            "detector": { "binarization": { "mode": "fixed" }, "confidence_threshold": 0.5 }
        }"#;
        let cfg: PatternDetectConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.camera, camera());
        assert_eq!(cfg.detector.binarization.mode, ThresholdMode::Fixed);
        assert_eq!(cfg.detector.binarization.fixed_threshold, 40);
        assert_eq!(cfg.detector.confidence_threshold, 0.5);
        assert_eq!(cfg.detector.layout.size, 64);
        assert_eq!(
            cfg.output_path(),
            PathBuf::from("pattern_detect_report.json")
        );
        assert!(cfg.build_detector().is_ok());
    }

    #[test]
    fn config_and_report_survive_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PatternDetectConfig {
            image_path: "frame.png".to_string(),
            output_path: Some("out.json".to_string()),
            camera: camera(),
            detector: PatternDetectorParams::default(),
        };
        let cfg_path = dir.path().join("cfg.json");
        cfg.write_json(&cfg_path).unwrap();
        let loaded = PatternDetectConfig::load_json(&cfg_path).unwrap();
        assert_eq!(loaded.detector, cfg.detector);
        assert_eq!(loaded.output_path(), PathBuf::from("out.json"));

        let mut report = PatternDetectReport::new(&cfg, &cfg_path, 640, 480);
        report.set_patterns(vec![DetectedPattern {
            id: 7,
            orientation: 2,
            confidence: 0.9,
            vertices: [Point2::new(1.0, 2.0); 4],
            pose: None,
            size: 1.0,
        }]);
        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).unwrap();
        let back = PatternDetectReport::load_json(&report_path).unwrap();
        assert_eq!(back.patterns, report.patterns);
        assert!(back.error.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PatternDetectConfig::load_json("/nonexistent/patmark.json").unwrap_err();
        assert!(matches!(err, ConfigIoError::Io(_)));
    }
}
