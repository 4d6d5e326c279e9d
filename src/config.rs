//! Viewer settings, read from `<config dir>/pano-annotate/config.json`.

use crate::viewport::ViewParams;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Camera of a panorama when it is first shown, in degrees.
    pub initial_pitch: f32,
    pub initial_yaw: f32,
    pub hfov: f32,
    pub min_hfov: f32,
    pub max_hfov: f32,
    /// Narrowest a comparison pane may be dragged, in points.
    pub split_min_size: f32,
    /// Wider panoramas are downscaled before upload to the GPU.
    pub max_texture_width: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_pitch: 10.0,
            initial_yaw: 180.0,
            hfov: 110.0,
            min_hfov: 30.0,
            max_hfov: 120.0,
            split_min_size: 50.0,
            max_texture_width: 4096,
        }
    }
}

impl ViewerConfig {
    pub fn view_params(&self) -> ViewParams {
        ViewParams {
            pitch: self.initial_pitch,
            yaw: self.initial_yaw,
            hfov: self.hfov,
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pano-annotate").join("config.json"))
    }

    /// A missing file is not an error; it yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => {
                log::debug!("viewer config: {config:?}");
                config
            }
            Err(err) => {
                log::warn!("{err:#}; using default viewer settings");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(
            config.view_params(),
            ViewParams {
                pitch: 10.0,
                yaw: 180.0,
                hfov: 110.0
            }
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "hfov": 90.0, "split_min_size": 120.0 }"#).unwrap();
        let config = ViewerConfig::load_from(&path).unwrap();
        assert_eq!(config.hfov, 90.0);
        assert_eq!(config.split_min_size, 120.0);
        assert_eq!(config.initial_yaw, 180.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ViewerConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
