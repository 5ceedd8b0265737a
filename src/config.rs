use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Hallowglobe".to_string(), width: 1280, height: 720, vsync: true, fullscreen: false }
    }
}

/// Parameters of the slime shower. Velocities are expressed per second so the
/// simulation stays frame-rate independent.
#[derive(Debug, Clone, Deserialize)]
pub struct SlimeConfig {
    #[serde(default = "SlimeConfig::default_count")]
    pub count: usize,
    #[serde(default = "SlimeConfig::default_spawn_extent_x")]
    pub spawn_extent_x: f32,
    #[serde(default = "SlimeConfig::default_spawn_extent_z")]
    pub spawn_extent_z: f32,
    #[serde(default = "SlimeConfig::default_ceiling_y")]
    pub ceiling_y: f32,
    #[serde(default = "SlimeConfig::default_floor_y")]
    pub floor_y: f32,
    #[serde(default = "SlimeConfig::default_fall_speed_min")]
    pub fall_speed_min: f32,
    #[serde(default = "SlimeConfig::default_fall_speed_max")]
    pub fall_speed_max: f32,
    #[serde(default = "SlimeConfig::default_drift_max")]
    pub drift_max: f32,
    #[serde(default = "SlimeConfig::default_radius_min")]
    pub radius_min: f32,
    #[serde(default = "SlimeConfig::default_radius_max")]
    pub radius_max: f32,
}

impl SlimeConfig {
    const fn default_count() -> usize {
        200
    }
    fn default_spawn_extent_x() -> f32 {
        20.0
    }
    fn default_spawn_extent_z() -> f32 {
        20.0
    }
    fn default_ceiling_y() -> f32 {
        5.0
    }
    fn default_floor_y() -> f32 {
        -5.0
    }
    fn default_fall_speed_min() -> f32 {
        0.6
    }
    fn default_fall_speed_max() -> f32 {
        1.8
    }
    fn default_drift_max() -> f32 {
        0.54
    }
    fn default_radius_min() -> f32 {
        0.05
    }
    fn default_radius_max() -> f32 {
        0.15
    }
}

impl Default for SlimeConfig {
    fn default() -> Self {
        Self {
            count: Self::default_count(),
            spawn_extent_x: Self::default_spawn_extent_x(),
            spawn_extent_z: Self::default_spawn_extent_z(),
            ceiling_y: Self::default_ceiling_y(),
            floor_y: Self::default_floor_y(),
            fall_speed_min: Self::default_fall_speed_min(),
            fall_speed_max: Self::default_fall_speed_max(),
            drift_max: Self::default_drift_max(),
            radius_min: Self::default_radius_min(),
            radius_max: Self::default_radius_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_fov_y_degrees")]
    pub fov_y_degrees: f32,
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default = "CameraConfig::default_target")]
    pub target: [f32; 3],
    /// Maximum angle from the zenith, radians. Keeps the orbit above the stage.
    #[serde(default = "CameraConfig::default_max_polar")]
    pub max_polar: f32,
    #[serde(default = "CameraConfig::default_damping")]
    pub damping: f32,
    #[serde(default)]
    pub zoom_enabled: bool,
}

impl CameraConfig {
    fn default_fov_y_degrees() -> f32 {
        50.0
    }
    fn default_position() -> [f32; 3] {
        [7.0, 3.0, 0.0]
    }
    fn default_target() -> [f32; 3] {
        [0.0, 1.0, 0.0]
    }
    fn default_max_polar() -> f32 {
        1.45
    }
    fn default_damping() -> f32 {
        0.05
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: Self::default_fov_y_degrees(),
            position: Self::default_position(),
            target: Self::default_target(),
            max_polar: Self::default_max_polar(),
            damping: Self::default_damping(),
            zoom_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub slime: SlimeConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("definitely/not/here.json");
        assert_eq!(cfg.slime.count, 200);
        assert_eq!(cfg.window.width, 1280);
        assert!(!cfg.camera.zoom_enabled);
    }

    #[test]
    fn partial_file_keeps_field_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(file, r#"{{ "slime": {{ "count": 64 }} }}"#).expect("write config");
        let cfg = AppConfig::load(file.path()).expect("parse config");
        assert_eq!(cfg.slime.count, 64);
        assert!((cfg.slime.ceiling_y - 5.0).abs() < f32::EPSILON);
        assert!((cfg.camera.max_polar - 1.45).abs() < f32::EPSILON);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(&AppConfigOverrides {
            width: Some(1920),
            height: None,
            vsync: Some(false),
        });
        assert_eq!(cfg.window.width, 1920);
        assert_eq!(cfg.window.height, 720);
        assert!(!cfg.window.vsync);
    }
}
