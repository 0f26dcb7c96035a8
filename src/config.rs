//! Controller and placement configuration.
//!
//! Both structs deserialize from JSON with every field optional, so the host
//! page (or the worker bootstrap script) only has to override what differs from
//! the deployed defaults.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Images and audio pre-populated at install time.
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/assets/generated/rose-bg.dim_1920x1080.png",
    "/assets/generated/vignette-overlay.dim_1920x1080.png",
    "/assets/generated/ornament-corners.dim_1024x1024.png",
    "/assets/generated/sparkle-sprite.dim_512x512.png",
    "/assets/generated/heart-sprite.dim_512x512.png",
    "/assets/audio/romantic-instrumental.mp3",
    "/assets/audio/soft-ambient.mp3",
    "/assets/audio/heartbeat-once.mp3",
];

/// Clearance used by the evasive control when the caller does not pass one.
pub const DEFAULT_CLEARANCE: f64 = 60.0;

/// Cache controller settings. Bumping `version` is the only supported way to
/// invalidate every previously cached entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    pub cache_prefix: String,
    pub version: String,
    /// Absolute same-origin paths fetched during install.
    pub static_assets: Vec<String>,
    /// Directory holding hashed bundles; anything below it is boot-critical.
    pub asset_prefix: String,
    /// Logical key the navigation shell is stored under.
    pub app_shell_path: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "valentine-proposal".to_string(),
            version: "v4".to_string(),
            static_assets: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            asset_prefix: "/assets/".to_string(),
            app_shell_path: "/index.html".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON config; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CacheError::configuration(format!("invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Name of the cache generation owned by this version.
    #[must_use]
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_prefix.trim().is_empty() {
            return Err(CacheError::configuration("cache prefix must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(CacheError::configuration("version must not be empty"));
        }
        let paths = [&self.asset_prefix, &self.app_shell_path]
            .into_iter()
            .chain(self.static_assets.iter());
        for path in paths {
            if !path.starts_with('/') {
                return Err(CacheError::configuration(format!(
                    "path '{path}' must be absolute"
                )));
            }
        }
        Ok(())
    }
}

/// Tunables of the placement solver. The values are empirical; keep them
/// configurable rather than derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementConfig {
    /// Inset kept between the element and each container edge.
    pub padding: f64,
    /// Samples per phase.
    pub max_attempts: u32,
    /// Lower bound of the relaxed clearance.
    pub relaxed_floor: f64,
    pub fallback_x_ratio: f64,
    pub fallback_y_ratio: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            padding: 20.0,
            max_attempts: 50,
            relaxed_floor: 30.0,
            fallback_x_ratio: 0.7,
            fallback_y_ratio: 0.2,
        }
    }
}

impl PlacementConfig {
    /// Parse and validate a JSON config; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CacheError::configuration(format!("invalid placement json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let distances = [("padding", self.padding), ("relaxedFloor", self.relaxed_floor)];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(CacheError::configuration(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        let ratios = [
            ("fallbackXRatio", self.fallback_x_ratio),
            ("fallbackYRatio", self.fallback_y_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(CacheError::configuration(format!(
                    "{name} must lie in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Clearance used by the second phase.
    #[must_use]
    pub fn relaxed_clearance(&self, clearance: f64) -> f64 {
        self.relaxed_floor.max(clearance / 2.0)
    }
}
