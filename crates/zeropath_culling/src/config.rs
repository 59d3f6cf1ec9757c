//! # Culling Configuration
//!
//! Loaded once when a dataset is opened. Every field has a default, so a
//! config file only names what it changes:
//!
//! ```toml
//! voxel_size = 4.0
//! occlusion_enabled = true
//! validity = "basic"
//!
//! [oracle_resolution]
//! mode = "fixed"
//! width = 640
//! height = 360
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use zeropath_path::ValidityRule;

use crate::error::{CullingError, CullingResult};
use crate::oracle::Resolution;

/// How the oracle output size follows the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Framebuffer size times `factor` (rounded, at least one pixel).
    Scaled {
        /// Scale relative to the framebuffer.
        factor: f32,
    },
    /// Constant size regardless of the framebuffer.
    Fixed {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::Scaled { factor: 1.0 }
    }
}

impl ResolutionPolicy {
    /// Oracle resolution for a framebuffer of `framebuffer` pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn resolve(&self, framebuffer: Resolution) -> Resolution {
        match *self {
            Self::Scaled { factor } => Resolution::new(
                (framebuffer.width as f32 * factor).round() as u32,
                (framebuffer.height as f32 * factor).round() as u32,
            ),
            Self::Fixed { width, height } => Resolution::new(width, height),
        }
    }
}

/// Configuration of a culled dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Edge length of a voxel in scene units.
    pub voxel_size: f32,
    /// Oracle output size.
    pub oracle_resolution: ResolutionPolicy,
    /// With occlusion off, every candidate is published as visible.
    pub occlusion_enabled: bool,
    /// Which point pairs form segments.
    pub validity: ValidityRule,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            voxel_size: 2.0,
            oracle_resolution: ResolutionPolicy::default(),
            occlusion_enabled: true,
            validity: ValidityRule::Strict,
        }
    }
}

impl CullingConfig {
    /// Integrated GPUs: coarse voxels, quarter-area oracle.
    #[must_use]
    pub fn low_end() -> Self {
        Self {
            voxel_size: 4.0,                                            // fewer proxies to rasterize
            oracle_resolution: ResolutionPolicy::Scaled { factor: 0.5 }, // quarter of the pixels to read back
            ..Self::default()
        }
    }

    /// Discrete GPUs: fine voxels, oversampled oracle.
    #[must_use]
    pub fn production() -> Self {
        Self {
            voxel_size: 1.0,                                            // tighter visible sets
            oracle_resolution: ResolutionPolicy::Scaled { factor: 2.0 }, // thin segments still hit a sample
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a parse error or [`CullingError::InvalidConfig`].
    pub fn from_toml_str(text: &str) -> CullingResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, a parse error or [`CullingError::InvalidConfig`].
    pub fn load(path: impl AsRef<Path>) -> CullingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CullingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> CullingResult<()> {
        if !self.voxel_size.is_finite() || self.voxel_size <= 0.0 {
            return Err(CullingError::InvalidConfig(format!(
                "voxel_size must be finite and positive, got {}",
                self.voxel_size
            )));
        }
        match self.oracle_resolution {
            ResolutionPolicy::Scaled { factor } if !factor.is_finite() || factor <= 0.0 => {
                Err(CullingError::InvalidConfig(format!(
                    "oracle_resolution.factor must be finite and positive, got {factor}"
                )))
            }
            ResolutionPolicy::Fixed { width, height } if width == 0 || height == 0 => Err(
                CullingError::InvalidConfig(format!("oracle_resolution must be non-empty, got {width}x{height}")),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for config in [CullingConfig::default(), CullingConfig::low_end(), CullingConfig::production()] {
            config.validate().unwrap();
        }
        assert_eq!(CullingConfig::default().validity, ValidityRule::Strict);
    }

    #[test]
    fn test_resolve() {
        let fb = Resolution::new(1920, 1080);
        assert_eq!(ResolutionPolicy::default().resolve(fb), fb);
        assert_eq!(
            ResolutionPolicy::Scaled { factor: 0.5 }.resolve(fb),
            Resolution::new(960, 540)
        );
        assert_eq!(
            ResolutionPolicy::Fixed { width: 64, height: 32 }.resolve(fb),
            Resolution::new(64, 32)
        );
        assert_eq!(
            ResolutionPolicy::Scaled { factor: 0.0001 }.resolve(Resolution::new(10, 10)),
            Resolution::new(1, 1)
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = CullingConfig::from_toml_str("voxel_size = 0.5\nvalidity = \"basic\"").unwrap();
        assert!((config.voxel_size - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.validity, ValidityRule::Basic);
        assert!(config.occlusion_enabled);
        assert_eq!(config.oracle_resolution, ResolutionPolicy::default());
    }

    #[test]
    fn test_fixed_resolution_toml() {
        let text = "[oracle_resolution]\nmode = \"fixed\"\nwidth = 320\nheight = 200\n";
        let config = CullingConfig::from_toml_str(text).unwrap();
        assert_eq!(
            config.oracle_resolution,
            ResolutionPolicy::Fixed { width: 320, height: 200 }
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            CullingConfig::from_toml_str("voxel_size = -1.0"),
            Err(CullingError::InvalidConfig(_))
        ));
        assert!(matches!(
            CullingConfig::from_toml_str("[oracle_resolution]\nmode = \"scaled\"\nfactor = 0.0\n"),
            Err(CullingError::InvalidConfig(_))
        ));
        assert!(matches!(
            CullingConfig::from_toml_str("voxel_size = \"big\""),
            Err(CullingError::Toml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            CullingConfig::load("/nonexistent/zeropath/culling.toml"),
            Err(CullingError::Io(_))
        ));
    }
}
