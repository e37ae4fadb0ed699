//! Config module.
//! Manages I/O for dfps.json (field, telescope, instrument, search, paths).
//! Uses serde for JSON serialization.
//! Auto-generates the default (WASP-52) config if the file is missing.
//! Derived instrument quantities (footprints, spacing, search radius) live here
//! so the rest of the tool only sees degrees.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::camera::GuideCamera;
use crate::geometry::{OffsetMm, PlateScale, SkyPoint};

pub const DEFAULT_CONFIG_PATH: &str = "dfps.json";

const UM_TO_MM: f64 = 0.001;
const ARCMIN_PER_DEG: f64 = 60.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("field name must be a non-empty file name, got '{0}'")]
    FieldName(String),
    #[error("right ascension {0} deg is outside [0, 360)")]
    RightAscension(f64),
    #[error("declination {0} deg is outside [-90, 90]")]
    Declination(f64),
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("magnitude cutoff must be finite, got {0}")]
    MagnitudeCutoff(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub field: FieldConfig,
    pub telescope: TelescopeConfig,
    pub instrument: InstrumentConfig,
    pub search: SearchConfig,
    pub paths: PathsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelescopeConfig {
    /// arcsec / mm
    pub plate_scale_arcsec_per_mm: f64,
    pub field_of_view_arcmin: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// micron / pixel
    pub pixel_scale_um: f64,
    pub guide_camera_pixels_x: u32,
    pub guide_camera_pixels_y: u32,
    /// Center-to-center distance between neighbouring guide cameras.
    pub guide_camera_distance_mm: f64,
    /// Guide camera center to fiber, indexed by camera. Positive is right / up.
    pub camera_offsets_mm: [OffsetMm; 4],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Added to the telescope field of view before halving into a radius.
    pub radius_buffer_arcmin: f64,
    /// Stars at or fainter than this are dropped.
    pub magnitude_cutoff: f64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub working_directory: PathBuf,
}

/// The star field being planned, as the catalog lookup sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub center: SkyPoint,
    pub search_radius_deg: f64,
    pub magnitude_cutoff: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            field: FieldConfig {
                name: "WASP-52".to_string(),
                ra_deg: 348.4948229,
                dec_deg: 8.7612697,
            },
            telescope: TelescopeConfig {
                plate_scale_arcsec_per_mm: 7.23,
                field_of_view_arcmin: 7.0,
            },
            instrument: InstrumentConfig {
                pixel_scale_um: 7.4,
                guide_camera_pixels_x: 520,
                guide_camera_pixels_y: 700,
                guide_camera_distance_mm: 45.0,
                camera_offsets_mm: [
                    OffsetMm::new(5.0, -5.0),
                    OffsetMm::new(-2.0, -2.0),
                    OffsetMm::new(-10.0, 3.0),
                    OffsetMm::new(5.0, 10.0),
                ],
            },
            search: SearchConfig {
                radius_buffer_arcmin: 3.0,
                magnitude_cutoff: 16.0,
                timeout_secs: 30,
            },
            paths: PathsConfig {
                working_directory: PathBuf::from("."),
            },
        }
    }
}

impl Config {
    /// Loads the config at `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("Failed to write config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.field.name;
        if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::FieldName(name.clone()));
        }
        if !(0.0..360.0).contains(&self.field.ra_deg) {
            return Err(ConfigError::RightAscension(self.field.ra_deg));
        }
        if !(-90.0..=90.0).contains(&self.field.dec_deg) {
            return Err(ConfigError::Declination(self.field.dec_deg));
        }

        let positives = [
            ("plate scale", self.telescope.plate_scale_arcsec_per_mm),
            ("telescope field of view", self.telescope.field_of_view_arcmin),
            ("pixel scale", self.instrument.pixel_scale_um),
            ("guide camera width", f64::from(self.instrument.guide_camera_pixels_x)),
            ("guide camera height", f64::from(self.instrument.guide_camera_pixels_y)),
            ("guide camera distance", self.instrument.guide_camera_distance_mm),
            ("search timeout", self.search.timeout_secs as f64),
        ];
        for (name, value) in positives {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        if self.search.radius_buffer_arcmin < 0.0 {
            return Err(ConfigError::NotPositive {
                name: "search radius buffer",
                value: self.search.radius_buffer_arcmin,
            });
        }

        if !self.search.magnitude_cutoff.is_finite() {
            return Err(ConfigError::MagnitudeCutoff(self.search.magnitude_cutoff));
        }

        Ok(())
    }

    pub fn plate_scale(&self) -> PlateScale {
        PlateScale(self.telescope.plate_scale_arcsec_per_mm)
    }

    pub fn field_center(&self) -> SkyPoint {
        SkyPoint::new(self.field.ra_deg, self.field.dec_deg)
    }

    pub fn telescope_fov_deg(&self) -> f64 {
        self.telescope.field_of_view_arcmin / ARCMIN_PER_DEG
    }

    /// Half of the telescope field of view plus buffer, in degrees.
    pub fn search_radius_deg(&self) -> f64 {
        (self.telescope.field_of_view_arcmin + self.search.radius_buffer_arcmin) / ARCMIN_PER_DEG / 2.0
    }

    /// Guide camera footprint on the sky (x, y) in degrees.
    pub fn guide_camera_fov_deg(&self) -> (f64, f64) {
        let inst = &self.instrument;
        let scale = self.plate_scale();
        let side = |pixels: u32| scale.mm_to_deg(f64::from(pixels) * inst.pixel_scale_um * UM_TO_MM);
        (side(inst.guide_camera_pixels_x), side(inst.guide_camera_pixels_y))
    }

    /// Center-to-center spacing between neighbouring guide cameras in degrees.
    pub fn guide_camera_spacing_deg(&self) -> f64 {
        self.plate_scale().mm_to_deg(self.instrument.guide_camera_distance_mm)
    }

    pub fn camera_offset(&self, camera: GuideCamera) -> OffsetMm {
        self.instrument.camera_offsets_mm[camera.index()]
    }

    pub fn field(&self) -> Field {
        Field {
            name: self.field.name.clone(),
            center: self.field_center(),
            search_radius_deg: self.search_radius_deg(),
            magnitude_cutoff: self.search.magnitude_cutoff,
        }
    }

    pub fn analysis_directory(&self) -> PathBuf {
        self.paths.working_directory.join("analysis")
    }

    pub fn data_directory(&self) -> PathBuf {
        self.paths.working_directory.join("data")
    }

    pub fn log_directory(&self) -> PathBuf {
        self.paths.working_directory.join("logs")
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        vec![self.analysis_directory(), self.data_directory(), self.log_directory()]
    }

    /// Catalog cache for the configured field: `<data>/<field name>.csv`.
    pub fn catalog_cache_path(&self) -> PathBuf {
        self.data_directory().join(format!("{}.csv", self.field.name))
    }
}
