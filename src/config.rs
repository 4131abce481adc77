use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::Colormap;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "SPIKEVIEW_CONFIG";

/// Bin edge counts are kept within `2..=MAX_EDGES`, so a heatmap side never
/// exceeds 8192 texels.
pub const MAX_EDGES: usize = 8193;

// ---------------------------------------------------------------------------
// Viewer configuration
// ---------------------------------------------------------------------------

/// Figure and binning settings. Every field has a default, so a config file
/// only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub raster: RasterConfig,
    pub driftmap: DriftmapConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub width_in: f32,
    pub height_in: f32,
    pub dpi: u32,
    /// Seconds added on both sides of the time axis.
    pub x_padding: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width_in: 32.0,
            height_in: 8.0,
            dpi: 100,
            x_padding: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftmapConfig {
    /// Number of time bin edges between 0 and the last spike.
    pub time_edges: usize,
    /// Number of depth bin edges between 0 and the deepest spike.
    pub depth_edges: usize,
    pub colormap: Colormap,
    pub width_in: f32,
    pub height_in: f32,
    pub dpi: u32,
    /// Divisor applied to the marginal spike counts (10 000 by default).
    pub count_scale: f64,
    /// Upper depth edge; defaults to the deepest spike when unset.
    pub depth_max: Option<f64>,
}

impl Default for DriftmapConfig {
    fn default() -> Self {
        Self {
            time_edges: 1000,
            depth_edges: 200,
            colormap: Colormap::GistHeatR,
            width_in: 12.0,
            height_in: 5.0,
            dpi: 200,
            count_scale: 1e4,
            depth_max: None,
        }
    }
}

impl DriftmapConfig {
    /// Clamp the edge counts into `2..=MAX_EDGES`.
    pub fn clamp_edges(&mut self) {
        for (name, edges) in [
            ("time_edges", &mut self.time_edges),
            ("depth_edges", &mut self.depth_edges),
        ] {
            let clamped = (*edges).clamp(2, MAX_EDGES);
            if clamped != *edges {
                log::warn!("driftmap.{name} = {edges} is out of range, using {clamped}");
                *edges = clamped;
            }
        }
    }
}

impl ViewerConfig {
    /// Read a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.driftmap.clamp_edges();
        Ok(config)
    }

    /// Config named by `SPIKEVIEW_CONFIG`, or defaults when unset or unreadable.
    pub fn from_env() -> Self {
        Self::load_or_default(std::env::var_os(CONFIG_ENV).as_deref().map(Path::new))
    }

    /// Config at `path`, or defaults when there is none or it cannot be read.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Falling back to default config: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"driftmap": {{"time_edges": 50, "colormap": "hot"}}, "raster": {{"dpi": 72}}}}"#
        )
        .unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.driftmap.time_edges, 50);
        assert_eq!(config.driftmap.colormap, Colormap::Hot);
        assert_eq!(config.driftmap.depth_edges, 200);
        assert_eq!(config.raster.dpi, 72);
        assert_eq!(config.raster.width_in, 32.0);
    }

    #[test]
    fn bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"driftmap": {{"colormap": "jet"}}}}"#).unwrap();
        let err = ViewerConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");

        let err = ViewerConfig::load(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("reading config"));
        assert_eq!(ViewerConfig::load_or_default(Some(&missing)), ViewerConfig::default());
        assert_eq!(ViewerConfig::load_or_default(None), ViewerConfig::default());
    }

    #[test]
    fn edge_counts_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"driftmap": {{"time_edges": 100000, "depth_edges": 1}}}}"#).unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.driftmap.time_edges, MAX_EDGES);
        assert_eq!(config.driftmap.depth_edges, 2);
    }
}
