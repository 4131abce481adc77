use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};

use crate::data::model::MetadataValue;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let rgb: Srgb = Hsl::new(hue, 0.75, 0.45).into_color();
            let [r, g, b] = to_u8([rgb.red, rgb.green, rgb.blue]);
            Color32::from_rgb(r, g, b)
        })
        .collect()
}

fn to_u8(rgb: [f32; 3]) -> [u8; 3] {
    rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

// ---------------------------------------------------------------------------
// Color mapping: metadata value → Color32
// ---------------------------------------------------------------------------

/// Maps unique metadata values of a chosen column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<MetadataValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<MetadataValue>) -> Self {
        let mapping = unique_values
            .iter()
            .cloned()
            .zip(generate_palette(unique_values.len()))
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a given metadata value.
    pub fn color_for(&self, value: &MetadataValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Continuous colormaps for heatmaps
// ---------------------------------------------------------------------------

/// Continuous colormaps, named as in matplotlib.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    GistHeat,
    #[default]
    GistHeatR,
    Hot,
    Gray,
    GrayR,
    #[serde(rename = "Greys")]
    Greys,
}

impl Colormap {
    pub const ALL: [Colormap; 6] = [
        Colormap::GistHeat,
        Colormap::GistHeatR,
        Colormap::Hot,
        Colormap::Gray,
        Colormap::GrayR,
        Colormap::Greys,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Colormap::GistHeat => "gist_heat",
            Colormap::GistHeatR => "gist_heat_r",
            Colormap::Hot => "hot",
            Colormap::Gray => "gray",
            Colormap::GrayR => "gray_r",
            Colormap::Greys => "Greys",
        }
    }

    /// Map `t` (clamped to `[0, 1]`) to an RGB colour.
    pub fn sample(self, t: f64) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) as f32 };
        let rgb = match self {
            Colormap::GistHeat => gist_heat(t),
            Colormap::GistHeatR => gist_heat(1.0 - t),
            Colormap::Hot => hot(t),
            Colormap::Gray => [t, t, t],
            Colormap::GrayR | Colormap::Greys => [1.0 - t, 1.0 - t, 1.0 - t],
        };
        to_u8(rgb)
    }

    pub fn sample_color32(self, t: f64) -> Color32 {
        let [r, g, b] = self.sample(t);
        Color32::from_rgb(r, g, b)
    }
}

fn gist_heat(t: f32) -> [f32; 3] {
    [1.5 * t, 2.0 * t - 1.0, 4.0 * t - 3.0]
}

fn hot(t: f32) -> [f32; 3] {
    // Piecewise-linear ramps through red, yellow, white.
    let r = 0.0416 + t / 0.365 * (1.0 - 0.0416);
    let g = (t - 0.365) / (0.746 - 0.365);
    let b = (t - 0.746) / (1.0 - 0.746);
    [r, g, b]
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown colormap '{0}'")]
pub struct UnknownColormap(pub String);

impl FromStr for Colormap {
    type Err = UnknownColormap;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Colormap::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownColormap(s.to_string()))
    }
}
