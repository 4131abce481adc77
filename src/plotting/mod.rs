/// Plotting layer: binning spikes and describing figures.
///
/// Architecture:
/// ```text
///   spike trains ──► raster   ──┐
///                               ├──► Figure ──► ui::plot (interactive)
///   times + depths ─► driftmap ─┘          └──► render   (PNG)
///                       │
///                       ▼
///                   histogram
/// ```
///
/// A [`Figure`] is plain data: every number the views need (limits, bins,
/// rates) is computed here once, so the egui view and the PNG renderer draw
/// the same thing.
pub mod driftmap;
pub mod histogram;
pub mod raster;
pub mod render;

use std::ops::Range;

use crate::color::Colormap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlotError {
    #[error("no spikes to plot")]
    Empty,
    #[error("{times} spike times but {depths} spike depths")]
    LengthMismatch { times: usize, depths: usize },
    #[error("{axis} range is degenerate (maximum is {max})")]
    DegenerateRange { axis: &'static str, max: f64 },
    #[error("at least 2 bin edges are needed, got {0}")]
    TooFewEdges(usize),
}

// ---------------------------------------------------------------------------
// Figure model
// ---------------------------------------------------------------------------

/// What an axes shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxesRole {
    Raster,
    Colorbar,
    Driftmap,
    SpikeCount,
}

/// Grid cells covered by an axes, like a `GridSpec` slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSpan {
    pub rows: Range<u16>,
    pub cols: Range<u16>,
}

/// Row-major (depth-major) rate grid with its data extent.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    /// Number of time bins (columns).
    pub nx: usize,
    /// Number of depth bins (rows).
    pub ny: usize,
    /// `values[iy * nx + ix]`.
    pub values: Vec<f64>,
    /// `(x0, x1, y0, y1)` in data units; `y0` is the probe tip, the
    /// deepest point.
    pub extent: (f64, f64, f64, f64),
}

impl HeatmapGrid {
    pub fn value(&self, ix: usize, iy: usize) -> f64 {
        self.values[iy * self.nx + ix]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Artist {
    /// One vertical tick per spike.
    Ticks { x: Vec<f64>, y: Vec<f64> },
    Heatmap {
        grid: HeatmapGrid,
        colormap: Colormap,
        value_range: (f64, f64),
    },
    /// Horizontal colour scale.
    Colorbar {
        colormap: Colormap,
        value_range: (f64, f64),
    },
    Line { x: Vec<f64>, y: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    pub role: AxesRole,
    pub span: GridSpan,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub x_lim: (f64, f64),
    pub y_lim: (f64, f64),
    pub show_x_ticks: bool,
    pub show_y_ticks: bool,
    /// Draw x ticks and label above the axes (colorbar).
    pub x_axis_top: bool,
    pub artist: Artist,
}

/// A complete figure: canvas size, layout grid and axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub width_in: f32,
    pub height_in: f32,
    pub dpi: u32,
    /// `(rows, cols)` of the layout grid.
    pub grid: (u16, u16),
    pub axes: Vec<Axes>,
}

impl Figure {
    /// Canvas size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f32| (inches * self.dpi as f32).round().max(1.0) as u32;
        (px(self.width_in), px(self.height_in))
    }

    pub fn axes(&self, role: AxesRole) -> Option<&Axes> {
        self.axes.iter().find(|a| a.role == role)
    }
}

/// Largest finite value, ignoring NaN like `np.nanmax`.
pub(crate) fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_size_follows_dpi() {
        let fig = Figure {
            width_in: 12.0,
            height_in: 5.0,
            dpi: 200,
            grid: (1, 1),
            axes: Vec::new(),
        };
        assert_eq!(fig.pixel_size(), (2400, 1000));
    }

    #[test]
    fn finite_max_ignores_nan() {
        assert_eq!(finite_max(&[1.0, f64::NAN, 3.0]), Some(3.0));
        assert_eq!(finite_max(&[f64::NAN]), None);
        assert_eq!(finite_max(&[]), None);
    }
}
