use super::histogram::{histogram2d, linspace, mean_step, Histogram2d};
use super::{finite_max, Artist, Axes, AxesRole, Figure, GridSpan, HeatmapGrid, PlotError};
use crate::config::DriftmapConfig;

/// Layout grid of the driftmap canvas.
const GRID: (u16, u16) = (15, 12);

/// Binned spike activity over time and depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftmapData {
    pub time_edges: Vec<f64>,
    pub depth_edges: Vec<f64>,
    pub counts: Histogram2d,
    /// Firing rate per bin (Hz), same layout as `counts`.
    pub rates: Vec<f64>,
    /// Total spikes per depth bin divided by the count scale.
    pub depth_profile: Vec<f64>,
}

impl DriftmapData {
    /// Bin spikes on `[0, last spike] × [0, deepest spike]`.
    pub fn compute(
        times: &[f64],
        depths: &[f64],
        config: &DriftmapConfig,
    ) -> Result<Self, PlotError> {
        if times.len() != depths.len() {
            return Err(PlotError::LengthMismatch {
                times: times.len(),
                depths: depths.len(),
            });
        }
        if times.is_empty() {
            return Err(PlotError::Empty);
        }
        let too_few = config.time_edges.min(config.depth_edges);
        if too_few < 2 {
            return Err(PlotError::TooFewEdges(too_few));
        }

        let t_max = positive_max("time", finite_max(times))?;
        let d_max = positive_max("depth", config.depth_max.or_else(|| finite_max(depths)))?;

        let time_edges = linspace(0.0, t_max, config.time_edges);
        let depth_edges = linspace(0.0, d_max, config.depth_edges);
        let counts = histogram2d(times, depths, &time_edges, &depth_edges);

        let bin_width = mean_step(&time_edges);
        let rates = counts.counts.iter().map(|c| c / bin_width).collect();
        let depth_profile = counts
            .sum_over_x()
            .into_iter()
            .map(|c| c / config.count_scale)
            .collect();

        Ok(Self {
            time_edges,
            depth_edges,
            counts,
            rates,
            depth_profile,
        })
    }

    /// Time bin width in seconds.
    pub fn bin_width(&self) -> f64 {
        mean_step(&self.time_edges)
    }

    /// Left edges of the depth bins.
    pub fn depth_left_edges(&self) -> &[f64] {
        &self.depth_edges[..self.depth_edges.len() - 1]
    }

    pub fn max_rate(&self) -> f64 {
        self.rates.iter().copied().fold(0.0, f64::max)
    }

    /// Rates transposed to depth-major rows for image drawing.
    pub fn heatmap(&self) -> HeatmapGrid {
        let (nx, ny) = (self.counts.nx, self.counts.ny);
        let width = self.bin_width();
        let mut values = vec![0.0; nx * ny];
        for ix in 0..nx {
            for iy in 0..ny {
                values[iy * nx + ix] = self.counts.count(ix, iy) / width;
            }
        }
        HeatmapGrid {
            nx,
            ny,
            values,
            extent: (
                self.time_edges[0],
                self.time_edges[self.time_edges.len() - 1],
                self.depth_edges[0],
                self.depth_edges[self.depth_edges.len() - 1],
            ),
        }
    }

    /// Depth limits shared by the heatmap and the count marginal.
    pub fn depth_lim(&self) -> (f64, f64) {
        let left = self.depth_left_edges();
        (left[0], left[left.len() - 1])
    }
}

fn positive_max(axis: &'static str, max: Option<f64>) -> Result<f64, PlotError> {
    match max {
        Some(m) if m.is_finite() && m > 0.0 => Ok(m),
        Some(m) => Err(PlotError::DegenerateRange { axis, max: m }),
        None => Err(PlotError::DegenerateRange { axis, max: f64::NAN }),
    }
}

/// Label of the count marginal for a given divisor.
pub fn count_label(scale: f64) -> String {
    let exponent = scale.log10().round() as i32;
    if scale == 1.0 {
        "Spike count".to_string()
    } else if exponent > 0 && 10f64.powi(exponent) == scale {
        format!("Spike count (x10^{exponent})")
    } else {
        format!("Spike count (x{scale})")
    }
}

/// Driftmap figure: colorbar on top, rate heatmap, and a spike-count
/// marginal along depth on the right.
pub fn driftmap_figure(
    times: &[f64],
    depths: &[f64],
    config: &DriftmapConfig,
) -> Result<Figure, PlotError> {
    let data = DriftmapData::compute(times, depths, config)?;
    Ok(figure_from_data(&data, config))
}

pub fn figure_from_data(data: &DriftmapData, config: &DriftmapConfig) -> Figure {
    let grid = data.heatmap();
    let max_rate = data.max_rate();
    let value_range = (0.0, if max_rate > 0.0 { max_rate } else { 1.0 });
    let depth_lim = data.depth_lim();
    let max_count = data.depth_profile.iter().copied().fold(0.0, f64::max);

    log::debug!(
        "driftmap: {} spikes in {}x{} bins, bin width {:.4} s, peak rate {:.2} Hz",
        data.counts.total(),
        data.counts.nx,
        data.counts.ny,
        data.bin_width(),
        max_rate
    );

    let colorbar = Axes {
        role: AxesRole::Colorbar,
        span: GridSpan {
            rows: 0..1,
            cols: 0..10,
        },
        x_label: Some("Firing rate (Hz)".to_string()),
        y_label: None,
        x_lim: value_range,
        y_lim: (0.0, 1.0),
        show_x_ticks: true,
        show_y_ticks: false,
        x_axis_top: true,
        artist: Artist::Colorbar {
            colormap: config.colormap,
            value_range,
        },
    };

    let driftmap = Axes {
        role: AxesRole::Driftmap,
        span: GridSpan {
            rows: 2..GRID.0,
            cols: 0..10,
        },
        x_label: Some("Time (s)".to_string()),
        y_label: Some("Distance from the probe tip (µm)".to_string()),
        x_lim: (grid.extent.0, grid.extent.1),
        y_lim: depth_lim,
        show_x_ticks: true,
        show_y_ticks: true,
        x_axis_top: false,
        artist: Artist::Heatmap {
            grid,
            colormap: config.colormap,
            value_range,
        },
    };

    let spike_count = Axes {
        role: AxesRole::SpikeCount,
        span: GridSpan {
            rows: 2..GRID.0,
            cols: 10..GRID.1,
        },
        x_label: Some(count_label(config.count_scale)),
        y_label: None,
        x_lim: (0.0, if max_count > 0.0 { max_count * 1.05 } else { 1.0 }),
        y_lim: depth_lim,
        show_x_ticks: true,
        show_y_ticks: false,
        x_axis_top: false,
        artist: Artist::Line {
            x: data.depth_profile.clone(),
            y: data.depth_left_edges().to_vec(),
        },
    };

    Figure {
        width_in: config.width_in,
        height_in: config.height_in,
        dpi: config.dpi,
        grid: GRID,
        axes: vec![colorbar, driftmap, spike_count],
    }
}
