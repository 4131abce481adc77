use super::{finite_max, Artist, Axes, AxesRole, Figure, GridSpan, PlotError};
use crate::config::RasterConfig;

/// Flattened raster points: one `(time, unit number)` pair per spike.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterData {
    pub x: Vec<f64>,
    /// Unit numbers, `1..=n` in input order.
    pub y: Vec<f64>,
    pub unit_count: usize,
}

impl RasterData {
    /// Flatten per-unit spike trains. Units are numbered from 1 in the order
    /// given, whatever their ids, so empty trains still occupy a row.
    pub fn from_trains(trains: &[&[f64]]) -> Self {
        let total = trains.iter().map(|t| t.len()).sum();
        let mut x = Vec::with_capacity(total);
        let mut y = Vec::with_capacity(total);
        for (i, train) in trains.iter().enumerate() {
            x.extend_from_slice(train);
            y.extend(std::iter::repeat((i + 1) as f64).take(train.len()));
        }
        Self {
            x,
            y,
            unit_count: trains.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Time limits padded on both sides: `(-pad, last + pad)`, where `last`
    /// is the latest finite spike over all units rather than the last one
    /// listed, so no unit ordering can push spikes past the right edge.
    pub fn x_lim(&self, padding: f64) -> Result<(f64, f64), PlotError> {
        let last = finite_max(&self.x).ok_or(PlotError::Empty)?;
        Ok((0.0 - padding, last + padding))
    }

    pub fn y_lim(&self) -> (f64, f64) {
        (1.0, self.unit_count as f64)
    }
}

/// Raster figure: a single despined axes of spike ticks.
pub fn raster_figure(trains: &[&[f64]], config: &RasterConfig) -> Result<Figure, PlotError> {
    let data = RasterData::from_trains(trains);
    if data.is_empty() {
        return Err(PlotError::Empty);
    }
    let x_lim = data.x_lim(config.x_padding)?;
    let y_lim = data.y_lim();

    log::debug!(
        "raster: {} spikes over {} units, x_lim {:?}",
        data.x.len(),
        data.unit_count,
        x_lim
    );

    Ok(Figure {
        width_in: config.width_in,
        height_in: config.height_in,
        dpi: config.dpi,
        grid: (1, 1),
        axes: vec![Axes {
            role: AxesRole::Raster,
            span: GridSpan {
                rows: 0..1,
                cols: 0..1,
            },
            x_label: Some("Time (s)".to_string()),
            y_label: Some("Unit".to_string()),
            x_lim,
            y_lim,
            show_x_ticks: true,
            show_y_ticks: true,
            x_axis_top: false,
            artist: Artist::Ticks {
                x: data.x,
                y: data.y,
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_in_unit_order() {
        let a = [0.1, 0.4];
        let b: [f64; 0] = [];
        let c = [0.2];
        let data = RasterData::from_trains(&[&a, &b, &c]);
        assert_eq!(data.x, vec![0.1, 0.4, 0.2]);
        assert_eq!(data.y, vec![1.0, 1.0, 3.0]);
        assert_eq!(data.unit_count, 3);
    }

    #[test]
    fn figure_has_one_axes_with_padded_limits() {
        let a = [0.5, 2.0];
        let b = [1.0, 7.5];
        let fig = raster_figure(&[&a, &b], &RasterConfig::default()).unwrap();

        assert_eq!(fig.axes.len(), 1);
        assert_eq!(fig.pixel_size(), (3200, 800));
        let ax = fig.axes(AxesRole::Raster).unwrap();
        assert_eq!(ax.x_lim, (-0.5, 8.0));
        assert_eq!(ax.y_lim, (1.0, 2.0));
        assert_eq!(ax.x_label.as_deref(), Some("Time (s)"));
        assert_eq!(ax.y_label.as_deref(), Some("Unit"));
    }

    #[test]
    fn limit_uses_latest_spike_not_last_listed() {
        let a = [9.0];
        let b = [1.0];
        let config = RasterConfig {
            x_padding: 1.0,
            ..Default::default()
        };
        let fig = raster_figure(&[&a, &b], &config).unwrap();
        assert_eq!(fig.axes[0].x_lim, (-1.0, 10.0));
    }

    #[test]
    fn no_spikes_is_an_error() {
        let empty: [f64; 0] = [];
        assert_eq!(
            raster_figure(&[&empty], &RasterConfig::default()),
            Err(PlotError::Empty)
        );
        assert_eq!(
            raster_figure(&[], &RasterConfig::default()),
            Err(PlotError::Empty)
        );
    }
}
