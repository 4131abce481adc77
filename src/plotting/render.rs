//! Rasterise a [`Figure`] into an RGB image for PNG export.
//!
//! Only the data layer is drawn (spines, tick marks, ticks, cells, lines);
//! labels live in the figure model and in the interactive view.

use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use super::{Artist, Axes, Figure};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const SPINE: Rgb<u8> = Rgb([38, 38, 38]);

/// Canvas margins as fractions of the figure: left, right, top, bottom.
const MARGINS: (f64, f64, f64, f64) = (0.07, 0.03, 0.06, 0.12);
/// Gap left of any axes that does not start in the first grid column,
/// as a fraction of one column.
const COLUMN_GAP: f64 = 0.25;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Pixel rectangle, `x0..x1` × `y0..y1` with y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Pixel rectangle of an axes on the figure's grid.
pub fn axes_rect(figure: &Figure, axes: &Axes) -> Rect {
    let (w, h) = figure.pixel_size();
    let (w, h) = (w as f64, h as f64);
    let (left, right, top, bottom) = MARGINS;
    let usable_w = w * (1.0 - left - right);
    let usable_h = h * (1.0 - top - bottom);
    let cell_w = usable_w / figure.grid.1 as f64;
    let cell_h = usable_h / figure.grid.0 as f64;

    let gap = if axes.span.cols.start > 0 {
        cell_w * COLUMN_GAP
    } else {
        0.0
    };
    Rect {
        x0: w * left + axes.span.cols.start as f64 * cell_w + gap,
        x1: w * left + axes.span.cols.end as f64 * cell_w,
        y0: h * top + axes.span.rows.start as f64 * cell_h,
        y1: h * top + axes.span.rows.end as f64 * cell_h,
    }
}

/// Limits usable for scaling: empty or non-finite ranges are widened by ±0.5.
fn usable_lim((lo, hi): (f64, f64)) -> (f64, f64) {
    if lo.is_finite() && hi.is_finite() && hi > lo {
        (lo, hi)
    } else if lo.is_finite() {
        (lo - 0.5, lo + 0.5)
    } else {
        (-0.5, 0.5)
    }
}

/// Data ↔ pixel mapping of one axes.
struct Transform {
    rect: Rect,
    x_lim: (f64, f64),
    y_lim: (f64, f64),
}

impl Transform {
    fn new(rect: Rect, axes: &Axes) -> Self {
        Self {
            rect,
            x_lim: usable_lim(axes.x_lim),
            y_lim: usable_lim(axes.y_lim),
        }
    }

    fn px(&self, x: f64) -> f64 {
        self.rect.x0 + (x - self.x_lim.0) / (self.x_lim.1 - self.x_lim.0) * self.rect.width()
    }

    fn py(&self, y: f64) -> f64 {
        self.rect.y1 - (y - self.y_lim.0) / (self.y_lim.1 - self.y_lim.0) * self.rect.height()
    }

    fn data_x(&self, px: f64) -> f64 {
        self.x_lim.0 + (px - self.rect.x0) / self.rect.width() * (self.x_lim.1 - self.x_lim.0)
    }

    fn data_y(&self, py: f64) -> f64 {
        self.y_lim.0 + (self.rect.y1 - py) / self.rect.height() * (self.y_lim.1 - self.y_lim.0)
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.rect.x0 && px <= self.rect.x1 && py >= self.rect.y0 && py <= self.rect.y1
    }
}

/// Up to about `target` round tick positions (1, 2, 5 × 10^k) within `lim`.
pub fn nice_ticks(lim: (f64, f64), target: usize) -> Vec<f64> {
    let (lo, hi) = usable_lim(lim);
    let raw = (hi - lo) / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = magnitude
        * match raw / magnitude {
            n if n < 1.5 => 1.0,
            n if n < 3.0 => 2.0,
            n if n < 7.0 => 5.0,
            _ => 10.0,
        };
    let eps = step * 1e-9;
    let mut ticks = Vec::new();
    let mut t = (lo / step).ceil() * step;
    while t <= hi + eps {
        ticks.push(if t.abs() < eps { 0.0 } else { t });
        t += step;
    }
    ticks
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Render a figure at its pixel size.
pub fn render_figure(figure: &Figure) -> RgbImage {
    let (w, h) = figure.pixel_size();
    let mut img = RgbImage::from_pixel(w, h, WHITE);
    let mark = (6.0 / 72.0 * figure.dpi as f64).round().max(2.0);

    for axes in &figure.axes {
        let tf = Transform::new(axes_rect(figure, axes), axes);
        match &axes.artist {
            Artist::Ticks { x, y } => draw_ticks(&mut img, &tf, x, y, mark),
            Artist::Heatmap {
                grid,
                colormap,
                value_range,
            } => fill_rect(&mut img, tf.rect, |px, py| {
                let (x, y) = (tf.data_x(px), tf.data_y(py));
                let (x0, x1, y0, y1) = grid.extent;
                if x < x0 || x > x1 || y < y0 || y > y1 || grid.nx == 0 || grid.ny == 0 {
                    return None;
                }
                let ix = (((x - x0) / (x1 - x0)) * grid.nx as f64) as usize;
                let iy = (((y - y0) / (y1 - y0)) * grid.ny as f64) as usize;
                let v = grid.value(ix.min(grid.nx - 1), iy.min(grid.ny - 1));
                Some(colormap.sample(normalize(v, *value_range)))
            }),
            Artist::Colorbar {
                colormap,
                value_range,
            } => fill_rect(&mut img, tf.rect, |px, _| {
                Some(colormap.sample(normalize(tf.data_x(px), *value_range)))
            }),
            Artist::Line { x, y } => draw_polyline(&mut img, &tf, x, y),
        }
        draw_frame(&mut img, &tf, axes);
    }
    img
}

/// Render and write a PNG.
pub fn save_png(figure: &Figure, path: &Path) -> Result<()> {
    let img = render_figure(figure);
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!(
        "Wrote {}x{} figure to {}",
        img.width(),
        img.height(),
        path.display()
    );
    Ok(())
}

fn normalize(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        (v - lo) / (hi - lo)
    } else {
        0.0
    }
}

fn put(img: &mut RgbImage, px: f64, py: f64, color: Rgb<u8>) {
    if px < 0.0 || py < 0.0 {
        return;
    }
    let (x, y) = (px as u32, py as u32);
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}

fn fill_rect(img: &mut RgbImage, rect: Rect, color_at: impl Fn(f64, f64) -> Option<[u8; 3]>) {
    let (x0, x1) = (rect.x0.round() as u32, rect.x1.round() as u32);
    let (y0, y1) = (rect.y0.round() as u32, rect.y1.round() as u32);
    for py in y0..y1.min(img.height()) {
        for px in x0..x1.min(img.width()) {
            if let Some(rgb) = color_at(px as f64 + 0.5, py as f64 + 0.5) {
                img.put_pixel(px, py, Rgb(rgb));
            }
        }
    }
}

fn draw_ticks(img: &mut RgbImage, tf: &Transform, xs: &[f64], ys: &[f64], mark: f64) {
    for (&x, &y) in xs.iter().zip(ys) {
        let (px, py) = (tf.px(x), tf.py(y));
        if !px.is_finite() || px < tf.rect.x0 || px > tf.rect.x1 {
            continue;
        }
        let top = (py - mark / 2.0).max(tf.rect.y0);
        let bottom = (py + mark / 2.0).min(tf.rect.y1);
        let mut row = top;
        while row <= bottom {
            put(img, px, row, INK);
            row += 1.0;
        }
    }
}

fn draw_polyline(img: &mut RgbImage, tf: &Transform, xs: &[f64], ys: &[f64]) {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| (tf.px(x), tf.py(y)))
        .collect();
    for pair in points.windows(2) {
        let ((ax, ay), (bx, by)) = (pair[0], pair[1]);
        let steps = (bx - ax).abs().max((by - ay).abs()).ceil().max(1.0);
        if !steps.is_finite() {
            continue;
        }
        for i in 0..=steps as usize {
            let t = i as f64 / steps;
            let (px, py) = (ax + (bx - ax) * t, ay + (by - ay) * t);
            if tf.contains(px, py) {
                put(img, px, py, INK);
            }
        }
    }
}

/// Left and bottom spines plus tick marks; the colorbar has no outline.
fn draw_frame(img: &mut RgbImage, tf: &Transform, axes: &Axes) {
    let r = tf.rect;
    let tick_len = 4.0;
    let is_colorbar = matches!(axes.artist, Artist::Colorbar { .. });

    if !is_colorbar {
        let mut py = r.y0;
        while py <= r.y1 {
            put(img, r.x0 - 1.0, py, SPINE);
            py += 1.0;
        }
        let mut px = r.x0;
        while px <= r.x1 {
            put(img, px, r.y1, SPINE);
            px += 1.0;
        }
    }

    if axes.show_x_ticks {
        let (edge, dir) = if axes.x_axis_top { (r.y0, -1.0) } else { (r.y1, 1.0) };
        for t in nice_ticks(axes.x_lim, 6) {
            let px = tf.px(t);
            for k in 1..=tick_len as usize {
                put(img, px, edge + dir * k as f64, SPINE);
            }
        }
    }
    if axes.show_y_ticks {
        for t in nice_ticks(axes.y_lim, 5) {
            let py = tf.py(t);
            for k in 1..=tick_len as usize {
                put(img, r.x0 - 1.0 - k as f64, py, SPINE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriftmapConfig, RasterConfig};
    use crate::plotting::{driftmap::driftmap_figure, raster::raster_figure, AxesRole};

    fn count_pixels(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn nice_ticks_are_round() {
        assert_eq!(nice_ticks((0.0, 10.0), 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_ticks((-0.5, 3.5), 4), vec![0.0, 1.0, 2.0, 3.0]);
        let widened = nice_ticks((1.0, 1.0), 5);
        assert!(!widened.is_empty());
        assert!(widened.iter().all(|t| (0.5..=1.5).contains(t)));
    }

    #[test]
    fn degenerate_limits_are_widened() {
        assert_eq!(usable_lim((1.0, 1.0)), (0.5, 1.5));
        assert_eq!(usable_lim((0.0, 2.0)), (0.0, 2.0));
        assert_eq!(usable_lim((f64::NAN, 2.0)), (-0.5, 0.5));
    }

    #[test]
    fn raster_renders_at_figure_size() {
        let a = [0.5, 1.0, 1.5];
        let b = [2.0];
        let fig = raster_figure(&[&a, &b], &RasterConfig::default()).unwrap();
        let img = render_figure(&fig);
        assert_eq!(img.dimensions(), (3200, 800));
        // Rows sit on the y limits, so each tick is clipped to half height.
        assert!(count_pixels(&img, INK) >= 4 * 4);
    }

    #[test]
    fn driftmap_axes_do_not_overlap() {
        let fig = driftmap_figure(&[1.0, 2.0], &[10.0, 20.0], &DriftmapConfig::default()).unwrap();
        let cbar = axes_rect(&fig, fig.axes(AxesRole::Colorbar).unwrap());
        let main = axes_rect(&fig, fig.axes(AxesRole::Driftmap).unwrap());
        let count = axes_rect(&fig, fig.axes(AxesRole::SpikeCount).unwrap());
        assert!(cbar.y1 < main.y0);
        assert!(main.x1 < count.x0);
        assert_eq!(main.y0, count.y0);
        assert_eq!(main.y1, count.y1);
    }

    #[test]
    fn driftmap_hot_bin_is_dark() {
        let config = DriftmapConfig {
            time_edges: 3,
            depth_edges: 3,
            width_in: 4.0,
            height_in: 2.0,
            dpi: 100,
            depth_max: Some(100.0),
            ..Default::default()
        };
        // All spikes land in time bin 1, depth bin 0.
        let fig = driftmap_figure(&[1.5, 1.6, 2.0], &[10.0, 20.0, 30.0], &config).unwrap();
        let img = render_figure(&fig);
        assert_eq!(img.dimensions(), (400, 200));

        let main = fig.axes(AxesRole::Driftmap).unwrap();
        let rect = axes_rect(&fig, main);
        // y_lim stops at the last left depth edge, so only depth bin 0 is
        // in view and it fills the whole height.
        let (px, py) = (rect.x1 - 2.0, rect.y0 + 2.0);
        assert_eq!(*img.get_pixel(px as u32, py as u32), Rgb([0, 0, 0]));
        // Empty cells map to the low end of gist_heat_r, which is white.
        let (px, py) = (rect.x0 + 2.0, rect.y1 - 2.0);
        assert_eq!(*img.get_pixel(px as u32, py as u32), WHITE);
    }

    #[test]
    fn save_png_writes_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raster.png");
        let a = [0.1, 0.2];
        let config = RasterConfig {
            width_in: 3.0,
            height_in: 1.0,
            dpi: 50,
            ..Default::default()
        };
        let fig = raster_figure(&[&a], &config).unwrap();
        save_png(&fig, &path).unwrap();

        let read = image::open(&path).unwrap();
        assert_eq!((read.width(), read.height()), (150, 50));
    }
}
