//! Binning helpers with NumPy semantics (`linspace`, `histogram2d`).

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Mean distance between consecutive edges.
pub fn mean_step(edges: &[f64]) -> f64 {
    match edges {
        [first, .., last] => (last - first) / (edges.len() - 1) as f64,
        _ => f64::NAN,
    }
}

/// Bin of `v` for ascending `edges`: bins are `[e_i, e_{i+1})`, the last one
/// is closed. NaN and values outside the edges have no bin.
pub fn bin_index(edges: &[f64], v: f64) -> Option<usize> {
    let (&first, &last) = (edges.first()?, edges.last()?);
    if edges.len() < 2 || v.is_nan() || v < first || v > last {
        return None;
    }
    if v == last {
        return Some(edges.len() - 2);
    }
    // First edge strictly greater than v, minus one.
    Some(edges.partition_point(|&e| e <= v) - 1)
}

/// Counts of a 2D histogram, x-major: `counts[ix * ny + iy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub nx: usize,
    pub ny: usize,
    pub counts: Vec<f64>,
}

impl Histogram2d {
    pub fn count(&self, ix: usize, iy: usize) -> f64 {
        self.counts[ix * self.ny + iy]
    }

    /// Total over the x axis, one value per y bin.
    pub fn sum_over_x(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.ny];
        for column in self.counts.chunks_exact(self.ny.max(1)) {
            for (t, c) in totals.iter_mut().zip(column) {
                *t += c;
            }
        }
        totals
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Bin paired samples into a 2D histogram over the given edges.
/// Pairs where either coordinate falls outside its edges are dropped.
pub fn histogram2d(xs: &[f64], ys: &[f64], x_edges: &[f64], y_edges: &[f64]) -> Histogram2d {
    let nx = x_edges.len().saturating_sub(1);
    let ny = y_edges.len().saturating_sub(1);
    let mut counts = vec![0.0; nx * ny];

    for (&x, &y) in xs.iter().zip(ys) {
        if let (Some(ix), Some(iy)) = (bin_index(x_edges, x), bin_index(y_edges, y)) {
            counts[ix * ny + iy] += 1.0;
        }
    }

    Histogram2d { nx, ny, counts }
}
