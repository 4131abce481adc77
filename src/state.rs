use std::collections::BTreeSet;

use eframe::egui::{Color32, TextureHandle};

use crate::color::{ColorMap, Colormap};
use crate::config::{DriftmapConfig, ViewerConfig};
use crate::data::filter::{filtered_indices, init_filter_state, FilterState};
use crate::data::model::{MetadataValue, SpikeDataset};
use crate::plotting::driftmap::driftmap_figure;
use crate::plotting::raster::raster_figure;
use crate::plotting::{Figure, PlotError};
use crate::probe::{ElectrodeConfig, ProbeType};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which figure the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Raster,
    Driftmap,
    Probe,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: ViewerConfig,

    /// Loaded dataset (None until user loads a file).
    pub dataset: Option<SpikeDataset>,

    /// Per-column filter selections.
    pub filters: FilterState,

    /// Indices of units passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Which metadata column is used for colouring.
    pub color_column: Option<String>,

    /// Active colour map.
    pub color_map: Option<ColorMap>,

    pub view: View,

    /// Probe shown in the probe view.
    pub probe: ProbeType,

    /// Recorded bank highlighted in the probe view.
    pub bank: usize,

    /// Use the probe's extent as the driftmap depth range.
    pub use_probe_depth: bool,

    /// Figures of the visible units; `None` until a dataset is loaded.
    pub raster: Option<Result<Figure, PlotError>>,
    pub driftmap: Option<Result<Figure, PlotError>>,

    /// GPU copy of the driftmap heatmap; dropped whenever the figure changes.
    pub heatmap_texture: Option<TextureHandle>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl AppState {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            dataset: None,
            filters: FilterState::default(),
            visible_indices: Vec::new(),
            color_column: None,
            color_map: None,
            view: View::default(),
            probe: ProbeType::Neuropixels1_3B,
            bank: 0,
            use_probe_depth: false,
            raster: None,
            driftmap: None,
            heatmap_texture: None,
            status_message: None,
        }
    }

    /// Ingest a newly loaded dataset, initialise filters, colour and figures.
    pub fn set_dataset(&mut self, dataset: SpikeDataset) {
        self.filters = init_filter_state(&dataset);
        self.visible_indices = (0..dataset.len()).collect();

        // Default colour column: first metadata column (if any).
        self.color_column = dataset.column_names.first().cloned();
        self.color_map = color_map_for(&dataset, self.color_column.as_deref());

        self.dataset = Some(dataset);
        self.status_message = None;
        self.rebuild_figures();
    }

    /// Recompute `visible_indices` after filter change. Figures are only
    /// rebuilt when the visible set actually changed.
    pub fn refilter(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let indices = filtered_indices(ds, &self.filters);
        if indices != self.visible_indices {
            self.visible_indices = indices;
            self.rebuild_figures();
        }
    }

    /// Set colour column and rebuild the map.
    pub fn set_color_column(&mut self, col: String) {
        self.color_map = self
            .dataset
            .as_ref()
            .and_then(|ds| color_map_for(ds, Some(&col)));
        self.color_column = Some(col);
    }

    /// Colour of a unit's raster row.
    pub fn unit_color(&self, unit_index: usize) -> Color32 {
        let value = self
            .dataset
            .as_ref()
            .zip(self.color_column.as_deref())
            .and_then(|(ds, col)| ds.units.get(unit_index)?.metadata.get(col));
        match (value, &self.color_map) {
            (Some(v), Some(cm)) => cm.color_for(v),
            _ => Color32::BLACK,
        }
    }

    /// Toggle a single metadata value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &MetadataValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        let all = self
            .dataset
            .as_ref()
            .and_then(|ds| ds.unique_values.get(column))
            .cloned();
        if let Some(all_vals) = all {
            self.filters.insert(column.to_string(), all_vals);
            self.refilter();
        }
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }

    pub fn set_probe(&mut self, probe: ProbeType) {
        if probe != self.probe {
            self.probe = probe;
            self.bank = self.bank.min(ElectrodeConfig::bank_count(probe).saturating_sub(1));
            if self.use_probe_depth {
                self.rebuild_driftmap();
            }
        }
    }

    /// Electrodes of the highlighted bank.
    pub fn electrode_config(&self) -> ElectrodeConfig {
        ElectrodeConfig::bank(self.probe, self.bank)
    }

    pub fn set_use_probe_depth(&mut self, on: bool) {
        if on != self.use_probe_depth {
            self.use_probe_depth = on;
            self.rebuild_driftmap();
        }
    }

    pub fn set_colormap(&mut self, colormap: Colormap) {
        if colormap != self.config.driftmap.colormap {
            self.config.driftmap.colormap = colormap;
            self.rebuild_driftmap();
        }
    }

    /// Driftmap settings with the probe depth range applied when enabled.
    pub fn driftmap_config(&self) -> DriftmapConfig {
        let mut config = self.config.driftmap.clone();
        if self.use_probe_depth {
            config.depth_max = Some(self.probe.depth_extent());
        }
        config
    }

    /// Total spikes in the visible units.
    pub fn visible_spike_count(&self) -> usize {
        self.dataset
            .as_ref()
            .map_or(0, |ds| ds.spike_count(&self.visible_indices))
    }

    pub fn rebuild_figures(&mut self) {
        self.rebuild_raster();
        self.rebuild_driftmap();
    }

    fn rebuild_raster(&mut self) {
        self.raster = self.dataset.as_ref().map(|ds| {
            let trains = ds.spike_trains(&self.visible_indices);
            raster_figure(&trains, &self.config.raster)
        });
        if let Some(Err(e)) = &self.raster {
            log::warn!("Raster not drawn: {e}");
        }
    }

    fn rebuild_driftmap(&mut self) {
        let config = self.driftmap_config();
        self.driftmap = self.dataset.as_ref().map(|ds| {
            let (times, depths) = ds.flatten_spikes(&self.visible_indices);
            driftmap_figure(&times, &depths, &config)
        });
        self.heatmap_texture = None;
        if let Some(Err(e)) = &self.driftmap {
            log::warn!("Driftmap not drawn: {e}");
        }
    }
}

fn color_map_for(dataset: &SpikeDataset, column: Option<&str>) -> Option<ColorMap> {
    let col = column?;
    dataset
        .unique_values
        .get(col)
        .map(|vals| ColorMap::new(col, vals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Unit;
    use crate::plotting::AxesRole;
    use std::collections::BTreeMap;

    fn dataset() -> SpikeDataset {
        let units = [("good", 0.5), ("mua", 2.0), ("good", 4.0)]
            .into_iter()
            .map(|(quality, t)| Unit {
                spike_times: vec![t, t + 0.5],
                spike_depths: vec![100.0, 900.0],
                metadata: BTreeMap::from([(
                    "quality".to_string(),
                    MetadataValue::String(quality.into()),
                )]),
            })
            .collect();
        SpikeDataset::from_units(units)
    }

    #[test]
    fn loading_builds_both_figures() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
        assert_eq!(state.color_column.as_deref(), Some("quality"));
        assert_eq!(state.raster.as_ref().unwrap().as_ref().unwrap().axes.len(), 1);
        assert_eq!(state.driftmap.as_ref().unwrap().as_ref().unwrap().axes.len(), 3);
        assert_eq!(state.visible_spike_count(), 6);
    }

    #[test]
    fn filtering_rebuilds_raster_rows() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        state.toggle_filter_value("quality", &MetadataValue::String("mua".into()));
        assert_eq!(state.visible_indices, vec![0, 2]);

        let raster = state.raster.as_ref().unwrap().as_ref().unwrap();
        let ax = raster.axes(AxesRole::Raster).unwrap();
        assert_eq!(ax.y_lim, (1.0, 2.0));
        assert_eq!(ax.x_lim, (-0.5, 5.0));

        state.select_none("quality");
        assert!(state.visible_indices.is_empty());
        assert_eq!(state.raster, Some(Err(PlotError::Empty)));
        assert_eq!(state.driftmap, Some(Err(PlotError::Empty)));

        state.select_all("quality");
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
    }

    #[test]
    fn units_without_a_column_can_be_shown_or_hidden() {
        let units = [Some(0), Some(1), None]
            .into_iter()
            .map(|shank| Unit {
                spike_times: vec![1.0],
                spike_depths: vec![50.0],
                metadata: shank
                    .map(|s| ("shank".to_string(), MetadataValue::Integer(s)))
                    .into_iter()
                    .collect(),
            })
            .collect();
        let mut state = AppState::default();
        state.set_dataset(SpikeDataset::from_units(units));

        let offered = &state.dataset.as_ref().unwrap().unique_values["shank"];
        assert!(offered.contains(&MetadataValue::Null));

        state.toggle_filter_value("shank", &MetadataValue::Integer(1));
        assert_eq!(state.visible_indices, vec![0, 2]);

        state.toggle_filter_value("shank", &MetadataValue::Null);
        assert_eq!(state.visible_indices, vec![0]);
    }

    #[test]
    fn probe_depth_sets_driftmap_range() {
        let mut state = AppState::default();
        state.set_dataset(dataset());
        state.set_probe(ProbeType::Neuropixels2SingleShank);
        state.set_use_probe_depth(true);

        let fig = state.driftmap.as_ref().unwrap().as_ref().unwrap();
        let grid = match &fig.axes(AxesRole::Driftmap).unwrap().artist {
            crate::plotting::Artist::Heatmap { grid, .. } => grid.clone(),
            other => panic!("unexpected artist {other:?}"),
        };
        assert_eq!(grid.extent.3, 639.0 * 15.0);
    }

    #[test]
    fn bank_is_clamped_to_new_probe() {
        let mut state = AppState::default();
        state.bank = 2;
        state.set_probe(ProbeType::NeuropixelsUhd);
        assert_eq!(state.bank, 0);
        assert_eq!(state.electrode_config().electrodes.len(), 384);
    }

    #[test]
    fn unit_colors_follow_color_column() {
        let mut state = AppState::default();
        assert_eq!(state.unit_color(0), Color32::BLACK);
        state.set_dataset(dataset());
        assert_eq!(state.unit_color(0), state.unit_color(2));
        assert_ne!(state.unit_color(0), state.unit_color(1));
    }
}
