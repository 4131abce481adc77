use std::path::PathBuf;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::color::Colormap;
use crate::plotting::render;
use crate::probe::ProbeType;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – colour, filters, probe
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Probe");
    ui.separator();
    probe_controls(ui, state);
    ui.add_space(8.0);

    ui.heading("Filters");
    ui.separator();

    let Some(dataset) = &state.dataset else {
        ui.label("No dataset loaded.");
        return;
    };

    // Clone what we need so we can mutate state inside the loop.
    let columns = dataset.column_names.clone();
    let unique = dataset.unique_values.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Colour-by selector ----
            ui.strong("Color by");
            let current_color_col = state.color_column.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("color_by")
                .selected_text(&current_color_col)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in &columns {
                        if ui
                            .selectable_label(current_color_col == *col, col)
                            .clicked()
                        {
                            state.set_color_column(col.clone());
                        }
                    }
                });
            if let Some(cm) = &state.color_map {
                ui.horizontal_wrapped(|ui: &mut Ui| {
                    ui.label(RichText::new(format!("{}:", cm.column)).weak());
                    for (label, color) in cm.legend_entries() {
                        ui.label(RichText::new(format!("■ {label}")).color(color));
                    }
                });
            }
            ui.separator();

            // ---- Per-column filter widgets (collapsible) ----
            for col in &columns {
                let Some(all_values) = unique.get(col) else {
                    continue;
                };

                let n_selected = state.filters.get(col).map_or(0, |s| s.len());
                let header_text = format!("{col}  ({n_selected}/{})", all_values.len());

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(col);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(col);
                            }
                        });

                        for val in all_values {
                            let mut checked =
                                state.filters.get(col).is_some_and(|s| s.contains(val));

                            // Show colour swatch if this is the colour column
                            let mut text = RichText::new(val.to_string());
                            if state.color_column.as_deref() == Some(col.as_str()) {
                                if let Some(cm) = &state.color_map {
                                    text = text.color(cm.color_for(val));
                                }
                            }

                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }
        });
}

fn probe_controls(ui: &mut Ui, state: &mut AppState) {
    let mut probe = state.probe;
    egui::ComboBox::from_id_salt("probe_type")
        .selected_text(probe.label())
        .show_ui(ui, |ui: &mut Ui| {
            for p in ProbeType::ALL {
                ui.selectable_value(&mut probe, p, p.label());
            }
        });
    state.set_probe(probe);

    let mut use_depth = state.use_probe_depth;
    ui.checkbox(&mut use_depth, "Use probe depth range")
        .on_hover_text(format!(
            "Bin depths up to {:.0} µm instead of the deepest spike",
            state.probe.depth_extent()
        ));
    state.set_use_probe_depth(use_depth);

    let mut colormap = state.config.driftmap.colormap;
    egui::ComboBox::from_id_salt("colormap")
        .selected_text(colormap.name())
        .show_ui(ui, |ui: &mut Ui| {
            for c in Colormap::ALL {
                ui.selectable_value(&mut colormap, c, c.name());
            }
        });
    state.set_colormap(colormap);
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            let has_raster = matches!(state.raster, Some(Ok(_)));
            if ui
                .add_enabled(has_raster, egui::Button::new("Export raster PNG…"))
                .clicked()
            {
                export_dialog(state, View::Raster);
                ui.close_menu();
            }
            let has_driftmap = matches!(state.driftmap, Some(Ok(_)));
            if ui
                .add_enabled(has_driftmap, egui::Button::new("Export driftmap PNG…"))
                .clicked()
            {
                export_dialog(state, View::Driftmap);
                ui.close_menu();
            }
        });

        ui.separator();

        for (view, label) in [
            (View::Raster, "Raster"),
            (View::Driftmap, "Driftmap"),
            (View::Probe, "Probe"),
        ] {
            ui.selectable_value(&mut state.view, view, label);
        }

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} units loaded, {} visible ({} spikes)",
                ds.len(),
                state.visible_indices.len(),
                state.visible_spike_count()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Bottom panel – unit table
// ---------------------------------------------------------------------------

/// Visible units with their spike counts and colour-by value.
pub fn unit_table(ui: &mut Ui, state: &AppState) {
    let Some(ds) = &state.dataset else {
        return;
    };
    let color_col = state.color_column.as_deref();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::exact(50.0))
        .column(Column::exact(80.0))
        .column(Column::auto().at_least(100.0))
        .column(Column::remainder())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Row");
            });
            header.col(|ui| {
                ui.strong("Spikes");
            });
            header.col(|ui| {
                ui.strong(color_col.unwrap_or("—"));
            });
            header.col(|ui| {
                ui.strong("Depth (µm)");
            });
        })
        .body(|body| {
            body.rows(18.0, state.visible_indices.len(), |mut row| {
                let row_no = row.index();
                let idx = state.visible_indices[row_no];
                let unit = &ds.units[idx];
                row.col(|ui| {
                    ui.label((row_no + 1).to_string());
                });
                row.col(|ui| {
                    ui.label(unit.spike_count().to_string());
                });
                row.col(|ui| {
                    let value = color_col
                        .and_then(|c| unit.metadata.get(c))
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    ui.label(RichText::new(value).color(state.unit_color(idx)));
                });
                row.col(|ui| {
                    let finite = unit.spike_depths.iter().copied().filter(|d| d.is_finite());
                    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                        (lo.min(d), hi.max(d))
                    });
                    if lo <= hi {
                        ui.label(format!("{lo:.0} – {hi:.0}"));
                    } else {
                        ui.label("—");
                    }
                });
            });
        });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spike data")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        open_path(state, path);
    }
}

/// Load a dataset from `path` into the state, reporting failures in the UI.
pub fn open_path(state: &mut AppState, path: PathBuf) {
    match crate::data::loader::load_file(&path) {
        Ok(dataset) if dataset.is_empty() => {
            log::warn!("No units in {}", path.display());
            state.status_message = Some(format!("No units in {}", path.display()));
        }
        Ok(dataset) => {
            log::info!(
                "Loaded {} units with columns {:?} from {}",
                dataset.len(),
                dataset.column_names,
                path.display()
            );
            state.set_dataset(dataset);
        }
        Err(e) => {
            log::error!("Failed to load file: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

fn export_dialog(state: &mut AppState, view: View) {
    let (figure, default_name) = match view {
        View::Raster => (&state.raster, "raster.png"),
        View::Driftmap => (&state.driftmap, "driftmap.png"),
        View::Probe => return,
    };
    let Some(Ok(figure)) = figure else {
        return;
    };

    let Some(path) = rfd::FileDialog::new()
        .set_title("Export figure")
        .set_file_name(default_name)
        .add_filter("PNG", &["png"])
        .save_file()
    else {
        return;
    };

    match render::save_png(figure, &path) {
        Ok(()) => state.status_message = None,
        Err(e) => {
            log::error!("Failed to export figure: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
