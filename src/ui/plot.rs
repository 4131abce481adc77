use eframe::egui::{self, Color32, ColorImage, RichText, Sense, TextureOptions, Ui};
use egui_plot::{Line, MarkerShape, Plot, PlotImage, PlotPoint, PlotPoints, Points};

use crate::color::Colormap;
use crate::plotting::{Artist, Axes, AxesRole, HeatmapGrid};
use crate::probe::ElectrodeConfig;
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the selected view in the central panel.
pub fn central_view(ui: &mut Ui, state: &mut AppState) {
    if state.view == View::Probe {
        probe_plot(ui, state);
        return;
    }

    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view spikes  (File → Open…)");
        });
        return;
    }

    match state.view {
        View::Raster => raster_plot(ui, state),
        View::Driftmap => driftmap_plot(ui, state),
        View::Probe => {}
    }
}

fn plot_error(ui: &mut Ui, message: String) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.label(message);
    });
}

/// Plot configured from an axes of the figure model.
fn labelled_plot(id: egui::Id, axes: &Axes) -> Plot {
    Plot::new(id)
        .x_axis_label(axes.x_label.clone().unwrap_or_default())
        .y_axis_label(axes.y_label.clone().unwrap_or_default())
        .include_x(axes.x_lim.0)
        .include_x(axes.x_lim.1)
        .include_y(axes.y_lim.0)
        .include_y(axes.y_lim.1)
        .show_axes([axes.show_x_ticks, axes.show_y_ticks])
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
}

// ---------------------------------------------------------------------------
// Raster
// ---------------------------------------------------------------------------

fn raster_plot(ui: &mut Ui, state: &AppState) {
    let (Some(dataset), Some(figure)) = (&state.dataset, &state.raster) else {
        return;
    };
    let axes = match figure.as_ref().map(|f| f.axes(AxesRole::Raster)) {
        Ok(Some(axes)) => axes,
        Ok(None) => return,
        Err(e) => return plot_error(ui, format!("Raster: {e}")),
    };

    labelled_plot(egui::Id::new("raster_plot"), axes).show(ui, |plot_ui| {
        // One series per unit so each row keeps its colour.
        for (row, &idx) in state.visible_indices.iter().enumerate() {
            let unit = &dataset.units[idx];
            if unit.spike_times.is_empty() {
                continue;
            }
            let y = (row + 1) as f64;
            let points: PlotPoints = unit.spike_times.iter().map(|&t| [t, y]).collect();
            plot_ui.points(
                Points::new(points)
                    .shape(MarkerShape::Square)
                    .radius(1.2)
                    .color(state.unit_color(idx))
                    .name(format!("unit {}", row + 1)),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Driftmap
// ---------------------------------------------------------------------------

fn driftmap_plot(ui: &mut Ui, state: &mut AppState) {
    let figure = match &state.driftmap {
        Some(Ok(figure)) => figure,
        Some(Err(e)) => return plot_error(ui, format!("Driftmap: {e}")),
        None => return,
    };
    let (Some(main), Some(counts), Some(cbar)) = (
        figure.axes(AxesRole::Driftmap),
        figure.axes(AxesRole::SpikeCount),
        figure.axes(AxesRole::Colorbar),
    ) else {
        return;
    };
    let Artist::Heatmap {
        grid,
        colormap,
        value_range,
    } = &main.artist
    else {
        return;
    };

    let max_side = ui.ctx().input(|i| i.max_texture_side);
    if grid.nx.max(grid.ny) > max_side {
        return plot_error(
            ui,
            format!(
                "Driftmap: {}x{} bins exceed the {max_side} px texture limit",
                grid.nx, grid.ny
            ),
        );
    }

    let texture = state.heatmap_texture.get_or_insert_with(|| {
        log::debug!("uploading {}x{} heatmap texture", grid.nx, grid.ny);
        ui.ctx().load_texture(
            "driftmap_heatmap",
            heatmap_image(grid, *colormap, *value_range),
            TextureOptions::NEAREST,
        )
    });

    let (x0, x1, y0, y1) = grid.extent;
    let image = PlotImage::new(
        texture.id(),
        PlotPoint::new((x0 + x1) / 2.0, (y0 + y1) / 2.0),
        egui::vec2((x1 - x0) as f32, (y1 - y0) as f32),
    );

    colorbar(ui, cbar);

    // Split the remaining width 10:2 like the figure grid.
    let total_w = ui.available_width();
    let height = ui.available_height();
    let main_w = total_w * main.span.cols.len() as f32 / figure.grid.1 as f32;

    ui.horizontal(|ui: &mut Ui| {
        labelled_plot(egui::Id::new("driftmap_plot"), main)
            .width(main_w)
            .height(height)
            .show(ui, |plot_ui| plot_ui.image(image));

        let line = match &counts.artist {
            Artist::Line { x, y } => {
                let points: PlotPoints = x.iter().zip(y).map(|(&c, &d)| [c, d]).collect();
                Some(Line::new(points).color(Color32::BLACK).width(1.0))
            }
            _ => None,
        };
        labelled_plot(egui::Id::new("spike_count_plot"), counts)
            .width(ui.available_width())
            .height(height)
            .show(ui, |plot_ui| {
                if let Some(line) = line {
                    plot_ui.line(line);
                }
            });
    });
}

/// Horizontal colour scale with its label and limits above it.
fn colorbar(ui: &mut Ui, axes: &Axes) {
    let Artist::Colorbar {
        colormap,
        value_range,
    } = &axes.artist
    else {
        return;
    };
    let width = ui.available_width() * axes.span.cols.len() as f32 / 12.0;

    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("{:.0}", value_range.0));
        ui.add_space((width - 80.0).max(0.0));
        ui.label(format!("{:.1}", value_range.1));
    });
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, 14.0), Sense::hover());
    let painter = ui.painter_at(rect);
    let steps = 128;
    for i in 0..steps {
        let t = i as f64 / (steps - 1) as f64;
        let left = rect.left() + rect.width() * i as f32 / steps as f32;
        let right = rect.left() + rect.width() * (i + 1) as f32 / steps as f32;
        painter.rect_filled(
            egui::Rect::from_x_y_ranges(left..=right, rect.y_range()),
            0.0,
            colormap.sample_color32(t),
        );
    }
    if let Some(label) = &axes.x_label {
        ui.label(label);
    }
    ui.add_space(4.0);
}

/// Heatmap as an image, deepest bins in the top row.
fn heatmap_image(grid: &HeatmapGrid, colormap: Colormap, value_range: (f64, f64)) -> ColorImage {
    let mut image = ColorImage::new([grid.nx, grid.ny], Color32::WHITE);
    let span = value_range.1 - value_range.0;
    for row in 0..grid.ny {
        let iy = grid.ny - 1 - row;
        for ix in 0..grid.nx {
            let t = if span > 0.0 {
                (grid.value(ix, iy) - value_range.0) / span
            } else {
                0.0
            };
            image.pixels[row * grid.nx + ix] = colormap.sample_color32(t);
        }
    }
    image
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

fn probe_plot(ui: &mut Ui, state: &mut AppState) {
    let electrodes = state.probe.electrodes();
    let n_banks = ElectrodeConfig::bank_count(state.probe);
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!(
            "{}: {} sites, {:.0} µm from tip to top row",
            state.probe,
            electrodes.len(),
            state.probe.depth_extent()
        ));
        ui.separator();
        ui.label("Bank");
        ui.add(egui::DragValue::new(&mut state.bank).range(0..=n_banks.saturating_sub(1)));
    });

    let config = state.electrode_config();
    ui.label(
        RichText::new(format!(
            "{}: {} channels, config {:016x}",
            config.name,
            config.electrodes.len(),
            config.config_hash()
        ))
        .weak(),
    );

    let points: PlotPoints = electrodes.iter().map(|e| [e.x_coord, e.y_coord]).collect();
    let recorded: PlotPoints = config
        .sites()
        .iter()
        .map(|e| [e.x_coord, e.y_coord])
        .collect();
    Plot::new("probe_plot")
        .x_axis_label("x (µm)")
        .y_axis_label("Distance from the probe tip (µm)")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.points(
                Points::new(points)
                    .shape(MarkerShape::Square)
                    .radius(2.0)
                    .color(Color32::DARK_GRAY)
                    .name(state.probe.label()),
            );
            plot_ui.points(
                Points::new(recorded)
                    .shape(MarkerShape::Square)
                    .radius(2.0)
                    .color(Color32::from_rgb(200, 60, 30))
                    .name(config.name.as_str()),
            );
        });
}
