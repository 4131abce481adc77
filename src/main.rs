mod app;
mod color;
mod config;
mod data;
mod plotting;
mod probe;
mod state;
mod ui;

use std::path::PathBuf;

use app::SpikeViewApp;
use config::ViewerConfig;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let mut state = AppState::new(ViewerConfig::from_env());
    // Optional dataset path on the command line.
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        ui::panels::open_path(&mut state, path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 850.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "spikeview – Raster & Driftmap",
        options,
        Box::new(|_cc| Ok(Box::new(SpikeViewApp::new(state)))),
    )
}
