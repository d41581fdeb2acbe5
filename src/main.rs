// src/main.rs
#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod camera;
mod config;
mod decode;
mod render;
mod ui;

use config::ScannerConfig;

const APP_TITLE: &str = "QR/Barcode Scanner";

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting {}", APP_TITLE);

    let config = ScannerConfig::from_env();
    log::debug!("Scanner config: {:?}", config);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size(config.window_size)
            .with_resizable(false),
        ..Default::default()
    };

    eframe::run_native(
        APP_TITLE,
        native_options,
        Box::new(|cc| Ok(Box::new(ui::ScannerAppUI::new(cc, config)))),
    )
}
