//! Output of dashboard state: log panels, JSON export, CSV history.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::orchestrator::ViewState;
use crate::render::{MapPane, bin_table, model_info_card, summary_card};
use crate::stats::DashboardStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs dashboard statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &DashboardStats) {
    debug!("{:#?}", stats);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty-printed JSON, replacing the file.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("writing {path}"))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Logs the sidebar panels and the state of the map pane.
pub fn log_panels(view: &ViewState) {
    for line in summary_card(view.summary.as_ref()) {
        info!(panel = "summary", "{line}");
    }
    for line in model_info_card(view.model_info.as_ref()) {
        info!(panel = "model", "{line}");
    }
    for [id, area, truck, fill] in bin_table(&view.bins) {
        debug!(panel = "bins", %id, %area, %truck, %fill, "Bin");
    }

    match MapPane::for_view(view) {
        MapPane::Loading => info!(panel = "map", "Loading..."),
        MapPane::Error(error) => warn!(panel = "map", %error, "Map hidden"),
        MapPane::Map(overlay) => info!(
            panel = "map",
            markers = overlay.markers.len(),
            polylines = overlay.polylines.len(),
            unlocated_bins = overlay.unlocated_bins,
            skipped_routes = overlay.skipped_routes.len(),
            "Map rendered"
        ),
    }
}

/// Appends a [`DashboardStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, stats: &DashboardStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
