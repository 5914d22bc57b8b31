//! Map overlay and sidebar panels.
//!
//! Rendering is a pure function of its inputs: the same bins and routes always
//! produce the same [`MapOverlay`].

use crate::api::{Bin, ModelInfo, Route, Summary};
use crate::color::{Color, FillBand};
use crate::geometry::{LatLon, normalize_route};
use crate::orchestrator::ViewState;
use serde::Serialize;
use tracing::warn;

/// Where the map opens before any data is shown.
pub const MAP_CENTER: LatLon = LatLon {
    lat: 21.1702,
    lon: 72.8311,
};
pub const MAP_ZOOM: u8 = 12;

pub const MARKER_RADIUS: f64 = 8.0;
pub const MARKER_FILL_OPACITY: f64 = 0.8;
pub const ROUTE_WEIGHT: f64 = 4.0;
pub const ROUTE_OPACITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub bin_id: i64,
    pub position: LatLon,
    pub color: Color,
    pub band: FillBand,
    pub radius: f64,
    pub fill_opacity: f64,
    pub popup: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub truck_index: usize,
    pub coordinates: Vec<LatLon>,
    pub color: Color,
    pub weight: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOverlay {
    pub center: LatLon,
    pub zoom: u8,
    pub markers: Vec<Marker>,
    pub polylines: Vec<Polyline>,
    /// Bins left off the map for lack of a coordinate.
    pub unlocated_bins: usize,
    /// Positions of routes whose geometry could not be read.
    pub skipped_routes: Vec<usize>,
}

fn popup_lines(bin: &Bin) -> Vec<String> {
    let fill = match bin.fill_percent {
        Some(fill) => format!("{fill}%"),
        None => "-".to_string(),
    };
    let mut lines = vec![
        format!("Bin: {}", bin.id),
        format!("Fill: {fill}"),
        format!("Area: {}", bin.area_type),
    ];
    if let Some(truck) = &bin.truck_assignment {
        lines.push(format!("Truck: {truck}"));
    }
    lines
}

/// Marker for a bin, or `None` when it is missing either coordinate.
pub fn marker_for(bin: &Bin) -> Option<Marker> {
    let (lat, lon) = bin.position()?;
    let band = FillBand::of(bin.fill_percent);
    Some(Marker {
        bin_id: bin.id,
        position: LatLon { lat, lon },
        color: band.color(),
        band,
        radius: MARKER_RADIUS,
        fill_opacity: MARKER_FILL_OPACITY,
        popup: popup_lines(bin),
    })
}

/// Builds the overlay: one marker per geolocated bin, one polyline per
/// readable route. Neither missing coordinates nor bad route geometry stop
/// the rest from rendering.
pub fn render_map(bins: &[Bin], routes: &[Route]) -> MapOverlay {
    let markers: Vec<Marker> = bins.iter().filter_map(marker_for).collect();
    let unlocated_bins = bins.len() - markers.len();

    let mut polylines = Vec::with_capacity(routes.len());
    let mut skipped_routes = Vec::new();
    for (index, route) in routes.iter().enumerate() {
        match normalize_route(route, index) {
            Ok(normalized) => polylines.push(Polyline {
                truck_index: index,
                coordinates: normalized.coordinates,
                color: normalized.color,
                weight: ROUTE_WEIGHT,
                opacity: ROUTE_OPACITY,
            }),
            Err(e) => {
                warn!(route = index, error = %e, "Skipping route with unreadable geometry");
                skipped_routes.push(index);
            }
        }
    }

    MapOverlay {
        center: MAP_CENTER,
        zoom: MAP_ZOOM,
        markers,
        polylines,
        unlocated_bins,
        skipped_routes,
    }
}

/// What the map pane shows. Gating hides the overlay but never the data
/// behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pane", content = "content", rename_all = "snake_case")]
pub enum MapPane {
    Loading,
    Error(String),
    Map(MapOverlay),
}

impl MapPane {
    pub fn for_view(view: &ViewState) -> Self {
        if view.loading {
            MapPane::Loading
        } else if let Some(error) = &view.error {
            MapPane::Error(error.clone())
        } else {
            MapPane::Map(render_map(&view.bins, &view.routes))
        }
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn summary_card(summary: Option<&Summary>) -> Vec<String> {
    vec![
        format!("Total Bins: {}", or_dash(summary.map(|s| s.total_bins))),
        format!("Total Trucks: {}", or_dash(summary.map(|s| s.total_trucks))),
    ]
}

pub fn model_info_card(info: Option<&ModelInfo>) -> Vec<String> {
    let info = info.cloned().unwrap_or_default();
    vec![
        format!(
            "Classification Model: {}",
            or_dash(info.classification_model.filter(|s| !s.is_empty()))
        ),
        format!(
            "Clustering Model: {}",
            or_dash(info.clustering_model.filter(|s| !s.is_empty()))
        ),
        format!("Rows: {}", or_dash(info.data_rows)),
    ]
}

/// Bin table rows: id, area, truck, fill.
pub fn bin_table(bins: &[Bin]) -> Vec<[String; 4]> {
    bins.iter()
        .map(|b| {
            [
                b.id.to_string(),
                b.area_type.to_string(),
                or_dash(b.truck_assignment.as_ref()),
                or_dash(b.fill_percent),
            ]
        })
        .collect()
}
