use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::color::FillBand;
use crate::orchestrator::ViewState;
use crate::render::render_map;

/// One sample of what the dashboard was showing, suitable for a CSV row.
#[derive(Debug, Default, Serialize)]
pub struct DashboardStats {
    pub timestamp: DateTime<Utc>,
    pub total_bins: usize,
    pub total_trucks: Option<u64>,

    // fill bands
    pub low_fill: usize,
    pub medium_fill: usize,
    pub high_fill: usize,
    pub unknown_fill: usize,

    // map
    pub markers: usize,
    pub unlocated_bins: usize,
    pub routes: usize,
    pub skipped_routes: usize,

    // error tracking
    pub error_message: Option<String>,
}

impl DashboardStats {
    pub fn from_view(view: &ViewState) -> Self {
        let mut s = DashboardStats {
            timestamp: Utc::now(),
            total_bins: view.bins.len(),
            total_trucks: view.summary.as_ref().map(|s| s.total_trucks),
            error_message: view.error.clone(),
            ..Default::default()
        };

        for bin in &view.bins {
            match FillBand::of(bin.fill_percent) {
                FillBand::Low => s.low_fill += 1,
                FillBand::Medium => s.medium_fill += 1,
                FillBand::High => s.high_fill += 1,
                FillBand::Unknown => s.unknown_fill += 1,
            }
        }

        let overlay = render_map(&view.bins, &view.routes);
        s.markers = overlay.markers.len();
        s.unlocated_bins = overlay.unlocated_bins;
        s.routes = overlay.polylines.len();
        s.skipped_routes = overlay.skipped_routes.len();

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of bins that need collecting now.
    pub fn high_fill_pct(&self) -> f64 {
        Self::pct(self.high_fill, self.total_bins)
    }
}
