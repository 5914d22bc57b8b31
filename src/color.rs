//! Fill-level color bands.

use serde::{Serialize, Serializer};
use std::fmt;

/// A CSS-style `#rrggbb` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub &'static str);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

pub const GRAY: Color = Color("#888888");
pub const GREEN: Color = Color("#16a34a");
pub const AMBER: Color = Color("#f59e0b");
pub const RED: Color = Color("#dc2626");

/// How urgently a bin needs collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillBand {
    Unknown,
    Low,
    Medium,
    High,
}

impl FillBand {
    /// | Fill            | Band    |
    /// |-----------------|---------|
    /// | absent or NaN   | Unknown |
    /// | < 50            | Low     |
    /// | 50 ..= 80       | Medium  |
    /// | > 80            | High    |
    pub fn of(fill_percent: Option<f64>) -> Self {
        match fill_percent {
            Some(v) if v.is_nan() => FillBand::Unknown,
            None => FillBand::Unknown,
            Some(v) if v < 50.0 => FillBand::Low,
            Some(v) if v <= 80.0 => FillBand::Medium,
            Some(_) => FillBand::High,
        }
    }

    pub fn color(self) -> Color {
        match self {
            FillBand::Unknown => GRAY,
            FillBand::Low => GREEN,
            FillBand::Medium => AMBER,
            FillBand::High => RED,
        }
    }
}

/// Marker color for a bin's fill percentage.
pub fn color_for_fill(fill_percent: Option<f64>) -> Color {
    FillBand::of(fill_percent).color()
}
