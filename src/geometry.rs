//! Route geometry normalization.
//!
//! Routes arrive with coordinates either as `[lat, lon]` tuples or as
//! `{lat, lon}` objects, possibly mixed within one route. Everything
//! downstream only ever sees [`LatLon`].

use crate::api::{RawCoordinate, Route, RouteCoords};
use crate::color::Color;
use serde::Serialize;
use thiserror::Error;

/// Per-truck polyline colors, cycled by route position.
pub const TRUCK_PALETTE: [Color; 8] = [
    Color("#2563eb"),
    Color("#7c3aed"),
    Color("#059669"),
    Color("#ea580c"),
    Color("#9333ea"),
    Color("#0ea5e9"),
    Color("#14b8a6"),
    Color("#f43f5e"),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("coordinate {position} has an unrecognized shape: {raw}")]
    UnrecognizedShape { position: usize, raw: String },
    #[error("route coordinates are not a list: {raw}")]
    NotAList { raw: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRoute {
    pub coordinates: Vec<LatLon>,
    pub color: Color,
}

/// Palette color of the route at `index`.
pub fn route_color(index: usize) -> Color {
    TRUCK_PALETTE[index % TRUCK_PALETTE.len()]
}

pub fn normalize_coordinate(raw: &RawCoordinate, position: usize) -> Result<LatLon, GeometryError> {
    match raw {
        RawCoordinate::Pair([lat, lon]) => Ok(LatLon { lat: *lat, lon: *lon }),
        RawCoordinate::Labeled { lat, lon } => Ok(LatLon { lat: *lat, lon: *lon }),
        RawCoordinate::Unrecognized(value) => Err(GeometryError::UnrecognizedShape {
            position,
            raw: value.to_string(),
        }),
    }
}

/// Canonicalizes one route's coordinates, preserving order one-to-one, and
/// assigns the color for its position in the route list.
///
/// A route without coordinates yields an empty path. A coordinate value that
/// is not a list, or any element of an unrecognized shape, rejects the whole
/// route.
pub fn normalize_route(raw: &Route, index: usize) -> Result<NormalizedRoute, GeometryError> {
    let elements: &[RawCoordinate] = match &raw.route_coords {
        None => &[],
        Some(RouteCoords::List(list)) => list,
        Some(RouteCoords::Unrecognized(value)) => {
            return Err(GeometryError::NotAList {
                raw: value.to_string(),
            });
        }
    };
    let coordinates = elements
        .iter()
        .enumerate()
        .map(|(position, c)| normalize_coordinate(c, position))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NormalizedRoute {
        coordinates,
        color: route_color(index),
    })
}
