//! Wire types exchanged with the fleet backend.
//!
//! Field names follow the backend's JSON (which mirrors its CSV columns),
//! mapped onto Rust names with `serde(rename)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Depot used by the backend when none is given (Surat city centre).
pub const DEFAULT_DEPOT: (f64, f64) = (21.1702, 72.8311);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaType {
    Residential,
    Commercial,
    Industrial,
}

impl AreaType {
    pub fn as_str(self) -> &'static str {
        match self {
            AreaType::Residential => "Residential",
            AreaType::Commercial => "Commercial",
            AreaType::Industrial => "Industrial",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "residential" => Ok(AreaType::Residential),
            "commercial" => Ok(AreaType::Commercial),
            "industrial" => Ok(AreaType::Industrial),
            other => Err(format!("unknown area type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Rain,
    Cloudy,
    Windy,
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Weather::Clear => "Clear",
            Weather::Rain => "Rain",
            Weather::Cloudy => "Cloudy",
            Weather::Windy => "Windy",
        };
        f.write_str(s)
    }
}

impl FromStr for Weather {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clear" => Ok(Weather::Clear),
            "rain" => Ok(Weather::Rain),
            "cloudy" => Ok(Weather::Cloudy),
            "windy" => Ok(Weather::Windy),
            other => Err(format!("unknown weather '{other}'")),
        }
    }
}

/// Truck a bin is assigned to. The backend emits either a cluster number or a
/// label depending on how the assignment column was filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TruckId {
    Number(serde_json::Number),
    Label(String),
}

impl fmt::Display for TruckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // pandas turns the assignment column into floats; show `1`, not `1.0`.
            TruckId::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() && v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.0}"),
                _ => write!(f, "{n}"),
            },
            TruckId::Label(s) => f.write_str(s),
        }
    }
}

/// A physical bin as reported by `GET /clusters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    #[serde(rename = "Bin_ID")]
    pub id: i64,
    #[serde(rename = "Area_Type")]
    pub area_type: AreaType,
    #[serde(rename = "Fill_Level(%)", default)]
    pub fill_percent: Option<f64>,
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<f64>,
    #[serde(rename = "Truck_Assignment", default)]
    pub truck_assignment: Option<TruckId>,
}

impl Bin {
    /// Both coordinates, if the bin is geolocated.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Row of `GET /bin_fill_levels`, which only carries id and fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillLevel {
    #[serde(rename = "Bin_ID")]
    pub id: i64,
    #[serde(rename = "Fill_Level(%)", default)]
    pub fill_percent: Option<f64>,
}

/// One coordinate exactly as the backend sent it.
///
/// Both encodings are accepted; anything else is kept verbatim so that a single
/// bad element only invalidates its own route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinate {
    Pair([f64; 2]),
    Labeled { lat: f64, lon: f64 },
    Unrecognized(serde_json::Value),
}

/// The `route_coords` value of a route. Anything that is not a list is kept
/// verbatim so that it only invalidates its own route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteCoords {
    List(Vec<RawCoordinate>),
    Unrecognized(serde_json::Value),
}

/// A truck route from `GET /routes`. Its truck is its position in the list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub route_coords: Option<RouteCoords>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_id: Option<TruckId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bins: Option<u64>,
}

impl Route {
    pub fn from_coords(coords: Vec<RawCoordinate>) -> Self {
        Self {
            route_coords: Some(RouteCoords::List(coords)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_bins: u64,
    pub total_trucks: u64,
}

/// Model metadata. The backend reports `null` for a model it failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub classification_model: Option<String>,
    #[serde(default)]
    pub clustering_model: Option<String>,
    #[serde(default)]
    pub data_rows: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    #[serde(rename = "Area_Type")]
    pub area_type: AreaType,
    #[serde(rename = "Time_Since_Last_Collection")]
    pub hours_since_collection: f64,
    #[serde(rename = "Weather")]
    pub weather: Weather,
}

impl Default for PredictRequest {
    fn default() -> Self {
        Self {
            area_type: AreaType::Residential,
            hours_since_collection: 12.0,
            weather: Weather::Clear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PredictResponse {
    pub is_full: bool,
}

/// Partial update of one bin. Fields left as `None` are omitted from the
/// payload so the backend leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateBinRequest {
    #[serde(rename = "Bin_ID")]
    pub id: i64,
    #[serde(rename = "Fill_Level", skip_serializing_if = "Option::is_none")]
    pub fill_percent: Option<f64>,
    #[serde(
        rename = "Time_Since_Last_Collection",
        skip_serializing_if = "Option::is_none"
    )]
    pub hours_since_collection: Option<f64>,
    #[serde(rename = "Weather", skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

impl UpdateBinRequest {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fill_percent: None,
            hours_since_collection: None,
            weather: None,
        }
    }

    pub fn fill_percent(mut self, value: f64) -> Self {
        self.fill_percent = Some(value);
        self
    }

    pub fn hours_since_collection(mut self, value: f64) -> Self {
        self.hours_since_collection = Some(value);
        self
    }

    pub fn weather(mut self, value: Weather) -> Self {
        self.weather = Some(value);
        self
    }
}

/// Acknowledgement of `POST /update_bin`; every field is optional since the
/// client only needs the call to succeed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct UpdateBinAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_bin: Option<i64>,
    #[serde(default)]
    pub updated_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterRequest {
    #[serde(rename = "num_trucks")]
    pub truck_count: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizeRequest {
    pub depot_lat: f64,
    pub depot_lon: f64,
    #[serde(rename = "num_trucks_per_area")]
    pub trucks_per_area: NonZeroU32,
    pub save_maps: bool,
}

impl Default for OptimizeRequest {
    fn default() -> Self {
        Self {
            depot_lat: DEFAULT_DEPOT.0,
            depot_lon: DEFAULT_DEPOT.1,
            trucks_per_area: NonZeroU32::MIN.saturating_add(1),
            save_maps: false,
        }
    }
}
