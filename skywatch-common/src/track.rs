//! Canonical flight track record
//!
//! Every upstream schema is normalized into [`Track`]. Records are produced
//! once by a source parser and never mutated afterwards; merging only moves
//! or clones them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream feed that produced a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    /// Point-array feed (FlightRadar24 style)
    Fr24,
    /// Object-list feed, military endpoint (adsb.lol style)
    Adsb,
    /// Object-list feed, limited-display (LADD) endpoint
    AdsbLadd,
    /// State-vector feed (OpenSky Network)
    #[serde(rename = "opensky")]
    OpenSky,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Fr24 => "fr24",
            TrackSource::Adsb => "adsb",
            TrackSource::AdsbLadd => "adsb_ladd",
            TrackSource::OpenSky => "opensky",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category assigned at parse time.
///
/// Best-effort label derived from source defaults and heuristics, not
/// ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Civilian,
    Military,
    Uav,
    /// Unknown / generic aircraft
    Aircraft,
}

/// One observed aircraft position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Stable identifier (hex code or source-specific key)
    pub id: String,
    /// ICAO24 transponder address when the source supplies one
    pub hex: Option<String>,
    /// Latitude in degrees
    pub lat: Option<f64>,
    /// Longitude in degrees
    pub lon: Option<f64>,
    /// Heading over ground in degrees
    pub track_angle: Option<f64>,
    pub altitude_baro: Option<f64>,
    pub ground_speed: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub squawk: Option<String>,
    /// Aircraft type designator (e.g. "B738")
    pub model: Option<String>,
    pub registration: Option<String>,
    /// Source-specific emitter category, kept as text
    pub category: Option<String>,
    /// Trimmed flight identifier
    pub callsign: Option<String>,
    pub source: TrackSource,
    pub classification: Classification,
}

impl Track {
    /// Create a track with only identity and provenance set
    pub fn new(id: impl Into<String>, source: TrackSource, classification: Classification) -> Self {
        Self {
            id: id.into(),
            hex: None,
            lat: None,
            lon: None,
            track_angle: None,
            altitude_baro: None,
            ground_speed: None,
            vertical_rate: None,
            squawk: None,
            model: None,
            registration: None,
            category: None,
            callsign: None,
            source,
            classification,
        }
    }

    /// `(lat, lon)` when both coordinates are present and finite
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}
