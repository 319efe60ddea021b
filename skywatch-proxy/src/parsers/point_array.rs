//! Point-array feed (FlightRadar24 style)
//!
//! Payload: `{ "<flight key>": [hex, lat, lon, track, alt, speed, ...], ... }`
//! possibly prefixed with the anti-scraping guard. Non-array members
//! (`full_count`, `version`, ...) are skipped. Rows come out in the order
//! the upstream listed them.

use serde_json::{Map, Value};
use skywatch_common::{Track, TrackSource};

use super::{finish, number, strip_guard, text};
use crate::classify::{baseline_classification, ClassificationPolicy};

/// One flight row, decoded by the upstream's fixed field positions
#[derive(Debug, Default, PartialEq)]
struct PointRow {
    hex: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    track: Option<f64>,
    altitude: Option<f64>,
    ground_speed: Option<f64>,
    model: Option<String>,
    registration: Option<String>,
    category: Option<String>,
    callsign: Option<String>,
}

impl PointRow {
    const HEX: usize = 0;
    const LAT: usize = 1;
    const LON: usize = 2;
    const TRACK: usize = 3;
    const ALTITUDE: usize = 4;
    const GROUND_SPEED: usize = 5;
    const MODEL: usize = 8;
    const REGISTRATION: usize = 9;
    const CATEGORY: usize = 11;
    const CALLSIGN: usize = 13;

    fn from_values(values: &[Value]) -> Self {
        Self {
            hex: text(values.get(Self::HEX)),
            lat: number(values.get(Self::LAT)),
            lon: number(values.get(Self::LON)),
            track: number(values.get(Self::TRACK)),
            altitude: number(values.get(Self::ALTITUDE)),
            ground_speed: number(values.get(Self::GROUND_SPEED)),
            model: text(values.get(Self::MODEL)),
            registration: text(values.get(Self::REGISTRATION)),
            category: text(values.get(Self::CATEGORY)),
            callsign: text(values.get(Self::CALLSIGN)),
        }
    }

    fn into_track(self, key: String, source: TrackSource) -> Track {
        let mut track = Track::new(key, source, baseline_classification(source));
        track.hex = self.hex;
        track.lat = self.lat;
        track.lon = self.lon;
        track.track_angle = self.track;
        track.altitude_baro = self.altitude;
        track.ground_speed = self.ground_speed;
        track.model = self.model;
        track.registration = self.registration;
        track.category = self.category;
        track.callsign = self.callsign;
        track
    }
}

pub(super) fn parse(raw: &str, source: TrackSource, policy: &dyn ClassificationPolicy) -> Vec<Track> {
    let rows: Map<String, Value> = match serde_json::from_str(strip_guard(raw)) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::debug!(%source, error = %e, "Unparseable point-array payload");
            return Vec::new();
        }
    };

    rows.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Array(values) => Some(PointRow::from_values(&values).into_track(key, source)),
            _ => None,
        })
        .map(|track| finish(track, policy))
        .collect()
}
