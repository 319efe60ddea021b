//! State-vector feed (OpenSky Network)
//!
//! Payload: `{ "time": ..., "states": [[icao24, callsign, ...], ...] }`.
//! Units are the upstream's: metres for altitude, m/s for velocity and
//! vertical rate.

use serde::Deserialize;
use serde_json::Value;
use skywatch_common::{Track, TrackSource};

use super::{finish, generated_id, number, text};
use crate::classify::{baseline_classification, ClassificationPolicy};

#[derive(Debug, Deserialize)]
struct StatesEnvelope {
    #[serde(default)]
    states: Option<Vec<Value>>,
}

/// One state row, decoded by the published field positions
#[derive(Debug, Default, PartialEq)]
struct StateVector {
    icao24: Option<String>,
    callsign: Option<String>,
    squawk: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    baro_altitude: Option<f64>,
    velocity: Option<f64>,
    true_track: Option<f64>,
    vertical_rate: Option<f64>,
    category: Option<String>,
}

impl StateVector {
    const ICAO24: usize = 0;
    const CALLSIGN: usize = 1;
    /// Squawk as the proxy contract places it; numeric values here are the
    /// upstream's last-contact timestamp and are ignored
    const SQUAWK: usize = 4;
    const LONGITUDE: usize = 5;
    const LATITUDE: usize = 6;
    const BARO_ALTITUDE: usize = 7;
    const VELOCITY: usize = 9;
    const TRUE_TRACK: usize = 10;
    const VERTICAL_RATE: usize = 11;
    /// Squawk in the full upstream row layout
    const SQUAWK_FULL_ROW: usize = 14;
    const CATEGORY: usize = 17;

    fn from_row(row: &[Value]) -> Self {
        let squawk = match row.get(Self::SQUAWK) {
            Some(Value::String(_)) => text(row.get(Self::SQUAWK)),
            _ => None,
        }
        .or_else(|| text(row.get(Self::SQUAWK_FULL_ROW)));

        Self {
            icao24: text(row.get(Self::ICAO24)),
            callsign: text(row.get(Self::CALLSIGN)),
            squawk,
            longitude: number(row.get(Self::LONGITUDE)),
            latitude: number(row.get(Self::LATITUDE)),
            baro_altitude: number(row.get(Self::BARO_ALTITUDE)),
            velocity: number(row.get(Self::VELOCITY)),
            true_track: number(row.get(Self::TRUE_TRACK)),
            vertical_rate: number(row.get(Self::VERTICAL_RATE)),
            category: text(row.get(Self::CATEGORY)),
        }
    }

    fn into_track(self, source: TrackSource) -> Track {
        let id = self
            .icao24
            .clone()
            .unwrap_or_else(|| generated_id(source));

        let mut track = Track::new(id, source, baseline_classification(source));
        track.hex = self.icao24;
        track.callsign = self.callsign;
        track.squawk = self.squawk;
        track.lon = self.longitude;
        track.lat = self.latitude;
        track.altitude_baro = self.baro_altitude;
        track.ground_speed = self.velocity;
        track.track_angle = self.true_track;
        track.vertical_rate = self.vertical_rate;
        track.category = self.category;
        track
    }
}

pub(super) fn parse(raw: &str, source: TrackSource, policy: &dyn ClassificationPolicy) -> Vec<Track> {
    let envelope: StatesEnvelope = match serde_json::from_str(raw.trim()) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%source, error = %e, "Unparseable state-vector payload");
            return Vec::new();
        }
    };

    envelope
        .states
        .unwrap_or_default()
        .into_iter()
        .filter_map(|row| match row {
            Value::Array(values) => Some(StateVector::from_row(&values).into_track(source)),
            _ => None,
        })
        .map(|track| finish(track, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::HeuristicPolicy;
    use skywatch_common::Classification;

    fn parse_opensky(raw: &str) -> Vec<Track> {
        parse(raw, TrackSource::OpenSky, &HeuristicPolicy)
    }

    #[test]
    fn test_proxy_contract_row() {
        let tracks = parse_opensky(
            r#"{"states":[["abc123","UAE123 ",null,null,"7000",10,20,9000,false,240,310,0]]}"#,
        );

        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.id, "abc123");
        assert_eq!(track.hex.as_deref(), Some("abc123"));
        assert_eq!(track.callsign.as_deref(), Some("UAE123"));
        assert_eq!(track.lon, Some(10.0));
        assert_eq!(track.lat, Some(20.0));
        assert_eq!(track.altitude_baro, Some(9000.0));
        assert_eq!(track.ground_speed, Some(240.0));
        assert_eq!(track.track_angle, Some(310.0));
        assert_eq!(track.vertical_rate, Some(0.0));
        assert_eq!(track.squawk.as_deref(), Some("7000"));
        assert_eq!(track.source, TrackSource::OpenSky);
        assert_eq!(track.classification, Classification::Aircraft);
    }

    #[test]
    fn test_full_upstream_row() {
        let raw = r#"{"time":1700000000,"states":[
            ["4b1815","SWR8   ","Switzerland",1700000000,1700000001,8.55,47.45,11277.6,false,231.5,93.2,-0.33,null,11521.4,"1000",false,0,6]
        ]}"#;

        let track = &parse_opensky(raw)[0];

        assert_eq!(track.callsign.as_deref(), Some("SWR8"));
        assert_eq!(track.squawk.as_deref(), Some("1000"), "numeric index 4 is a timestamp");
        assert_eq!(track.category.as_deref(), Some("6"));
        assert_eq!(track.classification, Classification::Military);
    }

    #[test]
    fn test_blank_callsign_and_missing_position() {
        let track = &parse_opensky(r#"{"states":[["abc","        ",null,null,null,null,null]]}"#)[0];

        assert_eq!(track.callsign, None);
        assert_eq!(track.position(), None);
    }

    #[test]
    fn test_non_array_rows_are_skipped() {
        let tracks = parse_opensky(r#"{"states":[null,{"a":1},["a1"],"x",["a2",null]]}"#);

        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_null_states_is_empty() {
        assert!(parse_opensky(r#"{"time":1700000000,"states":null}"#).is_empty());
        assert!(parse_opensky(r#"{"time":1700000000}"#).is_empty());
    }
}
