//! Aircraft-list feed (adsb.lol / readsb style)
//!
//! Payload: a bare array of aircraft objects, or an object carrying the
//! array under `aircraft` or `ac`. Elements that are not objects, or whose
//! fields cannot be decoded, are skipped one by one.

use serde::Deserialize;
use serde_json::Value;
use skywatch_common::{Track, TrackSource};

use super::{finish, generated_id, lenient_f64, lenient_text};
use crate::classify::{baseline_classification, ClassificationPolicy};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AircraftPayload {
    List(Vec<Value>),
    Wrapped(AircraftEnvelope),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AircraftEnvelope {
    aircraft: Option<Vec<Value>>,
    ac: Option<Vec<Value>>,
}

impl AircraftPayload {
    fn into_elements(self) -> Vec<Value> {
        match self {
            AircraftPayload::List(elements) => elements,
            AircraftPayload::Wrapped(envelope) => envelope.aircraft.or(envelope.ac).unwrap_or_default(),
        }
    }
}

/// One aircraft object with its documented fallbacks
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AircraftRecord {
    #[serde(deserialize_with = "lenient_text")]
    hex: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    icao: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    flight: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    callsign: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    lon: Option<f64>,
    /// Barometric altitude in feet, or the string "ground"
    #[serde(deserialize_with = "lenient_f64")]
    alt_baro: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    alt_geom: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    gs: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    velocity: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    track: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    heading: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    baro_rate: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    geom_rate: Option<f64>,
    /// Type designator
    #[serde(deserialize_with = "lenient_text")]
    t: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_text")]
    kind: Option<String>,
    /// Registration
    #[serde(deserialize_with = "lenient_text")]
    r: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    category: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    squawk: Option<String>,
}

impl AircraftRecord {
    fn into_track(self, source: TrackSource) -> Track {
        let hex = self.hex.or(self.icao);
        let callsign = self.flight.or(self.callsign);
        let id = hex
            .clone()
            .or_else(|| callsign.clone())
            .or(self.id)
            .unwrap_or_else(|| generated_id(source));

        let mut track = Track::new(id, source, baseline_classification(source));
        track.hex = hex;
        track.lat = self.lat;
        track.lon = self.lon;
        track.track_angle = self.track.or(self.heading);
        track.altitude_baro = self.alt_baro.or(self.alt_geom);
        track.ground_speed = self.gs.or(self.velocity);
        track.vertical_rate = self.baro_rate.or(self.geom_rate);
        track.squawk = self.squawk;
        track.model = self.t.or(self.kind);
        track.registration = self.r;
        track.category = self.category;
        track.callsign = callsign;
        track
    }
}

pub(super) fn parse(raw: &str, source: TrackSource, policy: &dyn ClassificationPolicy) -> Vec<Track> {
    let payload: AircraftPayload = match serde_json::from_str(raw.trim()) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(%source, error = %e, "Unparseable aircraft-list payload");
            return Vec::new();
        }
    };

    payload
        .into_elements()
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|element| serde_json::from_value::<AircraftRecord>(element).ok())
        .map(|record| finish(record.into_track(source), policy))
        .collect()
}
