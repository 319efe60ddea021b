//! Source payload parsers
//!
//! One parser per upstream schema, each translating a raw payload into
//! canonical [`Track`]s. Parsers are total: malformed or unexpected input
//! yields an empty (or shorter) sequence, never an error. A bad payload
//! from one source must only cost that source's contribution.
//!
//! Shape assumptions live in one typed intermediate record per schema
//! (`PointRow`, `AircraftRecord`, `StateVector`).

mod aircraft_list;
mod point_array;
mod state_vector;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use skywatch_common::{Track, TrackSource};

use crate::classify::{ClassificationPolicy, HeuristicPolicy};

/// Anti-scraping preamble some point-array endpoints prepend
pub const ANTI_SCRAPE_GUARD: &str = "while(1);";

/// Wire schema of an upstream feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSchema {
    /// Object map of flight key → fixed-position array
    PointArray,
    /// Array of aircraft objects, bare or under a known key
    AircraftList,
    /// `{states: [[...]]}` fixed-position rows
    StateVectors,
}

impl FeedSchema {
    pub fn parse(
        &self,
        raw: &str,
        source: TrackSource,
        policy: &dyn ClassificationPolicy,
    ) -> Vec<Track> {
        let tracks = match self {
            FeedSchema::PointArray => point_array::parse(raw, source, policy),
            FeedSchema::AircraftList => aircraft_list::parse(raw, source, policy),
            FeedSchema::StateVectors => state_vector::parse(raw, source, policy),
        };
        tracing::trace!(?source, count = tracks.len(), "Parsed payload");
        tracks
    }
}

/// Point-array payload with the default heuristic policy
pub fn parse_point_array(raw: &str) -> Vec<Track> {
    FeedSchema::PointArray.parse(raw, TrackSource::Fr24, &HeuristicPolicy)
}

/// Aircraft-list payload from the military feed with the default heuristic policy
pub fn parse_aircraft_list(raw: &str) -> Vec<Track> {
    FeedSchema::AircraftList.parse(raw, TrackSource::Adsb, &HeuristicPolicy)
}

/// State-vector payload with the default heuristic policy
pub fn parse_state_vectors(raw: &str) -> Vec<Track> {
    FeedSchema::StateVectors.parse(raw, TrackSource::OpenSky, &HeuristicPolicy)
}

/// Remove the anti-scraping guard, if any, and surrounding whitespace
pub fn strip_guard(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    trimmed
        .strip_prefix(ANTI_SCRAPE_GUARD)
        .unwrap_or(trimmed)
        .trim()
}

/// Finalize a parsed track: apply the classification policy on top of the
/// source baseline already stored in it
fn finish(mut track: Track, policy: &dyn ClassificationPolicy) -> Track {
    track.classification = policy.classify(&track);
    track
}

/// Identifier for records that carry none
fn generated_id(source: TrackSource) -> String {
    format!("{}-{}", source, uuid::Uuid::new_v4().simple())
}

/// Finite number from a JSON number or numeric string
fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Trimmed non-empty text from a JSON string or number
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(number(value.as_ref()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(text(value.as_ref()))
}
