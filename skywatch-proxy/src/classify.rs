//! Track classification policy
//!
//! Upstreams do not say whether an aircraft is military or unmanned. Every
//! track starts from its source's baseline (the military feed is military,
//! the point-array feed is civilian, everything else is a generic aircraft)
//! and a [`ClassificationPolicy`] may refine that.
//!
//! [`HeuristicPolicy`] is a best-effort guess built from callsign patterns
//! and OpenSky emitter-category buckets that have been observed in practice.
//! It is not verified against any authoritative registry and should be
//! treated as a display hint only.

use once_cell::sync::Lazy;
use regex::Regex;
use skywatch_common::{Classification, Track, TrackSource};

/// Source default before any policy is applied
pub fn baseline_classification(source: TrackSource) -> Classification {
    match source {
        TrackSource::Fr24 => Classification::Civilian,
        TrackSource::Adsb => Classification::Military,
        TrackSource::AdsbLadd | TrackSource::OpenSky => Classification::Aircraft,
    }
}

/// Replaceable classification rule set
pub trait ClassificationPolicy: Send + Sync {
    /// Final classification for `track`, whose `classification` field holds
    /// the source baseline
    fn classify(&self, track: &Track) -> Classification;
}

/// Keep the source baseline unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselinePolicy;

impl ClassificationPolicy for BaselinePolicy {
    fn classify(&self, track: &Track) -> Classification {
        track.classification
    }
}

/// Callsign prefixes seen on military transport/tanker/patrol flights
static MILITARY_CALLSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:RCH|REACH|QID|LAGR|SHELL|NOBLE|PAT|KNIGHT|KING|NATO|HOMER|SNAKE|BALE|ETHYL|TEXACO|MAMBO|GNAW|AMW\d|AE\d)(?:\d|\s|$)",
    )
    .expect("military callsign pattern is valid")
});

static UAV_CALLSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"UAV|DRONE|RQ-|MQ-|U-\d").expect("UAV callsign pattern is valid")
});

/// OpenSky category bucket for light/ultralight aircraft, where UAVs land
const OPENSKY_UAV_CATEGORY: u8 = 4;
/// OpenSky category buckets observed on military traffic
const OPENSKY_MILITARY_CATEGORIES: [u8; 2] = [6, 7];

/// Callsign and category heuristics (unverified; see module docs)
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicPolicy;

impl HeuristicPolicy {
    fn opensky_category(track: &Track) -> Option<u8> {
        if track.source != TrackSource::OpenSky {
            return None;
        }
        track.category.as_deref()?.trim().parse().ok()
    }
}

impl ClassificationPolicy for HeuristicPolicy {
    fn classify(&self, track: &Track) -> Classification {
        let callsign = track
            .callsign
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_default();
        let category = Self::opensky_category(track);

        if UAV_CALLSIGN.is_match(&callsign) || category == Some(OPENSKY_UAV_CATEGORY) {
            return Classification::Uav;
        }

        let military_category = category.is_some_and(|c| OPENSKY_MILITARY_CATEGORIES.contains(&c));
        if MILITARY_CALLSIGN.is_match(&callsign) || military_category {
            return Classification::Military;
        }

        track.classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(source: TrackSource, callsign: Option<&str>, category: Option<&str>) -> Track {
        let mut track = Track::new("t", source, baseline_classification(source));
        track.callsign = callsign.map(str::to_string);
        track.category = category.map(str::to_string);
        track
    }

    #[test]
    fn test_baselines() {
        assert_eq!(baseline_classification(TrackSource::Fr24), Classification::Civilian);
        assert_eq!(baseline_classification(TrackSource::Adsb), Classification::Military);
        assert_eq!(baseline_classification(TrackSource::OpenSky), Classification::Aircraft);
        assert_eq!(baseline_classification(TrackSource::AdsbLadd), Classification::Aircraft);
    }

    #[test]
    fn test_military_callsign_prefix() {
        let policy = HeuristicPolicy;

        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, Some("RCH221"), None)),
            Classification::Military
        );
        assert_eq!(
            policy.classify(&track(TrackSource::Fr24, Some("nato01"), None)),
            Classification::Military
        );
        // Word continues past the prefix: not a match
        assert_eq!(
            policy.classify(&track(TrackSource::Fr24, Some("KINGAIR1"), None)),
            Classification::Civilian
        );
        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, Some("UAE123"), None)),
            Classification::Aircraft
        );
    }

    #[test]
    fn test_uav_callsign_wins_over_military() {
        let policy = HeuristicPolicy;

        assert_eq!(
            policy.classify(&track(TrackSource::Adsb, Some("RQ-4"), None)),
            Classification::Uav
        );
        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, Some("RCH1"), Some("4"))),
            Classification::Uav
        );
    }

    #[test]
    fn test_category_buckets_only_apply_to_opensky() {
        let policy = HeuristicPolicy;

        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, None, Some("6"))),
            Classification::Military
        );
        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, None, Some("7"))),
            Classification::Military
        );
        assert_eq!(
            policy.classify(&track(TrackSource::OpenSky, None, Some("4"))),
            Classification::Uav
        );
        assert_eq!(
            policy.classify(&track(TrackSource::Fr24, None, Some("4"))),
            Classification::Civilian
        );
    }

    #[test]
    fn test_baseline_policy_keeps_source_default() {
        let t = track(TrackSource::OpenSky, Some("RQ-4"), Some("6"));
        assert_eq!(BaselinePolicy.classify(&t), Classification::Aircraft);
    }
}
