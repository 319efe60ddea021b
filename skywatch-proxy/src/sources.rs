//! Upstream source registry
//!
//! Everything that differs per upstream lives here: wire name, schema,
//! error code, endpoint, cache key and extra request headers.

use serde::Serialize;
use skywatch_common::config::SourcesConfig;
use skywatch_common::{BoundingBox, Error, Result, TrackSource};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::parsers::FeedSchema;
use crate::upstream::FetchRequest;

/// Enabled upstream feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Fr24,
    #[serde(rename = "adsb")]
    AdsbMil,
    AdsbLadd,
    #[serde(rename = "opensky")]
    OpenSky,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::Fr24,
        SourceId::AdsbMil,
        SourceId::AdsbLadd,
        SourceId::OpenSky,
    ];

    /// Sources merged by `/api/aggregate` when none are requested
    pub const DEFAULT_AGGREGATE: [SourceId; 3] =
        [SourceId::Fr24, SourceId::AdsbMil, SourceId::OpenSky];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Fr24 => "fr24",
            SourceId::AdsbMil => "adsb",
            SourceId::AdsbLadd => "adsb_ladd",
            SourceId::OpenSky => "opensky",
        }
    }

    pub fn track_source(&self) -> TrackSource {
        match self {
            SourceId::Fr24 => TrackSource::Fr24,
            SourceId::AdsbMil => TrackSource::Adsb,
            SourceId::AdsbLadd => TrackSource::AdsbLadd,
            SourceId::OpenSky => TrackSource::OpenSky,
        }
    }

    pub fn schema(&self) -> FeedSchema {
        match self {
            SourceId::Fr24 => FeedSchema::PointArray,
            SourceId::AdsbMil | SourceId::AdsbLadd => FeedSchema::AircraftList,
            SourceId::OpenSky => FeedSchema::StateVectors,
        }
    }

    /// Error code reported when this source is queried directly and fails
    pub fn error_code(&self) -> &'static str {
        match self {
            SourceId::Fr24 => "fr24_failed",
            SourceId::AdsbMil => "adsb_failed",
            SourceId::AdsbLadd => "adsb_ladd_failed",
            SourceId::OpenSky => "opensky_failed",
        }
    }

    /// Upstream area query for `bbox` in this source's own ordering
    pub fn area_query(&self, bbox: &BoundingBox) -> Option<String> {
        match self {
            SourceId::Fr24 => Some(bbox.to_fr24_bounds()),
            SourceId::OpenSky => Some(bbox.to_opensky_query()),
            SourceId::AdsbMil | SourceId::AdsbLadd => None,
        }
    }

    /// Cache key: source name plus the exact upstream query
    pub fn cache_key(&self, query: Option<&str>) -> String {
        format!("{}:{}", self.as_str(), query.unwrap_or("all"))
    }

    fn base_url<'a>(&self, urls: &'a SourcesConfig) -> &'a str {
        match self {
            SourceId::Fr24 => &urls.fr24_url,
            SourceId::AdsbMil => &urls.adsb_mil_url,
            SourceId::AdsbLadd => &urls.adsb_ladd_url,
            SourceId::OpenSky => &urls.opensky_url,
        }
    }

    /// Upstream query parameter carrying the area, if the source takes one
    fn query_param(&self) -> Option<&'static str> {
        match self {
            SourceId::Fr24 => Some("bounds"),
            SourceId::OpenSky => Some("bbox"),
            SourceId::AdsbMil | SourceId::AdsbLadd => None,
        }
    }

    /// Outbound request for this source, with `query` passed through verbatim
    pub fn request(
        &self,
        urls: &SourcesConfig,
        query: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchRequest> {
        let base = self.base_url(urls);
        let url = match (query, self.query_param()) {
            (Some(query), Some(param)) => reqwest::Url::parse_with_params(base, &[(param, query)])
                .map(String::from)
                .map_err(|e| Error::Config(format!("invalid {} url {:?}: {}", self, base, e)))?,
            _ => base.to_string(),
        };

        let request = FetchRequest::new(url, timeout);
        Ok(match self {
            // Same-site-looking request or the feed refuses to answer
            SourceId::Fr24 => request
                .with_header("Origin", "https://www.flightradar24.com")
                .with_header("Referer", "https://www.flightradar24.com/"),
            _ => request,
        })
    }

    /// Parse a comma-separated source list, collapsing duplicates
    pub fn parse_list(list: &str) -> Result<Vec<SourceId>> {
        let mut sources = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let source: SourceId = name.parse()?;
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            return Err(Error::InvalidInput("empty source list".to_string()));
        }
        Ok(sources)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fr24" => Ok(SourceId::Fr24),
            "adsb" | "adsb_mil" => Ok(SourceId::AdsbMil),
            "adsb_ladd" | "ladd" => Ok(SourceId::AdsbLadd),
            "opensky" => Ok(SourceId::OpenSky),
            other => Err(Error::InvalidInput(format!("unknown source: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> SourcesConfig {
        SourcesConfig {
            fr24_url: "http://fr24.test/feed.js".to_string(),
            adsb_mil_url: "http://adsb.test/v2/mil".to_string(),
            adsb_ladd_url: "http://adsb.test/v2/ladd".to_string(),
            opensky_url: "http://opensky.test/api/states/all".to_string(),
        }
    }

    #[test]
    fn test_names_round_trip() {
        for source in SourceId::ALL {
            assert_eq!(source.as_str().parse::<SourceId>().unwrap(), source);
            assert_eq!(source.track_source().as_str(), source.as_str());
        }
        assert!("radar".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            SourceId::parse_list("opensky, fr24,opensky").unwrap(),
            vec![SourceId::OpenSky, SourceId::Fr24]
        );
        assert!(SourceId::parse_list("").is_err());
        assert!(SourceId::parse_list("fr24,nope").is_err());
    }

    #[test]
    fn test_cache_keys_follow_upstream_query() {
        let bbox = BoundingBox::new(35.0, 25.0, 65.0, 40.0);

        assert_eq!(SourceId::AdsbMil.cache_key(None), "adsb:all");
        assert_eq!(
            SourceId::OpenSky.cache_key(SourceId::OpenSky.area_query(&bbox).as_deref()),
            "opensky:35,25,65,40"
        );
        assert_eq!(
            SourceId::Fr24.cache_key(SourceId::Fr24.area_query(&bbox).as_deref()),
            "fr24:25,35,40,65"
        );
        assert_eq!(SourceId::AdsbMil.area_query(&bbox), None);
    }

    #[test]
    fn test_requests() {
        let timeout = Duration::from_secs(8);

        let opensky = SourceId::OpenSky
            .request(&urls(), Some("35,25,65,40"), timeout)
            .unwrap();
        assert_eq!(opensky.url, "http://opensky.test/api/states/all?bbox=35%2C25%2C65%2C40");
        assert!(opensky.headers.is_empty());

        let fr24 = SourceId::Fr24.request(&urls(), None, timeout).unwrap();
        assert_eq!(fr24.url, "http://fr24.test/feed.js");
        assert!(fr24.headers.iter().any(|(name, _)| name == "Origin"));

        let ladd = SourceId::AdsbLadd
            .request(&urls(), Some("ignored"), timeout)
            .unwrap();
        assert_eq!(ladd.url, "http://adsb.test/v2/ladd");
        assert_eq!(ladd.timeout, timeout);
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let mut bad = urls();
        bad.opensky_url = "not a url".to_string();

        let result = SourceId::OpenSky.request(&bad, Some("1,2,3,4"), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SourceId::Fr24.error_code(), "fr24_failed");
        assert_eq!(SourceId::AdsbMil.error_code(), "adsb_failed");
        assert_eq!(SourceId::AdsbLadd.error_code(), "adsb_ladd_failed");
        assert_eq!(SourceId::OpenSky.error_code(), "opensky_failed");
    }
}
