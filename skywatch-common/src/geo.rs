//! Geographic bounding box filtering
//!
//! The box is taken literally: `west <= lon <= east` and
//! `south <= lat <= north`, all edges inclusive. A box crossing the
//! antimeridian (`west > east`) is not rewritten and matches nothing.

use crate::{Error, Result, Track};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Inclusive containment test; tracks with unknown position never match
    pub fn contains(&self, track: &Track) -> bool {
        match track.position() {
            Some((lat, lon)) => {
                lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
            }
            None => false,
        }
    }

    /// State-vector upstream query order: `west,south,east,north`
    pub fn to_opensky_query(&self) -> String {
        self.to_string()
    }

    /// Point-array upstream bounds order: `south,west,north,east`
    pub fn to_fr24_bounds(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl FromStr for BoundingBox {
    type Err = Error;

    /// Parse `west,south,east,north`
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| Error::InvalidInput(format!("Invalid bbox component: {:?}", part)))
            })
            .collect::<Result<Vec<f64>>>()?;

        match parts.as_slice() {
            [west, south, east, north] => Ok(Self::new(*west, *south, *east, *north)),
            _ => Err(Error::InvalidInput(format!(
                "bbox expects 4 values (west,south,east,north), got {}",
                parts.len()
            ))),
        }
    }
}
