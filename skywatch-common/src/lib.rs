//! # Skywatch Common Library
//!
//! Shared code for the skywatch services:
//! - Canonical flight track record and provenance tags
//! - Geographic bounding box filtering
//! - TOML configuration schema and loading
//! - Common error type

pub mod config;
pub mod error;
pub mod geo;
pub mod track;

pub use error::{Error, Result};
pub use geo::BoundingBox;
pub use track::{Classification, Track, TrackSource};
