#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Directional route matching for bus search.
//!
//! Given a searched trip (`from` → `to`), decides whether a bus serves it in
//! its forward direction, its return direction, or not at all, and picks the
//! departures that apply. Place names are compared after
//! [`normalize::normalize_location`] and matched by symmetric substring
//! containment, so partial names like `"colo"` find `"Colombo Fort"`.

pub mod direction;
pub mod normalize;
pub mod query;

pub use direction::{
    Direction, JourneySelection, RouteQuery, match_direction, select_journeys,
};
pub use normalize::normalize_location;
pub use query::parse_trip;
