//! Directional matching of a bus against a `from`/`to` search and selection
//! of the matching journey list.

use bus_directory_bus_models::{BusRecord, Journey, route_label};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::normalize::normalize_location;

/// Which way a bus runs relative to the searched trip.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// The bus's `from → to` is the searched trip.
    Forward,
    /// The bus's `to → from` is the searched trip.
    Return,
}

/// Symmetric substring containment on normalized names.
///
/// Partial names match in either direction ("colo" ~ "colombo"), which also
/// means an empty term matches everything.
fn loosely_equal(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// A searched trip with its endpoints normalized once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery {
    from: String,
    to: String,
    normalized_from: String,
    normalized_to: String,
}

impl RouteQuery {
    /// Creates a query for travelling from `from` to `to`.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            normalized_from: normalize_location(&from),
            normalized_to: normalize_location(&to),
            from,
            to,
        }
    }

    /// Origin as typed.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.from
    }

    /// Destination as typed.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.to
    }

    /// The searched trip as typed, `"{from} → {to}"`.
    #[must_use]
    pub fn label(&self) -> String {
        route_label(&self.from, &self.to)
    }

    /// Decides whether a bus running `bus_from → bus_to` serves this trip.
    ///
    /// Forward is checked first and wins when both directions match.
    #[must_use]
    pub fn match_endpoints(&self, bus_from: &str, bus_to: &str) -> Option<Direction> {
        let bus_from = normalize_location(bus_from);
        let bus_to = normalize_location(bus_to);

        if loosely_equal(&bus_from, &self.normalized_from)
            && loosely_equal(&bus_to, &self.normalized_to)
        {
            Some(Direction::Forward)
        } else if loosely_equal(&bus_from, &self.normalized_to)
            && loosely_equal(&bus_to, &self.normalized_from)
        {
            Some(Direction::Return)
        } else {
            None
        }
    }

    /// Matches a bus and selects its journeys for this trip.
    ///
    /// Returns `None` when the bus doesn't serve the trip in either
    /// direction.
    #[must_use]
    pub fn match_bus<'a>(&self, bus: &'a BusRecord) -> Option<JourneySelection<'a>> {
        let direction = self.match_endpoints(&bus.from, &bus.to)?;
        Some(select_journeys(bus, direction))
    }
}

/// Matches a bus's endpoints against a searched trip.
#[must_use]
pub fn match_direction(
    bus_from: &str,
    bus_to: &str,
    search_from: &str,
    search_to: &str,
) -> Option<Direction> {
    RouteQuery::new(search_from, search_to).match_endpoints(bus_from, bus_to)
}

/// The journeys of a bus that apply to a searched direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneySelection<'a> {
    /// Matched direction.
    pub direction: Direction,
    /// Departures in that direction.
    pub relevant_journeys: &'a [Journey],
    /// Display label oriented to the direction of travel.
    pub route_label: String,
}

impl JourneySelection<'_> {
    /// Number of departures in the matched direction.
    #[must_use]
    pub fn daily_departures(&self) -> u32 {
        u32::try_from(self.relevant_journeys.len()).unwrap_or(u32::MAX)
    }
}

/// Picks the forward or return journeys of `bus` and orients its label.
#[must_use]
pub fn select_journeys(bus: &BusRecord, direction: Direction) -> JourneySelection<'_> {
    match direction {
        Direction::Forward => JourneySelection {
            direction,
            relevant_journeys: &bus.journeys,
            route_label: route_label(&bus.from, &bus.to),
        },
        Direction::Return => JourneySelection {
            direction,
            relevant_journeys: bus.return_journeys(),
            route_label: route_label(&bus.to, &bus.from),
        },
    }
}
