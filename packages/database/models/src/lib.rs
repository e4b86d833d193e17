#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Repository query parameters and result types.
//!
//! These types describe what callers ask of a bus repository and what they
//! get back, independent of whether the store is `DynamoDB` or in memory.
//! API response shapes live in `bus_directory_server_models`.

use bus_directory_bus_models::{BusRecord, VoteType};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Upper bound on records returned by a full-table scan.
pub const SCAN_LIMIT: usize = 100;

/// Upper bound on records returned by a secondary-index lookup.
pub const INDEX_QUERY_LIMIT: usize = 50;

/// Default page size for paginated listing.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum page size for paginated listing.
pub const MAX_PAGE_SIZE: usize = 100;

/// Secondary indexes available for exact-match lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum BusIndex {
    /// Lookup by `companyName`.
    #[strum(serialize = "CompanyIndex")]
    Company,
    /// Lookup by `route`.
    #[strum(serialize = "RouteIndex")]
    Route,
    /// Lookup by `busType`.
    #[strum(serialize = "TypeIndex")]
    Type,
}

impl BusIndex {
    /// Name of the record attribute this index is keyed on.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::Company => "companyName",
            Self::Route => "route",
            Self::Type => "busType",
        }
    }

    /// Whether `bus` has `value` in this index's key attribute.
    #[must_use]
    pub fn matches(self, bus: &BusRecord, value: &str) -> bool {
        match self {
            Self::Company => bus.company_name == value,
            Self::Route => bus.route == value,
            Self::Type => bus.bus_type.as_ref() == value,
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    /// Records on this page, in store order.
    pub buses: Vec<BusRecord>,
    /// License number to resume after, or `None` at the end.
    pub last_key: Option<String>,
}

/// Effect of casting a vote, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    /// Change applied to `verifyCount` (before flooring).
    pub verify_delta: i64,
    /// Change applied to `reportCount` (before flooring).
    pub report_delta: i64,
    /// `verifyCount` after the vote.
    pub verify_count: u32,
    /// `reportCount` after the vote.
    pub report_count: u32,
    /// The caller's vote after the cast.
    pub user_vote: Option<VoteType>,
}
