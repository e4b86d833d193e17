#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the bus directory server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the stored record types so the API can add computed fields
//! (`verified`, `dailyDepartures`, `code`, ...) without touching storage.

use bus_directory_bus_models::{BusRecord, VoteType};
use bus_directory_search::{SearchFilters, SearchHit, SearchParams, SearchResults};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Headway reported by the legacy route listing.
pub const DEFAULT_HEADWAY_MINS: u32 = 15;

/// Verification signal at which the legacy route listing marks a route
/// popular.
pub const POPULAR_THRESHOLD: u32 = 2;

/// A bus as returned by the API: every stored attribute plus computed
/// display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApiBus(Map<String, Value>);

impl ApiBus {
    /// Builds the API shape of `bus`, reporting `daily_departures`.
    #[must_use]
    pub fn new(bus: &BusRecord, daily_departures: u32) -> Self {
        let mut map = match serde_json::to_value(bus) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        map.insert(
            "id".into(),
            bus.id.clone().unwrap_or_else(|| bus.license_no.clone()).into(),
        );
        map.insert("dailyDepartures".into(), daily_departures.into());
        map.insert("verified".into(), bus.is_verified().into());
        map.insert("code".into(), bus.code().into());
        map.insert("name".into(), bus.display_name().into());
        map.insert("type".into(), bus.bus_type.to_string().into());

        Self(map)
    }

    /// Builds a search result, adding direction fields for directional
    /// matches.
    #[must_use]
    pub fn from_hit(hit: &SearchHit, search_direction: Option<&str>) -> Self {
        let mut api = Self::new(&hit.bus, hit.daily_departures);

        if let Some(route_match) = &hit.route_match {
            api.0.insert(
                "direction".into(),
                serde_json::to_value(route_match.direction).unwrap_or(Value::Null),
            );
            api.0.insert(
                "relevantJourneys".into(),
                serde_json::to_value(&route_match.relevant_journeys).unwrap_or(Value::Null),
            );
            api.0
                .insert("name".into(), route_match.route_label.clone().into());
            if let Some(direction) = search_direction {
                api.0.insert("searchDirection".into(), direction.into());
            }
        }

        api
    }

    /// Looks up a field of the response.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<&BusRecord> for ApiBus {
    fn from(bus: &BusRecord) -> Self {
        Self::new(bus, bus.total_daily_departures())
    }
}

/// `GET /buses` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBusList {
    /// Buses on this page.
    pub buses: Vec<ApiBus>,
    /// Number of buses on this page.
    pub count: usize,
    /// License number to pass as `lastKey` for the next page.
    pub last_key: Option<String>,
}

/// Body of create/update responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBusMessage {
    /// Human-readable outcome.
    pub message: String,
    /// The bus after the change.
    pub bus: ApiBus,
}

/// `GET /search` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchResponse {
    /// Matching buses.
    pub buses: Vec<ApiBus>,
    /// Number of buses returned.
    pub count: usize,
    /// Number of matches before capping.
    pub total_found: usize,
    /// The text query as given.
    pub query: String,
    /// Whether the search ran directionally.
    pub directional: bool,
    /// The trip searched, for directional searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_direction: Option<String>,
    /// Filters applied.
    pub filters: SearchFilters,
}

impl ApiSearchResponse {
    /// Shapes search results for the API.
    #[must_use]
    pub fn new(results: &SearchResults, params: &SearchParams) -> Self {
        let search_direction = results.search_direction.as_deref();
        let buses: Vec<ApiBus> = results
            .hits
            .iter()
            .map(|hit| ApiBus::from_hit(hit, search_direction))
            .collect();

        Self {
            count: buses.len(),
            buses,
            total_found: results.total_found,
            query: params.query().unwrap_or_default().to_string(),
            directional: search_direction.is_some(),
            search_direction: results.search_direction.clone(),
            filters: params.filters(),
        }
    }
}

/// `GET /buses/{licenseNo}/my-vote` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMyVote {
    /// Whether the caller has a vote on this bus.
    pub has_voted: bool,
    /// The caller's vote, if any.
    pub vote_type: Option<VoteType>,
}

impl From<Option<VoteType>> for ApiMyVote {
    fn from(vote_type: Option<VoteType>) -> Self {
        Self {
            has_voted: vote_type.is_some(),
            vote_type,
        }
    }
}

/// One entry of the legacy route listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    /// Record id, or the license number.
    pub id: String,
    /// Bus number.
    pub code: String,
    /// Route label.
    pub name: String,
    /// Origin.
    pub from: String,
    /// Destination.
    pub to: String,
    /// Bus type.
    #[serde(rename = "type")]
    pub bus_type: String,
    /// Whether the bus is verified.
    pub verified: bool,
    /// Whether the verification signal reaches [`POPULAR_THRESHOLD`].
    pub popular: bool,
    /// Nominal headway.
    pub headway_mins: u32,
    /// Departures per day across both directions.
    pub daily_departures: u32,
}

impl From<&BusRecord> for ApiRoute {
    fn from(bus: &BusRecord) -> Self {
        Self {
            id: bus.id.clone().unwrap_or_else(|| bus.license_no.clone()),
            code: bus.code().to_string(),
            name: bus.display_name(),
            from: bus.from.clone(),
            to: bus.to.clone(),
            bus_type: bus.bus_type.to_string(),
            verified: bus.is_verified(),
            popular: bus.verification_signal() >= POPULAR_THRESHOLD,
            headway_mins: DEFAULT_HEADWAY_MINS,
            daily_departures: bus.total_daily_departures(),
        }
    }
}

/// `GET /routes` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoutes {
    /// Routes in store order.
    pub routes: Vec<ApiRoute>,
    /// Number of routes.
    pub count: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Active store backend.
    pub store: String,
}

/// The authenticated caller, as echoed by `GET /protected/ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    /// Caller email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Subject claim.
    pub sub: Option<String>,
}

/// `GET /protected/ping` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPing {
    /// Fixed confirmation message.
    pub message: String,
    /// The caller.
    pub user: ApiUser,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// `POST /uploads/avatar-url` request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    /// Original file name.
    pub file_name: Option<String>,
    /// MIME type the client will upload with.
    pub content_type: Option<String>,
    /// `"bus_photo"` for bus photos; anything else is an avatar.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Query parameters for `GET /buses`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryParams {
    /// Page size.
    pub limit: Option<usize>,
    /// License number to resume after.
    #[serde(alias = "cursor")]
    pub last_key: Option<String>,
}

/// Query parameters for `GET /search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQueryParams {
    /// Free-text query.
    pub q: Option<String>,
    /// Bus type filter.
    #[serde(rename = "type")]
    pub bus_type: Option<String>,
    /// `"true"` to return only verified buses.
    pub verified: Option<String>,
    /// `"true"` for a directional search.
    pub directional: Option<String>,
    /// Trip origin.
    pub from: Option<String>,
    /// Trip destination.
    pub to: Option<String>,
    /// Exact company name.
    pub company: Option<String>,
    /// Exact route label.
    pub route: Option<String>,
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
}

impl From<SearchQueryParams> for SearchParams {
    fn from(params: SearchQueryParams) -> Self {
        Self {
            verified_only: is_true(params.verified.as_deref()),
            directional: is_true(params.directional.as_deref()),
            query: params.q,
            bus_type: params.bus_type,
            company_name: params.company,
            route: params.route,
            from: params.from,
            to: params.to,
        }
    }
}
