#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bus search.
//!
//! A search runs in two stages. Candidates are loaded from the repository,
//! preferring an exact secondary-index lookup (company, then route, then
//! bus type) and otherwise a bounded full scan. The candidates are then
//! filtered in one of two modes:
//!
//! - **Text**: case-insensitive substring match over the bus's searchable
//!   text, capped at [`TEXT_RESULT_LIMIT`] results.
//! - **Directional**: each bus is matched against a `from`/`to` trip in
//!   either direction and annotated with the journeys that run that way.
//!   Results are not capped.
//!
//! Results keep store order, so repeating a search against an unchanged
//! store gives identical output.

use bus_directory_bus_models::{BusRecord, Journey};
use bus_directory_database::{BusRepository, DbError};
use bus_directory_database_models::{BusIndex, SCAN_LIMIT};
use bus_directory_route_match::{Direction, RouteQuery, parse_trip};
use serde::Serialize;

/// Maximum number of results returned by a text search.
pub const TEXT_RESULT_LIMIT: usize = 50;

/// Filter value meaning "no filter" for company and bus type.
pub const ALL: &str = "all";

/// Errors that can occur during a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request was malformed.
    #[error("{message}")]
    BadRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The full-table scan failed.
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Search request parameters. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Free-text query.
    pub query: Option<String>,
    /// Bus type filter (`"all"` = none).
    pub bus_type: Option<String>,
    /// Only return verified buses.
    pub verified_only: bool,
    /// Exact company name (`"all"` = none).
    pub company_name: Option<String>,
    /// Exact route label.
    pub route: Option<String>,
    /// Match on `from`/`to` instead of text.
    pub directional: bool,
    /// Trip origin for directional search.
    pub from: Option<String>,
    /// Trip destination for directional search.
    pub to: Option<String>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn filter_value(value: Option<&str>) -> Option<&str> {
    present(value).filter(|v| *v != ALL)
}

impl SearchParams {
    /// Trimmed free-text query, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        present(self.query.as_deref())
    }

    /// Bus type filter, if one applies.
    #[must_use]
    pub fn bus_type(&self) -> Option<&str> {
        filter_value(self.bus_type.as_deref())
    }

    /// Company filter, if one applies.
    #[must_use]
    pub fn company_name(&self) -> Option<&str> {
        filter_value(self.company_name.as_deref())
    }

    /// Route filter, if any.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        present(self.route.as_deref())
    }

    /// The secondary-index lookup to load candidates with, if any.
    #[must_use]
    pub fn index_lookup(&self) -> Option<(BusIndex, &str)> {
        self.company_name()
            .map(|v| (BusIndex::Company, v))
            .or_else(|| self.route().map(|v| (BusIndex::Route, v)))
            .or_else(|| self.bus_type().map(|v| (BusIndex::Type, v)))
    }

    /// Decides between text and directional matching.
    ///
    /// An explicit directional request needs both endpoints. Otherwise a
    /// query shaped like `"<place> to <place>"` is also run as a trip.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::BadRequest`] for a directional request
    /// missing `from` or `to`.
    pub fn mode(&self) -> Result<SearchMode, SearchError> {
        if self.directional {
            let from = present(self.from.as_deref());
            let to = present(self.to.as_deref());
            return match (from, to) {
                (Some(from), Some(to)) => Ok(SearchMode::Directional(RouteQuery::new(from, to))),
                _ => Err(SearchError::BadRequest {
                    message: "Both 'from' and 'to' are required for directional search"
                        .to_string(),
                }),
            };
        }

        Ok(match self.query().and_then(parse_trip) {
            Some(trip) => SearchMode::Directional(trip),
            None => SearchMode::Text(self.query().map(str::to_lowercase)),
        })
    }

    /// Echo of the filters applied, for the response body.
    #[must_use]
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            bus_type: self.bus_type.clone(),
            verified_only: self.verified_only,
            company: self.company_name.clone(),
            route: self.route.clone(),
        }
    }

    fn keep(&self, bus: &BusRecord) -> bool {
        self.bus_type()
            .is_none_or(|bus_type| bus.bus_type.as_ref() == bus_type)
            && (!self.verified_only || bus.is_verified())
    }
}

/// How candidates are filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    /// Lowercased substring match; `None` keeps every candidate.
    Text(Option<String>),
    /// Trip match in either direction.
    Directional(RouteQuery),
}

/// Filters echoed back with results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Requested bus type.
    #[serde(rename = "type")]
    pub bus_type: Option<String>,
    /// Whether only verified buses were requested.
    pub verified_only: bool,
    /// Requested company.
    pub company: Option<String>,
    /// Requested route.
    pub route: Option<String>,
}

/// How a bus matched a directional search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Which way the bus runs for this trip.
    pub direction: Direction,
    /// Departures in that direction.
    pub relevant_journeys: Vec<Journey>,
    /// Label oriented to the direction of travel.
    pub route_label: String,
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The stored record.
    pub bus: BusRecord,
    /// Departures per day: both directions for text results, the matched
    /// direction for directional results.
    pub daily_departures: u32,
    /// Set for directional results.
    pub route_match: Option<RouteMatch>,
}

impl SearchHit {
    fn text(bus: BusRecord) -> Self {
        Self {
            daily_departures: bus.total_daily_departures(),
            bus,
            route_match: None,
        }
    }

    /// Display name: the oriented label for directional results, otherwise
    /// the stored route.
    #[must_use]
    pub fn name(&self) -> String {
        self.route_match
            .as_ref()
            .map_or_else(|| self.bus.display_name(), |m| m.route_label.clone())
    }
}

/// Search output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Matching buses in store order.
    pub hits: Vec<SearchHit>,
    /// Number of matches before capping.
    pub total_found: usize,
    /// The trip searched, `"{from} → {to}"` as typed, for directional
    /// searches.
    pub search_direction: Option<String>,
}

/// Loads candidate buses for `params`.
///
/// An index lookup that fails is logged and replaced by the bounded full
/// scan.
///
/// # Errors
///
/// Returns [`SearchError::Store`] if the full scan fails.
pub async fn load_candidates(
    repo: &dyn BusRepository,
    params: &SearchParams,
) -> Result<Vec<BusRecord>, SearchError> {
    if let Some((index, value)) = params.index_lookup() {
        match repo.query_by_index(index, value).await {
            Ok(buses) => return Ok(buses),
            Err(e) => {
                log::warn!("{index} lookup for {value:?} failed, falling back to scan: {e}");
            }
        }
    }

    repo.scan_all(SCAN_LIMIT).await.map_err(|e| {
        log::error!("Bus scan failed: {e}");
        SearchError::Store(e)
    })
}

/// Runs a search.
///
/// # Errors
///
/// Returns [`SearchError::BadRequest`] for a directional search without
/// both endpoints, and [`SearchError::Store`] if candidates can't be
/// loaded.
pub async fn search(
    repo: &dyn BusRepository,
    params: &SearchParams,
) -> Result<SearchResults, SearchError> {
    let mode = params.mode()?;
    let candidates = load_candidates(repo, params).await?;

    let results = match mode {
        SearchMode::Text(query) => text_search(candidates, query.as_deref(), params),
        SearchMode::Directional(trip) => directional_search(candidates, &trip, params),
    };

    log::debug!(
        "Search returned {} of {} matches",
        results.hits.len(),
        results.total_found
    );

    Ok(results)
}

fn text_search(
    candidates: Vec<BusRecord>,
    query: Option<&str>,
    params: &SearchParams,
) -> SearchResults {
    let matches: Vec<BusRecord> = candidates
        .into_iter()
        .filter(|bus| query.is_none_or(|q| bus.search_text().contains(q)))
        .filter(|bus| params.keep(bus))
        .collect();

    SearchResults {
        total_found: matches.len(),
        hits: matches
            .into_iter()
            .take(TEXT_RESULT_LIMIT)
            .map(SearchHit::text)
            .collect(),
        search_direction: None,
    }
}

fn directional_search(
    candidates: Vec<BusRecord>,
    trip: &RouteQuery,
    params: &SearchParams,
) -> SearchResults {
    let hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter(|bus| params.keep(bus))
        .filter_map(|bus| {
            let selection = trip.match_bus(&bus)?;
            let route_match = RouteMatch {
                direction: selection.direction,
                relevant_journeys: selection.relevant_journeys.to_vec(),
                route_label: selection.route_label.clone(),
            };
            let daily_departures = selection.daily_departures();
            Some(SearchHit {
                bus,
                daily_departures,
                route_match: Some(route_match),
            })
        })
        .collect();

    SearchResults {
        total_found: hits.len(),
        hits,
        search_direction: Some(trip.label()),
    }
}

#[cfg(test)]
mod tests {
    use bus_directory_bus_models::{BusPatch, BusType, VoteType};
    use bus_directory_database::memory::MemoryRepository;
    use bus_directory_database_models::{ListPage, VoteOutcome};

    use super::*;

    fn bus(license: &str, company: &str, from: &str, to: &str) -> BusRecord {
        let mut bus = BusRecord::new(license, company, from, to);
        bus.journeys = vec![Journey::new("06:00", "09:00"), Journey::new("13:00", "16:00")];
        bus.return_journeys = Some(vec![Journey::new("10:00", "13:00")]);
        bus
    }

    fn repo() -> MemoryRepository {
        let mut luxury = bus("NB-2000", "Ceylon Express", "Kandy", "Colombo Fort");
        luxury.bus_type = BusType::Luxury;
        luxury.verify_count = 3;

        let mut galle = bus("NC-3000", "SuperLine", "Galle", "Matara");
        galle.stops = vec!["Ahangama".to_string(), "Weligama".to_string()];

        MemoryRepository::with_buses(vec![
            bus("NA-1000", "SuperLine", "Colombo", "Kandy"),
            luxury,
            galle,
            bus("ND-4000", "Northern Travels", "Jaffna", "Vavuniya"),
        ])
    }

    fn licenses(results: &SearchResults) -> Vec<&str> {
        results
            .hits
            .iter()
            .map(|h| h.bus.license_no.as_str())
            .collect()
    }

    fn directional(from: &str, to: &str) -> SearchParams {
        SearchParams {
            directional: true,
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            ..SearchParams::default()
        }
    }

    #[tokio::test]
    async fn empty_search_returns_everything_in_store_order() {
        let results = search(&repo(), &SearchParams::default()).await.unwrap();
        assert_eq!(licenses(&results), ["NA-1000", "NB-2000", "NC-3000", "ND-4000"]);
        assert_eq!(results.total_found, 4);
        assert_eq!(results.hits[0].daily_departures, 3);
        assert!(results.search_direction.is_none());
    }

    #[tokio::test]
    async fn text_search_matches_stops_case_insensitively() {
        let params = SearchParams {
            query: Some("WELIGAMA".to_string()),
            ..SearchParams::default()
        };
        let results = search(&repo(), &params).await.unwrap();
        assert_eq!(licenses(&results), ["NC-3000"]);
    }

    #[tokio::test]
    async fn type_and_verified_filters_apply() {
        let params = SearchParams {
            bus_type: Some("luxury".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(licenses(&search(&repo(), &params).await.unwrap()), ["NB-2000"]);

        let params = SearchParams {
            bus_type: Some(ALL.to_string()),
            verified_only: true,
            ..SearchParams::default()
        };
        assert_eq!(licenses(&search(&repo(), &params).await.unwrap()), ["NB-2000"]);
    }

    #[tokio::test]
    async fn company_lookup_is_exact() {
        let params = SearchParams {
            company_name: Some("SuperLine".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(
            licenses(&search(&repo(), &params).await.unwrap()),
            ["NA-1000", "NC-3000"]
        );
    }

    #[tokio::test]
    async fn text_results_are_capped_but_counted() {
        let buses = (0..60)
            .map(|i| BusRecord::new(format!("X-{i}"), "Co", "A", "B"))
            .collect();
        let repo = MemoryRepository::with_buses(buses);

        let results = search(&repo, &SearchParams::default()).await.unwrap();
        assert_eq!(results.hits.len(), TEXT_RESULT_LIMIT);
        assert_eq!(results.total_found, 60);
    }

    #[tokio::test]
    async fn directional_search_selects_journeys_by_direction() {
        let repo = repo();
        let results = search(&repo, &directional("Colombo", "Kandy")).await.unwrap();
        assert_eq!(licenses(&results), ["NA-1000", "NB-2000"]);
        assert_eq!(results.search_direction.as_deref(), Some("Colombo → Kandy"));

        let forward = results.hits[0].route_match.as_ref().unwrap();
        assert_eq!(forward.direction, Direction::Forward);
        assert_eq!(results.hits[0].daily_departures, 2);
        assert_eq!(results.hits[0].name(), "Colombo → Kandy");

        // NB-2000 runs Kandy → Colombo Fort, so this trip is its return leg.
        let ret = results.hits[1].route_match.as_ref().unwrap();
        assert_eq!(ret.direction, Direction::Return);
        assert_eq!(ret.relevant_journeys, vec![Journey::new("10:00", "13:00")]);
        assert_eq!(results.hits[1].daily_departures, 1);
        assert_eq!(results.hits[1].name(), "Colombo Fort → Kandy");
    }

    #[tokio::test]
    async fn directional_search_is_asymmetric() {
        let repo = repo();
        let there = search(&repo, &directional("Colombo", "Kandy")).await.unwrap();
        let back = search(&repo, &directional("Kandy", "Colombo")).await.unwrap();

        assert_eq!(licenses(&there), licenses(&back));
        assert_eq!(
            there.hits[0].route_match.as_ref().unwrap().direction,
            Direction::Forward
        );
        assert_eq!(
            back.hits[0].route_match.as_ref().unwrap().direction,
            Direction::Return
        );
    }

    #[tokio::test]
    async fn directional_search_ignores_text_query() {
        let mut params = directional("Galle", "Matara");
        params.query = Some("nothing matches this".to_string());
        let results = search(&repo(), &params).await.unwrap();
        assert_eq!(licenses(&results), ["NC-3000"]);
    }

    #[tokio::test]
    async fn directional_search_requires_both_endpoints() {
        assert!(matches!(
            search(&repo(), &directional("Colombo", " ")).await,
            Err(SearchError::BadRequest { .. })
        ));

        let params = SearchParams {
            directional: true,
            query: Some("Colombo to Kandy".to_string()),
            ..SearchParams::default()
        };
        assert!(matches!(
            search(&repo(), &params).await,
            Err(SearchError::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn trip_shaped_query_runs_directionally() {
        let params = SearchParams {
            query: Some("matara to galle".to_string()),
            ..SearchParams::default()
        };
        let results = search(&repo(), &params).await.unwrap();
        assert_eq!(licenses(&results), ["NC-3000"]);
        assert_eq!(
            results.hits[0].route_match.as_ref().unwrap().direction,
            Direction::Return
        );
        assert_eq!(results.search_direction.as_deref(), Some("matara → galle"));
    }

    #[tokio::test]
    async fn search_is_deterministic() {
        let repo = repo();
        let params = SearchParams {
            query: Some("colombo".to_string()),
            ..SearchParams::default()
        };
        let first = search(&repo, &params).await.unwrap();
        let second = search(&repo, &params).await.unwrap();
        assert_eq!(first, second);
    }

    /// Delegates to a memory store but fails every index lookup.
    struct NoIndexes(MemoryRepository);

    #[async_trait::async_trait]
    impl BusRepository for NoIndexes {
        fn backend(&self) -> &'static str {
            "no-indexes"
        }

        async fn get(&self, license_no: &str) -> Result<Option<BusRecord>, DbError> {
            self.0.get(license_no).await
        }

        async fn list(&self, limit: usize, last_key: Option<&str>) -> Result<ListPage, DbError> {
            self.0.list(limit, last_key).await
        }

        async fn create(&self, bus: &BusRecord) -> Result<(), DbError> {
            self.0.create(bus).await
        }

        async fn update(&self, license_no: &str, patch: &BusPatch) -> Result<BusRecord, DbError> {
            self.0.update(license_no, patch).await
        }

        async fn increment_legacy_votes(&self, license_no: &str) -> Result<BusRecord, DbError> {
            self.0.increment_legacy_votes(license_no).await
        }

        async fn scan_all(&self, limit: usize) -> Result<Vec<BusRecord>, DbError> {
            self.0.scan_all(limit).await
        }

        async fn query_by_index(
            &self,
            _index: BusIndex,
            _value: &str,
        ) -> Result<Vec<BusRecord>, DbError> {
            Err(DbError::Store {
                operation: "Query",
                message: "index not found".to_string(),
            })
        }

        async fn get_vote(
            &self,
            license_no: &str,
            user_email: &str,
        ) -> Result<Option<VoteType>, DbError> {
            self.0.get_vote(license_no, user_email).await
        }

        async fn apply_vote(
            &self,
            license_no: &str,
            user_email: &str,
            vote: VoteType,
        ) -> Result<VoteOutcome, DbError> {
            self.0.apply_vote(license_no, user_email, vote).await
        }
    }

    #[tokio::test]
    async fn failed_index_lookup_falls_back_to_scan() {
        let repo = NoIndexes(repo());
        let params = SearchParams {
            company_name: Some("SuperLine".to_string()),
            query: Some("galle".to_string()),
            ..SearchParams::default()
        };
        let results = search(&repo, &params).await.unwrap();
        assert_eq!(licenses(&results), ["NC-3000"]);
    }
}
