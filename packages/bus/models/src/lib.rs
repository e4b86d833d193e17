#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Bus record, journey, and vote types for the bus directory.
//!
//! These types are the canonical shapes shared by the repository
//! implementations, the search service, the vote ledger, and the API layer.
//! Field names serialize in `camelCase` so that stored items and API
//! payloads stay compatible with the browser client.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of votes (on either counter) at which a bus counts as verified.
pub const VERIFIED_THRESHOLD: u32 = 3;

/// Separator used in display route labels.
pub const ROUTE_ARROW: &str = "→";

/// Service class of a bus.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BusType {
    /// Regular service.
    #[default]
    Normal,
    /// Semi-luxury service.
    Semi,
    /// Luxury / air-conditioned service.
    Luxury,
}

impl BusType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Normal, Self::Semi, Self::Luxury]
    }
}

/// A single scheduled departure/arrival pair, both as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    /// Departure time (`HH:MM`).
    pub start: String,
    /// Arrival time (`HH:MM`).
    pub end: String,
}

impl Journey {
    /// Creates a journey from two `HH:MM` strings.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Checks that both times are valid 24-hour `HH:MM` values.
    ///
    /// Arrival may be earlier than departure (overnight journeys).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidJourneyError`] naming the first malformed time.
    pub fn validate(&self) -> Result<(), InvalidJourneyError> {
        for value in [&self.start, &self.end] {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| InvalidJourneyError {
                value: value.clone(),
            })?;
        }
        Ok(())
    }
}

/// Error returned when a journey time is not a valid `HH:MM` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid journey time {value:?}: expected HH:MM")]
pub struct InvalidJourneyError {
    /// The offending time string.
    pub value: String,
}

/// Phone contacts for a bus crew.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    /// Driver phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Conductor phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conductor: Option<String>,
    /// Booking line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<String>,
}

/// A bus photo, either hosted (`url`) or inline (`data` URI).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Public object URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline data URI (older clients).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One bus route license as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRecord {
    /// License number; primary key.
    pub license_no: String,
    /// Public bus number, usually equal to the license number.
    #[serde(default)]
    pub bus_number: String,
    /// Operating company.
    #[serde(default)]
    pub company_name: String,
    /// Origin of the forward direction.
    #[serde(default)]
    pub from: String,
    /// Destination of the forward direction.
    #[serde(default)]
    pub to: String,
    /// Display label `"{from} → {to}"`.
    #[serde(default)]
    pub route: String,
    /// Service class.
    #[serde(default)]
    pub bus_type: BusType,
    /// Forward-direction departures.
    #[serde(default)]
    pub journeys: Vec<Journey>,
    /// Return-direction departures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_journeys: Option<Vec<Journey>>,
    /// Number of community "verify" votes.
    #[serde(default)]
    pub verify_count: u32,
    /// Number of community "report" votes.
    #[serde(default)]
    pub report_count: u32,
    /// Verification counter from the older single-button flow.
    #[serde(default)]
    pub verified_votes: u32,
    /// Synthetic identifier `bus_{licenseNo}_{epochMillis}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Intermediate stops in forward order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<String>,
    /// Seating capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_count: Option<u32>,
    /// Year of manufacture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Adult fare in rupees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adult_fare: Option<f64>,
    /// Child fare in rupees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_fare: Option<f64>,
    /// Crew contacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Contacts>,
    /// Photos of the bus.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<Photo>,
    /// Departure count stored by older clients, used only when both
    /// journey lists are empty.
    #[serde(
        default,
        rename = "dailyDepartures",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_daily_departures: Option<u32>,
    /// Any other attributes supplied by clients, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BusRecord {
    /// Creates a minimal record with default counters and no schedule.
    #[must_use]
    pub fn new(
        license_no: impl Into<String>,
        company_name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let license_no = license_no.into();
        let from = from.into();
        let to = to.into();
        Self {
            bus_number: license_no.clone(),
            route: route_label(&from, &to),
            license_no,
            company_name: company_name.into(),
            from,
            to,
            bus_type: BusType::Normal,
            journeys: Vec::new(),
            return_journeys: None,
            verify_count: 0,
            report_count: 0,
            verified_votes: 0,
            id: None,
            created_at: None,
            updated_at: None,
            stops: Vec::new(),
            seat_count: None,
            year: None,
            adult_fare: None,
            child_fare: None,
            contacts: None,
            photos: Vec::new(),
            legacy_daily_departures: None,
            extra: BTreeMap::new(),
        }
    }

    /// Whether either vote counter has reached [`VERIFIED_THRESHOLD`].
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verify_count >= VERIFIED_THRESHOLD || self.verified_votes >= VERIFIED_THRESHOLD
    }

    /// The larger of the two verification counters.
    #[must_use]
    pub fn verification_signal(&self) -> u32 {
        self.verify_count.max(self.verified_votes)
    }

    /// Return-direction departures, empty when absent.
    #[must_use]
    pub fn return_journeys(&self) -> &[Journey] {
        self.return_journeys.as_deref().unwrap_or_default()
    }

    /// Departures across both directions, falling back to the legacy
    /// stored count when neither list has entries.
    #[must_use]
    pub fn total_daily_departures(&self) -> u32 {
        let total = self.journeys.len() + self.return_journeys().len();
        if total > 0 {
            u32::try_from(total).unwrap_or(u32::MAX)
        } else {
            self.legacy_daily_departures.unwrap_or(0)
        }
    }

    /// Public code: the bus number, or the license when no number is set.
    #[must_use]
    pub fn code(&self) -> &str {
        if self.bus_number.is_empty() {
            &self.license_no
        } else {
            &self.bus_number
        }
    }

    /// Display name: the stored route, or a label built from the endpoints.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.route.is_empty() {
            route_label(&self.from, &self.to)
        } else {
            self.route.clone()
        }
    }

    /// Lowercased text used by free-text search.
    #[must_use]
    pub fn search_text(&self) -> String {
        let stops = self.stops.join(" ");
        [
            self.bus_number.as_str(),
            self.license_no.as_str(),
            self.company_name.as_str(),
            self.from.as_str(),
            self.to.as_str(),
            self.route.as_str(),
            stops.as_str(),
            self.bus_type.as_ref(),
        ]
        .join(" ")
        .to_lowercase()
    }

    /// Recomputes `route` from the current endpoints.
    pub fn refresh_route(&mut self) {
        self.route = route_label(&self.from, &self.to);
    }
}

/// Builds the display label `"{from} → {to}"`.
#[must_use]
pub fn route_label(from: &str, to: &str) -> String {
    format!("{from} {ROUTE_ARROW} {to}")
}

/// Builds the synthetic record identifier `bus_{licenseNo}_{epochMillis}`.
#[must_use]
pub fn record_id(license_no: &str, created_at: DateTime<Utc>) -> String {
    format!("bus_{license_no}_{}", created_at.timestamp_millis())
}

// ---------------------------------------------------------------------------
// New submissions
// ---------------------------------------------------------------------------

/// Errors from turning a client submission into a new [`BusRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// One or more required fields were missing or blank.
    #[error("Missing required fields: {}", .fields.join(", "))]
    MissingFields {
        /// Names of the missing fields.
        fields: Vec<&'static str>,
    },

    /// A journey time was malformed.
    #[error(transparent)]
    InvalidJourney(#[from] InvalidJourneyError),

    /// A field had the wrong shape.
    #[error("Invalid bus: {message}")]
    Invalid {
        /// Deserialization failure description.
        message: String,
    },
}

/// Reads a trimmed, non-empty string field from a JSON object.
fn required_str(body: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Builds a new record from a client submission.
///
/// The license number is taken from `licenseNo`, falling back to
/// `busNumber`. Endpoints and company are trimmed, `route` and `id` are
/// derived, timestamps are set to `now`, and all vote counters start at
/// zero regardless of what the client sent. Any other supplied attributes
/// are kept.
///
/// # Errors
///
/// Returns [`SubmissionError`] if a required field is missing, a field has
/// the wrong type, or a journey time is malformed.
pub fn new_bus_from_submission(
    mut body: serde_json::Map<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<BusRecord, SubmissionError> {
    let license_no = required_str(&body, "licenseNo").or_else(|| required_str(&body, "busNumber"));
    let company_name = required_str(&body, "companyName");
    let from = required_str(&body, "from");
    let to = required_str(&body, "to");

    let (Some(license_no), Some(company_name), Some(from), Some(to)) =
        (license_no.clone(), company_name.clone(), from.clone(), to.clone())
    else {
        let fields = [
            ("licenseNo", license_no.is_none()),
            ("companyName", company_name.is_none()),
            ("from", from.is_none()),
            ("to", to.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();
        return Err(SubmissionError::MissingFields { fields });
    };

    body.retain(|_, v| !v.is_null());
    let bus_number = required_str(&body, "busNumber").unwrap_or_else(|| license_no.clone());
    let timestamp = serde_json::to_value(now).map_err(|e| SubmissionError::Invalid {
        message: e.to_string(),
    })?;

    body.insert("route".into(), route_label(&from, &to).into());
    body.insert("id".into(), record_id(&license_no, now).into());
    body.insert("licenseNo".into(), license_no.into());
    body.insert("busNumber".into(), bus_number.into());
    body.insert("companyName".into(), company_name.into());
    body.insert("from".into(), from.into());
    body.insert("to".into(), to.into());
    body.insert("createdAt".into(), timestamp.clone());
    body.insert("updatedAt".into(), timestamp);
    for counter in ["verifyCount", "reportCount", "verifiedVotes"] {
        body.insert(counter.into(), 0.into());
    }

    let bus: BusRecord = serde_json::from_value(serde_json::Value::Object(body)).map_err(|e| {
        SubmissionError::Invalid {
            message: e.to_string(),
        }
    })?;

    for journey in bus.journeys.iter().chain(bus.return_journeys()) {
        journey.validate()?;
    }

    Ok(bus)
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Keys the API adds to a bus response that are never stored. A client
/// that sends a fetched bus back as an update carries these along.
pub const RESPONSE_ONLY_FIELDS: &[&str] = &[
    "id",
    "verified",
    "code",
    "name",
    "type",
    "direction",
    "relevantJourneys",
    "searchDirection",
];

/// A validated set of fields to overwrite on an existing record.
///
/// `licenseNo`, [`RESPONSE_ONLY_FIELDS`], and `null` values are dropped on
/// construction. If `from` or
/// `to` is present, applying the patch also recomputes `route`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusPatch {
    fields: serde_json::Map<String, serde_json::Value>,
}

/// Error returned when a patch does not fit the record schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid update: {message}")]
pub struct PatchError {
    /// Description of the offending field.
    pub message: String,
}

impl BusPatch {
    /// Builds a patch from a JSON object body.
    #[must_use]
    pub fn new(mut fields: serde_json::Map<String, serde_json::Value>) -> Self {
        fields.remove("licenseNo");
        fields.retain(|k, v| !v.is_null() && !RESPONSE_ONLY_FIELDS.contains(&k.as_str()));
        Self { fields }
    }

    /// The fields this patch overwrites.
    #[must_use]
    pub const fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.fields
    }

    /// Whether the patch changes either endpoint.
    #[must_use]
    pub fn touches_endpoints(&self) -> bool {
        self.fields.contains_key("from") || self.fields.contains_key("to")
    }

    /// Applies the patch to `record`, returning the merged record with
    /// `updatedAt` set to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] if a field has the wrong shape or a journey
    /// time is malformed.
    pub fn apply(&self, record: &BusRecord, now: DateTime<Utc>) -> Result<BusRecord, PatchError> {
        let mut value = serde_json::to_value(record).map_err(|e| PatchError {
            message: e.to_string(),
        })?;

        if let serde_json::Value::Object(map) = &mut value {
            for (key, field) in &self.fields {
                map.insert(key.clone(), field.clone());
            }
        }

        let mut merged: BusRecord = serde_json::from_value(value).map_err(|e| PatchError {
            message: e.to_string(),
        })?;

        for journey in merged.journeys.iter().chain(merged.return_journeys()) {
            journey.validate().map_err(|e| PatchError {
                message: e.to_string(),
            })?;
        }

        if self.touches_endpoints() {
            merged.refresh_route();
        }
        merged.updated_at = Some(now);

        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Kind of community vote.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteType {
    /// The caller vouches for the record.
    Verify,
    /// The caller flags the record as wrong.
    Report,
}

/// A user's current vote on a bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// Composite key `"{licenseNo}_{userEmail}"`.
    pub vote_id: String,
    /// Bus being voted on.
    pub license_no: String,
    /// Voter identity.
    pub user_email: String,
    /// Current vote.
    pub vote_type: VoteType,
    /// When this vote was cast.
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    /// Creates a vote record keyed by [`VoteRecord::key`].
    #[must_use]
    pub fn new(
        license_no: &str,
        user_email: &str,
        vote_type: VoteType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            vote_id: Self::key(license_no, user_email),
            license_no: license_no.to_string(),
            user_email: user_email.to_string(),
            vote_type,
            created_at,
        }
    }

    /// Composite key for a (bus, user) pair.
    #[must_use]
    pub fn key(license_no: &str, user_email: &str) -> String {
        format!("{license_no}_{user_email}")
    }
}

/// Result of casting a vote against the caller's current vote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    /// The caller's vote after the cast (`None` = toggled off).
    pub next: Option<VoteType>,
    /// Change to apply to `verifyCount`.
    pub verify_delta: i64,
    /// Change to apply to `reportCount`.
    pub report_delta: i64,
}

impl VoteTransition {
    /// Computes the transition for casting `cast` when the caller's current
    /// vote is `current`.
    ///
    /// Casting the same vote again withdraws it; casting the opposite vote
    /// switches it.
    #[must_use]
    pub const fn compute(current: Option<VoteType>, cast: VoteType) -> Self {
        match (current, cast) {
            (None, VoteType::Verify) => Self::new(Some(VoteType::Verify), 1, 0),
            (None, VoteType::Report) => Self::new(Some(VoteType::Report), 0, 1),
            (Some(VoteType::Verify), VoteType::Verify) => Self::new(None, -1, 0),
            (Some(VoteType::Report), VoteType::Report) => Self::new(None, 0, -1),
            (Some(VoteType::Report), VoteType::Verify) => Self::new(Some(VoteType::Verify), 1, -1),
            (Some(VoteType::Verify), VoteType::Report) => Self::new(Some(VoteType::Report), -1, 1),
        }
    }

    const fn new(next: Option<VoteType>, verify_delta: i64, report_delta: i64) -> Self {
        Self {
            next,
            verify_delta,
            report_delta,
        }
    }
}

/// Applies a signed delta to a counter, flooring at zero.
#[must_use]
pub fn apply_delta(count: u32, delta: i64) -> u32 {
    let next = i64::from(count).saturating_add(delta).max(0);
    u32::try_from(next).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BusRecord {
        let mut bus = BusRecord::new("NC-1234", "SuperLine", "Colombo", "Kandy");
        bus.journeys = vec![Journey::new("06:00", "09:00")];
        bus
    }

    #[test]
    fn new_record_derives_route_and_bus_number() {
        let bus = sample();
        assert_eq!(bus.route, "Colombo → Kandy");
        assert_eq!(bus.bus_number, "NC-1234");
        assert!(!bus.is_verified());
    }

    #[test]
    fn verified_by_either_counter() {
        let mut bus = sample();
        bus.verify_count = 3;
        assert!(bus.is_verified());

        bus.verify_count = 0;
        bus.verified_votes = 3;
        assert!(bus.is_verified());

        bus.verified_votes = 2;
        assert!(!bus.is_verified());
    }

    #[test]
    fn daily_departures_sums_both_directions() {
        let mut bus = sample();
        bus.return_journeys = Some(vec![
            Journey::new("07:00", "10:00"),
            Journey::new("15:00", "18:00"),
        ]);
        assert_eq!(bus.total_daily_departures(), 3);
    }

    #[test]
    fn daily_departures_falls_back_to_legacy_value() {
        let mut bus = BusRecord::new("X-1", "Co", "A", "B");
        assert_eq!(bus.total_daily_departures(), 0);
        bus.legacy_daily_departures = Some(12);
        assert_eq!(bus.total_daily_departures(), 12);
    }

    #[test]
    fn deserializes_sparse_legacy_item() {
        let bus: BusRecord = serde_json::from_value(serde_json::json!({
            "licenseNo": "WP-1",
            "from": "Galle",
            "to": "Matara",
            "verifiedVotes": 5,
            "journeyDuration": "1h 30m"
        }))
        .unwrap();

        assert_eq!(bus.bus_type, BusType::Normal);
        assert_eq!(bus.code(), "WP-1");
        assert_eq!(bus.display_name(), "Galle → Matara");
        assert!(bus.is_verified());
        assert_eq!(
            bus.extra.get("journeyDuration"),
            Some(&serde_json::json!("1h 30m"))
        );
    }

    #[test]
    fn search_text_includes_stops_and_type() {
        let mut bus = sample();
        bus.stops = vec!["Kegalle".to_string(), "Mawanella".to_string()];
        bus.bus_type = BusType::Luxury;
        let text = bus.search_text();
        assert!(text.contains("kegalle mawanella"));
        assert!(text.contains("luxury"));
        assert!(text.contains("superline"));
    }

    #[test]
    fn journey_validation() {
        assert!(Journey::new("06:00", "23:59").validate().is_ok());
        assert!(Journey::new("22:00", "04:30").validate().is_ok());
        assert!(Journey::new("6am", "09:00").validate().is_err());
        assert!(Journey::new("06:00", "24:10").validate().is_err());
    }

    #[test]
    fn bus_type_parses_case_insensitively() {
        assert_eq!("Luxury".parse::<BusType>().unwrap(), BusType::Luxury);
        assert_eq!("semi".parse::<BusType>().unwrap(), BusType::Semi);
        assert!("double-decker".parse::<BusType>().is_err());
    }

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn submission_derives_fields_and_resets_counters() {
        let now = Utc::now();
        let bus = new_bus_from_submission(
            object(serde_json::json!({
                "busNumber": " NC-1234 ",
                "companyName": "SuperLine",
                "from": " Colombo",
                "to": "Kandy ",
                "busType": "luxury",
                "verifyCount": 99,
                "journeys": [{ "start": "06:00", "end": "09:00" }],
                "adultFare": null,
                "journeyDuration": "3h"
            })),
            now,
        )
        .unwrap();

        assert_eq!(bus.license_no, "NC-1234");
        assert_eq!(bus.bus_number, "NC-1234");
        assert_eq!(bus.route, "Colombo → Kandy");
        assert_eq!(bus.bus_type, BusType::Luxury);
        assert_eq!(bus.verify_count, 0);
        assert_eq!(bus.adult_fare, None);
        assert_eq!(bus.created_at, Some(now));
        assert_eq!(
            bus.id,
            Some(format!("bus_NC-1234_{}", now.timestamp_millis()))
        );
        assert_eq!(bus.extra.get("journeyDuration"), Some(&serde_json::json!("3h")));
    }

    #[test]
    fn submission_reports_missing_fields() {
        let err = new_bus_from_submission(
            object(serde_json::json!({ "companyName": "  ", "from": "Galle" })),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SubmissionError::MissingFields {
                fields: vec!["licenseNo", "companyName", "to"]
            }
        );
        assert_eq!(
            err.to_string(),
            "Missing required fields: licenseNo, companyName, to"
        );
    }

    #[test]
    fn submission_rejects_bad_journeys_and_types() {
        let base = serde_json::json!({
            "licenseNo": "X-1", "companyName": "Co", "from": "A", "to": "B"
        });

        let mut bad_time = object(base.clone());
        bad_time.insert(
            "returnJourneys".into(),
            serde_json::json!([{ "start": "25:00", "end": "01:00" }]),
        );
        assert!(matches!(
            new_bus_from_submission(bad_time, Utc::now()),
            Err(SubmissionError::InvalidJourney(_))
        ));

        let mut bad_type = object(base);
        bad_type.insert("busType".into(), serde_json::json!("hovercraft"));
        assert!(matches!(
            new_bus_from_submission(bad_type, Utc::now()),
            Err(SubmissionError::Invalid { .. })
        ));
    }

    #[test]
    fn patch_recomputes_route_and_keeps_license() {
        let bus = sample();
        let patch = BusPatch::new(
            serde_json::json!({ "to": "Nuwara Eliya", "licenseNo": "HIJACK", "seatCount": null })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(patch.touches_endpoints());
        assert!(!patch.fields().contains_key("seatCount"));

        let now = Utc::now();
        let merged = patch.apply(&bus, now).unwrap();
        assert_eq!(merged.license_no, "NC-1234");
        assert_eq!(merged.route, "Colombo → Nuwara Eliya");
        assert_eq!(merged.updated_at, Some(now));
    }

    #[test]
    fn patch_drops_response_only_fields() {
        let mut bus = sample();
        bus.id = Some("bus_NC-1234_1700000000000".to_string());
        let patch = BusPatch::new(
            serde_json::json!({
                "id": "bus_other",
                "verified": true,
                "code": "NC-1234",
                "name": "Kandy → Colombo",
                "type": "luxury",
                "direction": "return",
                "relevantJourneys": [{ "start": "14:00", "end": "17:00" }],
                "searchDirection": "Kandy → Colombo",
                "companyName": "Lanka Express",
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        assert_eq!(patch.fields().len(), 1);

        let merged = patch.apply(&bus, Utc::now()).unwrap();
        assert_eq!(merged.company_name, "Lanka Express");
        assert_eq!(merged.id.as_deref(), Some("bus_NC-1234_1700000000000"));
        assert!(merged.extra.is_empty());
    }

    #[test]
    fn patch_rejects_wrong_types() {
        let bus = sample();
        let patch = BusPatch::new(
            serde_json::json!({ "verifyCount": "lots" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(patch.apply(&bus, Utc::now()).is_err());

        let patch = BusPatch::new(
            serde_json::json!({ "journeys": [{ "start": "noon", "end": "13:00" }] })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(patch.apply(&bus, Utc::now()).is_err());
    }

    #[test]
    fn vote_transitions() {
        use VoteType::{Report, Verify};

        let t = VoteTransition::compute(None, Verify);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (Some(Verify), 1, 0));

        let t = VoteTransition::compute(Some(Verify), Verify);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (None, -1, 0));

        let t = VoteTransition::compute(Some(Report), Verify);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (Some(Verify), 1, -1));

        let t = VoteTransition::compute(None, Report);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (Some(Report), 0, 1));

        let t = VoteTransition::compute(Some(Report), Report);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (None, 0, -1));

        let t = VoteTransition::compute(Some(Verify), Report);
        assert_eq!((t.next, t.verify_delta, t.report_delta), (Some(Report), -1, 1));
    }

    #[test]
    fn apply_delta_floors_at_zero() {
        assert_eq!(apply_delta(0, -1), 0);
        assert_eq!(apply_delta(2, -1), 1);
        assert_eq!(apply_delta(2, 1), 3);
    }

    #[test]
    fn vote_key_is_composite() {
        assert_eq!(VoteRecord::key("NC-1234", "a@b.lk"), "NC-1234_a@b.lk");
        let vote = VoteRecord::new("NC-1234", "a@b.lk", VoteType::Report, Utc::now());
        assert_eq!(vote.vote_id, "NC-1234_a@b.lk");
    }
}
