#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Community verify/report votes.
//!
//! Each user holds at most one vote per bus. Casting the same vote twice
//! withdraws it and casting the opposite vote switches it; the bus's
//! `verifyCount`/`reportCount` follow along and never drop below zero. See
//! [`bus_directory_bus_models::VoteTransition`] for the full table.

use bus_directory_bus_models::VoteType;
use bus_directory_database::{BusRepository, DbError};
use bus_directory_database_models::VoteOutcome;

/// Errors that can occur while voting.
#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    /// The bus doesn't exist.
    #[error("Bus not found: {license_no}")]
    NotFound {
        /// License number that was voted on.
        license_no: String,
    },

    /// No caller identity was supplied.
    #[error("Authentication required to vote")]
    Unauthenticated,

    /// The store failed.
    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for VoteError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { license_no } => Self::NotFound { license_no },
            other => Self::Store(other),
        }
    }
}

fn caller(user_email: &str) -> Result<&str, VoteError> {
    let email = user_email.trim();
    if email.is_empty() {
        return Err(VoteError::Unauthenticated);
    }
    Ok(email)
}

/// Casts `vote` for `user_email` on a bus.
///
/// # Errors
///
/// Returns [`VoteError::Unauthenticated`] for a blank caller,
/// [`VoteError::NotFound`] if the bus doesn't exist, and
/// [`VoteError::Store`] if the store fails.
pub async fn cast(
    repo: &dyn BusRepository,
    license_no: &str,
    user_email: &str,
    vote: VoteType,
) -> Result<VoteOutcome, VoteError> {
    let email = caller(user_email)?;
    let outcome = repo.apply_vote(license_no, email, vote).await?;

    log::info!(
        "{email} cast {vote} on {license_no}: verify={} report={} now={:?}",
        outcome.verify_count,
        outcome.report_count,
        outcome.user_vote,
    );

    Ok(outcome)
}

/// Casts (or withdraws) a verify vote.
///
/// # Errors
///
/// See [`cast`].
pub async fn cast_verify(
    repo: &dyn BusRepository,
    license_no: &str,
    user_email: &str,
) -> Result<VoteOutcome, VoteError> {
    cast(repo, license_no, user_email, VoteType::Verify).await
}

/// Casts (or withdraws) a report vote.
///
/// # Errors
///
/// See [`cast`].
pub async fn cast_report(
    repo: &dyn BusRepository,
    license_no: &str,
    user_email: &str,
) -> Result<VoteOutcome, VoteError> {
    cast(repo, license_no, user_email, VoteType::Report).await
}

/// Returns the caller's current vote on a bus.
///
/// # Errors
///
/// Returns [`VoteError::Unauthenticated`] for a blank caller,
/// [`VoteError::NotFound`] if the bus doesn't exist, and
/// [`VoteError::Store`] if the store fails.
pub async fn get_user_vote(
    repo: &dyn BusRepository,
    license_no: &str,
    user_email: &str,
) -> Result<Option<VoteType>, VoteError> {
    let email = caller(user_email)?;
    if repo.get(license_no).await?.is_none() {
        return Err(VoteError::NotFound {
            license_no: license_no.to_string(),
        });
    }
    Ok(repo.get_vote(license_no, email).await?)
}
