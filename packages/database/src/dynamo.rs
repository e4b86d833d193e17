//! `DynamoDB`-backed repository.
//!
//! Buses live in one table keyed by `licenseNo` with `CompanyIndex`,
//! `RouteIndex`, and `TypeIndex` global secondary indexes. Votes live in a
//! second table keyed by `voteId` (`"{licenseNo}_{userEmail}"`).

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use bus_directory_bus_models::{
    BusPatch, BusRecord, VoteRecord, VoteTransition, VoteType, apply_delta,
};
use bus_directory_database_models::{BusIndex, INDEX_QUERY_LIMIT, ListPage, VoteOutcome};
use chrono::Utc;

use crate::item::{Item, decode_all, from_item, to_attribute, to_item};
use crate::{BusRepository, DbError, StoreConfig};

/// Partition key of the bus table.
const LICENSE_KEY: &str = "licenseNo";

/// Partition key of the vote table.
const VOTE_KEY: &str = "voteId";

/// Attributes the store maintains itself on update.
const MANAGED_ATTRIBUTES: &[&str] = &["route", "updatedAt"];

fn store_error<E>(operation: &'static str, e: E) -> DbError
where
    E: std::error::Error,
{
    DbError::Store {
        operation,
        message: DisplayErrorContext(e).to_string(),
    }
}

fn not_found(license_no: &str) -> DbError {
    DbError::NotFound {
        license_no: license_no.to_string(),
    }
}

fn key(name: &str, value: &str) -> Item {
    HashMap::from([(name.to_string(), AttributeValue::S(value.to_string()))])
}

fn page_limit(limit: usize) -> i32 {
    i32::try_from(limit).unwrap_or(i32::MAX)
}

fn timestamp(now: chrono::DateTime<Utc>) -> Result<AttributeValue, DbError> {
    Ok(to_attribute(&serde_json::to_value(now)?))
}

/// Bus and vote tables in `DynamoDB`.
#[derive(Debug, Clone)]
pub struct DynamoRepository {
    client: Client,
    bus_table: String,
    votes_table: String,
}

impl DynamoRepository {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client, bus_table: impl Into<String>, votes_table: impl Into<String>) -> Self {
        Self {
            client,
            bus_table: bus_table.into(),
            votes_table: votes_table.into(),
        }
    }

    /// Builds a client from the AWS environment and `config`.
    ///
    /// When an endpoint override is set (e.g. `DynamoDB` Local) and no
    /// access key is present in the environment, placeholder credentials
    /// are used.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if no bus table is configured.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DbError> {
        let bus_table = config.bus_table.clone().ok_or_else(|| DbError::Config {
            message: "BUS_TABLE_NAME is not set".to_string(),
        })?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &config.endpoint {
            log::info!("Using DynamoDB endpoint override {endpoint}");
            builder = builder.endpoint_url(endpoint);

            if std::env::var_os("AWS_ACCESS_KEY_ID").is_none() {
                builder = builder.credentials_provider(Credentials::new(
                    "local",
                    "local",
                    None,
                    None,
                    "dynamodb-local",
                ));
            }
        }

        Ok(Self::new(
            Client::from_conf(builder.build()),
            bus_table,
            config.votes_table.clone(),
        ))
    }

    /// Runs one `Scan` page, returning the records and the license number
    /// to resume after.
    async fn scan_page(
        &self,
        limit: usize,
        start_after: Option<&str>,
    ) -> Result<(Vec<BusRecord>, Option<String>), DbError> {
        let output = self
            .client
            .scan()
            .table_name(&self.bus_table)
            .limit(page_limit(limit))
            .set_exclusive_start_key(start_after.map(|k| key(LICENSE_KEY, k)))
            .send()
            .await
            .map_err(|e| store_error("Scan", e))?;

        let next = output
            .last_evaluated_key()
            .and_then(|k| k.get(LICENSE_KEY))
            .and_then(|v| v.as_s().ok())
            .cloned();

        Ok((decode_all(output.items()), next))
    }
}

#[async_trait::async_trait]
impl BusRepository for DynamoRepository {
    fn backend(&self) -> &'static str {
        "dynamodb"
    }

    async fn get(&self, license_no: &str) -> Result<Option<BusRecord>, DbError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.bus_table)
            .set_key(Some(key(LICENSE_KEY, license_no)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| store_error("GetItem", e))?;

        output.item().map(from_item).transpose()
    }

    async fn list(&self, limit: usize, last_key: Option<&str>) -> Result<ListPage, DbError> {
        let (buses, last_key) = self.scan_page(limit, last_key).await?;
        Ok(ListPage { buses, last_key })
    }

    async fn create(&self, bus: &BusRecord) -> Result<(), DbError> {
        self.client
            .put_item()
            .table_name(&self.bus_table)
            .set_item(Some(to_item(bus)?))
            .condition_expression("attribute_not_exists(licenseNo)")
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(PutItemError::is_conditional_check_failed_exception)
                {
                    DbError::AlreadyExists {
                        license_no: bus.license_no.clone(),
                    }
                } else {
                    store_error("PutItem", e)
                }
            })?;

        log::debug!("Created bus {}", bus.license_no);
        Ok(())
    }

    async fn update(&self, license_no: &str, patch: &BusPatch) -> Result<BusRecord, DbError> {
        let existing = self
            .get(license_no)
            .await?
            .ok_or_else(|| not_found(license_no))?;

        let now = Utc::now();
        let merged = patch.apply(&existing, now)?;
        let merged_json = serde_json::to_value(&merged)?;

        let mut assignments = vec!["#route = :route".to_string(), "#updatedAt = :updatedAt".to_string()];
        let mut request = self
            .client
            .update_item()
            .table_name(&self.bus_table)
            .set_key(Some(key(LICENSE_KEY, license_no)))
            .condition_expression("attribute_exists(licenseNo)")
            .expression_attribute_names("#route", "route")
            .expression_attribute_values(":route", AttributeValue::S(merged.route.clone()))
            .expression_attribute_names("#updatedAt", "updatedAt")
            .expression_attribute_values(":updatedAt", timestamp(now)?)
            .return_values(ReturnValue::AllNew);

        let fields = patch
            .fields()
            .iter()
            .filter(|(name, _)| !MANAGED_ATTRIBUTES.contains(&name.as_str()));

        for (i, (name, value)) in fields.enumerate() {
            let stored = merged_json.get(name).unwrap_or(value);
            assignments.push(format!("#a{i} = :v{i}"));
            request = request
                .expression_attribute_names(format!("#a{i}"), name)
                .expression_attribute_values(format!(":v{i}"), to_attribute(stored));
        }

        let output = request
            .update_expression(format!("SET {}", assignments.join(", ")))
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(UpdateItemError::is_conditional_check_failed_exception)
                {
                    not_found(license_no)
                } else {
                    store_error("UpdateItem", e)
                }
            })?;

        match output.attributes() {
            Some(item) => from_item(item),
            None => Ok(merged),
        }
    }

    async fn increment_legacy_votes(&self, license_no: &str) -> Result<BusRecord, DbError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.bus_table)
            .set_key(Some(key(LICENSE_KEY, license_no)))
            .condition_expression("attribute_exists(licenseNo)")
            .update_expression("ADD #votes :inc SET #updatedAt = :updatedAt")
            .expression_attribute_names("#votes", "verifiedVotes")
            .expression_attribute_names("#updatedAt", "updatedAt")
            .expression_attribute_values(":inc", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":updatedAt", timestamp(Utc::now())?)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(UpdateItemError::is_conditional_check_failed_exception)
                {
                    not_found(license_no)
                } else {
                    store_error("UpdateItem", e)
                }
            })?;

        output
            .attributes()
            .ok_or_else(|| DbError::Conversion {
                message: "UpdateItem returned no attributes".to_string(),
            })
            .and_then(from_item)
    }

    async fn scan_all(&self, limit: usize) -> Result<Vec<BusRecord>, DbError> {
        let mut buses = Vec::new();
        let mut start_after: Option<String> = None;

        loop {
            let remaining = limit.saturating_sub(buses.len());
            if remaining == 0 {
                break;
            }

            let (page, next) = self.scan_page(remaining, start_after.as_deref()).await?;
            buses.extend(page);

            match next {
                Some(key) => start_after = Some(key),
                None => break,
            }
        }

        buses.truncate(limit);
        Ok(buses)
    }

    async fn query_by_index(
        &self,
        index: BusIndex,
        value: &str,
    ) -> Result<Vec<BusRecord>, DbError> {
        let output = self
            .client
            .query()
            .table_name(&self.bus_table)
            .index_name(index.as_ref())
            .key_condition_expression("#k = :v")
            .expression_attribute_names("#k", index.attribute())
            .expression_attribute_values(":v", AttributeValue::S(value.to_string()))
            .limit(page_limit(INDEX_QUERY_LIMIT))
            .send()
            .await
            .map_err(|e| store_error("Query", e))?;

        Ok(decode_all(output.items()))
    }

    async fn get_vote(
        &self,
        license_no: &str,
        user_email: &str,
    ) -> Result<Option<VoteType>, DbError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.votes_table)
            .set_key(Some(key(VOTE_KEY, &VoteRecord::key(license_no, user_email))))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| store_error("GetItem", e))?;

        Ok(output
            .item()
            .map(from_item::<VoteRecord>)
            .transpose()?
            .map(|vote| vote.vote_type))
    }

    async fn apply_vote(
        &self,
        license_no: &str,
        user_email: &str,
        vote: VoteType,
    ) -> Result<VoteOutcome, DbError> {
        let bus = self
            .get(license_no)
            .await?
            .ok_or_else(|| not_found(license_no))?;

        let current = self.get_vote(license_no, user_email).await?;
        let transition = VoteTransition::compute(current, vote);
        let now = Utc::now();

        match transition.next {
            Some(next) => {
                let record = VoteRecord::new(license_no, user_email, next, now);
                self.client
                    .put_item()
                    .table_name(&self.votes_table)
                    .set_item(Some(to_item(&record)?))
                    .send()
                    .await
                    .map_err(|e| store_error("PutItem", e))?;
            }
            None => {
                self.client
                    .delete_item()
                    .table_name(&self.votes_table)
                    .set_key(Some(key(VOTE_KEY, &VoteRecord::key(license_no, user_email))))
                    .send()
                    .await
                    .map_err(|e| store_error("DeleteItem", e))?;
            }
        }

        let verify_count = apply_delta(bus.verify_count, transition.verify_delta);
        let report_count = apply_delta(bus.report_count, transition.report_delta);

        self.client
            .update_item()
            .table_name(&self.bus_table)
            .set_key(Some(key(LICENSE_KEY, license_no)))
            .update_expression("SET #vc = :vc, #rc = :rc, #updatedAt = :updatedAt")
            .expression_attribute_names("#vc", "verifyCount")
            .expression_attribute_names("#rc", "reportCount")
            .expression_attribute_names("#updatedAt", "updatedAt")
            .expression_attribute_values(":vc", AttributeValue::N(verify_count.to_string()))
            .expression_attribute_values(":rc", AttributeValue::N(report_count.to_string()))
            .expression_attribute_values(":updatedAt", timestamp(now)?)
            .send()
            .await
            .map_err(|e| store_error("UpdateItem", e))?;

        log::debug!(
            "Vote {vote} on {license_no}: verify {} -> {verify_count}, report {} -> {report_count}",
            bus.verify_count,
            bus.report_count,
        );

        Ok(VoteOutcome {
            verify_delta: transition.verify_delta,
            report_delta: transition.report_delta,
            verify_count,
            report_count,
            user_vote: transition.next,
        })
    }
}
