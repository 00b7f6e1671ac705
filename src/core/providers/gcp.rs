//! GCP through its REST APIs with a gcloud-issued OAuth token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::core::error::CloudError;
use crate::core::models::account::AccountInfo;
use crate::core::models::cost::CostInfo;
use crate::core::models::resource::{Reservation, StoppedInstance, UnusedIp, UnusedVolume};
use crate::core::normalize::gcp as normalize;
use crate::core::period::{self, BillingPeriod};
use crate::core::providers::capability::{CostSource, IdentitySource, ResourceSource};
use crate::core::providers::http::{resolve_token, BearerClient};
use crate::core::providers::Provider;

const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
const COMPUTE_API: &str = "https://compute.googleapis.com/compute/v1";
const RESOURCE_MANAGER_API: &str = "https://cloudresourcemanager.googleapis.com/v1";
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const QUERY_TIMEOUT_MS: u64 = 60_000;
const TREND_MONTHS: u32 = 6;

pub struct GcpApi {
    project: String,
    billing_account: Option<String>,
    client: OnceCell<BearerClient>,
}

fn upstream(err: anyhow::Error) -> CloudError {
    CloudError::upstream(Provider::Gcp, err)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl GcpApi {
    pub fn new(project: String, billing_account: Option<String>) -> Self {
        Self {
            project,
            billing_account,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&BearerClient> {
        self.client
            .get_or_try_init(|| async {
                let token = resolve_token(TOKEN_ENV, "gcloud", &["auth", "print-access-token"]).await?;
                Ok::<_, anyhow::Error>(BearerClient::new("GCP", token))
            })
            .await
    }

    fn billing_table(&self) -> Result<String, CloudError> {
        let account = self
            .billing_account
            .as_deref()
            .ok_or(CloudError::MissingIdentifier {
                provider: Provider::Gcp,
                flag: "--billing-account",
                help: None,
            })?;
        Ok(normalize::billing_table(&self.project, account))
    }

    async fn query(&self, sql: String) -> Result<normalize::QueryResponse> {
        let url = format!("{}/projects/{}/queries", BIGQUERY_API, self.project);
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        self.client()
            .await?
            .post_json(&url, &body)
            .await
            .context("BigQuery billing export query failed")
    }

    /// Every entry of a Compute Engine aggregated list, following page tokens.
    async fn aggregated<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>> {
        let client = self.client().await?;
        let base = format!("{}/projects/{}/aggregated/{}", COMPUTE_API, self.project, kind);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page: normalize::AggregatedList<T> = client
                .get_json_query(&base, &query)
                .await
                .with_context(|| format!("Listing Compute Engine {} failed", kind))?;
            page_token = page.next_page_token.clone().filter(|t| !t.is_empty());
            entries.extend(page.into_entries());
            if page_token.is_none() {
                return Ok(entries);
            }
        }
    }

    async fn costs_by_service(&self, period: BillingPeriod) -> Result<CostInfo, CloudError> {
        let sql = normalize::services_query(&self.billing_table()?, &period);
        let resp = self.query(sql).await.map_err(upstream)?;
        normalize::costs_by_service(&resp, &period).map_err(upstream)
    }

    async fn total(&self, period: BillingPeriod) -> Result<String, CloudError> {
        let sql = normalize::total_query(&self.billing_table()?, &period);
        let resp = self.query(sql).await.map_err(upstream)?;
        normalize::period_total(&resp).map_err(upstream)
    }
}

#[async_trait]
impl IdentitySource for GcpApi {
    async fn account_info(&self) -> Result<AccountInfo, CloudError> {
        let url = format!("{}/projects/{}", RESOURCE_MANAGER_API, self.project);
        let client = self.client().await.map_err(upstream)?;
        let project: normalize::Project = client
            .get_json(&url)
            .await
            .context("Resource Manager projects.get failed")
            .map_err(upstream)?;
        Ok(normalize::account_info(project))
    }
}

#[async_trait]
impl CostSource for GcpApi {
    async fn current_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
        self.costs_by_service(period::current_month(today())).await
    }

    async fn last_month_costs_by_service(&self) -> Result<CostInfo, CloudError> {
        self.costs_by_service(period::last_month(today())).await
    }

    async fn current_month_total(&self) -> Result<String, CloudError> {
        self.total(period::current_month(today())).await
    }

    async fn last_month_total(&self) -> Result<String, CloudError> {
        self.total(period::last_month(today())).await
    }

    async fn last_six_months_costs(&self) -> Result<Vec<CostInfo>, CloudError> {
        let months = period::trailing_months(today(), TREND_MONTHS);
        let sql = normalize::monthly_query(&self.billing_table()?, &months).map_err(upstream)?;
        let resp = self.query(sql).await.map_err(upstream)?;
        normalize::monthly_totals(&resp, &months).map_err(upstream)
    }
}

#[async_trait]
impl ResourceSource for GcpApi {
    async fn unused_volumes(&self) -> Result<Vec<UnusedVolume>, CloudError> {
        let disks: Vec<normalize::Disk> = self.aggregated("disks").await.map_err(upstream)?;
        Ok(normalize::unused_disks(disks))
    }

    async fn unused_ips(&self) -> Result<Vec<UnusedIp>, CloudError> {
        let addresses: Vec<normalize::ComputeAddress> = self.aggregated("addresses").await.map_err(upstream)?;
        Ok(normalize::unused_addresses(addresses))
    }

    async fn stopped_instances(
        &self,
    ) -> Result<(Vec<StoppedInstance>, Vec<UnusedVolume>), CloudError> {
        let instances: Vec<normalize::ComputeInstance> = self.aggregated("instances").await.map_err(upstream)?;
        Ok(normalize::long_stopped_instances(instances, Utc::now()))
    }

    async fn expiring_reservations(&self) -> Result<Vec<Reservation>, CloudError> {
        let commitments: Vec<normalize::Commitment> = self.aggregated("commitments").await.map_err(upstream)?;
        Ok(normalize::expiring_commitments(commitments, Utc::now()))
    }
}
