//! Azure through Azure Resource Manager with an `az`-issued token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::core::error::CloudError;
use crate::core::models::account::AccountInfo;
use crate::core::models::cost::CostInfo;
use crate::core::models::resource::{Reservation, StoppedInstance, UnusedIp, UnusedVolume};
use crate::core::normalize::azure as normalize;
use crate::core::period::{self, BillingPeriod};
use crate::core::providers::capability::{CostSource, IdentitySource, ResourceSource};
use crate::core::providers::http::{resolve_token, BearerClient};
use crate::core::providers::Provider;

const ARM: &str = "https://management.azure.com";
const TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
const TREND_MONTHS: u32 = 6;

const SUBSCRIPTIONS_API: &str = "2022-12-01";
const COST_MANAGEMENT_API: &str = "2023-03-01";
const COMPUTE_API: &str = "2024-03-01";
const DISKS_API: &str = "2023-04-02";
const NETWORK_API: &str = "2023-09-01";
const CAPACITY_API: &str = "2022-11-01";

pub struct AzureApi {
    subscription: String,
    client: OnceCell<BearerClient>,
}

fn upstream(err: anyhow::Error) -> CloudError {
    CloudError::upstream(Provider::Azure, err)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl AzureApi {
    pub fn new(subscription: String) -> Self {
        Self {
            subscription,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&BearerClient> {
        self.client
            .get_or_try_init(|| async {
                let token = resolve_token(
                    TOKEN_ENV,
                    "az",
                    &["account", "get-access-token", "--query", "accessToken", "-o", "tsv"],
                )
                .await?;
                Ok::<_, anyhow::Error>(BearerClient::new("Azure", token))
            })
            .await
    }

    fn subscription_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}{}?api-version={}",
            ARM, self.subscription, path, api_version
        )
    }

    /// Cost Management query, following `nextLink` pages and concatenating rows.
    async fn query(&self, body: Value) -> Result<normalize::QueryResult> {
        let client = self.client().await?;
        let url = self.subscription_url(
            "/providers/Microsoft.CostManagement/query",
            COST_MANAGEMENT_API,
        );
        let mut result: normalize::QueryResult = client
            .post_json(&url, &body)
            .await
            .context("Cost Management query failed")?;
        while let Some(next) = result.properties.next_link.take().filter(|l| !l.is_empty()) {
            let page: normalize::QueryResult = client
                .post_json(&next, &body)
                .await
                .context("Cost Management query page failed")?;
            result.properties.rows.extend(page.properties.rows);
            result.properties.next_link = page.properties.next_link;
        }
        Ok(result)
    }

    /// Every item of an ARM list, following `nextLink`.
    async fn list<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<Vec<T>> {
        let client = self.client().await?;
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: normalize::ListResponse<T> = client
                .get_json(&url)
                .await
                .with_context(|| format!("Listing {} failed", what))?;
            items.extend(page.value);
            next = page.next_link.filter(|l| !l.is_empty());
        }
        Ok(items)
    }

    async fn costs_by_service(&self, period: BillingPeriod) -> Result<CostInfo, CloudError> {
        let result = self
            .query(normalize::services_query(&period))
            .await
            .map_err(upstream)?;
        normalize::costs_by_service(&result, &period).map_err(upstream)
    }

    async fn total(&self, period: BillingPeriod) -> Result<String, CloudError> {
        let result = self
            .query(normalize::total_query(&period))
            .await
            .map_err(upstream)?;
        normalize::period_total(&result).map_err(upstream)
    }
}

#[async_trait]
impl IdentitySource for AzureApi {
    async fn account_info(&self) -> Result<AccountInfo, CloudError> {
        let url = self.subscription_url("", SUBSCRIPTIONS_API);
        let client = self.client().await.map_err(upstream)?;
        let sub: normalize::Subscription = client
            .get_json(&url)
            .await
            .context("Reading subscription failed")
            .map_err(upstream)?;
        Ok(normalize::account_info(sub))
    }
}

#[async_trait]
impl CostSource for AzureApi {
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
        let body = normalize::monthly_query(&months).map_err(upstream)?;
        let result = self.query(body).await.map_err(upstream)?;
        normalize::monthly_totals(&result, &months).map_err(upstream)
    }
}

#[async_trait]
impl ResourceSource for AzureApi {
    async fn unused_volumes(&self) -> Result<Vec<UnusedVolume>, CloudError> {
        let url = self.subscription_url("/providers/Microsoft.Compute/disks", DISKS_API);
        let disks: Vec<normalize::ManagedDisk> =
            self.list(url, "managed disks").await.map_err(upstream)?;
        Ok(normalize::unattached_disks(disks))
    }

    async fn unused_ips(&self) -> Result<Vec<UnusedIp>, CloudError> {
        let url = self.subscription_url(
            "/providers/Microsoft.Network/publicIPAddresses",
            NETWORK_API,
        );
        let ips: Vec<normalize::PublicIp> =
            self.list(url, "public IP addresses").await.map_err(upstream)?;
        Ok(normalize::unassociated_ips(ips))
    }

    async fn stopped_instances(
        &self,
    ) -> Result<(Vec<StoppedInstance>, Vec<UnusedVolume>), CloudError> {
        let url = format!(
            "{}&statusOnly=true",
            self.subscription_url("/providers/Microsoft.Compute/virtualMachines", COMPUTE_API)
        );
        let vms: Vec<normalize::VirtualMachine> =
            self.list(url, "virtual machines").await.map_err(upstream)?;
        Ok(normalize::deallocated_vms(vms))
    }

    async fn expiring_reservations(&self) -> Result<Vec<Reservation>, CloudError> {
        let url = format!(
            "{}/providers/Microsoft.Capacity/reservationOrders?api-version={}",
            ARM, CAPACITY_API
        );
        let orders: Vec<normalize::ReservationOrder> =
            self.list(url, "reservation orders").await.map_err(upstream)?;
        Ok(normalize::expiring_reservations(orders, Utc::now()))
    }
}
