//! Bearer-token JSON client shared by the REST adapters.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::core::process::{require_binary, run_command};

const TOKEN_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Validate that a resolved endpoint URL uses HTTPS.
///
/// Endpoint overrides must pass this before a token is attached to them.
pub fn validate_endpoint(url: &str, service: &str) -> Result<()> {
    if !url.starts_with("https://") {
        anyhow::bail!("{}: endpoint must use HTTPS, got: {}", service, url);
    }
    Ok(())
}

/// Access token from `env_var`, or from the stdout of a CLI login helper.
pub async fn resolve_token(env_var: &str, cmd: &str, args: &[&str]) -> Result<String> {
    if let Ok(token) = std::env::var(env_var) {
        if !token.trim().is_empty() {
            debug!(env_var, "using access token from environment");
            return Ok(token.trim().to_string());
        }
    }
    require_binary(cmd, &format!("install it or set {}", env_var))?;
    let token = run_command(cmd, args, TOKEN_COMMAND_TIMEOUT)
        .await
        .with_context(|| format!("Could not obtain an access token (set {} or log in with `{}`)", env_var, cmd))?;
    if token.is_empty() {
        anyhow::bail!("`{}` returned an empty access token", cmd);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct BearerClient {
    client: reqwest::Client,
    token: String,
    service: &'static str,
}

impl BearerClient {
    pub fn new(service: &'static str, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            service,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_query(url, &[]).await
    }

    /// GET with URL-encoded query parameters.
    pub async fn get_json_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.get_request(url, query)?;
        self.send(request).await
    }

    fn get_request(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::RequestBuilder> {
        validate_endpoint(url, self.service)?;
        debug!(service = self.service, url, ?query, "GET");
        let request = self.client.get(url);
        Ok(if query.is_empty() {
            request
        } else {
            request.query(query)
        })
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        validate_endpoint(url, self.service)?;
        debug!(service = self.service, url, "POST");
        let request = self.client.post(url).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.service))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            anyhow::bail!("Unauthorized - the {} access token was rejected or expired", self.service);
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Permission denied by {}: {}", self.service, body.trim());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {} from {}: {}", status.as_u16(), self.service, body.trim());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", self.service))
    }
}
