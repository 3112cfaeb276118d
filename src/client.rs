//! Authenticated CZDS API client: token lifecycle, link listing, raw report

use crate::auth::{Authenticator, Credentials, TokenCell};
use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::types::ZoneLink;

/// How much response body to keep in fetch error diagnostics
const ERROR_BODY_SNIPPET: usize = 256;

/// Client for the CZDS API.
///
/// Owns the HTTP connection pool, the authenticator, and the shared token
/// cell. Cloneable; clones share all three.
#[derive(Clone)]
pub struct CzdsClient {
    http: reqwest::Client,
    api_base_url: String,
    authenticator: Authenticator,
    token: TokenCell,
}

impl CzdsClient {
    /// Authenticate and build a ready-to-use client.
    ///
    /// This is the single up-front authentication; the token it yields is
    /// reused by every subsequent request until the server rejects it.
    pub async fn connect(config: &Config, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;

        let authenticator = Authenticator::new(
            http.clone(),
            config.endpoints.auth_base_url.clone(),
            credentials,
        );
        let token = TokenCell::new(authenticator.authenticate().await?);

        Ok(Self {
            http,
            api_base_url: config.endpoints.api_base_url.clone(),
            authenticator,
            token,
        })
    }

    /// The underlying HTTP client, shared with the download workers
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The shared token cell
    pub fn token(&self) -> &TokenCell {
        &self.token
    }

    /// The authenticator, for the single automatic refresh on expiry
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// The account identity this client authenticated as
    pub fn username(&self) -> &str {
        self.authenticator.username()
    }

    /// Fetch the set of zone file links available to this account.
    ///
    /// The API's ordering is preserved; an empty list is a valid result
    /// (zero current entitlements), not an error.
    pub async fn zone_links(&self) -> Result<Vec<ZoneLink>> {
        let url = format!("{}/czds/downloads/links", self.api_base_url);
        let response = self.authorized_get(&url).await?;

        let links: Vec<String> = response.json().await?;
        tracing::info!(count = links.len(), "Fetched zone links");

        Ok(links.into_iter().map(ZoneLink::from).collect())
    }

    /// Fetch the raw zone request report (CSV as served by the API)
    pub async fn report_csv(&self) -> Result<String> {
        let url = format!("{}/czds/requests/report", self.api_base_url);
        let response = self.authorized_get(&url).await?;

        Ok(response.text().await?)
    }

    /// GET with the current bearer token, refreshing it once on 401/403.
    ///
    /// The first rejection of a token is never surfaced to the caller; the
    /// request is retried with the fresh token and only a second rejection
    /// becomes an error.
    async fn authorized_get(&self, url: &str) -> Result<reqwest::Response> {
        let used = self.token.current().await;
        match self.get_with_token(url, &used).await {
            Err(ref e) if e.is_auth_expired() => {
                let fresh = self.token.refresh(&used, &self.authenticator).await?;
                self.get_with_token(url, &fresh).await
            }
            other => other,
        }
    }

    async fn get_with_token(&self, url: &str, token: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body_snippet(&body),
            }));
        }

        Ok(response)
    }
}

/// Truncate a response body for error diagnostics
pub(crate) fn body_snippet(body: &str) -> String {
    if body.len() <= ERROR_BODY_SNIPPET {
        body.to_string()
    } else {
        let mut end = ERROR_BODY_SNIPPET;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}
