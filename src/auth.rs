//! Authentication against the CZDS token endpoint and shared token state

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Account credentials, immutable for the process lifetime.
///
/// Never persisted and never logged; the Debug impl redacts the password.
#[derive(Clone)]
pub struct Credentials {
    /// Account username (an email address)
    pub username: String,
    /// Account password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Exchanges credentials for bearer tokens.
///
/// Runs once up front; the download workers reuse it only for the single
/// automatic refresh after a token expiry.
#[derive(Clone)]
pub struct Authenticator {
    client: reqwest::Client,
    auth_base_url: String,
    credentials: Credentials,
}

impl Authenticator {
    /// Create an authenticator for the given endpoint and credentials
    pub fn new(client: reqwest::Client, auth_base_url: String, credentials: Credentials) -> Self {
        Self {
            client,
            auth_base_url,
            credentials,
        }
    }

    /// The account identity these credentials belong to.
    ///
    /// This is the value the report scrubber redacts.
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Exchange the credentials for a bearer token.
    ///
    /// A non-success status or a response without an `accessToken` field is
    /// an [`Error::Auth`], fatal for the run: bad credentials will not
    /// become valid on retry.
    pub async fn authenticate(&self) -> Result<String> {
        let url = format!("{}/api/authenticate", self.auth_base_url);
        tracing::info!(username = %self.credentials.username, "Authenticating with CZDS");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await
            .map_err(|e| Error::Auth {
                message: format!("cannot reach {url}: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth {
                message: format!("{url} returned HTTP {}", status.as_u16()),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| Error::Auth {
            message: format!("invalid authentication response: {e}"),
        })?;

        let token = body
            .get("accessToken")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Auth {
                message: "authentication response has no accessToken field".to_string(),
            })?;

        tracing::info!("Authentication succeeded");
        Ok(token.to_string())
    }
}

/// Shared bearer token with single-writer refresh discipline.
///
/// Readers borrow a clone per request via [`current`](TokenCell::current).
/// [`refresh`](TokenCell::refresh) holds the write lock across the
/// re-authentication call, so every worker pauses token reads while a
/// refresh is in flight, and a worker that arrives with an already-replaced
/// token gets the fresh one back without a redundant authentication call.
#[derive(Clone)]
pub struct TokenCell {
    inner: Arc<RwLock<String>>,
}

impl TokenCell {
    /// Wrap an initial token obtained from [`Authenticator::authenticate`]
    pub fn new(token: String) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    /// The current token, cloned out of the cell.
    ///
    /// Blocks while a refresh holds the write lock.
    pub async fn current(&self) -> String {
        self.inner.read().await.clone()
    }

    /// Replace an expired token, at most once per expiry window.
    ///
    /// `observed` is the token the caller just saw rejected. If the cell
    /// already holds a different token, another worker won the refresh and
    /// the stored token is returned as-is; otherwise a new token is fetched
    /// while the write lock keeps all other workers waiting.
    pub async fn refresh(&self, observed: &str, authenticator: &Authenticator) -> Result<String> {
        let mut guard = self.inner.write().await;
        if *guard != observed {
            tracing::debug!("Token already refreshed by another worker");
            return Ok(guard.clone());
        }

        tracing::info!("Bearer token rejected, re-authenticating");
        let fresh = authenticator.authenticate().await?;
        *guard = fresh.clone();
        Ok(fresh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "user@example.org".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("user@example.org"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn current_returns_stored_token() {
        let cell = TokenCell::new("tok-1".to_string());
        assert_eq!(cell.current().await, "tok-1");
    }
}
