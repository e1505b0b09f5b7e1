// Token session: OAuth2 password grant against the vendor login realm.
// The access token lives only in memory and is attached as a bearer
// header to every API request. There is no refresh; an expired token
// shows up as an authentication error and the caller builds a new session.

use crate::error::{ErrorDetails, Result, TonieError};
use crate::settings::ClientSettings;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Username (email) and password for the password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

pub struct TokenSession {
    http: Client,
    token_url: String,
    client_id: String,
    credentials: Credentials,
    access_token: Option<String>,
}

impl TokenSession {
    pub fn new(http: Client, settings: &ClientSettings, credentials: Credentials) -> Self {
        TokenSession {
            http,
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            credentials,
            access_token: None,
        }
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Run the password grant and keep the returned access token.
    pub fn acquire_token(&mut self) -> Result<()> {
        debug!("requesting access token");
        let params = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("scope", "openid"),
            ("username", self.credentials.username()),
            ("password", self.credentials.password()),
        ];
        let res = self.http.post(&self.token_url).form(&params).send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(TonieError::Authentication(ErrorDetails {
                message: format!("token request rejected (HTTP {})", status.as_u16()),
                status: Some(status.as_u16()),
                body: self.scrub(body),
                retry_after: None,
            }));
        }

        let payload: TokenResponse = res.json()?;
        let token = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TonieError::authentication("token response missing access_token"))?;
        debug!(expires_in = payload.expires_in.unwrap_or(3600), "access token acquired");
        self.access_token = Some(token);
        Ok(())
    }

    /// Attach the bearer header, acquiring a token first if none is held.
    pub fn authorize(&mut self, req: RequestBuilder) -> Result<RequestBuilder> {
        if self.access_token.is_none() {
            self.acquire_token()?;
        }
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| TonieError::authentication("no access token available"))?;
        Ok(req.bearer_auth(token))
    }

    /// Keep the raw body for diagnostics unless it echoes a credential.
    fn scrub(&self, body: String) -> Option<String> {
        let username = self.credentials.username();
        let password = self.credentials.password();
        if body.is_empty()
            || (!username.is_empty() && body.contains(username))
            || (!password.is_empty() && body.contains(password))
        {
            return None;
        }
        Some(body)
    }
}

impl fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSession")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("has_token", &self.has_token())
            .finish()
    }
}
