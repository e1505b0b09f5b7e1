// Endpoint and transport settings for the client. Defaults point at the
// production vendor backend; tests and staging override the URLs.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.tonie.cloud/v2";
pub const DEFAULT_TOKEN_URL: &str =
    "https://login.tonies.com/auth/realms/tonies/protocol/openid-connect/token";
pub const DEFAULT_CLIENT_ID: &str = "my-tonies";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: String,
    /// `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Known `Config.maxBytes`; when `None` every upload request reads `/config`.
    pub max_upload_bytes: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            client_id: DEFAULT_CLIENT_ID.into(),
            timeout: None,
            max_upload_bytes: None,
        }
    }
}

impl ClientSettings {
    /// Defaults, overridden by `TONIE_API_BASE_URL`, `TONIE_TOKEN_URL` and
    /// `TONIE_HTTP_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = ClientSettings::default();
        if let Some(url) = lookup("TONIE_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            settings.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("TONIE_TOKEN_URL").filter(|v| !v.trim().is_empty()) {
            settings.token_url = url.trim().to_string();
        }
        let timeout = lookup("TONIE_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0);
        match timeout {
            Some(secs) => settings.with_timeout(Duration::from_secs(secs)),
            None => settings,
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_upload_bytes(mut self, max_bytes: u64) -> Self {
        self.max_upload_bytes = Some(max_bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_target_vendor_endpoints() {
        let settings = ClientSettings::default();
        assert_eq!(settings.api_base_url, "https://api.tonie.cloud/v2");
        assert_eq!(settings.client_id, "my-tonies");
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TONIE_API_BASE_URL", "http://localhost:9000/v2/"),
            ("TONIE_HTTP_TIMEOUT_SECS", "15"),
        ]);
        let settings = ClientSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.api_base_url, "http://localhost:9000/v2");
        assert_eq!(settings.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(settings.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn invalid_timeout_is_ignored() {
        let settings = ClientSettings::from_lookup(|k| {
            (k == "TONIE_HTTP_TIMEOUT_SECS").then(|| "abc".to_string())
        });
        assert_eq!(settings.timeout, None);
    }
}
