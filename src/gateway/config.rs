use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::cookies::CookiePolicy;
use super::error::GatewayError;
use crate::oauth::OAuthConfig;

/// Shared gateway settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct GatewaySettings {
    pub(crate) api_base: Url,
    pub(crate) salt: Vec<u8>,
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) session_ttl_days: i64,
    pub(crate) nonce_ttl_minutes: i64,
    pub(crate) connect_timeout: Duration,
    pub(crate) upstream_timeout: Duration,
    pub(crate) login_path: String,
}

impl GatewaySettings {
    fn defaults(api_base: Url, salt: Vec<u8>) -> Self {
        Self {
            api_base,
            salt,
            cookie_key: Key::generate(),
            secure_cookies: false,
            session_ttl_days: 30,
            nonce_ttl_minutes: 10,
            connect_timeout: Duration::from_secs(10),
            upstream_timeout: Duration::from_secs(60),
            login_path: "/login".into(),
        }
    }

    pub(crate) fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.secure_cookies,
            ttl_days: self.session_ttl_days,
            nonce_ttl_minutes: self.nonce_ttl_minutes,
        }
    }
}

/// Gateway configuration.
///
/// Required fields (`oauth`, `api_base`, `salt`) are constructor parameters.
///
/// Use [`from_env()`](GatewayConfig::from_env) for convention-based setup,
/// or [`new()`](GatewayConfig::new) with `with_*` methods for full control.
pub struct GatewayConfig {
    pub(super) oauth: OAuthConfig,
    pub(super) settings: GatewaySettings,
}

impl GatewayConfig {
    /// Create config for an upstream API root and state-signing secret.
    ///
    /// A trailing `/` is added to `api_base` when missing so upstream paths
    /// always resolve beneath it.
    #[must_use]
    pub fn new(oauth: OAuthConfig, api_base: Url, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            oauth,
            settings: GatewaySettings::defaults(with_trailing_slash(api_base), salt.into()),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CLOUD_ID`: upstream API account namespace
    /// - `SALT`: secret keying the `OAuth2` state derivation
    /// - `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`: `OAuth2` app credentials
    /// - `OAUTH_REDIRECT_URI`: callback URI of the base login flow
    ///
    /// # Optional env vars
    /// - `COOKIE_KEY`: credential-cookie encryption key, at least 64 bytes.
    ///   Without it an ephemeral key is generated and sessions end on restart.
    /// - `ENVIRONMENT`: `PRODUCTION` (any case) enables `Secure` cookies
    /// - `OAUTH_ELEVATED_REDIRECT_URI`: callback URI of the elevated flow
    /// - `OAUTH_AUTH_URL`, `OAUTH_TOKEN_URL`, `OAUTH_IDENTITY_URL`,
    ///   `OAUTH_RESOURCES_URL`: identity-provider endpoint overrides
    /// - `OAUTH_SCOPES`, `OAUTH_ELEVATED_SCOPES`: comma-separated scopes
    /// - `UPSTREAM_API_BASE`: override the API root derived from `CLOUD_ID`
    /// - `UPSTREAM_TIMEOUT_SECS`: read timeout for upstream calls
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, GatewayError> {
        let cloud_id = required("CLOUD_ID")?;
        let salt = required("SALT")?;
        let client_id = required("OAUTH_CLIENT_ID")?;
        let client_secret = required("OAUTH_CLIENT_SECRET")?;
        let redirect_uri = parse_url("OAUTH_REDIRECT_URI", &required("OAUTH_REDIRECT_URI")?)?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, redirect_uri);

        if let Some(url) = optional_url("OAUTH_ELEVATED_REDIRECT_URI")? {
            oauth = oauth.with_elevated_redirect_uri(url);
        }
        if let Some(url) = optional_url("OAUTH_AUTH_URL")? {
            oauth = oauth.with_auth_url(url);
        }
        if let Some(url) = optional_url("OAUTH_TOKEN_URL")? {
            oauth = oauth.with_token_url(url);
        }
        if let Some(url) = optional_url("OAUTH_IDENTITY_URL")? {
            oauth = oauth.with_identity_url(url);
        }
        if let Some(url) = optional_url("OAUTH_RESOURCES_URL")? {
            oauth = oauth.with_resources_url(url);
        }
        if let Ok(scopes) = std::env::var("OAUTH_SCOPES") {
            oauth = oauth.with_scopes(split_scopes(&scopes));
        }
        if let Ok(scopes) = std::env::var("OAUTH_ELEVATED_SCOPES") {
            oauth = oauth.with_elevated_scopes(split_scopes(&scopes));
        }

        let api_base = match optional_url("UPSTREAM_API_BASE")? {
            Some(url) => url,
            None => jira_api_base(&cloud_id)?,
        };

        let production = std::env::var("ENVIRONMENT")
            .is_ok_and(|env| env.eq_ignore_ascii_case("PRODUCTION"));

        let mut config = Self::new(oauth, api_base, salt).with_secure_cookies(production);

        match std::env::var("COOKIE_KEY") {
            Ok(key) => {
                let key = Key::try_from(key.as_bytes()).map_err(|_| {
                    GatewayError::Config("COOKIE_KEY must be at least 64 bytes".into())
                })?;
                config = config.with_cookie_key(key);
            }
            Err(_) => tracing::warn!("COOKIE_KEY not set, sessions will not survive a restart"),
        }

        if let Ok(secs) = std::env::var("UPSTREAM_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| GatewayError::Config(format!("UPSTREAM_TIMEOUT_SECS: {e}")))?;
            config = config.with_upstream_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Key encrypting the credential cookies. Every instance serving the same
    /// users needs the same key.
    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_nonce_ttl_minutes(mut self, minutes: i64) -> Self {
        self.settings.nonce_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = timeout;
        self
    }

    /// Read timeout for upstream calls. Applies per read, so long streamed
    /// transfers are bounded by stalls rather than total duration.
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.settings.upstream_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.settings.login_path = path.into();
        self
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.settings.api_base
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.settings.secure_cookies
    }
}

/// Jira Cloud REST root for a site's cloud id.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] if the cloud id does not form a valid URL.
pub fn jira_api_base(cloud_id: &str) -> Result<Url, GatewayError> {
    if cloud_id.is_empty() || cloud_id.contains(['/', '?', '#']) {
        return Err(GatewayError::Config(format!("CLOUD_ID: invalid value {cloud_id:?}")));
    }
    parse_url(
        "CLOUD_ID",
        &format!("https://api.atlassian.com/ex/jira/{cloud_id}/"),
    )
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn required(name: &str) -> Result<String, GatewayError> {
    non_empty(name, std::env::var(name).ok())
}

fn non_empty(name: &str, value: Option<String>) -> Result<String, GatewayError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GatewayError::Config(format!("{name} is required and must not be empty")))
}

fn optional_url(name: &str) -> Result<Option<Url>, GatewayError> {
    std::env::var(name)
        .ok()
        .map(|value| parse_url(name, &value))
        .transpose()
}

fn parse_url(name: &str, value: &str) -> Result<Url, GatewayError> {
    value
        .parse()
        .map_err(|e| GatewayError::Config(format!("{name}: {e}")))
}

fn split_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
