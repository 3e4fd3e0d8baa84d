use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::types::{AccessToken, AccountId, RefreshToken};

/// Which credential domain an authorization flow mints tokens for.
///
/// The base grant is the logged-in user's normal session; the elevated grant
/// is obtained separately with write scopes. They never share tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Base,
    Elevated,
}

/// Identity-provider `OAuth2` configuration.
///
/// Required fields are constructor parameters, so there is no runtime "missing field" error.
///
/// ```rust,ignore
/// use tracker_gateway::OAuthConfig;
///
/// let config = OAuthConfig::new("client-id", "client-secret", "https://app.example.com/callback".parse()?);
/// let config = config.with_token_url("http://127.0.0.1:9000/oauth/token".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) audience: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) identity_url: Url,
    pub(crate) resources_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) elevated_redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) elevated_scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new `OAuth2` configuration pointing at the Atlassian identity platform.
    ///
    /// The elevated flow reuses `redirect_uri` until overridden.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: "api.atlassian.com".into(),
            auth_url: "https://auth.atlassian.com/authorize"
                .parse()
                .expect("valid default URL"),
            token_url: "https://auth.atlassian.com/oauth/token"
                .parse()
                .expect("valid default URL"),
            identity_url: "https://api.atlassian.com/me"
                .parse()
                .expect("valid default URL"),
            resources_url: "https://api.atlassian.com/oauth/token/accessible-resources"
                .parse()
                .expect("valid default URL"),
            elevated_redirect_uri: redirect_uri.clone(),
            redirect_uri,
            scopes: vec![
                "read:jira-work".into(),
                "read:jira-user".into(),
                "offline_access".into(),
            ],
            elevated_scopes: vec![
                "read:jira-work".into(),
                "write:jira-work".into(),
                "read:jira-user".into(),
                "offline_access".into(),
            ],
        }
    }

    /// Override the consent-screen endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint (code exchange and refresh).
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the identity endpoint used to resolve account ids.
    #[must_use]
    pub fn with_identity_url(mut self, url: Url) -> Self {
        self.identity_url = url;
        self
    }

    /// Override the endpoint used for access-token validation.
    #[must_use]
    pub fn with_resources_url(mut self, url: Url) -> Self {
        self.resources_url = url;
        self
    }

    #[must_use]
    pub fn with_elevated_redirect_uri(mut self, url: Url) -> Self {
        self.elevated_redirect_uri = url;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_elevated_scopes(mut self, scopes: Vec<String>) -> Self {
        self.elevated_scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn identity_url(&self) -> &Url {
        &self.identity_url
    }

    /// Redirect URI registered for a grant.
    #[must_use]
    pub fn redirect_uri(&self, grant: Grant) -> &Url {
        match grant {
            Grant::Base => &self.redirect_uri,
            Grant::Elevated => &self.elevated_redirect_uri,
        }
    }

    /// Scopes requested for a grant.
    #[must_use]
    pub fn scopes(&self, grant: Grant) -> &[String] {
        match grant {
            Grant::Base => &self.scopes,
            Grant::Elevated => &self.elevated_scopes,
        }
    }
}

/// Tokens minted by a code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Access {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    /// Access-token lifetime in seconds, when the provider reports it.
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum TokenRequest<'a> {
    AuthorizationCode {
        client_id: &'a str,
        client_secret: &'a str,
        code: &'a str,
        redirect_uri: &'a str,
    },
    RefreshToken {
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct Identity {
    account_id: String,
}

/// Stateless `OAuth2` client for the identity provider.
///
/// Takes tokens in and returns tokens or validity out; holds no session state.
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the consent-screen URL for a grant, carrying `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str, grant: Grant) -> Url {
        let scope = self.config.scopes(grant).join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("audience", &self.config.audience)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &scope)
            .append_pair("redirect_uri", self.config.redirect_uri(grant).as_str())
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .append_pair("prompt", "consent");
        url
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or an unreadable body, and
    /// [`Error::OAuth`] if the token endpoint answers with a non-2xx status.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<OAuth2Access, Error> {
        let request = TokenRequest::AuthorizationCode {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            code,
            redirect_uri: redirect_uri.as_str(),
        };
        let token = self.token_request(&request, "code exchange").await?;

        Ok(OAuth2Access {
            access_token: AccessToken(token.access_token),
            refresh_token: token.refresh_token.map(RefreshToken),
            expires_in: token.expires_in,
        })
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Rotating providers return a new refresh token; otherwise the presented
    /// one stays valid and is returned unchanged. `refresh_token` is therefore
    /// always `Some`.
    ///
    /// # Errors
    ///
    /// Same as [`exchange_code`](Self::exchange_code).
    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<OAuth2Access, Error> {
        let request = TokenRequest::RefreshToken {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            refresh_token: refresh_token.as_str(),
        };
        let token = self.token_request(&request, "token refresh").await?;

        Ok(OAuth2Access {
            access_token: AccessToken(token.access_token),
            refresh_token: Some(
                token
                    .refresh_token
                    .map(RefreshToken)
                    .unwrap_or_else(|| refresh_token.clone()),
            ),
            expires_in: token.expires_in,
        })
    }

    /// Probe whether an access token is accepted upstream.
    ///
    /// Any failure, including network errors, reads as `false`.
    pub async fn validate_access_token(&self, token: &AccessToken) -> bool {
        match self
            .http
            .get(self.config.resources_url.clone())
            .bearer_auth(token.as_str())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Access token validation request failed");
                false
            }
        }
    }

    /// Resolve the account id the access token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the identity endpoint returns an error.
    pub async fn fetch_account_id(&self, token: &AccessToken) -> Result<AccountId, Error> {
        let response = self
            .http
            .get(self.config.identity_url.clone())
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let response = Self::ensure_success(response, "identity request").await?;
        let identity = response.json::<Identity>().await?;
        Ok(AccountId(identity.account_id))
    }

    async fn token_request(
        &self,
        request: &TokenRequest<'_>,
        operation: &'static str,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}
