use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use super::cookies::{self, SessionJar, TokenLifetimes};
use super::error::GatewayError;
use super::state::GatewayState;
use super::types::{CredentialBundle, Session, SessionIdentity};
use crate::oauth::{OAuth2Access, OAuthClient};
use crate::types::{AccessToken, RefreshToken};

/// Result of running the gate over one request's cookies.
#[derive(Debug)]
pub(crate) struct GateOutcome {
    pub(crate) session: Session,
    pub(crate) lifetimes: TokenLifetimes,
    /// A refresh succeeded, so cookies must be rotated on the response.
    pub(crate) rotated: bool,
}

enum PairOutcome {
    Unchanged,
    Refreshed(OAuth2Access),
    Failed,
}

/// Per-request session establishment: refresh, then identity resolution.
///
/// Never rejects a request; handlers decide what an incomplete session means.
pub(crate) struct SessionGate<'a> {
    client: &'a OAuthClient,
}

impl<'a> SessionGate<'a> {
    pub(crate) fn new(client: &'a OAuthClient) -> Self {
        Self { client }
    }

    pub(crate) async fn establish(&self, bundle: CredentialBundle) -> GateOutcome {
        let mut credentials = bundle;
        let mut lifetimes = TokenLifetimes::default();
        let mut rotated = false;

        match self
            .refresh_pair(&credentials.auth_token, &credentials.refresh_token, "base")
            .await
        {
            PairOutcome::Unchanged => {}
            PairOutcome::Refreshed(minted) => {
                credentials.auth_token = Some(minted.access_token);
                credentials.refresh_token = minted.refresh_token;
                lifetimes.base = minted.expires_in;
                rotated = true;
            }
            PairOutcome::Failed => {
                credentials.auth_token = None;
                credentials.refresh_token = None;
            }
        }

        // Elevated pair only ever refreshes with its own refresh token.
        match self
            .refresh_pair(
                &credentials.elevated_token,
                &credentials.elevated_refresh_token,
                "elevated",
            )
            .await
        {
            PairOutcome::Unchanged => {}
            PairOutcome::Refreshed(minted) => {
                credentials.elevated_token = Some(minted.access_token);
                credentials.elevated_refresh_token = minted.refresh_token;
                lifetimes.elevated = minted.expires_in;
                rotated = true;
            }
            PairOutcome::Failed => {
                credentials.elevated_token = None;
                credentials.elevated_refresh_token = None;
                credentials.authorized_account_id = None;
            }
        }

        let requesting_account_id = match &credentials.auth_token {
            Some(token) => match self.client.fetch_account_id(token).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "Requesting account resolution failed");
                    None
                }
            },
            None => None,
        };

        // The authorized account only counts next to the pair it was issued with.
        let authorized_account_id = credentials
            .authorized_account_id
            .clone()
            .filter(|_| credentials.has_elevated_pair());

        let identity = SessionIdentity {
            requesting_account_id,
            authorized_account_id,
        };

        GateOutcome {
            session: Session {
                credentials,
                identity,
            },
            lifetimes,
            rotated,
        }
    }

    /// A present access token is taken as valid; upstream rejects stale ones.
    async fn refresh_pair(
        &self,
        access: &Option<AccessToken>,
        refresh: &Option<RefreshToken>,
        domain: &'static str,
    ) -> PairOutcome {
        let (None, Some(refresh)) = (access, refresh) else {
            return PairOutcome::Unchanged;
        };

        match self.client.refresh(refresh).await {
            Ok(minted) => PairOutcome::Refreshed(minted),
            Err(e) => {
                tracing::warn!(error = %e, domain, "Token refresh failed, continuing without session");
                PairOutcome::Failed
            }
        }
    }
}

/// Middleware wrapping gated routes: establishes the [`Session`], hands it to
/// the handler, and rotates cookies onto the response after a refresh.
pub(crate) async fn session_gate(
    State(state): State<GatewayState>,
    jar: SessionJar,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = SessionGate::new(&state.client)
        .establish(cookies::decode(&jar))
        .await;

    let rotation = outcome.rotated.then(|| {
        cookies::encode(
            &outcome.session.credentials,
            &outcome.lifetimes,
            jar,
            &state.settings.cookie_policy(),
        )
    });

    request.extensions_mut().insert(outcome.session);
    let response = next.run(request).await;

    match rotation {
        Some(jar) => (jar, response).into_response(),
        None => response,
    }
}

/// Extract the session established by [`session_gate`].
///
/// Fails with a 500 only when a route was mounted without the gate.
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| GatewayError::Config("session gate not installed".into()))
    }
}
