use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Deserialize;

use super::config::GatewayConfig;
use super::cookies::{self, SessionJar, TokenLifetimes};
use super::error::GatewayError;
use super::proxy::{ProxyForwarder, is_truthy};
use super::session::session_gate;
use super::state::GatewayState;
use super::types::{CredentialBundle, Session};
use crate::csrf;
use crate::oauth::{Grant, OAuth2Access, OAuthClient};

const LOGIN_FAILURE_MSG: &str = "Malformed request.";

/// Create the gateway router.
///
/// Status checks and the proxy run behind the session gate; login, consent
/// redirect and logout read cookies directly.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] if the upstream HTTP client cannot be built.
pub fn gateway_routes(config: GatewayConfig) -> Result<Router, GatewayError> {
    let settings = config.settings;

    let http = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .read_timeout(settings.upstream_timeout)
        .build()
        .map_err(|e| GatewayError::Config(format!("HTTP client: {e}")))?;

    let state = GatewayState {
        client: Arc::new(OAuthClient::new(config.oauth).with_http_client(http.clone())),
        proxy: Arc::new(ProxyForwarder::new(http, settings.api_base.clone())),
        settings: Arc::new(settings),
    };

    let gated = Router::new()
        .route("/internal/check-elevated", get(check_elevated))
        .route("/internal/check-write-access", get(check_write_access))
        .route(
            "/proxy-api",
            get(proxy_api)
                .post(proxy_api)
                .put(proxy_api)
                .delete(proxy_api),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), session_gate));

    let router = Router::new()
        .route("/internal/login-credentials", post(login_credentials))
        .route("/internal/elevated-credentials", post(elevated_credentials))
        .route("/internal/authorize", get(authorize))
        .route("/logout", get(logout))
        .merge(gated);

    Ok(router.with_state(state))
}

// ── Status checks ──────────────────────────────────────────────────

async fn check_elevated(session: Session) -> Result<StatusCode, GatewayError> {
    if session.credentials.has_elevated_pair() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GatewayError::Unauthorized)
    }
}

async fn check_write_access(session: Session) -> Result<StatusCode, GatewayError> {
    if session.identity.can_write() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GatewayError::Unauthorized)
    }
}

// ── Proxy ──────────────────────────────────────────────────────────

async fn proxy_api(
    State(state): State<GatewayState>,
    session: Session,
    request: Request,
) -> Result<Response, GatewayError> {
    state.proxy.forward(request, &session.credentials).await
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginCredentials {
    auth_code: Option<String>,
    state_code: Option<String>,
}

async fn login_credentials(
    State(state): State<GatewayState>,
    jar: SessionJar,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> Response {
    let access = match complete_code_flow(&state, &jar, payload, Grant::Base).await {
        Ok(access) => access,
        Err(reason) => return login_rejected(jar, reason),
    };

    let bundle = CredentialBundle {
        auth_token: Some(access.access_token),
        refresh_token: access.refresh_token,
        ..Default::default()
    };
    let lifetimes = TokenLifetimes {
        base: access.expires_in,
        elevated: None,
    };
    let jar = cookies::encode(&bundle, &lifetimes, jar, &state.settings.cookie_policy());

    tracing::info!("Base session login successful");
    (jar, StatusCode::OK).into_response()
}

async fn elevated_credentials(
    State(state): State<GatewayState>,
    jar: SessionJar,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> Response {
    let access = match complete_code_flow(&state, &jar, payload, Grant::Elevated).await {
        Ok(access) => access,
        Err(reason) => return login_rejected(jar, reason),
    };

    let Some(refresh_token) = access.refresh_token else {
        return login_rejected(jar, "missing_refresh_token");
    };

    let account_id = match state.client.fetch_account_id(&access.access_token).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Elevated account resolution failed");
            return login_rejected(jar, "identity_failed");
        }
    };

    let bundle = CredentialBundle {
        elevated_token: Some(access.access_token),
        elevated_refresh_token: Some(refresh_token),
        authorized_account_id: Some(account_id),
        ..cookies::decode(&jar)
    };
    let lifetimes = TokenLifetimes {
        base: None,
        elevated: access.expires_in,
    };
    let jar = cookies::encode(&bundle, &lifetimes, jar, &state.settings.cookie_policy());

    tracing::info!("Elevated session login successful");
    (jar, StatusCode::OK).into_response()
}

/// Validate state against the nonce cookie, exchange the code and confirm the
/// new access token is accepted upstream.
async fn complete_code_flow(
    state: &GatewayState,
    jar: &SessionJar,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
    grant: Grant,
) -> Result<OAuth2Access, &'static str> {
    let Json(credentials) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Unreadable login payload");
        "invalid_payload"
    })?;

    let code = credentials.auth_code.ok_or("missing_code")?;

    let nonce = cookies::get_nonce(jar);
    if !csrf::validate_state(
        nonce.as_deref(),
        credentials.state_code.as_deref(),
        &state.settings.salt,
    ) {
        tracing::warn!(?grant, "OAuth state mismatch");
        return Err("state_mismatch");
    }

    let access = state
        .client
        .exchange_code(&code, state.client.config().redirect_uri(grant))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, ?grant, "Token exchange failed");
            "token_exchange_failed"
        })?;

    if !state.client.validate_access_token(&access.access_token).await {
        tracing::warn!(?grant, "Exchanged access token rejected upstream");
        return Err("token_validation_failed");
    }

    Ok(access)
}

fn login_rejected(jar: SessionJar, reason: &'static str) -> Response {
    tracing::debug!(reason, "Login rejected");
    (
        cookies::clear_all(jar),
        GatewayError::MalformedRequest(LOGIN_FAILURE_MSG),
    )
        .into_response()
}

// ── Consent redirect ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthorizeParams {
    #[serde(default)]
    elevate: Option<String>,
}

async fn authorize(
    State(state): State<GatewayState>,
    jar: SessionJar,
    Query(params): Query<AuthorizeParams>,
) -> (SessionJar, Redirect) {
    let grant = match params.elevate.as_deref() {
        Some(flag) if is_truthy(flag) => Grant::Elevated,
        _ => Grant::Base,
    };

    let nonce = csrf::generate_nonce();
    let consent_state = csrf::derive_state(&nonce, &state.settings.salt);
    let url = state.client.authorization_url(&consent_state, grant);

    let jar = cookies::set_nonce(jar, &nonce, &state.settings.cookie_policy());
    (jar, Redirect::to(url.as_str()))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(State(state): State<GatewayState>, jar: SessionJar) -> (SessionJar, Redirect) {
    (cookies::clear_all(jar), Redirect::to(&state.settings.login_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::SessionIdentity;
    use crate::types::AccountId;

    fn session_for(requesting: Option<&str>, authorized: Option<&str>) -> Session {
        Session {
            identity: SessionIdentity {
                requesting_account_id: requesting.map(AccountId::from),
                authorized_account_id: authorized.map(AccountId::from),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_check_write_access_same_account() {
        let status = check_write_access(session_for(Some("A1"), Some("A1")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_check_write_access_other_account() {
        let response = check_write_access(session_for(Some("A1"), Some("A2")))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_check_write_access_without_requesting_account() {
        for authorized in [Some("A1"), None] {
            let response = check_write_access(session_for(None, authorized))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_check_elevated_needs_pair() {
        let mut session = Session::default();
        session.credentials.elevated_token = Some("e".into());
        assert!(check_elevated(session.clone()).await.is_err());

        session.credentials.elevated_refresh_token = Some("er".into());
        assert_eq!(check_elevated(session).await.unwrap(), StatusCode::NO_CONTENT);
    }
}
