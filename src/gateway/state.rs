use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::GatewaySettings;
use super::proxy::ProxyForwarder;
use crate::oauth::OAuthClient;

/// Shared state for gateway handlers and the session gate.
///
/// Holds no session data: everything per-user lives in the client's cookies.
/// The `reqwest::Client` inside both members is the same connection pool.
#[derive(Clone)]
pub(super) struct GatewayState {
    pub(super) client: Arc<OAuthClient>,
    pub(super) proxy: Arc<ProxyForwarder>,
    pub(super) settings: Arc<GatewaySettings>,
}

// SessionJar decrypts with the key held in state
impl FromRef<GatewayState> for Key {
    fn from_ref(state: &GatewayState) -> Self {
        state.settings.cookie_key.clone()
    }
}
