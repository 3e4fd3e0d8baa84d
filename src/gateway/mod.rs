//! Cookie-backed session gate and authenticated REST proxy for Axum.
//!
//! All session state lives in client cookies, so any number of gateway
//! instances can serve the same users without shared storage.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tracker_gateway::gateway::{GatewayConfig, gateway_routes};
//!
//! let config = GatewayConfig::from_env()?;
//! let app = axum::Router::new().merge(gateway_routes(config)?);
//! ```
//!
//! # Routes
//!
//! - `GET /internal/authorize?elevate=<bool>`: nonce cookie + consent redirect
//! - `POST /internal/login-credentials`: base-session code exchange
//! - `POST /internal/elevated-credentials`: elevated-session code exchange
//! - `GET /internal/check-elevated`, `GET /internal/check-write-access`: 204/401
//! - `GET|POST|PUT|DELETE /proxy-api?pathname=…&elevate=…`: upstream proxy
//! - `GET /logout`: clear every cookie, redirect to the login page

mod config;
mod cookies;
mod error;
mod proxy;
mod routes;
mod session;
mod state;
mod types;

pub use config::{GatewayConfig, jira_api_base};
pub use error::GatewayError;
pub use proxy::{ORIGIN_LOCATION, ProxyForwarder};
pub use routes::gateway_routes;
pub use types::{CredentialBundle, Session, SessionIdentity};
