#![doc = include_str!("../README.md")]

pub mod csrf;
pub mod error;
pub mod gateway;
pub mod oauth;
pub mod types;

// Re-exports for convenient access
pub use csrf::{derive_state, generate_nonce, validate_state};
pub use error::Error;
pub use gateway::{GatewayConfig, GatewayError, gateway_routes};
pub use oauth::{Grant, OAuth2Access, OAuthClient, OAuthConfig};
pub use types::{AccessToken, AccountId, RefreshToken};
