use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use time::Duration;

use super::types::CredentialBundle;
use crate::types::{AccessToken, AccountId, RefreshToken};

pub(crate) const AUTH_TOKEN_COOKIE: &str = "authToken";
pub(crate) const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub(crate) const ELEVATED_TOKEN_COOKIE: &str = "elevatedToken";
pub(crate) const ELEVATED_REFRESH_TOKEN_COOKIE: &str = "elevatedRefreshToken";
pub(crate) const AUTHORIZED_ACCOUNT_COOKIE: &str = "authorizedAccountId";
pub(crate) const NONCE_COOKIE: &str = "user-nonce";

const CREDENTIAL_COOKIES: [&str; 5] = [
    AUTH_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    ELEVATED_TOKEN_COOKIE,
    ELEVATED_REFRESH_TOKEN_COOKIE,
    AUTHORIZED_ACCOUNT_COOKIE,
];

/// Attributes shared by every cookie the gateway writes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CookiePolicy {
    pub(crate) secure: bool,
    pub(crate) ttl_days: i64,
    pub(crate) nonce_ttl_minutes: i64,
}

/// Access-token lifetimes reported by the identity provider, in seconds.
///
/// Unknown lifetimes fall back to the session TTL.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TokenLifetimes {
    pub(crate) base: Option<u64>,
    pub(crate) elevated: Option<u64>,
}

/// One request's cookies, seen two ways.
///
/// `plain` holds every cookie the client sent and carries the nonce and all
/// removals of non-credential cookies. `sealed` encrypts and authenticates the
/// credential cookies; a credential cookie that fails to decrypt reads as
/// absent.
pub(crate) struct SessionJar {
    plain: CookieJar,
    sealed: PrivateCookieJar,
}

impl SessionJar {
    pub(crate) fn from_headers(headers: &HeaderMap, key: Key) -> Self {
        Self {
            plain: CookieJar::from_headers(headers),
            sealed: PrivateCookieJar::from_headers(headers, key),
        }
    }
}

impl<S> FromRequestParts<S> for SessionJar
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers, Key::from_ref(state)))
    }
}

impl IntoResponseParts for SessionJar {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let res = self.plain.into_response_parts(res)?;
        self.sealed.into_response_parts(res)
    }
}

/// Read the credential cookies into a bundle. No validation.
pub(crate) fn decode(jar: &SessionJar) -> CredentialBundle {
    let value = |name: &str| jar.sealed.get(name).map(|c| c.value().to_string());

    CredentialBundle {
        auth_token: value(AUTH_TOKEN_COOKIE).map(AccessToken),
        refresh_token: value(REFRESH_TOKEN_COOKIE).map(RefreshToken),
        elevated_token: value(ELEVATED_TOKEN_COOKIE).map(AccessToken),
        elevated_refresh_token: value(ELEVATED_REFRESH_TOKEN_COOKIE).map(RefreshToken),
        authorized_account_id: value(AUTHORIZED_ACCOUNT_COOKIE).map(AccountId),
    }
}

/// Make the response jar mirror `bundle`.
///
/// Defined slots are written, undefined credential slots and every
/// non-credential cookie from the inbound request are removed. A half elevated
/// pair is never written. A slot whose value the client already holds is left
/// alone unless a fresh lifetime is known, so its original expiry survives.
pub(crate) fn encode(
    bundle: &CredentialBundle,
    lifetimes: &TokenLifetimes,
    jar: SessionJar,
    policy: &CookiePolicy,
) -> SessionJar {
    let SessionJar { plain, mut sealed } = jar;

    let stray: Vec<String> = plain
        .iter()
        .map(|c| c.name().to_string())
        .filter(|name| !CREDENTIAL_COOKIES.contains(&name.as_str()))
        .collect();
    let plain = stray
        .into_iter()
        .fold(plain, |jar, name| jar.remove(removal_cookie(name)));

    let elevated_pair = bundle.has_elevated_pair();
    let slots = [
        (
            AUTH_TOKEN_COOKIE,
            bundle.auth_token.as_ref().map(AccessToken::as_str),
            lifetimes.base,
        ),
        (
            REFRESH_TOKEN_COOKIE,
            bundle.refresh_token.as_ref().map(RefreshToken::as_str),
            None,
        ),
        (
            ELEVATED_TOKEN_COOKIE,
            bundle
                .elevated_token
                .as_ref()
                .filter(|_| elevated_pair)
                .map(AccessToken::as_str),
            lifetimes.elevated,
        ),
        (
            ELEVATED_REFRESH_TOKEN_COOKIE,
            bundle
                .elevated_refresh_token
                .as_ref()
                .filter(|_| elevated_pair)
                .map(RefreshToken::as_str),
            None,
        ),
        (
            AUTHORIZED_ACCOUNT_COOKIE,
            bundle
                .authorized_account_id
                .as_ref()
                .filter(|_| elevated_pair)
                .map(AccountId::as_str),
            None,
        ),
    ];

    for (name, value, lifetime) in slots {
        sealed = match value {
            Some(value) => {
                let held = sealed.get(name).is_some_and(|c| c.value() == value);
                if held && lifetime.is_none() {
                    sealed
                } else {
                    sealed.add(credential_cookie(name, value, lifetime, policy))
                }
            }
            // Also drops a credential cookie that failed to decrypt.
            None => sealed.remove(removal_cookie(name.to_string())),
        };
    }

    SessionJar { plain, sealed }
}

/// Remove every cookie the client sent.
pub(crate) fn clear_all(jar: SessionJar) -> SessionJar {
    let SessionJar { plain, sealed } = jar;
    let names: Vec<String> = plain.iter().map(|c| c.name().to_string()).collect();
    let plain = names
        .into_iter()
        .fold(plain, |jar, name| jar.remove(removal_cookie(name)));
    SessionJar { plain, sealed }
}

/// Set the single-use nonce cookie for the consent round trip.
///
/// `SameSite=Lax` so it survives the top-level redirect back from the
/// identity provider. The nonce is not secret: the state it keys is an HMAC.
pub(crate) fn set_nonce(jar: SessionJar, nonce: &str, policy: &CookiePolicy) -> SessionJar {
    let cookie = Cookie::build((NONCE_COOKIE, nonce.to_string()))
        .http_only(true)
        .secure(policy.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::minutes(policy.nonce_ttl_minutes))
        .build();
    SessionJar {
        plain: jar.plain.add(cookie),
        ..jar
    }
}

/// Get the nonce from cookies.
pub(crate) fn get_nonce(jar: &SessionJar) -> Option<String> {
    jar.plain.get(NONCE_COOKIE).map(|c| c.value().to_string())
}

fn credential_cookie(
    name: &'static str,
    value: &str,
    lifetime_secs: Option<u64>,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    let ttl = Duration::days(policy.ttl_days);
    let max_age = lifetime_secs
        .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)).min(ttl))
        .unwrap_or(ttl);

    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(policy.secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(max_age)
        .build()
}

fn removal_cookie(name: String) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
