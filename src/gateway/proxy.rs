use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{
    ACCEPT, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use url::Url;

use super::error::GatewayError;
use super::types::CredentialBundle;
use crate::types::AccessToken;

/// Response header carrying the final upstream URL after redirects.
pub const ORIGIN_LOCATION: HeaderName = HeaderName::from_static("origin-location");

const ATLASSIAN_TOKEN: HeaderName = HeaderName::from_static("x-atlassian-token");
const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Upstream response headers that describe framing or the hop, not the body.
const STRIPPED_RESPONSE_HEADERS: [HeaderName; 10] = [
    CONTENT_ENCODING,
    CONTENT_LENGTH,
    TRANSFER_ENCODING,
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    UPGRADE,
];

/// Parsed `/proxy-api` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProxyParams {
    pub(crate) pathname: String,
    pub(crate) elevate: bool,
    /// Every other query pair, in request order.
    pub(crate) passthrough: Vec<(String, String)>,
}

impl ProxyParams {
    pub(crate) fn from_query(query: Option<&str>) -> Result<Self, GatewayError> {
        let mut pathname = None;
        let mut elevate = false;
        let mut passthrough = Vec::new();

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "pathname" if pathname.is_none() => pathname = Some(value.into_owned()),
                "pathname" => {}
                "elevate" => elevate = is_truthy(&value),
                _ => passthrough.push((key.into_owned(), value.into_owned())),
            }
        }

        let pathname = pathname
            .filter(|p| !p.is_empty())
            .ok_or(GatewayError::MalformedRequest("Missing pathname parameter."))?;

        Ok(Self {
            pathname,
            elevate,
            passthrough,
        })
    }
}

pub(crate) fn is_truthy(value: &str) -> bool {
    ["true", "1", "yes"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}

/// Elevated token when elevation was asked for and exists, else the base token.
pub(crate) fn select_token(credentials: &CredentialBundle, elevate: bool) -> Option<&AccessToken> {
    match (&credentials.elevated_token, elevate) {
        (Some(elevated), true) => Some(elevated),
        _ => credentials.auth_token.as_ref(),
    }
}

/// Join `pathname` onto the API root and append the passthrough query.
///
/// Paths whose dot segments resolve outside the root are
/// rejected so a bearer token is only ever sent beneath `api_base`.
pub(crate) fn target_url(api_base: &Url, params: &ProxyParams) -> Result<Url, GatewayError> {
    let joined = format!(
        "{}/{}",
        api_base.as_str().trim_end_matches('/'),
        params.pathname.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)
        .map_err(|_| GatewayError::MalformedRequest("Invalid pathname parameter."))?;

    if url.origin() != api_base.origin() || !url.path().starts_with(api_base.path()) {
        return Err(GatewayError::MalformedRequest("Invalid pathname parameter."));
    }

    if !params.passthrough.is_empty() {
        url.query_pairs_mut().extend_pairs(&params.passthrough);
    }
    Ok(url)
}

/// Copy upstream response headers minus framing and hop-by-hop headers.
pub(crate) fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in &STRIPPED_RESPONSE_HEADERS {
        headers.remove(name);
    }
    headers
}

fn is_multipart(content_type: &HeaderValue) -> bool {
    content_type
        .to_str()
        .is_ok_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// Streams a client request to the upstream API with the selected bearer
/// token and streams the answer back.
///
/// Upstream status and body pass through untouched, errors included. Only a
/// transport failure becomes a 502, and nothing is retried because a streamed
/// body cannot be replayed.
pub struct ProxyForwarder {
    http: reqwest::Client,
    api_base: Url,
}

impl ProxyForwarder {
    #[must_use]
    pub fn new(http: reqwest::Client, api_base: Url) -> Self {
        Self { http, api_base }
    }

    /// Forward `request` using tokens from `credentials`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MalformedRequest`] before any upstream contact when
    /// `pathname` is missing or escapes the API root;
    /// [`GatewayError::UpstreamUnavailable`] on transport failure.
    pub async fn forward(
        &self,
        request: Request,
        credentials: &CredentialBundle,
    ) -> Result<Response, GatewayError> {
        let params = ProxyParams::from_query(request.uri().query())?;
        let target = target_url(&self.api_base, &params)?;
        let token = select_token(credentials, params.elevate);

        let (parts, body) = request.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or(HeaderValue::from_static("application/json"));

        tracing::debug!(
            method = %parts.method,
            path = %target.path(),
            elevated = params.elevate && credentials.elevated_token.is_some(),
            "Forwarding upstream"
        );

        let mut upstream = self
            .http
            .request(parts.method.clone(), target)
            .header(ACCEPT, "application/json");

        if let Some(token) = token {
            upstream = upstream.bearer_auth(token.as_str());
        }
        if is_multipart(&content_type) {
            upstream = upstream.header(ATLASSIAN_TOKEN, "nocheck");
        }
        upstream = upstream.header(CONTENT_TYPE, content_type);

        if parts.method == Method::POST || parts.method == Method::PUT {
            if let Some(length) = parts.headers.get(CONTENT_LENGTH) {
                upstream = upstream.header(CONTENT_LENGTH, length.clone());
            }
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = upstream
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

        let status = upstream.status();
        let mut headers = forwarded_headers(upstream.headers());
        if let Ok(origin) = HeaderValue::from_str(upstream.url().as_str()) {
            headers.insert(ORIGIN_LOCATION, origin);
        }

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
