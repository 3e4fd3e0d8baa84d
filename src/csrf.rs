use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generates a cryptographically random nonce for the `user-nonce` cookie.
///
/// Returns a 43-character URL-safe string (32 random bytes → base64url).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derives the `OAuth2` state value sent to the identity provider for a nonce.
///
/// `state = BASE64URL(HMAC-SHA256(key = secret, msg = nonce))`
#[must_use]
pub fn derive_state(nonce: &str, secret: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(nonce.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Checks a state code returned by the identity provider against the nonce
/// cookie.
///
/// Returns `false` if either value is absent. The comparison is constant-time.
#[must_use]
pub fn validate_state(nonce: Option<&str>, state_code: Option<&str>, secret: &[u8]) -> bool {
    let (Some(nonce), Some(state_code)) = (nonce, state_code) else {
        return false;
    };
    let expected = derive_state(nonce, secret);
    expected.as_bytes().ct_eq(state_code.as_bytes()).into()
}
