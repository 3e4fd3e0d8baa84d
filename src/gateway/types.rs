use crate::types::{AccessToken, AccountId, RefreshToken};

/// The four credential slots of a session, plus the account the elevated
/// pair was minted for.
///
/// Produced by [`cookies::decode`](super::cookies::decode) and never mutated
/// while a handler runs; refreshing builds a new bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Base-session bearer token.
    pub auth_token: Option<AccessToken>,
    /// Base-session refresh token.
    pub refresh_token: Option<RefreshToken>,
    /// Elevated-session bearer token.
    pub elevated_token: Option<AccessToken>,
    /// Elevated-session refresh token.
    pub elevated_refresh_token: Option<RefreshToken>,
    /// Identity captured when the elevated pair was issued.
    pub authorized_account_id: Option<AccountId>,
}

impl CredentialBundle {
    /// Both elevated slots are filled.
    #[must_use]
    pub fn has_elevated_pair(&self) -> bool {
        self.elevated_token.is_some() && self.elevated_refresh_token.is_some()
    }
}

/// Who is asking versus who the elevated session belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub requesting_account_id: Option<AccountId>,
    pub authorized_account_id: Option<AccountId>,
}

impl SessionIdentity {
    /// Elevated writes are allowed only for the account that granted them.
    #[must_use]
    pub fn can_write(&self) -> bool {
        match (&self.requesting_account_id, &self.authorized_account_id) {
            (Some(requesting), Some(authorized)) => requesting == authorized,
            _ => false,
        }
    }
}

/// Everything the session gate established for one request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credentials: CredentialBundle,
    pub identity: SessionIdentity,
}
