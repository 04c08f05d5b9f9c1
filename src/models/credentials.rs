use serde::{Deserialize, Serialize};

/// The token pair the session coordinator owns.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    /// Absent when only an access token could be restored from storage.
    pub refresh: Option<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

// Tokens are bearer secrets; keep them out of debug logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Body of the token endpoint call.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful token endpoint answer.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access: String,
    pub refresh: String,
}

/// Body of the refresh endpoint call.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Successful refresh endpoint answer. Backends that rotate refresh tokens
/// send the replacement alongside the new access token.
#[derive(Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
