#![allow(dead_code)]

use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;

use storefront::config::ApiConfig;
use storefront::session::SessionCoordinator;
use storefront::store::{MemoryStore, TokenStore};

pub const FUTURE_EXP: i64 = 4_102_444_800; // Far in the future to avoid flakiness.
pub const PAST_EXP: i64 = 1_000_000_000;
pub const ORDERS: &str = "/api/orders/";

/// Mint a token the way the backend would. The client never checks the
/// signature, so any secret works.
pub fn mint(exp: i64, admin: bool, jti: &str) -> String {
    let claims = json!({
        "token_type": "access",
        "exp": exp,
        "iat": exp - 300,
        "jti": jti,
        "user_id": 42,
        "is_staff": admin,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("failed to mint token")
}

pub fn api_config(server_url: &str) -> ApiConfig {
    let mut config = ApiConfig::new(server_url);
    config.timeout_in_ms = 3000;
    config
}

pub fn coordinator(server_url: &str, store: Arc<dyn TokenStore>) -> Arc<SessionCoordinator> {
    Arc::new(SessionCoordinator::new(&api_config(server_url), store))
}

/// A coordinator that already holds `access`/`refresh`, as after a reload.
pub fn signed_in(server_url: &str, access: &str, refresh: &str) -> Arc<SessionCoordinator> {
    coordinator(
        server_url,
        Arc::new(MemoryStore::with_tokens(access, Some(refresh))),
    )
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// GET `path` with `token` answers `status` with `body`.
pub async fn mock_get(
    server: &mut ServerGuard,
    path: &str,
    token: &str,
    status: usize,
    body: &str,
    hits: usize,
) -> Mock {
    server
        .mock("GET", path)
        .match_header("authorization", bearer(token).as_str())
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

/// The refresh endpoint, answering `{access}` for the given refresh token.
pub async fn mock_refresh_ok(
    server: &mut ServerGuard,
    refresh: &str,
    new_access: &str,
    hits: usize,
) -> Mock {
    server
        .mock("POST", "/api/token/refresh/")
        .match_body(Matcher::Json(json!({ "refresh": refresh })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access": new_access }).to_string())
        .expect(hits)
        .create_async()
        .await
}

pub async fn mock_refresh_status(server: &mut ServerGuard, status: usize, hits: usize) -> Mock {
    server
        .mock("POST", "/api/token/refresh/")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail": "Token is invalid or expired", "code": "token_not_valid"}"#)
        .expect(hits)
        .create_async()
        .await
}
