//! Shared application state.
//!
//! Built once at startup and handed to whatever issues backend calls.

use crate::config::ConfigV1;
use crate::session::SessionCoordinator;
use crate::storefront::Storefront;
use std::sync::Arc;

/// Application state shared across all commands.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The single owner of the credential pair.
    pub session: Arc<SessionCoordinator>,
    /// Shop operations, issued through `session`.
    pub storefront: Storefront,
}
