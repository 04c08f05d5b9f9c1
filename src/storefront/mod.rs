//! Shop backend calls, all issued through the session coordinator.

pub mod api;

pub use api::Storefront;
