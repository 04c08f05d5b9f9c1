//! Library exports for the storefront client, shared between the binary and tests.

pub mod config;
pub mod models;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod storefront;
pub mod utils;
