#![warn(clippy::unwrap_used)]

pub mod dashboard_rest;
pub mod mining_rest;
pub mod rest;
pub mod server;
pub mod transactions_rest;

pub use rest::AppState;
pub use server::ApiServer;
