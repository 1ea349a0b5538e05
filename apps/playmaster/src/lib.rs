//! Game-hosting worker: runs the plays handed off by the gamemaster,
//! persists them into a recoverable session and reports their results.

pub mod config;
pub mod error;
pub mod games;
pub mod routes;
pub mod services;
pub mod state;

pub use config::PlaymasterConfig;
pub use services::{GameHost, SessionRunner};
pub use state::AppState;

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_support::logging::init();
}
