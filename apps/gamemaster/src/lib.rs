//! Match orchestration service: practice pairing, tournament brackets and
//! hand-off of plays to the game-hosting workers.

pub mod config;
pub mod domain;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use config::GamemasterConfig;
pub use services::{Dispatcher, GameManager};
pub use state::AppState;

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_support::logging::init();
}
