//! Coordination service: hosts one in-memory ensemble and serves it to the
//! gamemaster and playmasters over HTTP sessions.

pub mod args;
pub mod routes;

pub use args::Args;

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    test_support::logging::init();
}
