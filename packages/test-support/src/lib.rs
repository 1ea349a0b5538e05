//! Test-only helpers shared by every crate in the workspace.
//!
//! Logging initialisation, unique test data, problem-details assertions,
//! proptest configuration and scripted fakes for outbound clients.

pub mod logging;
pub mod problem_details;
pub mod proptest_config;
pub mod scripted;
pub mod unique;

pub use unique::unique_name;
