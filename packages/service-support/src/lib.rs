//! Web plumbing shared by the platform services: tracing setup, request
//! trace middleware, problem-details errors and environment config helpers.

pub mod config;
pub mod error;
pub mod error_code;
pub mod extract;
pub mod middleware;
pub mod telemetry;
pub mod trace_ctx;

pub use error::{AppError, ProblemDetails};
pub use error_code::ErrorCode;
