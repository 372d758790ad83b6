//! Tower middleware for the API service.

pub mod metrics;
pub mod rate_limit;
