pub mod auth;
pub mod csrf;
pub mod metrics;
pub mod rate_limit;
pub mod trace;
