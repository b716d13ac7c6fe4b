//! Retry module (ergonomic namespace)
//! - policy.rs: bounded policy-based retries with jittered exponential delay
//! - backoff.rs: `backoff` crate-based retries, bounded by attempt count

pub mod backoff;
pub mod policy;

pub use backoff::*;
pub use policy::*;
