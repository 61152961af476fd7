//! Routing core: health state, ranking, and the failover engine
//!
//! The router owns all mutable per-provider state. Everything else in the
//! crate — handlers, cache, job queue — either feeds requests in or carries
//! results out.

pub mod engine;
pub mod health;
pub mod ranking;

pub use engine::{FailoverRouter, RouteError};
pub use health::{
    HealthPolicy, HealthRegistry, HealthTransition, ProviderHealth, ProviderHealthView,
    QuotaPolicy,
};
pub use ranking::rank;
