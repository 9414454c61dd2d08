//! Team balancing for full queues
//!
//! This module splits a full roster into two equal teams. The shipped
//! balancer is a deterministic snake draft over points, a heuristic rather
//! than an optimal partition.

pub mod snake_draft;

pub use snake_draft::{SnakeDraftBalancer, TeamBalancer, Teams};
