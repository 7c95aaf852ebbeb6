//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing and local demos. The durable store
//! lives in the `sqlite-adapter` crate.

pub mod memory_repo;
