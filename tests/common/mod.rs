//! Shared fixtures for integration tests.

pub mod memory;

#[allow(unused_imports)]
pub use memory::{MemoryStore, StoreCall};
