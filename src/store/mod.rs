//! Storage backends
//!
//! - `memory`: DashMap-backed store implementing every repository and the unit of work

pub mod memory;

pub use memory::InMemoryStore;
