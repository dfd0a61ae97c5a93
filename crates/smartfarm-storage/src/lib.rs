//! Storage interface for the SmartFarm engine.
//!
//! The durable store (an ACID-capable database in production) is an external
//! collaborator; the engine only talks to it through the narrow [`FarmStore`]
//! trait. [`MemoryStore`] is the in-process reference implementation used by
//! the daemon default and by tests.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{FarmStore, StoreError, StoreResult};
