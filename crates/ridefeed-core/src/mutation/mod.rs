//! Optimistic mutations: apply locally, confirm remotely, roll back on failure.

mod manager;
mod store;
pub mod transforms;

pub use manager::OptimisticMutationManager;
pub use store::{EntityStore, Identified, InMemoryEntityStore};
