//! Bourse Store
//!
//! In-memory implementation of the [`CatalogStore`](bourse_ports::CatalogStore)
//! port, used by the demo binary and by tests across the workspace.

mod in_memory;

pub use in_memory::InMemoryCatalogStore;
