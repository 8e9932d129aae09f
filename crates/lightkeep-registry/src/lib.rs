//! lightkeep-registry — file-backed service registry for Lightkeep.
//!
//! One pretty-printed JSON document (`{ "services": [...] }`) is the single
//! source of truth. Every operation acquires one process-wide lock, re-reads
//! the file, mutates the document in memory, and atomically rewrites it —
//! nothing is cached between calls.
//!
//! # Architecture
//!
//! The `RegistryStore` is `Clone` + `Send` + `Sync` (an `Arc` over the file
//! path and lock) and can be shared between the HTTP handlers and the
//! background health scheduler. The lock is never exposed; callers only see
//! the operations, which are serialized in their entirety.

pub mod error;
pub mod store;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use store::RegistryStore;
pub use types::*;
