//! Fluxgate Routing Engine
//!
//! This crate provides the concurrent route table for Fluxgate:
//! - Per-method path-matching tries (exact segments, `:name` variables,
//!   `*` wildcards, terminal `**` match-all)
//! - Immutable snapshots published through an atomically swappable holder,
//!   keeping the read path lock-free
//! - A coordinator that owns the authoritative rule store and coalesces
//!   bursts of mutations into debounced rebuilds
//!
//! Reads are expected to vastly outnumber writes: `route` loads the
//! current snapshot with a single atomic operation and never takes a
//! lock, while `on_add`/`on_delete` serialize on the coordinator lock and
//! become visible at the next publish.

pub mod coordinator;
pub mod key;
pub mod snapshot;
pub mod trie;

// Re-export commonly used types
pub use coordinator::RouterCoordinator;
pub use snapshot::{RouteSnapshot, SnapshotHolder};
pub use trie::Trie;
