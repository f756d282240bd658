//! appgrid-state — embedded state store for the AppGrid control plane.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for applications, components and every per-component aspect
//! (ports, env vars, volumes, plugins, autoscale rules, ...).
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Keys are prefixed by the owning id (`{component_id}/{natural_key}`), so
//! "all rows of these components" is a set of prefix scans. Multi-table
//! writes go through a [`UnitOfWork`] that commits or rolls back as a whole.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod record;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use record::Record;
pub use store::{StateStore, UnitOfWork};
pub use types::*;
