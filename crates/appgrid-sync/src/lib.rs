//! appgrid-sync — declarative component synchronization for AppGrid.
//!
//! Takes the desired state of a batch of components and converges the
//! stored per-component aspects (ports, envs, volumes, plugins, rules, ...)
//! to it inside one [`UnitOfWork`](appgrid_state::UnitOfWork):
//!
//! - [`validate`] rejects malformed batches before anything is written.
//! - [`syncers`] hold one delete-then-insert step per aspect; the
//!   [`SyncEngine`] runs them in [`SYNC_STEPS`] order.
//! - [`cascade`] removes components with everything attached to them.
//! - [`ExposureController`] toggles single ports and keeps the stream
//!   plugin ports allocated by [`PortAllocator`] consistent.
//! - [`queue`] is the contract for notifying downstream workers.

pub mod aspect;
pub mod cascade;
pub mod error;
pub mod exposure;
pub mod model;
pub mod orchestrator;
pub mod port_alloc;
pub mod queue;
pub mod syncers;
pub mod validate;

pub use aspect::Aspect;
pub use cascade::{CASCADE_STEPS, cascade_delete};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use exposure::{Exposure, ExposureController, PortExposure};
pub use model::*;
pub use orchestrator::{SYNC_STEPS, SyncEngine, SyncReport};
pub use port_alloc::PortAllocator;
pub use queue::{ChannelQueue, Notifier, Task, TaskQueue};
