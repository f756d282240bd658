//! Per-aspect syncers.
//!
//! Each syncer takes the whole batch, picks the components that carry its
//! aspect and replaces their stored rows: delete everything owned by those
//! components, then insert the desired rows. Components whose aspect is
//! absent are not touched. All syncers write through the same
//! [`UnitOfWork`], so a failure anywhere discards the whole pass.

mod autoscale;
mod component;
mod endpoint;
mod env;
mod gateway;
mod health;
mod plugin;
mod port;
mod relation;
mod volume;

pub use autoscale::sync_autoscale_rules;
pub use component::sync_component_base;
pub use endpoint::sync_endpoints;
pub use env::sync_envs;
pub use gateway::{sync_gateway_rules, sync_rule_configs};
pub use health::{sync_monitors, sync_probes};
pub use plugin::{reconcile_stream_ports, sync_plugins};
pub use port::sync_ports;
pub use relation::{sync_config_groups, sync_dependencies, sync_labels};
pub use volume::{VolumePaths, sync_config_files, sync_volume_relations, sync_volumes};

use appgrid_state::{Application, Record, UnitOfWork};

use crate::aspect::Aspect;
use crate::error::SyncResult;
use crate::model::ComponentSpec;
use crate::port_alloc::PortAllocator;

/// Everything a syncer may read besides the batch itself.
pub struct SyncContext<'a> {
    pub uow: &'a UnitOfWork,
    pub app: &'a Application,
    pub volumes: &'a VolumePaths,
    pub allocator: &'a PortAllocator,
    /// Components the same request deletes once all syncers have run.
    pub delete_ids: &'a [String],
    /// Seconds since the epoch, shared by every row of the pass.
    pub now: u64,
}

impl SyncContext<'_> {
    pub(crate) fn is_deleted(&self, component_id: &str) -> bool {
        self.delete_ids.iter().any(|id| id == component_id)
    }
}

/// One step of a synchronization pass. Returns the number of rows written.
pub type SyncStep = fn(&SyncContext<'_>, &[ComponentSpec]) -> SyncResult<usize>;

/// The specs that carry the aspect, each with its desired rows.
pub(crate) fn present<'s, T>(
    specs: &'s [ComponentSpec],
    aspect: impl Fn(&ComponentSpec) -> &Aspect<T>,
) -> Vec<(&'s ComponentSpec, &'s [T])> {
    specs
        .iter()
        .filter_map(|spec| aspect(spec).desired().map(|rows| (spec, rows)))
        .collect()
}

/// Component ids of `present` output.
pub(crate) fn owner_ids<T>(present: &[(&ComponentSpec, &[T])]) -> Vec<String> {
    present.iter().map(|(spec, _)| spec.id().to_string()).collect()
}

/// Delete every row owned by `owners`, then write `rows`.
pub(crate) fn replace_rows<R: Record>(
    uow: &UnitOfWork,
    owners: &[String],
    rows: &[R],
) -> SyncResult<usize> {
    if owners.is_empty() {
        return Ok(0);
    }
    uow.delete_by_owner_ids::<R>(owners)?;
    Ok(uow.create_or_update_in_batch(rows)?)
}
