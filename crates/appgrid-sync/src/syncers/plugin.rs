use std::collections::BTreeSet;

use appgrid_state::{
    PluginRelation, PluginVersionConfig, PluginVersionEnv, Port, Record, StreamPluginPort,
    UnitOfWork,
};
use tracing::debug;

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::SyncResult;
use crate::model::ComponentSpec;
use crate::port_alloc::PortAllocator;

/// Replace plugin bindings with their envs and configs, then bring the
/// component's stream plugin ports in line with the new bindings.
pub fn sync_plugins(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let plugins = present(specs, |s| &s.plugins);
    if plugins.is_empty() {
        return Ok(0);
    }
    let owners = owner_ids(&plugins);

    let mut relations = Vec::new();
    let mut envs = Vec::new();
    let mut configs = Vec::new();
    for (spec, desired) in &plugins {
        let base = &spec.component;
        for plugin in *desired {
            relations.push(plugin.relation_row(base));
            envs.extend(plugin.env_rows(base));
            configs.extend(plugin.config_row(base));
        }
    }

    let mut written = replace_rows(uow, &owners, &relations)?;
    written += replace_rows::<PluginVersionEnv>(uow, &owners, &envs)?;
    written += replace_rows::<PluginVersionConfig>(uow, &owners, &configs)?;

    for (spec, _) in &plugins {
        let bound: Vec<&PluginRelation> = relations
            .iter()
            .filter(|r| r.component_id == spec.id())
            .collect();
        let ports: Vec<Port> = match spec.ports.desired() {
            Some(ports) => ports.iter().map(|p| p.to_row(&spec.component)).collect(),
            None => uow.list_by_owner(spec.id())?,
        };
        written += reconcile_stream_ports(uow, ctx.allocator, spec.id(), &bound, &ports)?;
    }
    Ok(written)
}

/// Make the stream plugin ports of one component match its bindings.
///
/// A mapping exists for a port iff the port is exposed (inner or outer)
/// and an active inbound plugin is bound. Mappings that still hold are
/// kept with their proxy port; stale ones are removed and missing ones
/// allocated around the kept ones. Returns the number of new mappings.
pub fn reconcile_stream_ports(
    uow: &UnitOfWork,
    allocator: &PortAllocator,
    component_id: &str,
    plugins: &[&PluginRelation],
    ports: &[Port],
) -> SyncResult<usize> {
    let inbound = plugins
        .iter()
        .find(|p| p.switch && p.plugin_model.is_inbound())
        .map(|p| p.plugin_model);

    let wanted: Vec<u16> = match inbound {
        Some(_) => ports
            .iter()
            .filter(|p| p.is_exposed())
            .map(|p| p.container_port)
            .collect(),
        None => Vec::new(),
    };

    let mut taken = BTreeSet::new();
    let mut mapped = BTreeSet::new();
    for existing in uow.list_by_owner::<StreamPluginPort>(component_id)? {
        let keep = Some(existing.plugin_model) == inbound
            && wanted.contains(&existing.container_port)
            && !mapped.contains(&existing.container_port);
        if keep {
            taken.insert(existing.plugin_port);
            mapped.insert(existing.container_port);
        } else {
            uow.delete::<StreamPluginPort>(&existing.row_key())?;
        }
    }

    let Some(plugin_model) = inbound else {
        return Ok(0);
    };
    let missing: Vec<u16> = wanted
        .into_iter()
        .filter(|port| !mapped.contains(port))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let allocated = allocator.allocate(&taken, &missing)?;
    let rows: Vec<StreamPluginPort> = missing
        .iter()
        .zip(&allocated)
        .map(|(&container_port, &plugin_port)| StreamPluginPort {
            component_id: component_id.to_string(),
            plugin_model,
            container_port,
            plugin_port,
        })
        .collect();
    debug!(component_id, ports = ?allocated, "stream plugin ports allocated");
    Ok(uow.create_or_update_in_batch(&rows)?)
}
