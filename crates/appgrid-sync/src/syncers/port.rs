use appgrid_state::{PluginRelation, Port};

use super::{SyncContext, owner_ids, present, reconcile_stream_ports, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;

/// Replace ports.
///
/// Service names are unique per tenant env: a name held by a component
/// outside the batch (and not deleted by this request) is a conflict.
/// Stream plugin ports follow the new exposure flags.
pub fn sync_ports(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let ports = present(specs, |s| &s.ports);
    if ports.is_empty() {
        return Ok(0);
    }
    let owners = owner_ids(&ports);

    let rows: Vec<Port> = ports
        .iter()
        .flat_map(|&(spec, desired)| desired.iter().map(move |p| p.to_row(&spec.component)))
        .collect();

    let named: Vec<&Port> = rows.iter().filter(|p| p.k8s_service_name.is_some()).collect();
    if !named.is_empty() {
        let others: Vec<Port> = uow
            .list_all::<Port>()?
            .into_iter()
            .filter(|p| !owners.contains(&p.component_id) && !ctx.is_deleted(&p.component_id))
            .collect();
        for port in named {
            if let Some(other) = others.iter().find(|o| {
                o.tenant_env_id == port.tenant_env_id && o.k8s_service_name == port.k8s_service_name
            }) {
                return Err(SyncError::Conflict(format!(
                    "service name {} is already used by component {} port {}",
                    port.k8s_service_name.as_deref().unwrap_or_default(),
                    other.component_id,
                    other.container_port
                )));
            }
        }
    }

    let written = replace_rows(uow, &owners, &rows)?;

    for owner in &owners {
        let plugins: Vec<PluginRelation> = uow.list_by_owner(owner)?;
        let bound: Vec<&PluginRelation> = plugins.iter().collect();
        let own: Vec<Port> = rows
            .iter()
            .filter(|p| &p.component_id == owner)
            .cloned()
            .collect();
        reconcile_stream_ports(uow, ctx.allocator, owner, &bound, &own)?;
    }
    Ok(written)
}
