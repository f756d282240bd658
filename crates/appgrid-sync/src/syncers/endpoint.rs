use appgrid_state::ThirdPartyDiscoveryConfig;

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::SyncResult;
use crate::model::{ComponentSpec, discovery_source};

/// Replace the discovery config of third-party components. An empty
/// endpoint list removes it.
pub fn sync_endpoints(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let endpoints = present(specs, |s| &s.endpoints);
    let rows: Vec<ThirdPartyDiscoveryConfig> = endpoints
        .iter()
        .filter_map(|(spec, desired)| {
            discovery_source(desired).map(|source| ThirdPartyDiscoveryConfig {
                component_id: spec.id().to_string(),
                source,
            })
        })
        .collect();
    replace_rows(ctx.uow, &owner_ids(&endpoints), &rows)
}
