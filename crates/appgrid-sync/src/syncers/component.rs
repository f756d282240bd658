use appgrid_state::Component;
use tracing::debug;

use super::SyncContext;
use crate::error::SyncResult;
use crate::model::ComponentSpec;

/// Upsert the component base rows. Creation time survives a resync; a
/// component resynced under another application moves to it.
pub fn sync_component_base(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let mut rows = Vec::with_capacity(specs.len());
    for spec in specs {
        let existing = ctx.uow.get::<Component>(spec.id())?;
        if let Some(prev) = &existing {
            if prev.app_id != ctx.app.app_id {
                debug!(
                    component_id = spec.id(),
                    from = %prev.app_id,
                    to = %ctx.app.app_id,
                    "component moves to another application"
                );
            }
        }
        rows.push(spec.component.to_row(ctx.app, existing.as_ref(), ctx.now));
    }
    Ok(ctx.uow.create_or_update_in_batch(&rows)?)
}
