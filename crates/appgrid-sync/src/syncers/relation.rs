use std::collections::BTreeSet;

use appgrid_state::{Component, ConfigGroupRelation, DependencyRelation, Label};

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;

/// Replace outgoing dependency edges. Repeated targets collapse into one
/// edge; every target must be a known component that survives the request.
pub fn sync_dependencies(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let deps = present(specs, |s| &s.dependencies);
    let mut rows = Vec::new();

    for (spec, targets) in &deps {
        let targets: BTreeSet<&str> = targets.iter().map(String::as_str).collect();
        for target in targets {
            if ctx.is_deleted(target) {
                return Err(SyncError::Validation(format!(
                    "component {} depends on {target}, which this request deletes",
                    spec.id()
                )));
            }
            if ctx.uow.get::<Component>(target)?.is_none() {
                return Err(SyncError::NotFound(format!("dependency target component {target}")));
            }
            rows.push(DependencyRelation {
                component_id: spec.id().to_string(),
                dep_component_id: target.to_string(),
                tenant_env_id: spec.component.tenant_env_id.clone(),
            });
        }
    }

    replace_rows(ctx.uow, &owner_ids(&deps), &rows)
}

/// Replace config group bindings, scoped to the synced application.
pub fn sync_config_groups(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let groups = present(specs, |s| &s.config_groups);
    let mut rows = Vec::new();
    for (spec, names) in &groups {
        let names: BTreeSet<&String> = names.iter().collect();
        rows.extend(names.into_iter().map(|name| ConfigGroupRelation {
            component_id: spec.id().to_string(),
            config_group_name: name.clone(),
            app_id: ctx.app.app_id.clone(),
            tenant_env_id: spec.component.tenant_env_id.clone(),
        }));
    }
    replace_rows(ctx.uow, &owner_ids(&groups), &rows)
}

pub fn sync_labels(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let labels = present(specs, |s| &s.labels);
    let rows: Vec<Label> = labels
        .iter()
        .flat_map(|&(spec, desired)| desired.iter().map(move |l| l.to_row(&spec.component)))
        .collect();
    replace_rows(ctx.uow, &owner_ids(&labels), &rows)
}
