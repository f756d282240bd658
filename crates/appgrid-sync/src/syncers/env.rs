use appgrid_state::EnvVar;

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::SyncResult;
use crate::model::ComponentSpec;

pub fn sync_envs(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let envs = present(specs, |s| &s.envs);
    let rows: Vec<EnvVar> = envs
        .iter()
        .flat_map(|&(spec, desired)| desired.iter().map(move |e| e.to_row(&spec.component)))
        .collect();
    replace_rows(ctx.uow, &owner_ids(&envs), &rows)
}
