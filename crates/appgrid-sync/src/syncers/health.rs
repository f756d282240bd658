use std::collections::BTreeSet;

use appgrid_state::{Monitor, Port, Probe};

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;

/// Replace monitors. Each monitor must scrape a port the component has:
/// the desired ports when the batch carries them, the stored ones otherwise.
pub fn sync_monitors(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let monitors = present(specs, |s| &s.monitors);
    let mut rows = Vec::new();

    for (spec, desired) in &monitors {
        let ports: BTreeSet<u16> = match spec.ports.desired() {
            Some(ports) => ports.iter().map(|p| p.container_port).collect(),
            None => ctx
                .uow
                .list_by_owner::<Port>(spec.id())?
                .into_iter()
                .map(|p| p.container_port)
                .collect(),
        };
        for monitor in *desired {
            if !ports.contains(&monitor.port) {
                return Err(SyncError::Validation(format!(
                    "monitor {} on component {} references unknown port {}",
                    monitor.name,
                    spec.id(),
                    monitor.port
                )));
            }
            rows.push(monitor.to_row(&spec.component));
        }
    }

    replace_rows::<Monitor>(ctx.uow, &owner_ids(&monitors), &rows)
}

pub fn sync_probes(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let probes = present(specs, |s| &s.probes);
    let rows: Vec<Probe> = probes
        .iter()
        .flat_map(|&(spec, desired)| desired.iter().map(move |p| p.to_row(&spec.component)))
        .collect();
    replace_rows(ctx.uow, &owner_ids(&probes), &rows)
}
