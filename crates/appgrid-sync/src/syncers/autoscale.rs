use appgrid_state::{AutoscaleRule, AutoscaleRuleMetric};

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;

/// Replace autoscale rules and recreate their metrics as a set.
///
/// Metrics are keyed by rule id, so the ids of the rules about to go are
/// read first and their metrics removed before the rules.
pub fn sync_autoscale_rules(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let rules = present(specs, |s| &s.autoscale_rules);
    if rules.is_empty() {
        return Ok(0);
    }
    let owners = owner_ids(&rules);

    let rule_rows: Vec<AutoscaleRule> = rules
        .iter()
        .flat_map(|&(spec, desired)| desired.iter().map(move |r| r.rule_row(&spec.component)))
        .collect();
    let metric_rows: Vec<AutoscaleRuleMetric> = rules
        .iter()
        .flat_map(|&(_, desired)| desired.iter().flat_map(|r| r.metric_rows()))
        .collect();

    for other in uow
        .list_all::<AutoscaleRule>()?
        .iter()
        .filter(|r| !owners.contains(&r.component_id))
    {
        if rule_rows.iter().any(|r| r.rule_id == other.rule_id) {
            return Err(SyncError::Conflict(format!(
                "autoscale rule {} already belongs to component {}",
                other.rule_id, other.component_id
            )));
        }
    }

    let old_ids: Vec<String> = uow
        .list_by_owners::<AutoscaleRule>(&owners)?
        .into_iter()
        .map(|r| r.rule_id)
        .collect();
    uow.delete_by_owner_ids::<AutoscaleRuleMetric>(&old_ids)?;

    let mut written = replace_rows(uow, &owners, &rule_rows)?;
    written += uow.create_or_update_in_batch(&metric_rows)?;
    Ok(written)
}
