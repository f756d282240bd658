use std::collections::BTreeSet;

use appgrid_state::{GatewayRuleConfig, HttpRule, TcpRule};

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;

/// Replace HTTP and TCP gateway rules.
///
/// Rule ids are global: a rule id held by a component outside the batch is a
/// conflict, as is a TCP listen address already taken by such a component.
/// Configs of HTTP rules that disappear are dropped with them.
pub fn sync_gateway_rules(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let mut written = 0;

    let http = present(specs, |s| &s.http_rules);
    if !http.is_empty() {
        let owners = owner_ids(&http);
        let rows: Vec<HttpRule> = http
            .iter()
            .flat_map(|&(spec, rules)| rules.iter().map(move |r| r.to_row(&spec.component)))
            .collect();

        let stored: Vec<HttpRule> = uow.list_all()?;
        for row in &rows {
            if let Some(other) = stored
                .iter()
                .find(|s| s.rule_id == row.rule_id && !owners.contains(&s.component_id))
            {
                return Err(SyncError::Conflict(format!(
                    "http rule {} already belongs to component {}",
                    row.rule_id, other.component_id
                )));
            }
        }

        let kept: BTreeSet<&str> = rows.iter().map(|r| r.rule_id.as_str()).collect();
        let dropped: Vec<String> = stored
            .iter()
            .filter(|s| owners.contains(&s.component_id) && !kept.contains(s.rule_id.as_str()))
            .map(|s| s.rule_id.clone())
            .collect();
        uow.delete_by_owner_ids::<GatewayRuleConfig>(&dropped)?;

        written += replace_rows(uow, &owners, &rows)?;
    }

    let tcp = present(specs, |s| &s.tcp_rules);
    if !tcp.is_empty() {
        let owners = owner_ids(&tcp);
        let rows: Vec<TcpRule> = tcp
            .iter()
            .flat_map(|&(spec, rules)| rules.iter().map(move |r| r.to_row(&spec.component)))
            .collect();

        let stored: Vec<TcpRule> = uow.list_all()?;
        for row in &rows {
            for other in stored.iter().filter(|s| !owners.contains(&s.component_id)) {
                if other.rule_id == row.rule_id {
                    return Err(SyncError::Conflict(format!(
                        "tcp rule {} already belongs to component {}",
                        row.rule_id, other.component_id
                    )));
                }
                if other.ip == row.ip && other.port == row.port {
                    return Err(SyncError::Conflict(format!(
                        "tcp listen address {}:{} is used by component {}",
                        row.ip, row.port, other.component_id
                    )));
                }
            }
        }

        written += replace_rows(uow, &owners, &rows)?;
    }

    Ok(written)
}

/// Replace the settings attached to each component's HTTP rules.
///
/// Runs after the rules themselves, so a config may only name a rule the
/// component holds once this pass commits.
pub fn sync_rule_configs(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let mut rule_ids = Vec::new();
    let mut rows = Vec::new();

    for (spec, configs) in present(specs, |s| &s.rule_configs) {
        let held: Vec<HttpRule> = uow.list_by_owner(spec.id())?;
        for config in configs {
            if !held.iter().any(|r| r.rule_id == config.rule_id) {
                return Err(SyncError::NotFound(format!(
                    "http rule {} of component {}",
                    config.rule_id,
                    spec.id()
                )));
            }
            rows.push(config.to_row());
        }
        rule_ids.extend(held.into_iter().map(|r| r.rule_id));
    }

    replace_rows(uow, &rule_ids, &rows)
}
