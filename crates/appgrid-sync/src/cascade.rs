//! Ordered deletion of components and everything attached to them.
//!
//! Steps run in [`CASCADE_STEPS`] order inside the caller's unit of work.
//! Rows keyed by a rule id (gateway rule configs, autoscale metrics) are
//! removed before the rules they hang off, while those rules can still be
//! read to learn the ids.

use appgrid_state::*;
use tracing::debug;

use crate::error::SyncResult;

/// One cascade step: delete the rows tied to `ids`, return the count.
pub type DeleteStep = fn(&UnitOfWork, &[String]) -> StateResult<u64>;

/// Cascade order. Every aspect table appears before `components`.
pub const CASCADE_STEPS: &[(&str, DeleteStep)] = &[
    ("gateway_tcp_rules", delete_owned::<TcpRule>),
    ("gateway_rule_configs", delete_http_rule_configs),
    ("gateway_http_rules", delete_owned::<HttpRule>),
    ("monitors", delete_owned::<Monitor>),
    ("stream_plugin_ports", delete_owned::<StreamPluginPort>),
    ("plugin_version_configs", delete_owned::<PluginVersionConfig>),
    ("plugin_relations", delete_owned::<PluginRelation>),
    ("plugin_version_envs", delete_owned::<PluginVersionEnv>),
    ("ports", delete_owned::<Port>),
    ("dependencies", delete_owned::<DependencyRelation>),
    ("inbound_dependencies", delete_inbound_dependencies),
    ("envs", delete_owned::<EnvVar>),
    ("volume_relations", delete_owned::<VolumeMountRelation>),
    ("inbound_volume_relations", delete_inbound_mounts),
    ("volumes", delete_owned::<Volume>),
    ("config_files", delete_owned::<ConfigFile>),
    ("probes", delete_owned::<Probe>),
    ("config_groups", delete_owned::<ConfigGroupRelation>),
    ("labels", delete_owned::<Label>),
    ("discovery_configs", delete_owned::<ThirdPartyDiscoveryConfig>),
    ("autoscale_metrics", delete_autoscale_metrics),
    ("autoscale_rules", delete_owned::<AutoscaleRule>),
    ("components", delete_owned::<Component>),
];

fn delete_owned<R: Record>(uow: &UnitOfWork, ids: &[String]) -> StateResult<u64> {
    uow.delete_by_owner_ids::<R>(ids)
}

fn delete_http_rule_configs(uow: &UnitOfWork, ids: &[String]) -> StateResult<u64> {
    let rule_ids: Vec<String> = uow
        .list_by_owners::<HttpRule>(ids)?
        .into_iter()
        .map(|r| r.rule_id)
        .collect();
    uow.delete_by_owner_ids::<GatewayRuleConfig>(&rule_ids)
}

fn delete_autoscale_metrics(uow: &UnitOfWork, ids: &[String]) -> StateResult<u64> {
    let rule_ids: Vec<String> = uow
        .list_by_owners::<AutoscaleRule>(ids)?
        .into_iter()
        .map(|r| r.rule_id)
        .collect();
    uow.delete_by_owner_ids::<AutoscaleRuleMetric>(&rule_ids)
}

/// Edges from surviving components into the deleted ones.
fn delete_inbound_dependencies(uow: &UnitOfWork, ids: &[String]) -> StateResult<u64> {
    uow.delete_where::<DependencyRelation, _>(|r| ids.contains(&r.dep_component_id))
}

/// Mounts other components hold on the deleted components' volumes.
fn delete_inbound_mounts(uow: &UnitOfWork, ids: &[String]) -> StateResult<u64> {
    uow.delete_where::<VolumeMountRelation, _>(|r| ids.contains(&r.dep_component_id))
}

/// Run every cascade step for `ids`. Returns the number of rows removed.
///
/// A not-found outcome counts as nothing to delete; any other error stops
/// the cascade and is returned.
pub fn cascade_delete(uow: &UnitOfWork, ids: &[String]) -> SyncResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut total = 0;
    for (name, step) in CASCADE_STEPS {
        match step(uow, ids) {
            Ok(0) => {}
            Ok(n) => {
                debug!(step = *name, rows = n, "cascade step");
                total += n;
            }
            Err(e) if e.is_not_found() => debug!(step = *name, "nothing to delete"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}
