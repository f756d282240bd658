//! Shape checks on a sync request, run before any transaction opens.
//!
//! Everything here looks at the request alone. Checks that need stored
//! state (service name clashes with other components, mount sources,
//! dependency targets) happen inside the syncers.

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use appgrid_state::{Application, ComponentKind, PluginModel, VolumeType};

use crate::error::{SyncError, SyncResult};
use crate::model::{ComponentSpec, EndpointSpec};

fn invalid(msg: impl Into<String>) -> SyncError {
    SyncError::Validation(msg.into())
}

/// Fail on the first repeated key, naming it with `what`.
fn unique<K, I>(keys: I, what: impl Fn(&K) -> String) -> SyncResult<()>
where
    K: Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(invalid(format!("duplicate {}", what(&key))));
        }
        seen.insert(key);
    }
    Ok(())
}

/// Ids and names end up as '/'-joined row key segments, so a segment
/// must be non-empty and must not contain '/'. Otherwise `web/api` would
/// read as an aspect row owned by `web`.
pub fn key_segment(value: &str, what: &str) -> SyncResult<()> {
    if value.is_empty() {
        return Err(invalid(format!("{what} is empty")));
    }
    if value.contains('/') {
        return Err(invalid(format!("{what} {value:?} contains '/'")));
    }
    Ok(())
}

/// Validate a whole batch.
pub fn validate_batch(
    app: &Application,
    specs: &[ComponentSpec],
    delete_ids: &[String],
) -> SyncResult<()> {
    key_segment(&app.app_id, "application id")?;

    unique(specs.iter().map(|s| s.id()), |id| {
        format!("component {id} in batch")
    })?;

    let desired: BTreeSet<&str> = specs.iter().map(|s| s.id()).collect();
    if let Some(id) = delete_ids.iter().find(|id| desired.contains(id.as_str())) {
        return Err(invalid(format!(
            "component {id} is both synchronized and deleted"
        )));
    }
    for id in delete_ids {
        key_segment(id, "component id to delete")?;
    }

    // Service names are unique per tenant env, so also across the batch.
    unique(
        specs
            .iter()
            .filter_map(|s| s.ports.desired())
            .flatten()
            .filter_map(|p| p.k8s_service_name.as_deref()),
        |name| format!("service name {name}"),
    )?;

    for spec in specs {
        validate_component(app, spec)?;
    }
    Ok(())
}

/// Validate one component's base and aspects.
pub fn validate_component(app: &Application, spec: &ComponentSpec) -> SyncResult<()> {
    let base = &spec.component;
    let id = base.component_id.as_str();
    key_segment(id, "component id")?;
    if base.tenant_env_id != app.tenant_env_id {
        return Err(invalid(format!(
            "component {id} belongs to tenant env {} but application {} to {}",
            base.tenant_env_id, app.app_id, app.tenant_env_id
        )));
    }
    let res = &base.resources;
    if res.cpu_limit > 0 && res.cpu_request > res.cpu_limit {
        return Err(invalid(format!(
            "component {id}: cpu request {} exceeds limit {}",
            res.cpu_request, res.cpu_limit
        )));
    }
    if res.memory_limit > 0 && res.memory_request > res.memory_limit {
        return Err(invalid(format!(
            "component {id}: memory request {} exceeds limit {}",
            res.memory_request, res.memory_limit
        )));
    }

    if let Some(ports) = spec.ports.desired() {
        if ports.iter().any(|p| p.container_port == 0) {
            return Err(invalid(format!("component {id}: container port 0")));
        }
        unique(ports.iter().map(|p| p.container_port), |port| {
            format!("port {port} on component {id}")
        })?;
    }

    if let Some(envs) = spec.envs.desired() {
        for e in envs {
            key_segment(&e.attr_name, &format!("component {id}: env name"))?;
        }
        unique(envs.iter().map(|e| (e.scope, e.attr_name.as_str())), |(scope, name)| {
            format!("{scope} env {name} on component {id}")
        })?;
    }

    if let Some(volumes) = spec.volumes.desired() {
        unique(volumes.iter().map(|v| v.volume_name.as_str()), |name| {
            format!("volume {name} on component {id}")
        })?;
        for v in volumes {
            key_segment(&v.volume_name, &format!("component {id}: volume name"))?;
            if !v.volume_path.starts_with('/') {
                return Err(invalid(format!(
                    "component {id}: volume {} needs an absolute path",
                    v.volume_name
                )));
            }
            if v.volume_type == VolumeType::Local && !base.extend_method.is_stateful() {
                return Err(invalid(format!(
                    "component {id}: local volume {} requires a stateful component",
                    v.volume_name
                )));
            }
        }
    }

    if let Some(relations) = spec.volume_relations.desired() {
        for r in relations {
            key_segment(&r.dep_component_id, &format!("component {id}: mount source"))?;
            key_segment(&r.volume_name, &format!("component {id}: mounted volume"))?;
        }
        unique(
            relations
                .iter()
                .map(|r| (r.dep_component_id.as_str(), r.volume_name.as_str())),
            |(dep, name)| format!("mount of {dep}/{name} on component {id}"),
        )?;
        if relations.iter().any(|r| r.dep_component_id == id) {
            return Err(invalid(format!("component {id} mounts its own volume")));
        }
    }

    if let Some(files) = spec.config_files.desired() {
        for f in files {
            key_segment(&f.volume_name, &format!("component {id}: config file volume"))?;
        }
        unique(files.iter().map(|f| f.volume_name.as_str()), |name| {
            format!("config file {name} on component {id}")
        })?;
    }

    if let Some(probes) = spec.probes.desired() {
        unique(probes.iter().map(|p| p.mode), |mode| {
            format!("{mode} probe on component {id}")
        })?;
    }

    if let Some(monitors) = spec.monitors.desired() {
        for m in monitors {
            key_segment(&m.name, &format!("component {id}: monitor name"))?;
        }
        unique(monitors.iter().map(|m| m.name.as_str()), |name| {
            format!("monitor {name} on component {id}")
        })?;
    }

    if let Some(plugins) = spec.plugins.desired() {
        for p in plugins {
            key_segment(&p.plugin_id, &format!("component {id}: plugin id"))?;
            for env in &p.envs {
                key_segment(&env.env_name, &format!("plugin {}: env name", p.plugin_id))?;
            }
        }
        unique(plugins.iter().map(|p| p.plugin_id.as_str()), |pid| {
            format!("plugin {pid} on component {id}")
        })?;
        validate_plugin_directions(id, plugins.iter().filter(|p| p.switch).map(|p| p.plugin_model))?;
    }

    if let Some(deps) = spec.dependencies.desired() {
        for dep in deps {
            key_segment(dep, &format!("component {id}: dependency"))?;
        }
        if deps.iter().any(|d| d == id) {
            return Err(invalid(format!("component {id} depends on itself")));
        }
    }

    if let Some(groups) = spec.config_groups.desired() {
        for group in groups {
            key_segment(group, &format!("component {id}: config group"))?;
        }
    }

    if let Some(labels) = spec.labels.desired() {
        for l in labels {
            key_segment(&l.label_key, &format!("component {id}: label key"))?;
        }
        unique(labels.iter().map(|l| l.label_key.as_str()), |key| {
            format!("label {key} on component {id}")
        })?;
    }

    if let Some(rules) = spec.autoscale_rules.desired() {
        for r in rules {
            key_segment(&r.rule_id, &format!("component {id}: autoscale rule id"))?;
            for m in &r.metrics {
                key_segment(&m.metric_type, &format!("autoscale rule {}: metric type", r.rule_id))?;
                key_segment(&m.metric_name, &format!("autoscale rule {}: metric name", r.rule_id))?;
            }
        }
        unique(rules.iter().map(|r| r.rule_id.as_str()), |rid| {
            format!("autoscale rule {rid}")
        })?;
        for r in rules {
            if r.min_replicas > r.max_replicas {
                return Err(invalid(format!(
                    "autoscale rule {}: min replicas {} exceeds max {}",
                    r.rule_id, r.min_replicas, r.max_replicas
                )));
            }
            unique(r.metrics.iter().map(|m| (m.metric_type.as_str(), m.metric_name.as_str())), |(t, n)| {
                format!("{t} metric {n} on autoscale rule {}", r.rule_id)
            })?;
        }
    }

    if let Some(endpoints) = spec.endpoints.desired() {
        validate_endpoints(id, base.kind, endpoints)?;
    }

    validate_gateway(id, spec)
}

/// At most one active inbound and one active outbound plugin.
fn validate_plugin_directions(
    id: &str,
    active: impl Iterator<Item = PluginModel>,
) -> SyncResult<()> {
    let (mut inbound, mut outbound) = (0, 0);
    for model in active {
        inbound += usize::from(model.is_inbound());
        outbound += usize::from(model.is_outbound());
    }
    if inbound > 1 {
        return Err(SyncError::Conflict(format!(
            "component {id}: more than one active inbound network plugin"
        )));
    }
    if outbound > 1 {
        return Err(SyncError::Conflict(format!(
            "component {id}: more than one active outbound network plugin"
        )));
    }
    Ok(())
}

fn validate_endpoints(id: &str, kind: ComponentKind, endpoints: &[EndpointSpec]) -> SyncResult<()> {
    if endpoints.is_empty() {
        return Ok(());
    }
    if kind != ComponentKind::ThirdParty {
        return Err(invalid(format!(
            "component {id}: endpoints are only valid on third-party components"
        )));
    }
    let platform = endpoints
        .iter()
        .filter(|e| matches!(e, EndpointSpec::Kubernetes { .. }))
        .count();
    if platform > 1 {
        return Err(invalid(format!(
            "component {id}: more than one platform discovery binding"
        )));
    }
    if platform == 1 && endpoints.len() > 1 {
        return Err(invalid(format!(
            "component {id}: platform discovery cannot be mixed with static endpoints"
        )));
    }
    unique(
        endpoints.iter().filter_map(|e| match e {
            EndpointSpec::Static { address } => Some(address.as_str()),
            EndpointSpec::Kubernetes { .. } => None,
        }),
        |addr| format!("endpoint {addr} on component {id}"),
    )
}

fn validate_gateway(id: &str, spec: &ComponentSpec) -> SyncResult<()> {
    let http = spec.http_rules.desired().unwrap_or_default();
    let tcp = spec.tcp_rules.desired().unwrap_or_default();
    for rid in http.iter().map(|r| &r.rule_id).chain(tcp.iter().map(|r| &r.rule_id)) {
        key_segment(rid, &format!("component {id}: gateway rule id"))?;
    }
    unique(
        http.iter()
            .map(|r| r.rule_id.as_str())
            .chain(tcp.iter().map(|r| r.rule_id.as_str())),
        |rid| format!("gateway rule {rid}"),
    )?;
    unique(tcp.iter().map(|r| (r.ip.as_str(), r.port)), |(ip, port)| {
        format!("tcp listen address {ip}:{port}")
    })?;
    if let Some(configs) = spec.rule_configs.desired() {
        for c in configs {
            key_segment(&c.rule_id, &format!("component {id}: rule config target"))?;
            key_segment(&c.key, &format!("gateway rule {}: config key", c.rule_id))?;
        }
        unique(
            configs.iter().map(|c| (c.rule_id.as_str(), c.key.as_str())),
            |(rid, key)| format!("config {key} on gateway rule {rid}"),
        )?;
    }
    Ok(())
}
