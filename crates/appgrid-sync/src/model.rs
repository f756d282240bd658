//! Desired-state description of components, as submitted by tenants.
//!
//! A `ComponentSpec` carries the component base plus one [`Aspect`] per
//! sub-resource kind. Spec types omit the owner ids; `to_row` fills them in
//! from the component base.

use appgrid_state::*;
use serde::{Deserialize, Serialize};

use crate::aspect::Aspect;

fn default_true() -> bool {
    true
}

fn default_replicas() -> u32 {
    1
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_access_mode() -> String {
    "RWO".to_string()
}

fn default_xpa_type() -> String {
    "hpa".to_string()
}

fn default_rule_path() -> String {
    "/".to_string()
}

fn default_load_balancing() -> String {
    "round-robin".to_string()
}

fn default_listen_ip() -> String {
    "0.0.0.0".to_string()
}

/// Identity, sizing and shape of a component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentBase {
    pub component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
    pub alias: String,
    #[serde(default)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub extend_method: ExtendMethod,
    #[serde(default)]
    pub resources: ComputeResources,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub deploy_version: String,
}

impl ComponentBase {
    /// Build the stored row, keeping the creation time of an existing one.
    pub fn to_row(&self, app: &Application, existing: Option<&Component>, now: u64) -> Component {
        Component {
            component_id: self.component_id.clone(),
            tenant_env_id: self.tenant_env_id.clone(),
            app_id: app.app_id.clone(),
            alias: self.alias.clone(),
            kind: self.kind,
            extend_method: self.extend_method,
            resources: self.resources,
            replicas: self.replicas,
            image: self.image.clone(),
            deploy_version: self.deploy_version.clone(),
            created_at: existing.map_or(now, |c| c.created_at),
            updated_at: now,
        }
    }
}

/// Desired state of one component and its aspects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
    pub component: ComponentBase,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub http_rules: Aspect<HttpRuleSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub tcp_rules: Aspect<TcpRuleSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub rule_configs: Aspect<RuleConfigSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub monitors: Aspect<MonitorSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub plugins: Aspect<PluginSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub ports: Aspect<PortSpec>,
    /// Ids of the components this one depends on.
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub dependencies: Aspect<ComponentId>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub envs: Aspect<EnvSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub volume_relations: Aspect<VolumeRelationSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub volumes: Aspect<VolumeSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub config_files: Aspect<ConfigFileSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub probes: Aspect<ProbeSpec>,
    /// Names of the application config groups bound to this component.
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub config_groups: Aspect<String>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub labels: Aspect<LabelSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub autoscale_rules: Aspect<AutoscaleRuleSpec>,
    #[serde(default, skip_serializing_if = "Aspect::is_absent")]
    pub endpoints: Aspect<EndpointSpec>,
}

impl ComponentSpec {
    /// A spec that only upserts the component base and leaves every aspect alone.
    pub fn new(component: ComponentBase) -> Self {
        Self {
            component,
            http_rules: Aspect::Absent,
            tcp_rules: Aspect::Absent,
            rule_configs: Aspect::Absent,
            monitors: Aspect::Absent,
            plugins: Aspect::Absent,
            ports: Aspect::Absent,
            dependencies: Aspect::Absent,
            envs: Aspect::Absent,
            volume_relations: Aspect::Absent,
            volumes: Aspect::Absent,
            config_files: Aspect::Absent,
            probes: Aspect::Absent,
            config_groups: Aspect::Absent,
            labels: Aspect::Absent,
            autoscale_rules: Aspect::Absent,
            endpoints: Aspect::Absent,
        }
    }

    pub fn id(&self) -> &str {
        &self.component.component_id
    }
}

// ── Ports & env ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortSpec {
    pub container_port: u16,
    #[serde(default)]
    pub mapping_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub port_alias: String,
    #[serde(default)]
    pub k8s_service_name: Option<String>,
    #[serde(default)]
    pub is_inner_service: bool,
    #[serde(default)]
    pub is_outer_service: bool,
}

impl PortSpec {
    pub fn to_row(&self, base: &ComponentBase) -> Port {
        Port {
            component_id: base.component_id.clone(),
            tenant_env_id: base.tenant_env_id.clone(),
            container_port: self.container_port,
            mapping_port: self.mapping_port.unwrap_or(self.container_port),
            protocol: self.protocol.clone(),
            port_alias: self.port_alias.clone(),
            k8s_service_name: self.k8s_service_name.clone(),
            is_inner_service: self.is_inner_service,
            is_outer_service: self.is_outer_service,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvSpec {
    #[serde(default)]
    pub name: String,
    pub attr_name: String,
    pub attr_value: String,
    #[serde(default = "default_true")]
    pub is_change: bool,
    #[serde(default)]
    pub scope: EnvScope,
}

impl EnvSpec {
    pub fn to_row(&self, base: &ComponentBase) -> EnvVar {
        EnvVar {
            component_id: base.component_id.clone(),
            tenant_env_id: base.tenant_env_id.clone(),
            name: self.name.clone(),
            attr_name: self.attr_name.clone(),
            attr_value: self.attr_value.clone(),
            is_change: self.is_change,
            scope: self.scope,
        }
    }
}

// ── Volumes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeSpec {
    pub volume_name: String,
    pub volume_path: String,
    pub volume_type: VolumeType,
    /// Only honoured for volume types without a derived host path.
    #[serde(default)]
    pub host_path: Option<String>,
    #[serde(default = "default_access_mode")]
    pub access_mode: String,
    #[serde(default)]
    pub capacity_mb: u64,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeRelationSpec {
    pub dep_component_id: ComponentId,
    pub volume_name: String,
    /// Mount path inside this component's container.
    pub volume_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigFileSpec {
    pub volume_name: String,
    pub file_content: String,
}

impl ConfigFileSpec {
    pub fn to_row(&self, base: &ComponentBase) -> ConfigFile {
        ConfigFile {
            component_id: base.component_id.clone(),
            volume_name: self.volume_name.clone(),
            file_content: self.file_content.clone(),
        }
    }
}

// ── Health ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeSpec {
    #[serde(default)]
    pub probe_id: String,
    pub mode: ProbeMode,
    pub scheme: String,
    #[serde(default)]
    pub path: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub http_header: Option<String>,
    pub initial_delay_secs: u32,
    pub period_secs: u32,
    pub timeout_secs: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(default = "default_true")]
    pub is_used: bool,
}

impl ProbeSpec {
    pub fn to_row(&self, base: &ComponentBase) -> Probe {
        Probe {
            component_id: base.component_id.clone(),
            probe_id: self.probe_id.clone(),
            mode: self.mode,
            scheme: self.scheme.clone(),
            path: self.path.clone(),
            port: self.port,
            cmd: self.cmd.clone(),
            http_header: self.http_header.clone(),
            initial_delay_secs: self.initial_delay_secs,
            period_secs: self.period_secs,
            timeout_secs: self.timeout_secs,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            is_used: self.is_used,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorSpec {
    pub name: String,
    pub port: u16,
    pub path: String,
    pub interval: String,
}

impl MonitorSpec {
    pub fn to_row(&self, base: &ComponentBase) -> Monitor {
        Monitor {
            component_id: base.component_id.clone(),
            tenant_env_id: base.tenant_env_id.clone(),
            name: self.name.clone(),
            port: self.port,
            path: self.path.clone(),
            interval: self.interval.clone(),
        }
    }
}

// ── Plugins ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginSpec {
    pub plugin_id: String,
    pub version_id: String,
    pub plugin_model: PluginModel,
    #[serde(default = "default_true")]
    pub switch: bool,
    #[serde(default)]
    pub container_cpu: u32,
    #[serde(default)]
    pub container_memory: u32,
    #[serde(default)]
    pub envs: Vec<PluginEnvSpec>,
    #[serde(default)]
    pub config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginEnvSpec {
    pub env_name: String,
    pub env_value: String,
}

impl PluginSpec {
    pub fn relation_row(&self, base: &ComponentBase) -> PluginRelation {
        PluginRelation {
            component_id: base.component_id.clone(),
            plugin_id: self.plugin_id.clone(),
            version_id: self.version_id.clone(),
            plugin_model: self.plugin_model,
            switch: self.switch,
            container_cpu: self.container_cpu,
            container_memory: self.container_memory,
        }
    }

    pub fn env_rows(&self, base: &ComponentBase) -> impl Iterator<Item = PluginVersionEnv> + '_ {
        let component_id = base.component_id.clone();
        self.envs.iter().map(move |env| PluginVersionEnv {
            component_id: component_id.clone(),
            plugin_id: self.plugin_id.clone(),
            env_name: env.env_name.clone(),
            env_value: env.env_value.clone(),
        })
    }

    pub fn config_row(&self, base: &ComponentBase) -> Option<PluginVersionConfig> {
        self.config.as_ref().map(|config_str| PluginVersionConfig {
            component_id: base.component_id.clone(),
            plugin_id: self.plugin_id.clone(),
            config_str: config_str.clone(),
        })
    }
}

// ── Labels & config groups ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelSpec {
    pub label_key: String,
    pub label_value: String,
}

impl LabelSpec {
    pub fn to_row(&self, base: &ComponentBase) -> Label {
        Label {
            component_id: base.component_id.clone(),
            label_key: self.label_key.clone(),
            label_value: self.label_value.clone(),
        }
    }
}

// ── Autoscaling ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscaleRuleSpec {
    pub rule_id: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_xpa_type")]
    pub xpa_type: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default)]
    pub metrics: Vec<AutoscaleMetricSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscaleMetricSpec {
    pub metric_type: String,
    pub metric_name: String,
    pub metric_target_type: String,
    pub metric_target_value: i64,
}

impl AutoscaleRuleSpec {
    pub fn rule_row(&self, base: &ComponentBase) -> AutoscaleRule {
        AutoscaleRule {
            rule_id: self.rule_id.clone(),
            component_id: base.component_id.clone(),
            enable: self.enable,
            xpa_type: self.xpa_type.clone(),
            min_replicas: self.min_replicas,
            max_replicas: self.max_replicas,
        }
    }

    pub fn metric_rows(&self) -> impl Iterator<Item = AutoscaleRuleMetric> + '_ {
        self.metrics.iter().map(|m| AutoscaleRuleMetric {
            rule_id: self.rule_id.clone(),
            metric_type: m.metric_type.clone(),
            metric_name: m.metric_name.clone(),
            metric_target_type: m.metric_target_type.clone(),
            metric_target_value: m.metric_target_value,
        })
    }
}

// ── Third-party endpoints ──────────────────────────────────────────

/// One entry of a third-party component's endpoint list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndpointSpec {
    Kubernetes {
        namespace: String,
        service_name: String,
    },
    Static {
        address: String,
    },
}

/// Fold an endpoint list into the single discovery config it describes.
///
/// Returns `None` for an empty list. Callers validate beforehand that the
/// list is either one platform binding or static addresses only.
pub fn discovery_source(endpoints: &[EndpointSpec]) -> Option<DiscoverySource> {
    match endpoints.first()? {
        EndpointSpec::Kubernetes {
            namespace,
            service_name,
        } => Some(DiscoverySource::Kubernetes {
            namespace: namespace.clone(),
            service_name: service_name.clone(),
        }),
        EndpointSpec::Static { .. } => Some(DiscoverySource::Static {
            endpoints: endpoints
                .iter()
                .filter_map(|ep| match ep {
                    EndpointSpec::Static { address } => Some(address.clone()),
                    EndpointSpec::Kubernetes { .. } => None,
                })
                .collect(),
        }),
    }
}

// ── Gateway ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpRuleSpec {
    pub rule_id: String,
    pub container_port: u16,
    pub domain: String,
    #[serde(default = "default_rule_path")]
    pub path: String,
    #[serde(default)]
    pub certificate_id: Option<String>,
    #[serde(default = "default_load_balancing")]
    pub load_balancing: String,
}

impl HttpRuleSpec {
    pub fn to_row(&self, base: &ComponentBase) -> HttpRule {
        HttpRule {
            rule_id: self.rule_id.clone(),
            component_id: base.component_id.clone(),
            container_port: self.container_port,
            domain: self.domain.clone(),
            path: self.path.clone(),
            certificate_id: self.certificate_id.clone(),
            load_balancing: self.load_balancing.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TcpRuleSpec {
    pub rule_id: String,
    pub container_port: u16,
    #[serde(default = "default_listen_ip")]
    pub ip: String,
    pub port: u16,
}

impl TcpRuleSpec {
    pub fn to_row(&self, base: &ComponentBase) -> TcpRule {
        TcpRule {
            rule_id: self.rule_id.clone(),
            component_id: base.component_id.clone(),
            container_port: self.container_port,
            ip: self.ip.clone(),
            port: self.port,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfigSpec {
    pub rule_id: String,
    pub key: String,
    pub value: String,
}

impl RuleConfigSpec {
    pub fn to_row(&self) -> GatewayRuleConfig {
        GatewayRuleConfig {
            rule_id: self.rule_id.clone(),
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}
