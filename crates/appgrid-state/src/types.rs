//! Domain types for the AppGrid state store.
//!
//! One struct per persisted row kind. Every component-owned row carries its
//! `component_id`; autoscale metrics and gateway rule configs are owned by a
//! rule id instead. All types are serializable to/from JSON for storage in
//! redb tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::tables::*;

/// Unique identifier for a component (service).
pub type ComponentId = String;

/// Unique identifier for an application.
pub type AppId = String;

/// Unique identifier for a tenant environment.
pub type TenantEnvId = String;

// ── Application ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub app_id: AppId,
    pub tenant_env_id: TenantEnvId,
    pub app_name: String,
    #[serde(default)]
    pub governance_mode: GovernanceMode,
    #[serde(default)]
    pub helm: Option<HelmBinding>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

/// How service-to-service traffic is governed inside the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceMode {
    #[default]
    BuildInServiceMesh,
    KubernetesNativeService,
    IstioServiceMesh,
}

/// Helm release an application was installed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelmBinding {
    pub app_store_name: String,
    pub app_template_name: String,
    pub version: String,
}

// ── Component ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
    pub app_id: AppId,
    pub alias: String,
    pub kind: ComponentKind,
    pub extend_method: ExtendMethod,
    pub resources: ComputeResources,
    pub replicas: u32,
    pub image: Option<String>,
    pub deploy_version: String,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    #[default]
    Internal,
    ThirdParty,
}

/// Workload shape the component is deployed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtendMethod {
    #[default]
    Stateless,
    Stateful,
    Job,
    CronJob,
}

impl ExtendMethod {
    pub fn is_stateful(self) -> bool {
        matches!(self, ExtendMethod::Stateful)
    }
}

/// CPU in millicores, memory in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComputeResources {
    pub cpu_request: u32,
    pub cpu_limit: u32,
    pub memory_request: u32,
    pub memory_limit: u32,
}

// ── Ports & env ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
    pub container_port: u16,
    pub mapping_port: u16,
    /// "http", "tcp", "udp", "grpc", ...
    pub protocol: String,
    pub port_alias: String,
    /// Name of the platform service exposing this port, unique per tenant env.
    pub k8s_service_name: Option<String>,
    pub is_inner_service: bool,
    pub is_outer_service: bool,
}

impl Port {
    pub fn is_exposed(&self) -> bool {
        self.is_inner_service || self.is_outer_service
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVar {
    pub component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
    pub name: String,
    pub attr_name: String,
    pub attr_value: String,
    pub is_change: bool,
    pub scope: EnvScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvScope {
    #[default]
    Inner,
    Outer,
    Build,
}

impl fmt::Display for EnvScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvScope::Inner => "inner",
            EnvScope::Outer => "outer",
            EnvScope::Build => "build",
        })
    }
}

// ── Volumes ────────────────────────────────────────────────────────

/// Storage type of a volume. Unknown names are kept as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeType {
    ShareFile,
    Local,
    ConfigFile,
    MemoryFs,
    Custom(String),
}

impl VolumeType {
    pub fn as_str(&self) -> &str {
        match self {
            VolumeType::ShareFile => "share-file",
            VolumeType::Local => "local",
            VolumeType::ConfigFile => "config-file",
            VolumeType::MemoryFs => "memoryfs",
            VolumeType::Custom(name) => name,
        }
    }
}

impl From<String> for VolumeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "share-file" => VolumeType::ShareFile,
            "local" => VolumeType::Local,
            "config-file" => VolumeType::ConfigFile,
            "memoryfs" => VolumeType::MemoryFs,
            _ => VolumeType::Custom(s),
        }
    }
}

impl From<VolumeType> for String {
    fn from(t: VolumeType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub component_id: ComponentId,
    pub volume_name: String,
    /// Mount path inside the container.
    pub volume_path: String,
    pub volume_type: VolumeType,
    pub host_path: String,
    pub access_mode: String,
    pub capacity_mb: u64,
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    pub component_id: ComponentId,
    pub volume_name: String,
    pub file_content: String,
}

/// A component mounting a volume owned by another component.
///
/// `host_path` and `volume_type` are copied from the source volume when the
/// mount is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeMountRelation {
    pub component_id: ComponentId,
    pub dep_component_id: ComponentId,
    pub volume_name: String,
    pub volume_path: String,
    pub host_path: String,
    pub volume_type: VolumeType,
}

// ── Relations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyRelation {
    pub component_id: ComponentId,
    pub dep_component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigGroupRelation {
    pub component_id: ComponentId,
    pub config_group_name: String,
    pub app_id: AppId,
    pub tenant_env_id: TenantEnvId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub component_id: ComponentId,
    pub label_key: String,
    pub label_value: String,
}

// ── Health ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    Liveness,
    Readiness,
    Ignore,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeMode::Liveness => "liveness",
            ProbeMode::Readiness => "readiness",
            ProbeMode::Ignore => "ignore",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Probe {
    pub component_id: ComponentId,
    pub probe_id: String,
    pub mode: ProbeMode,
    /// "http", "tcp" or "cmd".
    pub scheme: String,
    pub path: Option<String>,
    pub port: u16,
    pub cmd: Option<String>,
    pub http_header: Option<String>,
    pub initial_delay_secs: u32,
    pub period_secs: u32,
    pub timeout_secs: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub is_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Monitor {
    pub component_id: ComponentId,
    pub tenant_env_id: TenantEnvId,
    pub name: String,
    pub port: u16,
    pub path: String,
    pub interval: String,
}

// ── Plugins ────────────────────────────────────────────────────────

/// Category of a plugin, deciding which traffic it intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginModel {
    InboundNet,
    OutboundNet,
    InAndOutNet,
    General,
    Initializer,
}

impl PluginModel {
    /// Whether the plugin proxies traffic arriving at the component.
    pub fn is_inbound(self) -> bool {
        matches!(self, PluginModel::InboundNet | PluginModel::InAndOutNet)
    }

    pub fn is_outbound(self) -> bool {
        matches!(self, PluginModel::OutboundNet | PluginModel::InAndOutNet)
    }
}

impl fmt::Display for PluginModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginModel::InboundNet => "inbound_net",
            PluginModel::OutboundNet => "outbound_net",
            PluginModel::InAndOutNet => "in_and_out_net",
            PluginModel::General => "general",
            PluginModel::Initializer => "initializer",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginRelation {
    pub component_id: ComponentId,
    pub plugin_id: String,
    pub version_id: String,
    pub plugin_model: PluginModel,
    /// On/off switch; a switched-off plugin is kept but not injected.
    pub switch: bool,
    pub container_cpu: u32,
    pub container_memory: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginVersionEnv {
    pub component_id: ComponentId,
    pub plugin_id: String,
    pub env_name: String,
    pub env_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginVersionConfig {
    pub component_id: ComponentId,
    pub plugin_id: String,
    pub config_str: String,
}

/// Proxy port allocated for an inbound plugin in front of `container_port`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamPluginPort {
    pub component_id: ComponentId,
    pub plugin_model: PluginModel,
    pub container_port: u16,
    pub plugin_port: u16,
}

// ── Autoscaling ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscaleRule {
    pub rule_id: String,
    pub component_id: ComponentId,
    pub enable: bool,
    /// "hpa" or "vpa".
    pub xpa_type: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscaleRuleMetric {
    pub rule_id: String,
    /// "resource_metrics", "custom_metrics", ...
    pub metric_type: String,
    pub metric_name: String,
    pub metric_target_type: String,
    pub metric_target_value: i64,
}

// ── Third-party endpoints ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThirdPartyDiscoveryConfig {
    pub component_id: ComponentId,
    pub source: DiscoverySource,
}

/// Where a third-party component's endpoints come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Endpoints of a service on the orchestration platform.
    Kubernetes { namespace: String, service_name: String },
    /// Fixed `host:port` addresses.
    Static { endpoints: Vec<String> },
}

// ── Gateway ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpRule {
    pub rule_id: String,
    pub component_id: ComponentId,
    pub container_port: u16,
    pub domain: String,
    pub path: String,
    pub certificate_id: Option<String>,
    pub load_balancing: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TcpRule {
    pub rule_id: String,
    pub component_id: ComponentId,
    pub container_port: u16,
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayRuleConfig {
    pub rule_id: String,
    pub key: String,
    pub value: String,
}

// ── Record bindings ────────────────────────────────────────────────

macro_rules! record {
    ($ty:ty, $table:expr, owner: $owner:ident, key: |$row:ident| $key:expr) => {
        impl Record for $ty {
            const TABLE: crate::tables::RowTable = $table;

            fn owner_id(&self) -> &str {
                &self.$owner
            }

            fn row_key(&self) -> String {
                let $row = self;
                $key
            }
        }
    };
}

record!(Application, APPLICATIONS, owner: app_id, key: |r| r.app_id.clone());
record!(Component, COMPONENTS, owner: component_id, key: |r| r.component_id.clone());
record!(Port, PORTS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.container_port)
});
record!(EnvVar, ENV_VARS, owner: component_id, key: |r| {
    format!("{}/{}/{}", r.component_id, r.scope, r.attr_name)
});
record!(Volume, VOLUMES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.volume_name)
});
record!(ConfigFile, CONFIG_FILES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.volume_name)
});
record!(VolumeMountRelation, VOLUME_RELATIONS, owner: component_id, key: |r| {
    format!("{}/{}/{}", r.component_id, r.dep_component_id, r.volume_name)
});
record!(DependencyRelation, DEPENDENCIES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.dep_component_id)
});
record!(ConfigGroupRelation, CONFIG_GROUPS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.config_group_name)
});
record!(Label, LABELS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.label_key)
});
record!(Probe, PROBES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.mode)
});
record!(Monitor, MONITORS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.name)
});
record!(PluginRelation, PLUGIN_RELATIONS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.plugin_id)
});
record!(PluginVersionEnv, PLUGIN_ENVS, owner: component_id, key: |r| {
    format!("{}/{}/{}", r.component_id, r.plugin_id, r.env_name)
});
record!(PluginVersionConfig, PLUGIN_CONFIGS, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.plugin_id)
});
record!(StreamPluginPort, STREAM_PLUGIN_PORTS, owner: component_id, key: |r| {
    stream_port_key(&r.component_id, r.plugin_model, r.container_port)
});
record!(AutoscaleRule, AUTOSCALE_RULES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.rule_id)
});
record!(AutoscaleRuleMetric, AUTOSCALE_METRICS, owner: rule_id, key: |r| {
    format!("{}/{}/{}", r.rule_id, r.metric_type, r.metric_name)
});
record!(ThirdPartyDiscoveryConfig, DISCOVERY_CONFIGS, owner: component_id, key: |r| {
    r.component_id.clone()
});
record!(HttpRule, HTTP_RULES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.rule_id)
});
record!(TcpRule, TCP_RULES, owner: component_id, key: |r| {
    format!("{}/{}", r.component_id, r.rule_id)
});
record!(GatewayRuleConfig, RULE_CONFIGS, owner: rule_id, key: |r| {
    format!("{}/{}", r.rule_id, r.key)
});

/// Key of a port row.
pub fn port_key(component_id: &str, container_port: u16) -> String {
    format!("{component_id}/{container_port}")
}

/// Key of a stream plugin port row.
pub fn stream_port_key(component_id: &str, model: PluginModel, container_port: u16) -> String {
    format!("{component_id}/{model}/{container_port}")
}

/// Key of a volume row.
pub fn volume_key(component_id: &str, volume_name: &str) -> String {
    format!("{component_id}/{volume_name}")
}

/// Key of a dependency edge.
pub fn dependency_key(component_id: &str, dep_component_id: &str) -> String {
    format!("{component_id}/{dep_component_id}")
}
