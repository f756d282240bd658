//! redb table definitions for the AppGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Keys start with the owning id (`{component_id}/...` or `{rule_id}/...`) so
//! every row of one owner is reachable by a single prefix scan.

use redb::TableDefinition;

pub type RowTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Applications keyed by `{app_id}`.
pub const APPLICATIONS: RowTable = TableDefinition::new("applications");

/// Component base rows keyed by `{component_id}`.
pub const COMPONENTS: RowTable = TableDefinition::new("components");

/// Ports keyed by `{component_id}/{container_port}`.
pub const PORTS: RowTable = TableDefinition::new("ports");

/// Env vars keyed by `{component_id}/{scope}/{attr_name}`.
pub const ENV_VARS: RowTable = TableDefinition::new("env_vars");

/// Volumes keyed by `{component_id}/{volume_name}`.
pub const VOLUMES: RowTable = TableDefinition::new("volumes");

/// Config file contents keyed by `{component_id}/{volume_name}`.
pub const CONFIG_FILES: RowTable = TableDefinition::new("config_files");

/// Volume mounts keyed by `{component_id}/{dep_component_id}/{volume_name}`.
pub const VOLUME_RELATIONS: RowTable = TableDefinition::new("volume_relations");

/// Dependency edges keyed by `{component_id}/{dep_component_id}`.
pub const DEPENDENCIES: RowTable = TableDefinition::new("dependencies");

/// Probes keyed by `{component_id}/{mode}`.
pub const PROBES: RowTable = TableDefinition::new("probes");

/// Monitors keyed by `{component_id}/{name}`.
pub const MONITORS: RowTable = TableDefinition::new("monitors");

/// Plugin bindings keyed by `{component_id}/{plugin_id}`.
pub const PLUGIN_RELATIONS: RowTable = TableDefinition::new("plugin_relations");

/// Plugin env vars keyed by `{component_id}/{plugin_id}/{env_name}`.
pub const PLUGIN_ENVS: RowTable = TableDefinition::new("plugin_version_envs");

/// Plugin config blobs keyed by `{component_id}/{plugin_id}`.
pub const PLUGIN_CONFIGS: RowTable = TableDefinition::new("plugin_version_configs");

/// Stream plugin ports keyed by `{component_id}/{plugin_model}/{container_port}`.
pub const STREAM_PLUGIN_PORTS: RowTable = TableDefinition::new("stream_plugin_ports");

/// Labels keyed by `{component_id}/{label_key}`.
pub const LABELS: RowTable = TableDefinition::new("labels");

/// Autoscale rules keyed by `{component_id}/{rule_id}`.
pub const AUTOSCALE_RULES: RowTable = TableDefinition::new("autoscale_rules");

/// Autoscale metrics keyed by `{rule_id}/{metric_type}/{metric_name}`.
pub const AUTOSCALE_METRICS: RowTable = TableDefinition::new("autoscale_rule_metrics");

/// Third-party discovery configs keyed by `{component_id}`.
pub const DISCOVERY_CONFIGS: RowTable = TableDefinition::new("third_party_discovery");

/// Gateway HTTP rules keyed by `{component_id}/{rule_id}`.
pub const HTTP_RULES: RowTable = TableDefinition::new("gateway_http_rules");

/// Gateway TCP rules keyed by `{component_id}/{rule_id}`.
pub const TCP_RULES: RowTable = TableDefinition::new("gateway_tcp_rules");

/// Gateway rule settings keyed by `{rule_id}/{key}`.
pub const RULE_CONFIGS: RowTable = TableDefinition::new("gateway_rule_configs");

/// Config group bindings keyed by `{component_id}/{config_group_name}`.
pub const CONFIG_GROUPS: RowTable = TableDefinition::new("config_group_relations");

/// Every table, used to create them on open.
pub(crate) const ALL_TABLES: &[RowTable] = &[
    APPLICATIONS,
    COMPONENTS,
    PORTS,
    ENV_VARS,
    VOLUMES,
    CONFIG_FILES,
    VOLUME_RELATIONS,
    DEPENDENCIES,
    PROBES,
    MONITORS,
    PLUGIN_RELATIONS,
    PLUGIN_ENVS,
    PLUGIN_CONFIGS,
    STREAM_PLUGIN_PORTS,
    LABELS,
    AUTOSCALE_RULES,
    AUTOSCALE_METRICS,
    DISCOVERY_CONFIGS,
    HTTP_RULES,
    TCP_RULES,
    RULE_CONFIGS,
    CONFIG_GROUPS,
];
