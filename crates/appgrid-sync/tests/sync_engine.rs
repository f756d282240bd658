//! End-to-end tests of the synchronization engine against an in-memory store.

use appgrid_core::PlatformConfig;
use appgrid_state::*;
use appgrid_sync::*;
use serde_json::{Value, json};

// ── Fixtures ───────────────────────────────────────────────────────

fn engine() -> SyncEngine {
    SyncEngine::new(
        StateStore::open_in_memory().unwrap(),
        &PlatformConfig::default(),
    )
}

fn app(app_id: &str) -> Application {
    Application {
        app_id: app_id.to_string(),
        tenant_env_id: "env-1".to_string(),
        app_name: app_id.to_string(),
        governance_mode: GovernanceMode::default(),
        helm: None,
        created_at: 0,
        updated_at: 0,
    }
}

fn base(id: &str) -> ComponentBase {
    ComponentBase {
        component_id: id.to_string(),
        tenant_env_id: "env-1".to_string(),
        alias: id.to_string(),
        kind: ComponentKind::Internal,
        extend_method: ExtendMethod::Stateless,
        resources: ComputeResources {
            cpu_request: 100,
            cpu_limit: 500,
            memory_request: 128,
            memory_limit: 512,
        },
        replicas: 1,
        image: Some("nginx:1.27".to_string()),
        deploy_version: "20260101".to_string(),
    }
}

fn port(container_port: u16, protocol: &str) -> PortSpec {
    PortSpec {
        container_port,
        mapping_port: None,
        protocol: protocol.to_string(),
        port_alias: format!("P{container_port}"),
        k8s_service_name: None,
        is_inner_service: false,
        is_outer_service: false,
    }
}

fn exposed(container_port: u16) -> PortSpec {
    PortSpec {
        is_outer_service: true,
        ..port(container_port, "http")
    }
}

fn env(name: &str, value: &str) -> EnvSpec {
    EnvSpec {
        name: String::new(),
        attr_name: name.to_string(),
        attr_value: value.to_string(),
        is_change: true,
        scope: EnvScope::Inner,
    }
}

fn volume(name: &str, path: &str, volume_type: VolumeType) -> VolumeSpec {
    VolumeSpec {
        volume_name: name.to_string(),
        volume_path: path.to_string(),
        volume_type,
        host_path: None,
        access_mode: "RWO".to_string(),
        capacity_mb: 1024,
        read_only: false,
    }
}

fn inbound_plugin(switch: bool) -> PluginSpec {
    PluginSpec {
        plugin_id: "mesh".to_string(),
        version_id: "v1".to_string(),
        plugin_model: PluginModel::InboundNet,
        switch,
        container_cpu: 100,
        container_memory: 64,
        envs: vec![PluginEnvSpec {
            env_name: "MODE".to_string(),
            env_value: "strict".to_string(),
        }],
        config: Some(r#"{"timeout":"3s"}"#.to_string()),
    }
}

/// A component carrying every aspect, depending on and mounting from `db`.
fn full_component(id: &str) -> ComponentSpec {
    let mut spec = ComponentSpec::new(base(id));
    spec.component.extend_method = ExtendMethod::Stateful;
    spec.http_rules = vec![HttpRuleSpec {
        rule_id: format!("{id}-http"),
        container_port: 8080,
        domain: format!("{id}.example.com"),
        path: "/".to_string(),
        certificate_id: None,
        load_balancing: "round-robin".to_string(),
    }]
    .into();
    spec.tcp_rules = vec![TcpRuleSpec {
        rule_id: format!("{id}-tcp"),
        container_port: 5432,
        ip: "0.0.0.0".to_string(),
        port: 30000,
    }]
    .into();
    spec.rule_configs = vec![RuleConfigSpec {
        rule_id: format!("{id}-http"),
        key: "proxy-read-timeout".to_string(),
        value: "60".to_string(),
    }]
    .into();
    spec.monitors = vec![MonitorSpec {
        name: "metrics".to_string(),
        port: 8080,
        path: "/metrics".to_string(),
        interval: "30s".to_string(),
    }]
    .into();
    spec.plugins = vec![inbound_plugin(true)].into();
    spec.ports = vec![exposed(8080), port(5432, "tcp")].into();
    spec.dependencies = vec!["db".to_string()].into();
    spec.envs = vec![env("LOG_LEVEL", "info")].into();
    spec.volume_relations = vec![VolumeRelationSpec {
        dep_component_id: "db".to_string(),
        volume_name: "shared".to_string(),
        volume_path: "/mnt/shared".to_string(),
    }]
    .into();
    spec.volumes = vec![
        volume("data", "/data", VolumeType::Local),
        volume("conf", "/etc/app", VolumeType::ConfigFile),
    ]
    .into();
    spec.config_files = vec![ConfigFileSpec {
        volume_name: "conf".to_string(),
        file_content: "listen = 8080".to_string(),
    }]
    .into();
    spec.probes = vec![ProbeSpec {
        probe_id: "p1".to_string(),
        mode: ProbeMode::Readiness,
        scheme: "http".to_string(),
        path: Some("/healthz".to_string()),
        port: 8080,
        cmd: None,
        http_header: None,
        initial_delay_secs: 5,
        period_secs: 10,
        timeout_secs: 1,
        failure_threshold: 3,
        success_threshold: 1,
        is_used: true,
    }]
    .into();
    spec.config_groups = vec!["common".to_string()].into();
    spec.labels = vec![LabelSpec {
        label_key: "tier".to_string(),
        label_value: "web".to_string(),
    }]
    .into();
    spec.autoscale_rules = vec![AutoscaleRuleSpec {
        rule_id: format!("{id}-hpa"),
        enable: true,
        xpa_type: "hpa".to_string(),
        min_replicas: 1,
        max_replicas: 4,
        metrics: vec![AutoscaleMetricSpec {
            metric_type: "resource_metrics".to_string(),
            metric_name: "cpu".to_string(),
            metric_target_type: "utilization".to_string(),
            metric_target_value: 70,
        }],
    }]
    .into();
    spec
}

fn db_component() -> ComponentSpec {
    let mut spec = ComponentSpec::new(base("db"));
    spec.ports = vec![port(5432, "tcp")].into();
    spec.volumes = vec![volume("shared", "/var/shared", VolumeType::ShareFile)].into();
    spec
}

/// Every table of the store, for whole-state comparisons.
fn snapshot(store: &StateStore) -> Value {
    json!({
        "components": store.list_all::<Component>().unwrap(),
        "ports": store.list_all::<Port>().unwrap(),
        "envs": store.list_all::<EnvVar>().unwrap(),
        "volumes": store.list_all::<Volume>().unwrap(),
        "config_files": store.list_all::<ConfigFile>().unwrap(),
        "volume_relations": store.list_all::<VolumeMountRelation>().unwrap(),
        "dependencies": store.list_all::<DependencyRelation>().unwrap(),
        "probes": store.list_all::<Probe>().unwrap(),
        "monitors": store.list_all::<Monitor>().unwrap(),
        "plugins": store.list_all::<PluginRelation>().unwrap(),
        "plugin_envs": store.list_all::<PluginVersionEnv>().unwrap(),
        "plugin_configs": store.list_all::<PluginVersionConfig>().unwrap(),
        "stream_ports": store.list_all::<StreamPluginPort>().unwrap(),
        "labels": store.list_all::<Label>().unwrap(),
        "config_groups": store.list_all::<ConfigGroupRelation>().unwrap(),
        "autoscale_rules": store.list_all::<AutoscaleRule>().unwrap(),
        "autoscale_metrics": store.list_all::<AutoscaleRuleMetric>().unwrap(),
        "discovery": store.list_all::<ThirdPartyDiscoveryConfig>().unwrap(),
        "http_rules": store.list_all::<HttpRule>().unwrap(),
        "tcp_rules": store.list_all::<TcpRule>().unwrap(),
        "rule_configs": store.list_all::<GatewayRuleConfig>().unwrap(),
    })
}

/// Snapshot without timestamps, which move on every pass.
fn stable_snapshot(store: &StateStore) -> Value {
    let mut snap = snapshot(store);
    if let Some(components) = snap["components"].as_array_mut() {
        for c in components {
            c["updated_at"] = Value::Null;
        }
    }
    snap
}

// ── Scenarios ──────────────────────────────────────────────────────

#[test]
fn sync_two_ports_one_env_one_share_volume() {
    let engine = engine();
    let mut spec = ComponentSpec::new(base("c1"));
    spec.ports = vec![port(8080, "http"), port(5432, "tcp")].into();
    spec.envs = vec![env("DB_HOST", "db")].into();
    spec.volumes = vec![volume("data", "/data", VolumeType::ShareFile)].into();

    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();

    let store = engine.store();
    assert_eq!(store.list_by_owner::<Port>("c1").unwrap().len(), 2);
    assert_eq!(store.list_by_owner::<EnvVar>("c1").unwrap().len(), 1);
    let volumes: Vec<Volume> = store.list_by_owner("c1").unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].host_path, "/grdata/tenantEnv/env-1/service/c1/data");
}

#[test]
fn identical_input_yields_identical_state() {
    let engine = engine();
    let batch = vec![db_component(), full_component("web")];

    engine.sync_components(&app("app-1"), &batch, &[]).unwrap();
    let first = stable_snapshot(engine.store());
    engine.sync_components(&app("app-1"), &batch, &[]).unwrap();
    let second = stable_snapshot(engine.store());

    assert_eq!(first, second);
    assert_eq!(first["stream_ports"].as_array().unwrap().len(), 1);
}

#[test]
fn absent_aspect_is_untouched_and_empty_aspect_is_cleared() {
    let engine = engine();
    let mut spec = ComponentSpec::new(base("c1"));
    spec.ports = vec![port(8080, "http")].into();
    spec.labels = vec![LabelSpec {
        label_key: "tier".to_string(),
        label_value: "web".to_string(),
    }]
    .into();
    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();

    // Ports absent, labels emptied.
    let mut resync = ComponentSpec::new(base("c1"));
    resync.labels = Aspect::Empty;
    engine.sync_components(&app("app-1"), &[resync], &[]).unwrap();

    assert_eq!(engine.store().list_by_owner::<Port>("c1").unwrap().len(), 1);
    assert!(engine.store().list_by_owner::<Label>("c1").unwrap().is_empty());
}

#[test]
fn late_failure_leaves_no_partial_writes() {
    let engine = engine();
    let mut spec = ComponentSpec::new(base("c1"));
    spec.ports = vec![port(8080, "http")].into();
    spec.envs = vec![env("A", "1")].into();
    // No config-file volume backs this file: the config_files step fails
    // after ports, envs and volumes were written.
    spec.config_files = vec![ConfigFileSpec {
        volume_name: "missing".to_string(),
        file_content: "x".to_string(),
    }]
    .into();

    let err = engine.sync_components(&app("app-1"), &[spec], &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(snapshot(engine.store()), snapshot(&StateStore::open_in_memory().unwrap()));
}

#[test]
fn delete_leaves_nothing_behind() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();

    let report = engine
        .sync_components(&app("app-1"), &[], &["web".to_string(), "db".to_string()])
        .unwrap();
    assert_eq!(report.components_deleted, 2);

    assert_eq!(snapshot(engine.store()), snapshot(&StateStore::open_in_memory().unwrap()));
}

#[test]
fn deleting_a_dependency_target_drops_inbound_edges() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();

    // web mounts db's volume, so db goes together with the mount.
    engine.delete_component("db").unwrap();

    let store = engine.store();
    assert!(store.list_by_owner::<DependencyRelation>("web").unwrap().is_empty());
    assert!(store.list_by_owner::<VolumeMountRelation>("web").unwrap().is_empty());
    assert_eq!(store.list_by_owner::<Port>("web").unwrap().len(), 2);
}

#[test]
fn delete_unknown_component_is_not_found() {
    let engine = engine();
    let err = engine.delete_component("ghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.delete_components(&["ghost".to_string()]).unwrap(), 0);
}

#[test]
fn overlapping_delete_and_desired_sets_are_rejected() {
    let engine = engine();
    let err = engine
        .sync_components(&app("app-1"), &[db_component()], &["db".to_string()])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(engine.store().list_all::<Component>().unwrap().is_empty());
}

#[test]
fn ids_containing_a_slash_are_rejected() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();
    let before = stable_snapshot(engine.store());

    // `web/api` would share the `web/` key prefix of web's aspect rows.
    let mut nested = ComponentSpec::new(base("web/api"));
    nested.ports = vec![port(9090, "http")].into();
    let err = engine
        .sync_components(&app("app-1"), &[nested], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut bad_label = ComponentSpec::new(base("web"));
    bad_label.labels = vec![LabelSpec {
        label_key: "team/owner".to_string(),
        label_value: "core".to_string(),
    }]
    .into();
    let err = engine
        .sync_components(&app("app-1"), &[bad_label], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    for result in [
        engine.delete_component("web/8080").map(|_| ()),
        engine.delete_components(&["web/api".to_string()]).map(|_| ()),
        engine.add_dependency("web/api", "db").map(|_| ()),
        engine.remove_dependency("web", "db/x").map(|_| ()),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    assert_eq!(stable_snapshot(engine.store()), before);
}

#[test]
fn prefix_sharing_ids_stay_separate() {
    let engine = engine();
    let mut web_api = ComponentSpec::new(base("web-api"));
    web_api.ports = vec![port(9090, "http")].into();
    web_api.envs = vec![env("MODE", "api")].into();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web"), web_api], &[])
        .unwrap();

    engine.delete_component("web").unwrap();

    let store = engine.store();
    assert!(store.get::<Component>("web").unwrap().is_none());
    assert!(store.get::<Component>("web-api").unwrap().is_some());
    let ports: Vec<Port> = store.list_by_owner("web-api").unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].container_port, 9090);
    assert_eq!(store.list_by_owner::<EnvVar>("web-api").unwrap().len(), 1);
}

// ── Dependencies ───────────────────────────────────────────────────

#[test]
fn dependency_edges_are_idempotent() {
    let engine = engine();
    let mut web = ComponentSpec::new(base("web"));
    web.dependencies = vec!["db".to_string(), "db".to_string()].into();
    engine
        .sync_components(&app("app-1"), &[db_component(), web], &[])
        .unwrap();
    assert_eq!(
        engine.store().list_by_owner::<DependencyRelation>("web").unwrap().len(),
        1
    );

    assert!(!engine.add_dependency("web", "db").unwrap());
    assert_eq!(
        engine.store().list_by_owner::<DependencyRelation>("web").unwrap().len(),
        1
    );
    assert!(engine.remove_dependency("web", "db").unwrap());
    assert!(!engine.remove_dependency("web", "db").unwrap());
    assert!(engine.add_dependency("web", "db").unwrap());
}

#[test]
fn dependency_on_unknown_component_is_not_found() {
    let engine = engine();
    let mut web = ComponentSpec::new(base("web"));
    web.dependencies = vec!["ghost".to_string()].into();
    let err = engine.sync_components(&app("app-1"), &[web], &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    engine
        .sync_components(&app("app-1"), &[ComponentSpec::new(base("web"))], &[])
        .unwrap();
    assert_eq!(
        engine.add_dependency("web", "ghost").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        engine.add_dependency("web", "web").unwrap_err().kind(),
        ErrorKind::Validation
    );
}

// ── Ports & plugins ────────────────────────────────────────────────

#[test]
fn service_names_are_unique_per_tenant_env() {
    let engine = engine();
    let mut a = ComponentSpec::new(base("a"));
    a.ports = vec![PortSpec {
        k8s_service_name: Some("web".to_string()),
        ..port(80, "http")
    }]
    .into();
    engine.sync_components(&app("app-1"), &[a], &[]).unwrap();

    let mut b = ComponentSpec::new(base("b"));
    b.ports = vec![PortSpec {
        k8s_service_name: Some("web".to_string()),
        ..port(80, "http")
    }]
    .into();
    let err = engine
        .sync_components(&app("app-1"), std::slice::from_ref(&b), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Deleting the holder in the same request frees the name.
    engine
        .sync_components(&app("app-1"), &[b], &["a".to_string()])
        .unwrap();
}

#[test]
fn stream_ports_follow_plugin_and_exposure() {
    let engine = engine();
    let mut spec = ComponentSpec::new(base("c1"));
    spec.plugins = vec![inbound_plugin(true)].into();
    spec.ports = vec![exposed(80), exposed(443), port(9000, "tcp")].into();
    engine.sync_components(&app("app-1"), &[spec.clone()], &[]).unwrap();

    let mappings: Vec<StreamPluginPort> = engine.store().list_by_owner("c1").unwrap();
    let mut proxy: Vec<(u16, u16)> = mappings
        .iter()
        .map(|m| (m.container_port, m.plugin_port))
        .collect();
    proxy.sort_unstable();
    assert_eq!(proxy, vec![(80, 65301), (443, 65302)]);

    // Dropping port 80 keeps 443 on its proxy port.
    spec.ports = vec![exposed(443), exposed(8443)].into();
    spec.plugins = Aspect::Absent;
    engine.sync_components(&app("app-1"), &[spec.clone()], &[]).unwrap();
    let mut proxy: Vec<(u16, u16)> = engine
        .store()
        .list_by_owner::<StreamPluginPort>("c1")
        .unwrap()
        .iter()
        .map(|m| (m.container_port, m.plugin_port))
        .collect();
    proxy.sort_unstable();
    assert_eq!(proxy, vec![(443, 65302), (8443, 65301)]);

    // Switching the plugin off removes every mapping.
    spec.ports = Aspect::Absent;
    spec.plugins = vec![inbound_plugin(false)].into();
    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();
    assert!(engine.store().list_by_owner::<StreamPluginPort>("c1").unwrap().is_empty());
}

#[test]
fn monitor_must_reference_a_port() {
    let engine = engine();
    let mut spec = ComponentSpec::new(base("c1"));
    spec.ports = vec![port(8080, "http")].into();
    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();

    // Ports absent from the batch: checked against the stored ones.
    let mut resync = ComponentSpec::new(base("c1"));
    resync.monitors = vec![MonitorSpec {
        name: "metrics".to_string(),
        port: 9090,
        path: "/metrics".to_string(),
        interval: "30s".to_string(),
    }]
    .into();
    let err = engine
        .sync_components(&app("app-1"), std::slice::from_ref(&resync), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    resync.ports = vec![port(9090, "http")].into();
    engine.sync_components(&app("app-1"), &[resync], &[]).unwrap();
    assert_eq!(engine.store().list_by_owner::<Monitor>("c1").unwrap().len(), 1);
}

// ── Volumes ────────────────────────────────────────────────────────

#[test]
fn mounts_copy_and_follow_the_source_volume() {
    let engine = engine();
    let mut web = ComponentSpec::new(base("web"));
    web.volume_relations = vec![VolumeRelationSpec {
        dep_component_id: "db".to_string(),
        volume_name: "shared".to_string(),
        volume_path: "/mnt/shared".to_string(),
    }]
    .into();
    engine
        .sync_components(&app("app-1"), &[db_component(), web], &[])
        .unwrap();

    let mounts: Vec<VolumeMountRelation> = engine.store().list_by_owner("web").unwrap();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].host_path, "/grdata/tenantEnv/env-1/service/db/var/shared");
    assert_eq!(mounts[0].volume_type, VolumeType::ShareFile);

    // Moving the source volume rewrites the denormalized mount.
    let mut db = db_component();
    db.volumes = vec![volume("shared", "/srv/shared", VolumeType::ShareFile)].into();
    engine.sync_components(&app("app-1"), &[db], &[]).unwrap();
    let mounts: Vec<VolumeMountRelation> = engine.store().list_by_owner("web").unwrap();
    assert_eq!(mounts[0].host_path, "/grdata/tenantEnv/env-1/service/db/srv/shared");
}

#[test]
fn mount_of_unknown_volume_is_not_found() {
    let engine = engine();
    let mut web = ComponentSpec::new(base("web"));
    web.volume_relations = vec![VolumeRelationSpec {
        dep_component_id: "db".to_string(),
        volume_name: "nope".to_string(),
        volume_path: "/mnt".to_string(),
    }]
    .into();
    let err = engine
        .sync_components(&app("app-1"), &[db_component(), web], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn mounted_volume_cannot_be_removed() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();

    let mut db = db_component();
    db.volumes = Aspect::Empty;
    let err = engine.sync_components(&app("app-1"), &[db], &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ── Other aspects ──────────────────────────────────────────────────

#[test]
fn config_file_goes_when_its_volume_changes_type() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();
    assert_eq!(engine.store().list_by_owner::<ConfigFile>("web").unwrap().len(), 1);

    // Same volumes, config files absent: the file stays.
    let mut resync = ComponentSpec::new(base("web"));
    resync.component.extend_method = ExtendMethod::Stateful;
    resync.volumes = vec![
        volume("data", "/data", VolumeType::Local),
        volume("conf", "/etc/app", VolumeType::ConfigFile),
    ]
    .into();
    engine.sync_components(&app("app-1"), &[resync.clone()], &[]).unwrap();
    assert_eq!(engine.store().list_by_owner::<ConfigFile>("web").unwrap().len(), 1);

    // `conf` is kept under its name but is no longer a config-file volume.
    resync.volumes = vec![
        volume("data", "/data", VolumeType::Local),
        volume("conf", "/etc/app", VolumeType::ShareFile),
    ]
    .into();
    engine.sync_components(&app("app-1"), &[resync], &[]).unwrap();

    let store = engine.store();
    assert!(store.list_all::<ConfigFile>().unwrap().is_empty());
    let conf = store
        .get::<Volume>(&volume_key("web", "conf"))
        .unwrap()
        .unwrap();
    assert_eq!(conf.volume_type, VolumeType::ShareFile);
}

#[test]
fn autoscale_metrics_are_recreated_with_their_rule() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();

    let mut web = ComponentSpec::new(base("web"));
    web.autoscale_rules = vec![AutoscaleRuleSpec {
        rule_id: "web-hpa-2".to_string(),
        enable: true,
        xpa_type: "hpa".to_string(),
        min_replicas: 2,
        max_replicas: 6,
        metrics: vec![AutoscaleMetricSpec {
            metric_type: "resource_metrics".to_string(),
            metric_name: "memory".to_string(),
            metric_target_type: "average_value".to_string(),
            metric_target_value: 256,
        }],
    }]
    .into();
    engine.sync_components(&app("app-1"), &[web], &[]).unwrap();

    let metrics = engine.store().list_all::<AutoscaleRuleMetric>().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].rule_id, "web-hpa-2");
    assert_eq!(metrics[0].metric_name, "memory");
}

#[test]
fn dropped_http_rule_takes_its_configs() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[db_component(), full_component("web")], &[])
        .unwrap();
    assert_eq!(engine.store().list_all::<GatewayRuleConfig>().unwrap().len(), 1);

    let mut web = ComponentSpec::new(base("web"));
    web.http_rules = Aspect::Empty;
    engine.sync_components(&app("app-1"), &[web], &[]).unwrap();
    assert!(engine.store().list_all::<GatewayRuleConfig>().unwrap().is_empty());
    assert!(engine.store().list_all::<HttpRule>().unwrap().is_empty());
}

#[test]
fn third_party_endpoints_are_stored() {
    let engine = engine();
    let mut spec = ComponentSpec::new(ComponentBase {
        kind: ComponentKind::ThirdParty,
        ..base("ext")
    });
    spec.endpoints = vec![
        EndpointSpec::Static {
            address: "10.0.0.1:5432".to_string(),
        },
        EndpointSpec::Static {
            address: "10.0.0.2:5432".to_string(),
        },
    ]
    .into();
    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();

    let config: ThirdPartyDiscoveryConfig = engine.store().get("ext").unwrap().unwrap();
    assert_eq!(
        config.source,
        DiscoverySource::Static {
            endpoints: vec!["10.0.0.1:5432".to_string(), "10.0.0.2:5432".to_string()]
        }
    );
}

#[test]
fn resync_under_another_application_moves_the_component() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[ComponentSpec::new(base("c1"))], &[])
        .unwrap();
    let created = engine.get_component("c1").unwrap().created_at;

    engine
        .sync_components(&app("app-2"), &[ComponentSpec::new(base("c1"))], &[])
        .unwrap();
    let moved = engine.get_component("c1").unwrap();
    assert_eq!(moved.app_id, "app-2");
    assert_eq!(moved.created_at, created);
}

// ── Global rule ids ────────────────────────────────────────────────

fn http_rule(rule_id: &str) -> HttpRuleSpec {
    HttpRuleSpec {
        rule_id: rule_id.to_string(),
        container_port: 80,
        domain: "shop.example.com".to_string(),
        path: "/".to_string(),
        certificate_id: None,
        load_balancing: "round-robin".to_string(),
    }
}

fn with_http_rule(id: &str, rule_id: &str) -> ComponentSpec {
    let mut spec = ComponentSpec::new(base(id));
    spec.ports = vec![port(80, "http")].into();
    spec.http_rules = vec![http_rule(rule_id)].into();
    spec
}

#[test]
fn http_rule_id_held_by_another_component_conflicts() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[with_http_rule("a", "r1")], &[])
        .unwrap();

    let err = engine
        .sync_components(&app("app-1"), &[with_http_rule("b", "r1")], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // The holder may keep resyncing its own rule.
    engine
        .sync_components(&app("app-1"), &[with_http_rule("a", "r1")], &[])
        .unwrap();
}

#[test]
fn tcp_listen_address_is_exclusive() {
    let engine = engine();
    let tcp = |id: &str, rule_id: &str| {
        let mut spec = ComponentSpec::new(base(id));
        spec.ports = vec![port(5432, "tcp")].into();
        spec.tcp_rules = vec![TcpRuleSpec {
            rule_id: rule_id.to_string(),
            container_port: 5432,
            ip: "0.0.0.0".to_string(),
            port: 30000,
        }]
        .into();
        spec
    };
    engine.sync_components(&app("app-1"), &[tcp("a", "t1")], &[]).unwrap();

    let err = engine
        .sync_components(&app("app-1"), &[tcp("b", "t2")], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(engine.store().list_all::<TcpRule>().unwrap().len(), 1);
}

#[test]
fn rule_config_needs_a_held_rule() {
    let engine = engine();
    engine
        .sync_components(&app("app-1"), &[with_http_rule("a", "r1")], &[])
        .unwrap();

    // Rules absent from the batch: configs are checked against stored rules.
    let mut spec = ComponentSpec::new(base("a"));
    spec.rule_configs = vec![RuleConfigSpec {
        rule_id: "r2".to_string(),
        key: "proxy-body-size".to_string(),
        value: "10m".to_string(),
    }]
    .into();
    let err = engine
        .sync_components(&app("app-1"), std::slice::from_ref(&spec), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    spec.rule_configs = vec![RuleConfigSpec {
        rule_id: "r1".to_string(),
        key: "proxy-body-size".to_string(),
        value: "10m".to_string(),
    }]
    .into();
    engine.sync_components(&app("app-1"), &[spec], &[]).unwrap();
    assert_eq!(engine.store().list_by_owner::<GatewayRuleConfig>("r1").unwrap().len(), 1);
}

#[test]
fn autoscale_rule_id_held_by_another_component_conflicts() {
    let engine = engine();
    let scaled = |id: &str| {
        let mut spec = ComponentSpec::new(base(id));
        spec.autoscale_rules = vec![AutoscaleRuleSpec {
            rule_id: "hpa-1".to_string(),
            enable: true,
            xpa_type: "hpa".to_string(),
            min_replicas: 1,
            max_replicas: 2,
            metrics: Vec::new(),
        }]
        .into();
        spec
    };
    engine.sync_components(&app("app-1"), &[scaled("a")], &[]).unwrap();
    let err = engine
        .sync_components(&app("app-1"), &[scaled("b")], &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
