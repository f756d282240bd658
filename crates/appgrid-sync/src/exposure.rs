//! Network exposure of single component ports.
//!
//! Each port carries two flags, inner (reachable inside the tenant env)
//! and outer (reachable through the gateway). Toggling a flag re-evaluates
//! the component's stream plugin ports: a mapping exists for a port iff the
//! port is exposed and an active inbound network plugin is bound. After
//! the change commits, the gateway worker is asked to re-apply its rules.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use appgrid_core::PlatformConfig;
use appgrid_state::{
    PluginModel, PluginRelation, Port, StateStore, StreamPluginPort, port_key, stream_port_key,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::atomically;
use crate::port_alloc::PortAllocator;
use crate::queue::{Notifier, TASK_APPLY_RULE, TaskQueue};
use crate::syncers::reconcile_stream_ports;
use crate::validate::key_segment;

/// Which of a port's two exposure flags a toggle acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    Inner,
    Outer,
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Exposure::Inner => "inner",
            Exposure::Outer => "outer",
        })
    }
}

/// Exposure of one port after a toggle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortExposure {
    pub component_id: String,
    pub container_port: u16,
    pub is_inner_service: bool,
    pub is_outer_service: bool,
    /// Proxy port of the inbound plugin in front of this port, if any.
    pub plugin_port: Option<u16>,
}

/// Toggles port exposure and hands out stream plugin ports on demand.
#[derive(Clone)]
pub struct ExposureController {
    store: StateStore,
    allocator: PortAllocator,
    notifier: Notifier,
}

impl ExposureController {
    pub fn new(store: StateStore, config: &PlatformConfig, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            allocator: PortAllocator::from(&config.stream_ports),
            notifier: Notifier::new(queue, &config.queue),
        }
    }

    /// Open or close a port to traffic from outside the tenant env.
    pub async fn toggle_external(
        &self,
        component_id: &str,
        container_port: u16,
        on: bool,
    ) -> SyncResult<PortExposure> {
        self.toggle(component_id, container_port, Exposure::Outer, on)
            .await
    }

    /// Open or close a port to other components of the tenant env.
    pub async fn toggle_internal(
        &self,
        component_id: &str,
        container_port: u16,
        on: bool,
    ) -> SyncResult<PortExposure> {
        self.toggle(component_id, container_port, Exposure::Inner, on)
            .await
    }

    async fn toggle(
        &self,
        component_id: &str,
        container_port: u16,
        which: Exposure,
        on: bool,
    ) -> SyncResult<PortExposure> {
        key_segment(component_id, "component id")?;
        let exposure = atomically(&self.store, |uow| {
            let mut port = uow
                .get::<Port>(&port_key(component_id, container_port))?
                .ok_or_else(|| {
                    SyncError::NotFound(format!("port {container_port} of component {component_id}"))
                })?;

            let flag = match which {
                Exposure::Inner => &mut port.is_inner_service,
                Exposure::Outer => &mut port.is_outer_service,
            };
            if *flag == on {
                return Err(SyncError::Conflict(format!(
                    "{which} port {container_port} of component {component_id} is already {}",
                    if on { "open" } else { "close" }
                )));
            }
            *flag = on;
            uow.put(&port)?;

            let plugins: Vec<PluginRelation> = uow.list_by_owner(component_id)?;
            let bound: Vec<&PluginRelation> = plugins.iter().collect();
            let ports: Vec<Port> = uow.list_by_owner(component_id)?;
            reconcile_stream_ports(uow, &self.allocator, component_id, &bound, &ports)?;

            let plugin_port = uow
                .list_by_owner::<StreamPluginPort>(component_id)?
                .into_iter()
                .find(|m| m.container_port == container_port)
                .map(|m| m.plugin_port);

            Ok(PortExposure {
                component_id: component_id.to_string(),
                container_port,
                is_inner_service: port.is_inner_service,
                is_outer_service: port.is_outer_service,
                plugin_port,
            })
        })?;

        info!(
            component_id,
            container_port,
            exposure = %which,
            on,
            plugin_port = ?exposure.plugin_port,
            "port exposure changed"
        );
        self.notifier
            .notify(
                TASK_APPLY_RULE,
                serde_json::json!({
                    "component_id": component_id,
                    "container_port": container_port,
                    "exposure": which,
                    "open": on,
                }),
            )
            .await;
        Ok(exposure)
    }

    /// Return the stream plugin port in front of `container_port` for an
    /// inbound plugin model, allocating and storing one if there is none.
    ///
    /// Only a mapping the next toggle or sync would keep is handed out: the
    /// component needs an active plugin of `plugin_model` and the port has
    /// to be exposed.
    pub fn allocate_stream_port(
        &self,
        component_id: &str,
        plugin_model: PluginModel,
        container_port: u16,
    ) -> SyncResult<StreamPluginPort> {
        if !plugin_model.is_inbound() {
            return Err(SyncError::Validation(format!(
                "plugin model {plugin_model} does not proxy inbound traffic"
            )));
        }
        key_segment(component_id, "component id")?;
        atomically(&self.store, |uow| {
            let port = uow
                .get::<Port>(&port_key(component_id, container_port))?
                .ok_or_else(|| {
                    SyncError::NotFound(format!("port {container_port} of component {component_id}"))
                })?;
            let active = uow
                .list_by_owner::<PluginRelation>(component_id)?
                .into_iter()
                .any(|p| p.switch && p.plugin_model == plugin_model);
            if !active {
                return Err(SyncError::Validation(format!(
                    "component {component_id} has no active {plugin_model} plugin"
                )));
            }
            if !port.is_exposed() {
                return Err(SyncError::Validation(format!(
                    "port {container_port} of component {component_id} is not exposed"
                )));
            }
            let key = stream_port_key(component_id, plugin_model, container_port);
            if let Some(existing) = uow.get::<StreamPluginPort>(&key)? {
                return Ok(existing);
            }

            let taken: BTreeSet<u16> = uow
                .list_by_owner::<StreamPluginPort>(component_id)?
                .into_iter()
                .filter(|m| m.plugin_model == plugin_model)
                .map(|m| m.plugin_port)
                .collect();
            let row = StreamPluginPort {
                component_id: component_id.to_string(),
                plugin_model,
                container_port,
                plugin_port: self.allocator.allocate_one(&taken)?,
            };
            uow.put(&row)?;
            info!(component_id, container_port, plugin_port = row.plugin_port, "stream plugin port allocated");
            Ok(row)
        })
    }
}
