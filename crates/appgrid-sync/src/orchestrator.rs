//! Synchronization orchestrator.
//!
//! `SyncEngine::sync_components` validates a batch, then runs every
//! per-aspect syncer in [`SYNC_STEPS`] order inside one unit of work and
//! finishes with the cascade for the components the request deletes.
//! Either everything lands or nothing does.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{SystemTime, UNIX_EPOCH};

use appgrid_core::PlatformConfig;
use appgrid_state::{
    Application, Component, DependencyRelation, StateStore, UnitOfWork, dependency_key,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cascade::cascade_delete;
use crate::error::{SyncError, SyncResult};
use crate::model::ComponentSpec;
use crate::port_alloc::PortAllocator;
use crate::syncers::{self, SyncContext, SyncStep, VolumePaths};
use crate::validate::{key_segment, validate_batch};

/// Sync order. Monitors are checked against ports before ports are
/// rewritten; plugins bind before ports so that rewritten ports get their
/// stream mappings against the final plugin set; mounts resolve against
/// the batch's volumes, so they may precede the volumes step.
pub const SYNC_STEPS: &[(&str, SyncStep)] = &[
    ("component", syncers::sync_component_base),
    ("gateway_rules", syncers::sync_gateway_rules),
    ("gateway_rule_configs", syncers::sync_rule_configs),
    ("monitors", syncers::sync_monitors),
    ("plugins", syncers::sync_plugins),
    ("ports", syncers::sync_ports),
    ("dependencies", syncers::sync_dependencies),
    ("envs", syncers::sync_envs),
    ("volume_relations", syncers::sync_volume_relations),
    ("volumes", syncers::sync_volumes),
    ("config_files", syncers::sync_config_files),
    ("probes", syncers::sync_probes),
    ("config_groups", syncers::sync_config_groups),
    ("labels", syncers::sync_labels),
    ("autoscale_rules", syncers::sync_autoscale_rules),
    ("endpoints", syncers::sync_endpoints),
];

/// What one synchronization pass did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub app_id: String,
    pub components_upserted: usize,
    /// Rows written per step, keyed by step name.
    pub rows_written: BTreeMap<String, usize>,
    pub components_deleted: usize,
    pub rows_deleted: u64,
}

/// Declarative component synchronization over a [`StateStore`].
#[derive(Clone)]
pub struct SyncEngine {
    store: StateStore,
    volumes: VolumePaths,
    allocator: PortAllocator,
}

impl SyncEngine {
    pub fn new(store: StateStore, config: &PlatformConfig) -> Self {
        Self {
            store,
            volumes: VolumePaths::from(&config.storage),
            allocator: PortAllocator::from(&config.stream_ports),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    // ── Applications ───────────────────────────────────────────────

    /// Create or update an application, keeping its creation time.
    pub fn put_application(&self, app: Application) -> SyncResult<Application> {
        key_segment(&app.app_id, "application id")?;
        if app.tenant_env_id.is_empty() {
            return Err(SyncError::Validation(format!(
                "application {} needs a tenant env",
                app.app_id
            )));
        }
        let now = unix_now();
        atomically(&self.store, |uow| {
            let created_at = uow
                .get::<Application>(&app.app_id)?
                .map_or(now, |prev| prev.created_at);
            let row = Application {
                created_at,
                updated_at: now,
                ..app
            };
            uow.put(&row)?;
            Ok(row)
        })
    }

    pub fn get_application(&self, app_id: &str) -> SyncResult<Application> {
        self.store
            .get(app_id)?
            .ok_or_else(|| SyncError::NotFound(format!("application {app_id}")))
    }

    pub fn get_component(&self, component_id: &str) -> SyncResult<Component> {
        self.store
            .get(component_id)?
            .ok_or_else(|| SyncError::NotFound(format!("component {component_id}")))
    }

    // ── Synchronization ────────────────────────────────────────────

    /// Converge the stored state of `specs` to the desired state and delete
    /// `delete_ids`, all in one transaction.
    pub fn sync_components(
        &self,
        app: &Application,
        specs: &[ComponentSpec],
        delete_ids: &[String],
    ) -> SyncResult<SyncReport> {
        validate_batch(app, specs, delete_ids)?;
        let report = self.run(app, specs, delete_ids, SYNC_STEPS)?;
        info!(
            app_id = %app.app_id,
            upserted = report.components_upserted,
            deleted = report.components_deleted,
            "components synchronized"
        );
        Ok(report)
    }

    fn run(
        &self,
        app: &Application,
        specs: &[ComponentSpec],
        delete_ids: &[String],
        steps: &[(&str, SyncStep)],
    ) -> SyncResult<SyncReport> {
        let now = unix_now();
        atomically(&self.store, |uow| {
            let ctx = SyncContext {
                uow,
                app,
                volumes: &self.volumes,
                allocator: &self.allocator,
                delete_ids,
                now,
            };
            let mut report = SyncReport {
                app_id: app.app_id.clone(),
                components_upserted: specs.len(),
                ..SyncReport::default()
            };
            for (name, step) in steps {
                let rows = step(&ctx, specs)?;
                debug!(step = *name, rows, "sync step done");
                report.rows_written.insert(name.to_string(), rows);
            }
            if !delete_ids.is_empty() {
                report.components_deleted = count_existing(uow, delete_ids)?;
                report.rows_deleted = cascade_delete(uow, delete_ids)?;
            }
            Ok(report)
        })
    }

    // ── Deletion ───────────────────────────────────────────────────

    /// Delete one component and everything attached to it.
    pub fn delete_component(&self, component_id: &str) -> SyncResult<u64> {
        key_segment(component_id, "component id")?;
        let rows = atomically(&self.store, |uow| {
            if uow.get::<Component>(component_id)?.is_none() {
                return Err(SyncError::NotFound(format!("component {component_id}")));
            }
            cascade_delete(uow, &[component_id.to_string()])
        })?;
        info!(component_id, rows, "component deleted");
        Ok(rows)
    }

    /// Delete a set of components. Unknown ids are skipped.
    pub fn delete_components(&self, component_ids: &[String]) -> SyncResult<u64> {
        for id in component_ids {
            key_segment(id, "component id")?;
        }
        let rows = atomically(&self.store, |uow| cascade_delete(uow, component_ids))?;
        info!(count = component_ids.len(), rows, "components deleted");
        Ok(rows)
    }

    // ── Single dependency edges ────────────────────────────────────

    /// Add `component_id -> dep_component_id`. Returns false when the edge
    /// already existed.
    pub fn add_dependency(&self, component_id: &str, dep_component_id: &str) -> SyncResult<bool> {
        key_segment(component_id, "component id")?;
        key_segment(dep_component_id, "dependency target")?;
        if component_id == dep_component_id {
            return Err(SyncError::Validation(format!(
                "component {component_id} depends on itself"
            )));
        }
        atomically(&self.store, |uow| {
            let component = uow
                .get::<Component>(component_id)?
                .ok_or_else(|| SyncError::NotFound(format!("component {component_id}")))?;
            if uow.get::<Component>(dep_component_id)?.is_none() {
                return Err(SyncError::NotFound(format!(
                    "dependency target component {dep_component_id}"
                )));
            }
            let key = dependency_key(component_id, dep_component_id);
            if uow.get::<DependencyRelation>(&key)?.is_some() {
                return Ok(false);
            }
            uow.put(&DependencyRelation {
                component_id: component_id.to_string(),
                dep_component_id: dep_component_id.to_string(),
                tenant_env_id: component.tenant_env_id,
            })?;
            Ok(true)
        })
    }

    /// Remove `component_id -> dep_component_id`. Returns whether it existed.
    pub fn remove_dependency(
        &self,
        component_id: &str,
        dep_component_id: &str,
    ) -> SyncResult<bool> {
        key_segment(component_id, "component id")?;
        key_segment(dep_component_id, "dependency target")?;
        atomically(&self.store, |uow| {
            Ok(uow.delete::<DependencyRelation>(&dependency_key(component_id, dep_component_id))?)
        })
    }
}

fn count_existing(uow: &UnitOfWork, ids: &[String]) -> SyncResult<usize> {
    let mut found = 0;
    for id in ids {
        if uow.get::<Component>(id)?.is_some() {
            found += 1;
        }
    }
    Ok(found)
}

/// Run `f` in one transaction and turn a panic into [`SyncError::Panicked`].
///
/// The store rolls the transaction back before the panic reaches us.
pub(crate) fn atomically<T, F>(store: &StateStore, f: F) -> SyncResult<T>
where
    F: FnOnce(&UnitOfWork) -> SyncResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| store.transaction(f))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(panic = %message, "transaction panicked and was rolled back");
            Err(SyncError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
