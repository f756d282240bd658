use appgrid_core::config::StorageConfig;
use appgrid_state::{ConfigFile, Volume, VolumeMountRelation, VolumeType, volume_key};
use tracing::debug;

use super::{SyncContext, owner_ids, present, replace_rows};
use crate::error::{SyncError, SyncResult};
use crate::model::{ComponentBase, ComponentSpec, VolumeSpec};

/// Roots host paths of share-file and local volumes are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePaths {
    share_path: String,
    local_path: String,
}

impl Default for VolumePaths {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for VolumePaths {
    fn from(cfg: &StorageConfig) -> Self {
        Self {
            share_path: cfg.share_path.trim_end_matches('/').to_string(),
            local_path: cfg.local_path.trim_end_matches('/').to_string(),
        }
    }
}

impl VolumePaths {
    /// Host path of a volume.
    ///
    /// `{root}/tenantEnv/{tenant_env_id}/service/{component_id}{volume_path}`
    /// for share-file and local volumes; the supplied path (or none) for
    /// every other type.
    pub fn host_path(&self, tenant_env_id: &str, component_id: &str, spec: &VolumeSpec) -> String {
        let root = match spec.volume_type {
            VolumeType::ShareFile => &self.share_path,
            VolumeType::Local => &self.local_path,
            _ => return spec.host_path.clone().unwrap_or_default(),
        };
        format!(
            "{root}/tenantEnv/{tenant_env_id}/service/{component_id}{}",
            spec.volume_path
        )
    }

    pub fn volume_row(&self, base: &ComponentBase, spec: &VolumeSpec) -> Volume {
        Volume {
            component_id: base.component_id.clone(),
            volume_name: spec.volume_name.clone(),
            volume_path: spec.volume_path.clone(),
            volume_type: spec.volume_type.clone(),
            host_path: self.host_path(&base.tenant_env_id, &base.component_id, spec),
            access_mode: spec.access_mode.clone(),
            capacity_mb: spec.capacity_mb,
            read_only: spec.read_only,
        }
    }
}

/// Replace the mounts components hold on other components' volumes.
///
/// This step runs before volumes are rewritten, so a source volume is
/// looked up in the batch first (when its owner carries volumes) and in
/// storage otherwise. The source's host path and type are copied onto
/// the mount.
pub fn sync_volume_relations(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let relations = present(specs, |s| &s.volume_relations);
    let mut rows = Vec::new();

    for (spec, desired) in &relations {
        for rel in *desired {
            let source = resolve_source(ctx, specs, &rel.dep_component_id, &rel.volume_name)?;
            rows.push(VolumeMountRelation {
                component_id: spec.id().to_string(),
                dep_component_id: rel.dep_component_id.clone(),
                volume_name: rel.volume_name.clone(),
                volume_path: rel.volume_path.clone(),
                host_path: source.host_path,
                volume_type: source.volume_type,
            });
        }
    }

    replace_rows(ctx.uow, &owner_ids(&relations), &rows)
}

fn resolve_source(
    ctx: &SyncContext<'_>,
    specs: &[ComponentSpec],
    owner: &str,
    volume_name: &str,
) -> SyncResult<Volume> {
    let not_found = || SyncError::NotFound(format!("volume {volume_name} of component {owner}"));

    let batch = specs
        .iter()
        .find(|s| s.id() == owner)
        .and_then(|s| s.volumes.desired().map(|vols| (s, vols)));
    if let Some((source, volumes)) = batch {
        return volumes
            .iter()
            .find(|v| v.volume_name == volume_name)
            .map(|v| ctx.volumes.volume_row(&source.component, v))
            .ok_or_else(not_found);
    }

    if ctx.is_deleted(owner) {
        return Err(SyncError::Validation(format!(
            "volume {volume_name} of component {owner} is mounted, but this request deletes {owner}"
        )));
    }
    ctx.uow
        .get::<Volume>(&volume_key(owner, volume_name))?
        .ok_or_else(not_found)
}

/// Replace volumes.
///
/// A volume that disappears must not be mounted by a component that
/// outlives the request. A config file goes once its volume is removed or
/// stops being a config-file volume. Mounts of rewritten volumes get the
/// new host path and type.
pub fn sync_volumes(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let uow = ctx.uow;
    let volumes = present(specs, |s| &s.volumes);
    if volumes.is_empty() {
        return Ok(0);
    }
    let owners = owner_ids(&volumes);

    let rows: Vec<Volume> = volumes
        .iter()
        .flat_map(|&(spec, desired)| {
            desired
                .iter()
                .map(move |v| ctx.volumes.volume_row(&spec.component, v))
        })
        .collect();

    let stored: Vec<Volume> = uow.list_by_owners(&owners)?;
    let mounts: Vec<VolumeMountRelation> = uow.list_all()?;

    for old in &stored {
        let kept = rows
            .iter()
            .find(|r| r.component_id == old.component_id && r.volume_name == old.volume_name);
        if kept.is_none() {
            if let Some(mount) = mounts.iter().find(|m| {
                m.dep_component_id == old.component_id
                    && m.volume_name == old.volume_name
                    && !ctx.is_deleted(&m.component_id)
            }) {
                return Err(SyncError::Validation(format!(
                    "volume {} of component {} is still mounted by component {}",
                    old.volume_name, old.component_id, mount.component_id
                )));
            }
        }
        let still_config = kept.is_some_and(|r| r.volume_type == VolumeType::ConfigFile);
        if old.volume_type == VolumeType::ConfigFile && !still_config {
            uow.delete::<ConfigFile>(&volume_key(&old.component_id, &old.volume_name))?;
        }
    }

    let written = replace_rows(uow, &owners, &rows)?;

    let refreshed: Vec<VolumeMountRelation> = mounts
        .into_iter()
        .filter_map(|mount| {
            let source = rows.iter().find(|r| {
                r.component_id == mount.dep_component_id && r.volume_name == mount.volume_name
            })?;
            if source.host_path == mount.host_path && source.volume_type == mount.volume_type {
                return None;
            }
            Some(VolumeMountRelation {
                host_path: source.host_path.clone(),
                volume_type: source.volume_type.clone(),
                ..mount
            })
        })
        .collect();
    if !refreshed.is_empty() {
        debug!(count = refreshed.len(), "volume mounts refreshed");
        uow.create_or_update_in_batch(&refreshed)?;
    }

    Ok(written)
}

/// Replace config files. Each must belong to a config-file volume of the
/// same component.
pub fn sync_config_files(ctx: &SyncContext<'_>, specs: &[ComponentSpec]) -> SyncResult<usize> {
    let files = present(specs, |s| &s.config_files);
    let mut rows = Vec::new();

    for (spec, desired) in &files {
        if desired.is_empty() {
            continue;
        }
        let volumes: Vec<Volume> = ctx.uow.list_by_owner(spec.id())?;
        for file in *desired {
            let backed = volumes.iter().any(|v| {
                v.volume_name == file.volume_name && v.volume_type == VolumeType::ConfigFile
            });
            if !backed {
                return Err(SyncError::Validation(format!(
                    "config file {} of component {} has no config-file volume",
                    file.volume_name,
                    spec.id()
                )));
            }
            rows.push(file.to_row(&spec.component));
        }
    }

    replace_rows(ctx.uow, &owner_ids(&files), &rows)
}
