// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! File Storage facade: file systems, mount targets and exports.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::constants::poll::{FILE_STORAGE_INTERVAL, FILE_STORAGE_TIMEOUT};
use crate::error::{OciError, Result};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::{
    CreateExportDetails, CreateFileSystemDetails, CreateMountTargetDetails, Export, FileSystem,
    FssLifecycleState, ListExportsRequest, ListFileSystemsRequest, ListMountTargetsRequest,
    MountTarget,
};
use crate::oci::work_request::poll_until_timeout;
use crate::oci::{service, Call, OciClient};

macro_rules! fss_call {
    ($name:ident, $op:literal, $resource:expr, $verb:expr) => {
        const $name: Call = Call::new(service::FILE_STORAGE, $op, $resource, $verb);
    };
}

fss_call!(CREATE_FILE_SYSTEM, "CreateFileSystem", resource::FILE_SYSTEM, Verb::Create);
fss_call!(GET_FILE_SYSTEM, "GetFileSystem", resource::FILE_SYSTEM, Verb::Get);
fss_call!(LIST_FILE_SYSTEMS, "ListFileSystems", resource::FILE_SYSTEM, Verb::List);
fss_call!(DELETE_FILE_SYSTEM, "DeleteFileSystem", resource::FILE_SYSTEM, Verb::Delete);
fss_call!(CREATE_MOUNT_TARGET, "CreateMountTarget", resource::MOUNT_TARGET, Verb::Create);
fss_call!(GET_MOUNT_TARGET, "GetMountTarget", resource::MOUNT_TARGET, Verb::Get);
fss_call!(LIST_MOUNT_TARGETS, "ListMountTargets", resource::MOUNT_TARGET, Verb::List);
fss_call!(DELETE_MOUNT_TARGET, "DeleteMountTarget", resource::MOUNT_TARGET, Verb::Delete);
fss_call!(CREATE_EXPORT, "CreateExport", resource::EXPORT, Verb::Create);
fss_call!(GET_EXPORT, "GetExport", resource::EXPORT, Verb::Get);
fss_call!(LIST_EXPORTS, "ListExports", resource::EXPORT, Verb::List);
fss_call!(DELETE_EXPORT, "DeleteExport", resource::EXPORT, Verb::Delete);

#[async_trait]
pub trait FileStorageInterface: Send + Sync {
    async fn create_file_system(&self, details: CreateFileSystemDetails) -> Result<FileSystem>;
    async fn get_file_system(&self, id: &str) -> Result<FileSystem>;
    async fn await_file_system_active(&self, id: &str) -> Result<FileSystem>;
    /// File systems with the display name that are CREATING or ACTIVE. Any
    /// match in another state is reported as an error.
    async fn get_file_systems_by_display_name(
        &self,
        compartment_id: &str,
        availability_domain: &str,
        display_name: &str,
    ) -> Result<Vec<FileSystem>>;
    async fn delete_file_system(&self, id: &str) -> Result<()>;

    async fn create_mount_target(&self, details: CreateMountTargetDetails) -> Result<MountTarget>;
    async fn get_mount_target(&self, id: &str) -> Result<MountTarget>;
    async fn await_mount_target_active(&self, id: &str) -> Result<MountTarget>;
    async fn get_mount_targets_by_display_name(
        &self,
        compartment_id: &str,
        availability_domain: &str,
        display_name: &str,
    ) -> Result<Vec<MountTarget>>;
    async fn delete_mount_target(&self, id: &str) -> Result<()>;

    async fn create_export(&self, details: CreateExportDetails) -> Result<Export>;
    async fn get_export(&self, id: &str) -> Result<Export>;
    async fn await_export_active(&self, id: &str) -> Result<Export>;
    /// The export of `file_system_id` at `path`, failing if it is neither
    /// CREATING nor ACTIVE.
    async fn find_export(
        &self,
        file_system_id: &str,
        path: &str,
        export_set_id: &str,
    ) -> Result<Export>;
    async fn delete_export(&self, id: &str) -> Result<()>;
}

/// Split display name matches into usable ones, failing on any conflict.
fn usable_or_conflict<T>(
    kind: &str,
    items: Vec<T>,
    state: impl Fn(&T) -> FssLifecycleState,
    id: impl Fn(&T) -> &str,
) -> Result<Vec<T>> {
    let conflicting: Vec<String> = items
        .iter()
        .filter(|i| !state(i).is_usable())
        .map(|i| format!("{} ({:?})", id(i), state(i)))
        .collect();
    if !conflicting.is_empty() {
        return Err(OciError::invalid_state(format!(
            "Found {} neither active nor creating state: {}",
            kind,
            conflicting.join(", ")
        )));
    }
    Ok(items)
}

/// Map a lifecycle state to done, keep polling, or a terminal failure.
fn active_or_fail(kind: &str, id: &str, state: FssLifecycleState) -> Result<bool> {
    match state {
        FssLifecycleState::Active => {
            info!("{} {:?} is in lifecycle state ACTIVE", kind, id);
            Ok(true)
        }
        FssLifecycleState::Deleting | FssLifecycleState::Deleted | FssLifecycleState::Failed => {
            Err(OciError::invalid_state(format!(
                "{} {:?} is in lifecycle state {:?} and will not become ACTIVE",
                kind, id, state
            )))
        }
        other => {
            debug!("{} {:?} is in lifecycle state {:?}", kind, id, other);
            Ok(false)
        }
    }
}

#[async_trait]
impl FileStorageInterface for OciClient {
    #[instrument(skip(self, details), fields(name = %details.display_name))]
    async fn create_file_system(&self, details: CreateFileSystemDetails) -> Result<FileSystem> {
        let resp = self
            .call(CREATE_FILE_SYSTEM, || {
                self.services.file_storage.create_file_system(details.clone())
            })
            .await?;
        Ok(resp.body)
    }

    async fn get_file_system(&self, id: &str) -> Result<FileSystem> {
        let resp = self
            .call(GET_FILE_SYSTEM, || self.services.file_storage.get_file_system(id))
            .await?;
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn await_file_system_active(&self, id: &str) -> Result<FileSystem> {
        info!("Waiting for FileSystem to be in lifecycle state ACTIVE");
        poll_until_timeout(FILE_STORAGE_INTERVAL, FILE_STORAGE_TIMEOUT, || async move {
            let fs = self.get_file_system(id).await?;
            Ok(active_or_fail("file system", id, fs.lifecycle_state)?.then_some(fs))
        })
        .await
    }

    async fn get_file_systems_by_display_name(
        &self,
        compartment_id: &str,
        availability_domain: &str,
        display_name: &str,
    ) -> Result<Vec<FileSystem>> {
        let req = ListFileSystemsRequest {
            compartment_id: compartment_id.to_string(),
            availability_domain: availability_domain.to_string(),
            display_name: Some(display_name.to_string()),
            page: None,
        };
        let items = self
            .paginate(LIST_FILE_SYSTEMS, |page| {
                self.services
                    .file_storage
                    .list_file_systems(ListFileSystemsRequest { page, ..req.clone() })
            })
            .await?;
        usable_or_conflict("file system", items, |f| f.lifecycle_state, |f| &f.id)
    }

    #[instrument(skip(self))]
    async fn delete_file_system(&self, id: &str) -> Result<()> {
        self.call(DELETE_FILE_SYSTEM, || {
            self.services.file_storage.delete_file_system(id)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self, details), fields(name = %details.display_name))]
    async fn create_mount_target(&self, details: CreateMountTargetDetails) -> Result<MountTarget> {
        let resp = self
            .call(CREATE_MOUNT_TARGET, || {
                self.services.file_storage.create_mount_target(details.clone())
            })
            .await?;
        Ok(resp.body)
    }

    async fn get_mount_target(&self, id: &str) -> Result<MountTarget> {
        let resp = self
            .call(GET_MOUNT_TARGET, || {
                self.services.file_storage.get_mount_target(id)
            })
            .await?;
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn await_mount_target_active(&self, id: &str) -> Result<MountTarget> {
        info!("Waiting for MountTarget to be in lifecycle state ACTIVE");
        poll_until_timeout(FILE_STORAGE_INTERVAL, FILE_STORAGE_TIMEOUT, || async move {
            let mt = self.get_mount_target(id).await?;
            Ok(active_or_fail("mount target", id, mt.lifecycle_state)?.then_some(mt))
        })
        .await
    }

    async fn get_mount_targets_by_display_name(
        &self,
        compartment_id: &str,
        availability_domain: &str,
        display_name: &str,
    ) -> Result<Vec<MountTarget>> {
        let req = ListMountTargetsRequest {
            compartment_id: compartment_id.to_string(),
            availability_domain: availability_domain.to_string(),
            display_name: Some(display_name.to_string()),
            page: None,
        };
        let items = self
            .paginate(LIST_MOUNT_TARGETS, |page| {
                self.services
                    .file_storage
                    .list_mount_targets(ListMountTargetsRequest { page, ..req.clone() })
            })
            .await?;
        usable_or_conflict("mount target", items, |m| m.lifecycle_state, |m| &m.id)
    }

    #[instrument(skip(self))]
    async fn delete_mount_target(&self, id: &str) -> Result<()> {
        self.call(DELETE_MOUNT_TARGET, || {
            self.services.file_storage.delete_mount_target(id)
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self, details), fields(path = %details.path))]
    async fn create_export(&self, details: CreateExportDetails) -> Result<Export> {
        let resp = self
            .call(CREATE_EXPORT, || {
                self.services.file_storage.create_export(details.clone())
            })
            .await?;
        Ok(resp.body)
    }

    async fn get_export(&self, id: &str) -> Result<Export> {
        let resp = self
            .call(GET_EXPORT, || self.services.file_storage.get_export(id))
            .await?;
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn await_export_active(&self, id: &str) -> Result<Export> {
        info!("Waiting for Export to be in lifecycle state ACTIVE");
        poll_until_timeout(FILE_STORAGE_INTERVAL, FILE_STORAGE_TIMEOUT, || async move {
            let export = self.get_export(id).await?;
            Ok(active_or_fail("export", id, export.lifecycle_state)?.then_some(export))
        })
        .await
    }

    async fn find_export(
        &self,
        file_system_id: &str,
        path: &str,
        export_set_id: &str,
    ) -> Result<Export> {
        let mut page = None;
        loop {
            let req = ListExportsRequest {
                file_system_id: file_system_id.to_string(),
                export_set_id: export_set_id.to_string(),
                page: page.take(),
            };
            let resp = self
                .call(LIST_EXPORTS, || {
                    self.services.file_storage.list_exports(req.clone())
                })
                .await?;

            if let Some(export) = resp.body.into_iter().find(|e| e.path == path) {
                if export.lifecycle_state.is_usable() {
                    return Ok(export);
                }
                return Err(OciError::invalid_state(format!(
                    "Found export in conflicting state {}: {:?}",
                    export.id, export.lifecycle_state
                )));
            }

            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => return Err(OciError::NotFound),
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_export(&self, id: &str) -> Result<()> {
        self.call(DELETE_EXPORT, || self.services.file_storage.delete_export(id))
            .await?;
        Ok(())
    }
}
