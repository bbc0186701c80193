// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Block volume facade.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::constants::poll::{VOLUME_CLONE_INTERVAL, VOLUME_INTERVAL};
use crate::error::{OciError, Result};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::{CreateVolumeDetails, ListVolumesRequest, Volume, VolumeLifecycleState};
use crate::oci::work_request::{poll_until, poll_until_timeout};
use crate::oci::{service, Call, OciClient};

const GET_VOLUME: Call = Call::new(service::BLOCKSTORAGE, "GetVolume", resource::VOLUME, Verb::Get);
const LIST_VOLUMES: Call =
    Call::new(service::BLOCKSTORAGE, "ListVolumes", resource::VOLUME, Verb::List);
const CREATE_VOLUME: Call = Call::new(
    service::BLOCKSTORAGE,
    "CreateVolume",
    resource::VOLUME,
    Verb::Create,
);
const DELETE_VOLUME: Call = Call::new(
    service::BLOCKSTORAGE,
    "DeleteVolume",
    resource::VOLUME,
    Verb::Delete,
);

#[async_trait]
pub trait BlockStorageInterface: Send + Sync {
    async fn get_volume(&self, id: &str) -> Result<Volume>;
    async fn get_volumes_by_name(&self, name: &str, compartment_id: &str) -> Result<Vec<Volume>>;
    async fn create_volume(&self, details: CreateVolumeDetails) -> Result<Volume>;
    async fn delete_volume(&self, id: &str) -> Result<()>;

    /// Wait until the volume is AVAILABLE. FAULTY, TERMINATING and TERMINATED
    /// are terminal failures.
    async fn await_volume_available(&self, id: &str, timeout: Option<Duration>) -> Result<Volume>;

    /// Wait until a cloned volume is AVAILABLE and hydrated.
    async fn await_volume_clone_available(&self, id: &str, timeout: Duration) -> Result<Volume>;
}

impl OciClient {
    /// One availability check. Retryable lookup failures count as "not yet".
    async fn check_volume(&self, id: &str, require_hydrated: bool) -> Result<Option<Volume>> {
        let volume = match self.get_volume(id).await {
            Ok(v) => v,
            Err(e) if e.is_retryable() => {
                debug!("Retryable error getting volume {:?}: {}", id, e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match volume.lifecycle_state {
            VolumeLifecycleState::Available if !require_hydrated || volume.is_clone_ready() => {
                Ok(Some(volume))
            }
            state @ (VolumeLifecycleState::Faulty
            | VolumeLifecycleState::Terminated
            | VolumeLifecycleState::Terminating) => Err(OciError::invalid_state(format!(
                "volume did not become available (lifecycleState={:?})",
                state
            ))),
            state => {
                debug!(
                    "Volume {:?} is {:?} (hydrated: {:?})",
                    id, state, volume.is_hydrated
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BlockStorageInterface for OciClient {
    async fn get_volume(&self, id: &str) -> Result<Volume> {
        let resp = self
            .call(GET_VOLUME, || self.services.block_storage.get_volume(id))
            .await?;
        Ok(resp.body)
    }

    async fn get_volumes_by_name(&self, name: &str, compartment_id: &str) -> Result<Vec<Volume>> {
        let req = ListVolumesRequest {
            compartment_id: compartment_id.to_string(),
            display_name: Some(name.to_string()),
            ..Default::default()
        };
        self.paginate(LIST_VOLUMES, |page| {
            self.services
                .block_storage
                .list_volumes(ListVolumesRequest { page, ..req.clone() })
        })
        .await
    }

    #[instrument(skip(self, details), fields(name = %details.display_name))]
    async fn create_volume(&self, details: CreateVolumeDetails) -> Result<Volume> {
        let resp = self
            .call(CREATE_VOLUME, || {
                self.services.block_storage.create_volume(details.clone())
            })
            .await?;
        info!("Created volume {:?}", resp.body.id);
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.call(DELETE_VOLUME, || self.services.block_storage.delete_volume(id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn await_volume_available(&self, id: &str, timeout: Option<Duration>) -> Result<Volume> {
        let check = || self.check_volume(id, false);
        match timeout {
            Some(timeout) => poll_until_timeout(VOLUME_INTERVAL, timeout, check).await,
            None => poll_until(VOLUME_INTERVAL, check).await,
        }
    }

    #[instrument(skip(self))]
    async fn await_volume_clone_available(&self, id: &str, timeout: Duration) -> Result<Volume> {
        poll_until_timeout(VOLUME_CLONE_INTERVAL, timeout, || {
            self.check_volume(id, true)
        })
        .await
    }
}
