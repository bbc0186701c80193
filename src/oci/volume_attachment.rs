// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Volume attachment facade used by the attach/detach state machine.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::constants::poll::VOLUME_ATTACHMENT_INTERVAL;
use crate::error::{OciError, Result};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::{
    AttachVolumeDetails, AttachmentType, ListInstanceDevicesRequest, ListVolumeAttachmentsRequest,
    VolumeAttachment, VolumeAttachmentLifecycleState as State,
};
use crate::oci::work_request::poll_until;
use crate::oci::{service, Call, OciClient};

const LIST_VOLUME_ATTACHMENTS: Call = Call::new(
    service::COMPUTE,
    "ListVolumeAttachments",
    resource::VOLUME_ATTACHMENT,
    Verb::List,
);
const GET_VOLUME_ATTACHMENT: Call = Call::new(
    service::COMPUTE,
    "GetVolumeAttachment",
    resource::VOLUME_ATTACHMENT,
    Verb::Get,
);
const ATTACH_VOLUME: Call = Call::new(
    service::COMPUTE,
    "AttachVolume",
    resource::VOLUME_ATTACHMENT,
    Verb::Create,
);
const DETACH_VOLUME: Call = Call::new(
    service::COMPUTE,
    "DetachVolume",
    resource::VOLUME_ATTACHMENT,
    Verb::Delete,
);
const LIST_INSTANCE_DEVICES: Call = Call::new(
    service::COMPUTE,
    "ListInstanceDevices",
    resource::INSTANCE_DEVICE,
    Verb::List,
);

#[async_trait]
pub trait VolumeAttachmentInterface: Send + Sync {
    /// The ATTACHING or ATTACHED attachment of a volume. A DETACHING
    /// attachment counts as not found so a new attach can follow it.
    async fn find_volume_attachment(
        &self,
        compartment_id: &str,
        volume_id: &str,
    ) -> Result<VolumeAttachment>;

    /// Like [`find_volume_attachment`](Self::find_volume_attachment) but also
    /// returns DETACHING attachments.
    async fn find_active_volume_attachment(
        &self,
        compartment_id: &str,
        volume_id: &str,
    ) -> Result<VolumeAttachment>;

    async fn get_volume_attachment(&self, id: &str) -> Result<VolumeAttachment>;

    async fn attach_volume(&self, instance_id: &str, volume_id: &str) -> Result<VolumeAttachment>;

    /// Attach using the first free consistent device path of the instance.
    async fn attach_paravirtualized_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        is_pv_encryption_in_transit_enabled: bool,
    ) -> Result<VolumeAttachment>;

    async fn wait_for_volume_attached(&self, id: &str) -> Result<VolumeAttachment>;

    async fn detach_volume(&self, id: &str) -> Result<()>;

    async fn wait_for_volume_detached(&self, id: &str) -> Result<()>;
}

impl OciClient {
    async fn find_attachment_in(
        &self,
        compartment_id: &str,
        volume_id: &str,
        include_detaching: bool,
    ) -> Result<VolumeAttachment> {
        let mut page = None;
        loop {
            let req = ListVolumeAttachmentsRequest {
                compartment_id: compartment_id.to_string(),
                volume_id: Some(volume_id.to_string()),
                instance_id: None,
                page: page.take(),
            };
            let resp = self
                .call(LIST_VOLUME_ATTACHMENTS, || {
                    self.services.compute.list_volume_attachments(req.clone())
                })
                .await?;

            for attachment in resp.body {
                match attachment.lifecycle_state {
                    State::Attaching | State::Attached => return Ok(attachment),
                    State::Detaching if include_detaching => return Ok(attachment),
                    State::Detaching => {
                        debug!("Attachment {:?} is detaching", attachment.id);
                        return Err(OciError::NotFound);
                    }
                    _ => {}
                }
            }

            match resp.opc_next_page {
                Some(next) => page = Some(next),
                None => return Err(OciError::NotFound),
            }
        }
    }

    async fn first_free_device(&self, instance_id: &str) -> Result<String> {
        let req = ListInstanceDevicesRequest {
            instance_id: instance_id.to_string(),
            is_available: Some(true),
            limit: Some(1),
            page: None,
        };
        let resp = self
            .call(LIST_INSTANCE_DEVICES, || {
                self.services.compute.list_instance_devices(req.clone())
            })
            .await?;
        resp.body
            .into_iter()
            .next()
            .map(|d| d.name)
            .ok_or_else(|| OciError::NoFreeDevicePath(instance_id.to_string()))
    }

    async fn attach(&self, details: AttachVolumeDetails) -> Result<VolumeAttachment> {
        let resp = self
            .call(ATTACH_VOLUME, || self.services.compute.attach_volume(details.clone()))
            .await?;
        info!(
            "Attachment {:?} created for volume {:?} on instance {:?}",
            resp.body.id, details.volume_id, details.instance_id
        );
        Ok(resp.body)
    }

    /// Poll until `done` accepts the attachment state. Retryable lookup errors
    /// are swallowed.
    async fn poll_attachment(
        &self,
        id: &str,
        done: impl Fn(State) -> Result<bool> + Send + Sync,
    ) -> Result<VolumeAttachment> {
        let done = &done;
        poll_until(VOLUME_ATTACHMENT_INTERVAL, || async move {
            let attachment = match self.get_volume_attachment(id).await {
                Ok(a) => a,
                Err(e) if e.is_retryable() => {
                    debug!("Retryable error getting attachment {:?}: {}", id, e);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            Ok(done(attachment.lifecycle_state)?.then_some(attachment))
        })
        .await
    }
}

#[async_trait]
impl VolumeAttachmentInterface for OciClient {
    #[instrument(skip(self))]
    async fn find_volume_attachment(
        &self,
        compartment_id: &str,
        volume_id: &str,
    ) -> Result<VolumeAttachment> {
        self.find_attachment_in(compartment_id, volume_id, false)
            .await
    }

    #[instrument(skip(self))]
    async fn find_active_volume_attachment(
        &self,
        compartment_id: &str,
        volume_id: &str,
    ) -> Result<VolumeAttachment> {
        self.find_attachment_in(compartment_id, volume_id, true)
            .await
    }

    async fn get_volume_attachment(&self, id: &str) -> Result<VolumeAttachment> {
        let resp = self
            .call(GET_VOLUME_ATTACHMENT, || {
                self.services.compute.get_volume_attachment(id)
            })
            .await?;
        Ok(resp.body)
    }

    #[instrument(skip(self))]
    async fn attach_volume(&self, instance_id: &str, volume_id: &str) -> Result<VolumeAttachment> {
        self.attach(AttachVolumeDetails {
            attachment_type: AttachmentType::Iscsi,
            instance_id: instance_id.to_string(),
            volume_id: volume_id.to_string(),
            ..Default::default()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn attach_paravirtualized_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        is_pv_encryption_in_transit_enabled: bool,
    ) -> Result<VolumeAttachment> {
        let device = self.first_free_device(instance_id).await?;
        self.attach(AttachVolumeDetails {
            attachment_type: AttachmentType::Paravirtualized,
            instance_id: instance_id.to_string(),
            volume_id: volume_id.to_string(),
            device: Some(device),
            is_pv_encryption_in_transit_enabled: Some(is_pv_encryption_in_transit_enabled),
            ..Default::default()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn wait_for_volume_attached(&self, id: &str) -> Result<VolumeAttachment> {
        self.poll_attachment(id, |state| match state {
            State::Attached => Ok(true),
            State::Detaching | State::Detached => Err(OciError::invalid_state(format!(
                "attachment {:?} in lifecycle state {:?}",
                id, state
            ))),
            _ => Ok(false),
        })
        .await
    }

    #[instrument(skip(self))]
    async fn detach_volume(&self, id: &str) -> Result<()> {
        self.call(DETACH_VOLUME, || self.services.compute.detach_volume(id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn wait_for_volume_detached(&self, id: &str) -> Result<()> {
        self.poll_attachment(id, |state| Ok(state == State::Detached))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::models::Device;
    use crate::test_utils::FakeOci;

    fn make_attachment(id: &str, instance: &str, state: State) -> VolumeAttachment {
        VolumeAttachment {
            id: id.to_string(),
            compartment_id: "c".to_string(),
            instance_id: instance.to_string(),
            volume_id: "vol".to_string(),
            lifecycle_state: state,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_skips_detached_and_reports_detaching_as_missing() {
        let fake = FakeOci::new();
        fake.add_volume_attachment(make_attachment("a0", "i1", State::Detached));
        fake.add_volume_attachment(make_attachment("a1", "i1", State::Detaching));
        let client = fake.client();

        let err = client.find_volume_attachment("c", "vol").await.unwrap_err();
        assert!(err.is_not_found());

        let active = client
            .find_active_volume_attachment("c", "vol")
            .await
            .unwrap();
        assert_eq!(active.id, "a1");
    }

    #[tokio::test]
    async fn test_find_attached() {
        let fake = FakeOci::new();
        fake.add_volume_attachment(make_attachment("a0", "i1", State::Detached));
        fake.add_volume_attachment(make_attachment("a1", "i2", State::Attached));

        let found = fake
            .client()
            .find_volume_attachment("c", "vol")
            .await
            .unwrap();
        assert_eq!(found.instance_id, "i2");
    }

    #[tokio::test]
    async fn test_paravirtualized_needs_free_device() {
        let fake = FakeOci::new();
        let client = fake.client();

        let err = client
            .attach_paravirtualized_volume("i1", "vol", false)
            .await
            .unwrap_err();
        assert!(matches!(err, OciError::NoFreeDevicePath(_)));
        assert_eq!(fake.calls("AttachVolume"), 0);

        fake.add_device(
            "i1",
            Device {
                name: "/dev/oracleoci/oraclevdb".to_string(),
                is_available: Some(true),
            },
        );
        let attachment = client
            .attach_paravirtualized_volume("i1", "vol", false)
            .await
            .unwrap();
        assert_eq!(attachment.attachment_type, AttachmentType::Paravirtualized);
        assert_eq!(attachment.device.as_deref(), Some("/dev/oracleoci/oraclevdb"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_attached_and_detached() {
        let fake = FakeOci::new();
        let client = fake.client();

        let attachment = client.attach_volume("i1", "vol").await.unwrap();
        assert_eq!(attachment.lifecycle_state, State::Attaching);

        let attached = client.wait_for_volume_attached(&attachment.id).await.unwrap();
        assert_eq!(attached.lifecycle_state, State::Attached);
        assert!(attached.iqn.is_some());

        client.detach_volume(&attachment.id).await.unwrap();
        client.wait_for_volume_detached(&attachment.id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_attached_fails_when_detaching() {
        let fake = FakeOci::new();
        fake.add_volume_attachment(make_attachment("a1", "i1", State::Detaching));

        let err = fake
            .client()
            .wait_for_volume_attached("a1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("a1"));
    }
}
