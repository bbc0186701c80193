// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{
    Driver, DriverStatus, FlexConfig, FlexPaths, Options, OPTION_FS_TYPE, OPTION_PV_OR_VOLUME_NAME,
    OPTION_READ_WRITE,
};
use crate::config::MetadataSvc;
use crate::disk::{wait_for_path_to_exist, DiskOpener, IscsiDiskOpener};
use crate::error::{OciError, Result};
use crate::kubernetes::client::create_client;
use crate::kubernetes::nodes::KubeNodeLookup;
use crate::metadata::MetadataClient;
use crate::oci::transport::TransportConfig;
use crate::oci::{OciClient, Services};
use crate::volume::{AttachMode, VolumeAttacher};

const OCID_PREFIX: &str = "ocid1.";
const DEVICE_PATH_RETRIES: u32 = 20;

/// Expand a bare volume name to a full OCID in the given region.
pub fn derive_volume_ocid(region_key: &str, volume_name: &str) -> String {
    if volume_name.starts_with(OCID_PREFIX) {
        volume_name.to_string()
    } else {
        format!("ocid1.volume.oc1.{}.{}", region_key, volume_name)
    }
}

/// What the credentialed calls need. Only master nodes carry a config file.
#[derive(Clone)]
pub struct MasterContext {
    pub attacher: VolumeAttacher,
    pub region_key: String,
}

/// The OCI block volume FlexVolume driver.
pub struct OciFlexvolumeDriver {
    paths: FlexPaths,
    master: bool,
    disks: Arc<dyn DiskOpener>,
    context: Option<MasterContext>,
}

impl OciFlexvolumeDriver {
    /// A host with a config file is a master, any other host a worker.
    pub fn new(paths: FlexPaths) -> Self {
        let config_path = paths.config_path();
        let master = config_path.exists();
        if !master {
            info!("Config file {:?} does not exist. Assuming worker node.", config_path);
        }
        Self {
            paths,
            master,
            disks: Arc::new(IscsiDiskOpener::default()),
            context: None,
        }
    }

    pub fn with_context(paths: FlexPaths, context: MasterContext, disks: Arc<dyn DiskOpener>) -> Self {
        Self {
            paths,
            master: true,
            disks,
            context: Some(context),
        }
    }

    pub fn with_disks(mut self, disks: Arc<dyn DiskOpener>) -> Self {
        self.disks = disks;
        self
    }

    pub fn is_master(&self) -> bool {
        self.master
    }

    async fn master_context(&self) -> Result<MasterContext> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        if !self.master {
            return Err(OciError::fatal(format!(
                "config file {:?} does not exist; volume attachment is only available on master nodes",
                self.paths.config_path()
            )));
        }

        let metadata = MetadataSvc::new(Arc::new(MetadataClient::new()?));
        let config = FlexConfig::from_file(self.paths.config_path(), metadata).await?;
        let services = Services::connect(&config.cloud, &TransportConfig::from_env())?;
        let client = OciClient::new(services, config.rate_limiter());
        let kubeconfig = self.paths.kubeconfig_path();
        let kube = create_client(Some(kubeconfig.as_path())).await?;
        Ok(MasterContext {
            attacher: VolumeAttacher::new(
                client,
                Arc::new(KubeNodeLookup::new(kube)),
                config.compartment_id(),
            ),
            region_key: config.region_key().to_string(),
        })
    }

    fn volume_ocid(context: &MasterContext, opts: &Options) -> Result<String> {
        let name = opts
            .get(OPTION_PV_OR_VOLUME_NAME)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                OciError::invalid_state(format!("missing option {:?}", OPTION_PV_OR_VOLUME_NAME))
            })?;
        Ok(derive_volume_ocid(&context.region_key, name))
    }

    async fn try_attach(&self, opts: &Options, node_name: &str) -> Result<DriverStatus> {
        let context = self.master_context().await?;
        let volume_id = Self::volume_ocid(&context, opts)?;
        let device = context
            .attacher
            .attach(node_name, &volume_id, AttachMode::Iscsi)
            .await?;
        Ok(DriverStatus::succeed().with_device(device.device_path()))
    }

    async fn try_detach(&self, pv_or_volume_name: &str, node_name: &str) -> Result<DriverStatus> {
        let context = self.master_context().await?;
        let volume_id = derive_volume_ocid(&context.region_key, pv_or_volume_name);
        context.attacher.detach(node_name, &volume_id).await?;
        Ok(DriverStatus::succeed())
    }

    async fn try_is_attached(&self, opts: &Options) -> Result<DriverStatus> {
        let context = self.master_context().await?;
        let volume_id = Self::volume_ocid(&context, opts)?;
        Ok(match context.attacher.find_attachment(&volume_id).await {
            Ok(attachment) => {
                info!("Found volume attachment {}", attachment.id);
                DriverStatus::succeed().with_attached(true)
            }
            Err(e) => DriverStatus::succeed_with(e),
        })
    }

    async fn try_mount_device(
        &self,
        mount_dir: &str,
        mount_device: &str,
        opts: &Options,
    ) -> Result<DriverStatus> {
        let disk = self.disks.from_device_path(mount_device)?;
        if disk.device_opened(mount_device).await? {
            return Ok(DriverStatus::succeed_with("Device already mounted. Nothing to do."));
        }

        disk.add_to_db().await?;
        disk.set_automatic_login().await?;
        disk.login().await?;

        if !wait_for_path_to_exist(mount_device, DEVICE_PATH_RETRIES).await {
            return Ok(DriverStatus::fail(format!(
                "Failed waiting for device to exist: {}",
                mount_device
            )));
        }

        let options = match opts.get(OPTION_READ_WRITE).map(String::as_str) {
            Some("ro") => vec!["ro".to_string()],
            _ => Vec::new(),
        };
        let fs_type = opts.get(OPTION_FS_TYPE).map(String::as_str).unwrap_or_default();
        disk.format_and_mount(mount_device, mount_dir, fs_type, options)
            .await?;
        Ok(DriverStatus::succeed())
    }

    async fn try_unmount_device(&self, mount_path: &str) -> Result<DriverStatus> {
        let Some(disk) = self.disks.from_mount_point(mount_path).await? else {
            return Ok(DriverStatus::succeed_with("Mount point not found. Nothing to do."));
        };
        disk.unmount_path(mount_path).await?;
        disk.logout().await?;
        disk.remove_from_db().await?;
        Ok(DriverStatus::succeed())
    }
}

#[async_trait]
impl Driver for OciFlexvolumeDriver {
    async fn init(&self) -> DriverStatus {
        if !self.master {
            info!("Assuming worker node.");
            return DriverStatus::succeed();
        }
        match self.master_context().await {
            Ok(_) => DriverStatus::succeed(),
            Err(e) => DriverStatus::fail(e),
        }
    }

    #[instrument(skip(self, opts))]
    async fn attach(&self, opts: &Options, node_name: &str) -> DriverStatus {
        self.try_attach(opts, node_name)
            .await
            .unwrap_or_else(DriverStatus::fail)
    }

    #[instrument(skip(self))]
    async fn detach(&self, pv_or_volume_name: &str, node_name: &str) -> DriverStatus {
        self.try_detach(pv_or_volume_name, node_name)
            .await
            .unwrap_or_else(DriverStatus::fail)
    }

    async fn wait_for_attach(&self, mount_device: &str, _opts: &Options) -> DriverStatus {
        DriverStatus::succeed().with_device(mount_device)
    }

    #[instrument(skip(self, opts))]
    async fn is_attached(&self, opts: &Options, _node_name: &str) -> DriverStatus {
        self.try_is_attached(opts)
            .await
            .unwrap_or_else(DriverStatus::fail)
    }

    #[instrument(skip(self, opts))]
    async fn mount_device(&self, mount_dir: &str, mount_device: &str, opts: &Options) -> DriverStatus {
        self.try_mount_device(mount_dir, mount_device, opts)
            .await
            .unwrap_or_else(DriverStatus::fail)
    }

    #[instrument(skip(self))]
    async fn unmount_device(&self, mount_path: &str) -> DriverStatus {
        self.try_unmount_device(mount_path)
            .await
            .unwrap_or_else(DriverStatus::fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Disk, MockDisk, MockDiskOpener};
    use crate::flexvolume::Status;
    use crate::kubernetes::nodes::MockNodeLookup;
    use crate::oci::models::Instance;
    use crate::test_utils::{make_node, FakeOci};
    use mockall::predicate::eq;
    use mockall::Sequence;

    const COMPARTMENT: &str = "ocid1.compartment.oc1..c";
    const VOLUME: &str = "ocid1.volume.oc1.phx.abc";

    fn make_paths() -> FlexPaths {
        FlexPaths::from_lookup(|_| None)
    }

    fn make_context(fake: &FakeOci) -> MasterContext {
        fake.add_instance(Instance {
            id: "ocid1.instance.oc1..i1".to_string(),
            compartment_id: COMPARTMENT.to_string(),
            ..Default::default()
        });
        let mut nodes = MockNodeLookup::new();
        nodes
            .expect_get_node()
            .returning(|_| Ok(make_node("n1", "10.0.0.2", "ocid1.instance.oc1..i1")));
        MasterContext {
            attacher: VolumeAttacher::new(fake.client(), Arc::new(nodes), COMPARTMENT),
            region_key: "phx".to_string(),
        }
    }

    fn make_driver(fake: &FakeOci, disks: MockDiskOpener) -> OciFlexvolumeDriver {
        OciFlexvolumeDriver::with_context(make_paths(), make_context(fake), Arc::new(disks))
    }

    fn make_opts(pairs: &[(&str, &str)]) -> Options {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn opener_for(disk: MockDisk) -> MockDiskOpener {
        let mut opener = MockDiskOpener::new();
        opener
            .expect_from_device_path()
            .return_once(move |_| Ok(Box::new(disk) as Box<dyn Disk>));
        opener
    }

    #[test]
    fn test_derive_volume_ocid() {
        assert_eq!(derive_volume_ocid("phx", "abc"), VOLUME);
        assert_eq!(
            derive_volume_ocid("phx", "ocid1.volume.oc1.iad.xyz"),
            "ocid1.volume.oc1.iad.xyz"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_detach_lifecycle() {
        let fake = FakeOci::new();
        let driver = make_driver(&fake, MockDiskOpener::new());
        let opts = make_opts(&[(OPTION_PV_OR_VOLUME_NAME, "abc")]);

        let status = driver.attach(&opts, "n1").await;
        assert_eq!(status.status, Status::Success, "{}", status.message);
        assert_eq!(
            status.device,
            format!(
                "/dev/disk/by-path/ip-169.254.2.2:3260-iscsi-iqn.2015-12.com.oracleiaas:{}-lun-1",
                VOLUME
            )
        );

        let status = driver.is_attached(&opts, "n1").await;
        assert!(status.attached);

        let status = driver.detach("abc", "n1").await;
        assert_eq!(status.status, Status::Success, "{}", status.message);

        let status = driver.is_attached(&opts, "n1").await;
        assert_eq!(status.status, Status::Success);
        assert!(!status.attached);
        assert!(!status.message.is_empty());
    }

    #[tokio::test]
    async fn test_attach_requires_volume_name() {
        let fake = FakeOci::new();
        let driver = make_driver(&fake, MockDiskOpener::new());

        let status = driver.attach(&Options::new(), "n1").await;
        assert_eq!(status.status, Status::Failure);
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_worker_refuses_credentialed_calls() {
        let driver = OciFlexvolumeDriver::new(FlexPaths::from_lookup(|_| {
            Some("/nonexistent/flexvolume".to_string())
        }));
        assert!(!driver.is_master());
        assert_eq!(driver.init().await.status, Status::Success);

        let status = driver
            .attach(&make_opts(&[(OPTION_PV_OR_VOLUME_NAME, "abc")]), "n1")
            .await;
        assert_eq!(status.status, Status::Failure);
        assert!(status.message.contains("master nodes"));
    }

    #[tokio::test]
    async fn test_wait_for_attach_echoes_device() {
        let driver = make_driver(&FakeOci::new(), MockDiskOpener::new());
        let status = driver.wait_for_attach("/dev/sdb", &Options::new()).await;
        assert_eq!(status.device, "/dev/sdb");
    }

    #[tokio::test]
    async fn test_mount_device() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("device");
        std::fs::write(&device, "").unwrap();
        let device = device.to_string_lossy().to_string();

        let mut disk = MockDisk::new();
        let mut seq = Sequence::new();
        disk.expect_device_opened()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        disk.expect_add_to_db()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        disk.expect_set_automatic_login()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        disk.expect_login()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        disk.expect_format_and_mount()
            .with(
                eq(device.clone()),
                eq("/mnt/vol"),
                eq("xfs"),
                eq(vec!["ro".to_string()]),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));

        let driver = make_driver(&FakeOci::new(), opener_for(disk));
        let opts = make_opts(&[(OPTION_FS_TYPE, "xfs"), (OPTION_READ_WRITE, "ro")]);
        let status = driver.mount_device("/mnt/vol", &device, &opts).await;
        assert_eq!(status.status, Status::Success, "{}", status.message);
    }

    #[tokio::test]
    async fn test_mount_device_already_mounted() {
        let mut disk = MockDisk::new();
        disk.expect_device_opened().returning(|_| Ok(true));
        disk.expect_login().never();

        let driver = make_driver(&FakeOci::new(), opener_for(disk));
        let status = driver
            .mount_device("/mnt/vol", "/dev/sdb", &Options::new())
            .await;
        assert_eq!(status.status, Status::Success);
        assert_eq!(status.message, "Device already mounted. Nothing to do.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_device_times_out_waiting_for_path() {
        let mut disk = MockDisk::new();
        disk.expect_device_opened().returning(|_| Ok(false));
        disk.expect_add_to_db().returning(|| Ok(()));
        disk.expect_set_automatic_login().returning(|| Ok(()));
        disk.expect_login().returning(|| Ok(()));
        disk.expect_format_and_mount().never();

        let driver = make_driver(&FakeOci::new(), opener_for(disk));
        let status = driver
            .mount_device("/mnt/vol", "/nonexistent/sdz", &Options::new())
            .await;
        assert_eq!(status.status, Status::Failure);
        assert_eq!(
            status.message,
            "Failed waiting for device to exist: /nonexistent/sdz"
        );
    }

    #[tokio::test]
    async fn test_unmount_device() {
        let mut disk = MockDisk::new();
        let mut seq = Sequence::new();
        disk.expect_unmount_path()
            .with(eq("/mnt/vol"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        disk.expect_logout()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        disk.expect_remove_from_db()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let mut opener = MockDiskOpener::new();
        opener
            .expect_from_mount_point()
            .return_once(move |_| Ok(Some(Box::new(disk) as Box<dyn Disk>)));

        let driver = make_driver(&FakeOci::new(), opener);
        assert_eq!(driver.unmount_device("/mnt/vol").await.status, Status::Success);
    }

    #[tokio::test]
    async fn test_unmount_device_without_mount_point() {
        let mut opener = MockDiskOpener::new();
        opener.expect_from_mount_point().returning(|_| Ok(None));

        let driver = make_driver(&FakeOci::new(), opener);
        let status = driver.unmount_device("/mnt/vol").await;
        assert_eq!(status.status, Status::Success);
        assert_eq!(status.message, "Mount point not found. Nothing to do.");
    }
}
