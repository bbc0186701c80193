// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The controller name used for server-side apply and finalizers
pub const CONTROLLER_NAME: &str = "oci-cloud-controller";

/// Finalizer placed on Services whose load balancer we own
pub const LOAD_BALANCER_FINALIZER: &str = "oci.oraclecloud.com/load-balancer-cleanup";

/// Environment variables read by the binaries and the HTTP transport
pub mod env {
    pub const CLOUD_CONFIG: &str = "OCI_CLOUD_CONFIG";
    pub const PROXY: &str = "OCI_PROXY";
    pub const TRUSTED_CA_CERT_PATH: &str = "TRUSTED_CA_CERT_PATH";
    pub const LOAD_BALANCER_PREFIX: &str = "LOAD_BALANCER_PREFIX";
    pub const FLEXD_DRIVER_DIRECTORY: &str = "OCI_FLEXD_DRIVER_DIRECTORY";
    pub const FLEXD_CONFIG_DIRECTORY: &str = "OCI_FLEXD_CONFIG_DIRECTORY";
    pub const FLEXD_KUBECONFIG_PATH: &str = "OCI_FLEXD_KUBECONFIG_PATH";
}

/// Default filesystem locations
pub mod paths {
    pub const DEFAULT_CLOUD_CONFIG: &str = "/etc/oci/config.yaml";
    pub const DEFAULT_FLEXD_DRIVER_DIRECTORY: &str =
        "/usr/libexec/kubernetes/kubelet-plugins/volume/exec/oracle~oci";
    pub const FLEXD_CONFIG_FILE: &str = "config.yaml";
    pub const FLEXD_KUBECONFIG_FILE: &str = "kubeconfig";
}

/// Kubernetes annotation and label keys
pub mod annotations {
    /// Compartment of a node's instance, written by the cloud controller
    pub const NODE_COMPARTMENT_ID: &str = "oci.oraclecloud.com/compartment-id";
    /// Selects between "lb" and "nlb"
    pub const LOAD_BALANCER_TYPE: &str = "oci.oraclecloud.com/load-balancer-type";
    /// Nodes carrying this label never receive load balancer traffic
    pub const EXCLUDE_FROM_LOAD_BALANCERS: &str =
        "node.kubernetes.io/exclude-from-external-load-balancers";

    /// Keys for layer 7 load balancers
    pub mod lb {
        pub const INTERNAL: &str = "service.beta.kubernetes.io/oci-load-balancer-internal";
        pub const SHAPE: &str = "service.beta.kubernetes.io/oci-load-balancer-shape";
        pub const SHAPE_FLEX_MIN: &str = "service.beta.kubernetes.io/oci-load-balancer-shape-flex-min";
        pub const SHAPE_FLEX_MAX: &str = "service.beta.kubernetes.io/oci-load-balancer-shape-flex-max";
        pub const SUBNET1: &str = "service.beta.kubernetes.io/oci-load-balancer-subnet1";
        pub const SUBNET2: &str = "service.beta.kubernetes.io/oci-load-balancer-subnet2";
        pub const SSL_PORTS: &str = "service.beta.kubernetes.io/oci-load-balancer-ssl-ports";
        pub const TLS_SECRET: &str = "service.beta.kubernetes.io/oci-load-balancer-tls-secret";
        pub const TLS_BACKEND_SET_SECRET: &str =
            "service.beta.kubernetes.io/oci-load-balancer-tls-backendset-secret";
        pub const CONNECTION_IDLE_TIMEOUT: &str =
            "service.beta.kubernetes.io/oci-load-balancer-connection-idle-timeout";
        pub const CONNECTION_PROXY_PROTOCOL_VERSION: &str =
            "service.beta.kubernetes.io/oci-load-balancer-connection-proxy-protocol-version";
        pub const HEALTH_CHECK_RETRIES: &str =
            "service.beta.kubernetes.io/oci-load-balancer-health-check-retries";
        pub const HEALTH_CHECK_INTERVAL: &str =
            "service.beta.kubernetes.io/oci-load-balancer-health-check-interval";
        pub const HEALTH_CHECK_TIMEOUT: &str =
            "service.beta.kubernetes.io/oci-load-balancer-health-check-timeout";
        pub const BACKEND_PROTOCOL: &str = "service.beta.kubernetes.io/oci-load-balancer-backend-protocol";
        pub const NETWORK_SECURITY_GROUPS: &str = "oci.oraclecloud.com/oci-network-security-groups";
        pub const POLICY: &str = "oci.oraclecloud.com/loadbalancer-policy";
        /// JSON tags that replace the configured initial tags
        pub const INITIAL_FREEFORM_TAGS_OVERRIDE: &str =
            "oci.oraclecloud.com/initial-freeform-tags-override";
        pub const INITIAL_DEFINED_TAGS_OVERRIDE: &str =
            "oci.oraclecloud.com/initial-defined-tags-override";
    }

    /// Keys for network load balancers
    pub mod nlb {
        pub const INTERNAL: &str = "oci-network-load-balancer.oraclecloud.com/internal";
        pub const SUBNET: &str = "oci-network-load-balancer.oraclecloud.com/subnet";
        pub const NETWORK_SECURITY_GROUPS: &str =
            "oci-network-load-balancer.oraclecloud.com/oci-network-security-groups";
        pub const HEALTH_CHECK_RETRIES: &str = "oci-network-load-balancer.oraclecloud.com/health-check-retries";
        pub const HEALTH_CHECK_INTERVAL: &str =
            "oci-network-load-balancer.oraclecloud.com/health-check-interval";
        pub const HEALTH_CHECK_TIMEOUT: &str = "oci-network-load-balancer.oraclecloud.com/health-check-timeout";
        pub const POLICY: &str = "oci-network-load-balancer.oraclecloud.com/backend-policy";
        pub const IS_PRESERVE_SOURCE: &str = "oci-network-load-balancer.oraclecloud.com/is-preserve-source";
        pub const IS_PPV2_ENABLED: &str = "oci-network-load-balancer.oraclecloud.com/is-ppv2-enabled";
        pub const INITIAL_FREEFORM_TAGS_OVERRIDE: &str =
            "oci-network-load-balancer.oraclecloud.com/initial-freeform-tags-override";
        pub const INITIAL_DEFINED_TAGS_OVERRIDE: &str =
            "oci-network-load-balancer.oraclecloud.com/initial-defined-tags-override";
    }
}

/// Poll intervals and timeouts for asynchronous OCI operations
pub mod poll {
    use std::time::Duration;

    pub const WORK_REQUEST_INTERVAL: Duration = Duration::from_secs(5);
    pub const VOLUME_ATTACHMENT_INTERVAL: Duration = Duration::from_secs(5);
    pub const VOLUME_INTERVAL: Duration = Duration::from_secs(5);
    pub const VOLUME_CLONE_INTERVAL: Duration = Duration::from_secs(10);
    pub const FILE_STORAGE_INTERVAL: Duration = Duration::from_secs(5);
    pub const FILE_STORAGE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    pub const DEVICE_PATH_INTERVAL: Duration = Duration::from_secs(1);
    /// Budget for a single synchronous API call inside a poll loop
    pub const SYNCHRONOUS_API_CALL_TIMEOUT: Duration = Duration::from_secs(60);
    /// Budget for a whole synchronous poll (work requests)
    pub const SYNCHRONOUS_API_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
    /// Primary VNIC lookups retry while the instance is still coming up
    pub const PRIMARY_VNIC_RETRY_INTERVAL: Duration = Duration::from_secs(10);
    pub const PRIMARY_VNIC_RETRIES: usize = 12;
}

/// Rate limiter defaults
pub mod rate_limit {
    pub const QPS_DEFAULT: f32 = 20.0;
    pub const BUCKET_DEFAULT: u32 = 5;
}

/// Subnet cache lifetime in seconds
pub const SUBNET_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Reconcile requeue delays for the Service controller
pub mod requeue {
    pub const ERROR_SECS: u64 = 60;
    pub const STEADY_SECS: u64 = 300;
}
