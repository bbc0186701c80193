// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! TLS material stored in Kubernetes secrets.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, instrument};

use crate::error::Result;

pub const CA_CERT_KEY: &str = "ca.crt";
pub const PUBLIC_CERT_KEY: &str = "tls.crt";
pub const PRIVATE_KEY_KEY: &str = "tls.key";
pub const PASSPHRASE_KEY: &str = "passphrase";

/// The certificate bundle held by a TLS secret. Absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateData {
    pub ca_certificate: Option<String>,
    pub public_certificate: Option<String>,
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

/// Extract the certificate bundle from a secret's data.
pub fn certificate_data(secret: &Secret) -> CertificateData {
    let read = |key: &str| {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|v| String::from_utf8_lossy(&v.0).into_owned())
    };
    CertificateData {
        ca_certificate: read(CA_CERT_KEY),
        public_certificate: read(PUBLIC_CERT_KEY),
        private_key: read(PRIVATE_KEY_KEY),
        passphrase: read(PASSPHRASE_KEY),
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretReader: Send + Sync {
    async fn read_certificate(&self, namespace: &str, name: &str) -> Result<CertificateData>;
}

#[derive(Clone)]
pub struct KubeSecretReader {
    client: Client,
}

impl KubeSecretReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretReader for KubeSecretReader {
    #[instrument(skip(self))]
    async fn read_certificate(&self, namespace: &str, name: &str) -> Result<CertificateData> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        debug!("Reading TLS secret {}/{}", namespace, name);
        let secret = secrets.get(name).await?;
        Ok(certificate_data(&secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn make_secret(entries: &[(&str, &str)]) -> Secret {
        Secret {
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_certificate_data_reads_known_keys() {
        let secret = make_secret(&[
            ("tls.crt", "CERT"),
            ("tls.key", "KEY"),
            ("unrelated", "x"),
        ]);
        let data = certificate_data(&secret);
        assert_eq!(data.public_certificate.as_deref(), Some("CERT"));
        assert_eq!(data.private_key.as_deref(), Some("KEY"));
        assert!(data.ca_certificate.is_none());
        assert!(data.passphrase.is_none());
    }

    #[test]
    fn test_certificate_data_of_empty_secret() {
        assert_eq!(certificate_data(&Secret::default()), CertificateData::default());
    }

    #[tokio::test]
    async fn test_kube_secret_reader() {
        let body = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "tls", "namespace": "web"},
            "data": {"tls.crt": "Q0VSVA==", "ca.crt": "Q0E="}
        });
        let mock =
            MockService::new().on_get("/api/v1/namespaces/web/secrets/tls", 200, &body.to_string());

        let reader = KubeSecretReader::new(mock.into_client());
        let data = reader.read_certificate("web", "tls").await.unwrap();
        assert_eq!(data.public_certificate.as_deref(), Some("CERT"));
        assert_eq!(data.ca_certificate.as_deref(), Some("CA"));
    }
}
