// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! OCI HTTP signature authentication (draft-cavage-http-signatures, rsa-sha256).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HOST};
use reqwest::{Method, Request};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;
use crate::error::{OciError, Result};

const X_CONTENT_SHA256: &str = "x-content-sha256";
const REQUEST_TARGET: &str = "(request-target)";

/// Signs an outgoing request in place.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut Request) -> Result<()>;
}

/// Signs with a user API key.
pub struct ApiKeySigner {
    key_id: String,
    key: SigningKey<Sha256>,
}

impl std::fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ApiKeySigner {
    pub fn new(
        tenancy_id: &str,
        user_id: &str,
        fingerprint: &str,
        private_key_pem: &str,
        passphrase: Option<&str>,
    ) -> Result<Self> {
        let key = parse_private_key(private_key_pem, passphrase)?;
        Ok(Self {
            key_id: format!("{}/{}/{}", tenancy_id, user_id, fingerprint),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Result<Self> {
        let passphrase = (!auth.passphrase.is_empty()).then_some(auth.passphrase.as_str());
        Self::new(
            &auth.tenancy_id,
            &auth.user_id,
            &auth.fingerprint,
            &auth.private_key,
            passphrase,
        )
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

fn parse_private_key(pem: &str, passphrase: Option<&str>) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    let parsed = if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        let passphrase = passphrase.ok_or_else(|| {
            OciError::fatal("private key is encrypted but no passphrase was provided")
        })?;
        RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())
            .map_err(|e| e.to_string())
    } else if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| OciError::fatal(format!("failed to parse private key: {}", e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| OciError::fatal(format!("invalid header value {:?}: {}", value, e)))
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

impl RequestSigner for ApiKeySigner {
    fn sign(&self, request: &mut Request) -> Result<()> {
        let url = request.url().clone();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => return Err(OciError::fatal(format!("request url {} has no host", url))),
        };
        let target = match url.query() {
            Some(q) => format!("{} {}?{}", request.method().as_str().to_lowercase(), url.path(), q),
            None => format!("{} {}", request.method().as_str().to_lowercase(), url.path()),
        };
        let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut signed: Vec<(&str, String)> = vec![
            (DATE.as_str(), date.clone()),
            (REQUEST_TARGET, target),
            (HOST.as_str(), host.clone()),
        ];

        let headers_with_body = if has_body(request.method()) {
            let body = request.body().and_then(|b| b.as_bytes()).unwrap_or_default();
            let digest = STANDARD.encode(Sha256::digest(body));
            let length = body.len().to_string();
            let content_type = request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/json")
                .to_string();
            signed.push((CONTENT_LENGTH.as_str(), length.clone()));
            signed.push((CONTENT_TYPE.as_str(), content_type.clone()));
            signed.push((X_CONTENT_SHA256, digest.clone()));
            Some((length, content_type, digest))
        } else {
            None
        };

        let signing_string = signed
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n");
        let signature = STANDARD.encode(self.key.sign(signing_string.as_bytes()).to_bytes());
        let names = signed.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(" ");
        let authorization = format!(
            "Signature version=\"1\",headers=\"{}\",keyId=\"{}\",algorithm=\"rsa-sha256\",signature=\"{}\"",
            names, self.key_id, signature
        );

        let headers = request.headers_mut();
        headers.insert(DATE, header_value(&date)?);
        headers.insert(HOST, header_value(&host)?);
        if let Some((length, content_type, digest)) = headers_with_body {
            headers.insert(CONTENT_LENGTH, header_value(&length)?);
            headers.insert(CONTENT_TYPE, header_value(&content_type)?);
            headers.insert(HeaderName::from_static(X_CONTENT_SHA256), header_value(&digest)?);
        }
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}
