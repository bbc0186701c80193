// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation, node lookups and TLS secrets.

pub mod client;
pub mod nodes;
pub mod secrets;

pub use client::{create_client, create_client_from_kubeconfig};
pub use nodes::{KubeNodeLookup, NodeLookup};
pub use secrets::{CertificateData, KubeSecretReader, SecretReader};
