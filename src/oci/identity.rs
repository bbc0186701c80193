// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::error::{OciError, Result};
use crate::oci::metrics::{resource, Verb};
use crate::oci::models::AvailabilityDomain;
use crate::oci::{service, Call, OciClient};

const LIST_AVAILABILITY_DOMAINS: Call = Call::new(
    service::IDENTITY,
    "ListAvailabilityDomains",
    resource::AVAILABILITY_DOMAIN,
    Verb::List,
);

#[async_trait]
pub trait IdentityInterface: Send + Sync {
    /// Find an availability domain by name. The match is a case-insensitive
    /// suffix match so "PHX-AD-1" finds "Uocm:PHX-AD-1".
    async fn get_availability_domain_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<AvailabilityDomain>;
}

#[async_trait]
impl IdentityInterface for OciClient {
    async fn get_availability_domain_by_name(
        &self,
        compartment_id: &str,
        name: &str,
    ) -> Result<AvailabilityDomain> {
        let resp = self
            .call(LIST_AVAILABILITY_DOMAINS, || {
                self.services
                    .identity
                    .list_availability_domains(compartment_id)
            })
            .await?;

        let wanted = name.to_lowercase();
        let names: Vec<&str> = resp.body.iter().map(|ad| ad.name.as_str()).collect();
        if let Some(ad) = resp
            .body
            .iter()
            .find(|ad| ad.name.to_lowercase().ends_with(&wanted))
        {
            return Ok(ad.clone());
        }
        Err(OciError::NotFound.wrap(format!(
            "availability domain '{}' not found in list: {:?}",
            name, names
        )))
    }
}
