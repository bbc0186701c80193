// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailabilityDomain {
    pub id: Option<String>,
    /// e.g. "Uocm:PHX-AD-1"
    pub name: String,
    pub compartment_id: String,
}
