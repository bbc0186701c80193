// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wire shapes of the OCI resources this crate reads and writes.

pub mod core;
pub mod file_storage;
pub mod identity;
pub mod load_balancer;
pub mod network_load_balancer;

pub use self::core::*;
pub use file_storage::*;
pub use identity::*;
