// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod disk;
pub mod error;
pub mod flexvolume;
pub mod kubernetes;
pub mod loadbalancer;
pub mod metadata;
pub mod oci;
pub mod ratelimit;
pub mod reconcilers;
pub mod retry;
pub mod volume;

#[cfg(test)]
pub mod test_utils;
