// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Load balancer reconciliation for `type: LoadBalancer` Services.
//!
//! [`spec`] turns a Service into the desired [`LbSpec`], [`diff`] compares it
//! with what exists and [`reconciler`] applies the resulting changes through
//! the OCI facade, awaiting every work request before the next step.

pub mod diff;
pub mod reconciler;
pub mod spec;

pub use diff::{Action, ActionType};
pub use reconciler::{load_balancer_status, LoadBalancerReconciler};
pub use spec::{load_balancer_name, load_balancer_type, LbSpec, SecretRef, SslConfig};
