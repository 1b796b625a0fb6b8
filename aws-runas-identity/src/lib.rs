/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Caller identity lookup and role discovery for aws-runas.
//!
//! [`AwsIdentityProvider`](provider::AwsIdentityProvider) answers two questions: who the current
//! credentials belong to, and which roles that user is allowed to assume according to the IAM
//! policies attached to it directly or through its groups.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod iam;
pub mod policy;
pub mod provider;

pub use provider::{AwsIdentityProvider, Identity, IdentityError, IdentityType};
