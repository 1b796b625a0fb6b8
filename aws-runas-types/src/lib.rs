/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Types shared across the aws-runas crates.
//!
//! This crate holds the pieces that both the credential providers and the identity
//! provider need to agree on: [`Arn`](arn::Arn) parsing, the [`Credentials`](credentials::Credentials)
//! value handed back to callers, and the [`StsApi`](sts::StsApi) contract used to talk to the
//! token service.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod arn;
pub mod credentials;
pub mod os_shim_internal;
pub mod sts;

pub use arn::Arn;
pub use credentials::Credentials;

use std::future::Future;
use std::pin::Pin;

/// Boxed error type used for opaque error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Future returned by the capability traits in this workspace
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
