/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Profile resolution and caching credential providers for aws-runas.
//!
//! Typical use resolves a [`Profile`](profile::Profile) from the shared config file, then builds
//! an [`AssumeRoleProvider`](provider::AssumeRoleProvider) (for role profiles) or a
//! [`SessionTokenProvider`](provider::SessionTokenProvider) from it:
//!
//! ```no_run
//! # async fn docs(sts: std::sync::Arc<dyn aws_runas_types::sts::StsApi>) -> Result<(), Box<dyn std::error::Error>> {
//! use aws_runas_config::profile::ProfileResolver;
//! use aws_runas_config::provider::{AssumeRoleProvider, ProvideCredentials, ProviderOptions};
//!
//! let profile = ProfileResolver::new().resolve("admin")?;
//! let provider = AssumeRoleProvider::builder()
//!     .profile(profile)
//!     .options(ProviderOptions::default())
//!     .sts_client(sts)
//!     .build()?;
//! let credentials = provider.provide_credentials().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod cache;
pub mod mfa;
pub mod profile;
pub mod provider;

#[cfg(test)]
mod test_util;

pub use profile::{Profile, ProfileResolver};
pub use provider::{AssumeRoleProvider, ProvideCredentials, SessionTokenProvider};
