/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Sources of MFA one-time codes
//!
//! Interactive prompting is left to the caller: anything implementing [`ProvideMfaCode`] can be
//! handed to a credential provider, including a plain closure via [`mfa_code_fn`].

use aws_runas_types::BoxError;
use std::fmt;
use std::fmt::Debug;

/// Supplies the current one-time code for an MFA device
pub trait ProvideMfaCode: Send + Sync + Debug {
    fn mfa_code(&self, mfa_serial: &str) -> Result<String, BoxError>;
}

/// A fixed MFA code, eg. one passed on the command line
#[derive(Clone)]
pub struct StaticMfaCode(String);

impl StaticMfaCode {
    pub fn new(code: impl Into<String>) -> Self {
        StaticMfaCode(code.into())
    }
}

impl Debug for StaticMfaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticMfaCode").field(&"** redacted **").finish()
    }
}

impl ProvideMfaCode for StaticMfaCode {
    fn mfa_code(&self, _mfa_serial: &str) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// Adapts a closure into a [`ProvideMfaCode`]
pub fn mfa_code_fn<F>(f: F) -> MfaCodeFn<F>
where
    F: Fn(&str) -> Result<String, BoxError> + Send + Sync,
{
    MfaCodeFn(f)
}

/// See [`mfa_code_fn`]
pub struct MfaCodeFn<F>(F);

impl<F> Debug for MfaCodeFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MfaCodeFn")
    }
}

impl<F> ProvideMfaCode for MfaCodeFn<F>
where
    F: Fn(&str) -> Result<String, BoxError> + Send + Sync,
{
    fn mfa_code(&self, mfa_serial: &str) -> Result<String, BoxError> {
        (self.0)(mfa_serial)
    }
}
