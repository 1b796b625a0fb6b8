/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Security Token Service contract
//!
//! The transport that actually signs and sends requests lives outside of this workspace. Anything
//! able to answer these three operations can back the credential providers and the identity
//! provider, which also makes it trivial to substitute fixed responses in tests.

use crate::{BoxError, BoxFuture, Credentials};
use std::error::Error;
use std::fmt;
use std::fmt::Debug;
use std::time::Duration;

/// Response to `GetCallerIdentity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

/// Input to `GetSessionToken`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetSessionTokenInput {
    pub duration: Duration,
    pub mfa_serial: Option<String>,
    pub mfa_code: Option<String>,
}

/// Input to `AssumeRole`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssumeRoleInput {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration: Duration,
    pub mfa_serial: Option<String>,
    pub mfa_code: Option<String>,
}

/// Operations of the Security Token Service
pub trait StsApi: Send + Sync + Debug {
    /// Describe the principal whose credentials the transport is bound to
    fn get_caller_identity(&self) -> BoxFuture<'_, Result<CallerIdentity, ServiceError>>;

    /// Exchange the transport's long-term credentials for a session token
    fn get_session_token(
        &self,
        input: GetSessionTokenInput,
    ) -> BoxFuture<'_, Result<Credentials, ServiceError>>;

    /// Exchange `caller` credentials for credentials of the role named in `input`
    fn assume_role<'a>(
        &'a self,
        caller: &'a Credentials,
        input: AssumeRoleInput,
    ) -> BoxFuture<'a, Result<Credentials, ServiceError>>;
}

/// A remote service call failed
///
/// No retries are attempted when this is produced; retry policy belongs to the transport.
#[derive(Debug)]
pub struct ServiceError {
    operation: &'static str,
    source: BoxError,
}

impl ServiceError {
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        ServiceError {
            operation,
            source: source.into(),
        }
    }

    /// Name of the remote operation that failed, eg. `GetSessionToken`
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.source)
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref() as _)
    }
}
