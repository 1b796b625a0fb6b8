/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::cache::{CacheError, CachedCredentials, CredentialStore};
use aws_runas_types::sts::{
    AssumeRoleInput, CallerIdentity, GetSessionTokenInput, ServiceError, StsApi,
};
use aws_runas_types::{BoxFuture, Credentials};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const MOCK_PROVIDER: &str = "MockCredentialsProvider";

/// STS stand-in returning fixed credentials and recording what it was asked
#[derive(Debug, Default)]
pub(crate) struct FakeSts {
    fail: bool,
    session_token_calls: AtomicUsize,
    assume_role_calls: AtomicUsize,
    session_token_inputs: Mutex<Vec<GetSessionTokenInput>>,
    assume_role_inputs: Mutex<Vec<(Credentials, AssumeRoleInput)>>,
}

impl FakeSts {
    /// Every call fails
    pub(crate) fn failing() -> Self {
        FakeSts {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn session_token_calls(&self) -> usize {
        self.session_token_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn assume_role_calls(&self) -> usize {
        self.assume_role_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_session_token_input(&self) -> Option<GetSessionTokenInput> {
        self.session_token_inputs.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_assume_role_input(&self) -> Option<(Credentials, AssumeRoleInput)> {
        self.assume_role_inputs.lock().unwrap().last().cloned()
    }

    fn check(&self, operation: &'static str) -> Result<(), ServiceError> {
        if self.fail {
            Err(ServiceError::new(operation, "service unavailable"))
        } else {
            Ok(())
        }
    }
}

impl StsApi for FakeSts {
    fn get_caller_identity(&self) -> BoxFuture<'_, Result<CallerIdentity, ServiceError>> {
        Box::pin(async move {
            self.check("GetCallerIdentity").map(|_| CallerIdentity {
                account: "0123456789".into(),
                arn: "arn:aws:iam::0123456789:user/bob".into(),
                user_id: "AIDAMOCKUSER".into(),
            })
        })
    }

    fn get_session_token(
        &self,
        input: GetSessionTokenInput,
    ) -> BoxFuture<'_, Result<Credentials, ServiceError>> {
        Box::pin(async move {
            self.session_token_calls.fetch_add(1, Ordering::SeqCst);
            self.session_token_inputs.lock().unwrap().push(input);
            self.check("GetSessionToken").map(|_| {
                Credentials::new(
                    "MockSessionTokenAccessKey",
                    "MockSessionTokenSecretKey",
                    Some("MockSessionToken".into()),
                    None,
                    MOCK_PROVIDER,
                )
            })
        })
    }

    fn assume_role<'a>(
        &'a self,
        caller: &'a Credentials,
        input: AssumeRoleInput,
    ) -> BoxFuture<'a, Result<Credentials, ServiceError>> {
        Box::pin(async move {
            self.assume_role_calls.fetch_add(1, Ordering::SeqCst);
            self.assume_role_inputs
                .lock()
                .unwrap()
                .push((caller.clone(), input));
            self.check("AssumeRole").map(|_| {
                Credentials::new(
                    "MockAssumeRoleAccessKey",
                    "MockAssumeRoleSecretKey",
                    Some("MockAssumeRoleSessionToken".into()),
                    None,
                    MOCK_PROVIDER,
                )
            })
        })
    }
}

/// In-memory credential store
#[derive(Debug, Default)]
pub(crate) struct MemoryStore(Mutex<HashMap<String, CachedCredentials>>);

impl CredentialStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<CachedCredentials>, CacheError> {
        Ok(self.0.lock().unwrap().get(key).cloned())
    }

    fn store(&self, key: &str, credentials: &CachedCredentials) -> Result<(), CacheError> {
        self.0
            .lock()
            .unwrap()
            .insert(key.to_string(), credentials.clone());
        Ok(())
    }
}

/// A store that can neither be read nor written
#[derive(Debug)]
pub(crate) struct FailingStore;

impl CredentialStore for FailingStore {
    fn load(&self, _key: &str) -> Result<Option<CachedCredentials>, CacheError> {
        Err(CacheError::Other("store is offline".into()))
    }

    fn store(&self, _key: &str, _credentials: &CachedCredentials) -> Result<(), CacheError> {
        Err(CacheError::Other("store is offline".into()))
    }
}
