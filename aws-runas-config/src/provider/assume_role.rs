/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Assume Role Credential Provider

use crate::cache::{cache_key, CredentialCache, ASSUME_ROLE_CACHE_PREFIX};
use crate::profile::Profile;
use crate::provider::{
    Builder, CredentialsError, CredentialsResult, ProvideCredentials, SessionTokenProvider,
};
use aws_runas_types::sts::AssumeRoleInput;
use aws_runas_types::BoxFuture;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Instrument;

const SESSION_NAME_PREFIX: &str = "aws-runas-";

/// Provides credentials for the profile's role, cached per profile
///
/// Calls to assume the role are made with session token credentials, obtained (and cached) by an
/// inner [`SessionTokenProvider`] configured from the same builder. Any MFA prompt therefore
/// happens once per session token, not on every role refresh.
#[derive(Debug)]
pub struct AssumeRoleProvider {
    session: SessionTokenProvider,
    role_arn: String,
    role_session_name: String,
    cache: CredentialCache,
}

impl ProvideCredentials for AssumeRoleProvider {
    fn provide_credentials<'a>(&'a self) -> BoxFuture<'a, CredentialsResult>
    where
        Self: 'a,
    {
        Box::pin(self.retrieve())
    }
}

impl AssumeRoleProvider {
    pub fn builder() -> Builder<AssumeRoleProvider> {
        Builder::default()
    }

    /// Return cached role credentials, assuming the role again if they have expired
    pub async fn retrieve(&self) -> CredentialsResult {
        self.cache
            .retrieve(self.session.assume_role_duration(), || self.assume_role())
            .await
    }

    /// Assume the role without consulting or updating the cache
    pub async fn assume_role(&self) -> CredentialsResult {
        let span = tracing::info_span!(
            "assume_role",
            role_arn = %self.role_arn,
            session_name = %self.role_session_name
        );
        async {
            let caller = self.session.provide_credentials().await?;
            let input = AssumeRoleInput {
                role_arn: self.role_arn.clone(),
                role_session_name: self.role_session_name.clone(),
                duration: self.session.assume_role_duration(),
                ..Default::default()
            };
            tracing::info!("assuming role");
            Ok(self
                .session
                .settings
                .sts
                .assume_role(&caller, input)
                .await?)
        }
        .instrument(span)
        .await
    }

    pub fn profile(&self) -> &Profile {
        self.session.profile()
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn role_session_name(&self) -> &str {
        &self.role_session_name
    }

    /// Name of the cache entry holding this provider's credentials
    pub fn cache_key(&self) -> &str {
        self.cache.key()
    }

    /// Expiration of the currently loaded role credentials, the unix epoch if none are loaded
    pub fn expiration_time(&self) -> SystemTime {
        self.cache.expiration_time()
    }

    /// True when the currently loaded role credentials have expired, or none are loaded
    pub fn is_expired(&self) -> bool {
        self.cache.is_expired()
    }

    pub fn assume_role_duration(&self) -> Duration {
        self.session.assume_role_duration()
    }

    /// The provider supplying the calling identity for role requests
    pub fn session_token_provider(&self) -> &SessionTokenProvider {
        &self.session
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &CredentialCache {
        &self.cache
    }
}

fn default_session_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{}{}", SESSION_NAME_PREFIX, secs)
}

impl Builder<AssumeRoleProvider> {
    /// Build the provider
    ///
    /// # Panics
    /// When no profile, options or STS client were given.
    pub fn build(self) -> Result<AssumeRoleProvider, CredentialsError> {
        let settings = self.settings()?;
        let role_arn = settings.role_arn.clone().ok_or_else(|| {
            CredentialsError::InvalidConfiguration(
                format!(
                    "no role ARN is configured for profile `{}`",
                    settings.profile.name()
                )
                .into(),
            )
        })?;
        let role_session_name = settings
            .role_session_name
            .clone()
            .unwrap_or_else(default_session_name);
        let key = cache_key(ASSUME_ROLE_CACHE_PREFIX, settings.profile.name());
        let cache = CredentialCache::new(settings.store.clone(), key, settings.log_level);
        Ok(AssumeRoleProvider {
            session: SessionTokenProvider::from_settings(settings),
            role_arn,
            role_session_name,
            cache,
        })
    }
}
