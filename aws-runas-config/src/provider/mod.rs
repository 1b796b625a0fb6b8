/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Caching credential providers
//!
//! Two providers are available:
//! - [`SessionTokenProvider`](session_token::SessionTokenProvider) exchanges long-term keys for
//!   a session token, optionally gated by MFA.
//! - [`AssumeRoleProvider`](assume_role::AssumeRoleProvider) uses those session credentials to
//!   assume the profile's role.
//!
//! Both cache what they obtain (see [`crate::cache`]) and only call out to STS once the cached
//! credentials have expired.

use crate::cache::{cache_dir, CredentialStore, FileCredentialStore};
use crate::mfa::ProvideMfaCode;
use crate::profile::Profile;
use aws_runas_types::arn::{Arn, ArnError};
use aws_runas_types::os_shim_internal::{Env, Fs};
use aws_runas_types::sts::{ServiceError, StsApi};
use aws_runas_types::{BoxError, BoxFuture, Credentials};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

pub mod assume_role;
pub mod session_token;

pub use assume_role::AssumeRoleProvider;
pub use session_token::SessionTokenProvider;

pub const SESSION_TOKEN_MIN_DURATION: Duration = Duration::from_secs(15 * 60);
pub const SESSION_TOKEN_MAX_DURATION: Duration = Duration::from_secs(36 * 60 * 60);
pub const SESSION_TOKEN_DEFAULT_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

pub const ASSUME_ROLE_MIN_DURATION: Duration = Duration::from_secs(15 * 60);
pub const ASSUME_ROLE_MAX_DURATION: Duration = Duration::from_secs(12 * 60 * 60);
pub const ASSUME_ROLE_DEFAULT_DURATION: Duration = Duration::from_secs(60 * 60);

pub type CredentialsResult = Result<Credentials, CredentialsError>;

/// Asynchronous credentials provider
pub trait ProvideCredentials: Send + Sync + Debug {
    fn provide_credentials<'a>(&'a self) -> BoxFuture<'a, CredentialsResult>
    where
        Self: 'a;
}

/// Tunables shared by the caching providers
///
/// Durations left at zero are replaced by the provider default; the others are clamped into the
/// range STS accepts. Overrides take precedence over the values in the profile.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub session_token_duration: Duration,
    pub assume_role_duration: Duration,
    pub role_arn: Option<String>,
    pub mfa_serial: Option<String>,
    pub role_session_name: Option<String>,
    pub log_level: Level,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        ProviderOptions {
            session_token_duration: Duration::ZERO,
            assume_role_duration: Duration::ZERO,
            role_arn: None,
            mfa_serial: None,
            role_session_name: None,
            log_level: Level::INFO,
        }
    }
}

fn normalize_duration(requested: Duration, min: Duration, max: Duration, default: Duration) -> Duration {
    if requested.is_zero() {
        default
    } else {
        requested.clamp(min, max)
    }
}

fn must_have_profile() -> Profile {
    panic!("a profile must be provided to build a credentials provider")
}

fn must_have_options() -> ProviderOptions {
    panic!("provider options must be provided to build a credentials provider")
}

fn must_have_sts_client() -> Arc<dyn StsApi> {
    panic!("an STS client must be provided to build a credentials provider")
}

/// Validated provider configuration, shared by both provider kinds
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) profile: Profile,
    pub(crate) role_arn: Option<String>,
    pub(crate) mfa_serial: Option<String>,
    pub(crate) role_session_name: Option<String>,
    pub(crate) session_token_duration: Duration,
    pub(crate) assume_role_duration: Duration,
    pub(crate) log_level: Level,
    pub(crate) sts: Arc<dyn StsApi>,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) mfa: Option<Arc<dyn ProvideMfaCode>>,
}

/// Builder for the caching providers
///
/// `profile`, `options` and `sts_client` are required. Omitting any of them is a programming
/// error and `build` will panic; invalid configuration values are reported as errors.
pub struct Builder<P> {
    profile: Option<Profile>,
    options: Option<ProviderOptions>,
    sts: Option<Arc<dyn StsApi>>,
    store: Option<Arc<dyn CredentialStore>>,
    mfa: Option<Arc<dyn ProvideMfaCode>>,
    env: Option<Env>,
    fs: Option<Fs>,
    _provider: PhantomData<P>,
}

impl<P> Default for Builder<P> {
    fn default() -> Self {
        Builder {
            profile: None,
            options: None,
            sts: None,
            store: None,
            mfa: None,
            env: None,
            fs: None,
            _provider: PhantomData,
        }
    }
}

impl<P> Debug for Builder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("profile", &self.profile)
            .field("options", &self.options)
            .finish()
    }
}

impl<P> Builder<P> {
    pub fn profile(mut self, profile: Profile) -> Self {
        self.set_profile(Some(profile));
        self
    }

    pub fn set_profile(&mut self, profile: Option<Profile>) -> &mut Self {
        self.profile = profile;
        self
    }

    pub fn options(mut self, options: ProviderOptions) -> Self {
        self.set_options(Some(options));
        self
    }

    pub fn set_options(&mut self, options: Option<ProviderOptions>) -> &mut Self {
        self.options = options;
        self
    }

    /// The STS client used for session token and assume role requests
    pub fn sts_client(mut self, sts: Arc<dyn StsApi>) -> Self {
        self.sts = Some(sts);
        self
    }

    /// Override where credentials are cached
    ///
    /// Defaults to files next to the shared config file.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Source of MFA codes, required when the profile or options set an MFA serial
    pub fn mfa_code_provider(mut self, mfa: impl ProvideMfaCode + 'static) -> Self {
        self.mfa = Some(Arc::new(mfa));
        self
    }

    #[doc(hidden)]
    /// Override the environment used to locate the default credential store
    ///
    /// This method exists primarily for testing credential providers
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    #[doc(hidden)]
    /// Override the filesystem used by the default credential store
    ///
    /// This method exists primarily for testing credential providers
    pub fn fs(mut self, fs: Fs) -> Self {
        self.fs = Some(fs);
        self
    }

    pub(crate) fn settings(self) -> Result<Settings, CredentialsError> {
        let profile = self.profile.unwrap_or_else(must_have_profile);
        let options = self.options.unwrap_or_else(must_have_options);
        let sts = self.sts.unwrap_or_else(must_have_sts_client);

        let role_arn = options
            .role_arn
            .filter(|arn| !arn.is_empty())
            .or_else(|| profile.role_arn().map(str::to_string));
        if let Some(role_arn) = &role_arn {
            Arn::parse_iam_role(role_arn).map_err(CredentialsError::InvalidRoleArn)?;
        }
        let mfa_serial = options
            .mfa_serial
            .filter(|serial| !serial.is_empty())
            .or_else(|| profile.mfa_serial().map(str::to_string));

        let env = self.env.unwrap_or_default();
        let fs = self.fs.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileCredentialStore::new(fs, cache_dir(&env))) as _);

        Ok(Settings {
            profile,
            role_arn,
            mfa_serial,
            role_session_name: options.role_session_name.filter(|name| !name.is_empty()),
            session_token_duration: normalize_duration(
                options.session_token_duration,
                SESSION_TOKEN_MIN_DURATION,
                SESSION_TOKEN_MAX_DURATION,
                SESSION_TOKEN_DEFAULT_DURATION,
            ),
            assume_role_duration: normalize_duration(
                options.assume_role_duration,
                ASSUME_ROLE_MIN_DURATION,
                ASSUME_ROLE_MAX_DURATION,
                ASSUME_ROLE_DEFAULT_DURATION,
            ),
            log_level: options.log_level,
            sts,
            store,
            mfa: self.mfa,
        })
    }
}

/// Error producing credentials
#[derive(Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    /// The configured role ARN is malformed or does not name an IAM role
    InvalidRoleArn(ArnError),
    /// The provider is missing configuration it needs
    InvalidConfiguration(Cow<'static, str>),
    /// An MFA serial is configured but no source of MFA codes was given
    MfaRequired { mfa_serial: String },
    /// The MFA code source failed
    MfaCodeUnavailable { mfa_serial: String, source: BoxError },
    /// The remote exchange failed
    ServiceFailure(ServiceError),
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::InvalidRoleArn(err) => write!(f, "invalid role ARN: {}", err),
            CredentialsError::InvalidConfiguration(msg) => {
                write!(f, "the credentials provider was not properly configured: {}", msg)
            }
            CredentialsError::MfaRequired { mfa_serial } => write!(
                f,
                "MFA device {} is configured but no MFA code provider was given",
                mfa_serial
            ),
            CredentialsError::MfaCodeUnavailable { mfa_serial, .. } => {
                write!(f, "could not obtain an MFA code for {}", mfa_serial)
            }
            CredentialsError::ServiceFailure(err) => write!(f, "{}", err),
        }
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialsError::InvalidRoleArn(err) => Some(err),
            CredentialsError::MfaCodeUnavailable { source, .. } => Some(source.as_ref() as _),
            CredentialsError::ServiceFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for CredentialsError {
    fn from(err: ServiceError) -> Self {
        CredentialsError::ServiceFailure(err)
    }
}
