/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Session Token Credential Provider

use crate::cache::{cache_key, CredentialCache, SESSION_TOKEN_CACHE_PREFIX};
use crate::profile::Profile;
use crate::provider::{Builder, CredentialsError, CredentialsResult, ProvideCredentials, Settings};
use aws_runas_types::sts::GetSessionTokenInput;
use aws_runas_types::BoxFuture;
use std::time::{Duration, SystemTime};

/// Provides session token credentials, cached per profile
///
/// Session tokens are minted from the long-term keys of the profile's source profile but cached
/// under the profile's own name. Role profiles sharing a source may differ in `mfa_serial`, and a
/// token obtained without MFA must never stand in for one that requires it.
#[derive(Debug)]
pub struct SessionTokenProvider {
    pub(super) settings: Settings,
    cache: CredentialCache,
}

impl ProvideCredentials for SessionTokenProvider {
    fn provide_credentials<'a>(&'a self) -> BoxFuture<'a, CredentialsResult>
    where
        Self: 'a,
    {
        Box::pin(self.retrieve())
    }
}

impl SessionTokenProvider {
    pub fn builder() -> Builder<SessionTokenProvider> {
        Builder::default()
    }

    pub(crate) fn from_settings(settings: Settings) -> Self {
        let key = cache_key(SESSION_TOKEN_CACHE_PREFIX, settings.profile.name());
        let cache = CredentialCache::new(settings.store.clone(), key, settings.log_level);
        SessionTokenProvider { settings, cache }
    }

    /// Return cached session token credentials, refreshing them if they have expired
    pub async fn retrieve(&self) -> CredentialsResult {
        self.cache
            .retrieve(self.settings.session_token_duration, || {
                self.get_session_token()
            })
            .await
    }

    async fn get_session_token(&self) -> CredentialsResult {
        let mut input = GetSessionTokenInput {
            duration: self.settings.session_token_duration,
            ..Default::default()
        };
        if let Some(mfa_serial) = &self.settings.mfa_serial {
            let mfa = self
                .settings
                .mfa
                .as_ref()
                .ok_or_else(|| CredentialsError::MfaRequired {
                    mfa_serial: mfa_serial.clone(),
                })?;
            let code = mfa
                .mfa_code(mfa_serial)
                .map_err(|err| CredentialsError::MfaCodeUnavailable {
                    mfa_serial: mfa_serial.clone(),
                    source: err,
                })?;
            input.mfa_serial = Some(mfa_serial.clone());
            input.mfa_code = Some(code);
        }
        tracing::info!(profile = %self.settings.profile.credentials_profile(), "requesting session token");
        Ok(self.settings.sts.get_session_token(input).await?)
    }

    pub fn profile(&self) -> &Profile {
        &self.settings.profile
    }

    /// Name of the cache entry holding this provider's credentials
    pub fn cache_key(&self) -> &str {
        self.cache.key()
    }

    /// Expiration of the currently loaded credentials, the unix epoch if none are loaded
    pub fn expiration_time(&self) -> SystemTime {
        self.cache.expiration_time()
    }

    /// True when the currently loaded credentials have expired, or none are loaded
    ///
    /// This does not load or refresh anything.
    pub fn is_expired(&self) -> bool {
        self.cache.is_expired()
    }

    pub fn session_token_duration(&self) -> Duration {
        self.settings.session_token_duration
    }

    pub fn assume_role_duration(&self) -> Duration {
        self.settings.assume_role_duration
    }

    pub fn role_arn(&self) -> Option<&str> {
        self.settings.role_arn.as_deref()
    }

    pub fn mfa_serial(&self) -> Option<&str> {
        self.settings.mfa_serial.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &CredentialCache {
        &self.cache
    }
}

impl Builder<SessionTokenProvider> {
    /// Build the provider
    ///
    /// # Panics
    /// When no profile, options or STS client were given.
    pub fn build(self) -> Result<SessionTokenProvider, CredentialsError> {
        Ok(SessionTokenProvider::from_settings(self.settings()?))
    }
}

#[cfg(test)]
mod test {
    use crate::cache::{CredentialStore, FileCredentialStore};
    use crate::mfa::{mfa_code_fn, StaticMfaCode};
    use crate::profile::Profile;
    use crate::provider::{
        CredentialsError, ProvideCredentials, ProviderOptions, SessionTokenProvider,
        ASSUME_ROLE_DEFAULT_DURATION, ASSUME_ROLE_MAX_DURATION, ASSUME_ROLE_MIN_DURATION,
        SESSION_TOKEN_DEFAULT_DURATION, SESSION_TOKEN_MAX_DURATION, SESSION_TOKEN_MIN_DURATION,
    };
    use crate::test_util::{FakeSts, MemoryStore};
    use aws_runas_types::os_shim_internal::{Env, Fs};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tracing::Level;
    use tracing_test::traced_test;

    fn provider(profile: Profile, options: ProviderOptions) -> SessionTokenProvider {
        SessionTokenProvider::builder()
            .profile(profile)
            .options(options)
            .sts_client(Arc::new(FakeSts::default()))
            .credential_store(Arc::new(MemoryStore::default()))
            .build()
            .expect("valid provider")
    }

    #[test]
    fn defaults() {
        let provider = SessionTokenProvider::builder()
            .profile(Profile::default())
            .options(ProviderOptions::default())
            .sts_client(Arc::new(FakeSts::default()))
            .env(Env::from_slice(&[("HOME", "/home/me")]))
            .fs(Fs::from_slice(&[]))
            .build()
            .expect("valid provider");
        assert_eq!(provider.cache_key(), ".aws_session_token_");
        assert_eq!(provider.expiration_time(), UNIX_EPOCH);
        assert!(provider.is_expired());
        assert_eq!(
            provider.session_token_duration(),
            SESSION_TOKEN_DEFAULT_DURATION
        );
        assert_eq!(provider.assume_role_duration(), ASSUME_ROLE_DEFAULT_DURATION);
    }

    #[test]
    fn cache_key_embeds_profile_name() {
        let profile = Profile::builder()
            .name("admin")
            .role_arn("arn:aws:iam::0123456789:role/admin")
            .source_profile("corp")
            .build()
            .unwrap();
        let role = provider(profile, ProviderOptions::default());
        assert_eq!(role.cache_key(), ".aws_session_token_admin");

        let basic = Profile::builder().name("basic").build().unwrap();
        let basic = provider(basic, ProviderOptions::default());
        assert_eq!(basic.cache_key(), ".aws_session_token_basic");
    }

    #[test]
    #[should_panic(expected = "a profile must be provided")]
    fn missing_profile_is_a_contract_violation() {
        let _ = SessionTokenProvider::builder()
            .options(ProviderOptions::default())
            .sts_client(Arc::new(FakeSts::default()))
            .build();
    }

    #[test]
    #[should_panic(expected = "provider options must be provided")]
    fn missing_options_is_a_contract_violation() {
        let _ = SessionTokenProvider::builder()
            .profile(Profile::default())
            .sts_client(Arc::new(FakeSts::default()))
            .build();
    }

    #[test]
    fn bad_role_arn_option_is_an_error() {
        let err = SessionTokenProvider::builder()
            .profile(Profile::default())
            .options(ProviderOptions {
                role_arn: Some("bogus".into()),
                ..Default::default()
            })
            .sts_client(Arc::new(FakeSts::default()))
            .credential_store(Arc::new(MemoryStore::default()))
            .build()
            .expect_err("bogus role arn");
        assert!(matches!(err, CredentialsError::InvalidRoleArn(_)), "{}", err);
    }

    #[test]
    fn options_override_profile() {
        let profile = Profile::builder()
            .name("p")
            .role_arn("arn:aws:iam::0123456789:role/from-profile")
            .mfa_serial("profile-mfa")
            .build()
            .unwrap();
        let overridden = provider(
            profile,
            ProviderOptions {
                role_arn: Some("arn:aws:iam::0123456789:role/mock-role".into()),
                mfa_serial: Some("mock-mfa".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            overridden.role_arn(),
            Some("arn:aws:iam::0123456789:role/mock-role")
        );
        assert_eq!(overridden.mfa_serial(), Some("mock-mfa"));
    }

    #[test]
    fn durations_are_clamped() {
        let clamp = |session: Duration, role: Duration| {
            let clamped = provider(
                Profile::default(),
                ProviderOptions {
                    session_token_duration: session,
                    assume_role_duration: role,
                    ..Default::default()
                },
            );
            (
                clamped.session_token_duration(),
                clamped.assume_role_duration(),
            )
        };
        let minute = Duration::from_secs(60);
        let hour = Duration::from_secs(3600);
        assert_eq!(
            clamp(minute, minute),
            (SESSION_TOKEN_MIN_DURATION, ASSUME_ROLE_MIN_DURATION)
        );
        assert_eq!(
            clamp(100 * hour, 18 * hour),
            (SESSION_TOKEN_MAX_DURATION, ASSUME_ROLE_MAX_DURATION)
        );
        assert_eq!(clamp(8 * hour, 2 * hour), (8 * hour, 2 * hour));
    }

    #[traced_test]
    #[tokio::test]
    async fn retrieve_refreshes_and_persists() {
        let fs = Fs::from_slice(&[]);
        let sts = Arc::new(FakeSts::default());
        let profile = Profile::builder().region("us-west-1").build().unwrap();
        let provider = SessionTokenProvider::builder()
            .profile(profile)
            .options(ProviderOptions {
                session_token_duration: Duration::from_secs(8 * 3600),
                role_arn: Some("arn:aws:iam::0123456789:role/mock-role".into()),
                log_level: Level::DEBUG,
                ..Default::default()
            })
            .sts_client(sts.clone())
            .env(Env::from_slice(&[("AWS_CONFIG_FILE", "aws.cfg")]))
            .fs(fs.clone())
            .build()
            .expect("valid provider");

        let creds = provider
            .provide_credentials()
            .await
            .expect("retrieve succeeds");
        assert_eq!(creds.access_key_id(), "MockSessionTokenAccessKey");
        assert_eq!(creds.secret_access_key(), "MockSessionTokenSecretKey");
        assert_eq!(creds.session_token(), Some("MockSessionToken"));
        assert_eq!(creds.provider_name(), "MockCredentialsProvider");
        assert_eq!(sts.session_token_calls(), 1);
        assert!(logs_contain("detected expired or unset credentials"));

        assert!(provider.expiration_time() > SystemTime::now());
        assert!(!provider.is_expired());

        let store = FileCredentialStore::new(fs, "");
        let cached = store
            .load(".aws_session_token_")
            .expect("readable")
            .expect("persisted next to the config file");
        assert_eq!(cached.value.access_key_id, "MockSessionTokenAccessKey");

        // served from the cache
        provider.provide_credentials().await.expect("cached");
        assert_eq!(sts.session_token_calls(), 1);

        provider
            .cache()
            .set_expiration(SystemTime::now() - Duration::from_secs(5));
        assert!(provider.expiration_time() < SystemTime::now());
        assert!(provider.is_expired());
    }

    #[tokio::test]
    async fn second_provider_reuses_cached_token() {
        let sts = Arc::new(FakeSts::default());
        let store = Arc::new(MemoryStore::default());
        let build = || {
            SessionTokenProvider::builder()
                .profile(Profile::default())
                .options(ProviderOptions::default())
                .sts_client(sts.clone())
                .credential_store(store.clone())
                .build()
                .unwrap()
        };
        build().provide_credentials().await.unwrap();
        let second = build();
        assert!(second.is_expired(), "nothing loaded before first use");
        second.provide_credentials().await.unwrap();
        assert!(!second.is_expired());
        assert_eq!(sts.session_token_calls(), 1);
    }

    #[tokio::test]
    async fn mfa_code_is_sent_with_request() {
        let sts = Arc::new(FakeSts::default());
        let profile = Profile::builder()
            .name("mfa")
            .mfa_serial("arn:aws:iam::0123456789:mfa/me")
            .build()
            .unwrap();
        let provider = SessionTokenProvider::builder()
            .profile(profile)
            .options(ProviderOptions::default())
            .sts_client(sts.clone())
            .credential_store(Arc::new(MemoryStore::default()))
            .mfa_code_provider(StaticMfaCode::new("123456"))
            .build()
            .unwrap();
        provider.provide_credentials().await.unwrap();
        let input = sts.last_session_token_input().expect("request sent");
        assert_eq!(input.mfa_serial.as_deref(), Some("arn:aws:iam::0123456789:mfa/me"));
        assert_eq!(input.mfa_code.as_deref(), Some("123456"));
        assert_eq!(input.duration, SESSION_TOKEN_DEFAULT_DURATION);
    }

    #[tokio::test]
    async fn mfa_gated_profile_does_not_reuse_token_from_shared_source() {
        let sts = Arc::new(FakeSts::default());
        let store = Arc::new(MemoryStore::default());
        let prompts = Arc::new(AtomicUsize::new(0));
        let plain = Profile::builder()
            .name("plain")
            .role_arn("arn:aws:iam::0123456789:role/plain")
            .source_profile("corp")
            .build()
            .unwrap();
        let gated = Profile::builder()
            .name("gated")
            .role_arn("arn:aws:iam::0123456789:role/gated")
            .source_profile("corp")
            .mfa_serial("arn:aws:iam::0123456789:mfa/me")
            .build()
            .unwrap();

        SessionTokenProvider::builder()
            .profile(plain)
            .options(ProviderOptions::default())
            .sts_client(sts.clone())
            .credential_store(store.clone())
            .build()
            .unwrap()
            .provide_credentials()
            .await
            .expect("token without mfa");
        assert_eq!(sts.last_session_token_input().unwrap().mfa_code, None);

        let counter = prompts.clone();
        let gated = SessionTokenProvider::builder()
            .profile(gated)
            .options(ProviderOptions::default())
            .sts_client(sts.clone())
            .credential_store(store.clone())
            .mfa_code_provider(mfa_code_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("112233".to_string())
            }))
            .build()
            .unwrap();
        gated.provide_credentials().await.expect("token with mfa");

        assert_eq!(sts.session_token_calls(), 2);
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        let input = sts.last_session_token_input().expect("request sent");
        assert_eq!(input.mfa_code.as_deref(), Some("112233"));
        assert!(store.load(".aws_session_token_plain").unwrap().is_some());
        assert!(store.load(".aws_session_token_gated").unwrap().is_some());
    }

    #[tokio::test]
    async fn mfa_failures() {
        let profile = Profile::builder()
            .mfa_serial("arn:aws:iam::0123456789:mfa/me")
            .build()
            .unwrap();
        let without_source = provider(profile.clone(), ProviderOptions::default());
        let err = without_source
            .provide_credentials()
            .await
            .expect_err("no mfa source");
        assert!(matches!(err, CredentialsError::MfaRequired { .. }));

        let failing = SessionTokenProvider::builder()
            .profile(profile)
            .options(ProviderOptions::default())
            .sts_client(Arc::new(FakeSts::default()))
            .credential_store(Arc::new(MemoryStore::default()))
            .mfa_code_provider(mfa_code_fn(|_| Err("prompt closed".into())))
            .build()
            .unwrap();
        let err = failing.provide_credentials().await.expect_err("prompt failed");
        assert!(matches!(err, CredentialsError::MfaCodeUnavailable { .. }));
        assert!(failing.is_expired());
    }

    #[tokio::test]
    async fn service_failures_are_surfaced() {
        let provider = SessionTokenProvider::builder()
            .profile(Profile::default())
            .options(ProviderOptions::default())
            .sts_client(Arc::new(FakeSts::failing()))
            .credential_store(Arc::new(MemoryStore::default()))
            .build()
            .unwrap();
        let err = provider.provide_credentials().await.expect_err("sts is down");
        match err {
            CredentialsError::ServiceFailure(err) => assert_eq!(err.operation(), "GetSessionToken"),
            other => panic!("incorrect error variant: {}", other),
        }
    }
}
