/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Profile resolution
//!
//! Profiles are read from the shared config file (`$AWS_CONFIG_FILE`, falling back to
//! `~/.aws/config`). A profile may name a `role_arn` to assume and a `source_profile` holding the
//! long-term keys used to assume it. Resolution happens in two steps:
//!
//! 1. The requested section is located (or the default, which may be renamed with
//!    `AWS_DEFAULT_PROFILE`).
//! 2. A [`Profile`] is built from it. The role ARN is validated eagerly, the source profile
//!    defaults to `default` when a role is configured, and the region is inherited along the
//!    `source_profile` chain when the profile does not set one.
//!
//! The MFA serial is only ever read from the requested profile; it is not inherited from
//! source profiles.

use crate::profile::parser::{parse_config, ConfigSections, ProfileParseError, Section};
use aws_runas_types::arn::{Arn, ArnError};
use aws_runas_types::os_shim_internal::{Env, Fs};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

pub mod parser;

pub const DEFAULT_PROFILE: &str = "default";

const ENV_VAR_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
const ENV_VAR_DEFAULT_PROFILE: &str = "AWS_DEFAULT_PROFILE";

const REGION: &str = "region";
const ROLE_ARN: &str = "role_arn";
const SOURCE_PROFILE: &str = "source_profile";
const MFA_SERIAL: &str = "mfa_serial";

/// Location of the shared config file: `$AWS_CONFIG_FILE` or `~/.aws/config`
pub fn config_file_path(env: &Env) -> PathBuf {
    match env.get(ENV_VAR_CONFIG_FILE) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => env
            .home_dir()
            .unwrap_or_default()
            .join(".aws")
            .join("config"),
    }
}

/// A resolved configuration profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    name: String,
    region: Option<String>,
    role_arn: Option<String>,
    source_profile: Option<String>,
    mfa_serial: Option<String>,
}

impl Profile {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn.as_deref()
    }

    pub fn source_profile(&self) -> Option<&str> {
        self.source_profile.as_deref()
    }

    pub fn mfa_serial(&self) -> Option<&str> {
        self.mfa_serial.as_deref()
    }

    /// True for the `default` profile, and for a profile built without a name
    pub fn is_default(&self) -> bool {
        self.name.is_empty() || self.name == DEFAULT_PROFILE
    }

    /// Name of the profile holding the long-term keys behind this profile's credentials
    pub fn credentials_profile(&self) -> &str {
        self.source_profile.as_deref().unwrap_or(&self.name)
    }
}

/// Builder for [`Profile`]
#[derive(Debug, Default)]
pub struct Builder {
    name: String,
    region: Option<String>,
    role_arn: Option<String>,
    source_profile: Option<String>,
    mfa_serial: Option<String>,
}

impl Builder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.set_region(Some(region.into()));
        self
    }

    pub fn set_region(&mut self, region: Option<String>) -> &mut Self {
        self.region = non_empty(region);
        self
    }

    pub fn role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.set_role_arn(Some(role_arn.into()));
        self
    }

    pub fn set_role_arn(&mut self, role_arn: Option<String>) -> &mut Self {
        self.role_arn = non_empty(role_arn);
        self
    }

    pub fn source_profile(mut self, source_profile: impl Into<String>) -> Self {
        self.set_source_profile(Some(source_profile.into()));
        self
    }

    pub fn set_source_profile(&mut self, source_profile: Option<String>) -> &mut Self {
        self.source_profile = non_empty(source_profile);
        self
    }

    pub fn mfa_serial(mut self, mfa_serial: impl Into<String>) -> Self {
        self.set_mfa_serial(Some(mfa_serial.into()));
        self
    }

    pub fn set_mfa_serial(&mut self, mfa_serial: Option<String>) -> &mut Self {
        self.mfa_serial = non_empty(mfa_serial);
        self
    }

    /// Validate the role ARN and build the profile
    pub fn build(self) -> Result<Profile, ProfileError> {
        if let Some(role_arn) = &self.role_arn {
            Arn::parse_iam_role(role_arn).map_err(|err| ProfileError::InvalidRoleArn {
                profile: self.name.clone(),
                source: err,
            })?;
        }
        let source_profile = match (&self.role_arn, self.source_profile) {
            (Some(_), None) => Some(DEFAULT_PROFILE.to_string()),
            (_, source) => source,
        };
        Ok(Profile {
            name: self.name,
            region: self.region,
            role_arn: self.role_arn,
            source_profile,
            mfa_serial: self.mfa_serial,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Resolves [`Profile`]s from the shared config file
///
/// The config file is re-read for every resolution so that a long running process observes
/// edits to it.
#[derive(Debug, Clone, Default)]
pub struct ProfileResolver {
    env: Env,
    fs: Fs,
}

impl ProfileResolver {
    /// Resolver reading from the real process environment and file system
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Resolve the default profile
    ///
    /// The default profile is named `default` unless `AWS_DEFAULT_PROFILE` says otherwise.
    pub fn resolve_default(&self) -> Result<Profile, ProfileError> {
        let name = match self.env.get(ENV_VAR_DEFAULT_PROFILE) {
            Ok(name) if !name.is_empty() => Cow::Owned(name),
            _ => Cow::Borrowed(DEFAULT_PROFILE),
        };
        let sections = self.load_sections()?;
        match sections.get(&name) {
            Some(section) => self.build_profile(&sections, &name, section),
            None => Err(ProfileError::NoDefaultProfile {
                profile: name.into_owned(),
            }),
        }
    }

    /// Resolve the profile called `name`
    ///
    /// `None` and the empty string are both rejected with [`ProfileError::InvalidInput`].
    pub fn resolve<'a>(&self, name: impl Into<Option<&'a str>>) -> Result<Profile, ProfileError> {
        let name = match name.into() {
            Some(name) if !name.is_empty() => name,
            Some(_) => {
                return Err(ProfileError::InvalidInput {
                    message: "profile name must not be empty".into(),
                })
            }
            None => {
                return Err(ProfileError::InvalidInput {
                    message: "a profile name is required".into(),
                })
            }
        };
        let sections = self.load_sections()?;
        match sections.get(name) {
            Some(section) => self.build_profile(&sections, name, section),
            None => Err(ProfileError::ProfileNotFound {
                profile: name.to_string(),
            }),
        }
    }

    /// Names of every profile in the config file, sorted
    pub fn profile_names(&self) -> Result<Vec<String>, ProfileError> {
        let sections = self.load_sections()?;
        let mut names: Vec<String> = sections.names().map(str::to_string).collect();
        names.sort_unstable();
        Ok(names)
    }

    fn load_sections(&self) -> Result<ConfigSections, ProfileError> {
        let path = config_file_path(&self.env);
        let span = tracing::debug_span!("load_config", path = %path.display());
        let _enter = span.enter();
        let contents = match self.fs.read_to_end(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("config file does not exist, no profiles are configured");
                return Ok(ConfigSections::default());
            }
            Err(err) => return Err(ProfileError::CouldNotReadConfig { path, source: err }),
        };
        let contents = String::from_utf8_lossy(&contents);
        parse_config(&contents).map_err(|err| ProfileError::CouldNotParseConfig { path, source: err })
    }

    fn build_profile(
        &self,
        sections: &ConfigSections,
        name: &str,
        section: &Section,
    ) -> Result<Profile, ProfileError> {
        let mut builder = Profile::builder().name(name);
        builder
            .set_region(section.get(REGION).cloned())
            .set_role_arn(section.get(ROLE_ARN).cloned())
            .set_source_profile(section.get(SOURCE_PROFILE).cloned())
            .set_mfa_serial(section.get(MFA_SERIAL).cloned());
        let mut profile = builder.build()?;
        if profile.region.is_none() {
            profile.region = inherited_region(sections, &profile)?;
        }
        tracing::debug!(profile = %profile.name, source_profile = ?profile.source_profile, "resolved profile");
        Ok(profile)
    }
}

/// Walk the `source_profile` chain looking for a region
///
/// A chain ends at a profile with a region, at a profile with no source, at a source naming a
/// section that does not exist, or at a profile that is its own source.
fn inherited_region(
    sections: &ConfigSections,
    profile: &Profile,
) -> Result<Option<String>, ProfileError> {
    let mut visited = vec![profile.name.clone()];
    let mut current = profile.name.clone();
    let mut next = profile.source_profile.clone();
    while let Some(source) = next {
        if source == current {
            return Ok(None);
        }
        if visited.contains(&source) {
            return Err(ProfileError::SourceProfileLoop {
                profiles: visited,
                next: source,
            });
        }
        let section = match sections.get(&source) {
            Some(section) => section,
            None => return Ok(None),
        };
        if let Some(region) = section.get(REGION).filter(|r| !r.is_empty()) {
            return Ok(Some(region.clone()));
        }
        next = match (section.get(SOURCE_PROFILE), section.get(ROLE_ARN)) {
            (Some(s), _) if !s.is_empty() => Some(s.clone()),
            (_, Some(r)) if !r.is_empty() => Some(DEFAULT_PROFILE.to_string()),
            _ => None,
        };
        visited.push(source.clone());
        current = source;
    }
    Ok(None)
}

/// Builder for [`ProfileResolver`]
#[derive(Debug, Default)]
pub struct ResolverBuilder {
    env: Option<Env>,
    fs: Option<Fs>,
}

impl ResolverBuilder {
    #[doc(hidden)]
    /// Override the environment used for this resolver
    ///
    /// This method exists primarily for testing
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    #[doc(hidden)]
    /// Override the filesystem used for this resolver
    ///
    /// This method exists primarily for testing
    pub fn fs(mut self, fs: Fs) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn build(self) -> ProfileResolver {
        ProfileResolver {
            env: self.env.unwrap_or_default(),
            fs: self.fs.unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum ProfileError {
    /// A required argument was missing or empty
    InvalidInput { message: Cow<'static, str> },
    /// No section exists for the requested profile
    ProfileNotFound { profile: String },
    /// No section exists for the default profile
    NoDefaultProfile { profile: String },
    /// The profile's `role_arn` is malformed or does not name an IAM role
    InvalidRoleArn { profile: String, source: ArnError },
    /// Following `source_profile` links revisited a profile
    SourceProfileLoop { profiles: Vec<String>, next: String },
    /// The config file exists but could not be read
    CouldNotReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file could not be parsed
    CouldNotParseConfig {
        path: PathBuf,
        source: ProfileParseError,
    },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::InvalidInput { message } => write!(f, "invalid input: {}", message),
            ProfileError::ProfileNotFound { profile } => {
                write!(f, "profile `{}` was not found in the config file", profile)
            }
            ProfileError::NoDefaultProfile { profile } => write!(
                f,
                "the default profile (`{}`) was not found in the config file",
                profile
            ),
            ProfileError::InvalidRoleArn { profile, source } => {
                write!(f, "profile `{}` has an invalid role_arn: {}", profile, source)
            }
            ProfileError::SourceProfileLoop { profiles, next } => write!(
                f,
                "source_profile loop detected: {} -> {}",
                profiles.join(" -> "),
                next
            ),
            ProfileError::CouldNotReadConfig { path, .. } => {
                write!(f, "could not read config file {}", path.display())
            }
            ProfileError::CouldNotParseConfig { path, source } => {
                write!(f, "could not parse config file {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for ProfileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProfileError::InvalidRoleArn { source, .. } => Some(source),
            ProfileError::CouldNotReadConfig { source, .. } => Some(source),
            ProfileError::CouldNotParseConfig { source, .. } => Some(source),
            _ => None,
        }
    }
}
