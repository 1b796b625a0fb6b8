/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Caller identity and role discovery

use crate::iam::IamApi;
use crate::policy::{PolicyDocument, RoleArnSet};
use aws_runas_types::arn::{Arn, ArnError};
use aws_runas_types::sts::{ServiceError, StsApi};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{Instrument, Level};

/// Label reported as the origin of every [`Identity`]
pub const PROVIDER_NAME: &str = "AwsIdentityProvider";

const USER_RESOURCE_TYPE: &str = "user";
const ASSUMED_ROLE_RESOURCE_TYPE: &str = "assumed-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityType {
    User,
    Role,
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityType::User => f.write_str("user"),
            IdentityType::Role => f.write_str("role"),
        }
    }
}

/// The principal behind the credentials in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account: String,
    pub arn: String,
    /// User name, or the session name for an assumed role
    pub username: String,
    pub identity_type: IdentityType,
    pub provider: &'static str,
}

fn must_have_sts_client() -> Arc<dyn StsApi> {
    panic!("an STS client must be provided to build an identity provider")
}

fn must_have_iam_client() -> Arc<dyn IamApi> {
    panic!("an IAM client must be provided to build an identity provider")
}

/// Looks up the caller identity and discovers the roles it may assume
#[derive(Debug)]
pub struct AwsIdentityProvider {
    sts: Arc<dyn StsApi>,
    iam: Arc<dyn IamApi>,
    log_level: Level,
}

impl AwsIdentityProvider {
    pub fn new(sts: Arc<dyn StsApi>, iam: Arc<dyn IamApi>) -> Self {
        Self::builder().sts_client(sts).iam_client(iam).build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Describe the principal whose credentials the STS client uses
    pub async fn get_identity(&self) -> Result<Identity, IdentityError> {
        let caller = self.sts.get_caller_identity().await?;
        let arn: Arn = caller.arn.parse()?;
        let identity_type = match arn.resource_type() {
            USER_RESOURCE_TYPE => IdentityType::User,
            ASSUMED_ROLE_RESOURCE_TYPE => IdentityType::Role,
            _ => return Err(IdentityError::UnsupportedPrincipal { arn: caller.arn }),
        };
        Ok(Identity {
            account: caller.account,
            username: arn.resource_name().to_string(),
            arn: caller.arn,
            identity_type,
            provider: PROVIDER_NAME,
        })
    }

    /// Roles the user may assume according to its IAM policies, in ascending order
    ///
    /// When `username` is not given the caller identity is looked up, and must be an IAM user.
    /// Policies that cannot be fetched or parsed are skipped; only a failed identity lookup is
    /// reported as an error.
    pub async fn roles<'a>(
        &self,
        username: impl Into<Option<&'a str>>,
    ) -> Result<Vec<String>, IdentityError> {
        let username = match username.into().filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => {
                let identity = self.get_identity().await?;
                if identity.identity_type != IdentityType::User {
                    return Err(IdentityError::UnsupportedPrincipal { arn: identity.arn });
                }
                identity.username
            }
        };

        let discovery = Discovery {
            iam: self.iam.clone(),
            roles: Arc::new(Mutex::new(RoleArnSet::new())),
            verbose: self.log_level >= Level::DEBUG,
        };
        let span = tracing::info_span!("discover_roles", user = %username);
        let mut tasks = JoinSet::new();
        tasks.spawn(
            discovery
                .clone()
                .inline_policies(Principal::User(username.clone()))
                .instrument(span.clone()),
        );
        tasks.spawn(
            discovery
                .clone()
                .attached_policies(Principal::User(username.clone()))
                .instrument(span.clone()),
        );
        tasks.spawn(
            discovery
                .clone()
                .group_policies(username)
                .instrument(span),
        );
        join_all(tasks).await;

        Ok(discovery.into_roles())
    }
}

/// Builder for [`AwsIdentityProvider`]
///
/// Both clients are required; `build` panics without them.
#[derive(Debug, Default)]
pub struct Builder {
    sts: Option<Arc<dyn StsApi>>,
    iam: Option<Arc<dyn IamApi>>,
    log_level: Option<Level>,
}

impl Builder {
    pub fn sts_client(mut self, sts: Arc<dyn StsApi>) -> Self {
        self.sts = Some(sts);
        self
    }

    pub fn iam_client(mut self, iam: Arc<dyn IamApi>) -> Self {
        self.iam = Some(iam);
        self
    }

    /// Verbosity of discovery logging; skipped policies are only reported at `DEBUG`
    pub fn log_level(mut self, log_level: Level) -> Self {
        self.set_log_level(Some(log_level));
        self
    }

    pub fn set_log_level(&mut self, log_level: Option<Level>) -> &mut Self {
        self.log_level = log_level;
        self
    }

    pub fn build(self) -> AwsIdentityProvider {
        AwsIdentityProvider {
            sts: self.sts.unwrap_or_else(must_have_sts_client),
            iam: self.iam.unwrap_or_else(must_have_iam_client),
            log_level: self.log_level.unwrap_or(Level::INFO),
        }
    }
}

#[derive(Debug, Clone)]
enum Principal {
    User(String),
    Group(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User(name) => write!(f, "user {}", name),
            Principal::Group(name) => write!(f, "group {}", name),
        }
    }
}

/// State shared by the tasks of a single discovery
#[derive(Debug, Clone)]
struct Discovery {
    iam: Arc<dyn IamApi>,
    roles: Arc<Mutex<RoleArnSet>>,
    verbose: bool,
}

impl Discovery {
    async fn inline_policies(self, principal: Principal) {
        let names = match &principal {
            Principal::User(user) => self.iam.list_user_policies(user).await,
            Principal::Group(group) => self.iam.list_group_policies(group).await,
        };
        let names = match names {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(%principal, error = %err, "could not list inline policies");
                return;
            }
        };
        for name in names {
            let document = match &principal {
                Principal::User(user) => self.iam.get_user_policy(user, &name).await,
                Principal::Group(group) => self.iam.get_group_policy(group, &name).await,
            };
            match document {
                Ok(document) => self.evaluate(&name, &document),
                Err(err) => {
                    tracing::warn!(%principal, policy = %name, error = %err, "could not fetch inline policy")
                }
            }
        }
    }

    async fn attached_policies(self, principal: Principal) {
        let attached = match &principal {
            Principal::User(user) => self.iam.list_attached_user_policies(user).await,
            Principal::Group(group) => self.iam.list_attached_group_policies(group).await,
        };
        let attached = match attached {
            Ok(attached) => attached,
            Err(err) => {
                tracing::warn!(%principal, error = %err, "could not list attached policies");
                return;
            }
        };
        for policy in attached {
            match self.managed_policy_document(&policy.arn).await {
                Ok(document) => self.evaluate(&policy.name, &document),
                Err(err) => {
                    tracing::warn!(%principal, policy = %policy.arn, error = %err, "could not fetch attached policy")
                }
            }
        }
    }

    async fn managed_policy_document(&self, policy_arn: &str) -> Result<String, ServiceError> {
        let policy = self.iam.get_policy(policy_arn).await?;
        self.iam
            .get_policy_version(policy_arn, &policy.default_version_id)
            .await
    }

    async fn group_policies(self, user: String) {
        let groups = match self.iam.list_groups_for_user(&user).await {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(%user, error = %err, "could not list groups");
                return;
            }
        };
        let mut tasks = JoinSet::new();
        for group in groups {
            tasks.spawn(
                self.clone()
                    .inline_policies(Principal::Group(group.clone()))
                    .in_current_span(),
            );
            tasks.spawn(
                self.clone()
                    .attached_policies(Principal::Group(group))
                    .in_current_span(),
            );
        }
        join_all(tasks).await;
    }

    fn evaluate(&self, name: &str, document: &str) {
        match PolicyDocument::parse(document) {
            Ok(policy) => {
                let mut roles = self
                    .roles
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                roles.evaluate(&policy);
            }
            Err(err) => {
                if self.verbose {
                    tracing::debug!(policy = %name, error = %err, "skipping unparseable policy");
                }
            }
        }
    }

    fn into_roles(self) -> Vec<String> {
        let roles = self
            .roles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        roles.clone().into_roles()
    }
}

async fn join_all(mut tasks: JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            tracing::warn!(error = %err, "policy evaluation task failed");
        }
    }
}

/// Error discovering the caller identity
#[derive(Debug)]
#[non_exhaustive]
pub enum IdentityError {
    /// The identity lookup failed
    ServiceFailure(ServiceError),
    /// The caller ARN returned by the service could not be parsed
    InvalidPrincipalArn(ArnError),
    /// The caller is neither an IAM user nor an assumed role, or is not a user where one is
    /// required
    UnsupportedPrincipal { arn: String },
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::ServiceFailure(err) => write!(f, "{}", err),
            IdentityError::InvalidPrincipalArn(err) => {
                write!(f, "invalid principal ARN: {}", err)
            }
            IdentityError::UnsupportedPrincipal { arn } => write!(
                f,
                "unsupported principal {}: role discovery needs an IAM user name",
                arn
            ),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IdentityError::ServiceFailure(err) => Some(err),
            IdentityError::InvalidPrincipalArn(err) => Some(err),
            IdentityError::UnsupportedPrincipal { .. } => None,
        }
    }
}

impl From<ServiceError> for IdentityError {
    fn from(err: ServiceError) -> Self {
        IdentityError::ServiceFailure(err)
    }
}

impl From<ArnError> for IdentityError {
    fn from(err: ArnError) -> Self {
        IdentityError::InvalidPrincipalArn(err)
    }
}
