/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Amazon Resource Names
//!
//! ARNs have the shape `arn:partition:service:region:account-id:resource`. Only the structure is
//! validated here; no attempt is made to check that a partition or region actually exists.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

const ARN_PREFIX: &str = "arn";
const IAM_SERVICE: &str = "iam";
const ROLE_RESOURCE_TYPE: &str = "role";

/// A parsed Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account_id: String,
    resource: String,
}

impl Arn {
    /// Parse `arn` and require that it names an IAM role
    pub fn parse_iam_role(arn: &str) -> Result<Arn, ArnError> {
        let parsed: Arn = arn.parse()?;
        if parsed.is_iam_role() {
            Ok(parsed)
        } else {
            Err(ArnError::NotIamRole {
                arn: arn.to_string(),
            })
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The full resource section, eg. `role/path/to/MyRole`
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The resource type, the leading segment of the resource before the first `/` or `:`
    pub fn resource_type(&self) -> &str {
        self.resource
            .split(|c: char| c == '/' || c == ':')
            .next()
            .unwrap_or_default()
    }

    /// The last `/` delimited segment of the resource, eg. `MyRole` for `role/path/to/MyRole`
    pub fn resource_name(&self) -> &str {
        self.resource.rsplit('/').next().unwrap_or_default()
    }

    /// True if this ARN has the shape of an IAM role: service `iam`, resource type `role`, and
    /// a non-empty role name.
    pub fn is_iam_role(&self) -> bool {
        self.service == IAM_SERVICE
            && self.resource_type() == ROLE_RESOURCE_TYPE
            && self.resource.len() > ROLE_RESOURCE_TYPE.len() + 1
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(arn: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ArnError::InvalidArn {
            arn: arn.to_string(),
            reason,
        };
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 {
            return Err(invalid("expected 6 colon separated sections"));
        }
        if parts[0] != ARN_PREFIX {
            return Err(invalid("must start with `arn:`"));
        }
        if parts[1].is_empty() {
            return Err(invalid("partition must not be empty"));
        }
        if parts[2].is_empty() {
            return Err(invalid("service must not be empty"));
        }
        if parts[5].is_empty() {
            return Err(invalid("resource must not be empty"));
        }
        Ok(Arn {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Failure to parse or classify an ARN
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArnError {
    /// The string is not syntactically an ARN
    InvalidArn { arn: String, reason: &'static str },
    /// The ARN is well formed but does not name an IAM role
    NotIamRole { arn: String },
}

impl fmt::Display for ArnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArnError::InvalidArn { arn, reason } => write!(f, "invalid ARN `{}`: {}", arn, reason),
            ArnError::NotIamRole { arn } => write!(f, "`{}` is not an IAM role ARN", arn),
        }
    }
}

impl Error for ArnError {}
