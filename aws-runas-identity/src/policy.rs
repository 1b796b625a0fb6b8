/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Minimal IAM policy documents
//!
//! Only what is needed to find `sts:AssumeRole` grants is understood: statement effects, literal
//! actions, and resources. Wildcard actions, `NotAction`/`NotResource` and conditions are not
//! evaluated.

use aws_runas_types::Arn;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::str::Utf8Error;

const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// JSON fields that accept either a single value or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value).iter(),
            OneOrMany::Many(values) => values.iter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    #[serde(rename = "Statement", default)]
    pub statement: OneOrMany<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Statement {
    #[serde(rename = "Effect", default)]
    pub effect: Effect,
    #[serde(rename = "Action", default)]
    pub action: OneOrMany<String>,
    #[serde(rename = "Resource", default)]
    pub resource: OneOrMany<String>,
}

impl Statement {
    fn grants_assume_role(&self) -> bool {
        self.action.iter().any(|action| action == ASSUME_ROLE_ACTION)
    }

    /// Resources shaped like IAM role ARNs; anything else is dropped
    fn role_resources(&self) -> impl Iterator<Item = &str> {
        self.resource
            .iter()
            .map(String::as_str)
            .filter(|resource| {
                resource
                    .parse::<Arn>()
                    .map(|arn| arn.is_iam_role())
                    .unwrap_or(false)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
    /// Any other value, ignored during evaluation
    #[serde(other)]
    Other,
}

impl Default for Effect {
    fn default() -> Self {
        Effect::Other
    }
}

impl PolicyDocument {
    /// Parse a policy document, decoding it first if it is percent-encoded
    pub fn parse(body: &str) -> Result<PolicyDocument, PolicyError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(PolicyError::Empty);
        }
        let decoded = if body.starts_with('{') {
            Cow::Borrowed(body)
        } else {
            percent_decode_str(body)
                .decode_utf8()
                .map_err(PolicyError::InvalidEncoding)?
        };
        serde_json::from_str(&decoded).map_err(PolicyError::InvalidJson)
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statement.iter()
    }
}

/// A policy document that could not be understood
#[derive(Debug)]
#[non_exhaustive]
pub enum PolicyError {
    Empty,
    InvalidEncoding(Utf8Error),
    InvalidJson(serde_json::Error),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Empty => write!(f, "policy document is empty"),
            PolicyError::InvalidEncoding(_) => {
                write!(f, "policy document is not valid percent-encoded UTF-8")
            }
            PolicyError::InvalidJson(err) => write!(f, "policy document is not valid JSON: {}", err),
        }
    }
}

impl Error for PolicyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PolicyError::Empty => None,
            PolicyError::InvalidEncoding(err) => Some(err),
            PolicyError::InvalidJson(err) => Some(err),
        }
    }
}

/// Accumulates the roles granted and denied by the policies evaluated so far
#[derive(Debug, Default, Clone)]
pub struct RoleArnSet {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl RoleArnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the `sts:AssumeRole` grants and denials of `policy`
    pub fn evaluate(&mut self, policy: &PolicyDocument) {
        for statement in policy.statements() {
            if !statement.grants_assume_role() {
                continue;
            }
            let target = match statement.effect {
                Effect::Allow => &mut self.allow,
                Effect::Deny => &mut self.deny,
                Effect::Other => continue,
            };
            target.extend(statement.role_resources().map(str::to_string));
        }
    }

    /// Allowed roles that are not also denied, in ascending order
    pub fn into_roles(self) -> Vec<String> {
        self.allow.difference(&self.deny).cloned().collect()
    }
}
