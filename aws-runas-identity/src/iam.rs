/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Identity and Access Management contract
//!
//! Only the read operations needed to collect the policies that apply to a user are modeled.
//! Implementations are expected to follow pagination themselves and return complete listings.
//! Policy documents are returned exactly as IAM sends them, which is usually percent-encoded.

use aws_runas_types::sts::ServiceError;
use aws_runas_types::BoxFuture;
use std::fmt::Debug;

/// A managed policy attached to a user or group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedPolicy {
    pub arn: String,
    pub name: String,
}

/// Response to `GetPolicy`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPolicy {
    pub arn: String,
    pub name: String,
    pub default_version_id: String,
}

/// Read operations of the IAM service
pub trait IamApi: Send + Sync + Debug {
    /// Names of the groups `user` belongs to
    fn list_groups_for_user<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ServiceError>>;

    /// Names of the inline policies embedded in `user`
    fn list_user_policies<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ServiceError>>;

    /// Document of the inline policy `policy_name` of `user`
    fn get_user_policy<'a>(
        &'a self,
        user: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn list_attached_user_policies<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AttachedPolicy>, ServiceError>>;

    /// Names of the inline policies embedded in `group`
    fn list_group_policies<'a>(
        &'a self,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ServiceError>>;

    /// Document of the inline policy `policy_name` of `group`
    fn get_group_policy<'a>(
        &'a self,
        group: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn list_attached_group_policies<'a>(
        &'a self,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AttachedPolicy>, ServiceError>>;

    fn get_policy<'a>(
        &'a self,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<ManagedPolicy, ServiceError>>;

    /// Document of version `version_id` of the managed policy `policy_arn`
    fn get_policy_version<'a>(
        &'a self,
        policy_arn: &'a str,
        version_id: &'a str,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;
}
