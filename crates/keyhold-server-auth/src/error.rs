// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization error taxonomy.
//!
//! Every variant carries the offending id(s) so the caller can build its own
//! user-facing message. An empty scope is never an error.

use crate::types::{PageId, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
	#[error("user {user_id} lacks permission {permission}")]
	PermissionDenied { user_id: UserId, permission: String },

	#[error("user {user_id} cannot grant rights they do not hold: {}", denied.join(", "))]
	PrivilegeEscalationDenied { user_id: UserId, denied: Vec<String> },

	#[error("role name already taken: {name}")]
	RoleNameTaken { name: String },

	#[error("role not found: {role_id}")]
	RoleNotFound { role_id: RoleId },

	#[error("parent role not found: {role_id}")]
	ParentRoleNotFound { role_id: RoleId },

	#[error("role {role_id} is still held by {user_count} user(s) and used as template by {child_roles} role(s)")]
	RoleInUse {
		role_id: RoleId,
		user_count: i64,
		child_roles: i64,
	},

	#[error("page {page_id} grants {} without view", actions.join(", "))]
	InconsistentPermissionSet { page_id: PageId, actions: Vec<String> },

	#[error("unknown resource type: {0}")]
	UnknownResourceType(String),

	#[error("permission {name} already registered with a different resource or action")]
	DuplicatePermission { name: String },

	#[error("invalid permission name: {0}")]
	InvalidPermissionName(String),

	#[error("role {parent_role_id} already has the maximum of {limit} sub-role(s)")]
	SubRoleLimitReached { parent_role_id: RoleId, limit: i64 },

	#[error("system role {role_id} cannot be modified")]
	SystemRoleImmutable { role_id: RoleId },
}

pub type Result<T> = std::result::Result<T, AccessError>;
