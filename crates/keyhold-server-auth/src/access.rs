// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request access context and action gating.
//!
//! An [`AccessContext`] is built once per request from the authenticated
//! principal and the roles they hold, then passed explicitly to every call
//! that needs a decision. It never reads ambient state, so a test can build
//! one by hand.
//!
//! Decisions are closed-world: a permission is held only if some role grants
//! it. Admins are the single exception and pass every check.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AccessError;
use crate::page::{PageAction, PageGrantSet};
use crate::permission::{PermissionAction, PermissionName, PermissionSet};
use crate::types::{PageId, RoleId, SystemRole, UserId};

/// A role held by the actor, as loaded by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldRole {
	pub id: RoleId,
	pub name: String,
}

/// The resolved actor plus everything needed for action gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
	user_id: UserId,
	is_admin: bool,
	roles: Vec<HeldRole>,
	permissions: PermissionSet,
	page_grants: PageGrantSet,
}

impl AccessContext {
	/// Creates a context. `is_admin` is forced on when one of the held roles
	/// is the `admin` system role.
	pub fn new(
		user_id: UserId,
		is_admin: bool,
		roles: Vec<HeldRole>,
		permissions: PermissionSet,
		page_grants: PageGrantSet,
	) -> Self {
		let is_admin = is_admin || roles.iter().any(|r| r.name == SystemRole::Admin.as_str());
		Self {
			user_id,
			is_admin,
			roles,
			permissions,
			page_grants,
		}
	}

	/// A context with no roles and no grants.
	pub fn anonymous(user_id: UserId) -> Self {
		Self::new(
			user_id,
			false,
			Vec::new(),
			PermissionSet::new(),
			PageGrantSet::new(),
		)
	}

	pub fn user_id(&self) -> UserId {
		self.user_id
	}

	pub fn is_admin(&self) -> bool {
		self.is_admin
	}

	pub fn roles(&self) -> &[HeldRole] {
		&self.roles
	}

	pub fn holds_role(&self, role_id: RoleId) -> bool {
		self.roles.iter().any(|r| r.id == role_id)
	}

	/// Effective permissions (union over held roles and their templates).
	pub fn permissions(&self) -> &PermissionSet {
		&self.permissions
	}

	pub fn page_grants(&self) -> &PageGrantSet {
		&self.page_grants
	}

	/// True iff a held role grants `name`. Admins always pass.
	#[instrument(level = "debug", skip(self), fields(user_id = %self.user_id))]
	pub fn has_permission(&self, name: &str) -> bool {
		if self.is_admin {
			return true;
		}
		self.permissions.contains(name)
	}

	/// Checks `<resource>.<action>`, falling back to `<resource>.<action>_own`
	/// for view, update and delete. Everything else is denied.
	#[instrument(level = "debug", skip(self), fields(user_id = %self.user_id, action = %action))]
	pub fn has_resource_permission(&self, resource: &str, action: PermissionAction) -> bool {
		if self.has_permission(&PermissionName::new(resource, action).to_string()) {
			return true;
		}
		match action.own_variant() {
			Some(own) => self.has_permission(&PermissionName::new(resource, own).to_string()),
			None => false,
		}
	}

	/// Like [`has_permission`](Self::has_permission) but returns `PermissionDenied`.
	pub fn require_permission(&self, name: &str) -> Result<(), AccessError> {
		if self.has_permission(name) {
			Ok(())
		} else {
			Err(AccessError::PermissionDenied {
				user_id: self.user_id,
				permission: name.to_string(),
			})
		}
	}

	/// Like [`has_resource_permission`](Self::has_resource_permission) but
	/// returns `PermissionDenied` naming the unrestricted permission.
	pub fn require_resource_permission(
		&self,
		resource: &str,
		action: PermissionAction,
	) -> Result<(), AccessError> {
		if self.has_resource_permission(resource, action) {
			Ok(())
		} else {
			Err(AccessError::PermissionDenied {
				user_id: self.user_id,
				permission: PermissionName::new(resource, action).to_string(),
			})
		}
	}

	/// Page-level check used by UI guards.
	pub fn has_page_action(&self, page_id: PageId, action: PageAction) -> bool {
		self.is_admin || self.page_grants.contains(page_id, action)
	}
}
