// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Privilege-escalation check for custom roles.
//!
//! A role minted by an owner may carry only rights the owner holds. The check
//! is a set difference: `requested \ grantable` must be empty. Anything left
//! over is reported in full and the whole request is rejected; nothing is
//! silently dropped.

use crate::access::AccessContext;
use crate::error::AccessError;
use crate::page::PageGrantSet;
use crate::permission::PermissionSet;
use crate::types::UserId;

/// What an actor is allowed to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantable {
	/// Admins may grant anything in the catalog.
	Everything,
	Only {
		permissions: PermissionSet,
		pages: PageGrantSet,
	},
}

impl Grantable {
	pub fn from_context(ctx: &AccessContext) -> Self {
		if ctx.is_admin() {
			Grantable::Everything
		} else {
			Grantable::Only {
				permissions: ctx.permissions().clone(),
				pages: ctx.page_grants().clone(),
			}
		}
	}
}

/// Returns every requested right not covered by `grantable`, sorted.
///
/// Resource permissions come first (as `resource.action`), then page grants
/// (as `page:<id>.<action>`).
pub fn escalations(
	requested_permissions: &PermissionSet,
	requested_pages: &PageGrantSet,
	grantable: &Grantable,
) -> Vec<String> {
	match grantable {
		Grantable::Everything => Vec::new(),
		Grantable::Only { permissions, pages } => requested_permissions
			.difference(permissions)
			.map(str::to_string)
			.chain(requested_pages.difference(pages).map(|g| g.to_string()))
			.collect(),
	}
}

/// Fails with `PrivilegeEscalationDenied` if any requested right exceeds
/// what `grantable` allows.
pub fn check_escalation(
	user_id: UserId,
	requested_permissions: &PermissionSet,
	requested_pages: &PageGrantSet,
	grantable: &Grantable,
) -> Result<(), AccessError> {
	let denied = escalations(requested_permissions, requested_pages, grantable);
	if denied.is_empty() {
		Ok(())
	} else {
		tracing::debug!(user_id = %user_id, denied = ?denied, "privilege escalation rejected");
		Err(AccessError::PrivilegeEscalationDenied { user_id, denied })
	}
}
