// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authorization.
//!
//! - **ID newtypes**: Type-safe wrappers around the integer primary keys of the
//!   relational schema ([`UserId`], [`RoleId`], [`BuildingId`], etc.) so a tenant
//!   id can never be passed where a building id is expected
//! - **System roles**: the seeded, immutable roles ([`SystemRole`])
//! - **Principal**: the [`AuthenticatedUser`] handed over by the authentication layer
//!
//! All ID types serialize transparently as integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			/// Create a new ID from a raw primary key.
			pub const fn new(id: i64) -> Self {
				Self(id)
			}

			/// Get the inner primary key value.
			pub const fn into_inner(self) -> i64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user account.");
define_id_type!(RoleId, "Unique identifier for a role (system or custom).");
define_id_type!(PermissionId, "Unique identifier for a catalog permission.");
define_id_type!(PageId, "Unique identifier for a sidebar page.");
define_id_type!(BuildingId, "Unique identifier for a building.");
define_id_type!(VillaId, "Unique identifier for a villa.");
define_id_type!(FloorId, "Unique identifier for a floor of a building.");
define_id_type!(ApartmentId, "Unique identifier for an apartment on a floor.");
define_id_type!(TenantId, "Unique identifier for a tenant.");
define_id_type!(TransactionId, "Unique identifier for a financial transaction.");

// =============================================================================
// System Roles
// =============================================================================

/// Roles seeded with the database. They cannot be edited or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
	/// Unrestricted access to every resource and scope.
	Admin,
	/// Landlord; sees what they created or were assigned.
	Owner,
	Manager,
	Staff,
	Maintenance,
	Security,
}

impl SystemRole {
	/// Returns all system roles in seeding order.
	pub fn all() -> &'static [SystemRole] {
		&[
			SystemRole::Admin,
			SystemRole::Owner,
			SystemRole::Manager,
			SystemRole::Staff,
			SystemRole::Maintenance,
			SystemRole::Security,
		]
	}

	/// The unique role name stored in the `roles` table.
	pub fn as_str(&self) -> &'static str {
		match self {
			SystemRole::Admin => "admin",
			SystemRole::Owner => "owner",
			SystemRole::Manager => "manager",
			SystemRole::Staff => "staff",
			SystemRole::Maintenance => "maintenance",
			SystemRole::Security => "security",
		}
	}

	/// Human readable description used when seeding.
	pub fn description(&self) -> &'static str {
		match self {
			SystemRole::Admin => "Full system access",
			SystemRole::Owner => "Property owner; manages their own portfolio",
			SystemRole::Manager => "Manages day-to-day operations of assigned properties",
			SystemRole::Staff => "Read access to property records",
			SystemRole::Maintenance => "Maintenance crew with apartment access",
			SystemRole::Security => "Security staff with tenant lookup",
		}
	}

	/// Returns true if `name` is reserved for a system role, ignoring case.
	pub fn is_reserved_name(name: &str) -> bool {
		let name = name.trim();
		SystemRole::all()
			.iter()
			.any(|r| r.as_str().eq_ignore_ascii_case(name))
	}
}

impl fmt::Display for SystemRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SystemRole {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		SystemRole::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or(())
	}
}

// =============================================================================
// Principal
// =============================================================================

/// The principal resolved by the authentication layer before authorization runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
	pub user_id: UserId,
	/// Admin flag carried on the user record itself.
	pub is_admin: bool,
}

impl AuthenticatedUser {
	pub fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			is_admin: false,
		}
	}

	pub fn admin(user_id: UserId) -> Self {
		Self {
			user_id,
			is_admin: true,
		}
	}
}
