// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission names of the form `<resource>.<action>`.
//!
//! The catalog is closed-world: a permission that was never granted is denied.
//! [`builtin_catalog`] and [`system_role_grants`] describe what gets seeded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;
use crate::types::SystemRole;

/// The action half of a permission name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
	View,
	ViewOwn,
	Create,
	Update,
	UpdateOwn,
	Delete,
	DeleteOwn,
	Manage,
}

impl PermissionAction {
	pub fn all() -> &'static [PermissionAction] {
		&[
			PermissionAction::View,
			PermissionAction::ViewOwn,
			PermissionAction::Create,
			PermissionAction::Update,
			PermissionAction::UpdateOwn,
			PermissionAction::Delete,
			PermissionAction::DeleteOwn,
			PermissionAction::Manage,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionAction::View => "view",
			PermissionAction::ViewOwn => "view_own",
			PermissionAction::Create => "create",
			PermissionAction::Update => "update",
			PermissionAction::UpdateOwn => "update_own",
			PermissionAction::Delete => "delete",
			PermissionAction::DeleteOwn => "delete_own",
			PermissionAction::Manage => "manage",
		}
	}

	/// The `_own` counterpart consulted when the unrestricted action is absent.
	///
	/// Only view, update and delete have one.
	pub fn own_variant(&self) -> Option<PermissionAction> {
		match self {
			PermissionAction::View => Some(PermissionAction::ViewOwn),
			PermissionAction::Update => Some(PermissionAction::UpdateOwn),
			PermissionAction::Delete => Some(PermissionAction::DeleteOwn),
			_ => None,
		}
	}
}

impl fmt::Display for PermissionAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PermissionAction {
	type Err = AccessError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PermissionAction::all()
			.iter()
			.copied()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| AccessError::InvalidPermissionName(s.to_string()))
	}
}

/// A parsed `<resource>.<action>` permission name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionName {
	pub resource: String,
	pub action: PermissionAction,
}

impl PermissionName {
	pub fn new(resource: impl Into<String>, action: PermissionAction) -> Self {
		Self {
			resource: resource.into(),
			action,
		}
	}

	/// Parses `tenants.view_own` style names. The resource must be a
	/// lowercase identifier and the action one of [`PermissionAction::all`].
	pub fn parse(name: &str) -> Result<Self, AccessError> {
		let invalid = || AccessError::InvalidPermissionName(name.to_string());
		let (resource, action) = name.split_once('.').ok_or_else(invalid)?;
		if !is_resource_ident(resource) {
			return Err(invalid());
		}
		let action = action.parse::<PermissionAction>().map_err(|_| invalid())?;
		Ok(Self::new(resource, action))
	}
}

impl fmt::Display for PermissionName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.resource, self.action)
	}
}

fn is_resource_ident(s: &str) -> bool {
	!s.is_empty()
		&& s
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// A set of permission names held by a role or an actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains(name)
	}

	pub fn insert(&mut self, name: impl Into<String>) -> bool {
		self.0.insert(name.into())
	}

	pub fn extend(&mut self, other: &PermissionSet) {
		self.0.extend(other.0.iter().cloned());
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Names in `self` that are not in `other`, in sorted order.
	pub fn difference<'a>(&'a self, other: &'a PermissionSet) -> impl Iterator<Item = &'a str> {
		self.0.difference(&other.0).map(String::as_str)
	}
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

// =============================================================================
// Built-in catalog
// =============================================================================

/// Resources that appear in the built-in catalog.
pub const CATALOG_RESOURCES: &[&str] = &[
	"buildings",
	"villas",
	"floors",
	"apartments",
	"tenants",
	"transactions",
	"users",
	"roles",
	"pages",
];

const PROPERTY_RESOURCES: &[&str] = &[
	"buildings",
	"villas",
	"floors",
	"apartments",
	"tenants",
	"transactions",
];

/// Every `resource × action` pair seeded into the permission catalog.
pub fn builtin_catalog() -> Vec<PermissionName> {
	CATALOG_RESOURCES
		.iter()
		.flat_map(|r| {
			PermissionAction::all()
				.iter()
				.map(move |a| PermissionName::new(*r, *a))
		})
		.collect()
}

/// Default grants for a system role. Admin is listed for completeness; the
/// access check short-circuits for admins regardless.
pub fn system_role_grants(role: SystemRole) -> Vec<PermissionName> {
	use PermissionAction::*;

	let on = |resources: &[&str], actions: &[PermissionAction]| -> Vec<PermissionName> {
		resources
			.iter()
			.flat_map(|r| actions.iter().map(move |a| PermissionName::new(*r, *a)))
			.collect()
	};

	match role {
		SystemRole::Admin => builtin_catalog(),
		SystemRole::Owner => {
			let mut grants = on(PROPERTY_RESOURCES, PermissionAction::all());
			grants.extend(on(&["users"], &[ViewOwn, Create, UpdateOwn]));
			grants.extend(on(&["roles"], PermissionAction::all()));
			grants.extend(on(&["pages"], &[View]));
			grants
		}
		SystemRole::Manager => {
			let mut grants = on(PROPERTY_RESOURCES, &[View, Create, Update]);
			grants.extend(on(&["pages"], &[View]));
			grants
		}
		SystemRole::Staff => on(PROPERTY_RESOURCES, &[View]),
		SystemRole::Maintenance => {
			let mut grants = on(&["buildings", "apartments"], &[View]);
			grants.extend(on(&["tenants"], &[ViewOwn]));
			grants
		}
		SystemRole::Security => on(&["buildings", "tenants"], &[View]),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn parses_resource_and_action() {
		let name = PermissionName::parse("tenants.view_own").unwrap();
		assert_eq!(name.resource, "tenants");
		assert_eq!(name.action, PermissionAction::ViewOwn);
		assert_eq!(name.to_string(), "tenants.view_own");
	}

	#[test]
	fn rejects_malformed_names() {
		for bad in ["tenants", ".view", "tenants.", "Tenants.view", "tenants.read", "a b.view"] {
			assert!(
				matches!(
					PermissionName::parse(bad),
					Err(AccessError::InvalidPermissionName(_))
				),
				"{bad} should be rejected"
			);
		}
	}

	#[test]
	fn own_variant_only_for_view_update_delete() {
		assert_eq!(
			PermissionAction::View.own_variant(),
			Some(PermissionAction::ViewOwn)
		);
		assert_eq!(
			PermissionAction::Update.own_variant(),
			Some(PermissionAction::UpdateOwn)
		);
		assert_eq!(
			PermissionAction::Delete.own_variant(),
			Some(PermissionAction::DeleteOwn)
		);
		assert_eq!(PermissionAction::Create.own_variant(), None);
		assert_eq!(PermissionAction::Manage.own_variant(), None);
		assert_eq!(PermissionAction::ViewOwn.own_variant(), None);
	}

	#[test]
	fn catalog_covers_every_resource_action_pair() {
		let catalog = builtin_catalog();
		assert_eq!(
			catalog.len(),
			CATALOG_RESOURCES.len() * PermissionAction::all().len()
		);
		assert!(catalog.contains(&PermissionName::new("tenants", PermissionAction::Delete)));
	}

	#[test]
	fn system_grants_stay_inside_catalog() {
		let catalog: BTreeSet<_> = builtin_catalog().into_iter().collect();
		for role in SystemRole::all() {
			for grant in system_role_grants(*role) {
				assert!(catalog.contains(&grant), "{grant} missing from catalog");
			}
		}
	}

	#[test]
	fn set_difference_is_sorted() {
		let a: PermissionSet = ["users.view", "tenants.delete", "tenants.view"].into_iter().collect();
		let b: PermissionSet = ["tenants.view"].into_iter().collect();
		let diff: Vec<_> = a.difference(&b).collect();
		assert_eq!(diff, vec!["tenants.delete", "users.view"]);
	}

	proptest! {
		#[test]
		fn unknown_actions_are_rejected(
			resource in "[a-z][a-z_]{0,15}",
			action in "[a-z_]{1,12}",
		) {
			let known = PermissionAction::all().iter().any(|a| a.as_str() == action);
			let parsed = PermissionName::parse(&format!("{resource}.{action}"));
			prop_assert_eq!(parsed.is_ok(), known);
		}
	}
}
