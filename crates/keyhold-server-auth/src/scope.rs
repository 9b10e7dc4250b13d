// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ownership scopes.
//!
//! A [`Scope`] is the authoritative answer to "which rows of this resource
//! family may the actor touch". Only admins get [`Scope::Unrestricted`];
//! everyone else gets an explicit id set, which may be empty. An empty set
//! means "see nothing", never "see everything".

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;

/// Resource families that carry ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
	Buildings,
	Villas,
	Tenants,
	Transactions,
	/// Users the actor provisioned, plus the actor.
	Users,
}

impl ResourceType {
	pub fn all() -> &'static [ResourceType] {
		&[
			ResourceType::Buildings,
			ResourceType::Villas,
			ResourceType::Tenants,
			ResourceType::Transactions,
			ResourceType::Users,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceType::Buildings => "buildings",
			ResourceType::Villas => "villas",
			ResourceType::Tenants => "tenants",
			ResourceType::Transactions => "transactions",
			ResourceType::Users => "users",
		}
	}

	/// Backing table name.
	pub fn table(&self) -> &'static str {
		match self {
			ResourceType::Buildings => "buildings",
			ResourceType::Villas => "villas",
			ResourceType::Tenants => "tenants",
			ResourceType::Transactions => "financial_transactions",
			ResourceType::Users => "users",
		}
	}
}

impl fmt::Display for ResourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ResourceType {
	type Err = AccessError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ResourceType::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| AccessError::UnknownResourceType(s.to_string()))
	}
}

/// The set of rows an actor may access for one resource family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum Scope {
	Unrestricted,
	Ids(BTreeSet<i64>),
}

impl Scope {
	pub fn empty() -> Self {
		Scope::Ids(BTreeSet::new())
	}

	pub fn contains(&self, id: i64) -> bool {
		match self {
			Scope::Unrestricted => true,
			Scope::Ids(ids) => ids.contains(&id),
		}
	}

	/// True only for an explicit empty id set.
	pub fn is_empty(&self) -> bool {
		matches!(self, Scope::Ids(ids) if ids.is_empty())
	}

	pub fn is_unrestricted(&self) -> bool {
		matches!(self, Scope::Unrestricted)
	}

	/// The id set, or `None` when unrestricted.
	pub fn ids(&self) -> Option<&BTreeSet<i64>> {
		match self {
			Scope::Unrestricted => None,
			Scope::Ids(ids) => Some(ids),
		}
	}
}

impl FromIterator<i64> for Scope {
	fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
		Scope::Ids(iter.into_iter().collect())
	}
}

/// Which ownership mechanism counts for a resource family.
///
/// Buildings and villas have both a `created_by` column and a legacy
/// assignment table. The two are additive by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipSource {
	CreatedBy,
	Assigned,
	#[default]
	Both,
}

impl OwnershipSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			OwnershipSource::CreatedBy => "created_by",
			OwnershipSource::Assigned => "assigned",
			OwnershipSource::Both => "both",
		}
	}

	pub fn uses_created_by(&self) -> bool {
		matches!(self, OwnershipSource::CreatedBy | OwnershipSource::Both)
	}

	pub fn uses_assignments(&self) -> bool {
		matches!(self, OwnershipSource::Assigned | OwnershipSource::Both)
	}
}

impl fmt::Display for OwnershipSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OwnershipSource {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"created_by" => Ok(OwnershipSource::CreatedBy),
			"assigned" => Ok(OwnershipSource::Assigned),
			"both" => Ok(OwnershipSource::Both),
			other => Err(format!("unknown ownership source '{other}'")),
		}
	}
}

/// Ownership sources resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnershipConfig {
	pub buildings: OwnershipSource,
	pub villas: OwnershipSource,
}

impl OwnershipConfig {
	/// The source for families with a legacy assignment table. Families
	/// without one only ever own through `created_by`.
	pub fn source_for(&self, resource: ResourceType) -> OwnershipSource {
		match resource {
			ResourceType::Buildings => self.buildings,
			ResourceType::Villas => self.villas,
			_ => OwnershipSource::CreatedBy,
		}
	}
}
