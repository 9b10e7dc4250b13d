// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-level grants controlling sidebar navigation.
//!
//! A page grant without `view` is meaningless, so every grant set is kept
//! consistent: requesting `create`/`update`/`delete`/`manage` without `view`
//! is rejected, and revoking `view` revokes everything else on that page.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;
use crate::types::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAction {
	View,
	Create,
	Update,
	Delete,
	Manage,
}

impl PageAction {
	pub fn all() -> &'static [PageAction] {
		&[
			PageAction::View,
			PageAction::Create,
			PageAction::Update,
			PageAction::Delete,
			PageAction::Manage,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PageAction::View => "view",
			PageAction::Create => "create",
			PageAction::Update => "update",
			PageAction::Delete => "delete",
			PageAction::Manage => "manage",
		}
	}
}

impl fmt::Display for PageAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PageAction {
	type Err = AccessError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		PageAction::all()
			.iter()
			.copied()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| AccessError::InvalidPermissionName(format!("page action {s}")))
	}
}

/// Requested flags for one page, as submitted by a role editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGrantRequest {
	pub page_id: PageId,
	#[serde(default)]
	pub view: bool,
	#[serde(default)]
	pub create: bool,
	#[serde(default)]
	pub update: bool,
	#[serde(default)]
	pub delete: bool,
	#[serde(default)]
	pub manage: bool,
}

impl PageGrantRequest {
	pub fn view_only(page_id: PageId) -> Self {
		Self {
			page_id,
			view: true,
			..Default::default()
		}
	}

	pub fn full(page_id: PageId) -> Self {
		Self {
			page_id,
			view: true,
			create: true,
			update: true,
			delete: true,
			manage: true,
		}
	}

	fn flag(&self, action: PageAction) -> bool {
		match action {
			PageAction::View => self.view,
			PageAction::Create => self.create,
			PageAction::Update => self.update,
			PageAction::Delete => self.delete,
			PageAction::Manage => self.manage,
		}
	}

	/// Actions set to true, in declaration order.
	pub fn granted_actions(&self) -> Vec<PageAction> {
		PageAction::all()
			.iter()
			.copied()
			.filter(|a| self.flag(*a))
			.collect()
	}

	/// Fails with `InconsistentPermissionSet` if any non-view flag is set
	/// while `view` is not.
	pub fn validate(&self) -> Result<(), AccessError> {
		if self.view {
			return Ok(());
		}
		let orphaned: Vec<String> = self
			.granted_actions()
			.into_iter()
			.map(|a| a.as_str().to_string())
			.collect();
		if orphaned.is_empty() {
			Ok(())
		} else {
			Err(AccessError::InconsistentPermissionSet {
				page_id: self.page_id,
				actions: orphaned,
			})
		}
	}

	fn merge(&mut self, other: &PageGrantRequest) {
		self.view |= other.view;
		self.create |= other.create;
		self.update |= other.update;
		self.delete |= other.delete;
		self.manage |= other.manage;
	}
}

/// A single granted `(page, action)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageGrant {
	pub page_id: PageId,
	pub action: PageAction,
}

impl PageGrant {
	pub fn new(page_id: PageId, action: PageAction) -> Self {
		Self { page_id, action }
	}
}

impl fmt::Display for PageGrant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "page:{}.{}", self.page_id, self.action)
	}
}

/// The consistent set of page grants held by a role or an actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGrantSet(BTreeSet<PageGrant>);

impl PageGrantSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a grant set from editor requests, merging repeated pages.
	///
	/// Validation runs on the merged flags, so `[{view}, {update}]` for the
	/// same page is accepted while `[{update}]` alone is not.
	pub fn from_requests(requests: &[PageGrantRequest]) -> Result<Self, AccessError> {
		let mut merged: BTreeMap<PageId, PageGrantRequest> = BTreeMap::new();
		for request in requests {
			merged
				.entry(request.page_id)
				.and_modify(|m| m.merge(request))
				.or_insert(*request);
		}

		let mut set = PageGrantSet::new();
		for request in merged.values() {
			request.validate()?;
			for action in request.granted_actions() {
				set.0.insert(PageGrant::new(request.page_id, action));
			}
		}
		Ok(set)
	}

	pub fn contains(&self, page_id: PageId, action: PageAction) -> bool {
		self.0.contains(&PageGrant::new(page_id, action))
	}

	pub fn insert(&mut self, grant: PageGrant) -> bool {
		self.0.insert(grant)
	}

	pub fn extend(&mut self, other: &PageGrantSet) {
		self.0.extend(other.0.iter().copied());
	}

	/// Removes a grant. Revoking `view` removes every action on the page.
	pub fn revoke(&mut self, page_id: PageId, action: PageAction) {
		if action == PageAction::View {
			self.0.retain(|g| g.page_id != page_id);
		} else {
			self.0.remove(&PageGrant::new(page_id, action));
		}
	}

	/// Pages on which `view` is granted.
	pub fn viewable_pages(&self) -> BTreeSet<PageId> {
		self
			.0
			.iter()
			.filter(|g| g.action == PageAction::View)
			.map(|g| g.page_id)
			.collect()
	}

	/// Actions granted on a single page.
	pub fn actions_for(&self, page_id: PageId) -> Vec<PageAction> {
		self
			.0
			.iter()
			.filter(|g| g.page_id == page_id)
			.map(|g| g.action)
			.collect()
	}

	pub fn iter(&self) -> impl Iterator<Item = &PageGrant> {
		self.0.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Grants in `self` that are missing from `other`.
	pub fn difference<'a>(&'a self, other: &'a PageGrantSet) -> impl Iterator<Item = &'a PageGrant> {
		self.0.difference(&other.0)
	}
}

impl FromIterator<PageGrant> for PageGrantSet {
	fn from_iter<I: IntoIterator<Item = PageGrant>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// A sidebar entry the actor may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
	pub id: PageId,
	pub slug: String,
	pub title: String,
	pub path: String,
	pub parent_id: Option<PageId>,
	pub sort_order: i64,
	/// Actions the actor holds on this page; always includes `view`.
	pub actions: Vec<PageAction>,
}
