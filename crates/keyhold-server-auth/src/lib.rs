// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization and data-scoping primitives for Keyhold.
//!
//! This crate holds everything about an access decision that does not need
//! a database round-trip:
//!
//! - [`types`]: ID newtypes, system roles and the authenticated principal
//! - [`permission`]: `resource.action` permission names and sets
//! - [`page`]: sidebar page grants and their consistency rules
//! - [`access`]: the per-request [`AccessContext`] used for action gating
//! - [`escalation`]: the pure "requested ⊆ grantable" check for custom roles
//! - [`scope`]: ownership scopes and the per-family [`OwnershipSource`]
//! - [`query`]: the single place where a [`Scope`] becomes a SQL predicate
//!
//! Persistence lives in `keyhold-server-db`, which loads rows and builds an
//! [`AccessContext`] from them.

pub mod access;
pub mod error;
pub mod escalation;
pub mod page;
pub mod permission;
pub mod query;
pub mod scope;
pub mod types;

pub use access::{AccessContext, HeldRole};
pub use error::AccessError;
pub use escalation::{check_escalation, Grantable};
pub use page::{PageAction, PageDescriptor, PageGrant, PageGrantRequest, PageGrantSet};
pub use permission::{PermissionAction, PermissionName, PermissionSet};
pub use query::{inject_scope, Filter, FilterValue, SelectQuery};
pub use scope::{OwnershipConfig, OwnershipSource, ResourceType, Scope};
pub use types::{
	ApartmentId, AuthenticatedUser, BuildingId, FloorId, PageId, PermissionId, RoleId, SystemRole,
	TenantId, TransactionId, UserId, VillaId,
};
