// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Keyhold access control.
//!
//! Repositories own a [`SqlitePool`](sqlx::SqlitePool) and expose async
//! methods; multi-statement writes run in a single transaction.

pub mod catalog;
pub mod custom_role;
pub mod decision;
pub mod error;
pub mod identity;
pub mod ownership;
pub mod page;
pub mod pool;
pub mod role;
pub mod testing;

pub use catalog::{Permission, PermissionRepository};
pub use custom_role::{CreateCustomRole, CustomRoleService};
pub use decision::AccessDecisionPoint;
pub use error::{DbError, Result};
pub use identity::IdentityResolver;
pub use ownership::{ScopeCalculator, ScopeStore};
pub use page::PageRepository;
pub use pool::{create_pool, run_migrations};
pub use role::{NewRole, Role, RoleRepository, RoleStore};
