// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Custom role administration.
//!
//! Owners mint roles at runtime. A custom role may never carry a right its
//! creator lacks: the requested grants (plus anything inherited from a parent
//! template) are diffed against the creator's effective rights and the whole
//! request is rejected if anything is left over. Every operation runs in one
//! transaction.

use keyhold_server_auth::{
	check_escalation, AccessContext, AccessError, Grantable, PageGrantRequest, PageGrantSet,
	PermissionName, PermissionSet, RoleId, SystemRole,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool};

use crate::error::DbError;
use crate::pool::begin_write;
use crate::role::{
	count_users_in, effective_role_page_grants_in, effective_role_permissions_in, get_role_in,
	insert_role_in, replace_grants_in, NewRole, Role,
};

/// Request to create a custom role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomRole {
	pub name: String,
	pub description: Option<String>,
	pub parent_role_id: Option<RoleId>,
	pub max_sub_roles: Option<i64>,
	#[serde(default)]
	pub pages: Vec<PageGrantRequest>,
	#[serde(default)]
	pub permissions: Vec<String>,
}

#[derive(Clone)]
pub struct CustomRoleService {
	pool: SqlitePool,
}

impl CustomRoleService {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a custom role owned by the actor.
	///
	/// # Errors
	/// - `InconsistentPermissionSet` if a page grant lacks `view`
	/// - `InvalidPermissionName` for a malformed permission
	/// - `RoleNameTaken` for a reserved or existing name
	/// - `ParentRoleNotFound` / `SubRoleLimitReached` for a bad template
	/// - `PrivilegeEscalationDenied` if anything exceeds the actor's rights
	#[tracing::instrument(skip(self, ctx, input), fields(user_id = %ctx.user_id(), name = %input.name))]
	pub async fn create_custom_role(
		&self,
		ctx: &AccessContext,
		input: CreateCustomRole,
	) -> Result<Role, DbError> {
		let pages = PageGrantSet::from_requests(&input.pages)?;
		let permissions = parse_permissions(&input.permissions)?;

		if SystemRole::is_reserved_name(&input.name) {
			return Err(AccessError::RoleNameTaken { name: input.name }.into());
		}

		let mut tx = begin_write(&self.pool).await?;

		let (mut inherited_permissions, mut inherited_pages) = match input.parent_role_id {
			Some(parent) => {
				if get_role_in(&mut tx, parent).await?.is_none() {
					return Err(AccessError::ParentRoleNotFound { role_id: parent }.into());
				}
				(
					effective_role_permissions_in(&mut tx, parent).await?,
					effective_role_page_grants_in(&mut tx, parent).await?,
				)
			}
			None => (PermissionSet::new(), PageGrantSet::new()),
		};
		inherited_permissions.extend(&permissions);
		inherited_pages.extend(&pages);
		check_escalation(
			ctx.user_id(),
			&inherited_permissions,
			&inherited_pages,
			&Grantable::from_context(ctx),
		)?;

		let role = insert_role_in(
			&mut tx,
			&NewRole {
				name: &input.name,
				description: input.description.as_deref(),
				created_by: Some(ctx.user_id()),
				parent_role_id: input.parent_role_id,
				max_sub_roles: input.max_sub_roles,
				is_system: false,
			},
		)
		.await?;
		replace_grants_in(&mut tx, role.id, &permissions, &pages).await?;
		tx.commit().await?;

		tracing::info!(
			role_id = %role.id,
			permissions = permissions.len(),
			pages = pages.len(),
			"custom role created"
		);
		Ok(role)
	}

	/// Replace every grant of a custom role.
	#[tracing::instrument(skip(self, ctx, pages, permissions), fields(user_id = %ctx.user_id(), role_id = %role_id))]
	pub async fn update_role_permissions(
		&self,
		ctx: &AccessContext,
		role_id: RoleId,
		pages: &[PageGrantRequest],
		permissions: &[String],
	) -> Result<Role, DbError> {
		let pages = PageGrantSet::from_requests(pages)?;
		let permissions = parse_permissions(permissions)?;

		let mut tx = begin_write(&self.pool).await?;
		let role = load_editable(&mut tx, ctx, role_id, "roles.update").await?;

		let (mut requested_permissions, mut requested_pages) = match role.parent_role_id {
			Some(parent) => (
				effective_role_permissions_in(&mut tx, parent).await?,
				effective_role_page_grants_in(&mut tx, parent).await?,
			),
			None => (PermissionSet::new(), PageGrantSet::new()),
		};
		requested_permissions.extend(&permissions);
		requested_pages.extend(&pages);
		check_escalation(
			ctx.user_id(),
			&requested_permissions,
			&requested_pages,
			&Grantable::from_context(ctx),
		)?;

		replace_grants_in(&mut tx, role_id, &permissions, &pages).await?;
		let updated = get_role_in(&mut tx, role_id)
			.await?
			.ok_or(AccessError::RoleNotFound { role_id })?;
		tx.commit().await?;

		tracing::info!(role_id = %role_id, "custom role grants replaced");
		Ok(updated)
	}

	/// Delete a custom role, moving its holders to `reassign_to` first.
	///
	/// # Errors
	/// - `RoleInUse` if users hold the role and no fallback is given, or if
	///   other roles use it as their parent template
	/// - `RoleNotFound` if the role or the fallback does not exist
	/// - `PrivilegeEscalationDenied` if the fallback exceeds the actor's rights
	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id(), role_id = %role_id))]
	pub async fn delete_custom_role(
		&self,
		ctx: &AccessContext,
		role_id: RoleId,
		reassign_to: Option<RoleId>,
	) -> Result<(), DbError> {
		let mut tx = begin_write(&self.pool).await?;
		load_editable(&mut tx, ctx, role_id, "roles.delete").await?;

		let child_roles: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE parent_role_id = ?")
				.bind(role_id.into_inner())
				.fetch_one(&mut *tx)
				.await?;
		let user_count = count_users_in(&mut tx, role_id).await?;

		let in_use = AccessError::RoleInUse {
			role_id,
			user_count,
			child_roles,
		};
		if child_roles > 0 {
			return Err(in_use.into());
		}

		match reassign_to {
			None if user_count > 0 => return Err(in_use.into()),
			None => {}
			Some(fallback) if fallback == role_id => return Err(in_use.into()),
			Some(fallback) => {
				reassignment_allowed(&mut tx, ctx, fallback).await?;
				let moved = sqlx::query(
					r#"
					INSERT OR IGNORE INTO user_roles (user_id, role_id)
					SELECT user_id, ? FROM user_roles WHERE role_id = ?
					"#,
				)
				.bind(fallback.into_inner())
				.bind(role_id.into_inner())
				.execute(&mut *tx)
				.await?;
				tracing::debug!(fallback = %fallback, moved = moved.rows_affected(), "holders reassigned");
			}
		}

		sqlx::query("DELETE FROM roles WHERE id = ?")
			.bind(role_id.into_inner())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::info!(role_id = %role_id, user_count, "custom role deleted");
		Ok(())
	}
}

fn parse_permissions(names: &[String]) -> Result<PermissionSet, AccessError> {
	names
		.iter()
		.map(|name| PermissionName::parse(name).map(|p| p.to_string()))
		.collect()
}

/// Loads a role the actor may change: custom, and created by the actor
/// unless the actor is an admin.
async fn load_editable(
	conn: &mut SqliteConnection,
	ctx: &AccessContext,
	role_id: RoleId,
	permission: &str,
) -> Result<Role, DbError> {
	let role = get_role_in(conn, role_id)
		.await?
		.ok_or(AccessError::RoleNotFound { role_id })?;

	if role.is_system {
		return Err(AccessError::SystemRoleImmutable { role_id }.into());
	}
	if !ctx.is_admin() && role.created_by != Some(ctx.user_id()) {
		tracing::debug!(created_by = ?role.created_by, "actor does not own role");
		return Err(AccessError::PermissionDenied {
			user_id: ctx.user_id(),
			permission: permission.to_string(),
		}
		.into());
	}
	Ok(role)
}

async fn reassignment_allowed(
	conn: &mut SqliteConnection,
	ctx: &AccessContext,
	fallback: RoleId,
) -> Result<(), DbError> {
	if get_role_in(conn, fallback).await?.is_none() {
		return Err(AccessError::RoleNotFound { role_id: fallback }.into());
	}
	let permissions = effective_role_permissions_in(conn, fallback).await?;
	let pages = effective_role_page_grants_in(conn, fallback).await?;
	check_escalation(
		ctx.user_id(),
		&permissions,
		&pages,
		&Grantable::from_context(ctx),
	)?;
	Ok(())
}
