// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role store repository.
//!
//! This module provides database access for:
//! - System roles (seeded, immutable) and custom roles (owner-created)
//! - Role → permission grants
//! - Role → page grants
//! - User → role assignments
//! - Effective permissions resolved through parent templates
//!
//! Every grant is an idempotent upsert so multi-statement administrative
//! writes can be retried to completion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyhold_server_auth::permission::system_role_grants;
use keyhold_server_auth::{
	AccessError, PageAction, PageGrant, PageGrantSet, PageId, PermissionSet, RoleId, SystemRole,
	UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;

use crate::catalog::register_in;
use crate::error::DbError;
use crate::pool::begin_write;

/// Maximum parent-template depth followed when resolving effective rights.
pub const MAX_TEMPLATE_DEPTH: i64 = 10;

/// A system or custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub name: String,
	pub description: Option<String>,
	pub is_system: bool,
	/// Set only for custom roles.
	pub created_by: Option<UserId>,
	pub parent_role_id: Option<RoleId>,
	pub max_sub_roles: Option<i64>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Role {
	pub fn is_custom(&self) -> bool {
		!self.is_system
	}
}

/// Fields for a new role row.
#[derive(Debug, Clone, Default)]
pub struct NewRole<'a> {
	pub name: &'a str,
	pub description: Option<&'a str>,
	pub created_by: Option<UserId>,
	pub parent_role_id: Option<RoleId>,
	pub max_sub_roles: Option<i64>,
	pub is_system: bool,
}

#[async_trait]
pub trait RoleStore: Send + Sync {
	async fn create_role(&self, role: NewRole<'_>) -> Result<Role, DbError>;
	async fn get_role(&self, id: RoleId) -> Result<Option<Role>, DbError>;
	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError>;
	async fn list_roles_created_by(&self, user_id: UserId) -> Result<Vec<Role>, DbError>;
	async fn grant_permission(&self, role_id: RoleId, permission: &str) -> Result<(), DbError>;
	async fn revoke_permission(&self, role_id: RoleId, permission: &str) -> Result<bool, DbError>;
	async fn grant_page(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<(), DbError>;
	async fn revoke_page_action(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<u64, DbError>;
	async fn role_permissions(&self, role_id: RoleId) -> Result<PermissionSet, DbError>;
	async fn role_page_grants(&self, role_id: RoleId) -> Result<PageGrantSet, DbError>;
	async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, DbError>;
	async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), DbError>;
	async fn unassign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, DbError>;
	async fn effective_permissions(&self, user_id: UserId) -> Result<PermissionSet, DbError>;
	async fn effective_page_grants(&self, user_id: UserId) -> Result<PageGrantSet, DbError>;
}

/// Repository for role database operations.
#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
}

impl RoleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[cfg(test)]
	pub(crate) fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	// =========================================================================
	// Roles
	// =========================================================================

	/// Create a role.
	///
	/// # Errors
	/// - `RoleNameTaken` if the name exists (including a concurrent insert)
	/// - `ParentRoleNotFound` if `parent_role_id` does not exist
	/// - `SubRoleLimitReached` if the parent's `max_sub_roles` is exhausted
	#[tracing::instrument(skip(self, role), fields(name = %role.name, created_by = ?role.created_by))]
	pub async fn create_role(&self, role: NewRole<'_>) -> Result<Role, DbError> {
		let mut tx = begin_write(&self.pool).await?;
		let created = insert_role_in(&mut tx, &role).await?;
		tx.commit().await?;

		tracing::info!(role_id = %created.id, name = %created.name, "role created");
		Ok(created)
	}

	#[tracing::instrument(skip(self), fields(role_id = %id))]
	pub async fn get_role(&self, id: RoleId) -> Result<Option<Role>, DbError> {
		let mut conn = self.pool.acquire().await?;
		get_role_in(&mut conn, id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(&format!("{ROLE_SELECT} WHERE name = ?"))
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_role(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_roles_created_by(&self, user_id: UserId) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query(&format!("{ROLE_SELECT} WHERE created_by = ? ORDER BY id"))
			.bind(user_id.into_inner())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_role).collect()
	}

	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn count_users_with_role(&self, role_id: RoleId) -> Result<i64, DbError> {
		let mut conn = self.pool.acquire().await?;
		count_users_in(&mut conn, role_id).await
	}

	// =========================================================================
	// Permission grants
	// =========================================================================

	/// Grant a catalog permission to a role. Repeat grants are no-ops.
	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn grant_permission(&self, role_id: RoleId, permission: &str) -> Result<(), DbError> {
		let mut conn = self.pool.acquire().await?;
		grant_permission_in(&mut conn, role_id, permission).await
	}

	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn revoke_permission(&self, role_id: RoleId, permission: &str) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM role_permissions
			WHERE role_id = ?
			  AND permission_id = (SELECT id FROM permissions WHERE name = ?)
			"#,
		)
		.bind(role_id.into_inner())
		.bind(permission)
		.execute(&self.pool)
		.await?;

		tracing::debug!(role_id = %role_id, permission, "permission revoked");
		Ok(result.rows_affected() > 0)
	}

	/// The role's own grants, not including its templates.
	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn role_permissions(&self, role_id: RoleId) -> Result<PermissionSet, DbError> {
		let names: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT p.name
			FROM role_permissions rp
			JOIN permissions p ON p.id = rp.permission_id
			WHERE rp.role_id = ?
			"#,
		)
		.bind(role_id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		Ok(names.into_iter().collect())
	}

	// =========================================================================
	// Page grants
	// =========================================================================

	/// Grant a page action. Non-view actions require view on the same page.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, page_id = %page_id, action = %action))]
	pub async fn grant_page(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<(), DbError> {
		let mut conn = self.pool.acquire().await?;
		grant_page_in(&mut conn, role_id, PageGrant::new(page_id, action)).await
	}

	/// Revoke a page action. Revoking `view` revokes every action on the page.
	///
	/// Returns the number of grants removed.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, page_id = %page_id, action = %action))]
	pub async fn revoke_page_action(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<u64, DbError> {
		let result = if action == PageAction::View {
			sqlx::query(
				r#"
				DELETE FROM role_page_permissions
				WHERE role_id = ?
				  AND page_permission_id IN (SELECT id FROM page_permissions WHERE page_id = ?)
				"#,
			)
			.bind(role_id.into_inner())
			.bind(page_id.into_inner())
			.execute(&self.pool)
			.await?
		} else {
			sqlx::query(
				r#"
				DELETE FROM role_page_permissions
				WHERE role_id = ?
				  AND page_permission_id IN (
					SELECT id FROM page_permissions WHERE page_id = ? AND permission_type = ?
				  )
				"#,
			)
			.bind(role_id.into_inner())
			.bind(page_id.into_inner())
			.bind(action.as_str())
			.execute(&self.pool)
			.await?
		};

		tracing::debug!(removed = result.rows_affected(), "page grant revoked");
		Ok(result.rows_affected())
	}

	/// The role's own page grants, not including its templates.
	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn role_page_grants(&self, role_id: RoleId) -> Result<PageGrantSet, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT pp.page_id, pp.permission_type
			FROM role_page_permissions rpp
			JOIN page_permissions pp ON pp.id = rpp.page_permission_id
			WHERE rpp.role_id = ? AND rpp.is_granted = 1
			"#,
		)
		.bind(role_id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_page_grant).collect()
	}

	// =========================================================================
	// Assignments
	// =========================================================================

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT r.id, r.name, r.description, r.is_system, r.created_by, r.parent_role_id,
			       r.max_sub_roles, r.created_at, r.updated_at
			FROM user_roles ur
			JOIN roles r ON r.id = ur.role_id
			WHERE ur.user_id = ?
			ORDER BY r.id
			"#,
		)
		.bind(user_id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_role).collect()
	}

	/// Assign a role to a user. Repeat assignments are no-ops.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, role_id = %role_id))]
	pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), DbError> {
		let mut conn = self.pool.acquire().await?;
		if get_role_in(&mut conn, role_id).await?.is_none() {
			return Err(AccessError::RoleNotFound { role_id }.into());
		}
		sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
			.bind(user_id.into_inner())
			.bind(role_id.into_inner())
			.execute(&mut *conn)
			.await?;

		tracing::debug!("role assigned");
		Ok(())
	}

	/// Remove a role from a user. Refuses to remove the user's last role.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, role_id = %role_id))]
	pub async fn unassign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, DbError> {
		let mut tx = begin_write(&self.pool).await?;
		let held: Vec<i64> = sqlx::query_scalar("SELECT role_id FROM user_roles WHERE user_id = ?")
			.bind(user_id.into_inner())
			.fetch_all(&mut *tx)
			.await?;

		if !held.contains(&role_id.into_inner()) {
			return Ok(false);
		}
		if held.len() == 1 {
			return Err(DbError::Conflict(format!(
				"user {user_id} would be left without any role"
			)));
		}

		sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
			.bind(user_id.into_inner())
			.bind(role_id.into_inner())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!("role unassigned");
		Ok(true)
	}

	// =========================================================================
	// Effective rights
	// =========================================================================

	/// Union of permissions over every role the user holds and their templates.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn effective_permissions(&self, user_id: UserId) -> Result<PermissionSet, DbError> {
		let sql = format!("{USER_CHAIN} {PERMISSIONS_OVER_CHAIN}");
		let names: Vec<String> = sqlx::query_scalar(&sql)
			.bind(user_id.into_inner())
			.bind(MAX_TEMPLATE_DEPTH)
			.fetch_all(&self.pool)
			.await?;

		Ok(names.into_iter().collect())
	}

	/// Union of page grants over every role the user holds and their templates.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn effective_page_grants(&self, user_id: UserId) -> Result<PageGrantSet, DbError> {
		let sql = format!("{USER_CHAIN} {PAGES_OVER_CHAIN}");
		let rows = sqlx::query(&sql)
			.bind(user_id.into_inner())
			.bind(MAX_TEMPLATE_DEPTH)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_page_grant).collect()
	}

	/// Permissions of a single role including its templates.
	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn effective_role_permissions(&self, role_id: RoleId) -> Result<PermissionSet, DbError> {
		let mut conn = self.pool.acquire().await?;
		effective_role_permissions_in(&mut conn, role_id).await
	}

	/// Page grants of a single role including its templates.
	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn effective_role_page_grants(&self, role_id: RoleId) -> Result<PageGrantSet, DbError> {
		let mut conn = self.pool.acquire().await?;
		effective_role_page_grants_in(&mut conn, role_id).await
	}

	// =========================================================================
	// Seeding
	// =========================================================================

	/// Insert the system roles and their default grants. Safe to re-run.
	#[tracing::instrument(skip(self))]
	pub async fn seed_system_roles(&self) -> Result<Vec<Role>, DbError> {
		let mut tx = begin_write(&self.pool).await?;
		let now = Utc::now().to_rfc3339();
		let mut seeded = Vec::new();

		for system in SystemRole::all() {
			sqlx::query(
				r#"
				INSERT INTO roles (name, description, is_system, created_at, updated_at)
				VALUES (?, ?, 1, ?, ?)
				ON CONFLICT(name) DO NOTHING
				"#,
			)
			.bind(system.as_str())
			.bind(system.description())
			.bind(&now)
			.bind(&now)
			.execute(&mut *tx)
			.await?;

			let row = sqlx::query(&format!("{ROLE_SELECT} WHERE name = ?"))
				.bind(system.as_str())
				.fetch_one(&mut *tx)
				.await?;
			let role = row_to_role(&row)?;

			for grant in system_role_grants(*system) {
				let name = grant.to_string();
				let description = format!("{} {}", grant.action, grant.resource);
				register_in(&mut tx, &name, &grant.resource, grant.action, Some(description.as_str()))
					.await?;
				grant_permission_in(&mut tx, role.id, &name).await?;
			}
			seeded.push(role);
		}

		tx.commit().await?;
		tracing::info!(count = seeded.len(), "system roles seeded");
		Ok(seeded)
	}
}

#[async_trait]
impl RoleStore for RoleRepository {
	async fn create_role(&self, role: NewRole<'_>) -> Result<Role, DbError> {
		self.create_role(role).await
	}

	async fn get_role(&self, id: RoleId) -> Result<Option<Role>, DbError> {
		self.get_role(id).await
	}

	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
		self.get_role_by_name(name).await
	}

	async fn list_roles_created_by(&self, user_id: UserId) -> Result<Vec<Role>, DbError> {
		self.list_roles_created_by(user_id).await
	}

	async fn grant_permission(&self, role_id: RoleId, permission: &str) -> Result<(), DbError> {
		self.grant_permission(role_id, permission).await
	}

	async fn revoke_permission(&self, role_id: RoleId, permission: &str) -> Result<bool, DbError> {
		self.revoke_permission(role_id, permission).await
	}

	async fn grant_page(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<(), DbError> {
		self.grant_page(role_id, page_id, action).await
	}

	async fn revoke_page_action(
		&self,
		role_id: RoleId,
		page_id: PageId,
		action: PageAction,
	) -> Result<u64, DbError> {
		self.revoke_page_action(role_id, page_id, action).await
	}

	async fn role_permissions(&self, role_id: RoleId) -> Result<PermissionSet, DbError> {
		self.role_permissions(role_id).await
	}

	async fn role_page_grants(&self, role_id: RoleId) -> Result<PageGrantSet, DbError> {
		self.role_page_grants(role_id).await
	}

	async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<Role>, DbError> {
		self.roles_for_user(user_id).await
	}

	async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), DbError> {
		self.assign_role(user_id, role_id).await
	}

	async fn unassign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, DbError> {
		self.unassign_role(user_id, role_id).await
	}

	async fn effective_permissions(&self, user_id: UserId) -> Result<PermissionSet, DbError> {
		self.effective_permissions(user_id).await
	}

	async fn effective_page_grants(&self, user_id: UserId) -> Result<PageGrantSet, DbError> {
		self.effective_page_grants(user_id).await
	}
}

// =============================================================================
// SQL
// =============================================================================

const ROLE_SELECT: &str = r#"
	SELECT id, name, description, is_system, created_by, parent_role_id,
	       max_sub_roles, created_at, updated_at
	FROM roles
"#;

/// Roles held by a user plus their template ancestors. Binds: user id, max depth.
const USER_CHAIN: &str = r#"
	WITH RECURSIVE chain(role_id, depth) AS (
		SELECT role_id, 0 FROM user_roles WHERE user_id = ?1
		UNION
		SELECT r.parent_role_id, c.depth + 1
		FROM roles r
		JOIN chain c ON r.id = c.role_id
		WHERE r.parent_role_id IS NOT NULL AND c.depth < ?2
	)
"#;

/// A single role plus its template ancestors. Binds: role id, max depth.
const ROLE_CHAIN: &str = r#"
	WITH RECURSIVE chain(role_id, depth) AS (
		SELECT ?1, 0
		UNION
		SELECT r.parent_role_id, c.depth + 1
		FROM roles r
		JOIN chain c ON r.id = c.role_id
		WHERE r.parent_role_id IS NOT NULL AND c.depth < ?2
	)
"#;

const PERMISSIONS_OVER_CHAIN: &str = r#"
	SELECT DISTINCT p.name
	FROM chain c
	JOIN role_permissions rp ON rp.role_id = c.role_id
	JOIN permissions p ON p.id = rp.permission_id
"#;

const PAGES_OVER_CHAIN: &str = r#"
	SELECT DISTINCT pp.page_id, pp.permission_type
	FROM chain c
	JOIN role_page_permissions rpp ON rpp.role_id = c.role_id AND rpp.is_granted = 1
	JOIN page_permissions pp ON pp.id = rpp.page_permission_id
"#;

// =============================================================================
// Connection-level helpers shared with the custom-role service
// =============================================================================

pub(crate) async fn get_role_in(
	conn: &mut SqliteConnection,
	id: RoleId,
) -> Result<Option<Role>, DbError> {
	let row = sqlx::query(&format!("{ROLE_SELECT} WHERE id = ?"))
		.bind(id.into_inner())
		.fetch_optional(&mut *conn)
		.await?;

	row.map(|r| row_to_role(&r)).transpose()
}

pub(crate) async fn insert_role_in(
	conn: &mut SqliteConnection,
	role: &NewRole<'_>,
) -> Result<Role, DbError> {
	if let Some(parent_id) = role.parent_role_id {
		let parent = get_role_in(conn, parent_id)
			.await?
			.ok_or(AccessError::ParentRoleNotFound { role_id: parent_id })?;

		if let Some(limit) = parent.max_sub_roles {
			let children: i64 =
				sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE parent_role_id = ?")
					.bind(parent_id.into_inner())
					.fetch_one(&mut *conn)
					.await?;
			if children >= limit {
				return Err(AccessError::SubRoleLimitReached {
					parent_role_id: parent_id,
					limit,
				}
				.into());
			}
		}
	}

	let now = Utc::now().to_rfc3339();
	let result = sqlx::query(
		r#"
		INSERT INTO roles (name, description, is_system, created_by, parent_role_id, max_sub_roles, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(role.name)
	.bind(role.description)
	.bind(role.is_system as i32)
	.bind(role.created_by.map(UserId::into_inner))
	.bind(role.parent_role_id.map(RoleId::into_inner))
	.bind(role.max_sub_roles)
	.bind(&now)
	.bind(&now)
	.execute(&mut *conn)
	.await
	.map_err(|e| match e {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			DbError::Access(AccessError::RoleNameTaken {
				name: role.name.to_string(),
			})
		}
		_ => DbError::Sqlx(e),
	})?;

	let id = RoleId::new(result.last_insert_rowid());
	get_role_in(conn, id)
		.await?
		.ok_or_else(|| DbError::Internal(format!("role {id} vanished after insert")))
}

pub(crate) async fn grant_permission_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
	permission: &str,
) -> Result<(), DbError> {
	let permission_id: Option<i64> = sqlx::query_scalar("SELECT id FROM permissions WHERE name = ?")
		.bind(permission)
		.fetch_optional(&mut *conn)
		.await?;
	let permission_id =
		permission_id.ok_or_else(|| DbError::NotFound(format!("permission {permission}")))?;

	sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
		.bind(role_id.into_inner())
		.bind(permission_id)
		.execute(&mut *conn)
		.await?;

	tracing::debug!(role_id = %role_id, permission, "permission granted");
	Ok(())
}

pub(crate) async fn grant_page_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
	grant: PageGrant,
) -> Result<(), DbError> {
	let page: Option<i64> = sqlx::query_scalar("SELECT id FROM sidebar_pages WHERE id = ?")
		.bind(grant.page_id.into_inner())
		.fetch_optional(&mut *conn)
		.await?;
	if page.is_none() {
		return Err(DbError::NotFound(format!("page {}", grant.page_id)));
	}

	if grant.action != PageAction::View {
		let has_view: i64 = sqlx::query_scalar(
			r#"
			SELECT COUNT(*)
			FROM role_page_permissions rpp
			JOIN page_permissions pp ON pp.id = rpp.page_permission_id
			WHERE rpp.role_id = ? AND pp.page_id = ? AND pp.permission_type = 'view'
			  AND rpp.is_granted = 1
			"#,
		)
		.bind(role_id.into_inner())
		.bind(grant.page_id.into_inner())
		.fetch_one(&mut *conn)
		.await?;
		if has_view == 0 {
			return Err(AccessError::InconsistentPermissionSet {
				page_id: grant.page_id,
				actions: vec![grant.action.as_str().to_string()],
			}
			.into());
		}
	}

	sqlx::query("INSERT OR IGNORE INTO page_permissions (page_id, permission_type) VALUES (?, ?)")
		.bind(grant.page_id.into_inner())
		.bind(grant.action.as_str())
		.execute(&mut *conn)
		.await?;

	sqlx::query(
		r#"
		INSERT INTO role_page_permissions (role_id, page_permission_id, is_granted)
		SELECT ?, id, 1 FROM page_permissions WHERE page_id = ? AND permission_type = ?
		ON CONFLICT(role_id, page_permission_id) DO UPDATE SET is_granted = 1
		"#,
	)
	.bind(role_id.into_inner())
	.bind(grant.page_id.into_inner())
	.bind(grant.action.as_str())
	.execute(&mut *conn)
	.await?;

	tracing::debug!(role_id = %role_id, grant = %grant, "page granted");
	Ok(())
}

/// Replace every permission and page grant of a role.
pub(crate) async fn replace_grants_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
	permissions: &PermissionSet,
	pages: &PageGrantSet,
) -> Result<(), DbError> {
	sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
		.bind(role_id.into_inner())
		.execute(&mut *conn)
		.await?;
	sqlx::query("DELETE FROM role_page_permissions WHERE role_id = ?")
		.bind(role_id.into_inner())
		.execute(&mut *conn)
		.await?;

	for permission in permissions.iter() {
		grant_permission_in(conn, role_id, permission).await?;
	}
	// View sorts first within a page, so it is always in place before the
	// other actions that depend on it.
	for grant in pages.iter() {
		grant_page_in(conn, role_id, *grant).await?;
	}

	sqlx::query("UPDATE roles SET updated_at = ? WHERE id = ?")
		.bind(Utc::now().to_rfc3339())
		.bind(role_id.into_inner())
		.execute(&mut *conn)
		.await?;
	Ok(())
}

pub(crate) async fn count_users_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
) -> Result<i64, DbError> {
	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = ?")
		.bind(role_id.into_inner())
		.fetch_one(&mut *conn)
		.await?;
	Ok(count)
}

pub(crate) async fn effective_role_permissions_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
) -> Result<PermissionSet, DbError> {
	let sql = format!("{ROLE_CHAIN} {PERMISSIONS_OVER_CHAIN}");
	let names: Vec<String> = sqlx::query_scalar(&sql)
		.bind(role_id.into_inner())
		.bind(MAX_TEMPLATE_DEPTH)
		.fetch_all(&mut *conn)
		.await?;

	Ok(names.into_iter().collect())
}

pub(crate) async fn effective_role_page_grants_in(
	conn: &mut SqliteConnection,
	role_id: RoleId,
) -> Result<PageGrantSet, DbError> {
	let sql = format!("{ROLE_CHAIN} {PAGES_OVER_CHAIN}");
	let rows = sqlx::query(&sql)
		.bind(role_id.into_inner())
		.bind(MAX_TEMPLATE_DEPTH)
		.fetch_all(&mut *conn)
		.await?;

	rows.iter().map(row_to_page_grant).collect()
}

pub(crate) fn row_to_role(row: &SqliteRow) -> Result<Role, DbError> {
	let is_system: i32 = row.get("is_system");
	let created_by: Option<i64> = row.get("created_by");
	let parent_role_id: Option<i64> = row.get("parent_role_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Role {
		id: RoleId::new(row.get("id")),
		name: row.get("name"),
		description: row.get("description"),
		is_system: is_system != 0,
		created_by: created_by.map(UserId::new),
		parent_role_id: parent_role_id.map(RoleId::new),
		max_sub_roles: row.get("max_sub_roles"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

pub(crate) fn row_to_page_grant(row: &SqliteRow) -> Result<PageGrant, DbError> {
	let page_id: i64 = row.get("page_id");
	let action: String = row.get("permission_type");
	let action = action
		.parse::<PageAction>()
		.map_err(|e| DbError::Internal(format!("Invalid page action: {e}")))?;
	Ok(PageGrant::new(PageId::new(page_id), action))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}
