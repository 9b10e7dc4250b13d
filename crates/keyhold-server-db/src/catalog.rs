// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission catalog repository.
//!
//! The catalog is the registry of `resource.action` names. Registration is an
//! idempotent upsert keyed by name, so seeding can be re-run after a crash.

use keyhold_server_auth::permission::builtin_catalog;
use keyhold_server_auth::{AccessError, PermissionAction, PermissionId, PermissionName};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::pool::begin_write;

/// A registered catalog permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub id: PermissionId,
	pub name: String,
	pub resource: String,
	pub action: PermissionAction,
	pub description: Option<String>,
}

#[derive(Clone)]
pub struct PermissionRepository {
	pool: SqlitePool,
}

impl PermissionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Register (or re-register) a permission.
	///
	/// # Errors
	/// - `InvalidPermissionName` if `name` is not `<resource>.<action>`
	/// - `DuplicatePermission` if `name` exists with a different resource/action
	#[tracing::instrument(skip(self, description), fields(permission = %name))]
	pub async fn register_permission(
		&self,
		name: &str,
		resource: &str,
		action: PermissionAction,
		description: Option<&str>,
	) -> Result<Permission, DbError> {
		let mut conn = self.pool.acquire().await?;
		register_in(&mut conn, name, resource, action, description).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_permission_by_name(&self, name: &str) -> Result<Option<Permission>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, resource, action, description
			FROM permissions
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_permission(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_permissions(&self) -> Result<Vec<Permission>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, resource, action, description
			FROM permissions
			ORDER BY name
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_permission).collect()
	}

	/// Register every built-in `resource × action` pair in one transaction.
	///
	/// Returns the catalog size after seeding.
	#[tracing::instrument(skip(self))]
	pub async fn seed_catalog(&self) -> Result<usize, DbError> {
		let catalog = builtin_catalog();
		let mut tx = begin_write(&self.pool).await?;
		for permission in &catalog {
			let name = permission.to_string();
			let description = format!("{} {}", permission.action, permission.resource);
			register_in(
				&mut tx,
				&name,
				&permission.resource,
				permission.action,
				Some(description.as_str()),
			)
			.await?;
		}
		tx.commit().await?;

		tracing::info!(count = catalog.len(), "permission catalog seeded");
		Ok(catalog.len())
	}
}

/// Upsert inside an existing connection or transaction.
pub(crate) async fn register_in(
	conn: &mut SqliteConnection,
	name: &str,
	resource: &str,
	action: PermissionAction,
	description: Option<&str>,
) -> Result<Permission, DbError> {
	let parsed = PermissionName::parse(name)?;
	if parsed.resource != resource || parsed.action != action {
		return Err(AccessError::InvalidPermissionName(format!(
			"{name} does not match {resource}.{action}"
		))
		.into());
	}

	sqlx::query(
		r#"
		INSERT INTO permissions (name, resource, action, description)
		VALUES (?, ?, ?, ?)
		ON CONFLICT(name) DO UPDATE SET description = excluded.description
		WHERE permissions.resource = excluded.resource AND permissions.action = excluded.action
		"#,
	)
	.bind(name)
	.bind(resource)
	.bind(action.as_str())
	.bind(description)
	.execute(&mut *conn)
	.await?;

	let row = sqlx::query(
		r#"
		SELECT id, name, resource, action, description
		FROM permissions
		WHERE name = ?
		"#,
	)
	.bind(name)
	.fetch_one(&mut *conn)
	.await?;
	let existing = row_to_permission(&row)?;

	if existing.resource != resource || existing.action != action {
		tracing::debug!(permission = %name, "permission name already bound elsewhere");
		return Err(AccessError::DuplicatePermission {
			name: name.to_string(),
		}
		.into());
	}

	tracing::debug!(permission = %name, id = %existing.id, "permission registered");
	Ok(existing)
}

pub(crate) fn row_to_permission(row: &SqliteRow) -> Result<Permission, DbError> {
	let action: String = row.get("action");
	let action = action
		.parse::<PermissionAction>()
		.map_err(|e| DbError::Internal(format!("Invalid permission action: {e}")))?;

	Ok(Permission {
		id: PermissionId::new(row.get("id")),
		name: row.get("name"),
		resource: row.get("resource"),
		action,
		description: row.get("description"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use keyhold_server_auth::permission::CATALOG_RESOURCES;

	#[tokio::test]
	async fn register_is_idempotent() {
		let pool = create_test_pool().await;
		let repo = PermissionRepository::new(pool);

		let first = repo
			.register_permission("tenants.view", "tenants", PermissionAction::View, Some("a"))
			.await
			.unwrap();
		let second = repo
			.register_permission("tenants.view", "tenants", PermissionAction::View, Some("b"))
			.await
			.unwrap();

		assert_eq!(first.id, second.id);
		assert_eq!(second.description.as_deref(), Some("b"));
		assert_eq!(repo.list_permissions().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn mismatched_name_is_invalid() {
		let pool = create_test_pool().await;
		let repo = PermissionRepository::new(pool);

		let err = repo
			.register_permission("tenants.view", "villas", PermissionAction::View, None)
			.await
			.unwrap_err();
		assert!(matches!(
			err.access(),
			Some(AccessError::InvalidPermissionName(_))
		));
	}

	#[tokio::test]
	async fn conflicting_existing_row_is_duplicate() {
		let pool = create_test_pool().await;
		sqlx::query(
			"INSERT INTO permissions (name, resource, action) VALUES ('tenants.view', 'legacy', 'view')",
		)
		.execute(&pool)
		.await
		.unwrap();
		let repo = PermissionRepository::new(pool);

		let err = repo
			.register_permission("tenants.view", "tenants", PermissionAction::View, None)
			.await
			.unwrap_err();
		assert_eq!(
			err.access(),
			Some(&AccessError::DuplicatePermission {
				name: "tenants.view".to_string()
			})
		);
	}

	#[tokio::test]
	async fn seeding_twice_keeps_catalog_size() {
		let pool = create_test_pool().await;
		let repo = PermissionRepository::new(pool);

		let first = repo.seed_catalog().await.unwrap();
		let second = repo.seed_catalog().await.unwrap();
		assert_eq!(first, second);
		assert_eq!(
			repo.list_permissions().await.unwrap().len(),
			CATALOG_RESOURCES.len() * PermissionAction::all().len()
		);
		assert!(repo
			.get_permission_by_name("roles.manage")
			.await
			.unwrap()
			.is_some());
	}
}
