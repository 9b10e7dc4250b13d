// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns an authenticated principal into an [`AccessContext`].

use keyhold_server_auth::{AccessContext, AuthenticatedUser, HeldRole};
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;
use crate::role::RoleRepository;

#[derive(Clone)]
pub struct IdentityResolver {
	pool: SqlitePool,
	roles: RoleRepository,
}

impl IdentityResolver {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			roles: RoleRepository::new(pool.clone()),
			pool,
		}
	}

	/// Loads the actor's roles and effective grants. Runs once per request.
	///
	/// # Errors
	/// `NotFound` if the user row does not exist.
	#[tracing::instrument(skip(self), fields(user_id = %user.user_id))]
	pub async fn resolve(&self, user: &AuthenticatedUser) -> Result<AccessContext, DbError> {
		let stored_admin: Option<i32> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = ?")
			.bind(user.user_id.into_inner())
			.fetch_optional(&self.pool)
			.await?;
		let stored_admin =
			stored_admin.ok_or_else(|| DbError::NotFound(format!("user {}", user.user_id)))?;

		let roles: Vec<HeldRole> = self
			.roles
			.roles_for_user(user.user_id)
			.await?
			.into_iter()
			.map(|r| HeldRole {
				id: r.id,
				name: r.name,
			})
			.collect();
		let permissions = self.roles.effective_permissions(user.user_id).await?;
		let page_grants = self.roles.effective_page_grants(user.user_id).await?;

		let ctx = AccessContext::new(
			user.user_id,
			user.is_admin || stored_admin != 0,
			roles,
			permissions,
			page_grants,
		);
		tracing::debug!(
			is_admin = ctx.is_admin(),
			roles = ctx.roles().len(),
			permissions = ctx.permissions().len(),
			"identity resolved"
		);
		Ok(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{give_role, insert_admin, insert_user, seeded_pool};
	use keyhold_server_auth::{PermissionAction, UserId};

	#[tokio::test]
	async fn owner_gets_role_permissions() {
		let pool = seeded_pool().await;
		let a = insert_user(&pool, 1, None).await;
		give_role(&pool, a, "owner").await;

		let ctx = IdentityResolver::new(pool)
			.resolve(&AuthenticatedUser::new(a))
			.await
			.unwrap();
		assert!(!ctx.is_admin());
		assert_eq!(ctx.roles().len(), 1);
		assert!(ctx.has_permission("tenants.delete"));
		assert!(ctx.has_resource_permission("users", PermissionAction::View));
		assert!(!ctx.has_permission("users.delete"));
	}

	#[tokio::test]
	async fn admin_flag_comes_from_store_or_session() {
		let pool = seeded_pool().await;
		let root = insert_admin(&pool, 1).await;
		let plain = insert_user(&pool, 2, None).await;
		let resolver = IdentityResolver::new(pool);

		assert!(resolver
			.resolve(&AuthenticatedUser::new(root))
			.await
			.unwrap()
			.is_admin());
		assert!(resolver
			.resolve(&AuthenticatedUser::admin(plain))
			.await
			.unwrap()
			.is_admin());
	}

	#[tokio::test]
	async fn admin_role_makes_admin() {
		let pool = seeded_pool().await;
		let a = insert_user(&pool, 1, None).await;
		give_role(&pool, a, "admin").await;

		let ctx = IdentityResolver::new(pool)
			.resolve(&AuthenticatedUser::new(a))
			.await
			.unwrap();
		assert!(ctx.is_admin());
	}

	#[tokio::test]
	async fn user_without_roles_holds_nothing() {
		let pool = seeded_pool().await;
		let a = insert_user(&pool, 1, None).await;

		let ctx = IdentityResolver::new(pool)
			.resolve(&AuthenticatedUser::new(a))
			.await
			.unwrap();
		assert!(ctx.permissions().is_empty());
		assert!(!ctx.has_permission("buildings.view"));
	}

	#[tokio::test]
	async fn unknown_user_is_not_found() {
		let pool = seeded_pool().await;
		let err = IdentityResolver::new(pool)
			.resolve(&AuthenticatedUser::new(UserId::new(404)))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}
}
