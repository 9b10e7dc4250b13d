// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access decision point handed to request handlers.
//!
//! Action gating is answered from the resolved [`AccessContext`]; data gating
//! goes to the scope calculator on every call.

use keyhold_server_auth::{
	inject_scope, AccessContext, AccessError, AuthenticatedUser, PermissionAction, ResourceType,
	Scope, SelectQuery,
};

use crate::error::DbError;
use crate::identity::IdentityResolver;
use crate::ownership::ScopeCalculator;

#[derive(Clone)]
pub struct AccessDecisionPoint {
	context: AccessContext,
	scopes: ScopeCalculator,
}

impl AccessDecisionPoint {
	pub fn new(context: AccessContext, scopes: ScopeCalculator) -> Self {
		Self { context, scopes }
	}

	/// Resolves the principal and builds a decision point for one request.
	pub async fn for_user(
		identity: &IdentityResolver,
		scopes: ScopeCalculator,
		user: &AuthenticatedUser,
	) -> Result<Self, DbError> {
		let context = identity.resolve(user).await?;
		Ok(Self::new(context, scopes))
	}

	pub fn context(&self) -> &AccessContext {
		&self.context
	}

	pub fn has_permission(&self, name: &str) -> bool {
		self.context.has_permission(name)
	}

	pub fn has_resource_permission(&self, resource: &str, action: PermissionAction) -> bool {
		self.context.has_resource_permission(resource, action)
	}

	pub fn require_permission(&self, name: &str) -> Result<(), AccessError> {
		self.context.require_permission(name)
	}

	pub async fn scope_for(&self, resource: ResourceType) -> Result<Scope, DbError> {
		self.scopes.scope_for(&self.context, resource).await
	}

	/// `query` over `resource` narrowed to the actor's scope.
	#[tracing::instrument(skip(self, query), fields(user_id = %self.context.user_id(), resource = %resource))]
	pub async fn scoped_query(
		&self,
		resource: ResourceType,
		query: SelectQuery,
	) -> Result<SelectQuery, DbError> {
		let scope = self.scope_for(resource).await?;
		Ok(inject_scope(&scope, query))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::*;
	use keyhold_server_auth::{Filter, OwnershipConfig};

	#[tokio::test]
	async fn scoped_query_only_returns_owned_rows() {
		let pool = seeded_pool().await;
		let a = insert_user(&pool, 1, None).await;
		let b = insert_user(&pool, 2, None).await;
		give_role(&pool, a, "owner").await;
		insert_building(&pool, 10, Some(a)).await;
		insert_building(&pool, 11, Some(b)).await;
		insert_building(&pool, 12, None).await;

		let adp = AccessDecisionPoint::for_user(
			&IdentityResolver::new(pool.clone()),
			ScopeCalculator::new(pool.clone(), OwnershipConfig::default()),
			&AuthenticatedUser::new(a),
		)
		.await
		.unwrap();
		assert!(adp.has_permission("buildings.view"));

		let query = adp
			.scoped_query(
				ResourceType::Buildings,
				SelectQuery::for_resource(ResourceType::Buildings)
					.columns(&["id"])
					.order_by("id"),
			)
			.await
			.unwrap();
		let rows: Vec<(i64,)> = query.to_builder().build_query_as().fetch_all(&pool).await.unwrap();
		assert_eq!(rows, vec![(10,)]);
	}

	#[tokio::test]
	async fn empty_scope_returns_no_rows_whatever_the_filters() {
		let pool = seeded_pool().await;
		let a = insert_user(&pool, 1, None).await;
		let b = insert_user(&pool, 2, None).await;
		insert_tenant(&pool, 1, Some(b)).await;

		let adp = AccessDecisionPoint::for_user(
			&IdentityResolver::new(pool.clone()),
			ScopeCalculator::new(pool.clone(), OwnershipConfig::default()),
			&AuthenticatedUser::new(a),
		)
		.await
		.unwrap();
		assert!(adp.scope_for(ResourceType::Tenants).await.unwrap().is_empty());

		let query = adp
			.scoped_query(
				ResourceType::Tenants,
				SelectQuery::for_resource(ResourceType::Tenants)
					.columns(&["id"])
					.filter(Filter::NotNull("created_by")),
			)
			.await
			.unwrap();
		let rows: Vec<(i64,)> = query.to_builder().build_query_as().fetch_all(&pool).await.unwrap();
		assert!(rows.is_empty());
	}

	#[tokio::test]
	async fn admin_query_is_untouched() {
		let pool = seeded_pool().await;
		let root = insert_admin(&pool, 1).await;
		let adp = AccessDecisionPoint::for_user(
			&IdentityResolver::new(pool.clone()),
			ScopeCalculator::new(pool, OwnershipConfig::default()),
			&AuthenticatedUser::new(root),
		)
		.await
		.unwrap();

		let query = SelectQuery::for_resource(ResourceType::Villas);
		assert_eq!(
			adp.scoped_query(ResourceType::Villas, query.clone())
				.await
				.unwrap(),
			query
		);
		assert!(adp.has_resource_permission("villas", PermissionAction::Delete));
	}
}
