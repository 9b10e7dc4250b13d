// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ownership scope calculation.
//!
//! Each resource family resolves to exactly one SQL statement so that direct
//! and transitive ownership are computed as a single union and can never
//! drift apart. Rows with a NULL `created_by` are excluded from every
//! statement, including rows reached through legacy assignments or the
//! building → floor → apartment → tenant chain.

use async_trait::async_trait;
use keyhold_server_auth::{AccessContext, OwnershipConfig, OwnershipSource, ResourceType, Scope};
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

#[async_trait]
pub trait ScopeStore: Send + Sync {
	async fn scope_for(&self, ctx: &AccessContext, resource: ResourceType) -> Result<Scope, DbError>;
}

/// Computes [`Scope`]s from current store contents. Holds no cache.
#[derive(Clone)]
pub struct ScopeCalculator {
	pool: SqlitePool,
	ownership: OwnershipConfig,
}

impl ScopeCalculator {
	pub fn new(pool: SqlitePool, ownership: OwnershipConfig) -> Self {
		Self { pool, ownership }
	}

	pub fn ownership(&self) -> &OwnershipConfig {
		&self.ownership
	}

	/// The rows of `resource` the actor may touch.
	///
	/// Admins get [`Scope::Unrestricted`]. Everyone else gets an explicit id
	/// set, empty when they own nothing.
	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id(), resource = %resource))]
	pub async fn scope_for(
		&self,
		ctx: &AccessContext,
		resource: ResourceType,
	) -> Result<Scope, DbError> {
		if ctx.is_admin() {
			tracing::debug!("admin scope is unrestricted");
			return Ok(Scope::Unrestricted);
		}

		let sql = self.scope_sql(resource);
		let ids: Vec<i64> = sqlx::query_scalar(&sql)
			.bind(ctx.user_id().into_inner())
			.fetch_all(&self.pool)
			.await?;

		let scope: Scope = ids.into_iter().collect();
		tracing::debug!(
			size = scope.ids().map(|s| s.len()).unwrap_or_default(),
			"scope computed"
		);
		Ok(scope)
	}

	/// Like [`scope_for`](Self::scope_for) with the family given by name.
	pub async fn scope_for_name(&self, ctx: &AccessContext, resource: &str) -> Result<Scope, DbError> {
		let resource: ResourceType = resource.parse()?;
		self.scope_for(ctx, resource).await
	}

	/// The statement for one family. Binds `?1` = actor id.
	fn scope_sql(&self, resource: ResourceType) -> String {
		match resource {
			ResourceType::Buildings => property_sql(
				"buildings",
				"building_assigned",
				"building_id",
				self.ownership.buildings,
			),
			ResourceType::Villas => {
				property_sql("villas", "villa_assigned", "villa_id", self.ownership.villas)
			}
			ResourceType::Tenants => format!(
				r#"
				SELECT t.id FROM tenants t
				WHERE t.created_by IS NOT NULL
				  AND (t.created_by = ?1 OR t.id IN ({housed}))
				ORDER BY t.id
				"#,
				housed = self.tenants_in_owned_buildings_sql(),
			),
			ResourceType::Transactions => format!(
				r#"
				SELECT ft.id FROM financial_transactions ft
				WHERE ft.created_by IS NOT NULL
				  AND (ft.created_by = ?1 OR ft.tenant_id IN ({housed}))
				ORDER BY ft.id
				"#,
				housed = self.tenants_in_owned_buildings_sql(),
			),
			ResourceType::Users => r#"
				SELECT ?1 AS id
				UNION
				SELECT u.id FROM users u WHERE u.created_by = ?1
				ORDER BY id
				"#
			.to_string(),
		}
	}

	/// Non-orphan tenants whose current apartment sits in a building within
	/// the actor's building scope.
	fn tenants_in_owned_buildings_sql(&self) -> String {
		format!(
			r#"
			SELECT aa.tenant_id
			FROM apartment_assignments aa
			JOIN tenants ht ON ht.id = aa.tenant_id
			JOIN apartments a ON a.id = aa.apartment_id
			JOIN floors f ON f.id = a.floor_id
			WHERE aa.is_current = 1
			  AND ht.created_by IS NOT NULL
			  AND f.building_id IN ({buildings})
			"#,
			buildings = property_ids_sql(
				"buildings",
				"building_assigned",
				"building_id",
				self.ownership.buildings,
			),
		)
	}
}

#[async_trait]
impl ScopeStore for ScopeCalculator {
	async fn scope_for(&self, ctx: &AccessContext, resource: ResourceType) -> Result<Scope, DbError> {
		self.scope_for(ctx, resource).await
	}
}

/// Ids of a directly owned family (buildings, villas) under `source`.
fn property_ids_sql(
	table: &str,
	assigned_table: &str,
	assigned_column: &str,
	source: OwnershipSource,
) -> String {
	let created = format!("SELECT p.id FROM {table} p WHERE p.created_by = ?1");
	let assigned = format!(
		"SELECT p.id FROM {table} p JOIN {assigned_table} x ON x.{assigned_column} = p.id \
		 WHERE x.user_id = ?1 AND p.created_by IS NOT NULL"
	);
	match source {
		OwnershipSource::CreatedBy => created,
		OwnershipSource::Assigned => assigned,
		OwnershipSource::Both => format!("{created} UNION {assigned}"),
	}
}

fn property_sql(
	table: &str,
	assigned_table: &str,
	assigned_column: &str,
	source: OwnershipSource,
) -> String {
	format!(
		"SELECT id FROM ({}) ORDER BY id",
		property_ids_sql(table, assigned_table, assigned_column, source)
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::*;
	use keyhold_server_auth::{AccessError, PageGrantSet, PermissionSet, UserId};
	use proptest::prelude::*;

	fn actor(id: UserId) -> AccessContext {
		AccessContext::anonymous(id)
	}

	fn admin(id: UserId) -> AccessContext {
		AccessContext::new(id, true, Vec::new(), PermissionSet::new(), PageGrantSet::new())
	}

	fn ids(v: &[i64]) -> Scope {
		v.iter().copied().collect()
	}

	mod buildings {
		use super::*;

		#[tokio::test]
		async fn created_and_assigned_are_additive_by_default() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			insert_building(&pool, 10, Some(a)).await;
			let shared = insert_building(&pool, 11, Some(b)).await;
			insert_building(&pool, 12, Some(b)).await;
			assign_building(&pool, shared, a).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Buildings).await.unwrap(),
				ids(&[10, 11])
			);
			assert_eq!(
				calc.scope_for(&actor(b), ResourceType::Buildings).await.unwrap(),
				ids(&[11, 12])
			);
		}

		#[tokio::test]
		async fn ownership_source_selects_mechanism() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			insert_building(&pool, 10, Some(a)).await;
			let assigned = insert_building(&pool, 11, Some(b)).await;
			assign_building(&pool, assigned, a).await;

			let created_only = ScopeCalculator::new(
				pool.clone(),
				OwnershipConfig {
					buildings: OwnershipSource::CreatedBy,
					..Default::default()
				},
			);
			assert_eq!(
				created_only
					.scope_for(&actor(a), ResourceType::Buildings)
					.await
					.unwrap(),
				ids(&[10])
			);

			let assigned_only = ScopeCalculator::new(
				pool,
				OwnershipConfig {
					buildings: OwnershipSource::Assigned,
					..Default::default()
				},
			);
			assert_eq!(
				assigned_only
					.scope_for(&actor(a), ResourceType::Buildings)
					.await
					.unwrap(),
				ids(&[11])
			);
		}

		#[tokio::test]
		async fn orphan_assigned_building_is_excluded() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let orphan = insert_building(&pool, 10, None).await;
			assign_building(&pool, orphan, a).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert!(calc
				.scope_for(&actor(a), ResourceType::Buildings)
				.await
				.unwrap()
				.is_empty());
		}

		#[tokio::test]
		async fn villas_follow_their_own_source() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			insert_villa(&pool, 20, Some(a)).await;
			let villa = insert_villa(&pool, 21, Some(b)).await;
			assign_villa(&pool, villa, a).await;

			let calc = ScopeCalculator::new(
				pool,
				OwnershipConfig {
					villas: OwnershipSource::CreatedBy,
					..Default::default()
				},
			);
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Villas).await.unwrap(),
				ids(&[20])
			);
		}
	}

	mod tenants {
		use super::*;

		#[tokio::test]
		async fn owner_without_data_sees_nothing() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(b)).await;
			let t = insert_tenant(&pool, 7001, Some(b)).await;
			assign_tenant(&pool, apt, t, true).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			let scope = calc.scope_for(&actor(a), ResourceType::Tenants).await.unwrap();
			assert_eq!(scope, Scope::empty());
			assert!(!scope.is_unrestricted());
		}

		#[tokio::test]
		async fn housed_tenants_created_by_others_are_included() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let staff = insert_user(&pool, 2, Some(a)).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(a)).await;
			let t = insert_tenant(&pool, 7001, Some(staff)).await;
			assign_tenant(&pool, apt, t, true).await;
			insert_tenant(&pool, 7002, Some(a)).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Tenants).await.unwrap(),
				ids(&[7001, 7002])
			);
		}

		#[tokio::test]
		async fn past_assignments_do_not_count() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(a)).await;
			let t = insert_tenant(&pool, 7001, Some(b)).await;
			assign_tenant(&pool, apt, t, false).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert!(calc
				.scope_for(&actor(a), ResourceType::Tenants)
				.await
				.unwrap()
				.is_empty());
		}

		#[tokio::test]
		async fn orphan_tenant_in_owned_building_is_excluded() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(a)).await;
			let orphan = insert_tenant(&pool, 7001, None).await;
			assign_tenant(&pool, apt, orphan, true).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert!(!calc
				.scope_for(&actor(a), ResourceType::Tenants)
				.await
				.unwrap()
				.contains(7001));
		}
	}

	mod transactions {
		use super::*;

		#[tokio::test]
		async fn direct_and_transitive_transactions() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(a)).await;
			let housed = insert_tenant(&pool, 7001, Some(b)).await;
			assign_tenant(&pool, apt, housed, true).await;
			let elsewhere = insert_tenant(&pool, 7002, Some(b)).await;

			insert_transaction(&pool, 1, None, Some(a)).await;
			insert_transaction(&pool, 2, Some(housed), Some(b)).await;
			insert_transaction(&pool, 3, Some(elsewhere), Some(b)).await;
			insert_transaction(&pool, 4, Some(housed), None).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Transactions)
					.await
					.unwrap(),
				ids(&[1, 2])
			);
			assert_eq!(
				calc.scope_for(&actor(b), ResourceType::Transactions)
					.await
					.unwrap(),
				ids(&[2, 3])
			);
		}

		#[tokio::test]
		async fn orphan_tenant_does_not_carry_transactions_across() {
			let pool = create_test_pool().await;
			let a = insert_user(&pool, 1, None).await;
			let b = insert_user(&pool, 2, None).await;
			let apt = insert_building_with_apartment(&pool, 8001, 5001, Some(a)).await;
			let orphan = insert_tenant(&pool, 7001, None).await;
			assign_tenant(&pool, apt, orphan, true).await;
			insert_transaction(&pool, 99, Some(orphan), Some(b)).await;

			let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Tenants).await.unwrap(),
				ids(&[])
			);
			assert_eq!(
				calc.scope_for(&actor(a), ResourceType::Transactions)
					.await
					.unwrap(),
				ids(&[])
			);
			assert_eq!(
				calc.scope_for(&actor(b), ResourceType::Transactions)
					.await
					.unwrap(),
				ids(&[99])
			);
		}
	}

	#[tokio::test]
	async fn users_scope_is_self_and_direct_reports() {
		let pool = create_test_pool().await;
		let a = insert_user(&pool, 1, None).await;
		let report = insert_user(&pool, 2, Some(a)).await;
		insert_user(&pool, 3, Some(report)).await;
		insert_user(&pool, 4, None).await;

		let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
		assert_eq!(
			calc.scope_for(&actor(a), ResourceType::Users).await.unwrap(),
			ids(&[1, 2])
		);
	}

	#[tokio::test]
	async fn admin_is_unrestricted_for_every_family() {
		let pool = create_test_pool().await;
		let root = insert_admin(&pool, 1).await;
		let calc = ScopeCalculator::new(pool, OwnershipConfig::default());

		for resource in ResourceType::all() {
			assert_eq!(
				calc.scope_for(&admin(root), *resource).await.unwrap(),
				Scope::Unrestricted
			);
		}
	}

	#[tokio::test]
	async fn unknown_family_name_is_rejected() {
		let pool = create_test_pool().await;
		let a = insert_user(&pool, 1, None).await;
		let calc = ScopeCalculator::new(pool, OwnershipConfig::default());

		let err = calc.scope_for_name(&actor(a), "parking").await.unwrap_err();
		assert_eq!(
			err.access(),
			Some(&AccessError::UnknownResourceType("parking".to_string()))
		);
	}

	// -------------------------------------------------------------------------
	// Property tests over generated ownership graphs.
	// -------------------------------------------------------------------------

	/// One building per entry: `(owner, tenants)` where each tenant is
	/// `Some(creator)` or `None` for an orphan. Owners are users 1..=3.
	type World = Vec<(i64, Vec<Option<i64>>)>;

	fn worlds() -> impl Strategy<Value = World> {
		proptest::collection::vec(
			(1i64..=3, proptest::collection::vec(proptest::option::of(1i64..=3), 0..3)),
			0..5,
		)
	}

	async fn build(world: &World) -> SqlitePool {
		let pool = create_test_pool().await;
		for id in 1..=3 {
			insert_user(&pool, id, None).await;
		}
		let mut tenant_id = 1000;
		for (i, (owner, tenants)) in world.iter().enumerate() {
			let building = 100 + i as i64;
			let apt =
				insert_building_with_apartment(&pool, building, 500 + i as i64, Some(UserId::new(*owner)))
					.await;
			for creator in tenants {
				tenant_id += 1;
				let t = insert_tenant(&pool, tenant_id, creator.map(UserId::new)).await;
				assign_tenant(&pool, apt, t, true).await;
				insert_transaction(&pool, tenant_id, Some(t), creator.map(UserId::new)).await;
			}
		}
		pool
	}

	fn orphans(world: &World) -> Vec<i64> {
		let mut tenant_id = 1000;
		let mut out = Vec::new();
		for (_, tenants) in world {
			for creator in tenants {
				tenant_id += 1;
				if creator.is_none() {
					out.push(tenant_id);
				}
			}
		}
		out
	}

	fn run<F: std::future::Future<Output = ()>>(f: F) {
		tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.unwrap()
			.block_on(f)
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(24))]

		#[test]
		fn orphans_never_appear_in_any_owner_scope(world in worlds()) {
			run(async {
				let pool = build(&world).await;
				let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
				let orphan_ids = orphans(&world);
				for owner in 1..=3 {
					let ctx = actor(UserId::new(owner));
					for resource in [ResourceType::Tenants, ResourceType::Transactions] {
						let scope = calc.scope_for(&ctx, resource).await.unwrap();
						for id in &orphan_ids {
							assert!(!scope.contains(*id), "orphan {id} leaked to {owner}");
						}
					}
				}
			});
		}

		#[test]
		fn building_scopes_are_disjoint_without_sharing(world in worlds()) {
			run(async {
				let pool = build(&world).await;
				let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
				for a in 1..=3 {
					for b in (a + 1)..=3 {
						let sa = calc.scope_for(&actor(UserId::new(a)), ResourceType::Buildings).await.unwrap();
						let sb = calc.scope_for(&actor(UserId::new(b)), ResourceType::Buildings).await.unwrap();
						let (sa, sb) = (sa.ids().unwrap(), sb.ids().unwrap());
						assert!(sa.is_disjoint(sb));
					}
				}
			});
		}

		#[test]
		fn repeated_calls_are_identical(world in worlds(), owner in 1i64..=3) {
			run(async {
				let pool = build(&world).await;
				let calc = ScopeCalculator::new(pool, OwnershipConfig::default());
				let ctx = actor(UserId::new(owner));
				for resource in ResourceType::all() {
					let first = calc.scope_for(&ctx, *resource).await.unwrap();
					let second = calc.scope_for(&ctx, *resource).await.unwrap();
					assert_eq!(first, second);
				}
			});
		}

		#[test]
		fn gaining_a_building_only_grows_tenant_scope(world in worlds(), owner in 1i64..=3) {
			run(async {
				let pool = build(&world).await;
				let calc = ScopeCalculator::new(pool.clone(), OwnershipConfig::default());
				let ctx = actor(UserId::new(owner));
				let before = calc.scope_for(&ctx, ResourceType::Tenants).await.unwrap();

				for i in 0..world.len() {
					assign_building(&pool, keyhold_server_auth::BuildingId::new(100 + i as i64), UserId::new(owner)).await;
				}
				let after = calc.scope_for(&ctx, ResourceType::Tenants).await.unwrap();
				assert!(before.ids().unwrap().is_subset(after.ids().unwrap()));
			});
		}
	}
}
