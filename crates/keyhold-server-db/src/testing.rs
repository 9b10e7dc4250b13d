// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pools and row fixtures for tests.

use chrono::Utc;
use keyhold_server_auth::{
	ApartmentId, BuildingId, FloorId, PageAction, PageId, TenantId, TransactionId, UserId, VillaId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::catalog::PermissionRepository;
use crate::pool::{create_pool, run_migrations};
use crate::role::RoleRepository;

/// A migrated in-memory database on a single connection.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

/// [`create_test_pool`] plus the permission catalog and system roles.
pub async fn seeded_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	PermissionRepository::new(pool.clone())
		.seed_catalog()
		.await
		.unwrap();
	RoleRepository::new(pool.clone())
		.seed_system_roles()
		.await
		.unwrap();
	pool
}

/// A seeded WAL database file at `path` behind a multi-connection pool, for
/// tests where writers must actually contend.
pub async fn create_file_pool(path: &Path) -> SqlitePool {
	let pool = create_pool(&format!("sqlite:{}", path.display()))
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();
	PermissionRepository::new(pool.clone())
		.seed_catalog()
		.await
		.unwrap();
	RoleRepository::new(pool.clone())
		.seed_system_roles()
		.await
		.unwrap();
	pool
}

pub async fn insert_user(pool: &SqlitePool, id: i64, created_by: Option<UserId>) -> UserId {
	sqlx::query(
		"INSERT INTO users (id, display_name, is_admin, created_by, created_at) VALUES (?, ?, 0, ?, ?)",
	)
	.bind(id)
	.bind(format!("user-{id}"))
	.bind(created_by.map(UserId::into_inner))
	.bind(Utc::now().to_rfc3339())
	.execute(pool)
	.await
	.unwrap();
	UserId::new(id)
}

pub async fn insert_admin(pool: &SqlitePool, id: i64) -> UserId {
	let user = insert_user(pool, id, None).await;
	sqlx::query("UPDATE users SET is_admin = 1 WHERE id = ?")
		.bind(id)
		.execute(pool)
		.await
		.unwrap();
	user
}

/// Assigns a role looked up by name.
pub async fn give_role(pool: &SqlitePool, user: UserId, role_name: &str) {
	sqlx::query(
		"INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
	)
	.bind(user.into_inner())
	.bind(role_name)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn insert_building(pool: &SqlitePool, id: i64, created_by: Option<UserId>) -> BuildingId {
	sqlx::query("INSERT INTO buildings (id, name, created_by) VALUES (?, ?, ?)")
		.bind(id)
		.bind(format!("building-{id}"))
		.bind(created_by.map(UserId::into_inner))
		.execute(pool)
		.await
		.unwrap();
	BuildingId::new(id)
}

pub async fn insert_villa(pool: &SqlitePool, id: i64, created_by: Option<UserId>) -> VillaId {
	sqlx::query("INSERT INTO villas (id, name, created_by) VALUES (?, ?, ?)")
		.bind(id)
		.bind(format!("villa-{id}"))
		.bind(created_by.map(UserId::into_inner))
		.execute(pool)
		.await
		.unwrap();
	VillaId::new(id)
}

pub async fn insert_floor(pool: &SqlitePool, id: i64, building: BuildingId) -> FloorId {
	sqlx::query("INSERT INTO floors (id, building_id, number) VALUES (?, ?, ?)")
		.bind(id)
		.bind(building.into_inner())
		.bind(1_i64)
		.execute(pool)
		.await
		.unwrap();
	FloorId::new(id)
}

pub async fn insert_apartment(pool: &SqlitePool, id: i64, floor: FloorId) -> ApartmentId {
	sqlx::query("INSERT INTO apartments (id, floor_id, number) VALUES (?, ?, ?)")
		.bind(id)
		.bind(floor.into_inner())
		.bind(id.to_string())
		.execute(pool)
		.await
		.unwrap();
	ApartmentId::new(id)
}

/// A building with one floor and one apartment; returns the apartment.
pub async fn insert_building_with_apartment(
	pool: &SqlitePool,
	building_id: i64,
	apartment_id: i64,
	created_by: Option<UserId>,
) -> ApartmentId {
	let building = insert_building(pool, building_id, created_by).await;
	let floor = insert_floor(pool, building_id * 10, building).await;
	insert_apartment(pool, apartment_id, floor).await
}

pub async fn insert_tenant(pool: &SqlitePool, id: i64, created_by: Option<UserId>) -> TenantId {
	sqlx::query("INSERT INTO tenants (id, name, created_by) VALUES (?, ?, ?)")
		.bind(id)
		.bind(format!("tenant-{id}"))
		.bind(created_by.map(UserId::into_inner))
		.execute(pool)
		.await
		.unwrap();
	TenantId::new(id)
}

pub async fn assign_tenant(
	pool: &SqlitePool,
	apartment: ApartmentId,
	tenant: TenantId,
	is_current: bool,
) {
	sqlx::query(
		"INSERT INTO apartment_assignments (apartment_id, tenant_id, is_current, assigned_at) VALUES (?, ?, ?, ?)",
	)
	.bind(apartment.into_inner())
	.bind(tenant.into_inner())
	.bind(is_current as i32)
	.bind(Utc::now().to_rfc3339())
	.execute(pool)
	.await
	.unwrap();
}

pub async fn insert_transaction(
	pool: &SqlitePool,
	id: i64,
	tenant: Option<TenantId>,
	created_by: Option<UserId>,
) -> TransactionId {
	sqlx::query(
		"INSERT INTO financial_transactions (id, tenant_id, amount_cents, created_by, created_at) VALUES (?, ?, ?, ?, ?)",
	)
	.bind(id)
	.bind(tenant.map(TenantId::into_inner))
	.bind(10_000_i64)
	.bind(created_by.map(UserId::into_inner))
	.bind(Utc::now().to_rfc3339())
	.execute(pool)
	.await
	.unwrap();
	TransactionId::new(id)
}

pub async fn assign_building(pool: &SqlitePool, building: BuildingId, user: UserId) {
	sqlx::query("INSERT OR IGNORE INTO building_assigned (building_id, user_id) VALUES (?, ?)")
		.bind(building.into_inner())
		.bind(user.into_inner())
		.execute(pool)
		.await
		.unwrap();
}

pub async fn assign_villa(pool: &SqlitePool, villa: VillaId, user: UserId) {
	sqlx::query("INSERT OR IGNORE INTO villa_assigned (villa_id, user_id) VALUES (?, ?)")
		.bind(villa.into_inner())
		.bind(user.into_inner())
		.execute(pool)
		.await
		.unwrap();
}

/// A top-level sidebar page with a `page_permissions` row per action.
pub async fn insert_page(pool: &SqlitePool, id: i64, slug: &str, sort_order: i64) -> PageId {
	sqlx::query(
		"INSERT INTO sidebar_pages (id, slug, title, path, sort_order) VALUES (?, ?, ?, ?, ?)",
	)
	.bind(id)
	.bind(slug)
	.bind(slug.to_uppercase())
	.bind(format!("/{slug}"))
	.bind(sort_order)
	.execute(pool)
	.await
	.unwrap();

	for action in PageAction::all() {
		sqlx::query("INSERT INTO page_permissions (page_id, permission_type) VALUES (?, ?)")
			.bind(id)
			.bind(action.as_str())
			.execute(pool)
			.await
			.unwrap();
	}
	PageId::new(id)
}
