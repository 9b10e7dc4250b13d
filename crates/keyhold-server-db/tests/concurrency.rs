// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Same-name role creation racing across real connections of a WAL database.

use keyhold_server_auth::{AccessError, AuthenticatedUser};
use keyhold_server_db::testing::{create_file_pool, insert_admin, insert_user};
use keyhold_server_db::{
	CreateCustomRole, CustomRoleService, DbError, IdentityResolver, NewRole, Role, RoleRepository,
};
use tokio::task::JoinSet;

const CONTENDERS: usize = 8;
const ROUNDS: usize = 5;

fn assert_single_winner(name: &str, outcomes: Vec<Result<Role, DbError>>) {
	assert_eq!(outcomes.len(), CONTENDERS);
	let winners = outcomes.iter().filter(|o| o.is_ok()).count();
	assert_eq!(winners, 1, "{name}: {outcomes:?}");
	for err in outcomes.into_iter().filter_map(Result::err) {
		assert!(
			matches!(err.access(), Some(AccessError::RoleNameTaken { name: taken }) if taken == name),
			"{name}: {err:?}"
		);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_role_race_has_one_winner() {
	let dir = tempfile::tempdir().unwrap();
	let pool = create_file_pool(&dir.path().join("keyhold.db")).await;
	let owner = insert_user(&pool, 1, None).await;
	let repo = RoleRepository::new(pool);
	let staff = repo.get_role_by_name("staff").await.unwrap().unwrap();

	for round in 0..ROUNDS {
		let name = format!("concierge-{round}");
		let mut set = JoinSet::new();
		for _ in 0..CONTENDERS {
			let repo = repo.clone();
			let name = name.clone();
			set.spawn(async move {
				repo.create_role(NewRole {
					name: &name,
					created_by: Some(owner),
					parent_role_id: Some(staff.id),
					..Default::default()
				})
				.await
			});
		}

		let mut outcomes = Vec::new();
		while let Some(joined) = set.join_next().await {
			outcomes.push(joined.unwrap());
		}
		assert_single_winner(&name, outcomes);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn custom_role_race_with_template_has_one_winner() {
	let dir = tempfile::tempdir().unwrap();
	let pool = create_file_pool(&dir.path().join("keyhold.db")).await;
	let root = insert_admin(&pool, 1).await;
	let ctx = IdentityResolver::new(pool.clone())
		.resolve(&AuthenticatedUser::new(root))
		.await
		.unwrap();
	let staff = RoleRepository::new(pool.clone())
		.get_role_by_name("staff")
		.await
		.unwrap()
		.unwrap();
	let service = CustomRoleService::new(pool);

	for round in 0..ROUNDS {
		let name = format!("night-shift-{round}");
		let mut set = JoinSet::new();
		for _ in 0..CONTENDERS {
			let service = service.clone();
			let ctx = ctx.clone();
			let input = CreateCustomRole {
				name: name.clone(),
				parent_role_id: Some(staff.id),
				permissions: vec!["tenants.view".to_string()],
				..Default::default()
			};
			set.spawn(async move { service.create_custom_role(&ctx, input).await });
		}

		let mut outcomes = Vec::new();
		while let Some(joined) = set.join_next().await {
			outcomes.push(joined.unwrap());
		}
		assert_single_winner(&name, outcomes);
	}
}
