// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sidebar page listing.

use keyhold_server_auth::{AccessContext, PageAction, PageDescriptor, PageGrantSet, PageId};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::DbError;
use crate::role::RoleRepository;

#[derive(Clone)]
pub struct PageRepository {
	pool: SqlitePool,
	roles: RoleRepository,
}

impl PageRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			roles: RoleRepository::new(pool.clone()),
			pool,
		}
	}

	/// Every sidebar page in display order, with no actions attached.
	#[tracing::instrument(skip(self))]
	pub async fn list_pages(&self) -> Result<Vec<PageDescriptor>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, slug, title, path, parent_id, sort_order
			FROM sidebar_pages
			ORDER BY sort_order, id
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.iter().map(row_to_page).collect())
	}

	/// Pages the actor may view, each with the actions the actor holds on it.
	///
	/// Grants are re-read from the store on every call, so the result
	/// reflects role changes made after the context was resolved. Admins see
	/// every page with every action.
	#[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
	pub async fn list_accessible_pages(
		&self,
		ctx: &AccessContext,
	) -> Result<Vec<PageDescriptor>, DbError> {
		let pages = self.list_pages().await?;
		if ctx.is_admin() {
			return Ok(pages
				.into_iter()
				.map(|mut page| {
					page.actions = PageAction::all().to_vec();
					page
				})
				.collect());
		}

		let grants: PageGrantSet = self.roles.effective_page_grants(ctx.user_id()).await?;
		let visible: Vec<PageDescriptor> = pages
			.into_iter()
			.filter(|page| grants.contains(page.id, PageAction::View))
			.map(|mut page| {
				page.actions = grants.actions_for(page.id);
				page
			})
			.collect();

		tracing::debug!(count = visible.len(), "accessible pages listed");
		Ok(visible)
	}
}

fn row_to_page(row: &SqliteRow) -> PageDescriptor {
	let parent_id: Option<i64> = row.get("parent_id");
	PageDescriptor {
		id: PageId::new(row.get("id")),
		slug: row.get("slug"),
		title: row.get("title"),
		path: row.get("path"),
		parent_id: parent_id.map(PageId::new),
		sort_order: row.get("sort_order"),
		actions: Vec::new(),
	}
}
