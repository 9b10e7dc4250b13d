// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query scope injection.
//!
//! Every data-access path that lists ownership-bearing rows goes through
//! [`inject_scope`]. The rules it enforces:
//!
//! - [`Scope::Unrestricted`] leaves the query untouched
//! - an empty id set adds a predicate that matches nothing; the filter is
//!   never simply omitted
//! - a non-empty id set is ANDed in as `id IN (...)` next to whatever filters
//!   the caller already added, without duplicating or dropping any of them
//!
//! Table and column names are `&'static str` so they can only come from code;
//! every value is bound, never spliced into the SQL text.

use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeSet;

use crate::scope::{ResourceType, Scope};

/// A bound value for an equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
	Int(i64),
	Text(String),
	Bool(bool),
}

impl From<i64> for FilterValue {
	fn from(v: i64) -> Self {
		FilterValue::Int(v)
	}
}

impl From<&str> for FilterValue {
	fn from(v: &str) -> Self {
		FilterValue::Text(v.to_string())
	}
}

impl From<String> for FilterValue {
	fn from(v: String) -> Self {
		FilterValue::Text(v)
	}
}

impl From<bool> for FilterValue {
	fn from(v: bool) -> Self {
		FilterValue::Bool(v)
	}
}

/// One conjunct of a WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
	Eq(&'static str, FilterValue),
	In(&'static str, BTreeSet<i64>),
	IsNull(&'static str),
	NotNull(&'static str),
	/// Matches zero rows.
	MatchNone,
}

/// A single-table SELECT with ANDed filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
	table: &'static str,
	id_column: &'static str,
	columns: Vec<&'static str>,
	filters: Vec<Filter>,
	order_by: Option<&'static str>,
	limit: Option<i64>,
}

impl SelectQuery {
	/// `SELECT * FROM table` with `id` as the scoped column.
	pub fn new(table: &'static str) -> Self {
		debug_assert!(is_identifier(table), "invalid table name {table}");
		Self {
			table,
			id_column: "id",
			columns: Vec::new(),
			filters: Vec::new(),
			order_by: None,
			limit: None,
		}
	}

	/// A query over the backing table of a resource family.
	pub fn for_resource(resource: ResourceType) -> Self {
		Self::new(resource.table())
	}

	pub fn id_column(mut self, column: &'static str) -> Self {
		debug_assert!(is_identifier(column), "invalid column name {column}");
		self.id_column = column;
		self
	}

	pub fn columns(mut self, columns: &[&'static str]) -> Self {
		debug_assert!(columns.iter().all(|c| is_identifier(c)));
		self.columns = columns.to_vec();
		self
	}

	/// Adds a filter unless an identical one is already present.
	pub fn filter(mut self, filter: Filter) -> Self {
		if !self.filters.contains(&filter) {
			self.filters.push(filter);
		}
		self
	}

	pub fn order_by(mut self, column: &'static str) -> Self {
		debug_assert!(is_identifier(column), "invalid column name {column}");
		self.order_by = Some(column);
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn filters(&self) -> &[Filter] {
		&self.filters
	}

	pub fn table(&self) -> &'static str {
		self.table
	}

	/// Renders into a builder ready for `.build()` / `.build_query_as()`.
	pub fn to_builder(&self) -> QueryBuilder<'static, Sqlite> {
		let mut qb = QueryBuilder::new("SELECT ");
		if self.columns.is_empty() {
			qb.push("*");
		} else {
			qb.push(self.columns.join(", "));
		}
		qb.push(" FROM ");
		qb.push(self.table);

		for (i, filter) in self.filters.iter().enumerate() {
			qb.push(if i == 0 { " WHERE (" } else { " AND (" });
			push_filter(&mut qb, filter);
			qb.push(")");
		}

		if let Some(column) = self.order_by {
			qb.push(" ORDER BY ");
			qb.push(column);
		}
		if let Some(limit) = self.limit {
			qb.push(" LIMIT ");
			qb.push_bind(limit);
		}
		qb
	}

	/// The rendered SQL text, placeholders included.
	pub fn sql(&self) -> String {
		self.to_builder().sql().to_string()
	}
}

fn push_filter(qb: &mut QueryBuilder<'static, Sqlite>, filter: &Filter) {
	match filter {
		Filter::Eq(column, value) => {
			qb.push(*column);
			qb.push(" = ");
			match value {
				FilterValue::Int(v) => qb.push_bind(*v),
				FilterValue::Text(v) => qb.push_bind(v.clone()),
				FilterValue::Bool(v) => qb.push_bind(*v),
			};
		}
		// An empty IN list is not valid SQL; it means "nothing" anyway.
		Filter::In(_, ids) if ids.is_empty() => {
			qb.push("1 = 0");
		}
		Filter::In(column, ids) => {
			qb.push(*column);
			qb.push(" IN (");
			let mut separated = qb.separated(", ");
			for id in ids {
				separated.push_bind(*id);
			}
			qb.push(")");
		}
		Filter::IsNull(column) => {
			qb.push(*column);
			qb.push(" IS NULL");
		}
		Filter::NotNull(column) => {
			qb.push(*column);
			qb.push(" IS NOT NULL");
		}
		Filter::MatchNone => {
			qb.push("1 = 0");
		}
	}
}

fn is_identifier(s: &str) -> bool {
	!s.is_empty()
		&& s
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// ANDs the scope into `query`.
pub fn inject_scope(scope: &Scope, query: SelectQuery) -> SelectQuery {
	match scope {
		Scope::Unrestricted => query,
		Scope::Ids(ids) if ids.is_empty() => query.filter(Filter::MatchNone),
		Scope::Ids(ids) => {
			let column = query.id_column;
			query.filter(Filter::In(column, ids.clone()))
		}
	}
}
