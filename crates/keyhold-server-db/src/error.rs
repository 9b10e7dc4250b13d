// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keyhold_server_auth::AccessError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error(transparent)]
	Access(#[from] AccessError),
}

impl DbError {
	/// The authorization error kind, if this is one.
	pub fn access(&self) -> Option<&AccessError> {
		match self {
			DbError::Access(e) => Some(e),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
