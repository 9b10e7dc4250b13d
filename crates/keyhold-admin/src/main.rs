// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keyhold operator CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keyhold_server_auth::{AuthenticatedUser, ResourceType, UserId};
use keyhold_server_config::ServerConfig;
use keyhold_server_db::{
	AccessDecisionPoint, IdentityResolver, PageRepository, PermissionRepository, RoleRepository,
	ScopeCalculator,
};
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Inspect and seed Keyhold access control.
#[derive(Parser, Debug)]
#[command(name = "keyhold-admin", about = "Keyhold access control administration", version)]
struct Args {
	/// Config file; defaults to /etc/keyhold/server.toml
	#[arg(long, env = "KEYHOLD_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply database migrations
	Migrate,
	/// Seed the permission catalog and system roles
	Seed,
	/// Print the ids a user may access for one resource family
	Scope {
		#[arg(long)]
		user: i64,
		#[arg(long)]
		resource: ResourceType,
	},
	/// Print the sidebar pages a user may see
	Pages {
		#[arg(long)]
		user: i64,
	},
	/// Check whether a user holds a permission
	Check {
		#[arg(long)]
		user: i64,
		#[arg(long)]
		permission: String,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	dotenvy::dotenv().ok();

	// Installed before config loads. The configured level replaces the
	// default unless RUST_LOG is set.
	let env_filter = EnvFilter::try_from_default_env().ok();
	let from_env = env_filter.is_some();
	let (filter, filter_handle) =
		reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let config = match &args.config {
		Some(path) => keyhold_server_config::load_config_with_file(path)?,
		None => keyhold_server_config::load_config()?,
	};
	if !from_env {
		filter_handle.reload(EnvFilter::new(&config.logging.level))?;
	}

	tracing::debug!(database = %config.database.url, command = ?args.command, "starting keyhold-admin");

	let pool = keyhold_server_db::create_pool(&config.database.url).await?;
	run(args.command, pool, &config).await
}

async fn run(
	command: Command,
	pool: SqlitePool,
	config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::Migrate => {
			keyhold_server_db::run_migrations(&pool).await?;
			println!("migrations applied");
		}
		Command::Seed => {
			keyhold_server_db::run_migrations(&pool).await?;
			let permissions = PermissionRepository::new(pool.clone()).seed_catalog().await?;
			let roles = RoleRepository::new(pool).seed_system_roles().await?;
			println!("seeded {permissions} permissions and {} system roles", roles.len());
		}
		Command::Scope { user, resource } => {
			let adp = decision_point(&pool, config, user).await?;
			let scope = adp.scope_for(resource).await?;
			println!("{}", serde_json::to_string_pretty(&scope)?);
		}
		Command::Pages { user } => {
			let ctx = IdentityResolver::new(pool.clone())
				.resolve(&AuthenticatedUser::new(UserId::new(user)))
				.await?;
			let pages = PageRepository::new(pool).list_accessible_pages(&ctx).await?;
			println!("{}", serde_json::to_string_pretty(&pages)?);
		}
		Command::Check { user, permission } => {
			let adp = decision_point(&pool, config, user).await?;
			let allowed = adp.has_permission(&permission);
			println!("{}", if allowed { "allow" } else { "deny" });
			if !allowed {
				std::process::exit(1);
			}
		}
	}
	Ok(())
}

async fn decision_point(
	pool: &SqlitePool,
	config: &ServerConfig,
	user: i64,
) -> Result<AccessDecisionPoint, keyhold_server_db::DbError> {
	AccessDecisionPoint::for_user(
		&IdentityResolver::new(pool.clone()),
		ScopeCalculator::new(pool.clone(), config.ownership),
		&AuthenticatedUser::new(UserId::new(user)),
	)
	.await
}
