use std::{path::Path, str::FromStr};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::{Result, schema};

const IN_MEMORY: &str = ":memory:";

pub struct Db {
	pub pool: SqlitePool,
}
impl Db {
	pub async fn connect(cfg: &perch_config::Sqlite) -> Result<Self> {
		if cfg.path == IN_MEMORY {
			return Self::connect_in_memory().await;
		}

		let path = Path::new(&cfg.path);

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let options = SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.connect_with(options)
			.await?;

		Ok(Self { pool })
	}

	/// Every connection to `:memory:` opens a fresh database, so the pool is pinned to a single
	/// connection that never expires.
	pub async fn connect_in_memory() -> Result<Self> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		for statement in schema::statements() {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;
		tracing::debug!("Database schema is ready.");
		Ok(())
	}
}
