use std::sync::Arc;

use perch_service::{PerchService, Providers};
use perch_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PerchService>,
}
impl AppState {
	pub async fn new(config: perch_config::Config) -> color_eyre::Result<Self> {
		Self::with_providers(config, Providers::default()).await
	}

	/// Connects storage, bootstraps the schema and wires the given collaborators.
	pub async fn with_providers(
		config: perch_config::Config,
		providers: Providers,
	) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.sqlite).await?;
		db.ensure_schema().await?;
		let service = PerchService::with_providers(config, db, providers);
		Ok(Self { service: Arc::new(service) })
	}
}
