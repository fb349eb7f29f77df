pub mod conversations;
pub mod history;
pub mod image_ingest;
pub mod messages;
pub mod time_serde;
pub mod turn;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

pub use conversations::{ConversationListResponse, ConversationSummaryDto};
pub use error::{Error, Result};
pub use history::HistoryResponse;
pub use image_ingest::{ImageUpload, IngestedImage, StoredImage};
pub use messages::MessageDto;
pub use turn::{DegradedCause, TurnRequest, TurnResponse};

use perch_config::{CompletionProviderConfig, Config, RetrievalProviderConfig};
use perch_providers::{
	completion::{self, ChatMessage, CompletionOptions},
	retrieval::{self, SearchOutcome},
};
use perch_storage::{blobs::BlobStore, db::Db};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Document search. Unreachability is reported through [`SearchOutcome::offline_message`].
pub trait RetrievalProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a RetrievalProviderConfig,
		query: &'a str,
		k: u32,
	) -> BoxFuture<'a, SearchOutcome>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, perch_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub retrieval: Arc<dyn RetrievalProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		retrieval: Arc<dyn RetrievalProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { retrieval, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { retrieval: provider.clone(), completion: provider }
	}
}

pub struct PerchService {
	pub cfg: Config,
	pub db: Db,
	pub blobs: BlobStore,
	pub providers: Providers,
}
impl PerchService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, db, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		let blobs = BlobStore::new(&cfg.storage.uploads.dir);

		Self { cfg, db, blobs, providers }
	}
}

struct DefaultProviders;
impl RetrievalProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a RetrievalProviderConfig,
		query: &'a str,
		k: u32,
	) -> BoxFuture<'a, SearchOutcome> {
		Box::pin(retrieval::search(cfg, query, k))
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, perch_providers::Result<String>> {
		Box::pin(completion::complete(cfg, messages, CompletionOptions::from(cfg)))
	}
}
