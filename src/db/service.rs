use log::*;

use std::rc::Rc;

use crate::error::*;
use crate::app::AppConfig;

use super::{
  DocumentStore,
  MemoryStore,
  PgStore,
  ArticleService,
  CommentService,
  CategoryService,
};

/// Which document store backs the services.
#[derive(Debug, Clone)]
pub enum StoreConfig {
  /// One store shared by all workers.
  Memory(MemoryStore),
  /// One client per worker.
  Postgres {
    url: String,
    migrate: bool,
  },
}

impl StoreConfig {
  pub fn from_app_config(config: &AppConfig) -> Result<Self> {
    let url = config.get_str("db.url")?
      .ok_or_else(|| anyhow::anyhow!("db.url must be set"))?;
    let migrate = config.get_bool("db.migrate")?.unwrap_or(true);
    Self::from_url(&url, migrate)
  }

  pub fn from_url(url: &str, migrate: bool) -> Result<Self> {
    if url.starts_with("memory:") {
      Ok(StoreConfig::Memory(MemoryStore::new()))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
      Ok(StoreConfig::Postgres {
        url: url.to_string(),
        migrate,
      })
    } else {
      Err(anyhow::anyhow!("Unsupported db.url: {}", url).into())
    }
  }

  pub fn memory() -> Self {
    StoreConfig::Memory(MemoryStore::new())
  }

  /// Open the store for the calling worker.
  pub fn connect(&self) -> DbService {
    let store: Rc<dyn DocumentStore> = match self {
      StoreConfig::Memory(store) => Rc::new(store.clone()),
      StoreConfig::Postgres { url, migrate } => Rc::new(PgStore::new(url, *migrate)),
    };
    DbService::new(store)
  }
}

#[derive(Clone)]
pub struct DbService {
  store: Rc<dyn DocumentStore>,
  pub article: ArticleService,
  pub comment: CommentService,
  pub category: CategoryService,
}

impl DbService {
  pub fn new(store: Rc<dyn DocumentStore>) -> DbService {
    DbService {
      article: ArticleService::new(store.clone()),
      comment: CommentService::new(store.clone()),
      category: CategoryService::new(store.clone()),
      store,
    }
  }

  pub async fn prepare(&self) -> Result<()> {
    info!("DBService: Prepare store.");
    self.store.prepare().await?;

    info!("DBService: finished.");
    Ok(())
  }
}
