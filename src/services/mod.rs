use log::*;

use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{web};

use crate::error::*;
use crate::app::*;
use crate::auth::TokenVerifier;
use crate::db::StoreConfig;

mod health;
mod article;
mod category;
mod comment;

type BoxService = Box<dyn Service>;

/// Request body limit.
const JSON_LIMIT: usize = 256 * 1024;

pub trait Service: ServiceClone + Send {
  /// Load Service config from AppConfig.
  fn load_app_config(&mut self, config: &AppConfig, prefix: &str) -> Result<()>;

  /// Setup Service endpoints.
  fn web_config(&self, _web: &mut web::ServiceConfig) {
  }

  /// Setup Service endpoints under the api scope.
  fn api_config(&self, _web: &mut web::ServiceConfig) {
  }
}

pub trait ServiceClone {
  fn clone_box(&self) -> BoxService;
}

impl<T> ServiceClone for T
where
    T: 'static + Service + Clone,
{
  fn clone_box(&self) -> BoxService {
    Box::new(self.clone())
  }
}

impl Clone for BoxService {
  fn clone(&self) -> BoxService {
    self.clone_box()
  }
}

#[derive(Clone)]
pub struct Services {
  store: StoreConfig,
  verifier: Arc<dyn TokenVerifier>,
  scope: String,
  services: Vec<BoxService>,
}

impl Services {
  pub fn new(store: StoreConfig, verifier: Arc<dyn TokenVerifier>) -> Services {
    Services {
      store,
      verifier,
      scope: String::new(),
      services: Vec::new(),
    }
  }

  fn load_service(&mut self, name: &str, config: &AppConfig, prefix: &str) -> Result<BoxService> {
    let mut service: BoxService = match name {
      "Health" => Box::new(health::new_factory()),
      "Article" => Box::new(article::new_factory()),
      "Category" => Box::new(category::new_factory()),
      "Comment" => Box::new(comment::new_factory()),
      _ => {
        return Err(anyhow::anyhow!("Unknown Service: {}", name).into());
      },
    };

    service.load_app_config(config, prefix)?;
    Ok(service)
  }

  /// Load Service config from AppConfig.
  pub fn load_app_config(&mut self, config: &AppConfig, prefix: &str) -> Result<()> {
    self.scope = config.get_str(&format!("{}.scope", prefix))?.unwrap_or_default();

    let mut loaded = HashSet::new();
    let list = config.get_str_list(&format!("{}.services", prefix))?
      .ok_or_else(|| anyhow::anyhow!("missing list of services: {}.services", prefix))?;
    for name in list {
      info!("Loading {}Service config", name);
      // check if it is loaded already.
      if !loaded.insert(name.clone()) {
        return Err(anyhow::anyhow!("can't load service multiple times: {}", name).into());
      }
      let service = self.load_service(&name, config, prefix)?;
      self.services.push(service);
    }
    Ok(())
  }

  /// Setup Service endpoints.
  pub fn web_config(&self, web: &mut web::ServiceConfig) {
    // Open the store for this worker.
    let db = self.store.connect();
    let json = web::JsonConfig::default()
      .limit(JSON_LIMIT)
      .error_handler(|err, _req| {
        Error::BadRequest(err.to_string()).into()
      });
    web
      .app_data(web::Data::new(db))
      .app_data(web::Data::from(self.verifier.clone()))
      .app_data(json);

    for service in self.services.iter() {
      service.web_config(web);
    }
    if self.scope.is_empty() {
      for service in self.services.iter() {
        service.api_config(web);
      }
    } else {
      web.service(
        web::scope(&self.scope)
          .configure(|web| {
            for service in self.services.iter() {
              service.api_config(web);
            }
          })
      );
    }
  }
}

pub fn config_services(
  config: &AppConfig,
  prefix: &str,
  store: StoreConfig,
  verifier: Arc<dyn TokenVerifier>,
) -> Result<Services> {
  let mut services = Services::new(store, verifier);
  services.load_app_config(config, prefix)?;
  Ok(services)
}
