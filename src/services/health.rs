use actix_web::{
  get, web, HttpResponse,
};

use crate::error::*;
use crate::app::*;

/// Liveness check.
#[get("/")]
async fn alive() -> HttpResponse {
  HttpResponse::Ok()
    .content_type("text/plain; charset=utf-8")
    .body("ThinkUp is Cooking...")
}

#[derive(Debug, Clone, Default)]
pub struct HealthService {
}

impl super::Service for HealthService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn web_config(&self, web: &mut web::ServiceConfig) {
    web.service(alive);
  }
}

pub fn new_factory() -> HealthService {
  Default::default()
}
