use actix_web::{
  get, web, HttpResponse,
};

use crate::error::*;
use crate::app::*;
use crate::db::DbService;

/// Get sorted list of distinct categories
#[get("/categories")]
async fn list(
  db: web::Data<DbService>,
) -> Result<HttpResponse> {
  let categories = db.category.get_categories().await?;
  Ok(HttpResponse::Ok().json(categories))
}

#[derive(Debug, Clone, Default)]
pub struct CategoryService {
}

impl super::Service for CategoryService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web.service(list);
  }
}

pub fn new_factory() -> CategoryService {
  Default::default()
}
