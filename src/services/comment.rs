use log::*;

use actix_web::{
  get, post, web, HttpResponse,
};

use crate::error::*;
use crate::app::*;
use crate::auth::AuthData;
use crate::db::{DbService, Document};
use crate::middleware::Auth;

/// Get comments of an article, newest first
#[get("/comments/{article_id}")]
async fn list(
  db: web::Data<DbService>,
  article_id: web::Path<String>,
) -> Result<HttpResponse> {
  let comments = db.comment.get_by_article(&article_id).await?;
  Ok(HttpResponse::Ok().json(comments))
}

/// post new comment
#[post("/comments", wrap = "Auth::required()")]
async fn store_comment(
  auth: AuthData,
  db: web::Data<DbService>,
  comment: web::Json<Document>,
) -> Result<HttpResponse> {
  let res = db.comment.store(comment.into_inner()).await?;
  info!("Comment({}) added by {}", res.inserted_id, auth.user_id);
  Ok(HttpResponse::Ok().json(res))
}

#[derive(Debug, Clone, Default)]
pub struct CommentService {
}

impl super::Service for CommentService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .service(list)
      .service(store_comment);
  }
}

pub fn new_factory() -> CommentService {
  Default::default()
}
