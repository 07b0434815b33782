use log::*;

use actix_web::{
  get, post, put, patch, delete, web, HttpResponse,
};

use crate::error::*;
use crate::app::*;
use crate::auth::AuthData;
use crate::forms::article::*;
use crate::db::{DbService, DocId, Document};
use crate::middleware::Auth;

/// Get list of articles.  Filtering by author needs a token.
#[get("/articles", wrap = "Auth::when_query(\"author_id\")")]
async fn list(
  db: web::Data<DbService>,
  req: web::Query<ArticleRequest>,
) -> Result<HttpResponse> {
  let articles = db.article.get_articles(&req).await?;
  Ok(HttpResponse::Ok().json(articles))
}

/// get article by id
#[get("/article/{id}")]
async fn get_article(
  db: web::Data<DbService>,
  id: web::Path<String>,
) -> Result<HttpResponse> {
  let article = match id.parse::<DocId>() {
    Ok(id) => db.article.get_by_id(id).await?,
    Err(_) => None,
  };
  match article {
    Some(article) => Ok(HttpResponse::Ok().json(article)),
    None => Err(Error::not_found("Article not found")),
  }
}

/// post new article
#[post("/article", wrap = "Auth::required()")]
async fn store_article(
  auth: AuthData,
  db: web::Data<DbService>,
  article: web::Json<Document>,
) -> Result<HttpResponse> {
  let res = db.article.store(article.into_inner()).await?;
  info!("Article({}) created by {}", res.inserted_id, auth.user_id);
  Ok(HttpResponse::Ok().json(res))
}

/// replace fields of an article, creating it when missing
#[put("/article/{id}", wrap = "Auth::required()")]
async fn update_article(
  auth: AuthData,
  db: web::Data<DbService>,
  id: web::Path<String>,
  article: web::Json<Document>,
) -> Result<HttpResponse> {
  let id: DocId = id.parse()?;
  let res = db.article.update(id, article.into_inner()).await?;
  info!("Article({}) updated by {}: upserted={}", id, auth.user_id, res.upserted_count);
  Ok(HttpResponse::Ok().json(res))
}

/// delete an existing article
#[delete("/article/{id}", wrap = "Auth::required()")]
async fn delete_article(
  auth: AuthData,
  db: web::Data<DbService>,
  id: web::Path<String>,
) -> Result<HttpResponse> {
  let id: DocId = id.parse()?;
  let res = db.article.delete(id).await?;
  info!("Article({}) deleted by {}: count={}", id, auth.user_id, res.deleted_count);
  Ok(HttpResponse::Ok().json(res))
}

/// like or unlike an article
#[patch("/article/like/{id}", wrap = "Auth::required()")]
async fn toggle_like(
  db: web::Data<DbService>,
  id: web::Path<String>,
  like: Option<web::Json<LikeRequest>>,
) -> Result<HttpResponse> {
  let user_id = like.and_then(|like| like.into_inner().user_id).unwrap_or_default();
  let res = db.article.toggle_like(&id, &user_id).await?;
  Ok(HttpResponse::Ok().json(res))
}

#[derive(Debug, Clone, Default)]
pub struct ArticleService {
}

impl super::Service for ArticleService {
  fn load_app_config(&mut self, _config: &AppConfig, _prefix: &str) -> Result<()> {
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    web
      .service(list)
      .service(get_article)
      .service(store_article)
      .service(update_article)
      .service(delete_article)
      .service(toggle_like);
  }
}

pub fn new_factory() -> ArticleService {
  Default::default()
}
