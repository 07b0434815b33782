use log::*;

use std::rc::Rc;

use serde_json::Value;

use crate::error::*;

use crate::models::*;
use crate::forms::article::*;

use crate::db::*;

/// Fields only the like toggle may write.
const ENGAGEMENT_FIELDS: &[&str] = &[LIKED_USERS, TOTAL_LIKES];

#[derive(Clone)]
pub struct ArticleService {
  store: Rc<dyn DocumentStore>,
}

fn article_from_doc(doc: Document) -> Result<Article> {
  Ok(serde_json::from_value(Value::Object(doc))?)
}

/// The list filter matches these fields as strings.
const STRING_FIELDS: &[&str] = &["category", "author_id"];

fn check_string_fields(article: &Document) -> Result<()> {
  for field in STRING_FIELDS {
    match article.get(*field) {
      None | Some(Value::Null) | Some(Value::String(_)) => (),
      Some(_) => {
        return Err(Error::BadRequest(format!("{} must be a string", field)));
      },
    }
  }
  Ok(())
}

impl ArticleService {
  pub fn new(store: Rc<dyn DocumentStore>) -> ArticleService {
    ArticleService {
      store,
    }
  }

  pub async fn get_articles(&self, req: &ArticleRequest) -> Result<Vec<Article>> {
    let docs = self.store.find(Collection::Articles, &req.filter(), SortOrder::Natural).await?;
    docs.into_iter().map(article_from_doc).collect()
  }

  pub async fn get_by_id(&self, article_id: DocId) -> Result<Option<Article>> {
    match self.store.find_one(Collection::Articles, article_id).await? {
      Some(doc) => Ok(Some(article_from_doc(doc)?)),
      None => Ok(None),
    }
  }

  pub async fn store(&self, mut article: Document) -> Result<InsertResult> {
    check_string_fields(&article)?;
    strip_fields(&mut article, ENGAGEMENT_FIELDS);
    article.insert(LIKED_USERS.to_string(), json!([]));
    article.insert(TOTAL_LIKES.to_string(), json!(0));
    self.store.insert_one(Collection::Articles, article).await
  }

  /// Merge fields into the article, creating it with this id if missing.
  pub async fn update(&self, article_id: DocId, mut article: Document) -> Result<UpdateResult> {
    check_string_fields(&article)?;
    strip_fields(&mut article, ENGAGEMENT_FIELDS);
    self.store.update_one(Collection::Articles, article_id, article, true).await
  }

  pub async fn delete(&self, article_id: DocId) -> Result<DeleteResult> {
    self.store.delete_one(Collection::Articles, article_id).await
  }

  /// Like the article, or unlike it when `user_id` already likes it.
  pub async fn toggle_like(&self, article_id: &str, user_id: &str) -> Result<LikeResponse> {
    if user_id.is_empty() {
      return Err(Error::BadRequest("User ID is required".to_string()));
    }
    let article_id: DocId = article_id.parse()
      .map_err(|_| Error::not_found("Article not found"))?;

    let toggle = MemberToggle {
      set_field: LIKED_USERS,
      counter_field: TOTAL_LIKES,
      member: user_id.to_string(),
    };
    let toggled = self.store.toggle_member(Collection::Articles, article_id, &toggle).await?
      .ok_or_else(|| Error::not_found("Article not found"))?;
    debug!("Article({}) like toggled by {}: liked={}, total={}",
      article_id, user_id, toggled.is_member, toggled.counter);

    Ok(LikeResponse {
      message: if toggled.is_member { "Liked" } else { "Unliked" }.to_string(),
      total_likes: toggled.counter,
      liked: toggled.is_member,
    })
  }
}
