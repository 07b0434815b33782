use std::rc::Rc;

use serde_json::Value;

use crate::error::*;

use crate::models::*;

use crate::db::*;

#[derive(Clone)]
pub struct CommentService {
  store: Rc<dyn DocumentStore>,
}

fn comment_from_doc(doc: Document) -> Result<Comment> {
  Ok(serde_json::from_value(Value::Object(doc))?)
}

impl CommentService {
  pub fn new(store: Rc<dyn DocumentStore>) -> CommentService {
    CommentService {
      store,
    }
  }

  /// Comments of one article, newest first.
  pub async fn get_by_article(&self, article_id: &str) -> Result<Vec<Comment>> {
    let filter = Filter::new().eq("article_id", article_id);
    let docs = self.store.find(Collection::Comments, &filter, SortOrder::IdDescending).await?;
    docs.into_iter().map(comment_from_doc).collect()
  }

  pub async fn store(&self, mut comment: Document) -> Result<InsertResult> {
    match comment.get("article_id") {
      Some(Value::String(article_id)) if !article_id.is_empty() => (),
      _ => {
        return Err(Error::BadRequest("Article ID is required".to_string()));
      },
    }
    strip_fields(&mut comment, &[]);
    self.store.insert_one(Collection::Comments, comment).await
  }
}
