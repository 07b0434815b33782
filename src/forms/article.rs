use serde::{Deserialize, Serialize};

use crate::db::filter::{article_filter, Filter};

/// Query string of the article list.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleRequest {
  pub category: Option<String>,
  pub author_id: Option<String>,
}

impl ArticleRequest {
  pub fn filter(&self) -> Filter {
    article_filter(self.category.as_deref(), self.author_id.as_deref())
  }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LikeRequest {
  #[serde(rename = "userId")]
  pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
  pub message: String,
  pub total_likes: i64,
  pub liked: bool,
}
