use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::DocId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
  #[serde(rename = "_id")]
  pub id: DocId,
  /// Id of the commented article.  Not checked against the articles collection.
  #[serde(default)]
  pub article_id: String,
  /// Author info and body.
  #[serde(flatten)]
  pub content: Map<String, Value>,
}
