use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::db::DocId;

pub const LIKED_USERS: &str = "likedUsers";
pub const TOTAL_LIKES: &str = "totalLikes";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
  #[serde(rename = "_id")]
  pub id: DocId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author_id: Option<String>,
  /// Users that like this article.  Missing or null loads as empty.
  #[serde(rename = "likedUsers", default, deserialize_with = "null_as_empty")]
  pub liked_users: BTreeSet<String>,
  #[serde(rename = "totalLikes", default)]
  pub total_likes: i64,
  /// Free-form content fields.
  #[serde(flatten)]
  pub content: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn engagement_defaults_when_missing() {
    let article: Article = serde_json::from_value(json!({
      "_id": "3",
      "category": "tech",
      "title": "Hello",
    })).unwrap();
    assert_eq!(article.id, DocId(3));
    assert!(article.liked_users.is_empty());
    assert_eq!(article.total_likes, 0);
    assert_eq!(article.content.get("title"), Some(&json!("Hello")));

    let article: Article = serde_json::from_value(json!({
      "_id": "4",
      "likedUsers": null,
    })).unwrap();
    assert!(article.liked_users.is_empty());
    assert!(!article.liked_users.contains("u1"));
  }

  #[test]
  fn serializes_store_field_names() {
    let article: Article = serde_json::from_value(json!({
      "_id": "5",
      "author_id": "u1",
      "likedUsers": ["u2"],
      "totalLikes": 1,
      "body": "text",
    })).unwrap();
    assert!(article.liked_users.contains("u2"));

    let out = serde_json::to_value(&article).unwrap();
    assert_eq!(out, json!({
      "_id": "5",
      "author_id": "u1",
      "likedUsers": ["u2"],
      "totalLikes": 1,
      "body": "text",
    }));
  }
}
