use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::*;

use super::filter::Filter;

/// A stored JSON document.  Loaded documents carry their id in `_id`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Articles,
  Comments,
}

impl Collection {
  pub fn name(&self) -> &'static str {
    match self {
      Collection::Articles => "articles",
      Collection::Comments => "comments",
    }
  }
}

/// Store-assigned document id.  Serialized as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(pub i64);

impl FromStr for DocId {
  type Err = Error;

  fn from_str(id: &str) -> Result<Self> {
    match id.trim().parse::<i64>() {
      Ok(id) if id > 0 => Ok(DocId(id)),
      _ => Err(Error::BadRequest(format!("Invalid id: {}", id))),
    }
  }
}

impl TryFrom<String> for DocId {
  type Error = Error;

  fn try_from(id: String) -> Result<Self> {
    id.parse()
  }
}

impl From<DocId> for String {
  fn from(id: DocId) -> String {
    id.to_string()
  }
}

impl fmt::Display for DocId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  /// Store order, no explicit sort.
  Natural,
  /// Newest first.
  IdDescending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
  pub acknowledged: bool,
  pub inserted_id: DocId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
  pub acknowledged: bool,
  pub matched_count: u64,
  pub modified_count: u64,
  pub upserted_count: u64,
  pub upserted_id: Option<DocId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
  pub acknowledged: bool,
  pub deleted_count: u64,
}

/// Flip `member` in the string array `set_field` and move `counter_field` by one.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberToggle {
  pub set_field: &'static str,
  pub counter_field: &'static str,
  pub member: String,
}

/// State after a `MemberToggle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Toggled {
  pub counter: i64,
  pub is_member: bool,
}

/// Drop the keys a caller is never allowed to write.
pub fn strip_fields(doc: &mut Document, fields: &[&str]) {
  doc.remove(ID_FIELD);
  for field in fields {
    doc.remove(*field);
  }
}

#[async_trait(?Send)]
pub trait DocumentStore {
  /// Create tables/collections if needed and warm up the connection.
  async fn prepare(&self) -> Result<()>;

  async fn find(&self, coll: Collection, filter: &Filter, order: SortOrder) -> Result<Vec<Document>>;

  async fn find_one(&self, coll: Collection, id: DocId) -> Result<Option<Document>>;

  /// Sorted distinct string values of a top-level field.
  async fn distinct(&self, coll: Collection, field: &str) -> Result<Vec<String>>;

  async fn insert_one(&self, coll: Collection, doc: Document) -> Result<InsertResult>;

  /// Merge the top-level fields of `set` into the document.
  async fn update_one(&self, coll: Collection, id: DocId, set: Document, upsert: bool) -> Result<UpdateResult>;

  async fn delete_one(&self, coll: Collection, id: DocId) -> Result<DeleteResult>;

  /// Atomic.  `None` when the document doesn't exist.
  async fn toggle_member(&self, coll: Collection, id: DocId, toggle: &MemberToggle) -> Result<Option<Toggled>>;
}
