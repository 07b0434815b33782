use serde_json::Value;

use super::store::Document;

/// Exact-match equality on top-level fields.  An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn eq<V: Into<Value>>(mut self, field: &str, val: V) -> Self {
    self.0.insert(field.to_string(), val.into());
    self
  }

  /// Constrain `field` only when a non-empty value is given.
  pub fn eq_opt(self, field: &str, val: Option<&str>) -> Self {
    match val {
      Some(val) if !val.is_empty() => self.eq(field, val),
      _ => self,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_document(&self) -> &Document {
    &self.0
  }

  pub fn matches(&self, doc: &Document) -> bool {
    self.0.iter().all(|(field, val)| doc.get(field) == Some(val))
  }
}

/// Filter for the article list endpoint.
pub fn article_filter(category: Option<&str>, author_id: Option<&str>) -> Filter {
  Filter::new()
    .eq_opt("category", category)
    .eq_opt("author_id", author_id)
}
