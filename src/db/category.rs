use std::rc::Rc;

use crate::error::*;

use crate::db::*;

#[derive(Clone)]
pub struct CategoryService {
  store: Rc<dyn DocumentStore>,
}

impl CategoryService {
  pub fn new(store: Rc<dyn DocumentStore>) -> CategoryService {
    CategoryService {
      store,
    }
  }

  /// Distinct article categories, sorted ascending.
  pub async fn get_categories(&self) -> Result<Vec<String>> {
    self.store.distinct(Collection::Articles, "category").await
  }
}
