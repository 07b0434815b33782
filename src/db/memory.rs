use log::*;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use serde_json::Value;

use tokio::sync::Mutex;

use crate::error::*;

use super::filter::Filter;
use super::store::*;

#[derive(Debug, Default)]
struct MemoryState {
  last_id: i64,
  collections: HashMap<Collection, BTreeMap<DocId, Document>>,
}

impl MemoryState {
  fn next_id(&mut self) -> Result<DocId> {
    self.last_id = self.last_id.checked_add(1)
      .ok_or_else(|| Error::StoreError("document ids exhausted".to_string()))?;
    Ok(DocId(self.last_id))
  }

  fn collection(&mut self, coll: Collection) -> &mut BTreeMap<DocId, Document> {
    self.collections.entry(coll).or_default()
  }
}

fn with_id(id: DocId, doc: &Document) -> Document {
  let mut doc = doc.clone();
  doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
  doc
}

/// Process-wide in-memory document store.  Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Default::default()
  }
}

#[async_trait(?Send)]
impl DocumentStore for MemoryStore {
  async fn prepare(&self) -> Result<()> {
    debug!("MemoryStore: nothing to prepare.");
    Ok(())
  }

  async fn find(&self, coll: Collection, filter: &Filter, order: SortOrder) -> Result<Vec<Document>> {
    let mut state = self.state.lock().await;
    let docs = state.collection(coll);
    let matched = docs.iter()
      .filter(|(_, doc)| filter.matches(doc))
      .map(|(id, doc)| with_id(*id, doc));
    Ok(match order {
      SortOrder::Natural => matched.collect(),
      SortOrder::IdDescending => matched.rev().collect(),
    })
  }

  async fn find_one(&self, coll: Collection, id: DocId) -> Result<Option<Document>> {
    let mut state = self.state.lock().await;
    Ok(state.collection(coll).get(&id).map(|doc| with_id(id, doc)))
  }

  async fn distinct(&self, coll: Collection, field: &str) -> Result<Vec<String>> {
    let mut state = self.state.lock().await;
    let values: BTreeSet<String> = state.collection(coll).values()
      .filter_map(|doc| doc.get(field).and_then(Value::as_str))
      .map(|val| val.to_string())
      .collect();
    Ok(values.into_iter().collect())
  }

  async fn insert_one(&self, coll: Collection, mut doc: Document) -> Result<InsertResult> {
    doc.remove(ID_FIELD);
    let mut state = self.state.lock().await;
    let id = state.next_id()?;
    state.collection(coll).insert(id, doc);
    Ok(InsertResult {
      acknowledged: true,
      inserted_id: id,
    })
  }

  async fn update_one(&self, coll: Collection, id: DocId, mut set: Document, upsert: bool) -> Result<UpdateResult> {
    set.remove(ID_FIELD);
    let mut state = self.state.lock().await;
    if let Some(doc) = state.collection(coll).get_mut(&id) {
      let mut modified = false;
      for (field, val) in set {
        if doc.get(&field) != Some(&val) {
          doc.insert(field, val);
          modified = true;
        }
      }
      return Ok(UpdateResult {
        acknowledged: true,
        matched_count: 1,
        modified_count: modified as u64,
        upserted_count: 0,
        upserted_id: None,
      });
    }

    if !upsert {
      return Ok(UpdateResult {
        acknowledged: true,
        matched_count: 0,
        modified_count: 0,
        upserted_count: 0,
        upserted_id: None,
      });
    }

    // keep store-assigned ids from colliding with the upserted one.
    state.last_id = state.last_id.max(id.0);
    state.collection(coll).insert(id, set);
    Ok(UpdateResult {
      acknowledged: true,
      matched_count: 0,
      modified_count: 0,
      upserted_count: 1,
      upserted_id: Some(id),
    })
  }

  async fn delete_one(&self, coll: Collection, id: DocId) -> Result<DeleteResult> {
    let mut state = self.state.lock().await;
    let deleted = state.collection(coll).remove(&id).is_some();
    Ok(DeleteResult {
      acknowledged: true,
      deleted_count: deleted as u64,
    })
  }

  async fn toggle_member(&self, coll: Collection, id: DocId, toggle: &MemberToggle) -> Result<Option<Toggled>> {
    let mut state = self.state.lock().await;
    let doc = match state.collection(coll).get_mut(&id) {
      Some(doc) => doc,
      None => return Ok(None),
    };

    let mut members = match doc.get(toggle.set_field) {
      Some(Value::Array(members)) => members.clone(),
      _ => Vec::new(),
    };
    let counter = doc.get(toggle.counter_field).and_then(Value::as_i64).unwrap_or(0);

    let member = Value::String(toggle.member.clone());
    let (counter, is_member) = if members.contains(&member) {
      members.retain(|val| val != &member);
      (counter - 1, false)
    } else {
      members.push(member);
      (counter + 1, true)
    };

    doc.insert(toggle.set_field.to_string(), Value::Array(members));
    doc.insert(toggle.counter_field.to_string(), Value::from(counter));
    Ok(Some(Toggled {
      counter,
      is_member,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc(val: Value) -> Document {
    match val {
      Value::Object(map) => map,
      _ => panic!("not an object"),
    }
  }

  #[actix_rt::test]
  async fn find_filters_and_orders() {
    let store = MemoryStore::new();
    for article_id in &["a", "b", "a"] {
      store.insert_one(Collection::Comments, doc(json!({"article_id": article_id}))).await.unwrap();
    }

    let filter = Filter::new().eq("article_id", "a");
    let natural = store.find(Collection::Comments, &filter, SortOrder::Natural).await.unwrap();
    let ids: Vec<_> = natural.iter().map(|d| d[ID_FIELD].clone()).collect();
    assert_eq!(ids, vec![json!("1"), json!("3")]);

    let newest = store.find(Collection::Comments, &filter, SortOrder::IdDescending).await.unwrap();
    let ids: Vec<_> = newest.iter().map(|d| d[ID_FIELD].clone()).collect();
    assert_eq!(ids, vec![json!("3"), json!("1")]);

    // collections are separate.
    let articles = store.find(Collection::Articles, &Filter::new(), SortOrder::Natural).await.unwrap();
    assert!(articles.is_empty());
  }

  #[actix_rt::test]
  async fn distinct_is_sorted_and_unique() {
    let store = MemoryStore::new();
    for category in &["tech", "art", "tech", "sports", "art"] {
      store.insert_one(Collection::Articles, doc(json!({"category": category}))).await.unwrap();
    }
    store.insert_one(Collection::Articles, doc(json!({"title": "no category"}))).await.unwrap();

    let categories = store.distinct(Collection::Articles, "category").await.unwrap();
    assert_eq!(categories, vec!["art", "sports", "tech"]);
  }

  #[actix_rt::test]
  async fn update_merges_or_upserts() {
    let store = MemoryStore::new();
    let id = store.insert_one(Collection::Articles, doc(json!({"title": "a", "category": "tech"})))
      .await.unwrap().inserted_id;

    let res = store.update_one(Collection::Articles, id, doc(json!({"title": "b"})), true).await.unwrap();
    assert_eq!((res.matched_count, res.modified_count, res.upserted_id), (1, 1, None));
    let article = store.find_one(Collection::Articles, id).await.unwrap().unwrap();
    assert_eq!(article["title"], json!("b"));
    assert_eq!(article["category"], json!("tech"));

    let res = store.update_one(Collection::Articles, DocId(40), doc(json!({"title": "c"})), true).await.unwrap();
    assert_eq!((res.matched_count, res.upserted_count, res.upserted_id), (0, 1, Some(DocId(40))));
    assert!(store.find_one(Collection::Articles, DocId(40)).await.unwrap().is_some());

    let res = store.update_one(Collection::Articles, DocId(41), doc(json!({"title": "d"})), false).await.unwrap();
    assert_eq!((res.matched_count, res.upserted_count), (0, 0));

    // next store-assigned id is past the upserted one.
    let next = store.insert_one(Collection::Articles, Document::new()).await.unwrap();
    assert_eq!(next.inserted_id, DocId(41));
  }

  #[actix_rt::test]
  async fn toggle_member_flips_and_counts() {
    let store = MemoryStore::new();
    let id = store.insert_one(Collection::Articles, doc(json!({"likedUsers": [], "totalLikes": 0})))
      .await.unwrap().inserted_id;
    let toggle = MemberToggle {
      set_field: "likedUsers",
      counter_field: "totalLikes",
      member: "u1".to_string(),
    };

    let liked = store.toggle_member(Collection::Articles, id, &toggle).await.unwrap();
    assert_eq!(liked, Some(Toggled { counter: 1, is_member: true }));
    let unliked = store.toggle_member(Collection::Articles, id, &toggle).await.unwrap();
    assert_eq!(unliked, Some(Toggled { counter: 0, is_member: false }));

    let missing = store.toggle_member(Collection::Articles, DocId(99), &toggle).await.unwrap();
    assert_eq!(missing, None);
  }

  #[actix_rt::test]
  async fn insert_after_upsert_at_max_id_fails_cleanly() {
    let store = MemoryStore::new();
    let max = DocId(i64::MAX);
    let res = store.update_one(Collection::Articles, max, doc(json!({"title": "last"})), true).await.unwrap();
    assert_eq!(res.upserted_id, Some(max));

    let res = store.insert_one(Collection::Comments, doc(json!({"article_id": "1"}))).await;
    assert!(matches!(res, Err(Error::StoreError(_))));

    // nothing was written and the store keeps working.
    assert!(store.find(Collection::Comments, &Filter::new(), SortOrder::Natural).await.unwrap().is_empty());
    assert!(store.find_one(Collection::Articles, max).await.unwrap().is_some());
  }
}
