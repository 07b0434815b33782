use log::*;

use async_trait::async_trait;

use serde_json::Value;

use tokio_postgres::Row;

use crate::error::*;

use crate::db::*;

static SCHEMA: &str = include_str!("../../sql/schema.sql");

struct CollectionSql {
  find: String,
  find_desc: String,
  find_one: String,
  distinct: String,
  insert: String,
  update: String,
  upsert: String,
  delete: String,
  toggle: String,
  fix_sequence: String,
}

impl CollectionSql {
  fn new(table: &str) -> Self {
    let select = format!("SELECT id, doc FROM {} WHERE doc @> $1::jsonb", table);
    Self {
      find: format!("{} ORDER BY id ASC", select),
      find_desc: format!("{} ORDER BY id DESC", select),
      find_one: format!("SELECT id, doc FROM {} WHERE id = $1", table),
      distinct: format!(r#"SELECT DISTINCT doc->>($1::text) AS val FROM {}
        WHERE jsonb_typeof(doc->($1::text)) = 'string'
        ORDER BY val"#, table),
      insert: format!("INSERT INTO {}(doc) VALUES($1) RETURNING id", table),
      update: format!("UPDATE {} SET doc = doc || $2::jsonb WHERE id = $1", table),
      upsert: format!(r#"INSERT INTO {t}(id, doc) VALUES($1, $2)
        ON CONFLICT (id) DO UPDATE SET doc = {t}.doc || EXCLUDED.doc
        RETURNING (xmax = 0) AS inserted"#, t = table),
      delete: format!("DELETE FROM {} WHERE id = $1", table),
      // $2 = set field, $3 = counter field, $4 = member
      toggle: format!(r#"UPDATE {} SET doc = CASE
          WHEN COALESCE(doc->($2::text), '[]'::jsonb) ? ($4::text) THEN
            jsonb_set(
              jsonb_set(doc, ARRAY[$2::text], COALESCE(doc->($2::text), '[]'::jsonb) - ($4::text)),
              ARRAY[$3::text], to_jsonb(COALESCE((doc->>($3::text))::bigint, 0) - 1))
          ELSE
            jsonb_set(
              jsonb_set(doc, ARRAY[$2::text], COALESCE(doc->($2::text), '[]'::jsonb) || to_jsonb($4::text)),
              ARRAY[$3::text], to_jsonb(COALESCE((doc->>($3::text))::bigint, 0) + 1))
        END
        WHERE id = $1
        RETURNING COALESCE((doc->>($3::text))::bigint, 0),
          COALESCE(doc->($2::text), '[]'::jsonb) ? ($4::text)"#, table),
      fix_sequence: format!(r#"SELECT setval(pg_get_serial_sequence('{t}', 'id'),
        GREATEST((SELECT MAX(id) FROM {t}), 1))"#, t = table),
    }
  }
}

lazy_static! {
  static ref ARTICLES_SQL: CollectionSql = CollectionSql::new("articles");
  static ref COMMENTS_SQL: CollectionSql = CollectionSql::new("comments");
}

fn document_from_row(row: &Row) -> Result<Document> {
  let id: i64 = row.get(0);
  let doc: Value = row.get(1);
  match doc {
    Value::Object(mut doc) => {
      doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
      Ok(doc)
    },
    _ => Err(Error::StoreError(format!("document {} is not an object", id))),
  }
}

struct CollectionStatements {
  find: PgStatement,
  find_desc: PgStatement,
  find_one: PgStatement,
  distinct: PgStatement,
  insert: PgStatement,
  update: PgStatement,
  upsert: PgStatement,
  delete: PgStatement,
  toggle: PgStatement,
  fix_sequence: PgStatement,
}

impl CollectionStatements {
  fn new(cl: &PgClient, sql: &CollectionSql) -> Self {
    Self {
      find: PgStatement::new(cl, &sql.find),
      find_desc: PgStatement::new(cl, &sql.find_desc),
      find_one: PgStatement::new(cl, &sql.find_one),
      distinct: PgStatement::new(cl, &sql.distinct),
      insert: PgStatement::new(cl, &sql.insert),
      update: PgStatement::new(cl, &sql.update),
      upsert: PgStatement::new(cl, &sql.upsert),
      delete: PgStatement::new(cl, &sql.delete),
      toggle: PgStatement::new(cl, &sql.toggle),
      fix_sequence: PgStatement::new(cl, &sql.fix_sequence),
    }
  }

  async fn prepare(&self) -> Result<()> {
    self.find.prepare().await?;
    self.find_desc.prepare().await?;
    self.find_one.prepare().await?;
    self.distinct.prepare().await?;

    self.insert.prepare().await?;
    self.update.prepare().await?;
    self.upsert.prepare().await?;
    self.delete.prepare().await?;

    self.toggle.prepare().await?;
    self.fix_sequence.prepare().await?;
    Ok(())
  }
}

/// Documents kept as JSONB rows, one table per collection.
pub struct PgStore {
  client: PgClient,
  migrate: bool,
  articles: CollectionStatements,
  comments: CollectionStatements,
}

impl PgStore {
  pub fn new(url: &str, migrate: bool) -> PgStore {
    let client = PgClient::new(url);
    PgStore {
      articles: CollectionStatements::new(&client, &ARTICLES_SQL),
      comments: CollectionStatements::new(&client, &COMMENTS_SQL),
      client,
      migrate,
    }
  }

  fn statements(&self, coll: Collection) -> &CollectionStatements {
    match coll {
      Collection::Articles => &self.articles,
      Collection::Comments => &self.comments,
    }
  }
}

#[async_trait(?Send)]
impl DocumentStore for PgStore {
  async fn prepare(&self) -> Result<()> {
    if self.migrate {
      info!("PgStore: create tables.");
      let conn = self.client.get().await?;
      conn.client.batch_execute(SCHEMA).await?;
    }
    info!("PgStore: prepare statements.");
    self.articles.prepare().await?;
    self.comments.prepare().await?;
    Ok(())
  }

  async fn find(&self, coll: Collection, filter: &Filter, order: SortOrder) -> Result<Vec<Document>> {
    let stmts = self.statements(coll);
    let statement = match order {
      SortOrder::Natural => &stmts.find,
      SortOrder::IdDescending => &stmts.find_desc,
    };
    let filter = Value::Object(filter.as_document().clone());
    let rows = statement.query(&[&filter]).await?;
    rows.iter().map(document_from_row).collect()
  }

  async fn find_one(&self, coll: Collection, id: DocId) -> Result<Option<Document>> {
    let row = self.statements(coll).find_one.query_opt(&[&id.0]).await?;
    row.as_ref().map(document_from_row).transpose()
  }

  async fn distinct(&self, coll: Collection, field: &str) -> Result<Vec<String>> {
    let rows = self.statements(coll).distinct.query(&[&field]).await?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
  }

  async fn insert_one(&self, coll: Collection, mut doc: Document) -> Result<InsertResult> {
    doc.remove(ID_FIELD);
    let row = self.statements(coll).insert.query_one(&[&Value::Object(doc)]).await?;
    Ok(InsertResult {
      acknowledged: true,
      inserted_id: DocId(row.get(0)),
    })
  }

  async fn update_one(&self, coll: Collection, id: DocId, mut set: Document, upsert: bool) -> Result<UpdateResult> {
    set.remove(ID_FIELD);
    let stmts = self.statements(coll);
    let set = Value::Object(set);
    if !upsert {
      let matched = stmts.update.execute(&[&id.0, &set]).await?;
      return Ok(UpdateResult {
        acknowledged: true,
        matched_count: matched,
        modified_count: matched,
        upserted_count: 0,
        upserted_id: None,
      });
    }

    let row = stmts.upsert.query_one(&[&id.0, &set]).await?;
    let inserted: bool = row.get(0);
    if inserted {
      // keep BIGSERIAL ahead of the explicit id.
      debug!("PgStore: upserted {}({}), fix sequence.", coll.name(), id);
      stmts.fix_sequence.query(&[]).await?;
      Ok(UpdateResult {
        acknowledged: true,
        matched_count: 0,
        modified_count: 0,
        upserted_count: 1,
        upserted_id: Some(id),
      })
    } else {
      Ok(UpdateResult {
        acknowledged: true,
        matched_count: 1,
        modified_count: 1,
        upserted_count: 0,
        upserted_id: None,
      })
    }
  }

  async fn delete_one(&self, coll: Collection, id: DocId) -> Result<DeleteResult> {
    let deleted = self.statements(coll).delete.execute(&[&id.0]).await?;
    Ok(DeleteResult {
      acknowledged: true,
      deleted_count: deleted,
    })
  }

  async fn toggle_member(&self, coll: Collection, id: DocId, toggle: &MemberToggle) -> Result<Option<Toggled>> {
    let row = self.statements(coll).toggle.query_opt(&[
      &id.0, &toggle.set_field, &toggle.counter_field, &toggle.member,
    ]).await?;
    Ok(row.map(|row| Toggled {
      counter: row.get(0),
      is_member: row.get(1),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::{Mutex, MutexGuard};

  use futures::future::join_all;
  use pretty_assertions::assert_eq;

  lazy_static! {
    // the tests share one set of tables.
    static ref TABLES: Mutex<()> = Mutex::new(());
  }

  fn doc(val: Value) -> Document {
    match val {
      Value::Object(map) => map,
      _ => panic!("not an object"),
    }
  }

  /// Store on emptied tables.  `None` when `THINKUP_TEST_PG_URL` is unset.
  async fn test_store() -> Option<(MutexGuard<'static, ()>, PgStore)> {
    let url = match std::env::var("THINKUP_TEST_PG_URL") {
      Ok(url) => url,
      Err(_) => {
        eprintln!("THINKUP_TEST_PG_URL not set, skipping.");
        return None;
      },
    };
    let tables = TABLES.lock().unwrap_or_else(|err| err.into_inner());
    let store = PgStore::new(&url, true);
    store.prepare().await.unwrap();
    let conn = store.client.get().await.unwrap();
    conn.client.batch_execute("TRUNCATE articles, comments RESTART IDENTITY").await.unwrap();
    Some((tables, store))
  }

  macro_rules! pg_store {
    () => {
      match test_store().await {
        Some(store) => store,
        None => return,
      }
    };
  }

  fn like(member: &str) -> MemberToggle {
    MemberToggle {
      set_field: "likedUsers",
      counter_field: "totalLikes",
      member: member.to_string(),
    }
  }

  #[actix_rt::test]
  async fn containment_filter_and_distinct() {
    let (_tables, store) = pg_store!();
    for (category, author) in &[("tech", "u1"), ("art", "u2"), ("tech", "u2")] {
      store.insert_one(Collection::Articles, doc(json!({"category": category, "author_id": author})))
        .await.unwrap();
    }
    store.insert_one(Collection::Articles, doc(json!({"category": 3}))).await.unwrap();

    let filter = Filter::new().eq("category", "tech");
    let ids: Vec<_> = store.find(Collection::Articles, &filter, SortOrder::Natural).await.unwrap()
      .iter().map(|d| d[ID_FIELD].clone()).collect();
    assert_eq!(ids, vec![json!("1"), json!("3")]);

    let filter = Filter::new().eq("category", "tech").eq("author_id", "u2");
    let found = store.find(Collection::Articles, &filter, SortOrder::Natural).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0][ID_FIELD], json!("3"));

    let all = store.find(Collection::Articles, &Filter::new(), SortOrder::Natural).await.unwrap();
    assert_eq!(all.len(), 4);

    let categories = store.distinct(Collection::Articles, "category").await.unwrap();
    assert_eq!(categories, vec!["art", "tech"]);
  }

  #[actix_rt::test]
  async fn comments_newest_first() {
    let (_tables, store) = pg_store!();
    for body in &["first", "second", "third"] {
      store.insert_one(Collection::Comments, doc(json!({"article_id": "9", "body": body}))).await.unwrap();
    }
    let filter = Filter::new().eq("article_id", "9");
    let bodies: Vec<_> = store.find(Collection::Comments, &filter, SortOrder::IdDescending).await.unwrap()
      .iter().map(|d| d["body"].clone()).collect();
    assert_eq!(bodies, vec![json!("third"), json!("second"), json!("first")]);
  }

  #[actix_rt::test]
  async fn upsert_merges_and_moves_sequence() {
    let (_tables, store) = pg_store!();

    let res = store.update_one(Collection::Articles, DocId(50), doc(json!({"title": "a", "category": "tech"})), true)
      .await.unwrap();
    assert_eq!((res.matched_count, res.upserted_count, res.upserted_id), (0, 1, Some(DocId(50))));

    let res = store.update_one(Collection::Articles, DocId(50), doc(json!({"title": "b"})), true).await.unwrap();
    assert_eq!((res.matched_count, res.upserted_count, res.upserted_id), (1, 0, None));
    let article = store.find_one(Collection::Articles, DocId(50)).await.unwrap().unwrap();
    assert_eq!(article["title"], json!("b"));
    assert_eq!(article["category"], json!("tech"));

    let res = store.update_one(Collection::Articles, DocId(60), doc(json!({"title": "c"})), false).await.unwrap();
    assert_eq!((res.matched_count, res.upserted_count), (0, 0));
    assert!(store.find_one(Collection::Articles, DocId(60)).await.unwrap().is_none());

    let next = store.insert_one(Collection::Articles, Document::new()).await.unwrap();
    assert_eq!(next.inserted_id, DocId(51));

    let res = store.delete_one(Collection::Articles, DocId(50)).await.unwrap();
    assert_eq!(res.deleted_count, 1);
    let res = store.delete_one(Collection::Articles, DocId(50)).await.unwrap();
    assert_eq!(res.deleted_count, 0);
  }

  #[actix_rt::test]
  async fn toggle_flips_in_one_statement() {
    let (_tables, store) = pg_store!();
    let id = store.insert_one(Collection::Articles, doc(json!({"likedUsers": [], "totalLikes": 0})))
      .await.unwrap().inserted_id;

    let res = store.toggle_member(Collection::Articles, id, &like("u1")).await.unwrap();
    assert_eq!(res, Some(Toggled { counter: 1, is_member: true }));
    let article = store.find_one(Collection::Articles, id).await.unwrap().unwrap();
    assert_eq!(article["likedUsers"], json!(["u1"]));

    let res = store.toggle_member(Collection::Articles, id, &like("u1")).await.unwrap();
    assert_eq!(res, Some(Toggled { counter: 0, is_member: false }));

    // fields missing on an upserted document start empty.
    store.update_one(Collection::Articles, DocId(70), doc(json!({"title": "bare"})), true).await.unwrap();
    let res = store.toggle_member(Collection::Articles, DocId(70), &like("u1")).await.unwrap();
    assert_eq!(res, Some(Toggled { counter: 1, is_member: true }));

    let res = store.toggle_member(Collection::Articles, DocId(99), &like("u1")).await.unwrap();
    assert_eq!(res, None);
  }

  #[actix_rt::test]
  async fn concurrent_toggles_keep_counter_in_step() {
    let (_tables, store) = pg_store!();
    let id = store.insert_one(Collection::Articles, doc(json!({"likedUsers": [], "totalLikes": 0})))
      .await.unwrap().inserted_id;

    // every third user toggles twice and ends up not liking.
    let toggles: Vec<_> = (0..60).map(|i| like(&format!("user-{}", i))).collect();
    let calls = toggles.iter()
      .chain(toggles.iter().step_by(3))
      .map(|toggle| store.toggle_member(Collection::Articles, id, toggle));
    for res in join_all(calls).await {
      assert!(res.unwrap().is_some());
    }

    let article = store.find_one(Collection::Articles, id).await.unwrap().unwrap();
    let liked = article["likedUsers"].as_array().unwrap();
    assert_eq!(liked.len(), 40);
    assert_eq!(article["totalLikes"], json!(40));
  }

  #[actix_rt::test]
  async fn reconnects_after_backend_is_terminated() {
    let (_tables, store) = pg_store!();
    store.insert_one(Collection::Articles, doc(json!({"category": "tech"}))).await.unwrap();

    let conn = store.client.get().await.unwrap();
    let generation = conn.generation;
    // the session ends under us, the result is irrelevant.
    let _ = conn.client.batch_execute("SELECT pg_terminate_backend(pg_backend_pid())").await;
    drop(conn);

    let all = store.find(Collection::Articles, &Filter::new(), SortOrder::Natural).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(store.client.get().await.unwrap().generation > generation);
  }
}
