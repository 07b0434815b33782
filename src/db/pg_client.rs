use log::*;

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::time::sleep;

use tokio_postgres::{
  connect, Client, NoTls, Row, Statement,
  types::ToSql,
  Error as PgError,
};

use crate::error::*;

const RECONNECT_DELAY: Duration = Duration::from_millis(500);
const POLL_DELAY: Duration = Duration::from_millis(100);
/// Polls of `POLL_DELAY` before a request gives up on the connection.
const MAX_WAITS: u32 = 20;
const MAX_RETRIES: u32 = 3;

fn disconnected() -> Error {
  Error::StoreError("Failed to connect to database".to_string())
}

/// One live connection.  `generation` changes on every reconnect.
pub struct PgConn {
  pub generation: u64,
  pub client: Client,
}

#[derive(Clone)]
enum Link {
  Down(u64),
  Up(Rc<PgConn>),
}

/// Per-worker postgres client, kept connected by a background task.
///
/// The task only holds a weak reference: once every handle is dropped the
/// client closes and the task stops.
#[derive(Clone)]
pub struct PgClient {
  link: Rc<RefCell<Link>>,
}

impl PgClient {
  pub fn new(url: &str) -> Self {
    let link = Rc::new(RefCell::new(Link::Down(0)));
    actix_rt::spawn(maintain(Rc::downgrade(&link), url.to_string()));
    Self {
      link,
    }
  }

  /// Wait for the connection to come up.
  pub async fn get(&self) -> Result<Rc<PgConn>> {
    for _ in 0..MAX_WAITS {
      let link = self.link.borrow().clone();
      match link {
        Link::Up(conn) => return Ok(conn),
        Link::Down(generation) => {
          trace!("pg: waiting for connection, last generation={}", generation);
          sleep(POLL_DELAY).await;
        },
      }
    }
    Err(disconnected())
  }
}

async fn maintain(link: Weak<RefCell<Link>>, url: String) {
  let mut generation = 0;
  loop {
    generation += 1;
    let (client, conn) = loop {
      match connect(&url, NoTls).await {
        Ok(pair) => break pair,
        Err(err) => {
          error!("pg: generation {}: connect error: {}", generation, err);
          if link.strong_count() == 0 {
            return;
          }
          sleep(RECONNECT_DELAY).await;
        },
      }
    };

    match link.upgrade() {
      Some(link) => {
        info!("pg: generation {}: connected.", generation);
        *link.borrow_mut() = Link::Up(Rc::new(PgConn { generation, client }));
      },
      None => return,
    }

    // A clean close and an error both lead to a reconnect.
    match conn.await {
      Ok(()) => info!("pg: generation {}: connection closed.", generation),
      Err(err) => warn!("pg: generation {}: connection error: {}", generation, err),
    }

    match link.upgrade() {
      Some(link) => *link.borrow_mut() = Link::Down(generation),
      None => {
        debug!("pg: client dropped, stop reconnecting.");
        return;
      },
    }
    sleep(RECONNECT_DELAY).await;
  }
}

/// A statement prepared lazily on the current connection, and again after a reconnect.
pub struct PgStatement {
  client: PgClient,
  sql: String,
  prepared: RefCell<Option<(u64, Statement)>>,
}

impl PgStatement {
  pub fn new(client: &PgClient, sql: &str) -> Self {
    Self {
      client: client.clone(),
      sql: sql.to_string(),
      prepared: RefCell::new(None),
    }
  }

  pub async fn prepare(&self) -> Result<()> {
    self.run(|_, _| async { Ok(()) }).await
  }

  async fn statement(&self, conn: &PgConn) -> Result<Statement, PgError> {
    let cached = self.prepared.borrow().as_ref()
      .filter(|(generation, _)| *generation == conn.generation)
      .map(|(_, statement)| statement.clone());
    if let Some(statement) = cached {
      return Ok(statement);
    }
    let statement = conn.client.prepare(&self.sql).await?;
    self.prepared.replace(Some((conn.generation, statement.clone())));
    Ok(statement)
  }

  /// Run against the current connection.  Retried when the connection was lost mid-call.
  async fn run<T, F, Fut>(&self, call: F) -> Result<T>
  where
    F: Fn(Rc<PgConn>, Statement) -> Fut,
    Fut: Future<Output = Result<T, PgError>>,
  {
    let mut retries = 0;
    loop {
      let conn = self.client.get().await?;
      let res = match self.statement(&conn).await {
        Ok(statement) => call(conn, statement).await,
        Err(err) => Err(err),
      };
      match res {
        Ok(val) => return Ok(val),
        Err(err) if err.is_closed() && retries < MAX_RETRIES => {
          retries += 1;
          info!("pg: connection lost, retry {}: [[{}]]", retries, self.sql);
          sleep(POLL_DELAY).await;
        },
        Err(err) => {
          error!("Postgres error: {}, query=[[{}]]", err, self.sql);
          return Err(err.into());
        },
      }
    }
  }

  pub async fn query(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
    self.run(|conn, statement| async move {
      conn.client.query(&statement, params).await
    }).await
  }

  pub async fn query_one(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Row> {
    self.run(|conn, statement| async move {
      conn.client.query_one(&statement, params).await
    }).await
  }

  pub async fn query_opt(&self, params: &[&(dyn ToSql + Sync)]) -> Result<Option<Row>> {
    self.run(|conn, statement| async move {
      conn.client.query_opt(&statement, params).await
    }).await
  }

  pub async fn execute(&self, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
    self.run(|conn, statement| async move {
      conn.client.execute(&statement, params).await
    }).await
  }
}
