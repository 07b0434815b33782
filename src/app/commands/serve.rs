use log::*;

use std::sync::Arc;

use futures::future::try_join_all;

use actix_cors::Cors;
use actix_rt::System;
use actix_web::{dev::Server, middleware, App, HttpServer};

use crate::{
  error::*,
  app::*,
  auth::{JwtVerifier, TokenVerifier},
  db::StoreConfig,
  services::config_services,
};

const DEFAULT_PORT: u16 = 3000;

pub fn execute(config: AppConfig) -> Result<()> {
  System::new().block_on(run_servers(config))
}

async fn run_servers(config: AppConfig) -> Result<()> {
  let store = StoreConfig::from_app_config(&config)?;
  let verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::from_app_config(&config)?);

  // The servers still start when the store is down.  Requests fail until it is back.
  if let Err(err) = store.connect().prepare().await {
    error!("Failed to prepare store: {:?}", err);
  }

  let prefixes = config.get_str_list("servers")?
    .ok_or_else(|| anyhow::anyhow!("Missing list of servers"))?;
  let mut servers = Vec::with_capacity(prefixes.len());
  for prefix in prefixes.iter() {
    debug!("Start server: {}", prefix);
    servers.push(run_server(&config, prefix, store.clone(), verifier.clone())?);
  }

  try_join_all(servers).await?;
  info!("main thread: stopped.");
  Ok(())
}

fn listen_addr(config: &AppConfig, prefix: &str) -> Result<String> {
  if let Some(listen) = config.get_str(&format!("{}.listen", prefix))? {
    return Ok(listen);
  }
  let port = match std::env::var("PORT") {
    Ok(port) => port.parse::<u16>()
      .map_err(|_| anyhow::anyhow!("Invalid PORT: {}", port))?,
    Err(_) => DEFAULT_PORT,
  };
  Ok(format!("0.0.0.0:{}", port))
}

fn run_server(
  config: &AppConfig,
  prefix: &str,
  store: StoreConfig,
  verifier: Arc<dyn TokenVerifier>,
) -> Result<Server> {
  let debug = config.get_bool("debug")?.unwrap_or(false);
  debug!("Debug = {:?}", debug);

  // configure services
  info!("Serve.Services: configure services. prefix={}", prefix);
  let services = config_services(config, prefix, store, verifier)?;

  let cors = config.get_bool(&format!("{}.cors", prefix))?.unwrap_or(true);
  let logger = config.get_bool(&format!("{}.logger", prefix))?.unwrap_or(debug);

  // Start http server
  let mut server = HttpServer::new(move || {
    App::new()
      .wrap(middleware::Condition::new(logger, middleware::Logger::default()))
      .wrap(middleware::Condition::new(cors, Cors::permissive()))
      .wrap(middleware::Compress::default())
      .configure(|web| services.web_config(web))
  });

  // workers
  if let Some(workers) = config.get_int(&format!("{}.workers", prefix))? {
    info!("Workers: {}", workers);
    let workers = usize::try_from(workers).ok().filter(|w| *w > 0)
      .ok_or_else(|| anyhow::anyhow!("{}.workers must be > 0", prefix))?;
    server = server.workers(workers);
  }

  // listen backlog
  if let Some(backlog) = config.get_int(&format!("{}.backlog", prefix))? {
    info!("Listen backlog: {}", backlog);
    let backlog = u32::try_from(backlog)
      .map_err(|_| anyhow::anyhow!("{}.backlog must be >= 0", prefix))?;
    server = server.backlog(backlog);
  }

  // setup binds.
  let listen = listen_addr(config, prefix)?;
  info!("{} services listening on: {}", prefix, listen);
  server = server.bind(listen)?;

  Ok(server.run())
}
