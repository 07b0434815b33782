use log::*;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::Value as JsonValue;

use jsonwebtoken::errors::Error as JwtError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  // 401
  #[error("unauthorized: {0}")]
  Unauthorized(JsonValue),

  // 404
  #[error("not found: {0}")]
  NotFound(JsonValue),

  // 400
  #[error("bad request: {0}")]
  BadRequest(String),

  // 500
  #[error("store error: {0}")]
  StoreError(String),

  // Json error
  #[error("Json error: {source}")]
  JsonError {
    #[from]
    source: serde_json::Error,
  },

  #[error("JWT error")]
  JwtError {
    #[from]
    source: JwtError,
  },

  #[error("postgres error")]
  PgError {
    #[from]
    source: tokio_postgres::error::Error,
  },

  #[error("std io error")]
  IOError {
    #[from]
    source: std::io::Error,
  },

  #[error("config error")]
  ConfigError {
    #[from]
    source: config::ConfigError,
  },

  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl Error {
  pub fn not_found(message: &str) -> Self {
    Error::NotFound(json!({
      "message": message,
    }))
  }

  pub fn unauthorized(message: &str) -> Self {
    Error::Unauthorized(json!({
      "error": message,
    }))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// the ResponseError trait lets us convert errors to http responses with appropriate data
// https://actix.rs/docs/errors/
impl ResponseError for Error {
  fn status_code(&self) -> StatusCode {
    match self {
      Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    match self {
      Error::Unauthorized(ref message) => HttpResponse::Unauthorized().json(message),
      Error::NotFound(ref message) => HttpResponse::NotFound().json(message),
      Error::BadRequest(ref message) => {
        HttpResponse::build(StatusCode::BAD_REQUEST).json(json!({
          "message": message,
        }))
      },
      ref err => {
        error!("InternalServerError: {:?}", err);
        HttpResponse::InternalServerError().json(json!({
          "error": "Internal Server Error",
        }))
      },
    }
  }
}
