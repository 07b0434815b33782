use log::*;

use std::collections::HashMap;

use futures::future::{ok, ready, LocalBoxFuture, Ready};

use actix_web::{
  body::EitherBody,
  http::header::{
    HeaderMap, AUTHORIZATION
  },
  web, HttpMessage,
  HttpRequest, FromRequest
};
use actix_web::dev::{
  forward_ready,
  Service, Transform,
  ServiceRequest, ServiceResponse,
  Payload,
};

use crate::error::*;
use crate::auth::{AuthData, TokenVerifier};

const TOKEN_PREFIX: &str = "Bearer ";

pub fn decode_bearer(headers: &HeaderMap, verifier: &dyn TokenVerifier) -> Result<Option<AuthData>> {
  let token = match headers.get(AUTHORIZATION) {
    Some(token) => {
      let token = token.to_str().map_err(|_| {
        Error::unauthorized("Invalid authorization token")
      })?;
      match token.strip_prefix(TOKEN_PREFIX) {
        Some(token) => token.trim(),
        None => {
          return Err(Error::unauthorized("Invalid authorization method"));
        },
      }
    },
    None => {
      // No authorization provided.  Allow caller to decide if this is an error.
      return Ok(None);
    },
  };

  Ok(Some(verifier.verify(token)?))
}

impl FromRequest for AuthData {
  type Error = Error;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
    match req.extensions().get::<AuthData>() {
      Some(auth) => {
        ok(auth.clone())
      },
      None => {
        ready(Err(Error::unauthorized("authorization required")))
      }
    }
  }
}

/// When a route needs a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthPolicy {
  Required,
  /// Only when the named query parameter has a non-empty value.
  RequiredWithQuery(&'static str),
}

impl AuthPolicy {
  pub fn applies(&self, query: &str) -> bool {
    match *self {
      AuthPolicy::Required => true,
      AuthPolicy::RequiredWithQuery(param) => {
        match web::Query::<HashMap<String, String>>::from_query(query) {
          Ok(params) => params.get(param).map_or(false, |val| !val.is_empty()),
          Err(_) => false,
        }
      },
    }
  }
}

pub struct Auth {
  pub policy: AuthPolicy,
}

impl Auth {
  pub fn required() -> Self {
    Self {
      policy: AuthPolicy::Required,
    }
  }

  pub fn when_query(param: &'static str) -> Self {
    Self {
      policy: AuthPolicy::RequiredWithQuery(param),
    }
  }
}

impl<S, B> Transform<S, ServiceRequest> for Auth
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = actix_web::Error;
  type InitError = ();
  type Transform = AuthMiddleware<S>;
  type Future = Ready<Result<Self::Transform, Self::InitError>>;

  fn new_transform(&self, service: S) -> Self::Future {
    ok(AuthMiddleware {
      policy: self.policy,
      service
    })
  }
}

pub struct AuthMiddleware<S> {
  policy: AuthPolicy,
  service: S,
}

fn authorize(req: &ServiceRequest) -> Result<AuthData> {
  let verifier = req.app_data::<web::Data<dyn TokenVerifier>>()
    .ok_or_else(|| anyhow::anyhow!("No TokenVerifier registered"))?;
  match decode_bearer(req.headers(), verifier.get_ref())? {
    Some(auth_data) => Ok(auth_data),
    None => Err(Error::unauthorized("authorization required")),
  }
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
  S::Future: 'static,
  B: 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = actix_web::Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  forward_ready!(service);

  fn call(&self, req: ServiceRequest) -> Self::Future {
    if self.policy.applies(req.query_string()) {
      match authorize(&req) {
        Ok(auth_data) => {
          debug!("Has authorization token: user_id={}", auth_data.user_id);
          req.extensions_mut().insert(auth_data);
        },
        Err(err) => {
          debug!("Auth check failed: policy={:?}, err={:?}", self.policy, err);
          let res = req.error_response(err).map_into_right_body();
          return Box::pin(ok(res));
        },
      }
    }

    let fut = self.service.call(req);
    Box::pin(async move {
      Ok(fut.await?.map_into_left_body())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conditional_policy_needs_non_empty_param() {
    let policy = AuthPolicy::RequiredWithQuery("author_id");
    assert!(policy.applies("author_id=u1"));
    assert!(policy.applies("category=tech&author_id=u1"));
    assert!(!policy.applies("category=tech"));
    assert!(!policy.applies("author_id="));
    assert!(!policy.applies(""));

    assert!(AuthPolicy::Required.applies(""));
  }
}
