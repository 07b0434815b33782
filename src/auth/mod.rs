pub mod jwt;
pub use jwt::*;

use crate::error::*;

/// Decoded identity of a verified bearer token.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuthData {
  pub user_id: String,
  pub token: String,
}

/// Verifies bearer tokens.  Shared by all workers.
pub trait TokenVerifier: Send + Sync {
  fn verify(&self, token: &str) -> Result<AuthData>;
}
