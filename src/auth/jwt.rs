use log::*;

use serde::{Deserialize, Serialize};

use chrono::{Duration, Utc};

use jsonwebtoken::{
  encode, Header, EncodingKey,
  decode, DecodingKey,
  Validation
};

use crate::error::*;
use crate::app::AppConfig;
use crate::auth::{AuthData, TokenVerifier};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String,
  pub exp: i64,
}

/// HS256 tokens signed with a shared secret.
pub struct JwtVerifier {
  encoding: EncodingKey,
  decoding: DecodingKey,
}

impl JwtVerifier {
  pub fn new(secret: &str) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_ref()),
      decoding: DecodingKey::from_secret(secret.as_ref()),
    }
  }

  /// Secret from `auth.secret`, falling back to the `JWT_SECRET` environment variable.
  pub fn from_app_config(config: &AppConfig) -> Result<Self> {
    let secret = match config.get_str("auth.secret")? {
      Some(secret) => secret,
      None => dotenv::var("JWT_SECRET").map_err(|_| {
        anyhow::anyhow!("Missing auth.secret config or JWT_SECRET environment variable.")
      })?,
    };
    Ok(Self::new(&secret))
  }

  pub fn generate_jwt(&self, user_id: &str, valid_for: Duration) -> Result<String> {
    let exp = Utc::now().checked_add_signed(valid_for)
      .ok_or_else(|| anyhow::anyhow!("token lifetime out of range"))?;
    let claims = Claims{
      sub: user_id.to_string(),
      exp: exp.timestamp(),
    };

    let token = encode(&Header::default(), &claims, &self.encoding)?;
    Ok(token)
  }
}

impl TokenVerifier for JwtVerifier {
  fn verify(&self, token: &str) -> Result<AuthData> {
    let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
      .map_err(|err| {
        debug!("JWT rejected: {:?}", err);
        Error::unauthorized("Invalid authorization token")
      })?;
    Ok(AuthData{
      user_id: token_data.claims.sub,
      token: token.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verify_issued_token() {
    let jwt = JwtVerifier::new("secret");
    let token = jwt.generate_jwt("u1", Duration::days(1)).unwrap();

    let auth = jwt.verify(&token).unwrap();
    assert_eq!(auth.user_id, "u1");
    assert_eq!(auth.token, token);
  }

  #[test]
  fn reject_foreign_and_expired_tokens() {
    let jwt = JwtVerifier::new("secret");

    let foreign = JwtVerifier::new("other secret")
      .generate_jwt("u1", Duration::days(1)).unwrap();
    assert!(matches!(jwt.verify(&foreign), Err(Error::Unauthorized(_))));

    let expired = jwt.generate_jwt("u1", Duration::days(-1)).unwrap();
    assert!(matches!(jwt.verify(&expired), Err(Error::Unauthorized(_))));

    assert!(matches!(jwt.verify("not.a.token"), Err(Error::Unauthorized(_))));
  }

  #[test]
  fn lifetime_past_calendar_range() {
    let jwt = JwtVerifier::new("secret");
    let res = jwt.generate_jwt("u1", Duration::days(1_000_000_000));
    assert!(matches!(res, Err(Error::Other(_))));
  }
}
