use chrono::Duration;

use crate::{
  error::*,
  app::*,
  auth::JwtVerifier,
};

fn token_lifetime(days: i64) -> Result<Duration> {
  match Duration::try_days(days) {
    Some(lifetime) if days > 0 => Ok(lifetime),
    _ => Err(anyhow::anyhow!("--days out of range: {}", days).into()),
  }
}

/// Print a bearer token for `user_id`, signed with the configured secret.
pub fn execute(config: AppConfig, user_id: &str, days: i64) -> Result<()> {
  let valid_for = token_lifetime(days)?;
  let jwt = JwtVerifier::from_app_config(&config)?;
  let token = jwt.generate_jwt(user_id, valid_for)?;
  println!("{}", token);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifetime_in_range() {
    assert_eq!(token_lifetime(21).unwrap(), Duration::days(21));
    assert!(token_lifetime(0).is_err());
    assert!(token_lifetime(-1).is_err());
    assert!(token_lifetime(i64::MAX).is_err());
  }
}
