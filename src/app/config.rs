use serde::de::DeserializeOwned;

use config::{Config, ConfigError, Value, File, FileFormat, Environment};

use crate::error::*;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub conf: Config
}

impl AppConfig {
  pub fn new(config_file: Option<&str>) -> Result<Self> {
    // Load defaults
    let mut builder = Config::builder()
      .add_source(File::with_name("conf/default").required(false));

    if let Some(config_file) = config_file {
      builder = builder.add_source(File::with_name(config_file));
    } else {
      // Get RUN_MODE from environment
      let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
      builder = builder
        .add_source(File::with_name(&format!("conf/{}", env)).required(false))
        // Allow overrides from environment
        .add_source(Environment::with_prefix("app").separator("_"));
    }

    Ok(AppConfig {
      conf: builder.build()?,
    })
  }

  /// Build config from an inline toml document.
  pub fn from_toml(toml: &str) -> Result<Self> {
    let conf = Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?;
    Ok(AppConfig {
      conf,
    })
  }

  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    match self.conf.get::<T>(key) {
      Ok(val) => Ok(Some(val)),
      Err(ConfigError::NotFound(_)) => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  pub fn get_str(&self, key: &str) -> Result<Option<String>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_string()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_int()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_bool()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_array(&self, key: &str) -> Result<Option<Vec<Value>>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_array()?)
    } else {
      None
    };
    Ok(val)
  }

  /// Get a list of strings, e.g. service names.
  pub fn get_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
    let val = if let Some(list) = self.get_array(key)? {
      let mut names = Vec::with_capacity(list.len());
      for val in list {
        names.push(val.into_string()?);
      }
      Some(names)
    } else {
      None
    };
    Ok(val)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_are_none() {
    let config = AppConfig::from_toml(r#"
      debug = true

      [api]
      listen = "127.0.0.1:3000"
      workers = 2
      services = ["Health", "Article"]
    "#).unwrap();

    assert_eq!(config.get_bool("debug").unwrap(), Some(true));
    assert_eq!(config.get_str("api.listen").unwrap().as_deref(), Some("127.0.0.1:3000"));
    assert_eq!(config.get_int("api.workers").unwrap(), Some(2));
    assert_eq!(config.get_str_list("api.services").unwrap(),
      Some(vec!["Health".to_string(), "Article".to_string()]));

    assert_eq!(config.get_str("db.url").unwrap(), None);
    assert_eq!(config.get_bool("api.cors").unwrap(), None);
  }
}
