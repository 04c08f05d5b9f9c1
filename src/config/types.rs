use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;

/// Environment variables with this prefix override values from the YAML file.
/// Nested keys are separated by a double underscore, e.g. `STOREFRONT_API__BASE_URL`.
pub const ENV_PREFIX: &str = "STOREFRONT_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub storefront: StorefrontConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the backend lives and how long we wait for it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Upper bound for every single network call, refresh included.
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token_path: default_token_path(),
            refresh_path: default_refresh_path(),
            timeout_in_ms: default_timeout_in_ms(),
        }
    }
}

fn default_token_path() -> String {
    "/api/token/".to_string()
}

fn default_refresh_path() -> String {
    "/api/token/refresh/".to_string()
}

fn default_timeout_in_ms() -> u64 {
    5000
}

/// Resource paths of the shop backend, relative to `api.base_url`.
/// Any field left out keeps its default.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct StorefrontConfig {
    /// Store new orders are attached to and stock is checked against.
    pub store_id: String,
    pub products_path: String,
    pub customers_path: String,
    pub orders_path: String,
    pub register_path: String,
    pub stocks_path: String,
    pub payments_path: String,
    /// ISO currency code sent with payments.
    pub currency: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            store_id: "CRE71780".to_string(),
            products_path: "/api/products/".to_string(),
            customers_path: "/api/customers/".to_string(),
            orders_path: "/api/orders/".to_string(),
            register_path: "/api/register/".to_string(),
            stocks_path: "/api/stocks/".to_string(),
            payments_path: "/api/payments/".to_string(),
            currency: "eur".to_string(),
        }
    }
}

/// Load config from the given YAML file, with `STOREFRONT_*` environment overrides.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ConfigV1, figment::Error> {
    let figment = Figment::new()
        .merge(Yaml::file(path.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    extract(figment)
}

/// Parse config straight from a YAML string. Mostly useful in tests.
pub fn load_config_str(yaml: &str) -> Result<ConfigV1, figment::Error> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

fn extract(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
    // handle configuration migration between versions here when necessary
}

/// Render the JSON schema for the configuration.
pub fn config_schema() -> Result<String, serde_json::Error> {
    let schema = schema_for!(Config);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    const MINIMAL: &str = r#"
version: "1.0.0"
api:
  base_url: "http://127.0.0.1:8000"
"#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = load_config_str(MINIMAL).expect("minimal config should parse");
        assert_eq!(config.api.token_path, "/api/token/");
        assert_eq!(config.api.refresh_path, "/api/token/refresh/");
        assert_eq!(config.api.timeout_in_ms, 5000);
        assert!(!config.store.enabled);
        assert!(config.store.backend.is_none());
        assert_eq!(config.storefront.orders_path, "/api/orders/");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_partial_storefront_section_keeps_defaults() {
        let yaml = r#"
version: "1.0.0"
api:
  base_url: "http://shop.local"
storefront:
  store_id: "PAR00001"
"#;
        let config = load_config_str(yaml).expect("partial storefront section should parse");
        assert_eq!(config.storefront.store_id, "PAR00001");
        assert_eq!(config.storefront.orders_path, "/api/orders/");
        assert_eq!(config.storefront.stocks_path, "/api/stocks/");
        assert_eq!(config.storefront.currency, "eur");
    }

    #[test]
    fn test_file_store_backend() {
        let yaml = r#"
version: "1.0.0"
api:
  base_url: "http://shop.local"
  timeout_in_ms: 1500
store:
  enabled: true
  type: file
  path: /tmp/storefront-tokens.json
logging:
  level: debug
  format: json
"#;
        let config = load_config_str(yaml).expect("config should parse");
        assert_eq!(config.api.timeout_in_ms, 1500);
        assert!(config.store.enabled);
        match config.store.backend {
            Some(StoreBackend::File(file)) => {
                assert_eq!(file.path.to_string_lossy(), "/tmp/storefront-tokens.json")
            }
            None => panic!("expected a file backend"),
        }
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let yaml = r#"
version: "0.9.0"
api:
  base_url: "http://shop.local"
"#;
        assert!(load_config_str(yaml).is_err());
    }

    #[test]
    fn test_schema_mentions_sections() {
        let schema = config_schema().expect("schema should serialize");
        assert!(schema.contains("base_url"));
        assert!(schema.contains("refresh_path"));
    }
}
