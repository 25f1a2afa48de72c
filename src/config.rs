use crate::error::NamelyError;
use log::debug;
use std::env;
use std::time::Duration;
#[cfg(feature = "trace")]
use tracing::instrument;

/// Connection settings for the document store holding the profile record.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
    pub name_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert: String,
    pub key: String,
}

/// Service configuration, sourced from environment variables with defaults
/// suitable for a local docker-compose style deployment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub default_name: String,
    pub static_root: Option<String>,
    pub tls: Option<TlsConfig>,
}

fn var_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    #[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
    pub fn from_env() -> Result<AppConfig, NamelyError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig, NamelyError> {
        let timeout_secs = var_or(&lookup, "STORE_TIMEOUT_SECS", "5").parse::<u64>()?;

        let tls = match (lookup("TLS_CERT_FILE"), lookup("TLS_KEY_FILE")) {
            (Some(cert), Some(key)) => Some(TlsConfig { cert, key }),
            (None, None) => None,
            _ => {
                return Err(NamelyError::ConfigError {
                    details: "TLS_CERT_FILE and TLS_KEY_FILE must be set together".to_string(),
                });
            }
        };

        let config = AppConfig {
            store: StoreConfig {
                url: var_or(&lookup, "MONGO_URL", "mongodb://127.0.0.1:27017"),
                database: var_or(&lookup, "MONGO_DB", "fkdb"),
                collection: var_or(&lookup, "MONGO_COLLECTION", "profile"),
                name_key: var_or(&lookup, "NAME_KEY", "name"),
                timeout: Duration::from_secs(timeout_secs),
            },
            default_name: var_or(&lookup, "DEFAULT_NAME", "Frank Koch"),
            static_root: lookup("STATIC_ROOT"),
            tls,
        };

        #[cfg(debug_assertions)]
        debug!("{:#?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use std::collections::HashMap;
    use std::error::Error;

    fn from_map(vars: &[(&str, &str)]) -> Result<AppConfig, Box<dyn Error>> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok(AppConfig::from_lookup(|key| map.get(key).cloned())?)
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let config = from_map(&[])?;
        assert_eq!(config.store.url, "mongodb://127.0.0.1:27017");
        assert_eq!(config.store.database, "fkdb");
        assert_eq!(config.store.collection, "profile");
        assert_eq!(config.store.name_key, "name");
        assert_eq!(config.store.timeout.as_secs(), 5);
        assert_eq!(config.default_name, "Frank Koch");
        assert!(config.static_root.is_none());
        assert!(config.tls.is_none());
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<(), Box<dyn Error>> {
        let config = from_map(&[
            ("MONGO_URL", "mongodb://mongo:27017"),
            ("MONGO_DB", "demo"),
            ("MONGO_COLLECTION", "people"),
            ("NAME_KEY", "display_name"),
            ("DEFAULT_NAME", "Jane Doe"),
            ("STORE_TIMEOUT_SECS", "3"),
            ("STATIC_ROOT", "/srv/frontend"),
        ])?;
        assert_eq!(config.store.url, "mongodb://mongo:27017");
        assert_eq!(config.store.database, "demo");
        assert_eq!(config.store.collection, "people");
        assert_eq!(config.store.name_key, "display_name");
        assert_eq!(config.store.timeout.as_secs(), 3);
        assert_eq!(config.default_name, "Jane Doe");
        assert_eq!(config.static_root.as_deref(), Some("/srv/frontend"));
        Ok(())
    }

    #[test]
    fn test_tls_pair() -> Result<(), Box<dyn Error>> {
        let config = from_map(&[
            ("TLS_CERT_FILE", "/etc/tls/server.crt"),
            ("TLS_KEY_FILE", "/etc/tls/server.key"),
        ])?;
        let tls = config.tls.expect("tls config");
        assert_eq!(tls.cert, "/etc/tls/server.crt");
        assert_eq!(tls.key, "/etc/tls/server.key");
        Ok(())
    }

    #[test]
    fn test_tls_cert_without_key_rejected() {
        assert!(from_map(&[("TLS_CERT_FILE", "/etc/tls/server.crt")]).is_err());
    }

    #[test]
    fn test_bad_timeout_rejected() {
        assert!(from_map(&[("STORE_TIMEOUT_SECS", "soon")]).is_err());
    }
}
