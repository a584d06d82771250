//! Configuration loading and representation.
//!
//! Settings come from the process environment. Loading goes through a lookup
//! function so tests can supply their own values.

use thiserror::Error;

use crate::client::{ClientOptions, ConsistencyLevel};

pub const ENV_ACCOUNT_HOST: &str = "ACCOUNT_HOST";
pub const ENV_ACCOUNT_KEY: &str = "ACCOUNT_KEY";
pub const ENV_STORE_BACKEND: &str = "STORE_BACKEND";
pub const ENV_PREFERRED_REGIONS: &str = "PREFERRED_REGIONS";
pub const ENV_CONSISTENCY_LEVEL: &str = "CONSISTENCY_LEVEL";
pub const ENV_CREATE_ITEMS: &str = "DEMO_CREATE_ITEMS";
pub const ENV_READ_ITEMS: &str = "DEMO_READ_ITEMS";
pub const ENV_QUERY_PAGE_SIZE: &str = "QUERY_PAGE_SIZE";

const DEFAULT_PREFERRED_REGION: &str = "West US";
const DEFAULT_PAGE_SIZE: u32 = 10;
const IN_MEMORY_ENDPOINT: &str = "memory://local";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which document store adapter to connect through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Gateway,
    InMemory,
}

/// Demo settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: StoreBackend,
    pub client: ClientOptions,
    /// Insert the sample records before querying.
    pub create_items: bool,
    /// Point-read each sample record before querying.
    pub read_items: bool,
    pub page_size: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend = match get(ENV_STORE_BACKEND) {
            None => StoreBackend::default(),
            Some(v) => parse_backend(&v)?,
        };

        let (endpoint, key) = match backend {
            StoreBackend::Gateway => (
                get(ENV_ACCOUNT_HOST).ok_or(ConfigError::Missing(ENV_ACCOUNT_HOST))?,
                get(ENV_ACCOUNT_KEY).ok_or(ConfigError::Missing(ENV_ACCOUNT_KEY))?,
            ),
            StoreBackend::InMemory => (
                get(ENV_ACCOUNT_HOST).unwrap_or_else(|| IN_MEMORY_ENDPOINT.to_string()),
                get(ENV_ACCOUNT_KEY).unwrap_or_default(),
            ),
        };

        let consistency_level = match get(ENV_CONSISTENCY_LEVEL) {
            None => ConsistencyLevel::Eventual,
            Some(v) => v.parse().map_err(|e| ConfigError::Invalid {
                var: ENV_CONSISTENCY_LEVEL,
                value: v.clone(),
                reason: format!("{e}"),
            })?,
        };

        let preferred_regions = match get(ENV_PREFERRED_REGIONS) {
            None => vec![DEFAULT_PREFERRED_REGION.to_string()],
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        };

        let page_size = match get(ENV_QUERY_PAGE_SIZE) {
            None => DEFAULT_PAGE_SIZE,
            Some(v) => match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_QUERY_PAGE_SIZE,
                        value: v,
                        reason: "expected a positive integer".to_string(),
                    });
                }
            },
        };

        Ok(Self {
            backend,
            client: ClientOptions {
                endpoint,
                key,
                consistency_level,
                preferred_regions,
            },
            create_items: parse_flag(ENV_CREATE_ITEMS, get(ENV_CREATE_ITEMS))?,
            read_items: parse_flag(ENV_READ_ITEMS, get(ENV_READ_ITEMS))?,
            page_size,
        })
    }
}

fn parse_backend(value: &str) -> Result<StoreBackend, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gateway" | "cosmos" => Ok(StoreBackend::Gateway),
        "memory" | "in-memory" | "inmemory" => Ok(StoreBackend::InMemory),
        _ => Err(ConfigError::Invalid {
            var: ENV_STORE_BACKEND,
            value: value.to_string(),
            reason: "expected 'gateway' or 'memory'".to_string(),
        }),
    }
}

fn parse_flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn gateway_requires_host_and_key() {
        assert_eq!(load(&[]), Err(ConfigError::Missing(ENV_ACCOUNT_HOST)));
        assert_eq!(
            load(&[(ENV_ACCOUNT_HOST, "https://acct.example.com:443/")]),
            Err(ConfigError::Missing(ENV_ACCOUNT_KEY))
        );
        assert_eq!(
            load(&[(ENV_ACCOUNT_HOST, "   "), (ENV_ACCOUNT_KEY, "a2V5")]),
            Err(ConfigError::Missing(ENV_ACCOUNT_HOST))
        );
    }

    #[test]
    fn defaults_reproduce_the_observed_flow() {
        let settings = load(&[
            (ENV_ACCOUNT_HOST, "https://acct.example.com:443/"),
            (ENV_ACCOUNT_KEY, "a2V5"),
        ])
        .unwrap();

        assert_eq!(settings.backend, StoreBackend::Gateway);
        assert_eq!(settings.client.consistency_level, ConsistencyLevel::Eventual);
        assert_eq!(settings.client.preferred_regions, vec!["West US"]);
        assert!(!settings.create_items);
        assert!(!settings.read_items);
        assert_eq!(settings.page_size, 10);

        let settings = load(&[
            (ENV_STORE_BACKEND, "Cosmos"),
            (ENV_ACCOUNT_HOST, "https://acct.example.com:443/"),
            (ENV_ACCOUNT_KEY, "a2V5"),
        ])
        .unwrap();
        assert_eq!(settings.backend, StoreBackend::Gateway);
    }

    #[test]
    fn in_memory_backend_needs_no_account() {
        let settings = load(&[(ENV_STORE_BACKEND, "memory")]).unwrap();
        assert_eq!(settings.backend, StoreBackend::InMemory);
        assert_eq!(settings.client.endpoint, IN_MEMORY_ENDPOINT);
        assert!(settings.client.key.is_empty());
    }

    #[test]
    fn optional_settings_are_parsed() {
        let settings = load(&[
            (ENV_STORE_BACKEND, "memory"),
            (ENV_PREFERRED_REGIONS, "East US, ,West Europe"),
            (ENV_CONSISTENCY_LEVEL, "session"),
            (ENV_CREATE_ITEMS, "true"),
            (ENV_READ_ITEMS, "1"),
            (ENV_QUERY_PAGE_SIZE, "25"),
        ])
        .unwrap();

        assert_eq!(settings.client.preferred_regions, vec!["East US", "West Europe"]);
        assert_eq!(settings.client.consistency_level, ConsistencyLevel::Session);
        assert!(settings.create_items);
        assert!(settings.read_items);
        assert_eq!(settings.page_size, 25);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (var, value) in [
            (ENV_STORE_BACKEND, "postgres"),
            (ENV_CONSISTENCY_LEVEL, "linearizable"),
            (ENV_CREATE_ITEMS, "maybe"),
            (ENV_QUERY_PAGE_SIZE, "0"),
            (ENV_QUERY_PAGE_SIZE, "ten"),
        ] {
            let mut pairs = vec![(ENV_STORE_BACKEND, "memory")];
            pairs.retain(|(k, _)| *k != var);
            pairs.push((var, value));
            match load(&pairs) {
                Err(ConfigError::Invalid { var: got, .. }) => assert_eq!(got, var),
                other => panic!("{var}={value}: unexpected {other:?}"),
            }
        }
    }
}
