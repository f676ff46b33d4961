use anyhow::{bail, Context};
use serde::Deserialize;
use shop_types::query::filter::MAX_RESULTS;
use std::env;
use std::str::FromStr;

pub const DEFAULT_IN_LIST_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Tuning for the read-side query strategies.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Largest number of ids bound into one `IN (...)` list.
    pub in_list_batch_size: usize,
    /// Page size used when a request supplies `offset` without `limit`.
    pub default_page_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            in_list_batch_size: DEFAULT_IN_LIST_BATCH_SIZE,
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub seed_sample_data: bool,
    pub query: QueryConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let server_port = lookup("SERVER_PORT").unwrap_or_else(|| "3000".into());
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let seed_sample_data = parse_or(&lookup, "SEED_SAMPLE_DATA", false)?;

        let in_list_batch_size =
            parse_or(&lookup, "IN_LIST_BATCH_SIZE", DEFAULT_IN_LIST_BATCH_SIZE)?;
        if in_list_batch_size == 0 {
            bail!("IN_LIST_BATCH_SIZE must be greater than zero");
        }
        let default_page_limit = parse_or(&lookup, "DEFAULT_PAGE_LIMIT", DEFAULT_PAGE_LIMIT)?
            .clamp(1, MAX_RESULTS);

        Ok(Self {
            server_port,
            database_url,
            seed_sample_data,
            query: QueryConfig {
                in_list_batch_size,
                default_page_limit,
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.server_port, "3000");
        assert!(cfg.database_url.is_none());
        assert!(!cfg.seed_sample_data);
        assert_eq!(cfg.query, QueryConfig::default());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = config_from(&[
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "sqlite://data/shop.db"),
            ("SEED_SAMPLE_DATA", "true"),
            ("IN_LIST_BATCH_SIZE", "2"),
            ("DEFAULT_PAGE_LIMIT", "5000"),
        ])
        .unwrap();
        assert_eq!(cfg.server_port, "8080");
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite://data/shop.db"));
        assert!(cfg.seed_sample_data);
        assert_eq!(cfg.query.in_list_batch_size, 2);
        assert_eq!(cfg.query.default_page_limit, MAX_RESULTS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("IN_LIST_BATCH_SIZE", "0")]).is_err());
        assert!(config_from(&[("IN_LIST_BATCH_SIZE", "many")]).is_err());
        assert!(config_from(&[("SEED_SAMPLE_DATA", "yes")]).is_err());
    }
}
