use crate::pipeline::MAX_BATCH_ENTRIES;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub location_table_path: Option<PathBuf>,
    pub batch_size: usize,
    pub submit_concurrency: usize,
    pub aws_region: Option<String>,
    pub sitewise_endpoint: Option<String>,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let usize_or = |key: &str, default: usize| -> Result<usize> {
            match optional(key) {
                Some(raw) => raw
                    .parse::<usize>()
                    .with_context(|| format!("invalid {key}")),
                None => Ok(default),
            }
        };

        let location_table_path = optional("FORWARDER_LOCATION_TABLE_PATH").map(PathBuf::from);

        let requested_batch = usize_or("FORWARDER_BATCH_SIZE", MAX_BATCH_ENTRIES)?;
        let batch_size = requested_batch.clamp(1, MAX_BATCH_ENTRIES);
        if batch_size != requested_batch {
            tracing::warn!(
                requested = requested_batch,
                batch_size,
                "FORWARDER_BATCH_SIZE outside store limits; clamped"
            );
        }

        let submit_concurrency = usize_or("FORWARDER_SUBMIT_CONCURRENCY", 1)?.max(1);
        let aws_region = optional("FORWARDER_AWS_REGION");
        let sitewise_endpoint = optional("FORWARDER_SITEWISE_ENDPOINT");
        let otlp_endpoint = optional("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            location_table_path,
            batch_size,
            submit_concurrency,
            aws_region,
            sitewise_endpoint,
            otlp_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_store_limits() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.submit_concurrency, 1);
        assert!(config.location_table_path.is_none());
        assert!(config.aws_region.is_none());
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn batch_size_is_clamped_to_store_maximum() {
        let config = config_from(&[("FORWARDER_BATCH_SIZE", "25")]).expect("config");
        assert_eq!(config.batch_size, 10);
        let config = config_from(&[("FORWARDER_BATCH_SIZE", "0")]).expect("config");
        assert_eq!(config.batch_size, 1);
        let config = config_from(&[("FORWARDER_BATCH_SIZE", " 4 ")]).expect("config");
        assert_eq!(config.batch_size, 4);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[
            ("FORWARDER_LOCATION_TABLE_PATH", "  "),
            ("FORWARDER_AWS_REGION", ""),
            ("FORWARDER_SUBMIT_CONCURRENCY", ""),
        ])
        .expect("config");
        assert!(config.location_table_path.is_none());
        assert!(config.aws_region.is_none());
        assert_eq!(config.submit_concurrency, 1);
    }

    #[test]
    fn rejects_unparsable_numbers() {
        let err = config_from(&[("FORWARDER_SUBMIT_CONCURRENCY", "many")]).unwrap_err();
        assert!(err.to_string().contains("FORWARDER_SUBMIT_CONCURRENCY"));
    }
}
