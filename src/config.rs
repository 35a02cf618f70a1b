//! Server configuration, read once from the environment (and `.env`).
//!
//! | Variable                | Default                  |
//! |-------------------------|--------------------------|
//! | `HOST`                  | `127.0.0.1`              |
//! | `PORT`                  | `8080`                   |
//! | `PUBLIC_BASE_URL`       | `http://127.0.0.1:8080`  |
//! | `COHERE_API_KEY`        | empty                    |
//! | `COHERE_API_BASE`       | `https://api.cohere.ai`  |
//! | `CHAT_MODEL`            | `command`                |
//! | `TEMPERATURE`           | `0.7`                    |
//! | `SEARCH_RESULTS_COUNT`  | `3`                      |
//! | `RELAY_CONFIDENCE`      | `0.85`                   |
//! | `PROVIDER_TIMEOUT_SECS` | `30`                     |
//! | `SITES`                 | empty, `id=url,id=url`   |
//! | `SITES_FILE`            | unset, JSON `{id: url}`  |
//! | `TEMPLATES_DIR`         | `templates`              |
//! | `STATIC_DIR`            | `static`                 |

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::relay::RelayConfig;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_base: String,
    pub api_key: String,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env::var("COHERE_API_BASE").unwrap_or_else(|_| "https://api.cohere.ai".to_string()),
            api_key: env::var("COHERE_API_KEY").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub templates_dir: String,
    pub static_dir: String,
    pub provider: ProviderConfig,
    pub relay: RelayConfig,
    pub sites: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = parse_var("PORT", 8080u16);
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let mut sites = env::var("SITES").map(|s| parse_sites(&s)).unwrap_or_default();
        if let Ok(path) = env::var("SITES_FILE") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading SITES_FILE {}", path))?;
            let from_file: HashMap<String, String> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing SITES_FILE {}", path))?;
            sites.extend(from_file);
        }

        Ok(Self {
            host,
            port,
            public_base_url,
            templates_dir: env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            provider: ProviderConfig::from_env(),
            relay: RelayConfig::from_env(),
            sites,
        })
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: env::var("CHAT_MODEL").unwrap_or(defaults.model),
            temperature: parse_var("TEMPERATURE", defaults.temperature),
            search_results_count: parse_var("SEARCH_RESULTS_COUNT", defaults.search_results_count),
            confidence: parse_var("RELAY_CONFIDENCE", defaults.confidence),
            provider_timeout: env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

/// Parses `id=url` pairs separated by commas. Malformed pairs are skipped.
pub fn parse_sites(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (id, url) = pair.split_once('=')?;
            let (id, url) = (id.trim(), url.trim());
            (!id.is_empty() && !url.is_empty()).then(|| (id.to_string(), url.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_site_pairs() {
        let sites = parse_sites(" acme = https://acme.test ,bad, =https://x.test,shop=https://shop.test/a=b");
        assert_eq!(sites.len(), 2);
        assert_eq!(sites["acme"], "https://acme.test");
        assert_eq!(sites["shop"], "https://shop.test/a=b");
    }

    #[test]
    fn empty_site_list() {
        assert!(parse_sites("").is_empty());
    }
}
