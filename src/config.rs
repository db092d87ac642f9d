//! Application-level configuration: the startup environment contract and the optional
//! JSON file holding simulation settings.

use std::{env, fmt, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FLEET_DUEL_CONFIG_PATH";

pub const CLIENT_ID: &str = "VITE_CLIENT_ID";
pub const AUTHORIZATION_ENDPOINT: &str = "VITE_AUTHORIZATION_ENDPOINT";
pub const TOKEN_ENDPOINT: &str = "VITE_TOKEN_ENDPOINT";
pub const REDIRECT_URI: &str = "VITE_REDIRECT_URI";
pub const LOGOUT_ENDPOINT: &str = "VITE_LOGOUT_ENDPOINT";
pub const REPLICATOR_URL: &str = "VITE_REPLICATOR_URL";
pub const TENANT_PUBLIC_KEY: &str = "VITE_TENANT_PUBLIC_KEY";
pub const CONTENT_STORE_URL: &str = "VITE_CONTENT_STORE_URL";
pub const RELAY_SERVICE_URL: &str = "VITE_RELAY_SERVICE_URL";
pub const BASE_NAME: &str = "VITE_BASE_NAME";
pub const PLAYER_IP_URL: &str = "VITE_PLAYER_IP_URL";

/// Read-only settings every deployment must provide through the environment.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub client_id: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub redirect_uri: Url,
    pub logout_endpoint: Option<Url>,
    pub replicator_url: Url,
    pub tenant_public_key: String,
    pub content_store_url: Option<Url>,
    pub relay_service_url: Option<Url>,
    pub base_name: String,
    pub player_ip_url: Option<Url>,
}

/// A variable that is present but unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVariable {
    pub name: &'static str,
    pub reason: String,
}

/// Configuration failures detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more environment variables are missing or malformed.
    #[error("invalid environment: {0}")]
    Environment(EnvironmentReport),
}

/// Every problem found while validating the environment, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<InvalidVariable>,
}

impl fmt::Display for EnvironmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        for invalid in &self.invalid {
            parts.push(format!("{} {}", invalid.name, invalid.reason));
        }
        f.write_str(&parts.join("; "))
    }
}

struct EnvReader<F> {
    lookup: F,
    report: EnvironmentReport,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&mut self, name: &'static str) -> Option<String> {
        let value = self.optional(name);
        if value.is_none() {
            self.report.missing.push(name);
        }
        value
    }

    fn parse_url(&mut self, name: &'static str, raw: Option<String>) -> Option<Url> {
        let raw = raw?;
        match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                self.report.invalid.push(InvalidVariable {
                    name,
                    reason: format!("must use http or https (got `{}`)", url.scheme()),
                });
                None
            }
            Err(err) => {
                self.report.invalid.push(InvalidVariable {
                    name,
                    reason: format!("is not a valid URL: {err}"),
                });
                None
            }
        }
    }

    fn required_url(&mut self, name: &'static str) -> Option<Url> {
        let raw = self.required(name);
        self.parse_url(name, raw)
    }

    fn optional_url(&mut self, name: &'static str) -> Option<Url> {
        let raw = self.optional(name);
        self.parse_url(name, raw)
    }
}

/// Validate the startup environment read through `lookup`.
///
/// All problems are collected so a misconfigured deployment is fixed in one pass.
pub fn validate_environment<F>(lookup: F) -> Result<EnvironmentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut reader = EnvReader {
        lookup,
        report: EnvironmentReport::default(),
    };

    let client_id = reader.required(CLIENT_ID);
    let authorization_endpoint = reader.required_url(AUTHORIZATION_ENDPOINT);
    let token_endpoint = reader.required_url(TOKEN_ENDPOINT);
    let redirect_uri = reader.required_url(REDIRECT_URI);
    let logout_endpoint = reader.optional_url(LOGOUT_ENDPOINT);
    let replicator_url = reader.required_url(REPLICATOR_URL);
    let tenant_public_key = reader.required(TENANT_PUBLIC_KEY);
    let content_store_url = reader.optional_url(CONTENT_STORE_URL);
    let relay_service_url = reader.optional_url(RELAY_SERVICE_URL);
    let base_name = reader.optional(BASE_NAME).unwrap_or_else(|| "/".into());
    let player_ip_url = reader.optional_url(PLAYER_IP_URL);

    let report = reader.report;
    let (
        Some(client_id),
        Some(authorization_endpoint),
        Some(token_endpoint),
        Some(redirect_uri),
        Some(replicator_url),
        Some(tenant_public_key),
    ) = (
        client_id,
        authorization_endpoint,
        token_endpoint,
        redirect_uri,
        replicator_url,
        tenant_public_key,
    )
    else {
        return Err(ConfigError::Environment(report));
    };
    if !report.invalid.is_empty() {
        return Err(ConfigError::Environment(report));
    }

    Ok(EnvironmentConfig {
        client_id,
        authorization_endpoint,
        token_endpoint,
        redirect_uri,
        logout_endpoint,
        replicator_url,
        tenant_public_key,
        content_store_url,
        relay_service_url,
        base_name,
        player_ip_url,
    })
}

/// Validate the process environment.
pub fn validate_process_environment() -> Result<EnvironmentConfig, ConfigError> {
    validate_environment(|name| env::var(name).ok())
}

/// Settings for the background player simulation.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Auto-join pooled players into every new playground.
    pub enabled: bool,
    /// Number of pooled players created at startup.
    pub pool_size: usize,
    /// How many pooled players join each new playground.
    pub players_per_playground: usize,
    /// Delay between consecutive joins into the same playground.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "join_delay_ms")]
    pub join_delay: Duration,
    /// Retries after a failed join before giving up.
    pub retry_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "retry_delay_ms")]
    pub retry_delay: Duration,
    /// Number of behaviour-driven simulated players (0 disables the tick loop).
    pub simulated_players: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_interval_ms")]
    pub tick_interval: Duration,
    /// How long a simulated player stays in a playground before leaving.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_play_time_ms")]
    pub max_play_time: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pool_size: 6,
            players_per_playground: 2,
            join_delay: Duration::from_millis(500),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1_000),
            simulated_players: 0,
            tick_interval: Duration::from_secs(2),
            max_play_time: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration loaded from [`DEFAULT_CONFIG_PATH`].
pub struct AppConfig {
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        simulation = config.simulation.enabled,
                        "loaded application config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn complete_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (CLIENT_ID, "fleet-duel".to_string()),
            (AUTHORIZATION_ENDPOINT, "https://auth.example.com/authorize".to_string()),
            (TOKEN_ENDPOINT, "https://auth.example.com/token".to_string()),
            (REDIRECT_URI, "http://localhost:5173/callback".to_string()),
            (REPLICATOR_URL, "https://replicator.example.com/jinaga".to_string()),
            (TENANT_PUBLIC_KEY, "-----BEGIN PUBLIC KEY-----".to_string()),
        ])
    }

    fn lookup<'a>(vars: &'a HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn accepts_complete_environment_with_defaults() {
        let vars = complete_env();
        let config = validate_environment(lookup(&vars)).unwrap();
        assert_eq!(config.client_id, "fleet-duel");
        assert_eq!(config.base_name, "/");
        assert!(config.player_ip_url.is_none());
        assert_eq!(config.token_endpoint.path(), "/token");
    }

    #[test]
    fn reports_every_missing_variable() {
        let mut vars = complete_env();
        vars.remove(CLIENT_ID);
        vars.remove(REPLICATOR_URL);
        vars.insert(TENANT_PUBLIC_KEY, "   ".into());

        let ConfigError::Environment(report) = validate_environment(lookup(&vars)).unwrap_err();
        assert_eq!(report.missing, vec![CLIENT_ID, REPLICATOR_URL, TENANT_PUBLIC_KEY]);
        assert!(report.invalid.is_empty());
    }

    #[test]
    fn rejects_malformed_urls_including_optional_ones() {
        let mut vars = complete_env();
        vars.insert(TOKEN_ENDPOINT, "not a url".into());
        vars.insert(PLAYER_IP_URL, "ftp://player-ip.example.com".into());

        let ConfigError::Environment(report) = validate_environment(lookup(&vars)).unwrap_err();
        let names: Vec<&str> = report.invalid.iter().map(|invalid| invalid.name).collect();
        assert_eq!(names, vec![TOKEN_ENDPOINT, PLAYER_IP_URL]);
        assert!(report.to_string().contains("must use http or https"));
    }

    #[test]
    fn simulation_config_reads_millisecond_fields() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "simulation": { "enabled": true, "join_delay_ms": 250, "retry_attempts": 5 } }"#,
        )
        .unwrap();
        assert!(config.simulation.enabled);
        assert_eq!(config.simulation.join_delay, Duration::from_millis(250));
        assert_eq!(config.simulation.retry_attempts, 5);
        assert_eq!(config.simulation.pool_size, SimulationConfig::default().pool_size);
    }
}
