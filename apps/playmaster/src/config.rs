//! Startup configuration read from the environment.

use std::time::Duration;

use service_support::config::{opt_var, parse_var, var_or};
use service_support::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaymasterConfig {
    pub host: String,
    pub port: u16,
    /// Coordinator service base URL; `None` runs against an in-process ensemble.
    pub coordination_url: Option<String>,
    pub session_timeout: Duration,
    pub advertised_host: String,
    pub advertised_port: u16,
    /// Name of this worker's directory entry and session lock owner.
    pub instance_name: String,
    pub gamemaster_timeout: Duration,
    pub ui_timeout: Duration,
}

impl PlaymasterConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let host = var_or("PLAYMASTER_HOST", "0.0.0.0");
        let port = parse_var("PLAYMASTER_PORT", 8001u16)?;
        let advertised_host = opt_var("ADVERTISED_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let advertised_port = parse_var("ADVERTISED_PORT", port)?;
        let instance_name = opt_var("PLAYMASTER_NAME")
            .unwrap_or_else(|| format!("{advertised_host}-{advertised_port}"));
        if instance_name.contains('/') {
            return Err(AppError::config(format!(
                "PLAYMASTER_NAME must not contain '/': {instance_name}"
            )));
        }

        Ok(Self {
            host,
            port,
            coordination_url: opt_var("COORDINATION_URL"),
            session_timeout: Duration::from_millis(parse_var(
                "COORDINATION_SESSION_TIMEOUT_MS",
                10_000u64,
            )?),
            advertised_host,
            advertised_port,
            instance_name,
            gamemaster_timeout: Duration::from_millis(parse_var("GAMEMASTER_TIMEOUT_MS", 5_000u64)?),
            ui_timeout: Duration::from_millis(parse_var("UI_NOTIFY_TIMEOUT_MS", 2_000u64)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;

    use super::*;

    const VARS: [&str; 5] = [
        "PLAYMASTER_PORT",
        "ADVERTISED_HOST",
        "ADVERTISED_PORT",
        "PLAYMASTER_NAME",
        "GAMEMASTER_TIMEOUT_MS",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn instance_name_defaults_to_the_advertised_address() {
        clear();
        let config = PlaymasterConfig::from_env().unwrap();
        assert_eq!(config.port, 8001);
        assert_eq!(config.instance_name, "127.0.0.1-8001");

        env::set_var("ADVERTISED_HOST", "10.0.0.7");
        env::set_var("ADVERTISED_PORT", "9001");
        assert_eq!(PlaymasterConfig::from_env().unwrap().instance_name, "10.0.0.7-9001");
        clear();
    }

    #[test]
    #[serial]
    fn instance_names_are_single_path_segments() {
        clear();
        env::set_var("PLAYMASTER_NAME", "pm/1");
        assert!(matches!(
            PlaymasterConfig::from_env(),
            Err(AppError::Config { .. })
        ));
        env::set_var("PLAYMASTER_NAME", "pm-1");
        assert_eq!(PlaymasterConfig::from_env().unwrap().instance_name, "pm-1");
        clear();
    }

    #[test]
    #[serial]
    fn malformed_timeouts_are_config_errors() {
        clear();
        env::set_var("GAMEMASTER_TIMEOUT_MS", "-5");
        assert!(PlaymasterConfig::from_env().is_err());
        clear();
    }
}
