//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `TENANTCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TENANTCTL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TENANTCTL_DENY_LIST__REFRESH=every_call` sets the `deny_list.refresh` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use tenantctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::auth::password::Argon2Params;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TENANTCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub database: DatabaseConfig,
    /// Raw `DATABASE_URL`, folded into `database.url` on load
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    pub credentials: CredentialsConfig,
    pub deny_list: DenyListConfig,
    /// Export traces over OTLP (configured through the standard `OTEL_*` variables)
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database: DatabaseConfig::default(),
            database_url: None,
            auth: AuthConfig::default(),
            credentials: CredentialsConfig::default(),
            deny_list: DenyListConfig::default(),
            enable_otel_export: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/tenantctl".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub proxy_header: ProxyHeaderAuthConfig,
}

/// Identity from a trusted HTTP header set by an upstream proxy.
///
/// The header carries the username of an active user. Anything that can
/// reach the service directly can claim any identity, so only expose the
/// service behind the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyHeaderAuthConfig {
    pub header_name: String,
}

impl Default for ProxyHeaderAuthConfig {
    fn default() -> Self {
        Self {
            header_name: "x-tenantctl-user".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    pub argon2: Argon2Params,
}

/// When the password deny-list file is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyListRefresh {
    /// Once, when the service starts
    #[default]
    Startup,
    /// On every validation, so edits apply without a restart
    EveryCall,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenyListConfig {
    /// Newline-separated list of disallowed passwords. No path means no deny-list.
    pub path: Option<PathBuf>,
    pub refresh: DenyListRefresh,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.database.pool.max_connections == 0 {
            return Err(Error::Internal {
                operation: "Config validation: database.pool.max_connections must be at least 1".to_string(),
            });
        }

        if self.database.pool.min_connections > self.database.pool.max_connections {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.pool.min_connections, self.database.pool.max_connections
                ),
            });
        }

        if self.deny_list.refresh == DenyListRefresh::EveryCall && self.deny_list.path.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: deny_list.refresh is every_call but deny_list.path is not set".to_string(),
            });
        }

        if !self.credentials.argon2.is_valid() {
            return Err(Error::Internal {
                operation: format!("Config validation: invalid argon2 parameters {:?}", self.credentials.argon2),
            });
        }

        if self.auth.proxy_header.header_name.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: auth.proxy_header.header_name cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("TENANTCTL_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = Config::load(&args("missing.yaml"))?;
            assert_eq!(config.bind_address(), "0.0.0.0:3001");
            assert_eq!(config.auth.proxy_header.header_name, "x-tenantctl-user");
            assert_eq!(config.deny_list.refresh, DenyListRefresh::Startup);
            assert_eq!(config.credentials.argon2, Argon2Params::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_with_env_overrides() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
database:
  url: postgres://db.internal/tenantctl
  pool:
    max_connections: 4
deny_list:
  path: /etc/tenantctl/deny.txt
credentials:
  argon2:
    memory_kib: 8192
"#,
            )?;
            jail.set_env("TENANTCTL_DENY_LIST__REFRESH", "every_call");
            jail.set_env("TENANTCTL_AUTH__PROXY_HEADER__HEADER_NAME", "x-remote-user");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.port, 8080);
            assert_eq!(config.database.url, "postgres://db.internal/tenantctl");
            assert_eq!(config.database.pool.max_connections, 4);
            assert_eq!(config.database.pool.acquire_timeout_secs, 30);
            assert_eq!(config.deny_list.refresh, DenyListRefresh::EveryCall);
            assert_eq!(config.deny_list.path, Some(PathBuf::from("/etc/tenantctl/deny.txt")));
            assert_eq!(config.auth.proxy_header.header_name, "x-remote-user");
            assert_eq!(config.credentials.argon2.memory_kib, 8192);
            assert_eq!(config.credentials.argon2.iterations, 2);
            Ok(())
        });
    }

    #[test]
    fn test_database_url_env_wins() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("test.yaml", "database:\n  url: postgres://from-file/db\n")?;
            jail.set_env("DATABASE_URL", "postgres://from-env/db");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.database.url, "postgres://from-env/db");
            Ok(())
        });
    }

    #[test]
    fn test_every_call_refresh_needs_a_path() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "deny_list:\n  refresh: every_call\n")?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("deny_list.path"));
            Ok(())
        });
    }

    #[test]
    fn test_rejects_unknown_fields_and_empty_pool() {
        Jail::expect_with(|jail| {
            jail.create_file("unknown.yaml", "listen_port: 9\n")?;
            assert!(Config::load(&args("unknown.yaml")).is_err());

            jail.create_file("pool.yaml", "database:\n  pool:\n    max_connections: 0\n")?;
            assert!(Config::load(&args("pool.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_degenerate_argon2_params() {
        let mut config = Config::default();
        config.credentials.argon2.iterations = 0;
        assert!(config.validate().is_err());
    }
}
