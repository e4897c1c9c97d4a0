use crate::admin::{hash_password, AdminCredentials, AuthError};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://fullstack-imoveis-api.onrender.com";
pub const DEFAULT_WHATSAPP_NUMBER: &str = "5516997527532";
const DEFAULT_TOKEN_PATH: &str = ".imoveis-token.json";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub catalog: CatalogConfig,
    pub admin: AdminConfig,
    pub client: ClientConfig,
    pub contact: ContactConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let data_path = non_blank_var("IMOVEIS_DATA_PATH").map(PathBuf::from);

        let api_base = non_blank_var("IMOVEIS_API_BASE")
            .or_else(|| non_blank_var("VITE_API_BASE"))
            .or_else(|| non_blank_var("VITE_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let token_path = non_blank_var("IMOVEIS_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH));

        let whatsapp_number = non_blank_var("WHATSAPP_NUMBER")
            .unwrap_or_else(|| DEFAULT_WHATSAPP_NUMBER.to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            catalog: CatalogConfig { data_path },
            admin: AdminConfig::from_env()?,
            client: ClientConfig {
                api_base,
                token_path,
            },
            contact: ContactConfig { whatsapp_number },
        })
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where listings are kept; `None` keeps them in memory only.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub data_path: Option<PathBuf>,
}

/// Admin panel credentials and session lifetime.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub credentials: Option<AdminCredentials>,
    pub session_ttl: chrono::Duration,
}

impl AdminConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_hours = match non_blank_var("ADMIN_SESSION_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::InvalidSessionTtl)?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        let credentials = match non_blank_var("ADMIN_EMAIL") {
            Some(email) => {
                let password_hash = match non_blank_var("ADMIN_PASSWORD_HASH") {
                    Some(hash) => Some(hash),
                    None => non_blank_var("ADMIN_PASSWORD")
                        .map(|plain| hash_password(&plain))
                        .transpose()
                        .map_err(ConfigError::PasswordHash)?,
                };
                password_hash.map(|password_hash| AdminCredentials {
                    email,
                    password_hash,
                })
            }
            None => None,
        };

        Ok(Self {
            credentials,
            session_ttl: chrono::Duration::hours(ttl_hours),
        })
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }
}

/// Remote API used by the CLI export/browse commands.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub token_path: PathBuf,
}

/// Contact channel the public pages redirect to.
#[derive(Debug, Clone)]
pub struct ContactConfig {
    pub whatsapp_number: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            whatsapp_number: DEFAULT_WHATSAPP_NUMBER.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSessionTtl,
    PasswordHash(AuthError),
    MissingDataPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSessionTtl => {
                write!(f, "ADMIN_SESSION_TTL_HOURS must be a positive integer")
            }
            ConfigError::PasswordHash(err) => {
                write!(f, "ADMIN_PASSWORD could not be hashed: {}", err)
            }
            ConfigError::MissingDataPath => {
                write!(f, "IMOVEIS_DATA_PATH (or --data) must name the listing store")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidSessionTtl
            | ConfigError::MissingDataPath => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::PasswordHash(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "IMOVEIS_DATA_PATH",
            "IMOVEIS_API_BASE",
            "VITE_API_BASE",
            "VITE_API_URL",
            "IMOVEIS_TOKEN_PATH",
            "ADMIN_EMAIL",
            "ADMIN_PASSWORD",
            "ADMIN_PASSWORD_HASH",
            "ADMIN_SESSION_TTL_HOURS",
            "WHATSAPP_NUMBER",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.catalog.data_path.is_none());
        assert!(config.admin.credentials.is_none());
        assert_eq!(config.admin.session_ttl, chrono::Duration::hours(12));
        assert_eq!(config.client.api_base, DEFAULT_API_BASE);
        assert_eq!(config.contact.whatsapp_number, "5516997527532");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn vite_variables_are_accepted_for_the_api_base() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("VITE_API_URL", "http://localhost:4000/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.client.api_base, "http://localhost:4000/");

        env::set_var("IMOVEIS_API_BASE", "http://api.internal");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.client.api_base, "http://api.internal");
        reset_env();
    }

    #[test]
    fn plain_admin_password_is_hashed_at_load() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMIN_EMAIL", "admin@pedro.com");
        env::set_var("ADMIN_PASSWORD", "admin123");
        let config = AppConfig::load().expect("config loads");
        let credentials = config.admin.credentials.expect("credentials configured");
        assert_eq!(credentials.email, "admin@pedro.com");
        assert!(credentials.password_hash.starts_with("$argon2"));
        assert!(credentials.verify_password("admin123"));
        reset_env();
    }

    #[test]
    fn rejects_non_positive_session_ttl() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMIN_SESSION_TTL_HOURS", "0");
        let error = AppConfig::load().expect_err("ttl rejected");
        assert!(matches!(error, ConfigError::InvalidSessionTtl));
        reset_env();
    }
}
