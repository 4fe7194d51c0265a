/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, AUTH_*, DATABASE_URL, timeout など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub debug_addr: SocketAddr,
    pub app_env: AppEnv,

    pub auth_keys_folder: PathBuf,
    pub auth_active_kid: String,
    pub auth_issuer: String,
    pub auth_token_ttl_seconds: u64,
    pub auth_leeway_seconds: u64,

    // None: in-memory user store (development only)
    pub database_url: Option<String>,
    pub db_max_connections: u32,

    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // DATABASE_URL may carry credentials
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("debug_addr", &self.debug_addr)
            .field("app_env", &self.app_env)
            .field("auth_keys_folder", &self.auth_keys_folder)
            .field("auth_active_kid", &self.auth_active_kid)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_token_ttl_seconds", &self.auth_token_ttl_seconds)
            .field("auth_leeway_seconds", &self.auth_leeway_seconds)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&get, "PORT", 3000)?;
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let debug_port: u16 = parse_or(&get, "DEBUG_PORT", 4000)?;
        let debug_addr = SocketAddr::from_str(&format!("0.0.0.0:{}", debug_port))
            .map_err(|_| ConfigError::Invalid("DEBUG_PORT"))?;
        if debug_port == port {
            return Err(ConfigError::Invalid("DEBUG_PORT"));
        }

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let auth_keys_folder =
        PathBuf::from(get("AUTH_KEYS_FOLDER").unwrap_or_else(|| "keys/".to_string()));

        let auth_active_kid = get("AUTH_ACTIVE_KID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("AUTH_ACTIVE_KID"))?;

        let auth_issuer = get("AUTH_ISSUER").unwrap_or_else(|| "sales-api".to_string());

        let auth_token_ttl_seconds: u64 = parse_or(&get, "AUTH_TOKEN_TTL_SECONDS", 3600)?;
        if auth_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("AUTH_TOKEN_TTL_SECONDS"));
        }
        let auth_leeway_seconds = parse_or(&get, "AUTH_LEEWAY_SECONDS", 0)?;

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let db_max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", 5)?;

        let request_timeout = Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 30)?);
        let shutdown_timeout = Duration::from_secs(parse_or(&get, "SHUTDOWN_TIMEOUT_SECONDS", 20)?);

        Ok(Self {
            addr,
            debug_addr,
            app_env,
            auth_keys_folder,
            auth_active_kid,
            auth_issuer,
            auth_token_ttl_seconds,
            auth_leeway_seconds,
            database_url,
            db_max_connections,
            request_timeout,
            shutdown_timeout,
        })
    }
}

// Absent -> default; present but unparsable -> Invalid (fail fast at startup).
fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
