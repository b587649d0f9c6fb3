/// Configuration management for the API server
///
/// Configuration is loaded from environment variables (and a `.env` file when
/// one is present).
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `DATABASE_URL`: PostgreSQL connection string (optional; in-memory store when absent)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for session token signing (required, at least 32 characters)
/// - `TOKEN_PEPPER`: Key for one-time token digests (required, at least 32 characters)
/// - `ACCESS_TOKEN_TTL_MINUTES`: Access token lifetime (default: 15, at most 1440)
/// - `REFRESH_TOKEN_TTL_DAYS`: Refresh token lifetime (default: 10, at most 365)
/// - `ONE_TIME_TOKEN_TTL_MINUTES`: Verification and reset token lifetime (default: 20, at most 1440)
/// - `PUBLIC_URL`: Base URL used in emailed links (default: http://localhost:8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use projectcamp_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use chrono::Duration;
use projectcamp_shared::service::AuthSettings;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    /// `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,

    pub auth: AuthConfig,

    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Base URL for links in outgoing email
    pub public_url: String,

    /// Allowed CORS origins; `*` means any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Token secrets and lifetimes
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for session token signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub jwt_secret: String,

    /// Key for one-time token digests
    pub token_pepper: String,

    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub one_time_ttl: Duration,
}

const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
const MAX_ONE_TIME_TOKEN_TTL_MINUTES: i64 = 24 * 60;

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("token_pepper", &"***")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("one_time_ttl", &self.one_time_ttl)
            .finish()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not
    /// parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;

        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            }),
            None => None,
        };

        let jwt_secret = required_secret(&lookup, "JWT_SECRET")?;
        let token_pepper = required_secret(&lookup, "TOKEN_PEPPER")?;

        let access_ttl = ttl(
            &lookup,
            "ACCESS_TOKEN_TTL_MINUTES",
            15,
            MAX_ACCESS_TOKEN_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        let refresh_ttl = ttl(
            &lookup,
            "REFRESH_TOKEN_TTL_DAYS",
            10,
            MAX_REFRESH_TOKEN_TTL_DAYS,
            Duration::try_days,
        )?;
        let one_time_ttl = ttl(
            &lookup,
            "ONE_TIME_TOKEN_TTL_MINUTES",
            20,
            MAX_ONE_TIME_TOKEN_TTL_MINUTES,
            Duration::try_minutes,
        )?;

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = parse_or(&lookup, "PRODUCTION", false)?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                public_url,
                cors_origins,
                production,
            },
            database,
            auth: AuthConfig {
                jwt_secret,
                token_pepper,
                access_ttl,
                refresh_ttl,
                one_time_ttl,
            },
            log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Settings for the auth services, with production password hashing cost
    pub fn auth_settings(&self) -> AuthSettings {
        let mut settings = AuthSettings::new(
            self.auth.jwt_secret.clone(),
            self.auth.token_pepper.clone(),
            self.api.public_url.clone(),
        );
        settings.access_ttl = self.auth.access_ttl;
        settings.refresh_ttl = self.auth.refresh_ttl;
        settings.one_time_ttl = self.auth.one_time_ttl;
        settings
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        None => Ok(default),
    }
}

/// Parses a lifetime in `unit`s, bounded to `1..=max`
fn ttl<F>(
    lookup: &F,
    key: &str,
    default: i64,
    max: i64,
    unit: fn(i64) -> Option<Duration>,
) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !(1..=max).contains(&value) {
        anyhow::bail!("{} must be between 1 and {}", key, max);
    }

    unit(value).ok_or_else(|| anyhow::anyhow!("{} is out of range", key))
}

fn required_secret<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup(key)
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))?;

    if secret.len() < 32 {
        anyhow::bail!("{} must be at least 32 characters long", key);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("TOKEN_PEPPER", "test-pepper-key-at-least-32-bytes-long"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&SECRETS)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.database.is_none());
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert_eq!(config.log_format, LogFormat::Text);

        let settings = config.auth_settings();
        assert_eq!(settings.access_ttl, Duration::minutes(15));
        assert_eq!(settings.refresh_ttl, Duration::days(10));
        assert_eq!(settings.one_time_ttl, Duration::minutes(20));
        assert_eq!(settings.public_url, "http://localhost:8080");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("API_PORT", "9000"),
            ("DATABASE_URL", "postgresql://localhost/projectcamp"),
            ("ACCESS_TOKEN_TTL_MINUTES", "5"),
            ("CORS_ORIGINS", "https://a.test, https://b.test"),
            ("PUBLIC_URL", "https://camp.test/"),
            ("PRODUCTION", "true"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.database.unwrap().max_connections, 10);
        assert_eq!(config.auth.access_ttl, Duration::minutes(5));
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.api.public_url, "https://camp.test");
        assert!(config.api.production);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_secrets_are_required_and_long() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", "short"),
            ("TOKEN_PEPPER", "test-pepper-key-at-least-32-bytes-long"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[SECRETS[0]])).is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("API_PORT", "eighty"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = SECRETS.to_vec();
        pairs.push(("REFRESH_TOKEN_TTL_DAYS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_token_lifetimes_are_bounded() {
        for (key, too_long) in [
            ("ACCESS_TOKEN_TTL_MINUTES", "1441"),
            ("REFRESH_TOKEN_TTL_DAYS", "366"),
            ("REFRESH_TOKEN_TTL_DAYS", "1000000000000000"),
            ("ONE_TIME_TOKEN_TTL_MINUTES", "9223372036854775807"),
            ("ACCESS_TOKEN_TTL_MINUTES", "-5"),
        ] {
            let mut pairs = SECRETS.to_vec();
            pairs.push((key, too_long));
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(key), "{key}={too_long}: {err}");
        }

        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("ACCESS_TOKEN_TTL_MINUTES", "1440"),
            ("REFRESH_TOKEN_TTL_DAYS", "365"),
        ]);
        let settings = Config::from_lookup(lookup(&pairs)).unwrap().auth_settings();
        assert_eq!(settings.access_ttl, Duration::days(1));
        assert_eq!(settings.refresh_ttl, Duration::days(365));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config::from_lookup(lookup(&SECRETS)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("test-secret-key"));
        assert!(!debug.contains("test-pepper-key"));
    }
}
