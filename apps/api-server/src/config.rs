//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use domain::{AdminCredential, AdminSecret, ShortenerConfig, DEFAULT_ALLOWED_CHARS};

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::Sqlite
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
    /// Display name reported by `GET /`
    pub site_name: String,
    /// Public host of the service; short links are built from it when set
    pub site_domain: Option<String>,
    /// Admin identity; `None` when the admin API is disabled
    pub admin: Option<AdminCredential>,
    /// Engine settings
    pub shortener: ShortenerConfig,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // Port
        let port = parse_or(var("PORT"), "PORT", 3001u16)?;

        // Storage
        let storage_provider =
            StorageProvider::from_str(&var("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()));
        let db_path = PathBuf::from(var("DB_PATH").unwrap_or_else(|| "./data/urls.db".into()));

        // Log format
        let log_format = LogFormat::from_str(&var("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        let site_name = var("SITE_NAME").unwrap_or_else(|| "liteshort".into());
        let site_domain = var("SITE_DOMAIN");

        // Admin credential
        let disable_api = parse_bool(var("DISABLE_API"), "DISABLE_API", false)?;
        let admin = if disable_api {
            None
        } else {
            let username = lookup("ADMIN_USERNAME").unwrap_or_else(|| "admin".into());
            if username.is_empty() {
                return Err(ConfigError {
                    field: "ADMIN_USERNAME",
                    message: "Must not be empty".into(),
                });
            }
            let secret = if let Some(hash) = var("ADMIN_HASHED_PASSWORD") {
                AdminSecret::Hashed(hash)
            } else if let Some(pw) = var("ADMIN_PASSWORD") {
                AdminSecret::Plain(pw)
            } else {
                return Err(ConfigError {
                    field: "ADMIN_PASSWORD",
                    message: "ADMIN_PASSWORD or ADMIN_HASHED_PASSWORD must be set unless DISABLE_API=true"
                        .into(),
                });
            };
            Some(AdminCredential { username, secret })
        };

        // Alias generation
        let random_length = parse_or(var("RANDOM_LENGTH"), "RANDOM_LENGTH", 4usize)?;
        if random_length == 0 {
            return Err(ConfigError {
                field: "RANDOM_LENGTH",
                message: "Must be at least 1".into(),
            });
        }
        let allowed_chars = var("ALLOWED_CHARS").unwrap_or_else(|| DEFAULT_ALLOWED_CHARS.into());
        if allowed_chars.contains('/') {
            return Err(ConfigError {
                field: "ALLOWED_CHARS",
                message: "Must not contain '/'".into(),
            });
        }
        let timeout_secs = parse_or(var("RANDOM_GEN_TIMEOUT"), "RANDOM_GEN_TIMEOUT", 5u64)?;

        // Link policy. An explicitly empty LATEST disables the pointer.
        let latest = match lookup("LATEST") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v),
            None => Some("l".to_string()),
        };
        if latest.as_deref().is_some_and(|l| l.contains('/')) {
            return Err(ConfigError {
                field: "LATEST",
                message: "Must not contain '/'".into(),
            });
        }
        let selflinks = parse_bool(var("SELFLINKS"), "SELFLINKS", false)?;
        let blocklist: HashSet<String> = var("BLOCKLIST")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let base_url = match &site_domain {
            Some(dom) => http_common::base_url(Some(dom), "https", ""),
            None => format!("http://localhost:{}/", port),
        };

        Ok(Self {
            port,
            storage_provider,
            db_path,
            log_format,
            site_name,
            site_domain,
            admin,
            shortener: ShortenerConfig {
                allowed_chars,
                random_length,
                random_gen_timeout: Duration::from_secs(timeout_secs),
                blocklist,
                selflinks,
                latest,
                base_url,
            },
        })
    }

    pub fn api_enabled(&self) -> bool {
        self.admin.is_some()
    }

    /// Log warnings about risky configuration.
    pub fn warn_if_insecure(&self) {
        if let Some(AdminCredential {
            secret: AdminSecret::Plain(_),
            ..
        }) = &self.admin
        {
            tracing::warn!(
                "ADMIN_PASSWORD is plaintext. Prefer ADMIN_HASHED_PASSWORD \
                 (generate one with the hash-password binary)."
            );
        }
        if self.site_domain.is_none() {
            tracing::warn!("SITE_DOMAIN not set: short links follow the request Host header");
        }
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: mappings are lost on restart");
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    field: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e| ConfigError {
            field,
            message: format!("Invalid value '{}': {}", s, e),
        }),
    }
}

fn parse_bool(raw: Option<String>, field: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|s| s.trim().to_lowercase()) {
        None => Ok(default),
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError {
                field,
                message: format!("Expected a boolean, got '{}'", s),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory"), StorageProvider::Memory);
        assert_eq!(StorageProvider::from_str("MEMORY"), StorageProvider::Memory);
        assert_eq!(StorageProvider::from_str("sqlite"), StorageProvider::Sqlite);
        assert_eq!(StorageProvider::from_str("anything"), StorageProvider::Sqlite);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn defaults_with_plain_password() {
        let cfg = load(&[("ADMIN_PASSWORD", "pw")]).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.shortener.random_length, 4);
        assert_eq!(cfg.shortener.random_gen_timeout, Duration::from_secs(5));
        assert_eq!(cfg.shortener.latest.as_deref(), Some("l"));
        assert_eq!(cfg.shortener.base_url, "http://localhost:3001/");
        let admin = cfg.admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.secret, AdminSecret::Plain("pw".into()));
    }

    #[test]
    fn hashed_password_wins() {
        let cfg = load(&[
            ("ADMIN_PASSWORD", "pw"),
            ("ADMIN_HASHED_PASSWORD", "$argon2id$v=19$m=19456,t=2,p=1$x$y"),
        ])
        .unwrap();
        assert!(matches!(
            cfg.admin.unwrap().secret,
            AdminSecret::Hashed(_)
        ));
    }

    #[test]
    fn missing_password_is_fatal_unless_api_disabled() {
        let err = load(&[]).unwrap_err();
        assert_eq!(err.field, "ADMIN_PASSWORD");
        let cfg = load(&[("DISABLE_API", "true")]).unwrap();
        assert!(!cfg.api_enabled());
    }

    #[test]
    fn typed_options_are_validated() {
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "pw"), ("RANDOM_LENGTH", "four")])
                .unwrap_err()
                .field,
            "RANDOM_LENGTH"
        );
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "pw"), ("RANDOM_LENGTH", "0")])
                .unwrap_err()
                .field,
            "RANDOM_LENGTH"
        );
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "pw"), ("SELFLINKS", "maybe")])
                .unwrap_err()
                .field,
            "SELFLINKS"
        );
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "pw"), ("PORT", "99999")])
                .unwrap_err()
                .field,
            "PORT"
        );
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "pw"), ("LATEST", "l/x")])
                .unwrap_err()
                .field,
            "LATEST"
        );
    }

    #[test]
    fn default_latest_accepts_any_alphabet() {
        let cfg = load(&[("ADMIN_PASSWORD", "pw"), ("ALLOWED_CHARS", "0123456789")]).unwrap();
        assert_eq!(cfg.shortener.allowed_chars, "0123456789");
        assert_eq!(cfg.shortener.latest.as_deref(), Some("l"));

        let cfg = load(&[
            ("ADMIN_PASSWORD", "pw"),
            ("ALLOWED_CHARS", "ab"),
            ("LATEST", "newest"),
        ])
        .unwrap();
        assert_eq!(cfg.shortener.latest.as_deref(), Some("newest"));
    }

    #[test]
    fn policy_options() {
        let cfg = load(&[
            ("DISABLE_API", "1"),
            ("SITE_DOMAIN", "sho.rt"),
            ("LATEST", ""),
            ("SELFLINKS", "yes"),
            ("BLOCKLIST", "evil.com, worse.org,,"),
        ])
        .unwrap();
        assert_eq!(cfg.shortener.base_url, "https://sho.rt/");
        assert_eq!(cfg.shortener.latest, None);
        assert!(cfg.shortener.selflinks);
        assert_eq!(cfg.shortener.blocklist.len(), 2);
        assert!(cfg.shortener.blocklist.contains("worse.org"));
    }
}
