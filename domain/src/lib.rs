//! Domain library for the URL Shortener.
//!
//! Holds the mapping record, the configuration value objects, the ports
//! (traits) and error definitions, plus the alias engine built on top of them.
//! Keep adapters and IO concerns out of this crate: storage and password
//! hashing live in their own adapter crates.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default alphabet used for random aliases.
pub const DEFAULT_ALLOWED_CHARS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// A persisted short alias to long URL mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub short: String,
    pub long: String,
}

impl Mapping {
    pub fn new<S: Into<String>, L: Into<String>>(short: S, long: L) -> Self {
        Self {
            short: short.into(),
            long: long.into(),
        }
    }
}

/// Immutable engine configuration, built once at process start.
#[derive(Clone, Debug)]
pub struct ShortenerConfig {
    /// Characters allowed in aliases; random aliases draw from this set.
    pub allowed_chars: String,
    /// Length of randomly generated aliases.
    pub random_length: usize,
    /// Wall-clock budget for finding a free random alias.
    pub random_gen_timeout: Duration,
    /// Hosts that may never be shortened.
    pub blocklist: HashSet<String>,
    /// Whether long URLs may point back at the service itself.
    pub selflinks: bool,
    /// Reserved alias that always points at the latest submission.
    pub latest: Option<String>,
    /// Absolute base URL of the service, e.g. `https://sho.rt/`.
    pub base_url: String,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            allowed_chars: DEFAULT_ALLOWED_CHARS.to_string(),
            random_length: 4,
            random_gen_timeout: Duration::from_secs(5),
            blocklist: HashSet::new(),
            selflinks: false,
            latest: Some("l".to_string()),
            base_url: "http://localhost/".to_string(),
        }
    }
}

impl ShortenerConfig {
    /// Host part of `base_url`, used for self-link detection.
    pub fn base_host(&self) -> &str {
        validate::extract_host(&self.base_url)
    }

    /// Whether `short` is the reserved latest alias.
    pub fn is_latest(&self, short: &str) -> bool {
        self.latest.as_deref() == Some(short)
    }

    /// Absolute short link for an alias.
    pub fn short_url(&self, short: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), short)
    }
}

/// Configured admin secret. Exactly one of the two forms is ever set.
#[derive(Clone, PartialEq, Eq)]
pub enum AdminSecret {
    /// PHC-formatted password hash.
    Hashed(String),
    Plain(String),
}

impl Debug for AdminSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminSecret::Hashed(_) => f.write_str("Hashed(..)"),
            AdminSecret::Plain(_) => f.write_str("Plain(..)"),
        }
    }
}

/// Admin identity the authenticator checks against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminCredential {
    pub username: String,
    pub secret: AdminSecret,
}

/// Credentials presented with an admin request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Time source abstraction to make deadlines testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Admin credential check port.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// An absent authenticator rejects everyone (admin API disabled).
impl<A: Authenticator> Authenticator for Option<A> {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        self.as_ref()
            .is_some_and(|a| a.authenticate(username, password))
    }
}

/// Repository port for the `urls` mapping table.
///
/// Every mutating call must be durable once it returns.
pub trait UrlStore: Send + Sync {
    /// Create the backing structure if missing. Idempotent.
    fn ensure_schema(&self) -> Result<(), CoreError>;
    fn find_by_short(&self, short: &str) -> Result<Option<Mapping>, CoreError>;
    /// All mappings whose long URL equals `long` exactly, in insertion order.
    fn find_by_long(&self, long: &str) -> Result<Vec<Mapping>, CoreError>;
    /// All mappings whose long URL contains `fragment`.
    fn find_by_long_substring(&self, fragment: &str) -> Result<Vec<Mapping>, CoreError>;
    /// Insert a new mapping. Fails with `DuplicateKey` if the short exists.
    fn insert(&self, mapping: &Mapping) -> Result<(), CoreError>;
    /// Overwrite the long URL of an existing short. `NotFound` if absent.
    fn update(&self, short: &str, long: &str) -> Result<(), CoreError>;
    /// Remove by exact short; returns rows removed (0 or 1).
    fn delete(&self, short: &str) -> Result<usize, CoreError>;
    /// Remove every mapping whose long URL contains `fragment`.
    fn delete_matching(&self, fragment: &str) -> Result<usize, CoreError>;
    /// Every mapping, in insertion order.
    fn list_all(&self) -> Result<Vec<Mapping>, CoreError>;
}

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    InvalidLongUrl,
    /// Bad character or collision with the reserved latest alias.
    InvalidShort(String),
    ShortTaken,
    GenerationTimeout,
    LinkBlocked,
    NotFound,
    Unauthorized,
    UnknownCommand(String),
    MissingArgs,
    /// Store-level unique key violation.
    DuplicateKey,
    Repository(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidLongUrl => write!(f, "Long URL is not valid"),
            CoreError::InvalidShort(msg) => write!(f, "{}", msg),
            CoreError::ShortTaken => write!(f, "Short URL already taken"),
            CoreError::GenerationTimeout => {
                write!(f, "Timeout while generating random short URL")
            }
            CoreError::LinkBlocked => write!(f, "You cannot link to this site"),
            CoreError::NotFound => write!(f, "URL not found"),
            CoreError::Unauthorized => write!(f, "BasicAuth failed"),
            CoreError::UnknownCommand(cmd) => write!(f, "Command {} not found", cmd),
            CoreError::MissingArgs => write!(f, "Provide short or long in POST data"),
            CoreError::DuplicateKey => write!(f, "short URL already exists in store"),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - shortener core loaded", pkg, ver)
}

pub mod adapters;
pub mod alias;
pub mod service;
pub mod validate;
