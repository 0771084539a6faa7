//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TRADEPOST_API_URL` - Base URL of the order API
//! - `TRADEPOST_BASE_URL` - Public URL the payment provider redirects back to
//!
//! ## Payment gateway (required for electronic payments)
//! - `HUBTEL_CLIENT_ID` - API client ID; the gateway is disabled when unset
//! - `HUBTEL_CLIENT_SECRET` - API client secret (high entropy)
//! - `HUBTEL_MERCHANT_ACCOUNT` - Merchant account number
//! - `HUBTEL_INITIATE_URL` - Checkout initiation endpoint
//! - `HUBTEL_ORIGIN` - Origin attributed to server callbacks (default: <https://pay.hubtel.com>)
//! - `HUBTEL_TRUSTED_DOMAIN` - Domain payment messages must come from (default: hubtel.com)
//!
//! ## Optional
//! - `TRADEPOST_API_TOKEN` - Bearer token for the order API
//! - `TRADEPOST_API_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `TRADEPOST_STORE_PATH` - Local state file (default: .tradepost/store.json)
//! - `TRADEPOST_HOST` - Listener bind address (default: 127.0.0.1)
//! - `TRADEPOST_PORT` - Listener port (default: 3000)
//! - `DELIVERY_TABLE_PATH` - JSON delivery fee table replacing the built-in one
//! - `CHECKOUT_MAX_ATTEMPTS` - Attempts per order API write (default: 3)
//! - `CHECKOUT_INITIAL_BACKOFF_SECS` - Delay after the first failure (default: 2)
//! - `PAYMENT_POLL_INTERVAL_SECS` - Payment status poll interval (default: 3)
//! - `PAYMENT_MAX_WAIT_SECS` - Maximum wait for payment (default: 900)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::checkout::RetryPolicy;
use crate::payment::WatchConfig;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

const DEFAULT_INITIATE_URL: &str = "https://payproxyapi.hubtel.com/items/initiate";
const DEFAULT_PROVIDER_ORIGIN: &str = "https://pay.hubtel.com";
const DEFAULT_TRUSTED_DOMAIN: &str = "hubtel.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address the payment listener binds to
    pub host: IpAddr,
    /// Port the payment listener listens on
    pub port: u16,
    /// Public base URL, always ending in `/`
    pub base_url: String,
    /// Local state and logging settings
    pub local: LocalConfig,
    /// Order API configuration
    pub api: OrderApiConfig,
    /// Payment gateway configuration, absent when electronic payments are off
    pub gateway: Option<GatewayConfig>,
    /// Retry policy for order API writes
    pub retry: RetryPolicy,
    /// Payment confirmation watcher settings
    pub watch: WatchConfig,
}

/// Settings every command needs, including the ones that never touch the
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Local state file
    pub store_path: PathBuf,
    /// Delivery fee table replacing the built-in one
    pub delivery_table_path: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Order API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct OrderApiConfig {
    pub base_url: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl std::fmt::Debug for OrderApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Hubtel checkout configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct GatewayConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub merchant_account: String,
    /// Checkout initiation endpoint
    pub initiate_url: String,
    /// Origin attributed to server-to-server callbacks
    pub origin: String,
    /// Public storefront URL the callback routes live under
    pub callback_base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("merchant_account", &self.merchant_account)
            .field("initiate_url", &self.initiate_url)
            .field("origin", &self.origin)
            .field("callback_base_url", &self.callback_base_url)
            .finish_non_exhaustive()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the gateway secret fails validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(&Vars::process())
    }

    fn from_vars(vars: &Vars) -> Result<Self, ConfigError> {
        let host = vars.parse_or("TRADEPOST_HOST", "127.0.0.1")?;
        let port = vars.parse_or("TRADEPOST_PORT", "3000")?;
        let base_url = normalize_base_url("TRADEPOST_BASE_URL", &vars.required("TRADEPOST_BASE_URL")?)?;

        let api = OrderApiConfig {
            base_url: vars.required("TRADEPOST_API_URL")?,
            token: vars.optional("TRADEPOST_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(vars.parse_or("TRADEPOST_API_TIMEOUT_SECS", "30")?),
        };
        Url::parse(&api.base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("TRADEPOST_API_URL".to_string(), e.to_string())
        })?;

        let gateway = GatewayConfig::from_vars(vars, &base_url, api.timeout)?;

        let retry = RetryPolicy {
            max_attempts: vars.parse_or("CHECKOUT_MAX_ATTEMPTS", "3")?,
            initial_delay: Duration::from_secs(vars.parse_or("CHECKOUT_INITIAL_BACKOFF_SECS", "2")?),
            ..RetryPolicy::default()
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let watch = WatchConfig {
            poll_interval: Duration::from_secs(vars.parse_or("PAYMENT_POLL_INTERVAL_SECS", "3")?),
            max_wait: Duration::from_secs(vars.parse_or("PAYMENT_MAX_WAIT_SECS", "900")?),
            provider_domain: vars.or_default("HUBTEL_TRUSTED_DOMAIN", DEFAULT_TRUSTED_DOMAIN),
        };
        if watch.poll_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            base_url,
            local: LocalConfig::from_vars(vars),
            api,
            gateway,
            retry,
            watch,
        })
    }

    /// Returns the socket address for binding the payment listener.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Origin attributed to provider callbacks.
    #[must_use]
    pub fn provider_origin(&self) -> &str {
        self.gateway
            .as_ref()
            .map_or(DEFAULT_PROVIDER_ORIGIN, |g| g.origin.as_str())
    }
}

impl LocalConfig {
    /// Load local settings from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self::from_vars(&Vars::process())
    }

    fn from_vars(vars: &Vars) -> Self {
        Self {
            store_path: PathBuf::from(vars.or_default("TRADEPOST_STORE_PATH", ".tradepost/store.json")),
            delivery_table_path: vars.optional("DELIVERY_TABLE_PATH").map(PathBuf::from),
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
        }
    }
}

impl GatewayConfig {
    fn from_vars(
        vars: &Vars,
        callback_base_url: &str,
        timeout: Duration,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = vars.optional("HUBTEL_CLIENT_ID") else {
            return Ok(None);
        };

        let client_secret = vars.required("HUBTEL_CLIENT_SECRET")?;
        validate_secret_strength(&client_secret, "HUBTEL_CLIENT_SECRET")?;

        Ok(Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            merchant_account: vars.required("HUBTEL_MERCHANT_ACCOUNT")?,
            initiate_url: vars.or_default("HUBTEL_INITIATE_URL", DEFAULT_INITIATE_URL),
            origin: vars.or_default("HUBTEL_ORIGIN", DEFAULT_PROVIDER_ORIGIN),
            callback_base_url: callback_base_url.to_string(),
            timeout,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source; the process environment outside tests.
struct Vars(HashMap<String, String>);

impl Vars {
    fn process() -> Self {
        Self(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        )
    }

    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

/// Validate a URL and make sure it ends in `/` so paths join under it.
fn normalize_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let mut url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url.into())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by the provider."
            ),
        ));
    }

    Ok(())
}
