use dotenvy::dotenv;
use std::env;
use thiserror::Error;

/// How bookings are charged.
///
/// `Instant` is the mock flow: bookings are paid at creation and never
/// expire. `Gateway` creates pending bookings that must be settled through
/// the external payment gateway's invoice + webhook round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Instant,
    Gateway,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_host:          String,
    pub db_port:          u16,
    pub db_name:          String,
    pub db_user:          String,
    pub db_password:      String,

    // Backend
    pub backend_host:     String,
    pub backend_port:     u16,

    // Session
    #[allow(dead_code)]
    pub session_secret:   String,

    // Email
    pub smtp_host:        String,
    pub smtp_port:        u16,
    pub smtp_user:        String,
    pub smtp_password:    String,
    pub smtp_from:        String,

    // Payments
    pub payment_mode:           PaymentMode,
    pub payment_api_base:       String,
    pub payment_api_key:        String,
    pub payment_callback_token: String,
    pub booking_hold_minutes:   i64,

    // Expiry reaper
    pub reaper_enabled:          bool,
    pub reaper_interval_minutes: u64,

    // App
    pub app_env:          String,
    pub app_base_url:     String,
    pub frontend_url:     String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_port(key: &str) -> Result<u16, ConfigError> {
            let raw = require(key)?;
            raw.parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw))
        }

        let payment_mode = match env::var("PAYMENT_MODE").unwrap_or_else(|_| "instant".into()).as_str() {
            "instant" => PaymentMode::Instant,
            "gateway" => PaymentMode::Gateway,
            other => {
                return Err(ConfigError::InvalidValue("PAYMENT_MODE".into(), other.to_string()));
            }
        };

        Ok(Self {
            db_host:      require("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:      parse_port("DB_PORT").unwrap_or(3306),
            db_name:      require("DB_NAME")?,
            db_user:      require("DB_USER")?,
            db_password:  require("DB_PASSWORD")?,

            backend_host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port: parse_port("BACKEND_PORT").unwrap_or(8080),

            session_secret: require("SESSION_SECRET")?,

            smtp_host:     env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port:     env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(587),
            smtp_user:     env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from:     env::var("SMTP_FROM").unwrap_or_default(),

            payment_mode,
            payment_api_base:       env::var("PAYMENT_API_BASE").unwrap_or_else(|_| "https://api.xendit.co".into()),
            payment_api_key:        env::var("PAYMENT_API_KEY").unwrap_or_default(),
            payment_callback_token: env::var("PAYMENT_CALLBACK_TOKEN").unwrap_or_default(),
            booking_hold_minutes:   env::var("BOOKING_HOLD_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(15),

            reaper_enabled: env::var("REAPER_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            reaper_interval_minutes: env::var("REAPER_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            app_env:      env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            app_base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost".into()),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".into()),
        })
    }

    #[allow(dead_code)]
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
