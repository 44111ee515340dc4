pub mod bot;
pub mod broadcast;
pub mod digest;
pub mod domain;
pub mod market;
pub mod notify;
pub mod schedule;
pub mod storage;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
    pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub port: Option<u16>,
        pub telegram_token: Option<String>,
        pub telegram_api_base_url: String,
        pub market_data_base_url: String,
        pub market_data_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                port: parsed_var("PORT")?,
                telegram_token: non_empty_var("TELEGRAM_TOKEN"),
                telegram_api_base_url: non_empty_var("TELEGRAM_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE_URL.to_string()),
                market_data_base_url: non_empty_var("MARKET_DATA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string()),
                market_data_timeout_secs: parsed_var("MARKET_DATA_TIMEOUT_SECS")?,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_telegram_token(&self) -> anyhow::Result<&str> {
            self.telegram_token
                .as_deref()
                .context("TELEGRAM_TOKEN is required")
        }

        pub fn port_or_default(&self) -> u16 {
            self.port.unwrap_or(3000)
        }
    }

    /// Unset or blank is `None`; anything else must parse.
    fn parsed_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        non_empty_var(key)
            .map(|raw| parse_value(key, &raw))
            .transpose()
    }

    fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        raw.parse::<T>()
            .with_context(|| format!("invalid {key} (got {raw:?})"))
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

}
