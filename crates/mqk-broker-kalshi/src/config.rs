//! Environment/auth configuration — spec §4.9.
//!
//! Grounded on `brokers/kalshi.py::KalshiConfig`.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KalshiEnvironment {
    Demo,
    Production,
}

#[derive(Clone, Debug)]
pub struct KalshiConfig {
    pub email: String,
    pub password: String,
    pub environment: KalshiEnvironment,
    /// API key auth, preferred over email/password when present.
    pub api_key: Option<String>,
}

impl KalshiConfig {
    pub fn base_url(&self) -> &'static str {
        match self.environment {
            KalshiEnvironment::Demo => "https://demo-api.kalshi.co/trade-api/v2",
            KalshiEnvironment::Production => "https://trading-api.kalshi.com/trade-api/v2",
        }
    }

    pub fn ws_url(&self) -> &'static str {
        match self.environment {
            KalshiEnvironment::Demo => "wss://demo-api.kalshi.co/trade-api/ws/v2",
            KalshiEnvironment::Production => "wss://trading-api.kalshi.com/trade-api/ws/v2",
        }
    }

    /// Load from `KALSHI_DEMO_*` or `KALSHI_*` environment variables.
    pub fn from_env(demo: bool) -> Self {
        let prefix = if demo { "KALSHI_DEMO_" } else { "KALSHI_" };
        Self {
            email: std::env::var(format!("{prefix}EMAIL")).unwrap_or_default(),
            password: std::env::var(format!("{prefix}PASSWORD")).unwrap_or_default(),
            api_key: std::env::var(format!("{prefix}API_KEY")).ok(),
            environment: if demo {
                KalshiEnvironment::Demo
            } else {
                KalshiEnvironment::Production
            },
        }
    }
}
