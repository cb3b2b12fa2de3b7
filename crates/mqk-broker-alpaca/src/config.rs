//! Environment/auth configuration — spec §4.1, §6.
//!
//! Grounded on `brokers/alpaca.py::AlpacaConfig`. Paper vs live is
//! distinguished by the trading host; the market-data host is shared
//! between both environments.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlpacaEnvironment {
    Paper,
    Live,
}

#[derive(Clone, Debug)]
pub struct AlpacaConfig {
    pub key_id: String,
    pub secret_key: String,
    pub environment: AlpacaEnvironment,
}

impl AlpacaConfig {
    pub fn trading_base_url(&self) -> &'static str {
        match self.environment {
            AlpacaEnvironment::Paper => "https://paper-api.alpaca.markets",
            AlpacaEnvironment::Live => "https://api.alpaca.markets",
        }
    }

    pub fn data_base_url(&self) -> &'static str {
        "https://data.alpaca.markets"
    }

    pub fn market_data_stream_url(&self) -> &'static str {
        "wss://stream.data.alpaca.markets/v2/iex"
    }

    pub fn trading_stream_url(&self) -> &'static str {
        match self.environment {
            AlpacaEnvironment::Paper => "wss://paper-api.alpaca.markets/stream",
            AlpacaEnvironment::Live => "wss://api.alpaca.markets/stream",
        }
    }

    /// Load from `ALPACA_*` (live) or `ALPACA_PAPER_*` (paper) environment
    /// variables, mirroring `AlpacaConfig.from_env`.
    pub fn from_env(paper: bool) -> Self {
        let prefix = if paper { "ALPACA_PAPER_" } else { "ALPACA_" };
        Self {
            key_id: std::env::var(format!("{prefix}KEY_ID")).unwrap_or_default(),
            secret_key: std::env::var(format!("{prefix}SECRET_KEY")).unwrap_or_default(),
            environment: if paper {
                AlpacaEnvironment::Paper
            } else {
                AlpacaEnvironment::Live
            },
        }
    }
}
