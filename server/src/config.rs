//! Server configuration.

use std::net::{IpAddr, SocketAddr};

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Base URL of the currency-rate API.
    pub currency_api_url: String,
    /// API key for the currency-rate API.
    pub currency_api_key: String,
    /// Log level.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 3000,
            currency_api_url: "https://api.currencyapi.com".to_string(),
            currency_api_key: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("WALLETD_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("WALLETD_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(url) = std::env::var("CURRENCY_API_URL") {
            config.currency_api_url = url;
        }

        if let Ok(key) = std::env::var("CURRENCY_API_KEY") {
            config.currency_api_key = key;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.listen_addr.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid listen address: {}", self.listen_addr));
        }

        if self.currency_api_url.is_empty() {
            return Err("Currency API URL cannot be empty".to_string());
        }

        Ok(())
    }

    /// The socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .map_err(|_| format!("Invalid listen address: {}", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }
}
