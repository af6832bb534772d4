//! Environment-based configuration

use std::env;

/// Server settings
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    #[allow(dead_code)]
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl Config {
    /// Loads settings from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5501".to_string())
                .parse()
                .unwrap_or(5501),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5501,
            host: "127.0.0.1".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            log_level: "info".to_string(),
        }
    }
}
