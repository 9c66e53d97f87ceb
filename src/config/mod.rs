use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Gameplay tuning values.
    pub game: GameConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (trace/debug/info/warn/error).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

/// Gameplay tuning configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Score awarded for each correct answer.
    pub points_per_question: i64,
    /// Initial level indicator for new sessions (reserved for
    /// difficulty adaptation, preserved across transitions).
    pub default_level: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/storyjam.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let game = GameConfig {
            points_per_question: env::var("POINTS_PER_QUESTION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|p| *p > 0)
                .unwrap_or(10),
            default_level: env::var("DEFAULT_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        };

        Ok(Config {
            database,
            logging,
            game,
        })
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            points_per_question: 10,
            default_level: 3,
        }
    }
}
