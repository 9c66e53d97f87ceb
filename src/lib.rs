//! # Storyjam Play Server
//!
//! The play-session engine for branching-narrative quiz games ("story
//! jams"): an authored story is an introduction, a linear chain of
//! multiple-choice question scenes, and three endings tiered Good, Neutral,
//! and Bad. Players traverse the chain answering questions; each correct
//! answer adds a fixed score increment, and a percentage-of-max threshold
//! resolves which ending they see.
//!
//! ## Features
//!
//! - **Navigation Engine**: the start/advance/answer state machine driving a
//!   session through the scene graph
//! - **Ending Resolver**: pure score-to-tier mapping with exact inclusive
//!   thresholds (>= 80% Good, >= 40% Neutral, else Bad)
//! - **Outcome Aggregation**: per-story played/finished/failed/abandoned
//!   counters with atomic updates
//! - **Story Validation**: publish-time structural checks on the scene graph
//! - **Private Play**: access-code entry for unlisted stories
//!
//! ## Architecture
//!
//! ```text
//! Client → JSON-RPC over stdio → Play Engine
//!                                     ↓
//!                               SQLite (stories, sessions)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use storyjam::{Config, AppState, GameServer};
//! use storyjam::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, storage));
//!     let server = GameServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the play server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Gameplay: navigation engine, ending resolver, outcome aggregation.
pub mod play;
/// JSON-RPC server implementation and request handling.
pub mod server;
/// SQLite storage layer for stories and sessions.
pub mod storage;
/// Story graph domain types and publish-time validation.
pub mod story;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, GameServer, SharedState};
