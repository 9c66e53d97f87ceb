//! Storage layer for story graphs and play-session persistence.
//!
//! This module provides SQLite-based storage for stories, scene nodes,
//! answer choices, play sessions, and per-story lifetime counters.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::story::{AnswerChoice, EndingTier, SceneNode, Story};

/// One player's in-progress or completed traversal of a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaySession {
    /// Unique session identifier.
    pub id: String,
    /// The story being played.
    pub story_id: String,
    /// Optional player (anonymous play allowed).
    pub user_id: Option<String>,
    /// The node currently rendered; the sole mutable pointer driving play.
    pub current_node_id: String,
    /// Accumulated score, monotonically non-decreasing during play.
    pub score: i64,
    /// Maximum attainable score, fixed at creation.
    pub max_score: i64,
    /// Difficulty indicator, reserved; preserved across transitions.
    pub level: i64,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// Set exactly once when the session terminates; a session with this
    /// set is immutable.
    pub ended_at: Option<DateTime<Utc>>,
    /// The resolved outcome tier; None while active and after a degenerate
    /// termination with no configured ending.
    pub ending_tier: Option<EndingTier>,
}

impl PlaySession {
    /// Create a new active session positioned on the given entry node
    pub fn new(
        story_id: impl Into<String>,
        entry_node_id: impl Into<String>,
        max_score: i64,
        level: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            story_id: story_id.into(),
            user_id: None,
            current_node_id: entry_node_id.into(),
            score: 0,
            max_score,
            level,
            started_at: Utc::now(),
            ended_at: None,
            ending_tier: None,
        }
    }

    /// Set the player
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether the session has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Lifetime counters aggregated per story.
///
/// Informational aggregates for authors; gameplay logic never reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCounters {
    /// Sessions started.
    pub played_count: i64,
    /// Sessions that resolved a Good or Neutral ending.
    pub finished_count: i64,
    /// Sessions that resolved a Bad ending.
    pub failed_count: i64,
    /// Started sessions not yet reclassified as finished or failed.
    pub abandoned_count: i64,
}

/// Storage trait for database operations.
///
/// Story-graph queries are read-only to the play engine; authoring writes
/// exist for seeding, tests, and the publish-time validation pass. Counter
/// updates are atomic single statements so concurrent sessions on one story
/// never lose increments.
#[async_trait]
pub trait Storage: Send + Sync {
    // Story operations

    /// Create a new story.
    async fn create_story(&self, story: &Story) -> StorageResult<()>;
    /// Get a story by ID.
    async fn get_story(&self, id: &str) -> StorageResult<Option<Story>>;
    /// Get a private story by its access code.
    async fn find_story_by_access_code(&self, code: &str) -> StorageResult<Option<Story>>;
    /// Set the published flag on a story.
    async fn set_published(&self, story_id: &str, published: bool) -> StorageResult<()>;

    // Scene node operations

    /// Create a new scene node.
    async fn create_node(&self, node: &SceneNode) -> StorageResult<()>;
    /// Get a node by ID.
    async fn get_node(&self, id: &str) -> StorageResult<Option<SceneNode>>;
    /// Get all nodes in a story, ordered by position.
    async fn get_story_nodes(&self, story_id: &str) -> StorageResult<Vec<SceneNode>>;
    /// Get the intro node of a story.
    async fn get_intro(&self, story_id: &str) -> StorageResult<Option<SceneNode>>;
    /// Get the entry node for play: the intro if present, else the
    /// lowest-positioned node. None when the story has no nodes.
    async fn get_first_playable_node(&self, story_id: &str) -> StorageResult<Option<SceneNode>>;
    /// Follow the single outgoing edge of a node. None signals the end of
    /// the question chain.
    async fn get_next_node(&self, node_id: &str) -> StorageResult<Option<SceneNode>>;
    /// Get the ending node for a tier. None means the story has no
    /// configured ending for that tier.
    async fn get_ending_for_tier(
        &self,
        story_id: &str,
        tier: EndingTier,
    ) -> StorageResult<Option<SceneNode>>;
    /// Count the question nodes in a story.
    async fn count_questions(&self, story_id: &str) -> StorageResult<i64>;

    // Answer choice operations

    /// Create a new answer choice.
    async fn create_choice(&self, choice: &AnswerChoice) -> StorageResult<()>;
    /// Get a choice by ID.
    async fn get_choice(&self, id: &str) -> StorageResult<Option<AnswerChoice>>;
    /// Get all choices on a node, ordered by position.
    async fn get_node_choices(&self, node_id: &str) -> StorageResult<Vec<AnswerChoice>>;

    // Play session operations

    /// Create a new play session.
    async fn create_session(&self, session: &PlaySession) -> StorageResult<()>;
    /// Get a session by ID.
    async fn get_session(&self, id: &str) -> StorageResult<Option<PlaySession>>;
    /// Overwrite a session record in one statement, keeping score and
    /// position in sync. Errors when the session does not exist.
    async fn save_session(&self, session: &PlaySession) -> StorageResult<()>;
    /// Delete a session by ID. Returns whether a row was removed.
    async fn delete_session(&self, id: &str) -> StorageResult<bool>;

    // Story counter operations

    /// Record a session start: played and abandoned both increment (every
    /// started session is provisionally not-yet-finished).
    async fn record_play_started(&self, story_id: &str) -> StorageResult<()>;
    /// Record a finish (Good or Neutral tier): finished increments and the
    /// provisional abandoned count is released, floored at zero.
    async fn record_play_finished(&self, story_id: &str) -> StorageResult<()>;
    /// Record a failure (Bad tier): failed increments and the provisional
    /// abandoned count is released, floored at zero.
    async fn record_play_failed(&self, story_id: &str) -> StorageResult<()>;
    /// Release the provisional abandoned count only (termination with no
    /// configured ending).
    async fn release_abandoned(&self, story_id: &str) -> StorageResult<()>;
    /// Get the lifetime counters for a story.
    async fn get_counters(&self, story_id: &str) -> StorageResult<StoryCounters>;
}
