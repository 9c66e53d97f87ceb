use std::str::FromStr;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::{PlaySession, Storage, StoryCounters};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::story::{AnswerChoice, EndingTier, NodeKind, SceneNode, Story};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory instance for tests.
    ///
    /// Pinned to a single connection: every pooled connection would
    /// otherwise open its own empty in-memory database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const NODE_COLUMNS: &str =
    "id, story_id, kind, text, position, next_node_id, ending_tier, created_at";

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_story(&self, story: &Story) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stories (id, title, description, visibility, access_code, author_id, published, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&story.id)
        .bind(&story.title)
        .bind(&story.description)
        .bind(story.visibility.to_string())
        .bind(&story.access_code)
        .bind(&story.author_id)
        .bind(story.published)
        .bind(story.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_story(&self, id: &str) -> StorageResult<Option<Story>> {
        let row: Option<StoryRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, visibility, access_code, author_id, published, created_at
            FROM stories
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_story_by_access_code(&self, code: &str) -> StorageResult<Option<Story>> {
        let row: Option<StoryRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, visibility, access_code, author_id, published, created_at
            FROM stories
            WHERE access_code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn set_published(&self, story_id: &str, published: bool) -> StorageResult<()> {
        sqlx::query("UPDATE stories SET published = ? WHERE id = ?")
            .bind(published)
            .bind(story_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_node(&self, node: &SceneNode) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scene_nodes (id, story_id, kind, text, position, next_node_id, ending_tier, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&node.id)
        .bind(&node.story_id)
        .bind(node.kind.to_string())
        .bind(&node.text)
        .bind(node.position)
        .bind(&node.next_node_id)
        .bind(node.ending_tier.map(|t| t.to_string()))
        .bind(node.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_node(&self, id: &str) -> StorageResult<Option<SceneNode>> {
        let sql = format!("SELECT {} FROM scene_nodes WHERE id = ?", NODE_COLUMNS);
        let row: Option<SceneNodeRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_story_nodes(&self, story_id: &str) -> StorageResult<Vec<SceneNode>> {
        let sql = format!(
            "SELECT {} FROM scene_nodes WHERE story_id = ? ORDER BY position ASC",
            NODE_COLUMNS
        );
        let rows: Vec<SceneNodeRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_intro(&self, story_id: &str) -> StorageResult<Option<SceneNode>> {
        let sql = format!(
            "SELECT {} FROM scene_nodes WHERE story_id = ? AND kind = 'intro' LIMIT 1",
            NODE_COLUMNS
        );
        let row: Option<SceneNodeRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_first_playable_node(&self, story_id: &str) -> StorageResult<Option<SceneNode>> {
        if let Some(intro) = self.get_intro(story_id).await? {
            return Ok(Some(intro));
        }

        let sql = format!(
            "SELECT {} FROM scene_nodes WHERE story_id = ? ORDER BY position ASC LIMIT 1",
            NODE_COLUMNS
        );
        let row: Option<SceneNodeRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_next_node(&self, node_id: &str) -> StorageResult<Option<SceneNode>> {
        let row: Option<SceneNodeRow> = sqlx::query_as(
            r#"
            SELECT next.id, next.story_id, next.kind, next.text, next.position,
                   next.next_node_id, next.ending_tier, next.created_at
            FROM scene_nodes cur
            JOIN scene_nodes next ON next.id = cur.next_node_id
            WHERE cur.id = ?
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_ending_for_tier(
        &self,
        story_id: &str,
        tier: EndingTier,
    ) -> StorageResult<Option<SceneNode>> {
        let sql = format!(
            "SELECT {} FROM scene_nodes WHERE story_id = ? AND kind = 'ending' AND ending_tier = ? LIMIT 1",
            NODE_COLUMNS
        );
        let row: Option<SceneNodeRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .bind(tier.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn count_questions(&self, story_id: &str) -> StorageResult<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM scene_nodes WHERE story_id = ? AND kind = 'question'",
        )
        .bind(story_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn create_choice(&self, choice: &AnswerChoice) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO answer_choices (id, node_id, text, is_correct, feedback, position)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&choice.id)
        .bind(&choice.node_id)
        .bind(&choice.text)
        .bind(choice.is_correct)
        .bind(&choice.feedback)
        .bind(choice.position)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_choice(&self, id: &str) -> StorageResult<Option<AnswerChoice>> {
        let row: Option<AnswerChoiceRow> = sqlx::query_as(
            r#"
            SELECT id, node_id, text, is_correct, feedback, position
            FROM answer_choices
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_node_choices(&self, node_id: &str) -> StorageResult<Vec<AnswerChoice>> {
        let rows: Vec<AnswerChoiceRow> = sqlx::query_as(
            r#"
            SELECT id, node_id, text, is_correct, feedback, position
            FROM answer_choices
            WHERE node_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn create_session(&self, session: &PlaySession) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO play_sessions (id, story_id, user_id, current_node_id, score, max_score, level, started_at, ended_at, ending_tier)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.story_id)
        .bind(&session.user_id)
        .bind(&session.current_node_id)
        .bind(session.score)
        .bind(session.max_score)
        .bind(session.level)
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(session.ending_tier.map(|t| t.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<PlaySession>> {
        let row: Option<PlaySessionRow> = sqlx::query_as(
            r#"
            SELECT id, story_id, user_id, current_node_id, score, max_score, level, started_at, ended_at, ending_tier
            FROM play_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn save_session(&self, session: &PlaySession) -> StorageResult<()> {
        // Single statement: position, score, and end state land together.
        let result = sqlx::query(
            r#"
            UPDATE play_sessions
            SET current_node_id = ?, score = ?, level = ?, ended_at = ?, ending_tier = ?
            WHERE id = ?
            "#,
        )
        .bind(&session.current_node_id)
        .bind(session.score)
        .bind(session.level)
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(session.ending_tier.map(|t| t.to_string()))
        .bind(&session.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::SessionNotFound {
                session_id: session.id.clone(),
            });
        }

        Ok(())
    }

    async fn delete_session(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM play_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_play_started(&self, story_id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE stories
            SET played_count = played_count + 1,
                abandoned_count = abandoned_count + 1
            WHERE id = ?
            "#,
        )
        .bind(story_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_play_finished(&self, story_id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE stories
            SET finished_count = finished_count + 1,
                abandoned_count = CASE WHEN abandoned_count > 0 THEN abandoned_count - 1 ELSE 0 END
            WHERE id = ?
            "#,
        )
        .bind(story_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_play_failed(&self, story_id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE stories
            SET failed_count = failed_count + 1,
                abandoned_count = CASE WHEN abandoned_count > 0 THEN abandoned_count - 1 ELSE 0 END
            WHERE id = ?
            "#,
        )
        .bind(story_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn release_abandoned(&self, story_id: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE stories
            SET abandoned_count = CASE WHEN abandoned_count > 0 THEN abandoned_count - 1 ELSE 0 END
            WHERE id = ?
            "#,
        )
        .bind(story_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_counters(&self, story_id: &str) -> StorageResult<StoryCounters> {
        let row: Option<(i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT played_count, finished_count, failed_count, abandoned_count
            FROM stories
            WHERE id = ?
            "#,
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?;

        let (played_count, finished_count, failed_count, abandoned_count) =
            row.unwrap_or_default();

        Ok(StoryCounters {
            played_count,
            finished_count,
            failed_count,
            abandoned_count,
        })
    }
}

// Internal row types for SQLx mapping

#[derive(sqlx::FromRow)]
struct StoryRow {
    id: String,
    title: String,
    description: Option<String>,
    visibility: String,
    access_code: Option<String>,
    author_id: Option<String>,
    published: bool,
    created_at: String,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            visibility: row.visibility.parse().unwrap_or_default(),
            access_code: row.access_code,
            author_id: row.author_id,
            published: row.published,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SceneNodeRow {
    id: String,
    story_id: String,
    kind: String,
    text: String,
    position: i64,
    next_node_id: Option<String>,
    ending_tier: Option<String>,
    created_at: String,
}

impl From<SceneNodeRow> for SceneNode {
    fn from(row: SceneNodeRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            kind: row.kind.parse().unwrap_or(NodeKind::Question),
            text: row.text,
            position: row.position,
            next_node_id: row.next_node_id,
            ending_tier: row.ending_tier.and_then(|t| t.parse().ok()),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerChoiceRow {
    id: String,
    node_id: String,
    text: String,
    is_correct: bool,
    feedback: Option<String>,
    position: i64,
}

impl From<AnswerChoiceRow> for AnswerChoice {
    fn from(row: AnswerChoiceRow) -> Self {
        Self {
            id: row.id,
            node_id: row.node_id,
            text: row.text,
            is_correct: row.is_correct,
            feedback: row.feedback,
            position: row.position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlaySessionRow {
    id: String,
    story_id: String,
    user_id: Option<String>,
    current_node_id: String,
    score: i64,
    max_score: i64,
    level: i64,
    started_at: String,
    ended_at: Option<String>,
    ending_tier: Option<String>,
}

impl From<PlaySessionRow> for PlaySession {
    fn from(row: PlaySessionRow) -> Self {
        Self {
            id: row.id,
            story_id: row.story_id,
            user_id: row.user_id,
            current_node_id: row.current_node_id,
            score: row.score,
            max_score: row.max_score,
            level: row.level,
            started_at: parse_timestamp(&row.started_at),
            ended_at: row.ended_at.as_deref().map(parse_timestamp),
            ending_tier: row.ending_tier.and_then(|t| t.parse().ok()),
        }
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}
