use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ending::resolve_ending;
use super::outcome::OutcomeAggregator;
use crate::config::GameConfig;
use crate::error::{PlayError, PlayResult};
use crate::storage::{PlaySession, Storage};
use crate::story::{NodeKind, SceneNode, Story};

/// Input parameters for starting a play session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartParams {
    /// The story to play.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
    /// Access code resolving a private story (used when `story_id` is absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    /// Optional player identity; anonymous play is allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl StartParams {
    /// Start by story ID
    pub fn by_story(story_id: impl Into<String>) -> Self {
        Self {
            story_id: Some(story_id.into()),
            access_code: None,
            user_id: None,
        }
    }

    /// Start by access code
    pub fn by_access_code(code: impl Into<String>) -> Self {
        Self {
            story_id: None,
            access_code: Some(code.into()),
            user_id: None,
        }
    }

    /// Set the player
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// One answer option as rendered to the player (correctness hidden).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceView {
    /// Choice identifier to submit back via answer.
    pub choice_id: String,
    /// Display text.
    pub text: String,
}

/// The scene a client should render after an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneView {
    /// The session this scene belongs to.
    pub session_id: String,
    /// The node being rendered.
    pub node_id: String,
    /// Kind of scene.
    pub kind: NodeKind,
    /// Display text.
    pub text: String,
    /// Answer options, present only on question scenes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceView>>,
    /// Whether another node follows in the chain.
    pub has_next: bool,
    /// Whether the session has terminated.
    pub finished: bool,
    /// Score change from the action that produced this scene.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<i64>,
    /// Authored feedback for the choice just answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Final summary of a play session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaySummary {
    /// The session summarized.
    pub session_id: String,
    /// Accumulated score.
    pub final_score: i64,
    /// Maximum attainable score.
    pub max_score: i64,
    /// Resolved tier; None while active or after a termination with no
    /// configured ending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending_tier: Option<crate::story::EndingTier>,
    /// Ending display text, when an ending node was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending_text: Option<String>,
    /// Whether the session has terminated.
    pub finished: bool,
}

/// The play-session state machine.
///
/// Tracks a player's position in the story graph, accumulates score on
/// answers, and resolves the terminal ending when the question chain runs
/// out. Every transition persists position and score together in one
/// `save_session` call.
pub struct PlayEngine {
    storage: Arc<dyn Storage>,
    outcomes: OutcomeAggregator,
    game: GameConfig,
    /// Per-session mutual exclusion: duplicate submissions (double form
    /// posts) must not double-score. Entries live only while an action
    /// holds or waits on them; the last user removes its entry.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlayEngine {
    /// Create a new engine over the given storage
    pub fn new(storage: Arc<dyn Storage>, game: GameConfig) -> Self {
        let outcomes = OutcomeAggregator::new(Arc::clone(&storage));
        Self {
            storage,
            outcomes,
            game,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new play session on a story.
    ///
    /// The entry node is the intro when present, else the lowest-positioned
    /// node; a story with neither is not playable. The story's played and
    /// abandoned counters both bump here: a started session is provisionally
    /// abandoned until it terminates.
    pub async fn start(&self, params: StartParams) -> PlayResult<SceneView> {
        let story = self.resolve_story(&params).await?;

        let entry = self
            .storage
            .get_first_playable_node(&story.id)
            .await?
            .ok_or_else(|| PlayError::InvalidStory {
                story_id: story.id.clone(),
                reason: "story has no intro and no nodes".to_string(),
            })?;

        let question_count = self.storage.count_questions(&story.id).await?;
        let max_score = question_count * self.game.points_per_question;

        let mut session = PlaySession::new(&story.id, &entry.id, max_score, self.game.default_level);
        if let Some(user_id) = params.user_id {
            session = session.with_user(user_id);
        }

        self.storage.create_session(&session).await?;
        self.outcomes.record_start(&story.id).await?;

        info!(
            session_id = %session.id,
            story_id = %story.id,
            max_score,
            "Play session started"
        );

        self.scene_view(&session, &entry, None, None).await
    }

    /// Return the current scene without advancing.
    ///
    /// Pure read: repeated calls return the identical scene.
    pub async fn scene(&self, session_id: &str) -> PlayResult<SceneView> {
        let session = self.load_session(session_id).await?;
        let node = self.current_node(&session).await?;
        self.scene_view(&session, &node, None, None).await
    }

    /// Advance past a node with no player choice (the intro).
    ///
    /// Moves to the next node in the chain; when the chain is exhausted the
    /// session terminates through ending resolution with the current score.
    pub async fn advance(&self, session_id: &str) -> PlayResult<SceneView> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.advance_locked(session_id).await
        };
        self.release_session_lock(session_id, &lock).await;
        result
    }

    async fn advance_locked(&self, session_id: &str) -> PlayResult<SceneView> {
        let mut session = self.load_session(session_id).await?;
        self.ensure_active(&session)?;

        match self.storage.get_next_node(&session.current_node_id).await? {
            Some(next) => {
                session.current_node_id = next.id.clone();
                self.storage.save_session(&session).await?;
                debug!(session_id = %session.id, node_id = %next.id, "Advanced to next node");
                self.scene_view(&session, &next, None, None).await
            }
            None => {
                let landed = self.finish_session(&mut session).await?;
                self.scene_view(&session, &landed, None, None).await
            }
        }
    }

    /// Answer the current question.
    ///
    /// The choice must belong to the session's current node; a mismatch is
    /// rejected without touching score or position. Correct choices add the
    /// per-question increment. Position and score persist in one write.
    pub async fn answer(&self, session_id: &str, choice_id: &str) -> PlayResult<SceneView> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.answer_locked(session_id, choice_id).await
        };
        self.release_session_lock(session_id, &lock).await;
        result
    }

    async fn answer_locked(&self, session_id: &str, choice_id: &str) -> PlayResult<SceneView> {
        let mut session = self.load_session(session_id).await?;
        self.ensure_active(&session)?;

        let choice = self
            .storage
            .get_choice(choice_id)
            .await?
            .ok_or_else(|| PlayError::ChoiceNotFound {
                choice_id: choice_id.to_string(),
            })?;

        if choice.node_id != session.current_node_id {
            return Err(PlayError::InvalidChoice {
                choice_id: choice_id.to_string(),
                node_id: session.current_node_id.clone(),
            });
        }

        // The choice's is_correct flag is trusted as-is; zero-or-many-correct
        // stories are an authoring-time problem, not a play-time one.
        let delta = if choice.is_correct {
            self.game.points_per_question
        } else {
            0
        };
        session.score += delta;

        debug!(
            session_id = %session.id,
            choice_id = %choice.id,
            correct = choice.is_correct,
            score = session.score,
            "Answer submitted"
        );

        match self.storage.get_next_node(&session.current_node_id).await? {
            Some(next) => {
                session.current_node_id = next.id.clone();
                self.storage.save_session(&session).await?;
                self.scene_view(&session, &next, Some(delta), choice.feedback)
                    .await
            }
            None => {
                let landed = self.finish_session(&mut session).await?;
                self.scene_view(&session, &landed, Some(delta), choice.feedback)
                    .await
            }
        }
    }

    /// Summarize a session: final score, max score, and the resolved ending.
    pub async fn result(&self, session_id: &str) -> PlayResult<PlaySummary> {
        let session = self.load_session(session_id).await?;
        let node = self.current_node(&session).await?;

        let ending_text = if node.kind == NodeKind::Ending {
            Some(node.text)
        } else {
            None
        };

        let finished = session.is_finished();
        Ok(PlaySummary {
            session_id: session.id,
            final_score: session.score,
            max_score: session.max_score,
            ending_tier: session.ending_tier,
            ending_text,
            finished,
        })
    }

    /// Terminate the session: resolve the tier from score/max, move onto the
    /// matching ending node if one is configured, stamp the end time, persist
    /// once, and record the outcome exactly once.
    ///
    /// Returns the node the session ends on. With no configured ending the
    /// session terminates in place with no recorded tier.
    async fn finish_session(&self, session: &mut PlaySession) -> PlayResult<SceneNode> {
        let tier = resolve_ending(session.score, session.max_score);
        let ending = self
            .storage
            .get_ending_for_tier(&session.story_id, tier)
            .await?;

        let landed = match ending {
            Some(node) => {
                session.current_node_id = node.id.clone();
                session.ending_tier = Some(tier);
                node
            }
            None => {
                // Degenerate: story has no ending for this tier. Terminate
                // where we stand, with no recorded tier.
                session.ending_tier = None;
                self.current_node(session).await?
            }
        };

        session.ended_at = Some(Utc::now());
        self.storage.save_session(session).await?;
        self.outcomes
            .record_termination(&session.story_id, session.ending_tier)
            .await?;

        info!(
            session_id = %session.id,
            score = session.score,
            max_score = session.max_score,
            tier = ?session.ending_tier,
            "Play session finished"
        );

        Ok(landed)
    }

    async fn resolve_story(&self, params: &StartParams) -> PlayResult<Story> {
        if let Some(story_id) = params.story_id.as_deref() {
            return self
                .storage
                .get_story(story_id)
                .await?
                .ok_or_else(|| PlayError::StoryNotFound {
                    story_id: story_id.to_string(),
                });
        }

        if let Some(code) = params.access_code.as_deref() {
            return self
                .storage
                .find_story_by_access_code(code)
                .await?
                .ok_or_else(|| PlayError::StoryNotFound {
                    story_id: format!("access-code:{}", code),
                });
        }

        Err(PlayError::StoryNotFound {
            story_id: "(no story_id or access_code given)".to_string(),
        })
    }

    async fn load_session(&self, session_id: &str) -> PlayResult<PlaySession> {
        self.storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| PlayError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn current_node(&self, session: &PlaySession) -> PlayResult<SceneNode> {
        self.storage
            .get_node(&session.current_node_id)
            .await?
            .ok_or_else(|| PlayError::NodeNotFound {
                node_id: session.current_node_id.clone(),
            })
    }

    fn ensure_active(&self, session: &PlaySession) -> PlayResult<()> {
        if session.is_finished() {
            return Err(PlayError::SessionAlreadyFinished {
                session_id: session.id.clone(),
            });
        }
        Ok(())
    }

    async fn scene_view(
        &self,
        session: &PlaySession,
        node: &SceneNode,
        score_delta: Option<i64>,
        feedback: Option<String>,
    ) -> PlayResult<SceneView> {
        let choices = if node.kind == NodeKind::Question {
            let choices = self.storage.get_node_choices(&node.id).await?;
            Some(
                choices
                    .into_iter()
                    .map(|c| ChoiceView {
                        choice_id: c.id,
                        text: c.text,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(SceneView {
            session_id: session.id.clone(),
            node_id: node.id.clone(),
            kind: node.kind,
            text: node.text.clone(),
            choices,
            has_next: node.next_node_id.is_some(),
            finished: session.is_finished(),
            score_delta,
            feedback,
        })
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock map entry unless another caller still holds a clone.
    ///
    /// The map holds one reference and `lock` is ours; a higher count means
    /// a queued waiter, whose own release removes the entry. New clones are
    /// only handed out under the map mutex, so the count cannot rise while
    /// we check it.
    async fn release_session_lock(&self, session_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(lock) <= 2 {
            locks.remove(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteStorage, Storage};
    use crate::story::AnswerChoice;

    async fn engine_with_story() -> (PlayEngine, String) {
        let storage = SqliteStorage::new_in_memory().await.unwrap();

        let story = Story::new("Locked Room");
        storage.create_story(&story).await.unwrap();

        let question = SceneNode::new(&story.id, "Which key?").with_position(1);
        let intro = SceneNode::new(&story.id, "A door.")
            .as_intro()
            .with_next(&question.id);
        storage.create_node(&question).await.unwrap();
        storage.create_node(&intro).await.unwrap();
        storage
            .create_choice(&AnswerChoice::new(&question.id, "the brass one").as_correct())
            .await
            .unwrap();

        let engine = PlayEngine::new(Arc::new(storage), GameConfig::default());
        (engine, story.id)
    }

    #[tokio::test]
    async fn test_lock_map_sheds_entry_after_action() {
        let (engine, story_id) = engine_with_story().await;

        let scene = engine.start(StartParams::by_story(&story_id)).await.unwrap();
        engine.advance(&scene.session_id).await.unwrap();

        // The session is still active, but no action is in flight.
        assert_eq!(engine.locks.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn test_lock_map_sheds_entry_on_error() {
        let (engine, _) = engine_with_story().await;

        let err = engine.advance("no-such-session").await.unwrap_err();
        assert!(matches!(err, PlayError::SessionNotFound { .. }));

        assert_eq!(engine.locks.lock().await.len(), 0);
    }
}
