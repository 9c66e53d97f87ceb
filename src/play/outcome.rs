//! Per-story outcome aggregation.
//!
//! Bumps the owning story's lifetime counters when a session terminates.
//! Every counter change is a single atomic statement in the storage layer,
//! so concurrent sessions on one story never lose updates.

use std::sync::Arc;

use tracing::debug;

use crate::error::StorageResult;
use crate::storage::Storage;
use crate::story::EndingTier;

/// Maps a session's terminal tier to story counter updates.
#[derive(Clone)]
pub struct OutcomeAggregator {
    storage: Arc<dyn Storage>,
}

impl OutcomeAggregator {
    /// Create a new aggregator over the given storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Record a session start: every started session is provisionally
    /// counted as abandoned until it terminates.
    pub async fn record_start(&self, story_id: &str) -> StorageResult<()> {
        self.storage.record_play_started(story_id).await
    }

    /// Record a termination. Called exactly once per session.
    ///
    /// Good and Neutral tiers count as finished, Bad as failed; a session
    /// that terminated with no recorded tier (no ending configured) only
    /// releases its provisional abandoned count.
    pub async fn record_termination(
        &self,
        story_id: &str,
        tier: Option<EndingTier>,
    ) -> StorageResult<()> {
        debug!(story_id = %story_id, tier = ?tier, "Recording session outcome");

        match tier {
            Some(EndingTier::Good) | Some(EndingTier::Neutral) => {
                self.storage.record_play_finished(story_id).await
            }
            Some(EndingTier::Bad) => self.storage.record_play_failed(story_id).await,
            None => self.storage.release_abandoned(story_id).await,
        }
    }
}
