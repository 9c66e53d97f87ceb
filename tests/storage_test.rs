//! Integration tests for the SQLite storage layer.

use pretty_assertions::assert_eq;

use storyjam::storage::{PlaySession, SqliteStorage, Storage};
use storyjam::story::{AnswerChoice, EndingTier, NodeKind, SceneNode, Story};

async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

#[tokio::test]
async fn test_file_backed_storage_persists_across_reconnect() {
    use storyjam::config::DatabaseConfig;

    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("nested").join("test.db"),
        max_connections: 2,
    };

    let story = Story::new("Persistent");
    {
        let storage = SqliteStorage::new(&config).await.unwrap();
        storage.create_story(&story).await.unwrap();
    }

    let storage = SqliteStorage::new(&config).await.unwrap();
    let loaded = storage.get_story(&story.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Persistent");
}

mod story_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_and_get_story() {
        let storage = create_test_storage().await;

        let story = Story::new("Night Train")
            .with_description("A ride through the dark")
            .with_author("author-1");
        storage.create_story(&story).await.unwrap();

        let loaded = storage.get_story(&story.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, story.id);
        assert_eq!(loaded.title, "Night Train");
        assert_eq!(loaded.description.as_deref(), Some("A ride through the dark"));
        assert_eq!(loaded.author_id.as_deref(), Some("author-1"));
        assert!(!loaded.published);
    }

    #[tokio::test]
    async fn test_get_missing_story() {
        let storage = create_test_storage().await;

        let result = storage.get_story("does-not-exist").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_story_by_access_code() {
        let storage = create_test_storage().await;

        let story = Story::new("Hidden").with_access_code("jam-secret");
        storage.create_story(&story).await.unwrap();

        let found = storage
            .find_story_by_access_code("jam-secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, story.id);

        let missing = storage.find_story_by_access_code("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_set_published() {
        let storage = create_test_storage().await;

        let story = Story::new("Draft");
        storage.create_story(&story).await.unwrap();

        storage.set_published(&story.id, true).await.unwrap();
        let loaded = storage.get_story(&story.id).await.unwrap().unwrap();
        assert!(loaded.published);

        storage.set_published(&story.id, false).await.unwrap();
        let loaded = storage.get_story(&story.id).await.unwrap().unwrap();
        assert!(!loaded.published);
    }
}

mod node_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_and_get_node() {
        let storage = create_test_storage().await;

        let story = Story::new("Nodes");
        storage.create_story(&story).await.unwrap();

        let node = SceneNode::new(&story.id, "What happens next?").with_position(2);
        storage.create_node(&node).await.unwrap();

        let loaded = storage.get_node(&node.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, node.id);
        assert_eq!(loaded.kind, NodeKind::Question);
        assert_eq!(loaded.text, "What happens next?");
        assert_eq!(loaded.position, 2);
        assert!(loaded.next_node_id.is_none());
        assert!(loaded.ending_tier.is_none());
    }

    #[tokio::test]
    async fn test_get_story_nodes_ordered_by_position() {
        let storage = create_test_storage().await;

        let story = Story::new("Ordered");
        storage.create_story(&story).await.unwrap();

        for pos in [3i64, 1, 2] {
            storage
                .create_node(&SceneNode::new(&story.id, format!("node {}", pos)).with_position(pos))
                .await
                .unwrap();
        }

        let nodes = storage.get_story_nodes(&story.id).await.unwrap();
        let positions: Vec<i64> = nodes.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_intro() {
        let storage = create_test_storage().await;

        let story = Story::new("With Intro");
        storage.create_story(&story).await.unwrap();

        let intro = SceneNode::new(&story.id, "Welcome.").as_intro();
        storage.create_node(&intro).await.unwrap();
        storage
            .create_node(&SceneNode::new(&story.id, "Q1").with_position(1))
            .await
            .unwrap();

        let loaded = storage.get_intro(&story.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, intro.id);
        assert_eq!(loaded.kind, NodeKind::Intro);
    }

    #[tokio::test]
    async fn test_first_playable_prefers_intro() {
        let storage = create_test_storage().await;

        let story = Story::new("Entry");
        storage.create_story(&story).await.unwrap();

        storage
            .create_node(&SceneNode::new(&story.id, "Q1").with_position(0))
            .await
            .unwrap();
        let intro = SceneNode::new(&story.id, "Intro.").as_intro().with_position(99);
        storage.create_node(&intro).await.unwrap();

        let entry = storage
            .get_first_playable_node(&story.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.id, intro.id);
    }

    #[tokio::test]
    async fn test_first_playable_falls_back_to_lowest_position() {
        let storage = create_test_storage().await;

        let story = Story::new("No Intro");
        storage.create_story(&story).await.unwrap();

        let first = SceneNode::new(&story.id, "Q1").with_position(1);
        storage
            .create_node(&SceneNode::new(&story.id, "Q2").with_position(2))
            .await
            .unwrap();
        storage.create_node(&first).await.unwrap();

        let entry = storage
            .get_first_playable_node(&story.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.id, first.id);
    }

    #[tokio::test]
    async fn test_first_playable_none_for_empty_story() {
        let storage = create_test_storage().await;

        let story = Story::new("Empty");
        storage.create_story(&story).await.unwrap();

        let entry = storage.get_first_playable_node(&story.id).await.unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_get_next_node_follows_chain() {
        let storage = create_test_storage().await;

        let story = Story::new("Chain");
        storage.create_story(&story).await.unwrap();

        let second = SceneNode::new(&story.id, "Q2").with_position(2);
        let first = SceneNode::new(&story.id, "Q1")
            .with_position(1)
            .with_next(&second.id);
        storage.create_node(&second).await.unwrap();
        storage.create_node(&first).await.unwrap();

        let next = storage.get_next_node(&first.id).await.unwrap().unwrap();
        assert_eq!(next.id, second.id);

        let end = storage.get_next_node(&second.id).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_get_ending_for_tier() {
        let storage = create_test_storage().await;

        let story = Story::new("Endings");
        storage.create_story(&story).await.unwrap();

        for tier in EndingTier::ALL {
            storage
                .create_node(&SceneNode::new(&story.id, format!("{} end", tier)).as_ending(tier))
                .await
                .unwrap();
        }

        let good = storage
            .get_ending_for_tier(&story.id, EndingTier::Good)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(good.kind, NodeKind::Ending);
        assert_eq!(good.ending_tier, Some(EndingTier::Good));

        let other = Story::new("No Endings");
        storage.create_story(&other).await.unwrap();
        let missing = storage
            .get_ending_for_tier(&other.id, EndingTier::Bad)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_count_questions_excludes_intro_and_endings() {
        let storage = create_test_storage().await;

        let story = Story::new("Counting");
        storage.create_story(&story).await.unwrap();

        storage
            .create_node(&SceneNode::new(&story.id, "Intro").as_intro())
            .await
            .unwrap();
        for i in 0..3i64 {
            storage
                .create_node(&SceneNode::new(&story.id, format!("Q{}", i)).with_position(i))
                .await
                .unwrap();
        }
        storage
            .create_node(&SceneNode::new(&story.id, "End").as_ending(EndingTier::Good))
            .await
            .unwrap();

        let count = storage.count_questions(&story.id).await.unwrap();
        assert_eq!(count, 3);
    }
}

mod choice_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_question(storage: &SqliteStorage) -> SceneNode {
        let story = Story::new("Choices");
        storage.create_story(&story).await.unwrap();
        let node = SceneNode::new(&story.id, "Pick one");
        storage.create_node(&node).await.unwrap();
        node
    }

    #[tokio::test]
    async fn test_create_and_get_choice() {
        let storage = create_test_storage().await;
        let node = seed_question(&storage).await;

        let choice = AnswerChoice::new(&node.id, "the answer")
            .as_correct()
            .with_feedback("Well spotted.");
        storage.create_choice(&choice).await.unwrap();

        let loaded = storage.get_choice(&choice.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, choice.id);
        assert_eq!(loaded.node_id, node.id);
        assert!(loaded.is_correct);
        assert_eq!(loaded.feedback.as_deref(), Some("Well spotted."));
    }

    #[tokio::test]
    async fn test_node_choices_ordered_by_position() {
        let storage = create_test_storage().await;
        let node = seed_question(&storage).await;

        for pos in [2i64, 0, 1] {
            storage
                .create_choice(&AnswerChoice::new(&node.id, format!("option {}", pos)).with_position(pos))
                .await
                .unwrap();
        }

        let choices = storage.get_node_choices(&node.id).await.unwrap();
        let positions: Vec<i64> = choices.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}

mod session_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_story(storage: &SqliteStorage) -> (Story, SceneNode) {
        let story = Story::new("Session Story");
        storage.create_story(&story).await.unwrap();
        let node = SceneNode::new(&story.id, "Intro").as_intro();
        storage.create_node(&node).await.unwrap();
        (story, node)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let storage = create_test_storage().await;
        let (story, node) = seed_story(&storage).await;

        let session = PlaySession::new(&story.id, &node.id, 30, 3).with_user("player-7");
        storage.create_session(&session).await.unwrap();

        let loaded = storage.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.story_id, story.id);
        assert_eq!(loaded.user_id.as_deref(), Some("player-7"));
        assert_eq!(loaded.current_node_id, node.id);
        assert_eq!(loaded.score, 0);
        assert_eq!(loaded.max_score, 30);
        assert_eq!(loaded.level, 3);
        assert!(loaded.ended_at.is_none());
        assert!(loaded.ending_tier.is_none());
        assert!(!loaded.is_finished());
    }

    #[tokio::test]
    async fn test_save_session_updates_all_mutable_fields() {
        let storage = create_test_storage().await;
        let (story, node) = seed_story(&storage).await;

        let other = SceneNode::new(&story.id, "Q1").with_position(1);
        storage.create_node(&other).await.unwrap();

        let mut session = PlaySession::new(&story.id, &node.id, 30, 3);
        storage.create_session(&session).await.unwrap();

        session.current_node_id = other.id.clone();
        session.score = 20;
        session.ended_at = Some(chrono::Utc::now());
        session.ending_tier = Some(EndingTier::Neutral);
        storage.save_session(&session).await.unwrap();

        let loaded = storage.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_node_id, other.id);
        assert_eq!(loaded.score, 20);
        assert!(loaded.ended_at.is_some());
        assert_eq!(loaded.ending_tier, Some(EndingTier::Neutral));
        assert!(loaded.is_finished());
    }

    #[tokio::test]
    async fn test_save_missing_session_errors() {
        let storage = create_test_storage().await;
        let (story, node) = seed_story(&storage).await;

        let session = PlaySession::new(&story.id, &node.id, 10, 3);
        let err = storage.save_session(&session).await.unwrap_err();
        assert!(err.to_string().contains(&session.id));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let storage = create_test_storage().await;
        let (story, node) = seed_story(&storage).await;

        let session = PlaySession::new(&story.id, &node.id, 10, 3);
        storage.create_session(&session).await.unwrap();

        assert!(storage.delete_session(&session.id).await.unwrap());
        assert!(storage.get_session(&session.id).await.unwrap().is_none());
        assert!(!storage.delete_session(&session.id).await.unwrap());
    }
}

mod counter_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_story(storage: &SqliteStorage) -> Story {
        let story = Story::new("Counted");
        storage.create_story(&story).await.unwrap();
        story
    }

    #[tokio::test]
    async fn test_counters_start_at_zero() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.played_count, 0);
        assert_eq!(counters.finished_count, 0);
        assert_eq!(counters.failed_count, 0);
        assert_eq!(counters.abandoned_count, 0);
    }

    #[tokio::test]
    async fn test_start_bumps_played_and_abandoned() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        storage.record_play_started(&story.id).await.unwrap();
        storage.record_play_started(&story.id).await.unwrap();

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.played_count, 2);
        assert_eq!(counters.abandoned_count, 2);
    }

    #[tokio::test]
    async fn test_finish_releases_abandoned() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        storage.record_play_started(&story.id).await.unwrap();
        storage.record_play_finished(&story.id).await.unwrap();

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.played_count, 1);
        assert_eq!(counters.finished_count, 1);
        assert_eq!(counters.abandoned_count, 0);
    }

    #[tokio::test]
    async fn test_fail_releases_abandoned() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        storage.record_play_started(&story.id).await.unwrap();
        storage.record_play_failed(&story.id).await.unwrap();

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.failed_count, 1);
        assert_eq!(counters.abandoned_count, 0);
    }

    #[tokio::test]
    async fn test_abandoned_floors_at_zero() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        // Release without a matching start: the floor holds.
        storage.record_play_finished(&story.id).await.unwrap();
        storage.release_abandoned(&story.id).await.unwrap();

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.finished_count, 1);
        assert_eq!(counters.abandoned_count, 0);
    }

    #[tokio::test]
    async fn test_release_abandoned_touches_no_other_counter() {
        let storage = create_test_storage().await;
        let story = seed_story(&storage).await;

        storage.record_play_started(&story.id).await.unwrap();
        storage.release_abandoned(&story.id).await.unwrap();

        let counters = storage.get_counters(&story.id).await.unwrap();
        assert_eq!(counters.played_count, 1);
        assert_eq!(counters.finished_count, 0);
        assert_eq!(counters.failed_count, 0);
        assert_eq!(counters.abandoned_count, 0);
    }
}
