use std::sync::Arc;

use serde_json::{json, Value};

use super::*;
use crate::config::{Config, DatabaseConfig, GameConfig, LogFormat, LoggingConfig};
use crate::server::AppState;
use crate::storage::{SqliteStorage, Storage};
use crate::story::{AnswerChoice, EndingTier, SceneNode, Story};

async fn seeded_server() -> (GameServer, String) {
    let config = Config {
        database: DatabaseConfig {
            path: ":memory:".into(),
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        game: GameConfig::default(),
    };
    let storage = SqliteStorage::new_in_memory().await.unwrap();

    let story = Story::new("The Lighthouse").as_published();
    storage.create_story(&story).await.unwrap();

    let question = SceneNode::new(&story.id, "How many lamps?").with_position(1);
    let intro = SceneNode::new(&story.id, "You arrive at the lighthouse.")
        .as_intro()
        .with_next(&question.id);
    storage.create_node(&question).await.unwrap();
    storage.create_node(&intro).await.unwrap();

    storage
        .create_choice(&AnswerChoice::new(&question.id, "One").as_correct())
        .await
        .unwrap();
    storage
        .create_choice(&AnswerChoice::new(&question.id, "Two").with_position(1))
        .await
        .unwrap();

    for tier in EndingTier::ALL {
        storage
            .create_node(&SceneNode::new(&story.id, format!("{} ending", tier)).as_ending(tier))
            .await
            .unwrap();
    }

    let state = Arc::new(AppState::new(config, storage));
    (GameServer::new(state), story.id)
}

fn request(method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(1)),
        method: method.to_string(),
        params: Some(params),
    }
}

#[tokio::test]
async fn test_initialize() {
    let (server, _) = seeded_server().await;

    let response = server
        .handle_request(request("initialize", json!({})))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["name"], "storyjam");
}

#[tokio::test]
async fn test_ping() {
    let (server, _) = seeded_server().await;

    let response = server.handle_request(request("ping", json!({}))).await.unwrap();
    assert!(response.result.is_some());
    assert!(response.error.is_none());
}

#[tokio::test]
async fn test_unknown_method() {
    let (server, _) = seeded_server().await;

    let response = server
        .handle_request(request("story/publish", json!({})))
        .await
        .unwrap();

    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn test_notification_gets_no_response() {
    let (server, _) = seeded_server().await;

    let notification = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "initialized".to_string(),
        params: None,
    };

    assert!(server.handle_request(notification).await.is_none());
}

#[tokio::test]
async fn test_start_requires_story_reference() {
    let (server, _) = seeded_server().await;

    let response = server
        .handle_request(request("play/start", json!({})))
        .await
        .unwrap();

    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_start_unknown_story_is_client_error() {
    let (server, _) = seeded_server().await;

    let response = server
        .handle_request(request("play/start", json!({"story_id": "no-such-story"})))
        .await
        .unwrap();

    assert_eq!(response.error.unwrap().code, -32001);
}

#[tokio::test]
async fn test_full_play_flow_over_rpc() {
    let (server, story_id) = seeded_server().await;

    // Start lands on the intro.
    let response = server
        .handle_request(request("play/start", json!({"story_id": story_id})))
        .await
        .unwrap();
    let scene = response.result.unwrap();
    assert_eq!(scene["kind"], "intro");
    let session_id = scene["session_id"].as_str().unwrap().to_string();

    // Advance onto the question.
    let response = server
        .handle_request(request("play/advance", json!({"session_id": session_id})))
        .await
        .unwrap();
    let scene = response.result.unwrap();
    assert_eq!(scene["kind"], "question");
    let choices = scene["choices"].as_array().unwrap();
    let correct_id = choices[0]["choice_id"].as_str().unwrap();

    // Answering the single question terminates the session on an ending.
    let response = server
        .handle_request(request(
            "play/answer",
            json!({"session_id": session_id, "choice_id": correct_id}),
        ))
        .await
        .unwrap();
    let scene = response.result.unwrap();
    assert_eq!(scene["kind"], "ending");
    assert_eq!(scene["score_delta"], 10);
    assert_eq!(scene["finished"], true);

    // Result reports the Good tier (1/1 correct).
    let response = server
        .handle_request(request("play/result", json!({"session_id": session_id})))
        .await
        .unwrap();
    let summary = response.result.unwrap();
    assert_eq!(summary["final_score"], 10);
    assert_eq!(summary["max_score"], 10);
    assert_eq!(summary["ending_tier"], "good");

    // Further actions are rejected with the finished code.
    let response = server
        .handle_request(request("play/advance", json!({"session_id": session_id})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32004);
}
