use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::error::{RpcError, RpcResult};
use crate::play::StartParams;

/// Route play actions to the engine
pub async fn handle_action(
    state: &SharedState,
    method: &str,
    params: Option<Value>,
) -> RpcResult<Value> {
    info!(method = %method, "Routing play action");

    match method {
        "play/start" => handle_start(state, params).await,
        "play/scene" => handle_scene(state, params).await,
        "play/advance" => handle_advance(state, params).await,
        "play/answer" => handle_answer(state, params).await,
        "play/result" => handle_result(state, params).await,
        _ => Err(RpcError::UnknownMethod {
            method: method.to_string(),
        }),
    }
}

/// Handle play/start
async fn handle_start(state: &SharedState, params: Option<Value>) -> RpcResult<Value> {
    let params: StartParams = parse_params("play/start", params)?;

    if params.story_id.is_none() && params.access_code.is_none() {
        return Err(RpcError::InvalidParameters {
            method: "play/start".to_string(),
            message: "either story_id or access_code is required".to_string(),
        });
    }

    to_result(state.engine.start(params).await?)
}

/// Handle play/scene
async fn handle_scene(state: &SharedState, params: Option<Value>) -> RpcResult<Value> {
    let params: SessionParams = parse_params("play/scene", params)?;
    to_result(state.engine.scene(&params.session_id).await?)
}

/// Handle play/advance
async fn handle_advance(state: &SharedState, params: Option<Value>) -> RpcResult<Value> {
    let params: SessionParams = parse_params("play/advance", params)?;
    to_result(state.engine.advance(&params.session_id).await?)
}

/// Handle play/answer
async fn handle_answer(state: &SharedState, params: Option<Value>) -> RpcResult<Value> {
    #[derive(serde::Deserialize)]
    struct AnswerParams {
        session_id: String,
        choice_id: String,
    }

    let params: AnswerParams = parse_params("play/answer", params)?;
    to_result(
        state
            .engine
            .answer(&params.session_id, &params.choice_id)
            .await?,
    )
}

/// Handle play/result
async fn handle_result(state: &SharedState, params: Option<Value>) -> RpcResult<Value> {
    let params: SessionParams = parse_params("play/result", params)?;
    to_result(state.engine.result(&params.session_id).await?)
}

#[derive(serde::Deserialize)]
struct SessionParams {
    session_id: String,
}

fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> RpcResult<T> {
    match params {
        Some(params) => serde_json::from_value(params).map_err(|e| RpcError::InvalidParameters {
            method: method.to_string(),
            message: e.to_string(),
        }),
        None => Err(RpcError::InvalidParameters {
            method: method.to_string(),
            message: "Missing parameters".to_string(),
        }),
    }
}

fn to_result<R: Serialize>(result: R) -> RpcResult<Value> {
    serde_json::to_value(result).map_err(RpcError::Json)
}
