use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Play error: {0}")]
    Play(#[from] PlayError),

    #[error("RPC protocol error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Gameplay errors surfaced by the navigation engine
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("Story not found: {story_id}")]
    StoryNotFound { story_id: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Choice not found: {choice_id}")]
    ChoiceNotFound { choice_id: String },

    #[error("Story {story_id} is not playable: {reason}")]
    InvalidStory { story_id: String, reason: String },

    #[error("Choice {choice_id} does not belong to the current node {node_id}")]
    InvalidChoice { choice_id: String, node_id: String },

    #[error("Session already finished: {session_id}")]
    SessionAlreadyFinished { session_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PlayError {
    /// JSON-RPC error code for this error.
    ///
    /// Not-found and invalid-input variants map to distinct client error
    /// codes so callers can react without parsing messages.
    pub fn rpc_code(&self) -> i32 {
        match self {
            PlayError::StoryNotFound { .. }
            | PlayError::SessionNotFound { .. }
            | PlayError::NodeNotFound { .. }
            | PlayError::ChoiceNotFound { .. } => -32001,
            PlayError::InvalidStory { .. } => -32002,
            PlayError::InvalidChoice { .. } => -32003,
            PlayError::SessionAlreadyFinished { .. } => -32004,
            PlayError::Storage(_) => -32010,
        }
    }
}

/// RPC protocol errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    #[error("Invalid parameters for {method}: {message}")]
    InvalidParameters { method: String, message: String },

    #[error("Play error: {0}")]
    Play(#[from] PlayError),

    #[error("Action failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    /// JSON-RPC 2.0 error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidRequest { .. } => -32600,
            RpcError::UnknownMethod { .. } => -32601,
            RpcError::InvalidParameters { .. } => -32602,
            RpcError::Play(inner) => inner.rpc_code(),
            RpcError::ExecutionFailed { .. } => -32603,
            RpcError::Json(_) => -32700,
        }
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        RpcError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for gameplay operations
pub type PlayResult<T> = Result<T, PlayError>;

/// Result type alias for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;
