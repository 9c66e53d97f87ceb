//! Story graph domain types.
//!
//! A story is an introduction node, a linear chain of question nodes linked
//! by `next_node_id`, and one ending node per outcome tier. The graph is
//! authored elsewhere and read-only at play time; [`validate`] checks the
//! structural invariants before a story is published.

mod validate;

pub use validate::{validate_story, ValidationIssue};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authored branching quiz-narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Unique story identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional author-facing description.
    pub description: Option<String>,
    /// Public or private visibility.
    pub visibility: Visibility,
    /// Opaque code permitting play of a private story.
    pub access_code: Option<String>,
    /// Optional authoring user.
    pub author_id: Option<String>,
    /// Whether the story passed validation and is playable.
    pub published: bool,
    /// When the story was created.
    pub created_at: DateTime<Utc>,
}

/// Story visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Listed and playable by anyone.
    #[default]
    Public,
    /// Playable only via access code.
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// A single step in a story: intro, question, or ending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    /// Unique node identifier.
    pub id: String,
    /// Owning story ID.
    pub story_id: String,
    /// What kind of scene this node renders.
    pub kind: NodeKind,
    /// Display text (intro blob, question text, or ending text).
    pub text: String,
    /// Ordering within the story (drives the intro-less fallback entry).
    pub position: i64,
    /// Single outgoing edge; None signals end of the question chain.
    pub next_node_id: Option<String>,
    /// Outcome tier, set exactly when `kind` is [`NodeKind::Ending`].
    pub ending_tier: Option<EndingTier>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
}

/// Kind of scene node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry-point text blob, no player choice.
    Intro,
    /// Multiple-choice question scene.
    #[default]
    Question,
    /// Terminal outcome scene.
    Ending,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Intro => write!(f, "intro"),
            NodeKind::Question => write!(f, "question"),
            NodeKind::Ending => write!(f, "ending"),
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intro" => Ok(NodeKind::Intro),
            "question" => Ok(NodeKind::Question),
            "ending" => Ok(NodeKind::Ending),
            _ => Err(format!("Unknown node kind: {}", s)),
        }
    }
}

/// One of the three possible endings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingTier {
    /// High-score ending (>= 80% of max score).
    Good,
    /// Mid-score ending (>= 40%).
    Neutral,
    /// Everything below 40%, including the 0/0 case.
    #[default]
    Bad,
}

impl EndingTier {
    /// All tiers, in descending order of score.
    pub const ALL: [EndingTier; 3] = [EndingTier::Good, EndingTier::Neutral, EndingTier::Bad];
}

impl std::fmt::Display for EndingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndingTier::Good => write!(f, "good"),
            EndingTier::Neutral => write!(f, "neutral"),
            EndingTier::Bad => write!(f, "bad"),
        }
    }
}

impl std::str::FromStr for EndingTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "good" => Ok(EndingTier::Good),
            "neutral" => Ok(EndingTier::Neutral),
            "bad" => Ok(EndingTier::Bad),
            _ => Err(format!("Unknown ending tier: {}", s)),
        }
    }
}

/// One answer option on a question node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerChoice {
    /// Unique choice identifier.
    pub id: String,
    /// Owning question node.
    pub node_id: String,
    /// Display text.
    pub text: String,
    /// Whether picking this choice scores.
    pub is_correct: bool,
    /// Optional feedback shown after answering.
    pub feedback: Option<String>,
    /// Ordering within the question.
    pub position: i64,
}

impl Story {
    /// Create a new unpublished public story
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            visibility: Visibility::Public,
            access_code: None,
            author_id: None,
            published: false,
            created_at: Utc::now(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Make the story private, reachable only through the given access code
    pub fn with_access_code(mut self, code: impl Into<String>) -> Self {
        self.visibility = Visibility::Private;
        self.access_code = Some(code.into());
        self
    }

    /// Set the author
    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Mark as published
    pub fn as_published(mut self) -> Self {
        self.published = true;
        self
    }
}

impl SceneNode {
    /// Create a new question node
    pub fn new(story_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            story_id: story_id.into(),
            kind: NodeKind::Question,
            text: text.into(),
            position: 0,
            next_node_id: None,
            ending_tier: None,
            created_at: Utc::now(),
        }
    }

    /// Make this node the intro
    pub fn as_intro(mut self) -> Self {
        self.kind = NodeKind::Intro;
        self
    }

    /// Make this node the ending for the given tier
    pub fn as_ending(mut self, tier: EndingTier) -> Self {
        self.kind = NodeKind::Ending;
        self.ending_tier = Some(tier);
        self
    }

    /// Set the position
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    /// Link to the next node in the chain
    pub fn with_next(mut self, next_node_id: impl Into<String>) -> Self {
        self.next_node_id = Some(next_node_id.into());
        self
    }
}

impl AnswerChoice {
    /// Create a new incorrect choice on a question node
    pub fn new(node_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            text: text.into(),
            is_correct: false,
            feedback: None,
            position: 0,
        }
    }

    /// Mark this choice as the correct one
    pub fn as_correct(mut self) -> Self {
        self.is_correct = true;
        self
    }

    /// Set the feedback text
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Set the position
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }
}
