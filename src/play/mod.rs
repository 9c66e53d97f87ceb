//! Gameplay: the navigation state machine, ending resolution, and outcome
//! aggregation.
//!
//! A session moves intro -> question chain -> ending. The engine owns every
//! transition; [`ending::resolve_ending`] turns a final score into a tier;
//! [`OutcomeAggregator`] reclassifies the story's lifetime counters when a
//! session terminates.

pub mod ending;
mod engine;
mod outcome;

pub use engine::{ChoiceView, PlayEngine, PlaySummary, SceneView, StartParams};
pub use outcome::OutcomeAggregator;
