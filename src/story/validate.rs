//! Publish-time structural validation of a story graph.
//!
//! The play engine trusts the graph; these checks run once before a story is
//! published, not on every transition.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{AnswerChoice, EndingTier, NodeKind, SceneNode};

/// Number of answer choices every question must carry.
pub const CHOICES_PER_QUESTION: usize = 4;

/// A structural problem that prevents a story from being published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "issue")]
pub enum ValidationIssue {
    /// Story has no nodes at all.
    NoNodes,
    /// Story has no intro node.
    MissingIntro,
    /// Story has more than one intro node.
    MultipleIntros,
    /// No ending configured for a tier.
    MissingEnding {
        /// The tier without an ending.
        tier: EndingTier,
    },
    /// More than one ending configured for a tier.
    DuplicateEnding {
        /// The tier with duplicates.
        tier: EndingTier,
    },
    /// A question does not carry exactly four choices.
    WrongChoiceCount {
        /// The offending question node.
        node_id: String,
        /// How many choices it has.
        count: usize,
    },
    /// A question does not have exactly one correct choice.
    WrongCorrectCount {
        /// The offending question node.
        node_id: String,
        /// How many choices are flagged correct.
        count: usize,
    },
    /// A next pointer references a node outside the story.
    DanglingNext {
        /// The node whose next pointer dangles.
        node_id: String,
    },
    /// A node is the target of more than one next pointer.
    MultipleIncomingEdges {
        /// The node with multiple incoming edges.
        node_id: String,
    },
    /// The next-pointer chain loops back on itself.
    CycleDetected {
        /// A node on the cycle.
        node_id: String,
    },
    /// The question chain is split into disconnected fragments.
    DisconnectedChain,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::NoNodes => write!(f, "story has no nodes"),
            ValidationIssue::MissingIntro => write!(f, "story has no intro node"),
            ValidationIssue::MultipleIntros => write!(f, "story has more than one intro node"),
            ValidationIssue::MissingEnding { tier } => {
                write!(f, "no ending configured for tier {}", tier)
            }
            ValidationIssue::DuplicateEnding { tier } => {
                write!(f, "more than one ending configured for tier {}", tier)
            }
            ValidationIssue::WrongChoiceCount { node_id, count } => {
                write!(f, "question {} has {} choices, expected 4", node_id, count)
            }
            ValidationIssue::WrongCorrectCount { node_id, count } => {
                write!(f, "question {} has {} correct choices, expected 1", node_id, count)
            }
            ValidationIssue::DanglingNext { node_id } => {
                write!(f, "node {} links to a node outside the story", node_id)
            }
            ValidationIssue::MultipleIncomingEdges { node_id } => {
                write!(f, "node {} has more than one incoming next edge", node_id)
            }
            ValidationIssue::CycleDetected { node_id } => {
                write!(f, "next-pointer cycle through node {}", node_id)
            }
            ValidationIssue::DisconnectedChain => {
                write!(f, "question chain is split into disconnected fragments")
            }
        }
    }
}

/// Validate a story graph for play.
///
/// Returns every issue found; an empty list means the story satisfies the
/// invariants the engine relies on (one intro, linear acyclic question chain,
/// one ending per tier, four choices with one correct per question).
pub fn validate_story(nodes: &[SceneNode], choices: &[AnswerChoice]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if nodes.is_empty() {
        issues.push(ValidationIssue::NoNodes);
        return issues;
    }

    let intro_count = nodes.iter().filter(|n| n.kind == NodeKind::Intro).count();
    if intro_count == 0 {
        issues.push(ValidationIssue::MissingIntro);
    } else if intro_count > 1 {
        issues.push(ValidationIssue::MultipleIntros);
    }

    for tier in EndingTier::ALL {
        let count = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Ending && n.ending_tier == Some(tier))
            .count();
        if count == 0 {
            issues.push(ValidationIssue::MissingEnding { tier });
        } else if count > 1 {
            issues.push(ValidationIssue::DuplicateEnding { tier });
        }
    }

    let mut choices_by_node: HashMap<&str, Vec<&AnswerChoice>> = HashMap::new();
    for choice in choices {
        choices_by_node.entry(&choice.node_id).or_default().push(choice);
    }

    for node in nodes.iter().filter(|n| n.kind == NodeKind::Question) {
        let node_choices = choices_by_node.get(node.id.as_str()).map_or(&[][..], |v| v);
        if node_choices.len() != CHOICES_PER_QUESTION {
            issues.push(ValidationIssue::WrongChoiceCount {
                node_id: node.id.clone(),
                count: node_choices.len(),
            });
        }
        let correct = node_choices.iter().filter(|c| c.is_correct).count();
        if correct != 1 {
            issues.push(ValidationIssue::WrongCorrectCount {
                node_id: node.id.clone(),
                count: correct,
            });
        }
    }

    issues.extend(check_chain(nodes));
    issues
}

/// Chain checks: dangling links, unique incoming edges, acyclicity, and a
/// single connected run of questions.
fn check_chain(nodes: &[SceneNode]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for node in nodes {
        if let Some(next) = node.next_node_id.as_deref() {
            if !ids.contains(next) {
                issues.push(ValidationIssue::DanglingNext {
                    node_id: node.id.clone(),
                });
                continue;
            }
            *incoming.entry(next).or_insert(0) += 1;
        }
    }

    for (node_id, count) in &incoming {
        if *count > 1 {
            issues.push(ValidationIssue::MultipleIncomingEdges {
                node_id: (*node_id).to_string(),
            });
        }
    }

    let next_of: HashMap<&str, Option<&str>> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.next_node_id.as_deref()))
        .collect();

    // Walk forward from every chain head; a walk that revisits a node is a
    // cycle, and any node on no walk belongs to an unreachable fragment.
    let mut visited: HashSet<&str> = HashSet::new();
    let heads: Vec<&str> = nodes
        .iter()
        .filter(|n| !incoming.contains_key(n.id.as_str()))
        .map(|n| n.id.as_str())
        .collect();

    for head in heads {
        let mut current = Some(head);
        let mut seen_on_walk: HashSet<&str> = HashSet::new();
        while let Some(id) = current {
            if !seen_on_walk.insert(id) {
                issues.push(ValidationIssue::CycleDetected {
                    node_id: id.to_string(),
                });
                break;
            }
            visited.insert(id);
            current = next_of.get(id).copied().flatten();
        }
    }

    // Nodes never visited sit on a cycle with no entry point.
    for node in nodes {
        if !visited.contains(node.id.as_str()) {
            issues.push(ValidationIssue::CycleDetected {
                node_id: node.id.clone(),
            });
            break;
        }
    }

    // Questions linked by next pointers must form one run, not several.
    let question_heads = nodes
        .iter()
        .filter(|n| {
            n.kind == NodeKind::Question
                && (n.next_node_id.is_some() || incoming.contains_key(n.id.as_str()))
        })
        .filter(|n| !incoming.contains_key(n.id.as_str()))
        .count();
    if question_heads > 1 {
        issues.push(ValidationIssue::DisconnectedChain);
    }

    issues
}
