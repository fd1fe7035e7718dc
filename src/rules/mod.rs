//! Enhancement rules
//!
//! A rule is a conjunction of matchers followed by an ordered list of actions.
//!
//! # Structure
//! - `actions`: Action, Range and the variable actions
//! - `parser`: line-oriented DSL parser

mod actions;
mod parser;

pub use actions::{Action, ActionStructure, FlagKey, Range, VarAction, VarValue};
pub use parser::parse_enhancements;

use crate::error::{EnhancerError, Result};
use crate::matchers::{MatchFrame, Matcher};
use crate::types::{ExceptionData, StackDirection};
use serde::Serialize;
use std::fmt;

/// Binary form of a rule: encoded matchers and actions
pub type RuleStructure = (Vec<String>, Vec<ActionStructure>);

/// Serializable description of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDict {
    #[serde(rename = "match")]
    pub matchers: Vec<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    matchers: Vec<Matcher>,
    actions: Vec<Action>,
    /// Source line, 0 for rules decoded from the binary form
    line: usize,
}

impl Rule {
    pub fn new(matchers: Vec<Matcher>, actions: Vec<Action>, line: usize) -> Result<Self> {
        if !matchers.iter().any(|m| m.position() == crate::matchers::Position::Frame) {
            return Err(EnhancerError::parse(line, render(&matchers, &actions), "rule has no matchers"));
        }
        if actions.is_empty() {
            return Err(EnhancerError::parse(line, render(&matchers, &actions), "rule has no actions"));
        }
        Ok(Self { matchers, actions, line })
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Has actions for the in-app/category pass
    pub fn is_modifier(&self) -> bool {
        self.actions.iter().any(Action::is_modifier)
    }

    /// Has actions for the contribution pass
    pub fn is_updater(&self) -> bool {
        self.actions.iter().any(Action::is_updater)
    }

    /// Whether every exception matcher holds. Independent of the frame, so
    /// evaluated once per stacktrace.
    pub fn matches_exception(&self, exception: &ExceptionData) -> bool {
        self.matchers
            .iter()
            .filter(|m| m.is_exception_matcher())
            .all(|m| m.matches_exception(exception))
    }

    /// Whether every frame matcher holds for the frame at `idx`
    pub fn matches_frame(&self, frames: &[MatchFrame], idx: usize, direction: StackDirection) -> bool {
        self.matchers
            .iter()
            .filter(|m| !m.is_exception_matcher())
            .all(|m| m.matches_frame(frames, idx, direction))
    }

    pub fn to_config_structure(&self) -> RuleStructure {
        (
            self.matchers.iter().map(Matcher::to_config_string).collect(),
            self.actions.iter().map(Action::to_config_structure).collect(),
        )
    }

    pub fn from_config_structure(structure: RuleStructure) -> Result<Self> {
        let (matchers, actions) = structure;
        let matchers = matchers
            .iter()
            .map(|m| Matcher::from_config_string(m))
            .collect::<Result<Vec<_>>>()?;
        let actions = actions
            .into_iter()
            .map(Action::from_config_structure)
            .collect::<Result<Vec<_>>>()?;
        Self::new(matchers, actions, 0)
            .map_err(|e| EnhancerError::decode_with("invalid rule structure", e))
    }

    pub fn as_dict(&self) -> RuleDict {
        RuleDict {
            matchers: self.matchers.iter().map(ToString::to_string).collect(),
            actions: self.actions.iter().map(ToString::to_string).collect(),
        }
    }
}

fn render(matchers: &[Matcher], actions: &[Action]) -> String {
    matchers
        .iter()
        .map(ToString::to_string)
        .chain(actions.iter().map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rules compare by content; the source line is diagnostics only.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.matchers == other.matchers && self.actions == other.actions
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.matchers, &self.actions))
    }
}
