//! Rule actions: flag actions (`+app`, `^-group`, ...) and variable actions
//! (`category=...`, `max-frames=...`, ...).

use crate::error::{EnhancerError, Result};
use crate::matchers::parse_bool;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flag action keys, in binary index order
const FLAG_KEYS: [FlagKey; 2] = [FlagKey::Group, FlagKey::App];
const ACTION_BITSIZE: u32 = 8;

/// (flag, range) pairs, in binary code order
const FLAG_RANGES: [(bool, Option<Range>); 6] = [
    (true, None),
    (true, Some(Range::Callers)),
    (true, Some(Range::Callees)),
    (false, None),
    (false, Some(Range::Callers)),
    (false, Some(Range::Callees)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKey {
    /// Contribution to grouping
    Group,
    /// In-app classification
    App,
}

impl FlagKey {
    pub fn name(self) -> &'static str {
        match self {
            FlagKey::Group => "group",
            FlagKey::App => "app",
        }
    }
}

/// Frames an action applies to besides (or instead of) the matching frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Range {
    /// `^` - every caller of the matching frame
    Callers,
    /// `v` - every callee of the matching frame
    Callees,
}

impl Range {
    fn prefix(self) -> char {
        match self {
            Range::Callers => '^',
            Range::Callees => 'v',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarAction {
    Category(String),
    MaxFrames(u32),
    MinFrames(u32),
    InvertStacktrace(bool),
}

impl VarAction {
    pub fn name(&self) -> &'static str {
        match self {
            VarAction::Category(_) => "category",
            VarAction::MaxFrames(_) => "max-frames",
            VarAction::MinFrames(_) => "min-frames",
            VarAction::InvertStacktrace(_) => "invert-stacktrace",
        }
    }

    fn parse(name: &str, value: &str) -> std::result::Result<Self, String> {
        let frames = || {
            value
                .parse::<u32>()
                .map_err(|_| format!("{name} expects a frame count, got {value:?}"))
        };
        match name {
            "category" if !value.is_empty() => Ok(VarAction::Category(value.to_string())),
            "category" => Err("category needs a name".to_string()),
            "max-frames" => frames().map(VarAction::MaxFrames),
            "min-frames" => frames().map(VarAction::MinFrames),
            "invert-stacktrace" => parse_bool(value)
                .map(VarAction::InvertStacktrace)
                .ok_or_else(|| format!("invert-stacktrace expects a boolean, got {value:?}")),
            other => Err(format!("unknown variable {other}")),
        }
    }

    fn value(&self) -> VarValue {
        match self {
            VarAction::Category(name) => VarValue::Str(name.clone()),
            VarAction::MaxFrames(n) | VarAction::MinFrames(n) => VarValue::Int(i64::from(*n)),
            VarAction::InvertStacktrace(b) => VarValue::Bool(*b),
        }
    }

    fn from_value(name: &str, value: VarValue) -> std::result::Result<Self, String> {
        let count = |v: i64| u32::try_from(v).map_err(|_| format!("{name} out of range: {v}"));
        match (name, value) {
            ("category", VarValue::Str(s)) if !s.is_empty() => Ok(VarAction::Category(s)),
            ("max-frames", VarValue::Int(n)) => count(n).map(VarAction::MaxFrames),
            ("min-frames", VarValue::Int(n)) => count(n).map(VarAction::MinFrames),
            ("invert-stacktrace", VarValue::Bool(b)) => Ok(VarAction::InvertStacktrace(b)),
            ("invert-stacktrace", VarValue::Int(n)) => Ok(VarAction::InvertStacktrace(n != 0)),
            (name, value) => Err(format!("invalid value {value:?} for {name}")),
        }
    }
}

/// Scalar stored next to a variable name in the binary form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Binary form of an action: a packed integer or a `[name, value]` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionStructure {
    Flag(u64),
    Var(String, VarValue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Flag {
        key: FlagKey,
        flag: bool,
        range: Option<Range>,
    },
    Var(VarAction),
}

impl Action {
    /// Parse a single DSL action token.
    pub fn parse(token: &str) -> std::result::Result<Self, String> {
        if let Some((name, value)) = token.split_once('=') {
            return VarAction::parse(name, value).map(Action::Var);
        }

        let mut rest = token;
        let range = match rest.chars().next() {
            Some('^') => Some(Range::Callers),
            Some('v') => Some(Range::Callees),
            _ => None,
        };
        if range.is_some() {
            rest = &rest[1..];
        }
        let flag = match rest.chars().next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(format!("expected +/- flag in action {token:?}")),
        };
        let key = match &rest[1..] {
            "app" => FlagKey::App,
            "group" => FlagKey::Group,
            other => return Err(format!("unknown action flag {other:?}")),
        };
        Ok(Action::Flag { key, flag, range })
    }

    /// Whether the action is a syntactically plausible action token
    pub(crate) fn looks_like_action(token: &str) -> bool {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some('+' | '-'), _) => true,
            (Some('^' | 'v'), Some('+' | '-')) => true,
            _ => match token.split_once('=') {
                Some((name, _)) => !name.contains(':'),
                None => false,
            },
        }
    }

    /// Actions applied during the in-app/category pass
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Action::Flag { key: FlagKey::App, .. } | Action::Var(VarAction::Category(_))
        )
    }

    /// Actions applied during the contribution pass
    pub fn is_updater(&self) -> bool {
        !matches!(self, Action::Var(VarAction::Category(_)))
    }

    pub fn to_config_structure(&self) -> ActionStructure {
        match self {
            Action::Flag { key, flag, range } => {
                let key_index = FLAG_KEYS.iter().position(|k| k == key).unwrap_or(0) as u64;
                let code = FLAG_RANGES
                    .iter()
                    .position(|(f, r)| f == flag && r == range)
                    .unwrap_or(0) as u64;
                ActionStructure::Flag(key_index | (code << ACTION_BITSIZE))
            }
            Action::Var(var) => ActionStructure::Var(var.name().to_string(), var.value()),
        }
    }

    pub fn from_config_structure(structure: ActionStructure) -> Result<Self> {
        match structure {
            ActionStructure::Flag(packed) => {
                let key = usize::try_from(packed & 0xf)
                    .ok()
                    .and_then(|i| FLAG_KEYS.get(i))
                    .ok_or_else(|| EnhancerError::decode(format!("unknown action key in {packed}")))?;
                let (flag, range) = usize::try_from(packed >> ACTION_BITSIZE)
                    .ok()
                    .and_then(|i| FLAG_RANGES.get(i))
                    .ok_or_else(|| EnhancerError::decode(format!("unknown action flags in {packed}")))?;
                Ok(Action::Flag { key: *key, flag: *flag, range: *range })
            }
            ActionStructure::Var(name, value) => VarAction::from_value(&name, value)
                .map(Action::Var)
                .map_err(EnhancerError::decode),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Flag { key, flag, range } => {
                if let Some(range) = range {
                    write!(f, "{}", range.prefix())?;
                }
                write!(f, "{}{}", if *flag { '+' } else { '-' }, key.name())
            }
            Action::Var(VarAction::Category(name)) => write!(f, "category={name}"),
            Action::Var(VarAction::MaxFrames(n)) => write!(f, "max-frames={n}"),
            Action::Var(VarAction::MinFrames(n)) => write!(f, "min-frames={n}"),
            Action::Var(VarAction::InvertStacktrace(b)) => {
                write!(f, "invert-stacktrace={}", if *b { 1 } else { 0 })
            }
        }
    }
}
