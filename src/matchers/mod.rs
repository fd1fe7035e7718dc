//! Frame and exception matchers.
//!
//! A matcher is a single `key:pattern` predicate from a rule. Patterns are
//! validated and compiled when the matcher is built, so evaluation itself
//! cannot fail.
//!
//! ## Module Structure
//!
//! - `glob`: glob-to-regex translation and the compiled-pattern cache
//! - `MatchFrame`: the normalized view of a frame that matchers read

mod glob;

pub use glob::{normalize_path, Glob, CASE_INSENSITIVE_PREFIX};

use crate::error::{EnhancerError, Result};
use crate::types::{ExceptionData, Family, Frame, StackDirection};
use std::fmt;

/// Matcher vocabulary, one entry per canonical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKey {
    Path,
    Module,
    Function,
    Package,
    Family,
    App,
    Category,
    Type,
    Value,
    Mechanism,
}

impl MatcherKey {
    /// Resolve a DSL key, including the `stack.*` and `error.*` aliases
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "path" | "stack.abs_path" => MatcherKey::Path,
            "module" | "stack.module" => MatcherKey::Module,
            "function" | "stack.function" => MatcherKey::Function,
            "package" | "stack.package" => MatcherKey::Package,
            "family" => MatcherKey::Family,
            "app" | "stack.app" => MatcherKey::App,
            "category" => MatcherKey::Category,
            "type" | "error.type" => MatcherKey::Type,
            "value" | "error.value" => MatcherKey::Value,
            "mechanism" | "error.mechanism" => MatcherKey::Mechanism,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            MatcherKey::Path => "path",
            MatcherKey::Module => "module",
            MatcherKey::Function => "function",
            MatcherKey::Package => "package",
            MatcherKey::Family => "family",
            MatcherKey::App => "app",
            MatcherKey::Category => "category",
            MatcherKey::Type => "type",
            MatcherKey::Value => "value",
            MatcherKey::Mechanism => "mechanism",
        }
    }

    /// Single-character code used by the binary rule structure
    pub fn short_code(self) -> char {
        match self {
            MatcherKey::Path => 'p',
            MatcherKey::Function => 'f',
            MatcherKey::Module => 'm',
            MatcherKey::Family => 'F',
            MatcherKey::Package => 'P',
            MatcherKey::App => 'a',
            MatcherKey::Type => 't',
            MatcherKey::Value => 'v',
            MatcherKey::Mechanism => 'M',
            MatcherKey::Category => 'c',
        }
    }

    pub fn from_short_code(code: char) -> Option<Self> {
        Some(match code {
            'p' => MatcherKey::Path,
            'f' => MatcherKey::Function,
            'm' => MatcherKey::Module,
            'F' => MatcherKey::Family,
            'P' => MatcherKey::Package,
            'a' => MatcherKey::App,
            't' => MatcherKey::Type,
            'v' => MatcherKey::Value,
            'M' => MatcherKey::Mechanism,
            'c' => MatcherKey::Category,
            _ => return None,
        })
    }

    /// Whether the matcher reads the exception rather than a frame
    pub fn is_exception_key(self) -> bool {
        matches!(self, MatcherKey::Type | MatcherKey::Value | MatcherKey::Mechanism)
    }

    fn is_path_like(self) -> bool {
        matches!(self, MatcherKey::Path | MatcherKey::Package)
    }
}

/// Which frame, relative to the one being evaluated, a matcher looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Frame,
    /// `[ key:pattern ] |` - the immediate caller
    Caller,
    /// `| [ key:pattern ]` - the immediate callee
    Callee,
}

/// Set of families accepted by a `family:` matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FamilySet {
    pub native: bool,
    pub javascript: bool,
    pub other: bool,
    pub all: bool,
}

impl FamilySet {
    fn parse(pattern: &str) -> std::result::Result<Self, String> {
        let mut set = FamilySet::default();
        for name in pattern.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "native" => set.native = true,
                "javascript" => set.javascript = true,
                "other" => set.other = true,
                "all" => set.all = true,
                other => return Err(format!("unknown family {other}")),
            }
        }
        if set == FamilySet::default() {
            return Err("no family given".to_string());
        }
        Ok(set)
    }

    fn from_codes(codes: &str) -> std::result::Result<Self, String> {
        let mut set = FamilySet::default();
        for code in codes.chars() {
            match code {
                'N' => set.native = true,
                'J' => set.javascript = true,
                'O' => set.other = true,
                'a' => set.all = true,
                other => return Err(format!("unknown family code {other}")),
            }
        }
        Ok(set)
    }

    fn names(&self) -> String {
        let mut names = Vec::new();
        if self.native {
            names.push("native");
        }
        if self.javascript {
            names.push("javascript");
        }
        if self.other {
            names.push("other");
        }
        if self.all {
            names.push("all");
        }
        names.join(",")
    }

    fn codes(&self) -> String {
        let mut codes = String::new();
        if self.native {
            codes.push('N');
        }
        if self.javascript {
            codes.push('J');
        }
        if self.other {
            codes.push('O');
        }
        if self.all {
            codes.push('a');
        }
        codes
    }

    fn contains(&self, family: Family) -> bool {
        self.all
            || match family {
                Family::Native => self.native,
                Family::Javascript => self.javascript,
                Family::Other => self.other,
            }
    }
}

pub(crate) fn parse_bool(pattern: &str) -> Option<bool> {
    match pattern {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Glob(Glob),
    Families(FamilySet),
    InApp(bool),
}

/// Normalized frame attributes read by matchers.
///
/// Built once per frame before evaluation; the family is classified here
/// from platform metadata so matchers never infer it themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFrame {
    pub path: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
    pub package: Option<String>,
    pub category: Option<String>,
    pub family: Option<Family>,
    pub in_app: Option<bool>,
}

impl MatchFrame {
    /// `platform` is the event platform, used when the frame has none of its own.
    pub fn from_frame(frame: &Frame, platform: Option<&str>) -> Self {
        let path = frame.abs_path.as_deref().or(frame.filename.as_deref());
        Self {
            path: path.map(normalize_path),
            module: frame.module.clone(),
            function: frame.function.clone(),
            package: frame.package.as_deref().map(normalize_path),
            category: frame.data.category.clone(),
            family: Some(Family::from_platform(frame.platform.as_deref().or(platform))),
            in_app: frame.in_app,
        }
    }

    pub fn from_frames(frames: &[Frame], platform: Option<&str>) -> Vec<Self> {
        frames.iter().map(|f| Self::from_frame(f, platform)).collect()
    }
}

/// A single `[!]key:pattern` predicate.
#[derive(Debug, Clone)]
pub struct Matcher {
    key: MatcherKey,
    pattern: String,
    negated: bool,
    position: Position,
    predicate: Predicate,
}

impl Matcher {
    /// Validate and compile a matcher. Errors carry line 0; the parser
    /// re-attaches the real line.
    pub fn new(key: MatcherKey, pattern: &str, negated: bool, position: Position) -> Result<Self> {
        let invalid = |reason: String| EnhancerError::matcher(0, key.name(), pattern, reason);
        let predicate = match key {
            MatcherKey::Family => Predicate::Families(FamilySet::parse(pattern).map_err(invalid)?),
            MatcherKey::App => Predicate::InApp(
                parse_bool(pattern).ok_or_else(|| invalid("expected yes/no, true/false or 1/0".into()))?,
            ),
            _ => {
                if pattern.is_empty() {
                    return Err(invalid("empty pattern".into()));
                }
                Predicate::Glob(Glob::new(pattern, key.is_path_like()).map_err(invalid)?)
            }
        };
        if position != Position::Frame && key.is_exception_key() {
            return Err(invalid("exception matchers cannot target a caller or callee".into()));
        }

        let pattern = match &predicate {
            Predicate::Families(set) => set.names(),
            Predicate::InApp(value) => String::from(if *value { "yes" } else { "no" }),
            Predicate::Glob(_) => pattern.to_string(),
        };
        Ok(Self { key, pattern, negated, position, predicate })
    }

    pub fn key(&self) -> MatcherKey {
        self.key
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_exception_matcher(&self) -> bool {
        self.key.is_exception_key()
    }

    /// Evaluate against the frame at `idx` (or its caller/callee).
    pub fn matches_frame(&self, frames: &[MatchFrame], idx: usize, direction: StackDirection) -> bool {
        let target = match self.position {
            Position::Frame => Some(idx),
            Position::Caller => direction.caller_of(idx, frames.len()),
            Position::Callee => direction.callee_of(idx, frames.len()),
        };
        // a missing neighbour never matches, negated or not
        let Some(frame) = target.and_then(|i| frames.get(i)) else {
            return false;
        };
        self.positive_frame_match(frame) != self.negated
    }

    pub fn matches_exception(&self, exception: &ExceptionData) -> bool {
        let value = match self.key {
            MatcherKey::Type => exception.ty.as_deref(),
            MatcherKey::Value => exception.value.as_deref(),
            MatcherKey::Mechanism => exception.mechanism.as_deref(),
            _ => return false,
        };
        self.positive_value_match(value) != self.negated
    }

    fn positive_frame_match(&self, frame: &MatchFrame) -> bool {
        match (&self.predicate, self.key) {
            (Predicate::Families(set), _) => frame.family.is_some_and(|f| set.contains(f)),
            (Predicate::InApp(expected), _) => frame.in_app == Some(*expected),
            (Predicate::Glob(_), MatcherKey::Path) => self.positive_value_match(frame.path.as_deref()),
            (Predicate::Glob(_), MatcherKey::Module) => self.positive_value_match(frame.module.as_deref()),
            (Predicate::Glob(_), MatcherKey::Function) => {
                self.positive_value_match(frame.function.as_deref())
            }
            (Predicate::Glob(_), MatcherKey::Package) => {
                self.positive_value_match(frame.package.as_deref())
            }
            (Predicate::Glob(_), MatcherKey::Category) => {
                self.positive_value_match(frame.category.as_deref())
            }
            _ => false,
        }
    }

    fn positive_value_match(&self, value: Option<&str>) -> bool {
        match (&self.predicate, value) {
            (Predicate::Glob(glob), Some(value)) => glob.is_match(value),
            _ => false,
        }
    }

    /// Binary form: `!`? + short code + argument, wrapped for callers/callees.
    pub fn to_config_string(&self) -> String {
        let arg = match &self.predicate {
            Predicate::Families(set) => set.codes(),
            Predicate::InApp(value) => String::from(if *value { "1" } else { "0" }),
            Predicate::Glob(_) => self.pattern.clone(),
        };
        let neg = if self.negated { "!" } else { "" };
        let inner = format!("{neg}{}{arg}", self.key.short_code());
        match self.position {
            Position::Frame => inner,
            Position::Caller => format!("[{inner}]|"),
            Position::Callee => format!("|[{inner}]"),
        }
    }

    /// Rebuild a matcher from its binary form.
    pub fn from_config_string(encoded: &str) -> Result<Self> {
        let (position, inner) = if let Some(rest) = encoded.strip_prefix("|[") {
            (Position::Callee, rest.strip_suffix(']'))
        } else if let Some(rest) = encoded.strip_prefix('[') {
            (Position::Caller, rest.strip_suffix("]|"))
        } else {
            (Position::Frame, Some(encoded))
        };
        let inner = inner.ok_or_else(|| EnhancerError::decode(format!("malformed matcher {encoded:?}")))?;

        let (negated, inner) = match inner.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, inner),
        };
        let mut chars = inner.chars();
        let key = chars
            .next()
            .and_then(MatcherKey::from_short_code)
            .ok_or_else(|| EnhancerError::decode(format!("unknown matcher type in {encoded:?}")))?;
        let arg = chars.as_str();

        let pattern = match key {
            MatcherKey::Family => FamilySet::from_codes(arg)
                .map_err(|e| EnhancerError::decode(format!("{e} in {encoded:?}")))?
                .names(),
            _ => arg.to_string(),
        };
        Self::new(key, &pattern, negated, position)
            .map_err(|e| EnhancerError::decode_with(format!("invalid matcher {encoded:?}"), e))
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.pattern == other.pattern
            && self.negated == other.negated
            && self.position == other.position
    }
}

fn needs_quotes(pattern: &str) -> bool {
    pattern.is_empty()
        || pattern
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '[' | ']' | '|'))
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let neg = if self.negated { "!" } else { "" };
        let pattern = if needs_quotes(&self.pattern) {
            format!("\"{}\"", self.pattern.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            self.pattern.clone()
        };
        let inner = format!("{neg}{}:{pattern}", self.key.name());
        match self.position {
            Position::Frame => f.write_str(&inner),
            Position::Caller => write!(f, "[ {inner} ] |"),
            Position::Callee => write!(f, "| [ {inner} ]"),
        }
    }
}
