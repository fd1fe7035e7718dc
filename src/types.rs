//! Stacktrace data exchanged with the grouping pipeline.
//!
//! Frames and components are owned by the caller. The engine reads frames,
//! writes in-app/category decisions onto them and fills in contribution state
//! on the components; it never reorders or drops entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order of the frames handed to the engine.
///
/// Decides which neighbours count as callers and which as callees for
/// ranged actions (`^`, `v`) and adjacency matchers (`[ .. ] |`, `| [ .. ]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackDirection {
    /// Index 0 is the crashing frame; callers sit at higher indices.
    #[default]
    InnermostFirst,
    /// Index 0 is the entry point; callers sit at lower indices.
    OutermostFirst,
}

impl StackDirection {
    /// Index of the immediate caller of `idx`, if any
    pub fn caller_of(self, idx: usize, len: usize) -> Option<usize> {
        match self {
            StackDirection::InnermostFirst => (idx + 1 < len).then_some(idx + 1),
            StackDirection::OutermostFirst => idx.checked_sub(1),
        }
    }

    /// Index of the immediate callee of `idx`, if any
    pub fn callee_of(self, idx: usize, len: usize) -> Option<usize> {
        match self {
            StackDirection::InnermostFirst => idx.checked_sub(1),
            StackDirection::OutermostFirst => (idx + 1 < len).then_some(idx + 1),
        }
    }

    /// Indices of every caller of `idx`, nearest first
    pub fn callers(self, idx: usize, len: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            StackDirection::InnermostFirst => Box::new((idx + 1)..len),
            StackDirection::OutermostFirst => Box::new((0..idx.min(len)).rev()),
        }
    }

    /// Indices of every callee of `idx`, nearest first
    pub fn callees(self, idx: usize, len: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            StackDirection::InnermostFirst => Box::new((0..idx.min(len)).rev()),
            StackDirection::OutermostFirst => Box::new((idx + 1)..len),
        }
    }

    /// Frame indices ordered from the crashing frame outwards
    pub fn innermost_first(self, len: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            StackDirection::InnermostFirst => Box::new(0..len),
            StackDirection::OutermostFirst => Box::new((0..len).rev()),
        }
    }
}

impl FromStr for StackDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "innermost-first" => Ok(StackDirection::InnermostFirst),
            "outermost-first" => Ok(StackDirection::OutermostFirst),
            other => Err(format!("unknown stack direction: {other}")),
        }
    }
}

/// Runtime family of a frame, classified from its platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Native,
    Javascript,
    Other,
}

impl Family {
    pub fn from_platform(platform: Option<&str>) -> Self {
        match platform {
            Some("objc" | "cocoa" | "swift" | "native" | "c") => Family::Native,
            Some("javascript" | "node") => Family::Javascript,
            _ => Family::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Native => "native",
            Family::Javascript => "javascript",
            Family::Other => "other",
        }
    }
}

/// Extra frame state written by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// In-app value before the first rule changed it: 1, 0, or -1 for unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_in_app: Option<i8>,
}

impl FrameData {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.orig_in_app.is_none()
    }
}

/// A single stack frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// Overrides the event platform for family classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub in_app: Option<bool>,
    #[serde(default, skip_serializing_if = "FrameData::is_empty")]
    pub data: FrameData,
}

impl Frame {
    /// Set the in-app flag, remembering the value it had before the first change.
    pub fn set_in_app(&mut self, value: bool) {
        if self.in_app == Some(value) {
            return;
        }
        if self.data.orig_in_app.is_none() {
            self.data.orig_in_app = Some(match self.in_app {
                Some(true) => 1,
                Some(false) => 0,
                None => -1,
            });
        }
        self.in_app = Some(value);
    }

    /// In-app value before any rule touched it, `None` if no rule changed it
    pub fn original_in_app(&self) -> Option<Option<bool>> {
        self.data.orig_in_app.map(|orig| match orig {
            1 => Some(true),
            0 => Some(false),
            _ => None,
        })
    }

    /// Whether a rule changed this frame's in-app value
    pub fn in_app_changed(&self) -> bool {
        self.original_in_app().is_some_and(|orig| orig != self.in_app)
    }

    pub fn category(&self) -> Option<&str> {
        self.data.category.as_deref()
    }

    pub fn set_category(&mut self, category: String) {
        self.data.category = Some(category);
    }
}

/// Exception context shared by every frame of one stacktrace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionData {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

/// Grouping variant the stacktrace component is assembled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingVariant {
    /// Only in-app frames may define the grouping identity
    App,
    /// Every frame counts
    System,
}

impl GroupingVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupingVariant::App => "app",
            GroupingVariant::System => "system",
        }
    }
}

impl fmt::Display for GroupingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupingVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(GroupingVariant::App),
            "system" => Ok(GroupingVariant::System),
            other => Err(format!("unknown grouping variant: {other}")),
        }
    }
}

/// Grouping component of a single frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameComponent {
    pub in_app: bool,
    pub contributes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl FrameComponent {
    pub fn new(in_app: bool, contributes: bool) -> Self {
        Self { in_app, contributes, hint: None }
    }

    /// Component for a frame as it looks after the in-app pass
    pub fn for_frame(frame: &Frame, contributes: bool) -> Self {
        Self::new(frame.in_app.unwrap_or(false), contributes)
    }

    pub fn update(&mut self, contributes: bool, hint: Option<String>) {
        self.contributes = contributes;
        self.hint = hint;
    }
}

/// Tally of frame kinds in an assembled stacktrace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounts {
    pub in_app_contributing_frames: usize,
    pub in_app_non_contributing_frames: usize,
    pub system_contributing_frames: usize,
    pub system_non_contributing_frames: usize,
}

impl FrameCounts {
    pub fn record(&mut self, in_app: bool, contributes: bool) {
        match (in_app, contributes) {
            (true, true) => self.in_app_contributing_frames += 1,
            (true, false) => self.in_app_non_contributing_frames += 1,
            (false, true) => self.system_contributing_frames += 1,
            (false, false) => self.system_non_contributing_frames += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.in_app_contributing_frames
            + self.in_app_non_contributing_frames
            + self.system_contributing_frames
            + self.system_non_contributing_frames
    }
}

/// Grouping component of a whole stacktrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StacktraceComponent {
    pub values: Vec<FrameComponent>,
    pub contributes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub frame_counts: FrameCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverted_hierarchy: Option<bool>,
}
