//! Output formatting for the command-line front end.
//!
//! Every command renders either as JSON for machine consumption or as
//! colored, human-readable terminal text.

use crate::enhancements::Enhancements;
use crate::types::{ExceptionData, Frame, StacktraceComponent};
use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One stacktrace as read by `apply`
#[derive(Debug, Clone, Deserialize)]
pub struct StacktraceInput {
    #[serde(default)]
    pub platform: Option<String>,
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub exception: Option<ExceptionData>,
}

/// `apply` accepts a single stacktrace or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApplyInput {
    Many(Vec<StacktraceInput>),
    One(StacktraceInput),
}

impl ApplyInput {
    pub fn into_vec(self) -> Vec<StacktraceInput> {
        match self {
            ApplyInput::Many(all) => all,
            ApplyInput::One(one) => vec![one],
        }
    }
}

/// Frames after the in-app pass plus the assembled component
#[derive(Debug, Clone, Serialize)]
pub struct AppliedStacktrace {
    pub frames: Vec<Frame>,
    pub component: StacktraceComponent,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseSummary {
    pub id: String,
    pub rules: usize,
    pub latest: bool,
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn format_enhancements_terminal(set: &Enhancements) -> String {
    let mut out = String::new();
    let id = set.id().unwrap_or("(custom)");
    let _ = writeln!(out, "{} {}", "Rule set".bold(), id.bright_white().bold());
    let _ = writeln!(out, "  version: {}", set.version());
    if set.bases().is_empty() {
        let _ = writeln!(out, "  bases:   {}", "none".dimmed());
    } else {
        let _ = writeln!(out, "  bases:   {}", set.bases().join(", ").cyan());
    }
    let _ = writeln!(out, "  rules:   {}", set.rules().len());
    for rule in set.rules() {
        let _ = writeln!(out, "    {rule}");
    }
    out
}

fn frame_label(frame: &Frame) -> String {
    let name = frame
        .function
        .as_deref()
        .or(frame.module.as_deref())
        .unwrap_or("<unknown>");
    match frame.abs_path.as_deref().or(frame.filename.as_deref()) {
        Some(path) => format!("{name}  {}", path.dimmed()),
        None => name.to_string(),
    }
}

pub fn format_applied_terminal(results: &[AppliedStacktrace]) -> String {
    let mut out = String::new();
    for (idx, result) in results.iter().enumerate() {
        let component = &result.component;
        let verdict = if component.contributes {
            "contributes".green().bold()
        } else {
            "ignored".yellow().bold()
        };
        let _ = writeln!(out, "{} {} {}", "Stacktrace".bold(), idx + 1, verdict);
        if let Some(hint) = &component.hint {
            let _ = writeln!(out, "  {}", hint.dimmed());
        }
        for (frame, value) in result.frames.iter().zip(&component.values) {
            let kind = if value.in_app { "app".cyan() } else { "sys".normal() };
            let mark = if value.contributes { "+".green() } else { "-".red() };
            let _ = write!(out, "  {mark} [{kind}] {}", frame_label(frame));
            if let Some(category) = frame.category() {
                let _ = write!(out, " {}", format!("category={category}").magenta());
            }
            if let Some(hint) = &value.hint {
                let _ = write!(out, "  ({})", hint.dimmed());
            }
            out.push('\n');
        }
        let counts = &component.frame_counts;
        let _ = writeln!(
            out,
            "  frames: {} in-app contributing, {} in-app ignored, {} system contributing, {} system ignored",
            counts.in_app_contributing_frames,
            counts.in_app_non_contributing_frames,
            counts.system_contributing_frames,
            counts.system_non_contributing_frames
        );
    }
    out
}

pub fn format_bases_terminal(bases: &[BaseSummary]) -> String {
    let mut out = String::new();
    for base in bases {
        let latest = if base.latest { " (latest)".green().to_string() } else { String::new() };
        let _ = writeln!(out, "{}{}  {} rules", base.id.bold(), latest, base.rules);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_input_single_or_many() {
        let one: ApplyInput = serde_json::from_str(r#"{"frames": [{"function": "main"}]}"#).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: ApplyInput = serde_json::from_str(
            r#"[{"frames": []}, {"platform": "native", "frames": [{"function": "a"}], "exception": {"type": "E"}}]"#,
        )
        .unwrap();
        let many = many.into_vec();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].platform.as_deref(), Some("native"));
        assert_eq!(many[1].exception.as_ref().and_then(|e| e.ty.as_deref()), Some("E"));
    }

    #[test]
    fn test_frame_label() {
        colored::control::set_override(false);
        let frame = Frame {
            function: Some("run".into()),
            filename: Some("app.py".into()),
            ..Default::default()
        };
        assert_eq!(frame_label(&frame), "run  app.py");
        assert_eq!(frame_label(&Frame::default()), "<unknown>");
    }
}
