//! Rule application engine.
//!
//! A stacktrace is evaluated in two passes:
//! 1. [`apply_modifications`] decides in-app and category for every frame.
//! 2. [`assemble_contributions`] decides which frames, and whether the
//!    stacktrace as a whole, contribute to grouping.
//!
//! Both passes are rule-major. A rule is checked against every frame before
//! the next rule runs, so later rules overwrite the effects of earlier ones.

use crate::matchers::MatchFrame;
use crate::rules::{Action, FlagKey, Range, Rule, VarAction};
use crate::types::{ExceptionData, Frame, FrameComponent, StackDirection};
use tracing::trace;

/// Hint prefix for frames a rule moved into the app
pub const MARKED_IN_APP: &str = "marked in-app";
/// Hint prefix for frames a rule moved out of the app
pub const MARKED_OUT_OF_APP: &str = "marked out of app";

/// Matcher view of one stacktrace plus the exception it belongs to.
///
/// Pass 1 updates the in-app and category attributes of the view in place,
/// so `app:` and `category:` matchers of later rules see earlier decisions.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    frames: Vec<MatchFrame>,
    in_app_changed: Vec<bool>,
    exception: &'a ExceptionData,
    direction: StackDirection,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        frames: &[Frame],
        platform: Option<&str>,
        exception: &'a ExceptionData,
        direction: StackDirection,
    ) -> Self {
        Self {
            frames: MatchFrame::from_frames(frames, platform),
            in_app_changed: frames.iter().map(Frame::in_app_changed).collect(),
            exception,
            direction,
        }
    }

    pub fn frames(&self) -> &[MatchFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn direction(&self) -> StackDirection {
        self.direction
    }
}

/// The matching frame plus the frames selected by an action's range
fn targets(direction: StackDirection, idx: usize, len: usize, range: Option<Range>) -> Vec<usize> {
    let mut out = vec![idx];
    match range {
        None => {}
        Some(Range::Callers) => out.extend(direction.callers(idx, len)),
        Some(Range::Callees) => out.extend(direction.callees(idx, len)),
    }
    out
}

fn rule_hint(verb: &str, rule: &Rule) -> String {
    format!("{verb} by stack trace rule ({rule})")
}

fn frames_word(n: usize) -> &'static str {
    if n == 1 {
        "frame"
    } else {
        "frames"
    }
}

/// Pass 1 result for one frame; `None` means no rule touched the attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameModification {
    pub category: Option<String>,
    pub in_app: Option<bool>,
}

/// Pass 1: evaluate the in-app and category actions.
pub fn apply_modifications<'r, I>(rules: I, ctx: &mut EvaluationContext<'_>) -> Vec<FrameModification>
where
    I: IntoIterator<Item = &'r Rule>,
{
    let len = ctx.frames.len();
    let mut modifications = vec![FrameModification::default(); len];

    for rule in rules {
        if !rule.is_modifier() || !rule.matches_exception(ctx.exception) {
            continue;
        }
        for idx in 0..len {
            if !rule.matches_frame(&ctx.frames, idx, ctx.direction) {
                continue;
            }
            trace!("rule ({}) modifies frame {}", rule, idx);
            for action in rule.actions() {
                match action {
                    Action::Flag { key: FlagKey::App, flag, range } => {
                        for t in targets(ctx.direction, idx, len, *range) {
                            ctx.frames[t].in_app = Some(*flag);
                            modifications[t].in_app = Some(*flag);
                        }
                    }
                    Action::Var(VarAction::Category(category)) => {
                        ctx.frames[idx].category = Some(category.clone());
                        modifications[idx].category = Some(category.clone());
                    }
                    _ => {}
                }
            }
        }
    }
    modifications
}

/// Pass 2 result for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub contributes: bool,
    pub hint: Option<String>,
}

/// Pass 2 result for a whole stacktrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributions {
    pub frames: Vec<FrameOutcome>,
    pub contributes: bool,
    pub hint: Option<String>,
    /// Set when a rule asked for the stacktrace to be inverted
    pub invert_stacktrace: Option<bool>,
}

/// Stacktrace-wide variables, each with the text of the rule that set it
#[derive(Debug, Default)]
struct StacktraceState {
    max_frames: Option<(usize, String)>,
    min_frames: Option<(usize, String)>,
    invert_stacktrace: Option<bool>,
}

/// First hint seen for a flip towards contributing and towards not contributing
#[derive(Debug, Default)]
struct FirstFlips {
    to_contributing: Option<String>,
    to_ignored: Option<String>,
}

impl FirstFlips {
    fn record(&mut self, contributes: bool, hint: &str) {
        let slot = if contributes { &mut self.to_contributing } else { &mut self.to_ignored };
        if slot.is_none() {
            *slot = Some(hint.to_string());
        }
    }

    fn take(self, contributes: bool) -> Option<String> {
        if contributes {
            self.to_contributing
        } else {
            self.to_ignored
        }
    }
}

/// Pass 2: evaluate the grouping actions against frames already classified by
/// pass 1. `components` holds the contribution state computed upstream, one
/// entry per frame; a missing entry counts as contributing with no hint.
pub fn assemble_contributions<'r, I>(
    rules: I,
    ctx: &EvaluationContext<'_>,
    components: &[FrameComponent],
) -> Contributions
where
    I: IntoIterator<Item = &'r Rule>,
{
    let len = ctx.frames.len();
    let mut outcomes: Vec<FrameOutcome> = (0..len)
        .map(|i| match components.get(i) {
            Some(c) => FrameOutcome { contributes: c.contributes, hint: c.hint.clone() },
            None => FrameOutcome { contributes: true, hint: None },
        })
        .collect();
    let input_contributes = outcomes.iter().any(|o| o.contributes);

    let mut state = StacktraceState::default();
    let mut flips = FirstFlips::default();

    for rule in rules {
        if !rule.is_updater() || !rule.matches_exception(ctx.exception) {
            continue;
        }
        for idx in 0..len {
            if !rule.matches_frame(&ctx.frames, idx, ctx.direction) {
                continue;
            }
            for action in rule.actions() {
                match action {
                    Action::Flag { key: FlagKey::Group, flag, range } => {
                        let hint = rule_hint(if *flag { "un-ignored" } else { "ignored" }, rule);
                        for t in targets(ctx.direction, idx, len, *range) {
                            let outcome = &mut outcomes[t];
                            if outcome.contributes != *flag {
                                flips.record(*flag, &hint);
                            }
                            outcome.contributes = *flag;
                            outcome.hint = Some(hint.clone());
                        }
                    }
                    Action::Flag { key: FlagKey::App, flag, range } => {
                        let verb = if *flag { MARKED_IN_APP } else { MARKED_OUT_OF_APP };
                        for t in targets(ctx.direction, idx, len, *range) {
                            if ctx.in_app_changed[t] && ctx.frames[t].in_app == Some(*flag) {
                                outcomes[t].hint = Some(rule_hint(verb, rule));
                            }
                        }
                    }
                    Action::Var(VarAction::MaxFrames(n)) => {
                        state.max_frames = Some((*n as usize, rule.to_string()));
                    }
                    Action::Var(VarAction::MinFrames(n)) => {
                        state.min_frames = Some((*n as usize, rule.to_string()));
                    }
                    Action::Var(VarAction::InvertStacktrace(invert)) => {
                        state.invert_stacktrace = Some(*invert);
                    }
                    Action::Var(VarAction::Category(_)) => {}
                }
            }
        }
    }

    if let Some((max, rule_text)) = &state.max_frames {
        let verb = if *max == 1 { "is" } else { "are" };
        let hint = format!(
            "ignored because only {max} {} {verb} considered by stack trace rule ({rule_text})",
            frames_word(*max)
        );
        let mut kept = 0;
        for idx in ctx.direction.innermost_first(len) {
            let outcome = &mut outcomes[idx];
            if !outcome.contributes {
                continue;
            }
            if kept < *max {
                kept += 1;
                continue;
            }
            outcome.contributes = false;
            outcome.hint = Some(hint.clone());
            flips.record(false, &hint);
        }
    }

    let contributing = outcomes.iter().filter(|o| o.contributes).count();
    let (contributes, hint) = match &state.min_frames {
        Some((min, rule_text)) if contributing > 0 && contributing < *min => (
            false,
            Some(format!(
                "discarded because stack trace only contains {contributing} {} which is under the configured threshold by stack trace rule ({rule_text})",
                frames_word(contributing)
            )),
        ),
        _ => {
            let contributes = contributing > 0;
            let hint = if contributes != input_contributes { flips.take(contributes) } else { None };
            (contributes, hint)
        }
    };

    Contributions {
        frames: outcomes,
        contributes,
        hint,
        invert_stacktrace: state.invert_stacktrace,
    }
}

#[cfg(test)]
mod tests;
