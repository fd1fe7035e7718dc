use super::*;
use crate::rules::parse_enhancements;

fn frame(function: &str, in_app: Option<bool>) -> Frame {
    Frame {
        function: Some(function.to_string()),
        in_app,
        ..Default::default()
    }
}

fn components(values: &[bool]) -> Vec<FrameComponent> {
    values.iter().map(|c| FrameComponent::new(false, *c)).collect()
}

/// Runs pass 1, writes the results back like the enhancement set does, then pass 2.
fn evaluate(dsl: &str, frames: &mut [Frame], input: &[bool], exception: &ExceptionData) -> Contributions {
    let rules = parse_enhancements(dsl).unwrap();
    let mut ctx = EvaluationContext::new(frames, None, exception, StackDirection::InnermostFirst);
    let mods = apply_modifications(&rules, &mut ctx);
    for (frame, m) in frames.iter_mut().zip(mods) {
        if let Some(category) = m.category {
            frame.set_category(category);
        }
        if let Some(in_app) = m.in_app {
            frame.set_in_app(in_app);
        }
    }
    let ctx = EvaluationContext::new(frames, None, exception, StackDirection::InnermostFirst);
    assemble_contributions(&rules, &ctx, &components(input))
}

#[test]
fn test_last_writer_wins_in_pass_one() {
    let rules = parse_enhancements("function:foo +app\nfunction:foo -app\nfunction:f* category=a\nfunction:foo category=b")
        .unwrap();
    let frames = vec![frame("foo", None)];
    let exc = ExceptionData::default();
    let mut ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    let mods = apply_modifications(&rules, &mut ctx);
    assert_eq!(
        mods,
        vec![FrameModification { category: Some("b".into()), in_app: Some(false) }]
    );
}

#[test]
fn test_ranged_app_action_includes_frame_and_callers() {
    // index 0 crashed, index 2 is the entry point
    let frames = vec![frame("crash", None), frame("lib_call", None), frame("main", None)];
    let exc = ExceptionData::default();
    let rules = parse_enhancements("function:lib_call ^-app").unwrap();
    let mut ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    let mods = apply_modifications(&rules, &mut ctx);
    let in_app: Vec<_> = mods.iter().map(|m| m.in_app).collect();
    assert_eq!(in_app, [None, Some(false), Some(false)]);

    // same stack, outermost first
    let reversed: Vec<_> = frames.into_iter().rev().collect();
    let mut ctx = EvaluationContext::new(&reversed, None, &exc, StackDirection::OutermostFirst);
    let mods = apply_modifications(&rules, &mut ctx);
    let in_app: Vec<_> = mods.iter().map(|m| m.in_app).collect();
    assert_eq!(in_app, [Some(false), Some(false), None]);
}

#[test]
fn test_app_decision_visible_to_later_rules() {
    let frames = vec![frame("foo", Some(true))];
    let exc = ExceptionData::default();
    let rules = parse_enhancements("function:foo -app\napp:no category=library").unwrap();
    let mut ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    let mods = apply_modifications(&rules, &mut ctx);
    assert_eq!(mods[0].category.as_deref(), Some("library"));
    assert_eq!(ctx.frames()[0].in_app, Some(false));
}

#[test]
fn test_exception_rule_forces_contribution() {
    let exc = ExceptionData { ty: Some("ZeroDivisionError".into()), ..Default::default() };
    let mut frames = vec![frame("divide", Some(true))];
    let result = evaluate("type:ZeroDivisionError +group", &mut frames, &[false], &exc);
    assert!(result.frames[0].contributes);
    assert_eq!(
        result.frames[0].hint.as_deref(),
        Some("un-ignored by stack trace rule (type:ZeroDivisionError +group)")
    );
    assert!(result.contributes);
    assert_eq!(result.hint, result.frames[0].hint);

    // other exception types are untouched
    let other = ExceptionData { ty: Some("KeyError".into()), ..Default::default() };
    let mut frames = vec![frame("divide", Some(true))];
    let result = evaluate("type:ZeroDivisionError +group", &mut frames, &[false], &other);
    assert!(!result.frames[0].contributes);
    assert_eq!(result.hint, None);
}

#[test]
fn test_value_rule_matches_multi_line_message() {
    for value in ["connection timeout", "request failed\nconnection timeout"] {
        let exc = ExceptionData { value: Some(value.into()), ..Default::default() };
        let mut frames = vec![frame("fetch", Some(true))];
        let result = evaluate("value:*timeout* +group", &mut frames, &[false], &exc);
        assert!(result.frames[0].contributes, "{value:?}");
    }
}

#[test]
fn test_group_action_with_range() {
    let mut frames = vec![frame("a", None), frame("b", None), frame("c", None), frame("d", None)];
    let result = evaluate("function:b v-group", &mut frames, &[true; 4], &ExceptionData::default());
    let contributes: Vec<_> = result.frames.iter().map(|f| f.contributes).collect();
    assert_eq!(contributes, [false, false, true, true]);
    assert!(result.contributes);
    // outcome unchanged, so no stacktrace hint
    assert_eq!(result.hint, None);
}

#[test]
fn test_stacktrace_hint_when_everything_ignored() {
    let mut frames = vec![frame("a", None), frame("b", None)];
    let result = evaluate("function:a -group\nfunction:* -group", &mut frames, &[true, true], &ExceptionData::default());
    assert!(!result.contributes);
    assert_eq!(result.hint.as_deref(), Some("ignored by stack trace rule (function:a -group)"));
    assert_eq!(
        result.frames[1].hint.as_deref(),
        Some("ignored by stack trace rule (function:* -group)")
    );
}

#[test]
fn test_in_app_hints_only_for_changed_frames() {
    let mut frames = vec![frame("vendor", Some(true)), frame("already", Some(false))];
    let result = evaluate("function:* -app", &mut frames, &[true, true], &ExceptionData::default());
    assert_eq!(
        result.frames[0].hint.as_deref(),
        Some("marked out of app by stack trace rule (function:* -app)")
    );
    assert_eq!(result.frames[1].hint, None);
    assert_eq!(frames[0].data.orig_in_app, Some(1));
    assert_eq!(frames[1].data.orig_in_app, None);
}

#[test]
fn test_max_frames_keeps_frames_closest_to_crash() {
    let mut frames = vec![frame("a", None), frame("b", None), frame("c", None)];
    let result = evaluate("function:* max-frames=2", &mut frames, &[true, true, true], &ExceptionData::default());
    let contributes: Vec<_> = result.frames.iter().map(|f| f.contributes).collect();
    assert_eq!(contributes, [true, true, false]);
    assert_eq!(
        result.frames[2].hint.as_deref(),
        Some("ignored because only 2 frames are considered by stack trace rule (function:* max-frames=2)")
    );

    let mut frames = vec![frame("a", None), frame("b", None)];
    let result = evaluate("function:* max-frames=1", &mut frames, &[true, true], &ExceptionData::default());
    assert_eq!(
        result.frames[1].hint.as_deref(),
        Some("ignored because only 1 frame is considered by stack trace rule (function:* max-frames=1)")
    );
}

#[test]
fn test_min_frames_discards_short_stacktraces() {
    let mut frames = vec![frame("a", None), frame("b", None)];
    let result = evaluate("function:* min-frames=3", &mut frames, &[true, false], &ExceptionData::default());
    assert!(!result.contributes);
    assert_eq!(
        result.hint.as_deref(),
        Some(
            "discarded because stack trace only contains 1 frame which is under the configured threshold by stack trace rule (function:* min-frames=3)"
        )
    );
    // frames keep their own state
    assert!(result.frames[0].contributes);

    let mut frames = vec![frame("a", None), frame("b", None)];
    let result = evaluate("function:* min-frames=2", &mut frames, &[true, true], &ExceptionData::default());
    assert!(result.contributes);
}

#[test]
fn test_invert_stacktrace() {
    let mut frames = vec![frame("a", None)];
    let result = evaluate("function:a invert-stacktrace=1", &mut frames, &[true], &ExceptionData::default());
    assert_eq!(result.invert_stacktrace, Some(true));

    let mut frames = vec![frame("a", None)];
    let result = evaluate("function:zzz invert-stacktrace=1", &mut frames, &[true], &ExceptionData::default());
    assert_eq!(result.invert_stacktrace, None);
}

#[test]
fn test_no_rules_keeps_input() {
    let mut frames = vec![frame("a", Some(true)), frame("b", None)];
    let input = [
        FrameComponent { in_app: true, contributes: true, hint: Some("upstream".into()) },
        FrameComponent::new(false, false),
    ];
    let exc = ExceptionData::default();
    let ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    let result = assemble_contributions(std::iter::empty::<&Rule>(), &ctx, &input);
    assert_eq!(result.frames[0].hint.as_deref(), Some("upstream"));
    assert!(!result.frames[1].contributes);
    assert!(result.contributes);
    assert_eq!(result.hint, None);

    let mut ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    let mods = apply_modifications(std::iter::empty::<&Rule>(), &mut ctx);
    assert!(mods.iter().all(|m| *m == FrameModification::default()));
    frames.clear();
    let ctx = EvaluationContext::new(&frames, None, &exc, StackDirection::InnermostFirst);
    assert!(ctx.is_empty());
}

#[test]
fn test_evaluation_is_deterministic() {
    let dsl = "function:a* -group\n[ function:main ] | function:* +group\nfunction:b* max-frames=1";
    let make = || vec![frame("alpha", None), frame("beta", None), frame("main", None)];
    let exc = ExceptionData::default();
    let mut first = make();
    let mut second = make();
    let a = evaluate(dsl, &mut first, &[true, true, true], &exc);
    let b = evaluate(dsl, &mut second, &[true, true, true], &exc);
    assert_eq!(a, b);
    assert_eq!(first, second);
}
