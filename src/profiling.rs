//! Filter that keeps the subset of rules a profiler understands: plain
//! path/module/function/package matchers followed by a single `+app` or
//! `-app`. Everything else is dropped without error.

/// Matcher keys a profiling rule may use, including their aliases
pub const PROFILING_MATCHER_KEYS: &[&str] = &[
    "stack.abs_path",
    "path",
    "stack.module",
    "module",
    "stack.function",
    "function",
    "stack.package",
    "package",
];

pub const PROFILING_ACTIONS: &[&str] = &["+app", "-app"];

fn is_profiling_matcher(token: &str) -> bool {
    token
        .split_once(':')
        .is_some_and(|(key, _)| PROFILING_MATCHER_KEYS.contains(&key))
}

/// Whether one trimmed, non-comment line is a valid profiling rule.
///
/// A line holding only `+app` or `-app` passes: it has no matcher to reject.
pub fn is_profiling_rule(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.split_last() {
        Some((action, matchers)) => {
            PROFILING_ACTIONS.contains(action) && matchers.iter().all(|m| is_profiling_matcher(m))
        }
        None => false,
    }
}

/// Keep the profiling rules of `config`, trimmed and joined by newlines.
pub fn keep_profiling_rules(config: &str) -> String {
    config
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| is_profiling_rule(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_blank_and_bogus_lines_dropped() {
        assert_eq!(keep_profiling_rules("path:foo +app\n# comment\n\nbogus-line\n"), "path:foo +app");
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(keep_profiling_rules(""), "");
        assert_eq!(keep_profiling_rules("\n\n# only comments\n"), "");
    }

    #[test]
    fn test_only_app_actions_kept() {
        let config = "function:foo -app\nfunction:foo -group\nmodule:bar +app -group\nstack.package:/usr/lib/** -app";
        assert_eq!(keep_profiling_rules(config), "function:foo -app\nstack.package:/usr/lib/** -app");
    }

    #[test]
    fn test_unsupported_matchers_dropped() {
        let config = "family:native function:foo -app\ntype:Error +app\n!path:foo +app\npath:a module:b +app";
        assert_eq!(keep_profiling_rules(config), "path:a module:b +app");
    }

    #[test]
    fn test_action_without_matchers_kept() {
        assert_eq!(keep_profiling_rules("+app\n-group\n  -app \n"), "+app\n-app");
        assert!(is_profiling_rule("-app"));
        assert!(!is_profiling_rule("+group"));
    }

    #[test]
    fn test_lines_are_trimmed() {
        assert_eq!(keep_profiling_rules("   path:foo   +app  \n"), "path:foo   +app");
    }
}
