//! Shell-style glob patterns compiled to anchored regexes.
//!
//! Every [`Glob`] owns its compiled regex. Parsed rule sets are shared through
//! the bounded [`RuleCache`](crate::cache::RuleCache), so patterns live exactly
//! as long as the rules that use them.

use regex::{Regex, RegexBuilder};

/// Raw-pattern prefix that switches a glob to case-insensitive matching
pub const CASE_INSENSITIVE_PREFIX: &str = "(?i)";

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    regex: Regex,
}

impl Glob {
    /// Compile `raw`. Path-like globs treat `\` as a separator, keep `*` and `?`
    /// inside one segment and let `**` cross segments. Otherwise `*` and `?`
    /// match any character, line breaks included.
    pub fn new(raw: &str, path_like: bool) -> Result<Self, String> {
        let (body, case_insensitive) = match raw.strip_prefix(CASE_INSENSITIVE_PREFIX) {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        let body = if path_like {
            normalize_path(body)
        } else {
            body.to_string()
        };

        let translated = translate(&body, path_like)?;
        let regex = RegexBuilder::new(&translated)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Platform separators are equivalent in paths
pub fn normalize_path(value: &str) -> String {
    value.replace('\\', "/")
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Translate a glob into an anchored regex source string.
fn translate(pattern: &str, path_like: bool) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                let mut run = 1;
                while chars.get(i + run) == Some(&'*') {
                    run += 1;
                }
                if !path_like {
                    out.push_str(".*");
                } else if run == 1 {
                    out.push_str("[^/]*");
                } else if chars.get(i + run) == Some(&'/') {
                    // `**/` also matches zero leading segments
                    out.push_str("(?:.*/)?");
                    run += 1;
                } else {
                    out.push_str(".*");
                }
                i += run;
                continue;
            }
            '?' => out.push_str(if path_like { "[^/]" } else { "." }),
            '[' => {
                i = push_class(&chars, i, &mut out)?;
                continue;
            }
            '\\' if !path_like => {
                let next = chars.get(i + 1).ok_or("dangling escape at end of pattern")?;
                push_literal(&mut out, *next);
                i += 2;
                continue;
            }
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push('$');
    Ok(out)
}

/// Copy a `[...]` class starting at `start`; returns the index after `]`.
fn push_class(chars: &[char], start: usize, out: &mut String) -> Result<usize, String> {
    let mut j = start + 1;
    let negated = matches!(chars.get(j), Some('!') | Some('^'));
    if negated {
        j += 1;
    }
    let body_start = j;
    // a leading `]` is a literal member
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    if j >= chars.len() {
        return Err("unterminated character class".to_string());
    }

    out.push('[');
    if negated {
        out.push('^');
    }
    for &c in &chars[body_start..j] {
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(']');
    Ok(j + 1)
}
