//! Line-oriented parser for the enhancement rule DSL.
//!
//! ```text
//! rule     := caller? matcher+ callee? action+
//! caller   := "[" matcher "]" "|"
//! callee   := "|" "[" matcher "]"
//! matcher  := ["!"] key ":" pattern
//! action   := ["^" | "v"] ("+" | "-") ("app" | "group") | name "=" value
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Each line is
//! tokenized once, left to right.

use super::{Action, Rule};
use crate::error::{EnhancerError, Result};
use crate::matchers::{Matcher, MatcherKey, Position};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    LBracket,
    RBracket,
    Pipe,
}

/// Parse DSL text into rules, preserving their order.
pub fn parse_enhancements(input: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        rules.push(parse_rule(line, idx + 1)?);
    }
    debug!("Parsed {} enhancement rules", rules.len());
    Ok(rules)
}

fn tokenize(line: &str, lineno: usize) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut depth = 0usize;

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '[' => {
                chars.next();
                depth += 1;
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                depth = depth.saturating_sub(1);
                tokens.push(Token::RBracket);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            _ => {
                let mut word = String::new();
                // open `[...]` glob classes inside the word
                let mut class = 0usize;
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || (depth > 0 && class == 0 && c == ']') {
                        break;
                    }
                    chars.next();
                    match c {
                        '[' => class += 1,
                        ']' => class = class.saturating_sub(1),
                        _ => {}
                    }
                    if c != '"' {
                        word.push(c);
                        continue;
                    }
                    // quoted segment, `\"` and `\\` escapes
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                Some(escaped) => word.push(escaped),
                                None => return Err(EnhancerError::parse(lineno, line, "dangling escape")),
                            },
                            Some(other) => word.push(other),
                            None => return Err(EnhancerError::parse(lineno, line, "unterminated quote")),
                        }
                    }
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn parse_matcher(word: &str, position: Position, line: &str, lineno: usize) -> Result<Matcher> {
    let (negated, body) = match word.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let (key, pattern) = body
        .split_once(':')
        .ok_or_else(|| EnhancerError::parse(lineno, line, format!("expected key:pattern, got {word:?}")))?;
    let key = MatcherKey::from_name(key)
        .ok_or_else(|| EnhancerError::parse(lineno, line, format!("unknown matcher key {key:?}")))?;
    Matcher::new(key, pattern, negated, position).map_err(|e| e.at_line(lineno))
}

/// Parse `[ matcher ]` starting at `tokens[i]`; returns the matcher and the next index.
fn parse_bracketed(
    tokens: &[Token],
    i: usize,
    position: Position,
    line: &str,
    lineno: usize,
) -> Result<(Matcher, usize)> {
    match (tokens.get(i), tokens.get(i + 1), tokens.get(i + 2)) {
        (Some(Token::LBracket), Some(Token::Word(word)), Some(Token::RBracket)) => {
            Ok((parse_matcher(word, position, line, lineno)?, i + 3))
        }
        _ => Err(EnhancerError::parse(lineno, line, "expected [ matcher ]")),
    }
}

fn parse_rule(line: &str, lineno: usize) -> Result<Rule> {
    let tokens = tokenize(line, lineno)?;
    let mut matchers = Vec::new();
    let mut actions = Vec::new();
    let mut i = 0;

    if tokens.first() == Some(&Token::LBracket) {
        let (caller, next) = parse_bracketed(&tokens, 0, Position::Caller, line, lineno)?;
        if tokens.get(next) != Some(&Token::Pipe) {
            return Err(EnhancerError::parse(lineno, line, "expected | after caller matcher"));
        }
        matchers.push(caller);
        i = next + 1;
    }

    let mut seen_callee = false;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Pipe if actions.is_empty() && !seen_callee => {
                let (callee, next) = parse_bracketed(&tokens, i + 1, Position::Callee, line, lineno)?;
                matchers.push(callee);
                seen_callee = true;
                i = next;
            }
            Token::Word(word) if Action::looks_like_action(word) => {
                let action = Action::parse(word).map_err(|msg| EnhancerError::parse(lineno, line, msg))?;
                actions.push(action);
                i += 1;
            }
            Token::Word(word) => {
                if !actions.is_empty() || seen_callee {
                    return Err(EnhancerError::parse(
                        lineno,
                        line,
                        format!("matcher {word:?} must come before the actions"),
                    ));
                }
                matchers.push(parse_matcher(word, Position::Frame, line, lineno)?);
                i += 1;
            }
            _ => return Err(EnhancerError::parse(lineno, line, "unexpected bracket or pipe")),
        }
    }

    if matchers.is_empty() || actions.is_empty() {
        return Err(EnhancerError::parse(lineno, line, "a rule needs matchers followed by actions"));
    }
    Rule::new(matchers, actions, lineno)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_brackets_and_quotes() {
        let tokens = tokenize(r#"[ function:main ] | function:"a b" -app"#, 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LBracket,
                Token::Word("function:main".into()),
                Token::RBracket,
                Token::Pipe,
                Token::Word("function:a b".into()),
                Token::Word("-app".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_tight_brackets() {
        let tokens = tokenize("[function:main]|function:x +group", 1).unwrap();
        assert_eq!(tokens[0], Token::LBracket);
        assert_eq!(tokens[1], Token::Word("function:main".into()));
        assert_eq!(tokens[2], Token::RBracket);
        assert_eq!(tokens[3], Token::Pipe);
    }

    #[test]
    fn test_tokenize_glob_class_outside_brackets() {
        let tokens = tokenize("function:foo[0-9] -group", 1).unwrap();
        assert_eq!(tokens[0], Token::Word("function:foo[0-9]".into()));
    }

    #[test]
    fn test_tokenize_glob_class_inside_brackets() {
        let tokens = tokenize("[ function:foo[0-9] ] | function:bar -group", 1).unwrap();
        assert_eq!(tokens[0], Token::LBracket);
        assert_eq!(tokens[1], Token::Word("function:foo[0-9]".into()));
        assert_eq!(tokens[2], Token::RBracket);
        assert_eq!(tokens[3], Token::Pipe);

        let tokens = tokenize("function:bar | [function:x[ab]] -group", 1).unwrap();
        assert_eq!(tokens[3], Token::Word("function:x[ab]".into()));
        assert_eq!(tokens[4], Token::RBracket);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert!(tokenize(r#"function:"abc -app"#, 3).is_err());
    }
}
