//! Partial-credit pattern validation.
//!
//! Patterns arrive with task content and are not trusted. Anything long, nested-quantified or
//! using backtracking-only syntax is rejected before compilation.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

pub const MAX_PATTERN_LEN: usize = 200;
const COMPILED_SIZE_LIMIT: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern is {0} characters, limit is {MAX_PATTERN_LEN}")]
    TooLong(usize),
    #[error("pattern nests a quantifier inside a quantified group")]
    NestedQuantifier,
    #[error("pattern uses backreferences")]
    Backreference,
    #[error("pattern uses lookaround")]
    Lookaround,
    #[error("invalid pattern: {0}")]
    Invalid(#[from] regex::Error),
}

pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    let len = pattern.chars().count();
    if len > MAX_PATTERN_LEN {
        return Err(PatternError::TooLong(len));
    }

    let chars: Vec<char> = pattern.chars().collect();
    // per open group: whether its body contains a quantifier
    let mut groups: Vec<bool> = Vec::new();
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    if !in_class && ((next.is_ascii_digit() && next != '0') || next == 'k') {
                        return Err(PatternError::Backreference);
                    }
                }
                i += 2;
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            _ if in_class => {}
            '(' => {
                if chars.get(i + 1) == Some(&'?') {
                    let rest: String = chars[i + 2..].iter().take(2).collect();
                    if rest.starts_with('=')
                        || rest.starts_with('!')
                        || rest == "<="
                        || rest == "<!"
                    {
                        return Err(PatternError::Lookaround);
                    }
                }
                groups.push(false);
            }
            ')' => {
                let inner_quantified = groups.pop().unwrap_or(false);
                let quantified = matches!(chars.get(i + 1), Some('*' | '+' | '{'));
                if inner_quantified && quantified {
                    return Err(PatternError::NestedQuantifier);
                }
                if inner_quantified || quantified {
                    if let Some(parent) = groups.last_mut() {
                        *parent = true;
                    }
                }
            }
            '*' | '+' | '{' => {
                if let Some(current) = groups.last_mut() {
                    *current = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Validates then compiles case-insensitively with a bounded program size.
pub fn compile_pattern(pattern: &str) -> Result<Regex, PatternError> {
    validate_pattern(pattern)?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(COMPILED_SIZE_LIMIT)
        .dfa_size_limit(COMPILED_SIZE_LIMIT)
        .build()?;
    Ok(regex)
}
