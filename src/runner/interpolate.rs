//! Variable interpolation for strings
//!
//! This module handles parsing and replacing variables in strings using the ${var} syntax.

use crate::error::{InterpolationError, InterpolationResult};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

/// Deepest chain of variables referring to variables
const MAX_DEPTH: usize = 100;

/// Interpolate variables in a string
///
/// Supports:
/// - `${var}` - variable from context
/// - Environment variables (when not found in context)
///
/// Unknown variables are left untouched so the shell can still expand them.
/// A variable referring back to itself is left unexpanded at that point.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    expand(s, vars, &mut Vec::new())
}

fn expand(
    s: &str,
    vars: &HashMap<String, String>,
    stack: &mut Vec<String>,
) -> InterpolationResult<String> {
    if stack.len() > MAX_DEPTH {
        return Err(InterpolationError::RecursiveInterpolation);
    }

    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for caps in VARIABLE.captures_iter(s) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let var_name = &caps[1];

        result.push_str(&s[last..whole.start()]);
        last = whole.end();

        if stack.iter().any(|name| name == var_name) {
            result.push_str(whole.as_str());
            continue;
        }

        let value = match vars.get(var_name) {
            Some(value) => value.clone(),
            None => match env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    result.push_str(whole.as_str());
                    continue;
                }
            },
        };

        // Values may themselves contain references
        stack.push(var_name.to_string());
        let expanded = expand(&value, vars, stack)?;
        stack.pop();

        result.push_str(&expanded);
    }

    result.push_str(&s[last..]);
    Ok(result)
}

/// Interpolate with strict mode - errors on undefined variables
pub fn interpolate_strict(
    s: &str,
    vars: &HashMap<String, String>,
) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = VARIABLE.captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}

/// Strictly interpolate a list of strings
pub fn interpolate_list(
    list: &[String],
    vars: &HashMap<String, String>,
) -> InterpolationResult<Vec<String>> {
    list.iter().map(|s| interpolate_strict(s, vars)).collect()
}
