//! Guard evaluation
//!
//! A guard gates a leaf step on conditions evaluated immediately before the
//! step would run. All conditions must hold. Evaluation failures are errors,
//! never a silent "false".

use crate::config;
use crate::error::GuardError;
use crate::runner::{interpolate, interpolate_list, interpolate_strict, Context};
use glob::MatchOptions;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::env;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

type PredicateFn = dyn Fn(&Context) -> Result<bool, GuardError>;

/// A caller-supplied predicate
#[derive(Clone)]
pub struct Predicate {
    name: String,
    check: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Context) -> Result<bool, GuardError> + 'static,
    {
        Predicate {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// A single condition
#[derive(Debug, Clone)]
pub enum Condition {
    /// Any path matches the include patterns and none of the `!` excludes
    Glob(Vec<String>),
    Equal { left: String, right: String },
    NotEqual { left: String, right: String },
    Command(String),
    Exists(String),
    EnvSet(String),
    EnvNotSet(String),
    Predicate(Predicate),
}

impl Condition {
    /// Conditions from one `when` entry of the project file
    pub fn from_config(when: config::When) -> Vec<Condition> {
        let mut conditions = Vec::new();

        if !when.glob.is_empty() {
            conditions.push(Condition::Glob(when.glob));
        }
        if let Some(eq) = when.equal {
            conditions.push(Condition::Equal {
                left: eq.left,
                right: eq.right,
            });
        }
        if let Some(ne) = when.not_equal {
            conditions.push(Condition::NotEqual {
                left: ne.left,
                right: ne.right,
            });
        }
        if let Some(cmd) = when.command {
            conditions.push(Condition::Command(cmd));
        }
        if let Some(path) = when.exists {
            conditions.push(Condition::Exists(path));
        }
        if let Some(var) = when.env_set {
            conditions.push(Condition::EnvSet(var));
        }
        if let Some(var) = when.env_not_set {
            conditions.push(Condition::EnvNotSet(var));
        }

        conditions
    }

    /// Evaluate this condition
    pub fn evaluate(&self, ctx: &Context) -> Result<bool, GuardError> {
        match self {
            Condition::Glob(patterns) => {
                let patterns = interpolate_list(patterns, &ctx.vars)?;
                any_match(&patterns, &ctx.working_dir)
            }

            Condition::Equal { left, right } => {
                Ok(interpolate(left, &ctx.vars)? == interpolate(right, &ctx.vars)?)
            }

            Condition::NotEqual { left, right } => {
                Ok(interpolate(left, &ctx.vars)? != interpolate(right, &ctx.vars)?)
            }

            Condition::Command(cmd) => check_command(cmd, ctx),

            Condition::Exists(path) => {
                let path = interpolate_strict(path, &ctx.vars)?;
                Ok(ctx.working_dir.join(path).exists())
            }

            Condition::EnvSet(var_name) => {
                let name = interpolate_strict(var_name, &ctx.vars)?;
                Ok(env::var_os(name).is_some())
            }

            Condition::EnvNotSet(var_name) => {
                let name = interpolate_strict(var_name, &ctx.vars)?;
                Ok(env::var_os(name).is_none())
            }

            Condition::Predicate(predicate) => (predicate.check)(ctx),
        }
    }

    /// Short human-readable description, used when reporting skips
    pub fn describe(&self) -> String {
        match self {
            Condition::Glob(patterns) => format!("no files match {}", patterns.join(", ")),
            Condition::Equal { left, right } => format!("'{}' != '{}'", left, right),
            Condition::NotEqual { left, right } => format!("'{}' == '{}'", left, right),
            Condition::Command(cmd) => format!("'{}' did not succeed", cmd),
            Condition::Exists(path) => format!("'{}' does not exist", path),
            Condition::EnvSet(var) => format!("${} is not set", var),
            Condition::EnvNotSet(var) => format!("${} is set", var),
            Condition::Predicate(p) => format!("'{}' is false", p.name),
        }
    }
}

/// A conjunction of conditions attached to a leaf step
#[derive(Debug, Clone, Default)]
pub struct Guard {
    pub conditions: Vec<Condition>,
}

/// Outcome of evaluating a guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Pass,
    /// Describes the first condition that did not hold
    Blocked(String),
}

impl Guard {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Guard { conditions }
    }

    /// Guard that holds when any path matches the patterns
    pub fn glob<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Guard::new(vec![Condition::Glob(
            patterns.into_iter().map(Into::into).collect(),
        )])
    }

    /// Guard backed by a caller-supplied predicate
    pub fn predicate<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Context) -> Result<bool, GuardError> + 'static,
    {
        Guard::new(vec![Condition::Predicate(Predicate::new(name, check))])
    }

    /// Build a guard from the `when` entries of a step
    pub fn from_config(when_list: Vec<config::When>) -> Option<Self> {
        let conditions: Vec<Condition> = when_list
            .into_iter()
            .flat_map(Condition::from_config)
            .collect();

        if conditions.is_empty() {
            None
        } else {
            Some(Guard::new(conditions))
        }
    }

    /// Evaluate all conditions in order, stopping at the first that fails
    pub fn evaluate(&self, ctx: &Context) -> Result<GuardOutcome, GuardError> {
        for condition in &self.conditions {
            if !condition.evaluate(ctx)? {
                return Ok(GuardOutcome::Blocked(condition.describe()));
            }
        }
        Ok(GuardOutcome::Pass)
    }
}

/// Check whether any path under `base` matches the pattern set
///
/// Patterns prefixed with `!` exclude matches of the other patterns. Relative
/// patterns resolve against `base`; absolute ones are used as written. As with
/// shell globbing, wildcards never match a leading `.` in a file or directory
/// name.
pub fn any_match(patterns: &[String], base: &Path) -> Result<bool, GuardError> {
    let (excludes, includes): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));

    let excluded = build_excludes(&excludes)?;
    let base_str = glob::Pattern::escape(&base.to_string_lossy());

    for pattern in includes {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            format!("{}/{}", base_str, pattern.trim_start_matches("./"))
        };
        let paths =
            glob::glob_with(&full, MATCH_OPTIONS).map_err(|source| GuardError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;

        for entry in paths {
            let path = entry?;
            let relative = path.strip_prefix(base).unwrap_or(&path);
            if !excluded.is_match(relative) {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

fn build_excludes(excludes: &[&String]) -> Result<GlobSet, GuardError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in excludes {
        let raw = pattern.trim_start_matches('!').trim_start_matches("./");
        let glob = GlobBuilder::new(raw)
            .literal_separator(true)
            .build()
            .map_err(|source| GuardError::Exclude {
                pattern: pattern.to_string(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| GuardError::Exclude {
        pattern: excludes
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        source,
    })
}

/// Check if a command succeeds
pub fn check_command(cmd_str: &str, ctx: &Context) -> Result<bool, GuardError> {
    let exec_str = interpolate(cmd_str, &ctx.vars)?;

    let command_error = |source: io::Error| GuardError::Command {
        command: exec_str.clone(),
        source,
    };

    let status = ctx
        .shell_command(&exec_str)
        .map_err(command_error)?
        .current_dir(&ctx.working_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(command_error)?;

    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for file in files {
            let path = temp_dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        temp_dir
    }

    fn ctx_in(dir: &TempDir) -> Context {
        Context::new().with_working_dir(dir.path().to_path_buf())
    }

    #[test]
    fn test_glob_no_match() {
        let dir = tree(&["src/momma/scss/app.scss"]);
        let guard = Guard::glob(["src/momma/js/**/*.js"]);

        let outcome = guard.evaluate(&ctx_in(&dir)).unwrap();
        assert!(matches!(outcome, GuardOutcome::Blocked(_)));
    }

    #[test]
    fn test_glob_match() {
        let dir = tree(&["src/momma/js/nested/app.js"]);
        let guard = Guard::glob(["src/momma/js/**/*.js"]);

        assert_eq!(guard.evaluate(&ctx_in(&dir)).unwrap(), GuardOutcome::Pass);
    }

    #[test]
    fn test_glob_excludes() {
        let dir = tree(&["src/lib/jquery.js", "src/app.min.js"]);
        let patterns = vec![
            "**/*.js".to_string(),
            "!src/lib/**/*.js".to_string(),
            "!**/*.min.js".to_string(),
        ];
        assert!(!any_match(&patterns, dir.path()).unwrap());

        fs::write(dir.path().join("src").join("app.js"), "x").unwrap();
        assert!(any_match(&patterns, dir.path()).unwrap());
    }

    #[test]
    fn test_glob_with_variable() {
        let dir = tree(&["test/jsunit/spec.js"]);
        let mut vars = HashMap::new();
        vars.insert("tests".to_string(), "test/jsunit".to_string());
        let ctx = ctx_in(&dir).with_vars(vars);

        let guard = Guard::glob(["${tests}/**/*.js"]);
        assert_eq!(guard.evaluate(&ctx).unwrap(), GuardOutcome::Pass);
    }

    #[test]
    fn test_glob_undefined_variable_is_an_error() {
        let dir = tree(&[]);
        let guard = Guard::glob(["${CHURN_NO_SUCH_DIR}/**/*.js"]);

        let result = guard.evaluate(&ctx_in(&dir));
        assert!(matches!(result, Err(GuardError::Interpolation(_))));
    }

    #[test]
    fn test_invalid_glob_pattern_is_an_error() {
        let dir = tree(&[]);
        let guard = Guard::glob(["src/***/x.js"]);

        let result = guard.evaluate(&ctx_in(&dir));
        assert!(matches!(result, Err(GuardError::Pattern { .. })));
    }

    #[test]
    fn test_invalid_exclude_pattern_is_an_error() {
        let dir = tree(&[]);
        let patterns = vec!["**/*.js".to_string(), "![z-a].js".to_string()];

        let result = any_match(&patterns, dir.path());
        assert!(matches!(result, Err(GuardError::Exclude { .. })));
    }

    #[test]
    fn test_equal_and_not_equal() {
        let mut vars = HashMap::new();
        vars.insert("env".to_string(), "production".to_string());
        let ctx = Context::new().with_vars(vars);

        let equal = Condition::Equal {
            left: "${env}".to_string(),
            right: "production".to_string(),
        };
        let not_equal = Condition::NotEqual {
            left: "${env}".to_string(),
            right: "production".to_string(),
        };

        assert!(equal.evaluate(&ctx).unwrap());
        assert!(!not_equal.evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_command_condition() {
        let ctx = Context::new();
        assert!(Condition::Command("true".to_string()).evaluate(&ctx).unwrap());
        assert!(!Condition::Command("false".to_string()).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_command_condition_missing_interpreter() {
        let ctx = Context::new().with_interpreter(vec!["churn-no-such-shell".to_string()]);
        let result = Condition::Command("true".to_string()).evaluate(&ctx);
        assert!(matches!(result, Err(GuardError::Command { .. })));
    }

    #[test]
    fn test_exists() {
        let dir = tree(&["build/.gitkeep"]);
        let ctx = ctx_in(&dir);

        assert!(Condition::Exists("build/.gitkeep".to_string())
            .evaluate(&ctx)
            .unwrap());
        assert!(!Condition::Exists("build/app.js".to_string())
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn test_env_conditions() {
        env::set_var("CHURN_GUARD_TEST_VAR", "1");
        env::remove_var("CHURN_GUARD_UNSET_VAR");
        let ctx = Context::new();

        assert!(Condition::EnvSet("CHURN_GUARD_TEST_VAR".to_string())
            .evaluate(&ctx)
            .unwrap());
        assert!(Condition::EnvNotSet("CHURN_GUARD_UNSET_VAR".to_string())
            .evaluate(&ctx)
            .unwrap());

        env::remove_var("CHURN_GUARD_TEST_VAR");
    }

    #[test]
    fn test_glob_ignores_hidden_files() {
        let dir = tree(&["test/jsunit/.swp.js"]);
        let patterns = vec!["test/jsunit/**/*.js".to_string()];
        assert!(!any_match(&patterns, dir.path()).unwrap());

        fs::write(dir.path().join("test/jsunit/spec.js"), "x").unwrap();
        assert!(any_match(&patterns, dir.path()).unwrap());
    }

    #[test]
    fn test_glob_absolute_pattern() {
        let dir = tree(&["build/app.js"]);
        let other = TempDir::new().unwrap();
        let pattern = dir.path().join("build/*.js").to_string_lossy().into_owned();

        assert!(any_match(&[pattern], other.path()).unwrap());
    }

    #[test]
    fn test_command_without_interpreter_is_an_error() {
        let mut ctx = Context::new();
        ctx.interpreter.clear();

        let result = Condition::Command("true".to_string()).evaluate(&ctx);
        assert!(matches!(result, Err(GuardError::Command { .. })));
    }

    #[test]
    fn test_env_condition_names_are_interpolated() {
        env::set_var("CHURN_GUARD_NAMED_VAR", "1");
        let mut vars = HashMap::new();
        vars.insert("flag".to_string(), "CHURN_GUARD_NAMED_VAR".to_string());
        let ctx = Context::new().with_vars(vars);

        assert!(Condition::EnvSet("${flag}".to_string())
            .evaluate(&ctx)
            .unwrap());
        assert!(matches!(
            Condition::EnvNotSet("${missing}".to_string()).evaluate(&ctx),
            Err(GuardError::Interpolation(_))
        ));

        env::remove_var("CHURN_GUARD_NAMED_VAR");
    }

    #[test]
    fn test_predicate_error_propagates() {
        let guard = Guard::predicate("writable", |_| {
            Err(GuardError::Predicate("permission denied".to_string()))
        });

        let result = guard.evaluate(&Context::new());
        assert!(matches!(result, Err(GuardError::Predicate(_))));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let guard = Guard::new(vec![
            Condition::Command("true".to_string()),
            Condition::Predicate(Predicate::new("never", |_| Ok(false))),
        ]);

        assert_eq!(
            guard.evaluate(&Context::new()).unwrap(),
            GuardOutcome::Blocked("'never' is false".to_string())
        );
    }

    #[test]
    fn test_from_config_collects_every_condition() {
        let when = config::When {
            glob: vec!["src/**/*.js".to_string()],
            exists: Some("src".to_string()),
            ..config::When::default()
        };

        let guard = Guard::from_config(vec![when]).unwrap();
        assert_eq!(guard.conditions.len(), 2);
        assert!(Guard::from_config(Vec::new()).is_none());
    }
}
