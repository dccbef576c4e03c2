//! Core configuration types
//!
//! This module defines the data structures that represent a churn.yml project file.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// Name of the task run when none is given on the command line
pub const DEFAULT_TASK: &str = "default";

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Application name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Task to run when none is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Global interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Dotenv file loaded into the variable set, relative to the project file
    #[serde(rename = "env-file", default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,

    /// Variables available to `${...}` interpolation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,

    /// Plugins and their configured targets
    #[serde(default)]
    pub plugins: HashMap<String, Plugin>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
}

impl Config {
    /// The task name to run when the command line names none
    pub fn default_task(&self) -> &str {
        self.default.as_deref().unwrap_or(DEFAULT_TASK)
    }
}

/// A plugin: an external unit of work with named targets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Plugin {
    /// Command implementing the plugin; omitted for in-process collaborators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,

    /// Options shared by every target, overridden by target options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,

    /// Targets in declaration order
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub targets: Mapping,
}

impl Plugin {
    /// Target names in declaration order (non-string keys are skipped)
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().filter_map(Value::as_str).collect()
    }

    /// Look up a target's raw configuration
    pub fn target(&self, name: &str) -> Option<&Value> {
        self.targets.get(name)
    }

    /// The configuration handed to the collaborator for a target
    ///
    /// Plugin-level `options` are overlaid with the target's own `options`.
    pub fn target_config(&self, name: &str) -> Option<Value> {
        let target = self.target(name)?.clone();

        let Some(Value::Mapping(shared)) = &self.options else {
            return Some(target);
        };

        let mut config = match target {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => return Some(other),
        };

        let mut options = shared.clone();
        if let Some(Value::Mapping(own)) = config.get("options") {
            for (key, value) in own {
                options.insert(key.clone(), value.clone());
            }
        }
        config.insert(Value::from("options"), Value::Mapping(options));

        Some(Value::Mapping(config))
    }
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Usage description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Longer description for help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this task is private (hidden from help)
    #[serde(default)]
    pub private: bool,

    /// Steps to execute, in order
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<Step>,

    /// Include another file as task definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

/// A step - a reference by name, or a structured item
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Step {
    /// `task`, `plugin` or `plugin:target`
    Reference(String),

    /// Structured step with conditions
    Complex(StepItem),
}

/// A structured step
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StepItem {
    /// Conditions that must all hold for the step to run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<When>,

    /// Explicit task reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Plugin references to run
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_strings"
    )]
    pub run: Vec<String>,

    /// Inline shell commands
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_commands"
    )]
    pub shell: Vec<Command>,
}

impl StepItem {
    /// Structural check of a single step
    pub fn check(&self) -> Result<(), String> {
        let actions = [self.task.is_some(), !self.run.is_empty(), !self.shell.is_empty()]
            .into_iter()
            .filter(|set| *set)
            .count();
        if actions != 1 {
            return Err("a step needs exactly one of 'task', 'run' or 'shell'".to_string());
        }

        if self.task.is_some() && !self.when.is_empty() {
            return Err("conditions cannot guard a task reference".to_string());
        }

        if self.when.iter().any(When::is_empty) {
            return Err("each 'when' entry needs at least one condition".to_string());
        }

        Ok(())
    }
}

/// A shell command to execute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress the command echo
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Command {
    /// Normalise into the detailed form
    pub fn into_detail(self) -> CommandDetail {
        match self {
            Command::Simple(exec) => CommandDetail {
                exec,
                print: None,
                quiet: false,
                dir: None,
            },
            Command::Complex(detail) => detail,
        }
    }
}

/// A conditional expression; every condition set must hold
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct When {
    /// Check if any path matches the patterns (`!` prefix excludes)
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_strings"
    )]
    pub glob: Vec<String>,

    /// Check if values are equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(rename = "not-equal", default, skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<WhenComparison>,

    /// Check if a command succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Check if a path exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,

    /// Check if environment variable is set
    #[serde(rename = "env-set", default, skip_serializing_if = "Option::is_none")]
    pub env_set: Option<String>,

    /// Check if environment variable is not set
    #[serde(rename = "env-not-set", default, skip_serializing_if = "Option::is_none")]
    pub env_not_set: Option<String>,
}

impl When {
    /// Whether no condition is set at all
    pub fn is_empty(&self) -> bool {
        self.glob.is_empty()
            && self.equal.is_none()
            && self.not_equal.is_none()
            && self.command.is_none()
            && self.exists.is_none()
            && self.env_set.is_none()
            && self.env_not_set.is_none()
    }
}

/// A comparison for when conditions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    pub left: String,

    /// Right-hand side of comparison
    pub right: String,
}

/// Custom deserializer for steps that handles both single values and arrays
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single reference
        Value::String(s) => Ok(vec![Step::Reference(s)]),
        // Array of steps
        Value::Sequence(seq) => {
            let mut steps = Vec::new();
            for item in seq {
                let step = Step::deserialize(item).map_err(D::Error::custom)?;
                steps.push(step);
            }
            Ok(steps)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("steps must be a string or array")),
    }
}

/// Custom deserializer for a string or a list of strings
fn deserialize_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| String::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("expected a string or array of strings")),
    }
}

/// Custom deserializer for commands that handles both single values and arrays
fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string or complex command
        Value::String(s) => Ok(vec![Command::Simple(s)]),
        Value::Mapping(_) => {
            let cmd = Command::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![cmd])
        }
        // Array of commands
        Value::Sequence(seq) => {
            let mut cmds = Vec::new();
            for item in seq {
                let cmd = Command::deserialize(item).map_err(D::Error::custom)?;
                cmds.push(cmd);
            }
            Ok(cmds)
        }
        // Null or not present
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("shell must be a string, object, or array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_simple_config() {
        let yaml = r#"
tasks:
  mad_lib:
    usage: Copy library files
    steps: copy:lib
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tasks.len(), 1);
        let task = config.tasks.get("mad_lib").unwrap();
        assert!(matches!(&task.steps[0], Step::Reference(r) if r == "copy:lib"));
        assert_eq!(config.default_task(), DEFAULT_TASK);
    }

    #[test]
    fn test_deserialize_guarded_step() {
        let yaml = r#"
tasks:
  build_momma_js:
    steps:
      - when:
          - glob: src/momma/js/**/*.js
        run: [concat:momma, uglify:yomama]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let task = config.tasks.get("build_momma_js").unwrap();
        let Step::Complex(item) = &task.steps[0] else {
            panic!("expected a structured step");
        };
        assert_eq!(item.when[0].glob, vec!["src/momma/js/**/*.js"]);
        assert_eq!(item.run, vec!["concat:momma", "uglify:yomama"]);
    }

    #[test]
    fn test_plugin_targets_keep_declaration_order() {
        let yaml = r#"
plugins:
  trimtrailingspaces:
    exec: trim
    targets:
      scss: { src: ["**/*.scss"] }
      js: { src: ["**/*.js"] }
      markdown: { src: ["**/*.md"] }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let plugin = config.plugins.get("trimtrailingspaces").unwrap();
        assert_eq!(plugin.target_names(), vec!["scss", "js", "markdown"]);
    }

    #[test]
    fn test_target_config_overlays_shared_options() {
        let yaml = r#"
exec: sass
options:
  style: nested
  sourcemap: none
targets:
  momma: { src: a.scss }
  momma_min:
    src: a.scss
    options: { style: compressed }
"#;
        let plugin: Plugin = serde_yaml::from_str(yaml).unwrap();

        let plain = plugin.target_config("momma").unwrap();
        assert_eq!(plain["options"]["style"], Value::from("nested"));
        assert_eq!(plain["src"], Value::from("a.scss"));

        let min = plugin.target_config("momma_min").unwrap();
        assert_eq!(min["options"]["style"], Value::from("compressed"));
        assert_eq!(min["options"]["sourcemap"], Value::from("none"));

        assert!(plugin.target_config("missing").is_none());
    }

    #[test]
    fn test_step_item_check() {
        let ok = StepItem {
            run: vec!["karma".to_string()],
            when: vec![When {
                glob: vec!["test/jsunit/**/*.js".to_string()],
                ..When::default()
            }],
            ..StepItem::default()
        };
        assert!(ok.check().is_ok());

        assert!(StepItem::default().check().is_err());

        let both = StepItem {
            task: Some("build".to_string()),
            run: vec!["karma".to_string()],
            ..StepItem::default()
        };
        assert!(both.check().is_err());

        let guarded_task = StepItem {
            task: Some("build".to_string()),
            when: vec![When {
                exists: Some("src".to_string()),
                ..When::default()
            }],
            ..StepItem::default()
        };
        assert!(guarded_task.check().is_err());

        let empty_when = StepItem {
            run: vec!["karma".to_string()],
            when: vec![When::default()],
            ..StepItem::default()
        };
        assert!(empty_when.check().is_err());
    }

    #[test]
    fn test_when_is_empty() {
        assert!(When::default().is_empty());
        let when = When {
            exists: Some("build".to_string()),
            ..When::default()
        };
        assert!(!when.is_empty());
    }
}
