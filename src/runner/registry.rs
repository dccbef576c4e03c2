//! Task registry
//!
//! The runtime representation of tasks and the lookup structure the executor
//! resolves task names through. Tasks are immutable once registered.

use crate::config;
use crate::error::{ChurnError, ConfigError, ExecutionError, ExecutionResult};
use crate::runner::{Guard, SHELL_PLUGIN};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of a leaf step: its task, position and label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepId {
    pub task: String,
    pub index: usize,
    pub label: String,
}

impl StepId {
    pub fn new(task: impl Into<String>, index: usize, label: impl Into<String>) -> Self {
        StepId {
            task: task.into(),
            index,
            label: label.into(),
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (step {} of task '{}')",
            self.label,
            self.index + 1,
            self.task
        )
    }
}

/// A leaf operation bound to a plugin's collaborator
#[derive(Debug, Clone)]
pub struct LeafStep {
    pub plugin: String,
    pub target: Option<String>,
    pub config: Value,
    pub guard: Option<Guard>,
    /// Text shown when the step runs
    pub label: String,
    /// Suppress the announcement line
    pub quiet: bool,
}

impl LeafStep {
    pub fn new(plugin: impl Into<String>) -> Self {
        let plugin = plugin.into();
        LeafStep {
            label: plugin.clone(),
            plugin,
            target: None,
            config: Value::Null,
            guard: None,
            quiet: false,
        }
    }

    /// Address a plugin target; the label becomes `plugin:target`
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.label = format!("{}:{}", self.plugin, target);
        self.target = Some(target);
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// One unit of work within a task
#[derive(Debug, Clone)]
pub enum Step {
    /// Run another task by name
    Task(String),
    /// Invoke a collaborator
    Leaf(LeafStep),
    /// Steps sharing one guard, evaluated once before the first of them
    Group { guard: Guard, steps: Vec<Step> },
}

impl Step {
    pub fn task(name: impl Into<String>) -> Self {
        Step::Task(name.into())
    }

    pub fn leaf(leaf: LeafStep) -> Self {
        Step::Leaf(leaf)
    }

    pub fn group(guard: Guard, steps: Vec<Step>) -> Self {
        Step::Group { guard, steps }
    }

    /// Task name, leaf label, or the labels of a group joined by commas
    pub fn label(&self) -> String {
        match self {
            Step::Task(name) => name.clone(),
            Step::Leaf(leaf) => leaf.label.clone(),
            Step::Group { steps, .. } => steps
                .iter()
                .map(Step::label)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Runtime task representation
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub usage: Option<String>,
    pub description: Option<String>,
    pub private: bool,
    pub steps: Vec<Step>,
}

impl Task {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Task {
            name: name.into(),
            usage: None,
            description: None,
            private: false,
            steps,
        }
    }

    /// Create a task from configuration, expanding plugin references
    pub fn from_config(
        name: &str,
        task: &config::Task,
        config: &config::Config,
    ) -> Result<Self, ChurnError> {
        let mut steps = Vec::new();
        for step in &task.steps {
            expand_step(name, step, config, &mut steps)?;
        }

        Ok(Task {
            name: name.to_string(),
            usage: task.usage.clone(),
            description: task.description.clone(),
            private: task.private,
            steps,
        })
    }

    /// Names of tasks referenced directly by this task, including inside groups
    pub fn task_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        collect_task_refs(&self.steps, &mut refs);
        refs
    }
}

fn collect_task_refs<'a>(steps: &'a [Step], out: &mut Vec<&'a str>) {
    for step in steps {
        match step {
            Step::Task(name) => out.push(name),
            Step::Leaf(_) => {}
            Step::Group { steps, .. } => collect_task_refs(steps, out),
        }
    }
}

/// Expand one configured step into runtime steps
fn expand_step(
    task_name: &str,
    step: &config::Step,
    config: &config::Config,
    out: &mut Vec<Step>,
) -> Result<(), ChurnError> {
    let item = match step {
        config::Step::Reference(reference) => {
            return expand_reference(task_name, reference, false, config, out)
        }
        config::Step::Complex(item) => item,
    };

    item.check().map_err(|reason| ConfigError::InvalidStep {
        task: task_name.to_string(),
        reason,
    })?;

    let guard = Guard::from_config(item.when.clone());

    if let Some(task) = &item.task {
        out.push(Step::Task(task.clone()));
        return Ok(());
    }

    let mut leaves = Vec::new();
    for reference in &item.run {
        expand_reference(task_name, reference, guard.is_some(), config, &mut leaves)?;
    }

    for cmd in &item.shell {
        let detail = cmd.clone().into_detail();
        let label = detail.print.clone().unwrap_or_else(|| detail.exec.clone());
        let quiet = detail.quiet;

        let leaf = LeafStep::new(SHELL_PLUGIN)
            .with_config(serde_yaml::to_value(detail)?)
            .with_label(label)
            .quiet(quiet);
        leaves.push(Step::Leaf(leaf));
    }

    match guard {
        Some(guard) => out.push(Step::group(guard, leaves)),
        None => out.extend(leaves),
    }
    Ok(())
}

/// Expand `plugin:target`, a task name, or a whole plugin
fn expand_reference(
    task_name: &str,
    reference: &str,
    guarded: bool,
    config: &config::Config,
    out: &mut Vec<Step>,
) -> Result<(), ChurnError> {
    if let Some((plugin_name, target)) = reference.split_once(':') {
        let unknown_target = || ConfigError::UnknownTarget {
            plugin: plugin_name.to_string(),
            target: target.to_string(),
        };
        let target_config = config
            .plugins
            .get(plugin_name)
            .and_then(|plugin| plugin.target_config(target))
            .ok_or_else(unknown_target)?;

        out.push(Step::Leaf(
            LeafStep::new(plugin_name)
                .with_target(target)
                .with_config(target_config),
        ));
        return Ok(());
    }

    if !config.tasks.contains_key(reference) {
        if let Some(plugin) = config.plugins.get(reference) {
            for target in plugin.target_names() {
                let target_config = plugin.target_config(target).unwrap_or(Value::Null);
                out.push(Step::Leaf(
                    LeafStep::new(reference)
                        .with_target(target)
                        .with_config(target_config),
                ));
            }
            return Ok(());
        }
    }

    if guarded {
        return Err(ConfigError::InvalidStep {
            task: task_name.to_string(),
            reason: format!("conditions cannot guard task reference '{}'", reference),
        }
        .into());
    }

    // Unknown names stay task references and fail when resolved
    out.push(Step::Task(reference.to_string()));
    Ok(())
}

/// Mapping from task name to task
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding every task in the configuration
    pub fn from_config(config: &config::Config) -> Result<Self, ChurnError> {
        let mut registry = Self::new();
        for (name, task) in &config.tasks {
            registry.insert(Task::from_config(name, task, config)?)?;
        }
        Ok(registry)
    }

    /// Add a task under `name`
    pub fn register(&mut self, name: impl Into<String>, steps: Vec<Step>) -> ExecutionResult<()> {
        self.insert(Task::new(name, steps))
    }

    /// Add a fully described task
    pub fn insert(&mut self, task: Task) -> ExecutionResult<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(ExecutionError::DuplicateTask(task.name));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Look up a task
    pub fn resolve(&self, name: &str) -> ExecutionResult<&Task> {
        self.tasks
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in alphabetical order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check the whole registry for cycles and dangling references
    pub fn check_acyclic(&self) -> ExecutionResult<()> {
        let mut visited = HashSet::new();
        for name in self.names() {
            let mut stack = Vec::new();
            self.check_task_cycle(name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    /// Check everything reachable from `root` for cycles and dangling references
    pub fn check_acyclic_from(&self, root: &str) -> ExecutionResult<()> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        self.check_task_cycle(root, &mut visited, &mut stack)
    }

    fn check_task_cycle<'a>(
        &'a self,
        task_name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> ExecutionResult<()> {
        if let Some(start) = stack.iter().position(|t| *t == task_name) {
            let mut cycle: Vec<String> = stack[start..].iter().map(|t| t.to_string()).collect();
            cycle.push(task_name.to_string());
            return Err(ExecutionError::CyclicTask(cycle));
        }

        if visited.contains(task_name) {
            return Ok(());
        }

        let task = self.resolve(task_name)?;

        stack.push(task_name);
        for subtask in task.task_refs() {
            self.check_task_cycle(subtask, visited, stack)?;
        }
        stack.pop();

        visited.insert(task_name);
        Ok(())
    }
}
