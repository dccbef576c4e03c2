//! Collaborators
//!
//! A collaborator performs the actual work behind a leaf step: cleaning,
//! concatenation, linting and so on. The runner never interprets a step's
//! configuration; it hands it to the collaborator bound to the step's plugin.

use crate::config::{self, CommandDetail};
use crate::error::{CollaboratorError, ConfigError, ConfigResult};
use crate::runner::{interpolate, Context};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};

/// Plugin name of the built-in shell collaborator
pub const SHELL_PLUGIN: &str = "shell";

/// One request to a collaborator
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub plugin: &'a str,
    pub target: Option<&'a str>,
    pub config: &'a Value,
}

/// Something that can carry out a leaf step
pub trait Collaborator {
    fn invoke(&self, invocation: &Invocation<'_>, ctx: &Context) -> Result<(), CollaboratorError>;
}

impl<F> Collaborator for F
where
    F: Fn(&Invocation<'_>, &Context) -> Result<(), CollaboratorError>,
{
    fn invoke(&self, invocation: &Invocation<'_>, ctx: &Context) -> Result<(), CollaboratorError> {
        self(invocation, ctx)
    }
}

/// Collaborators keyed by plugin name
pub struct Collaborators {
    by_plugin: HashMap<String, Box<dyn Collaborator>>,
}

impl Collaborators {
    /// An empty set
    pub fn new() -> Self {
        Collaborators {
            by_plugin: HashMap::new(),
        }
    }

    /// A set holding only the built-in shell collaborator
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.register(SHELL_PLUGIN, ShellCollaborator);
        set
    }

    /// Builtins plus an [`ExecPlugin`] for every plugin declaring `exec`
    pub fn from_config(config: &config::Config) -> ConfigResult<Self> {
        let mut set = Self::with_builtins();

        for (name, plugin) in &config.plugins {
            if name == SHELL_PLUGIN {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is a built-in plugin and cannot be redefined",
                    SHELL_PLUGIN
                )));
            }
            if let Some(exec) = &plugin.exec {
                set.register(name.clone(), ExecPlugin::new(exec.clone()));
            }
        }

        Ok(set)
    }

    /// Bind a collaborator to a plugin name, replacing any previous binding
    pub fn register<C>(&mut self, plugin: impl Into<String>, collaborator: C)
    where
        C: Collaborator + 'static,
    {
        self.by_plugin.insert(plugin.into(), Box::new(collaborator));
    }

    pub fn get(&self, plugin: &str) -> Option<&dyn Collaborator> {
        self.by_plugin.get(plugin).map(|c| c.as_ref())
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.by_plugin.contains_key(plugin)
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Runs inline shell commands
///
/// Configuration is a [`CommandDetail`] mapping. Only `exec` and `dir` matter
/// here; `print` and `quiet` shape how the step is announced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCollaborator;

impl Collaborator for ShellCollaborator {
    fn invoke(&self, invocation: &Invocation<'_>, ctx: &Context) -> Result<(), CollaboratorError> {
        let cmd: CommandDetail = serde_yaml::from_value(invocation.config.clone())
            .map_err(|e| CollaboratorError::InvalidConfig(e.to_string()))?;

        let exec_str = interpolate(&cmd.exec, &ctx.vars)?;

        let working_dir = match &cmd.dir {
            Some(dir) => ctx.working_dir.join(interpolate(dir, &ctx.vars)?),
            None => ctx.working_dir.clone(),
        };

        let mut command = shell_command(&exec_str, &working_dir, ctx)?;
        run_to_completion(&mut command, &exec_str)
    }
}

/// Runs a plugin implemented by an external command
///
/// The command receives the plugin name, target name and YAML-encoded target
/// configuration as `CHURN_PLUGIN`, `CHURN_TARGET` and `CHURN_CONFIG`.
#[derive(Debug, Clone)]
pub struct ExecPlugin {
    exec: String,
}

impl ExecPlugin {
    pub fn new(exec: impl Into<String>) -> Self {
        ExecPlugin { exec: exec.into() }
    }
}

impl Collaborator for ExecPlugin {
    fn invoke(&self, invocation: &Invocation<'_>, ctx: &Context) -> Result<(), CollaboratorError> {
        let exec_str = interpolate(&self.exec, &ctx.vars)?;
        let encoded = serde_yaml::to_string(invocation.config)
            .map_err(|e| CollaboratorError::InvalidConfig(e.to_string()))?;

        let mut command = shell_command(&exec_str, &ctx.working_dir, ctx)?;
        command.env("CHURN_PLUGIN", invocation.plugin);
        command.env("CHURN_TARGET", invocation.target.unwrap_or_default());
        command.env("CHURN_CONFIG", encoded);

        run_to_completion(&mut command, &exec_str)
    }
}

/// Build an interpreter invocation for `exec_str` with inherited stdio
fn shell_command(
    exec_str: &str,
    working_dir: &Path,
    ctx: &Context,
) -> Result<StdCommand, CollaboratorError> {
    let mut command = ctx
        .shell_command(exec_str)
        .map_err(|source| CollaboratorError::Spawn {
            command: exec_str.to_string(),
            source,
        })?;

    command
        .current_dir(working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    Ok(command)
}

fn run_to_completion(command: &mut StdCommand, exec_str: &str) -> Result<(), CollaboratorError> {
    let status = command.status().map_err(|source| CollaboratorError::Spawn {
        command: exec_str.to_string(),
        source,
    })?;

    if !status.success() {
        return Err(CollaboratorError::CommandFailed(status.code()));
    }

    Ok(())
}
