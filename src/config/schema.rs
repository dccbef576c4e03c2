//! Configuration validation
//!
//! This module provides validation logic for project files. Cycles between
//! tasks are checked on the built registry, see
//! [`TaskRegistry::check_acyclic`](crate::runner::TaskRegistry::check_acyclic).

use crate::config::types::{Config, Plugin, Step, Task};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::{Collaborators, SHELL_PLUGIN};

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    if let Some(default) = &config.default {
        if !config.tasks.contains_key(default) {
            return Err(ConfigError::Invalid(format!(
                "Default task '{}' is not defined",
                default
            )));
        }
    }

    for (name, plugin) in &config.plugins {
        validate_plugin(name, plugin)?;
    }

    for (name, task) in &config.tasks {
        validate_task(name, task, config)?;
    }

    Ok(())
}

/// Validate a single plugin declaration
pub fn validate_plugin(name: &str, plugin: &Plugin) -> ConfigResult<()> {
    if name == SHELL_PLUGIN {
        return Err(ConfigError::Invalid(format!(
            "'{}' is a built-in plugin and cannot be redefined",
            SHELL_PLUGIN
        )));
    }
    if name.contains(':') {
        return Err(ConfigError::Invalid(format!(
            "Plugin name '{}' cannot contain ':'",
            name
        )));
    }
    if plugin.target_names().len() != plugin.targets.len() {
        return Err(ConfigError::Invalid(format!(
            "Plugin '{}' has a target whose name is not a string",
            name
        )));
    }
    Ok(())
}

/// Validate a single task against the rest of the configuration
pub fn validate_task(name: &str, task: &Task, config: &Config) -> ConfigResult<()> {
    if name.contains(':') {
        return Err(ConfigError::Invalid(format!(
            "Task name '{}' cannot contain ':'",
            name
        )));
    }

    for step in &task.steps {
        match step {
            Step::Reference(reference) => validate_reference(name, reference, config)?,
            Step::Complex(item) => {
                item.check().map_err(|reason| ConfigError::InvalidStep {
                    task: name.to_string(),
                    reason,
                })?;

                if let Some(subtask) = &item.task {
                    if !config.tasks.contains_key(subtask) {
                        return Err(ConfigError::UnresolvedReference {
                            task: name.to_string(),
                            name: subtask.clone(),
                        });
                    }
                }

                for reference in &item.run {
                    validate_reference(name, reference, config)?;
                }
            }
        }
    }

    Ok(())
}

/// Check that a reference names a task, a plugin, or a plugin target
fn validate_reference(task: &str, reference: &str, config: &Config) -> ConfigResult<()> {
    if let Some((plugin_name, target)) = reference.split_once(':') {
        let known = config
            .plugins
            .get(plugin_name)
            .is_some_and(|plugin| plugin.target(target).is_some());
        if !known {
            return Err(ConfigError::UnknownTarget {
                plugin: plugin_name.to_string(),
                target: target.to_string(),
            });
        }
        return Ok(());
    }

    if config.tasks.contains_key(reference) || config.plugins.contains_key(reference) {
        Ok(())
    } else {
        Err(ConfigError::UnresolvedReference {
            task: task.to_string(),
            name: reference.to_string(),
        })
    }
}

/// Check that every declared plugin has a collaborator to run it
pub fn check_plugins_bound(config: &Config, collaborators: &Collaborators) -> ConfigResult<()> {
    let mut unbound: Vec<&str> = config
        .plugins
        .keys()
        .filter(|name| !collaborators.contains(name))
        .map(String::as_str)
        .collect();
    unbound.sort_unstable();

    match unbound.first() {
        None => Ok(()),
        Some(name) => Err(ConfigError::Invalid(format!(
            "Plugin '{}' declares no 'exec' command and has no built-in collaborator",
            name
        ))),
    }
}
