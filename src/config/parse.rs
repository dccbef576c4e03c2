//! Configuration file parsing and discovery

use crate::config::types::{Config, Task};
use crate::error::{ChurnError, ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["churn.yml", "churn.yaml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path
pub fn parse_config_file(path: &Path) -> Result<Config, ChurnError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read file: {}", e)))?;

    parse_config(&contents, Some(path))
}

/// Parse configuration from a string
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Config, ChurnError> {
    let mut config: Config = serde_yaml::from_str(yaml)?;

    if let Some(base_path) = config_path {
        process_includes(&mut config, base_path)?;
    }

    Ok(config)
}

/// Replace tasks carrying an `include` directive with the included definition
fn process_includes(config: &mut Config, config_path: &Path) -> ConfigResult<()> {
    let base_dir = config_dir(config_path);

    for task in config.tasks.values_mut() {
        if let Some(include_path) = task.include.clone() {
            *task = load_included_task(&base_dir.join(include_path))?;
        }
    }

    Ok(())
}

/// Load a task from an included file
fn load_included_task(path: &Path) -> ConfigResult<Task> {
    let include_error = |error: String| ConfigError::IncludeFile {
        path: path.to_path_buf(),
        error,
    };

    let contents = fs::read_to_string(path).map_err(|e| include_error(e.to_string()))?;
    let task: Task = serde_yaml::from_str(&contents).map_err(|e| include_error(e.to_string()))?;

    if task.include.is_some() {
        return Err(include_error("included tasks cannot include further files".to_string()));
    }

    Ok(task)
}

/// Parse configuration with automatic file discovery
pub fn parse_config_auto() -> Result<(Config, PathBuf), ChurnError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}

/// Collect the interpolation variables for a project
///
/// Values from the `env-file` come first; `vars` entries override them.
pub fn load_vars(config: &Config, config_path: Option<&Path>) -> ConfigResult<HashMap<String, String>> {
    let mut vars = HashMap::new();

    if let Some(env_file) = &config.env_file {
        let path = match config_path {
            Some(p) => config_dir(p).join(env_file),
            None => PathBuf::from(env_file),
        };
        let env_error = |error: String| ConfigError::EnvFile {
            path: path.clone(),
            error,
        };

        for item in dotenvy::from_path_iter(&path).map_err(|e| env_error(e.to_string()))? {
            let (key, value) = item.map_err(|e| env_error(e.to_string()))?;
            vars.insert(key, value);
        }
    }

    vars.extend(config.vars.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(vars)
}

/// Directory holding a config file
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Step;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
tasks:
  write_pages:
    usage: Copy pages
    steps: copy:pages
"#;
        let config = parse_config(yaml, None).unwrap();
        assert_eq!(config.tasks.len(), 1);
        assert!(config.tasks.contains_key("write_pages"));
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("churn.yml");

        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("churn.yaml");
        let sub_dir = temp_dir.path().join("src").join("momma");

        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(&config_path, "tasks: {}\n").unwrap();

        let found = find_config_file_from(sub_dir).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_config_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_config_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_parse_config_with_name_default_and_interpreter() {
        let yaml = r#"
name: strawberry
usage: Sample application
default: build
interpreter:
  - bash
  - -c
tasks:
  build:
    steps: clean:build
"#;
        let config = parse_config(yaml, None).unwrap();
        assert_eq!(config.name, Some("strawberry".to_string()));
        assert_eq!(config.default_task(), "build");
        assert_eq!(
            config.interpreter,
            Some(vec!["bash".to_string(), "-c".to_string()])
        );
    }

    #[test]
    fn test_include_replaces_task() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("tasks")).unwrap();
        fs::write(
            temp_dir.path().join("tasks").join("test.yml"),
            "usage: Run the unit tests\nsteps:\n  - karma\n",
        )
        .unwrap();

        let config_path = temp_dir.path().join("churn.yml");
        fs::write(
            &config_path,
            "tasks:\n  test:\n    include: tasks/test.yml\n",
        )
        .unwrap();

        let config = parse_config_file(&config_path).unwrap();
        let task = config.tasks.get("test").unwrap();
        assert_eq!(task.usage.as_deref(), Some("Run the unit tests"));
        assert!(matches!(&task.steps[0], Step::Reference(r) if r == "karma"));
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("churn.yml");
        fs::write(&config_path, "tasks:\n  test:\n    include: nope.yml\n").unwrap();

        let result = parse_config_file(&config_path);
        assert!(matches!(
            result,
            Err(ChurnError::Config(ConfigError::IncludeFile { .. }))
        ));
    }

    #[test]
    fn test_load_vars_env_file_then_vars() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".env"),
            "BUILD_DIR=out\nBROWSER=PhantomJS\n",
        )
        .unwrap();
        let config_path = temp_dir.path().join("churn.yml");

        let yaml = r#"
env-file: .env
vars:
  BUILD_DIR: build
"#;
        let config = parse_config(yaml, None).unwrap();
        let vars = load_vars(&config, Some(config_path.as_path())).unwrap();

        assert_eq!(vars.get("BUILD_DIR").map(String::as_str), Some("build"));
        assert_eq!(vars.get("BROWSER").map(String::as_str), Some("PhantomJS"));
    }

    #[test]
    fn test_load_vars_missing_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("churn.yml");
        let config = parse_config("env-file: missing.env\n", None).unwrap();

        let result = load_vars(&config, Some(config_path.as_path()));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }
}
