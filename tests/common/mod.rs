//! Common test utilities

#![allow(dead_code)]

use churn::error::CollaboratorError;
use churn::runner::{Collaborator, Context, Invocation};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Create a temporary directory with a churn.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("churn.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with a subdirectory to run from
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("churn.yml");
    let sub_dir = temp_dir.path().join("subdir");

    fs::write(&config_path, content).unwrap();
    fs::create_dir(&sub_dir).unwrap();

    (temp_dir, config_path, sub_dir)
}

/// Write a file below `root`, creating parent directories
pub fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "").unwrap();
}

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub plugin: String,
    pub target: Option<String>,
    pub config: serde_yaml::Value,
}

impl Call {
    pub fn label(&self) -> String {
        match &self.target {
            Some(target) => format!("{}:{}", self.plugin, target),
            None => self.plugin.clone(),
        }
    }
}

pub type Calls = Rc<RefCell<Vec<Call>>>;

/// In-process collaborator recording every invocation
///
/// Invocations whose label appears in `failing` report a failed command.
pub struct MockCollaborator {
    pub calls: Calls,
    pub failing: Vec<String>,
}

impl MockCollaborator {
    pub fn new(calls: &Calls) -> Self {
        MockCollaborator {
            calls: Rc::clone(calls),
            failing: Vec::new(),
        }
    }

    pub fn failing(mut self, label: &str) -> Self {
        self.failing.push(label.to_string());
        self
    }
}

impl Collaborator for MockCollaborator {
    fn invoke(&self, invocation: &Invocation<'_>, _ctx: &Context) -> Result<(), CollaboratorError> {
        let call = Call {
            plugin: invocation.plugin.to_string(),
            target: invocation.target.map(str::to_string),
            config: invocation.config.clone(),
        };
        let fails = self.failing.contains(&call.label());
        self.calls.borrow_mut().push(call);

        if fails {
            Err(CollaboratorError::CommandFailed(Some(1)))
        } else {
            Ok(())
        }
    }
}

/// Labels of recorded calls, in order
pub fn labels(calls: &Calls) -> Vec<String> {
    calls.borrow().iter().map(Call::label).collect()
}
