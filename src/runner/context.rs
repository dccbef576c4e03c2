//! Execution context for task running
//!
//! State shared by every step of a run: where commands execute, the variable
//! set, the interpreter, the chain of tasks currently running and how much to
//! print.

use colored::{ColoredString, Colorize};
use std::collections::HashMap;
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::Command as StdCommand;

/// Execution context for a run
pub struct Context {
    /// Directory commands run in and guard paths resolve against
    pub working_dir: PathBuf,

    /// Variables for interpolation, exported to commands
    pub vars: HashMap<String, String>,

    /// Program and leading arguments used to run command strings
    pub interpreter: Vec<String>,

    /// Tasks currently running, outermost first
    pub task_stack: Vec<String>,

    pub verbosity: Verbosity,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Context {
    /// Context in the current directory, running commands through `sh -c`
    pub fn new() -> Self {
        Context {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            vars: HashMap::new(),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            task_stack: Vec::new(),
            verbosity: Verbosity::Normal,
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Set the interpreter; an empty list keeps the current one
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter;
        }
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Build an interpreter invocation of `script` with the variables exported
    ///
    /// Fails when the interpreter list is empty.
    pub fn shell_command(&self, script: &str) -> io::Result<StdCommand> {
        let (program, args) = self.interpreter.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no interpreter configured")
        })?;

        let mut command = StdCommand::new(program);
        command.args(args).arg(script).envs(&self.vars);
        Ok(command)
    }

    pub fn enter_task(&mut self, task_name: &str) {
        self.task_stack.push(task_name.to_string());
    }

    pub fn leave_task(&mut self) {
        self.task_stack.pop();
    }

    /// Whether `task_name` is already running further up the call chain
    pub fn is_running(&self, task_name: &str) -> bool {
        self.task_stack.iter().any(|t| t == task_name)
    }

    /// The chain from the running `task_name` back to itself
    pub fn cycle_to(&self, task_name: &str) -> Vec<String> {
        let start = self
            .task_stack
            .iter()
            .position(|t| t == task_name)
            .unwrap_or(0);
        let mut cycle = self.task_stack[start..].to_vec();
        cycle.push(task_name.to_string());
        cycle
    }

    fn emit(&self, level: Verbosity, tag: ColoredString, message: &str) {
        if self.verbosity >= level {
            eprintln!("{} {}", tag, message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn print_debug(&self, message: &str) {
        self.emit(Verbosity::Verbose, "[DEBUG]".dimmed(), message);
    }

    pub fn print_task_start(&self, task_name: &str) {
        let message = format!("Running task: {}", task_name.bold());
        self.emit(Verbosity::Normal, "[INFO]".cyan(), &message);
    }

    pub fn print_task_complete(&self, task_name: &str) {
        self.print_debug(&format!("Task completed: {}", task_name));
    }

    /// Print the label of a leaf step about to run
    pub fn print_step_run(&self, label: &str) {
        self.emit(Verbosity::Normal, "[RUN]".green(), label);
    }

    pub fn print_step_skip(&self, label: &str, reason: &str) {
        self.print_debug(&format!("Skipping '{}': {}", label, reason));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
