//! Main CLI application

use crate::config::{
    check_plugins_bound, config_dir, load_vars, parse_config_auto, parse_config_file,
    validate_config, Config,
};
use crate::error::ChurnError;
use crate::runner::{Collaborators, Context, Executor, TaskRegistry, Verbosity};
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use colored::Colorize;
use std::io;
use std::path::PathBuf;

const BIN_NAME: &str = env!("CARGO_PKG_NAME");

/// CLI application
pub struct App {
    /// Parsed configuration
    config: Config,
    /// Config file path
    config_path: PathBuf,
    registry: TaskRegistry,
    collaborators: Collaborators,
}

impl App {
    /// Create a new app from the discovered project file
    pub fn new() -> Result<Self, ChurnError> {
        let (config, config_path) = parse_config_auto()?;
        Self::from_config(config, config_path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self, ChurnError> {
        let config = parse_config_file(&path)?;
        Self::from_config(config, path)
    }

    /// Validate a parsed configuration and build its tasks and collaborators
    pub fn from_config(config: Config, config_path: PathBuf) -> Result<Self, ChurnError> {
        validate_config(&config)?;

        let registry = TaskRegistry::from_config(&config)?;
        registry.check_acyclic()?;

        let collaborators = Collaborators::from_config(&config)?;
        check_plugins_bound(&config, &collaborators)?;

        Ok(App {
            config,
            config_path,
            registry,
            collaborators,
        })
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run the application with the given command line
    pub fn run_from(self, args: Vec<String>) -> Result<(), ChurnError> {
        let mut command = build_command(Some(&self.config));
        let matches = command.clone().get_matches_from(args);

        if let Some(shell) = matches.get_one::<Shell>("completions").copied() {
            print_completions(shell, &mut command);
            return Ok(());
        }

        if matches.get_flag("list") {
            self.print_tasks();
            return Ok(());
        }

        let tasks: Vec<String> = matches
            .get_many::<String>("tasks")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        self.run_tasks(&tasks, get_verbosity(&matches))
    }

    /// Run each named task in order, or the default task when none is named
    pub fn run_tasks(&self, tasks: &[String], verbosity: Verbosity) -> Result<(), ChurnError> {
        let vars = load_vars(&self.config, Some(self.config_path.as_path()))?;

        let mut ctx = Context::new()
            .with_working_dir(config_dir(&self.config_path))
            .with_vars(vars)
            .with_verbosity(verbosity);

        if let Some(interpreter) = &self.config.interpreter {
            ctx = ctx.with_interpreter(interpreter.clone());
        }

        let default = [self.config.default_task().to_string()];
        let names = if tasks.is_empty() { &default[..] } else { tasks };

        let executor = Executor::new(&self.registry, &self.collaborators);
        for name in names {
            let report = executor.run(name, &mut ctx)?;
            ctx.print_debug(&format!(
                "{}: {} step(s) completed, {} skipped",
                name,
                report.completed().count(),
                report.skipped().count()
            ));
        }

        Ok(())
    }

    /// Print public tasks with their usage lines
    fn print_tasks(&self) {
        for (name, usage) in public_tasks(&self.config) {
            match usage {
                Some(usage) => println!("{:<20} {}", name.bold(), usage),
                None => println!("{}", name.bold()),
            }
        }
    }
}

/// Public task names with usage, sorted by name
fn public_tasks(config: &Config) -> Vec<(&str, Option<&str>)> {
    let mut tasks: Vec<(&str, Option<&str>)> = config
        .tasks
        .iter()
        .filter(|(_, task)| !task.private)
        .map(|(name, task)| (name.as_str(), task.usage.as_deref()))
        .collect();
    tasks.sort_unstable_by_key(|(name, _)| *name);
    tasks
}

/// Build the clap command, listing the project's tasks in help when known
fn build_command(config: Option<&Config>) -> Command {
    let name = config
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| BIN_NAME.to_string());
    let about = config
        .and_then(|c| c.usage.clone())
        .unwrap_or_else(|| "A YAML-driven task orchestrator".to_string());

    let mut cmd = Command::new(name)
        .bin_name(BIN_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to churn.yml project file"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List available tasks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .help("Print a shell completion script")
                .value_parser(clap::value_parser!(Shell)),
        )
        .arg(
            Arg::new("tasks")
                .value_name("TASK")
                .help("Tasks to run (defaults to the project's default task)")
                .num_args(0..),
        );

    if let Some(config) = config {
        let tasks = public_tasks(config);
        if !tasks.is_empty() {
            let mut help = String::from("Tasks:\n");
            for (name, usage) in tasks {
                help.push_str(&format!("  {:<20} {}\n", name, usage.unwrap_or_default()));
            }
            cmd = cmd.after_help(help);
        }
    }

    cmd
}

fn print_completions(shell: Shell, cmd: &mut Command) {
    clap_complete::generate(shell, cmd, BIN_NAME, &mut io::stdout());
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<(), ChurnError> {
    run_from(std::env::args().collect())
}

/// Run the CLI application with provided arguments
pub fn run_from(args: Vec<String>) -> Result<(), ChurnError> {
    // The project file decides which tasks exist, so it is loaded before clap parses
    let loaded = match extract_file_arg(&args) {
        Some(path) => App::with_config_file(path),
        None => App::new(),
    };

    match loaded {
        Ok(app) => app.run_from(args),
        Err(err) if needs_no_project(&args) => run_without_project(args, err),
        Err(err) => Err(err),
    }
}

/// Help, version and completions work outside a project
fn needs_no_project(args: &[String]) -> bool {
    args.iter().skip(1).any(|arg| {
        matches!(arg.as_str(), "-h" | "--help" | "-V" | "--version")
            || arg == "--completions"
            || arg.starts_with("--completions=")
    })
}

fn run_without_project(args: Vec<String>, err: ChurnError) -> Result<(), ChurnError> {
    let mut command = build_command(None);
    let matches = command.clone().get_matches_from(args);

    match matches.get_one::<Shell>("completions").copied() {
        Some(shell) => {
            print_completions(shell, &mut command);
            Ok(())
        }
        None => Err(err),
    }
}

/// Extract --file argument before clap parsing
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if (args[i] == "--file" || args[i] == "-f") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        if let Some(path) = args[i].strip_prefix("--file=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
