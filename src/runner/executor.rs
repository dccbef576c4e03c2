//! Task execution
//!
//! The executor walks a task's steps in declared order, depth-first through
//! task references, and drives every leaf step to completion before starting
//! the next one. The first failure ends the whole run; nothing already done is
//! rolled back.

use crate::error::{CollaboratorError, ExecutionError, ExecutionResult};
use crate::runner::{
    Collaborator, Collaborators, Context, Guard, GuardOutcome, Invocation, LeafStep, Step, StepId,
    TaskRegistry,
};

/// What happened to a leaf step during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    /// The guard blocked the step; carries the reason
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: StepId,
    pub status: StepStatus,
}

/// Record of a successful run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<StepOutcome>,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &StepId> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Completed)
            .map(|o| &o.step)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &StepId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Skipped(_)))
            .map(|o| &o.step)
    }
}

/// Drives tasks from a registry through a set of collaborators
pub struct Executor<'a> {
    registry: &'a TaskRegistry,
    collaborators: &'a Collaborators,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a TaskRegistry, collaborators: &'a Collaborators) -> Self {
        Executor {
            registry,
            collaborators,
        }
    }

    /// Run a task and everything it references
    ///
    /// Unknown and cyclic task references anywhere below `task_name` are
    /// reported before any step runs.
    pub fn run(&self, task_name: &str, ctx: &mut Context) -> ExecutionResult<RunReport> {
        self.registry.resolve(task_name)?;
        self.registry.check_acyclic_from(task_name)?;

        let mut report = RunReport::default();
        let result = self.run_task(task_name, ctx, &mut report);

        // A failed run leaves its frames behind
        ctx.task_stack.clear();

        result.map(|()| report)
    }

    fn run_task(
        &self,
        task_name: &str,
        ctx: &mut Context,
        report: &mut RunReport,
    ) -> ExecutionResult<()> {
        if ctx.is_running(task_name) {
            return Err(ExecutionError::CyclicTask(ctx.cycle_to(task_name)));
        }

        let task = self.registry.resolve(task_name)?;

        ctx.enter_task(&task.name);
        ctx.print_task_start(&task.name);

        let mut index = 0;
        self.run_steps(&task.name, &task.steps, &mut index, ctx, report)?;

        ctx.leave_task();
        ctx.print_task_complete(&task.name);

        Ok(())
    }

    /// Run `steps` in order; `index` numbers leaves and task references across groups
    fn run_steps(
        &self,
        task_name: &str,
        steps: &[Step],
        index: &mut usize,
        ctx: &mut Context,
        report: &mut RunReport,
    ) -> ExecutionResult<()> {
        for step in steps {
            match step {
                Step::Task(subtask) => {
                    *index += 1;
                    self.run_task(subtask, ctx, report)?;
                }
                Step::Leaf(leaf) => {
                    let id = StepId::new(task_name, *index, leaf.label.as_str());
                    *index += 1;
                    let status = self.run_leaf(leaf, &id, ctx)?;
                    report.outcomes.push(StepOutcome { step: id, status });
                }
                Step::Group { guard, steps } => {
                    let id = StepId::new(task_name, *index, step.label());
                    match evaluate_guard(guard, &id, ctx)? {
                        None => self.run_steps(task_name, steps, index, ctx, report)?,
                        Some(reason) => {
                            ctx.print_step_skip(&id.label, &reason);
                            skip_steps(task_name, steps, index, &reason, report);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn run_leaf(&self, leaf: &LeafStep, id: &StepId, ctx: &Context) -> ExecutionResult<StepStatus> {
        if let Some(guard) = &leaf.guard {
            if let Some(reason) = evaluate_guard(guard, id, ctx)? {
                ctx.print_step_skip(&leaf.label, &reason);
                return Ok(StepStatus::Skipped(reason));
            }
        }

        let collaborator = self.collaborators.get(&leaf.plugin).ok_or_else(|| {
            ExecutionError::Collaborator {
                step: id.clone(),
                source: CollaboratorError::Unavailable(leaf.plugin.clone()),
            }
        })?;

        if !leaf.quiet {
            ctx.print_step_run(&leaf.label);
        }

        let invocation = Invocation {
            plugin: &leaf.plugin,
            target: leaf.target.as_deref(),
            config: &leaf.config,
        };
        collaborator
            .invoke(&invocation, ctx)
            .map_err(|source| ExecutionError::Collaborator {
                step: id.clone(),
                source,
            })?;

        Ok(StepStatus::Completed)
    }
}

/// Evaluate a guard for the step `id`; `Some(reason)` when it must be skipped
pub fn evaluate_guard(
    guard: &Guard,
    id: &StepId,
    ctx: &Context,
) -> ExecutionResult<Option<String>> {
    match guard.evaluate(ctx) {
        Ok(GuardOutcome::Pass) => Ok(None),
        Ok(GuardOutcome::Blocked(reason)) => Ok(Some(reason)),
        Err(source) => Err(ExecutionError::GuardEvaluation {
            step: id.clone(),
            source,
        }),
    }
}

/// Record every leaf under a blocked group as skipped
fn skip_steps(
    task_name: &str,
    steps: &[Step],
    index: &mut usize,
    reason: &str,
    report: &mut RunReport,
) {
    for step in steps {
        match step {
            Step::Task(_) => *index += 1,
            Step::Leaf(leaf) => {
                report.outcomes.push(StepOutcome {
                    step: StepId::new(task_name, *index, leaf.label.as_str()),
                    status: StepStatus::Skipped(reason.to_string()),
                });
                *index += 1;
            }
            Step::Group { steps, .. } => skip_steps(task_name, steps, index, reason, report),
        }
    }
}
