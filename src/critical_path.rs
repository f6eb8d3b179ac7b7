//! Critical path computation over a project graph.
//!
//! Classic two-pass CPM: a forward pass over the topological order sets
//! earliest start/finish times, a backward pass over the reverse order sets
//! latest start/finish times, and slack falls out as the difference. Every
//! call recomputes the whole project from scratch; no timing state is
//! cached between calls.
//!
//! The project-level confidence interval sums task variance along the one
//! reported critical chain, treating task durations as independent. This is
//! the textbook PERT simplification: when several near-critical paths run
//! in parallel the interval understates the true risk, and callers should
//! read it as a lower bound on uncertainty.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::DependencyGraph;
use crate::models::TaskId;

/// Criticality comparisons tolerate this much floating-point drift.
pub const SLACK_EPSILON: f64 = 1e-9;

/// Errors for schedule computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpmError {
    /// The project has no tasks, so no schedule exists.
    EmptyProject,
    /// The graph held a cycle despite the insertion guard.
    Cycle,
}

impl std::fmt::Display for CpmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpmError::EmptyProject => write!(f, "cannot schedule an empty project"),
            CpmError::Cycle => write!(f, "dependency graph contains a cycle"),
        }
    }
}

impl std::error::Error for CpmError {}

/// Timing data for a single task from the two passes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TaskTiming {
    pub earliest_start: f64,
    pub earliest_finish: f64,
    pub latest_start: f64,
    pub latest_finish: f64,
    /// How far the task can slip without moving the project finish.
    pub slack: f64,
}

impl TaskTiming {
    /// Zero slack (within epsilon) marks a task as schedule-critical.
    pub fn is_critical(&self) -> bool {
        self.slack.abs() < SLACK_EPSILON
    }
}

/// The full schedule picture for one project.
#[derive(Clone, Debug)]
pub struct ScheduleReport {
    /// Timing for every task in the project.
    pub timings: FxHashMap<TaskId, TaskTiming>,
    /// Every task with zero slack. Not necessarily a single path when
    /// parallel chains tie.
    pub critical_tasks: FxHashSet<TaskId>,
    /// One concrete source-to-terminal chain of critical tasks, for
    /// display. Branch ties resolve to the smallest task id.
    pub critical_chain: Vec<TaskId>,
    /// Expected project duration in hours: the longest-path length.
    pub project_duration: f64,
    /// Summed task variance along the critical chain.
    pub variance: f64,
    /// One-sigma spread of the duration: sqrt of the chain variance.
    pub std_dev: f64,
    /// 68% confidence bounds on the project duration.
    pub ci68: (f64, f64),
    /// 95% confidence bounds on the project duration.
    pub ci95: (f64, f64),
}

impl ScheduleReport {
    pub fn timing(&self, id: TaskId) -> Option<&TaskTiming> {
        self.timings.get(&id)
    }

    pub fn is_critical(&self, id: TaskId) -> bool {
        self.critical_tasks.contains(&id)
    }
}

/// Run the two-pass critical path method over a whole project graph.
pub fn compute_schedule(graph: &DependencyGraph) -> Result<ScheduleReport, CpmError> {
    if graph.is_empty() {
        eprintln!("schedule requested for project {} with no tasks", graph.project_id());
        return Err(CpmError::EmptyProject);
    }
    let order = graph.topological_order().map_err(|err| {
        // The insertion guard keeps the graph acyclic, so reaching this
        // branch means shared state was corrupted. Always worth a report.
        eprintln!("schedule aborted, graph consistency breach: {}", err);
        CpmError::Cycle
    })?;

    // Forward pass: earliest start is the latest finish among dependencies.
    let mut timings: FxHashMap<TaskId, TaskTiming> =
        FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
    for &id in &order {
        let Some(task) = graph.get(id) else { continue };
        let mut earliest_start: f64 = 0.0;
        for dep in graph.dependencies_of(id) {
            if let Some(timing) = timings.get(&dep) {
                if timing.earliest_finish > earliest_start {
                    earliest_start = timing.earliest_finish;
                }
            }
        }
        let expected = task.estimate.expected();
        timings.insert(
            id,
            TaskTiming {
                earliest_start,
                earliest_finish: earliest_start + expected,
                ..Default::default()
            },
        );
    }

    // Project duration is the latest finish among terminal tasks.
    let mut project_duration: f64 = 0.0;
    for &id in &order {
        if graph.dependents_of(id).next().is_none() {
            if let Some(timing) = timings.get(&id) {
                if timing.earliest_finish > project_duration {
                    project_duration = timing.earliest_finish;
                }
            }
        }
    }

    // Backward pass: latest finish is the earliest latest-start among
    // dependents; terminals anchor at the project duration.
    for &id in order.iter().rev() {
        let Some(task) = graph.get(id) else { continue };
        let mut latest_finish = f64::MAX;
        for dependent in graph.dependents_of(id) {
            if let Some(timing) = timings.get(&dependent) {
                if timing.latest_start < latest_finish {
                    latest_finish = timing.latest_start;
                }
            }
        }
        if latest_finish == f64::MAX {
            latest_finish = project_duration;
        }
        let expected = task.estimate.expected();
        if let Some(timing) = timings.get_mut(&id) {
            timing.latest_finish = latest_finish;
            timing.latest_start = latest_finish - expected;
            timing.slack = timing.latest_start - timing.earliest_start;
        }
    }

    let critical_tasks: FxHashSet<TaskId> = timings
        .iter()
        .filter(|(_, timing)| timing.is_critical())
        .map(|(&id, _)| id)
        .collect();

    let critical_chain = walk_critical_chain(graph, &timings, &critical_tasks);

    let variance: f64 = critical_chain
        .iter()
        .filter_map(|&id| graph.get(id))
        .map(|task| task.estimate.variance())
        .sum();
    let std_dev = variance.sqrt();

    Ok(ScheduleReport {
        timings,
        critical_tasks,
        critical_chain,
        project_duration,
        variance,
        std_dev,
        ci68: (project_duration - std_dev, project_duration + std_dev),
        ci95: (project_duration - 2.0 * std_dev, project_duration + 2.0 * std_dev),
    })
}

/// Extract one concrete critical chain from source to terminal.
///
/// Starts at the smallest-id critical task without dependencies, then
/// repeatedly steps to the smallest-id critical dependent whose earliest
/// start butts against the current task's earliest finish. Every critical
/// non-terminal task has such a dependent, so the walk always reaches a
/// terminal.
fn walk_critical_chain(
    graph: &DependencyGraph,
    timings: &FxHashMap<TaskId, TaskTiming>,
    critical_tasks: &FxHashSet<TaskId>,
) -> Vec<TaskId> {
    let mut start: Option<TaskId> = None;
    for &id in critical_tasks {
        if graph.dependencies_of(id).next().is_none() && start.map_or(true, |s| id < s) {
            start = Some(id);
        }
    }
    let Some(mut current) = start else {
        return Vec::new();
    };

    let mut chain = vec![current];
    while let Some(current_timing) = timings.get(&current) {
        let mut next: Option<TaskId> = None;
        for dependent in graph.dependents_of(current) {
            if !critical_tasks.contains(&dependent) {
                continue;
            }
            let Some(timing) = timings.get(&dependent) else { continue };
            if (timing.earliest_start - current_timing.earliest_finish).abs() < SLACK_EPSILON
                && next.map_or(true, |n| dependent < n)
            {
                next = Some(dependent);
            }
        }
        match next {
            Some(n) => {
                chain.push(n);
                current = n;
            }
            None => break,
        }
    }
    chain
}
