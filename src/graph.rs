//! Per-project task dependency graph.
//!
//! Owns the task nodes and the directed depends-on edge set for a single
//! project, and keeps the edge set acyclic at every observable state: a
//! cycle is rejected at insertion time, before the edge lands. Mutations
//! are all-or-nothing; a rejected operation leaves the graph exactly as it
//! was.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::estimation::EstimateError;
use crate::models::{DependencyEdge, ProjectId, Task, TaskId};

/// Errors for graph structure mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("task {0} already exists in the project")]
    DuplicateTask(TaskId),
    #[error("task {0} does not exist in the project")]
    UnknownTask(TaskId),
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),
    #[error("dependency of task {task} on task {depends_on} would close a cycle")]
    Cycle { task: TaskId, depends_on: TaskId },
    #[error("cycle detected in a graph that should be acyclic")]
    CycleDetected,
    #[error("task {task} still has {count} dependent task(s)")]
    HasDependents { task: TaskId, count: usize },
    #[error("invalid estimate for task {task}: {source}")]
    InvalidEstimate { task: TaskId, source: EstimateError },
}

/// Dependency graph for one project's tasks.
///
/// `deps` maps a task to the tasks it waits on; `dependents` is the reverse
/// adjacency, kept in lockstep so both directions are O(1) to walk. Every
/// task present in `tasks` has an entry in both edge maps, possibly empty.
#[derive(Clone, Debug, PartialEq)]
pub struct DependencyGraph {
    project_id: ProjectId,
    tasks: FxHashMap<TaskId, Task>,
    deps: FxHashMap<TaskId, FxHashSet<TaskId>>,
    dependents: FxHashMap<TaskId, FxHashSet<TaskId>>,
}

impl DependencyGraph {
    /// Create an empty graph for a project.
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            tasks: FxHashMap::default(),
            deps: FxHashMap::default(),
            dependents: FxHashMap::default(),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// All tasks, in arbitrary order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Direct dependencies of a task: what it waits on.
    ///
    /// Unknown ids yield an empty iterator.
    pub fn dependencies_of(&self, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.deps.get(&id).into_iter().flatten().copied()
    }

    /// Direct dependents of a task: what waits on it.
    pub fn dependents_of(&self, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.dependents.get(&id).into_iter().flatten().copied()
    }

    /// Every edge in the graph as (task, depends_on) pairs.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.deps.iter().flat_map(|(&task, set)| {
            set.iter().map(move |&depends_on| DependencyEdge { task, depends_on })
        })
    }

    /// Insert a new task node with no edges.
    ///
    /// The estimate triple is validated here so an invalid triple never
    /// enters the graph.
    pub fn add_task(&mut self, task: Task) -> Result<(), GraphError> {
        task.estimate
            .validate()
            .map_err(|source| GraphError::InvalidEstimate { task: task.id, source })?;
        if self.tasks.contains_key(&task.id) {
            return Err(GraphError::DuplicateTask(task.id));
        }
        self.deps.insert(task.id, FxHashSet::default());
        self.dependents.insert(task.id, FxHashSet::default());
        self.tasks.insert(task.id, task);
        Ok(())
    }

    /// Replace an existing task's attributes; its edges are untouched.
    pub fn update_task(&mut self, task: Task) -> Result<(), GraphError> {
        task.estimate
            .validate()
            .map_err(|source| GraphError::InvalidEstimate { task: task.id, source })?;
        if !self.tasks.contains_key(&task.id) {
            return Err(GraphError::UnknownTask(task.id));
        }
        self.tasks.insert(task.id, task);
        Ok(())
    }

    /// Add a depends-on edge: `task` cannot start before `depends_on`
    /// finishes.
    ///
    /// Re-adding an existing edge is a no-op. An edge that would close a
    /// cycle is rejected before insertion, so the graph never holds a cycle
    /// even transiently.
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) -> Result<(), GraphError> {
        if !self.tasks.contains_key(&task) {
            return Err(GraphError::UnknownTask(task));
        }
        if !self.tasks.contains_key(&depends_on) {
            return Err(GraphError::UnknownTask(depends_on));
        }
        if task == depends_on {
            return Err(GraphError::SelfDependency(task));
        }
        if let Some(existing) = self.deps.get(&task) {
            if existing.contains(&depends_on) {
                return Ok(());
            }
        }
        // The new edge closes a cycle iff `task` is already reachable from
        // `depends_on` along depends-on edges.
        if self.reaches(depends_on, task) {
            return Err(GraphError::Cycle { task, depends_on });
        }
        self.deps.entry(task).or_default().insert(depends_on);
        self.dependents.entry(depends_on).or_default().insert(task);
        Ok(())
    }

    /// Remove a depends-on edge. Removing an absent edge is a no-op.
    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        if let Some(set) = self.deps.get_mut(&task) {
            set.remove(&depends_on);
        }
        if let Some(set) = self.dependents.get_mut(&depends_on) {
            set.remove(&task);
        }
    }

    /// Remove a task that nothing depends on.
    ///
    /// The task's own outgoing dependency edges go with it; incoming edges
    /// block the removal so no dangling references can form.
    pub fn remove_task(&mut self, id: TaskId) -> Result<Task, GraphError> {
        match self.dependents.get(&id) {
            None => return Err(GraphError::UnknownTask(id)),
            Some(set) if !set.is_empty() => {
                return Err(GraphError::HasDependents { task: id, count: set.len() });
            }
            Some(_) => {}
        }
        if let Some(deps) = self.deps.remove(&id) {
            for dep in deps {
                if let Some(set) = self.dependents.get_mut(&dep) {
                    set.remove(&id);
                }
            }
        }
        self.dependents.remove(&id);
        self.tasks.remove(&id).ok_or(GraphError::UnknownTask(id))
    }

    /// A linear extension of the depends-on partial order.
    ///
    /// Kahn's algorithm with a min-heap of ready tasks, so ties release in
    /// ascending id order and the result is deterministic for a given edge
    /// set. [`GraphError::CycleDetected`] here means the insertion guard was
    /// bypassed; callers treat it as a consistency breach, not user error.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        let mut in_degree: FxHashMap<TaskId, usize> =
            FxHashMap::with_capacity_and_hasher(self.tasks.len(), Default::default());
        for &id in self.tasks.keys() {
            in_degree.insert(id, self.deps.get(&id).map_or(0, |set| set.len()));
        }

        let mut ready: BinaryHeap<Reverse<TaskId>> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            if let Some(dependents) = self.dependents.get(&id) {
                for &dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(Reverse(dependent));
                        }
                    }
                }
            }
        }

        if order.len() != self.tasks.len() {
            return Err(GraphError::CycleDetected);
        }
        Ok(order)
    }

    /// Whether `to` is reachable from `from` along depends-on edges.
    fn reaches(&self, from: TaskId, to: TaskId) -> bool {
        let mut seen: FxHashSet<TaskId> = FxHashSet::default();
        let mut queue: VecDeque<TaskId> = VecDeque::new();
        queue.push_back(from);
        while let Some(id) = queue.pop_front() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(deps) = self.deps.get(&id) {
                for &dep in deps {
                    if !seen.contains(&dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }
        false
    }
}
