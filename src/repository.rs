//! Persistence seam for the engine.
//!
//! The engine mutates in-memory state and writes accepted changes back
//! through this repository-shaped contract: keyed saves, loads, and
//! deletes, nothing query-shaped. Implementations can sit on anything that
//! stores entities by key; [`MemoryStore`] is the bundled single-process
//! backing used by tests and embedding callers.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::assignments::Assignment;
use crate::models::{AssignmentId, DependencyEdge, Project, ProjectId, Task, TaskId, User, UserId};

/// Errors surfaced by storage implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found in store: {0}")]
    NotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Everything persisted for one project's graph.
#[derive(Clone, Debug)]
pub struct ProjectSnapshot {
    pub project: Project,
    pub tasks: Vec<Task>,
    pub edges: Vec<DependencyEdge>,
}

/// Storage contract the engine drives.
///
/// Saves are upserts and deletes are idempotent, so the engine can replay
/// an operation after a transient failure without special cases. The
/// engine never calls into the store while holding one of its locks.
pub trait ProjectStore: Send + Sync {
    /// Register or update a project's own record.
    fn save_project(&self, project: &Project) -> Result<(), StoreError>;

    /// Load a project with its full task and edge set.
    fn load_project(&self, id: ProjectId) -> Result<ProjectSnapshot, StoreError>;

    /// Load every assignment record belonging to a project.
    fn load_assignments(&self, project_id: ProjectId) -> Result<Vec<Assignment>, StoreError>;

    /// Load the user directory.
    fn load_users(&self) -> Result<Vec<User>, StoreError>;

    fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    fn delete_task(&self, project_id: ProjectId, id: TaskId) -> Result<(), StoreError>;

    fn save_edge(&self, project_id: ProjectId, edge: DependencyEdge) -> Result<(), StoreError>;

    fn delete_edge(&self, project_id: ProjectId, edge: DependencyEdge) -> Result<(), StoreError>;

    fn save_assignment(
        &self,
        project_id: ProjectId,
        assignment: &Assignment,
    ) -> Result<(), StoreError>;

    fn delete_assignment(&self, project_id: ProjectId, id: AssignmentId) -> Result<(), StoreError>;

    fn save_user(&self, user: &User) -> Result<(), StoreError>;

    fn delete_user(&self, id: UserId) -> Result<(), StoreError>;
}

/// In-memory store keyed the same way a relational backing would be.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    projects: FxHashMap<ProjectId, Project>,
    tasks: FxHashMap<(ProjectId, TaskId), Task>,
    edges: FxHashMap<ProjectId, FxHashSet<DependencyEdge>>,
    assignments: FxHashMap<(ProjectId, AssignmentId), Assignment>,
    users: FxHashMap<UserId, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl ProjectStore for MemoryStore {
    fn save_project(&self, project: &Project) -> Result<(), StoreError> {
        self.lock()?.projects.insert(project.id, project.clone());
        Ok(())
    }

    fn load_project(&self, id: ProjectId) -> Result<ProjectSnapshot, StoreError> {
        let inner = self.lock()?;
        let project = inner
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|((project_id, _), _)| *project_id == id)
            .map(|(_, task)| task.clone())
            .collect();
        tasks.sort_by_key(|task| task.id);
        let mut edges: Vec<DependencyEdge> = inner
            .edges
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        edges.sort_by_key(|edge| (edge.task, edge.depends_on));
        Ok(ProjectSnapshot { project, tasks, edges })
    }

    fn load_assignments(&self, project_id: ProjectId) -> Result<Vec<Assignment>, StoreError> {
        let inner = self.lock()?;
        let mut records: Vec<Assignment> = inner
            .assignments
            .iter()
            .filter(|((pid, _), _)| *pid == project_id)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        self.lock()?
            .tasks
            .insert((task.project_id, task.id), task.clone());
        Ok(())
    }

    fn delete_task(&self, project_id: ProjectId, id: TaskId) -> Result<(), StoreError> {
        self.lock()?.tasks.remove(&(project_id, id));
        Ok(())
    }

    fn save_edge(&self, project_id: ProjectId, edge: DependencyEdge) -> Result<(), StoreError> {
        self.lock()?.edges.entry(project_id).or_default().insert(edge);
        Ok(())
    }

    fn delete_edge(&self, project_id: ProjectId, edge: DependencyEdge) -> Result<(), StoreError> {
        if let Some(set) = self.lock()?.edges.get_mut(&project_id) {
            set.remove(&edge);
        }
        Ok(())
    }

    fn save_assignment(
        &self,
        project_id: ProjectId,
        assignment: &Assignment,
    ) -> Result<(), StoreError> {
        self.lock()?
            .assignments
            .insert((project_id, assignment.id), assignment.clone());
        Ok(())
    }

    fn delete_assignment(&self, project_id: ProjectId, id: AssignmentId) -> Result<(), StoreError> {
        self.lock()?.assignments.remove(&(project_id, id));
        Ok(())
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.lock()?.users.insert(user.id, user.clone());
        Ok(())
    }

    fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        self.lock()?.users.remove(&id);
        Ok(())
    }
}
