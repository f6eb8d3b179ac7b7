//! Per-project engine facade.
//!
//! Wires the dependency graph, the assignment board, and the user
//! directory behind lock scopes, and writes every accepted mutation back
//! through the repository. Schedules are recomputed from current state on
//! every request; nothing timing-related survives between calls.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::assignments::{AssignError, Assignment, AssignmentBoard};
use crate::config::EngineConfig;
use crate::critical_path::{compute_schedule, CpmError, ScheduleReport};
use crate::graph::{DependencyGraph, GraphError};
use crate::models::{
    AssignmentId, DependencyEdge, Project, ProjectId, Task, TaskId, TaskStatus, User, UserId,
};
use crate::repository::{ProjectStore, StoreError};
use crate::{log_changes, log_checks, log_debug};

/// Top-level error for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("graph operation failed: {0}")]
    Graph(#[from] GraphError),
    #[error("assignment operation failed: {0}")]
    Assign(#[from] AssignError),
    #[error("schedule computation failed: {0}")]
    Schedule(#[from] CpmError),
    #[error("storage operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("user {0} already exists")]
    DuplicateUser(UserId),
    #[error("user {0} does not exist")]
    UnknownUser(UserId),
    #[error("engine lock poisoned by a panicked writer")]
    LockPoisoned,
}

/// Lock-scoped engine for a single project.
///
/// One engine per project, constructed by the caller; there is no global
/// registry. Three lock scopes cover the shared state: the task graph, the
/// user directory, and the assignment board. Operations that need more
/// than one acquire them in that fixed order, so writers cannot deadlock,
/// and every store call happens after all locks are released.
pub struct ProjectEngine {
    project: Project,
    graph: RwLock<DependencyGraph>,
    board: RwLock<AssignmentBoard>,
    users: RwLock<FxHashMap<UserId, User>>,
    store: Arc<dyn ProjectStore>,
    config: EngineConfig,
}

impl ProjectEngine {
    /// Create an engine for a new, empty project and register it in the
    /// store. The user directory is hydrated from the store so assignments
    /// can reference users created elsewhere.
    pub fn new(
        project: Project,
        store: Arc<dyn ProjectStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        store.save_project(&project)?;
        let users = store
            .load_users()?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();
        let graph = DependencyGraph::new(project.id);
        Ok(Self {
            project,
            graph: RwLock::new(graph),
            board: RwLock::new(AssignmentBoard::new()),
            users: RwLock::new(users),
            store,
            config,
        })
    }

    /// Rebuild an engine from everything the store holds for a project.
    ///
    /// Loading replays tasks and edges through the normal guards, so a
    /// corrupted store surfaces as a typed error instead of a broken graph.
    pub fn load(
        project_id: ProjectId,
        store: Arc<dyn ProjectStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let snapshot = store.load_project(project_id)?;
        let mut graph = DependencyGraph::new(project_id);
        for task in snapshot.tasks {
            graph.add_task(task)?;
        }
        for edge in snapshot.edges {
            graph.add_dependency(edge.task, edge.depends_on)?;
        }
        let mut board = AssignmentBoard::new();
        for record in store.load_assignments(project_id)? {
            board.insert_loaded(record);
        }
        let users = store
            .load_users()?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();
        Ok(Self {
            project: snapshot.project,
            graph: RwLock::new(graph),
            board: RwLock::new(board),
            users: RwLock::new(users),
            store,
            config,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    // ---- task and edge mutations ----

    /// Add a task to the project.
    pub fn add_task(&self, task: Task) -> Result<(), EngineError> {
        let persisted = task.clone();
        {
            self.graph_write()?.add_task(task)?;
        }
        self.store.save_task(&persisted)?;
        log_changes!(
            self.config.verbosity,
            "task {} added to project {}",
            persisted.id,
            self.project.id
        );
        Ok(())
    }

    /// Replace a task's attributes, leaving its edges alone.
    pub fn update_task(&self, task: Task) -> Result<(), EngineError> {
        let persisted = task.clone();
        {
            self.graph_write()?.update_task(task)?;
        }
        self.store.save_task(&persisted)?;
        log_changes!(self.config.verbosity, "task {} updated", persisted.id);
        Ok(())
    }

    /// Update just the lifecycle status of a task.
    pub fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<(), EngineError> {
        let updated = {
            let mut graph = self.graph_write()?;
            let mut task = graph.get(id).cloned().ok_or(GraphError::UnknownTask(id))?;
            task.status = status;
            graph.update_task(task.clone())?;
            task
        };
        self.store.save_task(&updated)?;
        log_changes!(
            self.config.verbosity,
            "task {} status set to {:?}",
            id,
            updated.status
        );
        Ok(())
    }

    /// Add a depends-on edge between two existing tasks.
    pub fn add_dependency(&self, task: TaskId, depends_on: TaskId) -> Result<(), EngineError> {
        {
            self.graph_write()?.add_dependency(task, depends_on)?;
        }
        self.store
            .save_edge(self.project.id, DependencyEdge { task, depends_on })?;
        log_changes!(
            self.config.verbosity,
            "task {} now depends on task {}",
            task,
            depends_on
        );
        Ok(())
    }

    /// Remove a depends-on edge; removing an absent edge is a no-op.
    pub fn remove_dependency(&self, task: TaskId, depends_on: TaskId) -> Result<(), EngineError> {
        {
            self.graph_write()?.remove_dependency(task, depends_on);
        }
        self.store
            .delete_edge(self.project.id, DependencyEdge { task, depends_on })?;
        log_changes!(
            self.config.verbosity,
            "dependency of task {} on task {} removed",
            task,
            depends_on
        );
        Ok(())
    }

    /// Remove a task nothing depends on, cascading its assignments.
    pub fn remove_task(&self, id: TaskId) -> Result<(), EngineError> {
        let outgoing = {
            let mut graph = self.graph_write()?;
            let outgoing: Vec<TaskId> = graph.dependencies_of(id).collect();
            graph.remove_task(id)?;
            outgoing
        };
        let removed = { self.board_write()?.remove_task(id) };
        for depends_on in outgoing {
            self.store
                .delete_edge(self.project.id, DependencyEdge { task: id, depends_on })?;
        }
        for record in &removed {
            self.store.delete_assignment(self.project.id, record.id)?;
        }
        self.store.delete_task(self.project.id, id)?;
        log_changes!(
            self.config.verbosity,
            "task {} removed, {} assignment(s) cascaded",
            id,
            removed.len()
        );
        Ok(())
    }

    // ---- task and schedule queries ----

    pub fn task(&self, id: TaskId) -> Result<Option<Task>, EngineError> {
        Ok(self.graph_read()?.get(id).cloned())
    }

    /// All tasks in the project, ordered by id.
    pub fn tasks(&self) -> Result<Vec<Task>, EngineError> {
        let graph = self.graph_read()?;
        let mut tasks: Vec<Task> = graph.tasks().cloned().collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    /// Direct dependencies of a task, ordered by id.
    pub fn dependencies_of(&self, id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let graph = self.graph_read()?;
        let mut deps: Vec<TaskId> = graph.dependencies_of(id).collect();
        deps.sort_unstable();
        Ok(deps)
    }

    /// Direct dependents of a task, ordered by id.
    pub fn dependents_of(&self, id: TaskId) -> Result<Vec<TaskId>, EngineError> {
        let graph = self.graph_read()?;
        let mut dependents: Vec<TaskId> = graph.dependents_of(id).collect();
        dependents.sort_unstable();
        Ok(dependents)
    }

    /// A dependency-respecting ordering over the whole project.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, EngineError> {
        Ok(self.graph_read()?.topological_order()?)
    }

    /// Recompute the full schedule from current graph state.
    ///
    /// Runs under the graph read lock, so it can overlap other readers but
    /// never observes a half-applied mutation.
    pub fn schedule(&self) -> Result<ScheduleReport, EngineError> {
        let report = {
            let graph = self.graph_read()?;
            compute_schedule(&graph)?
        };
        log_debug!(
            self.config.verbosity,
            "schedule recomputed: duration {:.2}h, {} critical task(s)",
            report.project_duration,
            report.critical_tasks.len()
        );
        Ok(report)
    }

    // ---- assignments ----

    /// Assign a user to a task, optionally as its leader.
    ///
    /// Holds the graph, user, and board locks together across the checks
    /// and the insert, so a racing task or user removal cannot slip in
    /// between, and two racing leader claims resolve to exactly one winner.
    pub fn assign(
        &self,
        user_id: UserId,
        task_id: TaskId,
        is_leader: bool,
        allocation_pct: u8,
        note: String,
    ) -> Result<AssignmentId, EngineError> {
        let record = {
            let graph = self.graph_read()?;
            if !graph.contains(task_id) {
                log_checks!(
                    self.config.verbosity,
                    "assign rejected: task {} not in project {}",
                    task_id,
                    self.project.id
                );
                return Err(GraphError::UnknownTask(task_id).into());
            }
            let users = self.users_read()?;
            if !users.contains_key(&user_id) {
                log_checks!(self.config.verbosity, "assign rejected: unknown user {}", user_id);
                return Err(EngineError::UnknownUser(user_id));
            }
            let mut board = self.board_write()?;
            board.assign(user_id, task_id, is_leader, allocation_pct, note, Utc::now())?
        };
        self.store.save_assignment(self.project.id, &record)?;
        log_changes!(
            self.config.verbosity,
            "user {} assigned to task {} (leader: {})",
            user_id,
            task_id,
            is_leader
        );
        Ok(record.id)
    }

    /// End an assignment; repeated calls are no-ops.
    pub fn unassign(&self, id: AssignmentId) -> Result<(), EngineError> {
        let record = { self.board_write()?.unassign(id, Utc::now())? };
        self.store.save_assignment(self.project.id, &record)?;
        log_changes!(self.config.verbosity, "assignment {} ended", id);
        Ok(())
    }

    pub fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, EngineError> {
        Ok(self.board_read()?.get(id).cloned())
    }

    /// The unique active leader of a task, if any.
    pub fn active_leader(&self, task_id: TaskId) -> Result<Option<UserId>, EngineError> {
        Ok(self.board_read()?.active_leader(task_id))
    }

    /// Active assignments on a task, ordered by assignment id.
    pub fn active_assignments_for_task(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<Assignment>, EngineError> {
        Ok(self
            .board_read()?
            .active_for_task(task_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Active assignments held by a user, ordered by assignment id.
    pub fn active_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Assignment>, EngineError> {
        Ok(self
            .board_read()?
            .active_for_user(user_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every assignment ever made on a task, active or ended.
    pub fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, EngineError> {
        Ok(self
            .board_read()?
            .assignments_for_task(task_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every assignment a user has ever held.
    pub fn assignments_for_user(&self, user_id: UserId) -> Result<Vec<Assignment>, EngineError> {
        Ok(self
            .board_read()?
            .assignments_for_user(user_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Distinct tasks the user actively leads.
    pub fn tasks_led_by(&self, user_id: UserId) -> Result<Vec<TaskId>, EngineError> {
        Ok(self.board_read()?.tasks_led_by(user_id))
    }

    /// Distinct tasks where the user holds an active assignment.
    pub fn tasks_assigned_to(&self, user_id: UserId) -> Result<Vec<TaskId>, EngineError> {
        Ok(self.board_read()?.tasks_assigned_to(user_id))
    }

    // ---- users ----

    /// Register a user in the directory.
    pub fn add_user(&self, user: User) -> Result<(), EngineError> {
        {
            let mut users = self.users_write()?;
            if users.contains_key(&user.id) {
                return Err(EngineError::DuplicateUser(user.id));
            }
            users.insert(user.id, user.clone());
        }
        self.store.save_user(&user)?;
        log_changes!(self.config.verbosity, "user {} added", user.id);
        Ok(())
    }

    /// Replace an existing user's attributes.
    pub fn update_user(&self, user: User) -> Result<(), EngineError> {
        {
            let mut users = self.users_write()?;
            if !users.contains_key(&user.id) {
                return Err(EngineError::UnknownUser(user.id));
            }
            users.insert(user.id, user.clone());
        }
        self.store.save_user(&user)?;
        log_changes!(self.config.verbosity, "user {} updated", user.id);
        Ok(())
    }

    /// Delete a user and physically remove all their assignments.
    pub fn remove_user(&self, id: UserId) -> Result<(), EngineError> {
        {
            let mut users = self.users_write()?;
            if users.remove(&id).is_none() {
                return Err(EngineError::UnknownUser(id));
            }
        }
        let removed = { self.board_write()?.remove_user(id) };
        for record in &removed {
            self.store.delete_assignment(self.project.id, record.id)?;
        }
        self.store.delete_user(id)?;
        log_changes!(
            self.config.verbosity,
            "user {} removed, {} assignment(s) cascaded",
            id,
            removed.len()
        );
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, EngineError> {
        Ok(self.users_read()?.get(&id).cloned())
    }

    /// The user directory, ordered by id.
    pub fn users(&self) -> Result<Vec<User>, EngineError> {
        let users = self.users_read()?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|user| user.id);
        Ok(all)
    }

    // ---- lock plumbing ----

    /// A poisoned lock means a writer panicked mid-update. Unrecoverable
    /// for this engine instance, so report it regardless of verbosity.
    fn poisoned(&self) -> EngineError {
        eprintln!("project {}: lock poisoned by a panicked writer", self.project.id);
        EngineError::LockPoisoned
    }

    fn graph_read(&self) -> Result<RwLockReadGuard<'_, DependencyGraph>, EngineError> {
        self.graph.read().map_err(|_| self.poisoned())
    }

    fn graph_write(&self) -> Result<RwLockWriteGuard<'_, DependencyGraph>, EngineError> {
        self.graph.write().map_err(|_| self.poisoned())
    }

    fn board_read(&self) -> Result<RwLockReadGuard<'_, AssignmentBoard>, EngineError> {
        self.board.read().map_err(|_| self.poisoned())
    }

    fn board_write(&self) -> Result<RwLockWriteGuard<'_, AssignmentBoard>, EngineError> {
        self.board.write().map_err(|_| self.poisoned())
    }

    fn users_read(&self) -> Result<RwLockReadGuard<'_, FxHashMap<UserId, User>>, EngineError> {
        self.users.read().map_err(|_| self.poisoned())
    }

    fn users_write(&self) -> Result<RwLockWriteGuard<'_, FxHashMap<UserId, User>>, EngineError> {
        self.users.write().map_err(|_| self.poisoned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::ThreePoint;
    use crate::models::UserRole;
    use crate::repository::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Barrier;
    use std::thread;

    fn make_task(id: u64, o: f64, m: f64, p: f64, name: &str) -> Task {
        Task::new(
            TaskId(id),
            ProjectId(1),
            name.to_string(),
            ThreePoint::new(o, m, p).unwrap(),
        )
    }

    fn make_user(id: u64, name: &str, role: UserRole) -> User {
        User::new(
            UserId(id),
            name.to_string(),
            format!("{}@example.com", name),
            role,
            Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    fn start_engine(store: Arc<MemoryStore>) -> ProjectEngine {
        let project = Project::new(
            ProjectId(1),
            "website-redesign".to_string(),
            Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap(),
        );
        ProjectEngine::new(project, store, EngineConfig::default()).unwrap()
    }

    /// The standard six-phase fixture: requirements through acceptance
    /// testing with a database/UI split in the middle.
    fn seed_six_tasks(engine: &ProjectEngine) {
        engine.add_task(make_task(1, 16.0, 24.0, 40.0, "Requirements Analysis")).unwrap();
        engine.add_task(make_task(2, 20.0, 32.0, 50.0, "System Design")).unwrap();
        engine.add_task(make_task(3, 12.0, 20.0, 32.0, "Database Development")).unwrap();
        engine.add_task(make_task(4, 24.0, 40.0, 60.0, "UI Implementation")).unwrap();
        engine.add_task(make_task(5, 8.0, 16.0, 28.0, "Integration")).unwrap();
        engine.add_task(make_task(6, 12.0, 20.0, 35.0, "User Acceptance Testing")).unwrap();
        engine.add_dependency(TaskId(2), TaskId(1)).unwrap();
        engine.add_dependency(TaskId(3), TaskId(2)).unwrap();
        engine.add_dependency(TaskId(4), TaskId(2)).unwrap();
        engine.add_dependency(TaskId(5), TaskId(3)).unwrap();
        engine.add_dependency(TaskId(5), TaskId(4)).unwrap();
        engine.add_dependency(TaskId(6), TaskId(5)).unwrap();
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_six_task_schedule_end_to_end() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        seed_six_tasks(&engine);

        let report = engine.schedule().unwrap();
        // Expected durations: 152/6, 198/6, 124/6, 244/6, 100/6, 127/6.
        // Longest path runs through the UI branch: 821/6 hours.
        assert!(close(report.project_duration, 821.0 / 6.0));
        for id in [1, 2, 4, 5, 6] {
            assert!(report.is_critical(TaskId(id)), "task {} should be critical", id);
        }
        assert!(!report.is_critical(TaskId(3)));
        assert!(close(report.timing(TaskId(3)).unwrap().slack, 20.0));
        assert_eq!(
            report.critical_chain,
            vec![TaskId(1), TaskId(2), TaskId(4), TaskId(5), TaskId(6)]
        );
        // Chain variance: 16 + 25 + 36 + 100/9 + 529/36.
        assert!(close(report.variance, 3701.0 / 36.0));
        assert!(close(report.std_dev, (3701.0 / 36.0_f64).sqrt()));
        assert!(close(report.ci95.1, 821.0 / 6.0 + 2.0 * (3701.0 / 36.0_f64).sqrt()));
    }

    #[test]
    fn test_empty_project_has_no_schedule() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        assert!(matches!(
            engine.schedule(),
            Err(EngineError::Schedule(CpmError::EmptyProject))
        ));
    }

    #[test]
    fn test_cycle_rejected_through_engine() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_task(make_task(2, 1.0, 2.0, 3.0, "b")).unwrap();
        engine.add_dependency(TaskId(2), TaskId(1)).unwrap();
        assert!(matches!(
            engine.add_dependency(TaskId(1), TaskId(2)),
            Err(EngineError::Graph(GraphError::Cycle { .. }))
        ));
        // The rejected edge never reached the store either.
        assert_eq!(engine.dependencies_of(TaskId(1)).unwrap(), vec![]);
        assert_eq!(engine.dependencies_of(TaskId(2)).unwrap(), vec![TaskId(1)]);
    }

    #[test]
    fn test_remove_task_blocked_by_dependents() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        seed_six_tasks(&engine);
        assert!(matches!(
            engine.remove_task(TaskId(2)),
            Err(EngineError::Graph(GraphError::HasDependents { .. }))
        ));
        assert!(engine.task(TaskId(2)).unwrap().is_some());
    }

    #[test]
    fn test_set_status_persists() {
        let store = Arc::new(MemoryStore::new());
        let engine = start_engine(store.clone());
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.set_status(TaskId(1), TaskStatus::InProgress).unwrap();

        let reloaded = ProjectEngine::load(ProjectId(1), store, EngineConfig::default()).unwrap();
        assert_eq!(
            reloaded.task(TaskId(1)).unwrap().map(|t| t.status),
            Some(TaskStatus::InProgress)
        );
    }

    #[test]
    fn test_assign_requires_known_task_and_user() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_user(make_user(1, "grace", UserRole::Developer)).unwrap();

        assert!(matches!(
            engine.assign(UserId(1), TaskId(9), false, 100, String::new()),
            Err(EngineError::Graph(GraphError::UnknownTask(TaskId(9))))
        ));
        assert!(matches!(
            engine.assign(UserId(9), TaskId(1), false, 100, String::new()),
            Err(EngineError::UnknownUser(UserId(9)))
        ));
        engine.assign(UserId(1), TaskId(1), false, 100, String::new()).unwrap();
    }

    #[test]
    fn test_leader_claim_and_conflict() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_user(make_user(1, "grace", UserRole::ProjectManager)).unwrap();
        engine.add_user(make_user(2, "ada", UserRole::Developer)).unwrap();

        let lead = engine.assign(UserId(1), TaskId(1), true, 100, String::new()).unwrap();
        assert!(matches!(
            engine.assign(UserId(2), TaskId(1), true, 50, String::new()),
            Err(EngineError::Assign(AssignError::LeaderConflict { .. }))
        ));
        assert_eq!(engine.active_leader(TaskId(1)).unwrap(), Some(UserId(1)));

        engine.unassign(lead).unwrap();
        engine.assign(UserId(2), TaskId(1), true, 50, String::new()).unwrap();
        assert_eq!(engine.active_leader(TaskId(1)).unwrap(), Some(UserId(2)));
        assert_eq!(engine.tasks_led_by(UserId(2)).unwrap(), vec![TaskId(1)]);
        assert_eq!(engine.active_assignments_for_user(UserId(1)).unwrap().len(), 0);
    }

    #[test]
    fn test_concurrent_leader_claims_have_one_winner() {
        let engine = Arc::new(start_engine(Arc::new(MemoryStore::new())));
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_user(make_user(1, "grace", UserRole::Developer)).unwrap();
        engine.add_user(make_user(2, "ada", UserRole::Developer)).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for user in [1u64, 2] {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                engine.assign(UserId(user), TaskId(1), true, 100, String::new())
            }));
        }
        let results: Vec<Result<AssignmentId, EngineError>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::Assign(AssignError::LeaderConflict { .. }))))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);
        assert!(engine.active_leader(TaskId(1)).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_writers_serialize() {
        let engine = Arc::new(start_engine(Arc::new(MemoryStore::new())));
        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for base in [0u64, 100] {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for offset in 1..=20u64 {
                    engine
                        .add_task(make_task(base + offset, 1.0, 2.0, 3.0, "t"))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(engine.tasks().unwrap().len(), 40);
        assert_eq!(engine.topological_order().unwrap().len(), 40);
    }

    #[test]
    fn test_remove_user_cascades_assignments() {
        let store = Arc::new(MemoryStore::new());
        let engine = start_engine(store.clone());
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_task(make_task(2, 1.0, 2.0, 3.0, "b")).unwrap();
        engine.add_user(make_user(1, "grace", UserRole::Developer)).unwrap();
        engine.add_user(make_user(2, "ada", UserRole::Developer)).unwrap();
        engine.assign(UserId(1), TaskId(1), true, 100, String::new()).unwrap();
        engine.assign(UserId(1), TaskId(2), false, 50, String::new()).unwrap();
        let kept = engine.assign(UserId(2), TaskId(1), false, 100, String::new()).unwrap();

        engine.remove_user(UserId(1)).unwrap();
        assert!(engine.user(UserId(1)).unwrap().is_none());
        // Physical cascade: even the history is gone, not just the active set.
        assert!(engine.assignments_for_user(UserId(1)).unwrap().is_empty());
        assert_eq!(engine.active_leader(TaskId(1)).unwrap(), None);
        // The other user's assignment survives, in memory and in the store.
        assert_eq!(engine.active_assignments_for_task(TaskId(1)).unwrap().len(), 1);
        assert_eq!(engine.tasks_assigned_to(UserId(2)).unwrap(), vec![TaskId(1)]);
        let stored = store.load_assignments(ProjectId(1)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, kept);
    }

    #[test]
    fn test_remove_task_cascades_assignments_and_edges() {
        let store = Arc::new(MemoryStore::new());
        let engine = start_engine(store.clone());
        engine.add_task(make_task(1, 1.0, 2.0, 3.0, "a")).unwrap();
        engine.add_task(make_task(2, 1.0, 2.0, 3.0, "b")).unwrap();
        engine.add_dependency(TaskId(2), TaskId(1)).unwrap();
        engine.add_user(make_user(1, "grace", UserRole::Developer)).unwrap();
        engine.assign(UserId(1), TaskId(2), true, 100, String::new()).unwrap();

        engine.remove_task(TaskId(2)).unwrap();
        assert!(engine.task(TaskId(2)).unwrap().is_none());
        assert!(engine.assignments_for_task(TaskId(2)).unwrap().is_empty());

        // Store state reloads cleanly with the task, edge, and assignment gone.
        let reloaded = ProjectEngine::load(ProjectId(1), store, EngineConfig::default()).unwrap();
        assert!(reloaded.task(TaskId(2)).unwrap().is_none());
        assert_eq!(reloaded.tasks().unwrap().len(), 1);
        assert!(reloaded.dependents_of(TaskId(1)).unwrap().is_empty());
        assert!(reloaded.assignments_for_task(TaskId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_reload_round_trip_preserves_state() {
        let store = Arc::new(MemoryStore::new());
        let engine = start_engine(store.clone());
        seed_six_tasks(&engine);
        engine.add_user(make_user(1, "grace", UserRole::ProjectManager)).unwrap();
        engine.add_user(make_user(2, "ada", UserRole::Developer)).unwrap();
        let lead = engine.assign(UserId(1), TaskId(1), true, 100, "kickoff".to_string()).unwrap();
        let ended = engine.assign(UserId(2), TaskId(1), false, 50, String::new()).unwrap();
        engine.unassign(ended).unwrap();
        let original = engine.schedule().unwrap();
        drop(engine);

        let reloaded = ProjectEngine::load(ProjectId(1), store, EngineConfig::default()).unwrap();
        let report = reloaded.schedule().unwrap();
        assert!(close(report.project_duration, original.project_duration));
        assert_eq!(report.critical_chain, original.critical_chain);
        assert_eq!(reloaded.active_leader(TaskId(1)).unwrap(), Some(UserId(1)));
        assert_eq!(reloaded.assignments_for_task(TaskId(1)).unwrap().len(), 2);
        assert_eq!(reloaded.active_assignments_for_task(TaskId(1)).unwrap().len(), 1);

        // Fresh assignments continue after the highest stored id.
        let next = reloaded.assign(UserId(2), TaskId(2), false, 100, String::new()).unwrap();
        assert!(next > lead);
        assert!(next > ended);
    }

    #[test]
    fn test_duplicate_and_unknown_users() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        engine.add_user(make_user(1, "grace", UserRole::Developer)).unwrap();
        assert!(matches!(
            engine.add_user(make_user(1, "grace", UserRole::Developer)),
            Err(EngineError::DuplicateUser(UserId(1)))
        ));
        assert!(matches!(
            engine.update_user(make_user(9, "nobody", UserRole::Analyst)),
            Err(EngineError::UnknownUser(UserId(9)))
        ));
        assert!(matches!(
            engine.remove_user(UserId(9)),
            Err(EngineError::UnknownUser(UserId(9)))
        ));

        // Deactivation is an update, not a removal; assignments would survive.
        let mut renamed = make_user(1, "grace", UserRole::Developer);
        renamed.department = "Platform".to_string();
        renamed.is_active = false;
        engine.update_user(renamed).unwrap();
        let stored = engine.user(UserId(1)).unwrap();
        assert_eq!(stored.as_ref().map(|u| u.department.as_str()), Some("Platform"));
        assert_eq!(stored.map(|u| u.is_active), Some(false));
    }

    #[test]
    fn test_schedule_reflects_edits_immediately() {
        let engine = start_engine(Arc::new(MemoryStore::new()));
        engine.add_task(make_task(1, 8.0, 10.0, 12.0, "a")).unwrap();
        engine.add_task(make_task(2, 16.0, 20.0, 24.0, "b")).unwrap();
        engine.add_dependency(TaskId(2), TaskId(1)).unwrap();
        assert!(close(engine.schedule().unwrap().project_duration, 30.0));

        // Re-estimating a task shifts the next schedule with no extra step.
        let mut task = engine.task(TaskId(1)).unwrap().unwrap();
        task.estimate = ThreePoint::new(18.0, 20.0, 22.0).unwrap();
        engine.update_task(task).unwrap();
        assert!(close(engine.schedule().unwrap().project_duration, 40.0));

        engine.remove_dependency(TaskId(2), TaskId(1)).unwrap();
        assert!(close(engine.schedule().unwrap().project_duration, 20.0));
    }
}
