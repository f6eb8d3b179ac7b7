//! Core data types shared across the engine.
//!
//! Identifiers are opaque newtypes over `u64` so task, user, project, and
//! assignment ids cannot be mixed up at call sites. Entities carry their
//! raw attributes only; every derived quantity (PERT statistics, timings,
//! slack) is recomputed on demand and never stored here.

use chrono::{DateTime, Utc};

use crate::estimation::ThreePoint;

/// Stable identifier for a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u64);

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a task within its project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a team member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for an assignment record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssignmentId(pub u64);

impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

/// A unit of work with a three-point duration estimate.
///
/// Tasks store the raw (optimistic, most likely, pessimistic) triple; the
/// expected duration and its spread come from [`ThreePoint::stats`] and the
/// schedule timings from the critical path pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub estimate: ThreePoint,
    pub priority: i32,
    pub status: TaskStatus,
    pub percent_complete: f64,
    pub planned_start: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a not-yet-started task with default priority.
    pub fn new(id: TaskId, project_id: ProjectId, name: String, estimate: ThreePoint) -> Self {
        Self {
            id,
            project_id,
            name,
            description: String::new(),
            estimate,
            priority: 1,
            status: TaskStatus::NotStarted,
            percent_complete: 0.0,
            planned_start: None,
        }
    }

    /// Expected duration in hours under the PERT weighting.
    pub fn expected_hours(&self) -> f64 {
        self.estimate.expected()
    }
}

/// Functional role of a team member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    Developer,
    Designer,
    ProjectManager,
    QualityAssurance,
    DevOps,
    Analyst,
    Architect,
}

/// A member of the team who can hold task assignments.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub department: String,
    pub created_at: DateTime<Utc>,
    /// Directory flag only; inactive users keep their assignment history.
    pub is_active: bool,
}

impl User {
    pub fn new(
        id: UserId,
        name: String,
        email: String,
        role: UserRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            role,
            department: String::new(),
            created_at,
            is_active: true,
        }
    }
}

/// A project: the ownership boundary for a task set and its lock scope.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
}

impl Project {
    pub fn new(id: ProjectId, name: String, start_date: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            start_date,
        }
    }
}

/// Directed dependency edge: `task` cannot start before `depends_on` finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub task: TaskId,
    pub depends_on: TaskId,
}
