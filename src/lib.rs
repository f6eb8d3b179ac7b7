//! Project estimation and scheduling engine.
//!
//! This crate provides the data structures and algorithms behind a
//! PERT-style project planner: three-point duration statistics, a
//! cycle-safe task dependency graph, the classic two-pass critical path
//! method, and a personnel assignment board with a single-active-leader
//! guarantee. A per-project [`engine::ProjectEngine`] ties these together
//! behind lock scopes and a pluggable [`repository::ProjectStore`].
//!
//! Project-level confidence intervals sum variance along one reported
//! critical chain and assume independent task durations. Parallel
//! near-critical paths are not folded in; the interval is a lower bound on
//! schedule risk, which is the standard PERT reading.

pub mod assignments;
pub mod config;
pub mod critical_path;
pub mod engine;
pub mod estimation;
pub mod graph;
pub mod logging;
pub mod models;
pub mod repository;

pub use assignments::{AssignError, Assignment, AssignmentBoard, MAX_NOTE_LEN};
pub use config::EngineConfig;
pub use critical_path::{compute_schedule, CpmError, ScheduleReport, TaskTiming, SLACK_EPSILON};
pub use engine::{EngineError, ProjectEngine};
pub use estimation::{estimate, Estimate, EstimateError, ThreePoint};
pub use graph::{DependencyGraph, GraphError};
pub use models::{
    AssignmentId, DependencyEdge, Project, ProjectId, Task, TaskId, TaskStatus, User, UserId,
    UserRole,
};
pub use repository::{MemoryStore, ProjectSnapshot, ProjectStore, StoreError};
