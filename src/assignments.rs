//! Personnel assignment board for one project.
//!
//! Tracks which users are assigned to which tasks, who leads each task, and
//! when every assignment started and ended. The one structural invariant:
//! a task has at most one active leader at any time; the check and the
//! insert happen in a single `&mut self` call so callers sharing the board
//! through a lock serialize on it. Assignments end softly by timestamp and
//! are physically removed only when the owning user or task is deleted.

use chrono::{DateTime, Duration, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::models::{AssignmentId, TaskId, UserId};

/// Longest accepted assignment note, in characters.
pub const MAX_NOTE_LEN: usize = 500;

/// Errors for assignment mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error("allocation percentage {0} is outside 0..=100")]
    InvalidAllocation(u8),
    #[error("note is {0} characters, limit is {}", MAX_NOTE_LEN)]
    NoteTooLong(usize),
    #[error("task {task} already has an active leader (user {leader})")]
    LeaderConflict { task: TaskId, leader: UserId },
    #[error("assignment {0} does not exist")]
    UnknownAssignment(AssignmentId),
}

/// One user-to-task assignment record.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub is_leader: bool,
    pub allocation_pct: u8,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
    pub note: String,
}

impl Assignment {
    /// An assignment is active until its unassigned timestamp is set.
    pub fn is_active(&self) -> bool {
        self.unassigned_at.is_none()
    }

    /// Time spent assigned, measured up to `now` for active records.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.unassigned_at.unwrap_or(now) - self.assigned_at
    }
}

/// Assignment records for one project, indexed by task and by user.
#[derive(Clone, Debug, Default)]
pub struct AssignmentBoard {
    assignments: FxHashMap<AssignmentId, Assignment>,
    by_task: FxHashMap<TaskId, FxHashSet<AssignmentId>>,
    by_user: FxHashMap<UserId, FxHashSet<AssignmentId>>,
    next_id: u64,
}

impl AssignmentBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn get(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.get(&id)
    }

    /// Create a new assignment and return the stored record.
    ///
    /// Fails when the allocation is out of range, the note is over length,
    /// or leadership is requested while the task already has an active
    /// leader.
    pub fn assign(
        &mut self,
        user_id: UserId,
        task_id: TaskId,
        is_leader: bool,
        allocation_pct: u8,
        note: String,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AssignError> {
        if allocation_pct > 100 {
            return Err(AssignError::InvalidAllocation(allocation_pct));
        }
        let note_len = note.chars().count();
        if note_len > MAX_NOTE_LEN {
            return Err(AssignError::NoteTooLong(note_len));
        }
        if is_leader {
            if let Some(leader) = self.active_leader(task_id) {
                return Err(AssignError::LeaderConflict { task: task_id, leader });
            }
        }
        self.next_id += 1;
        let record = Assignment {
            id: AssignmentId(self.next_id),
            user_id,
            task_id,
            is_leader,
            allocation_pct,
            assigned_at: now,
            unassigned_at: None,
            note,
        };
        let snapshot = record.clone();
        self.insert_loaded(record);
        Ok(snapshot)
    }

    /// End an assignment and return the updated record.
    ///
    /// Already-ended records keep their original end timestamp; repeating
    /// the call is a no-op.
    pub fn unassign(
        &mut self,
        id: AssignmentId,
        now: DateTime<Utc>,
    ) -> Result<Assignment, AssignError> {
        let Some(record) = self.assignments.get_mut(&id) else {
            return Err(AssignError::UnknownAssignment(id));
        };
        if record.unassigned_at.is_none() {
            record.unassigned_at = Some(now);
        }
        Ok(record.clone())
    }

    /// Insert an already-persisted record during hydration.
    ///
    /// Keeps the id counter ahead of every loaded id so fresh assignments
    /// never collide with stored ones.
    pub fn insert_loaded(&mut self, assignment: Assignment) {
        self.next_id = self.next_id.max(assignment.id.0);
        self.by_task
            .entry(assignment.task_id)
            .or_default()
            .insert(assignment.id);
        self.by_user
            .entry(assignment.user_id)
            .or_default()
            .insert(assignment.id);
        self.assignments.insert(assignment.id, assignment);
    }

    /// The unique active leader of a task, if any.
    pub fn active_leader(&self, task_id: TaskId) -> Option<UserId> {
        self.by_task
            .get(&task_id)?
            .iter()
            .filter_map(|id| self.assignments.get(id))
            .find(|a| a.is_leader && a.is_active())
            .map(|a| a.user_id)
    }

    /// Active assignments on a task, ordered by assignment id.
    pub fn active_for_task(&self, task_id: TaskId) -> Vec<&Assignment> {
        self.collect_sorted(self.by_task.get(&task_id), true)
    }

    /// Every assignment ever made on a task, active or ended.
    pub fn assignments_for_task(&self, task_id: TaskId) -> Vec<&Assignment> {
        self.collect_sorted(self.by_task.get(&task_id), false)
    }

    /// Active assignments held by a user, ordered by assignment id.
    pub fn active_for_user(&self, user_id: UserId) -> Vec<&Assignment> {
        self.collect_sorted(self.by_user.get(&user_id), true)
    }

    /// Every assignment a user has ever held.
    pub fn assignments_for_user(&self, user_id: UserId) -> Vec<&Assignment> {
        self.collect_sorted(self.by_user.get(&user_id), false)
    }

    /// Distinct tasks where the user holds an active assignment.
    pub fn tasks_assigned_to(&self, user_id: UserId) -> Vec<TaskId> {
        let mut tasks: Vec<TaskId> = self
            .active_for_user(user_id)
            .iter()
            .map(|a| a.task_id)
            .collect();
        tasks.sort_unstable();
        tasks.dedup();
        tasks
    }

    /// Distinct tasks the user actively leads.
    pub fn tasks_led_by(&self, user_id: UserId) -> Vec<TaskId> {
        let mut tasks: Vec<TaskId> = self
            .active_for_user(user_id)
            .iter()
            .filter(|a| a.is_leader)
            .map(|a| a.task_id)
            .collect();
        tasks.sort_unstable();
        tasks.dedup();
        tasks
    }

    /// Physically remove every record referencing a user.
    ///
    /// Returns the removed records, ordered by id, so the caller can
    /// propagate the deletes to storage.
    pub fn remove_user(&mut self, user_id: UserId) -> Vec<Assignment> {
        let ids: Vec<AssignmentId> = self
            .by_user
            .remove(&user_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.assignments.remove(&id) {
                if let Some(set) = self.by_task.get_mut(&record.task_id) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.by_task.remove(&record.task_id);
                    }
                }
                removed.push(record);
            }
        }
        removed.sort_by_key(|a| a.id);
        removed
    }

    /// Physically remove every record referencing a task.
    pub fn remove_task(&mut self, task_id: TaskId) -> Vec<Assignment> {
        let ids: Vec<AssignmentId> = self
            .by_task
            .remove(&task_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.assignments.remove(&id) {
                if let Some(set) = self.by_user.get_mut(&record.user_id) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.by_user.remove(&record.user_id);
                    }
                }
                removed.push(record);
            }
        }
        removed.sort_by_key(|a| a.id);
        removed
    }

    fn collect_sorted(
        &self,
        ids: Option<&FxHashSet<AssignmentId>>,
        active_only: bool,
    ) -> Vec<&Assignment> {
        let mut records: Vec<&Assignment> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.assignments.get(id))
            .filter(|a| !active_only || a.is_active())
            .collect();
        records.sort_by_key(|a| a.id);
        records
    }
}
