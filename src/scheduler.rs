use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::dom::NodeId;

/// Handle to a pending deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Work that runs on a later tick of the UI loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// Post-insertion styling pass over the code blocks of a modal body.
    FormatCodeBlocks { overlay: NodeId },
    /// Put back the status line after transient feedback.
    RestoreStatus { text: String },
}

/// Tracks deferred callbacks so their owners can cancel them on teardown.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: BTreeMap<TaskId, (Instant, Deferred)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, delay: Duration, task: Deferred) -> TaskId {
        self.defer_at(Instant::now() + delay, task)
    }

    pub fn defer_at(&mut self, due: Instant, task: Deferred) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.pending.insert(id, (due, task));
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Remove and return every task due at `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<Deferred> {
        let due: Vec<TaskId> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(id, _)| *id)
            .collect();
        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|(_, task)| task))
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_respects_time() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.defer_at(now, Deferred::RestoreStatus { text: "a".into() });
        scheduler.defer_at(now + Duration::from_secs(5), Deferred::RestoreStatus { text: "b".into() });

        let due = scheduler.take_due(now);
        assert_eq!(due, vec![Deferred::RestoreStatus { text: "a".into() }]);
        assert_eq!(scheduler.pending(), 1);

        let due = scheduler.take_due(now + Duration::from_secs(5));
        assert_eq!(due.len(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.defer(Duration::ZERO, Deferred::RestoreStatus { text: String::new() });
        assert_eq!(scheduler.pending(), 1);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.take_due(Instant::now()).is_empty());
    }
}
