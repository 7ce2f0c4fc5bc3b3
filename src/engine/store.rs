//! In-memory task table.
//!
//! The map lock is held only to insert or look up a record. Each record has
//! its own mutex, written solely by the execution that owns the task, so
//! readers always see a whole snapshot and tasks never contend with each
//! other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::task::{Task, TaskStatus};

type Record = Arc<Mutex<Task>>;

fn lock(record: &Mutex<Task>) -> MutexGuard<'_, Task> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Task records keyed by id.
#[derive(Default)]
pub struct TaskStore {
    records: RwLock<HashMap<String, Record>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task and return the handle its execution writes through.
    pub fn insert(&self, task: Task) -> TaskHandle {
        let id = task.id.clone();
        let record = Arc::new(Mutex::new(task));

        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&record));

        TaskHandle { record }
    }

    /// Current snapshot of a task.
    pub fn get(&self, id: &str) -> Option<Task> {
        let record = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()?;

        let snapshot = lock(&record).clone();
        Some(snapshot)
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks in each status.
    pub fn count_by_status(&self) -> HashMap<TaskStatus, usize> {
        let records: Vec<Record> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut counts = HashMap::new();
        for record in records {
            *counts.entry(lock(&record).status).or_insert(0) += 1;
        }
        counts
    }
}

/// Write access to a single task record, held by the task's own execution.
#[derive(Clone)]
pub struct TaskHandle {
    record: Record,
}

impl TaskHandle {
    /// Apply a change under the record lock.
    pub fn update<R>(&self, change: impl FnOnce(&mut Task) -> R) -> R {
        change(&mut lock(&self.record))
    }

    pub fn id(&self) -> String {
        lock(&self.record).id.clone()
    }
}
