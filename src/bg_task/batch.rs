//! Completion barrier for mem-index append work
//!
//! Tasks may finish in any order. Only the moment the outstanding count
//! reaches zero matters to a waiter.

use std::sync::{Condvar, Mutex, MutexGuard};

use super::task::AppendMemIndexTask;

#[derive(Default)]
struct BatchState {
    tasks: Vec<AppendMemIndexTask>,
    outstanding: usize,
}

#[derive(Default)]
pub struct AppendMemIndexBatch {
    state: Mutex<BatchState>,
    all_done: Condvar,
}

impl AppendMemIndexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register one unit of work.
    pub fn insert_task(&self, task: AppendMemIndexTask) {
        let mut state = self.lock();
        state.tasks.push(task);
        state.outstanding += 1;
    }

    /// Mark one registered task finished. Extra calls are ignored.
    pub fn finish_task(&self) {
        let mut state = self.lock();
        if state.outstanding == 0 {
            return;
        }
        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every registered task has finished.
    pub fn wait_for_completion(&self) {
        let mut state = self.lock();
        while state.outstanding > 0 {
            state = self
                .all_done
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Tasks registered so far, in insertion order.
    pub fn tasks(&self) -> Vec<AppendMemIndexTask> {
        self.lock().tasks.clone()
    }
}
