//! Completed-task records for observability

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::task::BgTaskType;

#[derive(Debug, Clone, Serialize)]
pub struct BgTaskInfo {
    pub task_id: Uuid,
    pub task_type: BgTaskType,
    pub task_info_list: Vec<String>,
    pub status_list: Vec<String>,
    pub task_time: DateTime<Utc>,
}

impl BgTaskInfo {
    pub fn new(task_type: BgTaskType) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_type,
            task_info_list: Vec::new(),
            status_list: Vec::new(),
            task_time: Utc::now(),
        }
    }

    pub fn push(&mut self, info: impl Into<String>, status: impl Into<String>) {
        self.task_info_list.push(info.into());
        self.status_list.push(status.into());
    }
}

/// Most recent task records, oldest evicted first
pub struct TaskHistory {
    entries: Mutex<VecDeque<BgTaskInfo>>,
    capacity: usize,
}

impl TaskHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn add(&self, info: BgTaskInfo) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(info);
    }

    /// Newest first
    pub fn list(&self) -> Vec<BgTaskInfo> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_evicts_oldest() {
        let history = TaskHistory::new(2);
        for text in ["a", "b", "c"] {
            let mut info = BgTaskInfo::new(BgTaskType::TestCommand);
            info.push(text, "OK");
            history.add(info);
        }
        let listed = history.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].task_info_list, vec!["c".to_string()]);
        assert_eq!(listed[1].task_info_list, vec!["b".to_string()]);
    }

    #[test]
    fn test_info_serializes_type_tag() {
        let info = BgTaskInfo::new(BgTaskType::Checkpoint);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["task_type"], "checkpoint");
        assert!(json["task_time"].is_string());
    }
}
