use agentpipe_core::{AgentpipeError, AgentpipeResult, Task, TaskKey, TaskOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Ordered, deduplicated task list persisted as one JSON array.
///
/// Insertion order is dispatch order: [`TaskStore::next_pending`] returns the
/// first task that is not completed. Every mutation rewrites the whole file
/// through a temp file and rename. Write failures are logged and never
/// returned, so a mutation that reports success may not survive a crash.
///
/// Records that do not decode as a [`Task`] (an agent name this build does
/// not know, for instance) are never dispatched but are kept and written
/// back verbatim after the decoded tasks. Only [`TaskStore::clear`] drops them.
pub struct TaskStore {
    tasks: Vec<Task>,
    unrecognized: Vec<Value>,
    path: Option<PathBuf>,
}

impl TaskStore {
    /// A store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            tasks: Vec::new(),
            unrecognized: Vec::new(),
            path: None,
        }
    }

    /// Load the store at `path`. Never fails: a missing or unreadable file
    /// yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tasks, unrecognized) = read_records(&path);
        info!(
            path = %path.display(),
            tasks = tasks.len(),
            unrecognized = unrecognized.len(),
            "Task store opened"
        );
        Self {
            tasks,
            unrecognized,
            path: Some(path),
        }
    }

    /// Read the tasks persisted at `path`.
    ///
    /// A document that is not a JSON array counts as empty. Array elements
    /// that fail to decode are skipped here; [`TaskStore::open`] keeps them.
    /// A record repeating an earlier task's identity is dropped.
    pub fn load(path: &Path) -> Vec<Task> {
        read_records(path).0
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `task` unless a task with the same identity is already stored.
    /// Returns whether it was inserted.
    pub fn add(&mut self, task: Task) -> bool {
        if self.find(&task.key()).is_some() {
            debug!(task = %task.key(), "Task already queued");
            return false;
        }
        info!(task = %task.key(), "Task added");
        self.tasks.push(task);
        self.persist();
        true
    }

    /// First task, in stored order, that is not completed.
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| !t.completed)
    }

    /// Mark the task with identity `key` completed. Returns `false` (and
    /// changes nothing) when no stored task matches.
    pub fn mark_complete(&mut self, key: &TaskKey<'_>, outcome: TaskOutcome) -> bool {
        let Some(index) = self.find(key) else {
            debug!(task = %key, "No stored task to complete");
            return false;
        };
        let task = &mut self.tasks[index];
        task.completed = true;
        task.outcome = Some(outcome);
        self.persist();
        true
    }

    /// All tasks in stored order.
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    /// Raw records that did not decode as tasks, in file order.
    pub fn unrecognized(&self) -> &[Value] {
        &self.unrecognized
    }

    /// Remove the task at `index` (0-based, in stored order).
    pub fn remove(&mut self, index: usize) -> AgentpipeResult<Task> {
        if index >= self.tasks.len() {
            return Err(AgentpipeError::NotFound(format!(
                "task #{index} (store holds {})",
                self.tasks.len()
            )));
        }
        let task = self.tasks.remove(index);
        info!(task = %task.key(), "Task removed");
        self.persist();
        Ok(task)
    }

    /// Mark every task pending again. Returns how many were completed before.
    pub fn reset_all(&mut self) -> usize {
        let mut reset = 0;
        for task in &mut self.tasks {
            if task.completed {
                reset += 1;
            }
            task.completed = false;
            task.outcome = None;
        }
        info!(reset, "Task store reset");
        self.persist();
        reset
    }

    /// Drop every task, including unrecognized records.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.unrecognized.clear();
        info!("Task store cleared");
        self.persist();
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn find(&self, key: &TaskKey<'_>) -> Option<usize> {
        self.tasks.iter().position(|t| t.key() == *key)
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_atomically(path, &self.tasks, &self.unrecognized) {
            error!(path = %path.display(), error = %e, "Failed to persist task store");
        }
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn read_records(path: &Path) -> (Vec<Task>, Vec<Value>) {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No task file yet");
            return Default::default();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read task file, starting empty");
            return Default::default();
        }
    };

    let records = match serde_json::from_str::<Value>(&data) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            error!(path = %path.display(), "Task file is not a JSON array, starting empty");
            return Default::default();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Task file is not valid JSON, starting empty");
            return Default::default();
        }
    };

    let mut tasks: Vec<Task> = Vec::with_capacity(records.len());
    let mut unrecognized = Vec::new();
    for (position, record) in records.into_iter().enumerate() {
        match Task::deserialize(&record) {
            Ok(task) => {
                if tasks.iter().any(|t| t.key() == task.key()) {
                    warn!(position, task = %task.key(), "Dropping duplicate task record");
                } else {
                    tasks.push(task);
                }
            }
            Err(e) => {
                warn!(position, error = %e, "Keeping undecodable task record as is");
                unrecognized.push(record);
            }
        }
    }
    (tasks, unrecognized)
}

fn write_atomically(path: &Path, tasks: &[Task], unrecognized: &[Value]) -> AgentpipeResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut records = Vec::with_capacity(tasks.len() + unrecognized.len());
    for task in tasks {
        records.push(serde_json::to_value(task)?);
    }
    records.extend(unrecognized.iter().cloned());
    let json = serde_json::to_string_pretty(&records)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tasks.json");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    std::fs::write(&tmp, json)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(AgentpipeError::Store(format!(
            "rename {} -> {}: {e}",
            tmp.display(),
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use agentpipe_core::AgentRole;

    fn coding(desc: &str, out: &str) -> Task {
        Task::new(AgentRole::Coder, desc).with_output(out)
    }

    #[test]
    fn test_empty_store() {
        let store = TaskStore::in_memory();
        assert!(store.is_empty());
        assert!(store.next_pending().is_none());
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = TaskStore::in_memory();
        assert!(store.add(coding("Implement a.py", "a.py")));
        assert!(!store.add(coding("Implement a.py", "a.py")));
        // A different input_file is still the same task.
        assert!(!store.add(coding("Implement a.py", "a.py").with_input("notes.md")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_next_pending_is_earliest_incomplete() {
        let mut store = TaskStore::in_memory();
        store.add(coding("first", "a.py"));
        store.add(coding("second", "b.py"));
        store.add(coding("third", "c.py"));

        assert_eq!(store.next_pending().unwrap().description, "first");
        let first = store.list()[0].clone();
        assert!(store.mark_complete(&first.key(), TaskOutcome::Succeeded));
        assert_eq!(store.next_pending().unwrap().description, "second");

        let third = store.list()[2].clone();
        store.mark_complete(&third.key(), TaskOutcome::Succeeded);
        assert_eq!(store.next_pending().unwrap().description, "second");
    }

    #[test]
    fn test_mark_complete_unknown_is_noop() {
        let mut store = TaskStore::in_memory();
        store.add(coding("first", "a.py"));
        let stranger = coding("first", "other.py");
        assert!(!store.mark_complete(&stranger.key(), TaskOutcome::Succeeded));
        assert_eq!(store.pending_count(), 1);
        assert!(store.list()[0].outcome.is_none());
    }

    #[test]
    fn test_mark_complete_records_outcome() {
        let mut store = TaskStore::in_memory();
        let task = coding("first", "a.py");
        store.add(task.clone());
        store.mark_complete(
            &task.key(),
            TaskOutcome::Failed {
                reason: "quota".into(),
            },
        );
        assert!(store.list()[0].completed);
        assert_eq!(
            store.list()[0].outcome,
            Some(TaskOutcome::Failed {
                reason: "quota".into()
            })
        );
        assert!(store.next_pending().is_none());
    }

    #[test]
    fn test_remove_reset_clear() {
        let mut store = TaskStore::in_memory();
        store.add(coding("a", "a.py"));
        store.add(coding("b", "b.py"));
        let a = store.list()[0].clone();
        store.mark_complete(&a.key(), TaskOutcome::Succeeded);

        assert!(store.remove(5).is_err());
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.description, "b");

        assert_eq!(store.reset_all(), 1);
        assert_eq!(store.pending_count(), 1);
        assert!(store.list()[0].outcome.is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_persists_and_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue").join("tasks.json");

        let mut store = TaskStore::open(&path);
        store.add(coding("a", "a.py"));
        store.add(Task::new(AgentRole::Tester, "Write tests for a.py").with_input("a.py"));
        let a = store.list()[0].clone();
        store.mark_complete(&a.key(), TaskOutcome::Succeeded);

        let reopened = TaskStore::open(&path);
        assert_eq!(reopened.list(), store.list());
        assert_eq!(reopened.pending_count(), 1);

        // No temp files left next to the store.
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tasks.json");

        std::fs::write(&path, "{ not json").unwrap();
        assert!(TaskStore::load(&path).is_empty());

        std::fs::write(&path, r#"{"agent": "Coding Agent"}"#).unwrap();
        assert!(TaskStore::load(&path).is_empty());

        assert!(TaskStore::load(&tmp.path().join("absent.json")).is_empty());
    }

    #[test]
    fn test_load_skips_bad_records_individually() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[
                {"agent": "Coding Agent", "description": "ok", "output_file": "a.py", "input_file": null, "completed": false},
                {"agent": "Summarizer Agent", "description": "unknown role"},
                {"agent": "Coding Agent", "description": "ok", "output_file": "a.py", "completed": true},
                {"agent": "QA Agent", "description": "review", "input_file": "a.py"}
            ]"#,
        )
        .unwrap();

        let tasks = TaskStore::load(&path);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].agent, AgentRole::Coder);
        assert!(!tasks[0].completed);
        assert_eq!(tasks[1].agent, AgentRole::Qa);
    }

    #[test]
    fn test_unknown_agent_records_survive_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[
                {"agent": "Summarizer Agent", "description": "summarize", "output_file": "summary.md", "completed": false},
                {"agent": "QA Agent", "description": "review", "input_file": "a.py", "output_file": null, "completed": false}
            ]"#,
        )
        .unwrap();

        let mut store = TaskStore::open(&path);
        assert_eq!(store.len(), 1);
        assert_eq!(store.unrecognized().len(), 1);
        let qa = store.list()[0].clone();
        assert!(store.mark_complete(&qa.key(), TaskOutcome::Succeeded));

        let on_disk: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[0]["agent"], "QA Agent");
        assert_eq!(on_disk[0]["completed"], true);
        assert_eq!(on_disk[1]["agent"], "Summarizer Agent");
        assert_eq!(on_disk[1]["output_file"], "summary.md");

        let mut reopened = TaskStore::open(&path);
        assert_eq!(reopened.unrecognized(), store.unrecognized());
        assert!(reopened.next_pending().is_none());

        reopened.clear();
        let on_disk: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.is_empty());
    }
}
