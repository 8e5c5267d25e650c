//! Study-record stores: subjects and tasks for one user.
//!
//! `JsonStudyStore` keeps plain JSON files under
//! `<data_dir>/users/<user>/{subjects,tasks}.json`. A user without a subjects
//! file sees the default roadmap from `<data_dir>/syllabus.json`. The same
//! directory holds quiz history, the current study plan and its progress.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::traits::StudyStore;
use crate::types::{QuizRecord, Subject, Task};

pub struct JsonStudyStore {
    user_dir: PathBuf,
    default_syllabus: PathBuf,
}

impl JsonStudyStore {
    pub fn for_user(data_dir: &Path, user: &str) -> Self {
        Self {
            user_dir: data_dir.join("users").join(user),
            default_syllabus: data_dir.join("syllabus.json"),
        }
    }

    fn subjects_path(&self) -> PathBuf { self.user_dir.join("subjects.json") }
    fn tasks_path(&self) -> PathBuf { self.user_dir.join("tasks.json") }
    fn quizzes_path(&self) -> PathBuf { self.user_dir.join("quiz_history.json") }
    fn plan_path(&self) -> PathBuf { self.user_dir.join("study_plan.md") }
    fn plan_progress_path(&self) -> PathBuf { self.user_dir.join("plan_progress.json") }

    pub fn add_subject(&self, subject: Subject) -> Result<()> {
        let mut subjects = self.get_all_subjects()?;
        subjects.push(subject);
        write_json(&self.subjects_path(), &subjects)
    }

    /// Appends a pending task and returns its id.
    pub fn add_task(&self, description: &str, due_date: &str) -> Result<u64> {
        let mut tasks = self.get_tasks()?;
        let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        tasks.push(Task::new(id, description, due_date, false));
        write_json(&self.tasks_path(), &tasks)?;
        Ok(id)
    }

    pub fn complete_task(&self, id: u64) -> Result<()> {
        let mut tasks = self.get_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        task.completed = true;
        write_json(&self.tasks_path(), &tasks)
    }

    /// Removes every subject called `name`. A user still on the default
    /// roadmap gets their own copy without it.
    pub fn delete_subject(&self, name: &str) -> Result<()> {
        let mut subjects = self.get_all_subjects()?;
        let before = subjects.len();
        subjects.retain(|s| s.name != name);
        if subjects.len() == before {
            return Err(Error::NotFound(format!("subject {name}")));
        }
        write_json(&self.subjects_path(), &subjects)
    }

    pub fn delete_task(&self, id: u64) -> Result<()> {
        let mut tasks = self.get_tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(Error::NotFound(format!("task {id}")));
        }
        write_json(&self.tasks_path(), &tasks)
    }

    /// Oldest first.
    pub fn quiz_history(&self) -> Result<Vec<QuizRecord>> {
        read_json_or_default(&self.quizzes_path())
    }

    pub fn record_quiz(&self, record: QuizRecord) -> Result<()> {
        let mut history = self.quiz_history()?;
        history.push(record);
        write_json(&self.quizzes_path(), &history)
    }

    pub fn study_plan(&self) -> Result<Option<String>> {
        let path = self.plan_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Replaces the current plan and clears its progress.
    pub fn save_study_plan(&self, plan: &str) -> Result<()> {
        fs::create_dir_all(&self.user_dir)?;
        fs::write(self.plan_path(), plan)?;
        let progress = self.plan_progress_path();
        if progress.exists() {
            fs::remove_file(progress)?;
        }
        Ok(())
    }

    /// Plan task id -> completion date (`YYYY-MM-DD`).
    pub fn plan_completions(&self) -> Result<BTreeMap<String, String>> {
        read_json_or_default(&self.plan_progress_path())
    }

    /// Marks a plan task done on `completed_on`, or open again with `None`.
    pub fn set_plan_task(&self, task_id: &str, completed_on: Option<&str>) -> Result<()> {
        let mut completions = self.plan_completions()?;
        match completed_on {
            Some(date) => completions.insert(task_id.to_string(), date.to_string()),
            None => completions.remove(task_id),
        };
        write_json(&self.plan_progress_path(), &completions)
    }
}

impl StudyStore for JsonStudyStore {
    fn get_all_subjects(&self) -> Result<Vec<Subject>> {
        let own = self.subjects_path();
        if own.exists() {
            return read_json(&own);
        }
        if self.default_syllabus.exists() {
            tracing::debug!(path = %self.default_syllabus.display(), "using default syllabus");
            return read_json(&self.default_syllabus);
        }
        Ok(Vec::new())
    }

    fn get_tasks(&self) -> Result<Vec<Task>> {
        let path = self.tasks_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))
}

fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, items: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(items)?)?;
    Ok(())
}

/// In-process store, mainly for tests and embedding.
#[derive(Default)]
pub struct MemoryStudyStore {
    subjects: RwLock<Vec<Subject>>,
    tasks: RwLock<Vec<Task>>,
}

impl MemoryStudyStore {
    pub fn new(subjects: Vec<Subject>, tasks: Vec<Task>) -> Self {
        Self { subjects: RwLock::new(subjects), tasks: RwLock::new(tasks) }
    }

    pub fn set_subjects(&self, subjects: Vec<Subject>) {
        match self.subjects.write() {
            Ok(mut guard) => *guard = subjects,
            Err(poisoned) => *poisoned.into_inner() = subjects,
        }
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        match self.tasks.write() {
            Ok(mut guard) => *guard = tasks,
            Err(poisoned) => *poisoned.into_inner() = tasks,
        }
    }
}

impl StudyStore for MemoryStudyStore {
    fn get_all_subjects(&self) -> Result<Vec<Subject>> {
        self.subjects
            .read()
            .map(|s| s.clone())
            .map_err(|_| Error::Store("subject lock poisoned".into()))
    }

    fn get_tasks(&self) -> Result<Vec<Task>> {
        self.tasks
            .read()
            .map(|t| t.clone())
            .map_err(|_| Error::Store("task lock poisoned".into()))
    }
}
