use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::PipelineError;
use crate::latency::{LatencySource, LatencyWindow};
use crate::tracer::StageTracer;

pub const VALIDATE_STAGE: &str = "validate-task";
pub const ASSIGN_ID_STAGE: &str = "generate-task-id";
pub const ENRICH_STAGE: &str = "enrich-task";
pub const SAVE_STAGE: &str = "save-task";

pub const MIN_TASK_LENGTH: usize = 3;
pub const ENRICHMENT_SUFFIX: &str = " [enriched]";

const VALIDATE_LATENCY: LatencyWindow = LatencyWindow::uniform_ms(50, 200);
const ASSIGN_ID_LATENCY: LatencyWindow = LatencyWindow::fixed_ms(200);
const ENRICH_LATENCY: LatencyWindow = LatencyWindow::fixed_ms(150);
const SAVE_LATENCY: LatencyWindow = LatencyWindow::uniform_ms(100, 400);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task: String,
}

/// Ordered, process-lifetime task collection.
///
/// A poisoned lock stays poisoned for the life of the process: appends and
/// removals fail with `PipelineError::Internal`, while snapshots still read
/// the last consistent contents.
#[derive(Debug, Default)]
pub struct TaskStore {
    pub(crate) tasks: Mutex<Vec<Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, Vec<Task>>, PipelineError> {
        self.tasks
            .lock()
            .map_err(|_| PipelineError::internal("task-store", "task store lock poisoned"))
    }

    /// Appends and returns the new collection size.
    pub fn append(&self, task: Task) -> Result<usize, PipelineError> {
        let mut tasks = self.lock_for_write()?;
        tasks.push(task);
        Ok(tasks.len())
    }

    /// Removes every task whose content equals `content`; returns how many went.
    pub fn remove_matching(&self, content: &str) -> Result<usize, PipelineError> {
        let mut tasks = self.lock_for_write()?;
        let before = tasks.len();
        tasks.retain(|t| t.task != content);
        Ok(before - tasks.len())
    }

    pub fn snapshot(&self) -> Vec<Task> {
        // Push and retain never leave the vector half-updated.
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_poisoned(&self) -> bool {
        self.tasks.is_poisoned()
    }
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReceipt {
    /// Observation-only identifier; recorded on the span, never used as a key.
    pub task_id: u32,
    pub stored: Task,
}

pub struct TaskPipeline {
    store: Arc<TaskStore>,
    tracer: StageTracer,
    latency: Arc<dyn LatencySource>,
}

impl TaskPipeline {
    pub fn new(store: Arc<TaskStore>, tracer: StageTracer, latency: Arc<dyn LatencySource>) -> Self {
        Self {
            store,
            tracer,
            latency,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Runs validate, assign-id, enrich and save in order, stopping at the
    /// first failing stage. Blocks for the simulated stage latencies.
    #[instrument(skip(self, content))]
    pub fn submit(&self, content: Option<&str>) -> Result<TaskReceipt, PipelineError> {
        let content = content
            .filter(|c| !c.is_empty())
            .ok_or(PipelineError::Input)?;

        self.tracer.run_stage(VALIDATE_STAGE, |attrs| {
            let length = content.chars().count();
            attrs.set("task.length", length);
            let waited = self.latency.simulate(VALIDATE_LATENCY);
            attrs.set("latency_ms", waited.as_millis() as u64);
            if length < MIN_TASK_LENGTH {
                return Err(PipelineError::Validation("Task too short".to_string()));
            }
            Ok(())
        })?;

        let task_id = self.tracer.run_stage(ASSIGN_ID_STAGE, |attrs| {
            let task_id: u32 = rand::thread_rng().gen_range(1000..=9999);
            attrs.set("task.id", task_id);
            self.latency.simulate(ASSIGN_ID_LATENCY);
            Ok::<_, PipelineError>(task_id)
        })?;

        let enriched = self.tracer.run_stage(ENRICH_STAGE, |attrs| {
            self.latency.simulate(ENRICH_LATENCY);
            let enriched = format!("{content}{ENRICHMENT_SUFFIX}");
            attrs.set("task.content", enriched.as_str());
            Ok::<_, PipelineError>(enriched)
        })?;

        let stored = self.tracer.run_stage(SAVE_STAGE, |attrs| {
            let waited = self.latency.simulate(SAVE_LATENCY);
            attrs.set("latency_ms", waited.as_millis() as u64);
            let task = Task { task: enriched };
            let size = self
                .store
                .append(task.clone())
                .map_err(|err| err.in_stage(SAVE_STAGE))?;
            attrs.set("store.size", size);
            Ok::<_, PipelineError>(task)
        })?;

        debug!(task_id, task = stored.task.as_str(), "Task stored");
        Ok(TaskReceipt { task_id, stored })
    }

    /// Exact-match removal; zero matches is still a success.
    pub fn delete(&self, content: &str) -> Result<usize, PipelineError> {
        let removed = self.store.remove_matching(content)?;
        debug!(task = content, removed, "Task delete processed");
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<Task>, PipelineError> {
        Ok(self.store.snapshot())
    }
}
