//! In-memory collaborators for pipeline tests.
//!
//! Each provider render is scripted per spreadsheet row. The row is read
//! back from the prompt, which test tasks always start with `row-{n}`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clipcart_cloud::StoredObject;
use clipcart_core::stats::ProcessingStats;
use clipcart_core::task::{ClipDuration, Resolution, TaskResult, VideoModel, VideoTask};
use clipcart_core::types::{Credits, DbId};
use clipcart_db::models::credit::CreditMovement;
use clipcart_db::models::generated_asset::CreateGeneratedAsset;
use clipcart_generation::{GenerationRequest, TaskState, TaskStatus};
use clipcart_pipeline::services::{
    AssetStore, CreditLedger, GenerationService, JobStore, ObjectStorage,
};
use clipcart_pipeline::{ServiceError, Services};
use tokio::time::Instant;

pub const JOB_ID: DbId = 7;
pub const USER_ID: DbId = 42;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub fn task(row: u32, resolution: Resolution, duration: ClipDuration) -> VideoTask {
    VideoTask {
        row_index: row,
        model: VideoModel::Standard,
        resolution,
        duration,
        prompt: format!("row-{row}: sneakers on a rooftop at dusk"),
        enhanced_prompt: None,
        image_url: None,
        aspect_ratio: None,
        product_name: Some(format!("Product {row}")),
        product_description: None,
    }
}

/// 720p, 10 second standard tasks for rows `0..count`.
pub fn short_tasks(count: u32) -> Vec<VideoTask> {
    (0..count)
        .map(|row| task(row, Resolution::Hd720, ClipDuration::Short))
        .collect()
}

fn row_of(prompt: &str) -> u32 {
    prompt
        .strip_prefix("row-")
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or_else(|| panic!("test prompt without row marker: {prompt}"))
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

pub struct FakeCredits {
    balance: AtomicI64,
    drain_after_gate: AtomicBool,
    reject_debits: AtomicBool,
    pub debits: Mutex<Vec<CreditMovement>>,
}

impl FakeCredits {
    pub fn new(balance: Credits) -> Self {
        Self {
            balance: AtomicI64::new(balance),
            drain_after_gate: AtomicBool::new(false),
            reject_debits: AtomicBool::new(false),
            debits: Mutex::new(Vec::new()),
        }
    }

    /// Refuse every debit as the ledger does when the balance was spent
    /// between the task's credit check and its debit.
    pub fn rejecting_debits(self) -> Self {
        self.reject_debits.store(true, Ordering::SeqCst);
        self
    }

    /// Empty the balance right after the first balance read, simulating
    /// a concurrent spend between the batch gate and the first task.
    pub fn draining_after_gate(self) -> Self {
        self.drain_after_gate.store(true, Ordering::SeqCst);
        self
    }

    pub fn balance(&self) -> Credits {
        self.balance.load(Ordering::SeqCst)
    }

    pub fn debits(&self) -> Vec<CreditMovement> {
        self.debits.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for FakeCredits {
    async fn get_balance(&self, _user_id: DbId) -> Result<Credits, ServiceError> {
        let balance = self.balance();
        if self.drain_after_gate.swap(false, Ordering::SeqCst) {
            self.balance.store(0, Ordering::SeqCst);
        }
        Ok(balance)
    }

    async fn has_sufficient_credits(
        &self,
        _user_id: DbId,
        amount: Credits,
    ) -> Result<bool, ServiceError> {
        Ok(self.balance() >= amount)
    }

    async fn debit(&self, movement: &CreditMovement) -> Result<(), ServiceError> {
        let balance = if self.reject_debits.load(Ordering::SeqCst) {
            0
        } else {
            self.balance()
        };
        if balance < movement.amount {
            return Err(ServiceError::permanent(format!(
                "Insufficient credits for user {}: required {}, available {balance}",
                movement.user_id, movement.amount
            )));
        }
        self.balance.store(balance - movement.amount, Ordering::SeqCst);
        self.debits.lock().unwrap().push(movement.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Generation provider
// ---------------------------------------------------------------------------

/// Scripted outcome of one attempt at a row.
#[derive(Debug, Clone)]
pub enum Step {
    /// Completes after this many `pending` status replies.
    Succeed { pending_polls: u32 },
    /// Submission itself fails with this message.
    RejectSubmit(&'static str),
    /// The provider reports the render as failed.
    ProviderFailure(&'static str),
    /// The provider reports completion without a result URL.
    CompleteWithoutUrl,
    /// Stays pending forever.
    Hang,
    /// Status queries never answer.
    Stall,
}

#[derive(Debug)]
struct Render {
    row: u32,
    step: Step,
    polls: u32,
}

pub struct FakeGeneration {
    default_step: Step,
    scripts: Mutex<HashMap<u32, VecDeque<Step>>>,
    renders: Mutex<HashMap<String, Render>>,
    pub submissions: Mutex<Vec<u32>>,
    pub status_calls: Mutex<Vec<(String, Instant)>>,
    in_flight: Mutex<usize>,
    max_in_flight: Mutex<usize>,
}

impl FakeGeneration {
    pub fn new() -> Self {
        Self::with_default(Step::Succeed { pending_polls: 0 })
    }

    /// Every attempt not covered by a script gets `step`.
    pub fn with_default(step: Step) -> Self {
        Self {
            default_step: step,
            scripts: Mutex::new(HashMap::new()),
            renders: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(0),
            max_in_flight: Mutex::new(0),
        }
    }

    /// Script successive attempts at `row`.
    pub fn script(self, row: u32, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(row, steps.into());
        self
    }

    /// Rows in submission order, one entry per attempt.
    pub fn submissions(&self) -> Vec<u32> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submissions_for(&self, row: u32) -> usize {
        self.submissions().iter().filter(|r| **r == row).count()
    }

    pub fn status_times(&self) -> Vec<Instant> {
        self.status_calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// Highest number of renders that were submitted but not yet
    /// terminal at the same time.
    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock().unwrap()
    }

    fn next_step(&self, row: u32) -> Step {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&row)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_step.clone())
    }

    fn settle(&self) {
        *self.in_flight.lock().unwrap() -= 1;
    }
}

pub fn result_url(task_id: &str) -> String {
    format!("https://cdn.provider.test/{task_id}.mp4")
}

#[async_trait]
impl GenerationService for FakeGeneration {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let row = row_of(&request.prompt);
        let attempt = {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push(row);
            submissions.iter().filter(|r| **r == row).count()
        };

        let step = self.next_step(row);
        if let Step::RejectSubmit(message) = step {
            return Err(ServiceError::new(message));
        }

        let task_id = format!("task-{row}-{attempt}");
        self.renders.lock().unwrap().insert(
            task_id.clone(),
            Render {
                row,
                step,
                polls: 0,
            },
        );
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            *max = (*max).max(*in_flight);
        }
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ServiceError> {
        self.status_calls
            .lock()
            .unwrap()
            .push((task_id.to_string(), Instant::now()));

        let reply = {
            let mut renders = self.renders.lock().unwrap();
            let render = renders
                .get_mut(task_id)
                .ok_or_else(|| ServiceError::new(format!("unknown task {task_id}")))?;
            render.polls += 1;
            match &render.step {
                Step::Succeed { pending_polls } if render.polls <= *pending_polls => {
                    Some((TaskState::Pending, None, None))
                }
                Step::Succeed { .. } => {
                    Some((TaskState::Completed, Some(result_url(task_id)), None))
                }
                Step::ProviderFailure(message) => {
                    Some((TaskState::Failed, None, Some(message.to_string())))
                }
                Step::CompleteWithoutUrl => Some((TaskState::Completed, None, None)),
                Step::Hang => Some((TaskState::Pending, None, None)),
                Step::Stall => None,
                Step::RejectSubmit(_) => unreachable!("rejected renders are never stored"),
            }
        };
        let Some((state, result, error)) = reply else {
            return std::future::pending().await;
        };

        if state != TaskState::Pending {
            self.settle();
        }
        Ok(TaskStatus {
            task_id: task_id.to_string(),
            state,
            result_url: result,
            error_message: error,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(format!("video bytes from {url}").into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub content_type: String,
    pub category: String,
    pub size: usize,
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<Upload>>,
}

impl FakeStorage {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

pub const PUBLIC_BASE: &str = "https://media.clipcart.test";

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
        category: &str,
    ) -> Result<StoredObject, ServiceError> {
        self.uploads.lock().unwrap().push(Upload {
            key: key.to_string(),
            content_type: content_type.to_string(),
            category: category.to_string(),
            size: bytes.len(),
        });
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{PUBLIC_BASE}/{key}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Job and asset stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeJobs {
    fail_progress: AtomicBool,
    pub progress: Mutex<Vec<ProcessingStats>>,
    pub completed: Mutex<Vec<(DbId, Vec<TaskResult>)>>,
    pub failed: Mutex<Vec<(DbId, serde_json::Value)>>,
}

impl FakeJobs {
    pub fn failing_progress() -> Self {
        let jobs = Self::default();
        jobs.fail_progress.store(true, Ordering::SeqCst);
        jobs
    }

    pub fn progress(&self) -> Vec<ProcessingStats> {
        self.progress.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<DbId> {
        self.completed.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    /// Failed results reported with the most recent completion.
    pub fn reported_failures(&self) -> Vec<TaskResult> {
        self.completed
            .lock()
            .unwrap()
            .last()
            .map(|(_, failures)| failures.clone())
            .unwrap_or_default()
    }

    pub fn failed(&self) -> Vec<(DbId, serde_json::Value)> {
        self.failed.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for FakeJobs {
    async fn update_progress(
        &self,
        _job_id: DbId,
        stats: &ProcessingStats,
    ) -> Result<(), ServiceError> {
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(ServiceError::new("connection pool closed"));
        }
        self.progress.lock().unwrap().push(*stats);
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: DbId,
        failures: &[TaskResult],
    ) -> Result<(), ServiceError> {
        self.completed.lock().unwrap().push((job_id, failures.to_vec()));
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: DbId,
        report: &serde_json::Value,
    ) -> Result<(), ServiceError> {
        self.failed.lock().unwrap().push((job_id, report.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAssets {
    pub inserted: Mutex<Vec<CreateGeneratedAsset>>,
}

impl FakeAssets {
    pub fn inserted(&self) -> Vec<CreateGeneratedAsset> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for FakeAssets {
    async fn insert(&self, asset: &CreateGeneratedAsset) -> Result<DbId, ServiceError> {
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(asset.clone());
        Ok(inserted.len() as DbId)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub credits: Arc<FakeCredits>,
    pub generation: Arc<FakeGeneration>,
    pub storage: Arc<FakeStorage>,
    pub jobs: Arc<FakeJobs>,
    pub assets: Arc<FakeAssets>,
}

impl Harness {
    pub fn new(credits: FakeCredits, generation: FakeGeneration) -> Self {
        Self::with_jobs(credits, generation, FakeJobs::default())
    }

    pub fn with_jobs(credits: FakeCredits, generation: FakeGeneration, jobs: FakeJobs) -> Self {
        Self {
            credits: Arc::new(credits),
            generation: Arc::new(generation),
            storage: Arc::new(FakeStorage::default()),
            jobs: Arc::new(jobs),
            assets: Arc::new(FakeAssets::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            credits: self.credits.clone(),
            generation: self.generation.clone(),
            storage: self.storage.clone(),
            jobs: self.jobs.clone(),
            assets: self.assets.clone(),
        }
    }
}
