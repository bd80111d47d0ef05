mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use clipcart_core::plan::{Plan, PlanPolicy};
use clipcart_core::retry::RetryPolicy;
use clipcart_core::task::{ClipDuration, Resolution, VideoModel};
use clipcart_pipeline::executor::{BatchContext, TaskExecutor, VIDEO_CATEGORY, VIDEO_CONTENT_TYPE};
use tokio::time::Instant;

use common::{task, FakeCredits, FakeGeneration, Harness, Step, JOB_ID, PUBLIC_BASE, USER_ID};

fn ctx(plan: Plan) -> BatchContext {
    BatchContext {
        job_id: JOB_ID,
        user_id: USER_ID,
        plan,
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn successful_task_is_stored_billed_and_recorded() {
    let harness = Harness::new(FakeCredits::new(1_000), FakeGeneration::new());
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(3, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.row_index, 3);
    assert_eq!(result.retries, 0);
    assert_eq!(result.asset_id, Some(1));

    let uploads = harness.storage.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert!(upload.key.starts_with("videos/7/row-3-"), "{}", upload.key);
    assert!(upload.key.ends_with(".mp4"));
    assert_eq!(upload.content_type, VIDEO_CONTENT_TYPE);
    assert_eq!(upload.category, VIDEO_CATEGORY);
    assert!(upload.size > 0);

    let url = result.video_url.expect("video url");
    assert_eq!(url, format!("{PUBLIC_BASE}/{}", upload.key));

    let debits = harness.credits.debits();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].user_id, USER_ID);
    assert_eq!(debits[0].amount, 20);
    assert_eq!(debits[0].source, "video_generation");
    assert_eq!(debits[0].reference_id, "7:3");
    assert_eq!(harness.credits.balance(), 980);

    let assets = harness.assets.inserted();
    assert_eq!(assets.len(), 1);
    let asset = &assets[0];
    assert_eq!(asset.job_id, JOB_ID);
    assert_eq!(asset.row_index, 3);
    assert_eq!(asset.storage_key, upload.key);
    assert_eq!(asset.public_url, url);
    assert_eq!(asset.model, VideoModel::Standard.as_str());
    assert_eq!(asset.credits_spent, 20);
    assert_eq!(asset.metadata["product_name"], "Product 3");
    assert_eq!(asset.metadata["duration_secs"], 10);
}

#[tokio::test(start_paused = true)]
async fn premium_task_debits_premium_cost() {
    let harness = Harness::new(FakeCredits::new(1_000), FakeGeneration::new());
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let mut premium = task(0, Resolution::Hd1080, ClipDuration::Long);
    premium.model = VideoModel::Premium;
    let result = executor.execute(&ctx(Plan::Business), &premium).await;

    assert!(result.success);
    assert_eq!(harness.credits.debits()[0].amount, 180);
    assert_eq!(harness.assets.inserted()[0].model, "premium");
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transient_submit_errors_are_retried_with_backoff() {
    let generation = FakeGeneration::new().script(
        0,
        vec![
            Step::RejectSubmit("connect ETIMEDOUT 10.0.0.1:443"),
            Step::RejectSubmit("connect ETIMEDOUT 10.0.0.1:443"),
            Step::Succeed { pending_polls: 0 },
        ],
    );
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let started = Instant::now();
    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(result.success);
    assert_eq!(result.retries, 2);
    assert_eq!(harness.generation.submissions_for(0), 3);
    // 2 s after the first failure, 4 s after the second.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(6), "{waited:?}");
    assert!(waited < Duration::from_secs(7), "{waited:?}");
    assert_eq!(harness.credits.debits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_error_is_not_retried() {
    let generation =
        FakeGeneration::new().script(0, vec![Step::RejectSubmit("Invalid prompt: too vague")]);
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert_eq!(harness.generation.submissions_for(0), 1);
    assert_eq!(
        result.error.as_deref(),
        Some("Submit failed: Invalid prompt: too vague")
    );
    assert!(harness.credits.debits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_max_attempts() {
    let generation = FakeGeneration::with_default(Step::RejectSubmit("503 Service Unavailable"));
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 3);
    assert_eq!(harness.generation.submissions_for(0), 3);
    assert_eq!(
        result.error.as_deref(),
        Some("Submit failed: 503 Service Unavailable")
    );
}

#[tokio::test(start_paused = true)]
async fn custom_retry_policy_limits_attempts() {
    let generation = FakeGeneration::with_default(Step::RejectSubmit("socket hang up"));
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let retry = RetryPolicy {
        max_attempts: 1,
        base_delay: Duration::from_millis(10),
    };
    let executor = TaskExecutor::new(&services, &PlanPolicy, retry);

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 1);
    assert_eq!(harness.generation.submissions_for(0), 1);
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_is_retried() {
    let generation = FakeGeneration::new().script(
        0,
        vec![Step::Hang, Step::Succeed { pending_polls: 0 }],
    );
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.retries, 1);
    // 600 s / 3 s = 200 queries for the hung render, then one more.
    assert_eq!(harness.generation.status_times().len(), 201);
}

#[tokio::test(start_paused = true)]
async fn unanswered_status_query_times_out_and_is_retried() {
    let generation = FakeGeneration::with_default(Step::Stall);
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default())
        .with_call_timeout(Duration::from_secs(30));

    let started = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(24 * 60 * 60),
        executor.execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short)),
    )
    .await
    .expect("a stalled provider must not stall the task");

    assert!(!result.success);
    assert_eq!(result.retries, 3);
    assert_eq!(harness.generation.submissions_for(0), 3);
    assert_eq!(
        result.error.as_deref(),
        Some("Status check failed: operation timed out after 30s")
    );
    // Three 30 s timeouts plus 2 s and 4 s of backoff.
    assert!(started.elapsed() < Duration::from_secs(100), "{:?}", started.elapsed());
    assert!(harness.storage.uploads().is_empty());
}

// ---------------------------------------------------------------------------
// Permanent failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn provider_failure_is_permanent() {
    let generation =
        FakeGeneration::new().script(0, vec![Step::ProviderFailure("content policy violation")]);
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert_eq!(
        result.error.as_deref(),
        Some("Generation failed: content policy violation")
    );
    assert_eq!(harness.generation.submissions_for(0), 1);
    assert!(harness.storage.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn completion_without_url_fails_without_retry() {
    let generation = FakeGeneration::new().script(0, vec![Step::CompleteWithoutUrl]);
    let harness = Harness::new(FakeCredits::new(1_000), generation);
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert_matches!(result.error.as_deref(), Some(msg) if msg.contains("without a result URL"));
}

#[tokio::test(start_paused = true)]
async fn insufficient_credits_fail_before_submission() {
    let harness = Harness::new(FakeCredits::new(10), FakeGeneration::new());
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let result = executor
        .execute(&ctx(Plan::Pro), &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert_eq!(
        result.error.as_deref(),
        Some("Insufficient credits: required 20, available 10")
    );
    assert!(harness.generation.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_debit_is_not_retried() {
    let harness = Harness::new(
        FakeCredits::new(1_000).rejecting_debits(),
        FakeGeneration::new(),
    );
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());
    let ctx = BatchContext {
        user_id: 500,
        ..ctx(Plan::Pro)
    };

    let result = executor
        .execute(&ctx, &task(0, Resolution::Hd720, ClipDuration::Short))
        .await;

    assert!(!result.success);
    assert_eq!(result.retries, 0);
    assert_eq!(
        result.error.as_deref(),
        Some("Credit debit failed: Insufficient credits for user 500: required 20, available 0")
    );
    assert_eq!(harness.generation.submissions_for(0), 1);
    assert_eq!(harness.storage.uploads().len(), 1);
    assert!(harness.assets.inserted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_task_fails_without_submission() {
    let harness = Harness::new(FakeCredits::new(1_000), FakeGeneration::new());
    let services = harness.services();
    let executor = TaskExecutor::new(&services, &PlanPolicy, RetryPolicy::default());

    let mut blank = task(4, Resolution::Hd720, ClipDuration::Short);
    blank.prompt = "   ".into();
    let result = executor.execute(&ctx(Plan::Pro), &blank).await;

    assert!(!result.success);
    assert_eq!(result.row_index, 4);
    assert_eq!(result.retries, 0);
    assert_matches!(result.error.as_deref(), Some(msg) if msg.contains("prompt must not be empty"));
    assert!(harness.generation.submissions().is_empty());
}
