//! Core types and the `Scheduler` trait for the scheduler subsystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── JobId ───────────────────────────────────────────────────────────────────

/// A job's identity is its `name` (§3 "Cron Job" — name is unique); this
/// alias exists so call sites read as "a job identifier" rather than a
/// bare `String`.
pub type JobId = String;

// ─── ActiveHours ─────────────────────────────────────────────────────────────

/// Optional local-time window during which a job may fire. A job with
/// `active_hours` set is skipped when the local hour is outside
/// `[start_hour, end_hour)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

// ─── SessionTarget ───────────────────────────────────────────────────────────

/// Which session context a job's trigger should route into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionTarget {
    #[default]
    Main,
    Isolated,
}

// ─── JobPayload ──────────────────────────────────────────────────────────────

/// What a job injects when it fires; the host's `onTrigger` callback turns
/// this into a synthetic inbound message routed the same way a channel
/// message is (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobPayload {
    Heartbeat,
    AgentTurn { prompt: String },
    Notify { message: String },
}

// ─── ScheduledJob ────────────────────────────────────────────────────────────

/// A registered job in the scheduler (§3 "Cron Job").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    /// Unique job name; this is the job's identity (see [`JobId`]).
    pub name: String,
    /// Five-field cron expression (minute, hour, day-of-month, month,
    /// day-of-week). Validated eagerly by `add_job`.
    pub cron_expr: String,
    pub session_target: SessionTarget,
    pub payload: JobPayload,
    pub enabled: bool,
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_hours: Option<ActiveHours>,
    #[serde(default)]
    pub delete_after_run: bool,
    /// Optional attributing user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// ─── JobStatus ───────────────────────────────────────────────────────────────

/// Outcome of a single job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    Skipped,
}

// ─── JobExecution ────────────────────────────────────────────────────────────

/// Record of one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    /// Name of the job this execution belongs to.
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
    pub output: String,
}

// ─── Scheduler trait ─────────────────────────────────────────────────────────

/// Abstraction over the background job scheduler.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the scheduler's background tick task. Idempotent.
    async fn start(&self);

    /// Stop the background tick task. Safe to call at any time, including
    /// before `start` or more than once.
    async fn stop(&self);

    /// Add a job, replacing any existing job with the same `name`. Rejects
    /// a job whose `cron_expr` fails to parse.
    async fn add_job(&self, job: ScheduledJob) -> Result<JobId, String>;

    /// Remove a job by name. Returns `true` if it was found and removed.
    async fn remove_job(&self, name: &str) -> bool;

    /// List all registered jobs, sorted by name.
    async fn list_jobs(&self) -> Vec<ScheduledJob>;

    /// Retrieve execution history for a job by name (most recent first).
    async fn job_history(&self, name: &str) -> Vec<JobExecution>;

    /// Number of registered jobs.
    async fn size(&self) -> usize;

    /// Whether the background tick task is currently running.
    fn is_running(&self) -> bool;
}
