//! Background job scheduler.
//!
//! # Architecture
//! ```text
//! Scheduler (trait)
//!   └── TokioScheduler          ← Tokio-driven in-memory scheduler
//!         ├── ScheduledJob       ← name, 5-field cron expression, payload
//!         └── epoch-minute dedup tick loop
//! ```
//!
//! # Key behaviours
//! - Ticks every `tick_ms` (default 60 000 ms); an epoch-minute dedup makes
//!   each job fire at most once per wall-clock minute.
//! - A job trigger is invoked synchronously; panics and errors are caught
//!   so a buggy handler cannot take down the scheduler.
//! - History ring-buffer: last 100 executions per job.

pub mod tokio_scheduler;
pub mod traits;

pub use tokio_scheduler::{TokioScheduler, TriggerFn};
pub use traits::{
    ActiveHours, JobExecution, JobId, JobPayload, JobStatus, ScheduledJob, Scheduler,
    SessionTarget,
};
