//! Tokio-backed scheduler implementation.
//!
//! `TokioScheduler` drives a background task that wakes every `tick_ms`
//! (default 60 000), computes the current epoch minute
//! (`floor(wallclock_ms / 60000)`), and no-ops if that minute was already
//! observed — so a job fires at most once per wall-clock minute regardless
//! of timer jitter or a restart landing mid-minute. Jobs live in memory
//! only; there is no persisted job store.

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    str::FromStr,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use tokio::sync::watch;

use crate::event_bus::{AppEvent, EventBus};

use super::traits::{
    ActiveHours, JobExecution, JobId, JobPayload, JobStatus, ScheduledJob, Scheduler,
};

/// Maximum history entries kept per job.
const MAX_HISTORY_PER_JOB: usize = 100;

type JobMap = HashMap<JobId, ScheduledJob>;
type HistoryMap = HashMap<JobId, Vec<JobExecution>>;
type ScheduleMap = HashMap<JobId, cron::Schedule>;

/// Called synchronously when a job's cron expression matches the current
/// minute. The host wires this to inject a synthetic inbound message
/// through the router. A panic or error here is caught and recorded as a
/// failed execution; it never brings down the scheduler.
pub type TriggerFn = Arc<dyn Fn(&ScheduledJob) -> Result<String, String> + Send + Sync>;

fn parse_cron(expr: &str) -> Result<cron::Schedule, String> {
    // The `cron` crate expects a 6-field expression (sec min hr dom mon dow);
    // §4.5/§6 specify 5 fields (min hr dom mon dow).
    let full_expr = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    cron::Schedule::from_str(&full_expr).map_err(|e| format!("invalid cron expression '{expr}': {e}"))
}

fn in_active_window(hours: &ActiveHours, now: &DateTime<Utc>) -> bool {
    let hour = now.hour() as u8;
    if hours.start_hour <= hours.end_hour {
        hour >= hours.start_hour && hour < hours.end_hour
    } else {
        // Window wraps past midnight.
        hour >= hours.start_hour || hour < hours.end_hour
    }
}

/// In-memory, Tokio-driven scheduler.
pub struct TokioScheduler {
    jobs: Arc<RwLock<JobMap>>,
    schedules: Arc<RwLock<ScheduleMap>>,
    history: Arc<RwLock<HistoryMap>>,
    bus: Arc<dyn EventBus>,
    on_trigger: TriggerFn,
    tick_ms: u64,
    last_minute: Arc<RwLock<Option<i64>>>,
    running: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl TokioScheduler {
    pub fn new(bus: Arc<dyn EventBus>, tick_ms: u64, on_trigger: TriggerFn) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            schedules: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(HashMap::new())),
            bus,
            on_trigger,
            tick_ms,
            last_minute: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            stop_tx,
            stop_rx,
        })
    }

    fn record_history(history: &Arc<RwLock<HistoryMap>>, exec: JobExecution) {
        if let Ok(mut map) = history.write() {
            let entries = map.entry(exec.job_id.clone()).or_default();
            entries.insert(0, exec);
            entries.truncate(MAX_HISTORY_PER_JOB);
        }
    }

    fn run_tick(
        jobs: &Arc<RwLock<JobMap>>,
        schedules: &Arc<RwLock<ScheduleMap>>,
        history: &Arc<RwLock<HistoryMap>>,
        bus: &Arc<dyn EventBus>,
        on_trigger: &TriggerFn,
        last_minute: &Arc<RwLock<Option<i64>>>,
    ) {
        let now = Utc::now();
        let epoch_minute = now.timestamp().div_euclid(60);

        {
            let mut guard = last_minute.write().expect("scheduler minute lock poisoned");
            if *guard == Some(epoch_minute) {
                return;
            }
            *guard = Some(epoch_minute);
        }

        let due: Vec<ScheduledJob> = {
            let jobs_guard = jobs.read().expect("scheduler job lock poisoned");
            let schedules_guard = schedules.read().expect("scheduler schedule lock poisoned");
            jobs_guard
                .values()
                .filter(|j| j.enabled)
                .filter(|j| j.active_hours.as_ref().is_none_or(|h| in_active_window(h, &now)))
                .filter(|j| {
                    schedules_guard
                        .get(&j.name)
                        .map(|s| s.includes(now))
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        for job in due {
            let started_at = Utc::now();
            let _ = bus.publish(match &job.payload {
                JobPayload::Heartbeat => AppEvent::HeartbeatTick { timestamp: started_at.to_rfc3339() },
                _ => AppEvent::CronFired { job_id: job.name.clone(), schedule: job.cron_expr.clone() },
            });

            let result = std::panic::catch_unwind(AssertUnwindSafe(|| on_trigger(&job)));
            let (status, output) = match result {
                Ok(Ok(output)) => (JobStatus::Success, output),
                Ok(Err(error)) => (JobStatus::Failed, error),
                Err(_) => (JobStatus::Failed, "job trigger panicked".to_string()),
            };
            let finished_at = Utc::now();

            Self::record_history(history, JobExecution {
                job_id: job.name.clone(),
                started_at,
                finished_at,
                status: status.clone(),
                output,
            });

            if let Ok(mut map) = jobs.write() {
                if let Some(j) = map.get_mut(&job.name) {
                    if status == JobStatus::Success {
                        j.error_count = 0;
                        if j.delete_after_run {
                            j.enabled = false;
                        }
                    } else {
                        j.error_count += 1;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return; // already running
        }

        let jobs = self.jobs.clone();
        let schedules = self.schedules.clone();
        let history = self.history.clone();
        let bus = self.bus.clone();
        let on_trigger = self.on_trigger.clone();
        let last_minute = self.last_minute.clone();
        let running = self.running.clone();
        let mut stop_rx = self.stop_rx.clone();
        let tick_ms = self.tick_ms;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::run_tick(&jobs, &schedules, &history, &bus, &on_trigger, &last_minute);
                    }
                    Ok(()) = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    async fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn add_job(&self, job: ScheduledJob) -> Result<JobId, String> {
        let schedule = parse_cron(&job.cron_expr)?;
        let name = job.name.clone();

        self.schedules
            .write()
            .map_err(|_| "scheduler schedule lock poisoned".to_string())?
            .insert(name.clone(), schedule);
        self.jobs
            .write()
            .map_err(|_| "scheduler job lock poisoned".to_string())?
            .insert(name.clone(), job);
        Ok(name)
    }

    async fn remove_job(&self, name: &str) -> bool {
        self.schedules.write().map(|mut m| m.remove(name)).ok();
        self.jobs.write().map(|mut m| m.remove(name)).unwrap_or(None).is_some()
    }

    async fn list_jobs(&self) -> Vec<ScheduledJob> {
        self.jobs
            .read()
            .map(|m| {
                let mut jobs: Vec<ScheduledJob> = m.values().cloned().collect();
                jobs.sort_by(|a, b| a.name.cmp(&b.name));
                jobs
            })
            .unwrap_or_default()
    }

    async fn job_history(&self, name: &str) -> Vec<JobExecution> {
        self.history
            .read()
            .map(|m| m.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    async fn size(&self) -> usize {
        self.jobs.read().map(|m| m.len()).unwrap_or(0)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
