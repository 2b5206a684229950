//! A single conversation's identity, lifecycle, and steering queue.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{CompactionStrategy, ConversationContext};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Active,
    Paused,
    Completed,
    Failed,
}

/// Running counters for a session, surfaced for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    pub loop_iterations: u64,
    pub tool_invocations: u64,
    pub llm_calls: u64,
}

/// One recorded error encountered during a session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionErrorEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Parameters used to create a new [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel_id: String,
    pub user_id: String,
    pub engine_id: String,
    pub system_prompt: String,
    pub model: String,
    pub max_context_tokens: usize,
    pub compaction_strategy: CompactionStrategy,
}

/// A single conversation: identity, lifecycle, steering queue, and either
/// an owned or shared [`ConversationContext`].
pub struct Session {
    pub session_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub engine_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: SessionState,
    pub counters: SessionCounters,
    pub errors: Vec<SessionErrorEntry>,
    /// FIFO queue of user text submitted mid-loop; drained at well-defined
    /// points in the agent loop.
    pub steering_queue: VecDeque<String>,
    pub context: ConversationContext,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let mut context = ConversationContext::new(config.max_context_tokens, config.compaction_strategy);
        context.set_system_prompt(config.system_prompt);

        Self {
            session_id: Uuid::new_v4().to_string(),
            channel_id: config.channel_id,
            user_id: config.user_id,
            engine_id: config.engine_id,
            model: config.model,
            started_at: Utc::now(),
            ended_at: None,
            state: SessionState::Created,
            counters: SessionCounters::default(),
            errors: Vec::new(),
            steering_queue: VecDeque::new(),
            context,
        }
    }

    /// `created` -> `active`. No-op if already active.
    pub fn activate(&mut self) {
        if self.state == SessionState::Created {
            self.state = SessionState::Active;
        }
    }

    pub fn pause(&mut self) -> Result<(), String> {
        if self.state != SessionState::Active {
            return Err(format!("cannot pause session in state {:?}", self.state));
        }
        self.state = SessionState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), String> {
        if self.state != SessionState::Paused {
            return Err(format!("cannot resume session in state {:?}", self.state));
        }
        self.state = SessionState::Active;
        Ok(())
    }

    /// `active|paused` -> `completed`. Clears the steering queue and
    /// stamps `ended_at`.
    pub fn complete(&mut self) {
        self.finish(SessionState::Completed);
    }

    /// `active|paused` -> `failed`, recording `reason` in the error log.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.errors.push(SessionErrorEntry {
            at: Utc::now(),
            message: reason.into(),
        });
        self.finish(SessionState::Failed);
    }

    fn finish(&mut self, state: SessionState) {
        self.steering_queue.clear();
        self.state = state;
        self.ended_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Completed | SessionState::Failed)
    }

    pub fn push_steering(&mut self, text: impl Into<String>) {
        self.steering_queue.push_back(text.into());
    }

    /// Drain every queued steering message, oldest first.
    pub fn drain_steering(&mut self) -> Vec<String> {
        self.steering_queue.drain(..).collect()
    }
}

/// Maintains a map of `sessionId -> Session`, plus last-touch timestamps
/// for eviction.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    last_touched: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            last_touched: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_session(&self, config: SessionConfig) -> String {
        let mut session = Session::new(config);
        session.activate();
        let id = session.session_id.clone();

        self.sessions
            .write()
            .expect("session map lock poisoned")
            .insert(id.clone(), session);
        self.touch_session(&id);
        id
    }

    pub fn touch_session(&self, id: &str) {
        self.last_touched
            .write()
            .expect("touch map lock poisoned")
            .insert(id.to_owned(), Utc::now());
    }

    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.sessions.read().expect("session map lock poisoned").get(id).map(f)
    }

    pub fn with_session_mut<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .get_mut(id)
            .map(f)
    }

    /// Removes a session from the map for exclusive use across an `.await`
    /// point (e.g. driving an agent turn), to be returned via
    /// [`SessionManager::put_session`] once the caller is done with it.
    pub fn take_session(&self, id: &str) -> Option<Session> {
        self.sessions.write().expect("session map lock poisoned").remove(id)
    }

    /// Returns a session previously removed with [`SessionManager::take_session`].
    pub fn put_session(&self, session: Session) {
        let id = session.session_id.clone();
        self.sessions.write().expect("session map lock poisoned").insert(id.clone(), session);
        self.touch_session(&id);
    }

    pub fn session_exists(&self, id: &str) -> bool {
        self.sessions.read().expect("session map lock poisoned").contains_key(id)
    }

    /// Ends a session, clearing its attached resources (context cleared,
    /// steering cleared) and removing it from last-touch tracking.
    pub fn end_session(&self, id: &str) -> bool {
        let mut map = self.sessions.write().expect("session map lock poisoned");
        let Some(session) = map.get_mut(id) else {
            return false;
        };
        if !session.is_terminal() {
            session.complete();
        }
        session.context.clear();
        self.last_touched.write().expect("touch map lock poisoned").remove(id);
        true
    }

    pub fn list_active(&self) -> Vec<String> {
        self.sessions
            .read()
            .expect("session map lock poisoned")
            .values()
            .filter(|s| !s.is_terminal())
            .map(|s| s.session_id.clone())
            .collect()
    }

    /// Ends every tracked session; used on shutdown.
    pub fn end_all(&self) {
        let ids: Vec<String> = self
            .sessions
            .read()
            .expect("session map lock poisoned")
            .keys()
            .cloned()
            .collect();
        for id in ids {
            self.end_session(&id);
        }
    }

    /// Sessions whose last touch was before `older_than`.
    pub fn stale_sessions(&self, older_than: DateTime<Utc>) -> Vec<String> {
        self.last_touched
            .read()
            .expect("touch map lock poisoned")
            .iter()
            .filter(|(_, ts)| **ts < older_than)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
