//! Maps inbound messages to sessions via composite routing keys, with a
//! three-tier priority scheme for threaded chats, group chats, and direct
//! messages.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::context::CompactionStrategy;
use crate::session::{SessionConfig, SessionManager};

/// An inbound message as seen by the router, before a session exists.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub group_id: Option<String>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
}

/// Defaults used to materialize a fresh session when a route is missing
/// or stale.
#[derive(Debug, Clone)]
pub struct DefaultSessionTemplate {
    pub engine_id: String,
    pub model: String,
    pub system_prompt: String,
    pub max_context_tokens: usize,
}

/// Routes inbound messages to session ids by composite key, recreating
/// sessions whose route has gone stale.
pub struct MessageRouter {
    routes: RwLock<HashMap<String, String>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Computes the composite routing key for an inbound message by
    /// priority: threaded group chat, then group+user, then direct
    /// message. Returns `None` only when `channel_id` is missing.
    pub fn routing_key(msg: &InboundMessage) -> Option<String> {
        if msg.channel_id.is_empty() {
            return None;
        }

        if let (Some(gid), Some(tid)) = (&msg.group_id, &msg.thread_id) {
            return Some(format!("{}:group:{}:thread:{}", msg.channel_id, gid, tid));
        }

        if let Some(gid) = &msg.group_id {
            if let Some(uid) = &msg.user_id {
                return Some(format!("{}:group:{}:user:{}", msg.channel_id, gid, uid));
            }
        }

        msg.user_id
            .as_ref()
            .map(|uid| format!("{}:{}", msg.channel_id, uid))
    }

    /// Looks up the session mapped to `msg`'s routing key. If the session
    /// no longer exists the stale route is purged and a fresh session is
    /// created from `template`. Returns `None` only when no routing key
    /// could be computed.
    pub fn resolve(
        &self,
        msg: &InboundMessage,
        sessions: &SessionManager,
        template: &DefaultSessionTemplate,
    ) -> Option<String> {
        let key = Self::routing_key(msg)?;

        {
            let routes = self.routes.read().expect("route map lock poisoned");
            if let Some(sid) = routes.get(&key) {
                if sessions.session_exists(sid) {
                    return Some(sid.clone());
                }
            }
        }

        let config = SessionConfig {
            channel_id: msg.channel_id.clone(),
            user_id: msg.user_id.clone().unwrap_or_default(),
            engine_id: template.engine_id.clone(),
            system_prompt: template.system_prompt.clone(),
            model: template.model.clone(),
            max_context_tokens: template.max_context_tokens,
            compaction_strategy: CompactionStrategy::drop_oldest(),
        };
        let sid = sessions.create_session(config);

        self.routes
            .write()
            .expect("route map lock poisoned")
            .insert(key, sid.clone());
        Some(sid)
    }

    /// Removes route entries whose mapped session no longer exists in
    /// `sessions` (e.g. ended externally by eviction or shutdown).
    pub fn evict_stale(&self, sessions: &SessionManager) {
        self.routes
            .write()
            .expect("route map lock poisoned")
            .retain(|_, sid| sessions.session_exists(sid));
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().expect("route map lock poisoned").len()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}
