//! Session management for conversational capabilities
//!
//! Each capability (recommendation, rules) owns an independent [`SessionStore`]
//! mapping opaque session tokens to conversation histories. A single
//! [`SessionReaper`] task periodically evicts idle entries from all stores.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::llm::ChatMessage;
use crate::Result;

/// Conversation history for one (capability, token) pair
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub messages: Vec<ChatMessage>,
    pub last_access: Instant,
}

impl ConversationHistory {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_access: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
    }
}

/// Token → history mapping scoped to a single capability.
///
/// Tokens are opaque and trusted as-is: a blank token mints a fresh one, an
/// unknown non-empty token lazily creates an empty history under that exact
/// token. No validation or ownership check is performed.
pub struct SessionStore {
    name: &'static str,
    sessions: DashMap<String, ConversationHistory>,
}

impl SessionStore {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sessions: DashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve a caller-supplied token, minting a fresh one when blank.
    #[must_use]
    pub fn resolve_token(token: &str) -> String {
        if token.trim().is_empty() {
            let minted = Uuid::new_v4().to_string();
            debug!("Minted new session token: {}", minted);
            minted
        } else {
            token.to_string()
        }
    }

    /// Resolve the token and return it with a snapshot of its history.
    ///
    /// Blank token → new token with an empty history. Known token → existing
    /// history, `last_access` refreshed. Unknown non-empty token → empty
    /// history created under that exact token.
    #[must_use]
    pub fn get_or_create(&self, token: &str) -> (String, Vec<ChatMessage>) {
        let resolved = Self::resolve_token(token);
        let messages = self.history(&resolved);
        (resolved, messages)
    }

    /// Snapshot the history for a token, creating an empty entry if absent.
    /// Refreshes `last_access`.
    #[must_use]
    pub fn history(&self, token: &str) -> Vec<ChatMessage> {
        let mut entry = self
            .sessions
            .entry(token.to_string())
            .or_insert_with(ConversationHistory::new);
        entry.touch();
        entry.messages.clone()
    }

    /// Append one user/assistant exchange. This is the sole write path to a
    /// conversation history. If the reaper evicted the entry mid-request the
    /// exchange lands in a freshly created one rather than being lost.
    pub fn append_exchange(&self, token: &str, user: impl Into<String>, assistant: impl Into<String>) {
        let mut entry = self
            .sessions
            .entry(token.to_string())
            .or_insert_with(ConversationHistory::new);
        entry.messages.push(ChatMessage::user(user));
        entry.messages.push(ChatMessage::assistant(assistant));
        entry.touch();
    }

    /// Remove a session, reporting whether it was present.
    pub fn close(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        if removed {
            info!("Closed {} session: {}", self.name, token);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict every entry idle strictly longer than `timeout`. Returns the
    /// number of evicted sessions.
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_access) > timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for token in expired {
            self.sessions.remove(&token);
            info!("Evicted idle {} session: {}", self.name, token);
        }
        count
    }
}

/// One reap pass over all stores. Eviction is independent per store; a
/// cycle-level error backs the loop off instead of terminating it.
fn reap_cycle(stores: &[Arc<SessionStore>], timeout: Duration) -> Result<usize> {
    let mut evicted = 0;
    for store in stores {
        evicted += store.evict_idle(timeout);
    }
    Ok(evicted)
}

/// Supervised background task evicting idle sessions from all stores.
///
/// Spawned at startup and joined on shutdown; never blocks request tasks.
pub struct SessionReaper {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl SessionReaper {
    #[must_use]
    pub fn spawn(stores: Vec<Arc<SessionStore>>, config: &SessionConfig) -> Self {
        let period = Duration::from_secs(config.reap_interval_secs);
        let retry_delay = Duration::from_secs(config.retry_delay_secs);
        let timeout = Duration::from_secs(config.idle_timeout_secs);
        let shutdown = CancellationToken::new();
        let cancelled = shutdown.clone();

        let handle = tokio::spawn(async move {
            info!(
                "Session reaper started (period: {}s, idle timeout: {}s)",
                period.as_secs(),
                timeout.as_secs()
            );
            loop {
                let delay = match reap_cycle(&stores, timeout) {
                    Ok(evicted) => {
                        if evicted > 0 {
                            let active: usize = stores.iter().map(|s| s.len()).sum();
                            info!("Reaped {} idle sessions, {} active", evicted, active);
                        }
                        period
                    }
                    Err(e) => {
                        warn!("Session reap cycle failed: {}, retrying shortly", e);
                        retry_delay
                    }
                };

                tokio::select! {
                    () = cancelled.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            debug!("Session reaper stopped");
        });

        Self { handle, shutdown }
    }

    /// Cancel the reap loop and wait for it to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
