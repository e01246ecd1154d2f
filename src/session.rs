//! The assistant session: resolves questions and keeps the persisted log.

use crate::advisor;
use crate::history::{Clock, Conversation, Message, SystemClock};
use crate::store::HistoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Stops any pending reply of the session it was taken from.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once `shutdown` has been called.
    pub async fn stopped(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

pub struct AssistantSession {
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    log: Conversation,
    response_delay: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

/// A user message waiting for its reply. Dropping it before `complete`
/// removes the message again.
struct PendingTurn<'a> {
    log: &'a mut Conversation,
    completed: bool,
}

impl<'a> PendingTurn<'a> {
    fn begin(log: &'a mut Conversation, query: &str, now: i64) -> Self {
        log.push(query, true, now);
        Self {
            log,
            completed: false,
        }
    }

    fn complete(mut self, reply: String, now: i64) {
        self.log.push(reply, false, now);
        self.completed = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.log.pop();
        }
    }
}

impl AssistantSession {
    pub fn new(store: Arc<dyn HistoryStore>, response_delay: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            clock: Arc::new(SystemClock),
            log: Conversation::new(),
            response_delay,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn history(&self) -> Vec<Message> {
        self.log.messages().to_vec()
    }

    /// Replaces the in-memory log with whatever storage holds. Unreadable
    /// storage counts as an empty log.
    #[instrument(skip(self))]
    pub async fn load_history(&mut self) -> Vec<Message> {
        let stored = match self.store.load().await {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load chat history, starting empty");
                Vec::new()
            }
        };
        self.log = Conversation::from_stored(stored, self.clock.now_millis());
        if self.log.is_empty() {
            debug!("No stored chat history");
        }
        info!(count = self.log.len(), "Chat history loaded");
        self.history()
    }

    /// Adds the question and its reply to the log and appends the pair to
    /// storage. The returned log also holds anything other sessions sharing
    /// the store appended since this one last read it.
    ///
    /// Blank input leaves everything untouched. If the session shuts down, or
    /// the returned future is dropped, before the reply is ready, the question
    /// is removed again and nothing is written.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn submit(&mut self, query: &str) -> Vec<Message> {
        if query.trim().is_empty() {
            return self.history();
        }
        if *self.shutdown_rx.borrow() {
            warn!("Ignoring question submitted after shutdown");
            return self.history();
        }

        let turn = PendingTurn::begin(&mut self.log, query, self.clock.now_millis());

        if !self.response_delay.is_zero() {
            let mut shutdown = self.shutdown_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.response_delay) => {}
                _ = shutdown.wait_for(|stopped| *stopped) => {
                    drop(turn);
                    info!("Session shut down before the reply was ready");
                    return self.history();
                }
            }
        }

        let reply = advisor::resolve(query);
        turn.complete(reply, self.clock.now_millis());

        let pair_start = self.log.len().saturating_sub(2);
        match self.store.append(&self.log.messages()[pair_start..]).await {
            Ok(stored) => {
                self.log = Conversation::from_stored(stored, self.clock.now_millis());
            }
            Err(e) => {
                error!(error = %e, count = self.log.len(), "Failed to append to chat history");
            }
        }
        self.history()
    }

    #[instrument(skip(self))]
    pub async fn clear_history(&mut self) {
        self.log.clear();
        self.persist().await;
        info!("Chat history cleared");
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(self.log.messages()).await {
            error!(error = %e, count = self.log.len(), "Failed to save chat history");
        }
    }
}
