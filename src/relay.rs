//! Relay loop — polls the source, dedups, keeps conversations, and
//! orchestrates responder calls and deliveries.
//!
//! Single logical task: one tick completes fully (every responder call
//! and delivery awaited inline, in arrival order) before the next begins.
//! The ledger and conversation store are owned here and touched by no one
//! else, so no locking is involved.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::conversation::{ConversationStore, ConversationTurn};
use crate::responder::Responder;
use crate::sink::MessageSink;
use crate::source::{InboundMessage, MessageSource};

/// Most recent turns sent to the responder per request.
pub const CONTEXT_WINDOW_TURNS: usize = 20;

/// Sent instead of a generated reply when the responder call fails.
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble right now. Try again in a moment!";

/// After this many consecutive responder failures, fallback deliveries are
/// suppressed until a call succeeds, so a dead responder does not spam
/// every sender on every poll.
const MAX_CONSECUTIVE_RESPONDER_FAILURES: u32 = 3;

/// Set of message ids already handled this process lifetime.
///
/// Grows monotonically, never evicts; a restart may re-deliver messages
/// seen only by the previous process, which is accepted behavior.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<i64>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self, id: i64) -> bool {
        !self.seen.contains(&id)
    }

    /// Idempotent.
    pub fn mark_seen(&mut self, id: i64) {
        self.seen.insert(id);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// The orchestrator tying source, responder, and sink together.
pub struct Relay {
    source: Arc<dyn MessageSource>,
    responder: Arc<dyn Responder>,
    sink: Arc<dyn MessageSink>,
    system_prompt: String,
    poll_interval: Duration,
    lookback: Duration,
    ledger: DedupLedger,
    conversations: ConversationStore,
    responder_failures: u32,
}

impl Relay {
    pub fn new(
        source: Arc<dyn MessageSource>,
        responder: Arc<dyn Responder>,
        sink: Arc<dyn MessageSink>,
        system_prompt: String,
        poll_interval: Duration,
        lookback: Duration,
    ) -> Self {
        Self {
            source,
            responder,
            sink,
            system_prompt,
            poll_interval,
            lookback,
            ledger: DedupLedger::new(),
            conversations: ConversationStore::new(),
            responder_failures: 0,
        }
    }

    /// Run until the process is terminated.
    pub async fn run(mut self) {
        self.skip_backlog().await;
        info!("Watching for new messages");

        let mut tick = tokio::time::interval(self.poll_interval);
        loop {
            tick.tick().await;
            self.tick().await;
        }
    }

    /// Startup baseline: mark everything currently visible as seen
    /// without processing, so pre-existing messages get no replies.
    pub async fn skip_backlog(&mut self) {
        match self.source.fetch_recent(self.watermark()).await {
            Ok(backlog) => {
                for msg in &backlog {
                    self.ledger.mark_seen(msg.id);
                }
                info!(count = backlog.len(), "Skipping pre-existing backlog");
            }
            Err(e) => {
                // Later ticks still dedup correctly; the worst case is a
                // reply to a message that predates startup.
                warn!("Initial backlog fetch failed: {e}");
            }
        }
    }

    /// One poll cycle. Errors are contained: a failed fetch skips the
    /// tick, a failed message never blocks the ones after it.
    pub async fn tick(&mut self) {
        let mut batch = match self.source.fetch_recent(self.watermark()).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Poll failed: {e}");
                return;
            }
        };

        // Ids are monotonic by arrival; sorting tolerates either source
        // ordering and keeps per-sender replies in order.
        batch.sort_by_key(|msg| msg.id);

        for msg in batch {
            if !self.ledger.is_new(msg.id) {
                continue;
            }
            // Before any side effect: at most one attempt per id, even if
            // the steps below fail.
            self.ledger.mark_seen(msg.id);
            self.process(msg).await;
        }
    }

    async fn process(&mut self, msg: InboundMessage) {
        info!(sender = %msg.sender, id = msg.id, body = %msg.body, "New message");

        self.conversations
            .append_turn(&msg.sender, ConversationTurn::user(&msg.body));
        let window = self.conversations.window(&msg.sender, CONTEXT_WINDOW_TURNS);

        match self.responder.complete(&self.system_prompt, window).await {
            Ok(reply) => {
                self.responder_failures = 0;
                info!(sender = %msg.sender, reply = %truncate(&reply, 50), "Responder reply");
                self.conversations
                    .append_turn(&msg.sender, ConversationTurn::assistant(&reply));
                if let Err(e) = self.sink.deliver(&msg.sender, &reply).await {
                    error!(sender = %msg.sender, "Failed to send reply: {e}");
                }
            }
            Err(e) => {
                // No assistant turn: the history must not contain a
                // response that was never generated.
                self.responder_failures += 1;
                error!(sender = %msg.sender, "Responder call failed: {e}");

                if self.responder_failures > MAX_CONSECUTIVE_RESPONDER_FAILURES {
                    warn!(
                        failures = self.responder_failures,
                        "Responder persistently failing; suppressing fallback reply"
                    );
                } else if let Err(e) = self.sink.deliver(&msg.sender, FALLBACK_REPLY).await {
                    error!(sender = %msg.sender, "Failed to send fallback: {e}");
                }
            }
        }
    }

    /// Lower (exclusive) timestamp bound for fetches.
    fn watermark(&self) -> DateTime<Utc> {
        Utc::now() - self.lookback
    }

    /// Ids marked seen so far.
    pub fn seen_count(&self) -> usize {
        self.ledger.len()
    }

    /// Read access to conversation state, mainly for inspection in tests.
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }
}

/// Character-truncated copy for log lines.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
