//! Handler worker
//!
//! One task per handler. It owns the handler's conversation store and
//! processes, one at a time, both bus envelopes and the internal events its
//! spawned tasks (timers, generation calls) post back. Every read-modify-write
//! of a record and the finalize check-and-set happen here, so concurrent
//! replies for the same conversation cannot race.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::spec::{AuxiliarySource, HandlerSpec, scrape_url};
use crate::bus::{BusError, Envelope, Mailbox, Outbox, Payload};
use crate::conversation::{AuxiliaryPayload, ConversationRecord, ConversationStore, Gathered, ReplyOutcome};
use crate::domain::{Address, ConversationId};
use crate::policy::{CompletionPolicy, PolicyEvent, Verdict};
use crate::router::route;
use crate::synth::Synthesizer;

const INTERNAL_BUFFER: usize = 64;

/// Events posted back to the worker by tasks it spawned
#[derive(Debug)]
enum Internal {
    TimerElapsed(ConversationId),
    AuxiliaryReady {
        conversation: ConversationId,
        payload: AuxiliaryPayload,
    },
    Responded {
        conversation: ConversationId,
        delivered: bool,
    },
}

/// Counters kept by a handler worker
#[derive(Debug, Clone, Default)]
pub struct HandlerMetrics {
    pub requests_received: u64,
    pub replies_accepted: u64,
    pub replies_dropped: u64,
    pub dispatch_failures: u64,
    pub conversations_finalized: u64,
    /// Terminal replies the bus refused; their requesters never hear back
    pub replies_undelivered: u64,
}

/// A running handler: router, dispatch, store, policy and responder
pub struct Handler {
    spec: Arc<HandlerSpec>,
    policy: Arc<dyn CompletionPolicy>,
    synthesizer: Arc<Synthesizer>,
    max_hops: u8,
    outbox: Outbox,
    inbox: mpsc::Receiver<Envelope>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    store: ConversationStore,
    metrics: HandlerMetrics,
}

impl Handler {
    /// Create a handler serving `mailbox`
    pub fn new(spec: HandlerSpec, synthesizer: Arc<Synthesizer>, max_hops: u8, mailbox: Mailbox) -> Self {
        debug!(handler = %spec.name, address = %mailbox.address(), %max_hops, "Handler::new: called");
        let policy = spec.completion_policy();
        let (outbox, inbox) = mailbox.split();
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_BUFFER);
        Self {
            spec: Arc::new(spec),
            policy,
            synthesizer,
            max_hops,
            outbox,
            inbox,
            internal_tx,
            internal_rx,
            store: ConversationStore::new(),
            metrics: HandlerMetrics::default(),
        }
    }

    /// Run until the bus drops this handler's mailbox, returning the final counters
    pub async fn run(mut self) -> HandlerMetrics {
        info!(
            handler = %self.spec.name,
            address = %self.outbox.address(),
            policy = %self.policy.kind(),
            "Handler started"
        );

        loop {
            tokio::select! {
                envelope = self.inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => self.handle_internal(event),
            }
        }

        info!(
            handler = %self.spec.name,
            in_flight = self.store.len(),
            metrics = ?self.metrics,
            "Handler stopped"
        );
        self.metrics
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        let Envelope {
            id,
            from,
            session,
            hops,
            payload,
            ..
        } = envelope;
        debug!(handler = %self.spec.name, %from, kind = payload.kind(), "Handler::handle_envelope: called");

        match payload {
            Payload::TaskRequest { query } => self.handle_request(&id, from, session, hops, query).await,
            Payload::TaskResponse { result } => self.handle_reply(from, session, result),
            Payload::ScrapeResponse { text } => {
                self.handle_auxiliary_reply(from, session, AuxiliaryPayload::Page { text });
            }
            Payload::SearchResponse { query, results } => {
                self.handle_auxiliary_reply(from, session, AuxiliaryPayload::Search { query, results });
            }
            other => {
                warn!(handler = %self.spec.name, %from, kind = other.kind(), "Unexpected payload dropped");
                self.metrics.replies_dropped += 1;
            }
        }
    }

    /// Route, create the record, dispatch and evaluate once
    async fn handle_request(
        &mut self,
        message_id: &str,
        from: Address,
        session: Option<ConversationId>,
        hops: u8,
        query: String,
    ) {
        self.metrics.requests_received += 1;
        let id = ConversationId::from_message(message_id);

        let targets = if hops >= self.max_hops {
            info!(handler = %self.spec.name, %id, %hops, "Forward limit reached, consulting no collaborators");
            BTreeSet::new()
        } else {
            route(&query, &self.spec.keywords, &self.spec.registry)
        };
        info!(
            handler = %self.spec.name,
            %id,
            %from,
            target_count = targets.len(),
            "Request received"
        );

        let record = ConversationRecord::new(id.clone(), query.clone(), from, session, hops, targets.clone());
        if !self.store.insert(record) {
            return;
        }

        let next_hops = hops.saturating_add(1);
        let mut unreachable = Vec::new();
        for target in &targets {
            let payload = Payload::TaskRequest { query: query.clone() };
            match self.outbox.send(target, Some(&id), next_hops, payload).await {
                Ok(_) => debug!(%id, %target, "Handler::handle_request: collaborator request sent"),
                Err(e) => {
                    warn!(handler = %self.spec.name, %id, %target, error = %e, "Could not reach collaborator");
                    self.metrics.dispatch_failures += 1;
                    unreachable.push(target.clone());
                }
            }
        }

        let auxiliary_pending = self.dispatch_auxiliary(&id, &query, hops).await;

        if let Some(record) = self.store.get_mut(&id) {
            for target in &unreachable {
                record.abandon_target(target);
            }
            if auxiliary_pending {
                record.expect_auxiliary();
            }
        }

        if let Some(delay) = self.policy.timer() {
            self.schedule_timer(id.clone(), delay);
        }
        self.evaluate(&id, PolicyEvent::Dispatched);
    }

    /// Send the auxiliary request, if this handler has one
    ///
    /// Returns whether an auxiliary result is now awaited.
    async fn dispatch_auxiliary(&mut self, id: &ConversationId, query: &str, hops: u8) -> bool {
        let spec = Arc::clone(&self.spec);
        let (address, payload) = match &spec.auxiliary {
            AuxiliarySource::None => return false,
            AuxiliarySource::SelfAnalysis { template } => {
                self.spawn_analysis(id.clone(), template.clone(), query.to_string());
                return true;
            }
            AuxiliarySource::Scrape { address, url_template } => (
                address,
                Payload::ScrapeRequest {
                    url: scrape_url(url_template, query),
                },
            ),
            AuxiliarySource::Search { address } => (
                address,
                Payload::SearchRequest {
                    query: query.to_string(),
                },
            ),
        };

        match self.outbox.send(address, Some(id), hops, payload).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    handler = %spec.name,
                    %id,
                    %address,
                    error = %e,
                    "Auxiliary request failed, finalizing without it"
                );
                self.metrics.dispatch_failures += 1;
                false
            }
        }
    }

    fn handle_reply(&mut self, from: Address, session: Option<ConversationId>, result: String) {
        let Some(id) = session else {
            warn!(handler = %self.spec.name, %from, "Reply without conversation id dropped");
            self.metrics.replies_dropped += 1;
            return;
        };
        let Some(record) = self.store.get_mut(&id) else {
            warn!(handler = %self.spec.name, %id, %from, "Reply for unknown conversation dropped");
            self.metrics.replies_dropped += 1;
            return;
        };

        match record.record_reply(&from, result) {
            ReplyOutcome::Accepted => {
                self.metrics.replies_accepted += 1;
                self.evaluate(&id, PolicyEvent::CollaboratorReplied);
            }
            outcome => {
                warn!(handler = %self.spec.name, %id, %from, ?outcome, "Reply dropped");
                self.metrics.replies_dropped += 1;
            }
        }
    }

    fn handle_auxiliary_reply(&mut self, from: Address, session: Option<ConversationId>, payload: AuxiliaryPayload) {
        if self.spec.auxiliary.address() != Some(&from) {
            warn!(handler = %self.spec.name, %from, "Auxiliary reply from unexpected sender dropped");
            self.metrics.replies_dropped += 1;
            return;
        }
        match session {
            Some(id) => self.accept_auxiliary(id, payload),
            None => {
                warn!(handler = %self.spec.name, %from, "Auxiliary reply without conversation id dropped");
                self.metrics.replies_dropped += 1;
            }
        }
    }

    fn accept_auxiliary(&mut self, id: ConversationId, payload: AuxiliaryPayload) {
        let accepted = self
            .store
            .get_mut(&id)
            .map(|record| record.set_auxiliary(payload))
            .unwrap_or(false);
        if accepted {
            self.evaluate(&id, PolicyEvent::AuxiliaryArrived);
        } else {
            warn!(handler = %self.spec.name, %id, "Late or repeated auxiliary result dropped");
            self.metrics.replies_dropped += 1;
        }
    }

    fn handle_internal(&mut self, event: Internal) {
        debug!(handler = %self.spec.name, ?event, "Handler::handle_internal: called");
        match event {
            Internal::TimerElapsed(id) => self.evaluate(&id, PolicyEvent::TimerElapsed),
            Internal::AuxiliaryReady { conversation, payload } => self.accept_auxiliary(conversation, payload),
            Internal::Responded { conversation, delivered } => {
                if !delivered {
                    self.metrics.replies_undelivered += 1;
                }
                self.store.remove(&conversation);
                if self.store.is_empty() {
                    debug!(handler = %self.spec.name, "Handler::handle_internal: no conversations in flight");
                }
            }
        }
    }

    /// Ask the policy about a record and finalize it on a Finalize verdict
    fn evaluate(&mut self, id: &ConversationId, event: PolicyEvent) {
        let Some(record) = self.store.get_mut(id) else {
            debug!(%id, ?event, "Handler::evaluate: record already discarded");
            return;
        };
        if record.is_finalized() {
            return;
        }
        if self.policy.evaluate(event, record) == Verdict::Wait {
            debug!(%id, ?event, outstanding = record.outstanding().len(), "Handler::evaluate: waiting");
            return;
        }
        if !record.try_finalize() {
            return;
        }

        let gathered = record.gathered();
        self.metrics.conversations_finalized += 1;
        info!(
            handler = %self.spec.name,
            %id,
            ?event,
            results = gathered.results.len(),
            has_auxiliary = gathered.auxiliary.is_some(),
            "Finalizing conversation"
        );
        self.spawn_finalize(gathered);
    }

    fn schedule_timer(&self, id: ConversationId, delay: Duration) {
        debug!(%id, ?delay, "Handler::schedule_timer: called");
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::TimerElapsed(id)).await;
        });
    }

    fn spawn_analysis(&self, conversation: ConversationId, template: String, query: String) {
        debug!(%conversation, %template, "Handler::spawn_analysis: called");
        let synthesizer = Arc::clone(&self.synthesizer);
        let tx = self.internal_tx.clone();
        let temperature = self.spec.temperature;
        tokio::spawn(async move {
            let text = synthesizer.analyze(&template, &query, temperature).await;
            let _ = tx
                .send(Internal::AuxiliaryReady {
                    conversation,
                    payload: AuxiliaryPayload::Analysis { text },
                })
                .await;
        });
    }

    /// Synthesize and respond off the worker, then report back for cleanup
    fn spawn_finalize(&self, gathered: Gathered) {
        let spec = Arc::clone(&self.spec);
        let synthesizer = Arc::clone(&self.synthesizer);
        let outbox = self.outbox.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let text = synthesizer
                .synthesize(&spec.synthesis, &gathered, &spec.registry, spec.temperature)
                .await;
            let delivered = match respond(&outbox, &gathered, text).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        handler = %spec.name,
                        conversation = %gathered.conversation_id,
                        to = %gathered.reply_to,
                        error = %e,
                        "Final reply could not be delivered; the requester's conversation stalls unless it has its own timeout"
                    );
                    false
                }
            };
            let _ = tx
                .send(Internal::Responded {
                    conversation: gathered.conversation_id,
                    delivered,
                })
                .await;
        });
    }
}

/// Send the terminal reply for a finalized conversation
///
/// Carries the requester's own session so it can correlate the reply.
pub async fn respond(outbox: &Outbox, gathered: &Gathered, text: String) -> Result<(), BusError> {
    debug!(conversation = %gathered.conversation_id, to = %gathered.reply_to, "respond: called");
    outbox
        .send(
            &gathered.reply_to,
            gathered.reply_session.as_ref(),
            gathered.hops,
            Payload::TaskResponse { result: text },
        )
        .await?;
    info!(conversation = %gathered.conversation_id, to = %gathered.reply_to, "Final reply sent");
    Ok(())
}
