//! Whole-network wiring
//!
//! A Mesh owns one bus plus a worker task per handler. A Requester is the
//! outside caller: it registers its own address, asks one handler and waits
//! for that request's terminal reply.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Bus, BusClient, BusMetrics, Mailbox, Payload};
use crate::config::Config;
use crate::domain::{Address, ConversationId};
use crate::handler::catalog;
use crate::handler::{Handler, HandlerMetrics, HandlerSpec};
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::synth::Synthesizer;

/// A running bus with its handlers attached
pub struct Mesh {
    client: BusClient,
    handlers: Vec<(String, Address)>,
    bus_task: JoinHandle<()>,
    handler_tasks: Vec<JoinHandle<HandlerMetrics>>,
}

impl Mesh {
    /// Spawn the bus and every configured catalog handler
    pub async fn spawn(config: &Config, llm: Arc<dyn LlmClient>) -> Result<Self> {
        Self::spawn_with(config, llm, catalog::configured(config)).await
    }

    /// Spawn the bus with an explicit set of handlers
    pub async fn spawn_with(config: &Config, llm: Arc<dyn LlmClient>, specs: Vec<HandlerSpec>) -> Result<Self> {
        debug!(handler_count = specs.len(), "Mesh::spawn_with: called");
        let bus = Bus::new(config.mesh.bus.clone());
        let client = bus.client();
        let bus_task = tokio::spawn(bus.run());

        let prompts = Arc::new(PromptLoader::new(config.mesh.prompt_dir.clone()));
        let synthesizer = Arc::new(Synthesizer::new(
            llm,
            prompts,
            config.mesh.excerpt_limit,
            config.llm.max_tokens,
        ));

        let mut handlers = Vec::with_capacity(specs.len());
        let mut handler_tasks = Vec::with_capacity(specs.len());
        for spec in specs {
            let mailbox = client
                .register(spec.address.clone())
                .await
                .context(format!("Failed to register handler {}", spec.name))?;
            handlers.push((spec.name.clone(), spec.address.clone()));
            let handler = Handler::new(spec, Arc::clone(&synthesizer), config.mesh.max_hops, mailbox);
            handler_tasks.push(tokio::spawn(handler.run()));
        }

        info!(handler_count = handlers.len(), "Mesh started");
        Ok(Self {
            client,
            handlers,
            bus_task,
            handler_tasks,
        })
    }

    pub fn client(&self) -> &BusClient {
        &self.client
    }

    /// Address of a handler by its name
    pub fn address_of(&self, name: &str) -> Option<&Address> {
        self.handlers
            .iter()
            .find(|(handler, _)| handler == name)
            .map(|(_, address)| address)
    }

    /// Names of the running handlers, in spawn order
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(name, _)| name.as_str())
    }

    /// Register a new requester on this mesh's bus
    pub async fn requester(&self) -> Result<Requester> {
        Requester::register(&self.client).await
    }

    pub async fn metrics(&self) -> Result<BusMetrics> {
        self.client.metrics().await.context("Failed to read bus metrics")
    }

    /// Stop the bus and wait for every handler to drain
    pub async fn shutdown(self) -> Result<()> {
        debug!("Mesh::shutdown: called");
        self.client.shutdown().await.context("Failed to stop bus")?;
        self.bus_task.await.context("Bus task panicked")?;
        for task in self.handler_tasks {
            match task.await {
                Ok(metrics) if metrics.replies_undelivered > 0 => {
                    warn!(undelivered = metrics.replies_undelivered, "Handler dropped final replies");
                }
                Ok(metrics) => debug!(?metrics, "Handler drained"),
                Err(e) => warn!(error = %e, "Handler task ended abnormally"),
            }
        }
        info!("Mesh stopped");
        Ok(())
    }
}

/// A caller outside the handler network
pub struct Requester {
    mailbox: Mailbox,
}

impl Requester {
    /// Register a fresh `requester-<uuid>` address
    pub async fn register(client: &BusClient) -> Result<Self> {
        let address = Address::new(format!("requester-{}", uuid::Uuid::now_v7()));
        debug!(%address, "Requester::register: called");
        let mailbox = client
            .register(address.clone())
            .await
            .context(format!("Failed to register requester {}", address))?;
        Ok(Self { mailbox })
    }

    pub fn address(&self) -> &Address {
        self.mailbox.address()
    }

    /// Send `query` to `handler` and wait for its terminal reply
    ///
    /// Replies belonging to other requests are skipped.
    pub async fn ask(&mut self, handler: &Address, query: &str, timeout: Duration) -> Result<String> {
        debug!(%handler, ?timeout, "Requester::ask: called");
        let session = ConversationId::new();
        self.mailbox
            .outbox()
            .send(
                handler,
                Some(&session),
                0,
                Payload::TaskRequest {
                    query: query.to_string(),
                },
            )
            .await
            .context(format!("Failed to send query to {}", handler))?;

        let wait = async {
            while let Some(envelope) = self.mailbox.recv().await {
                if envelope.session.as_ref() != Some(&session) {
                    debug!(from = %envelope.from, "Requester::ask: skipping reply for another request");
                    continue;
                }
                match envelope.payload {
                    Payload::TaskResponse { result } => return Ok(result),
                    other => warn!(from = %envelope.from, kind = other.kind(), "Requester::ask: unexpected payload"),
                }
            }
            Err(eyre!("Requester mailbox closed before a reply arrived"))
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| eyre!("No reply from {} within {:?}", handler, timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;

    #[tokio::test]
    async fn test_mesh_registers_every_catalog_handler() {
        let llm = Arc::new(MockLlmClient::echo("unused", 0));
        let mesh = Mesh::spawn(&Config::default(), llm).await.unwrap();

        let names: Vec<&str> = mesh.handler_names().collect();
        assert_eq!(names.len(), catalog::builtin().len());
        assert_eq!(
            mesh.address_of(catalog::DEFAULT_HANDLER),
            Some(&Address::new(catalog::JOB_MATCHING))
        );
        assert!(mesh.address_of("nope").is_none());

        let metrics = mesh.metrics().await.unwrap();
        assert_eq!(metrics.registered_addresses, names.len());
        mesh.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_unknown_handler_fails_fast() {
        let llm = Arc::new(MockLlmClient::echo("unused", 0));
        let mesh = Mesh::spawn_with(&Config::default(), llm, Vec::new()).await.unwrap();
        let mut requester = mesh.requester().await.unwrap();

        let result = requester
            .ask(&Address::new("agent-nobody"), "hello", Duration::from_secs(1))
            .await;
        assert!(result.is_err());
        mesh.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_times_out_without_reply() {
        let llm = Arc::new(MockLlmClient::echo("unused", 0));
        let mesh = Mesh::spawn_with(&Config::default(), llm, Vec::new()).await.unwrap();
        let mut requester = mesh.requester().await.unwrap();
        // Registered but never answers
        let _silent = mesh.client().register("agent-silent").await.unwrap();

        let err = requester
            .ask(&Address::new("agent-silent"), "hello", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No reply"));
    }

    #[tokio::test]
    async fn test_requester_addresses_are_unique() {
        let llm = Arc::new(MockLlmClient::echo("unused", 0));
        let mesh = Mesh::spawn_with(&Config::default(), llm, Vec::new()).await.unwrap();
        let a = mesh.requester().await.unwrap();
        let b = mesh.requester().await.unwrap();
        assert_ne!(a.address(), b.address());
        assert!(a.address().as_str().starts_with("requester-"));
    }
}
