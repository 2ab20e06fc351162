//! Main Bus task implementation

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::config::BusConfig;
use super::error::BusError;
use super::handle::Mailbox;
use super::messages::{BusMetrics, BusRequest, Envelope};
use crate::domain::Address;

/// The Bus owns the address registry and routes envelopes between mailboxes
pub struct Bus {
    config: BusConfig,
    tx: mpsc::Sender<BusRequest>,
    rx: mpsc::Receiver<BusRequest>,
}

impl Bus {
    /// Create a new Bus with the given configuration
    pub fn new(config: BusConfig) -> Self {
        debug!(?config, "Bus::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self { config, tx, rx }
    }

    /// Get a client for registering mailboxes and delivering envelopes
    pub fn client(&self) -> BusClient {
        BusClient {
            tx: self.tx.clone(),
            mailbox_buffer: self.config.mailbox_buffer,
        }
    }

    /// Run the Bus task
    ///
    /// This consumes the Bus and runs until shutdown is requested or every
    /// client has been dropped.
    pub async fn run(mut self) {
        // Drop our own sender so the loop ends once all clients are gone
        drop(self.tx);

        let mut registry: HashMap<Address, mpsc::Sender<Envelope>> = HashMap::new();
        let mut metrics = BusMetrics::default();

        info!("Bus started");

        while let Some(req) = self.rx.recv().await {
            metrics.requests_received += 1;

            match req {
                BusRequest::Register { address, tx, reply_tx } => {
                    let result = if registry.get(&address).is_some_and(|existing| !existing.is_closed()) {
                        warn!(%address, "Address already registered");
                        Err(BusError::AddressInUse(address))
                    } else {
                        debug!(%address, "Registering mailbox");
                        registry.insert(address, tx);
                        Ok(())
                    };
                    metrics.registered_addresses = registry.len();
                    let _ = reply_tx.send(result);
                }

                BusRequest::Unregister { address } => {
                    debug!(%address, "Unregistering mailbox");
                    registry.remove(&address);
                    metrics.registered_addresses = registry.len();
                }

                BusRequest::Deliver { envelope, reply_tx } => {
                    let result = deliver(&mut registry, envelope);
                    match &result {
                        Ok(()) => metrics.messages_delivered += 1,
                        Err(e) => {
                            debug!(error = %e, "Delivery failed");
                            metrics.delivery_failures += 1;
                        }
                    }
                    metrics.registered_addresses = registry.len();
                    let _ = reply_tx.send(result);
                }

                BusRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(metrics.clone());
                }

                BusRequest::Shutdown => {
                    info!("Bus shutting down");
                    break;
                }
            }
        }

        info!("Bus stopped");
    }
}

/// Hand an envelope to the destination mailbox without waiting on it
///
/// A full mailbox is reported instead of awaited so one slow handler cannot
/// stall delivery for the rest of the mesh.
fn deliver(registry: &mut HashMap<Address, mpsc::Sender<Envelope>>, envelope: Envelope) -> Result<(), BusError> {
    let to = envelope.to.clone();
    debug!(%to, from = %envelope.from, kind = envelope.payload.kind(), "deliver: called");

    let Some(tx) = registry.get(&to) else {
        return Err(BusError::UnknownAddress(to));
    };

    match tx.try_send(envelope) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => Err(BusError::MailboxFull(to)),
        Err(mpsc::error::TrySendError::Closed(_)) => {
            registry.remove(&to);
            Err(BusError::MailboxClosed(to))
        }
    }
}

/// Cloneable client of the Bus task
#[derive(Clone)]
pub struct BusClient {
    tx: mpsc::Sender<BusRequest>,
    mailbox_buffer: usize,
}

impl BusClient {
    /// Register a mailbox under `address`
    pub async fn register(&self, address: impl Into<Address>) -> Result<Mailbox, BusError> {
        let address = address.into();
        debug!(%address, "BusClient::register: called");
        let (msg_tx, msg_rx) = mpsc::channel(self.mailbox_buffer);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(BusRequest::Register {
                address: address.clone(),
                tx: msg_tx,
                reply_tx,
            })
            .await
            .map_err(|_| BusError::Closed)?;

        reply_rx.await.map_err(|_| BusError::Closed)??;

        Ok(Mailbox::new(self.clone(), address, msg_rx))
    }

    /// Remove the mailbox registered under `address`
    pub async fn unregister(&self, address: &Address) -> Result<(), BusError> {
        debug!(%address, "BusClient::unregister: called");
        self.tx
            .send(BusRequest::Unregister {
                address: address.clone(),
            })
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Deliver an envelope, returning as soon as the bus has accepted or refused it
    pub async fn deliver(&self, envelope: Envelope) -> Result<(), BusError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BusRequest::Deliver { envelope, reply_tx })
            .await
            .map_err(|_| BusError::Closed)?;
        reply_rx.await.map_err(|_| BusError::Closed)?
    }

    /// Get current bus metrics
    pub async fn metrics(&self) -> Result<BusMetrics, BusError> {
        debug!("BusClient::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BusRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| BusError::Closed)?;
        reply_rx.await.map_err(|_| BusError::Closed)
    }

    /// Request shutdown of the Bus
    pub async fn shutdown(&self) -> Result<(), BusError> {
        debug!("BusClient::shutdown: called");
        self.tx.send(BusRequest::Shutdown).await.map_err(|_| BusError::Closed)
    }
}
