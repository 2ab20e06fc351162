//! Mailbox - client interface for one address on the bus

use tokio::sync::mpsc;
use tracing::debug;

use super::core::BusClient;
use super::error::BusError;
use super::messages::{Envelope, Payload};
use crate::domain::{Address, ConversationId, generate_message_id};

/// Sending half of a mailbox
///
/// Cloneable so spawned tasks (timers, generation calls) can send on behalf
/// of the address that owns the mailbox.
#[derive(Clone)]
pub struct Outbox {
    client: BusClient,
    address: Address,
}

impl Outbox {
    /// This outbox's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Send a payload to another address
    ///
    /// Fire-and-forget: returns as soon as the bus accepted or refused the
    /// envelope. Returns the ID of the sent message.
    pub async fn send(
        &self,
        to: &Address,
        session: Option<&ConversationId>,
        hops: u8,
        payload: Payload,
    ) -> Result<String, BusError> {
        let id = generate_message_id();
        debug!(from = %self.address, %to, %id, kind = payload.kind(), "Outbox::send: called");
        let envelope = Envelope {
            id: id.clone(),
            from: self.address.clone(),
            to: to.clone(),
            session: session.cloned(),
            hops,
            payload,
        };
        self.client.deliver(envelope).await?;
        Ok(id)
    }
}

/// A registered address with its inbound queue
pub struct Mailbox {
    outbox: Outbox,
    rx: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    pub(crate) fn new(client: BusClient, address: Address, rx: mpsc::Receiver<Envelope>) -> Self {
        debug!(%address, "Mailbox::new: called");
        Self {
            outbox: Outbox { client, address },
            rx,
        }
    }

    pub fn address(&self) -> &Address {
        self.outbox.address()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Receive the next envelope
    ///
    /// Returns None once the bus has dropped this mailbox.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Split into the sending half and the inbound queue
    pub fn split(self) -> (Outbox, mpsc::Receiver<Envelope>) {
        (self.outbox, self.rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, BusConfig};

    #[tokio::test]
    async fn test_mailbox_address() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client();
        tokio::spawn(bus.run());

        let mailbox = client.register("agent1test").await.unwrap();
        assert_eq!(mailbox.address(), &Address::new("agent1test"));
        assert_eq!(mailbox.outbox().address(), &Address::new("agent1test"));
    }

    #[tokio::test]
    async fn test_split_keeps_session_and_hops() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client();
        tokio::spawn(bus.run());

        let (outbox, _rx) = client.register("sender").await.unwrap().split();
        let mut receiver = client.register("receiver").await.unwrap();
        let session = ConversationId::new();

        let id = outbox
            .send(
                &Address::new("receiver"),
                Some(&session),
                2,
                Payload::TaskResponse {
                    result: "done".to_string(),
                },
            )
            .await
            .unwrap();

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.id, id);
        assert_eq!(envelope.session, Some(session));
        assert_eq!(envelope.hops, 2);
    }
}
