use tracing::{debug, error, info};

use super::ChannelManager;
use crate::error::{Error, Result};
use crate::transport::{BrokerChannel, BrokerConsumer, Delivery, Transport, TransportError};

impl<T: Transport> ChannelManager<T> {
    /// Bind the configured queue, or a private auto-deleted one, to
    /// the exchange and register a manual-ack consumer on it. Does
    /// nothing if a consumer is already active. The channel must be
    /// open; this never reconnects.
    ///
    /// Deliveries left unresolved on a private queue are lost when
    /// the connection closes. Use [`crate::EndpointConfig::with_queue`]
    /// to have them redelivered after a reconnect.
    pub fn consume(&mut self) -> Result<()> {
        if self.is_consuming() {
            return Ok(());
        }
        let consumer_tag = format!(
            "{}-{}-{}",
            self.config.exchange(),
            std::process::id(),
            self.consumer_seq
        );
        let subscribed = self.channel().and_then(|channel| {
            channel.subscribe(
                self.config.queue(),
                self.config.exchange(),
                self.config.routing_key(),
                &consumer_tag,
            )
        });
        let consumer = subscribed.map_err(|source| self.consume_error(source))?;
        self.consumer_seq += 1;
        let tag = consumer.tag();
        info!(
            consumer_tag = tag,
            exchange = self.config.exchange(),
            queue = self.config.queue(),
            "Consumer registered"
        );
        self.consumer_tag = Some(tag);
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Block until the next delivery arrives. Returns `None` if the
    /// broker cancelled the consumer, in which case the registration
    /// is dropped.
    pub fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Err(self.consume_error(TransportError::NotConsuming));
        };
        match consumer.next_delivery() {
            Ok(Some(delivery)) => {
                debug!(
                    delivery_tag = delivery.delivery_tag,
                    redelivered = delivery.redelivered,
                    size = delivery.payload.len(),
                    "Received delivery"
                );
                Ok(Some(delivery))
            }
            Ok(None) => {
                info!(consumer_tag = ?self.consumer_tag, "Consumer cancelled");
                self.consumer = None;
                self.consumer_tag = None;
                Ok(None)
            }
            Err(source) => {
                if source.is_shutdown() {
                    self.reset();
                }
                Err(self.consume_error(source))
            }
        }
    }

    /// Log and wrap a consumer failure
    fn consume_error(&self, source: TransportError) -> Error {
        error!(exchange = self.config.exchange(), error = %source, "Consumer failed");
        Error::Consume {
            exchange: self.config.exchange().to_string(),
            source,
        }
    }
}
