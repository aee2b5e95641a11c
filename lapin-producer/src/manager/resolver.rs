use tracing::{debug, error};

use super::ChannelManager;
use crate::error::{AckError, DeliveryTag, Resolution, Result};
use crate::transport::{BrokerChannel, Transport};

impl<T: Transport> ChannelManager<T> {
    /// Acknowledge exactly the delivery `delivery_tag`. Acks are
    /// never cumulative.
    ///
    /// If the broker shut the channel down, the consumer tag is
    /// cleared before [`AckError::ShutdownSignal`] is returned.
    pub fn acknowledge(&mut self, delivery_tag: DeliveryTag) -> Result<()> {
        self.resolve(Resolution::Acknowledge, delivery_tag)
    }

    /// Requeue the delivery if the endpoint is configured with
    /// requeue-on-fail, otherwise dead-letter it
    pub fn fail_message(&mut self, delivery_tag: DeliveryTag) -> Result<()> {
        if self.config.requeue_on_fail() {
            self.fail_with_redelivery(delivery_tag)
        } else {
            self.dead_letter(delivery_tag)
        }
    }

    /// Reject the delivery and ask the broker to redeliver it
    pub fn fail_with_redelivery(&mut self, delivery_tag: DeliveryTag) -> Result<()> {
        self.resolve(Resolution::Redeliver, delivery_tag)
    }

    /// Reject the delivery without requeue. The broker drops it or
    /// routes it to a dead-letter exchange, if one is configured on
    /// the queue.
    pub fn dead_letter(&mut self, delivery_tag: DeliveryTag) -> Result<()> {
        self.resolve(Resolution::DeadLetter, delivery_tag)
    }

    /// Make the ack/reject call for `resolution`
    fn resolve(&mut self, resolution: Resolution, delivery_tag: DeliveryTag) -> Result<()> {
        let result = self.channel().and_then(|channel| match resolution {
            Resolution::Acknowledge => channel.ack(delivery_tag),
            Resolution::Redeliver => channel.reject(delivery_tag, true),
            Resolution::DeadLetter => channel.reject(delivery_tag, false),
        });
        let Err(source) = result else {
            debug!(delivery_tag, %resolution, "Resolved delivery");
            return Ok(());
        };
        let err = AckError::new(resolution, delivery_tag, source);
        if err.is_shutdown() {
            self.reset();
        }
        error!(error = %err, cause = %source_of(&err), "Delivery not resolved");
        Err(err.into())
    }
}

/// The transport failure behind `err`
fn source_of(err: &AckError) -> &crate::transport::TransportError {
    match err {
        AckError::ShutdownSignal { source, .. } | AckError::Failed { source, .. } => source,
    }
}
