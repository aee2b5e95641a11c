use tracing::{debug, error};

use super::ChannelManager;
use crate::error::{Error, Result};
use crate::transport::{BrokerChannel, Transport};

impl<T: Transport> ChannelManager<T> {
    /// Publish `payload` to the configured exchange and routing key
    /// with no message properties.
    ///
    /// Fails with [`Error::Publish`] if the channel is not open or
    /// rejects the publish. The manager is not reinitialized.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let exchange = self.config.exchange();
        let routing_key = self.config.routing_key();
        match self
            .channel()
            .and_then(|channel| channel.publish(exchange, routing_key, payload))
        {
            Ok(()) => {
                debug!(exchange, routing_key, size = payload.len(), "Sent message");
                Ok(())
            }
            Err(source) => {
                error!(exchange, error = %source, "Failed to publish message");
                Err(Error::Publish {
                    exchange: exchange.to_string(),
                    source,
                })
            }
        }
    }
}
