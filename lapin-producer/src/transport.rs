//! The broker client seam. [`crate::ChannelManager`] only talks to
//! the broker through these traits; the [`lapin`] implementation
//! lives in [`crate::rabbit`]. Every call blocks until the broker
//! answers.
use std::sync::Arc;

use tracing::warn;

use crate::error::DeliveryTag;

/// Boxed source error from the broker client
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type that returns a [`TransportError`]
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures reported by the broker client
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// There is no open channel to make the call on
    #[error("channel is not open")]
    NotOpen,

    /// There is no consumer registered to receive from
    #[error("no consumer is registered")]
    NotConsuming,

    /// The broker terminated the channel or connection
    #[error("broker shut down the channel or connection: {source}")]
    Shutdown {
        /// What the client library reported
        #[source]
        source: BoxError,
    },

    /// Any other failure of the client call
    #[error("broker client error: {source}")]
    Client {
        /// What the client library reported
        #[source]
        source: BoxError,
    },
}

impl TransportError {
    /// A broker initiated shutdown caused by `source`
    pub fn shutdown(source: impl Into<BoxError>) -> Self {
        Self::Shutdown {
            source: source.into(),
        }
    }

    /// A failed client call caused by `source`
    pub fn client(source: impl Into<BoxError>) -> Self {
        Self::Client {
            source: source.into(),
        }
    }

    /// True if the broker closed the channel or connection
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown { .. })
    }
}

/// A message received by a registered consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Tag to pass to the resolve methods
    pub delivery_tag: DeliveryTag,
    /// The message body
    pub payload: Vec<u8>,
    /// The broker has delivered this message before
    pub redelivered: bool,
}

/// Called when the connection is terminated without being asked to
/// close. The client library may call this from its own IO thread.
pub trait ShutdownListener: Send + Sync {
    /// The connection went away because of `cause`
    fn on_shutdown(&self, cause: &TransportError);
}

/// Listener that only records the shutdown in the log
#[derive(Debug, Default)]
pub struct LogShutdown {
    /// Exchange the connection was serving, for the log record
    pub exchange: String,
}

impl ShutdownListener for LogShutdown {
    fn on_shutdown(&self, cause: &TransportError) {
        warn!(exchange = self.exchange, error = %cause, "Connection shut down");
    }
}

/// Factory for broker connections to a fixed server
pub trait Transport {
    /// The connection type this transport opens
    type Connection: BrokerConnection;

    /// Open a new connection. `listener` is called if the connection
    /// later shuts down on its own.
    fn connect(&self, listener: Arc<dyn ShutdownListener>) -> TransportResult<Self::Connection>;
}

/// An open connection channels can be created on
pub trait BrokerConnection {
    /// The channel type created on this connection
    type Channel: BrokerChannel;

    /// Open a new channel
    fn create_channel(&self) -> TransportResult<Self::Channel>;

    /// Close the connection
    fn close(&self) -> TransportResult<()>;
}

/// An open channel
pub trait BrokerChannel {
    /// Consumer registration type returned by [`BrokerChannel::subscribe`]
    type Consumer: BrokerConsumer;

    /// The channel is still usable
    fn is_open(&self) -> bool;

    /// `basic.qos`: limit unacknowledged deliveries to `prefetch_count`
    fn set_prefetch(&self, prefetch_count: u16) -> TransportResult<()>;

    /// `exchange.declare` with type `fanout`
    fn declare_fanout(&self, exchange: &str, durable: bool) -> TransportResult<()>;

    /// `basic.publish` with empty properties
    fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> TransportResult<()>;

    /// `basic.ack` with `multiple=false`
    fn ack(&self, delivery_tag: DeliveryTag) -> TransportResult<()>;

    /// `basic.reject`
    fn reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> TransportResult<()>;

    /// Bind `queue` to `exchange` and start a manual-ack consumer on
    /// it. With no `queue` a private, server-named queue is used,
    /// which the broker deletes together with its unacknowledged
    /// deliveries when the connection goes away. A named queue
    /// outlives the connection.
    fn subscribe(
        &self,
        queue: Option<&str>,
        exchange: &str,
        routing_key: &str,
        consumer_tag: &str,
    ) -> TransportResult<Self::Consumer>;

    /// `basic.cancel`
    fn cancel_consumer(&self, consumer_tag: &str) -> TransportResult<()>;

    /// Close the channel
    fn close(&self) -> TransportResult<()>;
}

/// An active consumer registration
pub trait BrokerConsumer {
    /// Tag the broker knows the consumer by
    fn tag(&self) -> String;

    /// Block until the next delivery arrives. `None` once the
    /// consumer has been cancelled.
    fn next_delivery(&mut self) -> TransportResult<Option<Delivery>>;
}
