//! Owner of the single connection/channel pair. Opening, closing and
//! reinitializing live here; publishing, consuming and resolving
//! deliveries are in the submodules.
use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::transport::{
    BrokerChannel, BrokerConnection, LogShutdown, ShutdownListener, Transport, TransportError,
    TransportResult,
};

mod consumer;
mod publisher;
mod resolver;

/// Connection type opened by transport `T`
type ConnectionOf<T> = <T as Transport>::Connection;
/// Channel type opened on the connections of transport `T`
type ChannelOf<T> = <ConnectionOf<T> as BrokerConnection>::Channel;
/// Consumer registration type of the channels of transport `T`
type ConsumerOf<T> = <ChannelOf<T> as BrokerChannel>::Consumer;

/// The connection and channel are either both present or both absent
enum ChannelState<T: Transport> {
    /// Nothing is open
    Closed,
    /// A live connection and the channel derived from it
    Open {
        /// The broker connection
        connection: ConnectionOf<T>,
        /// Channel all calls are made on
        channel: ChannelOf<T>,
    },
}

/// Publishes to a fan-out exchange and resolves deliveries from it
/// over one connection and one channel.
///
/// Calls block until the broker answers. Nothing is retried: when a
/// call fails, the caller decides whether to try again, and
/// [`ChannelManager::reinitialize_if_necessary`] is the only way the
/// manager repairs itself.
///
/// # Examples
/// ```no_run
/// # fn main() -> miette::Result<()> {
/// use lapin_producer::EndpointBuilder;
///
/// let mut manager = EndpointBuilder::new("amqp://127.0.0.1:5672/%2f", "logs")
///     .prefetch_count(10)
///     .plain_auth("guest")
///     .with_password("guest")
///     .build()?;
/// manager.open()?;
/// manager.send(b"hello")?;
/// manager.close();
/// # Ok(()) }
/// ```
pub struct ChannelManager<T: Transport> {
    /// Where to publish
    config: EndpointConfig,
    /// Opens new connections
    transport: T,
    /// The owned connection and channel
    state: ChannelState<T>,
    /// Active consumer registration
    consumer: Option<ConsumerOf<T>>,
    /// Tag of the active consumer. Cleared on its own when the
    /// broker shuts the channel down.
    consumer_tag: Option<String>,
    /// Number of consumers registered so far, keeps tags unique
    consumer_seq: u64,
    /// Told about connections that die on their own
    listener: Arc<dyn ShutdownListener>,
}

impl<T: Transport> std::fmt::Debug for ChannelManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("consumer_tag", &self.consumer_tag)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> ChannelManager<T> {
    /// Create a closed manager. Call [`ChannelManager::open`] before
    /// publishing.
    ///
    /// `transport` alone decides where connections go; the URL in
    /// `config` only appears in log records.
    pub fn new(config: EndpointConfig, transport: T) -> Self {
        let listener = Arc::new(LogShutdown {
            exchange: config.exchange().to_string(),
        });
        Self {
            config,
            transport,
            state: ChannelState::Closed,
            consumer: None,
            consumer_tag: None,
            consumer_seq: 0,
            listener,
        }
    }

    /// Replace the listener told about unsolicited connection
    /// shutdowns. Applies to connections opened after this call.
    #[must_use]
    pub fn with_shutdown_listener(mut self, listener: Arc<dyn ShutdownListener>) -> Self {
        self.listener = listener;
        self
    }

    /// The endpoint this manager publishes to
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The connection and channel are held
    pub fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open { .. })
    }

    /// Tag of the active consumer, if any
    pub fn consumer_tag(&self) -> Option<&str> {
        self.consumer_tag.as_deref()
    }

    /// Both a consumer registration and its tag are held
    pub fn is_consuming(&self) -> bool {
        self.consumer.is_some() && self.consumer_tag.is_some()
    }

    /// Open a new connection and channel, apply the prefetch limit
    /// and declare the (non-durable, fan-out) exchange. An already
    /// open manager is closed first.
    ///
    /// On failure the consumer tag is dropped, nothing is stored and
    /// [`Error::Connection`] is returned.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            debug!(exchange = self.config.exchange(), "Reopening open channel");
            self.close();
        }
        match self.establish() {
            Ok((connection, channel)) => {
                self.state = ChannelState::Open {
                    connection,
                    channel,
                };
                Ok(())
            }
            Err(source) => {
                self.reset();
                error!(
                    exchange = self.config.exchange(),
                    error = %source,
                    "Could not open channel"
                );
                Err(Error::Connection {
                    exchange: self.config.exchange().to_string(),
                    source,
                })
            }
        }
    }

    /// Connect and set up the channel. A connection that was opened
    /// is closed again if the channel setup fails.
    fn establish(&self) -> TransportResult<(ConnectionOf<T>, ChannelOf<T>)> {
        let connection = self.transport.connect(self.listener.clone())?;
        info!(
            url = %self.config.redacted_url(),
            exchange = self.config.exchange(),
            "Connected to rabbitmq"
        );
        match self.setup_channel(&connection) {
            Ok(channel) => Ok((connection, channel)),
            Err(err) => {
                if let Err(e) = connection.close() {
                    debug!(error = %e, "Error closing connection after failed open");
                }
                Err(err)
            }
        }
    }

    /// Create the channel, set QoS and declare the exchange
    fn setup_channel(&self, connection: &ConnectionOf<T>) -> TransportResult<ChannelOf<T>> {
        let channel = connection.create_channel()?;
        let prefetch_count = self.config.prefetch_count();
        if prefetch_count > 0 {
            info!(
                prefetch_count,
                exchange = self.config.exchange(),
                "Setting basic.qos prefetch count"
            );
            channel.set_prefetch(prefetch_count)?;
        }
        channel.declare_fanout(self.config.exchange(), false)?;
        Ok(channel)
    }

    /// Tear everything down. Each step is attempted even if an
    /// earlier one failed; failures are logged and dropped. The
    /// manager always ends up closed with no consumer.
    pub fn close(&mut self) {
        info!(exchange = self.config.exchange(), "Closing channel");
        let state = std::mem::replace(&mut self.state, ChannelState::Closed);
        if let ChannelState::Open {
            connection,
            channel,
        } = state
        {
            if channel.is_open() {
                if let Some(tag) = &self.consumer_tag {
                    if let Err(e) = channel.cancel_consumer(tag) {
                        debug!(consumer_tag = tag, error = %e, "Error cancelling consumer");
                    }
                }
                if let Err(e) = channel.close() {
                    debug!(error = %e, "Error closing channel");
                }
            }
            info!(url = %self.config.redacted_url(), "Closing connection to rabbitmq");
            if let Err(e) = connection.close() {
                debug!(error = %e, "Error closing connection");
            }
        }
        self.consumer = None;
        self.consumer_tag = None;
    }

    /// Close and reopen if the consumer tag or the consumer
    /// registration is missing. Returns `true` if it reconnected.
    pub fn reinitialize_if_necessary(&mut self) -> Result<bool> {
        if self.is_consuming() {
            return Ok(false);
        }
        info!(exchange = self.config.exchange(), "Reinitializing channel");
        self.close();
        self.open()?;
        Ok(true)
    }

    /// Forget the consumer tag so the next
    /// [`ChannelManager::reinitialize_if_necessary`] reconnects
    fn reset(&mut self) {
        self.consumer_tag = None;
    }

    /// The open channel, or [`TransportError::NotOpen`]
    fn channel(&self) -> TransportResult<&ChannelOf<T>> {
        match &self.state {
            ChannelState::Open { channel, .. } => Ok(channel),
            ChannelState::Closed => Err(TransportError::NotOpen),
        }
    }
}
