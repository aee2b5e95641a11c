//! Errors returned by the channel manager and its configuration
use std::path::PathBuf;

use crate::transport::TransportError;

/// AMQP delivery-tag
pub type DeliveryTag = u64;

/// Result type that returns an [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// The outcome requested for a single delivery
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// `basic.ack`, the delivery was processed
    Acknowledge,
    /// `basic.reject` with `requeue=true`
    Redeliver,
    /// `basic.reject` with `requeue=false`
    DeadLetter,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self {
            Resolution::Acknowledge => "ack",
            Resolution::Redeliver => "fail with redelivery",
            Resolution::DeadLetter => "fail with dead-lettering",
        };
        f.write_str(action)
    }
}

/// Failures resolving a delivery (ack, redeliver or dead-letter)
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AckError {
    /// The broker closed the channel or connection while the
    /// resolution was in flight. The consumer tag has been cleared,
    /// so [`crate::ChannelManager::reinitialize_if_necessary`] will
    /// reconnect.
    #[error("shutdown signal received while attempting to {resolution} delivery {delivery_tag}")]
    #[diagnostic(
        code(lapin_producer::shutdown_signal),
        help("call reinitialize_if_necessary() to reconnect")
    )]
    ShutdownSignal {
        /// What was being attempted
        resolution: Resolution,
        /// The delivery being resolved
        delivery_tag: DeliveryTag,
        /// The shutdown cause
        #[source]
        source: TransportError,
    },

    /// Any other failure of the ack/reject call
    #[error("could not {resolution} for delivery {delivery_tag}")]
    #[diagnostic(code(lapin_producer::ack))]
    Failed {
        /// What was being attempted
        resolution: Resolution,
        /// The delivery being resolved
        delivery_tag: DeliveryTag,
        /// The underlying failure
        #[source]
        source: TransportError,
    },
}

impl AckError {
    /// Sort a transport failure into the shutdown or plain case
    pub(crate) fn new(
        resolution: Resolution,
        delivery_tag: DeliveryTag,
        source: TransportError,
    ) -> Self {
        if source.is_shutdown() {
            Self::ShutdownSignal {
                resolution,
                delivery_tag,
                source,
            }
        } else {
            Self::Failed {
                resolution,
                delivery_tag,
                source,
            }
        }
    }

    /// True if the broker terminated the channel or connection
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownSignal { .. })
    }

    /// The resolution that failed
    pub fn resolution(&self) -> Resolution {
        match self {
            Self::ShutdownSignal { resolution, .. } | Self::Failed { resolution, .. } => *resolution,
        }
    }

    /// The delivery that could not be resolved
    pub fn delivery_tag(&self) -> DeliveryTag {
        match self {
            Self::ShutdownSignal { delivery_tag, .. } | Self::Failed { delivery_tag, .. } => {
                *delivery_tag
            }
        }
    }
}

/// Errors from opening, publishing, consuming and resolving, plus
/// configuration errors from building the connection opener
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    /// Failed to open the connection or channel, or to declare the
    /// exchange
    #[error("could not open channel for exchange {exchange}")]
    #[diagnostic(
        code(lapin_producer::connection),
        help("check the broker address, credentials and that the exchange is not declared with other settings")
    )]
    Connection {
        /// Exchange the channel was being opened for
        exchange: String,
        /// The underlying failure
        #[source]
        source: TransportError,
    },

    /// Failed to publish on the open channel
    #[error("failed to publish message to exchange: {exchange}")]
    #[diagnostic(code(lapin_producer::publish))]
    Publish {
        /// Exchange the message was published to
        exchange: String,
        /// The underlying failure
        #[source]
        source: TransportError,
    },

    /// Failed to register a consumer or to receive a delivery
    #[error("could not consume from exchange {exchange}")]
    #[diagnostic(code(lapin_producer::consume))]
    Consume {
        /// Exchange the consumer queue is bound to
        exchange: String,
        /// The underlying failure
        #[source]
        source: TransportError,
    },

    /// Failed to resolve a delivery
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ack(#[from] AckError),

    /// The broker URL could not be parsed
    #[error("failed to parse broker URL: {0}")]
    #[diagnostic(code(lapin_producer::url))]
    Parse(String),

    /// Failed to read a password from the user
    #[error("failed to read password")]
    Password(#[source] std::io::Error),

    /// One of the key, certificate or password files could not be read
    #[error("failed to read {}", path.display())]
    ReadFile {
        /// The file that was being read
        path: PathBuf,
        /// The IO error
        #[source]
        source: std::io::Error,
    },

    /// Error in forming the TLS connector
    #[error("error in forming TLS connection")]
    Tls(#[from] native_tls::Error),
}
