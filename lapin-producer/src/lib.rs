//! Publish to a RabbitMQ fan-out exchange and resolve the deliveries
//! consumed from it, over a single [`lapin`] connection and channel
//! owned by a [`ChannelManager`].
//!
//! Every call blocks the calling thread until the broker answers.
//! Nothing is retried and nothing reconnects on its own: failures are
//! logged with [`tracing`] and returned, and
//! [`ChannelManager::reinitialize_if_necessary`] tears down and
//! reopens the connection when the consumer state has gone stale.
//!
//! # Examples
//! Build a manager with PLAIN authentication
//! ```rust
//! # fn main() -> miette::Result<()>{
//! use lapin_producer::EndpointBuilder;
//! let manager = EndpointBuilder::new("amqp://127.0.0.1:5672/%2f", "logs")
//!     .prefetch_count(10)
//!     .requeue_on_fail(true)
//!     .plain_auth("guest")
//!     .with_password("guest")
//!     .build()?;
//! assert!(!manager.is_open());
//! # Ok(())}
//! ```
//!
//! Publish, then consume and resolve what arrives
//! ```no_run
//! # fn main() -> miette::Result<()>{
//! # use lapin_producer::EndpointBuilder;
//! let mut manager = EndpointBuilder::new("amqp://127.0.0.1:5672/%2f", "logs").build()?;
//! manager.open()?;
//! manager.consume()?;
//! manager.send(b"hello")?;
//! while let Some(delivery) = manager.next_delivery()? {
//!     if delivery.payload.is_empty() {
//!         manager.fail_message(delivery.delivery_tag)?;
//!     } else {
//!         manager.acknowledge(delivery.delivery_tag)?;
//!     }
//! }
//! manager.close();
//! # Ok(())}
//! ```
//!
//! # Other clients
//!
//! [`ChannelManager`] works with anything implementing the traits in
//! [`transport`]; [`Opener`] is the `lapin` implementation.
//!
//! # Openssl
//!
//! This crate uses openssl via the
//! [`native-tls`](https://docs.rs/native-tls/0.2.11/native_tls/) crate.
//! By default it links to an existing shared library on your system. If
//! you would instead like a static binary, include the feature
//! `native-tls/vendored` on your crate
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
// clippy lints
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::single_match_else)]
#![warn(
    clippy::missing_docs_in_private_items,
    clippy::self_named_module_files,
    clippy::perf,
    clippy::missing_panics_doc,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::enum_variant_names
)]

mod builder;
mod config;
mod connection;
mod error;
mod manager;
/// Connection configuration options
pub mod options;
mod rabbit;
pub mod transport;

#[cfg(feature = "clap")]
/// Clap based command-line argument builder
mod cli;

pub use builder::{auth, AuthType, EndpointBuilder};
pub use config::EndpointConfig;
pub use error::{AckError, DeliveryTag, Error, Resolution, Result};
pub use manager::ChannelManager;
pub use transport::{Delivery, ShutdownListener};

/// Factory to open new connections to a fixed RabbitMQ server
///
/// # Examples
/// ```rust
/// # fn main() -> miette::Result<()> {
///     use lapin_producer::Opener;
///     use lapin_producer::lapin::ConnectionProperties;
///     let opener = Opener::from_options("amqp://localhost:5672/%2f", None, None, ConnectionProperties::default())?;
///     assert_eq!(opener.uri().authority.port, 5672);
/// # Ok(()) }
/// ```
pub use connection::Opener;

// Re-export lapin for compatability
pub use lapin;

#[cfg(feature = "clap")]
/// Clap derive struct for building command-lines
pub use cli::EndpointArgs;
