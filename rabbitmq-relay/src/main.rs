//! Relay messages to and from a `RabbitMQ` fan-out exchange
//!
//! Usage:
//! ```text
//! rabbit-relay publish --exchange=logs --rabbit-addr="amqp://rabbit.host/" -m hello
//! tail -f app.log | rabbit-relay publish --exchange=logs
//! rabbit-relay consume --exchange=logs --fail-on=ERROR --count=100
//! ```
//!
//! `publish` sends each `--message`, or each line of standard input
//! if none are given, to the exchange. `consume` binds a private queue,
//! or the `--queue` named queue, to the exchange and prints every
//! delivery on its own line before acknowledging it. Deliveries
//! containing the `--fail-on` text are failed instead, which requeues
//! them with `--requeue-on-fail` and dead-letters them otherwise.
//!
//! If the broker shuts the channel down while `consume` is receiving
//! or resolving a delivery, the channel is reopened and consuming
//! continues. Without `--queue` each connection consumes from its own
//! private queue, which the broker deletes with the connection, so the
//! delivery in flight and anything published while reconnecting is
//! lost. Give `--queue` to consume from a named queue that outlives
//! the connection and have those deliveries redelivered. Any other
//! error ends the program with a non-zero exit status.
//!
//! This application uses `native-tls` to support secure connections
//! and AMQP EXTERNAL authentication. This means it will link a
//! separately installed `openssl` shared library.
// Clippy lints
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::single_match_else)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(clippy::self_named_module_files)]
#![warn(clippy::perf)]
#![deny(missing_docs)]
#![warn(clippy::missing_panics_doc)]

use std::path::Path;

use miette::{IntoDiagnostic, Result, WrapErr};

#[allow(unused_imports)]
use tracing::{debug, error, info, Level};

use clap::Parser;

mod cli;
/// Publish and consume loops
mod relay;
#[cfg(test)]
mod test_broker;

/// Install the global subscriber, filtered by `RUST_LOG`. Logs go to
/// `logfile` if given, stderr otherwise.
fn init_logging(logfile: Option<&Path>) -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .pretty()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env());

    match logfile {
        Some(file) => {
            let f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .into_diagnostic()
                .wrap_err_with(|| format!("Unable to open {}", file.display()))?;
            subscriber
                .with_writer(std::sync::Mutex::new(f))
                .with_ansi(false)
                .init();
        }
        None => {
            subscriber.with_writer(std::io::stderr).init();
        }
    };
    Ok(())
}

#[doc(hidden)]
fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.logfile.as_deref())?;

    debug!("Got command line arguments {:?}", args);

    args.command.run()?;

    info!("Shutting down");
    Ok(())
}
