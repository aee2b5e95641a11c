//! The publish and consume loops behind the subcommands
use std::io::{BufRead, Write};

use lapin_producer::transport::Transport;
use lapin_producer::{ChannelManager, Delivery, Error};
use miette::{IntoDiagnostic, Result, WrapErr};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

/// How long to consume and which deliveries to fail
#[derive(Clone, Debug, Default)]
pub(crate) struct ConsumeOptions {
    /// Stop after resolving this many deliveries. Runs until the
    /// consumer is cancelled if not given.
    pub(crate) count: Option<u64>,
    /// Deliveries containing this text are failed instead of
    /// acknowledged
    pub(crate) fail_on: Option<String>,
}

impl ConsumeOptions {
    /// The delivery should be failed rather than acknowledged
    fn should_fail(&self, delivery: &Delivery) -> bool {
        match &self.fail_on {
            Some(text) => String::from_utf8_lossy(&delivery.payload).contains(text.as_str()),
            None => false,
        }
    }
}

/// Open a channel and publish `messages`, or each line of `input` if
/// `messages` is empty. The channel is closed afterwards, even on
/// error. Returns the number of messages published.
pub(crate) fn publish<T: Transport>(
    manager: &mut ChannelManager<T>,
    messages: &[String],
    input: impl BufRead,
) -> Result<usize> {
    manager.open()?;
    let sent = publish_all(manager, messages, input);
    manager.close();
    let sent = sent?;
    info!(sent, exchange = manager.config().exchange(), "Finished publishing");
    Ok(sent)
}

/// Publish every message on the open channel
fn publish_all<T: Transport>(
    manager: &ChannelManager<T>,
    messages: &[String],
    input: impl BufRead,
) -> Result<usize> {
    let mut sent = 0;
    if messages.is_empty() {
        for line in input.lines() {
            let line = line.into_diagnostic().wrap_err("Unable to read stdin")?;
            manager.send(line.as_bytes())?;
            sent += 1;
        }
    } else {
        for message in messages {
            manager.send(message.as_bytes())?;
            sent += 1;
        }
    }
    Ok(sent)
}

/// Open a channel, register a consumer and write each delivery's
/// payload as a line to `out` before resolving it. When the broker
/// shuts the channel down the manager is reinitialized and the
/// consumer registered again. On a configured queue the delivery that
/// was in flight comes back redelivered; on a private queue it is
/// deleted along with the old connection. The channel is closed
/// afterwards, even on error. Returns the number of deliveries
/// resolved.
pub(crate) fn consume<T: Transport>(
    manager: &mut ChannelManager<T>,
    options: &ConsumeOptions,
    mut out: impl Write,
) -> Result<u64> {
    manager.open()?;
    let resolved = match manager.consume() {
        Ok(()) => consume_loop(manager, options, &mut out),
        Err(err) => Err(err.into()),
    };
    manager.close();
    let resolved = resolved?;
    info!(resolved, exchange = manager.config().exchange(), "Finished consuming");
    Ok(resolved)
}

/// Receive and resolve until the count is reached or the consumer is
/// cancelled
fn consume_loop<T: Transport>(
    manager: &mut ChannelManager<T>,
    options: &ConsumeOptions,
    out: &mut impl Write,
) -> Result<u64> {
    let mut resolved = 0;
    while options.count.map_or(true, |count| resolved < count) {
        let delivery = match manager.next_delivery() {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                info!("Consumer cancelled by the broker");
                break;
            }
            Err(Error::Consume { ref source, .. }) if source.is_shutdown() => {
                recover(manager)?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        out.write_all(&delivery.payload)
            .and_then(|()| out.write_all(b"\n"))
            .into_diagnostic()
            .wrap_err("Unable to write delivery")?;

        let result = if options.should_fail(&delivery) {
            manager.fail_message(delivery.delivery_tag)
        } else {
            manager.acknowledge(delivery.delivery_tag)
        };
        match result {
            Ok(()) => resolved += 1,
            Err(Error::Ack(ack)) if ack.is_shutdown() => {
                warn!(
                    delivery_tag = ack.delivery_tag(),
                    queue = manager.config().queue(),
                    "Delivery left unresolved"
                );
                recover(manager)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(resolved)
}

/// Reconnect and consume again after the channel was shut down
fn recover<T: Transport>(manager: &mut ChannelManager<T>) -> Result<()> {
    warn!(exchange = manager.config().exchange(), "Channel shut down, reconnecting");
    if manager.reinitialize_if_necessary()? {
        manager.consume()?;
    }
    Ok(())
}
