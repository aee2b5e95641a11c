//! Command line parser
use std::path::PathBuf;

use clap::Parser;
use lapin_producer::{ChannelManager, EndpointArgs, Opener};

use crate::relay;

/// Relay subcommands. Each one opens its own channel to the exchange
/// given in its endpoint options.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Publish messages to a fan-out exchange
    Publish(PublishCommand),

    /// Consume from a fan-out exchange, printing and resolving each
    /// delivery
    Consume(ConsumeCommand),
}

impl Commands {
    /// Run the selected subcommand against stdin and stdout
    pub(crate) fn run(&self) -> miette::Result<()> {
        match self {
            Commands::Publish(cmd) => {
                let mut manager = cmd.manager()?;
                relay::publish(&mut manager, &cmd.messages, std::io::stdin().lock())?;
            }
            Commands::Consume(cmd) => {
                let mut manager = cmd.manager()?;
                relay::consume(&mut manager, &cmd.options(), std::io::stdout().lock())?;
            }
        }
        Ok(())
    }
}

/// Trait that produces channel managers from command-line arguments
pub(crate) trait RelayCommand {
    /// Where to connect and what to declare
    fn endpoint(&self) -> &EndpointArgs;

    /// Closed manager for the endpoint of this command
    fn manager(&self) -> miette::Result<ChannelManager<Opener>> {
        Ok(self.endpoint().channel_manager()?)
    }
}

/// Send each message given on the command line, or each line of
/// standard input if there are none
#[derive(clap::Args, Debug)]
pub struct PublishCommand {
    /// Message to publish. May be repeated
    #[arg(short, long = "message")]
    pub(crate) messages: Vec<String>,

    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
}

impl RelayCommand for PublishCommand {
    fn endpoint(&self) -> &EndpointArgs {
        &self.endpoint
    }
}

/// Print deliveries to standard output and resolve them
#[derive(clap::Args, Debug)]
pub struct ConsumeCommand {
    /// Stop after this many deliveries have been resolved
    #[arg(long)]
    pub(crate) count: Option<u64>,

    /// Fail deliveries whose payload contains this text instead of
    /// acknowledging them
    #[arg(long)]
    pub(crate) fail_on: Option<String>,

    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
}

impl ConsumeCommand {
    /// The loop settings
    fn options(&self) -> relay::ConsumeOptions {
        relay::ConsumeOptions {
            count: self.count,
            fail_on: self.fail_on.clone(),
        }
    }
}

impl RelayCommand for ConsumeCommand {
    fn endpoint(&self) -> &EndpointArgs {
        &self.endpoint
    }
}

/// Publish to, or consume from, a `RabbitMQ` fan-out exchange
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// File to write logs to. Will log to stderr if not given
    #[arg(long)]
    pub(crate) logfile: Option<PathBuf>,

    /// What to do
    #[command(subcommand)]
    pub(crate) command: Commands,
}
