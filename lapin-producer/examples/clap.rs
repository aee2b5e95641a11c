//! Publish each command-line message to an exchange
//!
//! ```text
//! cargo run --example clap --features clap -- --exchange logs hello world
//! ```
use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(clap::Parser, Debug)]
struct Args {
    #[command(flatten)]
    endpoint: lapin_producer::EndpointArgs,

    /// Messages to publish
    messages: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut manager = args.endpoint.channel_manager()?;
    manager.open()?;
    for message in &args.messages {
        manager.send(message.as_bytes())?;
    }
    manager.close();
    Ok(())
}
